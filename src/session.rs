use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::sync::Mutex;

use crate::snapshot::{self, ResourceSnapshot};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SessionState {
    #[default]
    Idle,
    Active,
    Completed,
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("already tracking")]
    AlreadyTracking,
}

#[derive(Debug, Clone, Copy)]
pub struct StartedTracking {
    pub duration_limit: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    Stopped { data_points: usize },
    NotTracking,
}

/// Returned by the single caller that performed the Active -> Completed
/// transition; whoever holds it owns the one completion notification.
#[derive(Debug, Clone, Copy)]
pub struct Completion {
    pub data_points: usize,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct TrackingStatus {
    pub is_tracking: bool,
    pub progress: f64,
    pub data_points: usize,
}

#[derive(Debug, Clone, Default)]
pub struct SessionExport {
    pub started_at_unix: i64,
    pub ended_at_unix: i64,
    pub snapshots: Vec<Arc<ResourceSnapshot>>,
}

/// The single capture window the process owns. Every state read and
/// transition goes through one mutex, so concurrent start/stop commands and
/// sampler ticks can never observe a half-switched session.
pub struct TrackingManager {
    duration_limit: Duration,
    inner: Mutex<Session>,
}

#[derive(Default)]
struct Session {
    state: SessionState,
    started_at: Option<Instant>,
    started_at_unix: i64,
    ended_at_unix: i64,
    buffer: Vec<Arc<ResourceSnapshot>>,
}

impl TrackingManager {
    pub fn new(duration_limit: Duration) -> Self {
        Self {
            duration_limit,
            inner: Mutex::new(Session::default()),
        }
    }

    pub fn duration_limit(&self) -> Duration {
        self.duration_limit
    }

    pub async fn start_tracking(&self) -> Result<StartedTracking, SessionError> {
        let mut session = self.inner.lock().await;
        if session.state == SessionState::Active {
            return Err(SessionError::AlreadyTracking);
        }

        session.buffer = Vec::new();
        session.state = SessionState::Active;
        session.started_at = Some(Instant::now());
        session.started_at_unix = snapshot::now_unix();
        session.ended_at_unix = 0;

        Ok(StartedTracking {
            duration_limit: self.duration_limit,
        })
    }

    pub async fn stop_tracking(&self) -> StopOutcome {
        let mut session = self.inner.lock().await;
        if session.state != SessionState::Active {
            return StopOutcome::NotTracking;
        }

        session.state = SessionState::Completed;
        session.ended_at_unix = snapshot::now_unix();
        StopOutcome::Stopped {
            data_points: session.buffer.len(),
        }
    }

    /// Called once per sampler tick. Appends while Active and performs the
    /// timeout transition in the same critical section, so the completion
    /// cannot race an explicit stop into firing twice.
    pub async fn on_snapshot(&self, snapshot: Arc<ResourceSnapshot>) -> Option<Completion> {
        let mut session = self.inner.lock().await;
        if session.state != SessionState::Active {
            return None;
        }

        session.buffer.push(snapshot);

        let elapsed = session
            .started_at
            .map(|t| t.elapsed())
            .unwrap_or(Duration::ZERO);
        if elapsed >= self.duration_limit {
            session.state = SessionState::Completed;
            session.ended_at_unix = snapshot::now_unix();
            return Some(Completion {
                data_points: session.buffer.len(),
            });
        }

        None
    }

    pub async fn status(&self) -> TrackingStatus {
        let session = self.inner.lock().await;
        let progress = if session.state == SessionState::Active {
            let elapsed = session
                .started_at
                .map(|t| t.elapsed().as_secs_f64())
                .unwrap_or(0.0);
            let limit = self.duration_limit.as_secs_f64();
            if limit > 0.0 {
                round1((elapsed / limit * 100.0).min(100.0))
            } else {
                100.0
            }
        } else {
            0.0
        };

        TrackingStatus {
            is_tracking: session.state == SessionState::Active,
            progress,
            data_points: session.buffer.len(),
        }
    }

    /// Hands the report builder a Completed buffer; anything else exports as
    /// empty and surfaces downstream as an empty-session failure.
    pub async fn export(&self) -> SessionExport {
        let session = self.inner.lock().await;
        if session.state != SessionState::Completed {
            return SessionExport::default();
        }

        SessionExport {
            started_at_unix: session.started_at_unix,
            ended_at_unix: session.ended_at_unix,
            snapshots: session.buffer.clone(),
        }
    }
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
