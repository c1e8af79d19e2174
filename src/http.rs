use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures_util::stream::{self, Stream};
use tokio::sync::broadcast::error::RecvError;

use crate::events::{EventBus, MonitorEvent, TrackingComplete};
use crate::report;
use crate::sampler::SharedLatest;
use crate::session::{SessionError, StopOutcome, TrackingManager, TrackingStatus};
use crate::snapshot::ResourceSnapshot;

#[derive(Clone)]
pub struct HttpAppState {
    pub latest: SharedLatest,
    pub session: Arc<TrackingManager>,
    pub bus: EventBus,
}

#[derive(Debug, serde::Serialize)]
struct StatsResponse {
    snapshot: Option<Arc<ResourceSnapshot>>,
    tracking: TrackingStatus,
}

#[derive(Debug, serde::Serialize)]
struct CommandResponse {
    status: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    duration_limit_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    data_points: Option<usize>,
}

pub fn build_router(latest: SharedLatest, session: Arc<TrackingManager>, bus: EventBus) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/api/stats", get(stats_handler))
        .route("/api/tracking/start", post(start_tracking_handler))
        .route("/api/tracking/stop", post(stop_tracking_handler))
        .route("/api/tracking/status", get(status_handler))
        .route("/api/report", post(report_handler))
        .route("/api/events", get(events_handler))
        .with_state(HttpAppState {
            latest,
            session,
            bus,
        })
}

async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

async fn stats_handler(State(state): State<HttpAppState>) -> impl IntoResponse {
    let snapshot = state.latest.read().await.clone();
    let tracking = state.session.status().await;
    Json(StatsResponse { snapshot, tracking })
}

async fn start_tracking_handler(State(state): State<HttpAppState>) -> impl IntoResponse {
    match state.session.start_tracking().await {
        Ok(started) => Json(CommandResponse {
            status: "started",
            message: format!(
                "tracking for {}",
                humantime::format_duration(started.duration_limit)
            ),
            duration_limit_secs: Some(started.duration_limit.as_secs()),
            data_points: None,
        }),
        Err(SessionError::AlreadyTracking) => Json(CommandResponse {
            status: "error",
            message: "already tracking".to_string(),
            duration_limit_secs: None,
            data_points: None,
        }),
    }
}

async fn stop_tracking_handler(State(state): State<HttpAppState>) -> impl IntoResponse {
    match state.session.stop_tracking().await {
        StopOutcome::Stopped { data_points } => {
            state
                .bus
                .publish(MonitorEvent::TrackingComplete(TrackingComplete::stopped(
                    data_points,
                )));
            Json(CommandResponse {
                status: "stopped",
                message: "tracking stopped".to_string(),
                duration_limit_secs: None,
                data_points: Some(data_points),
            })
        }
        StopOutcome::NotTracking => Json(CommandResponse {
            status: "not_tracking",
            message: "no active tracking session".to_string(),
            duration_limit_secs: None,
            data_points: None,
        }),
    }
}

async fn status_handler(State(state): State<HttpAppState>) -> impl IntoResponse {
    Json(state.session.status().await)
}

async fn report_handler(State(state): State<HttpAppState>) -> Response {
    let export = state.session.export().await;
    match report::build(&export) {
        Ok(data) => Json(data).into_response(),
        Err(err) => (
            StatusCode::BAD_REQUEST,
            Json(CommandResponse {
                status: "error",
                message: err.to_string(),
                duration_limit_secs: None,
                data_points: None,
            }),
        )
            .into_response(),
    }
}

async fn events_handler(
    State(state): State<HttpAppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.bus.subscribe();
    let stream = stream::unfold(rx, |mut rx| async move {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    let Ok(data) = serde_json::to_string(&event) else {
                        continue;
                    };
                    return Some((Ok(Event::default().event(event.name()).data(data)), rx));
                }
                // a viewer that fell behind just skips the frames it missed
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => return None,
            }
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use std::time::Duration;
    use tokio::sync::RwLock;
    use tower::ServiceExt;

    fn test_state() -> (SharedLatest, Arc<TrackingManager>, EventBus) {
        let latest: SharedLatest = Arc::new(RwLock::new(None));
        let session = Arc::new(TrackingManager::new(Duration::from_secs(300)));
        let bus = EventBus::new(16);
        (latest, session, bus)
    }

    fn router_of(latest: &SharedLatest, session: &Arc<TrackingManager>, bus: &EventBus) -> Router {
        build_router(latest.clone(), session.clone(), bus.clone())
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn request(router: Router, method: &str, uri: &str) -> Response {
        router
            .oneshot(
                Request::builder()
                    .method(method)
                    .uri(uri)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn healthz_returns_ok() {
        let (latest, session, bus) = test_state();
        let response = request(router_of(&latest, &session, &bus), "GET", "/healthz").await;

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(bytes.as_ref(), b"ok");
    }

    #[tokio::test]
    async fn stats_is_null_until_the_first_tick() {
        let (latest, session, bus) = test_state();
        let response = request(router_of(&latest, &session, &bus), "GET", "/api/stats").await;

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert!(json["snapshot"].is_null());
        assert_eq!(json["tracking"]["is_tracking"], false);
    }

    #[tokio::test]
    async fn stats_serves_the_latest_snapshot() {
        let (latest, session, bus) = test_state();
        *latest.write().await = Some(Arc::new(ResourceSnapshot::default()));

        let response = request(router_of(&latest, &session, &bus), "GET", "/api/stats").await;
        let json = body_json(response).await;
        assert!(json["snapshot"]["cpu"].is_object());
    }

    #[tokio::test]
    async fn start_twice_reports_already_tracking() {
        let (latest, session, bus) = test_state();

        let response = request(
            router_of(&latest, &session, &bus),
            "POST",
            "/api/tracking/start",
        )
        .await;
        let json = body_json(response).await;
        assert_eq!(json["status"], "started");
        assert_eq!(json["duration_limit_secs"], 300);

        let response = request(
            router_of(&latest, &session, &bus),
            "POST",
            "/api/tracking/start",
        )
        .await;
        let json = body_json(response).await;
        assert_eq!(json["status"], "error");
        assert_eq!(json["message"], "already tracking");
    }

    #[tokio::test]
    async fn stop_reports_data_points_then_not_tracking() {
        let (latest, session, bus) = test_state();
        session.start_tracking().await.expect("start");
        session
            .on_snapshot(Arc::new(ResourceSnapshot::default()))
            .await;

        let response = request(
            router_of(&latest, &session, &bus),
            "POST",
            "/api/tracking/stop",
        )
        .await;
        let json = body_json(response).await;
        assert_eq!(json["status"], "stopped");
        assert_eq!(json["data_points"], 1);

        let response = request(
            router_of(&latest, &session, &bus),
            "POST",
            "/api/tracking/stop",
        )
        .await;
        let json = body_json(response).await;
        assert_eq!(json["status"], "not_tracking");
    }

    #[tokio::test]
    async fn stop_publishes_the_completion_event() {
        let (latest, session, bus) = test_state();
        session.start_tracking().await.expect("start");
        let mut rx = bus.subscribe();

        let _ = request(
            router_of(&latest, &session, &bus),
            "POST",
            "/api/tracking/stop",
        )
        .await;

        let event = rx.recv().await.expect("event");
        match event {
            MonitorEvent::TrackingComplete(done) => assert_eq!(done.data_points, 0),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn status_route_reflects_the_session() {
        let (latest, session, bus) = test_state();
        let response = request(
            router_of(&latest, &session, &bus),
            "GET",
            "/api/tracking/status",
        )
        .await;
        let json = body_json(response).await;
        assert_eq!(json["is_tracking"], false);
        assert_eq!(json["progress"], 0.0);
        assert_eq!(json["data_points"], 0);
    }

    #[tokio::test]
    async fn report_requires_a_completed_session_with_data() {
        let (latest, session, bus) = test_state();
        let response = request(router_of(&latest, &session, &bus), "POST", "/api/report").await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json["status"], "error");
    }

    #[tokio::test]
    async fn report_returns_summary_statistics() {
        let (latest, session, bus) = test_state();
        session.start_tracking().await.expect("start");
        for usage in [10.0, 50.0, 30.0] {
            let snapshot = ResourceSnapshot {
                cpu: crate::snapshot::CpuStat {
                    usage_percent: usage,
                    ..crate::snapshot::CpuStat::default()
                },
                ..ResourceSnapshot::default()
            };
            session.on_snapshot(Arc::new(snapshot)).await;
        }
        session.stop_tracking().await;

        let response = request(router_of(&latest, &session, &bus), "POST", "/api/report").await;
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["data_points"], 3);
        assert_eq!(json["cpu_usage_percent"]["min"], 10.0);
        assert_eq!(json["cpu_usage_percent"]["max"], 50.0);
        assert_eq!(json["cpu_usage_percent"]["avg"], 30.0);
        assert_eq!(json["snapshots"].as_array().unwrap().len(), 3);
    }
}
