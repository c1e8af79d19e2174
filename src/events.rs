use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;

use crate::session::TrackingStatus;
use crate::snapshot::ResourceSnapshot;

#[derive(Debug, Clone, serde::Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum MonitorEvent {
    StatsUpdate(StatsUpdate),
    TrackingComplete(TrackingComplete),
}

impl MonitorEvent {
    pub fn name(&self) -> &'static str {
        match self {
            MonitorEvent::StatsUpdate(_) => "stats_update",
            MonitorEvent::TrackingComplete(_) => "tracking_complete",
        }
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct StatsUpdate {
    #[serde(flatten)]
    pub snapshot: Arc<ResourceSnapshot>,
    pub tracking: TrackingStatus,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct TrackingComplete {
    pub message: String,
    pub data_points: usize,
}

impl TrackingComplete {
    pub fn elapsed(limit: Duration, data_points: usize) -> Self {
        Self {
            message: format!(
                "tracking finished after {}",
                humantime::format_duration(limit)
            ),
            data_points,
        }
    }

    pub fn stopped(data_points: usize) -> Self {
        Self {
            message: "tracking stopped before the time limit".to_string(),
            data_points,
        }
    }
}

/// Fan-out to live viewers. Publishing never blocks: with no subscribers the
/// frame is discarded, and a subscriber that falls behind the ring buffer
/// loses frames instead of stalling the sampler.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<MonitorEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn publish(&self, event: MonitorEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MonitorEvent> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::broadcast::error::RecvError;

    fn stats_event(data_points: usize) -> MonitorEvent {
        MonitorEvent::StatsUpdate(StatsUpdate {
            snapshot: Arc::new(ResourceSnapshot::default()),
            tracking: TrackingStatus {
                is_tracking: false,
                progress: 0.0,
                data_points,
            },
        })
    }

    #[tokio::test]
    async fn publish_without_subscribers_is_fine() {
        let bus = EventBus::new(8);
        bus.publish(stats_event(0));
    }

    #[tokio::test]
    async fn subscribers_receive_events_in_order() {
        let bus = EventBus::new(8);
        let mut rx = bus.subscribe();

        bus.publish(stats_event(1));
        bus.publish(stats_event(2));

        let first = rx.recv().await.expect("first");
        let second = rx.recv().await.expect("second");
        match (first, second) {
            (MonitorEvent::StatsUpdate(a), MonitorEvent::StatsUpdate(b)) => {
                assert_eq!(a.tracking.data_points, 1);
                assert_eq!(b.tracking.data_points, 2);
            }
            other => panic!("unexpected events: {other:?}"),
        }
    }

    #[tokio::test]
    async fn slow_subscriber_drops_frames_instead_of_blocking() {
        let bus = EventBus::new(2);
        let mut rx = bus.subscribe();

        for i in 0..5 {
            bus.publish(stats_event(i));
        }

        match rx.recv().await {
            Err(RecvError::Lagged(skipped)) => assert_eq!(skipped, 3),
            other => panic!("expected lag, got {other:?}"),
        }
        // the ring still holds the newest frames
        assert!(rx.recv().await.is_ok());
    }

    #[tokio::test]
    async fn stats_update_serializes_with_flattened_snapshot() {
        let json = serde_json::to_value(stats_event(7)).expect("serialize");
        assert_eq!(json["event"], "stats_update");
        assert!(json["cpu"].is_object());
        assert!(json["tracking"]["data_points"] == 7);
    }

    #[test]
    fn completion_messages() {
        let elapsed = TrackingComplete::elapsed(Duration::from_secs(300), 300);
        assert!(elapsed.message.contains("5m"));
        assert_eq!(elapsed.data_points, 300);

        let stopped = TrackingComplete::stopped(12);
        assert!(stopped.message.contains("stopped"));
    }
}
