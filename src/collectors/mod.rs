pub mod cpu;
pub mod disk;
pub mod gpu;
pub mod host;
pub mod memory;
pub mod network;
pub mod process;

use std::time::{Duration, Instant};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("source unavailable: {0}")]
    Unavailable(String),
    #[error("probe timed out after {0:?}")]
    Timeout(Duration),
}

pub type AdapterResult<T> = Result<T, AdapterError>;

/// Running byte counters used to derive transfer rates between ticks.
/// Owned by exactly one adapter; a counter that went backwards (wrap or
/// device change) reads as a zero delta, never a negative rate.
#[derive(Debug)]
pub struct CounterState {
    rx_bytes: u64,
    tx_bytes: u64,
    sampled_at: Instant,
}

impl CounterState {
    pub fn new(rx_bytes: u64, tx_bytes: u64, now: Instant) -> Self {
        Self {
            rx_bytes,
            tx_bytes,
            sampled_at: now,
        }
    }

    /// Advances to the new totals and returns (rx, tx) in bytes per second.
    pub fn advance(&mut self, rx_bytes: u64, tx_bytes: u64, now: Instant) -> (f64, f64) {
        let dt = now.duration_since(self.sampled_at).as_secs_f64();
        let rates = if dt > 0.0 {
            (
                rx_bytes.saturating_sub(self.rx_bytes) as f64 / dt,
                tx_bytes.saturating_sub(self.tx_bytes) as f64 / dt,
            )
        } else {
            (0.0, 0.0)
        };

        self.rx_bytes = rx_bytes;
        self.tx_bytes = tx_bytes;
        self.sampled_at = now;
        rates
    }
}
