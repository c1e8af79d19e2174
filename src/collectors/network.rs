use std::time::Instant;

use crate::collectors::{AdapterResult, CounterState};
use crate::snapshot::{bytes_to_gb, NetworkStat};
use sysinfo::{NetworkExt, NetworksExt, System, SystemExt};

/// Speeds are derived from the host-wide byte totals across all interfaces,
/// so interfaces appearing or disappearing between ticks shift the totals
/// instead of breaking per-interface bookkeeping.
pub struct NetworkAdapter {
    totals: Option<CounterState>,
}

impl NetworkAdapter {
    pub fn new() -> Self {
        Self { totals: None }
    }

    pub fn sample(&mut self, system: &System) -> AdapterResult<NetworkStat> {
        let mut recv_bytes = 0_u64;
        let mut sent_bytes = 0_u64;
        for (_iface, data) in system.networks().iter() {
            recv_bytes = recv_bytes.saturating_add(data.total_received());
            sent_bytes = sent_bytes.saturating_add(data.total_transmitted());
        }

        let now = Instant::now();
        let (down_bytes_per_sec, up_bytes_per_sec) = match &mut self.totals {
            Some(counters) => counters.advance(recv_bytes, sent_bytes, now),
            None => {
                self.totals = Some(CounterState::new(recv_bytes, sent_bytes, now));
                (0.0, 0.0)
            }
        };

        Ok(NetworkStat {
            upload_speed_kbps: bytes_per_sec_to_kbps(up_bytes_per_sec),
            download_speed_kbps: bytes_per_sec_to_kbps(down_bytes_per_sec),
            total_sent_gb: bytes_to_gb(sent_bytes),
            total_recv_gb: bytes_to_gb(recv_bytes),
        })
    }
}

fn bytes_per_sec_to_kbps(bytes_per_sec: f64) -> f64 {
    bytes_per_sec * 8.0 / 1024.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kilobit_conversion() {
        assert_eq!(bytes_per_sec_to_kbps(0.0), 0.0);
        assert_eq!(bytes_per_sec_to_kbps(128.0), 1.0);
        assert_eq!(bytes_per_sec_to_kbps(1024.0), 8.0);
    }
}
