use std::time::Instant;

use crate::collectors::{AdapterResult, CounterState};
use crate::snapshot::{bytes_to_gb, DiskStat, PartitionStat};
use sysinfo::{DiskExt, System, SystemExt};

const SECTOR_BYTES: u64 = 512;

/// Partition usage comes from sysinfo; I/O throughput comes from the kernel
/// counters in /proc/diskstats and degrades to zero where those are missing.
pub struct DiskAdapter {
    io: Option<CounterState>,
}

impl DiskAdapter {
    pub fn new() -> Self {
        Self { io: None }
    }

    pub fn sample(&mut self, system: &System) -> AdapterResult<DiskStat> {
        let partitions: Vec<PartitionStat> = system
            .disks()
            .iter()
            .map(|d| {
                let total = d.total_space();
                let used = total.saturating_sub(d.available_space());
                let device = d.name().to_string_lossy().to_string();
                let device = if device.is_empty() {
                    d.mount_point().to_string_lossy().to_string()
                } else {
                    device
                };
                PartitionStat {
                    device,
                    used_gb: bytes_to_gb(used),
                    total_gb: bytes_to_gb(total),
                    usage_percent: if total > 0 {
                        used as f64 / total as f64 * 100.0
                    } else {
                        0.0
                    },
                }
            })
            .collect();

        let (read_speed, write_speed) = match read_io_totals() {
            Some((read_bytes, written_bytes)) => {
                let now = Instant::now();
                match &mut self.io {
                    Some(counters) => counters.advance(read_bytes, written_bytes, now),
                    None => {
                        // first observation only seeds the baseline
                        self.io = Some(CounterState::new(read_bytes, written_bytes, now));
                        (0.0, 0.0)
                    }
                }
            }
            None => (0.0, 0.0),
        };

        Ok(DiskStat {
            read_speed_mbps: read_speed / 1024.0 / 1024.0,
            write_speed_mbps: write_speed / 1024.0 / 1024.0,
            partitions,
        })
    }
}

#[cfg(target_os = "linux")]
fn read_io_totals() -> Option<(u64, u64)> {
    std::fs::read_to_string("/proc/diskstats")
        .ok()
        .map(|text| parse_diskstats(&text))
}

#[cfg(not(target_os = "linux"))]
fn read_io_totals() -> Option<(u64, u64)> {
    None
}

fn parse_diskstats(text: &str) -> (u64, u64) {
    let mut read_bytes = 0_u64;
    let mut written_bytes = 0_u64;

    for line in text.lines() {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 10 {
            continue;
        }
        let name = fields[2];
        if !is_whole_disk(name) {
            continue;
        }

        let sectors_read: u64 = fields[5].parse().unwrap_or(0);
        let sectors_written: u64 = fields[9].parse().unwrap_or(0);
        read_bytes = read_bytes.saturating_add(sectors_read.saturating_mul(SECTOR_BYTES));
        written_bytes = written_bytes.saturating_add(sectors_written.saturating_mul(SECTOR_BYTES));
    }

    (read_bytes, written_bytes)
}

/// Keeps only whole-disk rows so partitions and virtual devices are not
/// counted twice on top of their backing disks.
fn is_whole_disk(name: &str) -> bool {
    for prefix in ["loop", "ram", "zram", "sr", "dm-", "md", "fd"] {
        if name.starts_with(prefix) {
            return false;
        }
    }

    if name.starts_with("nvme") || name.starts_with("mmcblk") {
        // nvme0n1p2 / mmcblk0p1 style partition suffix
        if let Some(idx) = name.rfind('p') {
            let suffix = &name[idx + 1..];
            if !suffix.is_empty() && suffix.chars().all(|c| c.is_ascii_digit()) {
                return false;
            }
        }
        return true;
    }

    // sda1 style partitions end in a digit
    !name.ends_with(|c: char| c.is_ascii_digit())
}
