use crate::snapshot::SystemStat;
use sysinfo::{System, SystemExt};

pub fn sample(system: &System) -> SystemStat {
    SystemStat {
        host_name: system.host_name(),
        os_name: system.name(),
        uptime_hours: round1(system.uptime() as f64 / 3600.0),
    }
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
