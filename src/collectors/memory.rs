use crate::collectors::{AdapterError, AdapterResult};
use crate::snapshot::{bytes_to_gb, MemoryStat};
use sysinfo::{System, SystemExt};

pub fn sample(system: &System) -> AdapterResult<MemoryStat> {
    // sysinfo reports memory in KiB
    let total = system.total_memory() * 1024;
    if total == 0 {
        return Err(AdapterError::Unavailable(
            "memory totals not reported".to_string(),
        ));
    }

    let used = system.used_memory() * 1024;
    let available = system.available_memory() * 1024;
    let swap_total = system.total_swap() * 1024;
    let swap_used = system.used_swap() * 1024;

    let swap_percent = if swap_total > 0 {
        swap_used as f64 / swap_total as f64 * 100.0
    } else {
        0.0
    };

    Ok(MemoryStat {
        usage_percent: used as f64 / total as f64 * 100.0,
        used_gb: bytes_to_gb(used),
        total_gb: bytes_to_gb(total),
        available_gb: bytes_to_gb(available),
        swap_percent,
    })
}
