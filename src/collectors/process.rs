use crate::snapshot::ProcessStat;
use sysinfo::{ProcessExt, System, SystemExt};

pub fn sample(system: &System, top_n: usize) -> Vec<ProcessStat> {
    let total_memory_bytes = system.total_memory() * 1024;

    let processes = system
        .processes()
        .values()
        .map(|p| ProcessStat {
            name: p.name().to_string(),
            cpu_percent: p.cpu_usage() as f64,
            memory_percent: if total_memory_bytes > 0 {
                (p.memory() * 1024) as f64 / total_memory_bytes as f64 * 100.0
            } else {
                0.0
            },
        })
        .collect();

    top_by_cpu(processes, top_n)
}

fn top_by_cpu(mut processes: Vec<ProcessStat>, top_n: usize) -> Vec<ProcessStat> {
    processes.sort_by(|a, b| b.cpu_percent.total_cmp(&a.cpu_percent));
    processes.truncate(top_n);
    processes
}
