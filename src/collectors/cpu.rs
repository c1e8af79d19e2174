use crate::collectors::{AdapterError, AdapterResult};
use crate::snapshot::CpuStat;
use sysinfo::{ComponentExt, CpuExt, System, SystemExt};

pub fn sample(system: &System) -> AdapterResult<CpuStat> {
    let cpus = system.cpus();
    if cpus.is_empty() {
        return Err(AdapterError::Unavailable("no cpu readings".to_string()));
    }

    let usage: f32 = cpus.iter().map(|c| c.cpu_usage()).sum::<f32>() / cpus.len() as f32;
    let frequency_mhz = cpus
        .first()
        .map(|c| c.frequency())
        .filter(|f| *f > 0)
        .map(|f| f as f64);

    let temperature_c = pick_cpu_temperature(
        system
            .components()
            .iter()
            .map(|c| (c.label().to_string(), c.temperature() as f64)),
    );

    Ok(CpuStat {
        usage_percent: usage as f64,
        temperature_c,
        frequency_mhz,
        logical_cores: cpus.len() as u32,
    })
}

/// Picks the most plausible package temperature out of the sensor list.
/// Prefers sensors carrying a CPU marker in their label; falls back to the
/// hottest non-GPU sensor when none match.
fn pick_cpu_temperature(readings: impl Iterator<Item = (String, f64)>) -> Option<f64> {
    const CPU_MARKERS: [&str; 6] = ["cpu", "package", "tctl", "tdie", "coretemp", "k10temp"];
    const GPU_MARKERS: [&str; 4] = ["gpu", "nvidia", "amdgpu", "radeon"];

    let readings: Vec<(String, f64)> = readings
        .filter(|(_, temp)| (0.0..=130.0).contains(temp) && *temp > 0.0)
        .map(|(label, temp)| (label.to_lowercase(), temp))
        .collect();

    let primary = readings
        .iter()
        .filter(|(label, _)| {
            CPU_MARKERS.iter().any(|m| label.contains(m))
                && !GPU_MARKERS.iter().any(|m| label.contains(m))
        })
        .map(|(_, temp)| *temp)
        .max_by(|a, b| a.total_cmp(b));
    if primary.is_some() {
        return primary;
    }

    readings
        .iter()
        .filter(|(label, _)| !GPU_MARKERS.iter().any(|m| label.contains(m)))
        .map(|(_, temp)| *temp)
        .max_by(|a, b| a.total_cmp(b))
}
