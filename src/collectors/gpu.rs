use std::time::Duration;

use crate::collectors::{AdapterError, AdapterResult};
use crate::snapshot::GpuStat;
use tokio::process::Command;

/// Probes GPUs through nvidia-smi. A host without the tool or without any
/// device reports an empty list; only a hung or failed probe is an error.
pub struct GpuAdapter {
    timeout: Duration,
}

impl GpuAdapter {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub async fn sample(&self) -> AdapterResult<Vec<GpuStat>> {
        let output = match tokio::time::timeout(self.timeout, run_nvidia_smi()).await {
            Ok(Some(output)) => output,
            Ok(None) => return Ok(Vec::new()),
            Err(_elapsed) => return Err(AdapterError::Timeout(self.timeout)),
        };

        if !output.status.success() {
            // tool present but no usable device
            return Ok(Vec::new());
        }

        let text = String::from_utf8(output.stdout)
            .map_err(|_| AdapterError::Unavailable("non-utf8 nvidia-smi output".to_string()))?;
        Ok(parse_query_output(&text))
    }
}

async fn run_nvidia_smi() -> Option<std::process::Output> {
    Command::new("nvidia-smi")
        .args([
            "--query-gpu=name,utilization.gpu,memory.used,memory.total,temperature.gpu",
            "--format=csv,noheader,nounits",
        ])
        .kill_on_drop(true)
        .output()
        .await
        .ok()
}

fn parse_query_output(text: &str) -> Vec<GpuStat> {
    text.lines()
        .filter_map(|line| {
            let parts: Vec<&str> = line.split(',').map(str::trim).collect();
            if parts.len() < 5 {
                return None;
            }

            let memory_used_mb = parse_f64_loose(parts[2]).unwrap_or(0.0).max(0.0);
            let memory_total_mb = parse_f64_loose(parts[3]).unwrap_or(0.0).max(0.0);
            let memory_percent = if memory_total_mb > 0.0 {
                memory_used_mb / memory_total_mb * 100.0
            } else {
                0.0
            };

            Some(GpuStat {
                name: parts[0].to_string(),
                load_percent: parse_f64_loose(parts[1]).unwrap_or(0.0),
                temperature_c: parse_f64_loose(parts[4]).filter(|v| *v > 0.0),
                memory_used_mb,
                memory_total_mb,
                memory_percent,
            })
        })
        .collect()
}

fn parse_f64_loose(input: &str) -> Option<f64> {
    let trimmed = input.trim();
    if let Ok(v) = trimmed.parse::<f64>() {
        return Some(v);
    }

    // some driver locales print a comma decimal separator
    trimmed.replace(',', ".").parse::<f64>().ok()
}
