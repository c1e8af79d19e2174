use std::sync::Arc;

use thiserror::Error;

use crate::session::SessionExport;
use crate::snapshot::{round2, ResourceSnapshot};

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("no completed tracking data to report")]
    EmptySession,
}

#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct MetricStats {
    pub min: f64,
    pub max: f64,
    pub avg: f64,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct GpuReport {
    pub load_percent: MetricStats,
    pub temperature_c: MetricStats,
    pub memory_percent: MetricStats,
}

/// Read-only projection of a completed session: summary statistics per
/// metric plus the raw snapshots in capture order, ready for a renderer.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ReportData {
    pub started_at_unix: i64,
    pub ended_at_unix: i64,
    pub data_points: usize,
    pub cpu_usage_percent: MetricStats,
    pub cpu_temperature_c: MetricStats,
    pub memory_usage_percent: MetricStats,
    pub memory_used_gb: MetricStats,
    pub upload_speed_kbps: MetricStats,
    pub download_speed_kbps: MetricStats,
    pub disk_read_speed_mbps: MetricStats,
    pub disk_write_speed_mbps: MetricStats,
    pub gpu: Option<GpuReport>,
    pub snapshots: Vec<Arc<ResourceSnapshot>>,
}

pub fn build(export: &SessionExport) -> Result<ReportData, ReportError> {
    if export.snapshots.is_empty() {
        return Err(ReportError::EmptySession);
    }

    let series = |f: fn(&ResourceSnapshot) -> f64| -> Vec<f64> {
        export.snapshots.iter().map(|s| f(s)).collect()
    };

    // unreadable sensors report zero; keep them out of the temperature stats
    let temperatures: Vec<f64> = export
        .snapshots
        .iter()
        .filter_map(|s| s.cpu.temperature_c)
        .filter(|t| *t > 0.0)
        .collect();

    let saw_gpu = export.snapshots.iter().any(|s| !s.gpu.is_empty());
    let gpu = saw_gpu.then(|| {
        let first_gpu = |f: fn(&crate::snapshot::GpuStat) -> f64| -> Vec<f64> {
            export
                .snapshots
                .iter()
                .filter_map(|s| s.gpu.first())
                .map(f)
                .collect()
        };
        GpuReport {
            load_percent: stats(&first_gpu(|g| g.load_percent)),
            temperature_c: stats(
                &export
                    .snapshots
                    .iter()
                    .filter_map(|s| s.gpu.first())
                    .filter_map(|g| g.temperature_c)
                    .filter(|t| *t > 0.0)
                    .collect::<Vec<f64>>(),
            ),
            memory_percent: stats(&first_gpu(|g| g.memory_percent)),
        }
    });

    Ok(ReportData {
        started_at_unix: export.started_at_unix,
        ended_at_unix: export.ended_at_unix,
        data_points: export.snapshots.len(),
        cpu_usage_percent: stats(&series(|s| s.cpu.usage_percent)),
        cpu_temperature_c: stats(&temperatures),
        memory_usage_percent: stats(&series(|s| s.memory.usage_percent)),
        memory_used_gb: stats(&series(|s| s.memory.used_gb)),
        upload_speed_kbps: stats(&series(|s| s.network.upload_speed_kbps)),
        download_speed_kbps: stats(&series(|s| s.network.download_speed_kbps)),
        disk_read_speed_mbps: stats(&series(|s| s.disk.read_speed_mbps)),
        disk_write_speed_mbps: stats(&series(|s| s.disk.write_speed_mbps)),
        gpu,
        snapshots: export.snapshots.clone(),
    })
}

fn stats(values: &[f64]) -> MetricStats {
    if values.is_empty() {
        return MetricStats {
            min: 0.0,
            max: 0.0,
            avg: 0.0,
        };
    }

    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    let mut sum = 0.0;
    for &value in values {
        min = min.min(value);
        max = max.max(value);
        sum += value;
    }

    MetricStats {
        min: round2(min),
        max: round2(max),
        avg: round2(sum / values.len() as f64),
    }
}
