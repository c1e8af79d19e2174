use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct ResourceSnapshot {
    pub timestamp: String,
    pub timestamp_unix: i64,
    pub cpu: CpuStat,
    pub memory: MemoryStat,
    pub gpu: Vec<GpuStat>,
    pub disk: DiskStat,
    pub network: NetworkStat,
    pub processes: Vec<ProcessStat>,
    pub system: SystemStat,
}

#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct CpuStat {
    pub usage_percent: f64,
    pub temperature_c: Option<f64>,
    pub frequency_mhz: Option<f64>,
    pub logical_cores: u32,
}

#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct MemoryStat {
    pub usage_percent: f64,
    pub used_gb: f64,
    pub total_gb: f64,
    pub available_gb: f64,
    pub swap_percent: f64,
}

#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct GpuStat {
    pub name: String,
    pub load_percent: f64,
    pub temperature_c: Option<f64>,
    pub memory_used_mb: f64,
    pub memory_total_mb: f64,
    pub memory_percent: f64,
}

#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct DiskStat {
    pub read_speed_mbps: f64,
    pub write_speed_mbps: f64,
    pub partitions: Vec<PartitionStat>,
}

#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct PartitionStat {
    pub device: String,
    pub used_gb: f64,
    pub total_gb: f64,
    pub usage_percent: f64,
}

#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct NetworkStat {
    pub upload_speed_kbps: f64,
    pub download_speed_kbps: f64,
    pub total_sent_gb: f64,
    pub total_recv_gb: f64,
}

#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct ProcessStat {
    pub name: String,
    pub cpu_percent: f64,
    pub memory_percent: f64,
}

#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct SystemStat {
    pub host_name: Option<String>,
    pub os_name: Option<String>,
    pub uptime_hours: f64,
}

impl ResourceSnapshot {
    /// Enforces the value invariants before the snapshot leaves the sampler:
    /// percent fields stay in 0..=100, speeds and sizes stay non-negative.
    pub fn normalize(&mut self) {
        self.cpu.usage_percent = clamp_percent(self.cpu.usage_percent);

        self.memory.usage_percent = clamp_percent(self.memory.usage_percent);
        self.memory.swap_percent = clamp_percent(self.memory.swap_percent);
        self.memory.used_gb = non_negative(self.memory.used_gb);
        self.memory.total_gb = non_negative(self.memory.total_gb);
        self.memory.available_gb = non_negative(self.memory.available_gb);

        for gpu in &mut self.gpu {
            gpu.load_percent = clamp_percent(gpu.load_percent);
            gpu.memory_percent = clamp_percent(gpu.memory_percent);
            gpu.memory_used_mb = non_negative(gpu.memory_used_mb);
            gpu.memory_total_mb = non_negative(gpu.memory_total_mb);
        }

        self.disk.read_speed_mbps = non_negative(self.disk.read_speed_mbps);
        self.disk.write_speed_mbps = non_negative(self.disk.write_speed_mbps);
        for partition in &mut self.disk.partitions {
            partition.usage_percent = clamp_percent(partition.usage_percent);
            partition.used_gb = non_negative(partition.used_gb);
            partition.total_gb = non_negative(partition.total_gb);
        }

        self.network.upload_speed_kbps = non_negative(self.network.upload_speed_kbps);
        self.network.download_speed_kbps = non_negative(self.network.download_speed_kbps);
        self.network.total_sent_gb = non_negative(self.network.total_sent_gb);
        self.network.total_recv_gb = non_negative(self.network.total_recv_gb);

        for process in &mut self.processes {
            process.cpu_percent = clamp_percent(process.cpu_percent);
            process.memory_percent = clamp_percent(process.memory_percent);
        }

        self.system.uptime_hours = non_negative(self.system.uptime_hours);
    }
}

pub fn clamp_percent(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 100.0)
    } else {
        0.0
    }
}

pub fn non_negative(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub fn bytes_to_gb(bytes: u64) -> f64 {
    round2(bytes as f64 / 1024.0 / 1024.0 / 1024.0)
}

pub fn now_unix() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

pub fn wall_clock() -> (String, i64) {
    let now = SystemTime::now();
    let unix = now
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0);
    (humantime::format_rfc3339_seconds(now).to_string(), unix)
}
