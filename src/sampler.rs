use std::sync::Arc;
use std::time::Duration;

use sysinfo::{System, SystemExt};
use thiserror::Error;
use tokio::sync::{watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use crate::collectors::disk::DiskAdapter;
use crate::collectors::gpu::GpuAdapter;
use crate::collectors::network::NetworkAdapter;
use crate::collectors::{cpu, host, memory, process, AdapterError};
use crate::config::SamplerOptions;
use crate::events::{EventBus, MonitorEvent, StatsUpdate, TrackingComplete};
use crate::session::TrackingManager;
use crate::snapshot::{self, CpuStat, DiskStat, GpuStat, MemoryStat, NetworkStat, ResourceSnapshot};

pub type SharedLatest = Arc<RwLock<Option<Arc<ResourceSnapshot>>>>;

#[derive(Debug, Error)]
pub enum SamplerError {
    #[error("sampler already running")]
    AlreadyRunning,
}

pub struct Sampler {
    interval: Duration,
    options: SamplerOptions,
    running: Mutex<Option<Running>>,
}

struct Running {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl Sampler {
    pub fn new(interval: Duration, options: SamplerOptions) -> Self {
        Self {
            interval,
            options,
            running: Mutex::new(None),
        }
    }

    pub async fn start(
        &self,
        session: Arc<TrackingManager>,
        bus: EventBus,
        latest: SharedLatest,
    ) -> Result<(), SamplerError> {
        let mut running = self.running.lock().await;
        if running.is_some() {
            return Err(SamplerError::AlreadyRunning);
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(run_loop(
            self.interval,
            self.options.clone(),
            session,
            bus,
            latest,
            shutdown_rx,
        ));
        *running = Some(Running {
            shutdown: shutdown_tx,
            task,
        });
        Ok(())
    }

    /// Returns false when no loop was running.
    pub async fn stop(&self) -> bool {
        let mut running = self.running.lock().await;
        let Some(current) = running.take() else {
            return false;
        };

        let _ = current.shutdown.send(true);
        let _ = current.task.await;
        true
    }

    pub async fn is_running(&self) -> bool {
        self.running.lock().await.is_some()
    }
}

async fn run_loop(
    interval: Duration,
    options: SamplerOptions,
    session: Arc<TrackingManager>,
    bus: EventBus,
    latest: SharedLatest,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut assembler = SnapshotAssembler::new(&options);
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    info!(interval_secs = interval.as_secs(), "sampler started");

    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                info!("sampler stopping");
                break;
            }
            _ = ticker.tick() => {
                let snapshot = Arc::new(assembler.assemble().await);
                *latest.write().await = Some(snapshot.clone());

                let completion = session.on_snapshot(snapshot.clone()).await;
                let tracking = session.status().await;
                bus.publish(MonitorEvent::StatsUpdate(StatsUpdate { snapshot, tracking }));

                if let Some(done) = completion {
                    info!(data_points = done.data_points, "tracking window elapsed");
                    bus.publish(MonitorEvent::TrackingComplete(TrackingComplete::elapsed(
                        session.duration_limit(),
                        done.data_points,
                    )));
                }
            }
        }
    }
}

/// Per-class fallback: a failing adapter serves its last good value for a
/// bounded number of ticks, then decays to defaults so stale data cannot
/// impersonate a live reading indefinitely.
struct Degrade<T: Clone> {
    last: Option<T>,
    failures: u32,
}

impl<T: Clone> Degrade<T> {
    fn new() -> Self {
        Self {
            last: None,
            failures: 0,
        }
    }

    fn resolve(
        &mut self,
        result: Result<T, AdapterError>,
        default: T,
        limit: u32,
        class: &'static str,
    ) -> T {
        match result {
            Ok(value) => {
                self.failures = 0;
                self.last = Some(value.clone());
                value
            }
            Err(err) => {
                self.failures = self.failures.saturating_add(1);
                warn!(class, error = %err, failures = self.failures, "adapter degraded");
                if self.failures < limit {
                    self.last.clone().unwrap_or(default)
                } else {
                    default
                }
            }
        }
    }
}

struct SnapshotAssembler {
    system: System,
    disk: DiskAdapter,
    network: NetworkAdapter,
    gpu: GpuAdapter,
    top_processes: usize,
    degrade_after: u32,
    cpu_fallback: Degrade<CpuStat>,
    memory_fallback: Degrade<MemoryStat>,
    gpu_fallback: Degrade<Vec<GpuStat>>,
    disk_fallback: Degrade<DiskStat>,
    network_fallback: Degrade<NetworkStat>,
}

impl SnapshotAssembler {
    fn new(options: &SamplerOptions) -> Self {
        Self {
            system: System::new_all(),
            disk: DiskAdapter::new(),
            network: NetworkAdapter::new(),
            gpu: GpuAdapter::new(Duration::from_millis(options.gpu_timeout_ms)),
            top_processes: options.top_processes,
            degrade_after: options.degrade_after_failures,
            cpu_fallback: Degrade::new(),
            memory_fallback: Degrade::new(),
            gpu_fallback: Degrade::new(),
            disk_fallback: Degrade::new(),
            network_fallback: Degrade::new(),
        }
    }

    async fn assemble(&mut self) -> ResourceSnapshot {
        self.refresh();
        let (timestamp, timestamp_unix) = snapshot::wall_clock();

        let cpu_sample = cpu::sample(&self.system);
        let cpu = self
            .cpu_fallback
            .resolve(cpu_sample, CpuStat::default(), self.degrade_after, "cpu");

        let memory_sample = memory::sample(&self.system);
        let memory = self.memory_fallback.resolve(
            memory_sample,
            MemoryStat::default(),
            self.degrade_after,
            "memory",
        );

        let disk_sample = self.disk.sample(&self.system);
        let disk = self.disk_fallback.resolve(
            disk_sample,
            DiskStat::default(),
            self.degrade_after,
            "disk",
        );

        let network_sample = self.network.sample(&self.system);
        let network = self.network_fallback.resolve(
            network_sample,
            NetworkStat::default(),
            self.degrade_after,
            "network",
        );

        let gpu_sample = self.gpu.sample().await;
        let gpu = self
            .gpu_fallback
            .resolve(gpu_sample, Vec::new(), self.degrade_after, "gpu");

        let processes = process::sample(&self.system, self.top_processes);
        let system = host::sample(&self.system);

        let mut assembled = ResourceSnapshot {
            timestamp,
            timestamp_unix,
            cpu,
            memory,
            gpu,
            disk,
            network,
            processes,
            system,
        };
        assembled.normalize();
        assembled
    }

    fn refresh(&mut self) {
        self.system.refresh_cpu();
        self.system.refresh_memory();
        self.system.refresh_processes();
        self.system.refresh_disks_list();
        self.system.refresh_disks();
        self.system.refresh_networks_list();
        self.system.refresh_networks();
        self.system.refresh_components_list();
        self.system.refresh_components();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> SamplerOptions {
        SamplerOptions::default()
    }

    #[tokio::test]
    async fn start_is_idempotent_and_stop_halts_the_loop() {
        let sampler = Sampler::new(Duration::from_secs(60), options());
        let session = Arc::new(TrackingManager::new(Duration::from_secs(300)));
        let bus = EventBus::new(8);
        let latest: SharedLatest = Arc::new(RwLock::new(None));

        sampler
            .start(session.clone(), bus.clone(), latest.clone())
            .await
            .expect("first start");
        assert!(sampler.is_running().await);

        let err = sampler
            .start(session, bus, latest)
            .await
            .expect_err("second start");
        assert!(matches!(err, SamplerError::AlreadyRunning));

        assert!(sampler.stop().await);
        assert!(!sampler.is_running().await);
        assert!(!sampler.stop().await);
    }

    #[tokio::test]
    async fn assembled_snapshot_honors_value_invariants() {
        let mut assembler = SnapshotAssembler::new(&options());
        let snapshot = assembler.assemble().await;

        assert!((0.0..=100.0).contains(&snapshot.cpu.usage_percent));
        assert!((0.0..=100.0).contains(&snapshot.memory.usage_percent));
        assert!(snapshot.disk.read_speed_mbps >= 0.0);
        assert!(snapshot.disk.write_speed_mbps >= 0.0);
        assert!(snapshot.network.upload_speed_kbps >= 0.0);
        assert!(snapshot.network.download_speed_kbps >= 0.0);
        for partition in &snapshot.disk.partitions {
            assert!((0.0..=100.0).contains(&partition.usage_percent));
        }
        for process in &snapshot.processes {
            assert!((0.0..=100.0).contains(&process.cpu_percent));
        }
        assert!(!snapshot.timestamp.is_empty());
        assert!(snapshot.timestamp_unix > 0);
    }

    #[test]
    fn degrade_serves_last_known_value_then_defaults() {
        let mut fallback: Degrade<CpuStat> = Degrade::new();
        let good = CpuStat {
            usage_percent: 42.0,
            logical_cores: 8,
            ..CpuStat::default()
        };

        let resolved = fallback.resolve(Ok(good.clone()), CpuStat::default(), 3, "cpu");
        assert_eq!(resolved.usage_percent, 42.0);

        // first two failures reuse the stale value
        for _ in 0..2 {
            let resolved = fallback.resolve(
                Err(AdapterError::Unavailable("boom".to_string())),
                CpuStat::default(),
                3,
                "cpu",
            );
            assert_eq!(resolved.usage_percent, 42.0);
        }

        // the third consecutive failure decays to defaults
        let resolved = fallback.resolve(
            Err(AdapterError::Unavailable("boom".to_string())),
            CpuStat::default(),
            3,
            "cpu",
        );
        assert_eq!(resolved.usage_percent, 0.0);
        assert_eq!(resolved.logical_cores, 0);

        // recovery resets the failure streak
        let resolved = fallback.resolve(Ok(good), CpuStat::default(), 3, "cpu");
        assert_eq!(resolved.usage_percent, 42.0);
        assert_eq!(fallback.failures, 0);
    }

    #[tokio::test]
    async fn ticks_reach_the_session_and_the_bus() {
        let sampler = Sampler::new(Duration::from_millis(20), options());
        let session = Arc::new(TrackingManager::new(Duration::from_secs(300)));
        let bus = EventBus::new(32);
        let latest: SharedLatest = Arc::new(RwLock::new(None));
        let mut rx = bus.subscribe();

        session.start_tracking().await.expect("start tracking");
        sampler
            .start(session.clone(), bus.clone(), latest.clone())
            .await
            .expect("start sampler");

        let event = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("tick within deadline")
            .expect("event");
        match event {
            MonitorEvent::StatsUpdate(update) => assert!(update.tracking.is_tracking),
            other => panic!("unexpected event: {other:?}"),
        }

        sampler.stop().await;
        assert!(latest.read().await.is_some());
        assert!(session.status().await.data_points >= 1);
    }
}
