use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{RwLock, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::config::SchedulerConfig;
use crate::monitor::{AssetMonitor, CheckReport};
use crate::utils::error::{AppError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SchedulerState {
    Idle,
    Checking,
}

/// What happened to a manual "check now" request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOutcome {
    /// A check will run as soon as the scheduler is idle.
    Queued,
    /// A check is already pending; this request was merged into it.
    Coalesced,
    /// The scheduler has shut down.
    Stopped,
}

#[derive(Debug, Clone, Copy)]
enum Trigger {
    Warmup,
    Timer,
    Manual,
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Trigger::Warmup => "warmup",
            Trigger::Timer => "timer",
            Trigger::Manual => "manual",
        })
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SchedulerStats {
    pub completed_checks: u64,
    pub coalesced_triggers: u64,
    pub last_run: Option<DateTime<Utc>>,
    pub last_new_assets: usize,
    pub last_duration_ms: u64,
}

impl SchedulerStats {
    fn record(&mut self, report: &CheckReport) {
        self.completed_checks += 1;
        self.last_run = Some(Utc::now());
        self.last_new_assets = report.new_total();
        self.last_duration_ms = report.duration_ms;
    }
}

/// Drives periodic checks on one background task.
pub struct AssetScheduler;

impl AssetScheduler {
    /// Spawn the check loop. Must be called inside a tokio runtime.
    pub fn start(monitor: Arc<AssetMonitor>, config: SchedulerConfig) -> SchedulerHandle {
        // Capacity 1: at most one pending trigger is retained.
        let (trigger_tx, trigger_rx) = mpsc::channel(1);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (state_tx, state_rx) = watch::channel(SchedulerState::Idle);
        let stats = Arc::new(RwLock::new(SchedulerStats::default()));

        let worker = Worker {
            monitor,
            config,
            triggers: trigger_rx,
            shutdown: shutdown_rx,
            state: state_tx,
            stats: Arc::clone(&stats),
        };
        let task = tokio::spawn(worker.run());

        tracing::info!("Asset scheduler started");
        SchedulerHandle {
            triggers: trigger_tx,
            shutdown: shutdown_tx,
            state: state_rx,
            stats,
            coalesced: Arc::new(AtomicU64::new(0)),
            task,
        }
    }
}

pub struct SchedulerHandle {
    triggers: mpsc::Sender<Trigger>,
    shutdown: watch::Sender<bool>,
    state: watch::Receiver<SchedulerState>,
    stats: Arc<RwLock<SchedulerStats>>,
    coalesced: Arc<AtomicU64>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Request a check without waiting for it.
    pub fn check_now(&self) -> TriggerOutcome {
        match self.triggers.try_send(Trigger::Manual) {
            Ok(()) => TriggerOutcome::Queued,
            Err(TrySendError::Full(_)) => {
                self.coalesced.fetch_add(1, Ordering::Relaxed);
                tracing::debug!("Check already pending, coalescing request");
                TriggerOutcome::Coalesced
            }
            Err(TrySendError::Closed(_)) => TriggerOutcome::Stopped,
        }
    }

    pub fn state(&self) -> SchedulerState {
        *self.state.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<SchedulerState> {
        self.state.clone()
    }

    pub async fn stats(&self) -> SchedulerStats {
        let mut stats = self.stats.read().await.clone();
        stats.coalesced_triggers = self.coalesced.load(Ordering::Relaxed);
        stats
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Signal the loop to stop without waiting for it.
    pub fn request_shutdown(&self) {
        self.shutdown.send_replace(true);
    }

    /// Stop the loop, abandoning any in-flight check, and wait for the final
    /// state flush.
    pub async fn shutdown(self) -> Result<()> {
        self.request_shutdown();
        self.task
            .await
            .map_err(|e| AppError::Internal(format!("Scheduler task failed: {}", e)))
    }
}

struct Worker {
    monitor: Arc<AssetMonitor>,
    config: SchedulerConfig,
    triggers: mpsc::Receiver<Trigger>,
    shutdown: watch::Receiver<bool>,
    state: watch::Sender<SchedulerState>,
    stats: Arc<RwLock<SchedulerStats>>,
}

impl Worker {
    async fn run(mut self) {
        let period = self.config.interval();
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let warmup = tokio::time::sleep(self.config.warmup_delay());
        tokio::pin!(warmup);
        let mut warmup_pending = self.config.warmup;
        let mut idle_since = Instant::now();

        loop {
            let trigger = tokio::select! {
                biased;
                _ = self.shutdown.changed() => break,
                _ = &mut warmup, if warmup_pending => {
                    warmup_pending = false;
                    Trigger::Warmup
                }
                Some(trigger) = self.triggers.recv() => trigger,
                scheduled = ticker.tick() => {
                    // Ticks that fell due during a check are dropped.
                    if scheduled < idle_since {
                        continue;
                    }
                    Trigger::Timer
                }
            };

            tracing::debug!(%trigger, "Starting check");
            self.state.send_replace(SchedulerState::Checking);
            let outcome = tokio::select! {
                biased;
                _ = self.shutdown.changed() => None,
                report = self.monitor.run_check() => Some(report),
            };
            self.state.send_replace(SchedulerState::Idle);
            idle_since = Instant::now();

            match outcome {
                Some(report) => self.stats.write().await.record(&report),
                None => {
                    tracing::info!("Shutdown requested, abandoning in-flight check");
                    break;
                }
            }
        }

        self.monitor.persist().await;
        self.monitor.notifiers().shutdown().await;
        tracing::info!("Asset scheduler stopped");
    }
}
