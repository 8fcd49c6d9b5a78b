//! The fairness controller: a periodic background loop that polls job
//! stats, recomputes fair shares, and writes back priority revisions.
//!
//! Structured the way this codebase structures its other periodic
//! background loop (`ingestor::scheduler::SchedulerService`): an owned
//! `run(self)` that loops forever on an interval tick, with all
//! fallible steps logged and swallowed rather than propagated out of
//! the loop. Unlike that loop, there is only one wakeup source here, so
//! a bare `loop { ticker.tick().await; ... }` replaces its
//! `tokio::select!` over multiple branches.

pub mod fairness;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::interval;
use tracing::{debug, info, trace, warn};

use crate::config::Config;
use crate::error::ControllerError;
use crate::metrics;
use crate::models::PriorityRevision;
use crate::policy::PolicyHandle;
use fairness::{compute_revisions, Observation};

/// Shared, hot-reloadable configuration. The controller re-reads
/// `alpha` (and the tick interval / stats timeout) from this every
/// tick, matching spec.md §6's "resolved from process-wide
/// configuration at each controller tick (permitting live updates)".
pub type SharedConfig = Arc<tokio::sync::RwLock<Config>>;

pub struct FairnessController {
    policy: PolicyHandle,
    config: SharedConfig,
    total_cores_rx: watch::Receiver<u64>,
}

impl FairnessController {
    pub fn new(policy: PolicyHandle, config: SharedConfig) -> Self {
        let total_cores_rx = policy.subscribe_total_cores();
        Self {
            policy,
            config,
            total_cores_rx,
        }
    }

    /// Runs forever. Intended to be `tokio::spawn`ed; errors from
    /// individual ticks never escape this loop (spec.md §4.2 failure
    /// semantics: "the loop continues next interval").
    pub async fn run(mut self) {
        let tick_ms = self.config.read().await.controller.tick_interval_ms;
        let mut ticker = interval(Duration::from_millis(tick_ms));
        info!(tick_interval_ms = tick_ms, "fairness controller started");

        loop {
            ticker.tick().await;
            if let Err(e) = self.tick().await {
                warn!(error = %e, "controller tick failed, continuing at next interval");
            }
        }
    }

    /// Runs one tick. Returns `Err` for the two genuinely fallible
    /// steps (bad `alpha`, failed snapshot); per spec.md §4.2/§7 this
    /// only ever terminates the current tick, never the loop — `run`
    /// logs and continues.
    async fn tick(&mut self) -> Result<(), ControllerError> {
        let (alpha, stats_timeout_ms) = {
            let cfg = self.config.read().await;
            (cfg.controller.alpha, cfg.controller.stats_timeout_ms)
        };

        if !(alpha > 0.0 && alpha <= 1.0) {
            return Err(ControllerError::InvalidAlpha { value: alpha });
        }

        let total_cores = *self.total_cores_rx.borrow();
        if total_cores == 0 {
            trace!("skipping tick: total_cores == 0");
            return Ok(());
        }

        let snapshot = self
            .policy
            .snapshot_registry()
            .await
            .map_err(|e| ControllerError::SnapshotFailed(e.to_string()))?;

        if snapshot.jobs.is_empty() {
            trace!("skipping tick: no live jobs");
            return Ok(());
        }

        let stats_timeout = Duration::from_millis(stats_timeout_ms);
        let mut observations = Vec::with_capacity(snapshot.jobs.len());
        let mut unresponsive = 0usize;

        for job in &snapshot.jobs {
            match tokio::time::timeout(stats_timeout, job.handle.get_stats()).await {
                Ok(Ok(stats)) => observations.push(Observation {
                    id: job.id,
                    pending_tasks: stats.pending_tasks,
                    running_tasks: stats.running_tasks,
                    old_priority: job.priority,
                    old_cputime: job.cputime,
                }),
                Ok(Err(e)) => {
                    unresponsive += 1;
                    debug!(job_id = %job.id, error = %e, "job stats call failed, dropping for this tick");
                }
                Err(_) => {
                    unresponsive += 1;
                    debug!(job_id = %job.id, timeout_ms = stats_timeout_ms, "job stats call timed out, dropping for this tick");
                }
            }
        }

        let revisions = compute_revisions(&observations, total_cores, alpha);
        let count = revisions.len();

        metrics::log_tick_summary(&snapshot, &revisions, unresponsive);

        let batch: Vec<PriorityRevision> = revisions
            .into_iter()
            .map(|r| PriorityRevision {
                id: r.id,
                priority: r.new_priority,
                bias: 0.0,
                cputime: r.new_cputime,
            })
            .collect();

        self.policy.apply_priority_revision(batch).await;
        debug!(responsive = count, unresponsive, total_cores, "controller tick complete");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::PolicyServer;

    #[tokio::test]
    async fn tick_rejects_out_of_range_alpha() {
        let policy = PolicyServer::spawn(4);
        let mut config = Config::default();
        config.controller.alpha = 1.5;
        let shared_config = Arc::new(tokio::sync::RwLock::new(config));
        let mut controller = FairnessController::new(policy, shared_config);

        let err = controller.tick().await.unwrap_err();
        assert!(matches!(err, ControllerError::InvalidAlpha { value } if value == 1.5));
    }
}
