//! Lightweight, tracing-backed observability for the scheduling core.
//!
//! No push-based metrics backend is wired here — a metrics exporter is
//! out of scope for this crate — but the same structured-logging
//! convention used elsewhere in this codebase (named fields on a
//! single `tracing` event rather than scattered string interpolation)
//! applies to the controller's per-tick summary.

use tracing::debug;

use crate::controller::fairness::Revision;
use crate::models::RegistrySnapshot;

/// Derives simple point-in-time counters from a registry snapshot and
/// this tick's revisions, and logs them as one structured event.
pub fn log_tick_summary(snapshot: &RegistrySnapshot, revisions: &[Revision], unresponsive: usize) {
    let queue_depth = snapshot.jobs.len();
    let total_cputime: u64 = snapshot.jobs.iter().map(|j| j.cputime).sum();

    let (min_priority, max_priority, mean_priority) = priority_bounds(snapshot);

    debug!(
        queue_depth,
        total_cores = snapshot.total_cores,
        responsive = revisions.len(),
        unresponsive,
        total_cputime,
        min_priority,
        max_priority,
        mean_priority,
        "fairness controller tick summary"
    );
}

fn priority_bounds(snapshot: &RegistrySnapshot) -> (f64, f64, f64) {
    if snapshot.jobs.is_empty() {
        return (0.0, 0.0, 0.0);
    }
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    let mut sum = 0.0;
    for job in &snapshot.jobs {
        let projected = job.priority + job.bias;
        min = min.min(projected);
        max = max.max(projected);
        sum += projected;
    }
    (min, max, sum / snapshot.jobs.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{JobHandle, JobStats, SnapshotEntry};
    use async_trait::async_trait;
    use std::sync::Arc;

    struct NullHandle;

    #[async_trait]
    impl JobHandle for NullHandle {
        async fn get_stats(&self) -> anyhow::Result<JobStats> {
            Ok(JobStats {
                pending_tasks: 0,
                running_tasks: 0,
            })
        }
    }

    fn entry(id: crate::models::JobId, priority: f64) -> SnapshotEntry {
        SnapshotEntry {
            id,
            name: "job".to_string(),
            priority,
            bias: 0.0,
            cputime: 0,
            handle: Arc::new(NullHandle),
        }
    }

    #[test]
    fn bounds_over_empty_snapshot_are_zero() {
        let snap = RegistrySnapshot {
            jobs: vec![],
            total_cores: 4,
        };
        assert_eq!(priority_bounds(&snap), (0.0, 0.0, 0.0));
    }

    #[test]
    fn bounds_reflect_min_max_mean() {
        let snap = RegistrySnapshot {
            jobs: vec![
                entry(crate::models::JobId::new(), -1.0),
                entry(crate::models::JobId::new(), 1.0),
            ],
            total_cores: 4,
        };
        let (min, max, mean) = priority_bounds(&snap);
        assert_eq!(min, -1.0);
        assert_eq!(max, 1.0);
        assert_eq!(mean, 0.0);
    }
}
