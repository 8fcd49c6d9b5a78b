//! Pure fairness math: share redistribution and EMA priority revision.
//!
//! Kept free of any I/O or actor plumbing so the numeric properties in
//! spec §8 can be tested directly against plain values.

use crate::models::JobId;

/// One job's observation for a single controller tick.
#[derive(Debug, Clone, Copy)]
pub struct Observation {
    pub id: JobId,
    pub pending_tasks: u64,
    pub running_tasks: u64,
    pub old_priority: f64,
    pub old_cputime: u64,
}

/// Output of the per-tick fairness computation for one responsive job.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Revision {
    pub id: JobId,
    pub new_priority: f64,
    pub new_cputime: u64,
}

/// Implements spec §4.2 steps 6-11 over a batch of responsive jobs for
/// one tick. `total_cores` must be non-zero; callers skip the tick
/// entirely when it's zero (step 2).
pub fn compute_revisions(observations: &[Observation], total_cores: u64, alpha: f64) -> Vec<Revision> {
    debug_assert!(total_cores > 0, "caller must skip the tick when total_cores == 0");
    debug_assert!(alpha > 0.0 && alpha <= 1.0, "alpha must be in (0, 1]");

    let n = observations.len();
    if n == 0 {
        return Vec::new();
    }

    let share = total_cores as f64 / n.max(1) as f64;

    // donors: pending < share, each donates (share - pending).
    // needy: everyone else.
    let mut donated = 0.0;
    let mut needy_count = 0usize;
    for obs in observations {
        if (obs.pending_tasks as f64) < share {
            donated += share - obs.pending_tasks as f64;
        } else {
            needy_count += 1;
        }
    }
    let extra_share = if needy_count > 0 {
        donated / needy_count as f64
    } else {
        0.0
    };

    observations
        .iter()
        .map(|obs| {
            let my_share = if (obs.pending_tasks as f64) < share {
                obs.pending_tasks as f64
            } else {
                share + extra_share
            };
            let deficit = (obs.running_tasks as f64 - my_share) / total_cores as f64;
            let new_priority = alpha * deficit + (1.0 - alpha) * obs.old_priority;
            Revision {
                id: obs.id,
                new_priority,
                new_cputime: obs.old_cputime + obs.running_tasks,
            }
        })
        .collect()
}
