//! Shared data types for the fair-share scheduling core.
//!
//! These are the types that flow between the policy server and the
//! fairness controller across the actor boundary; nothing here is
//! owned by more than one actor at a time.

use std::collections::HashSet;
use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque handle uniquely identifying a live job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct JobId(pub Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Point-in-time resource usage reported by a job's external process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobStats {
    pub pending_tasks: u64,
    pub running_tasks: u64,
}

/// External collaborator a job exposes so the controller can poll it.
///
/// Implemented by whatever actually owns the job's process/actor; this
/// crate never constructs one, it only calls `get_stats` under a
/// bounded deadline.
#[async_trait]
pub trait JobHandle: Send + Sync {
    async fn get_stats(&self) -> anyhow::Result<JobStats>;
}

/// One entry in the job registry.
///
/// `priority` and `bias` are kept separate per spec: `bias` is an
/// intra-interval correction reset by every controller revision, while
/// `priority` is the controller's last EMA-smoothed value. The value
/// actually used for queue ordering is `priority + bias` (the
/// "projected priority").
pub struct JobRecord {
    pub id: JobId,
    pub name: String,
    pub priority: f64,
    pub bias: f64,
    pub cputime: u64,
    pub handle: std::sync::Arc<dyn JobHandle>,
}

impl JobRecord {
    pub fn projected_priority(&self) -> f64 {
        self.priority + self.bias
    }
}

impl Clone for JobRecord {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            name: self.name.clone(),
            priority: self.priority,
            bias: self.bias,
            cputime: self.cputime,
            handle: self.handle.clone(),
        }
    }
}

impl fmt::Debug for JobRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobRecord")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("priority", &self.priority)
            .field("bias", &self.bias)
            .field("cputime", &self.cputime)
            .finish_non_exhaustive()
    }
}

/// A cluster node's reported core capacity, from `update_topology`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopologyNode {
    pub cores: u64,
}

/// Result of `next_job`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulingDecision {
    NoJobs,
    Selected(JobId),
}

/// A priority revision produced by one fairness-controller tick for a
/// single responsive job.
#[derive(Debug, Clone)]
pub struct PriorityRevision {
    pub id: JobId,
    pub priority: f64,
    pub bias: f64,
    pub cputime: u64,
}

/// A coherent, read-only copy of the registry, returned by
/// `snapshot_registry`.
#[derive(Debug, Clone)]
pub struct RegistrySnapshot {
    pub jobs: Vec<SnapshotEntry>,
    pub total_cores: u64,
}

#[derive(Debug, Clone)]
pub struct SnapshotEntry {
    pub id: JobId,
    pub name: String,
    pub priority: f64,
    pub bias: f64,
    pub cputime: u64,
    pub handle: std::sync::Arc<dyn JobHandle>,
}

pub type ExcludeSet = HashSet<JobId>;
