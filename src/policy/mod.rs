//! The policy server: the authoritative registry + priority queue, and
//! the actor that owns them.
//!
//! All mutation of `{registry, queue, total_cores}` happens inside
//! `PolicyServer::run`, processing one `PolicyMessage` at a time from
//! an mpsc channel. `PolicyHandle` is the cloneable front door every
//! other task (the fairness controller, the external task scheduler,
//! job-lifecycle callers) uses to talk to it; nothing outside this
//! module ever touches the registry or queue directly.

pub mod queue;
pub mod registry;

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info, trace, warn};

use crate::error::PolicyError;
use crate::models::{
    JobHandle, JobId, JobRecord, PriorityRevision, RegistrySnapshot, SchedulingDecision,
    TopologyNode,
};
use queue::PriorityQueue;
use registry::JobRegistry;

/// Messages accepted by the policy server actor. See spec §6 for the
/// external message table this mirrors.
enum PolicyMessage {
    NextJob {
        exclude: HashSet<JobId>,
        reply: oneshot::Sender<SchedulingDecision>,
    },
    NewJob {
        id: JobId,
        name: String,
        handle: Arc<dyn JobHandle>,
        reply: oneshot::Sender<Result<(), PolicyError>>,
    },
    UpdateTopology {
        nodes: Vec<TopologyNode>,
    },
    ApplyPriorityRevision {
        revisions: Vec<PriorityRevision>,
    },
    SnapshotRegistry {
        reply: oneshot::Sender<RegistrySnapshot>,
    },
    JobTerminated {
        id: JobId,
    },
}

/// Owns the registry, queue, and `total_cores`. Never constructed
/// directly by callers outside this module; use `PolicyServer::spawn`.
pub struct PolicyServer {
    registry: JobRegistry,
    queue: PriorityQueue,
    total_cores: u64,
    rx: mpsc::Receiver<PolicyMessage>,
    total_cores_tx: watch::Sender<u64>,
}

impl PolicyServer {
    /// Spawn the actor task and return a handle to it.
    pub fn spawn(initial_total_cores: u64) -> PolicyHandle {
        let (tx, rx) = mpsc::channel(256);
        let (total_cores_tx, total_cores_rx) = watch::channel(initial_total_cores);

        let server = PolicyServer {
            registry: JobRegistry::new(),
            queue: PriorityQueue::new(),
            total_cores: initial_total_cores,
            rx,
            total_cores_tx,
        };

        tokio::spawn(server.run());

        PolicyHandle {
            tx,
            total_cores_rx,
        }
    }

    async fn run(mut self) {
        info!(total_cores = self.total_cores, "policy server started");
        while let Some(msg) = self.rx.recv().await {
            self.handle(msg);
        }
        info!("policy server shutting down: all handles dropped");
    }

    fn handle(&mut self, msg: PolicyMessage) {
        match msg {
            PolicyMessage::NextJob { exclude, reply } => {
                let decision = self.next_job(&exclude);
                let _ = reply.send(decision);
            }
            PolicyMessage::NewJob {
                id,
                name,
                handle,
                reply,
            } => {
                let result = self.new_job(id, name, handle);
                let _ = reply.send(result);
            }
            PolicyMessage::UpdateTopology { nodes } => self.update_topology(&nodes),
            PolicyMessage::ApplyPriorityRevision { revisions } => {
                self.apply_priority_revision(revisions)
            }
            PolicyMessage::SnapshotRegistry { reply } => {
                let _ = reply.send(self.registry.snapshot(self.total_cores));
            }
            PolicyMessage::JobTerminated { id } => self.job_terminated(id),
        }
    }

    /// Critical path: §4.1 `next_job`.
    fn next_job(&mut self, exclude: &HashSet<JobId>) -> SchedulingDecision {
        if self.registry.is_empty() || self.total_cores == 0 {
            return SchedulingDecision::NoJobs;
        }
        match self.queue.first_not_excluded(exclude) {
            None => SchedulingDecision::NoJobs,
            Some(id) => {
                self.apply_bias_step(id);
                trace!(job_id = %id, "next_job selected");
                SchedulingDecision::Selected(id)
            }
        }
    }

    /// The optimistic bias step applied to the job `next_job` just
    /// picked: nudges it toward the back of the queue so it is not
    /// handed out repeatedly before the controller's next revision.
    fn apply_bias_step(&mut self, id: JobId) {
        let delta = 1.0 / self.total_cores as f64;
        if let Some(record) = self.registry.get_mut(id) {
            record.bias += delta;
            let projected = record.projected_priority();
            self.queue.reposition(id, projected);
        }
    }

    fn new_job(
        &mut self,
        id: JobId,
        name: String,
        handle: Arc<dyn JobHandle>,
    ) -> Result<(), PolicyError> {
        if self.registry.contains(id) {
            return Err(PolicyError::DuplicateJob { id: id.to_string() });
        }
        // Divisor counts the job being inserted, i.e. the registry size
        // it will have right after this insert, not before.
        let initial_priority = -1.0 / ((self.registry.len() + 1).max(1) as f64);
        let record = JobRecord {
            id,
            name: name.clone(),
            priority: initial_priority,
            bias: 0.0,
            cputime: 0,
            handle,
        };
        self.registry.insert(record);
        self.queue.insert(initial_priority, id);
        debug!(job_id = %id, name, initial_priority, "job registered");
        Ok(())
    }

    fn update_topology(&mut self, nodes: &[TopologyNode]) {
        self.total_cores = nodes.iter().map(|n| n.cores).sum();
        info!(total_cores = self.total_cores, nodes = nodes.len(), "topology updated");
        // Notify the fairness controller. Ignore send errors: no
        // subscriber simply means nobody cares yet.
        let _ = self.total_cores_tx.send(self.total_cores);
    }

    fn apply_priority_revision(&mut self, revisions: Vec<PriorityRevision>) {
        let mut applied = 0usize;
        let mut dropped = 0usize;
        for rev in revisions {
            if let Some(record) = self.registry.get_mut(rev.id) {
                record.priority = rev.priority;
                record.bias = rev.bias;
                record.cputime = rev.cputime;
                applied += 1;
            } else {
                // Job terminated between the controller's snapshot and
                // this write-back; silently drop per spec.
                dropped += 1;
            }
        }
        self.rebuild_queue();
        debug!(applied, dropped, "priority revision applied");
    }

    fn rebuild_queue(&mut self) {
        let mut rebuilt = PriorityQueue::new();
        for id in self.registry.ids().collect::<Vec<_>>() {
            if let Some(record) = self.registry.get(id) {
                rebuilt.insert(record.projected_priority(), id);
            }
        }
        self.queue = rebuilt;
    }

    fn job_terminated(&mut self, id: JobId) {
        if self.registry.remove(id).is_some() {
            self.queue.remove(id);
            info!(job_id = %id, "job terminated, removed from registry");
        } else {
            warn!(job_id = %id, "job_terminated for unknown or already-removed job");
        }
    }
}

/// Cloneable front door to a running `PolicyServer`.
#[derive(Clone)]
pub struct PolicyHandle {
    tx: mpsc::Sender<PolicyMessage>,
    total_cores_rx: watch::Receiver<u64>,
}

impl PolicyHandle {
    /// Critical path. Never fails; a dead server is reported as `NoJobs`.
    pub async fn next_job(&self, exclude: HashSet<JobId>) -> SchedulingDecision {
        let (reply_tx, reply_rx) = oneshot::channel();
        if self
            .tx
            .send(PolicyMessage::NextJob {
                exclude,
                reply: reply_tx,
            })
            .await
            .is_err()
        {
            return SchedulingDecision::NoJobs;
        }
        reply_rx.await.unwrap_or(SchedulingDecision::NoJobs)
    }

    /// Register a new job and obtain a lifecycle monitor for it. The
    /// job is removed from the registry when the returned `JobMonitor`
    /// is dropped (or via `job_terminated`, whichever happens first).
    pub async fn new_job(
        &self,
        id: JobId,
        name: impl Into<String>,
        handle: Arc<dyn JobHandle>,
    ) -> Result<JobMonitor, PolicyError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(PolicyMessage::NewJob {
                id,
                name: name.into(),
                handle,
                reply: reply_tx,
            })
            .await
            .map_err(|_| PolicyError::ServerGone)?;
        reply_rx.await.map_err(|_| PolicyError::ServerGone)??;
        Ok(JobMonitor::new(id, self.clone()))
    }

    pub async fn update_topology(&self, nodes: Vec<TopologyNode>) {
        let _ = self.tx.send(PolicyMessage::UpdateTopology { nodes }).await;
    }

    pub async fn apply_priority_revision(&self, revisions: Vec<PriorityRevision>) {
        if revisions.is_empty() {
            return;
        }
        let _ = self
            .tx
            .send(PolicyMessage::ApplyPriorityRevision { revisions })
            .await;
    }

    pub async fn snapshot_registry(&self) -> Result<RegistrySnapshot, PolicyError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(PolicyMessage::SnapshotRegistry { reply: reply_tx })
            .await
            .map_err(|_| PolicyError::ServerGone)?;
        reply_rx.await.map_err(|_| PolicyError::ServerGone)
    }

    /// Administrative removal path, for callers that detect job death
    /// out-of-band rather than through a `JobMonitor`. Idempotent.
    pub async fn job_terminated(&self, id: JobId) {
        let _ = self.tx.send(PolicyMessage::JobTerminated { id }).await;
    }

    /// Subscribe to `total_cores` changes, as observed by
    /// `update_topology`. Used by the fairness controller so it never
    /// has to poll the server for this value.
    pub fn subscribe_total_cores(&self) -> watch::Receiver<u64> {
        self.total_cores_rx.clone()
    }
}

/// RAII lifecycle monitor for a registered job.
///
/// Dropping this guard removes the job from the registry, modeling the
/// spec's "monitored reference drops" termination trigger without
/// requiring the caller to remember to call `job_terminated` by hand.
pub struct JobMonitor {
    id: JobId,
    handle: PolicyHandle,
    armed: bool,
}

impl JobMonitor {
    fn new(id: JobId, handle: PolicyHandle) -> Self {
        Self {
            id,
            handle,
            armed: true,
        }
    }

    pub fn job_id(&self) -> JobId {
        self.id
    }

    /// Disarm the guard without removing the job, e.g. because the
    /// caller is about to call `job_terminated` itself.
    pub fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for JobMonitor {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let handle = self.handle.clone();
        let id = self.id;
        tokio::spawn(async move {
            handle.job_terminated(id).await;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::JobStats;
    use async_trait::async_trait;

    struct StubHandle {
        pending: u64,
        running: u64,
    }

    #[async_trait]
    impl JobHandle for StubHandle {
        async fn get_stats(&self) -> anyhow::Result<JobStats> {
            Ok(JobStats {
                pending_tasks: self.pending,
                running_tasks: self.running,
            })
        }
    }

    fn stub(pending: u64, running: u64) -> Arc<dyn JobHandle> {
        Arc::new(StubHandle { pending, running })
    }

    #[tokio::test]
    async fn empty_registry_returns_no_jobs() {
        let handle = PolicyServer::spawn(4);
        let decision = handle.next_job(HashSet::new()).await;
        assert_eq!(decision, SchedulingDecision::NoJobs);
    }

    #[tokio::test]
    async fn zero_cores_always_no_jobs() {
        let handle = PolicyServer::spawn(0);
        let id = JobId::new();
        let _monitor = handle
            .new_job(id, "job", stub(1, 1))
            .await
            .expect("new_job");
        let decision = handle.next_job(HashSet::new()).await;
        assert_eq!(decision, SchedulingDecision::NoJobs);
    }

    #[tokio::test]
    async fn initial_priority_sequence() {
        let handle = PolicyServer::spawn(4);
        let j1 = JobId::new();
        let m1 = handle.new_job(j1, "j1", stub(0, 0)).await.unwrap();
        let snap = handle.snapshot_registry().await.unwrap();
        assert_eq!(snap.jobs[0].priority, -1.0);

        let j2 = JobId::new();
        let _m2 = handle.new_job(j2, "j2", stub(0, 0)).await.unwrap();
        let snap = handle.snapshot_registry().await.unwrap();
        let p2 = snap.jobs.iter().find(|j| j.id == j2).unwrap().priority;
        assert_eq!(p2, -0.5);

        m1.disarm();
    }

    #[tokio::test]
    async fn next_job_never_returns_excluded() {
        let handle = PolicyServer::spawn(4);
        let j1 = JobId::new();
        let j2 = JobId::new();
        let m1 = handle.new_job(j1, "j1", stub(1, 1)).await.unwrap();
        let m2 = handle.new_job(j2, "j2", stub(1, 1)).await.unwrap();

        let mut exclude = HashSet::new();
        exclude.insert(j1);
        let decision = handle.next_job(exclude).await;
        assert_eq!(decision, SchedulingDecision::Selected(j2));

        m1.disarm();
        m2.disarm();
    }

    #[tokio::test]
    async fn terminated_job_never_reappears() {
        let handle = PolicyServer::spawn(4);
        let j1 = JobId::new();
        let m1 = handle.new_job(j1, "j1", stub(1, 1)).await.unwrap();
        drop(m1);
        // give the spawned removal task a chance to run
        tokio::task::yield_now().await;
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;

        let decision = handle.next_job(HashSet::new()).await;
        assert_eq!(decision, SchedulingDecision::NoJobs);
    }

    #[tokio::test]
    async fn bias_step_scenario_d() {
        // Two jobs, priorities -1.0 (J1) and -0.5 (J2), 4 cores, zero bias.
        let handle = PolicyServer::spawn(4);
        let j1 = JobId::new();
        let j2 = JobId::new();
        let m1 = handle.new_job(j1, "j1", stub(1, 1)).await.unwrap();
        let m2 = handle.new_job(j2, "j2", stub(1, 1)).await.unwrap();

        // force the exact starting priorities from the scenario
        handle
            .apply_priority_revision(vec![
                PriorityRevision {
                    id: j1,
                    priority: -1.0,
                    bias: 0.0,
                    cputime: 0,
                },
                PriorityRevision {
                    id: j2,
                    priority: -0.5,
                    bias: 0.0,
                    cputime: 0,
                },
            ])
            .await;

        let decision = handle.next_job(HashSet::new()).await;
        assert_eq!(decision, SchedulingDecision::Selected(j1));

        let snap = handle.snapshot_registry().await.unwrap();
        let rec1 = snap.jobs.iter().find(|j| j.id == j1).unwrap();
        assert!((rec1.bias - 0.25).abs() < 1e-9);
        assert!((rec1.priority + rec1.bias - (-0.75)).abs() < 1e-9);

        let decision2 = handle.next_job(HashSet::new()).await;
        assert_eq!(decision2, SchedulingDecision::Selected(j1));

        m1.disarm();
        m2.disarm();
    }
}
