//! The job registry: authoritative store of live job records.

use std::collections::HashMap;

use crate::models::{JobId, JobRecord, RegistrySnapshot, SnapshotEntry};

#[derive(Default)]
pub struct JobRegistry {
    jobs: HashMap<JobId, JobRecord>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self {
            jobs: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn contains(&self, id: JobId) -> bool {
        self.jobs.contains_key(&id)
    }

    pub fn get(&self, id: JobId) -> Option<&JobRecord> {
        self.jobs.get(&id)
    }

    pub fn get_mut(&mut self, id: JobId) -> Option<&mut JobRecord> {
        self.jobs.get_mut(&id)
    }

    pub fn insert(&mut self, record: JobRecord) {
        self.jobs.insert(record.id, record);
    }

    pub fn remove(&mut self, id: JobId) -> Option<JobRecord> {
        self.jobs.remove(&id)
    }

    pub fn ids(&self) -> impl Iterator<Item = JobId> + '_ {
        self.jobs.keys().copied()
    }

    pub fn snapshot(&self, total_cores: u64) -> RegistrySnapshot {
        let jobs = self
            .jobs
            .values()
            .map(|j| SnapshotEntry {
                id: j.id,
                name: j.name.clone(),
                priority: j.priority,
                bias: j.bias,
                cputime: j.cputime,
                handle: j.handle.clone(),
            })
            .collect();
        RegistrySnapshot { jobs, total_cores }
    }
}
