//! Pending-job store keyed by stable timer ids
//!
//! Jobs live in an id-keyed map; firing order comes from a separate ordered
//! index. Callers look up the next due job by key on every step instead of
//! holding an iterator, so jobs inserted or removed between two lookups are
//! always seen (or skipped) correctly.

use std::collections::{BTreeSet, HashMap};

use crate::job::{Job, JobKey, Millis, TimerId};

#[derive(Debug, Default)]
pub struct JobQueue {
    jobs: HashMap<TimerId, Job>,
    order: BTreeSet<JobKey>,
}

impl JobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    #[inline]
    pub fn contains(&self, id: TimerId) -> bool {
        self.jobs.contains_key(&id)
    }

    pub fn insert(&mut self, job: Job) {
        debug_assert!(!self.jobs.contains_key(&job.id), "duplicate timer id {}", job.id);
        self.order.insert(job.key());
        self.jobs.insert(job.id, job);
    }

    pub fn remove(&mut self, id: TimerId) -> Option<Job> {
        let job = self.jobs.remove(&id)?;
        let removed = self.order.remove(&job.key());
        debug_assert!(removed, "order index out of sync for {}", id);
        Some(job)
    }

    /// Key of the first job due at or before `target`
    pub fn peek_due(&self, target: Millis) -> Option<JobKey> {
        self.order.first().copied().filter(|key| key.call_at <= target)
    }

    /// Due time of the earliest pending job
    pub fn next_due(&self) -> Option<Millis> {
        self.order.first().map(|key| key.call_at)
    }

    pub fn get(&self, id: TimerId) -> Option<&Job> {
        self.jobs.get(&id)
    }

    pub fn clear(&mut self) {
        self.jobs.clear();
        self.order.clear();
    }
}
