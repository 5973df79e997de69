//! Time-ordered job store.
//!
//! Jobs are kept ascending by `next_time` under one mutex. Insertion places
//! at the upper bound found by binary search, so jobs sharing a `next_time`
//! keep their insertion order and due extraction is stable.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::core::job::Job;

pub(crate) struct JobArray {
    entries: Mutex<Vec<Arc<Job>>>,
}

impl JobArray {
    pub(crate) fn new() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
        }
    }

    /// Insert one job, preserving the sort invariant.
    pub(crate) fn push(&self, job: Arc<Job>) {
        let mut entries = self.entries.lock();
        Self::insert_sorted(&mut entries, job);
    }

    /// Bulk insert under a single critical section.
    pub(crate) fn concat(&self, jobs: Vec<Arc<Job>>) {
        let mut entries = self.entries.lock();
        for job in jobs {
            Self::insert_sorted(&mut entries, job);
        }
    }

    fn insert_sorted(entries: &mut Vec<Arc<Job>>, job: Arc<Job>) {
        let key = job.next_time();
        let index = entries.partition_point(|existing| existing.next_time() <= key);
        entries.insert(index, job);
    }

    /// Remove and return the earliest job if it is due, else `None`.
    /// Callers loop until `None`.
    pub(crate) fn shift(&self, now: DateTime<Utc>) -> Option<Arc<Job>> {
        let mut entries = self.entries.lock();
        if entries.first()?.next_time() <= now {
            Some(entries.remove(0))
        } else {
            None
        }
    }

    /// Remove every job marked unscheduled, returning the removed jobs.
    pub(crate) fn delete_unscheduled(&self) -> Vec<Arc<Job>> {
        let mut entries = self.entries.lock();
        let mut removed = Vec::new();
        entries.retain(|job| {
            if job.unscheduled_at().is_some() {
                removed.push(job.clone());
                false
            } else {
                true
            }
        });
        removed
    }

    /// Snapshot copy of the current contents.
    pub(crate) fn to_vec(&self) -> Vec<Arc<Job>> {
        self.entries.lock().clone()
    }

    /// Linear scan for a job by id.
    pub(crate) fn lookup(&self, job_id: &str) -> Option<Arc<Job>> {
        self.entries
            .lock()
            .iter()
            .find(|job| job.id() == job_id)
            .cloned()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.lock().len()
    }
}
