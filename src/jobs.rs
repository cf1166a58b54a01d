//! Bounded, expiring store for background analysis jobs.
//!
//! Each job is written twice: pending at submission, then exactly once
//! on completion or failure. Finished jobs live for the TTL; the store
//! never holds more than `capacity` entries.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug, PartialEq)]
pub enum JobError {
    #[error("Job store is full ({0} jobs pending)")]
    Full(usize),
}

/// Why an entry left the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvictionReason {
    Expired,
    Capacity,
}

/// Error recorded for a failed job, shaped like an API error body.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobFailure {
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome {
    Succeeded(Value),
    Failed(JobFailure),
}

/// What a poller sees: `{done:false}`, `{done:true, result}` or
/// `{done:true, error}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatus {
    pub done: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JobFailure>,
    pub submitted_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<String>,
}

struct JobEntry {
    submitted_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
    /// Monotonic completion time, for TTL and eviction order.
    finished: Option<Instant>,
    outcome: Option<JobOutcome>,
}

type EvictionCallback = Box<dyn Fn(Uuid, EvictionReason) + Send + Sync>;

pub struct JobStore {
    jobs: HashMap<Uuid, JobEntry>,
    capacity: usize,
    ttl: Duration,
    on_evict: Option<EvictionCallback>,
}

impl JobStore {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            jobs: HashMap::new(),
            capacity: capacity.max(1),
            ttl,
            on_evict: None,
        }
    }

    /// Called for every entry removed by expiry or capacity pressure.
    pub fn with_eviction_callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(Uuid, EvictionReason) + Send + Sync + 'static,
    {
        self.on_evict = Some(Box::new(callback));
        self
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Register a pending job and return its id.
    pub fn submit(&mut self) -> Result<Uuid, JobError> {
        self.submit_at(Instant::now())
    }

    fn submit_at(&mut self, now: Instant) -> Result<Uuid, JobError> {
        self.cleanup(now);
        if self.jobs.len() >= self.capacity {
            let oldest = self
                .jobs
                .iter()
                .filter_map(|(id, job)| job.finished.map(|t| (*id, t)))
                .min_by_key(|(_, t)| *t)
                .map(|(id, _)| id);
            match oldest {
                Some(id) => self.evict(id, EvictionReason::Capacity),
                None => return Err(JobError::Full(self.jobs.len())),
            }
        }

        let id = Uuid::new_v4();
        self.jobs.insert(
            id,
            JobEntry {
                submitted_at: Utc::now(),
                completed_at: None,
                finished: None,
                outcome: None,
            },
        );
        Ok(id)
    }

    /// Record the outcome. Only the first write counts; returns whether
    /// this call was it.
    pub fn complete(&mut self, id: Uuid, outcome: JobOutcome) -> bool {
        self.complete_at(id, outcome, Instant::now())
    }

    fn complete_at(&mut self, id: Uuid, outcome: JobOutcome, now: Instant) -> bool {
        let Some(job) = self.jobs.get_mut(&id) else {
            tracing::warn!(job_id = %id, "Completion for unknown or evicted job dropped");
            return false;
        };
        if job.outcome.is_some() {
            tracing::warn!(job_id = %id, "Job already completed, ignoring second write");
            return false;
        }
        job.outcome = Some(outcome);
        job.finished = Some(now);
        job.completed_at = Some(Utc::now());
        true
    }

    /// `None` for unknown, expired or evicted ids.
    pub fn status(&mut self, id: Uuid) -> Option<JobStatus> {
        self.status_at(id, Instant::now())
    }

    fn status_at(&mut self, id: Uuid, now: Instant) -> Option<JobStatus> {
        self.cleanup(now);
        let job = self.jobs.get(&id)?;
        let (result, error) = match &job.outcome {
            Some(JobOutcome::Succeeded(value)) => (Some(value.clone()), None),
            Some(JobOutcome::Failed(failure)) => (None, Some(failure.clone())),
            None => (None, None),
        };
        Some(JobStatus {
            done: job.outcome.is_some(),
            result,
            error,
            submitted_at: job.submitted_at.to_rfc3339(),
            completed_at: job.completed_at.map(|t| t.to_rfc3339()),
        })
    }

    fn cleanup(&mut self, now: Instant) {
        let expired: Vec<Uuid> = self
            .jobs
            .iter()
            .filter(|(_, job)| {
                job.finished
                    .is_some_and(|t| now.saturating_duration_since(t) >= self.ttl)
            })
            .map(|(id, _)| *id)
            .collect();
        for id in expired {
            self.evict(id, EvictionReason::Expired);
        }
    }

    fn evict(&mut self, id: Uuid, reason: EvictionReason) {
        if self.jobs.remove(&id).is_some() {
            tracing::debug!(job_id = %id, reason = ?reason, "Job evicted");
            if let Some(callback) = &self.on_evict {
                callback(id, reason);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    fn store(capacity: usize) -> JobStore {
        JobStore::new(capacity, Duration::from_secs(60))
    }

    #[test]
    fn pending_then_done() {
        let mut store = store(4);
        let id = store.submit().unwrap();
        let status = store.status(id).unwrap();
        assert!(!status.done);
        assert!(status.result.is_none() && status.error.is_none());

        assert!(store.complete(id, JobOutcome::Succeeded(json!({"success": true}))));
        let status = store.status(id).unwrap();
        assert!(status.done);
        assert_eq!(status.result, Some(json!({"success": true})));
        assert!(status.completed_at.is_some());
    }

    #[test]
    fn pending_serializes_as_not_done() {
        let mut store = store(4);
        let id = store.submit().unwrap();
        let json = serde_json::to_value(store.status(id).unwrap()).unwrap();
        assert_eq!(json["done"], false);
        assert!(json.get("result").is_none());
        assert!(json.get("error").is_none());
    }

    #[test]
    fn failure_is_recorded() {
        let mut store = store(4);
        let id = store.submit().unwrap();
        store.complete(
            id,
            JobOutcome::Failed(JobFailure {
                code: "UPSTREAM_ERROR",
                message: "boom".into(),
            }),
        );
        let json = serde_json::to_value(store.status(id).unwrap()).unwrap();
        assert_eq!(json["done"], true);
        assert_eq!(json["error"]["code"], "UPSTREAM_ERROR");
    }

    #[test]
    fn second_completion_is_ignored() {
        let mut store = store(4);
        let id = store.submit().unwrap();
        assert!(store.complete(id, JobOutcome::Succeeded(json!(1))));
        assert!(!store.complete(id, JobOutcome::Succeeded(json!(2))));
        assert_eq!(store.status(id).unwrap().result, Some(json!(1)));
    }

    #[test]
    fn unknown_id_has_no_status() {
        let mut store = store(4);
        assert!(store.status(Uuid::new_v4()).is_none());
        assert!(!store.complete(Uuid::new_v4(), JobOutcome::Succeeded(json!(null))));
    }

    #[test]
    fn finished_jobs_expire_after_ttl() {
        let mut store = store(4);
        let start = Instant::now();
        let pending = store.submit_at(start).unwrap();
        let done = store.submit_at(start).unwrap();
        store.complete_at(done, JobOutcome::Succeeded(json!(1)), start);

        let later = start + Duration::from_secs(61);
        assert!(store.status_at(done, later).is_none());
        // TTL counts from completion; pending jobs stay.
        assert!(store.status_at(pending, later).is_some());
    }

    #[test]
    fn capacity_evicts_oldest_finished_job() {
        let evicted = Arc::new(Mutex::new(Vec::new()));
        let sink = evicted.clone();
        let mut store = store(2).with_eviction_callback(move |id, reason| {
            sink.lock().unwrap().push((id, reason));
        });

        let start = Instant::now();
        let first = store.submit_at(start).unwrap();
        let second = store.submit_at(start).unwrap();
        store.complete_at(second, JobOutcome::Succeeded(json!(2)), start);
        store.complete_at(first, JobOutcome::Succeeded(json!(1)), start + Duration::from_secs(1));

        let third = store.submit_at(start + Duration::from_secs(2)).unwrap();
        assert_eq!(store.len(), 2);
        assert!(store.status_at(second, start + Duration::from_secs(2)).is_none());
        assert!(store.status_at(first, start + Duration::from_secs(2)).is_some());
        assert!(store.status_at(third, start + Duration::from_secs(2)).is_some());
        assert_eq!(
            *evicted.lock().unwrap(),
            vec![(second, EvictionReason::Capacity)]
        );
    }

    #[test]
    fn full_of_pending_jobs_rejects_submission() {
        let mut store = store(2);
        store.submit().unwrap();
        store.submit().unwrap();
        assert_eq!(store.submit().unwrap_err(), JobError::Full(2));
    }

    #[test]
    fn expiry_triggers_callback() {
        let count = Arc::new(Mutex::new(0));
        let sink = count.clone();
        let mut store = store(4).with_eviction_callback(move |_, reason| {
            assert_eq!(reason, EvictionReason::Expired);
            *sink.lock().unwrap() += 1;
        });
        let start = Instant::now();
        let id = store.submit_at(start).unwrap();
        store.complete_at(id, JobOutcome::Succeeded(json!(1)), start);
        store.status_at(id, start + Duration::from_secs(120));
        assert_eq!(*count.lock().unwrap(), 1);
        assert!(store.is_empty());
    }
}
