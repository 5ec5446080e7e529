use std::path::Path;
use std::sync::Mutex;

use chrono::Utc;
use fjall::{Config, Keyspace, PartitionCreateOptions, PartitionHandle};
use serde_json::Value;
use tracing::{debug, info};
use uuid::Uuid;

use crate::jobs::{JobInput, JobKind, JobRecord, JobStatus, PayloadSlot};

use super::error::{Result, StoreError};
use super::partitions::{idempotency_key, job_key};
use super::pruning::{prune_expired, PruneStats};

/// Options accompanying a status transition.
#[derive(Debug, Default, Clone)]
pub struct StatusUpdate {
    pub error: Option<String>,
    pub progress: Option<u8>,
}

/// Fjall-backed persistent job store.
///
/// Source of truth for job records. Each mutation is a read-modify-write of
/// a single record serialized under the internal lock, which makes writes
/// linearizable per record; the lifecycle state machine then guarantees that
/// only one `pending -> processing` transition can ever succeed.
pub struct JobStore {
    keyspace: Keyspace,
    jobs: PartitionHandle,
    idempotency: PartitionHandle,
    metadata: PartitionHandle,
    write_lock: Mutex<()>,
}

impl JobStore {
    /// Open or create a job store at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!("Opening job store at: {}", path.display());

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let keyspace = Config::new(path).open()?;

        let jobs = keyspace.open_partition("jobs", PartitionCreateOptions::default())?;
        let idempotency = keyspace.open_partition("idempotency", PartitionCreateOptions::default())?;
        let metadata = keyspace.open_partition("metadata", PartitionCreateOptions::default())?;

        Ok(Self {
            keyspace,
            jobs,
            idempotency,
            metadata,
            write_lock: Mutex::new(()),
        })
    }

    /// Create a new job in `pending` and return its id
    pub fn create(&self, owner: &str, kind: JobKind, input: JobInput) -> Result<String> {
        let id = Uuid::now_v7().to_string();
        let record = JobRecord {
            id: id.clone(),
            owner: owner.to_string(),
            kind,
            status: JobStatus::Pending,
            progress: 0,
            input,
            extractor_payload: None,
            analyzer_payload: None,
            interviewer_payload: None,
            charter_payload: None,
            summary_payload: None,
            error: None,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        };

        self.put(&record)?;
        debug!(job_id = %id, kind = %record.kind, "Job created");
        Ok(id)
    }

    /// Get a job record by id
    pub fn get(&self, job_id: &str) -> Result<Option<JobRecord>> {
        let key = job_key(job_id);
        match self.jobs.get(key)? {
            Some(value) => {
                let record = serde_json::from_slice(&value)?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    /// Apply a status transition, enforcing the lifecycle state machine.
    ///
    /// - `pending -> processing` stamps `started_at`
    /// - `processing -> completed|failed` stamps `completed_at`
    /// - re-applying the current status is an idempotent no-op (this is what
    ///   lets a redelivered `processing` job be picked up again)
    /// - anything else is an [`StoreError::IllegalTransition`]
    pub fn update_status(
        &self,
        job_id: &str,
        status: JobStatus,
        update: StatusUpdate,
    ) -> Result<JobRecord> {
        let _guard = self.write_lock.lock().unwrap();
        let mut record = self.load_required(job_id)?;

        if record.status == status {
            // Idempotent re-application; keep the first stamps.
            debug!(job_id, status = %status, "Status already applied");
            return Ok(record);
        }

        if !record.status.can_transition_to(status) {
            return Err(StoreError::IllegalTransition {
                id: job_id.to_string(),
                from: record.status,
                to: status,
            });
        }

        let now = Utc::now();
        match status {
            JobStatus::Processing => record.started_at = Some(now),
            JobStatus::Completed | JobStatus::Failed => record.completed_at = Some(now),
            JobStatus::Pending => {}
        }

        record.status = status;
        if let Some(error) = update.error {
            record.error = Some(error);
        }
        if let Some(progress) = update.progress {
            record.progress = progress.min(100);
        }
        if status == JobStatus::Completed {
            record.progress = 100;
        }

        self.put(&record)?;
        debug!(job_id, status = %status, "Status updated");
        Ok(record)
    }

    /// Write one payload slot atomically. Overwrites are allowed; writes
    /// against a terminal job are rejected.
    pub fn update_payload(&self, job_id: &str, slot: PayloadSlot, value: Value) -> Result<()> {
        let _guard = self.write_lock.lock().unwrap();
        let mut record = self.load_required(job_id)?;

        if record.status.is_terminal() {
            return Err(StoreError::TerminalJob {
                id: job_id.to_string(),
                status: record.status,
            });
        }

        record.set_payload(slot, value);
        self.put(&record)?;
        debug!(job_id, slot = slot.field_name(), "Payload slot written");
        Ok(())
    }

    /// Merge one profile under the extractor slot without overwriting the
    /// sibling key (`cv_profile` and `job_profile` coexist).
    pub fn merge_extractor_payload(&self, job_id: &str, key: &str, profile: Value) -> Result<()> {
        let _guard = self.write_lock.lock().unwrap();
        let mut record = self.load_required(job_id)?;

        if record.status.is_terminal() {
            return Err(StoreError::TerminalJob {
                id: job_id.to_string(),
                status: record.status,
            });
        }

        let mut payload = match record.extractor_payload.take() {
            Some(Value::Object(map)) => map,
            _ => serde_json::Map::new(),
        };
        payload.insert(key.to_string(), profile);
        record.extractor_payload = Some(Value::Object(payload));

        self.put(&record)?;
        debug!(job_id, key, "Extractor payload merged");
        Ok(())
    }

    /// Read one payload slot
    pub fn read_payload(&self, job_id: &str, slot: PayloadSlot) -> Result<Option<Value>> {
        let record = self.load_required(job_id)?;
        Ok(record.payload(slot).cloned())
    }

    /// Advance the advisory progress indicator. Silently skipped once the
    /// job is terminal.
    pub fn update_progress(&self, job_id: &str, progress: u8) -> Result<()> {
        let _guard = self.write_lock.lock().unwrap();
        let mut record = self.load_required(job_id)?;

        if record.status.is_terminal() {
            return Ok(());
        }

        record.progress = progress.min(100);
        self.put(&record)
    }

    /// List jobs for an owner, newest first
    pub fn list_by_owner(
        &self,
        owner: &str,
        status: Option<JobStatus>,
        kind: Option<&JobKind>,
        limit: usize,
    ) -> Result<Vec<JobRecord>> {
        let mut records = Vec::new();

        for item in self.jobs.iter() {
            let (_, value) = item?;
            let record: JobRecord = serde_json::from_slice(&value)?;

            if record.owner != owner {
                continue;
            }
            if let Some(status) = status {
                if record.status != status {
                    continue;
                }
            }
            if let Some(kind) = kind {
                if &record.kind != kind {
                    continue;
                }
            }

            records.push(record);
        }

        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        records.truncate(limit);
        Ok(records)
    }

    /// Remember an idempotency key -> job_id mapping
    pub fn remember_idempotency(&self, key: &str, job_id: &str) -> Result<()> {
        self.idempotency
            .insert(idempotency_key(key), job_id.as_bytes())?;
        debug!(key, job_id, "Remembered idempotency mapping");
        Ok(())
    }

    /// Check if an idempotency key exists and return the associated job_id
    pub fn get_idempotent(&self, key: &str) -> Result<Option<String>> {
        match self.idempotency.get(idempotency_key(key))? {
            Some(value) => Ok(Some(String::from_utf8_lossy(&value).to_string())),
            None => Ok(None),
        }
    }

    /// Prune expired entries based on retention policies
    pub fn prune_expired(&self, job_ttl_days: u32, idempotency_ttl_days: u32) -> Result<PruneStats> {
        let _guard = self.write_lock.lock().unwrap();
        let stats = prune_expired(
            &self.keyspace,
            &self.jobs,
            &self.idempotency,
            &self.metadata,
            job_ttl_days,
            idempotency_ttl_days,
        )?;
        info!("Pruning completed: {:?}", stats);
        Ok(stats)
    }

    /// Persist all pending writes to disk
    pub fn persist(&self) -> Result<()> {
        self.keyspace.persist(fjall::PersistMode::SyncAll)?;
        Ok(())
    }

    /// Number of stored jobs (for health/stats)
    pub fn job_count(&self) -> Result<usize> {
        let mut count = 0;
        for item in self.jobs.iter() {
            item?;
            count += 1;
        }
        Ok(count)
    }

    fn load_required(&self, job_id: &str) -> Result<JobRecord> {
        self.get(job_id)?
            .ok_or_else(|| StoreError::NotFound(job_id.to_string()))
    }

    fn put(&self, record: &JobRecord) -> Result<()> {
        let key = job_key(&record.id);
        let value = serde_json::to_vec(record)?;
        self.jobs.insert(key, value)?;
        Ok(())
    }
}
