/// Pruning and retention policy implementation
use chrono::{Duration, Utc};
use fjall::{Keyspace, PartitionHandle};
use tracing::{debug, info};

use crate::jobs::JobRecord;

use super::error::Result;
use super::partitions::meta_key;

/// Metadata key for pruning state
const META_LAST_PRUNE_IDEM: &str = "last_prune_idem";

/// Pruning statistics
#[derive(Debug, Default)]
pub struct PruneStats {
    pub jobs_pruned: usize,
    pub idempotency_pruned: usize,
}

/// Prune expired entries from all partitions
pub fn prune_expired(
    keyspace: &Keyspace,
    jobs_partition: &PartitionHandle,
    idem_partition: &PartitionHandle,
    metadata_partition: &PartitionHandle,
    job_ttl_days: u32,
    idempotency_ttl_days: u32,
) -> Result<PruneStats> {
    let mut stats = PruneStats::default();

    stats.jobs_pruned = prune_jobs(jobs_partition, job_ttl_days)?;
    stats.idempotency_pruned =
        prune_idempotency(idem_partition, metadata_partition, idempotency_ttl_days)?;

    keyspace.persist(fjall::PersistMode::SyncAll)?;
    info!("Pruning complete: {:?}", stats);

    Ok(stats)
}

/// Remove terminal jobs whose last activity is older than the TTL.
/// Pending and processing jobs are never pruned.
fn prune_jobs(jobs_partition: &PartitionHandle, ttl_days: u32) -> Result<usize> {
    let cutoff = Utc::now() - Duration::days(ttl_days as i64);
    let mut pruned = 0;

    let mut expired_keys = Vec::new();
    for item in jobs_partition.iter() {
        let (key, value) = item?;
        let record: JobRecord = match serde_json::from_slice(&value) {
            Ok(record) => record,
            Err(e) => {
                debug!(error = %e, "Skipping undecodable job record during prune");
                continue;
            }
        };

        if !record.status.is_terminal() {
            continue;
        }

        let last_activity = record.completed_at.unwrap_or(record.created_at);
        if last_activity < cutoff {
            expired_keys.push(key.to_vec());
        }
    }

    for key in expired_keys {
        jobs_partition.remove(key)?;
        pruned += 1;
    }

    info!("Pruned {} expired jobs", pruned);
    Ok(pruned)
}

/// Idempotency keys carry no timestamps of their own, so the whole partition
/// is cleared whenever the previous sweep is older than the TTL.
fn prune_idempotency(
    idem_partition: &PartitionHandle,
    metadata_partition: &PartitionHandle,
    ttl_days: u32,
) -> Result<usize> {
    let now_secs = Utc::now().timestamp();
    let cutoff_secs = now_secs - (ttl_days as i64 * 86400);
    let mut pruned = 0;

    let last_prune_secs = metadata_partition
        .get(meta_key(META_LAST_PRUNE_IDEM))?
        .and_then(|bytes| String::from_utf8(bytes.to_vec()).ok())
        .and_then(|s| s.parse::<i64>().ok());

    let should_clear = match last_prune_secs {
        Some(last) => last < cutoff_secs,
        None => false, // first sweep only records the timestamp
    };

    if should_clear {
        let keys: Vec<_> = idem_partition
            .iter()
            .collect::<std::result::Result<Vec<_>, _>>()?
            .into_iter()
            .map(|(key, _)| key.to_vec())
            .collect();
        for key in keys {
            idem_partition.remove(key)?;
            pruned += 1;
        }
    }

    metadata_partition.insert(
        meta_key(META_LAST_PRUNE_IDEM),
        now_secs.to_string().as_bytes(),
    )?;

    info!("Pruned {} idempotency keys", pruned);
    Ok(pruned)
}

#[cfg(test)]
mod tests {
    use crate::jobs::{JobKind, JobStatus};
    use crate::store::{JobStore, StatusUpdate};
    use tempfile::TempDir;

    #[test]
    fn test_prune_keeps_recent_and_active_jobs() {
        let temp_dir = TempDir::new().unwrap();
        let store = JobStore::open(temp_dir.path().join("store")).unwrap();

        // A fresh pending job and a fresh completed job: neither is expired
        let pending = store.create("u", JobKind::CvParse, Default::default()).unwrap();
        let completed = store.create("u", JobKind::CvParse, Default::default()).unwrap();
        store
            .update_status(&completed, JobStatus::Processing, StatusUpdate::default())
            .unwrap();
        store
            .update_status(&completed, JobStatus::Completed, StatusUpdate::default())
            .unwrap();

        let stats = store.prune_expired(30, 14).unwrap();
        assert_eq!(stats.jobs_pruned, 0);

        assert!(store.get(&pending).unwrap().is_some());
        assert!(store.get(&completed).unwrap().is_some());
    }
}
