use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use fjall::{Config, Keyspace, PartitionCreateOptions, PartitionHandle};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::jobs::JobMessage;

#[derive(Error, Debug)]
pub enum QueueError {
    #[error("Fjall error: {0}")]
    Fjall(#[from] fjall::Error),

    #[error("Message decode error: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Message not found: seq={0}")]
    MessageNotFound(u64),
}

pub type Result<T> = std::result::Result<T, QueueError>;

/// A message handed to a consumer. `attempt` counts deliveries, so a value
/// above 1 means this is a redelivery after a lapsed lease.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub seq: u64,
    pub message: JobMessage,
    pub attempt: u32,
}

/// Durable queue entry wrapping the message with lease bookkeeping.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct QueueEntry {
    message: JobMessage,
    attempt: u32,
    /// Unix millis until which the current delivery holds the message.
    /// Zero means never delivered (or explicitly released).
    leased_until_ms: u64,
}

/// Fjall-backed work queue with at-least-once delivery and visibility leases.
///
/// Architecture:
/// - `messages` partition: u64 (big-endian) -> QueueEntry (JSON)
/// - `metadata` partition: "next_seq" -> u64 (atomic counter)
///
/// A dequeue scans for the earliest entry whose lease has lapsed, re-leases
/// it durably, and hands it out. `ack` removes the entry; an entry that is
/// never acked becomes deliverable again once its lease lapses, which is what
/// gives redelivery after a worker crash. Ordering across consumers is not
/// guaranteed.
pub struct WorkQueue {
    keyspace: Keyspace,
    messages: PartitionHandle,
    metadata: PartitionHandle,
    seq_counter: AtomicU64,
    /// Serializes dequeue scans so two workers cannot lease the same entry.
    dequeue_lock: Mutex<()>,
}

impl WorkQueue {
    /// Open or create a work queue at the specified path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        info!("Opening work queue at: {}", path.as_ref().display());

        let keyspace = Config::new(path).open()?;

        let messages = keyspace.open_partition("messages", PartitionCreateOptions::default())?;
        let metadata = keyspace.open_partition("metadata", PartitionCreateOptions::default())?;

        let current_seq = metadata
            .get(b"next_seq")?
            .map(|bytes| u64::from_be_bytes(bytes.as_ref().try_into().unwrap_or([0u8; 8])))
            .unwrap_or(0);

        info!("Work queue opened, current sequence: {}", current_seq);

        Ok(Self {
            keyspace,
            messages,
            metadata,
            seq_counter: AtomicU64::new(current_seq),
            dequeue_lock: Mutex::new(()),
        })
    }

    /// Enqueue a message and return its sequence number
    pub fn enqueue(&self, message: &JobMessage) -> Result<u64> {
        let seq = self.seq_counter.fetch_add(1, Ordering::SeqCst);

        let entry = QueueEntry {
            message: message.clone(),
            attempt: 0,
            leased_until_ms: 0,
        };

        let key = seq.to_be_bytes();
        self.messages.insert(key, serde_json::to_vec(&entry)?)?;

        // Persist updated counter (for crash recovery)
        self.metadata
            .insert(b"next_seq", (seq + 1).to_be_bytes())?;

        debug!(seq, job_id = %message.job_id, "Message enqueued");
        Ok(seq)
    }

    /// Lease the earliest available message, if any.
    ///
    /// An entry is available when it has never been delivered or when its
    /// previous lease has lapsed without an ack. The new lease is persisted
    /// before the delivery is returned, so a crashed consumer can never
    /// cause a lost message, only a delayed redelivery.
    pub fn dequeue(&self, lease: Duration) -> Result<Option<Delivery>> {
        let _guard = self.dequeue_lock.lock().unwrap();
        let now = now_ms();

        for item in self.messages.iter() {
            let (key, value) = item?;
            let mut entry: QueueEntry = serde_json::from_slice(&value)?;

            if entry.leased_until_ms > now {
                continue;
            }

            let seq = u64::from_be_bytes(key.as_ref().try_into().unwrap_or([0u8; 8]));
            entry.attempt += 1;
            entry.leased_until_ms = now + lease.as_millis() as u64;
            self.messages.insert(key, serde_json::to_vec(&entry)?)?;

            debug!(seq, job_id = %entry.message.job_id, attempt = entry.attempt, "Message leased");
            return Ok(Some(Delivery {
                seq,
                message: entry.message,
                attempt: entry.attempt,
            }));
        }

        Ok(None)
    }

    /// Acknowledge a delivery, removing the message permanently
    pub fn ack(&self, seq: u64) -> Result<()> {
        let key = seq.to_be_bytes();
        if self.messages.get(key)?.is_none() {
            return Err(QueueError::MessageNotFound(seq));
        }
        self.messages.remove(key)?;
        debug!(seq, "Message acked");
        Ok(())
    }

    /// Release a leased delivery immediately, making it available again
    /// without waiting for the lease to lapse.
    pub fn release(&self, seq: u64) -> Result<()> {
        let _guard = self.dequeue_lock.lock().unwrap();
        let key = seq.to_be_bytes();
        let Some(value) = self.messages.get(key)? else {
            return Err(QueueError::MessageNotFound(seq));
        };

        let mut entry: QueueEntry = serde_json::from_slice(&value)?;
        entry.leased_until_ms = 0;
        self.messages.insert(key, serde_json::to_vec(&entry)?)?;
        debug!(seq, "Message released");
        Ok(())
    }

    /// Number of messages not yet acked (leased or waiting)
    pub fn depth(&self) -> Result<usize> {
        let mut count = 0;
        for item in self.messages.iter() {
            item?;
            count += 1;
        }
        Ok(count)
    }

    /// Flush all writes to disk
    pub fn flush(&self) -> Result<()> {
        self.keyspace.persist(fjall::PersistMode::SyncAll)?;
        Ok(())
    }

    /// Health check - verify the queue is readable
    pub fn health_check(&self) -> Result<()> {
        let _ = self.metadata.get(b"next_seq")?;
        Ok(())
    }
}

/// Get current Unix timestamp in milliseconds
fn now_ms() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn message(job_id: &str) -> JobMessage {
        JobMessage {
            job_id: job_id.to_string(),
            owner: Some("user-1".to_string()),
            kind: Some("cv_parse".to_string()),
        }
    }

    #[test]
    fn test_enqueue_and_dequeue() {
        let temp_dir = TempDir::new().unwrap();
        let queue = WorkQueue::open(temp_dir.path()).unwrap();

        let seq = queue.enqueue(&message("job1")).unwrap();
        assert_eq!(seq, 0);

        let delivery = queue.dequeue(Duration::from_secs(60)).unwrap().unwrap();
        assert_eq!(delivery.seq, 0);
        assert_eq!(delivery.message.job_id, "job1");
        assert_eq!(delivery.attempt, 1);

        // Leased: not available to a second consumer
        assert!(queue.dequeue(Duration::from_secs(60)).unwrap().is_none());
    }

    #[test]
    fn test_ack_removes_message() {
        let temp_dir = TempDir::new().unwrap();
        let queue = WorkQueue::open(temp_dir.path()).unwrap();

        let seq = queue.enqueue(&message("job1")).unwrap();
        let delivery = queue.dequeue(Duration::from_secs(60)).unwrap().unwrap();
        queue.ack(delivery.seq).unwrap();

        assert_eq!(queue.depth().unwrap(), 0);
        assert!(matches!(queue.ack(seq), Err(QueueError::MessageNotFound(_))));
    }

    #[test]
    fn test_lapsed_lease_redelivers_with_higher_attempt() {
        let temp_dir = TempDir::new().unwrap();
        let queue = WorkQueue::open(temp_dir.path()).unwrap();

        queue.enqueue(&message("job1")).unwrap();

        let first = queue.dequeue(Duration::from_millis(0)).unwrap().unwrap();
        assert_eq!(first.attempt, 1);

        // Zero-length lease lapses immediately: the unacked message comes back
        let second = queue.dequeue(Duration::from_secs(60)).unwrap().unwrap();
        assert_eq!(second.seq, first.seq);
        assert_eq!(second.attempt, 2);
        assert_eq!(second.message.job_id, "job1");
    }

    #[test]
    fn test_release_makes_message_available() {
        let temp_dir = TempDir::new().unwrap();
        let queue = WorkQueue::open(temp_dir.path()).unwrap();

        queue.enqueue(&message("job1")).unwrap();
        let delivery = queue.dequeue(Duration::from_secs(60)).unwrap().unwrap();

        queue.release(delivery.seq).unwrap();
        let again = queue.dequeue(Duration::from_secs(60)).unwrap().unwrap();
        assert_eq!(again.seq, delivery.seq);
        assert_eq!(again.attempt, 2);
    }

    #[test]
    fn test_fifo_scan_order() {
        let temp_dir = TempDir::new().unwrap();
        let queue = WorkQueue::open(temp_dir.path()).unwrap();

        queue.enqueue(&message("job1")).unwrap();
        queue.enqueue(&message("job2")).unwrap();
        queue.enqueue(&message("job3")).unwrap();

        let d1 = queue.dequeue(Duration::from_secs(60)).unwrap().unwrap();
        let d2 = queue.dequeue(Duration::from_secs(60)).unwrap().unwrap();
        assert_eq!(d1.message.job_id, "job1");
        assert_eq!(d2.message.job_id, "job2");
    }

    #[test]
    fn test_persistence_across_reopens() {
        let temp_dir = TempDir::new().unwrap();

        {
            let queue = WorkQueue::open(temp_dir.path()).unwrap();
            queue.enqueue(&message("job1")).unwrap();
        }

        // Sequence counter and messages survive a restart
        let queue = WorkQueue::open(temp_dir.path()).unwrap();
        let seq = queue.enqueue(&message("job2")).unwrap();
        assert_eq!(seq, 1);

        let delivery = queue.dequeue(Duration::from_secs(60)).unwrap().unwrap();
        assert_eq!(delivery.message.job_id, "job1");
    }
}
