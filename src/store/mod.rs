//! Fjall-based persistence layer for job records
//!
//! The job store is the source of truth for every job: status, input,
//! per-specialist payload slots, and timestamps. It persists:
//!
//! - Job records (lifecycle status, input envelope, payload slots)
//! - Idempotency keys (deduplication for POST /jobs)
//! - Metadata (pruning cursors)
//!
//! ## Concurrency
//!
//! Mutations are read-modify-write cycles serialized under an internal lock,
//! making writes linearizable per record. The lifecycle state machine on top
//! of that guarantees a single `pending -> processing` winner under
//! concurrent orchestrator workers.
//!
//! ## Retention
//!
//! Terminal jobs and idempotency keys are pruned on demand via
//! [`JobStore::prune_expired`], with TTLs from the `[retention]` config
//! section.

pub mod error;
pub mod partitions;
pub mod pruning;
mod store;

pub use error::{Result, StoreError};
pub use pruning::PruneStats;
pub use store::{JobStore, StatusUpdate};
