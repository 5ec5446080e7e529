use crate::humanize::{ByteSize, HumanDuration};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;

/// Top-level configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub worker: WorkerConfig,
    #[serde(default)]
    pub specialists: SpecialistsConfig,
    #[serde(default)]
    pub trace: TraceConfig,
    #[serde(default)]
    pub retention: RetentionConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: SocketAddr,
    /// Fjall data directory; the job store opens `<data_path>/store` and the
    /// work queue opens `<data_path>/queue`.
    #[serde(default = "default_data_path")]
    pub data_path: PathBuf,
    #[serde(default)]
    pub api: ApiLimits,
}

/// API request limits
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiLimits {
    #[serde(default = "default_max_payload_bytes")]
    pub max_payload_bytes: ByteSize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            data_path: default_data_path(),
            api: ApiLimits::default(),
        }
    }
}

impl Default for ApiLimits {
    fn default() -> Self {
        Self {
            max_payload_bytes: default_max_payload_bytes(),
        }
    }
}

fn default_bind_addr() -> SocketAddr {
    "0.0.0.0:8080".parse().unwrap()
}

fn default_data_path() -> PathBuf {
    PathBuf::from("data")
}

fn default_max_payload_bytes() -> ByteSize {
    ByteSize(1024 * 1024) // 1 MB
}

/// Orchestrator worker pool configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WorkerConfig {
    /// Number of concurrent orchestrator workers
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Sleep between dequeue attempts when the queue is empty
    #[serde(default = "default_poll_interval")]
    pub poll_interval: HumanDuration,
    /// Queue visibility lease; an unacked message is redelivered after this
    #[serde(default = "default_lease")]
    pub lease: HumanDuration,
    /// Per-specialist-call deadline
    #[serde(default = "default_call_deadline")]
    pub call_deadline: HumanDuration,
    /// Total wall-clock budget per job; exceeding it fails the job
    #[serde(default = "default_job_budget")]
    pub job_budget: HumanDuration,
    #[serde(default)]
    pub retry: RetryConfig,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            poll_interval: default_poll_interval(),
            lease: default_lease(),
            call_deadline: default_call_deadline(),
            job_budget: default_job_budget(),
            retry: RetryConfig::default(),
        }
    }
}

fn default_workers() -> usize {
    4
}

fn default_poll_interval() -> HumanDuration {
    HumanDuration::from_millis(500)
}

fn default_lease() -> HumanDuration {
    HumanDuration::from_secs(120)
}

fn default_call_deadline() -> HumanDuration {
    HumanDuration::from_secs(300)
}

fn default_job_budget() -> HumanDuration {
    HumanDuration::from_secs(900)
}

/// Backoff policy for transient specialist failures
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetryConfig {
    #[serde(default = "default_retry_initial_delay")]
    pub initial_delay: HumanDuration,
    #[serde(default = "default_retry_multiplier")]
    pub multiplier: u32,
    #[serde(default = "default_retry_max_delay")]
    pub max_delay: HumanDuration,
    #[serde(default = "default_retry_max_attempts")]
    pub max_attempts: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            initial_delay: default_retry_initial_delay(),
            multiplier: default_retry_multiplier(),
            max_delay: default_retry_max_delay(),
            max_attempts: default_retry_max_attempts(),
        }
    }
}

fn default_retry_initial_delay() -> HumanDuration {
    HumanDuration::from_secs(4)
}

fn default_retry_multiplier() -> u32 {
    2
}

fn default_retry_max_delay() -> HumanDuration {
    HumanDuration::from_secs(60)
}

fn default_retry_max_attempts() -> u32 {
    5
}

/// Specialist service endpoints. An absent endpoint leaves that specialist
/// unreachable; calls against it fail as permanent errors.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SpecialistsConfig {
    pub extractor_url: Option<String>,
    pub analyzer_url: Option<String>,
    pub interviewer_url: Option<String>,
    pub charter_url: Option<String>,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: HumanDuration,
}

fn default_connect_timeout() -> HumanDuration {
    HumanDuration::from_secs(10)
}

/// Trace sink configuration. No endpoint means every trace operation is a
/// no-op; the control plane never fails a job over the sink.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TraceConfig {
    pub endpoint: Option<String>,
    /// Sink auth key (loaded from environment, not from config file)
    #[serde(skip)]
    pub auth_key: Option<String>,
}

/// Retention configuration for store pruning
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetentionConfig {
    #[serde(default = "default_job_ttl_days")]
    pub job_ttl_days: u32,
    #[serde(default = "default_idempotency_ttl_days")]
    pub idempotency_ttl_days: u32,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            job_ttl_days: default_job_ttl_days(),
            idempotency_ttl_days: default_idempotency_ttl_days(),
        }
    }
}

fn default_job_ttl_days() -> u32 {
    30
}

fn default_idempotency_ttl_days() -> u32 {
    14
}
