use super::models::Config;
use thiserror::Error;

/// Hard cap on the API payload limit; career documents are text, anything
/// bigger than this is a misconfiguration.
const MAX_PAYLOAD_HARD_CAP: u64 = 10 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("worker count must be at least 1")]
    NoWorkers,

    #[error("retry max_attempts must be at least 1")]
    NoRetryAttempts,

    #[error("retry multiplier must be at least 1")]
    InvalidRetryMultiplier,

    #[error("queue lease must be positive")]
    InvalidLease,

    #[error("job budget ({budget}s) must not be below the per-call deadline ({deadline}s)")]
    JobBudgetBelowDeadline { budget: u64, deadline: u64 },

    #[error("max_payload_bytes ({actual}) exceeds limit of 10MB ({limit})")]
    PayloadSizeExceedsLimit { actual: u64, limit: u64 },

    #[error("Retention TTL must be positive: {field} = {value}")]
    InvalidRetentionTTL { field: String, value: u32 },

    #[error("Invalid specialist endpoint '{url}': {reason}")]
    InvalidSpecialistEndpoint { url: String, reason: String },
}

/// Validate the entire configuration
pub fn validate(config: &Config) -> Result<(), ValidationError> {
    if config.worker.workers == 0 {
        return Err(ValidationError::NoWorkers);
    }

    if config.worker.retry.max_attempts == 0 {
        return Err(ValidationError::NoRetryAttempts);
    }

    if config.worker.retry.multiplier == 0 {
        return Err(ValidationError::InvalidRetryMultiplier);
    }

    if config.worker.lease.as_duration().is_zero() {
        return Err(ValidationError::InvalidLease);
    }

    let budget = config.worker.job_budget.as_duration();
    let deadline = config.worker.call_deadline.as_duration();
    if budget < deadline {
        return Err(ValidationError::JobBudgetBelowDeadline {
            budget: budget.as_secs(),
            deadline: deadline.as_secs(),
        });
    }

    let payload_limit = config.server.api.max_payload_bytes.as_u64();
    if payload_limit > MAX_PAYLOAD_HARD_CAP {
        return Err(ValidationError::PayloadSizeExceedsLimit {
            actual: payload_limit,
            limit: MAX_PAYLOAD_HARD_CAP,
        });
    }

    if config.retention.job_ttl_days == 0 {
        return Err(ValidationError::InvalidRetentionTTL {
            field: "job_ttl_days".to_string(),
            value: 0,
        });
    }
    if config.retention.idempotency_ttl_days == 0 {
        return Err(ValidationError::InvalidRetentionTTL {
            field: "idempotency_ttl_days".to_string(),
            value: 0,
        });
    }

    for url in [
        &config.specialists.extractor_url,
        &config.specialists.analyzer_url,
        &config.specialists.interviewer_url,
        &config.specialists.charter_url,
    ]
    .into_iter()
    .flatten()
    {
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(ValidationError::InvalidSpecialistEndpoint {
                url: url.clone(),
                reason: "expected http:// or https:// scheme".to_string(),
            });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::humanize::{ByteSize, HumanDuration};

    #[test]
    fn test_default_config_is_valid() {
        let config = Config {
            server: Default::default(),
            worker: Default::default(),
            specialists: Default::default(),
            trace: Default::default(),
            retention: Default::default(),
        };
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_zero_workers_rejected() {
        let mut config = default_config();
        config.worker.workers = 0;
        assert!(matches!(validate(&config), Err(ValidationError::NoWorkers)));
    }

    #[test]
    fn test_budget_below_deadline_rejected() {
        let mut config = default_config();
        config.worker.job_budget = HumanDuration::from_secs(60);
        config.worker.call_deadline = HumanDuration::from_secs(300);
        assert!(matches!(
            validate(&config),
            Err(ValidationError::JobBudgetBelowDeadline { .. })
        ));
    }

    #[test]
    fn test_payload_cap_rejected() {
        let mut config = default_config();
        config.server.api.max_payload_bytes = ByteSize(100 * 1024 * 1024);
        assert!(matches!(
            validate(&config),
            Err(ValidationError::PayloadSizeExceedsLimit { .. })
        ));
    }

    #[test]
    fn test_bad_endpoint_scheme_rejected() {
        let mut config = default_config();
        config.specialists.analyzer_url = Some("ftp://analyzer:21".to_string());
        assert!(matches!(
            validate(&config),
            Err(ValidationError::InvalidSpecialistEndpoint { .. })
        ));
    }

    fn default_config() -> Config {
        Config {
            server: Default::default(),
            worker: Default::default(),
            specialists: Default::default(),
            trace: Default::default(),
            retention: Default::default(),
        }
    }
}
