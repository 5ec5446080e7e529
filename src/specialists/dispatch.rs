//! Retry wrapper around specialist invocations.

use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::RetryConfig;

use super::classify::{classify_marker, ErrorClass};
use super::client::SpecialistClient;
use super::types::{Specialist, SpecialistRequest, SpecialistResponse};

/// Backoff policy for transient failures: exponential with a cap, a bounded
/// number of attempts.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub initial_delay: Duration,
    pub multiplier: u32,
    pub max_delay: Duration,
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(4),
            multiplier: 2,
            max_delay: Duration::from_secs(60),
            max_attempts: 5,
        }
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            initial_delay: config.initial_delay.as_duration(),
            multiplier: config.multiplier,
            max_delay: config.max_delay.as_duration(),
            max_attempts: config.max_attempts,
        }
    }
}

/// Terminal outcome of a specialist step after retries are exhausted or a
/// permanent failure is hit.
#[derive(Debug, Error)]
pub enum StepError {
    #[error("{specialist} failed: {message}")]
    Permanent { specialist: Specialist, message: String },

    #[error("{specialist} failed after {attempts} attempts: {message}")]
    Exhausted {
        specialist: Specialist,
        attempts: u32,
        message: String,
    },
}

impl StepError {
    pub fn specialist(&self) -> Specialist {
        match self {
            StepError::Permanent { specialist, .. } => *specialist,
            StepError::Exhausted { specialist, .. } => *specialist,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            StepError::Permanent { message, .. } => message,
            StepError::Exhausted { message, .. } => message,
        }
    }
}

/// Invoke a specialist, retrying transient failures with exponential
/// backoff. A `success=false` response is retried only when its error marker
/// classifies as transient; permanent markers fail the step immediately.
pub async fn invoke_with_retry(
    client: &dyn SpecialistClient,
    request: SpecialistRequest,
    policy: &RetryPolicy,
) -> Result<SpecialistResponse, StepError> {
    let specialist = request.specialist();
    let mut delay = policy.initial_delay;
    let mut last_error = String::new();

    for attempt in 1..=policy.max_attempts {
        match client.invoke(request.clone()).await {
            Ok(response) if response.success => {
                if attempt > 1 {
                    debug!(%specialist, attempt, "Specialist call succeeded after retry");
                }
                return Ok(response);
            }
            Ok(response) => {
                let marker = response
                    .error
                    .unwrap_or_else(|| "unknown error".to_string());
                if classify_marker(&marker) == ErrorClass::Permanent {
                    return Err(StepError::Permanent {
                        specialist,
                        message: marker,
                    });
                }
                last_error = marker;
            }
            Err(e) => {
                if e.class() == ErrorClass::Permanent {
                    return Err(StepError::Permanent {
                        specialist,
                        message: e.to_string(),
                    });
                }
                last_error = e.to_string();
            }
        }

        if attempt < policy.max_attempts {
            warn!(%specialist, attempt, error = %last_error, delay_ms = delay.as_millis() as u64, "Transient specialist failure, retrying");
            tokio::time::sleep(delay).await;
            delay = (delay * policy.multiplier).min(policy.max_delay);
        }
    }

    warn!(%specialist, attempts = policy.max_attempts, error = %last_error, "Specialist call exhausted retries");
    Err(StepError::Exhausted {
        specialist,
        attempts: policy.max_attempts,
        message: last_error,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::specialists::client::DispatchError;
    use crate::specialists::types::{CharterRequest, ExtractionType, ExtractorRequest};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    /// Scripted client: pops one result per invocation.
    struct Scripted {
        responses: Mutex<Vec<Result<SpecialistResponse, DispatchError>>>,
        calls: AtomicU32,
    }

    impl Scripted {
        fn new(responses: Vec<Result<SpecialistResponse, DispatchError>>) -> Self {
            Self {
                responses: Mutex::new(responses),
                calls: AtomicU32::new(0),
            }
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl SpecialistClient for Scripted {
        async fn invoke(
            &self,
            _request: SpecialistRequest,
        ) -> Result<SpecialistResponse, DispatchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut responses = self.responses.lock().unwrap();
            if responses.is_empty() {
                Ok(SpecialistResponse::ok())
            } else {
                responses.remove(0)
            }
        }
    }

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            initial_delay: Duration::from_millis(1),
            multiplier: 2,
            max_delay: Duration::from_millis(4),
            max_attempts: 5,
        }
    }

    fn extractor_request() -> SpecialistRequest {
        SpecialistRequest::Extractor(ExtractorRequest {
            extraction_type: ExtractionType::Cv,
            text: "Jane".to_string(),
            job_id: "job-1".to_string(),
            trace: None,
        })
    }

    #[tokio::test]
    async fn test_transient_failure_then_success() {
        let client = Scripted::new(vec![
            Ok(SpecialistResponse::failed("rate limited by upstream")),
            Err(DispatchError::Deadline(Specialist::Extractor)),
            Ok(SpecialistResponse::ok()),
        ]);

        let response = invoke_with_retry(&client, extractor_request(), &fast_policy())
            .await
            .unwrap();
        assert!(response.success);
        assert_eq!(client.calls(), 3);
    }

    #[tokio::test]
    async fn test_rate_limit_chain_exhausts_after_five_attempts() {
        let client = Scripted::new(
            (0..10)
                .map(|_| Ok(SpecialistResponse::failed("throttled")))
                .collect(),
        );

        let err = invoke_with_retry(&client, extractor_request(), &fast_policy())
            .await
            .unwrap_err();
        assert!(matches!(err, StepError::Exhausted { attempts: 5, .. }));
        assert_eq!(client.calls(), 5);
    }

    #[tokio::test]
    async fn test_permanent_failure_is_immediate() {
        let client = Scripted::new(vec![Ok(SpecialistResponse::failed(
            "validation failed: text is empty",
        ))]);

        let err = invoke_with_retry(&client, extractor_request(), &fast_policy())
            .await
            .unwrap_err();
        assert!(matches!(err, StepError::Permanent { .. }));
        assert_eq!(client.calls(), 1);
    }

    #[tokio::test]
    async fn test_unconfigured_endpoint_is_permanent() {
        let client = Scripted::new(vec![Err(DispatchError::Unconfigured(Specialist::Charter))]);

        let request = SpecialistRequest::Charter(CharterRequest {
            job_id: "job-1".to_string(),
            applications_data: None,
            user_id: None,
            trace: None,
        });

        let err = invoke_with_retry(&client, request, &fast_policy())
            .await
            .unwrap_err();
        assert!(matches!(err, StepError::Permanent { .. }));
        assert_eq!(client.calls(), 1);
    }

    #[test]
    fn test_policy_from_config_defaults() {
        let policy = RetryPolicy::from(&RetryConfig::default());
        assert_eq!(policy.initial_delay, Duration::from_secs(4));
        assert_eq!(policy.multiplier, 2);
        assert_eq!(policy.max_delay, Duration::from_secs(60));
        assert_eq!(policy.max_attempts, 5);
    }
}
