//! Specialist invocation transport.

use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::config::SpecialistsConfig;

use super::classify::{classify_marker, ErrorClass};
use super::types::{Specialist, SpecialistRequest, SpecialistResponse};

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("specialist {0} has no configured endpoint")]
    Unconfigured(Specialist),

    #[error("transport error calling {specialist}: {message}")]
    Transport { specialist: Specialist, message: String },

    #[error("deadline exceeded calling {0}")]
    Deadline(Specialist),

    #[error("{specialist} returned HTTP {status}")]
    Http { specialist: Specialist, status: u16 },

    #[error("failed to decode {specialist} response: {message}")]
    Decode { specialist: Specialist, message: String },

    #[error("failed to build HTTP client: {0}")]
    Client(String),
}

impl DispatchError {
    pub fn class(&self) -> ErrorClass {
        match self {
            DispatchError::Transport { .. } | DispatchError::Deadline(_) => ErrorClass::Transient,
            DispatchError::Http { status, .. } => classify_marker(&status.to_string()),
            DispatchError::Unconfigured(_)
            | DispatchError::Decode { .. }
            | DispatchError::Client(_) => ErrorClass::Permanent,
        }
    }
}

/// One RPC per specialist: `invoke(request) -> response`. The orchestrator
/// only sees this seam; tests substitute scripted implementations.
#[async_trait]
pub trait SpecialistClient: Send + Sync {
    async fn invoke(&self, request: SpecialistRequest) -> Result<SpecialistResponse, DispatchError>;
}

/// HTTP transport for specialist services. Each configured endpoint receives
/// the request envelope as a JSON POST.
pub struct HttpSpecialists {
    client: reqwest::Client,
    endpoints: HashMap<Specialist, String>,
}

impl HttpSpecialists {
    pub fn new(config: &SpecialistsConfig, call_deadline: Duration) -> Result<Self, DispatchError> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout.as_duration())
            .timeout(call_deadline)
            .build()
            .map_err(|e| DispatchError::Client(e.to_string()))?;

        let mut endpoints = HashMap::new();
        let pairs = [
            (Specialist::Extractor, &config.extractor_url),
            (Specialist::Analyzer, &config.analyzer_url),
            (Specialist::Interviewer, &config.interviewer_url),
            (Specialist::Charter, &config.charter_url),
        ];
        for (specialist, url) in pairs {
            if let Some(url) = url {
                endpoints.insert(specialist, url.clone());
            }
        }

        Ok(Self { client, endpoints })
    }
}

#[async_trait]
impl SpecialistClient for HttpSpecialists {
    async fn invoke(&self, request: SpecialistRequest) -> Result<SpecialistResponse, DispatchError> {
        let specialist = request.specialist();
        let endpoint = self
            .endpoints
            .get(&specialist)
            .ok_or(DispatchError::Unconfigured(specialist))?;

        debug!(%specialist, job_id = request.job_id(), "Invoking specialist");

        let response = self
            .client
            .post(endpoint)
            .json(&request.to_payload())
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    DispatchError::Deadline(specialist)
                } else {
                    DispatchError::Transport {
                        specialist,
                        message: e.to_string(),
                    }
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(DispatchError::Http {
                specialist,
                status: status.as_u16(),
            });
        }

        response
            .json::<SpecialistResponse>()
            .await
            .map_err(|e| DispatchError::Decode {
                specialist,
                message: e.to_string(),
            })
    }
}
