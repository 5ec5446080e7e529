use axum::{Json, extract::State, http::HeaderMap, response::IntoResponse};
use http_body_util::BodyExt;

use super::{
    models::{CreateJobRequest, JobAcceptedResponse, JobListResponse, ListJobsParams},
    state::AppState,
};
use crate::api::error::ApiError;
use crate::jobs::{JobKind, JobMessage, JobStatus};
use crate::orchestrator::{build_plan, PlanError};

/// Primary job submission endpoint (POST /jobs)
///
/// ## Flow:
/// 1. Validate Content-Type and payload size
/// 2. Check idempotency - return the existing job if the key matches
/// 3. Parse the `{owner, kind, input}` envelope; reject unknown kinds and
///    inputs the plan builder cannot use
/// 4. Create the record in `pending` and enqueue its id for the
///    orchestrator workers
/// 5. Return 202 Accepted with the job id
///
/// ## Idempotency:
/// If X-Careerflow-Idempotency-Key is provided and matches an existing job,
/// the existing job is returned without creating a duplicate. This keeps
/// client retries of POST safe.
pub async fn create_job(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: axum::body::Body,
) -> Result<impl IntoResponse, ApiError> {
    let content_type = headers
        .get(axum::http::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::InvalidPayload("missing Content-Type header".into()))?;

    super::utils::parse_content_type(content_type)?;

    let idempotency_key = headers
        .get("X-Careerflow-Idempotency-Key")
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned)
        .filter(|value| !value.is_empty());

    // Idempotency check: if we've seen this key before, return the existing job
    if let Some(ref key) = idempotency_key {
        if let Ok(Some(existing_job_id)) = state.store.get_idempotent(key) {
            if let Ok(Some(existing)) = state.store.get(&existing_job_id) {
                let response = JobAcceptedResponse {
                    job_id: existing.id,
                    kind: existing.kind.as_str().to_string(),
                    status: existing.status.to_string(),
                };
                return Ok((axum::http::StatusCode::ACCEPTED, Json(response)));
            }
        }
    }

    let body_bytes = read_body(
        body,
        state.config.server.api.max_payload_bytes.as_u64() as usize,
    )
    .await?;

    let request: CreateJobRequest = serde_json::from_slice(&body_bytes)?;

    if request.owner.trim().is_empty() {
        return Err(ApiError::InvalidPayload("owner is required".into()));
    }

    let kind = JobKind::parse(&request.kind);
    if matches!(kind, JobKind::Unknown(_)) {
        return Err(ApiError::UnsupportedKind(request.kind));
    }

    // The plan builder doubles as input validation: a kind whose required
    // inputs are missing is rejected here instead of failing the job later.
    if let Err(e) = build_plan(&kind, &request.input) {
        return Err(match e {
            PlanError::UnknownKind(kind) => ApiError::UnsupportedKind(kind),
            PlanError::MissingInput { .. } => ApiError::InvalidPayload(e.to_string()),
        });
    }

    let job_id = state
        .store
        .create(&request.owner, kind.clone(), request.input)
        .map_err(|e| ApiError::Internal(format!("Failed to create job: {}", e)))?;

    // The idempotency mapping is written before the message goes out so a
    // retried POST never double-enqueues.
    if let Some(ref key) = idempotency_key {
        state
            .store
            .remember_idempotency(key, &job_id)
            .map_err(|e| ApiError::Internal(format!("Failed to store idempotency key: {}", e)))?;
    }

    let message = JobMessage {
        job_id: job_id.clone(),
        owner: Some(request.owner),
        kind: Some(kind.as_str().to_string()),
    };
    state
        .queue
        .enqueue(&message)
        .map_err(|e| ApiError::Internal(format!("Failed to enqueue job: {}", e)))?;

    state.metrics.job_accepted();

    let response = JobAcceptedResponse {
        job_id,
        kind: kind.as_str().to_string(),
        status: JobStatus::Pending.to_string(),
    };

    Ok((axum::http::StatusCode::ACCEPTED, Json(response)))
}

/// Reads request body and validates size
///
/// Note: Decompression is handled transparently by RequestDecompressionLayer
/// middleware, so this function receives already-decompressed data.
async fn read_body(body: axum::body::Body, max_size: usize) -> Result<Vec<u8>, ApiError> {
    let data = body
        .collect()
        .await
        .map_err(|err| ApiError::Internal(err.to_string()))?
        .to_bytes()
        .to_vec();

    super::utils::validate_body_size(&data, max_size)?;

    Ok(data)
}

/// Job status endpoint (GET /jobs/{job_id})
///
/// Returns the full job record: status, progress, timestamps, error, and
/// every populated payload slot.
pub async fn get_job(
    State(state): State<AppState>,
    axum::extract::Path(job_id): axum::extract::Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let record = state
        .store
        .get(&job_id)
        .map_err(|e| ApiError::Internal(format!("Failed to get job: {}", e)))?
        .ok_or_else(|| ApiError::NotFound(format!("job {job_id}")))?;

    Ok((axum::http::StatusCode::OK, Json(record)))
}

/// Owner listing endpoint (GET /jobs?owner=...)
pub async fn list_jobs(
    State(state): State<AppState>,
    axum::extract::Query(params): axum::extract::Query<ListJobsParams>,
) -> Result<impl IntoResponse, ApiError> {
    let status = match params.status.as_deref() {
        None => None,
        Some("pending") => Some(JobStatus::Pending),
        Some("processing") => Some(JobStatus::Processing),
        Some("completed") => Some(JobStatus::Completed),
        Some("failed") => Some(JobStatus::Failed),
        Some(other) => {
            return Err(ApiError::InvalidPayload(format!("invalid status filter: {other}")));
        }
    };

    let kind = params.kind.as_deref().map(JobKind::parse);
    let limit = params.limit.unwrap_or(20).min(100);

    let jobs = state
        .store
        .list_by_owner(&params.owner, status, kind.as_ref(), limit)
        .map_err(|e| ApiError::Internal(format!("Failed to list jobs: {}", e)))?;

    Ok((axum::http::StatusCode::OK, Json(JobListResponse { jobs })))
}

/// Health check endpoint (GET /health)
///
/// Returns 503 Service Unavailable if the store or queue is unhealthy,
/// 200 OK otherwise.
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    use std::collections::HashMap;

    let mut components = HashMap::new();

    components.insert(
        "store".to_string(),
        match state.store.job_count() {
            Ok(_) => "healthy".to_string(),
            Err(e) => format!("unhealthy: {e}"),
        },
    );
    components.insert(
        "queue".to_string(),
        match state.queue.health_check() {
            Ok(()) => "healthy".to_string(),
            Err(e) => format!("unhealthy: {e}"),
        },
    );

    let all_healthy = components.values().all(|status| status == "healthy");
    let status_code = if all_healthy {
        axum::http::StatusCode::OK
    } else {
        axum::http::StatusCode::SERVICE_UNAVAILABLE
    };

    let response = super::models::HealthResponse {
        status: if all_healthy { "healthy" } else { "unhealthy" }.to_string(),
        components,
        version: env!("CARGO_PKG_VERSION").to_string(),
    };

    (status_code, Json(response))
}
