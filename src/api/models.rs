//! API models for Careerflow's job submission and read endpoints.
//!
//! - `POST /jobs` accepts a [`CreateJobRequest`] and returns a
//!   [`JobAcceptedResponse`] once the record is persisted and enqueued
//! - `GET /jobs/{job_id}` returns the full job record, payload slots included
//! - `GET /jobs?owner=...` lists an owner's jobs, newest first
//!
//! A submission example (as JSON):
//!
//! ```json
//! {
//!   "owner": "user_2x8f...",
//!   "kind": "full_analysis",
//!   "input": {
//!     "cv_text": "Jane Doe\nSkills: Python, Kubernetes...",
//!     "job_text": "Senior Engineer at TechCo..."
//!   }
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::jobs::{JobInput, JobRecord};

#[derive(Debug, Clone, Deserialize)]
pub struct CreateJobRequest {
    pub owner: String,
    pub kind: String,
    #[serde(default)]
    pub input: JobInput,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct JobAcceptedResponse {
    pub job_id: String,
    pub kind: String,
    pub status: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct JobListResponse {
    pub jobs: Vec<JobRecord>,
}

#[derive(Debug, Deserialize)]
pub struct ListJobsParams {
    pub owner: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub components: HashMap<String, String>,
    pub version: String,
}
