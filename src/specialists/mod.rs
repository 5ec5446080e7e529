//! Specialist worker dispatch
//!
//! The orchestrator fans work out to four independent specialist services:
//!
//! - `extractor` - parses CV / job-posting text into structured profiles
//! - `analyzer` - gap analysis and CV rewriting
//! - `interviewer` - interview preparation packs
//! - `charter` - aggregate application analytics
//!
//! Each is a black box behind one RPC (`invoke(request) -> response`),
//! reached over HTTP here. Transient failures (rate limits, transport,
//! deadlines) are retried with exponential backoff; permanent failures fail
//! the step immediately.

mod classify;
mod client;
mod dispatch;
mod types;

pub use classify::{classify_marker, ErrorClass};
pub use client::{DispatchError, HttpSpecialists, SpecialistClient};
pub use dispatch::{invoke_with_retry, RetryPolicy, StepError};
pub use types::{
    AnalysisType, AnalyzerRequest, CharterRequest, ExtractionType, ExtractorRequest,
    InterviewerRequest, InterviewerTask, Specialist, SpecialistRequest, SpecialistResponse,
};
