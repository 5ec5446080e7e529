//! Typed request/response envelopes for the four specialist services.
//!
//! Each specialist exposes one RPC, `invoke(request) -> response`. The
//! orchestrator treats them as opaque and synchronous; requests carry the
//! propagated trace context by value.

use crate::trace::TraceContext;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// The four specialist services.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Specialist {
    Extractor,
    Analyzer,
    Interviewer,
    Charter,
}

impl Specialist {
    pub fn name(&self) -> &'static str {
        match self {
            Specialist::Extractor => "extractor",
            Specialist::Analyzer => "analyzer",
            Specialist::Interviewer => "interviewer",
            Specialist::Charter => "charter",
        }
    }
}

impl fmt::Display for Specialist {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionType {
    Cv,
    Job,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisType {
    GapAnalysis,
    CvRewrite,
    FullAnalysis,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterviewerTask {
    InterviewPrep,
    AnswerEvaluation,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractorRequest {
    #[serde(rename = "type")]
    pub extraction_type: ExtractionType,
    pub text: String,
    pub job_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace: Option<TraceContext>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzerRequest {
    #[serde(rename = "type")]
    pub analysis_type: AnalysisType,
    pub job_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cv_profile: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_profile: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gap_analysis: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace: Option<TraceContext>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterviewerRequest {
    #[serde(rename = "type")]
    pub task: InterviewerTask,
    pub job_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_profile: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cv_profile: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gap_analysis: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace: Option<TraceContext>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CharterRequest {
    pub job_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub applications_data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace: Option<TraceContext>,
}

/// Request to any specialist.
#[derive(Debug, Clone)]
pub enum SpecialistRequest {
    Extractor(ExtractorRequest),
    Analyzer(AnalyzerRequest),
    Interviewer(InterviewerRequest),
    Charter(CharterRequest),
}

impl SpecialistRequest {
    pub fn specialist(&self) -> Specialist {
        match self {
            SpecialistRequest::Extractor(_) => Specialist::Extractor,
            SpecialistRequest::Analyzer(_) => Specialist::Analyzer,
            SpecialistRequest::Interviewer(_) => Specialist::Interviewer,
            SpecialistRequest::Charter(_) => Specialist::Charter,
        }
    }

    pub fn job_id(&self) -> &str {
        match self {
            SpecialistRequest::Extractor(r) => &r.job_id,
            SpecialistRequest::Analyzer(r) => &r.job_id,
            SpecialistRequest::Interviewer(r) => &r.job_id,
            SpecialistRequest::Charter(r) => &r.job_id,
        }
    }

    pub fn trace(&self) -> Option<&TraceContext> {
        match self {
            SpecialistRequest::Extractor(r) => r.trace.as_ref(),
            SpecialistRequest::Analyzer(r) => r.trace.as_ref(),
            SpecialistRequest::Interviewer(r) => r.trace.as_ref(),
            SpecialistRequest::Charter(r) => r.trace.as_ref(),
        }
    }

    pub fn set_trace(&mut self, trace: Option<TraceContext>) {
        match self {
            SpecialistRequest::Extractor(r) => r.trace = trace,
            SpecialistRequest::Analyzer(r) => r.trace = trace,
            SpecialistRequest::Interviewer(r) => r.trace = trace,
            SpecialistRequest::Charter(r) => r.trace = trace,
        }
    }

    /// Wire payload for the specialist's `invoke` endpoint.
    pub fn to_payload(&self) -> Value {
        match self {
            SpecialistRequest::Extractor(r) => serde_json::to_value(r),
            SpecialistRequest::Analyzer(r) => serde_json::to_value(r),
            SpecialistRequest::Interviewer(r) => serde_json::to_value(r),
            SpecialistRequest::Charter(r) => serde_json::to_value(r),
        }
        .unwrap_or(Value::Null)
    }
}

/// Response envelope shared by all specialists: a `success` flag, an
/// optional `error` marker, and whatever typed result fields the specialist
/// produces. Absent fields deserialize as `None`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SpecialistResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gap_analysis: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cv_rewrite: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cv_rewrite_error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interview_pack: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evaluation: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub charts: Option<Value>,
}

impl SpecialistResponse {
    pub fn ok() -> Self {
        Self {
            success: true,
            ..Default::default()
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extractor_request_wire_shape() {
        let request = SpecialistRequest::Extractor(ExtractorRequest {
            extraction_type: ExtractionType::Cv,
            text: "Jane Doe".to_string(),
            job_id: "job-1".to_string(),
            trace: Some(TraceContext {
                trace_id: "t1".to_string(),
                parent_span_id: "s1".to_string(),
            }),
        });

        let payload = request.to_payload();
        assert_eq!(payload["type"], "cv");
        assert_eq!(payload["text"], "Jane Doe");
        assert_eq!(payload["job_id"], "job-1");
        assert_eq!(payload["trace"]["trace_id"], "t1");
        assert_eq!(payload["trace"]["parent_span_id"], "s1");
    }

    #[test]
    fn test_analyzer_request_omits_absent_fields() {
        let request = SpecialistRequest::Analyzer(AnalyzerRequest {
            analysis_type: AnalysisType::FullAnalysis,
            job_id: "job-1".to_string(),
            cv_profile: Some(json!({"name": "Jane"})),
            job_profile: Some(json!({"company": "TechCo"})),
            gap_analysis: None,
            trace: None,
        });

        let payload = request.to_payload();
        assert_eq!(payload["type"], "full_analysis");
        assert!(payload.get("gap_analysis").is_none());
        assert!(payload.get("trace").is_none());
    }

    #[test]
    fn test_response_with_partial_success_fields() {
        let raw = json!({
            "success": true,
            "gap_analysis": {"fit_score": 72},
            "cv_rewrite": null,
            "cv_rewrite_error": "timeout"
        });

        let response: SpecialistResponse = serde_json::from_value(raw).unwrap();
        assert!(response.success);
        assert!(response.gap_analysis.is_some());
        assert!(response.cv_rewrite.is_none());
        assert_eq!(response.cv_rewrite_error.as_deref(), Some("timeout"));
    }

    #[test]
    fn test_response_with_unknown_fields_still_decodes() {
        let raw = json!({"success": true, "mock": true, "agent": "extractor"});
        let response: SpecialistResponse = serde_json::from_value(raw).unwrap();
        assert!(response.success);
        assert!(response.profile.is_none());
    }
}
