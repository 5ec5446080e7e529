//! Core job domain types shared by the API, the job store, and the
//! orchestrator: job kinds, the status state machine, the input envelope,
//! and the per-specialist payload slots.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// The category of work a job performs. Determines the plan.
///
/// Unrecognized kinds survive deserialization as [`JobKind::Unknown`] so a
/// record written by a newer (or broken) producer still loads; planning then
/// fails the job instead of poisoning the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobKind {
    CvParse,
    JobParse,
    GapAnalysis,
    CvRewrite,
    InterviewPrep,
    GetAnalytics,
    FullAnalysis,
    Unknown(String),
}

impl JobKind {
    pub fn parse(s: &str) -> Self {
        match s {
            "cv_parse" => JobKind::CvParse,
            "job_parse" => JobKind::JobParse,
            "gap_analysis" => JobKind::GapAnalysis,
            "cv_rewrite" => JobKind::CvRewrite,
            "interview_prep" => JobKind::InterviewPrep,
            "get_analytics" => JobKind::GetAnalytics,
            "full_analysis" => JobKind::FullAnalysis,
            other => JobKind::Unknown(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            JobKind::CvParse => "cv_parse",
            JobKind::JobParse => "job_parse",
            JobKind::GapAnalysis => "gap_analysis",
            JobKind::CvRewrite => "cv_rewrite",
            JobKind::InterviewPrep => "interview_prep",
            JobKind::GetAnalytics => "get_analytics",
            JobKind::FullAnalysis => "full_analysis",
            JobKind::Unknown(s) => s,
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for JobKind {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for JobKind {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(JobKind::parse(&s))
    }
}

/// Job lifecycle status.
///
/// Legal transitions: `pending → processing → {completed, failed}`.
/// Terminal states never transition again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// Whether `self → to` is a legal state-machine step.
    /// A same-state "transition" is not a step; callers treat it as an
    /// idempotent re-application.
    pub fn can_transition_to(&self, to: JobStatus) -> bool {
        matches!(
            (self, to),
            (JobStatus::Pending, JobStatus::Processing)
                | (JobStatus::Processing, JobStatus::Completed)
                | (JobStatus::Processing, JobStatus::Failed)
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Named payload slot in the job record, one per specialist plus the
/// convenience summary slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayloadSlot {
    Extractor,
    Analyzer,
    Interviewer,
    Charter,
    Summary,
}

impl PayloadSlot {
    pub fn field_name(&self) -> &'static str {
        match self {
            PayloadSlot::Extractor => "extractor_payload",
            PayloadSlot::Analyzer => "analyzer_payload",
            PayloadSlot::Interviewer => "interviewer_payload",
            PayloadSlot::Charter => "charter_payload",
            PayloadSlot::Summary => "summary_payload",
        }
    }
}

/// Structured input envelope. Shape depends on the job kind; every field is
/// optional and the planner uses whichever are present.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobInput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cv_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cv_profile: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_profile: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gap_analysis: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub applications_data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

impl JobInput {
    /// Input-presence flags, attached to the root trace span so a trace
    /// reader can see what the plan was built from.
    pub fn presence_flags(&self) -> Value {
        serde_json::json!({
            "has_cv_text": self.cv_text.is_some(),
            "has_job_text": self.job_text.is_some(),
            "has_cv_profile": self.cv_profile.is_some(),
            "has_job_profile": self.job_profile.is_some(),
            "has_gap_analysis": self.gap_analysis.is_some(),
        })
    }
}

/// Durable job record. The job store is the source of truth; the
/// orchestrator holds an in-memory copy only for the duration of one
/// dequeue lease.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: String,
    pub owner: String,
    pub kind: JobKind,
    pub status: JobStatus,
    pub progress: u8,
    pub input: JobInput,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extractor_payload: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analyzer_payload: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interviewer_payload: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub charter_payload: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary_payload: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl JobRecord {
    pub fn payload(&self, slot: PayloadSlot) -> Option<&Value> {
        match slot {
            PayloadSlot::Extractor => self.extractor_payload.as_ref(),
            PayloadSlot::Analyzer => self.analyzer_payload.as_ref(),
            PayloadSlot::Interviewer => self.interviewer_payload.as_ref(),
            PayloadSlot::Charter => self.charter_payload.as_ref(),
            PayloadSlot::Summary => self.summary_payload.as_ref(),
        }
    }

    pub fn set_payload(&mut self, slot: PayloadSlot, value: Value) {
        let field = match slot {
            PayloadSlot::Extractor => &mut self.extractor_payload,
            PayloadSlot::Analyzer => &mut self.analyzer_payload,
            PayloadSlot::Interviewer => &mut self.interviewer_payload,
            PayloadSlot::Charter => &mut self.charter_payload,
            PayloadSlot::Summary => &mut self.summary_payload,
        };
        *field = Some(value);
    }
}

/// Queue message envelope. Only `job_id` is authoritative; `owner` and
/// `kind` are advisory hints usable before the store is reached.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobMessage {
    pub job_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_round_trip() {
        for s in [
            "cv_parse",
            "job_parse",
            "gap_analysis",
            "cv_rewrite",
            "interview_prep",
            "get_analytics",
            "full_analysis",
        ] {
            let kind = JobKind::parse(s);
            assert!(!matches!(kind, JobKind::Unknown(_)), "{s} parsed as unknown");
            assert_eq!(kind.as_str(), s);
        }
    }

    #[test]
    fn test_unknown_kind_preserves_string() {
        let kind = JobKind::parse("resume_magic");
        assert_eq!(kind, JobKind::Unknown("resume_magic".to_string()));
        assert_eq!(kind.as_str(), "resume_magic");

        let json = serde_json::to_string(&kind).unwrap();
        let back: JobKind = serde_json::from_str(&json).unwrap();
        assert_eq!(back, kind);
    }

    #[test]
    fn test_status_transitions() {
        use JobStatus::*;

        assert!(Pending.can_transition_to(Processing));
        assert!(Processing.can_transition_to(Completed));
        assert!(Processing.can_transition_to(Failed));

        assert!(!Pending.can_transition_to(Completed));
        assert!(!Pending.can_transition_to(Failed));
        assert!(!Completed.can_transition_to(Processing));
        assert!(!Failed.can_transition_to(Processing));
        assert!(!Completed.can_transition_to(Failed));
        assert!(!Processing.can_transition_to(Pending));
    }

    #[test]
    fn test_terminal_states() {
        assert!(!JobStatus::Pending.is_terminal());
        assert!(!JobStatus::Processing.is_terminal());
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
    }

    #[test]
    fn test_message_round_trip() {
        let msg = JobMessage {
            job_id: "job-1".to_string(),
            owner: Some("user-1".to_string()),
            kind: None,
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(!json.contains("kind"));

        let back: JobMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(back.job_id, "job-1");
        assert_eq!(back.owner.as_deref(), Some("user-1"));
    }
}
