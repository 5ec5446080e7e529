//! Plan construction.
//!
//! The plan is a pure function of the job kind and input: a finite ordered
//! list of specialist calls. No I/O happens here, and no reasoning agent is
//! on the critical path; the conditional fan-out for `full_analysis` depends
//! only on which inputs are already parsed.

use thiserror::Error;

use crate::jobs::{JobInput, JobKind};
use crate::specialists::{AnalysisType, Specialist};

/// One specialist call in a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanStep {
    ExtractCv,
    ExtractJob,
    Analyze(AnalysisType),
    InterviewPrep,
    Charter,
}

impl PlanStep {
    pub fn specialist(&self) -> Specialist {
        match self {
            PlanStep::ExtractCv | PlanStep::ExtractJob => Specialist::Extractor,
            PlanStep::Analyze(_) => Specialist::Analyzer,
            PlanStep::InterviewPrep => Specialist::Interviewer,
            PlanStep::Charter => Specialist::Charter,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanError {
    #[error("unknown kind: {0}")]
    UnknownKind(String),

    #[error("{kind} requires {field} in the input")]
    MissingInput { kind: JobKind, field: &'static str },
}

/// Build the plan for a job.
///
/// For `full_analysis` the extraction steps are conditional: a text with no
/// matching parsed profile gets an extractor call, already-parsed profiles
/// skip straight to analysis.
pub fn build_plan(kind: &JobKind, input: &JobInput) -> Result<Vec<PlanStep>, PlanError> {
    let plan = match kind {
        JobKind::CvParse => {
            require(input.cv_text.is_some(), kind, "cv_text")?;
            vec![PlanStep::ExtractCv]
        }
        JobKind::JobParse => {
            require(input.job_text.is_some(), kind, "job_text")?;
            vec![PlanStep::ExtractJob]
        }
        JobKind::GapAnalysis => vec![PlanStep::Analyze(AnalysisType::GapAnalysis)],
        JobKind::CvRewrite => vec![PlanStep::Analyze(AnalysisType::CvRewrite)],
        JobKind::InterviewPrep => vec![PlanStep::InterviewPrep],
        JobKind::GetAnalytics => vec![PlanStep::Charter],
        JobKind::FullAnalysis => {
            let mut plan = Vec::with_capacity(4);
            if input.cv_text.is_some() && input.cv_profile.is_none() {
                plan.push(PlanStep::ExtractCv);
            }
            if input.job_text.is_some() && input.job_profile.is_none() {
                plan.push(PlanStep::ExtractJob);
            }
            plan.push(PlanStep::Analyze(AnalysisType::FullAnalysis));
            plan.push(PlanStep::InterviewPrep);
            plan
        }
        JobKind::Unknown(name) => return Err(PlanError::UnknownKind(name.clone())),
    };

    Ok(plan)
}

fn require(present: bool, kind: &JobKind, field: &'static str) -> Result<(), PlanError> {
    if present {
        Ok(())
    } else {
        Err(PlanError::MissingInput {
            kind: kind.clone(),
            field,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn input_with(cv_text: bool, job_text: bool, cv_profile: bool, job_profile: bool) -> JobInput {
        JobInput {
            cv_text: cv_text.then(|| "cv".to_string()),
            job_text: job_text.then(|| "job".to_string()),
            cv_profile: cv_profile.then(|| json!({"name": "Jane"})),
            job_profile: job_profile.then(|| json!({"company": "TechCo"})),
            ..Default::default()
        }
    }

    #[test]
    fn test_simple_kinds() {
        let input = input_with(true, true, false, false);

        assert_eq!(
            build_plan(&JobKind::CvParse, &input).unwrap(),
            vec![PlanStep::ExtractCv]
        );
        assert_eq!(
            build_plan(&JobKind::JobParse, &input).unwrap(),
            vec![PlanStep::ExtractJob]
        );
        assert_eq!(
            build_plan(&JobKind::GapAnalysis, &input).unwrap(),
            vec![PlanStep::Analyze(AnalysisType::GapAnalysis)]
        );
        assert_eq!(
            build_plan(&JobKind::CvRewrite, &input).unwrap(),
            vec![PlanStep::Analyze(AnalysisType::CvRewrite)]
        );
        assert_eq!(
            build_plan(&JobKind::InterviewPrep, &input).unwrap(),
            vec![PlanStep::InterviewPrep]
        );
        assert_eq!(
            build_plan(&JobKind::GetAnalytics, &input).unwrap(),
            vec![PlanStep::Charter]
        );
    }

    #[test]
    fn test_full_analysis_with_raw_texts() {
        let plan = build_plan(&JobKind::FullAnalysis, &input_with(true, true, false, false)).unwrap();
        assert_eq!(
            plan,
            vec![
                PlanStep::ExtractCv,
                PlanStep::ExtractJob,
                PlanStep::Analyze(AnalysisType::FullAnalysis),
                PlanStep::InterviewPrep,
            ]
        );
    }

    #[test]
    fn test_full_analysis_with_parsed_profiles() {
        // Profiles already parsed: no extractor calls
        let plan = build_plan(&JobKind::FullAnalysis, &input_with(true, true, true, true)).unwrap();
        assert_eq!(
            plan,
            vec![
                PlanStep::Analyze(AnalysisType::FullAnalysis),
                PlanStep::InterviewPrep,
            ]
        );
    }

    #[test]
    fn test_full_analysis_mixed() {
        // CV parsed, job posting still raw
        let plan = build_plan(&JobKind::FullAnalysis, &input_with(true, true, true, false)).unwrap();
        assert_eq!(
            plan,
            vec![
                PlanStep::ExtractJob,
                PlanStep::Analyze(AnalysisType::FullAnalysis),
                PlanStep::InterviewPrep,
            ]
        );
    }

    #[test]
    fn test_missing_required_text() {
        let err = build_plan(&JobKind::CvParse, &JobInput::default()).unwrap_err();
        assert!(matches!(err, PlanError::MissingInput { field: "cv_text", .. }));
    }

    #[test]
    fn test_unknown_kind() {
        let err = build_plan(&JobKind::Unknown("resume_magic".to_string()), &JobInput::default())
            .unwrap_err();
        assert_eq!(err.to_string(), "unknown kind: resume_magic");
    }
}
