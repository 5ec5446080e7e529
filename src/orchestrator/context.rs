//! In-memory working context for one job's plan execution.

use serde_json::Value;

use crate::jobs::JobInput;
use crate::specialists::{ExtractionType, SpecialistResponse};

/// Profiles and analysis results accumulated while a plan runs. Seeded from
/// the input envelope; extractor and analyzer results are merged in so each
/// later call observes everything the earlier calls produced.
#[derive(Debug, Clone, Default)]
pub struct WorkingContext {
    pub cv_profile: Option<Value>,
    pub job_profile: Option<Value>,
    pub gap_analysis: Option<Value>,
    pub applications_data: Option<Value>,
    pub user_id: Option<String>,
}

impl WorkingContext {
    pub fn from_input(input: &JobInput) -> Self {
        Self {
            cv_profile: input.cv_profile.clone(),
            job_profile: input.job_profile.clone(),
            gap_analysis: input.gap_analysis.clone(),
            applications_data: input.applications_data.clone(),
            user_id: input.user_id.clone(),
        }
    }

    /// Merge a freshly extracted profile.
    pub fn absorb_profile(&mut self, extraction: ExtractionType, profile: Value) {
        match extraction {
            ExtractionType::Cv => self.cv_profile = Some(profile),
            ExtractionType::Job => self.job_profile = Some(profile),
        }
    }

    /// Merge analyzer results so the interviewer sees the gap analysis.
    pub fn absorb_analysis(&mut self, response: &SpecialistResponse) {
        if let Some(gap) = &response.gap_analysis {
            self.gap_analysis = Some(gap.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_seeded_from_input() {
        let input = JobInput {
            cv_profile: Some(json!({"name": "Jane"})),
            user_id: Some("user-1".to_string()),
            ..Default::default()
        };

        let ctx = WorkingContext::from_input(&input);
        assert_eq!(ctx.cv_profile.unwrap()["name"], "Jane");
        assert!(ctx.job_profile.is_none());
        assert_eq!(ctx.user_id.as_deref(), Some("user-1"));
    }

    #[test]
    fn test_absorb_profiles_and_analysis() {
        let mut ctx = WorkingContext::default();

        ctx.absorb_profile(ExtractionType::Cv, json!({"name": "Jane"}));
        ctx.absorb_profile(ExtractionType::Job, json!({"company": "TechCo"}));
        assert!(ctx.cv_profile.is_some());
        assert!(ctx.job_profile.is_some());

        let response = SpecialistResponse {
            success: true,
            gap_analysis: Some(json!({"fit_score": 72})),
            ..Default::default()
        };
        ctx.absorb_analysis(&response);
        assert_eq!(ctx.gap_analysis.unwrap()["fit_score"], 72);
    }
}
