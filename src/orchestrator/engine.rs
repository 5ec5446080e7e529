//! Per-job processing: dequeue to terminal state.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::{json, Value};
use tracing::{debug, error, info, warn};

use crate::jobs::{JobKind, JobMessage, JobRecord, JobStatus, PayloadSlot};
use crate::observability::Metrics;
use crate::specialists::{
    invoke_with_retry, AnalyzerRequest, CharterRequest, ExtractionType, ExtractorRequest,
    InterviewerRequest, InterviewerTask, RetryPolicy, SpecialistClient, SpecialistRequest,
    SpecialistResponse, StepError,
};
use crate::store::{JobStore, StatusUpdate, StoreError};
use crate::trace::{JobTrace, Tracer};

use super::context::WorkingContext;
use super::plan::{build_plan, PlanError, PlanStep};

/// What the worker loop should do with the queue message after processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// The job reached a terminal state (or the message is poison):
    /// acknowledge and drop the message.
    Ack,
    /// Processing could not finish durably (store unavailable): leave the
    /// message for redelivery.
    Release,
}

/// Why a plan run did not complete cleanly.
enum PlanFailure {
    /// The job itself failed; the message becomes the record's `error`.
    Job(String),
    /// The store was unreachable mid-plan; the job stays `processing` and
    /// the message is redelivered.
    Store(StoreError),
}

impl From<StepError> for PlanFailure {
    fn from(e: StepError) -> Self {
        PlanFailure::Job(e.to_string())
    }
}

impl From<PlanError> for PlanFailure {
    fn from(e: PlanError) -> Self {
        PlanFailure::Job(e.to_string())
    }
}

/// Executes one job from dequeue to terminal state: load, transition, plan,
/// specialist calls with per-step persistence, mandatory-step enforcement,
/// finalization, trace flush.
pub struct Engine {
    store: Arc<JobStore>,
    specialists: Arc<dyn SpecialistClient>,
    tracer: Arc<Tracer>,
    retry: RetryPolicy,
    job_budget: Duration,
    metrics: Arc<Metrics>,
}

impl Engine {
    pub fn new(
        store: Arc<JobStore>,
        specialists: Arc<dyn SpecialistClient>,
        tracer: Arc<Tracer>,
        retry: RetryPolicy,
        job_budget: Duration,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            store,
            specialists,
            tracer,
            retry,
            job_budget,
            metrics,
        }
    }

    /// Process one queue message.
    pub async fn process(&self, message: &JobMessage, attempt: u32) -> Disposition {
        let job_id = message.job_id.as_str();

        if attempt > 1 {
            self.metrics.job_redelivered();
            info!(job_id, attempt, "Processing redelivered message");
        }

        let record = match self.store.get(job_id) {
            Ok(Some(record)) => record,
            Ok(None) => {
                warn!(job_id, "Job not found, dropping poison message");
                return Disposition::Ack;
            }
            Err(e) => {
                error!(job_id, error = %e, "Failed to load job");
                return Disposition::Release;
            }
        };

        if record.status.is_terminal() {
            debug!(job_id, status = %record.status, "Redelivery of a finished job");
            return Disposition::Ack;
        }

        // Claim the job. A same-state re-application succeeds (crash-recovery
        // redelivery of a `processing` job); a genuinely illegal transition
        // means another worker already finalized it.
        let record = match self.store.update_status(
            job_id,
            JobStatus::Processing,
            StatusUpdate::default(),
        ) {
            Ok(record) => record,
            Err(StoreError::IllegalTransition { from, .. }) => {
                info!(job_id, status = %from, "Job already owned elsewhere, dropping message");
                return Disposition::Ack;
            }
            Err(e) => {
                error!(job_id, error = %e, "Failed to claim job");
                return Disposition::Release;
            }
        };

        info!(job_id, kind = %record.kind, "Job processing started");

        let trace = self.tracer.job_trace(
            job_id,
            "career-orchestrator",
            json!({
                "job_id": job_id,
                "kind": record.kind.as_str(),
                "input": record.input.presence_flags(),
            }),
        );

        let outcome = match tokio::time::timeout(
            self.job_budget,
            self.run_plan(&record, &trace),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => {
                warn!(job_id, budget_secs = self.job_budget.as_secs(), "Job exceeded wall-clock budget");
                Err(PlanFailure::Job("timeout".to_string()))
            }
        };

        let disposition = self.finalize(job_id, outcome);
        self.tracer.flush(trace).await;
        disposition
    }

    fn finalize(&self, job_id: &str, outcome: Result<(), PlanFailure>) -> Disposition {
        let (status, update) = match outcome {
            Ok(()) => (JobStatus::Completed, StatusUpdate::default()),
            Err(PlanFailure::Job(message)) => {
                warn!(job_id, error = %message, "Job failed");
                (
                    JobStatus::Failed,
                    StatusUpdate {
                        error: Some(message),
                        ..Default::default()
                    },
                )
            }
            Err(PlanFailure::Store(e)) if e.is_unavailable() => {
                warn!(job_id, error = %e, "Store unavailable mid-plan, leaving message for redelivery");
                return Disposition::Release;
            }
            Err(PlanFailure::Store(e)) => {
                // e.g. the record went terminal under a concurrent worker
                warn!(job_id, error = %e, "Store rejected mid-plan write, dropping message");
                return Disposition::Ack;
            }
        };

        match self.store.update_status(job_id, status, update) {
            Ok(_) => {
                match status {
                    JobStatus::Completed => {
                        self.metrics.job_completed();
                        info!(job_id, "Job completed");
                    }
                    _ => self.metrics.job_failed(),
                }
                Disposition::Ack
            }
            Err(StoreError::IllegalTransition { from, .. }) => {
                // Another worker finalized the job first.
                info!(job_id, status = %from, "Job already finalized elsewhere");
                Disposition::Ack
            }
            Err(e) => {
                error!(job_id, error = %e, "Failed to finalize job");
                Disposition::Release
            }
        }
    }

    async fn run_plan(&self, record: &JobRecord, trace: &JobTrace) -> Result<(), PlanFailure> {
        let plan = build_plan(&record.kind, &record.input)?;
        debug!(job_id = %record.id, steps = plan.len(), "Plan built");

        let mut ctx = WorkingContext::from_input(&record.input);
        let total = plan.len().max(1);

        for (index, step) in plan.iter().enumerate() {
            self.execute_step(record, *step, &mut ctx, trace).await?;

            let progress = (((index + 1) * 90) / total) as u8;
            if let Err(e) = self.store.update_progress(&record.id, progress) {
                if e.is_unavailable() {
                    return Err(PlanFailure::Store(e));
                }
            }
        }

        // The interviewer is mandatory for full_analysis regardless of what
        // the plan executed: re-check the durable record and call directly
        // if the payload is missing.
        if record.kind == JobKind::FullAnalysis {
            self.ensure_interviewer(record, &ctx, trace).await?;
        }

        Ok(())
    }

    async fn execute_step(
        &self,
        record: &JobRecord,
        step: PlanStep,
        ctx: &mut WorkingContext,
        trace: &JobTrace,
    ) -> Result<(), PlanFailure> {
        let request = self.build_request(record, step, ctx, trace);
        let specialist = request.specialist();
        let input_payload = request.to_payload();
        let started_at = Utc::now();

        self.metrics.specialist_call();

        match invoke_with_retry(self.specialists.as_ref(), request, &self.retry).await {
            Ok(response) => {
                let output = serde_json::to_value(&response).unwrap_or(Value::Null);
                trace.record_invocation(specialist.name(), started_at, &input_payload, Some(&output), None);
                self.persist_step(record, step, ctx, response, trace)
            }
            Err(e) => {
                self.metrics.specialist_failure();
                let failure = e.to_string();
                trace.record_invocation(
                    specialist.name(),
                    started_at,
                    &input_payload,
                    None,
                    Some(failure.as_str()),
                );

                // Record the failure in the step's slot so a partial-plan
                // failure leaves a diagnosable record.
                let slot = slot_for_step(step);
                if let Err(store_err) = self
                    .store
                    .update_payload(&record.id, slot, json!({"error": e.message()}))
                {
                    if store_err.is_unavailable() {
                        return Err(PlanFailure::Store(store_err));
                    }
                }

                Err(e.into())
            }
        }
    }

    fn build_request(
        &self,
        record: &JobRecord,
        step: PlanStep,
        ctx: &WorkingContext,
        trace: &JobTrace,
    ) -> SpecialistRequest {
        let job_id = record.id.clone();
        let trace_ctx = trace.context();

        match step {
            PlanStep::ExtractCv => SpecialistRequest::Extractor(ExtractorRequest {
                extraction_type: ExtractionType::Cv,
                text: record.input.cv_text.clone().unwrap_or_default(),
                job_id,
                trace: trace_ctx,
            }),
            PlanStep::ExtractJob => SpecialistRequest::Extractor(ExtractorRequest {
                extraction_type: ExtractionType::Job,
                text: record.input.job_text.clone().unwrap_or_default(),
                job_id,
                trace: trace_ctx,
            }),
            PlanStep::Analyze(analysis_type) => SpecialistRequest::Analyzer(AnalyzerRequest {
                analysis_type,
                job_id,
                cv_profile: ctx.cv_profile.clone(),
                job_profile: ctx.job_profile.clone(),
                gap_analysis: ctx.gap_analysis.clone(),
                trace: trace_ctx,
            }),
            PlanStep::InterviewPrep => SpecialistRequest::Interviewer(InterviewerRequest {
                task: InterviewerTask::InterviewPrep,
                job_id,
                job_profile: ctx.job_profile.clone(),
                cv_profile: ctx.cv_profile.clone(),
                gap_analysis: ctx.gap_analysis.clone(),
                trace: trace_ctx,
            }),
            PlanStep::Charter => SpecialistRequest::Charter(CharterRequest {
                job_id,
                applications_data: ctx.applications_data.clone(),
                user_id: ctx.user_id.clone(),
                trace: trace_ctx,
            }),
        }
    }

    /// Persist a successful step's result into its payload slot and merge it
    /// into the working context.
    fn persist_step(
        &self,
        record: &JobRecord,
        step: PlanStep,
        ctx: &mut WorkingContext,
        response: SpecialistResponse,
        trace: &JobTrace,
    ) -> Result<(), PlanFailure> {
        let job_id = record.id.as_str();

        match step {
            PlanStep::ExtractCv | PlanStep::ExtractJob => {
                let extraction = if step == PlanStep::ExtractCv {
                    ExtractionType::Cv
                } else {
                    ExtractionType::Job
                };
                let key = match extraction {
                    ExtractionType::Cv => "cv_profile",
                    ExtractionType::Job => "job_profile",
                };

                // A success with no payload still claims the slot, as an
                // empty object.
                let profile = response.profile.unwrap_or_else(|| json!({}));
                self.store
                    .merge_extractor_payload(job_id, key, profile.clone())
                    .map_err(PlanFailure::Store)?;
                trace.record_store_write("merge-extractor_payload", true);
                ctx.absorb_profile(extraction, profile);
            }
            PlanStep::Analyze(_) => {
                let value = analyzer_slot_value(&response);
                self.store
                    .update_payload(job_id, PayloadSlot::Analyzer, value)
                    .map_err(PlanFailure::Store)?;
                trace.record_store_write("update-analyzer_payload", true);
                ctx.absorb_analysis(&response);

                if let Some(error) = &response.cv_rewrite_error {
                    warn!(job_id, error = %error, "CV rewrite failed inside analyzer, keeping gap analysis");
                }

                // Convenience mirror of the rewrite content
                if let Some(rewrite) = response.cv_rewrite {
                    self.store
                        .update_payload(job_id, PayloadSlot::Summary, rewrite)
                        .map_err(PlanFailure::Store)?;
                    trace.record_store_write("update-summary_payload", true);
                }
            }
            PlanStep::InterviewPrep => {
                let value = match response.interview_pack {
                    Some(pack) => json!({ "interview_pack": pack }),
                    None => json!({}),
                };
                self.store
                    .update_payload(job_id, PayloadSlot::Interviewer, value)
                    .map_err(PlanFailure::Store)?;
                trace.record_store_write("update-interviewer_payload", true);
            }
            PlanStep::Charter => {
                let value = match response.charts {
                    Some(charts) => json!({ "charts": charts }),
                    None => json!({}),
                };
                self.store
                    .update_payload(job_id, PayloadSlot::Charter, value)
                    .map_err(PlanFailure::Store)?;
                trace.record_store_write("update-charter_payload", true);
            }
        }

        Ok(())
    }

    /// Post-plan guarantee for `full_analysis`: if the interviewer payload is
    /// absent after the plan ran, invoke the interviewer directly.
    async fn ensure_interviewer(
        &self,
        record: &JobRecord,
        ctx: &WorkingContext,
        trace: &JobTrace,
    ) -> Result<(), PlanFailure> {
        let job_id = record.id.as_str();

        match self.store.read_payload(job_id, PayloadSlot::Interviewer) {
            Ok(Some(_)) => {
                debug!(job_id, "Interviewer payload present");
                return Ok(());
            }
            Ok(None) => {}
            Err(e) => return Err(PlanFailure::Store(e)),
        }

        info!(job_id, "Interviewer payload missing after plan, invoking directly");

        let request = SpecialistRequest::Interviewer(InterviewerRequest {
            task: InterviewerTask::InterviewPrep,
            job_id: record.id.clone(),
            job_profile: ctx.job_profile.clone(),
            cv_profile: ctx.cv_profile.clone(),
            gap_analysis: ctx.gap_analysis.clone(),
            trace: trace.context(),
        });

        let input_payload = request.to_payload();
        let started_at = Utc::now();
        self.metrics.specialist_call();

        match invoke_with_retry(self.specialists.as_ref(), request, &self.retry).await {
            Ok(response) => {
                let output = serde_json::to_value(&response).unwrap_or(Value::Null);
                trace.record_invocation("interviewer", started_at, &input_payload, Some(&output), None);

                let value = match response.interview_pack {
                    Some(pack) => json!({ "interview_pack": pack }),
                    None => json!({}),
                };
                self.store
                    .update_payload(job_id, PayloadSlot::Interviewer, value)
                    .map_err(PlanFailure::Store)?;
                trace.record_store_write("update-interviewer_payload", true);
                Ok(())
            }
            Err(e) => {
                self.metrics.specialist_failure();
                let failure = e.to_string();
                trace.record_invocation(
                    "interviewer",
                    started_at,
                    &input_payload,
                    None,
                    Some(failure.as_str()),
                );
                Err(e.into())
            }
        }
    }
}

fn slot_for_step(step: PlanStep) -> PayloadSlot {
    match step {
        PlanStep::ExtractCv | PlanStep::ExtractJob => PayloadSlot::Extractor,
        PlanStep::Analyze(_) => PayloadSlot::Analyzer,
        PlanStep::InterviewPrep => PayloadSlot::Interviewer,
        PlanStep::Charter => PayloadSlot::Charter,
    }
}

/// The analyzer slot records the result as-is: the gap analysis, the rewrite
/// when present, and the structured rewrite error when the rewrite half
/// failed. A success with no fields at all becomes an empty object.
fn analyzer_slot_value(response: &SpecialistResponse) -> Value {
    let mut map = serde_json::Map::new();
    if let Some(gap) = &response.gap_analysis {
        map.insert("gap_analysis".to_string(), gap.clone());
    }
    if let Some(rewrite) = &response.cv_rewrite {
        map.insert("cv_rewrite".to_string(), rewrite.clone());
    }
    if let Some(error) = &response.cv_rewrite_error {
        map.insert("cv_rewrite_error".to_string(), Value::String(error.clone()));
    }
    Value::Object(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::JobInput;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tempfile::TempDir;

    /// Always-succeeding interviewer stand-in that counts invocations.
    #[derive(Default)]
    struct CountingInterviewer {
        calls: AtomicU32,
    }

    #[async_trait]
    impl SpecialistClient for CountingInterviewer {
        async fn invoke(
            &self,
            _request: SpecialistRequest,
        ) -> Result<SpecialistResponse, crate::specialists::DispatchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(SpecialistResponse {
                success: true,
                interview_pack: Some(json!({"questions": ["Q1"], "focus_areas": ["F1"]})),
                ..Default::default()
            })
        }
    }

    fn enforcement_fixture() -> (Engine, Arc<JobStore>, Arc<CountingInterviewer>, TempDir) {
        let temp = TempDir::new().unwrap();
        let store = Arc::new(JobStore::open(temp.path().join("store")).unwrap());
        let specialists = Arc::new(CountingInterviewer::default());
        let engine = Engine::new(
            store.clone(),
            specialists.clone() as Arc<dyn SpecialistClient>,
            Arc::new(Tracer::disabled()),
            RetryPolicy {
                initial_delay: Duration::from_millis(1),
                multiplier: 2,
                max_delay: Duration::from_millis(2),
                max_attempts: 2,
            },
            Duration::from_secs(5),
            Arc::new(crate::observability::Metrics::new()),
        );
        (engine, store, specialists, temp)
    }

    fn full_analysis_record(store: &JobStore) -> JobRecord {
        let id = store
            .create(
                "user-1",
                JobKind::FullAnalysis,
                JobInput {
                    cv_profile: Some(json!({"name": "Jane"})),
                    job_profile: Some(json!({"company": "TechCo"})),
                    ..Default::default()
                },
            )
            .unwrap();
        store
            .update_status(&id, JobStatus::Processing, StatusUpdate::default())
            .unwrap()
    }

    /// The plan executor skipped the interviewer (simulated by the payload
    /// slot being absent post-plan): enforcement invokes it directly.
    #[tokio::test]
    async fn test_enforcement_invokes_interviewer_when_payload_missing() {
        let (engine, store, specialists, _temp) = enforcement_fixture();
        let record = full_analysis_record(&store);
        let ctx = WorkingContext::from_input(&record.input);
        let trace = engine.tracer.job_trace(&record.id, "career-orchestrator", json!({}));

        engine
            .ensure_interviewer(&record, &ctx, &trace)
            .await
            .map_err(|_| "enforcement failed")
            .unwrap();

        assert_eq!(specialists.calls.load(Ordering::SeqCst), 1);
        let payload = store
            .read_payload(&record.id, PayloadSlot::Interviewer)
            .unwrap()
            .unwrap();
        assert!(payload["interview_pack"]["questions"].is_array());
    }

    #[tokio::test]
    async fn test_enforcement_skips_when_payload_present() {
        let (engine, store, specialists, _temp) = enforcement_fixture();
        let record = full_analysis_record(&store);
        store
            .update_payload(
                &record.id,
                PayloadSlot::Interviewer,
                json!({"interview_pack": {"questions": []}}),
            )
            .unwrap();

        let ctx = WorkingContext::from_input(&record.input);
        let trace = engine.tracer.job_trace(&record.id, "career-orchestrator", json!({}));

        engine
            .ensure_interviewer(&record, &ctx, &trace)
            .await
            .map_err(|_| "enforcement failed")
            .unwrap();

        assert_eq!(specialists.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_analyzer_slot_value_partial_success() {
        let response = SpecialistResponse {
            success: true,
            gap_analysis: Some(json!({"fit_score": 72})),
            cv_rewrite: None,
            cv_rewrite_error: Some("timeout".to_string()),
            ..Default::default()
        };

        let value = analyzer_slot_value(&response);
        assert_eq!(value["gap_analysis"]["fit_score"], 72);
        assert_eq!(value["cv_rewrite_error"], "timeout");
        assert!(value.get("cv_rewrite").is_none());
    }

    #[test]
    fn test_analyzer_slot_value_empty_success() {
        let value = analyzer_slot_value(&SpecialistResponse::ok());
        assert_eq!(value, json!({}));
    }
}
