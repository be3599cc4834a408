//! Integration tests for the full case pipeline.
//!
//! Tests: Admission → Queue → Pipeline (retrieval, inference, QC) → Output → Resolver
//!
//! Verifies:
//! - Terminal states and error codes for every pipeline outcome
//! - Retrieval is skipped without text
//! - Outputs resolve per job when a case has several
//! - The polling worker survives failing jobs

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use chrono::Utc;
    use serde_json::json;
    use tokio::sync::Mutex;

    use caseflow_ai::{
        InferenceError, InferenceGateway, InferenceProvider, InferenceRequest, InferenceResult,
        ProviderKind,
    };
    use caseflow_core::{Artifact, ArtifactKind, JobStage, JobState, NewDocument};

    use crate::admission::{ImageUpload, Submission};
    use crate::bootstrap::{Backends, Services};
    use crate::pipeline::PipelineSettings;
    use crate::workers::{PollWorker, Sleeper};

    /// Provider that answers with fixed findings (or a fixed error) and records requests.
    struct ScriptedProvider {
        answer: Result<Vec<String>, InferenceError>,
        seen: Mutex<Vec<InferenceRequest>>,
    }

    impl ScriptedProvider {
        fn findings(findings: &[&str]) -> Arc<Self> {
            Arc::new(Self {
                answer: Ok(findings.iter().map(|f| f.to_string()).collect()),
                seen: Mutex::new(Vec::new()),
            })
        }

        fn failing(err: InferenceError) -> Arc<Self> {
            Arc::new(Self {
                answer: Err(err),
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait::async_trait]
    impl InferenceProvider for ScriptedProvider {
        async fn infer(&self, request: &InferenceRequest) -> Result<InferenceResult, InferenceError> {
            self.seen.lock().await.push(request.clone());
            let findings = self.answer.clone()?;
            Ok(InferenceResult {
                case_id: request.case_id.to_string(),
                summary: "scripted".into(),
                findings,
                confidence: 0.5,
                run_mode: "scripted".into(),
                model_source: "test://scripted".into(),
                generated_token_count: 12,
                used_fallback: true,
                raw_text: None,
                raw_text_with_markup: None,
            })
        }
    }

    const PASSING: &[&str] = &["病灶较前缩小，变化趋势稳定。"];
    const DANGEROUS: &[&str] = &["病灶较前增大，无法判断性质，需要进一步检查。"];

    struct Harness {
        services: Services,
        backends: Backends,
    }

    fn harness(provider: Arc<ScriptedProvider>, settings: PipelineSettings) -> Harness {
        let backends = Backends::in_memory();
        let gateway = InferenceGateway::new(provider, ProviderKind::Remote, Duration::from_secs(5));
        Harness {
            services: Services::new(backends.clone(), gateway, settings, true),
            backends,
        }
    }

    fn notes_submission(notes: &str) -> Submission {
        Submission {
            subject_ref: "p-001".into(),
            notes: Some(notes.into()),
            ..Submission::default()
        }
    }

    fn image_submission() -> Submission {
        Submission {
            subject_ref: "p-002".into(),
            images: vec![ImageUpload {
                file_name: "ct.png".into(),
                bytes: vec![0x89, 0x50, 0x4e, 0x47],
            }],
            ..Submission::default()
        }
    }

    #[tokio::test]
    async fn text_job_succeeds_with_retrieval_trace() {
        let provider = ScriptedProvider::findings(PASSING);
        let h = harness(provider.clone(), PipelineSettings::default());
        h.services
            .knowledge
            .ingest(NewDocument {
                source: "guideline".into(),
                source_version: None,
                title: "结节随访".into(),
                body: "病灶 变化 随访间隔".into(),
            })
            .await
            .unwrap();

        let receipt = h.services.admission.submit(notes_submission("病灶 变化")).await.unwrap();
        let summary = h.services.pipeline.process_next().await.unwrap().unwrap();

        assert_eq!(summary.job_id, receipt.job.job_id);
        assert_eq!(summary.state, JobState::Succeeded);
        assert_eq!(summary.error_code, None);

        let seen = provider.seen.lock().await;
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].notes.as_deref(), Some("病灶 变化"));
        assert!(seen[0].context.as_deref().unwrap().starts_with("[1] 结节随访"));
        drop(seen);

        let payload = h.services.resolver.resolve(receipt.job.job_id).await.unwrap().unwrap();
        assert_eq!(payload["job_id"], json!(receipt.job.job_id.to_string()));
        assert_eq!(payload["case_id"], json!(receipt.case.case_id.to_string()));
        assert_eq!(payload["qc_status"], "pass");
        assert_eq!(payload["qc_issues"], json!([]));
        assert_eq!(payload["rag"]["query"], "病灶 变化");
        assert_eq!(payload["rag"]["hits"][0]["score"], json!(2.0));
        assert_eq!(payload["observability"]["inference_runtime"]["run_mode"], "scripted");
        assert_eq!(payload["observability"]["inference_runtime"]["used_fallback"], true);
        assert!(payload["observability"]["durations_ms"]["total"].is_u64());
        assert_eq!(payload["inference"]["findings"], json!(PASSING));
    }

    #[tokio::test]
    async fn image_only_job_skips_retrieval() {
        let provider = ScriptedProvider::findings(PASSING);
        let h = harness(provider.clone(), PipelineSettings::default());
        let receipt = h.services.admission.submit(image_submission()).await.unwrap();

        let summary = h.services.pipeline.process_next().await.unwrap().unwrap();
        assert_eq!(summary.state, JobState::Succeeded);

        let seen = provider.seen.lock().await;
        assert_eq!(seen[0].notes, None);
        assert_eq!(seen[0].context, None);
        assert_eq!(seen[0].images.len(), 1);
        assert_eq!(seen[0].images[0].file_name, "ct.png");
        drop(seen);

        let payload = h.services.resolver.resolve(receipt.job.job_id).await.unwrap().unwrap();
        assert_eq!(payload["rag"]["query"], serde_json::Value::Null);
        assert_eq!(payload["rag"]["context"], serde_json::Value::Null);
        assert_eq!(payload["rag"]["hits"], json!([]));
    }

    #[tokio::test]
    async fn image_only_job_with_default_mock_reaches_a_terminal_state() {
        let services = Services::in_memory(PipelineSettings::default());
        let receipt = services.admission.submit(image_submission()).await.unwrap();
        let summary = services.pipeline.process_next().await.unwrap().unwrap();
        assert_eq!(summary.job_id, receipt.job.job_id);
        assert!(matches!(summary.state, JobState::Succeeded | JobState::Failed));
    }

    #[tokio::test]
    async fn provider_errors_fail_the_job_verbatim() {
        let provider = ScriptedProvider::failing(InferenceError::HttpStatus {
            status: 503,
            body: "busy".into(),
        });
        let h = harness(provider, PipelineSettings::default());
        let receipt = h.services.admission.submit(notes_submission("病灶")).await.unwrap();

        let summary = h.services.pipeline.process_next().await.unwrap().unwrap();
        assert_eq!(summary.state, JobState::Failed);
        assert_eq!(summary.error_code.as_deref(), Some("inference_http_status"));
        assert_eq!(summary.output, None);

        let job = h.services.machine.get(receipt.job.job_id).await.unwrap();
        assert_eq!(job.retry_count, 1);
        assert_eq!(h.services.resolver.resolve(job.job_id).await.unwrap(), None);
    }

    #[tokio::test]
    async fn blocked_findings_fail_but_keep_the_output() {
        let h = harness(ScriptedProvider::findings(DANGEROUS), PipelineSettings::default());
        let receipt = h.services.admission.submit(notes_submission("病灶")).await.unwrap();

        let summary = h.services.pipeline.process_next().await.unwrap().unwrap();
        assert_eq!(summary.state, JobState::Failed);
        assert_eq!(summary.error_code.as_deref(), Some("qc_blocked"));
        assert!(summary.output.is_some());

        let payload = h.services.resolver.resolve(receipt.job.job_id).await.unwrap().unwrap();
        assert_eq!(payload["qc_status"], "blocked");
        assert!(
            payload["qc_issues"]
                .as_array()
                .unwrap()
                .contains(&json!("safety:danger_flag:无法判断"))
        );
    }

    #[tokio::test]
    async fn downgrade_turns_blocked_into_review() {
        let settings = PipelineSettings {
            downgrade_blocked: true,
            ..PipelineSettings::default()
        };
        let h = harness(ScriptedProvider::findings(DANGEROUS), settings);
        let receipt = h.services.admission.submit(notes_submission("病灶")).await.unwrap();

        let summary = h.services.pipeline.process_next().await.unwrap().unwrap();
        assert_eq!(summary.state, JobState::Succeeded);

        let payload = h.services.resolver.resolve(receipt.job.job_id).await.unwrap().unwrap();
        assert_eq!(payload["qc_status"], "review_required");
        let safety = payload["qc_issue_groups"]["safety"].as_array().unwrap();
        assert_eq!(safety.last().unwrap(), "blocked_downgraded");
    }

    #[tokio::test]
    async fn vanished_inputs_fail_without_inference() {
        let provider = ScriptedProvider::findings(PASSING);
        let h = harness(provider.clone(), PipelineSettings::default());
        let receipt = h.services.admission.submit(image_submission()).await.unwrap();
        for artifact in &receipt.artifacts {
            h.backends.blobs.delete(&artifact.locator).await.unwrap();
        }

        let summary = h.services.pipeline.process_next().await.unwrap().unwrap();
        assert_eq!(summary.state, JobState::Failed);
        assert_eq!(summary.error_code.as_deref(), Some("missing_input_modalities"));
        assert!(provider.seen.lock().await.is_empty());
    }

    #[tokio::test]
    async fn empty_queue_is_a_no_op() {
        let h = harness(ScriptedProvider::findings(PASSING), PipelineSettings::default());
        assert_eq!(h.services.pipeline.process_next().await.unwrap(), None);
    }

    #[tokio::test]
    async fn two_jobs_on_one_case_resolve_to_their_own_outputs() {
        let h = harness(ScriptedProvider::findings(PASSING), PipelineSettings::default());
        let first = h.services.admission.submit(notes_submission("病灶 变化")).await.unwrap();
        let second = h
            .services
            .machine
            .create_with_idempotency(first.case.case_id, JobStage::inference(), "rerun-1")
            .await
            .unwrap();
        assert!(second.created);

        h.services.pipeline.process_next().await.unwrap().unwrap();
        h.services.pipeline.process_next().await.unwrap().unwrap();

        let a = h.services.resolver.resolve(first.job.job_id).await.unwrap().unwrap();
        let b = h.services.resolver.resolve(second.job.job_id).await.unwrap().unwrap();
        assert_eq!(a["job_id"], json!(first.job.job_id.to_string()));
        assert_eq!(b["job_id"], json!(second.job.job_id.to_string()));

        let outputs = h
            .backends
            .artifacts
            .list(first.case.case_id, ArtifactKind::AgentOutput)
            .await
            .unwrap();
        assert_eq!(outputs.len(), 2);
    }

    #[tokio::test]
    async fn untagged_output_is_a_fallback_only() {
        let h = harness(ScriptedProvider::findings(PASSING), PipelineSettings::default());
        let receipt = h.services.admission.submit(notes_submission("病灶")).await.unwrap();
        let case_id = receipt.case.case_id;

        // nothing yet
        assert_eq!(h.services.resolver.resolve(receipt.job.job_id).await.unwrap(), None);

        let write = |payload: Vec<u8>| {
            let backends = h.backends.clone();
            async move {
                let locator = backends
                    .blobs
                    .put_bytes(case_id, "agent_output.json", &payload)
                    .await
                    .unwrap();
                let artifact =
                    Artifact::new(case_id, ArtifactKind::AgentOutput, "agent_output.json", locator, Utc::now());
                backends.artifacts.insert(&artifact).await.unwrap();
            }
        };

        write(serde_json::to_vec(&json!({ "summary": "legacy-old" })).unwrap()).await;
        write(serde_json::to_vec(&json!({ "summary": "legacy-new" })).unwrap()).await;
        write(serde_json::to_vec(&json!(["not", "an", "object"])).unwrap()).await;
        write(b"{ broken".to_vec()).await;
        write(serde_json::to_vec(&json!({ "job_id": "someone-else" })).unwrap()).await;

        let fallback = h.services.resolver.resolve(receipt.job.job_id).await.unwrap().unwrap();
        assert_eq!(fallback["summary"], "legacy-new");

        h.services.pipeline.process_next().await.unwrap().unwrap();
        let exact = h.services.resolver.resolve(receipt.job.job_id).await.unwrap().unwrap();
        assert_eq!(exact["job_id"], json!(receipt.job.job_id.to_string()));
    }

    #[tokio::test]
    async fn unknown_job_has_no_output() {
        let h = harness(ScriptedProvider::findings(PASSING), PipelineSettings::default());
        let resolved = h
            .services
            .resolver
            .resolve(caseflow_core::JobId::new())
            .await
            .unwrap();
        assert_eq!(resolved, None);
    }

    #[derive(Default)]
    struct CountingSleeper {
        sleeps: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl Sleeper for CountingSleeper {
        async fn sleep(&self, _duration: Duration) {
            self.sleeps.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn worker_survives_failures_and_sleeps_only_when_idle() {
        let h = harness(
            ScriptedProvider::failing(InferenceError::Unreachable("down".into())),
            PipelineSettings::default(),
        );
        h.services.admission.submit(notes_submission("a")).await.unwrap();
        h.services.admission.submit(notes_submission("b")).await.unwrap();

        let sleeper = Arc::new(CountingSleeper::default());
        let worker = PollWorker::new("test", h.services.pipeline.clone(), Duration::from_secs(2))
            .with_sleeper(sleeper.clone());

        let stats = worker.run_iterations(4).await;
        assert_eq!(stats.processed, 2);
        assert_eq!(stats.failed, 2);
        assert_eq!(stats.idle_polls, 2);
        assert_eq!(sleeper.sleeps.load(Ordering::SeqCst), 2);

        let queue = h.services.claimer.stats().await.unwrap();
        assert_eq!((queue.queued, queue.failed), (0, 2));
    }

    #[tokio::test]
    async fn once_mode_processes_a_single_job() {
        let h = harness(ScriptedProvider::findings(PASSING), PipelineSettings::default());
        h.services.admission.submit(notes_submission("a")).await.unwrap();
        h.services.admission.submit(notes_submission("b")).await.unwrap();

        let worker = PollWorker::new("once", h.services.pipeline.clone(), Duration::from_secs(2));
        let stats = worker.run(crate::workers::WorkerMode::Once).await;
        assert_eq!(stats.succeeded, 1);
        assert_eq!(h.services.claimer.stats().await.unwrap().queued, 1);
    }

    #[tokio::test]
    async fn spawned_worker_drains_the_queue_and_shuts_down() {
        let h = harness(ScriptedProvider::findings(PASSING), PipelineSettings::default());
        let receipt = h.services.admission.submit(notes_submission("病灶")).await.unwrap();

        let handle = PollWorker::new("bg", h.services.pipeline.clone(), Duration::from_millis(10)).spawn();

        let mut state = JobState::Queued;
        for _ in 0..200 {
            state = h.services.machine.get(receipt.job.job_id).await.unwrap().state;
            if state.is_terminal() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(state, JobState::Succeeded);

        let stats = handle.shutdown().await;
        assert_eq!(stats.succeeded, 1);
    }
}
