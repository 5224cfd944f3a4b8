// Job Processor - one job from stored input to terminal status
//
// Ok(true)  -> handled (acknowledge the message), whatever the job outcome
// Ok(false) -> another handler in this process owns the job; leave the message
// Err(_)    -> infrastructure fault; leave the message for redelivery

use crate::application::config::{Containers, PipelineConfig};
use crate::application::document::{batch_parts, split_by_size, Merger, Normalizer};
use crate::application::translation::TranslationService;
use crate::domain::{layout, DocumentFormat, DriveItem, Job, JobDetail, JobOutcome};
use crate::error::{AppError, Result};
use crate::port::{
    AccessScope, BatchRequest, DocumentConverter, DriveDelivery, GlossaryComposer, JobRepository,
    ObjectStore, PdfEngine, TimeProvider, TranslationError, TranslationGateway,
};
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{error, info, warn};

/// Collaborators of the pipeline, constructed once at process start
pub struct PipelineDeps {
    pub jobs: Arc<dyn JobRepository>,
    pub store: Arc<dyn ObjectStore>,
    pub translator: Arc<dyn TranslationGateway>,
    pub converter: Arc<dyn DocumentConverter>,
    pub pdf: Arc<dyn PdfEngine>,
    pub glossary: Option<Arc<dyn GlossaryComposer>>,
    pub drive: Option<Arc<dyn DriveDelivery>>,
    pub time: Arc<dyn TimeProvider>,
}

/// Why the pipeline stopped short of success
enum PipelineFailure {
    /// Terminal for the job: persist FAILED with this detail
    Job(JobDetail),
    /// Transient: leave the job QUEUED and the message unacknowledged
    Infrastructure(AppError),
}

impl From<AppError> for PipelineFailure {
    fn from(e: AppError) -> Self {
        if e.is_infrastructure() {
            PipelineFailure::Infrastructure(e)
        } else {
            PipelineFailure::Job(JobDetail::message(e.to_string()))
        }
    }
}

type PipelineResult<T> = std::result::Result<T, PipelineFailure>;

/// Source document as found in the input container
struct StoredSource {
    path: String,
    data: Vec<u8>,
    content_type: Option<String>,
}

fn job_failure(msg: impl Into<String>) -> PipelineFailure {
    PipelineFailure::Job(JobDetail::message(msg))
}

/// Removes the job id from the in-flight set when dropped
struct InFlight<'a> {
    set: &'a Mutex<HashSet<String>>,
    job_id: String,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.set
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.job_id);
    }
}

pub struct JobProcessor {
    jobs: Arc<dyn JobRepository>,
    store: Arc<dyn ObjectStore>,
    translation: TranslationService,
    normalizer: Normalizer,
    merger: Merger,
    pdf: Arc<dyn PdfEngine>,
    glossary: Option<Arc<dyn GlossaryComposer>>,
    drive: Option<Arc<dyn DriveDelivery>>,
    time: Arc<dyn TimeProvider>,
    containers: Containers,
    config: PipelineConfig,
    in_flight: Mutex<HashSet<String>>,
}

impl JobProcessor {
    pub fn new(deps: PipelineDeps, containers: Containers, config: PipelineConfig) -> Self {
        let translation =
            TranslationService::new(deps.translator, config.poll_backoff(), config.poll_timeout());
        Self {
            jobs: deps.jobs,
            merger: Merger::new(Arc::clone(&deps.store), Arc::clone(&deps.pdf)),
            store: deps.store,
            translation,
            normalizer: Normalizer::new(deps.converter),
            pdf: deps.pdf,
            glossary: deps.glossary,
            drive: deps.drive,
            time: deps.time,
            containers,
            config,
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    fn claim(&self, job_id: &str) -> Option<InFlight<'_>> {
        let mut set = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        if !set.insert(job_id.to_string()) {
            return None;
        }
        Some(InFlight {
            set: &self.in_flight,
            job_id: job_id.to_string(),
        })
    }

    /// Drive one job to a terminal status
    pub async fn process_job(&self, job_id: &str) -> Result<bool> {
        let Some(_claim) = self.claim(job_id) else {
            info!(job_id = %job_id, "Job already being processed here, leaving message");
            return Ok(false);
        };

        let Some(job) = self.jobs.find_by_id(job_id).await? else {
            warn!(job_id = %job_id, "Job not found, acknowledging stale message");
            return Ok(true);
        };
        if job.is_terminal() {
            info!(job_id = %job_id, status = %job.status, "Job already terminal, skipping");
            return Ok(true);
        }

        info!(
            job_id = %job.id,
            filename = %job.filename,
            source = %job.source_blob_path,
            target_lang = %job.target_lang_or_default(),
            "Job processing started"
        );

        match self.run(&job).await {
            Ok(outcome) => self.complete(job, outcome).await,
            Err(PipelineFailure::Job(detail)) => self.fail(job, detail).await,
            Err(PipelineFailure::Infrastructure(e)) => {
                error!(job_id = %job_id, error = %e, "Infrastructure error, job left for redelivery");
                Err(e)
            }
        }
    }

    /// Poison guard: fail a job whose message keeps coming back
    pub async fn give_up(&self, job_id: &str, deliveries: u32) -> Result<bool> {
        // A handler here still owns the job; its outcome decides the status
        let Some(_claim) = self.claim(job_id) else {
            info!(job_id = %job_id, deliveries, "Job still running here, leaving redelivered message");
            return Ok(false);
        };
        let Some(job) = self.jobs.find_by_id(job_id).await? else {
            return Ok(true);
        };
        if job.is_terminal() {
            return Ok(true);
        }
        let detail = JobDetail::structured(
            "delivery_limit",
            [("message", json!(format!("gave up after {} deliveries", deliveries)))],
        );
        self.fail(job, detail).await
    }

    async fn complete(&self, mut job: Job, outcome: JobOutcome) -> Result<bool> {
        let result_path = outcome.result_blob_path.clone();
        job.succeed(outcome, self.time.now_secs())?;
        self.persist(&job).await?;
        info!(job_id = %job.id, result = %result_path, "Job succeeded");
        Ok(true)
    }

    async fn fail(&self, mut job: Job, detail: JobDetail) -> Result<bool> {
        let detail = detail.truncated(self.config.detail_max_chars);
        let summary = detail.summary();
        job.fail(detail, self.time.now_secs())?;
        self.persist(&job).await?;
        error!(job_id = %job.id, detail = %summary, "Job failed");
        Ok(true)
    }

    /// Conditional terminal write; losing the race to another worker is fine
    async fn persist(&self, job: &Job) -> Result<()> {
        match self.jobs.save_terminal(job).await {
            Ok(()) => Ok(()),
            Err(AppError::InvalidState(msg)) | Err(AppError::NotFound(msg)) => {
                warn!(job_id = %job.id, reason = %msg, "Terminal write skipped");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn run(&self, job: &Job) -> PipelineResult<JobOutcome> {
        let recorded = job.source_blob_path.trim();
        if recorded.is_empty() {
            return Err(job_failure("Source blob path not set"));
        }

        let (source_path, blob) = self
            .store
            .get_with_fallback(&self.containers.input, recorded)
            .await?
            .ok_or_else(|| job_failure(format!("Input blob not found: {}", recorded)))?;
        let source = StoredSource {
            path: source_path,
            data: blob.data,
            content_type: blob.content_type,
        };
        info!(job_id = %job.id, path = %source.path, bytes = source.data.len(), "Source fetched");

        let glossary_url = self.prepare_glossary(job, &source.data).await;

        let ttl = self.config.container_ttl();
        let source_url = self
            .store
            .container_access_url(&self.containers.input, AccessScope::read_list(), ttl)
            .map_err(|e| job_failure(format!("Cannot create container access: {}", e)))?;
        let target_url = self
            .store
            .container_access_url(&self.containers.output, AccessScope::read_write(), ttl)
            .map_err(|e| job_failure(format!("Cannot create container access: {}", e)))?;

        self.preflight(job, &source.path).await?;

        let base = BatchRequest {
            source_url,
            source_prefix: String::new(),
            target_url,
            target_lang: job.target_lang_or_default(),
            source_lang: job.source_lang_hint().map(str::to_string),
            glossary_url,
        };

        let (result_path, data, content_type) =
            if source.data.len() as u64 <= self.config.max_document_bytes() {
                self.translate_direct(job, &source, base).await?
            } else {
                self.translate_split(job, source, base).await?
            };

        self.store
            .put(&self.containers.output, &result_path, data.clone(), &content_type)
            .await?;
        let download_url = self
            .store
            .blob_access_url(
                &self.containers.output,
                &result_path,
                AccessScope::read_only(),
                self.config.download_ttl(),
            )
            .map_err(|e| job_failure(format!("Cannot create download link: {}", e)))?;

        let drive_item = self.deliver_to_drive(job, &result_path, &data).await;

        Ok(JobOutcome {
            result_blob_path: result_path,
            download_url,
            drive_item,
        })
    }

    async fn preflight(&self, job: &Job, source_path: &str) -> PipelineResult<()> {
        let url = self
            .store
            .blob_access_url(
                &self.containers.input,
                source_path,
                AccessScope::read_only(),
                self.config.preflight_ttl(),
            )
            .map_err(|e| job_failure(format!("Preflight source access failed: {}", e)))?;
        self.store
            .verify_access(&url)
            .await
            .map_err(|e| job_failure(format!("Preflight source access failed: {}", e)))?;
        info!(job_id = %job.id, path = %source_path, "Preflight ok");
        Ok(())
    }

    /// Whole document in one batch; the service keeps its format
    async fn translate_direct(
        &self,
        job: &Job,
        source: &StoredSource,
        base: BatchRequest,
    ) -> PipelineResult<(String, Vec<u8>, String)> {
        info!(job_id = %job.id, bytes = source.data.len(), "Direct translation");
        self.clean_output(job, &source.path).await;

        let request = BatchRequest {
            source_prefix: source.path.clone(),
            ..base
        };
        self.run_batch(job, "direct", &request).await?;

        let (_, translated) = self
            .store
            .get_with_fallback(&self.containers.output, &source.path)
            .await?
            .ok_or_else(|| {
                job_failure(format!(
                    "Translated file not found in output container (tried '{}' and '{}')",
                    source.path,
                    layout::basename(&source.path)
                ))
            })?;

        let result_path = layout::translated_name(&source.path, &request.target_lang, None);
        let content_type = translated
            .content_type
            .or_else(|| source.content_type.clone())
            .or_else(|| DocumentFormat::from_name(&source.path).map(|f| f.content_type().to_string()))
            .unwrap_or_else(|| "application/octet-stream".to_string());
        Ok((result_path, translated.data, content_type))
    }

    /// Normalize, split, batch, translate batch by batch, merge
    async fn translate_split(
        &self,
        job: &Job,
        source: StoredSource,
        base: BatchRequest,
    ) -> PipelineResult<(String, Vec<u8>, String)> {
        let pdf = self.normalizer.normalize(&source.path, source.data).await?;

        let engine = Arc::clone(&self.pdf);
        let max_document = self.config.max_document_bytes();
        let parts = tokio::task::spawn_blocking(move || split_by_size(engine.as_ref(), &pdf, max_document))
            .await
            .map_err(|e| AppError::Internal(format!("split task failed: {}", e)))??;
        let mut batches = batch_parts(parts, self.config.max_batch_bytes());
        info!(
            job_id = %job.id,
            parts = batches.iter().map(|b| b.parts.len()).sum::<usize>(),
            batches = batches.len(),
            "Split translation"
        );

        self.clean_output(job, &format!("{}/", layout::parts_root(&job.id))).await;

        let mut translated = Vec::new();
        for batch in batches.iter_mut() {
            let prefix = layout::batch_prefix(&job.id, &batch.name());
            for part in batch.parts.iter_mut() {
                let bytes = std::mem::take(&mut part.bytes);
                self.store
                    .put(
                        &self.containers.input,
                        &format!("{}/{}", prefix, part.name()),
                        bytes,
                        DocumentFormat::Pdf.content_type(),
                    )
                    .await?;
            }

            let request = BatchRequest {
                source_prefix: format!("{}/", prefix),
                ..base.clone()
            };
            self.run_batch(job, &batch.name(), &request).await?;
            translated.extend(
                self.merger
                    .collect_batch(&self.containers.output, &job.id, batch)
                    .await?,
            );
        }

        let merged = self.merger.merge(translated).await?;
        let result_path = layout::translated_name(&source.path, &base.target_lang, Some("pdf"));
        Ok((result_path, merged, DocumentFormat::Pdf.content_type().to_string()))
    }

    /// Submit one batch and wait for it; anything but success fails the job
    async fn run_batch(&self, job: &Job, label: &str, request: &BatchRequest) -> PipelineResult<()> {
        let handle = self.translation.submit_batch(request).await.map_err(|e| {
            PipelineFailure::Job(JobDetail::structured(
                "submit_failed",
                [("batch", json!(label)), ("message", json!(e.to_string()))],
            ))
        })?;

        match self.translation.poll_batch(&handle).await {
            Ok(report) if report.status.is_success() => {
                info!(job_id = %job.id, batch = %label, "Batch succeeded");
                Ok(())
            }
            Ok(report) => {
                let payload = crate::domain::job::truncate_chars(
                    &report.payload.to_string(),
                    self.config.detail_max_chars,
                );
                Err(PipelineFailure::Job(JobDetail::structured(
                    "remote_failure",
                    [
                        ("batch", json!(label)),
                        ("status", json!(report.status.to_string())),
                        ("handle", json!(handle.as_str())),
                        ("payload", Value::String(payload)),
                    ],
                )))
            }
            Err(TranslationError::Timeout(secs)) => Err(PipelineFailure::Job(JobDetail::structured(
                "timeout",
                [
                    ("batch", json!(label)),
                    ("handle", json!(handle.as_str())),
                    ("message", json!(format!("batch {} did not finish within {}s", label, secs))),
                ],
            ))),
            Err(e) => Err(PipelineFailure::Job(JobDetail::structured(
                "poll_failed",
                [
                    ("batch", json!(label)),
                    ("handle", json!(handle.as_str())),
                    ("message", json!(e.to_string())),
                ],
            ))),
        }
    }

    /// Best-effort removal of stale output from an earlier attempt
    async fn clean_output(&self, job: &Job, prefix: &str) {
        if !self.config.clean_output_before_submit {
            return;
        }
        match self.store.clear_prefix(&self.containers.output, prefix).await {
            Ok(deleted) => info!(job_id = %job.id, prefix = %prefix, deleted, "Output prefix cleared"),
            Err(e) => warn!(job_id = %job.id, prefix = %prefix, error = %e, "Output prefix cleanup failed"),
        }
    }

    /// Best-effort glossary; `None` on any failure or when empty
    async fn prepare_glossary(&self, job: &Job, data: &[u8]) -> Option<String> {
        let composer = self.glossary.as_ref()?;
        match self.upload_glossary(composer.as_ref(), job, data).await {
            Ok(url) => url,
            Err(e) => {
                warn!(job_id = %job.id, error = %e, "Glossary composition failed, continuing without");
                None
            }
        }
    }

    async fn upload_glossary(
        &self,
        composer: &dyn GlossaryComposer,
        job: &Job,
        data: &[u8],
    ) -> Result<Option<String>> {
        let sample_len = data.len().min(self.config.glossary_sample_bytes);
        let sample = String::from_utf8_lossy(&data[..sample_len]);
        let source_lang = job.source_lang_hint().unwrap_or("auto");
        let tsv = composer
            .compose(source_lang, &job.target_lang_or_default(), &sample)
            .await?;
        if tsv.is_empty() {
            return Ok(None);
        }

        let path = layout::glossary_path(&job.id);
        let bytes = tsv.len();
        self.store
            .put(&self.containers.input, &path, tsv, "text/tab-separated-values")
            .await?;
        let url = self.store.blob_access_url(
            &self.containers.input,
            &path,
            AccessScope::read_only(),
            self.config.container_ttl(),
        )?;
        info!(job_id = %job.id, path = %path, bytes, "Glossary ready");
        Ok(Some(url))
    }

    /// Best-effort copy into the owner's drive
    async fn deliver_to_drive(&self, job: &Job, result_path: &str, data: &[u8]) -> Option<DriveItem> {
        let drive = self.drive.as_ref()?;
        let user_id = job.owning_user_id.as_deref().filter(|u| !u.is_empty())?;
        let name = layout::safe_drive_name(&layout::basename(result_path));
        match drive.upload(user_id, &name, data).await {
            Ok(item) => {
                info!(job_id = %job.id, item_id = %item.item_id, "Drive delivery ok");
                Some(item)
            }
            Err(e) => {
                warn!(job_id = %job.id, error = %e, "Drive delivery failed");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::JobStatus;
    use crate::port::document::mocks::{FakePdfEngine, MockConverter};
    use crate::port::drive::mocks::MockDrive;
    use crate::port::glossary::mocks::{FailingGlossary, StaticGlossary};
    use crate::port::job_repository::mocks::InMemoryJobRepository;
    use crate::port::object_store::mocks::InMemoryObjectStore;
    use crate::port::time_provider::mocks::FixedTimeProvider;
    use crate::port::translation::mocks::{MockBehavior, MockTranslator};

    const SOURCE: &str = "jobs/j1/input/report.pdf";

    struct Harness {
        store: Arc<InMemoryObjectStore>,
        jobs: Arc<InMemoryJobRepository>,
        translator: Arc<MockTranslator>,
        drive: Arc<MockDrive>,
        processor: JobProcessor,
    }

    fn harness_with(
        behavior: MockBehavior,
        config: PipelineConfig,
        glossary: Option<Arc<dyn GlossaryComposer>>,
        drive: MockDrive,
    ) -> Harness {
        let store = Arc::new(InMemoryObjectStore::new());
        let jobs = Arc::new(InMemoryJobRepository::with_jobs([Job::new(
            "j1", 100, "report.pdf", SOURCE, "auto", "ID",
        )
        .with_owner("user-1")]));
        let translator = Arc::new(MockTranslator::new(Arc::clone(&store), behavior));
        let drive = Arc::new(drive);
        let processor = JobProcessor::new(
            PipelineDeps {
                jobs: jobs.clone(),
                store: store.clone(),
                translator: translator.clone(),
                converter: Arc::new(MockConverter::new()),
                pdf: Arc::new(FakePdfEngine),
                glossary,
                drive: Some(drive.clone()),
                time: Arc::new(FixedTimeProvider::new(500_000)),
            },
            Containers::default(),
            config,
        );
        Harness {
            store,
            jobs,
            translator,
            drive,
            processor,
        }
    }

    fn harness(behavior: MockBehavior) -> Harness {
        harness_with(behavior, PipelineConfig::default(), None, MockDrive::new())
    }

    fn pages(n: usize, size: usize) -> Vec<u8> {
        let pages: Vec<String> = (0..n).map(|i| format!("{}:{}", i, "x".repeat(size))).collect();
        FakePdfEngine::document(&pages)
    }

    #[tokio::test(start_paused = true)]
    async fn test_direct_job_succeeds_with_named_output() {
        let h = harness(MockBehavior::Succeed);
        h.store.insert("input", SOURCE, pages(2, 10));

        assert!(h.processor.process_job("j1").await.unwrap());

        let job = h.jobs.get("j1").unwrap();
        assert_eq!(job.status, JobStatus::Succeeded);
        assert_eq!(job.result_blob_path.as_deref(), Some("jobs/j1/input/report_id.pdf"));
        assert!(job.download_url.as_deref().unwrap().starts_with("memory://output/jobs/j1/input/report_id.pdf"));
        assert_eq!(job.onedrive_item_id.as_deref(), Some("item-report_id.pdf"));
        assert_eq!(job.updated_at, 500);
        assert!(h.store.blob("output", "jobs/j1/input/report_id.pdf").is_some());

        let requests = h.translator.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].source_prefix, SOURCE);
        assert_eq!(requests[0].target_lang, "id");
        assert_eq!(requests[0].source_lang, None);
        assert!(requests[0].source_url.contains("sp=rl"));
        assert!(requests[0].target_url.contains("sp=racwl"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_split_job_merges_parts_in_order() {
        let config = PipelineConfig {
            max_document_mb: 15_000.0 / (1024.0 * 1024.0),
            ..PipelineConfig::default()
        };
        let h = harness_with(MockBehavior::Succeed, config, None, MockDrive::new());
        // ~10KB pages, ~15KB ceiling: one page per part
        h.store.insert("input", SOURCE, pages(3, 10_000));

        assert!(h.processor.process_job("j1").await.unwrap());

        let job = h.jobs.get("j1").unwrap();
        assert_eq!(job.status, JobStatus::Succeeded);
        let merged = h.store.blob("output", "jobs/j1/input/report_id.pdf").unwrap();
        let order: Vec<String> = FakePdfEngine::pages(&merged)
            .unwrap()
            .iter()
            .map(|p| p.split(':').next().unwrap().to_string())
            .collect();
        assert_eq!(order, vec!["0", "1", "2"]);
        assert!(h.store.blob("input", "jobs/j1/parts/b01/part_001.pdf").is_some());
        assert_eq!(h.translator.submit_count(), 1);
        assert_eq!(h.translator.requests()[0].source_prefix, "jobs/j1/parts/b01/");
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_source_fails_without_submission() {
        let h = harness(MockBehavior::Succeed);

        assert!(h.processor.process_job("j1").await.unwrap());

        let job = h.jobs.get("j1").unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert!(job.record().detail.unwrap().contains("Input blob not found: jobs/j1/input/report.pdf"));
        assert_eq!(h.translator.submit_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_remote_failure_records_payload() {
        let payload = json!({"status": "Failed", "error": {"code": "InvalidDocument", "message": "corrupt"}});
        let h = harness(MockBehavior::Fail(payload));
        h.store.insert("input", SOURCE, pages(1, 10));

        assert!(h.processor.process_job("j1").await.unwrap());

        let job = h.jobs.get("j1").unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        let detail = job.detail.unwrap();
        assert_eq!(detail.reason(), Some("remote_failure"));
        let JobDetail::Structured(map) = detail else { panic!("structured detail expected") };
        assert_eq!(map["status"], "Failed");
        assert!(map["payload"].as_str().unwrap().contains("InvalidDocument"));
        assert!(job.result_blob_path.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_is_distinct_from_remote_failure() {
        let config = PipelineConfig {
            poll_timeout_secs: 120,
            ..PipelineConfig::default()
        };
        let h = harness_with(MockBehavior::NeverFinish, config, None, MockDrive::new());
        h.store.insert("input", SOURCE, pages(1, 10));

        assert!(h.processor.process_job("j1").await.unwrap());

        let job = h.jobs.get("j1").unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.detail.as_ref().unwrap().reason(), Some("timeout"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_terminal_job_is_not_reprocessed() {
        let h = harness(MockBehavior::Succeed);
        h.store.insert("input", SOURCE, pages(1, 10));
        h.processor.process_job("j1").await.unwrap();
        let before = h.jobs.get("j1").unwrap();

        assert!(h.processor.process_job("j1").await.unwrap());

        assert_eq!(h.jobs.get("j1").unwrap(), before);
        assert_eq!(h.translator.submit_count(), 1);
        assert_eq!(h.jobs.terminal_writes(), 1);
    }

    #[tokio::test]
    async fn test_unknown_job_is_acknowledged() {
        let h = harness(MockBehavior::Succeed);
        assert!(h.processor.process_job("nope").await.unwrap());
    }

    #[tokio::test]
    async fn test_storage_fault_leaves_job_queued() {
        let h = harness(MockBehavior::Succeed);
        h.store.insert("input", SOURCE, pages(1, 10));
        h.store.set_fail_reads(true);

        let err = h.processor.process_job("j1").await.unwrap_err();
        assert!(err.is_infrastructure());
        assert_eq!(h.jobs.get("j1").unwrap().status, JobStatus::Queued);
    }

    #[tokio::test]
    async fn test_preflight_failure_fails_job() {
        let h = harness(MockBehavior::Succeed);
        h.store.insert("input", SOURCE, pages(1, 10));
        h.store.set_fail_verify(true);

        assert!(h.processor.process_job("j1").await.unwrap());
        let job = h.jobs.get("j1").unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert!(job.record().detail.unwrap().starts_with("Preflight source access failed"));
        assert_eq!(h.translator.submit_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_auxiliary_failures_are_not_fatal() {
        let h = harness_with(
            MockBehavior::Succeed,
            PipelineConfig::default(),
            Some(Arc::new(FailingGlossary)),
            MockDrive::failing(),
        );
        h.store.insert("input", SOURCE, pages(1, 10));

        assert!(h.processor.process_job("j1").await.unwrap());
        let job = h.jobs.get("j1").unwrap();
        assert_eq!(job.status, JobStatus::Succeeded);
        assert!(job.onedrive_item_id.is_none());
        assert!(h.translator.requests()[0].glossary_url.is_none());
        assert!(h.drive.uploads().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_glossary_is_uploaded_and_referenced() {
        let h = harness_with(
            MockBehavior::Succeed,
            PipelineConfig::default(),
            Some(Arc::new(StaticGlossary(b"neraca\tbalance sheet\n".to_vec()))),
            MockDrive::new(),
        );
        h.store.insert("input", SOURCE, pages(1, 10));

        h.processor.process_job("j1").await.unwrap();

        assert!(h.store.blob("input", "jobs/j1/glossary.tsv").is_some());
        let url = h.translator.requests()[0].glossary_url.clone().unwrap();
        assert!(url.starts_with("memory://input/jobs/j1/glossary.tsv?sp=r&"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_output_found_at_basename() {
        let h = harness(MockBehavior::SucceedAtBasename);
        h.store.insert("input", SOURCE, pages(1, 10));

        assert!(h.processor.process_job("j1").await.unwrap());
        let job = h.jobs.get("j1").unwrap();
        assert_eq!(job.status, JobStatus::Succeeded);
        assert_eq!(job.result_blob_path.as_deref(), Some("jobs/j1/input/report_id.pdf"));
    }

    #[tokio::test]
    async fn test_give_up_fails_open_job() {
        let h = harness(MockBehavior::Succeed);
        assert!(h.processor.give_up("j1", 6).await.unwrap());

        let job = h.jobs.get("j1").unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.record().detail.as_deref(), Some("delivery_limit: gave up after 6 deliveries"));
    }

    #[tokio::test]
    async fn test_give_up_leaves_job_claimed_by_running_handler() {
        let h = harness(MockBehavior::Succeed);
        let held = h.processor.claim("j1").unwrap();

        assert!(!h.processor.give_up("j1", 6).await.unwrap());
        assert_eq!(h.jobs.get("j1").unwrap().status, JobStatus::Queued);

        drop(held);
        assert!(h.processor.give_up("j1", 7).await.unwrap());
        assert_eq!(h.jobs.get("j1").unwrap().status, JobStatus::Failed);
    }
}
