// Job submission: upload the source, insert the QUEUED row, enqueue the id

use anyhow::{bail, Context, Result};
use doctrans_core::domain::layout::{input_path, safe_basename};
use doctrans_core::domain::{DocumentFormat, Job, JobMessage};
use doctrans_core::port::{IdProvider, JobRepository, MessageQueue, ObjectStore, TimeProvider};

pub struct SubmitDeps<'a> {
    pub store: &'a dyn ObjectStore,
    pub jobs: &'a dyn JobRepository,
    pub queue: &'a dyn MessageQueue,
    pub ids: &'a dyn IdProvider,
    pub time: &'a dyn TimeProvider,
    pub input_container: &'a str,
}

#[derive(Debug, Clone)]
pub struct SubmitRequest {
    pub file_name: String,
    pub data: Vec<u8>,
    pub target_lang: String,
    pub source_lang: String,
    pub user_id: Option<String>,
}

pub async fn submit(deps: &SubmitDeps<'_>, request: SubmitRequest) -> Result<Job> {
    let target = request.target_lang.trim();
    if target.is_empty() {
        bail!("Target language is required");
    }
    if request.data.is_empty() {
        bail!("{} is empty", request.file_name);
    }
    let Some(format) = DocumentFormat::from_name(&request.file_name) else {
        bail!(
            "Unsupported file type: {} (expected pdf, docx, doc, pptx, ppt, xlsx or xls)",
            request.file_name
        );
    };

    let job_id = deps.ids.generate_id();
    let blob_path = input_path(&job_id, &safe_basename(&request.file_name));

    deps.store
        .put(deps.input_container, &blob_path, request.data, format.content_type())
        .await
        .with_context(|| format!("Failed to upload {}", blob_path))?;

    let source = match request.source_lang.trim() {
        "" => "auto",
        lang => lang,
    };
    let mut job = Job::new(
        job_id.clone(),
        deps.time.now_secs(),
        request.file_name.clone(),
        blob_path,
        source,
        target.to_lowercase(),
    );
    if let Some(user) = request.user_id.filter(|u| !u.trim().is_empty()) {
        job = job.with_owner(user);
    }

    deps.jobs.insert(&job).await.context("Failed to record job")?;
    deps.queue
        .send(&JobMessage::new(job_id.clone()).to_json())
        .await
        .with_context(|| format!("Job {} recorded but could not be enqueued", job_id))?;

    Ok(job)
}
