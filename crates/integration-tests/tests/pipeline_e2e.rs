//! End-to-end job pipeline: SQLite job store, lopdf engine, in-memory storage
//! and a scripted translation service

mod common;

use common::{fast_config, mb, page_labels, pdf_with_pages, Harness};
use doctrans_core::application::{PipelineConfig, TermListGlossary};
use doctrans_core::domain::{Job, JobStatus};
use doctrans_core::port::translation::mocks::MockBehavior;
use doctrans_core::port::JobRepository;
use serde_json::json;

/// Filler per page; one page fits under `SPLIT_CEILING`, two do not
const PAGE_PADDING: usize = 6_000;
const SPLIT_CEILING: u64 = 9_000;

fn split_config() -> PipelineConfig {
    PipelineConfig {
        max_document_mb: mb(SPLIT_CEILING),
        // Two single-page parts never share a batch
        max_batch_mb: mb(SPLIT_CEILING),
        ..fast_config()
    }
}

#[tokio::test]
async fn test_small_pdf_is_translated_directly() {
    let h = Harness::new(MockBehavior::Succeed).await;
    h.seed("job-1", "report.pdf", pdf_with_pages(&["Page 1", "Page 2"], 100), Some("user-1"))
        .await;
    let processor = h.processor(fast_config(), None);

    assert!(processor.process_job("job-1").await.unwrap());

    let job = h.job("job-1").await;
    assert_eq!(job.status, JobStatus::Succeeded);
    assert_eq!(job.result_blob_path.as_deref(), Some("jobs/job-1/input/report_ja.pdf"));
    assert!(job
        .download_url
        .as_deref()
        .unwrap()
        .starts_with("memory://output/jobs/job-1/input/report_ja.pdf"));
    assert!(job.detail.is_none());

    // One batch filtered on the exact source path
    let requests = h.translator.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].source_prefix, "jobs/job-1/input/report.pdf");
    assert_eq!(requests[0].target_lang, "ja");
    assert_eq!(requests[0].source_lang, None);

    let output = h.store.blob("output", "jobs/job-1/input/report_ja.pdf").unwrap();
    assert_eq!(page_labels(&output), vec!["Page 1", "Page 2"]);

    // Drive copy recorded on the job
    assert_eq!(h.drive.uploads().len(), 1);
    assert_eq!(job.onedrive_item_id.as_deref(), Some("item-report_ja.pdf"));
}

#[tokio::test]
async fn test_large_pdf_is_split_translated_and_merged_in_order() {
    let h = Harness::new(MockBehavior::Succeed).await;
    let source = pdf_with_pages(&["Page 1", "Page 2", "Page 3"], PAGE_PADDING);
    assert!(source.len() as u64 > SPLIT_CEILING);
    h.seed("job-2", "big.pdf", source, None).await;
    let processor = h.processor(split_config(), None);

    assert!(processor.process_job("job-2").await.unwrap());

    let job = h.job("job-2").await;
    assert_eq!(job.status, JobStatus::Succeeded, "detail: {:?}", job.detail);
    assert_eq!(job.result_blob_path.as_deref(), Some("jobs/job-2/input/big_ja.pdf"));

    // Each page alone, one batch per part, submitted in order
    let prefixes: Vec<String> = h
        .translator
        .requests()
        .into_iter()
        .map(|r| r.source_prefix)
        .collect();
    assert_eq!(
        prefixes,
        vec![
            "jobs/job-2/parts/b01/",
            "jobs/job-2/parts/b02/",
            "jobs/job-2/parts/b03/"
        ]
    );
    for (batch, part) in [("b01", "part_001"), ("b02", "part_002"), ("b03", "part_003")] {
        let path = format!("jobs/job-2/parts/{}/{}.pdf", batch, part);
        let stored = h.store.blob("input", &path).unwrap();
        assert!(stored.len() as u64 <= SPLIT_CEILING, "{} is {} bytes", path, stored.len());
    }

    let merged = h.store.blob("output", "jobs/job-2/input/big_ja.pdf").unwrap();
    assert_eq!(page_labels(&merged), vec!["Page 1", "Page 2", "Page 3"]);
}

#[tokio::test]
async fn test_parts_written_at_basename_are_still_merged() {
    let h = Harness::new(MockBehavior::SucceedAtBasename).await;
    h.seed("job-3", "big.pdf", pdf_with_pages(&["A", "B"], PAGE_PADDING), None)
        .await;
    let processor = h.processor(split_config(), None);

    assert!(processor.process_job("job-3").await.unwrap());

    let job = h.job("job-3").await;
    assert_eq!(job.status, JobStatus::Succeeded, "detail: {:?}", job.detail);
    let merged = h.store.blob("output", "jobs/job-3/input/big_ja.pdf").unwrap();
    assert_eq!(page_labels(&merged), vec!["A", "B"]);
}

#[tokio::test]
async fn test_office_document_under_ceiling_keeps_its_format() {
    let h = Harness::new(MockBehavior::Succeed).await;
    h.seed("job-4", "Quarterly Plan.docx", b"PK docx bytes".to_vec(), None)
        .await;
    let processor = h.processor(fast_config(), None);

    assert!(processor.process_job("job-4").await.unwrap());

    let job = h.job("job-4").await;
    assert_eq!(job.status, JobStatus::Succeeded);
    assert_eq!(
        job.result_blob_path.as_deref(),
        Some("jobs/job-4/input/Quarterly_Plan_ja.docx")
    );
    assert_eq!(h.converter.call_count(), 0);
}

#[tokio::test]
async fn test_remote_failure_is_recorded_with_payload() {
    let payload = json!({"status": "Failed", "error": {"code": "DocumentTooLarge"}});
    let h = Harness::new(MockBehavior::Fail(payload)).await;
    h.seed("job-5", "report.pdf", pdf_with_pages(&["P"], 10), None).await;
    let processor = h.processor(fast_config(), None);

    assert!(processor.process_job("job-5").await.unwrap());

    let job = h.job("job-5").await;
    assert_eq!(job.status, JobStatus::Failed);
    let detail = job.detail.clone().unwrap();
    assert_eq!(detail.reason(), Some("remote_failure"));
    assert!(job.record().detail.unwrap().contains("DocumentTooLarge"));
    assert!(job.result_blob_path.is_none());
    assert!(job.download_url.is_none());
}

#[tokio::test]
async fn test_batch_that_never_finishes_times_out() {
    let h = Harness::new(MockBehavior::NeverFinish).await;
    h.seed("job-6", "report.pdf", pdf_with_pages(&["P"], 10), None).await;
    let processor = h.processor(fast_config(), None);

    assert!(processor.process_job("job-6").await.unwrap());

    let job = h.job("job-6").await;
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.detail.as_ref().unwrap().reason(), Some("timeout"));
    assert!(h.translator.poll_count() > 1);
}

#[tokio::test]
async fn test_missing_source_fails_without_submission() {
    let h = Harness::new(MockBehavior::Succeed).await;
    // Row exists, blob was never uploaded
    let job = Job::new("job-7", 0, "report.pdf", "jobs/job-7/input/report.pdf", "auto", "ja");
    h.jobs.insert(&job).await.unwrap();
    let processor = h.processor(fast_config(), None);

    assert!(processor.process_job("job-7").await.unwrap());

    let job = h.job("job-7").await;
    assert_eq!(job.status, JobStatus::Failed);
    assert!(job
        .record()
        .detail
        .unwrap()
        .contains("jobs/job-7/input/report.pdf"));
    assert_eq!(h.translator.submit_count(), 0);
}

#[tokio::test]
async fn test_reprocessing_a_terminal_job_changes_nothing() {
    let h = Harness::new(MockBehavior::Succeed).await;
    h.seed("job-8", "report.pdf", pdf_with_pages(&["P"], 10), None).await;
    let processor = h.processor(fast_config(), None);
    assert!(processor.process_job("job-8").await.unwrap());
    let first = h.job("job-8").await;

    h.time.advance_secs(600);
    h.translator.set_behavior(MockBehavior::Fail(json!({"status": "Failed"})));
    assert!(processor.process_job("job-8").await.unwrap());

    let second = h.job("job-8").await;
    assert_eq!(second, first);
    assert_eq!(h.translator.submit_count(), 1);
    assert_eq!(h.jobs.count_by_status(JobStatus::Succeeded).await.unwrap(), 1);
}

#[tokio::test]
async fn test_reprocessing_a_failed_job_changes_nothing() {
    let payload = json!({"status": "Failed", "error": {"code": "InvalidDocument"}});
    let h = Harness::new(MockBehavior::Fail(payload)).await;
    h.seed("job-10", "report.pdf", pdf_with_pages(&["P"], 10), None).await;
    let processor = h.processor(fast_config(), None);
    assert!(processor.process_job("job-10").await.unwrap());
    let first = h.job("job-10").await;
    assert_eq!(first.status, JobStatus::Failed);

    h.time.advance_secs(600);
    h.translator.set_behavior(MockBehavior::Succeed);
    assert!(processor.process_job("job-10").await.unwrap());

    let second = h.job("job-10").await;
    assert_eq!(second, first);
    assert_eq!(h.translator.submit_count(), 1);
    assert!(second.result_blob_path.is_none());
    assert!(second.download_url.is_none());
    assert!(h.store.blob("output", "jobs/job-10/input/report_ja.pdf").is_none());
}

#[tokio::test]
async fn test_glossary_is_uploaded_and_referenced() {
    let h = Harness::new(MockBehavior::Succeed).await;
    h.seed("job-9", "report.pdf", pdf_with_pages(&["Revenue in USD"], 10), None)
        .await;
    let glossary = TermListGlossary::from_tsv("revenue\t売上\nmargin\t利益率\n");
    let processor = h.processor(fast_config(), Some(glossary));

    assert!(processor.process_job("job-9").await.unwrap());

    let tsv = h.store.blob("input", "jobs/job-9/glossary.tsv").unwrap();
    let tsv = String::from_utf8(tsv).unwrap();
    assert!(tsv.contains("revenue\t売上"));
    assert!(tsv.contains("USD\tUSD"));
    assert!(!tsv.contains("margin"));

    let requests = h.translator.requests();
    assert!(requests[0]
        .glossary_url
        .as_deref()
        .unwrap()
        .starts_with("memory://input/jobs/job-9/glossary.tsv"));
    assert_eq!(h.job("job-9").await.status, JobStatus::Succeeded);
}
