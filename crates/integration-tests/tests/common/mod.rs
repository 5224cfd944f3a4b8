//! Shared fixtures: SQLite job store, lopdf documents, in-memory storage doubles

#![allow(dead_code)]

use std::sync::Arc;

use doctrans_core::application::{Containers, JobProcessor, PipelineConfig, PipelineDeps, TermListGlossary};
use doctrans_core::domain::Job;
use doctrans_core::port::document::mocks::MockConverter;
use doctrans_core::port::drive::mocks::MockDrive;
use doctrans_core::port::object_store::mocks::InMemoryObjectStore;
use doctrans_core::port::time_provider::mocks::FixedTimeProvider;
use doctrans_core::port::translation::mocks::{MockBehavior, MockTranslator};
use doctrans_core::port::{GlossaryComposer, JobRepository};
use doctrans_infra_document::LopdfEngine;
use doctrans_infra_sqlite::{create_pool, run_migrations, SqliteJobRepository};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};

pub const NOW_MILLIS: i64 = 1_760_000_000_000;

/// Pipeline settings that keep polling fast and timeouts short
pub fn fast_config() -> PipelineConfig {
    PipelineConfig {
        poll_initial_secs: 0.01,
        poll_multiplier: 1.5,
        poll_max_secs: 0.05,
        poll_timeout_secs: 1,
        ..PipelineConfig::default()
    }
}

/// Ceiling in MB for a byte count
pub fn mb(bytes: u64) -> f64 {
    bytes as f64 / (1024.0 * 1024.0)
}

pub struct Harness {
    pub jobs: Arc<SqliteJobRepository>,
    pub store: Arc<InMemoryObjectStore>,
    pub translator: Arc<MockTranslator>,
    pub converter: Arc<MockConverter>,
    pub drive: Arc<MockDrive>,
    pub time: Arc<FixedTimeProvider>,
}

impl Harness {
    pub async fn new(behavior: MockBehavior) -> Self {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        run_migrations(&pool).await.unwrap();
        let store = Arc::new(InMemoryObjectStore::new());
        Self {
            jobs: Arc::new(SqliteJobRepository::new(pool)),
            translator: Arc::new(MockTranslator::new(store.clone(), behavior)),
            store,
            converter: Arc::new(MockConverter::new()),
            drive: Arc::new(MockDrive::new()),
            time: Arc::new(FixedTimeProvider::new(NOW_MILLIS)),
        }
    }

    pub fn processor(&self, config: PipelineConfig, glossary: Option<TermListGlossary>) -> JobProcessor {
        let deps = PipelineDeps {
            jobs: self.jobs.clone(),
            store: self.store.clone(),
            translator: self.translator.clone(),
            converter: self.converter.clone(),
            pdf: Arc::new(LopdfEngine::new()),
            glossary: glossary.map(|g| Arc::new(g) as Arc<dyn GlossaryComposer>),
            drive: Some(self.drive.clone()),
            time: self.time.clone(),
        };
        JobProcessor::new(deps, Containers::default(), config)
    }

    /// Store the input blob and insert a QUEUED job for it
    pub async fn seed(&self, job_id: &str, file_name: &str, data: Vec<u8>, owner: Option<&str>) -> Job {
        let path = format!("jobs/{}/input/{}", job_id, file_name);
        self.store.insert("input", &path, data);
        let mut job = Job::new(job_id, NOW_MILLIS / 1000, file_name, path, "auto", "ja");
        if let Some(owner) = owner {
            job = job.with_owner(owner);
        }
        self.jobs.insert(&job).await.unwrap();
        job
    }

    pub async fn job(&self, job_id: &str) -> Job {
        self.jobs.find_by_id(job_id).await.unwrap().unwrap()
    }
}

/// PDF whose page i shows `labels[i]` followed by `padding` bytes of filler
///
/// Streams are left uncompressed so part sizes track `padding`.
pub fn pdf_with_pages(labels: &[&str], padding: usize) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids = Vec::new();
    for label in labels {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 12.into()]),
                Operation::new("Td", vec![72.into(), 720.into()]),
                Operation::new("Tj", vec![Object::string_literal(label.to_string())]),
                Operation::new("Tj", vec![Object::string_literal("x".repeat(padding))]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(Object::Reference(page_id));
    }

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => labels.len() as i64,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut out = Vec::new();
    doc.save_to(&mut out).unwrap();
    out
}

/// First string shown on each page, in page order
pub fn page_labels(data: &[u8]) -> Vec<String> {
    let doc = Document::load_mem(data).unwrap();
    doc.get_pages()
        .into_values()
        .map(|id| {
            let content = Content::decode(&doc.get_page_content(id).unwrap()).unwrap();
            content
                .operations
                .iter()
                .find(|op| op.operator == "Tj")
                .and_then(|op| op.operands.first())
                .and_then(|o| o.as_str().ok())
                .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
                .unwrap_or_default()
        })
        .collect()
}
