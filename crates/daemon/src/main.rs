//! Doctrans Worker - Main Entry Point
//! Consumes translation jobs from the queue and runs the document pipeline

mod host;
mod settings;
mod telemetry;

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry};

use doctrans_core::application::{shutdown_channel, JobProcessor, PipelineDeps, TermListGlossary, Worker};
use doctrans_core::port::time_provider::SystemTimeProvider;
use doctrans_core::port::{DriveDelivery, GlossaryComposer};
use doctrans_infra_azure::{http_client, AzureBlobStore, AzureDocumentTranslator, AzureQueue, GraphDrive, StorageAccount};
use doctrans_infra_document::{LopdfEngine, OfficeConverter};
use doctrans_infra_sqlite::{create_pool, run_migrations, SqliteJobRepository};

use host::HostFacts;
use settings::{GlossarySettings, Settings};
use telemetry::{BoxedLayer, TelemetryStatus};

const VERSION: &str = env!("CARGO_PKG_VERSION");
const LOG_FILE_PREFIX: &str = "doctrans-worker.log";

/// Grace period for the worker to drain after the shutdown signal
const SHUTDOWN_GRACE: Duration = Duration::from_secs(45);

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Logging (+ optional OpenTelemetry)
    let (_log_guard, telemetry_status) = init_logging()?;
    telemetry_status.log();
    HostFacts::collect().log_service_start(VERSION);

    // 2. Configuration
    let settings = Settings::load().context("Failed to load configuration")?;
    settings.validate()?;
    tracing::debug!(?settings, "Configuration loaded");

    // 3. Dependencies
    let (worker, queue_name) = build_worker(&settings).await?;

    // 4. Worker loop
    let (shutdown_tx, shutdown_rx) = shutdown_channel();
    let mut worker_handle = tokio::spawn(async move { worker.run(shutdown_rx).await });
    info!(
        event = "queue_listener_start",
        queue = %queue_name,
        concurrency = settings.worker.concurrency,
        max_messages = settings.worker.max_messages,
        visibility_secs = settings.worker.visibility_timeout_secs,
        "System ready, waiting for jobs (Ctrl+C to stop)"
    );

    // 5. Wait for shutdown signal (or an unexpected worker exit)
    tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal.context("Failed to listen for shutdown signal")?;
            info!("Shutdown signal received");
            shutdown_tx.shutdown();
            match tokio::time::timeout(SHUTDOWN_GRACE, &mut worker_handle).await {
                Ok(Ok(Ok(()))) => {}
                Ok(Ok(Err(e))) => error!(error = %e, "Worker stopped with error"),
                Ok(Err(e)) => error!(error = %e, "Worker task failed"),
                Err(_) => warn!("Worker did not stop within the grace period"),
            }
        }
        joined = &mut worker_handle => {
            match joined {
                Ok(Ok(())) => warn!("Worker exited unexpectedly"),
                Ok(Err(e)) => error!(error = %e, "Worker stopped with error"),
                Err(e) => error!(error = %e, "Worker task failed"),
            }
        }
    }

    telemetry::shutdown();
    info!("Shutdown complete");
    Ok(())
}

/// Console layer, optional daily log file, optional OTLP export
fn init_logging() -> Result<(Option<WorkerGuard>, TelemetryStatus)> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("doctrans=info"))
        .context("Failed to create env filter")?;

    let json = std::env::var("DOCTRANS_LOG_FORMAT")
        .map(|f| f.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let mut layers: Vec<BoxedLayer<Registry>> = Vec::new();
    if json {
        // Production: JSON structured logging
        layers.push(fmt::layer().json().boxed());
    } else {
        // Development: pretty formatting with colors
        layers.push(fmt::layer().pretty().boxed());
    }

    let mut guard = None;
    if let Ok(dir) = std::env::var("DOCTRANS_LOG_DIR") {
        let dir = shellexpand::tilde(&dir).into_owned();
        std::fs::create_dir_all(&dir).with_context(|| format!("Failed to create log dir {}", dir))?;
        let (writer, file_guard) =
            tracing_appender::non_blocking(tracing_appender::rolling::daily(&dir, LOG_FILE_PREFIX));
        layers.push(fmt::layer().json().with_ansi(false).with_writer(writer).boxed());
        guard = Some(file_guard);
    }

    let (otel, status) = telemetry::otel_layer::<Registry>();
    layers.extend(otel);

    tracing_subscriber::registry()
        .with(layers)
        .with(env_filter)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok((guard, status))
}

async fn build_worker(settings: &Settings) -> Result<(Worker, String)> {
    let time = Arc::new(SystemTimeProvider);

    // Job store
    if let Some(dir) = settings.database.parent_dir() {
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create database dir {}", dir.display()))?;
    }
    let db_url = settings.database.resolved_url();
    info!(db_url = %db_url, "Initializing database");
    let pool = create_pool(&db_url).await.context("DB pool creation failed")?;
    run_migrations(&pool).await.context("Migration failed")?;
    let jobs = Arc::new(SqliteJobRepository::new(pool));

    // Object store + queue
    let account = StorageAccount::from_connection_string(&settings.storage.connection_string)
        .context("Invalid storage connection string")?;
    let client = http_client(settings.storage.request_timeout())?;
    let containers = settings.storage.containers();

    let store = Arc::new(AzureBlobStore::new(&account, client.clone()));
    for container in [&containers.input, &containers.output] {
        store
            .ensure_container(container)
            .await
            .with_context(|| format!("Failed to prepare container {}", container))?;
    }
    let queue = Arc::new(AzureQueue::new(&account, &settings.storage.queue_name, client));
    queue.ensure_queue().await.context("Failed to prepare queue")?;
    info!(account = %account.name, input = %containers.input, output = %containers.output, "Storage ready");

    // Translation, conversion, glossary, drive
    let translator = Arc::new(
        AzureDocumentTranslator::new(settings.translator.options())
            .context("Failed to create translation client")?,
    );
    let converter = Arc::new(OfficeConverter::new(
        settings.converter.program.clone(),
        Duration::from_secs(settings.converter.timeout_secs),
    ));
    let glossary = load_glossary(&settings.glossary)?;
    let drive: Option<Arc<dyn DriveDelivery>> = match settings.drive.options() {
        Some(options) => {
            info!(folder = %options.folder, "Drive delivery enabled");
            Some(Arc::new(GraphDrive::new(options).context("Failed to create drive client")?))
        }
        None => {
            info!("Drive delivery disabled (credentials not configured)");
            None
        }
    };

    let deps = PipelineDeps {
        jobs,
        store,
        translator,
        converter,
        pdf: Arc::new(LopdfEngine::new()),
        glossary: Some(glossary),
        drive,
        time,
    };
    let processor = Arc::new(JobProcessor::new(deps, containers, settings.pipeline.clone()));
    let worker = Worker::new(queue, processor, settings.worker.clone());
    Ok((worker, settings.storage.queue_name.clone()))
}

fn load_glossary(settings: &GlossarySettings) -> Result<Arc<dyn GlossaryComposer>> {
    let glossary = match settings.terms_path() {
        Some(path) => {
            let text = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read glossary terms {}", path.display()))?;
            TermListGlossary::from_tsv(&text)
        }
        None => TermListGlossary::default(),
    };
    info!(terms = glossary.len(), "Glossary loaded");
    Ok(Arc::new(glossary))
}
