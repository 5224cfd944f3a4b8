//! Doctrans CLI - submit and inspect translation jobs
//!
//! Talks to the job store and the storage account directly; the worker
//! picks submitted jobs up from the queue.

mod submit;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use colored::{ColoredString, Colorize};
use std::path::PathBuf;
use std::time::Duration;
use tabled::{Table, Tabled};

use doctrans_core::domain::job::truncate_chars;
use doctrans_core::domain::{Job, JobStatus};
use doctrans_core::port::id_provider::UuidProvider;
use doctrans_core::port::time_provider::SystemTimeProvider;
use doctrans_core::port::JobRepository;
use doctrans_infra_azure::{http_client, AzureBlobStore, AzureQueue, StorageAccount};
use doctrans_infra_sqlite::{create_pool, run_migrations, SqliteJobRepository};
use submit::{SubmitDeps, SubmitRequest};

const DEFAULT_DB_URL: &str = "sqlite://~/.doctrans/jobs.db";
const DETAIL_COLUMN_CHARS: usize = 60;

#[derive(Parser)]
#[command(name = "doctrans")]
#[command(about = "Doctrans document translation CLI", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Job store URL
    #[arg(long, global = true, env = "DOCTRANS__DATABASE__URL", default_value = DEFAULT_DB_URL)]
    db_url: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload a document and queue it for translation
    Submit {
        /// Local file (pdf, docx, doc, pptx, ppt, xlsx, xls)
        file: PathBuf,

        /// Target language (e.g., ja, en, zh-Hans)
        #[arg(long)]
        to: String,

        /// Source language ("auto" lets the service detect it)
        #[arg(long, default_value = "auto")]
        from: String,

        /// Owning user; translated files go to this user's drive
        #[arg(long)]
        user: Option<String>,

        /// Storage account connection string
        #[arg(long, env = "DOCTRANS__STORAGE__CONNECTION_STRING", hide_env_values = true)]
        connection_string: String,

        #[arg(long, env = "DOCTRANS__STORAGE__INPUT_CONTAINER", default_value = "input")]
        input_container: String,

        #[arg(long, env = "DOCTRANS__STORAGE__QUEUE_NAME", default_value = "translation-jobs")]
        queue: String,
    },

    /// Show one job
    Status {
        /// Job ID
        job_id: String,

        /// Print the raw JSON record
        #[arg(long)]
        json: bool,
    },

    /// List recent jobs
    List {
        /// Only jobs in this status (queued, succeeded, failed)
        #[arg(long, value_parser = parse_status)]
        status: Option<JobStatus>,

        /// Maximum rows
        #[arg(short = 'n', long, default_value = "20")]
        limit: u32,
    },
}

#[derive(Tabled)]
struct JobRow {
    #[tabled(rename = "JOB ID")]
    id: String,
    #[tabled(rename = "STATUS")]
    status: String,
    #[tabled(rename = "FILE")]
    filename: String,
    #[tabled(rename = "LANG")]
    lang: String,
    #[tabled(rename = "UPDATED")]
    updated: String,
    #[tabled(rename = "DETAIL")]
    detail: String,
}

impl From<&Job> for JobRow {
    fn from(job: &Job) -> Self {
        Self {
            id: job.id.clone(),
            status: job.status.to_string(),
            filename: job.filename.clone(),
            lang: format!("{} -> {}", job.source_lang, job.target_lang),
            updated: format_epoch(job.updated_at),
            detail: job
                .detail
                .as_ref()
                .map(|d| truncate_chars(&d.summary(), DETAIL_COLUMN_CHARS))
                .unwrap_or_default(),
        }
    }
}

fn parse_status(s: &str) -> std::result::Result<JobStatus, String> {
    JobStatus::parse(s).ok_or_else(|| format!("unknown status '{}' (queued, succeeded, failed)", s))
}

fn format_epoch(secs: i64) -> String {
    chrono::DateTime::from_timestamp(secs, 0)
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| secs.to_string())
}

fn colored_status(status: JobStatus) -> ColoredString {
    match status {
        JobStatus::Queued => status.as_str().yellow(),
        JobStatus::Succeeded => status.as_str().green(),
        JobStatus::Failed => status.as_str().red(),
    }
}

fn resolve_db_url(url: &str) -> String {
    match url.strip_prefix("sqlite://") {
        Some(path) if path.starts_with('~') => format!("sqlite://{}", shellexpand::tilde(path)),
        _ => url.to_string(),
    }
}

async fn open_jobs(db_url: &str) -> Result<SqliteJobRepository> {
    let pool = create_pool(&resolve_db_url(db_url))
        .await
        .context("Failed to open job store")?;
    run_migrations(&pool).await.context("Migration failed")?;
    Ok(SqliteJobRepository::new(pool))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Submit {
            file,
            to,
            from,
            user,
            connection_string,
            input_container,
            queue,
        } => {
            let data = tokio::fs::read(&file)
                .await
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let Some(file_name) = file.file_name().map(|n| n.to_string_lossy().into_owned()) else {
                bail!("{} is not a file", file.display());
            };

            let jobs = open_jobs(&cli.db_url).await?;
            let account = StorageAccount::from_connection_string(&connection_string)
                .context("Invalid storage connection string")?;
            let client = http_client(Duration::from_secs(300))?;
            let store = AzureBlobStore::new(&account, client.clone());
            store
                .ensure_container(&input_container)
                .await
                .context("Failed to prepare input container")?;
            let queue = AzureQueue::new(&account, &queue, client);
            queue.ensure_queue().await.context("Failed to prepare queue")?;

            let deps = SubmitDeps {
                store: &store,
                jobs: &jobs,
                queue: &queue,
                ids: &UuidProvider,
                time: &SystemTimeProvider,
                input_container: &input_container,
            };
            let job = submit::submit(
                &deps,
                SubmitRequest {
                    file_name,
                    data,
                    target_lang: to,
                    source_lang: from,
                    user_id: user,
                },
            )
            .await?;

            println!("{}", "✓ Job submitted".green().bold());
            println!();
            println!("{}", Table::new(vec![JobRow::from(&job)]));
        }

        Commands::Status { job_id, json } => {
            let jobs = open_jobs(&cli.db_url).await?;
            let Some(job) = jobs.find_by_id(&job_id).await? else {
                bail!("Job {} not found", job_id);
            };
            let record = job.record();

            if json {
                println!("{}", serde_json::to_string_pretty(&record)?);
                return Ok(());
            }

            println!("{}", format!("Job {}", record.job_id).cyan().bold());
            println!("  Status:    {}", colored_status(record.status).bold());
            println!("  File:      {}", record.filename);
            println!("  Languages: {} -> {}", job.source_lang, job.target_lang);
            println!("  Updated:   {}", format_epoch(job.updated_at));
            if let Some(blob) = &record.result_blob {
                println!("  Result:    {}", blob);
            }
            if let Some(url) = &record.download_url {
                println!("  Download:  {}", url);
            }
            if let Some(url) = &record.onedrive_url {
                println!("  OneDrive:  {}", url);
            }
            if let Some(detail) = &record.detail {
                println!("  Detail:    {}", detail.red());
            }
        }

        Commands::List { status, limit } => {
            let jobs = open_jobs(&cli.db_url).await?;
            let found = jobs.find_by_status(status, limit).await?;
            if found.is_empty() {
                println!("{}", "No jobs".yellow());
                return Ok(());
            }

            let rows: Vec<JobRow> = found.iter().map(JobRow::from).collect();
            println!("{}", Table::new(rows));

            let queued = jobs.count_by_status(JobStatus::Queued).await?;
            let succeeded = jobs.count_by_status(JobStatus::Succeeded).await?;
            let failed = jobs.count_by_status(JobStatus::Failed).await?;
            println!();
            println!(
                "{} queued, {} succeeded, {} failed",
                queued.to_string().yellow(),
                succeeded.to_string().green(),
                failed.to_string().red()
            );
        }
    }

    Ok(())
}
