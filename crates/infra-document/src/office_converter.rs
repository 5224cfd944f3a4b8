// Office-to-PDF conversion through a headless LibreOffice subprocess

use async_trait::async_trait;
use doctrans_core::domain::DocumentFormat;
use doctrans_core::error::{AppError, Result};
use doctrans_core::port::DocumentConverter;
use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{info, warn};

/// Longest stderr excerpt carried into an error
const MAX_STDERR_CHARS: usize = 512;

/// Runs `soffice --headless --convert-to pdf` in a scratch directory
///
/// Every conversion gets its own directory and LibreOffice profile, so
/// concurrent conversions do not contend for the profile lock.
pub struct OfficeConverter {
    program: String,
    timeout: Duration,
}

impl OfficeConverter {
    /// # Example
    /// ```ignore
    /// let converter = OfficeConverter::new("soffice", Duration::from_secs(300));
    /// ```
    pub fn new(program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }

    async fn run(&self, workdir: &Path, input: &Path) -> Result<std::process::Output> {
        let profile = workdir.join("profile");
        let child = Command::new(&self.program)
            .arg(format!("-env:UserInstallation=file://{}", profile.display()))
            .args(["--headless", "--norestore", "--invisible", "--nolockcheck"])
            .args(["--convert-to", "pdf", "--outdir"])
            .arg(workdir)
            .arg(input)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| AppError::Document(format!("Failed to start {}: {}", self.program, e)))?;

        // On timeout the child future is dropped and kill_on_drop reaps it
        match timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(e)) => Err(AppError::Io(e)),
            Err(_) => Err(AppError::Document(format!(
                "Conversion timed out after {}s",
                self.timeout.as_secs()
            ))),
        }
    }
}

#[async_trait]
impl DocumentConverter for OfficeConverter {
    async fn to_pdf(&self, data: &[u8], format: DocumentFormat) -> Result<Vec<u8>> {
        if format.is_pdf() {
            return Ok(data.to_vec());
        }

        let workdir = tempfile::tempdir()?;
        let input = workdir.path().join(format!("source.{}", format.extension()));
        tokio::fs::write(&input, data).await?;

        let started = Instant::now();
        info!(
            program = %self.program,
            format = format.extension(),
            bytes = data.len(),
            "Starting office conversion"
        );

        let output = self.run(workdir.path(), &input).await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!(exit_code = ?output.status.code(), "Office conversion failed");
            return Err(AppError::Document(format!(
                "Conversion exited with {:?}: {}",
                output.status.code(),
                doctrans_core::domain::job::truncate_chars(stderr.trim(), MAX_STDERR_CHARS)
            )));
        }

        let pdf_path = workdir.path().join("source.pdf");
        let pdf = match tokio::fs::read(&pdf_path).await {
            Ok(bytes) if !bytes.is_empty() => bytes,
            Ok(_) => return Err(AppError::Document("Conversion produced an empty PDF".to_string())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(AppError::Document("Conversion produced no PDF".to_string()))
            }
            Err(e) => return Err(AppError::Io(e)),
        };

        info!(
            duration_ms = started.elapsed().as_millis() as u64,
            bytes = pdf.len(),
            "Office conversion completed"
        );
        Ok(pdf)
    }
}
