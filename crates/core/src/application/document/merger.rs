// Reassembly of translated parts
use crate::domain::{layout, TranslationBatch};
use crate::error::{AppError, Result};
use crate::port::{ObjectStore, PdfEngine};
use std::sync::Arc;
use tracing::{debug, info};

/// A translated part pulled back from the output container
#[derive(Debug, Clone)]
pub struct TranslatedPart {
    pub name: String,
    pub data: Vec<u8>,
}

pub struct Merger {
    store: Arc<dyn ObjectStore>,
    engine: Arc<dyn PdfEngine>,
}

impl Merger {
    pub fn new(store: Arc<dyn ObjectStore>, engine: Arc<dyn PdfEngine>) -> Self {
        Self { store, engine }
    }

    /// Fetch the translated parts of one batch from `container`
    ///
    /// Each part is looked up at `<batch_prefix>/<part name>`, then by its bare
    /// name.
    ///
    /// # Errors
    /// - AppError::NotFound naming the expected path when a part is missing
    pub async fn collect_batch(
        &self,
        container: &str,
        job_id: &str,
        batch: &TranslationBatch,
    ) -> Result<Vec<TranslatedPart>> {
        let prefix = layout::batch_prefix(job_id, &batch.name());
        let mut out = Vec::with_capacity(batch.parts.len());
        for part in &batch.parts {
            let name = part.name();
            let expected = format!("{}/{}", prefix, name);
            let (found_at, blob) = self
                .store
                .get_with_fallback(container, &expected)
                .await?
                .ok_or_else(|| {
                    AppError::NotFound(format!(
                        "Translated part not found in output container: {}",
                        expected
                    ))
                })?;
            debug!(part = %name, path = %found_at, bytes = blob.data.len(), "Translated part fetched");
            out.push(TranslatedPart { name, data: blob.data });
        }
        Ok(out)
    }

    /// Concatenate parts in ascending name order into one PDF
    pub async fn merge(&self, mut parts: Vec<TranslatedPart>) -> Result<Vec<u8>> {
        if parts.is_empty() {
            return Err(AppError::Document("nothing to merge".to_string()));
        }
        parts.sort_by(|a, b| a.name.cmp(&b.name));
        let count = parts.len();
        let engine = Arc::clone(&self.engine);

        let merged = tokio::task::spawn_blocking(move || {
            let docs: Vec<Vec<u8>> = parts.into_iter().map(|p| p.data).collect();
            engine.merge(&docs)
        })
        .await
        .map_err(|e| AppError::Internal(format!("merge task failed: {}", e)))??;

        info!(parts = count, bytes = merged.len(), "Translated parts merged");
        Ok(merged)
    }
}
