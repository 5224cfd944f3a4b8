// Document Normalizer
use crate::domain::DocumentFormat;
use crate::error::{AppError, Result};
use crate::port::DocumentConverter;
use std::sync::Arc;
use tracing::info;

/// Turns any supported input into a page-addressable PDF
pub struct Normalizer {
    converter: Arc<dyn DocumentConverter>,
}

impl Normalizer {
    pub fn new(converter: Arc<dyn DocumentConverter>) -> Self {
        Self { converter }
    }

    /// PDF input passes through untouched; office formats go through the converter
    ///
    /// # Errors
    /// - AppError::Validation for unsupported formats
    pub async fn normalize(&self, name: &str, data: Vec<u8>) -> Result<Vec<u8>> {
        let format = DocumentFormat::from_name(name).ok_or_else(|| {
            AppError::Validation(format!(
                "Unsupported format: {} (expected PDF, DOCX, DOC, PPTX, PPT, XLSX or XLS)",
                name
            ))
        })?;
        if format.is_pdf() {
            return Ok(data);
        }

        let input_bytes = data.len();
        let pdf = self.converter.to_pdf(&data, format).await?;
        info!(
            name = %name,
            format = format.extension(),
            input_bytes,
            pdf_bytes = pdf.len(),
            "Document converted to PDF"
        );
        Ok(pdf)
    }
}
