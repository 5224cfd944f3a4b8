// Document, Part & Batch Domain Model

use serde_json::Value;
use std::ops::Range;

/// Input formats accepted by the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Pdf,
    Docx,
    Doc,
    Pptx,
    Ppt,
    Xlsx,
    Xls,
}

impl DocumentFormat {
    /// Detect the format from a file or blob name (case-insensitive extension)
    pub fn from_name(name: &str) -> Option<Self> {
        let ext = name.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase())?;
        match ext.as_str() {
            "pdf" => Some(DocumentFormat::Pdf),
            "docx" => Some(DocumentFormat::Docx),
            "doc" => Some(DocumentFormat::Doc),
            "pptx" => Some(DocumentFormat::Pptx),
            "ppt" => Some(DocumentFormat::Ppt),
            "xlsx" => Some(DocumentFormat::Xlsx),
            "xls" => Some(DocumentFormat::Xls),
            _ => None,
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            DocumentFormat::Pdf => "pdf",
            DocumentFormat::Docx => "docx",
            DocumentFormat::Doc => "doc",
            DocumentFormat::Pptx => "pptx",
            DocumentFormat::Ppt => "ppt",
            DocumentFormat::Xlsx => "xlsx",
            DocumentFormat::Xls => "xls",
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            DocumentFormat::Pdf => "application/pdf",
            DocumentFormat::Docx => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            }
            DocumentFormat::Doc => "application/msword",
            DocumentFormat::Pptx => {
                "application/vnd.openxmlformats-officedocument.presentationml.presentation"
            }
            DocumentFormat::Ppt => "application/vnd.ms-powerpoint",
            DocumentFormat::Xlsx => {
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
            }
            DocumentFormat::Xls => "application/vnd.ms-excel",
        }
    }

    pub fn is_pdf(self) -> bool {
        self == DocumentFormat::Pdf
    }
}

/// A size-bounded PDF slice of the normalized document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentPart {
    /// 1-based sequence number
    pub index: usize,
    /// Zero-based, end-exclusive page range in the normalized document
    pub pages: Range<usize>,
    pub bytes: Vec<u8>,
    /// Single page that alone exceeds the per-document ceiling
    pub oversized: bool,
}

impl DocumentPart {
    pub fn name(&self) -> String {
        part_name(self.index)
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }
}

/// `part_001.pdf`, `part_002.pdf`, ...
pub fn part_name(index: usize) -> String {
    format!("part_{:03}.pdf", index)
}

/// Group of parts submitted as one remote operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationBatch {
    /// 1-based sequence number
    pub index: usize,
    pub parts: Vec<DocumentPart>,
}

impl TranslationBatch {
    /// `b01`, `b02`, ...
    pub fn name(&self) -> String {
        format!("b{:02}", self.index)
    }

    pub fn size(&self) -> u64 {
        self.parts.iter().map(DocumentPart::size).sum()
    }
}

/// Reference to the remote asynchronous translation operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationHandle(String);

impl OperationHandle {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for OperationHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Status reported by the translation service
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteStatus {
    NotStarted,
    Running,
    Cancelling,
    Succeeded,
    Failed,
    Cancelled,
    ValidationFailed,
    Other(String),
}

impl RemoteStatus {
    /// Case-insensitive parse
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "notstarted" => RemoteStatus::NotStarted,
            "running" => RemoteStatus::Running,
            "cancelling" => RemoteStatus::Cancelling,
            "succeeded" => RemoteStatus::Succeeded,
            "failed" => RemoteStatus::Failed,
            "cancelled" | "canceled" => RemoteStatus::Cancelled,
            "validationfailed" => RemoteStatus::ValidationFailed,
            _ => RemoteStatus::Other(s.trim().to_string()),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RemoteStatus::Succeeded
                | RemoteStatus::Failed
                | RemoteStatus::Cancelled
                | RemoteStatus::ValidationFailed
        )
    }

    pub fn is_success(&self) -> bool {
        *self == RemoteStatus::Succeeded
    }
}

impl std::fmt::Display for RemoteStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RemoteStatus::NotStarted => f.write_str("NotStarted"),
            RemoteStatus::Running => f.write_str("Running"),
            RemoteStatus::Cancelling => f.write_str("Cancelling"),
            RemoteStatus::Succeeded => f.write_str("Succeeded"),
            RemoteStatus::Failed => f.write_str("Failed"),
            RemoteStatus::Cancelled => f.write_str("Cancelled"),
            RemoteStatus::ValidationFailed => f.write_str("ValidationFailed"),
            RemoteStatus::Other(s) => f.write_str(s),
        }
    }
}

/// One status poll result: parsed status plus the raw payload
#[derive(Debug, Clone, PartialEq)]
pub struct BatchReport {
    pub status: RemoteStatus,
    pub payload: Value,
}

impl BatchReport {
    /// Build from the service's JSON body (`status` or `Status`)
    pub fn from_payload(payload: Value) -> Self {
        let status = payload
            .get("status")
            .or_else(|| payload.get("Status"))
            .and_then(Value::as_str)
            .map(RemoteStatus::parse)
            .unwrap_or_else(|| RemoteStatus::Other(String::new()));
        Self { status, payload }
    }
}
