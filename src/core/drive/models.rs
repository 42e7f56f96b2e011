use thiserror::Error;

// MIME types the dispatcher knows how to read.
pub const MIME_GOOGLE_DOC: &str = "application/vnd.google-apps.document";
pub const MIME_PDF: &str = "application/pdf";
pub const MIME_DOCX: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

/// Errors crossing the drive-search boundary.
///
/// Only `ServiceUnavailable` is fatal to a whole query. Extraction failures
/// are recovered per file and rendered inline in the report, so the model
/// still sees "file X failed because Y" as part of its context.
#[derive(Debug, Error)]
pub enum DriveError {
    /// The storage provider could not be reached or refused authentication.
    /// Fatal for the query; never retried automatically.
    #[error("Drive service unavailable: {0}")]
    ServiceUnavailable(String),

    /// A single file could not be read in its expected format.
    #[error("{0}")]
    ExtractionFailed(String),
}

/// A candidate file returned by the Drive metadata search.
/// Immutable and scoped to one query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDescriptor {
    pub id: String,
    pub name: String,
    pub mime_type: String,
}

/// The outcome of reading one file. Either `text` holds the (possibly
/// truncated) extracted content, or `error` holds the reason it could not be
/// read. The unsupported-format notice counts as text, not as an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionResult {
    pub file_name: String,
    pub text: String,
    pub error: Option<String>,
}

/// Top-level outcome of one search query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryStatus {
    /// At least one descriptor matched; `results` holds one entry per file.
    Found,
    /// The provider returned zero matches. Not an error.
    Empty,
}

/// Ordered per-file results plus the top-level status. This is what gets
/// rendered into the single reply string handed back to the agent runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryReport {
    pub query: String,
    pub status: QueryStatus,
    pub results: Vec<ExtractionResult>,
}

impl QueryReport {
    /// Renders the report as the one free-text string the agent consumes.
    ///
    /// Per-file errors are embedded inline rather than thrown: the language
    /// model must see the failure as context, not lose it to an exception.
    pub fn render(&self) -> String {
        if self.status == QueryStatus::Empty {
            return format!("No documents found matching '{}'.", self.query);
        }

        let mut output = String::new();
        for result in &self.results {
            output.push_str(&format!("\n--- READING FILE: {} ---\n", result.file_name));
            match &result.error {
                Some(reason) => {
                    output.push_str(&format!(
                        "(Error reading file {}: {})",
                        result.file_name, reason
                    ));
                }
                None => output.push_str(&result.text),
            }
        }
        output
    }
}

/// How to turn a file's bytes (or export) into text, chosen purely from the
/// declared MIME type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionStrategy {
    /// Server-side export of a native Google Doc to text/plain.
    GoogleDocExport,
    /// Download raw bytes, parse as PDF, read the first few pages.
    PdfText,
    /// Download raw bytes, parse the OOXML container, read the text stream.
    DocxText,
    /// Format we cannot read; produces a fixed notice, never an error.
    Unsupported,
}

/// MIME-to-strategy table. Adding a format is one entry here plus its
/// extractor; the dispatch logic below never changes.
const STRATEGY_TABLE: &[(&str, ExtractionStrategy)] = &[
    (MIME_GOOGLE_DOC, ExtractionStrategy::GoogleDocExport),
    (MIME_PDF, ExtractionStrategy::PdfText),
    (MIME_DOCX, ExtractionStrategy::DocxText),
];

impl ExtractionStrategy {
    /// Pure mapping from a declared MIME type to a strategy.
    pub fn from_mime_type(mime: &str) -> Self {
        STRATEGY_TABLE
            .iter()
            .find(|(known, _)| *known == mime)
            .map(|(_, strategy)| *strategy)
            .unwrap_or(ExtractionStrategy::Unsupported)
    }
}

/// Cost/latency bounds for one search query.
///
/// Deliberate caps, not correctness limits: the result count bounds network
/// round trips, the character budget bounds downstream token usage, and the
/// page limit keeps large PDFs from dominating a query.
#[derive(Debug, Clone)]
pub struct SearchPolicy {
    /// Maximum descriptors requested from the provider per query.
    pub page_size: u32,
    /// Hard cap on each extracted text, in characters.
    pub truncation_chars: usize,
    /// Number of leading PDF pages to read, independent of total page count.
    pub pdf_page_limit: usize,
}

impl Default for SearchPolicy {
    fn default() -> Self {
        Self {
            page_size: 3,
            truncation_chars: 2000,
            pdf_page_limit: 2,
        }
    }
}
