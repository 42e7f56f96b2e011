// =============================================================================
// DRIVE SEARCH SERVICE
// =============================================================================
//
// The `search_drive` tool: free-text query in, one bounded report string out.
//
// Pipeline per query:
// 1. Locate   - one metadata search against the storage provider
// 2. Dispatch - MIME type -> extraction strategy (table-driven)
// 3. Extract  - per-file export/download + format-specific text extraction
// 4. Aggregate- headers + text/error per file, in provider relevance order
//
// A failure reading one file never aborts the rest; a failure reaching the
// provider at all short-circuits the whole query. Files are processed
// sequentially: result counts are capped by policy, and interactive chat
// turns already tolerate multi-second round trips.

use super::extract;
use super::models::{
    DriveError, ExtractionResult, ExtractionStrategy, FileDescriptor, QueryReport, QueryStatus,
    SearchPolicy,
};
use crate::core::ai::models::{FunctionDef, FunctionParameters, PropertyDef};
use crate::core::ai::FunctionCallHandler;
use async_trait::async_trait;
use std::collections::HashMap;

/// The storage provider seam.
///
/// The Drive REST client implements this in `infra`; tests implement it with
/// an in-memory fake. The session/credential handling lives entirely behind
/// the implementation - the service only asks for results or bytes.
#[async_trait]
pub trait DriveProvider: Send + Sync {
    /// Runs a metadata search and returns up to `page_size` descriptors in
    /// the provider's own relevance order.
    async fn search_files(
        &self,
        query: &str,
        page_size: u32,
    ) -> Result<Vec<FileDescriptor>, DriveError>;

    /// Server-side export of a native document to plain text.
    async fn export_text(&self, file_id: &str) -> Result<String, DriveError>;

    /// Raw byte download for binary-format files.
    async fn download_file(&self, file_id: &str) -> Result<Vec<u8>, DriveError>;
}

pub struct DriveSearchService<P: DriveProvider> {
    provider: P,
    policy: SearchPolicy,
}

impl<P: DriveProvider> DriveSearchService<P> {
    pub fn new(provider: P, policy: SearchPolicy) -> Self {
        Self { provider, policy }
    }

    /// Runs one query end to end.
    ///
    /// `Err` here means the provider itself was unreachable; every other
    /// outcome (no matches, unreadable files, unknown formats) is a
    /// successful report.
    pub async fn search(&self, query: &str) -> Result<QueryReport, DriveError> {
        let descriptors = self
            .provider
            .search_files(query, self.policy.page_size)
            .await?;

        if descriptors.is_empty() {
            tracing::debug!("No Drive files matched '{}'", query);
            return Ok(QueryReport {
                query: query.to_string(),
                status: QueryStatus::Empty,
                results: Vec::new(),
            });
        }

        tracing::info!("Drive search '{}' matched {} file(s)", query, descriptors.len());

        let mut results = Vec::with_capacity(descriptors.len());
        for descriptor in &descriptors {
            results.push(self.extract_one(descriptor).await);
        }

        Ok(QueryReport {
            query: query.to_string(),
            status: QueryStatus::Found,
            results,
        })
    }

    /// Reads one file with the strategy its MIME type dispatches to.
    /// Failures land in the result's `error` slot instead of propagating.
    async fn extract_one(&self, descriptor: &FileDescriptor) -> ExtractionResult {
        let strategy = ExtractionStrategy::from_mime_type(&descriptor.mime_type);

        let extracted = match strategy {
            ExtractionStrategy::GoogleDocExport => self.provider.export_text(&descriptor.id).await,
            ExtractionStrategy::PdfText => match self.provider.download_file(&descriptor.id).await {
                Ok(bytes) => extract::pdf_text(&bytes, self.policy.pdf_page_limit),
                Err(e) => Err(e),
            },
            ExtractionStrategy::DocxText => {
                match self.provider.download_file(&descriptor.id).await {
                    Ok(bytes) => extract::docx_text(&bytes),
                    Err(e) => Err(e),
                }
            }
            ExtractionStrategy::Unsupported => {
                // Terminal, successful non-result. No extraction attempted.
                return ExtractionResult {
                    file_name: descriptor.name.clone(),
                    text: format!(
                        "(Found file {}, but it is a format I cannot read yet.)",
                        descriptor.name
                    ),
                    error: None,
                };
            }
        };

        match extracted {
            // Truncation is the single, final step of every strategy so the
            // extractors stay format-pure and the budget is enforced once.
            Ok(text) => ExtractionResult {
                file_name: descriptor.name.clone(),
                text: extract::truncate_chars(&text, self.policy.truncation_chars),
                error: None,
            },
            Err(e) => {
                tracing::warn!("Could not read '{}': {}", descriptor.name, e);
                ExtractionResult {
                    file_name: descriptor.name.clone(),
                    text: String::new(),
                    error: Some(e.to_string()),
                }
            }
        }
    }
}

/// Tool schema for `search_drive`, in our provider-agnostic format.
pub fn search_drive_function() -> FunctionDef {
    let mut properties = HashMap::new();

    properties.insert(
        "query".to_string(),
        PropertyDef {
            prop_type: "string".to_string(),
            description: Some(
                "Keywords to match against file names and file contents, e.g. 'Resume'."
                    .to_string(),
            ),
            enum_values: None,
        },
    );

    FunctionDef {
        name: "search_drive".to_string(),
        description: "Searches Jason's Google Drive and reads the content of relevant files. \
                      Use this for questions about Jason's identity, resume, or work history."
            .to_string(),
        parameters: FunctionParameters {
            param_type: "object".to_string(),
            properties,
            required: vec!["query".to_string()],
        },
    }
}

#[async_trait]
impl<P: DriveProvider> FunctionCallHandler for DriveSearchService<P> {
    async fn handle_function_call(
        &self,
        name: &str,
        args: &serde_json::Value,
    ) -> Result<serde_json::Value, String> {
        match name {
            "search_drive" => {
                let query = args
                    .get("query")
                    .and_then(|v| v.as_str())
                    .ok_or("Missing 'query' argument")?;

                // Only provider unavailability crosses here as a failure;
                // everything else is already normalized into the report text.
                match self.search(query).await {
                    Ok(report) => Ok(serde_json::Value::String(report.render())),
                    Err(e) => Ok(serde_json::Value::String(format!("Error: {}", e))),
                }
            }
            _ => Err(format!("Unknown function: {}", name)),
        }
    }

    fn supported_functions(&self) -> Vec<String> {
        vec!["search_drive".to_string()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::drive::models::{MIME_DOCX, MIME_GOOGLE_DOC, MIME_PDF};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// In-memory provider with per-method call counters.
    #[derive(Default)]
    struct FakeProvider {
        files: Vec<FileDescriptor>,
        exports: Mutex<HashMap<String, Result<String, String>>>,
        downloads: Mutex<HashMap<String, Vec<u8>>>,
        search_error: Option<String>,
        search_calls: AtomicUsize,
        export_calls: AtomicUsize,
        download_calls: AtomicUsize,
    }

    impl FakeProvider {
        fn with_files(files: Vec<FileDescriptor>) -> Self {
            Self {
                files,
                ..Default::default()
            }
        }

        fn with_export(self, id: &str, text: &str) -> Self {
            self.exports
                .lock()
                .unwrap()
                .insert(id.to_string(), Ok(text.to_string()));
            self
        }

        fn with_export_error(self, id: &str, reason: &str) -> Self {
            self.exports
                .lock()
                .unwrap()
                .insert(id.to_string(), Err(reason.to_string()));
            self
        }

        fn extraction_calls(&self) -> usize {
            self.export_calls.load(Ordering::SeqCst) + self.download_calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl DriveProvider for FakeProvider {
        async fn search_files(
            &self,
            _query: &str,
            page_size: u32,
        ) -> Result<Vec<FileDescriptor>, DriveError> {
            self.search_calls.fetch_add(1, Ordering::SeqCst);
            if let Some(msg) = &self.search_error {
                return Err(DriveError::ServiceUnavailable(msg.clone()));
            }
            Ok(self
                .files
                .iter()
                .take(page_size as usize)
                .cloned()
                .collect())
        }

        async fn export_text(&self, file_id: &str) -> Result<String, DriveError> {
            self.export_calls.fetch_add(1, Ordering::SeqCst);
            match self.exports.lock().unwrap().get(file_id) {
                Some(Ok(text)) => Ok(text.clone()),
                Some(Err(reason)) => Err(DriveError::ExtractionFailed(reason.clone())),
                None => Err(DriveError::ExtractionFailed("unknown file".to_string())),
            }
        }

        async fn download_file(&self, file_id: &str) -> Result<Vec<u8>, DriveError> {
            self.download_calls.fetch_add(1, Ordering::SeqCst);
            self.downloads
                .lock()
                .unwrap()
                .get(file_id)
                .cloned()
                .ok_or_else(|| DriveError::ExtractionFailed("download failed".to_string()))
        }
    }

    fn doc(id: &str, name: &str) -> FileDescriptor {
        FileDescriptor {
            id: id.to_string(),
            name: name.to_string(),
            mime_type: MIME_GOOGLE_DOC.to_string(),
        }
    }

    fn service(provider: FakeProvider) -> DriveSearchService<FakeProvider> {
        DriveSearchService::new(provider, SearchPolicy::default())
    }

    #[tokio::test]
    async fn test_no_matches_yields_empty_report_and_no_extraction() {
        let svc = service(FakeProvider::with_files(Vec::new()));

        let report = svc.search("Resume").await.unwrap();

        assert_eq!(report.status, QueryStatus::Empty);
        assert_eq!(report.render(), "No documents found matching 'Resume'.");
        assert_eq!(svc.provider.extraction_calls(), 0);
    }

    #[tokio::test]
    async fn test_locator_failure_short_circuits_with_no_extractor_calls() {
        let provider = FakeProvider {
            files: vec![doc("f1", "Jason_Resume")],
            search_error: Some("401 invalid credentials".to_string()),
            ..Default::default()
        };
        let svc = service(provider);

        let err = svc.search("Resume").await.unwrap_err();

        assert!(matches!(err, DriveError::ServiceUnavailable(_)));
        assert!(err.to_string().contains("401 invalid credentials"));
        assert_eq!(svc.provider.extraction_calls(), 0);
    }

    #[tokio::test]
    async fn test_worked_example_google_doc() {
        let full_text = format!("Jason Barash, Software Engineer{}", "x".repeat(3000));
        let provider = FakeProvider::with_files(vec![doc("f1", "Jason_Resume")])
            .with_export("f1", &full_text);
        let svc = service(provider);

        let report = svc.search("Resume").await.unwrap();
        let rendered = report.render();

        assert!(rendered.contains("--- READING FILE: Jason_Resume ---"));
        assert!(rendered.contains("Jason Barash, Software Engineer"));
        // Exactly the first 2000 characters survive.
        assert_eq!(report.results[0].text.chars().count(), 2000);
        assert!(report.results[0].error.is_none());
    }

    #[tokio::test]
    async fn test_truncation_budget_applies_to_every_strategy() {
        let provider = FakeProvider::with_files(vec![doc("f1", "Long_Doc")])
            .with_export("f1", &"y".repeat(10_000));
        let svc = DriveSearchService::new(
            provider,
            SearchPolicy {
                truncation_chars: 100,
                ..SearchPolicy::default()
            },
        );

        let report = svc.search("Doc").await.unwrap();
        assert_eq!(report.results[0].text.chars().count(), 100);
    }

    #[tokio::test]
    async fn test_unsupported_format_notice_without_extraction() {
        let provider = FakeProvider::with_files(vec![FileDescriptor {
            id: "f1".to_string(),
            name: "photo.png".to_string(),
            mime_type: "image/png".to_string(),
        }]);
        let svc = service(provider);

        let report = svc.search("photo").await.unwrap();

        assert_eq!(
            report.results[0].text,
            "(Found file photo.png, but it is a format I cannot read yet.)"
        );
        assert!(report.results[0].error.is_none());
        assert_eq!(svc.provider.extraction_calls(), 0);
    }

    #[tokio::test]
    async fn test_one_failure_never_drops_or_reorders_the_rest() {
        let provider = FakeProvider::with_files(vec![
            doc("f1", "First"),
            doc("f2", "Second"),
            doc("f3", "Third"),
        ])
        .with_export("f1", "first text")
        .with_export_error("f2", "export rejected")
        .with_export("f3", "third text");
        let svc = service(provider);

        let report = svc.search("anything").await.unwrap();

        assert_eq!(report.results.len(), 3);
        assert_eq!(report.results[0].text, "first text");
        assert_eq!(
            report.results[1].error.as_deref(),
            Some("export rejected")
        );
        assert_eq!(report.results[2].text, "third text");

        let rendered = report.render();
        let first = rendered.find("READING FILE: First").unwrap();
        let second = rendered.find("READING FILE: Second").unwrap();
        let third = rendered.find("READING FILE: Third").unwrap();
        assert!(first < second && second < third);
        assert!(rendered.contains("(Error reading file Second: export rejected)"));
    }

    #[tokio::test]
    async fn test_page_size_caps_descriptor_count() {
        let files: Vec<FileDescriptor> = (0..10)
            .map(|i| doc(&format!("f{}", i), &format!("File{}", i)))
            .collect();
        let mut provider = FakeProvider::with_files(files);
        for i in 0..10 {
            provider = provider.with_export(&format!("f{}", i), "text");
        }
        let svc = service(provider);

        let report = svc.search("File").await.unwrap();
        assert_eq!(report.results.len(), SearchPolicy::default().page_size as usize);
    }

    #[tokio::test]
    async fn test_docx_descriptor_uses_download_path() {
        let provider = FakeProvider::with_files(vec![FileDescriptor {
            id: "f1".to_string(),
            name: "Bio.docx".to_string(),
            mime_type: MIME_DOCX.to_string(),
        }]);
        provider
            .downloads
            .lock()
            .unwrap()
            .insert("f1".to_string(), b"not a zip".to_vec());
        let svc = service(provider);

        let report = svc.search("Bio").await.unwrap();

        // Download happened, extraction failed in isolation.
        assert_eq!(svc.provider.download_calls.load(Ordering::SeqCst), 1);
        assert_eq!(svc.provider.export_calls.load(Ordering::SeqCst), 0);
        assert!(report.results[0].error.is_some());
    }

    #[tokio::test]
    async fn test_pdf_download_failure_is_isolated() {
        let provider = FakeProvider::with_files(vec![FileDescriptor {
            id: "missing".to_string(),
            name: "Resume.pdf".to_string(),
            mime_type: MIME_PDF.to_string(),
        }]);
        let svc = service(provider);

        let report = svc.search("Resume").await.unwrap();
        assert_eq!(report.results[0].error.as_deref(), Some("download failed"));
    }

    #[tokio::test]
    async fn test_repeated_query_is_byte_identical() {
        let provider = FakeProvider::with_files(vec![doc("f1", "Jason_Resume")])
            .with_export("f1", "Jason Barash, Software Engineer");
        let svc = service(provider);

        let first = svc.search("Resume").await.unwrap().render();
        let second = svc.search("Resume").await.unwrap().render();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_handler_renders_report_as_string() {
        let provider = FakeProvider::with_files(vec![doc("f1", "Jason_Resume")])
            .with_export("f1", "Jason Barash");
        let svc = service(provider);

        let value = svc
            .handle_function_call("search_drive", &serde_json::json!({"query": "Resume"}))
            .await
            .unwrap();

        let text = value.as_str().unwrap();
        assert!(text.contains("--- READING FILE: Jason_Resume ---"));
        assert!(text.contains("Jason Barash"));
    }

    #[tokio::test]
    async fn test_handler_embeds_service_unavailable_as_text() {
        let provider = FakeProvider {
            search_error: Some("connection refused".to_string()),
            ..Default::default()
        };
        let svc = service(provider);

        let value = svc
            .handle_function_call("search_drive", &serde_json::json!({"query": "Resume"}))
            .await
            .unwrap();

        assert!(value.as_str().unwrap().starts_with("Error:"));
    }

    #[tokio::test]
    async fn test_handler_rejects_unknown_function_and_missing_args() {
        let svc = service(FakeProvider::default());

        assert!(svc
            .handle_function_call("read_calendar", &serde_json::json!({}))
            .await
            .is_err());
        assert!(svc
            .handle_function_call("search_drive", &serde_json::json!({}))
            .await
            .is_err());
    }

    #[test]
    fn test_search_drive_function_schema() {
        let def = search_drive_function();
        assert_eq!(def.name, "search_drive");
        assert_eq!(def.parameters.required, vec!["query".to_string()]);
        assert!(def.parameters.properties.contains_key("query"));
    }
}
