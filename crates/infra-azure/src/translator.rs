// Azure AI Document Translation adapter
//
// Submit: POST {endpoint}/translator/document/batches?api-version=V, trying
// each configured API version in order (404 moves on to the next one).
// Status: GET on the operation handle.

use crate::connection::http_client;
use crate::error::clip;
use async_trait::async_trait;
use doctrans_core::domain::{BatchReport, OperationHandle};
use doctrans_core::port::{BatchRequest, TranslationError, TranslationGateway};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Serialize;
use serde_json::Value;
use std::sync::{PoisonError, RwLock};
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct TranslatorOptions {
    /// Resource endpoint, e.g. `https://<name>.cognitiveservices.azure.com`
    pub endpoint: String,
    pub key: String,
    pub region: Option<String>,
    /// Candidate API versions, most preferred first
    pub api_versions: Vec<String>,
    pub request_timeout: Duration,
}

/// API version that last accepted a submission
///
/// Only `submit` writes it; every call works on its own ordered copy of
/// the candidate list.
#[derive(Debug, Default)]
pub struct PreferredEndpoint {
    version: RwLock<Option<String>>,
}

impl PreferredEndpoint {
    /// Candidates with the preferred one moved to the front
    pub fn ordered(&self, candidates: &[String]) -> Vec<String> {
        let preferred = self
            .version
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        match preferred {
            Some(p) if candidates.contains(&p) => std::iter::once(p.clone())
                .chain(candidates.iter().filter(|c| **c != p).cloned())
                .collect(),
            _ => candidates.to_vec(),
        }
    }

    pub fn record(&self, version: &str) {
        let mut slot = self.version.write().unwrap_or_else(PoisonError::into_inner);
        if slot.as_deref() != Some(version) {
            *slot = Some(version.to_string());
        }
    }

    pub fn current(&self) -> Option<String> {
        self.version
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

pub struct AzureDocumentTranslator {
    client: Client,
    endpoint: String,
    key: String,
    region: Option<String>,
    api_versions: Vec<String>,
    preferred: PreferredEndpoint,
}

impl AzureDocumentTranslator {
    pub fn new(options: TranslatorOptions) -> doctrans_core::error::Result<Self> {
        let client = http_client(options.request_timeout)?;
        let api_versions = if options.api_versions.is_empty() {
            vec!["2024-05-01".to_string()]
        } else {
            options.api_versions
        };
        Ok(Self {
            client,
            endpoint: options.endpoint.trim().trim_end_matches('/').to_string(),
            key: options.key,
            region: options.region.filter(|r| !r.trim().is_empty()),
            api_versions,
            preferred: PreferredEndpoint::default(),
        })
    }

    fn batches_url(&self, version: &str) -> String {
        format!("{}/translator/document/batches?api-version={}", self.endpoint, version)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        let request = request.header("Ocp-Apim-Subscription-Key", &self.key);
        match &self.region {
            Some(region) => request.header("Ocp-Apim-Subscription-Region", region),
            None => request,
        }
    }

    /// Absolute status URL for a handle (bare ids get the preferred version)
    fn status_url(&self, handle: &OperationHandle) -> String {
        let raw = handle.as_str();
        if raw.starts_with("http://") || raw.starts_with("https://") {
            return raw.to_string();
        }
        let version = self
            .preferred
            .current()
            .or_else(|| self.api_versions.first().cloned())
            .unwrap_or_default();
        format!(
            "{}/translator/document/batches/{}?api-version={}",
            self.endpoint, raw, version
        )
    }
}

#[async_trait]
impl TranslationGateway for AzureDocumentTranslator {
    async fn submit(&self, request: &BatchRequest) -> Result<OperationHandle, TranslationError> {
        let body = BatchBody::from_request(request);
        let mut tried = Vec::new();

        for version in self.preferred.ordered(&self.api_versions) {
            let url = self.batches_url(&version);
            debug!(api_version = %version, "Submitting translation batch");

            let response = self
                .authorize(self.client.post(&url))
                .json(&body)
                .send()
                .await
                .map_err(|e| TranslationError::Transport(e.to_string()))?;

            let status = response.status();
            if status == StatusCode::NOT_FOUND {
                warn!(api_version = %version, "Translator endpoint returned 404, trying next");
                tried.push(version);
                continue;
            }

            let location = response
                .headers()
                .get("operation-location")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            let text = response.text().await.unwrap_or_default();

            if !status.is_success() {
                return Err(TranslationError::Rejected {
                    status: status.as_u16(),
                    body: clip(&text),
                });
            }

            let handle = resolve_handle(&self.endpoint, &version, location.as_deref(), &text)
                .ok_or(TranslationError::MissingHandle)?;
            self.preferred.record(&version);
            info!(api_version = %version, handle = %handle, "Translation batch accepted");
            return Ok(handle);
        }

        Err(TranslationError::NoEndpoint(format!("404 for api-version {}", tried.join(", "))))
    }

    async fn status(&self, handle: &OperationHandle) -> Result<BatchReport, TranslationError> {
        let url = self.status_url(handle);
        let response = self
            .authorize(self.client.get(&url))
            .send()
            .await
            .map_err(|e| TranslationError::Transport(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| TranslationError::Transport(e.to_string()))?;
        if !status.is_success() {
            return Err(TranslationError::PollFailed(format!(
                "{}: {}",
                status.as_u16(),
                clip(&text)
            )));
        }

        let payload: Value =
            serde_json::from_str(&text).map_err(|e| TranslationError::Malformed(e.to_string()))?;
        Ok(BatchReport::from_payload(payload))
    }
}

/// `Operation-Location` header, else the body's `id` as a batches URL
fn resolve_handle(
    endpoint: &str,
    version: &str,
    location: Option<&str>,
    body: &str,
) -> Option<OperationHandle> {
    if let Some(loc) = location.map(str::trim).filter(|l| !l.is_empty()) {
        return Some(OperationHandle::new(loc));
    }
    let value: Value = serde_json::from_str(body).ok()?;
    let id = value.get("id").and_then(Value::as_str)?.trim();
    if id.is_empty() {
        return None;
    }
    Some(OperationHandle::new(format!(
        "{}/translator/document/batches/{}?api-version={}",
        endpoint, id, version
    )))
}

// Request body
#[derive(Debug, Serialize)]
struct BatchBody<'a> {
    inputs: Vec<BatchInput<'a>>,
}

#[derive(Debug, Serialize)]
struct BatchInput<'a> {
    source: SourceSpec<'a>,
    targets: Vec<TargetSpec<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SourceSpec<'a> {
    source_url: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    language: Option<&'a str>,
    filter: PrefixFilter<'a>,
}

#[derive(Debug, Serialize)]
struct PrefixFilter<'a> {
    prefix: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TargetSpec<'a> {
    target_url: &'a str,
    language: &'a str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    glossaries: Vec<GlossarySpec<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GlossarySpec<'a> {
    glossary_url: &'a str,
    format: &'static str,
}

impl<'a> BatchBody<'a> {
    fn from_request(request: &'a BatchRequest) -> Self {
        let glossaries = request
            .glossary_url
            .as_deref()
            .map(|url| GlossarySpec {
                glossary_url: url,
                format: "TSV",
            })
            .into_iter()
            .collect();

        Self {
            inputs: vec![BatchInput {
                source: SourceSpec {
                    source_url: &request.source_url,
                    language: request.source_lang.as_deref(),
                    filter: PrefixFilter {
                        prefix: &request.source_prefix,
                    },
                },
                targets: vec![TargetSpec {
                    target_url: &request.target_url,
                    language: &request.target_lang,
                    glossaries,
                }],
            }],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(glossary: Option<&str>, source_lang: Option<&str>) -> BatchRequest {
        BatchRequest {
            source_url: "https://acme.blob/input?sig=a".to_string(),
            source_prefix: "jobs/j1/parts/b01/".to_string(),
            target_url: "https://acme.blob/output?sig=b".to_string(),
            target_lang: "ja".to_string(),
            source_lang: source_lang.map(str::to_string),
            glossary_url: glossary.map(str::to_string),
        }
    }

    fn translator() -> AzureDocumentTranslator {
        AzureDocumentTranslator::new(
            TranslatorOptions {
                endpoint: "https://acme.cognitiveservices.azure.com/".to_string(),
                key: "k".to_string(),
                region: Some("".to_string()),
                api_versions: vec!["2024-05-01".to_string(), "2023-04-01".to_string()],
                request_timeout: Duration::from_secs(30),
            },
        )
        .unwrap()
    }

    #[test]
    fn test_body_shape() {
        let req = request(Some("https://acme.blob/input/jobs/j1/glossary.tsv?sig=c"), None);
        let body = serde_json::to_value(BatchBody::from_request(&req)).unwrap();

        assert_eq!(
            body,
            json!({
                "inputs": [{
                    "source": {
                        "sourceUrl": "https://acme.blob/input?sig=a",
                        "filter": {"prefix": "jobs/j1/parts/b01/"}
                    },
                    "targets": [{
                        "targetUrl": "https://acme.blob/output?sig=b",
                        "language": "ja",
                        "glossaries": [{
                            "glossaryUrl": "https://acme.blob/input/jobs/j1/glossary.tsv?sig=c",
                            "format": "TSV"
                        }]
                    }]
                }]
            })
        );
    }

    #[test]
    fn test_body_without_glossary_has_source_language() {
        let req = request(None, Some("de"));
        let body = serde_json::to_value(BatchBody::from_request(&req)).unwrap();

        assert_eq!(body["inputs"][0]["source"]["language"], "de");
        assert!(body["inputs"][0]["targets"][0].get("glossaries").is_none());
    }

    #[test]
    fn test_resolve_handle_prefers_header() {
        let handle = resolve_handle(
            "https://acme",
            "2024-05-01",
            Some("https://acme/translator/document/batches/abc?api-version=2024-05-01"),
            r#"{"id": "other"}"#,
        )
        .unwrap();
        assert_eq!(handle.as_str(), "https://acme/translator/document/batches/abc?api-version=2024-05-01");
    }

    #[test]
    fn test_resolve_handle_from_body_id() {
        let handle = resolve_handle("https://acme", "2023-04-01", None, r#"{"id": "xyz"}"#).unwrap();
        assert_eq!(handle.as_str(), "https://acme/translator/document/batches/xyz?api-version=2023-04-01");

        assert!(resolve_handle("https://acme", "v", None, "").is_none());
        assert!(resolve_handle("https://acme", "v", Some("  "), r#"{"id": ""}"#).is_none());
    }

    #[test]
    fn test_preferred_endpoint_reorders() {
        let candidates = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let preferred = PreferredEndpoint::default();
        assert_eq!(preferred.ordered(&candidates), candidates);

        preferred.record("c");
        assert_eq!(preferred.ordered(&candidates), vec!["c", "a", "b"]);

        // Unknown preference is ignored
        preferred.record("z");
        assert_eq!(preferred.ordered(&candidates), candidates);
    }

    #[test]
    fn test_status_url() {
        let t = translator();
        assert_eq!(t.region, None);

        let absolute = OperationHandle::new("https://acme/translator/document/batches/1?api-version=x");
        assert_eq!(t.status_url(&absolute), absolute.as_str());

        let bare = OperationHandle::new("42");
        assert_eq!(
            t.status_url(&bare),
            "https://acme.cognitiveservices.azure.com/translator/document/batches/42?api-version=2024-05-01"
        );
    }
}
