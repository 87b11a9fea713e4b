//! Diagnostic fetch of the target Figma document
//!
//! Only logs what it finds; failures never reach the pipeline.

use reqwest::Client;
use rhino_scene::SourceError;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::config::FigmaConfig;

#[derive(Debug, Deserialize)]
struct FileResponse {
    #[serde(default)]
    name: Option<String>,
    document: DocumentNode,
}

#[derive(Debug, Deserialize)]
struct DocumentNode {
    id: String,
    #[serde(default)]
    children: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentSummary {
    pub name: Option<String>,
    pub document_id: String,
    pub pages: usize,
}

impl DocumentSummary {
    pub fn from_json(body: &str) -> Result<Self, serde_json::Error> {
        Ok(serde_json::from_str::<FileResponse>(body)?.into())
    }
}

impl From<FileResponse> for DocumentSummary {
    fn from(response: FileResponse) -> Self {
        Self {
            name: response.name,
            document_id: response.document.id,
            pages: response.document.children.len(),
        }
    }
}

pub fn file_url(figma: &FigmaConfig) -> String {
    format!("{}/v1/files/{}", figma.api_base, figma.file_key)
}

pub async fn fetch_summary(figma: &FigmaConfig) -> Result<DocumentSummary, SourceError> {
    let client = Client::builder().timeout(Duration::from_secs(30)).build()?;
    let response = client
        .get(file_url(figma))
        .header("X-Figma-Token", &figma.token)
        .send()
        .await?;
    if !response.status().is_success() {
        return Err(SourceError::Status(response.status().as_u16()));
    }
    let body = response.text().await?;
    Ok(DocumentSummary::from_json(&body)?)
}

/// Fire-and-forget; spawned after each successful run.
pub async fn log_document(figma: FigmaConfig) {
    match fetch_summary(&figma).await {
        Ok(summary) => info!(
            "Figma document {} ({}) has {} pages",
            summary.document_id,
            summary.name.as_deref().unwrap_or("untitled"),
            summary.pages
        ),
        Err(SourceError::Status(status)) => {
            warn!("Figma API returned {} for file {}", status, figma.file_key)
        }
        Err(e) => error!("Figma API request failed: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_url() {
        let figma = FigmaConfig {
            api_base: "https://api.figma.com".into(),
            token: "secret".into(),
            file_key: "AbC123".into(),
        };
        assert_eq!(file_url(&figma), "https://api.figma.com/v1/files/AbC123");
    }

    #[test]
    fn test_summary_from_response() {
        let body = r#"{
            "name": "Facade study",
            "document": {
                "id": "0:0",
                "type": "DOCUMENT",
                "children": [{"id": "0:1", "type": "CANVAS"}, {"id": "5:0", "type": "CANVAS"}]
            }
        }"#;
        let summary = DocumentSummary::from_json(body).unwrap();
        assert_eq!(summary.document_id, "0:0");
        assert_eq!(summary.pages, 2);
        assert_eq!(summary.name.as_deref(), Some("Facade study"));

        let bare = DocumentSummary::from_json(r#"{"document": {"id": "0:0"}}"#).unwrap();
        assert_eq!(bare.pages, 0);
        assert!(DocumentSummary::from_json(r#"{"err": "Not found"}"#).is_err());
    }
}
