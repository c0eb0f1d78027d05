//! HTTP client for the BüroBuddy document API.

use burobuddy_core::{
    AnalysisEnvelope, ChatMessage, DocumentDetail, DocumentSummary, ExtractedText,
    StoredAnalysis, ValidationFailure,
};
use reqwest::{Response, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server returned {status}: {body}")]
    Server { status: u16, body: String },
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("analysis for document {document_id} breaks the contract: {failure}")]
    InvalidAnalysis {
        document_id: i64,
        failure: ValidationFailure,
    },
}

/// Client for the document API (`/documents/...`).
pub struct ApiClient {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    content: &'a str,
}

impl ApiClient {
    /// `base_url` should be like `http://localhost:8000` (no trailing slash).
    pub fn new(base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// All documents, newest first.
    pub async fn list_documents(&self) -> Result<Vec<DocumentSummary>, ClientError> {
        let docs: Vec<DocumentSummary> = self.get_json("/documents").await?;
        info!(count = docs.len(), "listed documents");
        Ok(docs)
    }

    pub async fn get_document(&self, id: i64) -> Result<DocumentDetail, ClientError> {
        self.get_json(&format!("/documents/{id}")).await
    }

    /// Ask the server to (re-)extract text from the stored file.
    pub async fn extract_text(&self, id: i64) -> Result<ExtractedText, ClientError> {
        self.post_json(&format!("/documents/{id}/extract-text"), None::<&()>)
            .await
    }

    /// Previously extracted text.
    pub async fn get_text(&self, id: i64) -> Result<ExtractedText, ClientError> {
        self.get_json(&format!("/documents/{id}/text")).await
    }

    /// Run a new analysis. The result replaces any earlier one as "latest".
    pub async fn analyze_document(&self, id: i64) -> Result<StoredAnalysis, ClientError> {
        let envelope: AnalysisEnvelope = self
            .post_json(&format!("/documents/{id}/analyze"), None::<&()>)
            .await?;
        validate_envelope(envelope)
    }

    /// Latest analysis, or `None` when the document has not been analysed.
    pub async fn get_analysis(&self, id: i64) -> Result<Option<StoredAnalysis>, ClientError> {
        let url = self.url(&format!("/documents/{id}/analysis"));
        info!(url = %url, "fetching latest analysis");
        let resp = self.client.get(&url).send().await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let envelope: AnalysisEnvelope = read_json(resp).await?;
        validate_envelope(envelope).map(Some)
    }

    /// Ask a question about the document; returns the assistant's reply.
    pub async fn send_chat_message(
        &self,
        id: i64,
        content: &str,
    ) -> Result<ChatMessage, ClientError> {
        self.post_json(
            &format!("/documents/{id}/chat"),
            Some(&ChatRequest { content }),
        )
        .await
    }

    /// Chat history, oldest first.
    pub async fn chat_messages(&self, id: i64) -> Result<Vec<ChatMessage>, ClientError> {
        self.get_json(&format!("/documents/{id}/messages")).await
    }

    /// Delete a document with its text, analyses, chat and stored file.
    pub async fn delete_document(&self, id: i64) -> Result<(), ClientError> {
        self.delete(&format!("/documents/{id}")).await
    }

    pub async fn delete_all_documents(&self) -> Result<(), ClientError> {
        self.delete("/documents").await
    }

    // ── Helpers ──

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        let url = self.url(path);
        info!(url = %url, "GET");
        let resp = self.client.get(&url).send().await?;
        read_json(resp).await
    }

    async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: Option<&B>,
    ) -> Result<T, ClientError> {
        let url = self.url(path);
        info!(url = %url, "POST");
        let mut req = self.client.post(&url);
        if let Some(body) = body {
            req = req.json(body);
        }
        let resp = req.send().await?;
        read_json(resp).await
    }

    async fn delete(&self, path: &str) -> Result<(), ClientError> {
        let url = self.url(path);
        info!(url = %url, "DELETE");
        let resp = self.client.delete(&url).send().await?;
        check_status(resp).await?;
        Ok(())
    }
}

async fn check_status(resp: Response) -> Result<Response, ClientError> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(ClientError::Server {
            status: status.as_u16(),
            body,
        });
    }
    Ok(resp)
}

async fn read_json<T: DeserializeOwned>(resp: Response) -> Result<T, ClientError> {
    let resp = check_status(resp).await?;
    let bytes = resp.bytes().await?;
    Ok(serde_json::from_slice(&bytes)?)
}

fn validate_envelope(envelope: AnalysisEnvelope) -> Result<StoredAnalysis, ClientError> {
    let document_id = envelope.document_id;
    envelope.validate().map_err(|failure| {
        warn!(
            document_id,
            kind = failure.kind().as_str(),
            violations = failure.violations().len(),
            "server returned an analysis that fails validation"
        );
        ClientError::InvalidAnalysis {
            document_id,
            failure,
        }
    })
}
