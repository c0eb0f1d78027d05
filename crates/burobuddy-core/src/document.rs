//! Record types exchanged with the document API.
//!
//! The API assigns ids and timestamps; the analysis itself stays a plain
//! [`DocumentAnalysis`] and is layered inside [`StoredAnalysis`].

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::analysis::DocumentAnalysis;
use crate::validate::validate_value;
use crate::violation::ValidationFailure;

/// An uploaded document as listed by the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentSummary {
    pub id: i64,
    pub filename: String,
    pub mimetype: String,
    /// Processing status, e.g. `"uploaded"`.
    pub status: String,
    /// ISO 8601 timestamp string.
    pub created_at: String,
}

/// Document metadata plus what has been derived from it so far.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentDetail {
    #[serde(flatten)]
    pub summary: DocumentSummary,
    #[serde(default)]
    pub storage_path: Option<String>,
    #[serde(default)]
    pub has_text: bool,
    #[serde(default)]
    pub has_analysis: bool,
}

/// Text pulled out of a document by PDF parsing or OCR.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedText {
    pub document_id: i64,
    pub text: String,
    /// `"pdf"`, `"ocr"` or `"none"`.
    pub extraction_method: String,
}

/// Analysis as returned by the API, before the contract check.
#[derive(Debug, Clone, Deserialize)]
pub struct AnalysisEnvelope {
    pub document_id: i64,
    pub analysis: Value,
    pub model: String,
    pub created_at: String,
}

impl AnalysisEnvelope {
    /// Run the embedded analysis through the validator.
    pub fn validate(self) -> Result<StoredAnalysis, ValidationFailure> {
        let analysis = validate_value(&self.analysis)?;
        Ok(StoredAnalysis {
            document_id: self.document_id,
            analysis,
            model: self.model,
            created_at: self.created_at,
        })
    }
}

/// A validated analysis with the identifiers the caller assigned to it.
///
/// Re-analysing a document produces a new `StoredAnalysis`; the newest one
/// replaces older ones.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredAnalysis {
    pub document_id: i64,
    pub analysis: DocumentAnalysis,
    pub model: String,
    /// ISO 8601 timestamp string.
    pub created_at: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// One turn of the per-document Q&A.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    /// ISO 8601 timestamp string.
    pub created_at: String,
}
