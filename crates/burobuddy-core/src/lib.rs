pub mod analysis;
pub mod document;
pub mod validate;
pub mod violation;

pub use analysis::{
    Action, ActionCategory, Deadline, DocDate, DocumentAnalysis, Entities, Evidence, RiskLevel,
};
pub use document::{
    AnalysisEnvelope, ChatMessage, DocumentDetail, DocumentSummary, ExtractedText, Role,
    StoredAnalysis,
};
pub use validate::{parse_and_validate, validate_value};
pub use violation::{FailureKind, JsonType, ValidationFailure, Violation, ViolationKind};
