//! LLM layer: prompt contract, generation backends, the validate-and-retry
//! analysis loop, and document chat.

pub mod analyzer;
#[cfg(feature = "bedrock")]
pub mod bedrock;
pub mod chat;
pub mod fence;
pub mod generate;
#[cfg(feature = "openai")]
pub mod openai;
pub mod prompt;

pub use analyzer::{AnalysisOutcome, AnalyzeError, Analyzer, AnalyzerConfig};
pub use chat::chat_with_document;
pub use fence::strip_code_fence;
pub use generate::{
    GenerateError, GenerateRequest, GenerateResponse, GenerationParams, Generator, PromptMessage,
    PromptRole, StubGenerator,
};
#[cfg(feature = "bedrock")]
pub use bedrock::{BedrockCredentials, BedrockGenerator};
#[cfg(feature = "openai")]
pub use openai::OpenAiGenerator;
