//! Question answering about a single document.

use burobuddy_core::ChatMessage;
use tracing::debug;

use crate::generate::{GenerateError, GenerateRequest, GenerationParams, Generator, PromptMessage};
use crate::prompt::build_chat_system_prompt;

/// Longest user message accepted, in characters.
pub const MAX_MESSAGE_CHARS: usize = 4096;

/// Ask a question about a document.
///
/// The conversation sent to the model is the grounding system prompt, then
/// `history` in order, then `user_message`. Returns the trimmed reply.
pub async fn chat_with_document<G: Generator + ?Sized>(
    generator: &G,
    params: GenerationParams,
    document_text: &str,
    analysis_summary: &str,
    history: &[ChatMessage],
    user_message: &str,
) -> Result<String, GenerateError> {
    let user_message = user_message.trim();
    if user_message.is_empty() {
        return Err(GenerateError::EmptyPrompt);
    }
    let len = user_message.chars().count();
    if len > MAX_MESSAGE_CHARS {
        return Err(GenerateError::PromptTooLong {
            len,
            max: MAX_MESSAGE_CHARS,
        });
    }

    let mut messages = Vec::with_capacity(history.len() + 2);
    messages.push(PromptMessage::system(build_chat_system_prompt(
        document_text,
        analysis_summary,
    )));
    messages.extend(history.iter().map(|m| PromptMessage {
        role: m.role.into(),
        content: m.content.clone(),
    }));
    messages.push(PromptMessage::user(user_message));

    debug!(history = history.len(), "sending document question");
    let response = generator
        .generate(&GenerateRequest::new(messages, params))
        .await?;
    Ok(response.text.trim().to_string())
}
