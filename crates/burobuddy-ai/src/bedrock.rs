//! AWS Bedrock backend using the Converse API.

use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_bedrockruntime::Client;
use aws_sdk_bedrockruntime::config::timeout::TimeoutConfig;
use aws_sdk_bedrockruntime::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_bedrockruntime::error::DisplayErrorContext;
use aws_sdk_bedrockruntime::types::{
    ContentBlock, ConversationRole, ConverseOutput, InferenceConfiguration, Message,
    SystemContentBlock,
};
use tracing::{debug, info};

use crate::generate::{
    GenerateError, GenerateRequest, GenerateResponse, Generator, PromptMessage, PromptRole,
};

pub const DEFAULT_REGION: &str = "eu-central-1";
pub const DEFAULT_MODEL_ID: &str = "amazon.nova-micro-v1:0";

const READ_TIMEOUT: Duration = Duration::from_secs(120);

/// Static credentials for [`BedrockGenerator`].
#[derive(Debug, Clone)]
pub struct BedrockCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
}

impl BedrockCredentials {
    /// `None` when either half is blank.
    pub fn new(access_key_id: &str, secret_access_key: &str) -> Option<Self> {
        let access_key_id = access_key_id.trim();
        let secret_access_key = secret_access_key.trim();
        if access_key_id.is_empty() || secret_access_key.is_empty() {
            return None;
        }
        Some(Self {
            access_key_id: access_key_id.to_string(),
            secret_access_key: secret_access_key.to_string(),
        })
    }
}

pub struct BedrockGenerator {
    client: Client,
    model_id: String,
}

impl BedrockGenerator {
    pub fn new(region: String, credentials: BedrockCredentials, model_id: String) -> Self {
        let config = aws_sdk_bedrockruntime::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(region))
            .credentials_provider(Credentials::new(
                credentials.access_key_id,
                credentials.secret_access_key,
                None,
                None,
                "burobuddy",
            ))
            .timeout_config(TimeoutConfig::builder().read_timeout(READ_TIMEOUT).build())
            .build();
        Self {
            client: Client::from_conf(config),
            model_id,
        }
    }
}

#[async_trait]
impl Generator for BedrockGenerator {
    fn model(&self) -> &str {
        &self.model_id
    }

    async fn generate(&self, request: &GenerateRequest) -> Result<GenerateResponse, GenerateError> {
        let (system, messages) = split_messages(&request.messages)?;
        debug!(model = %self.model_id, messages = messages.len(), "requesting Bedrock converse");
        let resp = self
            .client
            .converse()
            .model_id(&self.model_id)
            .set_system(Some(system))
            .set_messages(Some(messages))
            .inference_config(inference_config(request))
            .send()
            .await
            .map_err(|e| GenerateError::Bedrock(DisplayErrorContext(&e).to_string()))?;

        let tokens_used = resp
            .usage()
            .map(|u| u32::try_from(u.total_tokens()).unwrap_or(0))
            .unwrap_or(0);
        let text = first_text(resp.output())?;
        info!(model = %self.model_id, tokens_used, "converse completed");
        Ok(GenerateResponse {
            text,
            model: self.model_id.clone(),
            tokens_used,
        })
    }
}

fn inference_config(request: &GenerateRequest) -> InferenceConfiguration {
    InferenceConfiguration::builder()
        .max_tokens(i32::try_from(request.max_tokens).unwrap_or(i32::MAX))
        .temperature(request.temperature)
        .build()
}

/// System prompts go in Converse's separate `system` list; the rest become
/// conversation turns in order.
fn split_messages(
    messages: &[PromptMessage],
) -> Result<(Vec<SystemContentBlock>, Vec<Message>), GenerateError> {
    let mut system = Vec::new();
    let mut turns = Vec::new();
    for m in messages {
        let role = match m.role {
            PromptRole::System => {
                system.push(SystemContentBlock::Text(m.content.clone()));
                continue;
            }
            PromptRole::User => ConversationRole::User,
            PromptRole::Assistant => ConversationRole::Assistant,
        };
        let message = Message::builder()
            .role(role)
            .content(ContentBlock::Text(m.content.clone()))
            .build()
            .map_err(|e| GenerateError::Bedrock(e.to_string()))?;
        turns.push(message);
    }
    Ok((system, turns))
}

/// Text of the first content block of the reply message.
fn first_text(output: Option<&ConverseOutput>) -> Result<String, GenerateError> {
    let message = output
        .and_then(|o| o.as_message().ok())
        .ok_or(GenerateError::EmptyResponse)?;
    Ok(message
        .content()
        .iter()
        .find_map(|block| block.as_text().ok())
        .cloned()
        .unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generate::GenerationParams;

    #[test]
    fn blank_credentials_rejected() {
        assert!(BedrockCredentials::new("", "secret").is_none());
        assert!(BedrockCredentials::new("AKIA", "  ").is_none());
        let creds = BedrockCredentials::new(" AKIA ", "secret").unwrap();
        assert_eq!(creds.access_key_id, "AKIA");
    }

    #[test]
    fn system_prompt_split_from_turns() {
        let (system, turns) = split_messages(&[
            PromptMessage::system("sys"),
            PromptMessage::user("letter"),
            PromptMessage::assistant("{}"),
            PromptMessage::user("fix it"),
        ])
        .unwrap();
        assert_eq!(system, vec![SystemContentBlock::Text("sys".into())]);
        let roles: Vec<&ConversationRole> = turns.iter().map(|m| m.role()).collect();
        assert_eq!(
            roles,
            vec![
                &ConversationRole::User,
                &ConversationRole::Assistant,
                &ConversationRole::User
            ]
        );
        assert_eq!(turns[2].content(), &[ContentBlock::Text("fix it".into())]);
    }

    #[test]
    fn reply_text_extracted() {
        let message = Message::builder()
            .role(ConversationRole::Assistant)
            .content(ContentBlock::Text("{\"ok\": true}".into()))
            .build()
            .unwrap();
        let output = ConverseOutput::Message(message);
        assert_eq!(first_text(Some(&output)).unwrap(), "{\"ok\": true}");
    }

    #[test]
    fn missing_output_is_empty_response() {
        assert!(matches!(first_text(None), Err(GenerateError::EmptyResponse)));
    }

    #[test]
    fn analysis_params_carried() {
        let req = GenerateRequest::new(vec![], GenerationParams::ANALYSIS);
        let config = inference_config(&req);
        assert_eq!(config.max_tokens(), Some(4096));
        assert_eq!(config.temperature(), Some(0.2));
    }
}
