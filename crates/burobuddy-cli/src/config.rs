//! Backend selection from flags and environment.

use burobuddy_ai::analyzer::DEFAULT_MAX_ATTEMPTS;
use burobuddy_ai::bedrock::{DEFAULT_MODEL_ID, DEFAULT_REGION};
use burobuddy_ai::openai::{DEFAULT_BASE_URL, DEFAULT_MODEL};
use burobuddy_ai::{
    AnalyzerConfig, BedrockCredentials, BedrockGenerator, GenerationParams, Generator,
    OpenAiGenerator, StubGenerator,
};
use clap::{Args, ValueEnum};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Provider {
    Openai,
    Bedrock,
    Stub,
}

/// LLM backend settings shared by `analyze` and `ask`.
#[derive(Args, Debug, Clone)]
pub struct LlmArgs {
    /// Generation backend
    #[arg(long, env = "LLM_PROVIDER", value_enum, default_value_t = Provider::Openai)]
    pub provider: Provider,

    /// API key; when empty the offline stub backend is used
    #[arg(long, env = "OPENAI_API_KEY", default_value = "", hide_env_values = true)]
    pub openai_api_key: String,

    /// Model name
    #[arg(long, env = "OPENAI_MODEL", default_value = DEFAULT_MODEL)]
    pub openai_model: String,

    /// OpenAI-compatible endpoint
    #[arg(long, env = "OPENAI_BASE_URL", default_value = DEFAULT_BASE_URL)]
    pub openai_base_url: String,

    /// AWS region for Bedrock
    #[arg(long, env = "AWS_REGION", default_value = DEFAULT_REGION)]
    pub aws_region: String,

    /// AWS access key; Bedrock falls back to the stub backend when empty
    #[arg(long, env = "AWS_ACCESS_KEY_ID", default_value = "", hide_env_values = true)]
    pub aws_access_key_id: String,

    #[arg(long, env = "AWS_SECRET_ACCESS_KEY", default_value = "", hide_env_values = true)]
    pub aws_secret_access_key: String,

    /// Bedrock model id
    #[arg(long, env = "BEDROCK_MODEL_ID", default_value = DEFAULT_MODEL_ID)]
    pub bedrock_model_id: String,

    /// Generation attempts per analysis, including the first
    #[arg(long, env = "BUROBUDDY_MAX_ATTEMPTS", default_value_t = DEFAULT_MAX_ATTEMPTS)]
    pub max_attempts: u32,
}

impl LlmArgs {
    pub fn generator(&self) -> Box<dyn Generator> {
        match self.provider {
            Provider::Openai if !self.openai_api_key.trim().is_empty() => {
                info!(model = %self.openai_model, base_url = %self.openai_base_url, "using OpenAI backend");
                Box::new(OpenAiGenerator::new(
                    self.openai_base_url.clone(),
                    self.openai_api_key.trim().to_string(),
                    self.openai_model.clone(),
                ))
            }
            Provider::Openai => {
                warn!("OPENAI_API_KEY is not set, falling back to the stub backend");
                Box::new(StubGenerator)
            }
            Provider::Bedrock => {
                match BedrockCredentials::new(&self.aws_access_key_id, &self.aws_secret_access_key) {
                    Some(credentials) => {
                        info!(model = %self.bedrock_model_id, region = %self.aws_region, "using Bedrock backend");
                        Box::new(BedrockGenerator::new(
                            self.aws_region.clone(),
                            credentials,
                            self.bedrock_model_id.clone(),
                        ))
                    }
                    None => {
                        warn!("AWS credentials are not set, falling back to the stub backend");
                        Box::new(StubGenerator)
                    }
                }
            }
            Provider::Stub => Box::new(StubGenerator),
        }
    }

    pub fn analyzer_config(&self) -> AnalyzerConfig {
        AnalyzerConfig {
            max_attempts: self.max_attempts,
            params: GenerationParams::ANALYSIS,
        }
    }
}
