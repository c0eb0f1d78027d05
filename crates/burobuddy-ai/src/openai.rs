//! OpenAI-compatible chat completions backend.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::generate::{GenerateError, GenerateRequest, GenerateResponse, Generator, PromptMessage};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Client for `POST {base_url}/chat/completions`.
pub struct OpenAiGenerator {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [PromptMessage],
    max_tokens: u32,
    temperature: f32,
}

#[derive(Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    model: Option<String>,
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct Usage {
    total_tokens: u32,
}

impl OpenAiGenerator {
    /// `base_url` should be like `https://api.openai.com/v1` (no trailing slash).
    pub fn new(base_url: String, api_key: String, model: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model,
        }
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

#[async_trait]
impl Generator for OpenAiGenerator {
    fn model(&self) -> &str {
        &self.model
    }

    async fn generate(&self, request: &GenerateRequest) -> Result<GenerateResponse, GenerateError> {
        let url = self.completions_url();
        let body = CompletionRequest {
            model: &self.model,
            messages: &request.messages,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        };

        debug!(url = %url, model = %self.model, messages = request.messages.len(), "requesting completion");
        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .timeout(REQUEST_TIMEOUT)
            .json(&body)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(GenerateError::Server {
                status: status.as_u16(),
                body,
            });
        }

        let completion: CompletionResponse = resp.json().await?;
        into_response(completion, &self.model)
    }
}

fn into_response(
    completion: CompletionResponse,
    requested_model: &str,
) -> Result<GenerateResponse, GenerateError> {
    let choice = completion
        .choices
        .into_iter()
        .next()
        .ok_or(GenerateError::EmptyResponse)?;
    let tokens_used = completion.usage.map(|u| u.total_tokens).unwrap_or(0);
    let model = completion
        .model
        .unwrap_or_else(|| requested_model.to_string());
    info!(model = %model, tokens_used, "completion received");
    Ok(GenerateResponse {
        text: choice.message.content.unwrap_or_default(),
        model,
        tokens_used,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generate::GenerationParams;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};
    use tokio::task::JoinHandle;

    #[test]
    fn trims_trailing_slash() {
        let g = OpenAiGenerator::new(
            "http://localhost:8080/v1/".into(),
            "sk-test".into(),
            DEFAULT_MODEL.into(),
        );
        assert_eq!(g.completions_url(), "http://localhost:8080/v1/chat/completions");
        assert_eq!(g.model(), DEFAULT_MODEL);
    }

    #[test]
    fn request_body_shape() {
        let req = GenerateRequest::new(
            vec![PromptMessage::system("sys"), PromptMessage::user("hi")],
            GenerationParams::ANALYSIS,
        );
        let body = CompletionRequest {
            model: "gpt-4o-mini",
            messages: &req.messages,
            max_tokens: req.max_tokens,
            temperature: req.temperature,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["model"], "gpt-4o-mini");
        assert_eq!(json["max_tokens"], 4096);
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["content"], "hi");
    }

    #[test]
    fn parses_completion() {
        let completion: CompletionResponse = serde_json::from_str(
            r#"{
                "id": "chatcmpl-1",
                "model": "gpt-4o-mini-2024-07-18",
                "choices": [{"index": 0, "message": {"role": "assistant", "content": "{}"}, "finish_reason": "stop"}],
                "usage": {"prompt_tokens": 10, "completion_tokens": 2, "total_tokens": 12}
            }"#,
        )
        .unwrap();
        let resp = into_response(completion, "gpt-4o-mini").unwrap();
        assert_eq!(resp.text, "{}");
        assert_eq!(resp.model, "gpt-4o-mini-2024-07-18");
        assert_eq!(resp.tokens_used, 12);
    }

    #[test]
    fn null_content_becomes_empty_text() {
        let completion: CompletionResponse = serde_json::from_str(
            r#"{"choices": [{"message": {"role": "assistant", "content": null}}]}"#,
        )
        .unwrap();
        let resp = into_response(completion, "gpt-4o-mini").unwrap();
        assert_eq!(resp.text, "");
        assert_eq!(resp.model, "gpt-4o-mini");
        assert_eq!(resp.tokens_used, 0);
    }

    #[test]
    fn no_choices_is_empty_response() {
        let completion: CompletionResponse = serde_json::from_str(r#"{"choices": []}"#).unwrap();
        assert!(matches!(
            into_response(completion, "gpt-4o-mini"),
            Err(GenerateError::EmptyResponse)
        ));
    }

    #[tokio::test]
    async fn rate_limit_becomes_server_error() {
        let (base, server) =
            serve_once("429 Too Many Requests", r#"{"error":{"message":"Rate limit reached"}}"#).await;
        let g = OpenAiGenerator::new(base, "sk-test".into(), DEFAULT_MODEL.into());
        let req = GenerateRequest::new(vec![PromptMessage::user("hi")], GenerationParams::CHAT);
        match g.generate(&req).await {
            Err(GenerateError::Server { status, body }) => {
                assert_eq!(status, 429);
                assert!(body.contains("Rate limit reached"));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(server.await.unwrap(), "POST /chat/completions HTTP/1.1");
    }

    #[tokio::test]
    async fn completion_served_over_http() {
        let (base, server) = serve_once(
            "200 OK",
            r#"{"model": "gpt-4o-mini", "choices": [{"message": {"role": "assistant", "content": "ok"}}],
                "usage": {"total_tokens": 3}}"#,
        )
        .await;
        let g = OpenAiGenerator::new(format!("{base}/v1"), "sk-test".into(), DEFAULT_MODEL.into());
        let req = GenerateRequest::new(vec![PromptMessage::user("hi")], GenerationParams::CHAT);
        let resp = g.generate(&req).await.unwrap();
        assert_eq!(resp.text, "ok");
        assert_eq!(resp.tokens_used, 3);
        assert_eq!(server.await.unwrap(), "POST /v1/chat/completions HTTP/1.1");
    }

    // ── Canned HTTP server ──

    /// Accept one connection, read the full request, answer with `status`
    /// and `body`. Resolves to the request line, e.g. `GET /documents HTTP/1.1`.
    async fn serve_once(status: &'static str, body: &'static str) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let request = read_request(&mut socket).await;
            let response = format!(
                "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
            request.lines().next().unwrap_or_default().to_string()
        });
        (format!("http://{addr}"), handle)
    }

    async fn read_request(socket: &mut TcpStream) -> String {
        let mut data = Vec::new();
        let mut buf = [0u8; 4096];
        loop {
            let n = socket.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            data.extend_from_slice(&buf[..n]);
            if let Some(end) = data.windows(4).position(|w| w == b"\r\n\r\n") {
                let head = String::from_utf8_lossy(&data[..end]).to_ascii_lowercase();
                let len = head
                    .lines()
                    .find_map(|l| l.strip_prefix("content-length:"))
                    .and_then(|v| v.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                if data.len() >= end + 4 + len {
                    break;
                }
            }
        }
        String::from_utf8_lossy(&data).into_owned()
    }
}
