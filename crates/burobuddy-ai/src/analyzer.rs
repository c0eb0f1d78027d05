//! Letter analysis loop: generate, validate, and retry with the full list of
//! violations until the model produces a valid analysis or attempts run out.

use burobuddy_core::{DocumentAnalysis, ValidationFailure, parse_and_validate};
use thiserror::Error;
use tracing::{info, warn};

use crate::fence::strip_code_fence;
use crate::generate::{GenerateError, GenerateRequest, GenerationParams, Generator, PromptMessage};
use crate::prompt::{analysis_messages, build_correction_prompt};

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

#[derive(Error, Debug)]
pub enum AnalyzeError {
    #[error("no text to analyze")]
    EmptyText,
    #[error("generation failed: {0}")]
    Generate(#[from] GenerateError),
    #[error("model output still invalid after {attempts} attempt(s): {last}")]
    Invalid {
        attempts: u32,
        last: ValidationFailure,
    },
}

#[derive(Debug, Clone, Copy)]
pub struct AnalyzerConfig {
    /// Total generation calls allowed, including the first. Values below 1
    /// are treated as 1.
    pub max_attempts: u32,
    pub params: GenerationParams,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            params: GenerationParams::ANALYSIS,
        }
    }
}

/// A validated analysis plus how it was obtained.
#[derive(Debug, Clone)]
pub struct AnalysisOutcome {
    pub analysis: DocumentAnalysis,
    pub model: String,
    pub attempts: u32,
    /// Summed over all attempts.
    pub tokens_used: u32,
}

pub struct Analyzer<G> {
    generator: G,
    config: AnalyzerConfig,
}

impl<G: Generator> Analyzer<G> {
    pub fn new(generator: G, config: AnalyzerConfig) -> Self {
        Self { generator, config }
    }

    pub fn generator(&self) -> &G {
        &self.generator
    }

    /// Analyse extracted letter text.
    ///
    /// Rejected replies stay in the conversation, followed by a correction
    /// message listing every violation. Backend errors are not retried.
    pub async fn analyze(&self, text: &str) -> Result<AnalysisOutcome, AnalyzeError> {
        if text.trim().is_empty() {
            return Err(AnalyzeError::EmptyText);
        }

        let max_attempts = self.config.max_attempts.max(1);
        let mut messages = analysis_messages(text);
        let mut tokens_used = 0u32;
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            let request = GenerateRequest::new(messages.clone(), self.config.params);
            let response = self.generator.generate(&request).await?;
            tokens_used = tokens_used.saturating_add(response.tokens_used);

            match parse_and_validate(strip_code_fence(&response.text)) {
                Ok(analysis) => {
                    info!(
                        model = %response.model,
                        attempt,
                        actions = analysis.actions.len(),
                        deadlines = analysis.deadlines.len(),
                        risk = %analysis.overall_risk,
                        "analysis accepted"
                    );
                    return Ok(AnalysisOutcome {
                        analysis,
                        model: response.model,
                        attempts: attempt,
                        tokens_used,
                    });
                }
                Err(failure) => {
                    warn!(
                        attempt,
                        max_attempts,
                        kind = failure.kind().as_str(),
                        violations = failure.violations().len(),
                        error = %failure,
                        "model output rejected"
                    );
                    if attempt >= max_attempts {
                        return Err(AnalyzeError::Invalid {
                            attempts: attempt,
                            last: failure,
                        });
                    }
                    messages.push(PromptMessage::assistant(response.text));
                    messages.push(PromptMessage::user(build_correction_prompt(&failure)));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use burobuddy_core::{FailureKind, RiskLevel};

    use super::*;
    use crate::generate::{GenerateResponse, PromptRole, StubGenerator};

    /// Replays canned replies and records every request it receives.
    struct Scripted {
        replies: Mutex<VecDeque<Result<String, GenerateError>>>,
        seen: Mutex<Vec<GenerateRequest>>,
    }

    impl Scripted {
        fn new(replies: Vec<Result<String, GenerateError>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                seen: Mutex::new(Vec::new()),
            }
        }

        fn requests(&self) -> Vec<GenerateRequest> {
            self.seen.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Generator for Scripted {
        fn model(&self) -> &str {
            "scripted"
        }

        async fn generate(
            &self,
            request: &GenerateRequest,
        ) -> Result<GenerateResponse, GenerateError> {
            self.seen.lock().unwrap().push(request.clone());
            let reply = self
                .replies
                .lock()
                .unwrap()
                .pop_front()
                .expect("no scripted reply left")?;
            Ok(GenerateResponse {
                text: reply,
                model: "scripted".into(),
                tokens_used: 10,
            })
        }
    }

    const VALID: &str = r#"{
        "language_detected": "de",
        "summary_en": "Reminder to pay the electricity bill.",
        "overall_risk": "high",
        "actions": [{
            "title_en": "Pay the bill",
            "details_en": "Transfer 80 EUR.",
            "due_date": "2024-05-01",
            "confidence": 0.95,
            "category": "payment",
            "evidence": {"quote_de": "Zahlen Sie bis zum 01.05.2024", "page": 1}
        }],
        "deadlines": [],
        "entities": {"sender": "Stadtwerke", "amount_eur": 80}
    }"#;

    const INVALID: &str = r#"{
        "language_detected": "de",
        "summary_en": "Reminder.",
        "overall_risk": "extreme",
        "actions": [],
        "deadlines": [],
        "entities": {}
    }"#;

    #[tokio::test]
    async fn first_reply_accepted() {
        let analyzer = Analyzer::new(Scripted::new(vec![Ok(VALID.into())]), AnalyzerConfig::default());
        let outcome = analyzer.analyze("Mahnung").await.unwrap();
        assert_eq!(outcome.attempts, 1);
        assert_eq!(outcome.tokens_used, 10);
        assert_eq!(outcome.model, "scripted");
        assert_eq!(outcome.analysis.overall_risk, RiskLevel::High);
        assert_eq!(outcome.analysis.entities.amount_eur, Some(80.0));
    }

    #[tokio::test]
    async fn fenced_reply_accepted() {
        let fenced = format!("```json\n{VALID}\n```");
        let analyzer = Analyzer::new(Scripted::new(vec![Ok(fenced)]), AnalyzerConfig::default());
        assert!(analyzer.analyze("Mahnung").await.is_ok());
    }

    #[tokio::test]
    async fn retries_with_violation_feedback() {
        let analyzer = Analyzer::new(
            Scripted::new(vec![Ok(INVALID.into()), Ok(VALID.into())]),
            AnalyzerConfig::default(),
        );
        let outcome = analyzer.analyze("Mahnung").await.unwrap();
        assert_eq!(outcome.attempts, 2);
        assert_eq!(outcome.tokens_used, 20);

        let requests = analyzer.generator().requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].messages.len(), 2);

        let retry = &requests[1].messages;
        assert_eq!(retry.len(), 4);
        assert_eq!(retry[2].role, PromptRole::Assistant);
        assert_eq!(retry[2].content, INVALID);
        assert_eq!(retry[3].role, PromptRole::User);
        assert!(retry[3].content.contains("overall_risk"));
        assert!(retry[3].content.contains("\"extreme\""));
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let analyzer = Analyzer::new(
            Scripted::new(vec![
                Ok("Sure! Here's the JSON: {...}".into()),
                Ok(INVALID.into()),
            ]),
            AnalyzerConfig {
                max_attempts: 2,
                ..AnalyzerConfig::default()
            },
        );
        match analyzer.analyze("Mahnung").await {
            Err(AnalyzeError::Invalid { attempts, last }) => {
                assert_eq!(attempts, 2);
                assert_eq!(last.kind(), FailureKind::SchemaViolation);
                assert_eq!(last.paths(), vec!["overall_risk"]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn zero_attempts_still_tries_once() {
        let analyzer = Analyzer::new(
            Scripted::new(vec![Ok(INVALID.into())]),
            AnalyzerConfig {
                max_attempts: 0,
                ..AnalyzerConfig::default()
            },
        );
        let err = analyzer.analyze("Mahnung").await.unwrap_err();
        assert!(matches!(err, AnalyzeError::Invalid { attempts: 1, .. }));
    }

    #[tokio::test]
    async fn backend_error_not_retried() {
        let analyzer = Analyzer::new(
            Scripted::new(vec![
                Err(GenerateError::Server {
                    status: 429,
                    body: "rate limited".into(),
                }),
                Ok(VALID.into()),
            ]),
            AnalyzerConfig::default(),
        );
        let err = analyzer.analyze("Mahnung").await.unwrap_err();
        assert!(matches!(
            err,
            AnalyzeError::Generate(GenerateError::Server { status: 429, .. })
        ));
        assert_eq!(analyzer.generator().requests().len(), 1);
    }

    #[tokio::test]
    async fn empty_text_rejected_without_generation() {
        let analyzer = Analyzer::new(Scripted::new(vec![]), AnalyzerConfig::default());
        assert!(matches!(
            analyzer.analyze("  \n").await,
            Err(AnalyzeError::EmptyText)
        ));
        assert!(analyzer.generator().requests().is_empty());
    }

    #[tokio::test]
    async fn stub_backend_end_to_end() {
        let analyzer = Analyzer::new(StubGenerator, AnalyzerConfig::default());
        let outcome = analyzer.analyze("Sehr geehrte Damen und Herren").await.unwrap();
        assert_eq!(outcome.model, "stub");
        assert_eq!(outcome.analysis.overall_risk, RiskLevel::Low);
    }
}
