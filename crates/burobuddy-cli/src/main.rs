//! burobuddy: German letters in, English insights, actions and deadlines out.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result, bail};
use burobuddy_ai::{Analyzer, GenerationParams, chat_with_document, strip_code_fence};
use burobuddy_client::ApiClient;
use burobuddy_core::{ValidationFailure, parse_and_validate};
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use serde_json::json;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

mod config;
mod display;

use config::LlmArgs;

/// burobuddy: understand German official letters
#[derive(Parser, Debug)]
#[command(name = "burobuddy")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Log filter (trace, debug, info, warn, error, or a full directive)
    #[arg(long, env = "BUROBUDDY_LOG", default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Check raw model output against the analysis contract
    Validate {
        /// File with the raw output; stdin when absent or `-`
        file: Option<PathBuf>,

        /// Strip a surrounding markdown code fence before parsing
        #[arg(long)]
        strip_fence: bool,

        /// Print the normalised analysis (or the failure) as JSON
        #[arg(long)]
        json: bool,
    },

    /// Analyse extracted letter text with the configured backend
    Analyze {
        /// File with the extracted text
        file: PathBuf,

        /// Print the normalised analysis as JSON
        #[arg(long)]
        json: bool,

        #[command(flatten)]
        llm: LlmArgs,
    },

    /// Ask a question about a letter
    Ask {
        /// File with the extracted text
        file: PathBuf,

        question: String,

        /// Analysis summary to ground the answer
        #[arg(long, default_value = "")]
        summary: String,

        #[command(flatten)]
        llm: LlmArgs,
    },

    /// Documents stored on the BüroBuddy server
    Docs {
        /// Server base URL
        #[arg(long, env = "BUROBUDDY_API_URL", default_value = "http://localhost:8000")]
        api_url: String,

        #[command(subcommand)]
        command: DocsCommands,
    },
}

#[derive(Subcommand, Debug)]
enum DocsCommands {
    /// List documents, newest first
    #[command(alias = "ls")]
    List,

    /// Show document metadata
    Show { id: i64 },

    /// Re-run text extraction
    Extract { id: i64 },

    /// Print extracted text
    Text { id: i64 },

    /// Run a new analysis
    Analyze { id: i64 },

    /// Show the latest analysis
    Analysis { id: i64 },

    /// Ask a question about a document
    Chat { id: i64, message: String },

    /// Show chat history
    Messages { id: i64 },

    /// Delete one document
    Delete { id: i64 },

    /// Delete every document
    DeleteAll {
        /// Confirm deletion
        #[arg(long)]
        yes: bool,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_new(&cli.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let today = Local::now().date_naive();

    match cli.command {
        Commands::Validate {
            file,
            strip_fence,
            json,
        } => {
            let raw = read_input(file.as_deref())?;
            run_validate(&raw, strip_fence, json, today)
        }
        Commands::Analyze { file, json, llm } => {
            let text = read_input(Some(&file))?;
            let analyzer = Analyzer::new(llm.generator(), llm.analyzer_config());
            let outcome = analyzer.analyze(&text).await?;
            tracing::info!(
                model = %outcome.model,
                attempts = outcome.attempts,
                tokens = outcome.tokens_used,
                "analysis complete"
            );
            if json {
                println!("{}", serde_json::to_string_pretty(&outcome.analysis)?);
            } else {
                display::print_analysis_card(&outcome.analysis, today)?;
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Ask {
            file,
            question,
            summary,
            llm,
        } => {
            let text = read_input(Some(&file))?;
            let generator = llm.generator();
            let reply = chat_with_document(
                generator.as_ref(),
                GenerationParams::CHAT,
                &text,
                &summary,
                &[],
                &question,
            )
            .await?;
            println!("{reply}");
            Ok(ExitCode::SUCCESS)
        }
        Commands::Docs { api_url, command } => {
            run_docs(ApiClient::new(api_url), command, today).await?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

// ── validate ──

fn run_validate(raw: &str, strip_fence: bool, json: bool, today: NaiveDate) -> Result<ExitCode> {
    let input = if strip_fence {
        strip_code_fence(raw)
    } else {
        raw
    };
    match parse_and_validate(input) {
        Ok(analysis) => {
            if json {
                println!("{}", serde_json::to_string_pretty(&analysis)?);
            } else {
                display::print_analysis_card(&analysis, today)?;
            }
            Ok(ExitCode::SUCCESS)
        }
        Err(failure) => {
            tracing::debug!(kind = failure.kind().as_str(), "validation failed");
            if json {
                println!("{}", serde_json::to_string_pretty(&failure_json(&failure))?);
            } else {
                display::print_failure(&failure)?;
            }
            Ok(ExitCode::FAILURE)
        }
    }
}

fn failure_json(failure: &ValidationFailure) -> serde_json::Value {
    match failure {
        ValidationFailure::MalformedJson {
            message,
            line,
            column,
        } => json!({
            "kind": failure.kind().as_str(),
            "message": message,
            "line": line,
            "column": column,
        }),
        ValidationFailure::SchemaViolation(violations) => json!({
            "kind": failure.kind().as_str(),
            "violations": violations,
        }),
    }
}

// ── docs ──

async fn run_docs(client: ApiClient, command: DocsCommands, today: NaiveDate) -> Result<()> {
    match command {
        DocsCommands::List => {
            let docs = client.list_documents().await?;
            display::print_document_list(&docs);
        }
        DocsCommands::Show { id } => {
            let detail = client.get_document(id).await?;
            display::print_document_detail(&detail);
        }
        DocsCommands::Extract { id } => {
            let text = client.extract_text(id).await?;
            println!(
                "Extracted {} characters via {}",
                text.text.chars().count(),
                text.extraction_method
            );
        }
        DocsCommands::Text { id } => {
            let text = client.get_text(id).await?;
            println!("{}", text.text);
        }
        DocsCommands::Analyze { id } => {
            let stored = client.analyze_document(id).await?;
            display::print_stored_analysis(&stored, today)?;
        }
        DocsCommands::Analysis { id } => match client.get_analysis(id).await? {
            Some(stored) => display::print_stored_analysis(&stored, today)?,
            None => println!("Document #{id} has not been analysed yet."),
        },
        DocsCommands::Chat { id, message } => {
            let reply = client.send_chat_message(id, &message).await?;
            println!("{}", reply.content);
        }
        DocsCommands::Messages { id } => {
            let messages = client.chat_messages(id).await?;
            display::print_chat(&messages);
        }
        DocsCommands::Delete { id } => {
            client.delete_document(id).await?;
            println!("Deleted document #{id}.");
        }
        DocsCommands::DeleteAll { yes } => {
            if !yes {
                bail!("refusing to delete every document without --yes");
            }
            client.delete_all_documents().await?;
            println!("Deleted all documents.");
        }
    }
    Ok(())
}

// ── Helpers ──

fn read_input(file: Option<&Path>) -> Result<String> {
    match file {
        Some(path) if path != Path::new("-") => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display())),
        _ => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("failed to read stdin")?;
            Ok(buf)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
    }

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_validate_flags() {
        let cli = Cli::try_parse_from(["burobuddy", "validate", "out.txt", "--strip-fence"]).unwrap();
        match cli.command {
            Commands::Validate {
                file,
                strip_fence,
                json,
            } => {
                assert_eq!(file, Some(PathBuf::from("out.txt")));
                assert!(strip_fence);
                assert!(!json);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn parses_bedrock_provider() {
        let cli = Cli::try_parse_from([
            "burobuddy",
            "analyze",
            "letter.txt",
            "--provider",
            "bedrock",
            "--aws-region",
            "eu-west-1",
        ])
        .unwrap();
        match cli.command {
            Commands::Analyze { llm, .. } => {
                assert_eq!(llm.provider, config::Provider::Bedrock);
                assert_eq!(llm.aws_region, "eu-west-1");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn parses_docs_chat() {
        let cli = Cli::try_parse_from([
            "burobuddy",
            "docs",
            "--api-url",
            "http://example.test",
            "chat",
            "7",
            "Was soll ich tun?",
        ])
        .unwrap();
        match cli.command {
            Commands::Docs {
                api_url,
                command: DocsCommands::Chat { id, message },
            } => {
                assert_eq!(api_url, "http://example.test");
                assert_eq!(id, 7);
                assert_eq!(message, "Was soll ich tun?");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn validate_exit_codes() {
        let valid = r#"{"language_detected":"de","summary_en":"x","overall_risk":"low",
                        "actions":[],"deadlines":[],"entities":{}}"#;
        assert_eq!(run_validate(valid, false, true, today()).unwrap(), ExitCode::SUCCESS);
        assert_eq!(
            run_validate("{\"overall_risk\":\"low\"}", false, true, today()).unwrap(),
            ExitCode::FAILURE
        );
    }

    #[test]
    fn fence_only_stripped_on_request() {
        let fenced = "```json\n{\"language_detected\":\"de\",\"summary_en\":\"x\",\"overall_risk\":\"low\",\"actions\":[],\"deadlines\":[],\"entities\":{}}\n```";
        assert_eq!(run_validate(fenced, false, true, today()).unwrap(), ExitCode::FAILURE);
        assert_eq!(run_validate(fenced, true, true, today()).unwrap(), ExitCode::SUCCESS);
    }

    #[test]
    fn failure_json_shapes() {
        let malformed = parse_and_validate("not json").unwrap_err();
        let value = failure_json(&malformed);
        assert_eq!(value["kind"], "malformed_json");
        assert_eq!(value["line"], 1);

        let schema = parse_and_validate(r#"{"overall_risk":"low"}"#).unwrap_err();
        let value = failure_json(&schema);
        assert_eq!(value["kind"], "schema_violation");
        assert_eq!(value["violations"].as_array().unwrap().len(), 5);
        assert_eq!(value["violations"][0]["path"], "language_detected");
    }
}
