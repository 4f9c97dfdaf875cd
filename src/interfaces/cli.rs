//! Command-line front end.
//!
//! One-shot mode (`--question`) answers a single question and exits;
//! without it, an interactive loop reads questions from stdin until EOF or
//! "exit". User-facing output goes to stdout; diagnostics go through
//! tracing.

use crate::application::use_cases::insight_pipeline::InsightPipeline;
use crate::application::use_cases::query_adapter::QueryTemplateAdapter;
use crate::application::use_cases::transcript::SessionTranscript;
use crate::domain::error::{AppError, Result};
use crate::infrastructure::config::Settings;
use crate::infrastructure::context_store::{load_schema, WorkspaceCatalog};
use crate::infrastructure::llm_clients::OpenAIClient;
use crate::infrastructure::powerbi::{PowerBiExecutor, TokenProvider};
use clap::Parser;
use std::io::{BufRead, Write};
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "reportlens", version, about = "Natural-language insights over Power BI usage metrics")]
pub struct Cli {
    /// Workspace display name from workspaces.json. Optional when the
    /// catalog has exactly one entry.
    #[arg(short, long)]
    pub workspace: Option<String>,

    /// Ask one question and exit instead of starting the interactive loop.
    #[arg(short, long)]
    pub question: Option<String>,

    /// Do not echo the generated DAX before each answer.
    #[arg(long)]
    pub no_dax: bool,
}

pub async fn run(cli: Cli) -> Result<()> {
    let settings = Settings::load()?;
    let catalog = WorkspaceCatalog::load(&settings.workspaces_file)?;
    let schema = Arc::new(load_schema(settings.context_file.as_deref())?);

    let (workspace_name, workspace) = match &cli.workspace {
        Some(name) => (name.as_str(), catalog.get(name)?),
        None => catalog.sole_entry().ok_or_else(|| {
            AppError::ConfigError(format!(
                "Multiple workspaces configured; pick one with --workspace. Available: {:?}",
                catalog.names()
            ))
        })?,
    };
    info!(workspace = workspace_name, workspace_id = %workspace.workspace_id, "workspace selected");

    let tokens = TokenProvider::new(settings.azure_credentials()?);
    let executor = Arc::new(PowerBiExecutor::new(
        tokens,
        &settings.powerbi_api_base,
        &workspace.workspace_id,
        &workspace.dataset_id,
    )?);
    let llm = Arc::new(OpenAIClient::new());

    let adapter =
        QueryTemplateAdapter::new(schema).with_known_reports(workspace.reports.clone());
    let pipeline = InsightPipeline::new(
        adapter,
        llm,
        executor,
        settings.generation_llm(),
        settings.explanation_llm(),
        settings.max_retries,
    );

    let mut transcript = SessionTranscript::new();

    if let Some(question) = &cli.question {
        return ask(&pipeline, &mut transcript, question, cli.no_dax).await;
    }

    println!(
        "reportlens — workspace '{}'. Ask about report usage; 'exit' to quit.",
        workspace_name
    );
    let stdin = std::io::stdin();
    loop {
        print!("> ");
        std::io::stdout().flush()?;
        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let question = line.trim();
        if question.is_empty() {
            continue;
        }
        if question.eq_ignore_ascii_case("exit") || question.eq_ignore_ascii_case("quit") {
            break;
        }
        if let Err(e) = ask(&pipeline, &mut transcript, question, cli.no_dax).await {
            // Fatal config/auth problems end the session; the rest only
            // fail the current question.
            if e.is_fatal() {
                return Err(e);
            }
            eprintln!("{}", e);
        }
    }
    Ok(())
}

async fn ask(
    pipeline: &InsightPipeline,
    transcript: &mut SessionTranscript,
    question: &str,
    no_dax: bool,
) -> Result<()> {
    let insight = pipeline.answer(transcript, question).await?;
    if !no_dax {
        println!("\n--- DAX ---\n{}\n-----------", insight.query.dax);
    }
    println!("{}\n", insight.answer);
    Ok(())
}
