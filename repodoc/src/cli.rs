/// # repodoc CLI Interface (Module)
///
/// Command parsing and orchestration for the `repodoc` binary.
///
/// All business logic (traversal, generation, assembly, export, publishing) lives in
/// [`repodoc-core`]. This module wires configuration, credentials and collaborators together,
/// prints progress lines and turns Ctrl-C into cooperative cancellation.
///
/// ## How To Use
/// - For command-line users: `repodoc --help`.
/// - For programmatic/integration use: call [`run`] with a constructed [`Cli`].
///
/// [`repodoc-core`]: ../../repodoc-core/
use crate::load_config::{load_config, CliConfig};
use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use repodoc_core::client::{OpenAiClient, OpenAiConfig};
use repodoc_core::contract::RepoPublisher;
use repodoc_core::document::AggregatedDocument;
use repodoc_core::download::{GitHubBrowser, GitHubConfig};
use repodoc_core::export::{export_to_path, ExportFormat};
use repodoc_core::locator::RepositoryLocator;
use repodoc_core::pipeline::{Pipeline, ProgressPhase, RunState};
use repodoc_core::presets::UseCase;
use repodoc_core::publish::GitCliPublisher;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// CLI for repodoc: document every source file of a repository with a language model.
#[derive(Parser)]
#[clap(
    name = "repodoc",
    version,
    about = "Generate one aggregated documentation file for a hosted repository"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Generate documentation for a repository using the given config file
    Generate {
        /// Path to the YAML config file
        #[clap(long)]
        config: PathBuf,
        /// Repository URL; overrides `repository.url`
        #[clap(long)]
        repo: Option<String>,
        /// Output path; overrides `output.path`
        #[clap(long)]
        out: Option<PathBuf>,
        /// Export format (md, txt, pdf, html, json, docx); overrides `output.format`
        #[clap(long)]
        format: Option<ExportFormat>,
        /// Instruction that replaces the default per-file prompt
        #[clap(long, conflicts_with = "use_case")]
        instruction: Option<String>,
        /// Preset instruction, see `repodoc use-cases`
        #[clap(long)]
        use_case: Option<UseCase>,
        /// Commit the document to the repository named in the `publish` section
        #[clap(long)]
        publish: bool,
    },
    /// List the preset use cases
    UseCases,
}

/// Extracted async CLI logic entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<()> {
    tracing::info!("trace_initialised");

    match cli.command {
        Commands::UseCases => {
            for use_case in UseCase::all() {
                println!("{:<24}{}", use_case.slug(), use_case.instruction());
            }
            Ok(())
        }
        Commands::Generate {
            config,
            repo,
            out,
            format,
            instruction,
            use_case,
            publish,
        } => {
            let mut config = load_config(config)?;
            if let Some(text) = instruction {
                config.generation.instruction = Some(text);
                config.generation.use_case = None;
            } else if let Some(preset) = use_case {
                config.generation.instruction = None;
                config.generation.use_case = Some(preset);
            }
            if let Some(out) = out {
                config.output.path = out;
            }
            if let Some(format) = format {
                config.output.format = format;
            }
            let url = repo
                .or_else(|| config.repository.url.clone())
                .ok_or_else(|| anyhow!("no repository given: pass --repo or set repository.url"))?;
            generate(&config, &url, publish).await
        }
    }
}

async fn generate(config: &CliConfig, url: &str, publish: bool) -> Result<()> {
    let locator = RepositoryLocator::parse(url)?;
    if publish && config.publish.is_none() {
        return Err(anyhow!("--publish requires a `publish` section in the config"));
    }
    tracing::info!(command = "generate", repo = %locator, "Starting documentation run");

    let browser = GitHubBrowser::new(GitHubConfig {
        api_base: config.secrets.github_api_url.clone(),
        token: config.secrets.github_token.clone(),
        ..GitHubConfig::default()
    })?;
    let client = OpenAiClient::new(OpenAiConfig::new(config.secrets.openai_api_key.clone()))?;
    let pipeline = Pipeline::new(Arc::new(browser), Arc::new(client), config.pipeline_config());

    let mut handle = pipeline.spawn(locator, 64);
    let mut progress = handle
        .take_progress()
        .ok_or_else(|| anyhow!("progress channel already taken"))?;
    let printer = tokio::spawn(async move {
        while let Some(event) = progress.recv().await {
            if event.phase == ProgressPhase::Dispatching {
                println!("{event}");
            }
        }
    });

    let canceller = handle.canceller();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, cancelling after the current request");
            eprintln!("Cancelling after the current request...");
            canceller.cancel();
        }
    });

    let result = handle.join().await;
    interrupt.abort();
    let _ = printer.await;

    match result {
        Ok(outcome) => {
            for skipped in &outcome.skipped {
                eprintln!("Skipped {}: {}", skipped.path, skipped.reason);
            }
            let path = export(&outcome.document, &config.output.path, config.output.format)?;
            summarise(&outcome.document, &path);

            if outcome.state == RunState::Aborted {
                tracing::warn!(command = "generate", "Run cancelled; partial document exported");
                if publish {
                    eprintln!("Run was cancelled; not publishing a partial document.");
                }
                return Ok(());
            }
            if let Some(section) = config.publish.as_ref().filter(|_| publish) {
                let publisher = GitCliPublisher::new(config.secrets.github_token.clone());
                let receipt = publisher
                    .publish(&section.to_request(), &outcome.document.render())
                    .await
                    .context("publishing documentation failed")?;
                println!(
                    "Documentation {} {} in {}",
                    if receipt.appended { "appended to" } else { "written to" },
                    section.file_name,
                    section.repo_url
                );
            }
            tracing::info!(command = "generate", "Documentation run complete");
            Ok(())
        }
        Err(run_error) => {
            tracing::error!(command = "generate", error = %run_error, "Documentation run aborted");
            if let Some(partial) = &run_error.partial {
                let path = export(partial, &config.output.path, config.output.format)?;
                summarise(partial, &path);
            }
            Err(anyhow::Error::new(run_error))
        }
    }
}

fn export(document: &AggregatedDocument, path: &Path, format: ExportFormat) -> Result<PathBuf> {
    export_to_path(path, format, &document.render())
        .with_context(|| format!("exporting documentation to {}", path.display()))
}

fn summarise(document: &AggregatedDocument, path: &Path) {
    let failed = document.failed_sections().count();
    println!(
        "Documented {} file(s), {} failed. Written to {}",
        document.sections.len() - failed,
        failed,
        path.display()
    );
    if document.partial {
        println!(
            "Partial document: {} of {} files processed.",
            document.sections.len(),
            document.expected_sections
        );
    }
}
