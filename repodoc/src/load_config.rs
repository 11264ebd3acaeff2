/// `load_config` module: loads a static YAML config and injects secrets from the environment.
///
/// This module is the only place where user-supplied YAML is parsed and mapped onto the
/// strongly-typed pipeline, export and publish settings of `repodoc-core`.
///
/// # Responsibilities
/// - Parse the YAML file into typed sections (`repository`, `model`, `generation`, `output`, `publish`)
/// - Inject secrets from the environment: `OPENAI_API_KEY` (required), `GITHUB_TOKEN` and
///   `GITHUB_API_URL` (optional). Secrets never live in the YAML file.
/// - Produce clear diagnostics; every failure surfaces at the CLI boundary as `anyhow::Error`.
use anyhow::{bail, Result};
use repodoc_core::client::ModelConfig;
use repodoc_core::contract::RepoPublishRequest;
use repodoc_core::download::InclusionPolicy;
use repodoc_core::export::ExportFormat;
use repodoc_core::pipeline::PipelineConfig;
use repodoc_core::presets::UseCase;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{error, info};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RepositorySection {
    /// Repository to document; may be supplied on the command line instead.
    pub url: Option<String>,
    /// File-name suffixes to include. The built-in source extensions when omitted.
    pub extensions: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GenerationSection {
    pub instruction: Option<String>,
    pub use_case: Option<UseCase>,
    pub request_spacing_ms: u64,
    pub fetch_concurrency: usize,
}

impl Default for GenerationSection {
    fn default() -> Self {
        GenerationSection {
            instruction: None,
            use_case: None,
            request_spacing_ms: 5_000,
            fetch_concurrency: 4,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputSection {
    pub path: PathBuf,
    pub format: ExportFormat,
}

impl Default for OutputSection {
    fn default() -> Self {
        OutputSection {
            path: PathBuf::from("documentation"),
            format: ExportFormat::Markdown,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PublishSection {
    pub repo_url: String,
    #[serde(default = "default_branch")]
    pub branch: String,
    #[serde(default = "default_file_name")]
    pub file_name: String,
    #[serde(default = "default_commit_message")]
    pub commit_message: String,
    pub work_dir: Option<PathBuf>,
}

fn default_branch() -> String {
    "main".to_string()
}

fn default_file_name() -> String {
    "DOCUMENTATION.md".to_string()
}

fn default_commit_message() -> String {
    "Update generated documentation".to_string()
}

impl PublishSection {
    pub fn to_request(&self) -> RepoPublishRequest {
        RepoPublishRequest {
            repo_url: self.repo_url.clone(),
            branch: self.branch.clone(),
            file_name: self.file_name.clone(),
            commit_message: self.commit_message.clone(),
            work_dir: self.work_dir.clone(),
        }
    }
}

/// Credentials read from the environment.
#[derive(Clone)]
pub struct Secrets {
    pub openai_api_key: String,
    pub github_token: Option<String>,
    pub github_api_url: Option<String>,
}

impl std::fmt::Debug for Secrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Secrets")
            .field("openai_api_key", &"<redacted>")
            .field("github_token", &self.github_token.as_ref().map(|_| "<redacted>"))
            .field("github_api_url", &self.github_api_url)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct CliConfig {
    pub repository: RepositorySection,
    pub model: ModelConfig,
    pub generation: GenerationSection,
    pub output: OutputSection,
    pub publish: Option<PublishSection>,
    pub secrets: Secrets,
}

impl CliConfig {
    /// The configured instruction override: explicit text, else the use case's text.
    pub fn instruction(&self) -> Option<String> {
        self.generation
            .instruction
            .clone()
            .or_else(|| self.generation.use_case.map(|u| u.instruction().to_string()))
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            model: self.model.clone(),
            instruction: self.instruction(),
            request_spacing: Duration::from_millis(self.generation.request_spacing_ms),
            fetch_concurrency: self.generation.fetch_concurrency.max(1),
            policy: self
                .repository
                .extensions
                .clone()
                .map(InclusionPolicy::new)
                .unwrap_or_default(),
        }
    }
}

/// Loads a static YAML config file (no secrets) and injects required env vars for secrets.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<CliConfig> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");

    let config_content = match fs::read_to_string(path_ref) {
        Ok(content) => content,
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
            return Err(anyhow::anyhow!(
                "Failed to read config file {:?}: {}",
                path_ref,
                e
            ));
        }
    };

    #[derive(Debug, Deserialize)]
    struct RawConfig {
        #[serde(default)]
        repository: RepositorySection,
        #[serde(default)]
        model: ModelConfig,
        #[serde(default)]
        generation: GenerationSection,
        #[serde(default)]
        output: OutputSection,
        #[serde(default)]
        publish: Option<PublishSection>,
    }

    let raw: RawConfig = match serde_yaml::from_str(&config_content) {
        Ok(conf) => {
            info!(config_path = ?path_ref, "Parsed config YAML successfully");
            conf
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML");
            return Err(anyhow::anyhow!("Failed to parse config YAML: {e}"));
        }
    };

    if raw.generation.instruction.is_some() && raw.generation.use_case.is_some() {
        error!(config_path = ?path_ref, "Both instruction and use_case are set");
        bail!("generation.instruction and generation.use_case are mutually exclusive");
    }

    let secrets = secrets_from_env()?;

    Ok(CliConfig {
        repository: raw.repository,
        model: raw.model,
        generation: raw.generation,
        output: raw.output,
        publish: raw.publish,
        secrets,
    })
}

fn secrets_from_env() -> Result<Secrets> {
    let openai_api_key = match std::env::var("OPENAI_API_KEY") {
        Ok(key) if !key.trim().is_empty() => key,
        _ => {
            error!("OPENAI_API_KEY is not set");
            bail!("OPENAI_API_KEY must be set in the environment");
        }
    };
    let optional = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());
    Ok(Secrets {
        openai_api_key,
        github_token: optional("GITHUB_TOKEN"),
        github_api_url: optional("GITHUB_API_URL"),
    })
}
