use repodoc_core::export::ExportFormat;
use repodoc_core::presets::UseCase;
use serial_test::serial;
use std::env;
use std::fs::write;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::NamedTempFile;

fn config_file(yaml: &str) -> NamedTempFile {
    let file = NamedTempFile::new().expect("temp file");
    write(file.path(), yaml).unwrap();
    file
}

/// A full config maps onto pipeline, output and publish settings; secrets come from env.
#[tokio::test]
#[serial]
async fn test_load_config_full() {
    let file = config_file(
        r#"
repository:
  url: "https://github.com/example/repo"
  extensions: [".rs", ".py"]
model:
  model: gpt-4o-mini
  temperature: 0.2
  max_output_tokens: 800
generation:
  use_case: api-reference
  request_spacing_ms: 250
  fetch_concurrency: 8
output:
  path: ./tmp/docs
  format: pdf
publish:
  repo_url: "https://github.com/example/docs.git"
  file_name: REPO_DOCS.md
"#,
    );
    env::set_var("OPENAI_API_KEY", "sk-test");
    env::set_var("GITHUB_TOKEN", "gh-test");

    let config = repodoc::load_config::load_config(file.path()).expect("Config should load");

    assert_eq!(config.repository.url.as_deref(), Some("https://github.com/example/repo"));
    assert_eq!(config.model.model, "gpt-4o-mini");
    assert_eq!(config.model.max_output_tokens, 800);
    assert_eq!(config.output.path, PathBuf::from("./tmp/docs"));
    assert_eq!(config.output.format, ExportFormat::Pdf);
    assert_eq!(config.secrets.openai_api_key, "sk-test");
    assert_eq!(config.secrets.github_token.as_deref(), Some("gh-test"));

    let pipeline = config.pipeline_config();
    assert_eq!(pipeline.request_spacing, Duration::from_millis(250));
    assert_eq!(pipeline.fetch_concurrency, 8);
    assert!(pipeline.policy.matches("main.rs"));
    assert!(!pipeline.policy.matches("Main.java"));
    assert_eq!(
        pipeline.instruction.as_deref(),
        Some(UseCase::ApiReference.instruction())
    );

    let publish = config.publish.expect("publish section").to_request();
    assert_eq!(publish.branch, "main");
    assert_eq!(publish.file_name, "REPO_DOCS.md");
    assert!(publish.work_dir.is_none());

    env::remove_var("GITHUB_TOKEN");
}

/// Omitted sections fall back to the built-in defaults.
#[tokio::test]
#[serial]
async fn test_load_config_defaults() {
    let file = config_file("repository:\n  url: https://github.com/example/repo\n");
    env::set_var("OPENAI_API_KEY", "sk-test");
    env::remove_var("GITHUB_TOKEN");

    let config = repodoc::load_config::load_config(file.path()).expect("Config should load");
    let pipeline = config.pipeline_config();

    assert_eq!(pipeline.request_spacing, Duration::from_secs(5));
    assert_eq!(pipeline.model.model, "gpt-3.5-turbo");
    assert!(pipeline.instruction.is_none());
    assert!(pipeline.policy.matches("Main.java"));
    assert_eq!(config.output.format, ExportFormat::Markdown);
    assert!(config.publish.is_none());
    assert!(config.secrets.github_token.is_none());
}

#[tokio::test]
#[serial]
async fn test_load_config_requires_openai_key() {
    let file = config_file("repository:\n  url: https://github.com/example/repo\n");
    env::remove_var("OPENAI_API_KEY");

    let err = repodoc::load_config::load_config(file.path()).unwrap_err();
    assert!(err.to_string().contains("OPENAI_API_KEY"), "got: {err}");
}

#[tokio::test]
#[serial]
async fn test_load_config_rejects_instruction_and_use_case_together() {
    let file = config_file(
        "generation:\n  instruction: Explain this\n  use_case: todos\n",
    );
    env::set_var("OPENAI_API_KEY", "sk-test");

    let err = repodoc::load_config::load_config(file.path()).unwrap_err();
    assert!(err.to_string().contains("mutually exclusive"), "got: {err}");
}

/// This test ensures that if the config file is not valid YAML, load_config errors and reports as such.
#[tokio::test]
#[serial]
async fn test_load_config_errors_for_invalid_file() {
    let file = config_file("not-yaml: [:::");
    env::set_var("OPENAI_API_KEY", "sk-test");

    let err = repodoc::load_config::load_config(file.path()).unwrap_err();
    let msg = err.to_string();
    assert!(
        msg.contains("parse") || msg.contains("YAML"),
        "Parse error expected, got: {msg}"
    );
}

#[tokio::test]
#[serial]
async fn test_load_config_errors_for_missing_file() {
    let err = repodoc::load_config::load_config("does/not/exist.yaml").unwrap_err();
    assert!(err.to_string().contains("Failed to read config file"));
}

#[tokio::test]
#[serial]
async fn test_load_config_accepts_word_processor_format() {
    let file = config_file("output:\n  path: out/docs\n  format: docx\n");
    env::set_var("OPENAI_API_KEY", "sk-test");

    let config = repodoc::load_config::load_config(file.path()).expect("Config should load");
    assert_eq!(config.output.format, ExportFormat::Docx);
}
