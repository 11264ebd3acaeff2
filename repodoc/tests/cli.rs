use assert_cmd::Command;
use predicates::prelude::*;
use std::fs::write;
use tempfile::NamedTempFile;

fn create_minimal_config() -> NamedTempFile {
    let config = NamedTempFile::new().expect("Creating temp config file failed");
    write(
        config.path(),
        b"repository:\n  url: \"https://github.com/example/repo\"\noutput:\n  format: md\n",
    )
    .expect("Writing temp config failed");
    config
}

#[test]
fn use_cases_lists_every_preset() {
    let mut cmd = Command::cargo_bin("repodoc").expect("Binary exists");
    cmd.arg("use-cases")
        .assert()
        .success()
        .stdout(
            predicate::str::contains("api-reference")
                .and(predicate::str::contains("Create API Reference Documentation"))
                .and(predicate::str::contains("architecture-overview")),
        );
}

#[test]
fn generate_fails_without_config_file() {
    let mut cmd = Command::cargo_bin("repodoc").expect("Binary exists");
    cmd.args(["generate", "--config", "does/not/exist.yaml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read config file"));
}

#[test]
fn generate_fails_without_api_key() {
    let config = create_minimal_config();
    let mut cmd = Command::cargo_bin("repodoc").expect("Binary exists");
    cmd.arg("generate")
        .arg("--config")
        .arg(config.path())
        .env("OPENAI_API_KEY", "")
        .assert()
        .failure()
        .stderr(predicate::str::contains("OPENAI_API_KEY"));
}

#[test]
fn generate_rejects_invalid_repository_url() {
    let config = create_minimal_config();
    let mut cmd = Command::cargo_bin("repodoc").expect("Binary exists");
    cmd.arg("generate")
        .arg("--config")
        .arg(config.path())
        .args(["--repo", "not-a-repository"])
        .env("OPENAI_API_KEY", "sk-test")
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid repository locator"));
}

#[test]
fn generate_rejects_unknown_format_and_conflicting_instructions() {
    let config = create_minimal_config();
    Command::cargo_bin("repodoc")
        .expect("Binary exists")
        .arg("generate")
        .arg("--config")
        .arg(config.path())
        .args(["--format", "odt"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unsupported export format"));

    Command::cargo_bin("repodoc")
        .expect("Binary exists")
        .arg("generate")
        .arg("--config")
        .arg(config.path())
        .args(["--instruction", "Explain", "--use-case", "todos"])
        .assert()
        .failure();
}

use std::sync::{Arc, Mutex};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{layer::Context, Layer, Registry};

/// Custom Layer to collect emitted event messages.
struct EventCollector {
    events: Arc<Mutex<Vec<String>>>,
}

impl<S> Layer<S> for EventCollector
where
    S: tracing::Subscriber,
{
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        self.events.lock().unwrap().push(format!("{:?}", event));
    }
}

#[tokio::test]
async fn emits_trace_initialised_event() {
    let events = Arc::new(Mutex::new(Vec::new()));
    let collector = EventCollector {
        events: events.clone(),
    };
    let subscriber = Registry::default().with(collector);
    let _guard = tracing::subscriber::set_default(subscriber);

    use repodoc::cli::{run, Cli, Commands};

    let cli = Cli {
        command: Commands::UseCases,
    };
    run(cli).await.expect("listing use cases succeeds");

    let event_msgs = events.lock().unwrap();
    assert!(
        event_msgs.iter().any(|msg| msg.contains("trace_initialised")),
        "Expected a 'trace_initialised' trace event, got: {:?}",
        event_msgs
    );
}
