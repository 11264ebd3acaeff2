//! Publishing a document into a file of a remote git repository.
//!
//! The working copy is cloned when it does not exist yet and pulled
//! otherwise. The target file is then written, committed and pushed with the
//! `git` binary.
//!
//! Merge policy: an existing markdown target (`.md`, any case) gets the new
//! document appended after a blank line; any other target is overwritten.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, error, info};

use crate::contract::{PublishReceipt, RepoPublishRequest, RepoPublisher};
use crate::error::{DocgenError, Result};

/// Environment variable the credential helper reads the token from.
const TOKEN_ENV: &str = "REPODOC_GIT_TOKEN";

/// Inline helper answering git's credential requests from [`TOKEN_ENV`].
const CREDENTIAL_HELPER: &str =
    "!f() { echo username=x-access-token; echo \"password=$REPODOC_GIT_TOKEN\"; }; f";

/// [`RepoPublisher`] driving the `git` command line.
#[derive(Clone, Default)]
pub struct GitCliPublisher {
    /// Token for https remotes. Handed to git per process, never persisted.
    token: Option<String>,
}

impl std::fmt::Debug for GitCliPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitCliPublisher")
            .field("token_set", &self.token.is_some())
            .finish()
    }
}

impl GitCliPublisher {
    pub fn new(token: Option<String>) -> Self {
        GitCliPublisher {
            token: token.filter(|t| !t.is_empty()),
        }
    }

    fn publish_blocking(&self, req: &RepoPublishRequest, content: &str) -> Result<PublishReceipt> {
        let _scratch;
        let work_dir: PathBuf = match &req.work_dir {
            Some(dir) => dir.clone(),
            None => {
                let tmp = tempfile::tempdir()?;
                let dir = tmp.path().join("repo");
                _scratch = tmp;
                dir
            }
        };

        if work_dir.join(".git").exists() {
            info!(path = %work_dir.display(), "Pulling existing working copy");
            let token = self.token.as_deref();
            run_git(git_command(Some(work_dir.as_path()), &["pull"], token), "pull")?;
        } else {
            if let Some(parent) = work_dir.parent() {
                fs::create_dir_all(parent)?;
            }
            info!(repo_url = %req.repo_url, branch = %req.branch, path = %work_dir.display(), "Cloning repository");
            let target = work_dir.to_string_lossy();
            run_git(
                git_command(
                    None,
                    &["clone", "--branch", &req.branch, &req.repo_url, &target],
                    self.token.as_deref(),
                ),
                "clone",
            )?;
        }

        let file_path = work_dir.join(&req.file_name);
        let appended = merge_into(&file_path, &req.file_name, content)?;
        debug!(path = %file_path.display(), appended, "Wrote documentation file");

        run_git(git_command(Some(work_dir.as_path()), &["add", &req.file_name], None), "add")?;
        run_git(
            git_command(Some(work_dir.as_path()), &["commit", "-m", &req.commit_message], None),
            "commit",
        )?;
        run_git(
            git_command(Some(work_dir.as_path()), &["push"], self.token.as_deref()),
            "push",
        )?;

        info!(
            repo_url = %req.repo_url,
            branch = %req.branch,
            file = %req.file_name,
            "Documentation committed and pushed"
        );
        Ok(PublishReceipt {
            file_path,
            appended,
        })
    }
}

#[async_trait::async_trait]
impl RepoPublisher for GitCliPublisher {
    async fn publish(
        &self,
        req: &RepoPublishRequest,
        content: &str,
    ) -> std::result::Result<PublishReceipt, DocgenError> {
        let publisher = self.clone();
        let req = req.clone();
        let content = content.to_string();
        tokio::task::spawn_blocking(move || publisher.publish_blocking(&req, &content))
            .await
            .map_err(|e| DocgenError::Git {
                command: "publish".to_string(),
                message: e.to_string(),
            })?
    }
}

/// Write `content` to `path`, appending to an existing markdown file.
/// Returns whether the content was appended.
pub fn merge_into(path: &Path, file_name: &str, content: &str) -> Result<bool> {
    let is_markdown = file_name.to_ascii_lowercase().ends_with(".md");
    if path.exists() && is_markdown {
        let existing = fs::read_to_string(path)?;
        fs::write(path, format!("{existing}\n\n{content}"))?;
        Ok(true)
    } else {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, content)?;
        Ok(false)
    }
}

/// A non-interactive git invocation. With a token, any configured credential
/// helpers are cleared and replaced by [`CREDENTIAL_HELPER`]; the token only
/// lives in the child's environment.
fn git_command(dir: Option<&Path>, args: &[&str], token: Option<&str>) -> Command {
    let mut cmd = Command::new("git");
    cmd.env("GIT_TERMINAL_PROMPT", "0");
    if let Some(dir) = dir {
        cmd.arg("-C").arg(dir);
    }
    if let Some(token) = token {
        cmd.args(["-c", "credential.helper="])
            .arg("-c")
            .arg(format!("credential.helper={CREDENTIAL_HELPER}"))
            .env(TOKEN_ENV, token);
    }
    cmd.args(args);
    cmd
}

fn run_git(mut cmd: Command, command: &str) -> Result<()> {
    let output = cmd.output().map_err(|e| {
        error!(error = ?e, command, "Failed to launch git process");
        DocgenError::Git {
            command: command.to_string(),
            message: e.to_string(),
        }
    })?;

    if output.status.success() {
        debug!(command, status = ?output.status, "git succeeded");
        Ok(())
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        error!(command, status = ?output.status, stderr = %stderr, "git exited with non-zero code");
        Err(DocgenError::Git {
            command: command.to_string(),
            message: stderr,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn appends_to_existing_markdown() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("DOCS.MD");
        fs::write(&path, "old").unwrap();
        assert!(merge_into(&path, "DOCS.MD", "new").unwrap());
        assert_eq!(fs::read_to_string(&path).unwrap(), "old\n\nnew");
    }

    #[test]
    fn overwrites_other_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("docs.txt");
        fs::write(&path, "old").unwrap();
        assert!(!merge_into(&path, "docs.txt", "new").unwrap());
        assert_eq!(fs::read_to_string(&path).unwrap(), "new");
    }

    #[test]
    fn creates_missing_markdown_and_parents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("docs/README.md");
        assert!(!merge_into(&path, "docs/README.md", "fresh").unwrap());
        assert_eq!(fs::read_to_string(&path).unwrap(), "fresh");
    }

    #[test]
    fn token_travels_in_environment_not_arguments() {
        let cmd = git_command(
            Some(Path::new("/work")),
            &["clone", "--branch", "main", "https://github.com/o/r.git", "/work"],
            Some("t0k"),
        );
        let args: Vec<String> = cmd
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert!(args.iter().all(|a| !a.contains("t0k")), "{args:?}");
        assert!(args.contains(&"https://github.com/o/r.git".to_string()));
        assert!(args.iter().any(|a| a.starts_with("credential.helper=!")));

        let token = cmd
            .get_envs()
            .find(|(key, _)| *key == std::ffi::OsStr::new(TOKEN_ENV))
            .and_then(|(_, value)| value);
        assert_eq!(token, Some(std::ffi::OsStr::new("t0k")));
    }

    #[test]
    fn local_commands_carry_no_credentials() {
        let cmd = git_command(Some(Path::new("/work")), &["add", "DOCS.md"], None);
        assert!(cmd.get_envs().all(|(key, _)| key != std::ffi::OsStr::new(TOKEN_ENV)));
        assert!(cmd
            .get_args()
            .all(|a| !a.to_string_lossy().starts_with("credential.helper")));
    }

    #[test]
    fn empty_token_is_treated_as_absent() {
        assert!(GitCliPublisher::new(Some(String::new())).token.is_none());
    }
}
