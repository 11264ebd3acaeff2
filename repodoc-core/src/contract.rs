//! # contract: trait seams between the pipeline and its remote collaborators
//!
//! The generation pipeline never talks to a network service directly. It goes
//! through three traits defined here:
//!
//! - [`RepositoryBrowser`]: lists directories and reads raw file bytes of a
//!   remote repository.
//! - [`DocClient`]: performs exactly one documentation request against a
//!   language-model backend.
//! - [`RepoPublisher`]: merges the final document into a file of a remote
//!   repository and pushes the change.
//!
//! ## Mocking & Testing
//! - Every trait is annotated for `mockall` (behind `test-export-mocks`) so
//!   integration tests and downstream crates can build deterministic mocks.
//!
//! ## Adding New Backends
//! - Implement the trait for your service.
//! - Convert upstream failures into [`DocgenError`] variants; the pipeline's
//!   failure policy depends on that classification.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[cfg(any(test, feature = "test-export-mocks"))]
use mockall::automock;

use crate::client::ModelConfig;
use crate::error::DocgenError;
use crate::locator::RepositoryLocator;

/// Whether a listed entry is a file or a directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Dir,
}

/// One entry of a remote directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    /// Final path component.
    pub name: String,
    /// Repo-relative, forward-slash separated path.
    pub path: String,
    pub kind: EntryKind,
}

impl DirEntry {
    pub fn file(path: &str) -> Self {
        Self::new(path, EntryKind::File)
    }

    pub fn dir(path: &str) -> Self {
        Self::new(path, EntryKind::Dir)
    }

    fn new(path: &str, kind: EntryKind) -> Self {
        let name = path.rsplit('/').next().unwrap_or(path).to_string();
        DirEntry {
            name,
            path: path.to_string(),
            kind,
        }
    }
}

/// An eligible file and its decoded text, as discovered during traversal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    pub path: String,
    pub content: String,
}

/// Everything needed for one documentation request.
#[derive(Debug, Clone, PartialEq)]
pub struct DocRequest {
    pub path: String,
    pub content: String,
    /// When present and non-blank, replaces the default instruction entirely.
    pub instruction: Option<String>,
    pub model: ModelConfig,
}

impl DocRequest {
    pub fn for_file(file: &FileRecord, instruction: Option<&str>, model: &ModelConfig) -> Self {
        DocRequest {
            path: file.path.clone(),
            content: file.content.clone(),
            instruction: instruction.map(str::to_string),
            model: model.clone(),
        }
    }
}

/// Destination of a remote-repository publish.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoPublishRequest {
    pub repo_url: String,
    pub branch: String,
    /// Target file, relative to the repository root.
    pub file_name: String,
    pub commit_message: String,
    /// Working copy to clone into or pull; a temporary directory when absent.
    pub work_dir: Option<PathBuf>,
}

/// What a publish did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishReceipt {
    pub file_path: PathBuf,
    /// True when the content was appended to an existing markdown file.
    pub appended: bool,
}

/// Read-only access to a remote repository's tree.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait RepositoryBrowser: Send + Sync {
    /// List the entries of `path` (`""` is the repository root) in listing order.
    async fn list_dir(
        &self,
        locator: &RepositoryLocator,
        path: &str,
    ) -> Result<Vec<DirEntry>, DocgenError>;

    /// Fetch the raw bytes of the file at `path`.
    async fn read_file(
        &self,
        locator: &RepositoryLocator,
        path: &str,
    ) -> Result<Vec<u8>, DocgenError>;
}

/// A single-attempt documentation request against a language model.
///
/// Implementors never retry; retry policy belongs to the caller.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait DocClient: Send + Sync {
    async fn request(&self, req: &DocRequest) -> Result<String, DocgenError>;
}

/// Commits a document into a file of a remote repository.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait RepoPublisher: Send + Sync {
    async fn publish(
        &self,
        req: &RepoPublishRequest,
        content: &str,
    ) -> Result<PublishReceipt, DocgenError>;
}
