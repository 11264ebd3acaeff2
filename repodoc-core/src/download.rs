//! Repository traversal: discover eligible files of a remote repository and
//! fetch their text.
//!
//! Traversal is all-or-nothing. Any listing or read failure aborts the fetch,
//! because a partial file tree is not a meaningful input to the pipeline.
//! Files that match the inclusion policy but are not valid UTF-8 are skipped
//! and reported in [`FileSet::skipped`].

use futures::stream::{self, StreamExt, TryStreamExt};
use reqwest::header::{ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::{Client, StatusCode, Url};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::contract::{DirEntry, EntryKind, FileRecord, RepositoryBrowser};
use crate::error::{DocgenError, Result};
use crate::locator::RepositoryLocator;

/// File-extension allow-list. A file is eligible iff its name ends with one of the suffixes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InclusionPolicy {
    extensions: Vec<String>,
}

impl Default for InclusionPolicy {
    fn default() -> Self {
        Self::new([".java", ".cpp", ".cs", ".vb", ".py"])
    }
}

impl InclusionPolicy {
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        InclusionPolicy {
            extensions: extensions.into_iter().map(Into::into).collect(),
        }
    }

    pub fn matches(&self, file_name: &str) -> bool {
        self.extensions.iter().any(|ext| file_name.ends_with(ext.as_str()))
    }

    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }
}

/// An eligible file that was left out of the run, and why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedFile {
    pub path: String,
    pub reason: String,
}

/// Result of a traversal: eligible files in discovery order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileSet {
    pub files: Vec<FileRecord>,
    pub skipped: Vec<SkippedFile>,
}

impl FileSet {
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn paths(&self) -> Vec<&str> {
        self.files.iter().map(|f| f.path.as_str()).collect()
    }
}

/// Fetch every eligible file of the repository.
///
/// Directories are walked depth-first, parent before children, siblings in
/// listing order. File bodies are then downloaded with at most `concurrency`
/// reads in flight; the result keeps discovery order.
pub async fn fetch_all<B>(
    browser: &B,
    locator: &RepositoryLocator,
    policy: &InclusionPolicy,
    concurrency: usize,
) -> Result<FileSet>
where
    B: RepositoryBrowser + ?Sized,
{
    info!(repo = %locator, extensions = ?policy.extensions(), "Walking repository tree");

    let mut eligible: Vec<String> = Vec::new();
    let mut stack = vec![browser.list_dir(locator, "").await?.into_iter()];

    while let Some(entries) = stack.last_mut() {
        let Some(entry) = entries.next() else {
            stack.pop();
            continue;
        };
        match entry.kind {
            EntryKind::Dir => {
                debug!(path = %entry.path, "Descending into directory");
                let children = browser.list_dir(locator, &entry.path).await?;
                stack.push(children.into_iter());
            }
            EntryKind::File if policy.matches(&entry.name) => eligible.push(entry.path),
            EntryKind::File => debug!(path = %entry.path, "Excluded by inclusion policy"),
        }
    }

    info!(count = eligible.len(), "Eligible files discovered, fetching contents");

    let bodies: Vec<(String, Vec<u8>)> = stream::iter(eligible)
        .map(|path| async move {
            let bytes = browser.read_file(locator, &path).await.map_err(|e| {
                error!(path = %path, error = ?e, "Failed to read repository file");
                e
            })?;
            Ok::<_, DocgenError>((path, bytes))
        })
        .buffered(concurrency.max(1))
        .try_collect()
        .await?;

    let mut set = FileSet::default();
    for (path, bytes) in bodies {
        match String::from_utf8(bytes) {
            Ok(content) => set.files.push(FileRecord { path, content }),
            Err(e) => {
                let err = DocgenError::Decode {
                    path: path.clone(),
                    message: e.utf8_error().to_string(),
                };
                warn!(path = %path, error = %err, "Skipping file that is not valid UTF-8");
                set.skipped.push(SkippedFile {
                    path,
                    reason: err.to_string(),
                });
            }
        }
    }

    info!(
        files = set.files.len(),
        skipped = set.skipped.len(),
        "Repository fetch complete"
    );
    Ok(set)
}

/// Connection settings for [`GitHubBrowser`].
#[derive(Debug, Clone)]
pub struct GitHubConfig {
    /// API root; derived from the locator's host when absent.
    pub api_base: Option<String>,
    /// Bearer token. Anonymous access is used without one.
    pub token: Option<String>,
    pub timeout: Duration,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        GitHubConfig {
            api_base: None,
            token: None,
            timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ContentItem {
    name: String,
    path: String,
    #[serde(rename = "type")]
    kind: String,
}

/// [`RepositoryBrowser`] backed by the GitHub contents API.
pub struct GitHubBrowser {
    config: GitHubConfig,
    http: Client,
}

impl GitHubBrowser {
    pub fn new(config: GitHubConfig) -> Result<Self> {
        let http = Client::builder().timeout(config.timeout).build()?;
        info!(
            token_set = config.token.is_some(),
            api_base = ?config.api_base,
            "Initialised GitHub repository browser"
        );
        Ok(GitHubBrowser { config, http })
    }

    fn api_base(&self, locator: &RepositoryLocator) -> String {
        match &self.config.api_base {
            Some(base) => base.trim_end_matches('/').to_string(),
            None if locator.host == "github.com" => "https://api.github.com".to_string(),
            None => format!("https://{}/api/v3", locator.host),
        }
    }

    fn contents_url(&self, locator: &RepositoryLocator, path: &str) -> Result<Url> {
        let base = self.api_base(locator);
        let mut url = Url::parse(&base)
            .map_err(|e| DocgenError::Transport(format!("invalid API base '{base}': {e}")))?;
        url.path_segments_mut()
            .map_err(|_| DocgenError::Transport(format!("API base '{base}' cannot hold a path")))?
            .pop_if_empty()
            .extend(["repos", locator.owner.as_str(), locator.repo.as_str(), "contents"])
            .extend(path.split('/').filter(|s| !s.is_empty()));
        Ok(url)
    }

    async fn get(&self, url: Url, accept: &str, path: &str) -> Result<reqwest::Response> {
        let mut request = self
            .http
            .get(url.clone())
            .header(USER_AGENT, concat!("repodoc/", env!("CARGO_PKG_VERSION")))
            .header(ACCEPT, accept);
        if let Some(token) = &self.config.token {
            request = request.header(AUTHORIZATION, format!("Bearer {token}"));
        }

        let response = request.send().await.map_err(|e| {
            error!(url = %url, error = ?e, "Repository API request failed");
            DocgenError::from(e)
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let exhausted = response
            .headers()
            .get("x-ratelimit-remaining")
            .is_some_and(|v| v.as_bytes() == b"0");
        let body = response.text().await.unwrap_or_default();
        let err = classify_browse_status(status, exhausted, path, body);
        error!(url = %url, status = %status, error = %err, "Repository API returned error");
        Err(err)
    }
}

/// Map a non-success repository API status to an error.
pub fn classify_browse_status(
    status: StatusCode,
    rate_limit_exhausted: bool,
    path: &str,
    body: String,
) -> DocgenError {
    match status {
        StatusCode::NOT_FOUND => DocgenError::NotFound(if path.is_empty() {
            "repository root".to_string()
        } else {
            path.to_string()
        }),
        StatusCode::TOO_MANY_REQUESTS => DocgenError::RateLimited {
            status: status.as_u16(),
            message: body,
        },
        StatusCode::FORBIDDEN if rate_limit_exhausted => DocgenError::RateLimited {
            status: status.as_u16(),
            message: body,
        },
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => DocgenError::Auth {
            status: status.as_u16(),
            message: body,
        },
        other => DocgenError::Transport(format!("unexpected status {other} for '{path}': {body}")),
    }
}

#[async_trait::async_trait]
impl RepositoryBrowser for GitHubBrowser {
    async fn list_dir(
        &self,
        locator: &RepositoryLocator,
        path: &str,
    ) -> std::result::Result<Vec<DirEntry>, DocgenError> {
        let url = self.contents_url(locator, path)?;
        let response = self.get(url, "application/vnd.github+json", path).await?;
        let value: serde_json::Value = response.json().await?;
        let items: Vec<ContentItem> = match value {
            serde_json::Value::Array(_) => serde_json::from_value(value)?,
            _ => {
                return Err(DocgenError::BadResponse(format!(
                    "'{path}' is not a directory"
                )))
            }
        };

        Ok(items
            .into_iter()
            .filter_map(|item| {
                let kind = match item.kind.as_str() {
                    "file" => EntryKind::File,
                    "dir" => EntryKind::Dir,
                    other => {
                        debug!(path = %item.path, kind = other, "Ignoring non-file entry");
                        return None;
                    }
                };
                Some(DirEntry {
                    name: item.name,
                    path: item.path,
                    kind,
                })
            })
            .collect())
    }

    async fn read_file(
        &self,
        locator: &RepositoryLocator,
        path: &str,
    ) -> std::result::Result<Vec<u8>, DocgenError> {
        let url = self.contents_url(locator, path)?;
        let response = self.get(url, "application/vnd.github.raw", path).await?;
        let bytes = response.bytes().await?;
        debug!(path = %path, size = bytes.len(), "Fetched file contents");
        Ok(bytes.to_vec())
    }
}
