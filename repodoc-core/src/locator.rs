//! Repository locators: `https://host/owner/repo` or `git@host:owner/repo`.

use crate::error::{DocgenError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A parsed reference to a remote repository.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepositoryLocator {
    pub host: String,
    pub owner: String,
    pub repo: String,
}

impl RepositoryLocator {
    /// Parses a repository URL. Extra path segments after the repository
    /// name (`/tree/main/src`) are ignored, as is a trailing `.git`.
    pub fn parse(input: &str) -> Result<Self> {
        let trimmed = input.trim();
        let invalid = |reason: &str| DocgenError::InvalidLocator {
            input: input.to_string(),
            reason: reason.to_string(),
        };

        if trimmed.is_empty() {
            return Err(invalid("empty locator"));
        }

        let (host, rest) = if let Some(rest) = trimmed
            .strip_prefix("https://")
            .or_else(|| trimmed.strip_prefix("http://"))
        {
            rest.split_once('/')
                .ok_or_else(|| invalid("missing owner and repository"))?
        } else if let Some(rest) = trimmed.strip_prefix("git@") {
            rest.split_once(':')
                .ok_or_else(|| invalid("expected git@host:owner/repo"))?
        } else {
            return Err(invalid("expected an http(s) or git@ URL"));
        };

        if host.is_empty() {
            return Err(invalid("missing host"));
        }

        let mut segments = rest.split('/').filter(|s| !s.is_empty());
        let owner = segments.next().ok_or_else(|| invalid("missing owner"))?;
        let repo = segments
            .next()
            .ok_or_else(|| invalid("missing repository name"))?;
        let repo = repo.strip_suffix(".git").unwrap_or(repo);

        if repo.is_empty() {
            return Err(invalid("missing repository name"));
        }
        if [host, owner, repo]
            .iter()
            .any(|part| part.chars().any(char::is_whitespace))
        {
            return Err(invalid("whitespace in locator"));
        }

        Ok(RepositoryLocator {
            host: host.to_string(),
            owner: owner.to_string(),
            repo: repo.to_string(),
        })
    }
}

impl fmt::Display for RepositoryLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "https://{}/{}/{}", self.host, self.owner, self.repo)
    }
}

impl std::str::FromStr for RepositoryLocator {
    type Err = DocgenError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}
