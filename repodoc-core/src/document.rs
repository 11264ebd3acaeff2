//! The aggregated document: one section per eligible file, in discovery order.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::ErrorKind;

pub const SECTION_DELIMITER: &str = "---";

/// Outcome of one documentation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum GenerationResult {
    Success {
        path: String,
        text: String,
    },
    Failure {
        path: String,
        kind: ErrorKind,
        message: String,
    },
}

impl GenerationResult {
    pub fn path(&self) -> &str {
        match self {
            GenerationResult::Success { path, .. } | GenerationResult::Failure { path, .. } => path,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, GenerationResult::Failure { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SectionBody {
    Generated { text: String },
    Failed { kind: ErrorKind, message: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub path: String,
    pub body: SectionBody,
}

impl From<GenerationResult> for Section {
    fn from(result: GenerationResult) -> Self {
        match result {
            GenerationResult::Success { path, text } => Section {
                path,
                body: SectionBody::Generated { text },
            },
            GenerationResult::Failure {
                path,
                kind,
                message,
            } => Section {
                path,
                body: SectionBody::Failed { kind, message },
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregatedDocument {
    /// Usually the repository URL.
    pub title: String,
    pub sections: Vec<Section>,
    /// Files the run was expected to cover.
    pub expected_sections: usize,
    /// Set when the run stopped before every file was processed.
    pub partial: bool,
}

impl AggregatedDocument {
    pub fn empty(title: impl Into<String>) -> Self {
        AggregatedDocument {
            title: title.into(),
            sections: Vec::new(),
            expected_sections: 0,
            partial: false,
        }
    }

    pub fn failed_sections(&self) -> impl Iterator<Item = &Section> {
        self.sections
            .iter()
            .filter(|s| matches!(s.body, SectionBody::Failed { .. }))
    }

    /// Markdown rendering handed to the publisher.
    pub fn render(&self) -> String {
        let mut out = format!("# Documentation for Repository: {}\n\n", self.title);
        for section in &self.sections {
            out.push_str(&format!("## File: {}\n\n", section.path));
            match &section.body {
                SectionBody::Generated { text } => out.push_str(text),
                SectionBody::Failed { kind, message } => out.push_str(&format!(
                    "> **Documentation generation failed** ({kind}): {message}"
                )),
            }
            out.push_str(&format!("\n\n{SECTION_DELIMITER}\n\n"));
        }
        if self.partial {
            out.push_str(&format!(
                "> **Partial document**: run stopped after {} of {} files.\n",
                self.sections.len(),
                self.expected_sections
            ));
        }
        out
    }
}

/// Build the document from results keyed by path, following `order`.
///
/// `order` is the traversal order; completion order of `results` is irrelevant.
/// Paths in `order` without a result are left out, which only happens for a
/// run that stopped early.
pub fn assemble(
    title: &str,
    order: &[String],
    mut results: HashMap<String, GenerationResult>,
    partial: bool,
) -> AggregatedDocument {
    let sections = order
        .iter()
        .filter_map(|path| results.remove(path))
        .map(Section::from)
        .collect();
    AggregatedDocument {
        title: title.to_string(),
        sections,
        expected_sections: order.len(),
        partial,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok(path: &str, text: &str) -> GenerationResult {
        GenerationResult::Success {
            path: path.into(),
            text: text.into(),
        }
    }

    #[test]
    fn assembles_in_traversal_order_not_completion_order() {
        let order: Vec<String> = ["a.py", "b/c.java", "d.cs"].map(String::from).to_vec();
        let mut results = HashMap::new();
        results.insert("d.cs".to_string(), ok("d.cs", "D"));
        results.insert(
            "b/c.java".to_string(),
            GenerationResult::Failure {
                path: "b/c.java".into(),
                kind: ErrorKind::RateLimited,
                message: "429".into(),
            },
        );
        results.insert("a.py".to_string(), ok("a.py", "A"));

        let doc = assemble("repo", &order, results, false);
        let paths: Vec<_> = doc.sections.iter().map(|s| s.path.as_str()).collect();
        assert_eq!(paths, ["a.py", "b/c.java", "d.cs"]);
        assert_eq!(doc.failed_sections().count(), 1);
    }

    #[test]
    fn renders_headers_notices_and_delimiters() {
        let order = vec!["a.py".to_string(), "b.py".to_string()];
        let mut results = HashMap::new();
        results.insert("a.py".to_string(), ok("a.py", "Docs for a"));
        results.insert(
            "b.py".to_string(),
            GenerationResult::Failure {
                path: "b.py".into(),
                kind: ErrorKind::Transport,
                message: "connection reset".into(),
            },
        );
        let rendered = assemble("https://github.com/o/r", &order, results, false).render();

        assert!(rendered.starts_with("# Documentation for Repository: https://github.com/o/r\n\n"));
        assert!(rendered.contains("## File: a.py\n\nDocs for a\n\n---\n\n"));
        assert!(rendered.contains(
            "## File: b.py\n\n> **Documentation generation failed** (transport error): connection reset"
        ));
        assert_eq!(rendered.matches("\n---\n").count(), 2);
        assert!(!rendered.contains("Partial document"));
    }

    #[test]
    fn partial_documents_are_marked() {
        let order = vec!["a.py".to_string(), "b.py".to_string()];
        let mut results = HashMap::new();
        results.insert("a.py".to_string(), ok("a.py", "A"));
        let doc = assemble("r", &order, results, true);
        assert_eq!(doc.sections.len(), 1);
        assert!(doc.render().contains("run stopped after 1 of 2 files"));
    }
}
