//! Preset instructions that replace the default per-file prompt.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UseCase {
    FullProject,
    ReadmeSummary,
    ApiReference,
    InlineComments,
    UsageExamples,
    Todos,
    Changelog,
    ExplainLogic,
    TestingScenarios,
    Refactoring,
    ConfigurationSetup,
    ArchitectureOverview,
}

impl UseCase {
    pub const ALL: [UseCase; 12] = [
        UseCase::FullProject,
        UseCase::ReadmeSummary,
        UseCase::ApiReference,
        UseCase::InlineComments,
        UseCase::UsageExamples,
        UseCase::Todos,
        UseCase::Changelog,
        UseCase::ExplainLogic,
        UseCase::TestingScenarios,
        UseCase::Refactoring,
        UseCase::ConfigurationSetup,
        UseCase::ArchitectureOverview,
    ];

    pub fn all() -> &'static [UseCase] {
        &Self::ALL
    }

    /// The instruction text sent in place of the default prompt.
    pub fn instruction(self) -> &'static str {
        match self {
            UseCase::FullProject => "Generate Full Project Documentation",
            UseCase::ReadmeSummary => "Summarize README and Key Files",
            UseCase::ApiReference => "Create API Reference Documentation",
            UseCase::InlineComments => "Generate Inline Code Comments/Annotations",
            UseCase::UsageExamples => "Produce Usage Examples for Functions/Classes",
            UseCase::Todos => "Identify TODOs and Future Improvements",
            UseCase::Changelog => "Changelog Generation from Commit History",
            UseCase::ExplainLogic => "Explain Complex Code Logic in Simple Terms",
            UseCase::TestingScenarios => "Generate Testing Instructions and Scenarios",
            UseCase::Refactoring => "Suggest Code Refactoring and Improvements",
            UseCase::ConfigurationSetup => "Document Configuration and Setup Steps",
            UseCase::ArchitectureOverview => {
                "Generate Architecture Overview Diagrams (Text Descriptions)"
            }
        }
    }

    pub fn slug(self) -> &'static str {
        match self {
            UseCase::FullProject => "full-project",
            UseCase::ReadmeSummary => "readme-summary",
            UseCase::ApiReference => "api-reference",
            UseCase::InlineComments => "inline-comments",
            UseCase::UsageExamples => "usage-examples",
            UseCase::Todos => "todos",
            UseCase::Changelog => "changelog",
            UseCase::ExplainLogic => "explain-logic",
            UseCase::TestingScenarios => "testing-scenarios",
            UseCase::Refactoring => "refactoring",
            UseCase::ConfigurationSetup => "configuration-setup",
            UseCase::ArchitectureOverview => "architecture-overview",
        }
    }
}

impl fmt::Display for UseCase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

impl FromStr for UseCase {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        UseCase::ALL
            .into_iter()
            .find(|u| u.slug() == wanted)
            .ok_or_else(|| format!("unknown use case '{s}'"))
    }
}
