//! Data models shared by the workers.
//!
//! Output formats, worker modes, and the structured shapes agents are
//! asked to answer with.

use anyhow::{bail, Result};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Format of a written artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Markdown file, `{topic}.md`
    #[default]
    Md,
    /// PDF rendered from the markdown, `{topic}.pdf`
    Pdf,
    /// Written verbatim under the topic as file name
    #[value(skip)]
    Txt,
}

impl OutputFormat {
    /// Extension appended to the topic, if any.
    pub fn extension(&self) -> Option<&'static str> {
        match self {
            OutputFormat::Md => Some("md"),
            OutputFormat::Pdf => Some("pdf"),
            OutputFormat::Txt => None,
        }
    }

    /// Reports and articles can only be markdown or PDF.
    pub fn ensure_document(&self) -> Result<()> {
        match self {
            OutputFormat::Md | OutputFormat::Pdf => Ok(()),
            OutputFormat::Txt => bail!("format must be 'md' or 'pdf'"),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Md => write!(f, "md"),
            OutputFormat::Pdf => write!(f, "pdf"),
            OutputFormat::Txt => write!(f, "txt"),
        }
    }
}

/// Which pair of reader/writer prompts the thinker uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThinkMode {
    /// Challenge the article's claims
    #[default]
    Critical,
    /// Ask and answer the questions a newcomer would have
    Faq,
}

impl fmt::Display for ThinkMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ThinkMode::Critical => write!(f, "critical"),
            ThinkMode::Faq => write!(f, "faq"),
        }
    }
}

/// What the summariser produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum SummaryType {
    /// Mermaid mindmap rendered to PNG
    Mindmap,
    /// Markdown summary
    #[default]
    Text,
    /// Markdown summary with the mindmap embedded
    Both,
}

/// A short list answer: questions, search queries, subtopics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubItems {
    #[serde(default)]
    pub items: Vec<String>,
}

impl SubItems {
    /// Non-blank items, trimmed, at most `limit`.
    pub fn take(self, limit: usize) -> Vec<String> {
        self.items
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .take(limit)
            .collect()
    }
}

/// A job posting extracted from a listing page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobListing {
    #[serde(deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(deserialize_with = "null_as_default")]
    pub company: String,
    #[serde(deserialize_with = "null_as_default")]
    pub location: String,
    #[serde(deserialize_with = "null_as_default")]
    pub remote: bool,
    #[serde(deserialize_with = "null_as_default")]
    pub job_type: String,
    #[serde(deserialize_with = "null_as_default")]
    pub salary: String,
    #[serde(deserialize_with = "null_as_default")]
    pub url: String,
}

/// Models answer `null` for fields they could not find.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Links found for a query and the fetched text of those that loaded.
#[derive(Debug, Clone, Default)]
pub struct SearchResults {
    pub links: Vec<String>,
    pub articles: Vec<String>,
}

impl SearchResults {
    pub fn is_empty(&self) -> bool {
        self.articles.is_empty()
    }
}

/// One thinker round: a question and the writer's answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QaPair {
    pub question: String,
    pub answer: String,
}
