//! The workers behind each subcommand.
//!
//! Every worker gets a [`Workbench`]: the settings, the two LLM clients
//! (a fast one for high-volume prompts and a deep one for synthesis), web
//! access, the output directory, and the mailer.

pub mod aggregate;
pub mod code;
pub mod kb;
pub mod report;
pub mod research;
pub mod summary;
pub mod think;
pub mod writer;

use crate::config::Settings;
use crate::llm::{build_client, LlmClient};
use crate::models::{OutputFormat, SearchResults};
use crate::output::{Mailer, OutputDir};
use crate::web::{Web, WebSource};
use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Longest article text handed to an agent, in characters.
pub const MAX_ARTICLE_CHARS: usize = 20_000;

pub struct Workbench {
    pub settings: Settings,
    pub fast: Arc<dyn LlmClient>,
    pub deep: Arc<dyn LlmClient>,
    pub web: Arc<dyn WebSource>,
    pub output: OutputDir,
    pub mailer: Mailer,
    pub http: reqwest::Client,
    pub throttle: Duration,
}

impl Workbench {
    /// Wire up live providers from the settings.
    pub fn from_settings(settings: Settings) -> Result<Self> {
        let output = OutputDir::new(&settings.general.output_dir)?
            .with_pdf_font(settings.general.pdf_font.clone());
        let fast = build_client(settings.providers.fast, &settings);
        let deep = build_client(settings.providers.deep, &settings);
        let web: Arc<dyn WebSource> = Arc::new(Web::new(&settings.search, output.path())?);
        let mailer = Mailer::from_env(&settings.mail);
        let http = reqwest::Client::builder()
            .user_agent(settings.search.user_agent.clone())
            .timeout(Duration::from_secs(settings.models.timeout_seconds))
            .build()
            .context("Failed to create HTTP client")?;

        info!(
            fast = %settings.providers.fast,
            deep = %settings.providers.deep,
            output = %output.path().display(),
            "Workbench ready"
        );

        Ok(Self {
            throttle: settings.throttle(),
            settings,
            fast,
            deep,
            web,
            output,
            mailer,
            http,
        })
    }

    pub fn fast(&self) -> &dyn LlmClient {
        self.fast.as_ref()
    }

    pub fn deep(&self) -> &dyn LlmClient {
        self.deep.as_ref()
    }

    /// Sleep between LLM calls to stay under provider rate limits.
    pub async fn pause(&self) {
        if !self.throttle.is_zero() {
            tokio::time::sleep(self.throttle).await;
        }
    }

    /// Write the artifact, then email it when receivers are given.
    ///
    /// A failed email is reported but does not fail the run.
    pub async fn deliver(
        &self,
        topic: &str,
        format: OutputFormat,
        content: &str,
        receivers: Option<&[String]>,
    ) -> Result<PathBuf> {
        let path = self.output.output_content(topic, format, content)?;
        println!("✅ Saved to {}", path.display());

        if let Some(receivers) = receivers.filter(|r| !r.is_empty()) {
            match self.mailer.send(topic, receivers, content).await {
                Ok(()) => println!("📧 Sent to {}", receivers.join(", ")),
                Err(e) => {
                    warn!("Failed to send email: {:#}", e);
                    eprintln!("⚠️  Email not sent: {:#}", e);
                }
            }
        }

        Ok(path)
    }

    /// Search `query` and fetch the links not yet in `visited`.
    pub async fn gather(&self, query: &str, visited: &mut HashSet<String>) -> SearchResults {
        self.gather_limited(query, self.settings.search.max_results, visited)
            .await
    }

    /// Like [`gather`](Self::gather) with an explicit result cap.
    pub async fn gather_limited(
        &self,
        query: &str,
        limit: usize,
        visited: &mut HashSet<String>,
    ) -> SearchResults {
        let results = crate::web::search_topic(self.web.as_ref(), query, limit, visited).await;
        visited.extend(results.links.iter().cloned());
        results
    }
}

/// Join fetched articles with their links for an agent prompt.
pub fn format_sources(results: &SearchResults) -> String {
    let mut text = String::new();
    for (link, article) in results.links.iter().zip(&results.articles) {
        text.push_str(&format!(
            "Source: {}\n{}\n\n",
            link,
            truncate_chars(article, MAX_ARTICLE_CHARS)
        ));
    }
    text.trim_end().to_string()
}

/// At most `max` characters of `text`, cut on a char boundary.
pub fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Spinner for a long-running call; hidden when stdout isn't a terminal.
pub fn spinner(message: impl Into<String>) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg} [{elapsed}]") {
        pb.set_style(style);
    }
    pb.set_message(message.into());
    pb.enable_steady_tick(Duration::from_millis(120));
    pb
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::config::MailSettings;
    use crate::llm::mock::MockLlm;
    use crate::web::mock::MockWeb;
    use tempfile::TempDir;

    /// A workbench over scripted clients, an in-memory web, and a temp dir.
    pub fn workbench(
        dir: &TempDir,
        fast: Arc<MockLlm>,
        deep: Arc<MockLlm>,
        web: Arc<MockWeb>,
    ) -> Workbench {
        let mut settings = Settings::default();
        settings.general.output_dir = dir.path().to_path_buf();
        settings.general.throttle_seconds = 0.0;

        Workbench {
            output: OutputDir::new(dir.path()).unwrap(),
            mailer: Mailer::new(&MailSettings::default(), None, None),
            http: reqwest::Client::new(),
            throttle: Duration::ZERO,
            settings,
            fast,
            deep,
            web,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 10), "abc");
    }

    #[test]
    fn test_format_sources() {
        let results = SearchResults {
            links: vec!["https://a.io".to_string(), "https://b.io".to_string()],
            articles: vec!["alpha".to_string(), "beta".to_string()],
        };
        assert_eq!(
            format_sources(&results),
            "Source: https://a.io\nalpha\n\nSource: https://b.io\nbeta"
        );
    }
}
