//! Page fetching.

use super::markdown::html_to_markdown;
use crate::config::SearchSettings;
use crate::output::file_stem;
use anyhow::{bail, Context, Result};
use reqwest::header::CONTENT_TYPE;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Downloads pages and turns them into text an agent can read.
pub struct Fetcher {
    client: reqwest::Client,
    timeout: Duration,
    download_dir: PathBuf,
}

impl Fetcher {
    /// PDFs found while fetching are saved under `download_dir`.
    pub fn new(settings: &SearchSettings, download_dir: impl Into<PathBuf>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(settings.user_agent.clone())
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            timeout: Duration::from_secs(settings.fetch_timeout_seconds),
            download_dir: download_dir.into(),
        })
    }

    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    /// Fetch `url` as markdown. Every failure is logged and yields `None`.
    pub async fn fetch_markdown(&self, url: &str, timeout: Option<Duration>) -> Option<String> {
        match self.try_fetch(url, timeout.unwrap_or(self.timeout)).await {
            Ok(Some(text)) if !text.trim().is_empty() => Some(text),
            Ok(_) => {
                debug!("No readable content at {}", url);
                None
            }
            Err(e) => {
                warn!("Failed to fetch {}: {:#}", url, e);
                None
            }
        }
    }

    async fn try_fetch(&self, url: &str, timeout: Duration) -> Result<Option<String>> {
        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .with_context(|| format!("Request to {} failed", url))?;

        let status = response.status();
        if !status.is_success() {
            bail!("HTTP {}", status);
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_ascii_lowercase();

        if content_type.contains("text/html") {
            let html = response.text().await.context("Failed to read body")?;
            Ok(Some(html_to_markdown(&html)))
        } else if content_type.contains("application/pdf") {
            let bytes = response.bytes().await.context("Failed to read body")?;
            self.save_pdf(url, &bytes).await?;
            let text = pdf_extract::extract_text_from_mem(&bytes)
                .with_context(|| format!("Failed to extract text from {}", url))?;
            Ok(Some(text))
        } else if content_type.starts_with("text/") {
            Ok(Some(response.text().await.context("Failed to read body")?))
        } else {
            debug!("Unsupported content type '{}' at {}", content_type, url);
            Ok(None)
        }
    }

    async fn save_pdf(&self, url: &str, bytes: &[u8]) -> Result<()> {
        let name = url
            .split(['?', '#'])
            .next()
            .map(file_stem)
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "download".to_string());

        tokio::fs::create_dir_all(&self.download_dir)
            .await
            .with_context(|| format!("Failed to create {}", self.download_dir.display()))?;
        let path = self.download_dir.join(format!("{}.pdf", name));
        tokio::fs::write(&path, bytes)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
        info!("Saved PDF to {}", path.display());
        Ok(())
    }
}
