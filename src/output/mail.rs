//! Email delivery through the Resend HTTP API.

use crate::config::MailSettings;
use anyhow::{bail, Context, Result};
use pulldown_cmark::{html, Parser};
use serde::Serialize;
use tracing::info;

#[derive(Debug, Serialize)]
struct SendRequest<'a> {
    from: &'a str,
    to: &'a [String],
    subject: &'a str,
    html: String,
}

pub struct Mailer {
    client: reqwest::Client,
    url: String,
    api_key: Option<String>,
    from: Option<String>,
}

impl Mailer {
    /// Build a mailer; the key and sender come from `RESEND_API_KEY` and `EMAIL_FROM`.
    pub fn from_env(settings: &MailSettings) -> Self {
        Self::new(
            settings,
            std::env::var("RESEND_API_KEY").ok(),
            std::env::var("EMAIL_FROM").ok(),
        )
    }

    pub fn new(settings: &MailSettings, api_key: Option<String>, from: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: settings.resend_url.clone(),
            api_key: api_key.filter(|k| !k.is_empty()),
            from: from.filter(|f| !f.is_empty()),
        }
    }

    /// Send `markdown` rendered as HTML to every receiver.
    pub async fn send(&self, topic: &str, receivers: &[String], markdown: &str) -> Result<()> {
        if receivers.is_empty() {
            return Ok(());
        }

        let Some(ref api_key) = self.api_key else {
            bail!("RESEND_API_KEY is not set");
        };
        let Some(ref from) = self.from else {
            bail!("EMAIL_FROM is not set");
        };

        let request = SendRequest {
            from,
            to: receivers,
            subject: topic,
            html: markdown_to_html(markdown),
        };

        let response = self
            .client
            .post(&self.url)
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await
            .context("Failed to reach the mail API")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("Mail API error {}: {}", status, body);
        }

        info!("Sent '{}' to {} receiver(s)", topic, receivers.len());
        Ok(())
    }
}

pub fn markdown_to_html(markdown: &str) -> String {
    let mut out = String::new();
    html::push_html(&mut out, Parser::new(markdown));
    out
}
