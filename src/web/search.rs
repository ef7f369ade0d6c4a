//! Web search over the DuckDuckGo HTML endpoint.

use crate::config::SearchSettings;
use anyhow::{bail, Context, Result};
use reqwest::Url;
use scraper::{Html, Selector};
use std::collections::HashSet;
use std::time::Duration;
use tracing::debug;

pub struct Searcher {
    client: reqwest::Client,
    endpoint: String,
    timeout: Duration,
}

impl Searcher {
    pub fn new(settings: &SearchSettings, client: reqwest::Client) -> Self {
        Self {
            client,
            endpoint: settings.search_url.clone(),
            timeout: Duration::from_secs(settings.fetch_timeout_seconds.max(10)),
        }
    }

    /// Up to `max_results` distinct result links for `query`.
    pub async fn search(&self, query: &str, max_results: usize) -> Result<Vec<String>> {
        debug!("Searching for '{}'", query);

        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("q", query)])
            .timeout(self.timeout)
            .send()
            .await
            .context("Search request failed")?;

        let status = response.status();
        if !status.is_success() {
            bail!("Search returned HTTP {}", status);
        }

        let html = response
            .text()
            .await
            .context("Failed to read search results")?;
        Ok(parse_results(&html, max_results))
    }
}

/// Extract result links from a results page.
pub fn parse_results(html: &str, max_results: usize) -> Vec<String> {
    let document = Html::parse_document(html);
    let Ok(selector) = Selector::parse("a.result__a") else {
        return Vec::new();
    };

    let mut seen = HashSet::new();
    document
        .select(&selector)
        .filter_map(|a| a.value().attr("href"))
        .filter_map(unwrap_redirect)
        .filter(|link| !is_ad(link))
        .filter(|link| seen.insert(link.clone()))
        .take(max_results)
        .collect()
}

/// Result links go through `/l/?uddg=<target>`; return the target.
fn unwrap_redirect(href: &str) -> Option<String> {
    let base = Url::parse("https://duckduckgo.com").ok()?;
    let url = base.join(href).ok()?;

    let target = url
        .query_pairs()
        .find(|(key, _)| key == "uddg")
        .map(|(_, value)| value.into_owned())
        .unwrap_or_else(|| url.to_string());

    (target.starts_with("http://") || target.starts_with("https://")).then_some(target)
}

fn is_ad(link: &str) -> bool {
    link.contains("duckduckgo.com/y.js") || link.contains("ad_provider=")
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<html><body>
        <div class="result">
          <a class="result__a" href="//duckduckgo.com/l/?uddg=https%3A%2F%2Fexample.com%2Fone&amp;rut=abc">One</a>
        </div>
        <div class="result">
          <a class="result__a" href="https://duckduckgo.com/y.js?ad_provider=bing&amp;u3=x">Ad</a>
        </div>
        <div class="result">
          <a class="result__a" href="//duckduckgo.com/l/?uddg=https%3A%2F%2Fexample.com%2Fone&amp;rut=def">One again</a>
        </div>
        <div class="result">
          <a class="result__a" href="https://direct.example.org/two">Two</a>
        </div>
        <div class="result">
          <a class="result__a" href="//duckduckgo.com/l/?uddg=https%3A%2F%2Fexample.net%2Fthree%3Fx%3D1">Three</a>
        </div>
    </body></html>"#;

    #[test]
    fn test_parse_results_unwraps_and_dedupes() {
        let links = parse_results(PAGE, 10);
        assert_eq!(
            links,
            vec![
                "https://example.com/one",
                "https://direct.example.org/two",
                "https://example.net/three?x=1",
            ]
        );
    }

    #[test]
    fn test_parse_results_limit() {
        assert_eq!(parse_results(PAGE, 1), vec!["https://example.com/one"]);
        assert!(parse_results("<html></html>", 5).is_empty());
    }

    #[test]
    fn test_unwrap_redirect_rejects_non_http() {
        assert!(unwrap_redirect("//duckduckgo.com/l/?uddg=javascript%3Avoid(0)").is_none());
    }
}
