//! Web access for the workers: search, fetch, and HTML conversion.

pub mod fetch;
pub mod markdown;
pub mod search;

#[cfg(test)]
pub mod mock;

use crate::config::SearchSettings;
use crate::models::SearchResults;
use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

pub use fetch::Fetcher;
pub use markdown::html_to_markdown;
pub use search::Searcher;

/// What the workers need from the web. Failures are logged, never raised.
#[async_trait]
pub trait WebSource: Send + Sync {
    /// Result links for `query`, empty when the search fails.
    async fn search(&self, query: &str, max_results: usize) -> Vec<String>;

    /// Page content as markdown, `None` when it can't be fetched.
    async fn fetch(&self, url: &str, timeout: Option<Duration>) -> Option<String>;
}

/// Live implementation backed by HTTP.
pub struct Web {
    fetcher: Fetcher,
    searcher: Searcher,
}

impl Web {
    pub fn new(settings: &SearchSettings, download_dir: impl Into<PathBuf>) -> Result<Self> {
        let fetcher = Fetcher::new(settings, download_dir)?;
        let searcher = Searcher::new(settings, fetcher.client().clone());
        Ok(Self { fetcher, searcher })
    }
}

#[async_trait]
impl WebSource for Web {
    async fn search(&self, query: &str, max_results: usize) -> Vec<String> {
        match self.searcher.search(query, max_results).await {
            Ok(links) => links,
            Err(e) => {
                warn!("Search for '{}' failed: {:#}", query, e);
                Vec::new()
            }
        }
    }

    async fn fetch(&self, url: &str, timeout: Option<Duration>) -> Option<String> {
        self.fetcher.fetch_markdown(url, timeout).await
    }
}

/// Search `topic` and fetch every new link.
///
/// Links already in `visited` are skipped; only pages that load make it
/// into `articles`, and `links` lists exactly those pages.
pub async fn search_topic(
    web: &dyn WebSource,
    topic: &str,
    max_results: usize,
    visited: &HashSet<String>,
) -> SearchResults {
    let mut results = SearchResults::default();

    for link in web.search(topic, max_results).await {
        if visited.contains(&link) || results.links.contains(&link) {
            info!("Skipping already visited link: {}", link);
            continue;
        }

        if let Some(article) = web.fetch(&link, None).await {
            results.links.push(link);
            results.articles.push(article);
        }
    }

    results
}

#[cfg(test)]
mod tests {
    use super::mock::MockWeb;
    use super::*;

    #[tokio::test]
    async fn test_search_topic_skips_visited_and_failed() {
        let web = MockWeb::new()
            .with_results(
                "rust async",
                &[
                    "https://a.example",
                    "https://b.example",
                    "https://c.example",
                ],
            )
            .with_page("https://a.example", "page a")
            .with_page("https://b.example", "page b");

        let visited: HashSet<String> = ["https://a.example".to_string()].into_iter().collect();
        let results = search_topic(&web, "rust async", 5, &visited).await;

        assert_eq!(results.links, vec!["https://b.example"]);
        assert_eq!(results.articles, vec!["page b"]);
        assert_eq!(web.fetched(), vec!["https://b.example", "https://c.example"]);
    }

    #[tokio::test]
    async fn test_search_topic_empty_search() {
        let web = MockWeb::new();
        let results = search_topic(&web, "nothing", 3, &HashSet::new()).await;
        assert!(results.is_empty());
        assert!(results.links.is_empty());
    }
}
