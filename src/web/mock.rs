//! In-memory web for tests.

use super::WebSource;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

/// Canned search results and pages. Unknown queries return no links and
/// unknown pages fail to load; every call is recorded.
#[derive(Default)]
pub struct MockWeb {
    results: HashMap<String, Vec<String>>,
    default_results: Vec<String>,
    pages: HashMap<String, String>,
    queries: Mutex<Vec<String>>,
    fetched: Mutex<Vec<String>>,
}

impl MockWeb {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_results(mut self, query: &str, links: &[&str]) -> Self {
        self.results.insert(
            query.to_string(),
            links.iter().map(|l| l.to_string()).collect(),
        );
        self
    }

    /// Links returned for any query without explicit results.
    pub fn with_default_results(mut self, links: &[&str]) -> Self {
        self.default_results = links.iter().map(|l| l.to_string()).collect();
        self
    }

    pub fn with_page(mut self, url: &str, content: &str) -> Self {
        self.pages.insert(url.to_string(), content.to_string());
        self
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }

    pub fn fetched(&self) -> Vec<String> {
        self.fetched.lock().unwrap().clone()
    }
}

#[async_trait]
impl WebSource for MockWeb {
    async fn search(&self, query: &str, max_results: usize) -> Vec<String> {
        self.queries.lock().unwrap().push(query.to_string());
        self.results
            .get(query)
            .unwrap_or(&self.default_results)
            .iter()
            .take(max_results)
            .cloned()
            .collect()
    }

    async fn fetch(&self, url: &str, _timeout: Option<Duration>) -> Option<String> {
        self.fetched.lock().unwrap().push(url.to_string());
        self.pages.get(url).cloned()
    }
}
