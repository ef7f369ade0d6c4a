//! Job listing aggregation across several pages.

use super::{truncate_chars, Workbench, MAX_ARTICLE_CHARS};
use crate::agent::{parse_lenient, Agent};
use crate::config::AggregateConfig;
use crate::models::{JobListing, OutputFormat};
use crate::render::generate_jobs_html;
use anyhow::Result;
use futures::future::join_all;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

const EXTRACTOR_PROMPT: &str = "You are an expert job extractor. Your task is to extract job details from the provided content.
You will receive a chunk of text that contains job information. Your goal is to extract the following
fields: name, description, company, location, remote, job_type, salary, and url.

NOTE: NOT ALL FIELDS WILL BE PRESENT IN EVERY JOB POSTING.
If a field is not present, you should return an empty string (\"\" NOT N/A) for that field.";

const JOBS_SCHEMA: &str = r#"[{"name": "string", "description": "string", "company": "string", "location": "string", "remote": false, "job_type": "string (e.g. Full-time, Part-time)", "salary": "string", "url": "string"}]"#;

/// Extractors answer with a bare array or wrap it in an object.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Extracted {
    List(Vec<JobListing>),
    Wrapped { jobs: Vec<JobListing> },
}

impl Extracted {
    fn into_jobs(self) -> Vec<JobListing> {
        match self {
            Extracted::List(jobs) | Extracted::Wrapped { jobs } => jobs,
        }
    }
}

fn extractor_agent() -> Agent {
    Agent::new("Job Extractor")
        .description(EXTRACTOR_PROMPT)
        .temperature(0.0)
}

/// Parse an extractor answer; `None` when it holds no job list.
pub fn parse_jobs(text: &str) -> Option<Vec<JobListing>> {
    parse_lenient::<Extracted>(text).map(Extracted::into_jobs)
}

/// Load one page and extract its job listings.
pub async fn load_url(bench: &Workbench, url: &str, timeout: Duration) -> Option<Vec<JobListing>> {
    let page = bench.web.fetch(url, Some(timeout)).await?;
    let page = truncate_chars(&page, MAX_ARTICLE_CHARS * 2);

    let answer = match extractor_agent()
        .run_structured::<Extracted>(bench.deep(), page, JOBS_SCHEMA)
        .await
    {
        Ok(extracted) => extracted.into_jobs(),
        Err(e) => {
            warn!("Extraction from {} failed: {:#}", url, e);
            return None;
        }
    };

    info!("Extracted {} jobs from {}", answer.len(), url);
    Some(answer)
}

/// Load every source concurrently and merge what loaded.
pub async fn aggregate_content(bench: &Workbench, sources: &[String], timeout: Duration) -> Vec<JobListing> {
    let tasks = sources.iter().map(|source| load_url(bench, source, timeout));
    join_all(tasks).await.into_iter().flatten().flatten().collect()
}

async fn aggregate(bench: &Workbench, config: &AggregateConfig) -> Result<PathBuf> {
    config.validate()?;
    let timeout = Duration::from_secs(config.page_timeout_seconds);

    println!("📥 Loading {} sources...", config.sources.len());
    let jobs = aggregate_content(bench, &config.sources, timeout).await;

    let html = generate_jobs_html(&jobs);
    let path = bench
        .output
        .output_content(&config.output, OutputFormat::Txt, &html)?;
    println!("\nHTML content saved to: {}", path.display());
    Ok(path)
}

/// Aggregate the configured sources into one HTML page.
///
/// Errors are reported, not returned: a failed aggregation writes nothing.
pub async fn run(bench: &Workbench, config: &AggregateConfig) -> Option<PathBuf> {
    match aggregate(bench, config).await {
        Ok(path) => Some(path),
        Err(e) => {
            println!("Error aggregating sources: {:#}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::mock::MockLlm;
    use crate::web::mock::MockWeb;
    use crate::workers::testing::workbench;
    use std::sync::Arc;
    use tempfile::TempDir;

    #[test]
    fn test_parse_jobs_shapes() {
        let list = parse_jobs(r#"[{"name": "A"}, {"name": "B", "remote": true}]"#).unwrap();
        assert_eq!(list.len(), 2);
        assert!(list[1].remote);

        let wrapped = parse_jobs("```json\n{\"jobs\": [{\"name\": \"C\"}]}\n```").unwrap();
        assert_eq!(wrapped[0].name, "C");

        assert!(parse_jobs("no jobs here").is_none());
    }

    #[test]
    fn test_parse_jobs_keeps_jobs_with_null_fields() {
        let jobs =
            parse_jobs(r#"[{"name":"Rust Engineer","company":"Ferris","salary":null}]"#).unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].name, "Rust Engineer");
        assert!(jobs[0].salary.is_empty());
    }

    #[tokio::test]
    async fn test_aggregate_merges_sources_and_skips_failures() {
        let dir = TempDir::new().unwrap();
        let deep = Arc::new(MockLlm::new([
            r#"[{"name": "Rust Engineer", "company": "Ferris & Co", "remote": true}]"#,
        ]));
        let web = Arc::new(
            MockWeb::new()
                .with_page("https://jobs.example/a", "job board a")
                .with_page("https://jobs.example/b", "job board b"),
        );
        let bench = workbench(&dir, Arc::new(MockLlm::new(["unused"])), deep.clone(), web);
        let config = AggregateConfig {
            sources: vec![
                "https://jobs.example/a".to_string(),
                "https://jobs.example/b".to_string(),
                "https://jobs.example/down".to_string(),
            ],
            output: "jobs.html".to_string(),
            page_timeout_seconds: 5,
        };

        let path = run(&bench, &config).await.unwrap();

        assert_eq!(path, dir.path().join("jobs.html"));
        let html = std::fs::read_to_string(path).unwrap();
        assert!(html.contains("Job Listings (Total: 2)"));
        assert!(html.contains("Ferris &amp; Co"));
        assert_eq!(deep.call_count(), 2);
        assert_eq!(deep.requests()[0].temperature, Some(0.0));
    }

    #[tokio::test]
    async fn test_aggregate_rejects_bad_config() {
        let dir = TempDir::new().unwrap();
        let bench = workbench(
            &dir,
            Arc::new(MockLlm::new(["unused"])),
            Arc::new(MockLlm::new(["unused"])),
            Arc::new(MockWeb::new()),
        );
        let config = AggregateConfig {
            sources: vec!["ftp://nope".to_string()],
            output: "jobs.html".to_string(),
            page_timeout_seconds: 5,
        };

        assert!(run(&bench, &config).await.is_none());
        assert!(!dir.path().join("jobs.html").exists());
    }
}
