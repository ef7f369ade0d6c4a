//! Quick topic report: decompose, research each subtopic once, analyse.

use super::{format_sources, Workbench};
use crate::agent::Agent;
use crate::models::OutputFormat;
use anyhow::{bail, Result};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

const MAX_SUBTOPICS: usize = 5;
const SUBTOPIC_PAUSE: Duration = Duration::from_millis(500);
const SUBTOPICS_SCHEMA: &str = r#"{"names": ["string", ...]}"#;

#[derive(Debug, Deserialize)]
struct SubTopics {
    #[serde(default)]
    names: Vec<String>,
}

fn decompose_agent() -> Agent {
    Agent::new("Decompose Agent")
        .description("You're a skilled decomposer with a talent for breaking down complex topics into digestible parts.")
        .instructions([
            "Thinking of a topic, break it down into its key components.".to_string(),
            "Return a list of the key components of the topic.".to_string(),
            "The list should be ordered by importance.".to_string(),
            format!("Return a maximum of {} subtopics.", MAX_SUBTOPICS),
        ])
}

fn research_agent() -> Agent {
    Agent::new("Research Agent")
        .description("You're a seasoned researcher with a knack for uncovering the latest developments in a given topic.")
        .instructions([
            "Known for your ability to find the most relevant information and present it in a clear and concise manner.",
            "Use the search results you are given.",
            "Always include links in the output.",
        ])
        .markdown(true)
}

fn analysis_agent() -> Agent {
    Agent::new("Analysis Agent")
        .description("You're a meticulous analyst with a keen eye for detail.")
        .instructions([
            "You're known for your ability to turn complex data into clear and concise reports, making it easy for others to understand and act on the information you provide.",
            "Generate a report based on the research results.",
            "Always include sources as a reference in the report.",
            "The report should be informative with a clear structure and easy to understand.",
            "The report should include a summary of the most important findings and insights.",
            "Output the report without any additional explanation or commentary.",
        ])
        .markdown(true)
}

/// Subtopics of `topic`, most important first.
async fn decompose(bench: &Workbench, topic: &str) -> Result<Vec<String>> {
    let subtopics: SubTopics = decompose_agent()
        .run_structured(bench.deep(), topic, SUBTOPICS_SCHEMA)
        .await?;

    Ok(subtopics
        .names
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .take(MAX_SUBTOPICS)
        .collect())
}

pub async fn run(bench: &Workbench, topic: &str, format: OutputFormat) -> Result<PathBuf> {
    format.ensure_document()?;

    let subtopics = decompose(bench, topic).await?;
    if subtopics.is_empty() {
        bail!("Could not break '{}' down into subtopics", topic);
    }
    println!("🧩 Subtopics: {}", subtopics.join(", "));

    let agent = research_agent();
    let mut visited = HashSet::new();
    let mut research = Vec::new();

    for subtopic in &subtopics {
        let query = format!("latest developments in {}", subtopic);
        println!("🔎 {}", query);

        let found = bench.gather(&query, &mut visited).await;
        let prompt = if found.is_empty() {
            format!("What are the {}?", query)
        } else {
            format!("What are the {}?\n\nSearch results:\n\n{}", query, format_sources(&found))
        };

        match agent.run(bench.deep(), &prompt).await {
            Ok(text) => research.push(text),
            Err(e) => warn!("Research on '{}' failed: {:#}", subtopic, e),
        }
        if !bench.throttle.is_zero() {
            tokio::time::sleep(SUBTOPIC_PAUSE).await;
        }
    }

    if research.is_empty() {
        bail!("No research results for '{}'", topic);
    }

    let report = analysis_agent()
        .run(bench.deep(), &research.join("\n"))
        .await?;
    bench.deliver(topic, format, &report, None).await
}
