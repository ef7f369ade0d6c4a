//! Iterative deep research.
//!
//! Each round asks questions about the topic, turns them into search
//! queries, digests what the searches turn up, and condenses the round into
//! a mid report. The final report is written from all mid reports.

use super::{format_sources, spinner, Workbench};
use crate::agent::{Agent, SUB_ITEMS_SCHEMA};
use crate::config::ResearchConfig;
use crate::models::SubItems;
use anyhow::Result;
use std::collections::HashSet;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Search queries generated per question.
const QUERIES_PER_QUESTION: usize = 3;

const ANALYST_DESCRIPTION: &str = "You are an expert researcher. Follow these instructions when responding:
- You may be asked to research subjects that are after your knowledge cutoff, assume the user is right when presented with news.
- The user is a highly experienced analyst, no need to simplify it, be as detailed as possible and make sure your response is correct.
- Be highly organized.
- Suggest solutions that I didn't think about.
- Be proactive and anticipate my needs.
- Treat me as an expert in all subject matter.
- Mistakes erode my trust, so be accurate and thorough.
- Provide detailed explanations, I'm comfortable with lots of detail.
- Value good arguments over authorities, the source is irrelevant.
- Consider new technologies and contrarian ideas, not just the conventional wisdom.
- You may use high levels of speculation or prediction, just flag it for me.";

const REPORT_TEMPLATE: &str = "A professional research report in markdown format:

# {Compelling Title That Captures the Topic's Essence}

## Summary
{Brief overview of key findings and significance}

## Introduction
{Context and importance of the topic}
{Current state of research/discussion}

## {Subtopic}
{Major discoveries or developments}
{Supporting evidence and analysis}

## Key Takeaways
- {Bullet point 1}
- {Bullet point 2}
- {Bullet point 3}

## References
- [Source 1](link) - Key finding/quote
- [Source 2](link) - Key finding/quote
- [Source 3](link) - Key finding/quote

---
Report generated by TSW-X
Advanced Research Systems Division
Date: {current_date}";

fn question_agent(breadth: usize) -> Agent {
    Agent::new("Question Agent")
        .description("You're a great questioner with critical thinking skills.")
        .instruction("Generate a list of questions based on the given query.")
        .instruction(format!(
            "The number of questions should be less than or equal to {}.",
            breadth
        ))
}

fn query_agent(topic: &str) -> Agent {
    Agent::new("Query Agent")
        .description("You're a great agent with excellent search query generation skills.")
        .instruction(format!(
            "Generate a list of web search queries based on the topic '{}' and the given question.",
            topic
        ))
        .instruction(format!(
            "The number of queries should be less than or equal to {}.",
            QUERIES_PER_QUESTION
        ))
        .instruction("It's okay to generate an empty list.")
}

fn search_agent() -> Agent {
    Agent::new("Search Agent")
        .description("You're a good searcher with excellent information gathering skills.")
        .instruction("Gather the information relevant to the given query from the search results.")
        .instruction("Always include the source links next to the facts they support.")
        .markdown(true)
}

fn mid_report_agent() -> Agent {
    Agent::new("Mid Report Agent")
        .description("You're a great agent with excellent information synthesis skills.")
        .instructions([
            "First, gather all the information from the search results.",
            "Then, group them by subtopics.",
            "Finally, generate a mid report based on the information.",
        ])
        .markdown(true)
}

fn analysis_agent(lang: &str) -> Agent {
    Agent::new("Analysis Agent")
        .description(ANALYST_DESCRIPTION)
        .instructions([
            "You're known for your ability to turn complex data into clear and concise reports, making it easy for others to understand and act on the information you provide.".to_string(),
            "Generate a report based on the research results.".to_string(),
            "Always include sources as a reference in the report.".to_string(),
            "The report should be informative with a clear structure and easy to understand.".to_string(),
            "The report should include a summary of the most important findings and insights.".to_string(),
            "Output the report without any additional explanation or commentary.".to_string(),
            format!("Write the report in language: {}.", lang),
        ])
        .expected_output(REPORT_TEMPLATE)
        .markdown(true)
        .add_datetime(true)
}

/// Everything one research run accumulates.
#[derive(Debug, Default)]
pub struct ResearchSession {
    pub questions: Vec<String>,
    pub queries: Vec<String>,
    pub learnings: Vec<String>,
    pub visited: HashSet<String>,
}

impl ResearchSession {
    pub fn new() -> Self {
        Self::default()
    }

    async fn ask_questions(&mut self, bench: &Workbench, topic: &str, breadth: usize) -> Vec<String> {
        let questions = match question_agent(breadth)
            .run_structured::<SubItems>(bench.fast(), topic, SUB_ITEMS_SCHEMA)
            .await
        {
            Ok(items) => items.take(breadth),
            Err(e) => {
                warn!("Question generation failed: {:#}", e);
                Vec::new()
            }
        };
        self.questions.extend(questions.iter().cloned());
        questions
    }

    async fn plan_queries(&mut self, bench: &Workbench, topic: &str, questions: &[String]) -> Vec<String> {
        let agent = query_agent(topic);
        let mut queries = Vec::new();

        for question in questions {
            match agent
                .run_structured::<SubItems>(bench.fast(), question, SUB_ITEMS_SCHEMA)
                .await
            {
                Ok(items) => queries.extend(items.take(QUERIES_PER_QUESTION)),
                Err(e) => warn!("Query generation for '{}' failed: {:#}", question, e),
            }
        }

        self.queries.extend(queries.iter().cloned());
        queries
    }

    async fn search(&mut self, bench: &Workbench, queries: &[String]) -> Vec<String> {
        let agent = search_agent();
        let mut results = Vec::new();

        for query in queries {
            println!("🔎 Searching for: {}", query);
            let found = bench.gather(query, &mut self.visited).await;
            if found.is_empty() {
                warn!("No search results for '{}'", query);
                continue;
            }

            let prompt = format!("Query: {}\n\nSearch results:\n\n{}", query, format_sources(&found));
            match agent.run(bench.fast(), &prompt).await {
                Ok(digest) => results.push(digest),
                Err(e) => warn!("Digest for '{}' failed: {:#}", query, e),
            }
            bench.pause().await;
        }

        results
    }
}

/// Run the research loop and write the final report.
///
/// Returns `None` when no round produced any insight.
pub async fn run(bench: &Workbench, topic: &str, config: &ResearchConfig) -> Result<Option<PathBuf>> {
    config.validate()?;
    let mut session = ResearchSession::new();

    for round in 0..config.depth {
        println!("\n🧭 Research round {}/{}", round + 1, config.depth);

        let questions = session.ask_questions(bench, topic, config.breadth).await;
        if questions.is_empty() {
            warn!("No questions, skipping this depth");
            continue;
        }
        for question in &questions {
            println!("   ❓ {}", question);
        }

        let queries = session.plan_queries(bench, topic, &questions).await;
        if queries.is_empty() {
            warn!("No plan to search for, skipping this depth");
            continue;
        }
        debug!("Planned {} queries", queries.len());

        let results = session.search(bench, &queries).await;
        if results.is_empty() {
            warn!("Nothing found in this depth");
            continue;
        }

        match mid_report_agent().run(bench.deep(), &results.join("\n")).await {
            Ok(mid) => session.learnings.push(mid),
            Err(e) => warn!("Mid report failed: {:#}", e),
        }
        bench.pause().await;
    }

    if session.learnings.is_empty() {
        println!("⚠️  No insights, exiting.");
        return Ok(None);
    }

    info!(
        questions = session.questions.len(),
        queries = session.queries.len(),
        learnings = session.learnings.len(),
        "Writing final report"
    );
    let pb = spinner("Generating final report...");
    let report = analysis_agent(&config.lang)
        .run(bench.deep(), &session.learnings.join("\n"))
        .await;
    pb.finish_and_clear();
    let report = report?;

    let path = bench
        .deliver(topic, config.format, &report, config.receivers.as_deref())
        .await?;
    Ok(Some(path))
}
