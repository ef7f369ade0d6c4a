//! Technical article writer: draft, review, revise, translate.

use super::{truncate_chars, Workbench, MAX_ARTICLE_CHARS};
use crate::agent::Agent;
use crate::config::WriterConfig;
use crate::output::timestamp;
use anyhow::{Context, Result};
use std::collections::HashSet;
use std::path::PathBuf;
use tracing::{info, warn};

/// Reference pages pulled in for a draft.
const REFERENCE_RESULTS: usize = 3;

const ARTICLE_TEMPLATE: &str = "A professional technical article in markdown format:

# {Compelling Title That Captures the Topic's Essence}

## Tags
{tags}

{the body of the article in multiple sections}

## References
{List of sources, citations, and links}";

const WRITER_DESCRIPTION: &str = "You are a professional technical writer and an expert in the field.";

fn writer_agent(lang: &str) -> Agent {
    Agent::new("Writer Agent")
        .description(WRITER_DESCRIPTION)
        .instructions([
            "you will be given an agenda and some references documents to write a technical article.".to_string(),
            "your readers are technical experts, so the article should be detailed and informative.".to_string(),
            "you can use the references to write the article, but don't copy-paste.".to_string(),
            "the final article should be less than 3000 characters".to_string(),
            format!("write the article in {}.", lang),
        ])
        .expected_output(ARTICLE_TEMPLATE)
        .markdown(true)
}

fn reviser_agent(lang: &str) -> Agent {
    Agent::new("Writer Agent")
        .description(WRITER_DESCRIPTION)
        .instructions([
            "your article has been reviewed and you have received feedback.".to_string(),
            "revise the article based on the feedback.".to_string(),
            format!("keep the article in {}.", lang),
        ])
        .expected_output(ARTICLE_TEMPLATE)
        .markdown(true)
}

fn editor_agent() -> Agent {
    Agent::new("Editor Agent")
        .description("You are a professional technical editor.")
        .instructions([
            "given a draft of an article, read it and give feedback to improve its quality, readability and accuracy.",
            "only return your feedback, no other information or explanation.",
            "the feedback should be less than 200 characters",
        ])
        .markdown(true)
}

fn translator_agent(lang: &str) -> Agent {
    Agent::new("Translator Agent")
        .description("You are a professional translator of technical articles.")
        .instructions([
            format!("translate the given article into {}.", lang),
            "keep the markdown structure, code blocks and links unchanged.".to_string(),
            "only return the translated article.".to_string(),
        ])
        .markdown(true)
}

/// Draft prompt: the agenda, tags, and whatever reference pages were found.
fn draft_prompt(agenda: &str, tags: &[String], articles: &[String], links: &[String]) -> String {
    let articles: Vec<&str> = articles
        .iter()
        .map(|a| truncate_chars(a, MAX_ARTICLE_CHARS))
        .collect();

    format!(
        "Agenda:\n{}\nTags:\n{}\nReference Document:\n{}\nReferences Links:\n{}",
        agenda,
        tags.join(","),
        articles.join("\n\n"),
        links.join("\n")
    )
}

async fn write_draft(bench: &Workbench, agenda: &str, config: &WriterConfig) -> Result<String> {
    let mut visited = HashSet::new();
    let references = if config.tags.is_empty() {
        Default::default()
    } else {
        bench
            .gather_limited(&config.tags.join(","), REFERENCE_RESULTS, &mut visited)
            .await
    };
    info!("Found {} reference pages", references.links.len());

    let prompt = draft_prompt(agenda, &config.tags, &references.articles, &references.links);
    writer_agent(&config.lang).run(bench.deep(), &prompt).await
}

/// Write the article and its translations; returns the main artifact.
pub async fn run(bench: &Workbench, config: &WriterConfig) -> Result<PathBuf> {
    config.validate()?;
    let agenda = std::fs::read_to_string(&config.agenda)
        .with_context(|| format!("Failed to read agenda: {}", config.agenda.display()))?;

    println!("✍️  Writing draft...");
    let mut draft = write_draft(bench, &agenda, config).await?;

    let editor = editor_agent();
    let reviser = reviser_agent(&config.lang);
    for i in 0..config.revisions {
        bench.pause().await;
        println!("🧐 Reviewing draft {}/{}", i + 1, config.revisions);

        let feedback = match editor.run(bench.deep(), &draft).await {
            Ok(feedback) => feedback,
            Err(e) => {
                warn!("Review failed: {:#}", e);
                String::new()
            }
        };
        if feedback.is_empty() {
            println!("No feedback received. Article is ready.");
            break;
        }
        info!("Feedback: {}", feedback);

        bench.pause().await;
        draft = reviser
            .run(bench.deep(), &format!("Draft:\n{}\nFeedback:\n{}", draft, feedback))
            .await?;
    }

    let topic = format!("article{}", timestamp());

    for lang in &config.translations {
        bench.pause().await;
        println!("🌐 Translating to {}", lang);
        match translator_agent(lang).run(bench.deep(), &draft).await {
            Ok(translated) => {
                let name = format!("{}.{}", topic, lang);
                let path = bench.output.output_content(&name, config.format, &translated)?;
                println!("✅ Saved to {}", path.display());
            }
            Err(e) => warn!("Translation to {} failed: {:#}", lang, e),
        }
    }

    bench
        .deliver(&topic, config.format, &draft, config.reviewers.as_deref())
        .await
}
