//! Question-and-answer thinking over one article.
//!
//! A reader agent asks questions about the article, the article's "writer"
//! answers them, and the next round sees every earlier exchange.

use super::Workbench;
use crate::agent::Agent;
use crate::config::ThinkConfig;
use crate::models::{QaPair, ThinkMode};
use crate::output::timestamp;
use crate::render::generate_thinking_markdown;
use anyhow::Result;
use std::path::PathBuf;
use tracing::warn;

const QUESTION_MAX_CHARS: usize = 300;
const ANSWER_MAX_CHARS: usize = 600;

const CRITICAL_READER: &str = "You're a reader with great insight and critical thinking.
You will be given an article, the question history and answer history.
You must ask 5 questions based on the given information, remember don't repeat the same or similar questions.
each question should be clear and concise.
output questions only, no explanation or unnecessary information.";

const CRITICAL_WRITER: &str = "You're the writer of a given article.
You are responsible for answering the questions about your article.
You must be objective and support your answers with evidence.
Try to understand why the questions are being asked.
If you find the questions are helpful to fix your article, then you're on the right track.";

const FAQ_READER: &str = "You're a reader trying to understand the article and learn more about it.
At the same time, you will be given the question history and answer history.
You must ask 5 questions based on the given information, remember don't repeat the same or similar questions.
each question should be clear and concise.
output questions only, no explanation or unnecessary information.";

const FAQ_WRITER: &str = "You're the writer of a given article.
You are responsible for answering the questions about your article.
Try to help the reader understand the article better.";

fn prompts(mode: ThinkMode) -> (&'static str, &'static str) {
    match mode {
        ThinkMode::Critical => (CRITICAL_READER, CRITICAL_WRITER),
        ThinkMode::Faq => (FAQ_READER, FAQ_WRITER),
    }
}

fn bounded_agent(name: &str, description: &str, max_chars: usize, lang: &str) -> Agent {
    Agent::new(name)
        .description(description)
        .instruction(format!(
            "the whole content should be less than {} characters.",
            max_chars
        ))
        .instruction(format!("the output language: {}.", lang))
        .markdown(true)
}

/// Questions and answers from one thinking run, in lockstep.
#[derive(Debug, Default)]
pub struct ThinkSession {
    pub questions: Vec<String>,
    pub answers: Vec<String>,
}

impl ThinkSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reader prompt; from the second round on it carries the history.
    pub fn reader_prompt(&self, article: &str) -> String {
        if self.questions.is_empty() {
            return format!("Article:\n{}", article);
        }
        format!(
            "Article:\n{}\nAsked Questions:\n{}\nAnswers to Questions:\n{}",
            article,
            self.questions.join("\n\n"),
            self.answers.join("\n\n")
        )
    }

    pub fn pairs(&self) -> Vec<QaPair> {
        self.questions
            .iter()
            .zip(&self.answers)
            .map(|(q, a)| QaPair {
                question: q.clone(),
                answer: a.clone(),
            })
            .collect()
    }
}

/// Think about the article at `link` and write the Q&A document.
///
/// Returns `None` when the article can't be fetched or nothing was asked.
pub async fn run(bench: &Workbench, link: &str, config: &ThinkConfig) -> Result<Option<PathBuf>> {
    config.validate()?;

    let article = match bench.web.fetch(link, None).await {
        Some(article) if !article.trim().is_empty() => article,
        _ => {
            println!("Failed to fetch the content from {}, exiting.", link);
            return Ok(None);
        }
    };

    let (reader_description, writer_description) = prompts(config.mode);
    let reader = bounded_agent("Reader Agent", reader_description, QUESTION_MAX_CHARS, &config.lang);
    let writer = bounded_agent("Writer Agent", writer_description, ANSWER_MAX_CHARS, &config.lang);
    let mut session = ThinkSession::new();

    for i in 0..config.loops {
        println!("🤔 Thinking loop {}/{}", i + 1, config.loops);

        let questions = match reader.run(bench.deep(), &session.reader_prompt(&article)).await {
            Ok(questions) => questions,
            Err(e) => {
                warn!("Reader failed: {:#}", e);
                String::new()
            }
        };
        if questions.is_empty() {
            println!("No more questions, exiting.");
            break;
        }

        bench.pause().await;
        let prompt = format!("Article:\n{}\nQuestions:\n{}", article, questions);
        match writer.run(bench.deep(), &prompt).await {
            Ok(answers) if !answers.is_empty() => {
                session.questions.push(questions);
                session.answers.push(answers);
            }
            Ok(_) => {
                warn!("Writer returned no answers");
                break;
            }
            Err(e) => {
                warn!("Writer failed: {:#}", e);
                break;
            }
        }
        bench.pause().await;
    }

    let pairs = session.pairs();
    if pairs.is_empty() {
        println!("No questions or answers to output, exiting.");
        return Ok(None);
    }

    let mode = config.mode.to_string();
    let content = generate_thinking_markdown(&mode, link, &pairs);
    let topic = format!("{}{}", mode, timestamp());
    let path = bench
        .deliver(&topic, config.format, &content, config.receivers.as_deref())
        .await?;
    Ok(Some(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::mock::MockLlm;
    use crate::web::mock::MockWeb;
    use crate::workers::testing::workbench;
    use std::sync::Arc;
    use tempfile::TempDir;

    const LINK: &str = "https://blog.example/post";

    fn config(mode: ThinkMode, loops: usize) -> ThinkConfig {
        ThinkConfig {
            mode,
            loops,
            ..ThinkConfig::default()
        }
    }

    #[test]
    fn test_reader_prompt_carries_history() {
        let mut session = ThinkSession::new();
        assert_eq!(session.reader_prompt("text"), "Article:\ntext");

        session.questions.push("Q1".to_string());
        session.answers.push("A1".to_string());
        assert_eq!(
            session.reader_prompt("text"),
            "Article:\ntext\nAsked Questions:\nQ1\nAnswers to Questions:\nA1"
        );
    }

    #[tokio::test]
    async fn test_think_writes_question_answer_document() {
        let dir = TempDir::new().unwrap();
        let deep = Arc::new(MockLlm::new(["Why?", "Because.", "How?", "Like so."]));
        let web = Arc::new(MockWeb::new().with_page(LINK, "An article."));
        let bench = workbench(&dir, Arc::new(MockLlm::new(["unused"])), deep.clone(), web);

        let path = run(&bench, LINK, &config(ThinkMode::Faq, 2))
            .await
            .unwrap()
            .unwrap();

        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("faq") && name.ends_with(".md"));
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "# Thinking(Mode: faq) on https://blog.example/post\n\n\
             ## Question:\n\n Why?\n\n## Answer: \n\nBecause.\n\
             ## Question:\n\n How?\n\n## Answer: \n\nLike so."
        );

        let prompts = deep.prompts();
        assert_eq!(prompts[1], "Article:\nAn article.\nQuestions:\nWhy?");
        assert!(prompts[2].contains("Asked Questions:\nWhy?"));

        let system = deep.requests()[0].system_prompt.clone().unwrap();
        assert!(system.starts_with("You're a reader trying to understand"));
        assert!(system.contains("less than 300 characters"));
    }

    #[tokio::test]
    async fn test_think_stops_when_no_questions() {
        let dir = TempDir::new().unwrap();
        let deep = Arc::new(MockLlm::new(["Q?", "A.", ""]));
        let web = Arc::new(MockWeb::new().with_page(LINK, "An article."));
        let bench = workbench(&dir, Arc::new(MockLlm::new(["unused"])), deep.clone(), web);

        let path = run(&bench, LINK, &config(ThinkMode::Critical, 5))
            .await
            .unwrap();

        assert!(path.is_some());
        assert_eq!(deep.call_count(), 3);
    }

    #[tokio::test]
    async fn test_think_exits_when_fetch_fails() {
        let dir = TempDir::new().unwrap();
        let deep = Arc::new(MockLlm::new(["unused"]));
        let bench = workbench(
            &dir,
            Arc::new(MockLlm::new(["unused"])),
            deep.clone(),
            Arc::new(MockWeb::new()),
        );

        let result = run(&bench, LINK, &ThinkConfig::default()).await.unwrap();
        assert!(result.is_none());
        assert_eq!(deep.call_count(), 0);
    }

    #[tokio::test]
    async fn test_think_outputs_nothing_without_answers() {
        let dir = TempDir::new().unwrap();
        let deep = Arc::new(MockLlm::new([""]));
        let web = Arc::new(MockWeb::new().with_page(LINK, "An article."));
        let bench = workbench(&dir, Arc::new(MockLlm::new(["unused"])), deep, web);

        let result = run(&bench, LINK, &config(ThinkMode::Critical, 3)).await.unwrap();
        assert!(result.is_none());
    }
}
