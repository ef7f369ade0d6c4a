//! Prompt-bound LLM calls.
//!
//! An [`Agent`] is a system prompt (description, instructions, expected
//! output) that is sent along with one input to an [`LlmClient`]. Workers
//! chain agents by feeding one agent's output into the next.

pub mod parse;

use crate::llm::{ChatMessage, LlmClient, LlmRequest};
use anyhow::{anyhow, Context, Result};
use chrono::Local;
use serde::de::DeserializeOwned;
use tracing::debug;

pub use parse::{block_body, parse_lenient};

/// JSON shape description for [`crate::models::SubItems`].
pub const SUB_ITEMS_SCHEMA: &str = r#"{"items": ["string", ...]}"#;

#[derive(Debug, Clone, Default)]
pub struct Agent {
    name: String,
    description: String,
    instructions: Vec<String>,
    expected_output: Option<String>,
    markdown: bool,
    add_datetime: bool,
    temperature: Option<f32>,
}

impl Agent {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn instruction(mut self, instruction: impl Into<String>) -> Self {
        self.instructions.push(instruction.into());
        self
    }

    pub fn instructions<I, S>(mut self, instructions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.instructions
            .extend(instructions.into_iter().map(Into::into));
        self
    }

    pub fn expected_output(mut self, template: impl Into<String>) -> Self {
        self.expected_output = Some(template.into());
        self
    }

    /// Ask for markdown-formatted answers.
    pub fn markdown(mut self, markdown: bool) -> Self {
        self.markdown = markdown;
        self
    }

    /// Tell the model the current date and time.
    pub fn add_datetime(mut self, add: bool) -> Self {
        self.add_datetime = add;
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Render the system prompt.
    pub fn system_prompt(&self) -> String {
        let mut prompt = String::new();

        if !self.description.is_empty() {
            prompt.push_str(self.description.trim());
            prompt.push_str("\n\n");
        }

        if !self.instructions.is_empty() {
            prompt.push_str("## Instructions\n\n");
            for instruction in &self.instructions {
                prompt.push_str(&format!("- {}\n", instruction.trim()));
            }
            prompt.push('\n');
        }

        if let Some(ref expected) = self.expected_output {
            prompt.push_str("## Expected output\n\n");
            prompt.push_str(expected.trim());
            prompt.push_str("\n\n");
        }

        if self.markdown {
            prompt.push_str("Use markdown to format your answers.\n");
        }

        if self.add_datetime {
            prompt.push_str(&format!(
                "The current time is {}.\n",
                Local::now().format("%Y-%m-%d %H:%M:%S")
            ));
        }

        prompt.trim_end().to_string()
    }

    fn request(&self, system_prompt: String, input: &str, json_mode: bool) -> LlmRequest {
        LlmRequest {
            system_prompt: Some(system_prompt),
            messages: vec![ChatMessage::user(input)],
            temperature: self.temperature,
            json_mode,
        }
    }

    /// Send `input` and return the trimmed answer.
    pub async fn run(&self, client: &dyn LlmClient, input: &str) -> Result<String> {
        debug!(agent = %self.name, model = client.model_name(), "Running agent");

        let response = client
            .complete(self.request(self.system_prompt(), input, false))
            .await
            .with_context(|| format!("Agent '{}' failed", self.name))?;

        Ok(response.content.trim().to_string())
    }

    /// Send `input` asking for JSON shaped like `schema`, and parse it.
    pub async fn run_structured<T: DeserializeOwned>(
        &self,
        client: &dyn LlmClient,
        input: &str,
        schema: &str,
    ) -> Result<T> {
        debug!(agent = %self.name, model = client.model_name(), "Running structured agent");

        let mut system_prompt = self.system_prompt();
        system_prompt.push_str("\n\nRespond only with JSON in this shape:\n");
        system_prompt.push_str(schema);

        let response = client
            .complete(self.request(system_prompt, input, true))
            .await
            .with_context(|| format!("Agent '{}' failed", self.name))?;

        parse_lenient(&response.content).ok_or_else(|| {
            anyhow!(
                "Agent '{}' returned unparseable output: {}",
                self.name,
                preview(&response.content)
            )
        })
    }
}

fn preview(text: &str) -> String {
    let mut preview: String = text.chars().take(120).collect();
    if text.chars().count() > 120 {
        preview.push_str("...");
    }
    preview
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::mock::MockLlm;
    use crate::models::SubItems;

    fn questioner() -> Agent {
        Agent::new("questioner")
            .description("You ask questions.")
            .instructions(["Ask at most 3 questions.", "Be specific."])
            .expected_output("A list of questions.")
            .markdown(true)
    }

    #[test]
    fn test_system_prompt_sections() {
        let prompt = questioner().system_prompt();
        assert!(prompt.starts_with("You ask questions."));
        assert!(prompt.contains("- Ask at most 3 questions.\n- Be specific."));
        assert!(prompt.contains("## Expected output\n\nA list of questions."));
        assert!(prompt.ends_with("Use markdown to format your answers."));
        assert!(!prompt.contains("current time"));
    }

    #[test]
    fn test_system_prompt_datetime() {
        let prompt = Agent::new("dated").add_datetime(true).system_prompt();
        assert!(prompt.starts_with("The current time is"));
    }

    #[tokio::test]
    async fn test_run_trims_and_sends_input() {
        let mock = MockLlm::new(["  answer \n"]);
        let out = questioner().run(&mock, "the topic").await.unwrap();
        assert_eq!(out, "answer");

        let requests = mock.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].messages[0].content, "the topic");
        assert!(!requests[0].json_mode);
    }

    #[tokio::test]
    async fn test_run_structured_parses_sub_items() {
        let mock = MockLlm::new(["```json\n{\"items\": [\"a\", \"b\"]}\n```"]);
        let items: SubItems = questioner()
            .run_structured(&mock, "topic", SUB_ITEMS_SCHEMA)
            .await
            .unwrap();
        assert_eq!(items.items, vec!["a", "b"]);

        let request = &mock.requests()[0];
        assert!(request.json_mode);
        assert!(request
            .system_prompt
            .as_deref()
            .unwrap()
            .contains(SUB_ITEMS_SCHEMA));
    }

    #[tokio::test]
    async fn test_run_structured_reports_garbage() {
        let mock = MockLlm::new(["I cannot do that."]);
        let result: Result<SubItems> = questioner()
            .run_structured(&mock, "topic", SUB_ITEMS_SCHEMA)
            .await;
        assert!(result.is_err());
    }
}
