//! PDF summaries: a markdown digest, a mermaid mindmap, or both.

use super::{spinner, Workbench};
use crate::agent::{block_body, Agent};
use crate::mermaid::{clean_mindmap, fetch_image, pako_link, png_data_url};
use crate::models::SummaryType;
use crate::output::{file_stem, pdf};
use anyhow::{bail, Result};
use std::path::{Path, PathBuf};
use tracing::info;

const MINDMAP_RULES: &str = r#"Based on the given article:
1. try to summary and extra the key points for the diagram generation.
2. these key points must be informative and concise.
3. these key points should highlight the author's viewpoints.
4. try to keep the key points in a logical order.
5. don't include any extra explanation and irrelevant information.

Use them to generate a Mindmap.
Mindmap syntax rules:
- Each line should not have any quotes marks
- Do not include 'mermaid' at the start of the diagram
- Do not use 3-nesting parentheses for root, ie: "root((Mixture of Experts (MoE)))". The correct is "root((MoE))"
- Do not use abbreviations with parentheses in the middle of a line, but it can be used at the end of a line
- Do not use any special characters in the diagram except emojis
- Keep function name without parameters when you are reading a programming article, ie: free, not free()
- Can only have one root node, ie no other node can be at the same level as the root node.
- Basic structure example:
<Basic Structure>
mindmap
  Root
    A
      B
      C

Each node in the mindmap can be different shapes:
<Square>
id[I am a square]
<Rounded square>
id(I am a rounded square)
<Circle>
id((I am a circle))
<Bang>
id))I am a bang((
<Cloud>
id)I am a cloud(
<Hexagon>
id{{I am a hexagon}}
<Default>
I am the default shape

Icons can be used in the mindmap with syntax: "::icon()"

Markdown string can be used like the following:
<Markdown string>
mindmap
    id1["`**Root** with
a second line
Unicode works too: 🤓`"]
      id2["`The dog in **the** hog... a *very long text* that wraps to a new line`"]
      id3[Regular labels still works]

Here is a mindmap example:
<example mindmap>
mindmap
  root((mindmap))
    Origins
      Long history
      ::icon(fa fa-book)
      Popularisation
        British popular psychology author Tony Buzan
    Research
      On effectiveness<br/>and features
      On Automatic creation
        Uses
            Creative techniques
            Strategic planning
            Argument mapping
    Tools
      Pen and paper
      Mermaid

The max depth of the generated mindmap should be 3.

The output syntax should be correct. Try to avoid the following common errors:
- never use " in the output
- ```mermaid in the output
<error examples>
- Gating network (G) decides experts (E)
  - fixed: Gating network decides experts
- root((Mixture of Experts (MoE)))
  - fixed: root((MoE))
- 2017: Shazeer et al. (Google) - 137B LSTM
  - fixed: 2017: Shazeer et al. Google 137B LSTM
- calloc()
  - fixed: calloc
- sbrk(0) returns current break
  - fixed: sbrk:0 returns current break
- Allocate N + sizeof(header_t) bytes
  - fixed: Allocate N + sizeof header_t bytes

Review the output to ensure it is logical and follows the correct syntax, if not, correct it."#;

const SUMMARY_TEMPLATE: &str = "A concise summary in markdown format:

# {A Title That Captures the Essence of the Text}

## Summary
{Brief overview of key findings and significance}

## Terminology
- {Term 1}: {Definition}
- {Term 2}: {Definition}

## Main Points
### Point 1
{Main point 1}
{Explanation or implementation}

### Point 2
{Main point 2}
{Explanation or implementation}

## Improvements And Creativity
{Main improvements and creativity in the text}

## Insights
{Your insights on the text}
{Your predictions or recommendations}

## References
- [Source 1](link) - Link in given text
- [Source 2](link) - Link in given text
- [Source 3](link) - Link in given text

---
Report generated by TSW-X
Advanced Research Systems Division
Date: {current_date}";

fn mindmap_agent() -> Agent {
    Agent::new("Mindmap Agent")
        .description("You are an MermaidJS diagram generator. You can generate stunning MermaidJS diagram codes.")
        .instruction(MINDMAP_RULES)
        .markdown(false)
}

fn summary_agent() -> Agent {
    Agent::new("Summary Agent")
        .description("You are a good paper reader and need to explain what you have read to others.")
        .instructions([
            "1. find the main points of the document.",
            "2. for each main point, provide a informative summary and explain the implementation if needed.",
            "3. for each complex concept, provide a brief explanation.",
            "4. make the whole summary readable and engaging.",
        ])
        .expected_output(SUMMARY_TEMPLATE)
        .markdown(true)
        .add_datetime(true)
}

/// Ask for a mindmap, clean it, and return its mermaid.ink link.
pub async fn mindmap_link(bench: &Workbench, text: &str) -> Result<String> {
    let raw = mindmap_agent().run(bench.deep(), text).await?;
    info!("Raw mindmap:\n{}", raw);

    let cleaned = clean_mindmap(&raw);
    info!("Cleaned mindmap:\n{}", cleaned);

    let link = pako_link(&cleaned)?;
    println!("🔗 Mindmap: {}", link);
    Ok(link)
}

pub async fn summarise_text(bench: &Workbench, text: &str) -> Result<String> {
    let summary = summary_agent().run(bench.deep(), text).await?;
    Ok(block_body(&summary))
}

/// Put the mindmap image right below the summary's title line.
pub fn embed_mindmap(summary: &str, image_url: &str) -> String {
    let mut lines: Vec<String> = summary.split('\n').map(String::from).collect();
    let at = lines.len().min(1);
    lines.insert(at, format!("\n## Mindmap\n![Mindmap]({})", image_url));
    lines.join("\n")
}

/// Summarise already-extracted `text`, naming the artifacts after `stem`.
pub async fn summarise(
    bench: &Workbench,
    stem: &str,
    text: &str,
    kind: SummaryType,
) -> Result<PathBuf> {
    let path = match kind {
        SummaryType::Mindmap => {
            let link = mindmap_link(bench, text).await?;
            let image = fetch_image(&bench.http, &link).await?;
            bench.output.write_bytes(&format!("{}.png", stem), &image)?
        }
        SummaryType::Text => {
            let summary = summarise_text(bench, text).await?;
            bench.output.write(&format!("{}.md", stem), &summary, false)?
        }
        SummaryType::Both => {
            let link = mindmap_link(bench, text).await?;
            bench.pause().await;
            let summary = summarise_text(bench, text).await?;
            let image = fetch_image(&bench.http, &link).await?;
            let summary = embed_mindmap(&summary, &png_data_url(&image));
            bench.output.write(&format!("{}.md", stem), &summary, false)?
        }
    };

    println!("✅ Saved to {}", path.display());
    Ok(path)
}

/// Summarise the PDF at `file`.
pub async fn run(bench: &Workbench, file: &Path, kind: SummaryType) -> Result<PathBuf> {
    let pb = spinner(format!("Reading {}", file.display()));
    let text = pdf::extract_text(file);
    pb.finish_and_clear();

    let text = text?;
    if text.trim().is_empty() {
        bail!("No text found in {}", file.display());
    }
    info!("Extracted {} characters from {}", text.len(), file.display());

    let stem = file_stem(&file.to_string_lossy());
    summarise(bench, &stem, &text, kind).await
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
    fn test_mindmap_agent_carries_error_examples() {
        let prompt = mindmap_agent().system_prompt();
        assert!(prompt.contains("<Markdown string>"));
        assert!(prompt.contains("fixed: 2017: Shazeer et al. Google 137B LSTM"));
        assert!(prompt.contains("fixed: Allocate N + sizeof header_t bytes"));
    }

    #[test]
    fn test_embed_mindmap_after_title() {
        let summary = "# Title\n\n## Summary\nText";
        assert_eq!(
            embed_mindmap(summary, "data:image/png;base64,AAA"),
            "# Title\n\n## Mindmap\n![Mindmap](data:image/png;base64,AAA)\n\n## Summary\nText"
        );
    }

    #[test]
    fn test_embed_mindmap_single_line() {
        assert_eq!(
            embed_mindmap("# Only", "x"),
            "# Only\n\n## Mindmap\n![Mindmap](x)"
        );
    }

    #[tokio::test]
    async fn test_summarise_text_writes_stem_markdown() {
        let dir = TempDir::new().unwrap();
        let deep = Arc::new(MockLlm::new(["```markdown\n# Paper\n\nPoints\n```"]));
        let bench = workbench(
            &dir,
            Arc::new(MockLlm::new(["unused"])),
            deep.clone(),
            Arc::new(MockWeb::new()),
        );

        let path = summarise(&bench, "paper", "full text", SummaryType::Text)
            .await
            .unwrap();

        assert_eq!(path, dir.path().join("paper.md"));
        assert_eq!(std::fs::read_to_string(path).unwrap(), "# Paper\n\nPoints");
        assert_eq!(deep.prompts(), vec!["full text"]);
    }

    #[tokio::test]
    async fn test_mindmap_link_cleans_diagram() {
        let dir = TempDir::new().unwrap();
        let deep = Arc::new(MockLlm::new([
            "```mermaid\nmindmap\n  root((Mixture of Experts (MoE)))\n    calloc() call\n```",
        ]));
        let bench = workbench(
            &dir,
            Arc::new(MockLlm::new(["unused"])),
            deep.clone(),
            Arc::new(MockWeb::new()),
        );

        let link = mindmap_link(&bench, "text").await.unwrap();
        let expected = pako_link("mindmap\n  root((Mixture of Experts))\n    calloc call").unwrap();
        assert_eq!(link, expected);

        let system = deep.requests()[0].system_prompt.clone().unwrap();
        assert!(!system.contains("Use markdown"));
    }

    #[tokio::test]
    async fn test_run_rejects_missing_file() {
        let dir = TempDir::new().unwrap();
        let bench = workbench(
            &dir,
            Arc::new(MockLlm::new(["unused"])),
            Arc::new(MockLlm::new(["unused"])),
            Arc::new(MockWeb::new()),
        );
        let missing = dir.path().join("missing.pdf");
        assert!(run(&bench, &missing, SummaryType::Text).await.is_err());
    }
}
