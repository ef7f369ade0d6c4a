//! Repository packing and explanation.

use super::{spinner, truncate_chars, Workbench};
use crate::agent::Agent;
use crate::config::CodeConfig;
use crate::render::generate_packed_repo;
use crate::repo::{checkout, repo_name};
use crate::scanner::{FileScanner, ScanConfig};
use anyhow::{bail, Result};
use std::path::PathBuf;
use tracing::{info, warn};

/// Largest packed repository handed to the explainer, in characters.
const MAX_PACKED_CHARS: usize = 400_000;

fn explainer_agent(lang: &str) -> Agent {
    Agent::new("Code Explainer")
        .description("You are a senior software engineer who explains unfamiliar codebases to other engineers.")
        .instructions([
            "you will be given a packed repository: a directory tree followed by the content of every file.".to_string(),
            "explain the architecture and the responsibility of each main module.".to_string(),
            "describe how data flows through the system and where the entry points are.".to_string(),
            "point out notable design decisions, dependencies and anything surprising.".to_string(),
            "refer to files by their paths.".to_string(),
            format!("write the explanation in {}.", lang),
        ])
        .expected_output(
            "# {Repository name}\n\n## Overview\n\n## Architecture\n\n## Modules\n\n## Data Flow\n\n## Entry Points\n\n## Notes",
        )
        .markdown(true)
}

/// Output name for `config`: the explicit one or the repository's name.
fn output_name(config: &CodeConfig) -> String {
    config
        .output
        .clone()
        .filter(|o| !o.trim().is_empty())
        .unwrap_or_else(|| repo_name(&config.repo))
}

/// Check out and scan the repository, returning its packed document.
pub async fn pack_repository(config: &CodeConfig, show_progress: bool) -> Result<String> {
    config.validate()?;
    let repo = checkout(&config.repo, config.branch.clone(), show_progress).await?;

    let scanner = FileScanner::new(repo.path().to_path_buf(), ScanConfig::from(config));
    let files = scanner.scan()?;
    if files.is_empty() {
        bail!("No matching source files in {}", config.repo);
    }

    let total: u64 = files.iter().map(|f| f.size).sum();
    info!("Packed {} files ({} bytes)", files.len(), total);
    println!("📦 Packed {} files", files.len());

    Ok(generate_packed_repo(&repo_name(&config.repo), &files))
}

/// Write the packed repository to `{name}-packed.md`.
pub async fn pack(bench: &Workbench, config: &CodeConfig) -> Result<PathBuf> {
    let packed = pack_repository(config, true).await?;
    let path = bench
        .output
        .write(&format!("{}-packed.md", output_name(config)), &packed, false)?;
    println!("✅ Saved to {}", path.display());
    Ok(path)
}

/// Explain the repository and write the explanation.
pub async fn explain(bench: &Workbench, config: &CodeConfig) -> Result<PathBuf> {
    let packed = pack_repository(config, true).await?;

    let input = truncate_chars(&packed, MAX_PACKED_CHARS);
    if input.len() < packed.len() {
        warn!(
            "Packed repository truncated to {} characters; narrow extensions or excludes for a full view",
            MAX_PACKED_CHARS
        );
    }

    let pb = spinner("Explaining repository...");
    let explanation = explainer_agent(&config.lang).run(bench.deep(), input).await;
    pb.finish_and_clear();
    let explanation = explanation?;

    bench
        .deliver(&output_name(config), config.format, &explanation, None)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::mock::MockLlm;
    use crate::web::mock::MockWeb;
    use crate::workers::testing::workbench;
    use std::fs;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn project() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("src")).unwrap();
        fs::write(dir.path().join("src/main.rs"), "fn main() {}\n").unwrap();
        fs::write(dir.path().join("README.md"), "# Demo\n").unwrap();
        dir
    }

    fn config(project: &TempDir, output: Option<&str>) -> CodeConfig {
        serde_json::from_value(serde_json::json!({
            "repo": project.path().to_string_lossy(),
            "output": output,
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_pack_writes_packed_document() {
        let project = project();
        let out = TempDir::new().unwrap();
        let bench = workbench(
            &out,
            Arc::new(MockLlm::new(["unused"])),
            Arc::new(MockLlm::new(["unused"])),
            Arc::new(MockWeb::new()),
        );

        let path = pack(&bench, &config(&project, Some("demo"))).await.unwrap();

        assert_eq!(path, out.path().join("demo-packed.md"));
        let packed = fs::read_to_string(path).unwrap();
        assert!(packed.starts_with("# Repository Structure"));
        assert!(packed.contains("## File: src/main.rs\n\n```rust\nfn main() {}\n```"));
        assert!(packed.contains("## File: README.md"));
    }

    #[tokio::test]
    async fn test_explain_sends_packed_repo() {
        let project = project();
        let out = TempDir::new().unwrap();
        let deep = Arc::new(MockLlm::new(["# Demo\n\n## Overview\nA tiny binary."]));
        let bench = workbench(
            &out,
            Arc::new(MockLlm::new(["unused"])),
            deep.clone(),
            Arc::new(MockWeb::new()),
        );

        let path = explain(&bench, &config(&project, Some("demo"))).await.unwrap();

        assert_eq!(path, out.path().join("demo.md"));
        assert!(fs::read_to_string(path).unwrap().contains("A tiny binary."));
        assert!(deep.prompts()[0].contains("## File: src/main.rs"));
    }

    #[tokio::test]
    async fn test_pack_empty_repository_fails() {
        let empty = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        let bench = workbench(
            &out,
            Arc::new(MockLlm::new(["unused"])),
            Arc::new(MockLlm::new(["unused"])),
            Arc::new(MockWeb::new()),
        );

        assert!(pack(&bench, &config(&empty, None)).await.is_err());
    }

    #[test]
    fn test_output_name_falls_back_to_repo() {
        let cfg: CodeConfig =
            serde_json::from_str(r#"{"repo": "https://github.com/owner/tool.git"}"#).unwrap();
        assert_eq!(output_name(&cfg), "tool");
    }
}
