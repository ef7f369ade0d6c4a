//! Output artifacts: markdown, PDF, plain files, and email.

pub mod mail;
pub mod pdf;

use crate::models::OutputFormat;
use anyhow::{Context, Result};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub use mail::Mailer;

/// The directory every worker writes into.
#[derive(Debug, Clone)]
pub struct OutputDir {
    root: PathBuf,
    pdf_font: Option<PathBuf>,
}

impl OutputDir {
    /// Use `root`, creating it if needed.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)
            .with_context(|| format!("Failed to create output directory {}", root.display()))?;
        Ok(Self {
            root,
            pdf_font: None,
        })
    }

    /// TrueType font embedded in rendered PDFs.
    pub fn with_pdf_font(mut self, font: Option<PathBuf>) -> Self {
        self.pdf_font = font;
        self
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    pub fn join(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// Write (or append) text to `name`.
    pub fn write(&self, name: &str, text: &str, append: bool) -> Result<PathBuf> {
        let path = self.join(name);
        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .append(append)
            .truncate(!append)
            .open(&path)
            .with_context(|| format!("Failed to open {}", path.display()))?;
        file.write_all(text.as_bytes())
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(path)
    }

    pub fn write_bytes(&self, name: &str, bytes: &[u8]) -> Result<PathBuf> {
        let path = self.join(name);
        std::fs::write(&path, bytes)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(path)
    }

    /// Write `content` for `topic` in `format` and return the file path.
    ///
    /// `md` writes `{topic}.md`, `pdf` renders `{topic}.pdf`, and `txt`
    /// uses `topic` as the file name unchanged. Without a configured PDF
    /// font, text the builtin fonts can't show is written as markdown.
    pub fn output_content(&self, topic: &str, format: OutputFormat, content: &str) -> Result<PathBuf> {
        let path = match format {
            OutputFormat::Pdf
                if self.pdf_font.is_none() && !pdf::fits_builtin_fonts(content) =>
            {
                warn!(
                    "{} has characters outside Latin-1; writing markdown instead (set general.pdf_font to a Unicode TrueType font for PDF)",
                    topic
                );
                self.write(&file_name(topic, OutputFormat::Md), content, false)?
            }
            OutputFormat::Pdf => {
                let path = self.join(&file_name(topic, format));
                pdf::render_markdown_pdf(topic, content, &path, self.pdf_font.as_deref())?;
                path
            }
            OutputFormat::Md | OutputFormat::Txt => {
                self.write(&file_name(topic, format), content, false)?
            }
        };

        info!("Wrote {}", path.display());
        Ok(path)
    }
}

fn file_name(topic: &str, format: OutputFormat) -> String {
    match format.extension() {
        Some(ext) => format!("{}.{}", topic, ext),
        None => topic.to_string(),
    }
}

/// Base name without its final extension: `a/b.c.pdf` → `b.c`.
pub fn file_stem(path: &str) -> String {
    let name = path
        .trim_end_matches('/')
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or("");
    match name.rfind('.') {
        Some(0) | None => name.to_string(),
        Some(idx) => name[..idx].to_string(),
    }
}

/// Seconds since the epoch, used to name artifacts without a topic.
pub fn timestamp() -> i64 {
    chrono::Utc::now().timestamp()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_file_stem() {
        assert_eq!(file_stem("a/b.c.pdf"), "b.c");
        assert_eq!(file_stem("paper.pdf"), "paper");
        assert_eq!(file_stem("https://host/docs/guide.pdf"), "guide");
        assert_eq!(file_stem("README"), "README");
        assert_eq!(file_stem(".env"), ".env");
    }

    #[test]
    fn test_output_content_md_and_txt() {
        let dir = TempDir::new().unwrap();
        let out = OutputDir::new(dir.path().join("nested")).unwrap();

        let md = out
            .output_content("topic", OutputFormat::Md, "# Hello")
            .unwrap();
        assert_eq!(md, dir.path().join("nested/topic.md"));
        assert_eq!(std::fs::read_to_string(&md).unwrap(), "# Hello");

        let txt = out
            .output_content("jobs.html", OutputFormat::Txt, "<html></html>")
            .unwrap();
        assert_eq!(txt.file_name().unwrap(), "jobs.html");
    }

    #[test]
    fn test_write_append() {
        let dir = TempDir::new().unwrap();
        let out = OutputDir::new(dir.path()).unwrap();

        out.write("log.md", "one\n", false).unwrap();
        out.write("log.md", "two\n", true).unwrap();
        assert_eq!(
            std::fs::read_to_string(out.join("log.md")).unwrap(),
            "one\ntwo\n"
        );

        out.write("log.md", "fresh", false).unwrap();
        assert_eq!(std::fs::read_to_string(out.join("log.md")).unwrap(), "fresh");
    }

    #[test]
    fn test_output_content_pdf() {
        let dir = TempDir::new().unwrap();
        let out = OutputDir::new(dir.path()).unwrap();

        let path = out
            .output_content("report", OutputFormat::Pdf, "# Title\n\nSome text.")
            .unwrap();
        let bytes = std::fs::read(path).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn test_output_content_pdf_falls_back_to_markdown() {
        let dir = TempDir::new().unwrap();
        let out = OutputDir::new(dir.path()).unwrap();

        let path = out
            .output_content("article.chinese", OutputFormat::Pdf, "# 你好世界")
            .unwrap();
        assert_eq!(path, dir.path().join("article.chinese.md"));
        assert_eq!(std::fs::read_to_string(path).unwrap(), "# 你好世界");
    }

    #[test]
    fn test_output_content_pdf_uses_configured_font() {
        let dir = TempDir::new().unwrap();
        let out = OutputDir::new(dir.path())
            .unwrap()
            .with_pdf_font(Some(dir.path().join("missing.ttf")));

        // The configured font is used even for non-Latin text.
        assert!(out
            .output_content("report", OutputFormat::Pdf, "# 你好")
            .is_err());
    }
}
