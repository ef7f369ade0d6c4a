//! PDF rendering from markdown and text extraction from PDFs.

use anyhow::{anyhow, Context, Result};
use printpdf::{BuiltinFont, IndirectFontRef, Mm, PdfDocument};
use pulldown_cmark::{Event, HeadingLevel, Parser, Tag, TagEnd};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use tracing::debug;

const PAGE_WIDTH_MM: f32 = 210.0;
const PAGE_HEIGHT_MM: f32 = 297.0;
const MARGIN_MM: f32 = 20.0;
const PT_TO_MM: f32 = 0.3528;
const BODY_SIZE: f32 = 11.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Style {
    Heading(u8),
    Body,
    Code,
}

impl Style {
    fn font_size(&self) -> f32 {
        match self {
            Style::Heading(1) => 20.0,
            Style::Heading(2) => 16.0,
            Style::Heading(_) => 13.0,
            Style::Body => BODY_SIZE,
            Style::Code => 9.0,
        }
    }

    fn line_height_mm(&self) -> f32 {
        self.font_size() * 1.4 * PT_TO_MM
    }

    /// Rough width budget per line in half-em units; Helvetica averages
    /// half an em and wide CJK glyphs take a full one.
    fn max_chars(&self) -> usize {
        let width_pt = (PAGE_WIDTH_MM - 2.0 * MARGIN_MM) / PT_TO_MM;
        let char_width = match self {
            Style::Code => self.font_size() * 0.6,
            _ => self.font_size() * 0.5,
        };
        (width_pt / char_width) as usize
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Block {
    style: Style,
    text: String,
}

#[derive(Debug, Clone, PartialEq)]
struct PlacedLine {
    style: Style,
    text: String,
    y_mm: f32,
}

/// Flatten markdown into styled blocks.
fn blocks(markdown: &str) -> Vec<Block> {
    let mut blocks = Vec::new();
    let mut current = String::new();
    let mut style = Style::Body;
    let mut list_depth = 0usize;
    let mut links: Vec<String> = Vec::new();

    fn flush(blocks: &mut Vec<Block>, current: &mut String, style: Style) {
        let text = if style == Style::Code {
            current.trim_end().to_string()
        } else {
            current.trim().to_string()
        };
        if !text.is_empty() {
            blocks.push(Block { style, text });
        }
        current.clear();
    }

    for event in Parser::new(markdown) {
        match event {
            Event::Start(Tag::Heading { level, .. }) => {
                flush(&mut blocks, &mut current, style);
                style = Style::Heading(heading_number(level));
            }
            Event::End(TagEnd::Heading(_)) | Event::End(TagEnd::Paragraph) => {
                flush(&mut blocks, &mut current, style);
                style = Style::Body;
            }
            Event::Start(Tag::CodeBlock(_)) => {
                flush(&mut blocks, &mut current, style);
                style = Style::Code;
            }
            Event::End(TagEnd::CodeBlock) => {
                flush(&mut blocks, &mut current, style);
                style = Style::Body;
            }
            Event::Start(Tag::List(_)) => {
                flush(&mut blocks, &mut current, style);
                list_depth += 1;
            }
            Event::End(TagEnd::List(_)) => {
                flush(&mut blocks, &mut current, style);
                list_depth = list_depth.saturating_sub(1);
            }
            Event::Start(Tag::Item) => {
                flush(&mut blocks, &mut current, style);
                current.push_str(&"  ".repeat(list_depth.saturating_sub(1)));
                current.push_str("- ");
            }
            Event::End(TagEnd::Item) => flush(&mut blocks, &mut current, style),
            Event::Start(Tag::Link { dest_url, .. }) => links.push(dest_url.to_string()),
            Event::End(TagEnd::Link) => {
                if let Some(url) = links.pop() {
                    current.push_str(&format!(" ({})", url));
                }
            }
            Event::Text(text) | Event::Code(text) => current.push_str(&text),
            Event::SoftBreak => current.push(' '),
            Event::HardBreak => current.push('\n'),
            Event::Rule => {
                flush(&mut blocks, &mut current, style);
                blocks.push(Block {
                    style: Style::Body,
                    text: "-".repeat(40),
                });
            }
            _ => {}
        }
    }
    flush(&mut blocks, &mut current, style);

    blocks
}

fn heading_number(level: HeadingLevel) -> u8 {
    match level {
        HeadingLevel::H1 => 1,
        HeadingLevel::H2 => 2,
        HeadingLevel::H3 => 3,
        HeadingLevel::H4 => 4,
        HeadingLevel::H5 => 5,
        HeadingLevel::H6 => 6,
    }
}

/// East Asian wide characters count double.
fn char_width(c: char) -> usize {
    match c as u32 {
        0x1100..=0x115F
        | 0x2E80..=0xA4CF
        | 0xAC00..=0xD7A3
        | 0xF900..=0xFAFF
        | 0xFE30..=0xFE4F
        | 0xFF00..=0xFF60
        | 0xFFE0..=0xFFE6
        | 0x20000..=0x3FFFD => 2,
        _ => 1,
    }
}

fn text_width(text: &str) -> usize {
    text.chars().map(char_width).sum()
}

/// Split off the longest prefix of `word` that fits in `max` width.
fn split_word(word: &str, max: usize) -> (&str, &str) {
    let mut width = 0;
    for (idx, c) in word.char_indices() {
        width += char_width(c);
        if width > max {
            let idx = if idx == 0 { c.len_utf8() } else { idx };
            return word.split_at(idx);
        }
    }
    (word, "")
}

/// Greedy word wrap; words longer than a line are split.
fn wrap(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut lines = Vec::new();

    for paragraph in text.split('\n') {
        let mut line = String::new();
        for word in paragraph.split_whitespace() {
            let mut word = word;
            while text_width(word) > max_chars {
                if !line.is_empty() {
                    lines.push(std::mem::take(&mut line));
                }
                let (head, rest) = split_word(word, max_chars);
                lines.push(head.to_string());
                word = rest;
            }
            if word.is_empty() {
                continue;
            }

            let needed = if line.is_empty() {
                text_width(word)
            } else {
                text_width(&line) + 1 + text_width(word)
            };
            if needed > max_chars && !line.is_empty() {
                lines.push(std::mem::take(&mut line));
            }
            if !line.is_empty() {
                line.push(' ');
            }
            line.push_str(word);
        }
        lines.push(line);
    }

    while lines.last().is_some_and(|l| l.is_empty()) {
        lines.pop();
    }
    lines
}

/// Code keeps its own line breaks and indentation.
fn wrap_code(text: &str, max_chars: usize) -> Vec<String> {
    text.lines()
        .flat_map(|line| {
            let chars: Vec<char> = line.chars().collect();
            if chars.is_empty() {
                return vec![String::new()];
            }
            chars
                .chunks(max_chars.max(1))
                .map(|c| c.iter().collect())
                .collect::<Vec<String>>()
        })
        .collect()
}

/// Place every line on a page, top to bottom.
fn layout(blocks: &[Block]) -> Vec<Vec<PlacedLine>> {
    let top = PAGE_HEIGHT_MM - MARGIN_MM;
    let mut pages: Vec<Vec<PlacedLine>> = vec![Vec::new()];
    let mut y = top;

    for block in blocks {
        let lines = match block.style {
            Style::Code => wrap_code(&block.text, block.style.max_chars()),
            _ => wrap(&block.text, block.style.max_chars()),
        };
        let height = block.style.line_height_mm();

        if matches!(block.style, Style::Heading(_)) && y < top {
            y -= height * 0.5;
        }

        for text in lines {
            if y - height < MARGIN_MM {
                pages.push(Vec::new());
                y = top;
            }
            y -= height;
            if let Some(page) = pages.last_mut() {
                page.push(PlacedLine {
                    style: block.style,
                    text,
                    y_mm: y,
                });
            }
        }

        y -= Style::Body.line_height_mm() * 0.6;
    }

    pages
}

/// Latin-1 stand-in for `c`, if the builtin fonts can show it.
fn latin1(c: char) -> Option<char> {
    match c {
        '\u{2018}' | '\u{2019}' => Some('\''),
        '\u{201C}' | '\u{201D}' => Some('"'),
        '\u{2013}' | '\u{2014}' | '\u{2022}' => Some('-'),
        c if (c as u32) < 0x20 => Some(' '),
        c if (c as u32) <= 0xFF => Some(c),
        _ => None,
    }
}

/// True when the builtin fonts can render every character of `text`.
pub fn fits_builtin_fonts(text: &str) -> bool {
    text.chars().all(|c| latin1(c).is_some())
}

/// Text as drawn: Latin-1 for the builtin fonts, anything for an embedded one.
fn printable(text: &str, embedded: bool) -> String {
    text.chars()
        .map(|c| {
            if c.is_control() {
                ' '
            } else if embedded {
                c
            } else {
                latin1(c).unwrap_or('?')
            }
        })
        .collect()
}

struct Fonts {
    regular: IndirectFontRef,
    bold: IndirectFontRef,
    mono: IndirectFontRef,
}

impl Fonts {
    fn for_style(&self, style: Style) -> &IndirectFontRef {
        match style {
            Style::Heading(_) => &self.bold,
            Style::Body => &self.regular,
            Style::Code => &self.mono,
        }
    }
}

/// Render `markdown` to an A4 PDF at `path`.
///
/// With `font` the TrueType file is embedded and used for every style;
/// otherwise the builtin Helvetica and Courier fonts are used.
pub fn render_markdown_pdf(
    title: &str,
    markdown: &str,
    path: &Path,
    font: Option<&Path>,
) -> Result<()> {
    let pages = layout(&blocks(markdown));
    debug!("Rendering {} PDF page(s) to {}", pages.len(), path.display());

    let (doc, first_page, first_layer) = PdfDocument::new(
        title,
        Mm(PAGE_WIDTH_MM),
        Mm(PAGE_HEIGHT_MM),
        "Layer 1",
    );

    let fonts = match font {
        Some(font_path) => {
            let bytes = std::fs::read(font_path)
                .with_context(|| format!("Failed to read PDF font {}", font_path.display()))?;
            let embedded = doc
                .add_external_font(bytes.as_slice())
                .map_err(|e| anyhow!("Failed to load PDF font {}: {:?}", font_path.display(), e))?;
            Fonts {
                regular: embedded.clone(),
                bold: embedded.clone(),
                mono: embedded,
            }
        }
        None => {
            let builtin = |builtin| {
                doc.add_builtin_font(builtin)
                    .map_err(|e| anyhow!("Failed to load PDF font: {:?}", e))
            };
            Fonts {
                regular: builtin(BuiltinFont::Helvetica)?,
                bold: builtin(BuiltinFont::HelveticaBold)?,
                mono: builtin(BuiltinFont::Courier)?,
            }
        }
    };

    for (index, lines) in pages.iter().enumerate() {
        let (page, layer) = if index == 0 {
            (first_page, first_layer)
        } else {
            doc.add_page(Mm(PAGE_WIDTH_MM), Mm(PAGE_HEIGHT_MM), "Layer 1")
        };
        let layer = doc.get_page(page).get_layer(layer);

        for line in lines {
            layer.use_text(
                printable(&line.text, font.is_some()),
                line.style.font_size(),
                Mm(MARGIN_MM),
                Mm(line.y_mm),
                fonts.for_style(line.style),
            );
        }
    }

    let file =
        File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    doc.save(&mut BufWriter::new(file))
        .map_err(|e| anyhow!("Failed to save PDF {}: {:?}", path.display(), e))?;

    Ok(())
}

/// Extract the text of a PDF file.
pub fn extract_text(path: &Path) -> Result<String> {
    pdf_extract::extract_text(path)
        .map_err(|e| anyhow!("Failed to extract text from {}: {:?}", path.display(), e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_blocks_styles() {
        let md = "# Title\n\nIntro with [a link](https://x.io).\n\n- one\n- two\n\n```\nlet x = 1;\n```\n";
        let blocks = blocks(md);

        assert_eq!(
            blocks,
            vec![
                Block {
                    style: Style::Heading(1),
                    text: "Title".to_string()
                },
                Block {
                    style: Style::Body,
                    text: "Intro with a link (https://x.io).".to_string()
                },
                Block {
                    style: Style::Body,
                    text: "- one".to_string()
                },
                Block {
                    style: Style::Body,
                    text: "- two".to_string()
                },
                Block {
                    style: Style::Code,
                    text: "let x = 1;".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_wrap_respects_width() {
        let lines = wrap("the quick brown fox jumps over the lazy dog", 10);
        assert_eq!(
            lines,
            vec!["the quick", "brown fox", "jumps over", "the lazy", "dog"]
        );
        assert!(lines.iter().all(|l| l.chars().count() <= 10));
    }

    #[test]
    fn test_wrap_splits_long_words() {
        assert_eq!(wrap("abcdefghij", 4), vec!["abcd", "efgh", "ij"]);
    }

    #[test]
    fn test_layout_breaks_pages() {
        let paragraph = Block {
            style: Style::Body,
            text: "word ".repeat(4000),
        };
        let pages = layout(&[paragraph]);
        assert!(pages.len() > 1);
        for page in &pages {
            assert!(page.iter().all(|l| l.y_mm >= MARGIN_MM));
        }
    }

    #[test]
    fn test_wrap_counts_wide_characters_double() {
        let lines = wrap("你好世界你好", 4);
        assert_eq!(lines, vec!["你好", "世界", "你好"]);
    }

    #[test]
    fn test_printable_replaces_unsupported() {
        assert_eq!(
            printable("\u{201C}hi\u{201D} \u{2014} \u{4F60}", false),
            "\"hi\" - ?"
        );
        assert_eq!(printable("你好\t世界", true), "你好 世界");
    }

    #[test]
    fn test_fits_builtin_fonts() {
        assert!(fits_builtin_fonts("Caf\u{E9} \u{201C}quoted\u{201D} \u{2014} ok"));
        assert!(!fits_builtin_fonts("你好世界"));
        assert!(!fits_builtin_fonts("Привет"));
    }

    #[test]
    fn test_render_with_missing_font_fails() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.pdf");
        let font = dir.path().join("missing.ttf");
        assert!(render_markdown_pdf("Test", "你好", &path, Some(&font)).is_err());
    }

    #[test]
    fn test_render_writes_pdf() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.pdf");
        render_markdown_pdf("Test", "# Heading\n\nBody text.", &path, None).unwrap();
        assert!(std::fs::read(&path).unwrap().starts_with(b"%PDF"));
    }
}
