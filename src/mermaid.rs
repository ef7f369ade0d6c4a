//! Mermaid mindmap cleanup and mermaid.ink links.

use crate::agent::block_body;
use anyhow::{bail, Context, Result};
use base64::engine::general_purpose::{STANDARD, URL_SAFE};
use base64::Engine;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use regex::{Captures, Regex};
use serde_json::json;
use std::io::Write;
use std::sync::OnceLock;

const PAKO_PREFIX: &str = "http://mermaid.ink/img/pako:";

fn root_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(\(\([^()]*?)\s+\([^()]*?\)(.*?\)\))").expect("valid root pattern")
    })
}

fn group_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"([^\s(])[ \t]*\([^()]*\)([ \t]*)([:\w])?").expect("valid group pattern")
    })
}

/// Repair the parenthesised text models like to put in mindmap labels.
///
/// On the root line a nested abbreviation is dropped. Elsewhere, a group
/// glued to a label and followed by more text (or a `:`) is removed; groups
/// closing a line and node shapes are left alone.
pub fn clean_mindmap(text: &str) -> String {
    block_body(text)
        .split('\n')
        .map(|line| {
            if line.contains("root((") {
                root_pattern().replace_all(line, "${1}${2}").into_owned()
            } else {
                group_pattern()
                    .replace_all(line, |caps: &Captures| strip_group(caps))
                    .into_owned()
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn strip_group(caps: &Captures) -> String {
    let prev = &caps[1];
    let gap = &caps[2];
    match caps.get(3).map(|m| m.as_str()) {
        Some(":") => format!("{}:", prev),
        Some(next) => format!("{} {}", prev, next),
        None if !gap.is_empty() => format!("{}{}", prev, gap),
        None => caps[0].to_string(),
    }
}

/// mermaid.ink image link for a diagram, in the mermaid live editor's pako format.
pub fn pako_link(code: &str) -> Result<String> {
    let graph = json!({
        "code": code,
        "mermaid": { "theme": "default" },
    });
    let bytes = serde_json::to_vec(&graph).context("Failed to serialise diagram")?;

    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::new(9));
    encoder
        .write_all(&bytes)
        .context("Failed to compress diagram")?;
    let deflated = encoder.finish().context("Failed to compress diagram")?;

    Ok(format!("{}{}", PAKO_PREFIX, URL_SAFE.encode(deflated)))
}

/// Download a rendered image.
pub async fn fetch_image(client: &reqwest::Client, link: &str) -> Result<Vec<u8>> {
    let response = client
        .get(link)
        .send()
        .await
        .with_context(|| format!("Failed to download {}", link))?;

    let status = response.status();
    if !status.is_success() {
        bail!("Image download failed with HTTP {}", status);
    }

    let bytes = response
        .bytes()
        .await
        .context("Failed to read image body")?;
    Ok(bytes.to_vec())
}

/// Inline PNG bytes as a data URL.
pub fn png_data_url(bytes: &[u8]) -> String {
    format!("data:image/png;base64,{}", STANDARD.encode(bytes))
}
