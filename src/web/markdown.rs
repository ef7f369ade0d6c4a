//! HTML to markdown-ish text.

use scraper::{ElementRef, Html, Node, Selector};

/// Elements whose content never reaches the output.
const SKIPPED: &[&str] = &[
    "script", "style", "nav", "footer", "noscript", "head", "svg", "iframe", "form", "button",
];

/// Convert an HTML page into readable markdown.
pub fn html_to_markdown(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut out = String::new();

    let body = Selector::parse("body")
        .ok()
        .and_then(|selector| document.select(&selector).next());

    match body {
        Some(body) => render_children(body, &mut out),
        None => render_children(document.root_element(), &mut out),
    }

    normalize(&out)
}

fn render_children(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => push_text(out, text),
            Node::Element(_) => {
                if let Some(child) = ElementRef::wrap(child) {
                    render_element(child, out);
                }
            }
            _ => {}
        }
    }
}

fn render_element(element: ElementRef<'_>, out: &mut String) {
    let name = element.value().name();
    if SKIPPED.contains(&name) {
        return;
    }

    match name {
        "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
            let text = inline_text(element);
            if text.is_empty() {
                return;
            }
            let level = name[1..].parse::<usize>().unwrap_or(1);
            block(out);
            out.push_str(&"#".repeat(level));
            out.push(' ');
            out.push_str(&text);
            block(out);
        }
        "p" | "div" | "section" | "article" | "main" | "header" | "aside" | "blockquote"
        | "table" | "ul" | "ol" | "dl" | "figure" => {
            block(out);
            render_children(element, out);
            block(out);
        }
        "tr" | "dt" | "dd" => {
            newline(out);
            render_children(element, out);
            newline(out);
        }
        "li" => {
            newline(out);
            out.push_str("- ");
            render_children(element, out);
            newline(out);
        }
        "br" => newline(out),
        "hr" => {
            block(out);
            out.push_str("---");
            block(out);
        }
        "pre" => {
            let code: String = element.text().collect();
            block(out);
            out.push_str("```\n");
            out.push_str(code.trim_matches('\n'));
            out.push_str("\n```");
            block(out);
        }
        "code" => wrap_inline(out, "`", &inline_text(element)),
        "strong" | "b" => wrap_inline(out, "**", &inline_text(element)),
        "em" | "i" => wrap_inline(out, "*", &inline_text(element)),
        "a" => {
            let text = inline_text(element);
            if text.is_empty() {
                return;
            }
            separate(out);
            match element.value().attr("href") {
                Some(href) if href.starts_with("http://") || href.starts_with("https://") => {
                    out.push_str(&format!("[{}]({})", text, href));
                }
                _ => out.push_str(&text),
            }
        }
        "td" | "th" => {
            render_children(element, out);
            out.push(' ');
        }
        "img" => {}
        _ => render_children(element, out),
    }
}

fn inline_text(element: ElementRef<'_>) -> String {
    let text: String = element.text().collect();
    collapse(&text)
}

fn collapse(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn wrap_inline(out: &mut String, marker: &str, text: &str) {
    if text.is_empty() {
        return;
    }
    separate(out);
    out.push_str(marker);
    out.push_str(text);
    out.push_str(marker);
}

/// Keep inline pieces from gluing onto the previous word.
fn separate(out: &mut String) {
    if let Some(last) = out.chars().last() {
        if last.is_alphanumeric() || matches!(last, '.' | ',' | ';' | ':' | ')') {
            out.push(' ');
        }
    }
}

fn push_text(out: &mut String, text: &str) {
    let collapsed = collapse(text);
    let at_break = out.is_empty() || out.ends_with(char::is_whitespace);

    if collapsed.is_empty() {
        if !text.is_empty() && !at_break {
            out.push(' ');
        }
        return;
    }

    if text.starts_with(char::is_whitespace) && !at_break {
        out.push(' ');
    }
    out.push_str(&collapsed);
    if text.ends_with(char::is_whitespace) {
        out.push(' ');
    }
}

fn trim_trailing_spaces(out: &mut String) {
    let len = out.trim_end_matches([' ', '\t']).len();
    out.truncate(len);
}

fn newline(out: &mut String) {
    trim_trailing_spaces(out);
    if !out.is_empty() && !out.ends_with('\n') {
        out.push('\n');
    }
}

fn block(out: &mut String) {
    trim_trailing_spaces(out);
    if out.is_empty() {
        return;
    }
    while !out.ends_with("\n\n") {
        out.push('\n');
    }
}

/// Trim lines and squeeze runs of blank lines.
fn normalize(text: &str) -> String {
    let mut result = String::new();
    let mut blank = false;

    for line in text.lines() {
        let line = line.trim_end();
        if line.trim().is_empty() {
            blank = !result.is_empty();
            continue;
        }
        if blank {
            result.push('\n');
            blank = false;
        }
        result.push_str(line);
        result.push('\n');
    }

    result.trim_end().to_string()
}
