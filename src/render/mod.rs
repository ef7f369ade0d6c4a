//! Document generation for the workers' artifacts.
//!
//! Builds the job-listing HTML page, the thinking Q&A markdown, and the
//! packed repository document from their data.

use crate::models::{JobListing, QaPair};
use crate::scanner::ScannedFile;

const JOBS_STYLE: &str = r#"        body { font-family: Arial, sans-serif; line-height: 1.6; margin: 20px; }
        .job { border: 1px solid #ddd; margin: 10px 0; padding: 15px; border-radius: 5px; }
        .job-title { font-size: 18px; font-weight: bold; color: #333; }
        .company { color: #666; font-weight: bold; }
        .location { color: #888; }
        .remote-badge { background: #28a745; color: white; padding: 2px 6px; border-radius: 3px; font-size: 12px; }
        .job-type { background: #007bff; color: white; padding: 2px 6px; border-radius: 3px; font-size: 12px; }
        .salary { color: #dc3545; font-weight: bold; }
        .description { margin: 10px 0; }
        .job-url { margin-top: 10px; }
        .job-url a { color: #007bff; text-decoration: none; }
        .job-url a:hover { text-decoration: underline; }
"#;

/// Render job listings as a standalone HTML page.
pub fn generate_jobs_html(jobs: &[JobListing]) -> String {
    let mut html = String::new();

    html.push_str("<!DOCTYPE html>\n<html>\n<head>\n");
    html.push_str("    <meta charset=\"UTF-8\">\n");
    html.push_str("    <title>Job Listings</title>\n");
    html.push_str("    <style>\n");
    html.push_str(JOBS_STYLE);
    html.push_str("    </style>\n</head>\n<body>\n");
    html.push_str(&format!(
        "    <h1>Job Listings (Total: {})</h1>\n",
        jobs.len()
    ));

    if jobs.is_empty() {
        html.push_str("    <p>No jobs found.</p>\n");
    } else {
        for job in jobs {
            html.push_str(&generate_job_card(job));
        }
    }

    html.push_str("</body>\n</html>\n");
    html
}

fn generate_job_card(job: &JobListing) -> String {
    let mut card = String::new();

    card.push_str("    <div class=\"job\">\n");
    card.push_str(&format!(
        "        <div class=\"job-title\">{}</div>\n",
        escape_html(&job.name)
    ));
    card.push_str(&format!(
        "        <div class=\"company\">{}</div>\n",
        escape_html(&job.company)
    ));

    card.push_str("        <div style=\"margin: 5px 0;\">\n");
    if !job.location.is_empty() {
        card.push_str(&format!(
            "            <span class=\"location\">📍 {}</span>\n",
            escape_html(&job.location)
        ));
    }
    if job.remote {
        card.push_str("            <span class=\"remote-badge\">Remote</span>\n");
    }
    if !job.job_type.is_empty() {
        card.push_str(&format!(
            "            <span class=\"job-type\">{}</span>\n",
            escape_html(&job.job_type)
        ));
    }
    card.push_str("        </div>\n");

    if !job.salary.is_empty() {
        card.push_str(&format!(
            "        <div class=\"salary\">💰 {}</div>\n",
            escape_html(&job.salary)
        ));
    }
    if !job.description.is_empty() {
        card.push_str(&format!(
            "        <div class=\"description\">{}</div>\n",
            escape_html(&job.description)
        ));
    }
    if !job.url.is_empty() {
        card.push_str(&format!(
            "        <div class=\"job-url\">\n            <a href=\"{}\" target=\"_blank\">View Job Posting</a>\n        </div>\n",
            escape_html(&job.url)
        ));
    }

    card.push_str("    </div>\n");
    card
}

pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            c => escaped.push(c),
        }
    }
    escaped
}

/// Render the thinker's rounds as markdown.
pub fn generate_thinking_markdown(mode: &str, link: &str, pairs: &[QaPair]) -> String {
    let body = pairs
        .iter()
        .map(|pair| {
            format!(
                "## Question:\n\n {}\n\n## Answer: \n\n{}",
                pair.question, pair.answer
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!("# Thinking(Mode: {}) on {}\n\n{}", mode, link, body)
}

/// Pack a repository into one markdown document: a tree, then every file.
pub fn generate_packed_repo(name: &str, files: &[ScannedFile]) -> String {
    let mut output = String::new();

    output.push_str(&format!("# Repository Structure\n\n```\n{}/\n", name));
    output.push_str(&generate_tree(files));
    output.push_str("```\n\n");

    output.push_str("# Repository Files\n\n");
    for file in files {
        output.push_str(&format!("## File: {}\n\n", file.path));
        let fence = fence_for(&file.content);
        output.push_str(&format!("{}{}\n", fence, file.language_hint()));
        output.push_str(file.content.trim_end_matches('\n'));
        output.push_str(&format!("\n{}\n\n", fence));
    }

    output
}

/// Indented tree of the file paths, directories first appearing once.
fn generate_tree(files: &[ScannedFile]) -> String {
    let mut paths: Vec<&str> = files.iter().map(|f| f.path.as_str()).collect();
    paths.sort_unstable();

    let mut tree = String::new();
    let mut printed_dirs: Vec<String> = Vec::new();

    for path in paths {
        let parts: Vec<&str> = path.split('/').collect();
        for depth in 0..parts.len().saturating_sub(1) {
            let dir = parts[..=depth].join("/");
            if !printed_dirs.contains(&dir) {
                tree.push_str(&format!("{}{}/\n", "  ".repeat(depth + 1), parts[depth]));
                printed_dirs.push(dir);
            }
        }
        if let Some(file_name) = parts.last() {
            tree.push_str(&format!("{}{}\n", "  ".repeat(parts.len()), file_name));
        }
    }

    tree
}

/// A backtick fence longer than any run inside `content`.
fn fence_for(content: &str) -> String {
    let mut longest = 0;
    let mut run = 0;
    for c in content.chars() {
        if c == '`' {
            run += 1;
            longest = longest.max(run);
        } else {
            run = 0;
        }
    }
    "`".repeat(longest.max(2) + 1)
}
