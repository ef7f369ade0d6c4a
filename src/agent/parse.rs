//! Lenient parsing of model output.

use serde::de::DeserializeOwned;
use serde_json::Value;

/// Strip a surrounding ``` fence: when the text opens and closes with one,
/// the first and last lines are dropped.
pub fn block_body(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.starts_with("```") && trimmed.ends_with("```") && trimmed.len() > 3 {
        let lines: Vec<&str> = trimmed.lines().collect();
        if lines.len() >= 2 {
            return lines[1..lines.len() - 1].join("\n");
        }
    }
    trimmed.to_string()
}

/// Parse `text` as `T`, first as-is, then from the first embedded JSON
/// value that has the right shape.
pub fn parse_lenient<T: DeserializeOwned>(text: &str) -> Option<T> {
    let body = block_body(text);
    if let Ok(value) = serde_json::from_str::<T>(&body) {
        return Some(value);
    }

    let found = json_values(&body).find_map(|value| serde_json::from_value(value).ok());
    found
}

/// Every complete JSON value starting at a `{` or `[`, in order.
fn json_values(text: &str) -> impl Iterator<Item = Value> + '_ {
    text.char_indices()
        .filter(|(_, c)| *c == '{' || *c == '[')
        .filter_map(move |(start, _)| {
            serde_json::Deserializer::from_str(&text[start..])
                .into_iter::<Value>()
                .next()?
                .ok()
        })
}
