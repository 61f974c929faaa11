//! Tolerant extraction of score records from judge replies.
//!
//! The judge is a generative model, so its output format is a request
//! rather than a guarantee. Parsing never fails: anything that cannot be
//! decoded becomes a zero-score fallback record.

use super::record::ScoreRecord;
use crate::error::{BenchError, Result};
use serde_json::{Map, Value};

/// Score fields that must be present for a reply to count as valid.
pub const REQUIRED_SCORE_FIELDS: [&str; 5] = [
    "source_accuracy_score",
    "content_accuracy_score",
    "completeness_score",
    "relevance_score",
    "final_score",
];

const MAX_SCORE: f64 = 10.0;
const RAW_PREVIEW_CHARS: usize = 500;

/// Parse a judge reply, falling back to a zero-score record on any failure.
pub fn parse_judge_response(response: &str) -> ScoreRecord {
    match try_parse_judge_response(response) {
        Ok(score) => score,
        Err(e) => {
            let preview: String = response.chars().take(RAW_PREVIEW_CHARS).collect();
            tracing::error!(error = %e, "Failed to parse judge response");
            tracing::error!(response = %preview, "Judge response preview");
            ScoreRecord::fallback(format!("Failed to parse judge response: {}", e))
        }
    }
}

/// Parse a judge reply, reporting why it could not be decoded.
pub fn try_parse_judge_response(response: &str) -> Result<ScoreRecord> {
    let payload = strip_line_comments(extract_payload(response));

    let object: Map<String, Value> = serde_json::from_str(&payload)
        .map_err(|e| BenchError::JudgeResponseMalformed(format!("invalid JSON: {}", e)))?;

    for field in REQUIRED_SCORE_FIELDS {
        if !object.contains_key(field) {
            return Err(BenchError::JudgeResponseMalformed(format!(
                "missing required field: {}",
                field
            )));
        }
    }

    Ok(ScoreRecord {
        source_accuracy_score: score_field(&object, "source_accuracy_score")?,
        content_accuracy_score: score_field(&object, "content_accuracy_score")?,
        completeness_score: score_field(&object, "completeness_score")?,
        relevance_score: score_field(&object, "relevance_score")?,
        final_score: score_field(&object, "final_score")?,
        source_accuracy_reasoning: text_field(&object, "source_accuracy_reasoning"),
        content_accuracy_reasoning: text_field(&object, "content_accuracy_reasoning"),
        completeness_reasoning: text_field(&object, "completeness_reasoning"),
        relevance_reasoning: text_field(&object, "relevance_reasoning"),
        overall_reasoning: text_field(&object, "overall_reasoning"),
    })
}

/// Locate the JSON candidate inside a free-form reply.
///
/// Order: first ```` ```json ```` fence, then the first generic fence, then
/// the outermost `{ ... }` span of the trimmed text, so prose before or after
/// an object is dropped.
fn extract_payload(response: &str) -> &str {
    if let Some(start) = response.find("```json") {
        let rest = &response[start + "```json".len()..];
        let end = rest.find("```").unwrap_or(rest.len());
        return rest[..end].trim();
    }

    if let Some(start) = response.find("```") {
        let rest = &response[start + "```".len()..];
        let end = rest.find("```").unwrap_or(rest.len());
        let block = &rest[..end];
        let block = match block.split_once('\n') {
            Some((tag, body)) if is_language_tag(tag) => body,
            _ => block,
        };
        return block.trim();
    }

    let trimmed = response.trim();
    match (trimmed.find('{'), trimmed.rfind('}')) {
        (Some(start), Some(end)) if end > start => &trimmed[start..=end],
        _ => trimmed,
    }
}

fn is_language_tag(line: &str) -> bool {
    let tag = line.trim();
    !tag.is_empty() && tag.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Remove `//` comments that sit outside string literals.
fn strip_line_comments(payload: &str) -> String {
    let mut out = String::with_capacity(payload.len());
    let mut chars = payload.chars().peekable();
    let mut in_string = false;
    let mut escaped = false;

    while let Some(c) = chars.next() {
        if in_string {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }

        match c {
            '"' => {
                in_string = true;
                out.push(c);
            }
            '/' if chars.peek() == Some(&'/') => {
                // skip to end of line, keep the newline
                for next in chars.by_ref() {
                    if next == '\n' {
                        out.push('\n');
                        break;
                    }
                }
            }
            _ => out.push(c),
        }
    }

    out
}

fn score_field(object: &Map<String, Value>, field: &str) -> Result<f64> {
    let value = match object.get(field) {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };

    match value {
        Some(v) if v.is_finite() => Ok(v.clamp(0.0, MAX_SCORE)),
        _ => Err(BenchError::JudgeResponseMalformed(format!(
            "field {} is not a number",
            field
        ))),
    }
}

fn text_field(object: &Map<String, Value>, field: &str) -> String {
    match object.get(field) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}
