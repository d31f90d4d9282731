//! Response parser
//!
//! Converts one task's free-text reply into an [`AgentRecord`]. This is the
//! I/O boundary against a text generator with no schema guarantee, so the
//! parser never fails: unrecognized structure degrades to defaults, and a
//! missing section just leaves its field empty.

use once_cell::sync::Lazy;
use regex::Regex;

use super::{AgentRecord, MAX_KEY_FINDINGS, MAX_RECOMMENDATIONS};

/// Confidence assumed when the reply carries no usable confidence section
pub const DEFAULT_CONFIDENCE: u8 = 75;

/// Section labels the parser recognizes, longest-match first so
/// "key findings" wins over "findings".
const SECTION_LABELS: &[(&str, Section)] = &[
    ("key findings", Section::Findings),
    ("sandbox output", Section::Sandbox),
    ("recommendations", Section::Recommendations),
    ("recommended actions", Section::Recommendations),
    ("confidence", Section::Confidence),
    ("findings", Section::Findings),
    ("code", Section::Code),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Confidence,
    Findings,
    Recommendations,
    Sandbox,
    Code,
}

static FIRST_INT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d{1,3}").unwrap());
static LEADING_BULLET: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(?:[-*•]+|\d{1,2}[.)])\s*").unwrap());

/// Detect whether a line opens a labeled section, returning the section and
/// any content that follows the label on the same line.
fn match_section(line: &str) -> Option<(Section, String)> {
    let trimmed = line.trim();
    let lowered = trimmed.to_lowercase();
    for (label, section) in SECTION_LABELS {
        if let Some(rest) = lowered.strip_prefix(label) {
            // The label must stand alone, end the line, or be followed by a
            // separator; "codec error" must not open a code section.
            let is_boundary = rest.is_empty()
                || rest.starts_with(':')
                || rest.starts_with(' ')
                || rest.starts_with('\t');
            if is_boundary {
                let inline = trimmed
                    .get(label.len()..)
                    .unwrap_or("")
                    .trim_start_matches([':', ' ', '\t'])
                    .to_string();
                return Some((*section, inline));
            }
        }
    }
    None
}

/// Strip bullet markers and markdown emphasis from one list line
fn clean_list_line(line: &str) -> String {
    let without_bullet = LEADING_BULLET.replace(line.trim(), "");
    without_bullet
        .replace("**", "")
        .replace("__", "")
        .trim_matches(|c| c == '*' || c == '_' || c == '`')
        .trim()
        .to_string()
}

fn parse_list(text: &str, cap: usize) -> Vec<String> {
    text.lines()
        .map(clean_list_line)
        .filter(|line| !line.is_empty())
        .take(cap)
        .collect()
}

fn parse_confidence(text: &str) -> u8 {
    FIRST_INT
        .find(text)
        .and_then(|m| m.as_str().parse::<u8>().ok())
        .map(|v| v.min(100))
        .unwrap_or(DEFAULT_CONFIDENCE)
}

/// Pull the body out of a fenced code block if one is present
fn extract_code(text: &str) -> String {
    let trimmed = text.trim();
    if let Some(start) = trimmed.find("```") {
        let after_fence = &trimmed[start + 3..];
        // Skip an optional language tag on the fence line.
        let body_start = after_fence.find('\n').map(|i| i + 1).unwrap_or(0);
        let body = &after_fence[body_start..];
        if let Some(end) = body.find("```") {
            return body[..end].trim_end().to_string();
        }
        return body.trim_end().to_string();
    }
    trimmed.to_string()
}

/// Parse one task's reply into a record. Total: every input produces a
/// best-effort `AgentRecord`, never an error.
pub fn parse_agent_response(agent: &str, raw: &str) -> AgentRecord {
    let mut sections: Vec<(Section, String)> = Vec::new();
    let mut current: Option<(Section, String)> = None;

    for line in raw.lines() {
        if let Some((section, inline)) = match_section(line) {
            if let Some(done) = current.take() {
                sections.push(done);
            }
            current = Some((section, inline));
        } else if let Some((_, buffer)) = current.as_mut() {
            buffer.push('\n');
            buffer.push_str(line);
        }
    }
    if let Some(done) = current.take() {
        sections.push(done);
    }

    let mut record = AgentRecord::new(agent, raw);
    let mut confidence_seen = false;

    for (section, text) in sections {
        match section {
            Section::Confidence => {
                if !confidence_seen {
                    record.confidence = parse_confidence(&text);
                    confidence_seen = true;
                }
            }
            Section::Findings => {
                if record.key_findings.is_empty() {
                    record.key_findings = parse_list(&text, MAX_KEY_FINDINGS);
                }
            }
            Section::Recommendations => {
                if record.recommendations.is_empty() {
                    record.recommendations = parse_list(&text, MAX_RECOMMENDATIONS);
                }
            }
            Section::Sandbox => {
                if record.sandbox_output.is_none() && !text.trim().is_empty() {
                    record.sandbox_output = Some(text.trim().to_string());
                }
            }
            Section::Code => {
                if record.code_block.is_none() && !text.trim().is_empty() {
                    record.code_block = Some(extract_code(&text));
                }
            }
        }
    }

    if !confidence_seen {
        record.confidence = DEFAULT_CONFIDENCE;
        tracing::debug!(agent, "reply carried no confidence section, defaulting");
    }
    record
}

/// Truncate file-sized content for prompt safety (keep beginning + end)
pub(crate) fn truncate_content(content: &str, max_chars: usize) -> String {
    if content.chars().count() <= max_chars {
        content.to_string()
    } else {
        let head: String = content.chars().take(max_chars / 2).collect();
        let tail_rev: String = content.chars().rev().take(max_chars / 2).collect();
        let tail: String = tail_rev.chars().rev().collect();
        format!("{}\n\n... [truncated] ...\n\n{}", head, tail)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL_REPLY: &str = r#"Initial assessment of the host activity.

CONFIDENCE: 87

KEY FINDINGS:
- **Credential access** attempt via LSASS
- Lateral movement to 10.0.0.12
* Persistence via scheduled task
- Outbound beacon on port 4444
- Defender disabled by operator
- A sixth finding that should be dropped

RECOMMENDATIONS:
1. Isolate the host
2. Reset affected credentials
3) Block the beacon destination
- Review scheduled tasks
- A fifth recommendation that should be dropped

SANDBOX OUTPUT:
detonation produced no additional indicators
"#;

    #[test]
    fn test_parse_full_reply() {
        let record = parse_agent_response("pattern-recognition", FULL_REPLY);
        assert_eq!(record.confidence, 87);
        assert_eq!(record.key_findings.len(), 5);
        assert_eq!(record.key_findings[0], "Credential access attempt via LSASS");
        assert_eq!(record.recommendations.len(), 4);
        assert_eq!(record.recommendations[0], "Isolate the host");
        assert_eq!(
            record.sandbox_output.as_deref(),
            Some("detonation produced no additional indicators")
        );
        assert_eq!(record.raw_text, FULL_REPLY);
    }

    #[test]
    fn test_sections_in_any_order() {
        let reply = "RECOMMENDATIONS:\n- act\n\nConfidence: 60\n\nFindings:\n- saw a thing\n";
        let record = parse_agent_response("threat-intel", reply);
        assert_eq!(record.confidence, 60);
        assert_eq!(record.key_findings, vec!["saw a thing".to_string()]);
        assert_eq!(record.recommendations, vec!["act".to_string()]);
    }

    #[test]
    fn test_labels_are_case_insensitive() {
        let reply = "confidence: 42\nkey findings:\n- lower case works\n";
        let record = parse_agent_response("a", reply);
        assert_eq!(record.confidence, 42);
        assert_eq!(record.key_findings, vec!["lower case works".to_string()]);
    }

    #[test]
    fn test_missing_sections_use_defaults() {
        let record = parse_agent_response("entity-mapping", "Nothing structured at all here.");
        assert_eq!(record.confidence, DEFAULT_CONFIDENCE);
        assert!(record.key_findings.is_empty());
        assert!(record.recommendations.is_empty());
        assert!(record.sandbox_output.is_none());
        assert!(record.code_block.is_none());
    }

    #[test]
    fn test_empty_input_never_panics() {
        let record = parse_agent_response("x", "");
        assert_eq!(record.confidence, DEFAULT_CONFIDENCE);
        assert!(record.key_findings.is_empty());
    }

    #[test]
    fn test_confidence_without_integer_defaults() {
        let record = parse_agent_response("x", "CONFIDENCE: fairly high\n");
        assert_eq!(record.confidence, DEFAULT_CONFIDENCE);
    }

    #[test]
    fn test_confidence_clamped_to_100() {
        let record = parse_agent_response("x", "CONFIDENCE: 250\n");
        assert!(record.confidence <= 100);
    }

    #[test]
    fn test_inline_confidence_on_label_line() {
        let record = parse_agent_response("x", "Confidence level: 73 based on evidence\n");
        assert_eq!(record.confidence, 73);
    }

    #[test]
    fn test_code_section_strips_fences() {
        let reply = "CODE:\n```python\nprint('ioc')\n```\n";
        let record = parse_agent_response("x", reply);
        assert_eq!(record.code_block.as_deref(), Some("print('ioc')"));
    }

    #[test]
    fn test_codec_word_does_not_open_code_section() {
        let record = parse_agent_response("x", "codec error in stream\nCONFIDENCE: 55\n");
        assert!(record.code_block.is_none());
        assert_eq!(record.confidence, 55);
    }

    #[test]
    fn test_emphasis_markers_stripped() {
        let reply = "KEY FINDINGS:\n- **bold claim**\n- __underlined claim__\n- `inline code`\n";
        let record = parse_agent_response("x", reply);
        assert_eq!(
            record.key_findings,
            vec![
                "bold claim".to_string(),
                "underlined claim".to_string(),
                "inline code".to_string()
            ]
        );
    }

    #[test]
    fn test_truncate_content_marks_removed_middle() {
        let content = "line\n".repeat(5000);
        let truncated = truncate_content(&content, 100);
        assert!(truncated.contains("[truncated]"));
        assert!(truncated.len() < content.len());
    }

    #[test]
    fn test_truncate_content_short_passthrough() {
        assert_eq!(truncate_content("short", 100), "short");
    }
}
