//! Recovers a JSON value from model output that was asked to be pure JSON but
//! may arrive wrapped in prose, markdown fences, or alongside other fragments.
//!
//! Strategies run in a fixed order and stop at the first value that parses:
//! the whole text, then each fenced block, then each balanced bracket span.

use serde_json::Value;
use std::fmt;
use tracing::{debug, info, warn};

const FENCE: &str = "```";

/// Which strategy produced the recovered value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryStrategy {
    Direct,
    FencedBlock,
    BalancedScan,
}

impl fmt::Display for RecoveryStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Direct => "direct",
            Self::FencedBlock => "fenced-block",
            Self::BalancedScan => "balanced-scan",
        })
    }
}

/// Best-effort JSON recovery. `None` means nothing usable was found.
pub fn recover(text: &str) -> Option<Value> {
    recover_with_strategy(text).map(|(_, value)| value)
}

pub fn recover_with_strategy(text: &str) -> Option<(RecoveryStrategy, Value)> {
    let text = text.trim();
    if text.is_empty() {
        warn!("Model response is empty");
        return None;
    }

    let recovered = try_parse(text)
        .map(|v| (RecoveryStrategy::Direct, v))
        .or_else(|| parse_fenced(text).map(|v| (RecoveryStrategy::FencedBlock, v)))
        .or_else(|| parse_balanced(text).map(|v| (RecoveryStrategy::BalancedScan, v)));

    match &recovered {
        Some((strategy, _)) => info!(strategy = %strategy, "Recovered JSON from model response"),
        None => warn!(chars = text.len(), "Could not locate valid JSON in model response"),
    }
    recovered
}

fn try_parse(s: &str) -> Option<Value> {
    serde_json::from_str(s).ok()
}

fn parse_fenced(text: &str) -> Option<Value> {
    fenced_blocks(text).enumerate().find_map(|(idx, block)| {
        let parsed = try_parse(block);
        debug!(idx, ok = parsed.is_some(), "Tried fenced block");
        parsed
    })
}

fn parse_balanced(text: &str) -> Option<Value> {
    BalancedSpans::new(text)
        .enumerate()
        .find_map(|(idx, candidate)| {
            let parsed = try_parse(candidate);
            debug!(
                idx,
                ok = parsed.is_some(),
                len = candidate.len(),
                "Tried balanced candidate"
            );
            parsed
        })
}

/// Interiors of paired triple-backtick fences, left to right, with an
/// optional language tag line removed.
pub fn fenced_blocks(text: &str) -> impl Iterator<Item = &str> {
    let mut rest = text;
    std::iter::from_fn(move || {
        let start = rest.find(FENCE)?;
        let after_open = &rest[start + FENCE.len()..];
        let end = after_open.find(FENCE)?;
        let inner = &after_open[..end];
        rest = &after_open[end + FENCE.len()..];
        Some(strip_language_tag(inner).trim())
    })
}

fn strip_language_tag(inner: &str) -> &str {
    match inner.split_once('\n') {
        Some((first, body)) if is_language_tag(first) => body,
        _ => inner,
    }
}

fn is_language_tag(line: &str) -> bool {
    let tag = line.trim();
    !tag.is_empty()
        && tag
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '+' | '.'))
}

/// Iterator over bracket-balanced spans (`{...}` or `[...]`) in discovery
/// order. Quoted strings are opaque, so brackets inside them never count.
///
/// After a complete span the scan continues past its closing bracket. A start
/// that never balances, or closes with the wrong bracket, is dropped and the
/// scan resumes one byte after that opening bracket.
pub struct BalancedSpans<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> BalancedSpans<'a> {
    pub fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }
}

impl<'a> Iterator for BalancedSpans<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        let bytes = self.src.as_bytes();
        while self.pos < bytes.len() {
            let start = self.pos;
            if !matches!(bytes[start], b'{' | b'[') {
                self.pos += 1;
                continue;
            }
            match closing_index(bytes, start) {
                Some(end) => {
                    self.pos = end + 1;
                    // Both ends are ASCII brackets, so these are char boundaries.
                    return Some(&self.src[start..=end]);
                }
                None => self.pos = start + 1,
            }
        }
        None
    }
}

/// Index of the bracket that closes the one at `start`, if any.
fn closing_index(bytes: &[u8], start: usize) -> Option<usize> {
    let mut stack = vec![bytes[start]];
    let mut in_string = false;
    let mut escaped = false;

    for (j, &b) in bytes.iter().enumerate().skip(start + 1) {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }

        match b {
            b'"' => in_string = true,
            b'{' | b'[' => stack.push(b),
            b'}' | b']' => {
                let open = stack.pop()?;
                if !matches!((open, b), (b'{', b'}') | (b'[', b']')) {
                    return None;
                }
                if stack.is_empty() {
                    return Some(j);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn strategy(text: &str) -> Option<RecoveryStrategy> {
        recover_with_strategy(text).map(|(s, _)| s)
    }

    #[test]
    fn pure_json_parses_directly() {
        let text = r#"{"employees": [{"client_name": "Jane", "total_hours": 40}]}"#;
        let expected: Value = serde_json::from_str(text).unwrap();
        assert_eq!(recover(text), Some(expected));
        assert_eq!(strategy(text), Some(RecoveryStrategy::Direct));
    }

    #[test]
    fn surrounding_whitespace_is_ignored() {
        assert_eq!(recover("\n\n  [1, 2, 3]  \n"), Some(json!([1, 2, 3])));
    }

    #[test]
    fn direct_parse_wins_even_with_fence_inside_string() {
        let text = r#"{"note": "```json {\"x\": 1}```", "employees": []}"#;
        let (s, v) = recover_with_strategy(text).unwrap();
        assert_eq!(s, RecoveryStrategy::Direct);
        assert_eq!(v["employees"], json!([]));
    }

    #[test]
    fn fenced_block_with_language_tag() {
        let inner = r#"{"employees": [{"client_name": "Acme", "total_hours": 10}]}"#;
        let text = format!("Here is the data you asked for:\n```json\n{inner}\n```\nLet me know!");
        let expected: Value = serde_json::from_str(inner).unwrap();
        assert_eq!(recover(&text), Some(expected));
        assert_eq!(strategy(&text), Some(RecoveryStrategy::FencedBlock));
    }

    #[test]
    fn fenced_block_without_tag() {
        let text = "Result:\n```\n{\"employees\": []}\n```";
        assert_eq!(recover(text), Some(json!({"employees": []})));
    }

    #[test]
    fn first_parseable_fence_wins() {
        let text = "```text\nnot json at all\n```\nthen\n```JSON\n{\"a\": 1}\n```\n```json\n{\"a\": 2}\n```";
        assert_eq!(recover(text), Some(json!({"a": 1})));
    }

    #[test]
    fn unpaired_fence_falls_back_to_scan() {
        let text = "```json\n{\"employees\": []}";
        assert_eq!(recover(text), Some(json!({"employees": []})));
        assert_eq!(strategy(text), Some(RecoveryStrategy::BalancedScan));
    }

    #[test]
    fn fenced_blocks_iterates_pairs() {
        let blocks: Vec<&str> = fenced_blocks("a ```js\nx\n``` b ```y``` c ```").collect();
        assert_eq!(blocks, ["x", "y"]);
    }

    #[test]
    fn prose_around_object() {
        let text = r#"Sure! The timesheet is {"employees": [{"total_hours": 8}]} as requested."#;
        assert_eq!(recover(text), Some(json!({"employees": [{"total_hours": 8}]})));
        assert_eq!(strategy(text), Some(RecoveryStrategy::BalancedScan));
    }

    #[test]
    fn bracket_inside_string_is_not_structural() {
        let text = r#"Output: {"note": "value [bracket] inside", "employees": [{"client_name": "Jane", "total_hours": 8}]} end"#;
        let v = recover(text).unwrap();
        assert_eq!(v["note"], "value [bracket] inside");
        assert_eq!(v["employees"][0]["client_name"], "Jane");
    }

    #[test]
    fn closing_brace_inside_string_is_not_structural() {
        let text = r#"Result -> {"memo": "closing } and ] here", "total_hours": 3} <- done"#;
        let v = recover(text).unwrap();
        assert_eq!(v["memo"], "closing } and ] here");
        assert_eq!(v["total_hours"], 3);
    }

    #[test]
    fn escaped_quotes_and_backslashes_in_strings() {
        let text = r#"x {"q": "she said \"}\" loudly", "path": "C:\\", "total_hours": 1} y"#;
        let v = recover(text).unwrap();
        assert_eq!(v["q"], "she said \"}\" loudly");
        assert_eq!(v["path"], "C:\\");
        assert_eq!(v["total_hours"], 1);
    }

    #[test]
    fn invalid_candidate_is_skipped_for_later_valid_one() {
        let text = r#"Template: {name: hours} Actual: {"employees": []}"#;
        assert_eq!(recover(text), Some(json!({"employees": []})));
    }

    #[test]
    fn scan_continues_past_completed_candidate() {
        let spans: Vec<&str> = BalancedSpans::new("a {x} b [1, {y}] c {z").collect();
        assert_eq!(spans, ["{x}", "[1, {y}]"]);
    }

    #[test]
    fn mismatched_start_resumes_after_open_bracket() {
        let text = r#"noise {"a": [1, 2} then {"employees": []}"#;
        assert_eq!(recover(text), Some(json!({"employees": []})));
    }

    #[test]
    fn unterminated_outer_object_recovers_inner() {
        let text = r#"Output: {"employees": [{"total_hours": 8}"#;
        assert_eq!(recover(text), Some(json!({"total_hours": 8})));
    }

    #[test]
    fn unterminated_string_does_not_loop() {
        let spans: Vec<&str> = BalancedSpans::new(r#"{"open": "never closed ] } "#).collect();
        assert!(spans.is_empty());
    }

    #[test]
    fn multibyte_text_is_handled() {
        let text = "Résumé — heures: {\"client_name\": \"Zoë\", \"total_hours\": 7.5} ✓";
        let v = recover(text).unwrap();
        assert_eq!(v["client_name"], "Zoë");
    }

    #[test]
    fn no_json_returns_none() {
        assert_eq!(recover("I could not find any timesheet in this image."), None);
        assert_eq!(recover(""), None);
        assert_eq!(recover("   \n"), None);
        assert_eq!(recover("{ this is { not } json"), None);
    }
}
