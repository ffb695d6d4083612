//! Plan Graph Builder.
//!
//! Splits an intent into a short linear chain of steps. Pure and
//! deterministic: same inputs always produce the same graph, no clock or
//! randomness involved.

use crate::types::{PlanEdge, PlanGraph, PlanNode, RiskLevel, StepStatus};

const WORD_TOKENS: &[&str] = &["and then", "then", "after that", "next", "finally"];
const PUNCTUATION: &[char] = &['.', ';', '\n'];
const MAX_NODES: usize = 6;

/// Builds the linear plan graph for a task from its summary and raw intent
/// text. Falls back to the summary, then the intent, then a fixed title if
/// splitting produces nothing usable.
pub fn build_plan_graph(
    summary: &str,
    intent_text: &str,
    risk: RiskLevel,
    requires_approval: bool,
) -> PlanGraph {
    let mut titles = split_into_chunks(intent_text);
    titles.truncate(MAX_NODES);

    if titles.is_empty() {
        let fallback = [summary, intent_text]
            .into_iter()
            .map(str::trim)
            .find(|s| !s.is_empty())
            .unwrap_or("Execute task");
        titles.push(fallback.to_string());
    }

    let mut nodes = Vec::with_capacity(titles.len());
    let mut edges = Vec::with_capacity(titles.len().saturating_sub(1));

    for (i, title) in titles.into_iter().enumerate() {
        let seq = (i + 1) as u32;
        let id = format!("n{seq}");
        nodes.push(PlanNode {
            id: id.clone(),
            seq,
            title,
            kind: "action".to_string(),
            status: StepStatus::Planned,
            risk,
            requires_approval: i == 0 && requires_approval,
        });
        if i > 0 {
            edges.push(PlanEdge {
                from: format!("n{}", seq - 1),
                to: id,
                kind: "next".to_string(),
            });
        }
    }

    PlanGraph {
        version: 1,
        nodes,
        edges,
    }
}

/// Splits raw intent text on a small set of sequencing words and sentence
/// punctuation, then normalizes each resulting chunk. Chunks that normalize
/// to nothing are dropped.
fn split_into_chunks(intent_text: &str) -> Vec<String> {
    let chars: Vec<char> = intent_text.chars().collect();
    let spans = find_delimiter_spans(&chars);

    let mut chunks = Vec::new();
    let mut start = 0;
    for (span_start, span_end) in spans {
        chunks.push(chars[start..span_start].iter().collect::<String>());
        start = span_end;
    }
    chunks.push(chars[start..].iter().collect::<String>());

    chunks.into_iter().filter_map(|c| normalize_chunk(&c)).collect()
}

/// Returns half-open `[start, end)` character-index spans to cut out of the
/// text: punctuation marks and sequencing words matched on word boundaries.
fn find_delimiter_spans(chars: &[char]) -> Vec<(usize, usize)> {
    let lower: Vec<char> = chars.iter().map(|c| c.to_ascii_lowercase()).collect();
    let n = chars.len();
    let mut spans = Vec::new();
    let mut i = 0;

    'outer: while i < n {
        if PUNCTUATION.contains(&chars[i]) {
            spans.push((i, i + 1));
            i += 1;
            continue;
        }

        for token in WORD_TOKENS {
            let token_chars: Vec<char> = token.chars().collect();
            let len = token_chars.len();
            if i + len > n || lower[i..i + len] != token_chars[..] {
                continue;
            }
            let before_ok = i == 0 || !chars[i - 1].is_alphanumeric();
            let after_ok = i + len == n || !chars[i + len].is_alphanumeric();
            if before_ok && after_ok {
                spans.push((i, i + len));
                i += len;
                continue 'outer;
            }
        }

        i += 1;
    }

    spans
}

fn normalize_chunk(chunk: &str) -> Option<String> {
    let collapsed = chunk.split_whitespace().collect::<Vec<_>>().join(" ");
    let trimmed = collapsed.trim_matches(|c: char| c == ' ' || c == ',' || c == ':' || c == '-');
    if trimmed.is_empty() {
        return None;
    }
    Some(capitalize(trimmed))
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        None => String::new(),
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_sequencing_words_and_punctuation() {
        let graph = build_plan_graph(
            "book travel",
            "book a flight to Boston, then reserve a hotel. finally rent a car",
            RiskLevel::Low,
            false,
        );
        let titles: Vec<&str> = graph.nodes.iter().map(|n| n.title.as_str()).collect();
        assert_eq!(
            titles,
            vec!["Book a flight to Boston", "Reserve a hotel", "Rent a car"]
        );
        assert_eq!(graph.edges.len(), 2);
        assert_eq!(graph.edges[0].from, "n1");
        assert_eq!(graph.edges[0].to, "n2");
    }

    #[test]
    fn caps_at_six_nodes() {
        let intent = "a. b. c. d. e. f. g. h.";
        let graph = build_plan_graph("", intent, RiskLevel::Low, false);
        assert_eq!(graph.nodes.len(), 6);
        assert_eq!(graph.nodes[5].title, "F");
    }

    #[test]
    fn falls_back_to_summary_then_intent_then_fixed_title() {
        let graph = build_plan_graph("Do the thing", "   ", RiskLevel::Low, false);
        assert_eq!(graph.nodes[0].title, "Do the thing");

        let graph = build_plan_graph("", "just this", RiskLevel::Low, false);
        assert_eq!(graph.nodes[0].title, "Just this");

        let graph = build_plan_graph("", "", RiskLevel::Low, false);
        assert_eq!(graph.nodes[0].title, "Execute task");
    }

    #[test]
    fn word_token_requires_boundary() {
        // "next" inside "nextdoor" must not be treated as a delimiter.
        let graph = build_plan_graph("", "visit the nextdoor neighbor", RiskLevel::Low, false);
        assert_eq!(graph.nodes.len(), 1);
        assert_eq!(graph.nodes[0].title, "Visit the nextdoor neighbor");
    }

    #[test]
    fn only_the_first_node_carries_the_approval_flag() {
        let graph = build_plan_graph(
            "",
            "do a risky thing then clean up",
            RiskLevel::High,
            true,
        );
        assert!(graph.nodes.iter().all(|n| n.risk == RiskLevel::High));
        assert!(graph.nodes[0].requires_approval);
        assert!(graph.nodes[1..].iter().all(|n| !n.requires_approval));
    }

    #[test]
    fn edges_use_the_next_kind() {
        let graph = build_plan_graph("", "do a. then b", RiskLevel::Low, false);
        assert!(graph.edges.iter().all(|e| e.kind == "next"));
    }
}
