//! Rendering retrieved passages into prompt text.

use std::fmt::Write as _;

use crate::store::RetrievedPassage;

/// Notice appended to an ungrounded answer when retrieval found nothing
/// usable.
pub const NO_CONTEXT_NOTICE: &str =
    "No relevant documents were found; this answer is based on general knowledge.";

/// Notice appended to an ungrounded answer when the store failed.
pub const STORE_UNAVAILABLE_NOTICE: &str =
    "The document store is unavailable; this answer is based on general knowledge.";

/// Render passages as a numbered context block.
#[must_use]
pub fn format_context(passages: &[RetrievedPassage]) -> String {
    let mut out = String::new();
    for (i, p) in passages.iter().enumerate() {
        if i > 0 {
            out.push_str("\n\n");
        }
        let _ = write!(out, "[{}] (source: {})\n{}", i.saturating_add(1), p.source_id, p.content.trim());
    }
    out
}

/// Distinct source ids in first-seen order.
#[must_use]
pub fn distinct_sources(passages: &[RetrievedPassage]) -> Vec<&str> {
    let mut seen: Vec<&str> = Vec::new();
    for p in passages {
        if !seen.contains(&p.source_id.as_str()) {
            seen.push(&p.source_id);
        }
    }
    seen
}

/// Render the "Sources:" footer appended to grounded answers.
///
/// Returns `None` when there are no passages.
#[must_use]
pub fn format_sources(passages: &[RetrievedPassage]) -> Option<String> {
    let sources = distinct_sources(passages);
    if sources.is_empty() {
        return None;
    }
    let mut out = String::from("Sources:");
    for s in sources {
        let _ = write!(out, "\n- {s}");
    }
    Some(out)
}

/// Build the user turn for a grounded answer.
#[must_use]
pub fn build_grounded_prompt(query: &str, context: &str) -> String {
    format!(
        "Answer the question using the context below. If the context does not \
         contain the answer, say so.\n\n\
         Context:\n{context}\n\n\
         Question: {query}"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn passages() -> Vec<RetrievedPassage> {
        vec![
            RetrievedPassage::new("Leave is 15 days.\n", 0.2, "handbook.md"),
            RetrievedPassage::new("Carry-over is 5 days.", 0.4, "policy.md"),
            RetrievedPassage::new("Ask your manager.", 0.9, "handbook.md"),
        ]
    }

    #[test]
    fn test_format_context_numbered() {
        let ctx = format_context(&passages());
        assert!(ctx.starts_with("[1] (source: handbook.md)\nLeave is 15 days."));
        assert!(ctx.contains("\n\n[2] (source: policy.md)\n"));
        assert!(ctx.contains("[3] (source: handbook.md)"));
        assert!(format_context(&[]).is_empty());
    }

    #[test]
    fn test_sources_deduplicated_in_order() {
        assert_eq!(distinct_sources(&passages()), ["handbook.md", "policy.md"]);
        assert_eq!(
            format_sources(&passages()).unwrap(),
            "Sources:\n- handbook.md\n- policy.md"
        );
        assert!(format_sources(&[]).is_none());
    }

    #[test]
    fn test_grounded_prompt_contains_parts() {
        let prompt = build_grounded_prompt("How many days?", "[1] ...");
        assert!(prompt.contains("Context:\n[1] ..."));
        assert!(prompt.ends_with("Question: How many days?"));
    }
}
