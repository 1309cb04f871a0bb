//! Prompt builder: legislative assistant instructions + numbered context block.

use vector_store::SearchHit;

/// Instructions placed before the retrieved excerpts.
pub const INSTRUCTIONS: &str = "You are an expert legislative AI assistant. \
Use the following context excerpts to answer the query as accurately as possible.";

const ELLIPSIS: &str = "…";

/// Builds the final prompt.
///
/// Layout:
/// ```text
/// <instructions>
/// [1] <text of best hit>
/// [2] <text of second hit>
/// Question: <query>
/// Answer:
/// ```
///
/// The context block holds at most `max_context_chars` characters, hits in
/// rank order. The hit that crosses the budget is cut on a char boundary and
/// marked with `…`; later hits are dropped. Also returns how many leading
/// hits made it into the prompt, the cut one included.
///
/// # Example
/// ```
/// use rag_pipeline::prompt::build_prompt;
/// let (prompt, rendered) = build_prompt("Who funds the program?", &[], 2000);
/// assert!(prompt.ends_with("Question: Who funds the program?\nAnswer:"));
/// assert_eq!(rendered, 0);
/// ```
pub fn build_prompt(query: &str, hits: &[SearchHit], max_context_chars: usize) -> (String, usize) {
    let mut out = String::with_capacity(INSTRUCTIONS.len() + query.len() + 32);
    out.push_str(INSTRUCTIONS);
    out.push('\n');
    let (block, rendered) = context_block(hits, max_context_chars);
    out.push_str(&block);
    out.push_str("Question: ");
    out.push_str(query.trim());
    out.push_str("\nAnswer:");
    (out, rendered)
}

/// Numbered excerpts, one per line, within `max_chars` characters, and the
/// number of hits rendered.
pub fn context_block(hits: &[SearchHit], max_chars: usize) -> (String, usize) {
    let mut out = String::new();
    let mut budget = max_chars;
    let mut rendered = 0;

    for (i, h) in hits.iter().enumerate() {
        let header = format!("[{}] ", i + 1);
        let header_len = header.chars().count();
        // header plus at least "…\n"
        if header_len + 2 > budget {
            break;
        }
        out.push_str(&header);
        budget -= header_len;
        rendered += 1;

        let text = h.text.trim();
        let text_len = text.chars().count();
        // room for the trailing newline
        let take = budget.saturating_sub(1);
        if text_len > take {
            out.push_str(take_chars(text, take.saturating_sub(1)));
            out.push_str(ELLIPSIS);
            out.push('\n');
            break;
        }
        out.push_str(text);
        out.push('\n');
        budget -= text_len + 1;
    }

    (out, rendered)
}

fn take_chars(s: &str, n: usize) -> &str {
    match s.char_indices().nth(n) {
        Some((end, _)) => &s[..end],
        None => s,
    }
}
