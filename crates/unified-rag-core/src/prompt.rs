//! Grounded prompt assembly.

use crate::models::RankedChunk;

const PREAMBLE: &str = "You are an internal engineering assistant. Use only the provided context.";
const CITATION_RULE: &str =
    "Cite sources as [#] at the end of each sentence you derive from a chunk, using the chunk's number.";

/// Render one chunk as an ordinal-tagged context block (`ordinal` is 1-based).
pub fn render_chunk(ordinal: usize, chunk: &RankedChunk) -> String {
    format!("[{}] {}\nSOURCE: {}", ordinal, chunk.text, chunk.source)
}

/// Build the generation prompt for `question` from retrieved `chunks`.
///
/// Chunks keep their retrieval order and are numbered from 1. An empty
/// chunk list still produces a complete prompt with an empty context.
///
/// # Example
///
/// ```rust
/// use unified_rag_core::models::RankedChunk;
/// use unified_rag_core::prompt::build_prompt;
///
/// let chunks = vec![RankedChunk {
///     text: "Restart the service".to_string(),
///     source: "confluence:123".to_string(),
///     score: 0.9,
/// }];
/// let prompt = build_prompt("how to restart", &chunks);
/// assert!(prompt.contains("[1] Restart the service\nSOURCE: confluence:123"));
/// ```
pub fn build_prompt(question: &str, chunks: &[RankedChunk]) -> String {
    let context = chunks
        .iter()
        .enumerate()
        .map(|(i, chunk)| render_chunk(i + 1, chunk))
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        "{PREAMBLE}\n\nContext:\n{context}\n\nQuestion: {question}\n\n{CITATION_RULE}\n\nAnswer:\n"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(text: &str, source: &str) -> RankedChunk {
        RankedChunk {
            text: text.to_string(),
            source: source.to_string(),
            score: 1.0,
        }
    }

    #[test]
    fn test_chunks_numbered_in_input_order() {
        let prompt = build_prompt(
            "how to restart",
            &[chunk("low score first", "jira:ENG-2"), chunk("second", "confluence:9")],
        );
        let first = prompt.find("[1] low score first\nSOURCE: jira:ENG-2").unwrap();
        let second = prompt.find("[2] second\nSOURCE: confluence:9").unwrap();
        assert!(first < second);
    }

    #[test]
    fn test_question_and_citation_rule_follow_context() {
        let prompt = build_prompt("how to restart", &[chunk("Restart the service", "confluence:123")]);
        let context = prompt.find("Context:").unwrap();
        let question = prompt.find("Question: how to restart").unwrap();
        let cite = prompt.find("Cite sources as [#]").unwrap();
        assert!(context < question && question < cite);
        assert!(prompt.ends_with("Answer:\n"));
    }

    #[test]
    fn test_empty_context_prompt() {
        let prompt = build_prompt("anything?", &[]);
        assert!(prompt.contains("Context:\n\n\nQuestion: anything?"));
        assert!(!prompt.contains("SOURCE:"));
    }

    #[test]
    fn test_prompt_is_deterministic() {
        let chunks = [chunk("a", "git:x#main:a.md")];
        assert_eq!(build_prompt("q", &chunks), build_prompt("q", &chunks));
    }
}
