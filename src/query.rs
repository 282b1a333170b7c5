use anyhow::{Context, Result};
use unified_rag_core::models::{SearchFilter, SourceKind};

use crate::backends::Backends;
use crate::config::Config;

/// Parse a `--kind` argument into a filter.
pub fn filter_for_kind(kind: Option<&str>) -> Result<SearchFilter> {
    match kind {
        None => Ok(SearchFilter::default()),
        Some(k) => {
            let kind = SourceKind::parse(k).with_context(|| {
                format!("Unknown kind '{}'. Use confluence, jira, or git.", k)
            })?;
            Ok(SearchFilter { kind: Some(kind) })
        }
    }
}

/// CLI entry point for `urag query`.
pub async fn run_query(config: &Config, question: &str, kind: Option<&str>) -> Result<()> {
    if question.trim().is_empty() {
        anyhow::bail!("query must not be empty");
    }
    let filter = filter_for_kind(kind)?;

    let service = Backends::from_config(config)?.answer_service();
    let answer = service.answer(question, &filter).await?;

    println!("{}", answer.answer.trim());
    println!();
    if answer.chunks.is_empty() {
        println!("No context retrieved.");
        return Ok(());
    }
    println!("Sources ({:?} search):", answer.path);
    for (i, chunk) in answer.chunks.iter().enumerate() {
        println!("  [{}] {:.3}  {}", i + 1, chunk.score, chunk.source);
    }
    Ok(())
}
