//! Ingestion runs.
//!
//! Drives the selected connectors through the dual-index writer, a bounded
//! number at a time. Each connector is independent: one connector failing
//! (source unavailable, checkout failed) does not stop the others, and the
//! documents it produced before failing are still written. The run as a
//! whole fails if any connector or any store write failed.

use anyhow::{bail, Result};
use futures::stream::{self, StreamExt, TryStreamExt};
use tracing::{info, warn};
use unified_rag_core::writer::{DualIndexWriter, UpsertReport};

use crate::backends::Backends;
use crate::config::Config;
use crate::connector::{select_connectors, Connector, ConnectorError};
use crate::progress::{IngestProgressEvent, IngestProgressReporter, NoProgress, StderrProgress};

/// Outcome of one connector invocation.
#[derive(Debug)]
pub struct ConnectorRun {
    pub label: String,
    pub target: String,
    pub report: UpsertReport,
    /// The error that ended the connector's stream early, if any.
    pub error: Option<ConnectorError>,
}

impl ConnectorRun {
    pub fn is_ok(&self) -> bool {
        self.error.is_none() && !self.report.has_failures()
    }
}

/// Per-connector outcomes of one ingestion run, in selection order.
#[derive(Debug, Default)]
pub struct IngestSummary {
    pub runs: Vec<ConnectorRun>,
}

impl IngestSummary {
    pub fn documents(&self) -> usize {
        self.runs.iter().map(|r| r.report.documents).sum()
    }

    pub fn has_failures(&self) -> bool {
        self.runs.iter().any(|r| !r.is_ok())
    }
}

/// Run `connectors` through `writer`, at most `concurrency` at a time.
///
/// `progress` receives a running count per connector after every batch.
pub async fn ingest_connectors(
    connectors: &[Connector],
    writer: &DualIndexWriter,
    batch_size: usize,
    concurrency: usize,
    progress: &dyn IngestProgressReporter,
) -> IngestSummary {
    let runs = stream::iter(connectors.iter().map(|connector| async move {
        let label = connector.label();
        info!(connector = %label, target = %connector.target(), "ingesting");
        progress.report(IngestProgressEvent::Fetching {
            connector: label.clone(),
        });

        let outcome = writer
            .upsert_stream_with_progress(connector.fetch(), batch_size, |report| {
                progress.report(IngestProgressEvent::Writing {
                    connector: label.clone(),
                    documents: report.documents,
                    failed_writes: report.vector.errors.len() + report.lexical.errors.len(),
                })
            })
            .await;
        if let Some(e) = &outcome.source_error {
            warn!(connector = %label, error = %e, "connector stopped early");
        }
        info!(
            connector = %label,
            documents = outcome.report.documents,
            vector_written = outcome.report.vector.written,
            lexical_written = outcome.report.lexical.written,
            "connector finished"
        );

        ConnectorRun {
            label,
            target: connector.target(),
            report: outcome.report,
            error: outcome.source_error,
        }
    }))
    .buffered(concurrency.max(1))
    .collect()
    .await;

    IngestSummary { runs }
}

/// Count what each connector would produce, without writing anything.
pub async fn count_documents(
    connectors: &[Connector],
    concurrency: usize,
) -> Vec<(String, Result<usize, ConnectorError>)> {
    stream::iter(connectors.iter().map(|connector| async move {
        let count = connector
            .fetch()
            .try_fold(0usize, |n, _| async move { Ok(n + 1) })
            .await;
        (connector.label(), count)
    }))
    .buffered(concurrency.max(1))
    .collect()
    .await
}

/// CLI entry point for `urag ingest`.
pub async fn run_ingest(
    config: &Config,
    selector: &str,
    dry_run: bool,
    show_progress: bool,
) -> Result<()> {
    let connectors = select_connectors(config, selector)?;

    if dry_run {
        println!("ingest {} (dry-run)", selector);
        let counts = count_documents(&connectors, config.ingest.concurrency).await;
        let mut failed = false;
        for (label, count) in counts {
            match count {
                Ok(n) => println!("  {}: {} documents", label, n),
                Err(e) => {
                    failed = true;
                    println!("  {}: error: {}", label, e);
                }
            }
        }
        if failed {
            bail!("one or more connectors failed");
        }
        println!("ok");
        return Ok(());
    }

    let backends = Backends::from_config(config)?;
    let writer = backends.writer();
    let progress: Box<dyn IngestProgressReporter> = if show_progress {
        Box::new(StderrProgress)
    } else {
        Box::new(NoProgress)
    };
    let summary = ingest_connectors(
        &connectors,
        &writer,
        config.ingest.batch_size,
        config.ingest.concurrency,
        progress.as_ref(),
    )
    .await;

    println!("ingest {}", selector);
    for run in &summary.runs {
        println!("  {} ({})", run.label, run.target);
        println!("    documents: {}", run.report.documents);
        println!(
            "    vector store: {} written, {} failed calls",
            run.report.vector.written,
            run.report.vector.errors.len()
        );
        println!(
            "    lexical store: {} written, {} failed calls",
            run.report.lexical.written,
            run.report.lexical.errors.len()
        );
        for error in run.report.vector.errors.iter().chain(&run.report.lexical.errors) {
            println!("    write error: {}", error);
        }
        if let Some(e) = &run.error {
            println!("    source error: {}", e);
        }
    }
    println!("  total documents: {}", summary.documents());

    if summary.has_failures() {
        bail!("ingestion finished with failures");
    }
    println!("ok");
    Ok(())
}
