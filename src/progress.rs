//! Ingest progress reporting.
//!
//! Connector streams have no known total, so progress is a running count
//! per connector, reported after every written batch. Human output goes to
//! **stderr** so the stdout summary of `urag ingest` stays parseable.

use std::io::Write;

/// A single progress event for one connector.
#[derive(Clone, Debug, PartialEq)]
pub enum IngestProgressEvent {
    /// The connector has started fetching (cloning, first page).
    Fetching { connector: String },
    /// `documents` have been handed to the writer so far.
    Writing {
        connector: String,
        documents: usize,
        failed_writes: usize,
    },
}

/// Receives progress events from [`ingest_connectors`](crate::ingest::ingest_connectors).
pub trait IngestProgressReporter: Send + Sync {
    fn report(&self, event: IngestProgressEvent);
}

/// `ingest repository:ops  writing  1,200 documents` lines on stderr.
pub struct StderrProgress;

impl IngestProgressReporter for StderrProgress {
    fn report(&self, event: IngestProgressEvent) {
        let line = match &event {
            IngestProgressEvent::Fetching { connector } => {
                format!("ingest {}  fetching...\n", connector)
            }
            IngestProgressEvent::Writing {
                connector,
                documents,
                failed_writes: 0,
            } => format!(
                "ingest {}  writing  {} documents\n",
                connector,
                format_number(*documents)
            ),
            IngestProgressEvent::Writing {
                connector,
                documents,
                failed_writes,
            } => format!(
                "ingest {}  writing  {} documents ({} failed writes)\n",
                connector,
                format_number(*documents),
                failed_writes
            ),
        };
        let mut stderr = std::io::stderr().lock();
        let _ = stderr.write_all(line.as_bytes());
        let _ = stderr.flush();
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl IngestProgressReporter for NoProgress {
    fn report(&self, _event: IngestProgressEvent) {}
}

fn format_number(n: usize) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}
