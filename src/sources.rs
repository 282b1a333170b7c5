//! Configured-connector listing for `urag sources`.

use anyhow::Result;
use serde::Serialize;

use crate::config::Config;
use crate::connector::connectors_from_config;

/// One configured connector instance as seen by an operator.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceStatus {
    /// `type:name` label, as used in ingest selectors.
    pub label: String,
    pub target: String,
    /// Whether the connector has credentials to send. Repositories use
    /// the ambient git credentials and always report `true`.
    pub credentials: bool,
}

/// One entry per connector instance, in selection order.
pub fn get_sources(config: &Config) -> Result<Vec<SourceStatus>> {
    Ok(connectors_from_config(config)?
        .iter()
        .map(|connector| SourceStatus {
            label: connector.label(),
            target: connector.target(),
            credentials: connector.has_credentials(),
        })
        .collect())
}

pub fn list_sources(config: &Config) -> Result<()> {
    let sources = get_sources(config)?;
    if sources.is_empty() {
        println!("No connectors configured.");
        return Ok(());
    }

    println!("{:<24} {:<12} TARGET", "CONNECTOR", "CREDENTIALS");
    for source in sources {
        let creds = if source.credentials { "yes" } else { "MISSING" };
        println!("{:<24} {:<12} {}", source.label, creds, source.target);
    }
    Ok(())
}
