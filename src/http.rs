//! Shared HTTP plumbing for the collaborator clients and connectors.

use anyhow::{bail, Context, Result};
use std::time::Duration;

/// Upper bound on how much of an error body is carried into messages.
const ERROR_BODY_CHARS: usize = 500;

/// Build a `reqwest` client with a whole-request timeout.
pub fn build_client(timeout_secs: u64, accept_invalid_certs: bool) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .danger_accept_invalid_certs(accept_invalid_certs)
        .build()
        .context("Failed to build HTTP client")
}

/// Truncate a response body for inclusion in an error message.
pub fn truncate_body(body: &str) -> String {
    body.chars().take(ERROR_BODY_CHARS).collect()
}

/// Fail with the status and (truncated) body unless the response is 2xx.
pub async fn ensure_success(resp: reqwest::Response, what: &str) -> Result<reqwest::Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    bail!("{} failed (HTTP {}): {}", what, status, truncate_body(&body));
}

/// Join a base URL and an absolute path without doubling the slash.
pub fn join_url(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_url() {
        assert_eq!(join_url("http://h:1/", "/a/b"), "http://h:1/a/b");
        assert_eq!(join_url("http://h:1", "a"), "http://h:1/a");
    }

    #[test]
    fn test_truncate_body() {
        let long = "x".repeat(2000);
        assert_eq!(truncate_body(&long).len(), ERROR_BODY_CHARS);
        assert_eq!(truncate_body("short"), "short");
    }
}
