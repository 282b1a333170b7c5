//! Repository connector.
//!
//! Each fetch makes a shallow, single-branch clone of one repository into a
//! fresh scratch directory, walks the checkout and yields one document per
//! file. The scratch directory belongs to the returned stream and is
//! removed when the stream is dropped, whether the walk finished, failed or
//! was abandoned part-way.
//!
//! Files are skipped (logged at `debug`, never surfaced) when they:
//! - live under `.git/`
//! - match one of the configured `exclude_globs`
//! - are `max_file_bytes` or larger
//! - are not valid UTF-8
//!
//! Directory traversal and file reads run on the blocking thread pool, one
//! step per document, so a large checkout does not stall other connectors
//! polled on the same task.

use anyhow::{Context, Result};
use futures::stream::{self, Stream, StreamExt, TryStreamExt};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tempfile::TempDir;
use tokio::process::Command;
use tracing::{debug, info};
use unified_rag_core::models::CanonicalDocument;
use walkdir::{DirEntry, WalkDir};

use crate::config::RepositoryConnectorConfig;
use crate::connector::{ConnectorError, DocumentStream};

/// One repository URL from a `[connectors.repository.<name>]` entry.
pub struct RepositoryConnector {
    name: String,
    url: String,
    branch: String,
    max_file_bytes: u64,
    excludes: GlobSet,
    scratch_dir: Option<PathBuf>,
}

impl RepositoryConnector {
    pub fn new(name: &str, url: &str, config: &RepositoryConnectorConfig) -> Result<Self> {
        Ok(Self {
            name: name.to_string(),
            url: url.to_string(),
            branch: config.branch.clone(),
            max_file_bytes: config.max_file_bytes,
            excludes: build_globset(&config.exclude_globs)
                .with_context(|| format!("Invalid exclude_globs for repository connector '{}'", name))?,
            scratch_dir: config.scratch_dir.clone(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn target(&self) -> String {
        format!("{}#{}", self.url, self.branch)
    }

    pub fn fetch(&self) -> DocumentStream<'_> {
        let connector = format!("repository:{}", self.name);
        stream::once(self.checkout())
            .map_ok(move |walk| walk.into_stream(connector.clone()))
            .try_flatten()
            .boxed()
    }

    /// Clone into a new scratch directory and return a walk over it.
    async fn checkout(&self) -> Result<RepositoryWalk, ConnectorError> {
        let workspace = self.scratch_workspace().map_err(|e| self.checkout_error(format!("{:#}", e)))?;

        info!(connector = %self.name, url = %self.url, branch = %self.branch, "cloning repository");
        git_clone(&self.url, &self.branch, workspace.path())
            .await
            .map_err(|e| self.checkout_error(format!("{:#}", e)))?;

        Ok(RepositoryWalk::new(
            workspace,
            self.url.clone(),
            self.branch.clone(),
            self.max_file_bytes,
            self.excludes.clone(),
        ))
    }

    fn scratch_workspace(&self) -> Result<TempDir> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("urag-checkout-");
        match &self.scratch_dir {
            Some(dir) => {
                std::fs::create_dir_all(dir)
                    .with_context(|| format!("Failed to create scratch dir: {}", dir.display()))?;
                builder
                    .tempdir_in(dir)
                    .with_context(|| format!("Failed to create checkout dir in {}", dir.display()))
            }
            None => builder.tempdir().context("Failed to create checkout dir"),
        }
    }

    fn checkout_error(&self, message: String) -> ConnectorError {
        ConnectorError::Checkout {
            connector: format!("repository:{}", self.name),
            url: self.url.clone(),
            message,
        }
    }
}

async fn git_clone(url: &str, branch: &str, dest: &Path) -> Result<()> {
    let output = Command::new("git")
        .args(["clone", "--depth", "1", "--branch", branch, "--single-branch", "--quiet"])
        .arg(url)
        .arg(dest)
        .env("GIT_TERMINAL_PROMPT", "0")
        .stdin(Stdio::null())
        .output()
        .await
        .context("Failed to execute 'git clone'. Is git installed?")?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        anyhow::bail!("git clone failed: {}", stderr.trim());
    }
    Ok(())
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}

fn is_git_dir(entry: &DirEntry) -> bool {
    entry.depth() > 0 && entry.file_type().is_dir() && entry.file_name() == ".git"
}

fn not_git_dir(entry: &DirEntry) -> bool {
    !is_git_dir(entry)
}

/// Lazy walk over a checkout that owns the checkout's scratch directory.
pub struct RepositoryWalk {
    entries: walkdir::FilterEntry<walkdir::IntoIter, fn(&DirEntry) -> bool>,
    root: PathBuf,
    url: String,
    branch: String,
    max_file_bytes: u64,
    excludes: GlobSet,
    yielded: usize,
    // Declared last so the walker is dropped before the directory goes.
    workspace: Option<TempDir>,
}

impl RepositoryWalk {
    fn new(
        workspace: TempDir,
        url: String,
        branch: String,
        max_file_bytes: u64,
        excludes: GlobSet,
    ) -> Self {
        let mut walk = Self::over(workspace.path(), url, branch, max_file_bytes, excludes);
        walk.workspace = Some(workspace);
        walk
    }

    /// Walk an existing directory without taking ownership of it.
    pub fn over(
        root: &Path,
        url: String,
        branch: String,
        max_file_bytes: u64,
        excludes: GlobSet,
    ) -> Self {
        let filter: fn(&DirEntry) -> bool = not_git_dir;
        Self {
            entries: WalkDir::new(root)
                .sort_by_file_name()
                .into_iter()
                .filter_entry(filter),
            root: root.to_path_buf(),
            url,
            branch,
            max_file_bytes,
            excludes,
            yielded: 0,
            workspace: None,
        }
    }

    /// Drive the walk on the blocking pool, one document per step.
    ///
    /// The walk (and the checkout it owns) is dropped on the blocking pool
    /// once exhausted, or wherever the stream is dropped if abandoned.
    fn into_stream(
        self,
        connector: String,
    ) -> impl Stream<Item = Result<CanonicalDocument, ConnectorError>> + Send + 'static {
        stream::try_unfold(self, move |walk| {
            let connector = connector.clone();
            async move {
                let url = walk.url.clone();
                tokio::task::spawn_blocking(move || {
                    let mut walk = walk;
                    walk.next().map(|doc| (doc, walk))
                })
                .await
                .map_err(|e| ConnectorError::Checkout {
                    connector,
                    url,
                    message: format!("walk task failed: {}", e),
                })
            }
        })
    }

    /// Turn one walk entry into a document, or `None` when it is skipped.
    fn read_entry(&self, entry: &DirEntry) -> Option<CanonicalDocument> {
        if !entry.file_type().is_file() {
            return None;
        }
        let path = entry.path();
        let rel = path
            .strip_prefix(&self.root)
            .unwrap_or(path)
            .to_string_lossy()
            .replace('\\', "/");

        if self.excludes.is_match(&rel) {
            debug!(path = %rel, "skipping excluded file");
            return None;
        }
        let size = entry.metadata().map(|m| m.len()).unwrap_or(u64::MAX);
        if size >= self.max_file_bytes {
            debug!(path = %rel, size, "skipping oversized file");
            return None;
        }
        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) => {
                debug!(path = %rel, error = %e, "skipping unreadable file");
                return None;
            }
        };
        match String::from_utf8(bytes) {
            Ok(text) => Some(CanonicalDocument::repository_file(
                &self.url,
                &self.branch,
                &rel,
                text,
            )),
            Err(_) => {
                debug!(path = %rel, "skipping non-UTF-8 file");
                None
            }
        }
    }
}

impl Iterator for RepositoryWalk {
    type Item = CanonicalDocument;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let entry = match self.entries.next() {
                Some(Ok(entry)) => entry,
                Some(Err(e)) => {
                    debug!(error = %e, "skipping unwalkable entry");
                    continue;
                }
                None => {
                    info!(url = %self.url, files = self.yielded, "repository walk complete");
                    return None;
                }
            };
            if let Some(doc) = self.read_entry(&entry) {
                self.yielded += 1;
                return Some(doc);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn walk(root: &Path, max_file_bytes: u64, excludes: &[&str]) -> Vec<CanonicalDocument> {
        let patterns: Vec<String> = excludes.iter().map(|s| s.to_string()).collect();
        RepositoryWalk::over(
            root,
            "https://scm.local/ops.git".to_string(),
            "main".to_string(),
            max_file_bytes,
            build_globset(&patterns).unwrap(),
        )
        .collect()
    }

    #[test]
    fn test_walk_yields_text_files_in_path_order() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("docs")).unwrap();
        std::fs::write(dir.path().join("README.md"), "# Ops").unwrap();
        std::fs::write(dir.path().join("docs/restart.md"), "Restart the service").unwrap();

        let docs = walk(dir.path(), 2_000_000, &[]);
        let keys: Vec<&str> = docs.iter().map(|d| d.natural_key.as_str()).collect();
        assert_eq!(
            keys,
            vec![
                "git:https://scm.local/ops.git#main:README.md",
                "git:https://scm.local/ops.git#main:docs/restart.md",
            ]
        );
        assert_eq!(docs[1].text, "Restart the service");
        assert_eq!(docs[1].id, "https://scm.local/ops.git::docs/restart.md");
    }

    #[test]
    fn test_walk_skips_git_dir_binary_and_oversized() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join(".git/objects")).unwrap();
        std::fs::write(dir.path().join(".git/HEAD"), "ref: refs/heads/main").unwrap();
        std::fs::write(dir.path().join("logo.png"), [0x89, 0x50, 0xff, 0xfe, 0x00]).unwrap();
        std::fs::write(dir.path().join("at_limit.txt"), "x".repeat(16)).unwrap();
        std::fs::write(dir.path().join("below.txt"), "x".repeat(15)).unwrap();
        std::fs::write(dir.path().join("zz.txt"), "last").unwrap();

        let docs = walk(dir.path(), 16, &[]);
        let rels: Vec<String> = docs
            .iter()
            .map(|d| d.natural_key.rsplit(':').next().unwrap().to_string())
            .collect();
        assert_eq!(rels, vec!["below.txt", "zz.txt"]);
    }

    #[test]
    fn test_walk_applies_exclude_globs() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Cargo.lock"), "lock").unwrap();
        std::fs::write(dir.path().join("main.rs"), "fn main() {}").unwrap();

        let docs = walk(dir.path(), 2_000_000, &["**/*.lock"]);
        assert_eq!(docs.len(), 1);
        assert!(docs[0].natural_key.ends_with(":main.rs"));
    }

    #[test]
    fn test_invalid_exclude_glob_rejected() {
        let mut config = RepositoryConnectorConfig::new(vec!["https://scm.local/a.git".to_string()]);
        config.exclude_globs = vec!["[".to_string()];
        assert!(RepositoryConnector::new("bad", "https://scm.local/a.git", &config).is_err());
    }
}
