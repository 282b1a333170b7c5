//! Configuration parsing and validation.
//!
//! Configuration is a TOML file where every section and key has a default,
//! so an empty file (or no file at all) describes the in-cluster
//! deployment. Deployment-style environment variables are layered on top by
//! [`apply_env_overrides`].
//!
//! ```toml
//! [vector]
//! url = "http://localhost:6333"
//!
//! [connectors.wiki.eng]
//! base_url = "https://wiki.example.com"
//! space_key = "ENG"
//!
//! [connectors.repository.platform]
//! urls = ["https://git.example.com/platform/ops.git"]
//! exclude_globs = ["**/*.lock"]
//! ```

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub vector: VectorConfig,
    #[serde(default)]
    pub lexical: LexicalConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub connectors: ConnectorsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct VectorConfig {
    #[serde(default = "default_vector_url")]
    pub url: String,
    #[serde(default = "default_collection")]
    pub collection: String,
    #[serde(default = "default_sixty")]
    pub timeout_secs: u64,
}

impl Default for VectorConfig {
    fn default() -> Self {
        Self {
            url: default_vector_url(),
            collection: default_collection(),
            timeout_secs: default_sixty(),
        }
    }
}

fn default_vector_url() -> String {
    "http://qdrant.vector.svc.cluster.local:6333".to_string()
}
fn default_collection() -> String {
    "unified_docs".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct LexicalConfig {
    #[serde(default = "default_lexical_url")]
    pub url: String,
    #[serde(default = "default_collection")]
    pub index: String,
    #[serde(default = "default_thirty")]
    pub timeout_secs: u64,
    /// The in-cluster search service presents a self-signed certificate.
    #[serde(default)]
    pub accept_invalid_certs: bool,
}

impl Default for LexicalConfig {
    fn default() -> Self {
        Self {
            url: default_lexical_url(),
            index: default_collection(),
            timeout_secs: default_thirty(),
            accept_invalid_certs: false,
        }
    }
}

fn default_lexical_url() -> String {
    "http://opensearch.search.svc.cluster.local:9200".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct GenerationConfig {
    #[serde(default = "default_generation_url")]
    pub url: String,
    #[serde(default = "default_generation_model")]
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_sixty")]
    pub timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            url: default_generation_url(),
            model: default_generation_model(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            timeout_secs: default_sixty(),
        }
    }
}

fn default_generation_url() -> String {
    "http://vllm.llm.svc.cluster.local:8000".to_string()
}
fn default_generation_model() -> String {
    "llm".to_string()
}
fn default_max_tokens() -> u32 {
    512
}
fn default_temperature() -> f32 {
    0.1
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
        }
    }
}

fn default_top_k() -> usize {
    unified_rag_core::retriever::DEFAULT_TOP_K
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default = "default_dims")]
    pub dims: usize,
    #[serde(default = "default_thirty")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            url: None,
            model: None,
            dims: default_dims(),
            timeout_secs: default_thirty(),
        }
    }
}

fn default_provider() -> String {
    "placeholder".to_string()
}
fn default_dims() -> usize {
    1024
}

#[derive(Debug, Deserialize, Clone)]
pub struct IngestConfig {
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            concurrency: default_concurrency(),
        }
    }
}

fn default_batch_size() -> usize {
    256
}
fn default_concurrency() -> usize {
    4
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "0.0.0.0:8080".to_string()
}

/// Named connector instances, grouped by type.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct ConnectorsConfig {
    #[serde(default)]
    pub wiki: BTreeMap<String, WikiConnectorConfig>,
    #[serde(default)]
    pub issues: BTreeMap<String, IssuesConnectorConfig>,
    #[serde(default)]
    pub repository: BTreeMap<String, RepositoryConnectorConfig>,
}

impl ConnectorsConfig {
    pub fn is_empty(&self) -> bool {
        self.wiki.is_empty() && self.issues.is_empty() && self.repository.is_empty()
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct WikiConnectorConfig {
    pub base_url: String,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default = "default_space_or_project")]
    pub space_key: String,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    #[serde(default = "default_thirty")]
    pub timeout_secs: u64,
}

impl WikiConnectorConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            user: None,
            token: None,
            space_key: default_space_or_project(),
            page_size: default_page_size(),
            timeout_secs: default_thirty(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct IssuesConnectorConfig {
    pub base_url: String,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default = "default_space_or_project")]
    pub project: String,
    /// Overrides the project-derived query when set.
    #[serde(default)]
    pub jql: Option<String>,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    #[serde(default = "default_max_pages")]
    pub max_pages: usize,
    #[serde(default = "default_thirty")]
    pub timeout_secs: u64,
}

impl IssuesConnectorConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            user: None,
            token: None,
            project: default_space_or_project(),
            jql: None,
            page_size: default_page_size(),
            max_pages: default_max_pages(),
            timeout_secs: default_thirty(),
        }
    }

    /// The query actually sent: `jql` if set, otherwise every issue of
    /// `project`, most recently updated first.
    pub fn effective_jql(&self) -> String {
        match &self.jql {
            Some(jql) if !jql.trim().is_empty() => jql.clone(),
            _ => format!("project = {} ORDER BY updated DESC", self.project),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RepositoryConnectorConfig {
    pub urls: Vec<String>,
    #[serde(default = "default_branch")]
    pub branch: String,
    #[serde(default = "default_max_file_bytes")]
    pub max_file_bytes: u64,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    /// Parent directory for checkouts; the system temp dir when unset.
    #[serde(default)]
    pub scratch_dir: Option<PathBuf>,
}

impl RepositoryConnectorConfig {
    pub fn new(urls: Vec<String>) -> Self {
        Self {
            urls,
            branch: default_branch(),
            max_file_bytes: default_max_file_bytes(),
            exclude_globs: Vec::new(),
            scratch_dir: None,
        }
    }
}

fn default_space_or_project() -> String {
    "ENG".to_string()
}
fn default_page_size() -> usize {
    50
}
fn default_max_pages() -> usize {
    5
}
fn default_branch() -> String {
    "main".to_string()
}
fn default_max_file_bytes() -> u64 {
    2_000_000
}
fn default_thirty() -> u64 {
    30
}
fn default_sixty() -> u64 {
    60
}

/// Name given to connectors declared through environment variables.
pub const ENV_CONNECTOR_NAME: &str = "default";

/// Load configuration from `path`, or defaults when `path` is `None`, then
/// apply process environment overrides and validate.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let mut config = match path {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            parse_config(&content)?
        }
        None => Config::default(),
    };

    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    validate(&config)?;
    Ok(config)
}

/// Parse a TOML document into a [`Config`] without validating it.
pub fn parse_config(content: &str) -> Result<Config> {
    toml::from_str(content).with_context(|| "Failed to parse config file")
}

/// Layer environment-style settings over `config`.
///
/// `lookup` returns the value of a variable, if set; blank values count as
/// unset. Connector variables only declare a connector when the file
/// configures none of that type, and credential variables only fill
/// credentials the file leaves out.
pub fn apply_env_overrides(config: &mut Config, lookup: impl Fn(&str) -> Option<String>) {
    let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(v) = get("QDRANT_URL") {
        config.vector.url = v;
    }
    if let Some(v) = get("QDRANT_COLLECTION") {
        config.vector.collection = v;
    }
    if let Some(v) = get("OPENSEARCH_URL") {
        config.lexical.url = v;
    }
    if let Some(v) = get("OPENSEARCH_INDEX") {
        config.lexical.index = v;
    }
    if let Some(v) = get("LLM_URL") {
        config.generation.url = v;
    }
    if let Some(v) = get("LLM_MODEL") {
        config.generation.model = v;
    }
    if let Some(v) = get("TOP_K") {
        // Unparseable values become 0 so validation reports them.
        config.retrieval.top_k = v.trim().parse().unwrap_or(0);
    }
    if let Some(v) = get("RAG_BIND") {
        config.server.bind = v;
    }

    if config.connectors.wiki.is_empty() {
        if let Some(base_url) = get("CONFLUENCE_BASE") {
            let mut wiki = WikiConnectorConfig::new(base_url);
            if let Some(space) = get("CONFLUENCE_SPACE") {
                wiki.space_key = space;
            }
            config
                .connectors
                .wiki
                .insert(ENV_CONNECTOR_NAME.to_string(), wiki);
        }
    }
    if config.connectors.issues.is_empty() {
        if let Some(base_url) = get("JIRA_BASE") {
            let mut issues = IssuesConnectorConfig::new(base_url);
            issues.jql = get("JIRA_JQL");
            config
                .connectors
                .issues
                .insert(ENV_CONNECTOR_NAME.to_string(), issues);
        }
    }
    if config.connectors.repository.is_empty() {
        if let Some(repos) = get("GIT_REPOS") {
            let urls: Vec<String> = repos
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
            if !urls.is_empty() {
                let mut repo = RepositoryConnectorConfig::new(urls);
                if let Some(branch) = get("GIT_BRANCH") {
                    repo.branch = branch;
                }
                config
                    .connectors
                    .repository
                    .insert(ENV_CONNECTOR_NAME.to_string(), repo);
            }
        }
    }

    for wiki in config.connectors.wiki.values_mut() {
        wiki.user = wiki.user.take().or_else(|| get("CONFLUENCE_USER"));
        wiki.token = wiki.token.take().or_else(|| get("CONFLUENCE_TOKEN"));
    }
    for issues in config.connectors.issues.values_mut() {
        issues.user = issues.user.take().or_else(|| get("JIRA_USER"));
        issues.token = issues.token.take().or_else(|| get("JIRA_TOKEN"));
    }
}

/// Check value ranges that serde cannot express.
pub fn validate(config: &Config) -> Result<()> {
    if config.retrieval.top_k == 0 {
        bail!("retrieval.top_k must be > 0");
    }
    if config.ingest.batch_size == 0 {
        bail!("ingest.batch_size must be > 0");
    }
    if config.ingest.concurrency == 0 {
        bail!("ingest.concurrency must be > 0");
    }
    if config.generation.max_tokens == 0 {
        bail!("generation.max_tokens must be > 0");
    }
    if !(0.0..=2.0).contains(&config.generation.temperature) {
        bail!("generation.temperature must be in [0.0, 2.0]");
    }

    match config.embedding.provider.as_str() {
        "placeholder" | "openai" => {}
        other => bail!(
            "Unknown embedding provider: '{}'. Must be placeholder or openai.",
            other
        ),
    }
    if config.embedding.dims == 0 {
        bail!("embedding.dims must be > 0");
    }
    if config.embedding.provider == "openai" && config.embedding.model.is_none() {
        bail!("embedding.model must be specified when provider is 'openai'");
    }

    for (name, wiki) in &config.connectors.wiki {
        if wiki.page_size == 0 {
            bail!("connectors.wiki.{}.page_size must be > 0", name);
        }
    }
    for (name, issues) in &config.connectors.issues {
        if issues.page_size == 0 {
            bail!("connectors.issues.{}.page_size must be > 0", name);
        }
        if issues.max_pages == 0 {
            bail!("connectors.issues.{}.max_pages must be > 0", name);
        }
    }
    for (name, repo) in &config.connectors.repository {
        if repo.urls.is_empty() {
            bail!("connectors.repository.{}.urls must list at least one repository", name);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_empty_file_gives_cluster_defaults() {
        let config = parse_config("").unwrap();
        assert_eq!(config.vector.url, "http://qdrant.vector.svc.cluster.local:6333");
        assert_eq!(config.vector.collection, "unified_docs");
        assert_eq!(config.lexical.index, "unified_docs");
        assert_eq!(config.generation.url, "http://vllm.llm.svc.cluster.local:8000");
        assert_eq!(config.generation.max_tokens, 512);
        assert_eq!(config.retrieval.top_k, 8);
        assert_eq!(config.embedding.provider, "placeholder");
        assert_eq!(config.embedding.dims, 1024);
        assert_eq!(config.server.bind, "0.0.0.0:8080");
        assert!(config.connectors.is_empty());
        validate(&config).unwrap();
    }

    #[test]
    fn test_named_connectors_parse_with_defaults() {
        let config = parse_config(
            r#"
            [connectors.wiki.eng]
            base_url = "https://wiki.local"

            [connectors.issues.ops]
            base_url = "https://issues.local"
            project = "OPS"

            [connectors.repository.platform]
            urls = ["https://scm.local/a.git", "https://scm.local/b.git"]
            exclude_globs = ["**/*.lock"]
            "#,
        )
        .unwrap();

        let wiki = &config.connectors.wiki["eng"];
        assert_eq!(wiki.space_key, "ENG");
        assert_eq!(wiki.page_size, 50);

        let issues = &config.connectors.issues["ops"];
        assert_eq!(issues.max_pages, 5);
        assert_eq!(issues.effective_jql(), "project = OPS ORDER BY updated DESC");

        let repo = &config.connectors.repository["platform"];
        assert_eq!(repo.branch, "main");
        assert_eq!(repo.max_file_bytes, 2_000_000);
        assert_eq!(repo.urls.len(), 2);
    }

    #[test]
    fn test_unknown_top_level_section_rejected() {
        assert!(parse_config("[db]\npath = \"x.sqlite\"\n").is_err());
    }

    #[test]
    fn test_env_overrides_endpoints() {
        let mut config = Config::default();
        apply_env_overrides(
            &mut config,
            env(&[
                ("QDRANT_URL", "http://localhost:6333"),
                ("OPENSEARCH_INDEX", "docs"),
                ("LLM_MODEL", "mistral"),
                ("TOP_K", "3"),
                ("RAG_BIND", "127.0.0.1:9000"),
            ]),
        );
        assert_eq!(config.vector.url, "http://localhost:6333");
        assert_eq!(config.lexical.index, "docs");
        assert_eq!(config.generation.model, "mistral");
        assert_eq!(config.retrieval.top_k, 3);
        assert_eq!(config.server.bind, "127.0.0.1:9000");
    }

    #[test]
    fn test_env_declares_connectors_when_file_has_none() {
        let mut config = Config::default();
        apply_env_overrides(
            &mut config,
            env(&[
                ("CONFLUENCE_BASE", "https://wiki.local"),
                ("CONFLUENCE_SPACE", "SRE"),
                ("CONFLUENCE_USER", "bot"),
                ("CONFLUENCE_TOKEN", "secret"),
                ("JIRA_BASE", "https://issues.local"),
                ("JIRA_JQL", "project = SRE"),
                ("GIT_REPOS", "https://scm.local/a.git, ,https://scm.local/b.git"),
                ("GIT_BRANCH", "trunk"),
            ]),
        );

        let wiki = &config.connectors.wiki[ENV_CONNECTOR_NAME];
        assert_eq!(wiki.space_key, "SRE");
        assert_eq!(wiki.user.as_deref(), Some("bot"));
        assert_eq!(wiki.token.as_deref(), Some("secret"));

        let issues = &config.connectors.issues[ENV_CONNECTOR_NAME];
        assert_eq!(issues.effective_jql(), "project = SRE");
        assert!(issues.user.is_none());

        let repo = &config.connectors.repository[ENV_CONNECTOR_NAME];
        assert_eq!(repo.urls, vec!["https://scm.local/a.git", "https://scm.local/b.git"]);
        assert_eq!(repo.branch, "trunk");
    }

    #[test]
    fn test_env_does_not_replace_file_connectors_or_credentials() {
        let mut config = parse_config(
            r#"
            [connectors.wiki.eng]
            base_url = "https://wiki.local"
            user = "file-user"
            "#,
        )
        .unwrap();
        apply_env_overrides(
            &mut config,
            env(&[
                ("CONFLUENCE_BASE", "https://other.local"),
                ("CONFLUENCE_USER", "env-user"),
                ("CONFLUENCE_TOKEN", "env-token"),
            ]),
        );
        assert_eq!(config.connectors.wiki.len(), 1);
        let wiki = &config.connectors.wiki["eng"];
        assert_eq!(wiki.base_url, "https://wiki.local");
        assert_eq!(wiki.user.as_deref(), Some("file-user"));
        assert_eq!(wiki.token.as_deref(), Some("env-token"));
    }

    #[test]
    fn test_invalid_top_k_from_env_rejected() {
        let mut config = Config::default();
        apply_env_overrides(&mut config, env(&[("TOP_K", "many")]));
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let cases = [
            "[retrieval]\ntop_k = 0\n",
            "[ingest]\nbatch_size = 0\n",
            "[ingest]\nconcurrency = 0\n",
            "[generation]\ntemperature = 3.5\n",
            "[generation]\nmax_tokens = 0\n",
            "[embedding]\nprovider = \"local\"\n",
            "[embedding]\nprovider = \"openai\"\n",
            "[embedding]\ndims = 0\n",
            "[connectors.issues.x]\nbase_url = \"http://h\"\nmax_pages = 0\n",
            "[connectors.wiki.x]\nbase_url = \"http://h\"\npage_size = 0\n",
            "[connectors.repository.x]\nurls = []\n",
        ];
        for case in cases {
            let config = parse_config(case).unwrap();
            assert!(validate(&config).is_err(), "expected rejection for {:?}", case);
        }
    }

    #[test]
    fn test_load_config_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("urag.toml");
        std::fs::write(&path, "[retrieval]\ntop_k = 4\n").unwrap();
        let config = load_config(Some(&path)).unwrap();
        // TOP_K may be set in the environment running the tests.
        if std::env::var("TOP_K").is_err() {
            assert_eq!(config.retrieval.top_k, 4);
        }
    }

    #[test]
    fn test_load_config_missing_file_errors() {
        let err = load_config(Some(Path::new("/nonexistent/urag.toml"))).unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to read config file"));
    }
}
