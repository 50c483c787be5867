use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    pub source: SourceConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CacheConfig {
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
    #[serde(default = "default_max_staleness_secs")]
    pub max_staleness_secs: u64,
    #[serde(default = "default_sample_messages")]
    pub sample_messages: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_ttl_secs(),
            max_staleness_secs: default_max_staleness_secs(),
            sample_messages: default_sample_messages(),
        }
    }
}

fn default_ttl_secs() -> u64 {
    7200
}
fn default_max_staleness_secs() -> u64 {
    86400
}
fn default_sample_messages() -> usize {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct FetchConfig {
    #[serde(default = "default_max_streams")]
    pub max_streams: usize,
    #[serde(default = "default_max_events_per_stream")]
    pub max_events_per_stream: usize,
    #[serde(default = "default_stream_concurrency")]
    pub stream_concurrency: usize,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_streams: default_max_streams(),
            max_events_per_stream: default_max_events_per_stream(),
            stream_concurrency: default_stream_concurrency(),
            timeout_secs: default_timeout_secs(),
            include_globs: Vec::new(),
            exclude_globs: Vec::new(),
        }
    }
}

fn default_max_streams() -> usize {
    50
}
fn default_max_events_per_stream() -> usize {
    10_000
}
fn default_stream_concurrency() -> usize {
    8
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct SourceConfig {
    pub region: String,
    #[serde(default = "default_log_group_template")]
    pub log_group_template: String,
    #[serde(default)]
    pub endpoint_url: Option<String>,
}

fn default_log_group_template() -> String {
    "/aws/app/{project}".to_string()
}

impl SourceConfig {
    pub fn log_group_for(&self, project_id: &str) -> String {
        self.log_group_template.replace("{project}", project_id)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_embedding_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "disabled".to_string(),
            model: None,
            dims: None,
            batch_size: 64,
            max_retries: 5,
            timeout_secs: 30,
        }
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    5
}
fn default_embedding_timeout_secs() -> u64 {
    30
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

impl CacheConfig {
    pub fn policy(&self) -> sawmill_core::freshness::FreshnessPolicy {
        sawmill_core::freshness::FreshnessPolicy {
            ttl: chrono::Duration::seconds(self.ttl_secs as i64),
            max_staleness: chrono::Duration::seconds(self.max_staleness_secs as i64),
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    // Validate cache bounds
    if config.cache.ttl_secs == 0 {
        anyhow::bail!("cache.ttl_secs must be > 0");
    }
    if config.cache.max_staleness_secs <= config.cache.ttl_secs {
        anyhow::bail!("cache.max_staleness_secs must be greater than cache.ttl_secs");
    }
    if config.cache.sample_messages == 0 {
        anyhow::bail!("cache.sample_messages must be >= 1");
    }

    // Validate fetch caps
    if config.fetch.max_streams == 0 {
        anyhow::bail!("fetch.max_streams must be > 0");
    }
    if config.fetch.max_events_per_stream == 0 {
        anyhow::bail!("fetch.max_events_per_stream must be > 0");
    }
    if config.fetch.stream_concurrency == 0 {
        anyhow::bail!("fetch.stream_concurrency must be > 0");
    }

    // Validate source
    if config.source.region.is_empty() {
        anyhow::bail!("source.region must not be empty");
    }
    if !config.source.log_group_template.contains("{project}") {
        anyhow::bail!("source.log_group_template must contain the {{project}} placeholder");
    }

    // Validate embedding
    if config.embedding.is_enabled() {
        if config.embedding.dims.is_none() || config.embedding.dims == Some(0) {
            anyhow::bail!(
                "embedding.dims must be > 0 when provider is '{}'",
                config.embedding.provider
            );
        }
        if config.embedding.model.is_none() {
            anyhow::bail!(
                "embedding.model must be specified when provider is '{}'",
                config.embedding.provider
            );
        }
    }

    match config.embedding.provider.as_str() {
        "disabled" | "openai" => {}
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be disabled or openai.",
            other
        ),
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml_str: &str) -> Result<Config> {
        let tmp = std::env::temp_dir().join(format!("sawmill-cfg-{}.toml", uuid::Uuid::new_v4()));
        std::fs::write(&tmp, toml_str).unwrap();
        let result = load_config(&tmp);
        std::fs::remove_file(&tmp).ok();
        result
    }

    #[test]
    fn test_minimal_config_gets_defaults() {
        let config = parse(
            r#"
[db]
path = "/tmp/sawmill.sqlite"

[source]
region = "eu-west-1"
"#,
        )
        .unwrap();

        assert_eq!(config.cache.ttl_secs, 7200);
        assert_eq!(config.cache.max_staleness_secs, 86400);
        assert_eq!(config.cache.sample_messages, 5);
        assert_eq!(config.fetch.max_streams, 50);
        assert_eq!(config.fetch.max_events_per_stream, 10_000);
        assert_eq!(config.source.log_group_for("p1"), "/aws/app/p1");
        assert!(!config.embedding.is_enabled());
    }

    #[test]
    fn test_ttl_must_be_below_max_staleness() {
        let result = parse(
            r#"
[db]
path = "/tmp/sawmill.sqlite"

[cache]
ttl_secs = 86400
max_staleness_secs = 7200

[source]
region = "eu-west-1"
"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_template_requires_placeholder() {
        let result = parse(
            r#"
[db]
path = "/tmp/sawmill.sqlite"

[source]
region = "eu-west-1"
log_group_template = "/aws/app/fixed"
"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_embedding_requires_model_and_dims() {
        let result = parse(
            r#"
[db]
path = "/tmp/sawmill.sqlite"

[source]
region = "eu-west-1"

[embedding]
provider = "openai"
"#,
        );
        assert!(result.is_err());
    }
}
