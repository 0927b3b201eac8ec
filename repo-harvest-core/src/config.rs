use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, info};

pub const DEFAULT_API_BASE_URL: &str = "https://api.github.com";
pub const DEFAULT_FALLBACK_BRANCH: &str = "main";
pub const DEFAULT_SOURCE_ROOT: &str = "src/main/";
pub const DEFAULT_ARTIFACT_EXTENSION: &str = "txt";

/// Inserted between two files of the same repository in its corpus artifact.
pub fn default_separator() -> String {
    format!("\n\n{} FILE SEPARATOR {}\n\n", "=".repeat(50), "=".repeat(50))
}

/// Everything one harvest run needs, minus the credential.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarvestConfig {
    pub search: SearchConfig,
    #[serde(default)]
    pub extract: ExtractConfig,
    pub output: OutputConfig,
    #[serde(default)]
    pub api: ApiConfig,
    /// Repositories processed at the same time. 1 means strictly sequential.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    pub query: String,
    #[serde(default = "default_per_page")]
    pub per_page: u32,
    #[serde(default = "default_pages")]
    pub pages: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractConfig {
    #[serde(default = "default_source_root")]
    pub source_root: String,
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
    #[serde(default = "default_fallback_branch")]
    pub fallback_branch: String,
    #[serde(default = "default_separator")]
    pub separator: String,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            source_root: default_source_root(),
            extensions: default_extensions(),
            fallback_branch: default_fallback_branch(),
            separator: default_separator(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    pub dir: PathBuf,
    #[serde(default = "default_artifact_extension")]
    pub extension: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_api_base_url")]
    pub base_url: String,
    /// Upper bound on requests in flight across all workers.
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,
    /// Longest pause honoured when the rate limit is exhausted.
    #[serde(default = "default_max_rate_limit_wait_secs")]
    pub max_rate_limit_wait_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_api_base_url(),
            max_in_flight: default_max_in_flight(),
            max_rate_limit_wait_secs: default_max_rate_limit_wait_secs(),
        }
    }
}

fn default_concurrency() -> usize {
    1
}
fn default_per_page() -> u32 {
    50
}
fn default_pages() -> u32 {
    1
}
fn default_source_root() -> String {
    DEFAULT_SOURCE_ROOT.to_string()
}
fn default_extensions() -> Vec<String> {
    vec![".java".to_string()]
}
fn default_fallback_branch() -> String {
    DEFAULT_FALLBACK_BRANCH.to_string()
}
fn default_artifact_extension() -> String {
    DEFAULT_ARTIFACT_EXTENSION.to_string()
}
fn default_api_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}
fn default_max_in_flight() -> usize {
    4
}
fn default_max_rate_limit_wait_secs() -> u64 {
    900
}

impl HarvestConfig {
    /// Config with defaults for everything but the query and output directory.
    pub fn new(query: impl Into<String>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            search: SearchConfig {
                query: query.into(),
                per_page: default_per_page(),
                pages: default_pages(),
            },
            extract: ExtractConfig::default(),
            output: OutputConfig {
                dir: output_dir.into(),
                extension: default_artifact_extension(),
            },
            api: ApiConfig::default(),
            concurrency: default_concurrency(),
        }
    }

    pub fn trace_loaded(&self) {
        info!(
            query = %self.search.query,
            per_page = self.search.per_page,
            pages = self.search.pages,
            output_dir = %self.output.dir.display(),
            source_root = %self.extract.source_root,
            concurrency = self.concurrency,
            "Loaded HarvestConfig"
        );
        debug!(?self, "HarvestConfig loaded (full debug)");
    }
}
