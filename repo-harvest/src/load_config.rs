/// `load_config` module: loads a static YAML config into the core `HarvestConfig`.
///
/// This is the only place where user-supplied YAML is parsed and validated.
///
/// # Responsibilities
/// - Parse the YAML file into type-safe structs (defaults come from the core config types)
/// - Reject values the pipeline cannot work with (empty query, zero page size, ...)
/// - Keep secrets out of YAML: the API token is read from the environment by the client
///
/// # Errors
/// All errors use `anyhow::Error` and are surfaced at the CLI boundary.
use anyhow::Result;
use repo_harvest_core::config::HarvestConfig;
use std::fs;
use std::path::Path;
use tracing::{error, info};

/// GitHub search refuses pages larger than this.
const MAX_PER_PAGE: u32 = 100;

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<HarvestConfig> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");

    let config_content = match fs::read_to_string(path_ref) {
        Ok(content) => {
            info!(config_path = ?path_ref, "Config file read successfully");
            content
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
            return Err(anyhow::anyhow!(
                "Failed to read config file {:?}: {}",
                path_ref,
                e
            ));
        }
    };

    let config: HarvestConfig = match serde_yaml::from_str(&config_content) {
        Ok(conf) => {
            info!(config_path = ?path_ref, "Parsed config YAML successfully");
            conf
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML");
            return Err(anyhow::anyhow!("Failed to parse config YAML: {e}"));
        }
    };

    validate(&config)?;
    Ok(config)
}

fn validate(config: &HarvestConfig) -> Result<()> {
    if config.search.query.trim().is_empty() {
        error!("search.query is empty");
        anyhow::bail!("Invalid config: search.query must not be empty");
    }
    if config.search.per_page == 0 || config.search.per_page > MAX_PER_PAGE {
        error!(per_page = config.search.per_page, "search.per_page out of range");
        anyhow::bail!(
            "Invalid config: search.per_page must be between 1 and {MAX_PER_PAGE}, got {}",
            config.search.per_page
        );
    }
    if config.extract.separator.is_empty() {
        error!("extract.separator is empty");
        anyhow::bail!("Invalid config: extract.separator must not be empty");
    }
    if config.extract.fallback_branch.trim().is_empty() {
        error!("extract.fallback_branch is empty");
        anyhow::bail!("Invalid config: extract.fallback_branch must not be empty");
    }
    if config.output.extension.is_empty() || config.output.extension.contains(['.', '/']) {
        error!(extension = %config.output.extension, "output.extension is not a bare extension");
        anyhow::bail!(
            "Invalid config: output.extension must be a bare extension like \"txt\", got {:?}",
            config.output.extension
        );
    }
    if config.concurrency == 0 {
        error!("concurrency is zero");
        anyhow::bail!("Invalid config: concurrency must be at least 1");
    }
    Ok(())
}
