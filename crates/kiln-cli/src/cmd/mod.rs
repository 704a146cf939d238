pub mod cache_path;
pub mod completions;
pub mod lookup;
pub mod pack;
pub mod redirect;
pub mod resolve;
pub mod unpack;

use std::path::Path;

use anyhow::{Context, Result};
use kiln_core::{CacheDir, EngineConfig};

/// Engine configuration from the environment, with `--cache-dir` taking
/// precedence over `KILN_CACHE_DIR`.
pub fn engine_config(cache_dir: Option<&Path>) -> Result<EngineConfig> {
    match cache_dir {
        Some(dir) => Ok(EngineConfig::from_env_at(CacheDir::at(dir))),
        None => EngineConfig::from_env()
            .context("Could not determine the cache directory; set KILN_CACHE_DIR or --cache-dir"),
    }
}
