use std::path::Path;

use anyhow::Result;

/// Print the package cache directory
pub fn cache_path(cache_dir: Option<&Path>) -> Result<()> {
    let config = super::engine_config(cache_dir)?;
    println!("{}", config.cache.path().display());
    Ok(())
}
