//! Redirect commands

use std::path::Path;

use anyhow::{Context, Result};
use kiln_core::{Redirector, Reporter};

/// Persist `original -> replacement`.
pub fn add(
    original: &str,
    replacement: &str,
    cache_dir: Option<&Path>,
    reporter: &dyn Reporter,
) -> Result<()> {
    let config = super::engine_config(cache_dir)?;
    let file = config.cache.redirects_file();
    Redirector::new(&file)
        .add_persistent(original, replacement)
        .with_context(|| format!("Failed to write {}", file.display()))?;
    reporter.info(&format!("Redirecting {original} -> {replacement}"));
    Ok(())
}

/// Print persisted redirects in the order they apply.
pub fn list(cache_dir: Option<&Path>) -> Result<()> {
    let config = super::engine_config(cache_dir)?;
    for (original, replacement) in Redirector::new(config.cache.redirects_file()).persisted() {
        println!("{original} -> {replacement}");
    }
    Ok(())
}
