//! Resolve command

use std::path::Path;
use std::time::Instant;

use anyhow::Result;
use kiln_core::{PackageManager, Redirector, Reporter, ResolveOptions};

use crate::ui::ConsoleReporter;

/// Resolve every package declared by the module at `module`.
pub async fn resolve(
    module: &Path,
    platform: &str,
    options: ResolveOptions,
    redirects: &[String],
    cache_dir: Option<&Path>,
    reporter: ConsoleReporter,
) -> Result<()> {
    let config = super::engine_config(cache_dir)?;
    tracing::debug!(
        "Resolving {} for {platform} with cache {}",
        module.display(),
        config.cache.path().display()
    );

    let mut redirector = Redirector::new(config.cache.redirects_file());
    for arg in redirects {
        redirector.register_arg(arg)?;
    }

    let manager = PackageManager::new(config, redirector, reporter)?;
    let start = Instant::now();
    let resolved = manager.resolve_module(module, platform, options).await?;

    for package in &resolved {
        println!("{}\t{}", package.origin, package.path.display());
    }
    let count = resolved.len();
    manager.reporter().info(&format!(
        "{count} package{} resolved in {:.1}s",
        if count == 1 { "" } else { "s" },
        start.elapsed().as_secs_f64()
    ));
    Ok(())
}
