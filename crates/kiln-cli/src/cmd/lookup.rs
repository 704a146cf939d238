//! Lookup command

use std::path::Path;

use anyhow::Result;
use kiln_core::io::download::build_client;
use kiln_core::lookup::PackageLookup;
use kiln_core::{Redirector, Reporter};

/// Print what the package index knows about `uri`.
pub async fn lookup(
    uri: &str,
    platform: &str,
    prefer_cache: bool,
    cache_dir: Option<&Path>,
    reporter: &dyn Reporter,
) -> Result<()> {
    let config = super::engine_config(cache_dir)?;
    let client = build_client(&config.user_agent)?;
    let redirector = Redirector::new(config.cache.redirects_file());
    let lookup = PackageLookup::new(client, config.cache, redirector);

    let effective = lookup.effective_uri(uri);
    if effective != uri {
        println!("redirect: {effective}");
    }

    let result = lookup.lookup(uri, platform, prefer_cache, reporter).await?;
    println!("source:   {} ({})", result.source_location, result.source_format);
    println!("kind:     {:?}", result.package_kind);
    if result.transformer.is_some() {
        println!("binaries: built on demand");
    }

    let suffix = format!("-{platform}");
    for (key, url) in &result.download_map {
        if let Some(version) = key.strip_suffix(&suffix) {
            let format = result
                .archive_type_map
                .get(key)
                .map_or("unknown", String::as_str);
            println!("binary:   {version} [{format}] {url}");
        }
    }
    for (branch, version) in &result.resolved_version_map {
        println!("branch:   {branch} -> {version}");
    }
    Ok(())
}
