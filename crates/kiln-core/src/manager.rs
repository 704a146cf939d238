//! Package manager: bring a module's packages onto disk.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use kiln_schema::{
    ModuleManifest, PackageMarker, PackageRef, SourceFormat, is_resolved_package_dir,
};

use crate::cache::PackageCache;
use crate::config::EngineConfig;
use crate::error::ResolveError;
use crate::io::download::build_client;
use crate::io::git::{GitClient, is_commit_hash};
use crate::locator;
use crate::lookup::{LookupResult, PackageLookup};
use crate::redirect::Redirector;
use crate::redup::Reduplicator;
use crate::reporter::Reporter;
use crate::retrieval::PackageRetrieval;

/// How a package may be resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolveOptions {
    /// Never use prebuilt binaries.
    pub source_only: bool,
    /// Never fall back to a source checkout.
    pub binary_only: bool,
    /// Replace a package folder that is already resolved.
    pub force_upgrade: bool,
    /// Reuse a resolved copy found elsewhere in the module tree.
    pub safe_resolve: bool,
    /// Hard-link deduplicated files instead of copying them.
    pub hard_links: bool,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            source_only: false,
            binary_only: false,
            force_upgrade: false,
            safe_resolve: true,
            hard_links: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionOrigin {
    AlreadyPresent,
    Discovered,
    Folder,
    Binary,
    Source,
}

impl std::fmt::Display for ResolutionOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::AlreadyPresent => "already present",
            Self::Discovered => "discovered",
            Self::Folder => "folder",
            Self::Binary => "binary",
            Self::Source => "source",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPackage {
    /// The reference as resolved. Discovered packages become local pointers.
    pub package: PackageRef,
    /// Directory holding the usable package.
    pub path: PathBuf,
    pub origin: ResolutionOrigin,
}

pub struct PackageManager<R: Reporter> {
    lookup: Arc<PackageLookup>,
    cache: PackageCache,
    reporter: R,
}

impl<R: Reporter> PackageManager<R> {
    pub fn new(config: EngineConfig, redirector: Redirector, reporter: R) -> Result<Self, ResolveError> {
        let client = build_client(&config.user_agent)?;
        let lookup = Arc::new(PackageLookup::new(client, config.cache.clone(), redirector));
        let cache = PackageCache::new(
            config.cache,
            PackageRetrieval::new(lookup.clone()),
            config.write_retry,
        );
        Ok(Self {
            lookup,
            cache,
            reporter,
        })
    }

    pub fn lookup(&self) -> &PackageLookup {
        &self.lookup
    }

    pub fn cache(&self) -> &PackageCache {
        &self.cache
    }

    pub fn reporter(&self) -> &R {
        &self.reporter
    }

    /// Resolve every package declared by the module at `module_root`, in
    /// declaration order. Stops at the first failure.
    pub async fn resolve_module(
        &self,
        module_root: &Path,
        platform: &str,
        options: ResolveOptions,
    ) -> Result<Vec<ResolvedPackage>, ResolveError> {
        let manifest = ModuleManifest::load(module_root)?
            .ok_or_else(|| ResolveError::NotAModule(module_root.to_path_buf()))?;

        self.reporter
            .section(&format!("Resolving {} for {platform}", manifest.name));
        let mut resolved = Vec::with_capacity(manifest.packages.len());
        for package in &manifest.packages {
            resolved.push(self.resolve(module_root, package, platform, options).await?);
        }
        Ok(resolved)
    }

    /// Resolve one package into `<module_root>/<package.folder>`.
    pub async fn resolve(
        &self,
        module_root: &Path,
        package: &PackageRef,
        platform: &str,
        options: ResolveOptions,
    ) -> Result<ResolvedPackage, ResolveError> {
        self.reporter.resolving(package);
        match self.resolve_inner(module_root, package, platform, options).await {
            Ok(resolved) => {
                self.reporter.done(package, &resolved.origin.to_string());
                Ok(resolved)
            }
            Err(e) => {
                self.reporter.failed(package, &e.to_string());
                Err(e.context(package, platform))
            }
        }
    }

    async fn resolve_inner(
        &self,
        module_root: &Path,
        package: &PackageRef,
        platform: &str,
        options: ResolveOptions,
    ) -> Result<ResolvedPackage, ResolveError> {
        let dest = module_root.join(&package.folder);
        let resolved = |path: PathBuf, origin| ResolvedPackage {
            package: package.clone(),
            path,
            origin,
        };

        if !options.force_upgrade && is_resolved_package_dir(&dest) {
            return Ok(resolved(dest, ResolutionOrigin::AlreadyPresent));
        }

        if options.safe_resolve {
            if let Some(found) = locator::discover(module_root, package)? {
                return Ok(ResolvedPackage {
                    package: PackageRef::local_pointer(&found, &package.version, &package.folder),
                    path: found,
                    origin: ResolutionOrigin::Discovered,
                });
            }
        }

        let result = self
            .lookup
            .lookup(&package.uri, platform, false, &self.reporter)
            .await?;

        if result.source_format == SourceFormat::Folder {
            let folder = module_root.join(&result.source_location);
            return Ok(resolved(folder, ResolutionOrigin::Folder));
        }

        let binary_allowed = !options.source_only || result.transformer.is_some();
        if binary_allowed && self.install_binary(package, &dest, platform, options).await? {
            return Ok(resolved(dest, ResolutionOrigin::Binary));
        }

        if options.binary_only || result.transformer.is_some() {
            return Err(ResolveError::Unresolvable {
                package: package.to_string(),
                platform: platform.to_string(),
            });
        }

        self.install_source(package, &result, &dest)?;
        Ok(resolved(dest, ResolutionOrigin::Source))
    }

    async fn install_binary(
        &self,
        package: &PackageRef,
        dest: &Path,
        platform: &str,
        options: ResolveOptions,
    ) -> Result<bool, ResolveError> {
        let Some((bytes, format)) = self
            .cache
            .get_binary_package(&package.uri, &package.version, platform, &self.reporter)
            .await?
        else {
            return Ok(false);
        };

        self.reporter.extracting(package);
        if dest.exists() {
            std::fs::remove_dir_all(dest)?;
        }
        Reduplicator::new(dest)
            .with_hard_links(options.hard_links)
            .extract_archive(format, &bytes)?;

        PackageMarker {
            uri: self.lookup.effective_uri(&package.uri),
            version: package.version.clone(),
            platform: platform.to_string(),
            format,
        }
        .save(dest)?;
        Ok(true)
    }

    fn install_source(
        &self,
        package: &PackageRef,
        result: &LookupResult,
        dest: &Path,
    ) -> Result<(), ResolveError> {
        let git = GitClient::locate()?;
        let mirror = self
            .cache
            .get_source_package(&git, &package.uri, &result.source_location)?;

        if dest.exists() {
            std::fs::remove_dir_all(dest)?;
        }
        git.clone_from_mirror(&mirror, dest)?;
        git.set_origin(dest, &result.source_location)?;

        if let Some(revision) = source_revision(&git, &mirror, result, &package.version) {
            tracing::debug!("Checking out {revision} in {}", dest.display());
            git.checkout(dest, &revision)?;
        }
        Ok(())
    }
}

/// Revision to check out for `version`. Branch names the index knows are
/// mapped to its version; other branch or tag names are pinned to the commit
/// the mirror has for them.
fn source_revision(
    git: &GitClient,
    mirror: &Path,
    result: &LookupResult,
    version: &str,
) -> Option<String> {
    let version = version.trim();
    if version.is_empty() {
        return None;
    }
    let wanted = result.resolve_version(version);
    if is_commit_hash(wanted) {
        return Some(wanted.to_string());
    }
    match git.ls_remote(&mirror.to_string_lossy(), wanted) {
        Ok(Some(commit)) => Some(commit),
        _ => Some(wanted.to_string()),
    }
}
