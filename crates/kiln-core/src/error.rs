//! Errors surfaced by package resolution

use std::path::PathBuf;

use kiln_schema::{ManifestError, PackageRef};
use thiserror::Error;

use crate::archive::ArchiveError;
use crate::cache::CacheError;
use crate::io::download::DownloadError;
use crate::io::git::GitError;
use crate::lookup::LookupError;

#[derive(Error, Debug)]
pub enum ResolveError {
    #[error(transparent)]
    Lookup(#[from] LookupError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Git(#[from] GitError),

    #[error("Extraction failed: {0}")]
    Archive(#[from] ArchiveError),

    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error(transparent)]
    Download(#[from] DownloadError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{} is not a module (no module.toml)", .0.display())]
    NotAModule(PathBuf),

    #[error("No binary of {package} for {platform}, and source resolution is disabled")]
    Unresolvable { package: String, platform: String },

    #[error("{context}: {source}")]
    Context {
        context: String,
        source: Box<ResolveError>,
    },
}

impl ResolveError {
    /// Attach the package and platform being resolved.
    pub fn context(self, package: &PackageRef, platform: &str) -> Self {
        if matches!(self, Self::Context { .. }) {
            return self;
        }
        Self::Context {
            context: format!("{package} ({platform})"),
            source: Box::new(self),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_is_added_once() {
        let pkg = PackageRef::new("https-git://h/lib.git", "v1", "Lib");
        let err = ResolveError::Unresolvable {
            package: pkg.to_string(),
            platform: "Linux".to_string(),
        }
        .context(&pkg, "Linux")
        .context(&pkg, "Linux");

        let msg = err.to_string();
        assert!(msg.starts_with("https-git://h/lib.git@v1 (Linux): No binary"));
        assert_eq!(msg.matches("(Linux)").count(), 1);
    }
}
