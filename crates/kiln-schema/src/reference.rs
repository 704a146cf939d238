//! Package references as declared in module manifests.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Scheme of a reference that already points at a resolved copy on disk.
///
/// These references are produced by package discovery and must never be
/// handed to protocol lookup.
pub const LOCAL_POINTER_SCHEME: &str = "local-pointer://";

/// A package a module depends on.
///
/// Deserializes from a `[[package]]` table in `module.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PackageRef {
    /// Package URI, e.g. `https-git://example.com/lib.git`.
    pub uri: String,
    /// Version token: a version, branch name or commit hash. Empty means
    /// whatever the source considers current.
    #[serde(default)]
    pub version: String,
    /// Destination folder, relative to the declaring module.
    pub folder: PathBuf,
}

impl PackageRef {
    /// Create a new reference.
    pub fn new(uri: impl Into<String>, version: impl Into<String>, folder: impl Into<PathBuf>) -> Self {
        Self {
            uri: uri.into(),
            version: version.into(),
            folder: folder.into(),
        }
    }

    /// Build a pointer reference to an already-resolved copy at `path`.
    pub fn local_pointer(path: &Path, version: &str, folder: &Path) -> Self {
        Self {
            uri: format!("{LOCAL_POINTER_SCHEME}{}", path.display()),
            version: version.to_string(),
            folder: folder.to_path_buf(),
        }
    }

    /// Whether this reference points at an already-resolved copy.
    pub fn is_local_pointer(&self) -> bool {
        self.uri.starts_with(LOCAL_POINTER_SCHEME)
    }
}

impl std::fmt::Display for PackageRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.version.is_empty() {
            write!(f, "{}", self.uri)
        } else {
            write!(f, "{}@{}", self.uri, self.version)
        }
    }
}
