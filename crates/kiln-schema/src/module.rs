//! Module manifests and resolved-package markers.
//!
//! A directory is a module when it contains [`MODULE_MANIFEST`]. Its
//! submodules are the immediate child directories that are modules too.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::format::ArchiveFormat;
use crate::reference::PackageRef;

/// File name of the module manifest.
pub const MODULE_MANIFEST: &str = "module.toml";

/// File written into a package folder after a binary package is extracted.
pub const PACKAGE_MARKER: &str = ".pkg";

/// Errors reading or writing manifest files.
#[derive(Error, Debug)]
pub enum ManifestError {
    /// The file could not be read or written.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The file is not valid TOML for the expected shape.
    #[error("Invalid manifest {}: {source}", .path.display())]
    Parse {
        /// File that failed to parse.
        path: PathBuf,
        /// Underlying parse error.
        source: toml::de::Error,
    },

    /// The value could not be rendered as TOML.
    #[error("Failed to serialize manifest: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Contents of `module.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleManifest {
    /// Module name.
    pub name: String,
    /// Packages this module declares, in declaration order.
    #[serde(default, rename = "package")]
    pub packages: Vec<PackageRef>,
}

impl ModuleManifest {
    /// Whether `dir` is a module root.
    pub fn is_module(dir: &Path) -> bool {
        dir.join(MODULE_MANIFEST).is_file()
    }

    /// Load the manifest of the module at `dir`.
    ///
    /// Returns `Ok(None)` when `dir` is not a module.
    ///
    /// # Errors
    ///
    /// Returns an error if the manifest exists but cannot be read or parsed.
    pub fn load(dir: &Path) -> Result<Option<Self>, ManifestError> {
        let path = dir.join(MODULE_MANIFEST);
        if !path.is_file() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&path)?;
        toml::from_str(&content)
            .map(Some)
            .map_err(|source| ManifestError::Parse { path, source })
    }

    /// Write the manifest to `<dir>/module.toml`.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn save(&self, dir: &Path) -> Result<(), ManifestError> {
        std::fs::write(dir.join(MODULE_MANIFEST), toml::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Immediate child directories of `dir` that are modules, sorted by
    /// directory name.
    ///
    /// # Errors
    ///
    /// Returns an error if `dir` cannot be listed.
    pub fn submodule_dirs(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
        let mut dirs: Vec<PathBuf> = std::fs::read_dir(dir)?
            .filter_map(Result::ok)
            .map(|e| e.path())
            .filter(|p| p.is_dir() && Self::is_module(p))
            .collect();
        dirs.sort();
        Ok(dirs)
    }
}

/// Contents of the [`PACKAGE_MARKER`] file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageMarker {
    /// URI the package was resolved from (after redirects).
    pub uri: String,
    /// Version token that was requested.
    pub version: String,
    /// Platform of the extracted binaries.
    pub platform: String,
    /// Archive envelope that was extracted.
    pub format: ArchiveFormat,
}

impl PackageMarker {
    /// Write the marker into `package_dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn save(&self, package_dir: &Path) -> Result<(), ManifestError> {
        std::fs::write(package_dir.join(PACKAGE_MARKER), toml::to_string(self)?)?;
        Ok(())
    }

    /// Read the marker from `package_dir`, if there is one.
    ///
    /// # Errors
    ///
    /// Returns an error if the marker exists but cannot be read or parsed.
    pub fn load(package_dir: &Path) -> Result<Option<Self>, ManifestError> {
        let path = package_dir.join(PACKAGE_MARKER);
        if !path.is_file() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&path)?;
        toml::from_str(&content)
            .map(Some)
            .map_err(|source| ManifestError::Parse { path, source })
    }
}

/// Whether `package_dir` holds a resolved package: a binary extraction
/// (marker file) or a source checkout (`.git`).
pub fn is_resolved_package_dir(package_dir: &Path) -> bool {
    package_dir.join(PACKAGE_MARKER).is_file() || package_dir.join(".git").exists()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn parses_packages_in_order() {
        let manifest: ModuleManifest = toml::from_str(
            r#"
name = "alpha"

[[package]]
uri = "https-git://example.com/one.git"
folder = "One"
version = "master"

[[package]]
uri = "local-folder://../two"
folder = "Two"
"#,
        )
        .unwrap();

        assert_eq!(manifest.name, "alpha");
        assert_eq!(manifest.packages.len(), 2);
        assert_eq!(manifest.packages[0].version, "master");
        assert_eq!(manifest.packages[1].version, "");
        assert_eq!(manifest.packages[1].folder, PathBuf::from("Two"));
    }

    #[test]
    fn load_returns_none_outside_modules() {
        let dir = tempdir().unwrap();
        assert!(ModuleManifest::load(dir.path()).unwrap().is_none());
    }

    #[test]
    fn submodules_are_sorted_and_filtered() {
        let dir = tempdir().unwrap();
        for name in ["beta", "alpha", "plain"] {
            std::fs::create_dir(dir.path().join(name)).unwrap();
        }
        for name in ["beta", "alpha"] {
            ModuleManifest {
                name: name.to_string(),
                packages: vec![],
            }
            .save(&dir.path().join(name))
            .unwrap();
        }

        let subs = ModuleManifest::submodule_dirs(dir.path()).unwrap();
        let names: Vec<_> = subs
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["alpha", "beta"]);
    }

    #[test]
    fn marker_roundtrip_marks_resolved() {
        let dir = tempdir().unwrap();
        assert!(!is_resolved_package_dir(dir.path()));

        let marker = PackageMarker {
            uri: "https://index/pkg".to_string(),
            version: "1.0".to_string(),
            platform: "Linux".to_string(),
            format: ArchiveFormat::TarLzma,
        };
        marker.save(dir.path()).unwrap();

        assert!(is_resolved_package_dir(dir.path()));
        assert_eq!(PackageMarker::load(dir.path()).unwrap(), Some(marker));
    }
}
