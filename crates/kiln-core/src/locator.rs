//! Find an already-resolved copy of a package elsewhere in the module tree.
//!
//! The search goes above (ancestor modules, root-most first), across
//! (sibling modules whose directory name sorts before the requesting one,
//! together with their submodules) and finally below (the requesting
//! module's own submodules). Only folders holding a resolved package count.

use std::path::{Path, PathBuf};

use kiln_schema::{ManifestError, ModuleManifest, PackageRef, is_resolved_package_dir};

/// Locate a resolved copy of `package` visible from the module at
/// `module_root`.
pub fn discover(module_root: &Path, package: &PackageRef) -> Result<Option<PathBuf>, ManifestError> {
    let module_root = module_root.canonicalize()?;

    if let Some(found) = search_above(&module_root, package)? {
        tracing::debug!("Found {package} above at {}", found.display());
        return Ok(Some(found));
    }
    if let Some(found) = search_below(&module_root, package)? {
        tracing::debug!("Found {package} below at {}", found.display());
        return Ok(Some(found));
    }
    Ok(None)
}

fn search_above(module_dir: &Path, package: &PackageRef) -> Result<Option<PathBuf>, ManifestError> {
    let Some(parent) = module_dir.parent() else {
        return Ok(None);
    };
    let Some(parent_manifest) = ModuleManifest::load(parent)? else {
        return Ok(None);
    };

    if let Some(found) = search_above(parent, package)? {
        return Ok(Some(found));
    }
    if let Some(found) = declared_copy(parent, &parent_manifest, package) {
        return Ok(Some(found));
    }

    let Some(own_name) = module_dir.file_name() else {
        return Ok(None);
    };
    for sibling in ModuleManifest::submodule_dirs(parent)? {
        if sibling.file_name().is_none_or(|name| name >= own_name) {
            continue;
        }
        if let Some(found) = search_module(&sibling, package)? {
            return Ok(Some(found));
        }
    }
    Ok(None)
}

fn search_below(module_dir: &Path, package: &PackageRef) -> Result<Option<PathBuf>, ManifestError> {
    for sub in ModuleManifest::submodule_dirs(module_dir)? {
        if let Some(found) = search_module(&sub, package)? {
            return Ok(Some(found));
        }
    }
    Ok(None)
}

/// Check a module's declarations, then its submodules.
fn search_module(module_dir: &Path, package: &PackageRef) -> Result<Option<PathBuf>, ManifestError> {
    if let Some(manifest) = ModuleManifest::load(module_dir)? {
        if let Some(found) = declared_copy(module_dir, &manifest, package) {
            return Ok(Some(found));
        }
    }
    search_below(module_dir, package)
}

fn declared_copy(
    module_dir: &Path,
    manifest: &ModuleManifest,
    package: &PackageRef,
) -> Option<PathBuf> {
    manifest
        .packages
        .iter()
        .filter(|declared| same_package(declared, package))
        .map(|declared| module_dir.join(&declared.folder))
        .find(|path| is_resolved_package_dir(path))
}

fn same_package(declared: &PackageRef, wanted: &PackageRef) -> bool {
    declared.uri == wanted.uri
        && (declared.version == wanted.version
            || declared.version.is_empty()
            || wanted.version.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    const URI: &str = "https-git://example.com/shared.git";

    fn module(dir: &Path, name: &str, packages: Vec<PackageRef>) {
        fs::create_dir_all(dir).unwrap();
        ModuleManifest {
            name: name.to_string(),
            packages,
        }
        .save(dir)
        .unwrap();
    }

    fn resolved(dir: &Path) {
        fs::create_dir_all(dir.join(".git")).unwrap();
    }

    #[test]
    fn ancestor_copy_is_found() {
        let root = tempdir().unwrap();
        let shared = PackageRef::new(URI, "master", "Shared");
        module(root.path(), "root", vec![shared.clone()]);
        resolved(&root.path().join("Shared"));
        let child = root.path().join("child");
        module(&child, "child", vec![]);

        let found = discover(&child, &shared).unwrap().unwrap();
        assert_eq!(found, root.path().canonicalize().unwrap().join("Shared"));
    }

    #[test]
    fn unresolved_folder_is_ignored() {
        let root = tempdir().unwrap();
        let shared = PackageRef::new(URI, "master", "Shared");
        module(root.path(), "root", vec![shared.clone()]);
        fs::create_dir_all(root.path().join("Shared")).unwrap();
        let child = root.path().join("child");
        module(&child, "child", vec![]);

        assert_eq!(discover(&child, &shared).unwrap(), None);
    }

    #[test]
    fn different_version_is_not_a_match() {
        let root = tempdir().unwrap();
        module(
            root.path(),
            "root",
            vec![PackageRef::new(URI, "v1", "Shared")],
        );
        resolved(&root.path().join("Shared"));
        let child = root.path().join("child");
        module(&child, "child", vec![]);

        let wanted = PackageRef::new(URI, "v2", "Shared");
        assert_eq!(discover(&child, &wanted).unwrap(), None);
    }

    #[test]
    fn submodule_copy_is_found_below() {
        let root = tempdir().unwrap();
        let shared = PackageRef::new(URI, "", "Shared");
        module(root.path(), "root", vec![]);
        let nested = root.path().join("a").join("b");
        module(&root.path().join("a"), "a", vec![]);
        module(&nested, "b", vec![shared.clone()]);
        resolved(&nested.join("Shared"));

        let found = discover(root.path(), &shared).unwrap().unwrap();
        assert!(found.ends_with("a/b/Shared"));
    }
}
