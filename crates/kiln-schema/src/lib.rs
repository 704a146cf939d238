//! Shared types and on-disk formats for kiln.
//!
//! Everything here is plain data: package references, archive format tags,
//! cache keys and the `module.toml` manifest. No network or archive I/O
//! happens in this crate.

pub mod format;
pub mod hash;
pub mod module;
pub mod reference;

// Re-exports
pub use format::*;
pub use hash::*;
pub use module::{
    MODULE_MANIFEST, ManifestError, ModuleManifest, PACKAGE_MARKER, PackageMarker,
    is_resolved_package_dir,
};
pub use reference::{LOCAL_POINTER_SCHEME, PackageRef};
