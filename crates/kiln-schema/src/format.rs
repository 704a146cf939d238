//! Archive, source and package kind tags.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Container format of a cached or downloaded package.
///
/// Binary packages are always a tar stream wrapped in exactly one
/// compression envelope. Source packages are a bare mirror directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArchiveFormat {
    /// Gzip-compressed tar archive (`.tar.gz`).
    #[serde(rename = "tar/gzip")]
    TarGzip,
    /// LZMA-compressed tar archive (`.tar.lzma`). Preferred write format.
    #[serde(rename = "tar/lzma")]
    TarLzma,
    /// Bare version-control mirror, stored as a directory.
    #[serde(rename = "source")]
    SourceDirectory,
}

impl ArchiveFormat {
    /// Binary formats in the order the cache probes them.
    pub const BINARY_PREFERENCE: [ArchiveFormat; 2] = [ArchiveFormat::TarLzma, ArchiveFormat::TarGzip];

    /// Wire tag used by package indexes and the `pack` command.
    pub const fn tag(self) -> &'static str {
        match self {
            Self::TarGzip => "tar/gzip",
            Self::TarLzma => "tar/lzma",
            Self::SourceDirectory => "source",
        }
    }

    /// File extension for cache entries, including the leading dot.
    ///
    /// Source mirrors are directories and carry no extension.
    pub const fn extension(self) -> &'static str {
        match self {
            Self::TarGzip => ".tar.gz",
            Self::TarLzma => ".tar.lzma",
            Self::SourceDirectory => "",
        }
    }

    /// Parse a wire tag. Returns `None` for anything unrecognised.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag.trim() {
            "tar/gzip" => Some(Self::TarGzip),
            "tar/lzma" => Some(Self::TarLzma),
            "source" => Some(Self::SourceDirectory),
            _ => None,
        }
    }

    /// Parse a wire tag for producing an archive.
    ///
    /// Producers fall back to LZMA for unknown tags (and for `source`, which
    /// is not a byte format).
    pub fn from_tag_or_default(tag: &str) -> Self {
        match Self::from_tag(tag) {
            Some(Self::TarGzip) => Self::TarGzip,
            _ => Self::TarLzma,
        }
    }

    /// Select the envelope from a file name. The envelope is never sniffed
    /// from content.
    pub fn from_path(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_string_lossy().to_lowercase();
        if name.ends_with(".tar.lzma") {
            Some(Self::TarLzma)
        } else if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
            Some(Self::TarGzip)
        } else {
            None
        }
    }
}

impl std::fmt::Display for ArchiveFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}

/// How the source of a package is obtained when no binary is used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceFormat {
    /// A git repository that is mirrored and checked out.
    Git,
    /// A plain directory on the local filesystem.
    Folder,
}

impl std::fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Git => f.write_str("git"),
            Self::Folder => f.write_str("folder"),
        }
    }
}

/// What a package provides to the module that depends on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum PackageKind {
    /// Code referenced by the consuming module (default).
    #[default]
    Library,
    /// A project template used to start a new module.
    Template,
    /// A tool installed once and shared between modules.
    GlobalTool,
}

impl PackageKind {
    /// Map the `type` string reported by a package index.
    ///
    /// Unknown values are treated as libraries.
    pub fn from_index_type(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "template" => Self::Template,
            "global-tool" | "globaltool" => Self::GlobalTool,
            _ => Self::Library,
        }
    }
}
