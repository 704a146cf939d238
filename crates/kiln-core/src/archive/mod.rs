//! Archive codec: ustar-compatible tar streams in a gzip or LZMA envelope.
//!
//! The envelope is always chosen from an explicit format tag or the file
//! extension, never by sniffing the content.

pub mod compress;
pub mod ustar;

use std::io;
use std::path::Path;

use kiln_schema::ArchiveFormat;
use thiserror::Error;

pub use compress::{compress, decompress, decompress_reader};
pub use ustar::{ArchiveEntry, TarWriter, read_entries, split_ustar_name};

#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("LZMA error: {0}")]
    Lzma(#[from] xz2::stream::Error),

    #[error("Name too long for a ustar header: {0}")]
    NameTooLong(String),

    #[error("Unsupported archive format: {0}")]
    UnsupportedFormat(String),

    #[error("Invalid path in archive: {0}")]
    InvalidPath(String),
}

/// Pick the envelope for an archive on disk from its extension.
pub fn detect_format(path: &Path) -> Result<ArchiveFormat, ArchiveError> {
    ArchiveFormat::from_path(path)
        .ok_or_else(|| ArchiveError::UnsupportedFormat(path.display().to_string()))
}
