//! Extraction of deduplicated archives back into full files.

use std::fs;
use std::io::Read;
use std::path::{Component, Path, PathBuf};

use kiln_schema::ArchiveFormat;

use crate::archive::{self, ArchiveEntry, ArchiveError};

/// Expands a tar stream into a directory, materialising hard-link entries as
/// full files.
#[derive(Debug, Clone)]
pub struct Reduplicator {
    dest: PathBuf,
    hard_links: bool,
}

impl Reduplicator {
    pub fn new(dest: impl Into<PathBuf>) -> Self {
        Self {
            dest: dest.into(),
            hard_links: false,
        }
    }

    /// Hard-link repeated files instead of copying them. Falls back to a copy
    /// when the filesystem refuses the link.
    pub fn with_hard_links(mut self, hard_links: bool) -> Self {
        self.hard_links = hard_links;
        self
    }

    /// Decompress `bytes` with the envelope for `format` and extract it.
    pub fn extract_archive(
        &self,
        format: ArchiveFormat,
        bytes: &[u8],
    ) -> Result<Vec<PathBuf>, ArchiveError> {
        let reader = archive::decompress_reader(format, bytes)?;
        self.extract(reader)
    }

    /// Extract an uncompressed tar stream. Returns the files written, in
    /// archive order.
    pub fn extract<R: Read>(&self, tar_stream: R) -> Result<Vec<PathBuf>, ArchiveError> {
        fs::create_dir_all(&self.dest)?;
        let mut written = Vec::new();

        archive::read_entries(tar_stream, |entry| {
            match entry {
                ArchiveEntry::Directory { path } => {
                    fs::create_dir_all(safe_join(&self.dest, &path)?)?;
                }
                ArchiveEntry::File { path, data } => {
                    let target = safe_join(&self.dest, &path)?;
                    if let Some(parent) = target.parent() {
                        fs::create_dir_all(parent)?;
                    }
                    fs::write(&target, data)?;
                    written.push(target);
                }
                ArchiveEntry::HardLink { path, target } => {
                    let source = safe_join(&self.dest, &target)?;
                    if !source.is_file() {
                        return Err(ArchiveError::InvalidPath(format!(
                            "{path} links to {target}, which was not extracted before it"
                        )));
                    }
                    let dest = safe_join(&self.dest, &path)?;
                    if let Some(parent) = dest.parent() {
                        fs::create_dir_all(parent)?;
                    }
                    self.materialize(&source, &dest)?;
                    written.push(dest);
                }
            }
            Ok(())
        })?;

        Ok(written)
    }

    fn materialize(&self, source: &Path, dest: &Path) -> std::io::Result<()> {
        if self.hard_links {
            if dest.exists() {
                fs::remove_file(dest)?;
            }
            match fs::hard_link(source, dest) {
                Ok(()) => return Ok(()),
                Err(e) => tracing::debug!("Hard link failed ({e}), copying {}", dest.display()),
            }
        }
        fs::copy(source, dest)?;
        Ok(())
    }
}

/// Join an archive path onto `root`, refusing anything that would escape it.
fn safe_join(root: &Path, relative: &str) -> Result<PathBuf, ArchiveError> {
    let mut out = root.to_path_buf();
    for component in Path::new(relative).components() {
        match component {
            Component::Normal(part) => out.push(part),
            Component::CurDir => {}
            _ => return Err(ArchiveError::InvalidPath(relative.to_string())),
        }
    }
    Ok(out)
}
