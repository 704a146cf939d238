//! Content deduplication for archive builds.
//!
//! Files are keyed by the hash of their bytes, not by package: the first
//! occurrence of some content is stored in full and every later occurrence
//! becomes a zero-length hard-link entry pointing at the first one.

use std::collections::HashMap;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use kiln_schema::ContentHash;

use crate::archive::{ArchiveError, TarWriter};

/// A recorded archive entry, in write order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DedupEntry {
    Directory {
        dest: String,
    },
    File {
        dest: String,
        source: PathBuf,
        hash: ContentHash,
    },
    Link {
        dest: String,
        target: String,
        hash: ContentHash,
    },
}

impl DedupEntry {
    pub fn dest(&self) -> &str {
        match self {
            Self::Directory { dest } | Self::File { dest, .. } | Self::Link { dest, .. } => dest,
        }
    }
}

/// State of one archive build. Never shared between builds.
#[derive(Debug, Default)]
pub struct DeduplicationState {
    first_seen: HashMap<ContentHash, String>,
    entries: Vec<DedupEntry>,
}

impl DeduplicationState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `source` at `dest`, as a link if its content was seen before.
    pub fn add_file(&mut self, source: &Path, dest: &str) -> std::io::Result<()> {
        let hash = ContentHash::compute_file(source)?;

        let entry = match self.first_seen.get(&hash) {
            Some(first) => {
                tracing::debug!("Deduplicated {dest} -> {first}");
                DedupEntry::Link {
                    dest: dest.to_string(),
                    target: first.clone(),
                    hash,
                }
            }
            None => {
                self.first_seen.insert(hash.clone(), dest.to_string());
                DedupEntry::File {
                    dest: dest.to_string(),
                    source: source.to_path_buf(),
                    hash,
                }
            }
        };

        self.entries.push(entry);
        Ok(())
    }

    /// Record a directory. Directories are never deduplicated.
    pub fn add_directory(&mut self, dest: &str) {
        self.entries.push(DedupEntry::Directory {
            dest: dest.to_string(),
        });
    }

    pub fn entries(&self) -> &[DedupEntry] {
        &self.entries
    }

    /// `(destination, content hash)` of every file and link, in write order.
    pub fn hashes(&self) -> impl Iterator<Item = (&str, &ContentHash)> {
        self.entries.iter().filter_map(|e| match e {
            DedupEntry::File { dest, hash, .. } | DedupEntry::Link { dest, hash, .. } => {
                Some((dest.as_str(), hash))
            }
            DedupEntry::Directory { .. } => None,
        })
    }

    /// Number of distinct contents stored in full.
    pub fn unique_contents(&self) -> usize {
        self.first_seen.len()
    }

    /// Serialize every recorded entry into `writer`, in the order added.
    pub fn push_to_tar<W: Write>(&self, writer: &mut TarWriter<W>) -> Result<(), ArchiveError> {
        for entry in &self.entries {
            match entry {
                DedupEntry::Directory { dest } => writer.append_directory(dest)?,
                DedupEntry::File { dest, source, .. } => {
                    let file = File::open(source)?;
                    let size = file.metadata()?.len();
                    writer.append_file(dest, size, file)?;
                }
                DedupEntry::Link { dest, target, .. } => writer.append_hard_link(dest, target)?,
            }
        }
        Ok(())
    }
}
