//! ustar headers and tar stream reading/writing.
//!
//! Headers are 512-byte ustar blocks: names up to 100 bytes go in `name`,
//! longer names are split on a `/` into a 155-byte `prefix` and a 100-byte
//! `name`. Numeric fields are octal and the checksum is the unsigned byte
//! sum of the header with the checksum field read as spaces. Metadata is
//! fixed (mtime 0, uid/gid 0) so identical inputs give identical streams.

use std::io::{Read, Write};

use super::ArchiveError;

const NAME_LEN: usize = 100;
const PREFIX_LEN: usize = 155;

const FILE_MODE: u32 = 0o644;
const MAX_PREALLOC: u64 = 1 << 20;
const DIR_MODE: u32 = 0o755;

/// Split `name` into the ustar `(prefix, name)` pair.
///
/// Fails with [`ArchiveError::NameTooLong`] when no `/` gives a prefix of at
/// most 155 bytes and a non-empty suffix of at most 100 bytes.
pub fn split_ustar_name(name: &str) -> Result<(&str, &str), ArchiveError> {
    let bytes = name.as_bytes();
    if bytes.len() <= NAME_LEN {
        return Ok(("", name));
    }

    for (i, b) in bytes.iter().enumerate() {
        if i > PREFIX_LEN {
            break;
        }
        let suffix_len = bytes.len() - i - 1;
        if *b == b'/' && suffix_len > 0 && suffix_len <= NAME_LEN {
            return Ok((&name[..i], &name[i + 1..]));
        }
    }

    Err(ArchiveError::NameTooLong(name.to_string()))
}

/// One entry read back from a tar stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArchiveEntry {
    File { path: String, data: Vec<u8> },
    Directory { path: String },
    /// Zero-length entry whose content is that of `target`, an earlier entry.
    HardLink { path: String, target: String },
}

/// Writes a tar stream entry by entry.
pub struct TarWriter<W: Write> {
    builder: tar::Builder<W>,
}

impl<W: Write> std::fmt::Debug for TarWriter<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TarWriter").finish_non_exhaustive()
    }
}

impl<W: Write> TarWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            builder: tar::Builder::new(inner),
        }
    }

    /// Append a regular file of `size` bytes read from `data`.
    pub fn append_file<R: Read>(
        &mut self,
        name: &str,
        size: u64,
        data: R,
    ) -> Result<(), ArchiveError> {
        let header = build_header(name, tar::EntryType::Regular, size, FILE_MODE, None)?;
        self.builder.append(&header, data)?;
        Ok(())
    }

    /// Append a directory entry. A trailing `/` is added when missing.
    pub fn append_directory(&mut self, name: &str) -> Result<(), ArchiveError> {
        let name = if name.ends_with('/') {
            name.to_string()
        } else {
            format!("{name}/")
        };
        let header = build_header(&name, tar::EntryType::Directory, 0, DIR_MODE, None)?;
        self.builder.append(&header, std::io::empty())?;
        Ok(())
    }

    /// Append a hard-link entry at `name` pointing at the earlier entry `target`.
    ///
    /// Targets longer than the 100-byte `linkname` field are carried in a
    /// preceding GNU long-link record.
    pub fn append_hard_link(&mut self, name: &str, target: &str) -> Result<(), ArchiveError> {
        if target.len() <= NAME_LEN {
            let header = build_header(name, tar::EntryType::Link, 0, FILE_MODE, Some(target))?;
            self.builder.append(&header, std::io::empty())?;
        } else {
            let mut header = build_header(name, tar::EntryType::Link, 0, FILE_MODE, None)?;
            self.builder.append_link(&mut header, name, target)?;
        }
        Ok(())
    }

    /// Write the two terminating zero blocks and return the inner writer.
    pub fn finish(self) -> Result<W, ArchiveError> {
        Ok(self.builder.into_inner()?)
    }
}

fn build_header(
    name: &str,
    entry_type: tar::EntryType,
    size: u64,
    mode: u32,
    link_target: Option<&str>,
) -> Result<tar::Header, ArchiveError> {
    let (prefix, suffix) = split_ustar_name(name)?;

    let mut header = tar::Header::new_ustar();
    {
        let ustar = header
            .as_ustar_mut()
            .ok_or_else(|| ArchiveError::UnsupportedFormat("non-ustar header".to_string()))?;
        ustar.name = [0; NAME_LEN];
        ustar.name[..suffix.len()].copy_from_slice(suffix.as_bytes());
        ustar.prefix = [0; PREFIX_LEN];
        ustar.prefix[..prefix.len()].copy_from_slice(prefix.as_bytes());

        if let Some(target) = link_target {
            ustar.linkname = [0; NAME_LEN];
            ustar.linkname[..target.len()].copy_from_slice(target.as_bytes());
        }
    }

    header.set_entry_type(entry_type);
    header.set_size(size);
    header.set_mode(mode);
    header.set_mtime(0);
    header.set_uid(0);
    header.set_gid(0);
    header.set_cksum();
    Ok(header)
}

/// Read every entry of a tar stream in order, handing each to `visit`.
///
/// Entry types other than regular files, directories and hard links are
/// skipped.
pub fn read_entries<R, F>(reader: R, mut visit: F) -> Result<(), ArchiveError>
where
    R: Read,
    F: FnMut(ArchiveEntry) -> Result<(), ArchiveError>,
{
    let mut archive = tar::Archive::new(reader);

    for entry in archive.entries()? {
        let mut entry = entry?;
        let path = normalize(&entry.path()?.to_string_lossy());
        let entry_type = entry.header().entry_type();

        let item = match entry_type {
            tar::EntryType::Regular | tar::EntryType::Continuous => {
                // The size field is untrusted; cap the up-front allocation.
                let mut data = Vec::with_capacity(entry.size().min(MAX_PREALLOC) as usize);
                entry.read_to_end(&mut data)?;
                ArchiveEntry::File {
                    path: path.trim_end_matches('/').to_string(),
                    data,
                }
            }
            tar::EntryType::Directory => ArchiveEntry::Directory {
                path: if path.ends_with('/') {
                    path
                } else {
                    format!("{path}/")
                },
            },
            tar::EntryType::Link => {
                let target = entry
                    .link_name()?
                    .map(|t| normalize(&t.to_string_lossy()))
                    .ok_or_else(|| ArchiveError::InvalidPath(format!("{path} (link without target)")))?;
                ArchiveEntry::HardLink { path, target }
            }
            other => {
                tracing::debug!("Skipping unsupported tar entry {path} ({other:?})");
                continue;
            }
        };

        visit(item)?;
    }

    Ok(())
}

fn normalize(path: &str) -> String {
    path.replace('\\', "/")
}
