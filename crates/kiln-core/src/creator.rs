//! Package creation: the producer side of the archive format.

use std::io::Write;
use std::path::Path;

use kiln_schema::ArchiveFormat;

use crate::archive::{self, ArchiveError, TarWriter};
use crate::dedup::DeduplicationState;
use crate::filter::FileFilterMapping;

/// What went into an archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreateSummary {
    pub format: ArchiveFormat,
    pub directories: usize,
    pub files: usize,
    pub links: usize,
    pub compressed_size: u64,
}

/// Pack the files of `mapping` (sources relative to `base`) into `target`.
///
/// `format_tag` is `tar/gzip` or `tar/lzma`; anything else packs as LZMA.
pub fn create<W: Write>(
    target: &mut W,
    mapping: &FileFilterMapping,
    base: &Path,
    format_tag: &str,
) -> Result<CreateSummary, ArchiveError> {
    let format = ArchiveFormat::from_tag_or_default(format_tag);
    if ArchiveFormat::from_tag(format_tag) != Some(format) {
        tracing::debug!("Unknown archive format '{format_tag}', packing as {format}");
    }
    create_with_format(target, mapping, base, format)
}

pub fn create_with_format<W: Write>(
    target: &mut W,
    mapping: &FileFilterMapping,
    base: &Path,
    format: ArchiveFormat,
) -> Result<CreateSummary, ArchiveError> {
    // Directories first, then files, each in lexical order.
    let mut ordered: Vec<(&Path, &str)> = mapping.iter().collect();
    ordered.sort_by(|a, b| {
        let a_dir = a.1.ends_with('/');
        let b_dir = b.1.ends_with('/');
        b_dir.cmp(&a_dir).then_with(|| a.1.cmp(b.1))
    });

    let mut state = DeduplicationState::new();
    let mut directories = 0;
    for (source, dest) in ordered {
        if dest.ends_with('/') {
            state.add_directory(dest);
            directories += 1;
        } else {
            state.add_file(&base.join(source), dest)?;
        }
    }

    let mut writer = TarWriter::new(Vec::new());
    state.push_to_tar(&mut writer)?;
    let tar_bytes = writer.finish()?;

    let compressed = archive::compress(format, &tar_bytes)?;
    target.write_all(&compressed)?;
    target.flush()?;

    let files = state.unique_contents();
    let summary = CreateSummary {
        format,
        directories,
        files,
        links: state.hashes().count() - files,
        compressed_size: compressed.len() as u64,
    };
    tracing::debug!(
        "Packed {} files ({} deduplicated) into {} bytes of {}",
        summary.files,
        summary.links,
        summary.compressed_size,
        format
    );
    Ok(summary)
}
