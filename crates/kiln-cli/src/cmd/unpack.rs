//! Unpack command

use std::path::Path;

use anyhow::{Context, Result};
use kiln_core::archive;
use kiln_core::redup::Reduplicator;
use kiln_core::Reporter;

/// Extract `archive_path` into `dest`. The format comes from the extension.
pub fn unpack(
    archive_path: &Path,
    dest: &Path,
    hard_links: bool,
    reporter: &dyn Reporter,
) -> Result<()> {
    let format = archive::detect_format(archive_path)?;
    let bytes = std::fs::read(archive_path)
        .with_context(|| format!("Failed to read {}", archive_path.display()))?;

    let files = Reduplicator::new(dest)
        .with_hard_links(hard_links)
        .extract_archive(format, &bytes)
        .with_context(|| format!("Failed to extract {}", archive_path.display()))?;

    reporter.info(&format!("Extracted {} files into {}", files.len(), dest.display()));
    Ok(())
}
