//! Pack command

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use anyhow::{Context, Result, bail};
use kiln_core::creator;
use kiln_core::filter::FileFilter;
use kiln_core::{Reporter, archive};

use crate::ui::format_size;

/// Rules used when no filter file is given.
const PACK_EVERYTHING: &str = "include .*\n";

/// Pack `dir` into the archive at `output`.
pub fn pack(
    dir: &Path,
    output: &Path,
    filter: Option<&Path>,
    format: &str,
    reporter: &dyn Reporter,
) -> Result<()> {
    let rules = match filter {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read filter file {}", path.display()))?,
        None => PACK_EVERYTHING.to_string(),
    };

    let filter = FileFilter::from_rules(dir, &rules)
        .with_context(|| format!("Failed to apply filter to {}", dir.display()))?;
    if filter.mapping().is_empty() {
        bail!("No files in {} matched the filter", dir.display());
    }

    if let Some(expected) = archive::detect_format(output)
        .ok()
        .filter(|expected| expected.tag() != format)
    {
        reporter.warning(&format!(
            "{} has a {expected} extension but will be written as {format}",
            output.display()
        ));
    }

    let file = File::create(output)
        .with_context(|| format!("Failed to create {}", output.display()))?;
    let mut writer = BufWriter::new(file);
    let summary = creator::create(&mut writer, filter.mapping(), dir, format)?;

    reporter.info(&format!(
        "Packed {} files ({} deduplicated, {} directories) into {} as {}",
        summary.files,
        summary.links,
        summary.directories,
        format_size(summary.compressed_size),
        summary.format
    ));
    Ok(())
}
