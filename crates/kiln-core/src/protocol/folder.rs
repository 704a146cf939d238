use std::path::PathBuf;

use super::{PackageMetadata, ProtocolKind, strip_scheme};
use crate::lookup::LookupError;

pub fn resolve(uri: &str) -> Result<PackageMetadata, LookupError> {
    let (_, path) = strip_scheme(ProtocolKind::Folder, uri)
        .ok_or_else(|| LookupError::UnknownScheme(uri.to_string()))?;
    Ok(PackageMetadata::Folder {
        path: PathBuf::from(path),
    })
}
