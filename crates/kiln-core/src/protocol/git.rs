use kiln_schema::PackageKind;

use super::{PackageMetadata, ProtocolKind, strip_scheme};
use crate::lookup::LookupError;

/// Map a git package URI to the URL git understands.
///
/// `https-git://host/repo` clones `https://host/repo`; `local-git://path`
/// clones the local path.
pub fn clone_url(uri: &str) -> Option<String> {
    let (scheme, rest) = strip_scheme(ProtocolKind::Git, uri)?;
    Some(match scheme {
        "local-git://" => rest.to_string(),
        _ => format!("{}://{rest}", scheme.trim_end_matches("-git://")),
    })
}

pub fn resolve(uri: &str) -> Result<PackageMetadata, LookupError> {
    let clone_url = clone_url(uri).ok_or_else(|| LookupError::UnknownScheme(uri.to_string()))?;
    Ok(PackageMetadata::Git {
        clone_url,
        package_kind: PackageKind::Library,
    })
}
