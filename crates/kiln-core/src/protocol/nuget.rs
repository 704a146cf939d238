//! NuGet v3 feeds.
//!
//! URIs look like `https-nuget-v3://api.nuget.org/v3/index.json|Newtonsoft.Json`:
//! the service index followed by the package id.

use serde::Deserialize;

use super::{PackageMetadata, ProtocolKind, ResolveContext, strip_scheme};
use crate::io::download;
use crate::lookup::LookupError;
use crate::transform::NuGetSource;

const PACKAGE_BASE_ADDRESS: &str = "PackageBaseAddress/3.0.0";

#[derive(Debug, Deserialize)]
struct ServiceIndex {
    #[serde(default)]
    resources: Vec<ServiceResource>,
}

#[derive(Debug, Deserialize)]
struct ServiceResource {
    #[serde(rename = "@id")]
    id: String,
    #[serde(rename = "@type")]
    kind: String,
}

/// Split a NuGet package URI into the service index URL and the package id.
pub fn split_uri(uri: &str) -> Option<(String, String)> {
    let (scheme, rest) = strip_scheme(ProtocolKind::NuGet, uri)?;
    let (index, package_id) = rest.rsplit_once('|')?;
    if index.is_empty() || package_id.trim().is_empty() {
        return None;
    }
    let http = scheme.trim_end_matches("-nuget-v3://");
    Some((format!("{http}://{index}"), package_id.trim().to_string()))
}

pub async fn resolve(ctx: ResolveContext<'_>, uri: &str) -> Result<PackageMetadata, LookupError> {
    let (index_url, package_id) = split_uri(uri).ok_or_else(|| LookupError::Index {
        uri: uri.to_string(),
        message: "expected <feed>/index.json|<package id>".to_string(),
    })?;

    let index: ServiceIndex = download::fetch_json(ctx.client, &index_url, ctx.reporter).await?;
    let base_address = index
        .resources
        .into_iter()
        .find(|r| r.kind.starts_with(PACKAGE_BASE_ADDRESS))
        .map(|r| r.id.trim_end_matches('/').to_string())
        .ok_or_else(|| LookupError::Index {
            uri: uri.to_string(),
            message: format!("service index has no {PACKAGE_BASE_ADDRESS} resource"),
        })?;

    Ok(PackageMetadata::NuGet(NuGetSource {
        index_uri: uri.to_string(),
        package_id,
        base_address,
    }))
}
