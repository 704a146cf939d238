//! Native package indexes served over HTTP(S).
//!
//! `GET <uri>?json=true` returns:
//!
//! ```json
//! { "has_error": false, "error": null,
//!   "result": { "type": "library", "gitUrl": "https://...",
//!               "versions": [{ "versionName": "...", "platformName": "...",
//!                              "downloadUrl": "...", "archiveType": "tar/lzma" }],
//!               "branches": [{ "branchName": "master", "versionName": "..." }] } }
//! ```

use std::collections::BTreeMap;

use kiln_schema::PackageKind;
use serde::Deserialize;

use super::{PackageMetadata, ResolveContext};
use crate::io::download;
use crate::lookup::LookupError;
use crate::paths;

#[derive(Debug, Deserialize)]
struct IndexResponse {
    #[serde(default)]
    has_error: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    result: Option<IndexResult>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IndexResult {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    git_url: String,
    #[serde(default)]
    versions: Vec<IndexVersion>,
    #[serde(default)]
    branches: Vec<IndexBranch>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IndexVersion {
    version_name: String,
    platform_name: String,
    download_url: String,
    #[serde(default)]
    archive_type: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IndexBranch {
    branch_name: String,
    version_name: String,
}

/// Key of the download and archive-type maps.
pub fn download_key(version: &str, platform: &str) -> String {
    format!("{version}-{platform}")
}

/// The index query URL for a package URI.
pub fn query_url(uri: &str) -> String {
    let sep = if uri.contains('?') { '&' } else { '?' };
    format!("{uri}{sep}json=true")
}

pub async fn resolve(ctx: ResolveContext<'_>, uri: &str) -> Result<PackageMetadata, LookupError> {
    let cached = ctx.cache.lookup_entry(uri);

    if ctx.prefer_cache {
        if let Ok(body) = std::fs::read(&cached) {
            tracing::debug!("Using cached index for {uri}");
            return parse_index(uri, &body);
        }
    }

    match download::fetch_bytes(ctx.client, &query_url(uri), ctx.reporter).await {
        Ok(body) => {
            let metadata = parse_index(uri, &body)?;
            if let Err(e) = paths::write_via_temp(&cached, &body) {
                tracing::warn!("Could not cache index for {uri}: {e}");
            }
            Ok(metadata)
        }
        Err(e) => match std::fs::read(&cached) {
            Ok(body) => {
                tracing::warn!("Index for {uri} unreachable ({e}), using cached copy");
                ctx.reporter
                    .warning(&format!("{uri} is unreachable, using cached index"));
                parse_index(uri, &body)
            }
            Err(_) => Err(e.into()),
        },
    }
}

/// Decode an index response into package metadata.
pub fn parse_index(uri: &str, body: &[u8]) -> Result<PackageMetadata, LookupError> {
    let response: IndexResponse =
        serde_json::from_slice(body).map_err(|source| LookupError::Json {
            uri: uri.to_string(),
            source,
        })?;

    if response.has_error {
        return Err(LookupError::Index {
            uri: uri.to_string(),
            message: response
                .error
                .unwrap_or_else(|| "unspecified index error".to_string()),
        });
    }
    let result = response.result.ok_or_else(|| LookupError::Index {
        uri: uri.to_string(),
        message: "response has no result".to_string(),
    })?;

    let mut download_map = BTreeMap::new();
    let mut archive_type_map = BTreeMap::new();
    for v in result.versions {
        let key = download_key(&v.version_name, &v.platform_name);
        if !v.archive_type.is_empty() {
            archive_type_map.insert(key.clone(), v.archive_type);
        }
        download_map.insert(key, v.download_url);
    }

    let resolved_version_map = result
        .branches
        .into_iter()
        .map(|b| (b.branch_name, b.version_name))
        .collect();

    Ok(PackageMetadata::Native {
        source_uri: result.git_url,
        package_kind: PackageKind::from_index_type(&result.kind),
        download_map,
        archive_type_map,
        resolved_version_map,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const INDEX: &str = r#"{
        "has_error": false,
        "result": {
            "type": "library",
            "gitUrl": "https://git.example.com/lib.git",
            "versions": [
                { "versionName": "abc123", "platformName": "Linux",
                  "downloadUrl": "https://cdn.example.com/abc123-Linux.tar.lzma",
                  "archiveType": "tar/lzma" },
                { "versionName": "abc123", "platformName": "Windows",
                  "downloadUrl": "https://cdn.example.com/abc123-Windows.tar.gz" }
            ],
            "branches": [ { "branchName": "master", "versionName": "abc123" } ]
        }
    }"#;

    #[test]
    fn parses_maps() {
        let PackageMetadata::Native {
            source_uri,
            package_kind,
            download_map,
            archive_type_map,
            resolved_version_map,
        } = parse_index("https://idx/lib", INDEX.as_bytes()).unwrap()
        else {
            panic!("expected native metadata");
        };

        assert_eq!(source_uri, "https://git.example.com/lib.git");
        assert_eq!(package_kind, PackageKind::Library);
        assert_eq!(
            download_map.get("abc123-Linux").map(String::as_str),
            Some("https://cdn.example.com/abc123-Linux.tar.lzma")
        );
        assert_eq!(download_map.len(), 2);
        assert_eq!(
            archive_type_map.get("abc123-Linux").map(String::as_str),
            Some("tar/lzma")
        );
        assert!(!archive_type_map.contains_key("abc123-Windows"));
        assert_eq!(
            resolved_version_map.get("master").map(String::as_str),
            Some("abc123")
        );
    }

    #[test]
    fn index_error_is_reported() {
        let err = parse_index(
            "https://idx/lib",
            br#"{"has_error": true, "error": "no such package"}"#,
        )
        .unwrap_err();
        assert!(matches!(err, LookupError::Index { message, .. } if message == "no such package"));
    }

    #[test]
    fn query_url_appends_flag() {
        assert_eq!(query_url("https://idx/lib"), "https://idx/lib?json=true");
        assert_eq!(query_url("https://idx/lib?a=1"), "https://idx/lib?a=1&json=true");
    }
}
