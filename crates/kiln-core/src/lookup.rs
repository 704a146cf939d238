//! Package lookup: from a package URI to everything needed to fetch it.

use std::collections::BTreeMap;

use kiln_schema::{LOCAL_POINTER_SCHEME, PackageKind, SourceFormat};
use reqwest::Client;
use thiserror::Error;

use crate::io::download::DownloadError;
use crate::paths::CacheDir;
use crate::protocol::{self, PackageMetadata, ProtocolKind, ResolveContext};
use crate::redirect::Redirector;
use crate::reporter::Reporter;
use crate::transform::Transformer;

#[derive(Error, Debug)]
pub enum LookupError {
    #[error("No protocol handles '{0}'")]
    UnknownScheme(String),

    #[error("Internal error: {0} is a resolved local pointer and cannot be looked up")]
    LocalPointer(String),

    #[error("Package index error for {uri}: {message}")]
    Index { uri: String, message: String },

    #[error("Invalid index response for {uri}: {source}")]
    Json {
        uri: String,
        source: serde_json::Error,
    },

    #[error(transparent)]
    Download(#[from] DownloadError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Where a package comes from and which prebuilt binaries exist for it.
#[derive(Debug, Clone)]
pub struct LookupResult {
    /// Clone URL, folder path, or (for transformed packages) the original URI.
    pub source_location: String,
    pub source_format: SourceFormat,
    pub package_kind: PackageKind,
    /// `"<version>-<platform>"` to download URL.
    pub download_map: BTreeMap<String, String>,
    /// `"<version>-<platform>"` to archive format tag.
    pub archive_type_map: BTreeMap<String, String>,
    /// Branch name to the version that branch currently points at.
    pub resolved_version_map: BTreeMap<String, String>,
    pub transformer: Option<Transformer>,
}

impl LookupResult {
    fn from_metadata(metadata: PackageMetadata) -> Self {
        let empty = |source_location: String, source_format| Self {
            source_location,
            source_format,
            package_kind: PackageKind::Library,
            download_map: BTreeMap::new(),
            archive_type_map: BTreeMap::new(),
            resolved_version_map: BTreeMap::new(),
            transformer: None,
        };

        match metadata {
            PackageMetadata::Folder { path } => {
                empty(path.to_string_lossy().into_owned(), SourceFormat::Folder)
            }
            PackageMetadata::Git {
                clone_url,
                package_kind,
            } => Self {
                package_kind,
                ..empty(clone_url, SourceFormat::Git)
            },
            PackageMetadata::NuGet(source) => {
                let transformer = Some(Transformer::NuGet(source.clone()));
                Self {
                    transformer,
                    ..empty(source.index_uri, SourceFormat::Git)
                }
            }
            PackageMetadata::Native {
                source_uri,
                package_kind,
                download_map,
                archive_type_map,
                resolved_version_map,
            } => Self {
                source_location: source_uri,
                source_format: SourceFormat::Git,
                package_kind,
                download_map,
                archive_type_map,
                resolved_version_map,
                transformer: None,
            },
        }
    }

    /// Resolve a branch name to the version it points at. Anything else is
    /// returned unchanged.
    pub fn resolve_version<'a>(&'a self, version: &'a str) -> &'a str {
        self.resolved_version_map
            .get(version)
            .map_or(version, String::as_str)
    }
}

/// Resolves package URIs through the redirect table and the protocol table.
#[derive(Debug, Clone)]
pub struct PackageLookup {
    client: Client,
    cache: CacheDir,
    redirector: Redirector,
}

impl PackageLookup {
    pub fn new(client: Client, cache: CacheDir, redirector: Redirector) -> Self {
        Self {
            client,
            cache,
            redirector,
        }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn redirector(&self) -> &Redirector {
        &self.redirector
    }

    /// URI after applying redirects.
    pub fn effective_uri(&self, uri: &str) -> String {
        self.redirector.redirect(uri)
    }

    /// Look up `uri`.
    ///
    /// With `prefer_cache` a cached index response is used without touching
    /// the network.
    pub async fn lookup(
        &self,
        uri: &str,
        platform: &str,
        prefer_cache: bool,
        reporter: &dyn Reporter,
    ) -> Result<LookupResult, LookupError> {
        let effective = self.effective_uri(uri);
        if effective.starts_with(LOCAL_POINTER_SCHEME) {
            return Err(LookupError::LocalPointer(effective));
        }

        let kind = ProtocolKind::for_uri(&effective)
            .ok_or_else(|| LookupError::UnknownScheme(effective.clone()))?;
        tracing::debug!("Looking up {effective} for {platform} via {kind:?}");

        let ctx = ResolveContext {
            client: &self.client,
            cache: &self.cache,
            reporter,
            prefer_cache,
        };
        let metadata = protocol::resolve(kind, ctx, &effective).await?;
        Ok(LookupResult::from_metadata(metadata))
    }
}
