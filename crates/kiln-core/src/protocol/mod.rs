//! Protocol resolvers: turn a package URI into package metadata.
//!
//! Resolvers are a fixed, ordered table. The first kind with a scheme prefix
//! matching the URI claims it.

pub mod folder;
pub mod git;
pub mod native;
pub mod nuget;

use std::collections::BTreeMap;
use std::path::PathBuf;

use kiln_schema::PackageKind;
use reqwest::Client;

use crate::lookup::LookupError;
use crate::paths::CacheDir;
use crate::reporter::Reporter;
use crate::transform::NuGetSource;

/// A family of package URIs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProtocolKind {
    Git,
    NuGet,
    Folder,
    Native,
}

impl ProtocolKind {
    /// Dispatch order.
    pub const ALL: [ProtocolKind; 4] = [Self::Git, Self::NuGet, Self::Folder, Self::Native];

    pub const fn schemes(self) -> &'static [&'static str] {
        match self {
            Self::Git => &["http-git://", "https-git://", "ssh-git://", "local-git://"],
            Self::NuGet => &["http-nuget-v3://", "https-nuget-v3://"],
            Self::Folder => &["local-folder://"],
            Self::Native => &["http://", "https://"],
        }
    }

    pub fn claims(self, uri: &str) -> bool {
        self.schemes().iter().any(|s| uri.starts_with(s))
    }

    /// The first kind that claims `uri`.
    pub fn for_uri(uri: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.claims(uri))
    }
}

/// What a resolver learned about a package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PackageMetadata {
    Folder {
        path: PathBuf,
    },
    Git {
        clone_url: String,
        package_kind: PackageKind,
    },
    NuGet(NuGetSource),
    Native {
        source_uri: String,
        package_kind: PackageKind,
        download_map: BTreeMap<String, String>,
        archive_type_map: BTreeMap<String, String>,
        resolved_version_map: BTreeMap<String, String>,
    },
}

/// Everything a resolver may need besides the URI.
#[derive(Clone, Copy)]
pub struct ResolveContext<'a> {
    pub client: &'a Client,
    pub cache: &'a CacheDir,
    pub reporter: &'a dyn Reporter,
    pub prefer_cache: bool,
}

/// Run the resolver for `kind` on `uri`.
pub async fn resolve(
    kind: ProtocolKind,
    ctx: ResolveContext<'_>,
    uri: &str,
) -> Result<PackageMetadata, LookupError> {
    match kind {
        ProtocolKind::Git => git::resolve(uri),
        ProtocolKind::Folder => folder::resolve(uri),
        ProtocolKind::NuGet => nuget::resolve(ctx, uri).await,
        ProtocolKind::Native => native::resolve(ctx, uri).await,
    }
}

/// Strip the first matching scheme prefix of `kind` from `uri`.
pub(crate) fn strip_scheme(kind: ProtocolKind, uri: &str) -> Option<(&'static str, &str)> {
    kind.schemes()
        .iter()
        .find_map(|s| uri.strip_prefix(s).map(|rest| (*s, rest)))
}
