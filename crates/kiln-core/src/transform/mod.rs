//! Transformers: build a native package archive on the fly from a foreign
//! package format.

pub mod nuget;

use kiln_schema::{ArchiveFormat, ManifestError};
use reqwest::Client;
use thiserror::Error;

use crate::archive::ArchiveError;
use crate::filter::FilterError;
use crate::io::download::DownloadError;
use crate::reporter::Reporter;

#[derive(Error, Debug)]
pub enum TransformError {
    #[error(transparent)]
    Download(#[from] DownloadError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Archive(#[from] ArchiveError),

    #[error(transparent)]
    Filter(#[from] FilterError),

    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error("Failed to write package descriptor: {0}")]
    Descriptor(#[from] toml::ser::Error),

    #[error("{package_id} has no published versions")]
    NoVersions { package_id: String },

    #[error("unzip failed on {package}: {stderr}")]
    Unzip { package: String, stderr: String },
}

/// A NuGet package on a v3 feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NuGetSource {
    /// The package URI as written by the user.
    pub index_uri: String,
    pub package_id: String,
    /// Flat container root (`PackageBaseAddress/3.0.0`), without a trailing `/`.
    pub base_address: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transformer {
    NuGet(NuGetSource),
}

impl Transformer {
    /// Produce archive bytes for `version` on `platform`.
    pub async fn transform(
        &self,
        client: &Client,
        version: &str,
        platform: &str,
        reporter: &dyn Reporter,
    ) -> Result<(Vec<u8>, ArchiveFormat), TransformError> {
        match self {
            Self::NuGet(source) => nuget::transform(source, client, version, platform, reporter).await,
        }
    }
}
