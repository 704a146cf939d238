//! Package retrieval: fetch the prebuilt binary for a package, either from
//! its download map or through a transformer.

use std::path::Path;
use std::sync::Arc;

use kiln_schema::ArchiveFormat;
use tempfile::NamedTempFile;
use thiserror::Error;

use crate::config::RetryPolicy;
use crate::io::download;
use crate::lookup::{LookupError, PackageLookup};
use crate::paths::{filename_from_url, write_temp_sibling};
use crate::protocol::native::download_key;
use crate::reporter::Reporter;
use crate::transform::TransformError;

#[derive(Error, Debug)]
pub enum RetrievalError {
    #[error(transparent)]
    Lookup(#[from] LookupError),

    #[error(transparent)]
    Transform(#[from] TransformError),

    #[error("No binary of {uri} at {version} for {platform}, and the package has no source")]
    NoBinary {
        uri: String,
        version: String,
        platform: String,
    },
}

#[derive(Debug, Clone)]
pub struct PackageRetrieval {
    lookup: Arc<PackageLookup>,
}

impl PackageRetrieval {
    pub fn new(lookup: Arc<PackageLookup>) -> Self {
        Self { lookup }
    }

    pub fn lookup(&self) -> &PackageLookup {
        &self.lookup
    }

    /// Fetch the binary archive of `uri` at `version` for `platform`.
    ///
    /// Returns `Ok(None)` when there is no usable binary but the package can
    /// still be built from source.
    pub async fn download_binary_package(
        &self,
        uri: &str,
        version: &str,
        platform: &str,
        reporter: &dyn Reporter,
    ) -> Result<Option<(Vec<u8>, ArchiveFormat)>, RetrievalError> {
        let result = self.lookup.lookup(uri, platform, false, reporter).await?;

        if let Some(transformer) = &result.transformer {
            let packed = transformer
                .transform(self.lookup.client(), version, platform, reporter)
                .await?;
            return Ok(Some(packed));
        }

        let key = download_key(result.resolve_version(version), platform);
        let Some(url) = result.download_map.get(&key) else {
            if result.source_location.is_empty() {
                return Err(RetrievalError::NoBinary {
                    uri: uri.to_string(),
                    version: version.to_string(),
                    platform: platform.to_string(),
                });
            }
            tracing::debug!("No binary for {key} of {uri}, source will be used");
            return Ok(None);
        };

        let format = result
            .archive_type_map
            .get(&key)
            .and_then(|tag| ArchiveFormat::from_tag(tag))
            .filter(|f| *f != ArchiveFormat::SourceDirectory)
            .or_else(|| ArchiveFormat::from_path(Path::new(filename_from_url(url))))
            .unwrap_or(ArchiveFormat::TarLzma);

        match download::fetch_bytes(self.lookup.client(), url, reporter).await {
            Ok(bytes) => Ok(Some((bytes, format))),
            Err(e) => {
                tracing::warn!("Binary download of {uri} failed: {e}");
                reporter.warning(&format!("Could not download binary for {uri}, using source"));
                Ok(None)
            }
        }
    }
}

/// Write `bytes` to a fresh temp sibling of `path`, retrying while the
/// cache directory refuses writes.
///
/// Returns `None` when every attempt failed; the caller assumes another
/// process is completing the same write.
pub async fn write_with_retry(
    path: &Path,
    bytes: &[u8],
    policy: RetryPolicy,
) -> Option<NamedTempFile> {
    for attempt in 1..=policy.attempts {
        match write_temp_sibling(path, bytes) {
            Ok(tmp) => return Some(tmp),
            Err(e) => {
                tracing::debug!(
                    "Write of {} failed (attempt {attempt}/{}): {e}",
                    path.display(),
                    policy.attempts
                );
                if attempt < policy.attempts && !policy.backoff.is_zero() {
                    tokio::time::sleep(policy.backoff).await;
                }
            }
        }
    }
    tracing::warn!(
        "Giving up writing {} after {} attempts",
        path.display(),
        policy.attempts
    );
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NullReporter;
    use crate::io::download::build_client;
    use crate::paths::CacheDir;
    use crate::redirect::Redirector;

    fn retrieval(dir: &Path) -> PackageRetrieval {
        PackageRetrieval::new(Arc::new(PackageLookup::new(
            build_client(crate::USER_AGENT).unwrap(),
            CacheDir::at(dir),
            Redirector::in_memory(),
        )))
    }

    fn index(server_url: &str, git_url: &str) -> String {
        format!(
            r#"{{"has_error":false,"result":{{"type":"library","gitUrl":"{git_url}",
              "versions":[{{"versionName":"v1","platformName":"Linux",
                           "downloadUrl":"{server_url}/blobs/v1-Linux.tar.gz"}}],
              "branches":[{{"branchName":"master","versionName":"v1"}}]}}}}"#
        )
    }

    #[tokio::test]
    async fn branch_resolves_to_binary() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/lib")
            .match_query(mockito::Matcher::Any)
            .with_body(index(&server.url(), "https://g/lib.git"))
            .create_async()
            .await;
        server
            .mock("GET", "/blobs/v1-Linux.tar.gz")
            .with_body("archive")
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let uri = format!("{}/lib", server.url());
        let (bytes, format) = retrieval(dir.path())
            .download_binary_package(&uri, "master", "Linux", &NullReporter)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(bytes, b"archive");
        // No archiveType in the index, so the URL extension decides.
        assert_eq!(format, ArchiveFormat::TarGzip);
    }

    #[tokio::test]
    async fn missing_platform_falls_back_to_source() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/lib")
            .match_query(mockito::Matcher::Any)
            .with_body(index(&server.url(), "https://g/lib.git"))
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let uri = format!("{}/lib", server.url());
        let got = retrieval(dir.path())
            .download_binary_package(&uri, "master", "Windows", &NullReporter)
            .await
            .unwrap();
        assert!(got.is_none());
    }

    #[tokio::test]
    async fn missing_binary_without_source_is_an_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/lib")
            .match_query(mockito::Matcher::Any)
            .with_body(index(&server.url(), ""))
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let uri = format!("{}/lib", server.url());
        let err = retrieval(dir.path())
            .download_binary_package(&uri, "master", "Windows", &NullReporter)
            .await
            .unwrap_err();
        assert!(matches!(err, RetrievalError::NoBinary { .. }));
    }

    #[tokio::test]
    async fn write_with_retry_gives_up() {
        let dir = tempfile::tempdir().unwrap();
        // A missing parent directory makes every write fail.
        let target = dir.path().join("missing").join("entry.tar.lzma");
        assert!(
            write_with_retry(&target, b"x", RetryPolicy::immediate(3))
                .await
                .is_none()
        );

        let ok = dir.path().join("entry.tar.lzma");
        let tmp = write_with_retry(&ok, b"x", RetryPolicy::immediate(3))
            .await
            .unwrap();
        assert_eq!(std::fs::read(tmp.path()).unwrap(), b"x");
        assert!(!ok.exists());
    }
}
