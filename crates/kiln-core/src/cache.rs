//! The shared package cache.
//!
//! Binary entries are `<sha1(uri)>-<sha1(version)>-<platform>.tar.lzma` (or
//! `.tar.gz`); source entries are bare git mirrors named
//! `<sha1(uri)>-<sha1("")>-Source`. Entries are only ever added or refreshed,
//! never deleted wholesale.

use std::path::PathBuf;

use kiln_schema::{ArchiveFormat, CacheKey};
use thiserror::Error;

use crate::config::RetryPolicy;
use crate::io::git::{GitClient, GitError, is_bare_repository};
use crate::paths::CacheDir;
use crate::reporter::Reporter;
use crate::retrieval::{PackageRetrieval, RetrievalError, write_with_retry};

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Cache IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Retrieval(#[from] RetrievalError),

    #[error(transparent)]
    Git(#[from] GitError),
}

#[derive(Debug, Clone)]
pub struct PackageCache {
    dir: CacheDir,
    retrieval: PackageRetrieval,
    retry: RetryPolicy,
}

impl PackageCache {
    pub fn new(dir: CacheDir, retrieval: PackageRetrieval, retry: RetryPolicy) -> Self {
        Self {
            dir,
            retrieval,
            retry,
        }
    }

    pub fn dir(&self) -> &CacheDir {
        &self.dir
    }

    fn effective_uri(&self, uri: &str) -> String {
        self.retrieval.lookup().effective_uri(uri)
    }

    /// Existing binary entry for the package, LZMA preferred over gzip.
    pub fn binary_entry(
        &self,
        uri: &str,
        version: &str,
        platform: &str,
    ) -> Option<(PathBuf, ArchiveFormat)> {
        let key = CacheKey::binary(&self.effective_uri(uri), version, platform);
        ArchiveFormat::BINARY_PREFERENCE
            .into_iter()
            .map(|format| (self.dir.entry(&key.file_name(format)), format))
            .find(|(path, _)| path.is_file())
    }

    pub fn has_binary_package(&self, uri: &str, version: &str, platform: &str) -> bool {
        self.binary_entry(uri, version, platform).is_some()
    }

    /// Path of the source mirror for `uri`, whether or not it exists yet.
    pub fn source_entry(&self, uri: &str) -> PathBuf {
        let key = CacheKey::source(&self.effective_uri(uri));
        self.dir.entry(&key.file_name(ArchiveFormat::SourceDirectory))
    }

    pub fn has_source_package(&self, uri: &str) -> bool {
        self.source_entry(uri).is_dir()
    }

    /// Binary archive for the package, from the cache or freshly retrieved.
    ///
    /// `Ok(None)` means no binary exists and source should be used.
    pub async fn get_binary_package(
        &self,
        uri: &str,
        version: &str,
        platform: &str,
        reporter: &dyn Reporter,
    ) -> Result<Option<(Vec<u8>, ArchiveFormat)>, CacheError> {
        if let Some((path, format)) = self.binary_entry(uri, version, platform) {
            tracing::debug!("Cache hit {}", path.display());
            return Ok(Some((tokio::fs::read(&path).await?, format)));
        }

        let Some((bytes, format)) = self
            .retrieval
            .download_binary_package(uri, version, platform, reporter)
            .await?
        else {
            return Ok(None);
        };

        self.dir.ensure()?;
        let key = CacheKey::binary(&self.effective_uri(uri), version, platform);
        let path = self.dir.entry(&key.file_name(format));
        let Some(tmp) = write_with_retry(&path, &bytes, self.retry).await else {
            reporter.warning(&format!(
                "Could not write {}; assuming another process is caching it",
                path.display()
            ));
            return Ok(Some((bytes, format)));
        };

        match tmp.persist(&path) {
            Ok(_) => Ok(Some((bytes, format))),
            Err(e) => {
                tracing::warn!("Rename into {} failed: {}", path.display(), e.error);
                match tokio::fs::read(e.file.path()).await {
                    Ok(written) => Ok(Some((written, format))),
                    Err(_) => Ok(Some((bytes, format))),
                }
            }
        }
    }

    /// Up-to-date bare mirror of `clone_url`, cached under the key of `uri`.
    ///
    /// An existing mirror is fetched (failures only warn); a missing or
    /// broken one is recreated with a bare clone.
    pub fn get_source_package(
        &self,
        git: &GitClient,
        uri: &str,
        clone_url: &str,
    ) -> Result<PathBuf, CacheError> {
        let path = self.source_entry(uri);

        if path.is_dir() {
            if is_bare_repository(&path) {
                if let Err(e) = git.fetch(&path) {
                    tracing::warn!("Could not update mirror of {uri}: {e}");
                }
                return Ok(path);
            }
            tracing::warn!("Replacing broken mirror {}", path.display());
            std::fs::remove_dir_all(&path)?;
        }

        self.dir.ensure()?;
        tracing::info!("Mirroring {clone_url}");
        git.clone_bare(clone_url, &path)?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NullReporter;
    use crate::io::download::build_client;
    use crate::io::git::fixture;
    use crate::lookup::PackageLookup;
    use crate::redirect::Redirector;
    use std::sync::Arc;

    fn cache_at(dir: &std::path::Path, redirector: Redirector) -> PackageCache {
        let lookup = PackageLookup::new(
            build_client(crate::USER_AGENT).unwrap(),
            CacheDir::at(dir),
            redirector,
        );
        PackageCache::new(
            CacheDir::at(dir),
            PackageRetrieval::new(Arc::new(lookup)),
            RetryPolicy::immediate(2),
        )
    }

    #[test]
    fn lzma_is_probed_before_gzip() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache_at(dir.path(), Redirector::in_memory());
        let key = CacheKey::binary("https://p/lib", "1.0", "Linux");
        std::fs::write(dir.path().join(key.file_name(ArchiveFormat::TarGzip)), b"gz").unwrap();
        assert_eq!(
            cache.binary_entry("https://p/lib", "1.0", "Linux").map(|(_, f)| f),
            Some(ArchiveFormat::TarGzip)
        );

        std::fs::write(dir.path().join(key.file_name(ArchiveFormat::TarLzma)), b"xz").unwrap();
        assert_eq!(
            cache.binary_entry("https://p/lib", "1.0", "Linux").map(|(_, f)| f),
            Some(ArchiveFormat::TarLzma)
        );
        assert!(!cache.has_binary_package("https://p/lib", "1.1", "Linux"));
    }

    #[tokio::test]
    async fn cached_bytes_are_returned_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache_at(dir.path(), Redirector::in_memory());
        let key = CacheKey::binary("https://p/lib", "1.0", "Linux");
        std::fs::write(dir.path().join(key.file_name(ArchiveFormat::TarLzma)), b"exact").unwrap();

        let (bytes, format) = cache
            .get_binary_package("https://p/lib", "1.0", "Linux", &NullReporter)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(bytes, b"exact");
        assert_eq!(format, ArchiveFormat::TarLzma);
    }

    #[test]
    fn keys_follow_redirects() {
        let dir = tempfile::tempdir().unwrap();
        let mut redirector = Redirector::in_memory();
        redirector.register("https://old/lib", "https://new/lib");
        let cache = cache_at(dir.path(), redirector);
        assert_eq!(
            cache.source_entry("https://old/lib"),
            cache.source_entry("https://new/lib")
        );
        assert!(!cache.has_source_package("https://old/lib"));
    }

    #[test]
    fn source_mirror_is_created_then_refreshed() {
        let Some(git) = fixture::git() else { return };
        let dir = tempfile::tempdir().unwrap();
        let upstream = dir.path().join("upstream");
        fixture::init_repo(&git, &upstream);
        let uri = format!("local-git://{}", upstream.display());
        let clone_url = upstream.to_string_lossy().into_owned();

        let cache = cache_at(&dir.path().join("cache"), Redirector::in_memory());
        let mirror = cache.get_source_package(&git, &uri, &clone_url).unwrap();
        assert_eq!(mirror, cache.source_entry(&uri));
        assert!(is_bare_repository(&mirror));
        assert!(cache.has_source_package(&uri));

        let second = fixture::commit_file(&git, &upstream, "second.txt", "more");
        let again = cache.get_source_package(&git, &uri, &clone_url).unwrap();
        assert_eq!(again, mirror);
        assert_eq!(
            git.ls_remote(&mirror.to_string_lossy(), "main").unwrap(),
            Some(second)
        );
    }

    #[test]
    fn broken_mirror_is_replaced() {
        let Some(git) = fixture::git() else { return };
        let dir = tempfile::tempdir().unwrap();
        let upstream = dir.path().join("upstream");
        let first = fixture::init_repo(&git, &upstream);
        let uri = format!("local-git://{}", upstream.display());

        let cache = cache_at(&dir.path().join("cache"), Redirector::in_memory());
        let entry = cache.source_entry(&uri);
        std::fs::create_dir_all(&entry).unwrap();
        std::fs::write(entry.join("leftover"), b"partial clone").unwrap();
        assert!(!is_bare_repository(&entry));

        let mirror = cache
            .get_source_package(&git, &uri, &upstream.to_string_lossy())
            .unwrap();
        assert!(is_bare_repository(&mirror));
        assert!(!mirror.join("leftover").exists());
        assert_eq!(
            git.ls_remote(&mirror.to_string_lossy(), "main").unwrap(),
            Some(first)
        );
    }

    #[test]
    fn failed_refresh_keeps_existing_mirror() {
        let Some(git) = fixture::git() else { return };
        let dir = tempfile::tempdir().unwrap();
        let upstream = dir.path().join("upstream");
        let first = fixture::init_repo(&git, &upstream);
        let uri = format!("local-git://{}", upstream.display());
        let clone_url = upstream.to_string_lossy().into_owned();

        let cache = cache_at(&dir.path().join("cache"), Redirector::in_memory());
        let mirror = cache.get_source_package(&git, &uri, &clone_url).unwrap();

        std::fs::remove_dir_all(&upstream).unwrap();
        let again = cache.get_source_package(&git, &uri, &clone_url).unwrap();
        assert_eq!(again, mirror);
        assert!(is_bare_repository(&again));
        assert_eq!(
            git.ls_remote(&again.to_string_lossy(), "main").unwrap(),
            Some(first)
        );
    }
}
