use dirs::home_dir;
use kiln_schema::sha1_hex;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Returns the kiln home directory, or None if the user's home cannot be resolved.
pub fn try_kiln_home() -> Option<PathBuf> {
    if let Ok(val) = std::env::var("KILN_HOME") {
        return Some(PathBuf::from(val));
    }
    home_dir().map(|h| h.join(".kiln"))
}

/// Package cache path: `$KILN_CACHE_DIR`, else `~/.kiln/packages`
pub fn try_cache_path() -> Option<PathBuf> {
    if let Ok(val) = std::env::var("KILN_CACHE_DIR") {
        return Some(PathBuf::from(val));
    }
    try_kiln_home().map(|h| h.join("packages"))
}

/// Extract the filename from a URL.
pub fn filename_from_url(url: &str) -> &str {
    url.split('/').next_back().unwrap_or("")
}

/// The shared package cache directory.
///
/// Resolved once per process and passed down explicitly. The directory is
/// created on first write and never removed by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheDir {
    root: PathBuf,
}

impl CacheDir {
    /// Resolve the well-known cache directory from the environment.
    pub fn resolve() -> Option<Self> {
        try_cache_path().map(Self::at)
    }

    /// Use an explicit directory (tests, `--cache-dir`).
    pub fn at(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Create the directory if it does not exist yet.
    pub fn ensure(&self) -> std::io::Result<&Path> {
        std::fs::create_dir_all(&self.root)?;
        Ok(&self.root)
    }

    /// Path of a named entry inside the cache.
    pub fn entry(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// Persisted redirect table: `<cache>/redirects.txt`
    pub fn redirects_file(&self) -> PathBuf {
        self.root.join("redirects.txt")
    }

    /// Last good native index response for `uri`.
    pub fn lookup_entry(&self, uri: &str) -> PathBuf {
        self.root.join(format!("lookup-{}.json", sha1_hex(uri)))
    }
}

/// Write `bytes` to a uniquely named `<name>.*.tmp` sibling of `path`.
///
/// Each writer gets its own file, so concurrent writers never share a temp
/// path. The file is removed on drop unless persisted.
pub fn write_temp_sibling(path: &Path, bytes: &[u8]) -> std::io::Result<NamedTempFile> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let name = path.file_name().unwrap_or_default().to_string_lossy();
    let mut file = tempfile::Builder::new()
        .prefix(&format!("{name}."))
        .suffix(".tmp")
        .tempfile_in(dir)?;
    file.write_all(bytes)?;
    file.as_file().sync_all()?;
    Ok(file)
}

/// Write `bytes` to a temp sibling, then rename it over `path`.
pub fn write_via_temp(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    write_temp_sibling(path, bytes)?
        .persist(path)
        .map(drop)
        .map_err(|e| e.error)
}
