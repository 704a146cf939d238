//! Package URI redirects.
//!
//! Overrides registered for the current invocation are consulted first, then
//! the persisted redirect file (`original -> replacement` per line, `#`
//! comments). The first match wins and redirects are not chained.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use thiserror::Error;

const ARROW: &str = "->";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid redirect '{0}', expected ORIGINAL=REPLACEMENT")]
pub struct InvalidRedirect(pub String);

#[derive(Debug, Clone, Default)]
pub struct Redirector {
    overrides: Vec<(String, String)>,
    file: Option<PathBuf>,
}

impl Redirector {
    /// A redirector backed by the persisted table at `file`. The file does
    /// not need to exist.
    pub fn new(file: impl Into<PathBuf>) -> Self {
        Self {
            overrides: Vec::new(),
            file: Some(file.into()),
        }
    }

    /// A redirector with no persisted table.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Register an override for this invocation only.
    pub fn register(&mut self, original: impl Into<String>, replacement: impl Into<String>) {
        self.overrides.push((original.into(), replacement.into()));
    }

    /// Parse `ORIGINAL=REPLACEMENT`, the command-line form of an override.
    pub fn register_arg(&mut self, arg: &str) -> Result<(), InvalidRedirect> {
        let invalid = || InvalidRedirect(arg.to_string());
        let (original, replacement) = arg.split_once('=').ok_or_else(invalid)?;
        let (original, replacement) = (original.trim(), replacement.trim());
        if original.is_empty() || replacement.is_empty() {
            return Err(invalid());
        }
        self.register(original, replacement);
        Ok(())
    }

    /// Apply the redirect table to `uri`.
    pub fn redirect(&self, uri: &str) -> String {
        if let Some((_, replacement)) = self.overrides.iter().find(|(o, _)| o == uri) {
            tracing::debug!("Redirecting {uri} -> {replacement} (override)");
            return replacement.clone();
        }

        if let Some(replacement) = self
            .persisted()
            .into_iter()
            .find(|(o, _)| o == uri)
            .map(|(_, r)| r)
        {
            tracing::debug!("Redirecting {uri} -> {replacement}");
            return replacement;
        }

        uri.to_string()
    }

    /// Entries of the persisted table, in file order. A missing or unreadable
    /// file is an empty table.
    pub fn persisted(&self) -> Vec<(String, String)> {
        let Some(path) = &self.file else {
            return Vec::new();
        };
        match fs::read_to_string(path) {
            Ok(content) => parse_redirects(&content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => {
                tracing::warn!("Ignoring redirect file {}: {e}", path.display());
                Vec::new()
            }
        }
    }

    pub fn overrides(&self) -> &[(String, String)] {
        &self.overrides
    }

    /// Append a redirect to the persisted table.
    pub fn add_persistent(&self, original: &str, replacement: &str) -> std::io::Result<()> {
        let Some(path) = &self.file else {
            return Err(std::io::Error::other("no redirect file configured"));
        };
        append_line(path, &format!("{original} {ARROW} {replacement}"))
    }
}

fn append_line(path: &Path, line: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;
    writeln!(file, "{line}")
}

fn parse_redirects(content: &str) -> Vec<(String, String)> {
    let mut out = Vec::new();
    for (idx, raw) in content.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        match line.split_once(ARROW) {
            Some((original, replacement))
                if !original.trim().is_empty() && !replacement.trim().is_empty() =>
            {
                out.push((original.trim().to_string(), replacement.trim().to_string()));
            }
            _ => tracing::warn!("Skipping malformed redirect on line {}: {line}", idx + 1),
        }
    }
    out
}
