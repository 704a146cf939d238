//! File filters: choose which files of a directory go into a package and
//! where they land.
//!
//! A filter file is a list of rules applied in order:
//!
//! ```text
//! # comment
//! include ^bin/.*\.dll$
//! exclude \.pdb$
//! rewrite ^bin/(.*)$ lib/$1
//! ```

use std::path::{Path, PathBuf};

use regex::Regex;
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum FilterError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to walk directory: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("Invalid pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        source: regex::Error,
    },

    #[error("Filter line {line}: {message}")]
    Syntax { line: usize, message: String },
}

/// One rule of a filter file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterRule {
    Include(String),
    Exclude(String),
    Rewrite { pattern: String, replacement: String },
}

/// Insertion-ordered `(source → destination)` pairs with unique
/// destinations. Sources are relative to the base directory; destinations
/// ending in `/` are directory placeholders.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileFilterMapping {
    entries: Vec<(PathBuf, String)>,
}

impl FileFilterMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map `source` to `dest`. An existing entry for `dest` is overwritten in
    /// place.
    pub fn insert(&mut self, source: impl Into<PathBuf>, dest: impl Into<String>) {
        let source = source.into();
        let dest = dest.into();
        match self.entries.iter_mut().find(|(_, d)| *d == dest) {
            Some(existing) => existing.0 = source,
            None => self.entries.push((source, dest)),
        }
    }

    pub fn get(&self, dest: &str) -> Option<&Path> {
        self.entries
            .iter()
            .find(|(_, d)| d == dest)
            .map(|(s, _)| s.as_path())
    }

    pub fn contains_source(&self, source: &Path) -> bool {
        self.entries.iter().any(|(s, _)| s == source)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Path, &str)> {
        self.entries.iter().map(|(s, d)| (s.as_path(), d.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn retain(&mut self, keep: impl FnMut(&(PathBuf, String)) -> bool) {
        self.entries.retain(keep);
    }
}

/// Builds a [`FileFilterMapping`] from the files under a base directory.
#[derive(Debug, Clone)]
pub struct FileFilter {
    base: PathBuf,
    candidates: Vec<String>,
    mapping: FileFilterMapping,
}

impl FileFilter {
    /// Scan `base` for candidate files. Nothing is mapped until a rule
    /// includes it.
    pub fn new(base: &Path) -> Result<Self, FilterError> {
        let mut candidates = Vec::new();
        for entry in WalkDir::new(base).sort_by_file_name() {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            if let Ok(rel) = entry.path().strip_prefix(base) {
                candidates.push(to_slash(rel));
            }
        }

        Ok(Self {
            base: base.to_path_buf(),
            candidates,
            mapping: FileFilterMapping::new(),
        })
    }

    /// Build a filter from a base directory and the text of a filter file.
    /// Directory placeholders are implied for every mapped file.
    pub fn from_rules(base: &Path, rules_text: &str) -> Result<Self, FilterError> {
        let rules = Self::parse_rules(rules_text)?;
        let mut filter = Self::new(base)?;
        filter.apply_rules(&rules)?;
        filter.imply_directories();
        Ok(filter)
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Map every candidate whose relative path matches `pattern` to itself.
    pub fn include(&mut self, pattern: &str) -> Result<usize, FilterError> {
        let re = compile(pattern)?;
        let mut added = 0;
        for candidate in &self.candidates {
            let source = PathBuf::from(candidate);
            if re.is_match(candidate) && !self.mapping.contains_source(&source) {
                self.mapping.insert(source, candidate.clone());
                added += 1;
            }
        }
        Ok(added)
    }

    /// Drop every mapping whose destination matches `pattern`.
    pub fn exclude(&mut self, pattern: &str) -> Result<usize, FilterError> {
        let re = compile(pattern)?;
        let before = self.mapping.len();
        self.mapping.retain(|(_, dest)| !re.is_match(dest));
        Ok(before - self.mapping.len())
    }

    /// Rewrite matching destinations. When two entries end up at the same
    /// destination the later one wins.
    pub fn rewrite(&mut self, pattern: &str, replacement: &str) -> Result<usize, FilterError> {
        let re = compile(pattern)?;
        let mut rewritten = 0;
        let mut next = FileFilterMapping::new();
        for (source, dest) in self.mapping.iter() {
            if re.is_match(dest) {
                next.insert(source, re.replace(dest, replacement).into_owned());
                rewritten += 1;
            } else {
                next.insert(source, dest);
            }
        }
        self.mapping = next;
        Ok(rewritten)
    }

    /// Add a `dir/` placeholder for every ancestor directory of every mapped
    /// file.
    pub fn imply_directories(&mut self) {
        let mut dirs: Vec<String> = Vec::new();
        for (_, dest) in self.mapping.iter() {
            let mut end = 0;
            while let Some(pos) = dest[end..].find('/') {
                end += pos + 1;
                let dir = &dest[..end];
                if !dirs.iter().any(|d| d == dir) {
                    dirs.push(dir.to_string());
                }
            }
        }
        for dir in dirs {
            if self.mapping.get(&dir).is_none() {
                let source = PathBuf::from(dir.trim_end_matches('/'));
                self.mapping.insert(source, dir);
            }
        }
    }

    pub fn apply_rules(&mut self, rules: &[FilterRule]) -> Result<(), FilterError> {
        for rule in rules {
            match rule {
                FilterRule::Include(p) => {
                    self.include(p)?;
                }
                FilterRule::Exclude(p) => {
                    self.exclude(p)?;
                }
                FilterRule::Rewrite {
                    pattern,
                    replacement,
                } => {
                    self.rewrite(pattern, replacement)?;
                }
            }
        }
        Ok(())
    }

    /// Parse the text of a filter file.
    pub fn parse_rules(text: &str) -> Result<Vec<FilterRule>, FilterError> {
        let mut rules = Vec::new();
        for (idx, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let syntax = |message: &str| FilterError::Syntax {
                line: idx + 1,
                message: message.to_string(),
            };

            let (directive, rest) = line
                .split_once(char::is_whitespace)
                .ok_or_else(|| syntax("missing pattern"))?;
            let rest = rest.trim();

            let rule = match directive {
                "include" => FilterRule::Include(rest.to_string()),
                "exclude" => FilterRule::Exclude(rest.to_string()),
                "rewrite" => {
                    let (pattern, replacement) = rest
                        .split_once(char::is_whitespace)
                        .ok_or_else(|| syntax("rewrite needs a pattern and a replacement"))?;
                    FilterRule::Rewrite {
                        pattern: pattern.to_string(),
                        replacement: replacement.trim().to_string(),
                    }
                }
                other => return Err(syntax(&format!("unknown directive '{other}'"))),
            };
            rules.push(rule);
        }
        Ok(rules)
    }

    pub fn mapping(&self) -> &FileFilterMapping {
        &self.mapping
    }

    pub fn into_mapping(self) -> FileFilterMapping {
        self.mapping
    }
}

fn compile(pattern: &str) -> Result<Regex, FilterError> {
    Regex::new(pattern).map_err(|source| FilterError::Pattern {
        pattern: pattern.to_string(),
        source,
    })
}

fn to_slash(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
