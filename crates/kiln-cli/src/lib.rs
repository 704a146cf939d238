//! kiln - package resolution and distribution
#![allow(missing_docs)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::doc_markdown)]
//!
//! Resolves the packages a module tree declares in `module.toml` files,
//! using prebuilt binaries from a shared cache where possible and git
//! sources otherwise.
//!
//! # Cache Layout
//!
//! ```text
//! ~/.kiln/packages/
//! ├── <sha1(uri)>-<sha1(version)>-<platform>.tar.lzma   # binary packages
//! ├── <sha1(uri)>-<sha1("")>-Source/                    # bare git mirrors
//! ├── lookup-<sha1(uri)>.json                           # last index response
//! └── redirects.txt                                     # persisted redirects
//! ```

pub mod cmd;
pub mod ui;

pub use kiln_core::USER_AGENT;
pub use kiln_core::paths::*;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Platform name used when `--platform` is not given.
pub fn host_platform() -> &'static str {
    match std::env::consts::OS {
        "windows" => "Windows",
        "macos" => "MacOS",
        "linux" => "Linux",
        "android" => "Android",
        "ios" => "iOS",
        other => other,
    }
}

#[derive(Debug, Parser)]
#[command(name = "kiln")]
#[command(author, version, about = "kiln - package resolution for modular source trees")]
pub struct Cli {
    /// Package cache directory (default: $KILN_CACHE_DIR or ~/.kiln/packages)
    #[arg(long, global = true)]
    pub cache_dir: Option<PathBuf>,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Resolve every package declared by a module
    Resolve {
        /// Module directory (contains module.toml)
        #[arg(default_value = ".")]
        module: PathBuf,
        /// Target platform
        #[arg(long, default_value = host_platform())]
        platform: String,
        /// Always build from source
        #[arg(long, conflicts_with = "binary_only")]
        source_only: bool,
        /// Fail instead of falling back to source
        #[arg(long)]
        binary_only: bool,
        /// Replace packages that are already resolved
        #[arg(long, short = 'f')]
        force: bool,
        /// Do not reuse resolved copies elsewhere in the module tree
        #[arg(long)]
        no_safe_resolve: bool,
        /// Hard-link deduplicated files instead of copying them
        #[arg(long)]
        hard_links: bool,
        /// Redirect a package URI for this run: ORIGINAL=REPLACEMENT
        #[arg(long = "redirect", value_name = "ORIGINAL=REPLACEMENT")]
        redirects: Vec<String>,
    },
    /// Create a package archive from a directory
    Pack {
        /// Directory to pack
        dir: PathBuf,
        /// Output archive
        output: PathBuf,
        /// Filter file (include/exclude/rewrite rules); default packs everything
        #[arg(long)]
        filter: Option<PathBuf>,
        /// Archive format: tar/lzma or tar/gzip
        #[arg(long, default_value = "tar/lzma")]
        format: String,
    },
    /// Extract a package archive
    Unpack {
        /// Archive (.tar.lzma or .tar.gz)
        archive: PathBuf,
        /// Destination directory
        dest: PathBuf,
        /// Hard-link deduplicated files instead of copying them
        #[arg(long)]
        hard_links: bool,
    },
    /// Show what the index knows about a package URI
    Lookup {
        /// Package URI
        uri: String,
        /// Target platform
        #[arg(long, default_value = host_platform())]
        platform: String,
        /// Use the cached index response if there is one
        #[arg(long)]
        prefer_cache: bool,
    },
    /// Manage persisted package redirects
    Redirect {
        #[command(subcommand)]
        command: RedirectCommands,
    },
    /// Print the package cache directory
    #[command(name = "cache-path")]
    CachePath,
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: clap_complete::Shell,
    },
}

#[derive(Subcommand, Debug)]
pub enum RedirectCommands {
    /// Persist a redirect
    Add {
        /// URI to redirect
        original: String,
        /// URI to use instead
        replacement: String,
    },
    /// List persisted redirects
    List,
}
