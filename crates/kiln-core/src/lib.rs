pub mod archive;
pub mod cache;
pub mod config;
pub mod creator;
pub mod dedup;
pub mod error;
pub mod filter;
pub mod io;
pub mod locator;
pub mod lookup;
pub mod manager;
pub mod paths;
pub mod protocol;
pub mod redirect;
pub mod redup;
pub mod retrieval;
pub mod transform;

pub mod reporter;

pub use config::{EngineConfig, RetryPolicy};
pub use error::ResolveError;
pub use manager::{PackageManager, ResolutionOrigin, ResolveOptions, ResolvedPackage};
pub use paths::*;
pub use redirect::{InvalidRedirect, Redirector};
pub use reporter::{NullReporter, Reporter};

/// User Agent string for core operations
pub const USER_AGENT: &str = concat!("kiln-core/", env!("CARGO_PKG_VERSION"));
