//! Reporter trait for dependency injection
//!
//! This trait allows the engine to report progress and status without
//! being coupled to a specific terminal UI.

use kiln_schema::PackageRef;

pub trait Reporter: Send + Sync {
    /// Indicates a new section or phase has started (e.g. "Resolving", "Packing").
    fn section(&self, title: &str);

    /// A package is being looked up.
    fn resolving(&self, package: &PackageRef);

    /// Updates the progress of a download.
    fn downloading(&self, url: &str, current: u64, total: Option<u64>);

    /// A package archive is being extracted.
    fn extracting(&self, package: &PackageRef);

    /// Marks a package as resolved.
    fn done(&self, package: &PackageRef, detail: &str);

    /// Marks a package operation as failed with a specific reason.
    fn failed(&self, package: &PackageRef, reason: &str);

    /// Log an informational message.
    fn info(&self, msg: &str);

    /// Log a warning message.
    fn warning(&self, msg: &str);
}

impl<T: Reporter + ?Sized> Reporter for std::sync::Arc<T> {
    fn section(&self, title: &str) {
        (**self).section(title);
    }
    fn resolving(&self, package: &PackageRef) {
        (**self).resolving(package);
    }
    fn downloading(&self, url: &str, current: u64, total: Option<u64>) {
        (**self).downloading(url, current, total);
    }
    fn extracting(&self, package: &PackageRef) {
        (**self).extracting(package);
    }
    fn done(&self, package: &PackageRef, detail: &str) {
        (**self).done(package, detail);
    }
    fn failed(&self, package: &PackageRef, reason: &str) {
        (**self).failed(package, reason);
    }
    fn info(&self, msg: &str) {
        (**self).info(msg);
    }
    fn warning(&self, msg: &str) {
        (**self).warning(msg);
    }
}

/// A no-op reporter for silent operations (e.g., verification, testing).
#[derive(Debug, Clone, Copy)]
pub struct NullReporter;

impl Reporter for NullReporter {
    fn section(&self, _: &str) {}
    fn resolving(&self, _: &PackageRef) {}
    fn downloading(&self, _: &str, _: u64, _: Option<u64>) {}
    fn extracting(&self, _: &PackageRef) {}
    fn done(&self, _: &PackageRef, _: &str) {}
    fn failed(&self, _: &PackageRef, _: &str) {}
    fn info(&self, _: &str) {}
    fn warning(&self, _: &str) {}
}
