//! Locating external tools (`git`, `unzip`) on the host.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ToolError {
    #[error("'{tool}' was not found (searched: {})", join_paths(.searched))]
    NotFound { tool: String, searched: Vec<PathBuf> },
}

/// Find `name` the way the shell would (`which` / `where`).
pub fn find_tool(name: &str) -> Result<PathBuf, ToolError> {
    which::which(name).map_err(|e| {
        tracing::debug!("Lookup of {name} failed: {e}");
        ToolError::NotFound {
            tool: name.to_string(),
            searched: search_path(),
        }
    })
}

fn search_path() -> Vec<PathBuf> {
    std::env::var_os("PATH")
        .map(|p| std::env::split_paths(&p).collect())
        .unwrap_or_default()
}

fn join_paths(paths: &[PathBuf]) -> String {
    if paths.is_empty() {
        return "PATH is empty".to_string();
    }
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
