//! IO modules - side effects (network, child processes)

pub mod download;
pub mod git;
pub mod tool;
