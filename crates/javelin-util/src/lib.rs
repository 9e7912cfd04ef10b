//! Shared utilities for the Javelin build tool.
//!
//! This crate provides the cross-cutting concerns used by all other Javelin
//! crates: the unified error type and terminal progress indicators.

pub mod errors;
pub mod progress;

use std::path::{Path, PathBuf};

/// Returns the path to the Javelin data directory (`~/.javelin/`).
pub fn dirs_path() -> PathBuf {
    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .unwrap_or_else(|_| ".".to_string());
    Path::new(&home).join(".javelin")
}
