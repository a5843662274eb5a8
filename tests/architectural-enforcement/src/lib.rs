//! Architectural Enforcement Integration Tests
//!
//! This package contains integration tests that enforce architectural principles:
//! - No blocking I/O inside async code
//! - No sleep() in production code
//!
//! The helpers here are a line-based scanner. It is deliberately simple:
//! it finds the nearest enclosing `fn` by walking upwards and classifies it.

use std::path::{Path, PathBuf};

/// Production source roots, relative to the workspace
pub const PRODUCTION_DIRS: &[&str] = &["conductor/core/src", "tui/src"];

/// Absolute path of a workspace-relative directory
#[must_use]
pub fn workspace_path(relative: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("../..")
        .join(relative)
}

/// All `.rs` files under a directory (empty if it does not exist)
#[must_use]
pub fn rust_files(dir: &Path) -> Vec<PathBuf> {
    if !dir.exists() {
        return Vec::new();
    }
    walkdir::WalkDir::new(dir)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.path().extension().and_then(|s| s.to_str()) == Some("rs"))
        .map(|e| e.into_path())
        .collect()
}

/// What kind of function a line sits in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Enclosing {
    /// A `#[test]` / `#[tokio::test]` function or anything under `#[cfg(test)]`
    Test,
    /// An `async fn`
    Async,
    /// A plain `fn`
    Sync,
    /// Module level
    Module,
}

/// Classify the function enclosing `lines[idx]`
#[must_use]
pub fn enclosing(lines: &[&str], idx: usize) -> Enclosing {
    if in_test_code(lines, idx) {
        return Enclosing::Test;
    }

    for line in lines[..idx].iter().rev().map(|l| l.trim()) {
        if line.contains("async fn ") {
            return Enclosing::Async;
        }
        if is_fn_header(line) {
            return Enclosing::Sync;
        }
        if line.starts_with("mod ") || (line.starts_with("impl ") && line.contains('{')) {
            return Enclosing::Module;
        }
    }
    Enclosing::Module
}

/// Strip a trailing `//` comment
#[must_use]
pub fn code_part(line: &str) -> &str {
    line.split("//").next().unwrap_or(line)
}

fn is_fn_header(line: &str) -> bool {
    line.starts_with("fn ") || line.starts_with("pub fn ") || line.starts_with("pub(crate) fn ")
}

fn in_test_code(lines: &[&str], idx: usize) -> bool {
    // Anything after `#[cfg(test)]` is test code
    if lines[..idx]
        .iter()
        .any(|l| l.trim().starts_with("#[cfg(test)]"))
    {
        return true;
    }

    let Some(fn_idx) = lines[..idx].iter().rposition(|l| {
        let l = l.trim();
        l.starts_with("fn ") || l.contains(" fn ")
    }) else {
        return false;
    };

    for line in lines[..fn_idx].iter().rev().map(|l| l.trim()) {
        if line.starts_with("#[test]") || line.starts_with("#[tokio::test") {
            return true;
        }
        if !line.starts_with("#[") && !line.starts_with("///") {
            break;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_async_detection() {
        let code = [
            "pub async fn load(&self) {",
            "    let contents = std::fs::read_to_string(\"file.txt\")?;",
            "}",
        ];
        assert_eq!(enclosing(&code, 1), Enclosing::Async);
    }

    #[test]
    fn test_sync_detection() {
        let code = [
            "fn init_logging() {",
            "    std::fs::create_dir_all(\"logs\")?;",
            "}",
        ];
        assert_eq!(enclosing(&code, 1), Enclosing::Sync);
    }

    #[test]
    fn test_test_detection() {
        let code = [
            "#[tokio::test]",
            "async fn test_load() {",
            "    let contents = std::fs::read_to_string(\"test.txt\")?;",
            "}",
        ];
        assert_eq!(enclosing(&code, 2), Enclosing::Test);

        let module = ["#[cfg(test)]", "mod tests {", "    use std::fs;", "}"];
        assert_eq!(enclosing(&module, 2), Enclosing::Test);
    }

    #[test]
    fn test_module_level() {
        let code = ["use std::fs;", "", "fn later() {}"];
        assert_eq!(enclosing(&code, 0), Enclosing::Module);
        assert_eq!(code_part("let x = 1; // std::fs::read"), "let x = 1; ");
    }
}
