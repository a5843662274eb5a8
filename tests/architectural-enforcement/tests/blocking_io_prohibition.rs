//! Integration Test: Blocking I/O Prohibition
//!
//! **Policy**: Production code in the TUI and core MUST NOT block inside
//! async code. History files, attachments and config are read with
//! `tokio::fs`; the server is reached through async `reqwest`.
//!
//! Blocking calls are tolerated in plain `fn`s that run before the runtime
//! matters (log file setup, terminal setup) and in tests.

use std::fs;
use std::path::Path;

use architectural_enforcement::{
    code_part, enclosing, rust_files, workspace_path, Enclosing, PRODUCTION_DIRS,
};

/// Test that production code does not use blocking I/O
#[test]
fn test_no_blocking_io_in_production_code() {
    let mut violations = Vec::new();
    for dir in PRODUCTION_DIRS {
        for file in rust_files(&workspace_path(dir)) {
            check_file(&file, &mut violations);
        }
    }

    if !violations.is_empty() {
        eprintln!("\nBlocking I/O calls found in production code:\n");
        for violation in &violations {
            eprintln!("  {violation}");
        }
        eprintln!("\nUse tokio::fs / tokio::net / async reqwest instead.");
        eprintln!("Blocking calls are only acceptable in non-async functions and tests.");

        panic!(
            "\nFound {} blocking I/O violation(s) in production code.",
            violations.len()
        );
    }
}

/// The scan must actually see the crates
#[test]
fn test_production_dirs_exist() {
    for dir in PRODUCTION_DIRS {
        let files = rust_files(&workspace_path(dir));
        assert!(!files.is_empty(), "no Rust sources found under {dir}");
    }
}

fn check_file(path: &Path, violations: &mut Vec<String>) {
    let Ok(content) = fs::read_to_string(path) else {
        return;
    };
    let lines: Vec<&str> = content.lines().collect();

    for (idx, line) in lines.iter().enumerate() {
        let code = code_part(line);
        let context = enclosing(&lines, idx);
        if matches!(context, Enclosing::Test | Enclosing::Sync) {
            continue;
        }

        let kind = if code.contains("std::fs::") || code.contains("use std::fs") {
            Some("Blocking file I/O")
        } else if code.contains("std::net::") || code.contains("use std::net") {
            Some("Blocking network I/O")
        } else if code.contains("std::process::Command") {
            Some("Blocking process I/O")
        } else if code.contains("reqwest::blocking") {
            Some("Blocking HTTP client")
        } else if context == Enclosing::Async
            && (code.contains("std::io::stdin()") || code.contains("std::io::stdout()"))
        {
            Some("Blocking stdin/stdout in async")
        } else {
            None
        };

        if let Some(kind) = kind {
            violations.push(format!(
                "{}:{} - {kind}: {}",
                path.display(),
                idx + 1,
                line.trim()
            ));
        }
    }
}
