//! Integration Test: Sleep Prohibition
//!
//! **Policy**: Production code waits on I/O or a `tokio::time::interval`,
//! never on `sleep`. The typing animation and frame loop are interval
//! driven; streamed tokens arrive over channels.

use std::fs;

use architectural_enforcement::{
    code_part, enclosing, rust_files, workspace_path, Enclosing, PRODUCTION_DIRS,
};

const SLEEP_PATTERNS: &[&str] = &["thread::sleep(", "time::sleep(", "sleep_until("];

#[test]
fn test_no_sleep_in_production_code() {
    let mut violations = Vec::new();

    for dir in PRODUCTION_DIRS {
        for file in rust_files(&workspace_path(dir)) {
            let Ok(content) = fs::read_to_string(&file) else {
                continue;
            };
            let lines: Vec<&str> = content.lines().collect();

            for (idx, line) in lines.iter().enumerate() {
                let code = code_part(line);
                if !SLEEP_PATTERNS.iter().any(|p| code.contains(p)) {
                    continue;
                }
                if enclosing(&lines, idx) == Enclosing::Test {
                    continue;
                }
                violations.push(format!("{}:{} - {}", file.display(), idx + 1, line.trim()));
            }
        }
    }

    assert!(
        violations.is_empty(),
        "sleep calls in production code (use tokio::time::interval or await I/O):\n  {}",
        violations.join("\n  ")
    );
}
