//! Integration Test: Sleep Prohibition
//!
//! **Policy**: production code in the chat core MUST NOT sleep. Exchanges
//! settle when the request does, not after a timer.
//! **Exceptions**: test code; periodic tasks driven by `tokio::time::interval`.

use std::fs;
use std::path::{Path, PathBuf};

const PRODUCTION_DIRS: &[&str] = &["chat/core/src"];

#[test]
fn test_no_sleep_in_production_code() {
    let mut violations = Vec::new();
    let root = Path::new(env!("CARGO_MANIFEST_DIR")).join("../..");

    for dir in PRODUCTION_DIRS {
        for file in rust_files(&root.join(dir)) {
            if let Ok(content) = fs::read_to_string(&file) {
                for line_number in find_sleeps(&content) {
                    violations.push(format!("{}:{}", file.display(), line_number));
                }
            }
        }
    }

    if !violations.is_empty() {
        eprintln!("\n❌ CRITICAL: Sleep calls found in production code!\n");
        for violation in &violations {
            eprintln!("  ❌ {violation}");
        }
        eprintln!("\n❌ FORBIDDEN:");
        eprintln!("  - Sleep in polling loops");
        eprintln!("  - Sleep to 'wait' for a reply (await the request instead)");

        panic!("\nFound {} sleep violation(s).", violations.len());
    }
}

fn rust_files(dir: &Path) -> Vec<PathBuf> {
    walkdir::WalkDir::new(dir)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.path().extension().and_then(|s| s.to_str()) == Some("rs"))
        .map(|e| e.path().to_path_buf())
        .collect()
}

/// Line numbers of sleep calls outside the test module
fn find_sleeps(content: &str) -> Vec<usize> {
    let lines: Vec<&str> = content.lines().collect();
    let mut found = Vec::new();

    for (idx, line) in lines.iter().enumerate() {
        if line.trim_start().starts_with("#[cfg(test)]") {
            break;
        }
        let code_part = line.split("//").next().unwrap_or(line);
        if (code_part.contains("::sleep(") || code_part.contains(".sleep("))
            && !is_interval_pattern(&lines, idx)
        {
            found.push(idx + 1);
        }
    }

    found
}

/// `interval.tick()` nearby marks a periodic task
fn is_interval_pattern(lines: &[&str], current_idx: usize) -> bool {
    let start = current_idx.saturating_sub(20);
    let end = (current_idx + 5).min(lines.len());
    lines[start..end]
        .iter()
        .any(|l| l.contains("interval.tick()") || l.contains("tokio::time::interval"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sleep_is_found() {
        let source = "async fn wait() {\n    tokio::time::sleep(d).await;\n}\n";
        assert_eq!(find_sleeps(source), vec![2]);
    }

    #[test]
    fn test_sleep_in_tests_is_ignored() {
        let source = "#[cfg(test)]\nmod tests {\n    fn t() { std::thread::sleep(d); }\n}\n";
        assert!(find_sleeps(source).is_empty());
    }

    #[test]
    fn test_interval_is_allowed() {
        let source = "let mut interval = tokio::time::interval(d);\nloop {\n    tokio::time::sleep(d).await;\n}\n";
        assert!(find_sleeps(source).is_empty());
    }
}
