//! Integration Test: Blocking I/O Prohibition
//!
//! **Policy**: async code in the chat core MUST NOT use blocking I/O.
//! **Required**: `tokio::fs`, `tokio::net`, `tokio::io`, async `reqwest`.
//!
//! Blocking calls are tolerated in synchronous functions (configuration
//! loading runs before any request is made) and in `#[cfg(test)]` modules.

use std::fs;
use std::path::{Path, PathBuf};

/// Production source trees, relative to the workspace root
const PRODUCTION_DIRS: &[&str] = &["chat/core/src"];

/// A forbidden pattern and what it stands for
struct Rule {
    pattern: &'static str,
    kind: &'static str,
    /// Only flagged inside `async fn`
    async_only: bool,
}

const RULES: &[Rule] = &[
    Rule {
        pattern: "std::fs",
        kind: "Blocking file I/O",
        async_only: true,
    },
    Rule {
        pattern: "std::net",
        kind: "Blocking network I/O",
        async_only: false,
    },
    Rule {
        pattern: "std::process::Command",
        kind: "Blocking process I/O",
        async_only: false,
    },
    Rule {
        pattern: "reqwest::blocking",
        kind: "Blocking HTTP client",
        async_only: false,
    },
    Rule {
        pattern: "std::io::stdin()",
        kind: "Blocking stdin in async",
        async_only: true,
    },
    Rule {
        pattern: "std::io::stdout()",
        kind: "Blocking stdout in async",
        async_only: true,
    },
];

#[test]
fn test_no_blocking_io_in_production_code() {
    let violations = find_blocking_io_violations();

    if !violations.is_empty() {
        eprintln!("\n❌ CRITICAL: Blocking I/O calls found in production code!\n");
        for violation in &violations {
            eprintln!("  ❌ {violation}");
        }
        eprintln!("\n✅ REQUIRED async I/O:");
        eprintln!("  - tokio::fs::read().await");
        eprintln!("  - tokio::net::TcpStream::connect().await");
        eprintln!("  - tokio::io::stdin() with AsyncBufReadExt");
        eprintln!("  - reqwest::Client (async)");

        panic!(
            "\nFound {} blocking I/O violation(s) in production code.",
            violations.len()
        );
    }
}

#[test]
fn test_production_dirs_exist() {
    for dir in PRODUCTION_DIRS {
        let path = workspace_root().join(dir);
        assert!(path.is_dir(), "missing source tree {}", path.display());
    }
}

fn workspace_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../..")
}

fn find_blocking_io_violations() -> Vec<String> {
    let mut violations = Vec::new();
    for dir in PRODUCTION_DIRS {
        check_directory(&workspace_root().join(dir), &mut violations);
    }
    violations
}

fn check_directory(path: &Path, violations: &mut Vec<String>) {
    for entry in walkdir::WalkDir::new(path)
        .into_iter()
        .filter_map(Result::ok)
    {
        if entry.path().extension().and_then(|s| s.to_str()) == Some("rs") {
            if let Ok(content) = fs::read_to_string(entry.path()) {
                for (line_number, message) in scan_source(&content) {
                    violations.push(format!(
                        "{}:{} - {}",
                        entry.path().display(),
                        line_number,
                        message
                    ));
                }
            }
        }
    }
}

/// Returns (line number, description) for each violation in `content`
fn scan_source(content: &str) -> Vec<(usize, String)> {
    let lines: Vec<&str> = content.lines().collect();
    let mut found = Vec::new();

    for (idx, line) in lines.iter().enumerate() {
        // Test modules sit at the end of each file
        if line.trim_start().starts_with("#[cfg(test)]") {
            break;
        }

        let code_part = line.split("//").next().unwrap_or(line);
        for rule in RULES {
            if !code_part.contains(rule.pattern) {
                continue;
            }
            if rule.async_only && !is_in_async_function(&lines, idx) {
                continue;
            }
            found.push((idx + 1, format!("{}: {}", rule.kind, line.trim())));
        }
    }

    found
}

/// Whether the nearest enclosing function declaration is `async`
fn is_in_async_function(lines: &[&str], current_idx: usize) -> bool {
    for line in lines[..=current_idx].iter().rev() {
        let line = line.trim();
        if let Some(is_async) = fn_declaration(line) {
            return is_async;
        }
        if line.starts_with("mod ") || (line.starts_with("impl") && line.ends_with('{')) {
            return false;
        }
    }
    false
}

/// `Some(is_async)` if `line` declares a function
fn fn_declaration(line: &str) -> Option<bool> {
    let rest = line
        .strip_prefix("pub(crate) ")
        .or_else(|| line.strip_prefix("pub "))
        .unwrap_or(line);

    if rest.starts_with("async fn ") {
        Some(true)
    } else if rest.starts_with("fn ") {
        Some(false)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_async_fs_is_flagged() {
        let source = "async fn load() {\n    let s = std::fs::read_to_string(\"x\");\n}\n";
        let found = scan_source(source);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].0, 2);
    }

    #[test]
    fn test_sync_fs_is_allowed() {
        let source = "pub fn load() {\n    let s = std::fs::read_to_string(\"x\");\n}\n";
        assert!(scan_source(source).is_empty());
    }

    #[test]
    fn test_network_flagged_anywhere() {
        let source = "fn connect() {\n    let _ = std::net::TcpStream::connect(\"a\");\n}\n";
        assert_eq!(scan_source(source).len(), 1);
    }

    #[test]
    fn test_test_module_is_skipped() {
        let source = "fn real() {}\n#[cfg(test)]\nmod tests {\n    use std::net::TcpListener;\n}\n";
        assert!(scan_source(source).is_empty());
    }

    #[test]
    fn test_comments_are_ignored() {
        let source = "async fn f() {\n    // never std::fs::read here\n}\n";
        assert!(scan_source(source).is_empty());
    }

    #[test]
    fn test_fn_declaration() {
        assert_eq!(fn_declaration("pub async fn open(&mut self) {"), Some(true));
        assert_eq!(fn_declaration("pub(crate) fn helper() {"), Some(false));
        assert_eq!(fn_declaration("let f = 1;"), None);
    }
}
