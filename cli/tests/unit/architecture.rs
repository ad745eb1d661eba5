//! Structural tests for layer boundaries.
//!
//! These scan the source tree rather than exercising behaviour: the domain
//! stays pure, services only see ports, adapters never reach up into the
//! presentation layer.

use std::path::{Path, PathBuf};

fn src(sub: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("src").join(sub)
}

fn collect_rs_files(dir: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    if let Ok(entries) = std::fs::read_dir(dir) {
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                files.extend(collect_rs_files(&path));
            } else if path.extension().and_then(|e| e.to_str()) == Some("rs") {
                files.push(path);
            }
        }
    }
    files
}

/// Tracks brace depth to tell whether a line sits inside `#[cfg(test)]`.
#[derive(Default)]
struct CfgTestTracker {
    in_test_block: bool,
    brace_depth: i32,
    test_block_start_depth: i32,
}

impl CfgTestTracker {
    fn process_line(&mut self, line: &str) -> bool {
        if line.trim().contains("#[cfg(test)]") {
            self.in_test_block = true;
            self.test_block_start_depth = self.brace_depth;
        }
        for ch in line.chars() {
            match ch {
                '{' => self.brace_depth += 1,
                '}' => {
                    self.brace_depth -= 1;
                    if self.in_test_block && self.brace_depth <= self.test_block_start_depth {
                        self.in_test_block = false;
                    }
                }
                _ => {}
            }
        }
        self.in_test_block
    }
}

/// Production code lines of every file under `dir`, as `(location, line)`.
///
/// Comments and `#[cfg(test)]` modules are skipped.
fn production_lines(dir: &Path) -> Vec<(String, String)> {
    let mut out = Vec::new();
    for file in collect_rs_files(dir) {
        let Ok(content) = std::fs::read_to_string(&file) else {
            continue;
        };
        let rel = file
            .strip_prefix(env!("CARGO_MANIFEST_DIR"))
            .unwrap_or(&file)
            .display()
            .to_string();
        let mut tracker = CfgTestTracker::default();
        for (i, line) in content.lines().enumerate() {
            let in_test = tracker.process_line(line);
            let trimmed = line.trim();
            if in_test || trimmed.starts_with("//") || trimmed.is_empty() {
                continue;
            }
            out.push((format!("{rel}:{}", i + 1), line.to_string()));
        }
    }
    out
}

fn forbidden(dir: &Path, needles: &[&str]) -> Vec<String> {
    production_lines(dir)
        .into_iter()
        .filter(|(_, line)| needles.iter().any(|n| line.contains(n)))
        .map(|(loc, line)| format!("{loc}: {}", line.trim()))
        .collect()
}

// ── Layer boundaries ─────────────────────────────────────────────────────────

#[test]
fn domain_is_pure() {
    let violations = forbidden(
        &src("domain"),
        &[
            "crate::infra",
            "crate::application",
            "crate::commands",
            "crate::output",
            "tokio",
            "std::fs",
            "std::process",
            "std::net",
        ],
    );
    assert!(
        violations.is_empty(),
        "domain/ must not perform I/O or depend on outer layers:\n{}",
        violations.join("\n")
    );
}

#[test]
fn application_depends_only_on_domain_and_ports() {
    let violations = forbidden(
        &src("application"),
        &["crate::infra", "crate::commands", "crate::output", "crate::app::"],
    );
    assert!(
        violations.is_empty(),
        "application/ must only import domain and ports:\n{}",
        violations.join("\n")
    );
}

#[test]
fn services_take_ports_not_adapters() {
    let violations = forbidden(
        &src("application/services"),
        &[
            "AliyunEcs",
            "AliyunDomains",
            "SshConnector",
            "SshSession",
            "LocalTransport",
            "YamlConfigStore",
        ],
    );
    assert!(
        violations.is_empty(),
        "services must be generic over port traits:\n{}",
        violations.join("\n")
    );
}

#[test]
fn infra_never_imports_presentation() {
    let violations = forbidden(&src("infra"), &["crate::commands", "crate::output"]);
    assert!(
        violations.is_empty(),
        "infra/ must not import from commands/ or output/:\n{}",
        violations.join("\n")
    );
}

#[test]
fn only_presentation_prints() {
    let mut violations = forbidden(&src("infra"), &["println!", "eprintln!"]);
    violations.extend(forbidden(&src("application"), &["println!", "eprintln!"]));
    assert!(
        violations.is_empty(),
        "use tracing or a ProgressReporter instead of print macros:\n{}",
        violations.join("\n")
    );
}

// ── Command handlers ─────────────────────────────────────────────────────────

#[test]
fn no_inline_json_branching_in_commands() {
    let violations: Vec<String> = production_lines(&src("commands"))
        .into_iter()
        .filter(|(_, line)| {
            let t = line.trim();
            line.contains("json: bool") || t.starts_with("if json") || t.starts_with("if !json")
        })
        .map(|(loc, line)| format!("{loc}: {}", line.trim()))
        .collect();
    assert!(
        violations.is_empty(),
        "branch on app.is_json() or use app.renderer() instead:\n{}",
        violations.join("\n")
    );
}

#[test]
fn commands_use_standardized_confirmation() {
    let violations = forbidden(&src("commands"), &["Confirm::new()", "stdin().lock()"]);
    assert!(
        violations.is_empty(),
        "commands must prompt through app.confirm():\n{}",
        violations.join("\n")
    );
}

#[test]
fn command_handlers_take_app_context() {
    let mut missing = Vec::new();
    for file in collect_rs_files(&src("commands")) {
        let content = std::fs::read_to_string(&file).unwrap_or_default();
        if content.contains("pub async fn run(") && !content.contains("app: &AppContext") {
            missing.push(file.display().to_string());
        }
    }
    assert!(
        missing.is_empty(),
        "command handlers must accept &AppContext:\n{}",
        missing.join("\n")
    );
}

#[test]
fn command_handlers_are_reasonably_sized() {
    let mut oversized = Vec::new();
    for file in collect_rs_files(&src("commands")) {
        let lines = production_lines(&file).len();
        if lines > 125 {
            oversized.push(format!("{}: {lines} lines", file.display()));
        }
    }
    assert!(
        oversized.is_empty(),
        "move logic out of commands/ into application services:\n{}",
        oversized.join("\n")
    );
}
