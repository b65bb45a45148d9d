//! Architectural Enforcement
//!
//! Source scans that keep the engine honest about how it waits:
//! - No `sleep()` calls in production code; periodic work uses
//!   `tokio::time::interval`, everything else waits on I/O or channels
//! - No blocking I/O in production code; files go through `tokio::fs`.
//!   A short list of setup functions that run once before any engine task
//!   exists may read synchronously
//!
//! The scanning helpers live here so the integration tests stay short and
//! the detectors themselves can be unit tested.

use std::fs;
use std::path::{Path, PathBuf};

/// Production source directories, relative to the workspace root
pub const PRODUCTION_DIRS: &[&str] = &["engine/core/src", "engine/daemon/src"];

/// Functions allowed to block on I/O: configuration loading at startup
pub const SETUP_FUNCTIONS: &[&str] = &["load_file_config"];

/// Workspace root, derived from this crate's manifest directory
#[must_use]
pub fn workspace_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .ancestors()
        .nth(2)
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf)
}

/// What a sleep scan tolerates
#[derive(Clone, Copy, Debug, Default)]
pub struct SleepPolicy {
    /// Allow sleeps inside `#[test]` / `#[tokio::test]` functions
    pub allow_tests: bool,
}

/// What a blocking I/O scan tolerates
#[derive(Clone, Copy, Debug)]
pub struct BlockingIoPolicy {
    /// Allow blocking I/O in test functions and `#[cfg(test)]` modules
    pub allow_tests: bool,
    /// Functions that may block
    pub setup_functions: &'static [&'static str],
}

impl Default for BlockingIoPolicy {
    fn default() -> Self {
        Self {
            allow_tests: true,
            setup_functions: SETUP_FUNCTIONS,
        }
    }
}

/// Run `check` over every `.rs` file under `dir`
fn scan(dir: &Path, mut check: impl FnMut(&Path, &[&str], &mut Vec<String>)) -> Vec<String> {
    let mut violations = Vec::new();
    if !dir.exists() {
        return violations;
    }

    for entry in walkdir::WalkDir::new(dir)
        .into_iter()
        .filter_map(Result::ok)
    {
        let path = entry.path();
        if path.extension().and_then(|s| s.to_str()) != Some("rs") {
            continue;
        }
        let Ok(content) = fs::read_to_string(path) else {
            continue;
        };
        let lines: Vec<&str> = content.lines().collect();
        check(path, &lines, &mut violations);
    }
    violations
}

/// Every `sleep(` call under `dir` that the policy does not allow
#[must_use]
pub fn find_sleep_violations(dir: &Path, policy: SleepPolicy) -> Vec<String> {
    scan(dir, |path, lines, violations| {
        for (idx, line) in lines.iter().enumerate() {
            if !is_sleep_call(line) {
                continue;
            }
            if policy.allow_tests && is_in_test_function(lines, idx) {
                continue;
            }
            violations.push(format!("{}:{} - {}", path.display(), idx + 1, line.trim()));
        }
    })
}

/// Every blocking I/O call under `dir` that the policy does not allow
#[must_use]
pub fn find_blocking_io_violations(dir: &Path, policy: BlockingIoPolicy) -> Vec<String> {
    scan(dir, |path, lines, violations| {
        for (idx, line) in lines.iter().enumerate() {
            let Some(kind) = blocking_io_kind(line) else {
                continue;
            };
            if policy.allow_tests && is_test_code(lines, idx) {
                continue;
            }
            let in_setup = enclosing_function(lines, idx)
                .is_some_and(|f| policy.setup_functions.contains(&f));
            if in_setup {
                continue;
            }
            violations.push(format!(
                "{}:{} - Blocking {kind} I/O: {}",
                path.display(),
                idx + 1,
                line.trim()
            ));
        }
    })
}

/// Whether the code part of `line` (comments stripped) calls a sleep
#[must_use]
pub fn is_sleep_call(line: &str) -> bool {
    let code_part = line.split("//").next().unwrap_or(line);
    code_part.contains("::sleep(") || code_part.contains(".sleep(")
}

/// Kind of blocking I/O the code part of `line` uses, if any
#[must_use]
pub fn blocking_io_kind(line: &str) -> Option<&'static str> {
    let code_part = line.split("//").next().unwrap_or(line);
    let import = code_part.trim_start();

    if code_part.contains("std::fs::") || import.starts_with("use std::fs") {
        Some("file")
    } else if code_part.contains("std::net::") || import.starts_with("use std::net") {
        Some("network")
    } else if code_part.contains("std::process::Command") {
        Some("process")
    } else if code_part.contains("std::io::stdin()") || code_part.contains("std::io::stdout()") {
        Some("stdio")
    } else {
        None
    }
}

/// Whether line `current_idx` sits inside a test function
#[must_use]
pub fn is_in_test_function(lines: &[&str], current_idx: usize) -> bool {
    for line in lines[..current_idx].iter().rev() {
        let line = line.trim();

        if line.starts_with("#[test]") || line.starts_with("#[tokio::test") {
            return true;
        }
        if (line.starts_with("fn ") || line.starts_with("pub fn ")) && !line.contains("test") {
            return false;
        }
        if line.starts_with("mod ") || line.starts_with("impl ") {
            return false;
        }
    }
    false
}

/// Whether line `current_idx` is test-only: in a test function or after
/// `#[cfg(test)]`
#[must_use]
pub fn is_test_code(lines: &[&str], current_idx: usize) -> bool {
    lines[..current_idx]
        .iter()
        .any(|line| line.trim() == "#[cfg(test)]")
        || is_in_test_function(lines, current_idx)
}

/// Name of the nearest function declared above line `current_idx`
#[must_use]
pub fn enclosing_function<'a>(lines: &[&'a str], current_idx: usize) -> Option<&'a str> {
    lines[..current_idx]
        .iter()
        .rev()
        .find_map(|line| function_name(line))
}

fn function_name(line: &str) -> Option<&str> {
    let mut tokens = line.split_whitespace();
    loop {
        match tokens.next()? {
            "fn" => break,
            "pub" | "pub(crate)" | "pub(super)" | "async" | "const" | "unsafe" => {}
            _ => return None,
        }
    }
    tokens
        .next()?
        .split(['(', '<'])
        .next()
        .filter(|name| !name.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detects_sleep_outside_tests() {
        let code = [
            "fn poll_frames() {",
            "    tokio::time::sleep(Duration::from_millis(16)).await;",
            "}",
        ];
        assert!(is_sleep_call(code[1]));
        assert!(!is_in_test_function(&code, 1));
    }

    #[test]
    fn test_ignores_comments() {
        assert!(!is_sleep_call("    // never std::thread::sleep(..) here"));
        assert_eq!(blocking_io_kind("//! writes go through std::fs::write"), None);
    }

    #[test]
    fn test_allows_test_functions() {
        let code = [
            "#[tokio::test]",
            "async fn test_waits() {",
            "    tokio::time::sleep(Duration::from_millis(1)).await;",
            "}",
        ];
        assert!(is_in_test_function(&code, 2));
    }

    #[test]
    fn test_detects_blocking_io_kinds() {
        assert_eq!(blocking_io_kind("    std::fs::write(&path, json)?;"), Some("file"));
        assert_eq!(blocking_io_kind("use std::fs;"), Some("file"));
        assert_eq!(
            blocking_io_kind("let s = std::net::TcpStream::connect(addr)?;"),
            Some("network")
        );
        assert_eq!(
            blocking_io_kind("std::process::Command::new(\"aplay\")"),
            Some("process")
        );
        assert_eq!(blocking_io_kind("    tokio::fs::write(path, json).await"), None);
        assert_eq!(blocking_io_kind("BufReader::new(tokio::io::stdin())"), None);
    }

    #[test]
    fn test_sync_helper_on_dispatch_path_is_not_exempt() {
        let code = [
            "impl JsonFileStore {",
            "    fn flush(&self, values: &Map<String, Value>) -> Result<()> {",
            "        std::fs::write(&self.path, json)",
            "    }",
            "}",
        ];
        assert_eq!(enclosing_function(&code, 2), Some("flush"));
        assert!(!is_test_code(&code, 2));
        assert!(!SETUP_FUNCTIONS.contains(&"flush"));
    }

    #[test]
    fn test_setup_function_is_named() {
        let code = [
            "fn load_file_config(path: Option<PathBuf>) -> Result<EngineConfig, ConfigError> {",
            "    let toml_content = std::fs::read_to_string(&config_path)?;",
            "}",
        ];
        assert_eq!(enclosing_function(&code, 1), Some("load_file_config"));

        let generic = ["pub async fn open<P: AsRef<Path>>(path: P) {", "    body"];
        assert_eq!(enclosing_function(&generic, 1), Some("open"));
    }

    #[test]
    fn test_cfg_test_module_is_test_code() {
        let code = [
            "#[cfg(test)]",
            "mod tests {",
            "    fn write_fixture(dir: &Path) {",
            "        std::fs::write(dir.join(\"a.svg\"), \"<svg/>\").unwrap();",
            "    }",
        ];
        assert!(is_test_code(&code, 3));
    }

    #[test]
    fn test_workspace_root_has_engine() {
        assert!(workspace_root().join("engine").exists());
    }
}
