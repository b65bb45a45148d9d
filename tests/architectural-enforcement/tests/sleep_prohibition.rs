//! Integration Test: Sleep Prohibition
//!
//! Production code in the engine and daemon must not sleep. The animation
//! ticker uses `tokio::time::interval`, chat auto-hide is a deadline checked
//! on a ticker, and everything else waits on I/O or channels.

use architectural_enforcement::{
    find_sleep_violations, workspace_root, SleepPolicy, PRODUCTION_DIRS,
};

#[test]
fn test_no_sleep_in_production_code() {
    let root = workspace_root();
    let violations: Vec<String> = PRODUCTION_DIRS
        .iter()
        .flat_map(|dir| find_sleep_violations(&root.join(dir), SleepPolicy { allow_tests: true }))
        .collect();

    if !violations.is_empty() {
        eprintln!("\nSleep calls found in production code:\n");
        for violation in &violations {
            eprintln!("  {violation}");
        }
        eprintln!("\nUse tokio::time::interval for periodic work and wait on I/O otherwise.");

        panic!(
            "\nFound {} sleep violation(s) in production code.",
            violations.len()
        );
    }
}

#[test]
fn test_production_dirs_exist() {
    let root = workspace_root();
    for dir in PRODUCTION_DIRS {
        assert!(root.join(dir).is_dir(), "missing {dir}");
    }
}
