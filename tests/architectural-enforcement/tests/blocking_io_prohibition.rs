//! Integration Test: Blocking I/O Prohibition
//!
//! Production code in the engine and daemon must not block the runtime on
//! I/O. Files go through `tokio::fs`; the state file is saved by a writer
//! task so `dispatch` never touches the disk. Only the functions named in
//! `SETUP_FUNCTIONS` (startup configuration loading) may read synchronously.

use architectural_enforcement::{
    find_blocking_io_violations, workspace_root, BlockingIoPolicy, PRODUCTION_DIRS,
};

#[test]
fn test_no_blocking_io_in_production_code() {
    let root = workspace_root();
    let violations: Vec<String> = PRODUCTION_DIRS
        .iter()
        .flat_map(|dir| find_blocking_io_violations(&root.join(dir), BlockingIoPolicy::default()))
        .collect();

    if !violations.is_empty() {
        eprintln!("\nBlocking I/O found in production code:\n");
        for violation in &violations {
            eprintln!("  {violation}");
        }
        eprintln!("\nForbidden: std::fs, std::net, std::process::Command, std::io::stdin()/stdout()");
        eprintln!("Required:  tokio::fs, tokio::net, tokio::process, tokio::io");

        panic!(
            "\nFound {} blocking I/O violation(s) in production code.",
            violations.len()
        );
    }
}
