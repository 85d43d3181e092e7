//! Command line behaviour of the two binaries

use std::process::{Command, Stdio};
use tempfile::TempDir;

use nowplaying::constants::LOCK_FILE;
use nowplaying::helpers::InstanceLock;

#[test]
fn test_cli_help() {
    let output = Command::new(env!("CARGO_BIN_EXE_nowplaying")).arg("--help").output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Publishes the currently playing track"));
    assert!(stdout.contains("--serve"));
    assert!(stdout.contains("--single-file"));
}

#[test]
fn test_client_cli_requires_source() {
    let output = Command::new(env!("CARGO_BIN_EXE_nowplaying_client")).output().unwrap();
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("error:"));
}

#[test]
fn test_second_instance_exits_quietly() {
    let dir = TempDir::new().unwrap();
    let _held = InstanceLock::try_acquire(dir.path().join(LOCK_FILE)).unwrap().unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_nowplaying"))
        .arg("--output")
        .arg(dir.path())
        .arg("--stdin-events")
        .stdin(Stdio::null())
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(0));
    assert!(output.stderr.is_empty(), "{}", String::from_utf8_lossy(&output.stderr));
    assert!(!dir.path().join("overlay.html").exists());
}
