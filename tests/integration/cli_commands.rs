//! Tests for the `godeps-cache` subcommands.

use anyhow::Result;
use assert_cmd::Command;
use predicates::prelude::*;

use crate::common::TestHost;

#[test]
fn test_init_creates_layout() -> Result<()> {
    let host = TestHost::new()?;

    let output = host.run_cli(&["init"])?;
    output.assert_success().assert_stdout_contains("Cache ready at");

    let root = host.cache_path();
    assert!(root.join("gopath").is_dir());
    assert!(root.join("binary").is_dir());
    assert!(root.join(".locks").is_dir());
    assert!(root.join(".markers").is_dir());

    host.run_cli(&["init"])?.assert_success();
    Ok(())
}

#[test]
fn test_init_quiet_prints_nothing() -> Result<()> {
    let host = TestHost::new()?;
    let output = host.run_cli(&["--quiet", "init"])?;
    output.assert_success();
    assert!(output.stdout.is_empty(), "unexpected stdout: {}", output.stdout);
    Ok(())
}

#[test]
fn test_init_fails_when_root_is_a_file() -> Result<()> {
    let host = TestHost::new()?;
    std::fs::write(host.cache_path(), "not a directory")?;

    host.run_cli(&["init"])?
        .assert_failure()
        .assert_stderr_contains("is not usable")
        .assert_stderr_contains("suggestion");
    Ok(())
}

#[test]
fn test_path_resolution() -> Result<()> {
    let host = TestHost::new()?;

    Command::new(crate::common::binary())
        .env("GODEPS_CACHE_DIR", host.cache_path())
        .env("GRADLE_USER_HOME", host.home_path())
        .args(["path", r"github.com\x\y"])
        .assert()
        .success()
        .stdout(predicate::str::contains("gopath"))
        .stdout(predicate::str::contains("github.com"));

    let output = host.run_cli(&["path", "--binary", "linux_amd64/tool"])?;
    output.assert_success();
    let expected = host.cache_path().join("binary").join("linux_amd64").join("tool");
    assert_eq!(output.stdout.trim(), expected.display().to_string());

    // Resolving never creates anything
    assert!(!host.cache_path().exists());
    Ok(())
}

#[test]
fn test_path_rejects_traversal() {
    let host = TestHost::new().unwrap();

    Command::new(crate::common::binary())
        .env("GODEPS_CACHE_DIR", host.cache_path())
        .env("GRADLE_USER_HOME", host.home_path())
        .env("NO_COLOR", "1")
        .args(["path", "github.com/x/../../../etc"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Invalid cache identifier"));
}

#[test]
fn test_status_and_mark() -> Result<()> {
    let host = TestHost::new()?;
    host.run_cli(&["init"])?.assert_success();

    host.run_cli(&["status", "github.com/x/y", "v1.0"])?
        .assert_success()
        .assert_stdout_contains("stale")
        .assert_stdout_contains("never cached");

    host.run_cli(&["mark", "github.com/x/y", "v1.0"])?
        .assert_success()
        .assert_stdout_contains("github.com/x/y@v1.0");

    let output = host.run_cli(&["status", "github.com/x/y", "v1.0", "--json"])?;
    output.assert_success();
    let report: serde_json::Value = serde_json::from_str(&output.stdout)?;
    assert_eq!(report["stale"], false);
    assert_eq!(report["reason"], "up_to_date");
    assert_eq!(report["marker"]["fingerprint"], "v1.0");

    let output = host.run_cli(&["status", "github.com/x/y", "v2.0", "--json"])?;
    let report: serde_json::Value = serde_json::from_str(&output.stdout)?;
    assert_eq!(report["stale"], true);
    assert_eq!(report["reason"], "fingerprint_changed");
    Ok(())
}

#[test]
fn test_settings_file_forces_refresh() -> Result<()> {
    let host = TestHost::new()?;
    host.run_cli(&["mark", "github.com/x/y", "v1.0"])?.assert_success();
    host.write_settings("refresh_dependencies = true\n")?;

    let output = host.run_cli(&["status", "github.com/x/y", "v1.0", "--json"])?;
    let report: serde_json::Value = serde_json::from_str(&output.stdout)?;
    assert_eq!(report["reason"], "refresh_forced");
    Ok(())
}

#[test]
fn test_explicit_config_flag() -> Result<()> {
    let host = TestHost::new()?;
    let settings = host.work_path().join("custom.toml");
    std::fs::write(&settings, "cache_ttl_secs = \"never\"\n")?;

    host.run_cli(&["--config", settings.to_str().unwrap(), "init"])?
        .assert_failure()
        .assert_stderr_contains("Failed to parse cache settings");
    Ok(())
}

#[cfg(unix)]
#[test]
fn test_exec_if_stale_and_record() -> Result<()> {
    let host = TestHost::new()?;
    let script = r#"echo "$GODEPS_CACHE_FINGERPRINT" >> "$WORK_DIR/runs"; mkdir -p "$GODEPS_CACHE_PACKAGE_DIR""#;
    let args = ["exec", "github.com/x/y", "v1.0", "--if-stale", "--record", "--", "sh", "-c", script];

    host.run_cli(&args)?.assert_success();
    host.run_cli(&args)?.assert_success().assert_stderr_contains("is up to date");

    let runs = std::fs::read_to_string(host.work_path().join("runs"))?;
    assert_eq!(runs.lines().collect::<Vec<_>>(), vec!["v1.0"]);
    assert!(host.cache_path().join("gopath").join("github.com").join("x").join("y").is_dir());

    let newer = ["exec", "github.com/x/y", "v2.0", "--if-stale", "--record", "--", "sh", "-c", script];
    host.run_cli(&newer)?.assert_success();
    let runs = std::fs::read_to_string(host.work_path().join("runs"))?;
    assert_eq!(runs.lines().collect::<Vec<_>>(), vec!["v1.0", "v2.0"]);
    Ok(())
}

#[cfg(unix)]
#[test]
fn test_exec_failure_does_not_record() -> Result<()> {
    let host = TestHost::new()?;

    host.run_cli(&["exec", "github.com/x/y", "v1.0", "--record", "--", "sh", "-c", "exit 3"])?
        .assert_failure()
        .assert_stderr_contains("failed");

    let output = host.run_cli(&["status", "github.com/x/y", "v1.0", "--json"])?;
    let report: serde_json::Value = serde_json::from_str(&output.stdout)?;
    assert_eq!(report["stale"], true);
    assert!(report["marker"].is_null());
    Ok(())
}

#[test]
fn test_exec_missing_program() -> Result<()> {
    let host = TestHost::new()?;
    host.run_cli(&["exec", "github.com/x/y", "v1.0", "--", "definitely-not-a-real-program-xyz"])?
        .assert_failure()
        .assert_stderr_contains("Failed to start command");
    Ok(())
}
