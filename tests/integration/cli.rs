//! The `selfswap` binary.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

use selfswap::test_utils::{ManifestFixture, sha256_hex};

const HELLO_DIGEST: &str = "dffd6021bb2bd5b0af676290809ec3a53191dd81c7f70a4b28688a362182986f";

/// The binary with an isolated (absent) config file and no progress output.
fn selfswap(temp: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("selfswap").unwrap();
    cmd.arg("--no-progress")
        .arg("--config")
        .arg(temp.path().join("absent.toml"))
        .env("NO_COLOR", "1")
        .env_remove("RUST_LOG");
    cmd
}

fn publish_manifest(temp: &TempDir, version: &str) -> String {
    let artifact = temp.path().join("app");
    std::fs::write(&artifact, b"new").unwrap();
    let manifest = temp.path().join("release.json");
    ManifestFixture::direct(version, &format!("file://{}", artifact.display()), &sha256_hex(b"new"))
        .write_to(&manifest)
        .unwrap();
    format!("file://{}", manifest.display())
}

#[test]
fn test_verify_matching_digest() {
    let temp = TempDir::new().unwrap();
    let file = temp.path().join("hello.txt");
    std::fs::write(&file, "Hello, World!").unwrap();

    selfswap(&temp)
        .arg("verify")
        .arg(&file)
        .arg(format!("sha256:{}", HELLO_DIGEST.to_uppercase()))
        .assert()
        .success()
        .stdout(predicate::str::contains("OK").and(predicate::str::contains(HELLO_DIGEST)));
}

#[test]
fn test_verify_mismatch_fails() {
    let temp = TempDir::new().unwrap();
    let file = temp.path().join("hello.txt");
    std::fs::write(&file, "Hello, World?").unwrap();

    selfswap(&temp)
        .arg("verify")
        .arg(&file)
        .arg(HELLO_DIGEST)
        .assert()
        .failure()
        .stdout(predicate::str::contains("MISMATCH"))
        .stderr(predicate::str::contains("Checksum mismatch"));
}

#[test]
fn test_verify_without_digest_prints_it() {
    let temp = TempDir::new().unwrap();
    let file = temp.path().join("hello.txt");
    std::fs::write(&file, "Hello, World!").unwrap();

    selfswap(&temp)
        .arg("verify")
        .arg(&file)
        .assert()
        .success()
        .stdout(predicate::str::starts_with(HELLO_DIGEST));
}

#[test]
fn test_script_renders_windows_batch_anywhere() {
    let temp = TempDir::new().unwrap();
    let output = selfswap(&temp)
        .args([
            "script",
            "--platform",
            "windows",
            "--staged-dir",
            r"C:\Temp\app_update_1\staged",
            "--install-dir",
            r"C:\Program Files\App",
            "--temp-dir",
            r"C:\Temp\app_update_1",
            "--executable",
            "app.exe",
            "--grace-delay",
            "3",
        ])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let script = String::from_utf8(output).unwrap();
    assert!(script.contains("xcopy"));
    assert!(script.contains("ping -n 4"));
    assert!(script.contains(r"C:\Program Files\App"));
    assert!(script.contains("\r\n"));
}

#[cfg(unix)]
#[test]
fn test_script_rejects_relative_windows_paths() {
    let temp = TempDir::new().unwrap();
    selfswap(&temp)
        .args([
            "script",
            "--platform",
            "windows",
            "--staged-dir",
            "staged",
            "--install-dir",
            r"C:\App",
            "--temp-dir",
            r"C:\Temp\s",
            "--executable",
            "app.exe",
        ])
        .assert()
        .failure();
}

#[cfg(unix)]
#[test]
fn test_script_resolves_relative_posix_paths() {
    let temp = TempDir::new().unwrap();
    let root = temp.path().canonicalize().unwrap();
    let mut cmd = selfswap(&temp);
    cmd.current_dir(&root)
        .args([
            "script",
            "--platform",
            "posix",
            "--staged-dir",
            "session/staged",
            "--install-dir",
            "install",
            "--temp-dir",
            "session",
            "--executable",
            "app",
        ])
        .assert()
        .success()
        .stdout(
            predicate::str::starts_with("#!/bin/sh")
                .and(predicate::str::contains(root.join("install").display().to_string())),
        );
}

#[test]
fn test_check_reports_available_update() {
    let temp = TempDir::new().unwrap();
    let url = publish_manifest(&temp, "2.0.0");

    selfswap(&temp)
        .args(["check", "--manifest-url", &url, "--installed", "1.0.0"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Update available:").and(predicate::str::contains("2.0.0")));
}

#[test]
fn test_check_reports_up_to_date() {
    let temp = TempDir::new().unwrap();
    let url = publish_manifest(&temp, "2.0.0");

    selfswap(&temp)
        .args(["check", "--manifest-url", &url, "--installed", "v2.0.0"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Up to date"));
}

#[test]
fn test_check_without_manifest_url_fails() {
    let temp = TempDir::new().unwrap();
    selfswap(&temp)
        .arg("check")
        .assert()
        .failure()
        .stderr(predicate::str::contains("No manifest URL configured"));
}

#[test]
fn test_check_uses_config_file() {
    let temp = TempDir::new().unwrap();
    let url = publish_manifest(&temp, "2.0.0");
    let config = temp.path().join("config.toml");
    std::fs::write(&config, format!("[update]\nmanifest_url = \"{url}\"\n")).unwrap();

    Command::cargo_bin("selfswap")
        .unwrap()
        .args(["--no-progress", "--config"])
        .arg(&config)
        .args(["check", "--installed", "1.0.0"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Update available:"));
}

#[test]
fn test_watch_once_when_up_to_date() {
    let temp = TempDir::new().unwrap();
    let url = publish_manifest(&temp, "1.0.0");
    let install = temp.path().join("install");
    std::fs::create_dir_all(&install).unwrap();

    selfswap(&temp)
        .args(["watch", "--once", "--interval", "0", "--manifest-url", &url, "--installed", "1.0.0"])
        .arg("--install-dir")
        .arg(&install)
        .args(["--executable", "app"])
        .timeout(std::time::Duration::from_secs(30))
        .assert()
        .success()
        .stdout(predicate::str::contains("Up to date"));
}

#[test]
fn test_watch_once_declined_by_user() {
    let temp = TempDir::new().unwrap();
    let url = publish_manifest(&temp, "2.0.0");
    let install = temp.path().join("install");
    std::fs::create_dir_all(&install).unwrap();

    selfswap(&temp)
        .args(["watch", "--once", "--interval", "0", "--manifest-url", &url, "--installed", "1.0.0"])
        .arg("--install-dir")
        .arg(&install)
        .args(["--executable", "app"])
        .write_stdin("n\n")
        .timeout(std::time::Duration::from_secs(30))
        .assert()
        .success()
        .stdout(predicate::str::contains("Update available:").and(predicate::str::contains("declined")));

    assert_eq!(std::fs::read_dir(&install).unwrap().count(), 0);
}
