//! Full update sessions against a mock release server.

use std::sync::Arc;
use std::time::Duration;

use selfswap::core::ErrorKind;
use selfswap::test_utils::{
    ArchiveFixture, ManifestFixture, RecordingLauncher, UpdateTestEnvironment, sha256_hex, snapshot_dir,
};
use selfswap::update::{InstalledVersion, RunOutcome, UpdateEvent, UpdateOrchestrator, UpdateState};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::common::{collect_for, count, entered, states, wait_for};

/// Publish `manifest` at `/release.json` and `artifact` at `artifact_path`.
async fn release_server(manifest: impl Fn(&str) -> String, artifact_path: &str, artifact: Vec<u8>) -> MockServer {
    let server = MockServer::start().await;
    let body = manifest(&format!("{}{}", server.uri(), artifact_path));
    Mock::given(method("GET"))
        .and(path("/release.json"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(artifact_path))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(artifact))
        .mount(&server)
        .await;
    server
}

#[tokio::test]
async fn test_verified_zip_update_is_staged_and_handed_off() {
    let env = UpdateTestEnvironment::new().unwrap();
    env.install_old_version("app").unwrap();
    let before = snapshot_dir(&env.install_dir);

    let zip = ArchiveFixture::wrapped("app-1.2.0")
        .executable("app", b"#!/bin/sh\necho new\n")
        .file("lib/data.txt", b"payload v1.2.0")
        .write_zip(&env.release_dir.join("app-1.2.0.zip"))
        .unwrap();
    let checksum = sha256_hex(&zip);
    let server = release_server(
        |url| ManifestFixture::direct("1.2.0", url, &checksum).content,
        "/download/app-1.2.0.zip",
        zip,
    )
    .await;

    let launcher = Arc::new(RecordingLauncher::default());
    let (handle, mut events, orchestrator) = UpdateOrchestrator::new(
        env.config(&format!("{}/release.json", server.uri())),
        InstalledVersion::new("1.1.3").unwrap(),
        env.target("app"),
    )
    .unwrap();
    let runner = tokio::spawn(orchestrator.with_launcher(launcher.clone()).run());

    handle.check_now().await.unwrap();
    let offer = wait_for(&mut events, |e| entered(e, UpdateState::Prompting)).await;
    assert!(offer.contains(&UpdateEvent::UpdateAvailable {
        version: "1.2.0".to_string(),
        installed: "1.1.3".to_string(),
        verifiable: true,
    }));

    handle.confirm_update().await.unwrap();
    let seen = wait_for(&mut events, |e| matches!(e, UpdateEvent::AboutToRestart { .. })).await;

    let RunOutcome::HandedOff {
        script,
    } = runner.await.unwrap().unwrap()
    else {
        panic!("expected handoff");
    };
    assert_eq!(launcher.launches(), vec![script.clone()]);

    // Progress never decreases and reaches 100 before staging starts
    let progress: Vec<u8> = seen
        .iter()
        .filter_map(|e| match e {
            UpdateEvent::DownloadProgress {
                percent,
            } => Some(*percent),
            _ => None,
        })
        .collect();
    assert!(progress.windows(2).all(|w| w[0] <= w[1]), "progress went backwards: {progress:?}");
    assert_eq!(progress.last(), Some(&100));
    let hundred = seen.iter().position(|e| *e == UpdateEvent::DownloadProgress { percent: 100 }).unwrap();
    let staging = seen.iter().position(|e| entered(e, UpdateState::Staging)).unwrap();
    assert!(hundred < staging);

    let visited = states(&seen);
    assert_eq!(
        visited,
        vec![
            UpdateState::Confirmed,
            UpdateState::Downloading,
            UpdateState::Verifying,
            UpdateState::Staging,
            UpdateState::ReadyToRestart,
            UpdateState::HandedOff,
        ]
    );

    // Staged tree sits in the session directory, unwrapped from its root
    let sessions = env.session_dirs();
    assert_eq!(sessions.len(), 1);
    assert!(script.starts_with(&sessions[0]));
    let staged = snapshot_dir(&sessions[0]);
    assert!(
        staged
            .iter()
            .any(|(p, c)| p.ends_with("app-1.2.0/lib/data.txt") && c.as_slice() == b"payload v1.2.0")
    );

    let script_text = std::fs::read_to_string(&script).unwrap();
    assert!(script_text.contains(&env.install_dir.display().to_string()));
    assert!(script_text.contains("app-1.2.0"));

    // Nothing touched the installation before handoff
    assert_eq!(snapshot_dir(&env.install_dir), before);
}

#[tokio::test]
async fn test_release_document_rejected_without_opt_in() {
    let env = UpdateTestEnvironment::new().unwrap();
    let zip = ArchiveFixture::wrapped("acme-app-3f2a9c1")
        .executable("app", b"new")
        .write_zip(&env.release_dir.join("zipball"))
        .unwrap();
    let server = release_server(
        |url| ManifestFixture::release("v1.2.0", url).content,
        "/repos/acme/app/zipball/v1.2.0",
        zip,
    )
    .await;

    let launcher = Arc::new(RecordingLauncher::default());
    let (handle, mut events, orchestrator) = UpdateOrchestrator::new(
        env.config(&format!("{}/release.json", server.uri())),
        InstalledVersion::new("1.1.3").unwrap(),
        env.target("app"),
    )
    .unwrap();
    tokio::spawn(orchestrator.with_launcher(launcher.clone()).run());

    handle.check_now().await.unwrap();
    let seen = wait_for(&mut events, |e| entered(e, UpdateState::Idle)).await;

    assert!(seen.iter().any(|e| matches!(
        e,
        UpdateEvent::Error {
            kind: ErrorKind::ChecksumUnavailable,
            ..
        }
    )));
    assert_eq!(count(&seen, |e| matches!(e, UpdateEvent::UpdateAvailable { .. })), 0);
    assert!(env.session_dirs().is_empty());
    assert!(launcher.launches().is_empty());
    handle.shutdown().await;
}

#[tokio::test]
async fn test_release_document_installed_with_reduced_trust() {
    let env = UpdateTestEnvironment::new().unwrap();
    env.install_old_version("app").unwrap();
    let zip = ArchiveFixture::wrapped("acme-app-3f2a9c1")
        .executable("app", b"#!/bin/sh\necho new\n")
        .write_zip(&env.release_dir.join("zipball"))
        .unwrap();
    let server = release_server(
        |url| ManifestFixture::release("v1.2.0", url).content,
        "/repos/acme/app/zipball/v1.2.0",
        zip,
    )
    .await;

    let mut config = env.config(&format!("{}/release.json", server.uri()));
    config.allow_unverified = true;
    let launcher = Arc::new(RecordingLauncher::default());
    let (handle, mut events, orchestrator) =
        UpdateOrchestrator::new(config, InstalledVersion::new("1.1.3").unwrap(), env.target("app")).unwrap();
    let runner = tokio::spawn(orchestrator.with_launcher(launcher.clone()).run());

    handle.check_now().await.unwrap();
    let offer = wait_for(&mut events, |e| entered(e, UpdateState::Prompting)).await;
    assert!(offer.iter().any(|e| matches!(e, UpdateEvent::UpdateAvailable { verifiable: false, .. })));
    assert!(offer.iter().any(|e| matches!(
        e,
        UpdateEvent::LogLine { text } if text.contains("reduced trust")
    )));

    handle.confirm_update().await.unwrap();
    wait_for(&mut events, |e| matches!(e, UpdateEvent::AboutToRestart { .. })).await;
    assert!(matches!(runner.await.unwrap().unwrap(), RunOutcome::HandedOff { .. }));
    assert_eq!(launcher.launches().len(), 1);
}

#[tokio::test]
async fn test_declined_version_not_reoffered_by_timer() {
    let env = UpdateTestEnvironment::new().unwrap();
    let artifact = env.release_dir.join("app");
    std::fs::write(&artifact, b"new").unwrap();
    ManifestFixture::direct("1.2.0", &env.release_url("app"), &sha256_hex(b"new"))
        .write_to(&env.release_dir.join("release.json"))
        .unwrap();

    let mut config = env.config(&env.release_url("release.json"));
    config.check_interval = 1;
    config.check_on_startup = true;
    let (handle, mut events, orchestrator) =
        UpdateOrchestrator::new(config, InstalledVersion::new("1.1.3").unwrap(), env.target("app")).unwrap();
    tokio::spawn(orchestrator.run());

    wait_for(&mut events, |e| entered(e, UpdateState::Prompting)).await;
    handle.decline_update().await.unwrap();
    wait_for(&mut events, |e| entered(e, UpdateState::Idle)).await;

    let later = collect_for(&mut events, Duration::from_millis(2500)).await;
    assert!(
        count(&later, |e| *e == UpdateEvent::CheckStarted) >= 1,
        "timer should keep checking: {later:?}"
    );
    assert_eq!(count(&later, |e| matches!(e, UpdateEvent::UpdateAvailable { .. })), 0);

    // An explicit check offers it again. It is ignored if it lands while a
    // timer check is in flight, so retry a few times.
    let mut reoffered = false;
    for _ in 0..5 {
        handle.check_now().await.unwrap();
        let seen = collect_for(&mut events, Duration::from_millis(400)).await;
        if seen.iter().any(|e| matches!(e, UpdateEvent::UpdateAvailable { .. })) {
            reoffered = true;
            break;
        }
    }
    assert!(reoffered, "explicit check did not re-offer the declined version");
    handle.shutdown().await;
}
