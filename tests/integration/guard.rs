//! Commands and timer ticks that arrive while an update session is already running.

use std::sync::Arc;
use std::time::Duration;

use selfswap::test_utils::{ManifestFixture, RecordingLauncher, UpdateTestEnvironment, sha256_hex};
use selfswap::update::{
    InstalledVersion, RunOutcome, UpdateConfig, UpdateEvent, UpdateOrchestrator, UpdateState,
};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::common::{count, entered, wait_for};

const ARTIFACT: &[u8] = b"#!/bin/sh\necho slow download\n";

#[tokio::test]
async fn test_check_now_during_download_is_ignored() {
    let env = UpdateTestEnvironment::new().unwrap();
    let server = MockServer::start().await;
    let manifest =
        ManifestFixture::direct("2.0.0", &format!("{}/app", server.uri()), &sha256_hex(ARTIFACT)).content;

    Mock::given(method("GET"))
        .and(path("/release.json"))
        .respond_with(ResponseTemplate::new(200).set_body_string(manifest))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/app"))
        .respond_with(
            ResponseTemplate::new(200).set_body_bytes(ARTIFACT).set_delay(Duration::from_millis(1500)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let launcher = Arc::new(RecordingLauncher::default());
    let (handle, mut events, orchestrator) = UpdateOrchestrator::new(
        env.config(&format!("{}/release.json", server.uri())),
        InstalledVersion::new("1.0.0").unwrap(),
        env.target("app"),
    )
    .unwrap();
    let runner = tokio::spawn(orchestrator.with_launcher(launcher.clone()).run());

    handle.check_now().await.unwrap();
    let mut seen = wait_for(&mut events, |e| entered(e, UpdateState::Prompting)).await;
    handle.confirm_update().await.unwrap();
    seen.extend(wait_for(&mut events, |e| entered(e, UpdateState::Downloading)).await);

    // Neither a new check nor a second confirmation may start anything
    handle.check_now().await.unwrap();
    handle.confirm_update().await.unwrap();
    handle.check_now().await.unwrap();

    seen.extend(wait_for(&mut events, |e| matches!(e, UpdateEvent::AboutToRestart { .. })).await);
    assert!(matches!(runner.await.unwrap().unwrap(), RunOutcome::HandedOff { .. }));

    assert_eq!(count(&seen, |e| *e == UpdateEvent::CheckStarted), 1);
    assert_eq!(count(&seen, |e| matches!(e, UpdateEvent::UpdateAvailable { .. })), 1);
    assert_eq!(count(&seen, |e| entered(e, UpdateState::Downloading)), 1);
    assert_eq!(launcher.launches().len(), 1);
    assert_eq!(env.session_dirs().len(), 1);

    server.verify().await;
}

#[tokio::test]
async fn test_shutdown_during_download_discards_session() {
    let env = UpdateTestEnvironment::new().unwrap();
    env.install_old_version("app").unwrap();
    let server = MockServer::start().await;
    let manifest =
        ManifestFixture::direct("2.0.0", &format!("{}/app", server.uri()), &sha256_hex(ARTIFACT)).content;

    Mock::given(method("GET"))
        .and(path("/release.json"))
        .respond_with(ResponseTemplate::new(200).set_body_string(manifest))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/app"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(ARTIFACT).set_delay(Duration::from_secs(3)))
        .mount(&server)
        .await;

    let launcher = Arc::new(RecordingLauncher::default());
    let (handle, mut events, orchestrator) = UpdateOrchestrator::new(
        env.config(&format!("{}/release.json", server.uri())),
        InstalledVersion::new("1.0.0").unwrap(),
        env.target("app"),
    )
    .unwrap();
    let runner = tokio::spawn(orchestrator.with_launcher(launcher.clone()).run());

    handle.check_now().await.unwrap();
    wait_for(&mut events, |e| entered(e, UpdateState::Prompting)).await;
    handle.confirm_update().await.unwrap();
    wait_for(&mut events, |e| entered(e, UpdateState::Downloading)).await;
    handle.shutdown().await;

    assert_eq!(runner.await.unwrap().unwrap(), RunOutcome::Shutdown);
    assert!(launcher.launches().is_empty());
    assert!(env.session_dirs().is_empty(), "session directory left behind");
    assert_eq!(std::fs::read(env.install_dir.join("app")).unwrap(), b"#!/bin/sh\necho old\n");
}

#[tokio::test]
async fn test_timer_ticks_during_download_are_ignored() {
    let env = UpdateTestEnvironment::new().unwrap();
    let server = MockServer::start().await;
    let manifest =
        ManifestFixture::direct("2.0.0", &format!("{}/app", server.uri()), &sha256_hex(ARTIFACT)).content;

    Mock::given(method("GET"))
        .and(path("/release.json"))
        .respond_with(ResponseTemplate::new(200).set_body_string(manifest))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/app"))
        .respond_with(
            ResponseTemplate::new(200).set_body_bytes(ARTIFACT).set_delay(Duration::from_millis(3500)),
        )
        .expect(1)
        .mount(&server)
        .await;

    // First tick fires at once, then every second while the download stalls
    let config = UpdateConfig {
        check_interval: 1,
        check_on_startup: true,
        ..env.config(&format!("{}/release.json", server.uri()))
    };
    let launcher = Arc::new(RecordingLauncher::default());
    let (handle, mut events, orchestrator) =
        UpdateOrchestrator::new(config, InstalledVersion::new("1.0.0").unwrap(), env.target("app")).unwrap();
    let runner = tokio::spawn(orchestrator.with_launcher(launcher.clone()).run());

    let mut seen = wait_for(&mut events, |e| entered(e, UpdateState::Prompting)).await;
    handle.confirm_update().await.unwrap();
    seen.extend(wait_for(&mut events, |e| matches!(e, UpdateEvent::AboutToRestart { .. })).await);
    assert!(matches!(runner.await.unwrap().unwrap(), RunOutcome::HandedOff { .. }));

    assert_eq!(count(&seen, |e| *e == UpdateEvent::CheckStarted), 1);
    assert_eq!(count(&seen, |e| entered(e, UpdateState::Checking)), 1);
    assert_eq!(count(&seen, |e| entered(e, UpdateState::Downloading)), 1);
    assert_eq!(launcher.launches().len(), 1);
    assert_eq!(env.session_dirs().len(), 1);

    server.verify().await;
}
