//! A generated restart script swapping a real installation.
#![cfg(unix)]

use std::path::Path;
use std::time::Duration;

use selfswap::test_utils::{ArchiveFixture, ManifestFixture, UpdateTestEnvironment, sha256_hex};
use selfswap::update::{
    DetachedLauncher, InstalledVersion, PlatformKind, ProcessLauncher, RestartScriptGenerator, RunOutcome,
    ScriptParams, UpdateEvent, UpdateOrchestrator, UpdateState,
};

use crate::common::{entered, wait_for};

const NEW_APP: &[u8] = b"#!/bin/sh\necho relaunched > \"$PWD/relaunched.marker\"\n";

/// Poll until `condition` holds or ten seconds pass.
async fn eventually(mut condition: impl FnMut() -> bool) -> bool {
    for _ in 0..100 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    condition()
}

#[tokio::test]
async fn test_update_swaps_files_and_relaunches() {
    let env = UpdateTestEnvironment::new().unwrap();
    env.install_old_version("app").unwrap();

    let zip = ArchiveFixture::wrapped("app-1.2.0")
        .executable("app", NEW_APP)
        .file("lib/data.txt", b"new data")
        .write_zip(&env.release_dir.join("app-1.2.0.zip"))
        .unwrap();
    ManifestFixture::direct("1.2.0", &env.release_url("app-1.2.0.zip"), &sha256_hex(&zip))
        .write_to(&env.release_dir.join("release.json"))
        .unwrap();

    let (handle, mut events, orchestrator) = UpdateOrchestrator::new(
        env.config(&env.release_url("release.json")),
        InstalledVersion::new("1.1.3").unwrap(),
        env.target("app"),
    )
    .unwrap();
    let runner = tokio::spawn(orchestrator.run());

    handle.check_now().await.unwrap();
    wait_for(&mut events, |e| entered(e, UpdateState::Prompting)).await;
    handle.confirm_update().await.unwrap();
    wait_for(&mut events, |e| matches!(e, UpdateEvent::AboutToRestart { .. })).await;
    assert!(matches!(runner.await.unwrap().unwrap(), RunOutcome::HandedOff { .. }));

    let marker = env.install_dir.join("relaunched.marker");
    assert!(eventually(|| marker.is_file()).await, "new version was not relaunched");
    assert!(eventually(|| env.session_dirs().is_empty()).await, "temp directory was not removed");

    assert_eq!(std::fs::read(env.install_dir.join("app")).unwrap(), NEW_APP);
    assert_eq!(std::fs::read(env.install_dir.join("lib/data.txt")).unwrap(), b"new data");
    // Files the release does not ship are kept
    assert!(env.install_dir.join("settings.json").is_file());
}

#[tokio::test]
async fn test_script_handles_awkward_paths() {
    let env = UpdateTestEnvironment::new().unwrap();
    let install = env.temp_dir.path().join("it's a $HOME dir");
    let session = env.temp_root.join("testapp_update_quoted");
    let staged = session.join("staged dir");
    std::fs::create_dir_all(&install).unwrap();
    std::fs::create_dir_all(&staged).unwrap();
    write_executable(&staged.join("app"), NEW_APP);

    let params = ScriptParams {
        staged_dir: staged,
        install_dir: install.clone(),
        temp_dir: session.clone(),
        executable: "app".to_string(),
        interpreter: None,
        grace_delay: Duration::ZERO,
    };
    let script = RestartScriptGenerator::new(PlatformKind::Posix).generate(&params).await.unwrap();
    DetachedLauncher.launch(PlatformKind::Posix, &script).unwrap();

    let marker = install.join("relaunched.marker");
    assert!(eventually(|| marker.is_file()).await, "script did not run to completion");
    assert!(eventually(|| !session.exists()).await, "session directory was not removed");
    assert!(!script.exists());
}

#[tokio::test]
async fn test_interpreter_relaunch() {
    let env = UpdateTestEnvironment::new().unwrap();
    let session = env.temp_root.join("testapp_update_interp");
    let staged = session.join("staged");
    std::fs::create_dir_all(&staged).unwrap();
    // Not executable; only runnable through the interpreter
    std::fs::write(staged.join("main.sh"), b"echo via interpreter > \"$PWD/relaunched.marker\"\n").unwrap();

    let params = ScriptParams {
        staged_dir: staged,
        install_dir: env.install_dir.clone(),
        temp_dir: session,
        executable: "main.sh".to_string(),
        interpreter: Some("/bin/sh".into()),
        grace_delay: Duration::ZERO,
    };
    let script = RestartScriptGenerator::new(PlatformKind::Posix).generate(&params).await.unwrap();
    DetachedLauncher.launch(PlatformKind::Posix, &script).unwrap();

    let marker = env.install_dir.join("relaunched.marker");
    assert!(
        eventually(|| std::fs::read_to_string(&marker).is_ok_and(|c| c.contains("via interpreter"))).await,
        "interpreter was not used to relaunch"
    );
}

fn write_executable(path: &Path, contents: &[u8]) {
    use std::os::unix::fs::PermissionsExt;
    std::fs::write(path, contents).unwrap();
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).unwrap();
}
