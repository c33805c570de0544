//! Bridge process lifecycle against scripted stand-ins for `node bridge.js`
//!
//! Run with: cargo test --package anesteasy-e2e --test bridge_process
#![cfg(unix)]

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::{Duration, Instant};

use anesteasy_e2e::config::SessionConfig;
use anesteasy_e2e::driver::BrowserDriver;
use anesteasy_e2e::locator::Locator;
use anesteasy_e2e::playwright::{PlaywrightDriver, PlaywrightLauncher};
use anesteasy_e2e::runner::FailurePhase;
use anesteasy_e2e::scenario::Viewport;
use anesteasy_e2e::{E2eError, RunnerConfig, Scenario, ScenarioRunner};

/// Answers every op, fails `fill`, reports nothing visible, exits on `close`
const ANSWERING_BRIDGE: &str = r#"#!/bin/sh
echo 'stand-in bridge starting' >&2
echo '{"ready":true,"version":"1.48.2"}'
while IFS= read -r line; do
  id=$(printf '%s\n' "$line" | sed -n 's/.*"id":\([0-9]*\).*/\1/p')
  case "$line" in
    *'"op":"close"'*)
      printf '{"id":%s,"ok":true,"value":null}\n' "$id"
      exit 0 ;;
    *'"op":"frame_count"'*)
      printf '{"id":%s,"ok":true,"value":2}\n' "$id" ;;
    *'"op":"viewport_height"'*)
      printf '{"id":%s,"ok":true,"value":720}\n' "$id" ;;
    *'"op":"expect_visible"'*)
      printf '{"id":%s,"ok":true,"value":false}\n' "$id" ;;
    *'"op":"fill"'*)
      printf '{"id":%s,"ok":false,"error":"locator.fill: Timeout 5000ms exceeded."}\n' "$id" ;;
    *'"op":"screenshot"'*)
      path=$(printf '%s\n' "$line" | sed -n 's/.*"path":"\([^"]*\)".*/\1/p')
      mkdir -p "$(dirname "$path")" && : > "$path"
      printf '{"id":%s,"ok":true,"value":null}\n' "$id" ;;
    *)
      printf '{"id":%s,"ok":true,"value":null}\n' "$id" ;;
  esac
done
"#;

/// Ignores SIGTERM and never answers `close`
const STUCK_BRIDGE: &str = r#"#!/bin/sh
trap '' TERM
echo '{"ready":true,"version":"1.48.2"}'
while IFS= read -r line; do
  id=$(printf '%s\n' "$line" | sed -n 's/.*"id":\([0-9]*\).*/\1/p')
  case "$line" in
    *'"op":"close"'*) ;;
    *) printf '{"id":%s,"ok":true,"value":null}\n' "$id" ;;
  esac
done
while :; do sleep 1; done
"#;

/// Browser launch failure reported on the ready line
const FAILING_BRIDGE: &str = r#"#!/bin/sh
echo '{"ready":false,"error":"Executable not found at /ms-playwright/chromium-1140"}'
exit 1
"#;

/// Stand-in scripts are written once, before any test spawns a process,
/// so no fork can inherit a script that is still open for writing.
fn bridges() -> &'static Path {
    static DIR: OnceLock<PathBuf> = OnceLock::new();
    DIR.get_or_init(|| {
        let dir = tempfile::tempdir().unwrap().into_path();
        for (name, body) in [
            ("answering", ANSWERING_BRIDGE),
            ("stuck", STUCK_BRIDGE),
            ("failing", FAILING_BRIDGE),
        ] {
            let path = dir.join(name);
            std::fs::write(&path, body).unwrap();
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        }
        dir
    })
}

fn session(bridge: &str, workdir: &Path) -> SessionConfig {
    SessionConfig {
        node_binary: bridges().join(bridge),
        node_workdir: workdir.to_path_buf(),
        launch_timeout_ms: 5000,
        bridge_grace_ms: 200,
        ..Default::default()
    }
}

const VIEWPORT: Viewport = Viewport {
    width: 1280,
    height: 720,
};

#[tokio::test]
async fn test_spawn_waits_for_ready_line() {
    let workdir = tempfile::tempdir().unwrap();
    let mut driver = PlaywrightDriver::spawn(&session("answering", workdir.path()), VIEWPORT)
        .await
        .unwrap();
    assert!(driver.id().is_some());
    driver.close().await.unwrap();
}

#[tokio::test]
async fn test_launch_failure_on_ready_line() {
    let workdir = tempfile::tempdir().unwrap();
    let err = PlaywrightDriver::spawn(&session("failing", workdir.path()), VIEWPORT)
        .await
        .err()
        .unwrap();
    match err {
        E2eError::Bridge(msg) => assert!(msg.contains("Executable not found"), "{}", msg),
        other => panic!("unexpected error: {}", other),
    }
}

#[tokio::test]
async fn test_requests_round_trip() {
    let workdir = tempfile::tempdir().unwrap();
    let mut driver = PlaywrightDriver::spawn(&session("answering", workdir.path()), VIEWPORT)
        .await
        .unwrap();

    assert_eq!(driver.frame_count().await.unwrap(), 2);
    assert_eq!(driver.viewport_height().await.unwrap(), 720);

    let button = Locator::parse("xpath=html/body/div[2]/header/div/div/div[2]/a/button").unwrap();
    driver.click(&button, Duration::from_millis(5000)).await.unwrap();
    driver.scroll(0, 300).await.unwrap();
    assert!(!driver
        .expect_visible(&Locator::text("OCR Extraction Successful"), Duration::from_millis(1000))
        .await
        .unwrap());

    let input = Locator::parse("xpath=html/body/div[2]/div/div[2]/form/div/div/input").unwrap();
    let err = driver
        .fill(&input, "Dr. João Silva", Duration::from_millis(5000))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("Timeout 5000ms exceeded."));

    // An error response leaves the session usable
    assert_eq!(driver.frame_count().await.unwrap(), 2);
    driver.close().await.unwrap();
}

#[tokio::test]
async fn test_close_reaps_the_bridge() {
    let workdir = tempfile::tempdir().unwrap();
    let mut driver = PlaywrightDriver::spawn(&session("answering", workdir.path()), VIEWPORT)
        .await
        .unwrap();

    driver.close().await.unwrap();
    assert!(driver.id().is_none());

    // Idempotent, and the session refuses further work
    driver.close().await.unwrap();
    assert!(driver.frame_count().await.is_err());
}

#[tokio::test]
async fn test_unresponsive_bridge_is_killed_after_grace() {
    let workdir = tempfile::tempdir().unwrap();
    let mut driver = PlaywrightDriver::spawn(&session("stuck", workdir.path()), VIEWPORT)
        .await
        .unwrap();
    driver.scroll(0, 300).await.unwrap();

    let start = Instant::now();
    let err = driver.close().await.unwrap_err();
    let elapsed = start.elapsed();

    assert!(matches!(err, E2eError::BridgeTimeout { .. }), "{}", err);
    assert!(driver.id().is_none());
    // close deadline (2 x grace) then SIGTERM grace before the kill
    assert!(elapsed >= Duration::from_millis(600), "{:?}", elapsed);
    assert!(elapsed < Duration::from_secs(5), "{:?}", elapsed);
}

#[tokio::test]
async fn test_failure_screenshot_lands_in_output_dir() {
    let workdir = tempfile::tempdir().unwrap();
    let output_dir = PathBuf::from(format!("bridge-process-out-{}", std::process::id()));

    let mut config = RunnerConfig::default();
    config.session = session("answering", workdir.path());
    config.session.linger_ms = 0;
    config.output_dir = output_dir.clone();

    let scenario = Scenario::from_yaml(
        r#"
name: ocr
title: OCR
steps:
  - action: scroll
    delta_y: 300
expect:
  visible: [OCR Extraction Successful]
  timeout_ms: 1000
"#,
    )
    .unwrap();

    let runner = ScenarioRunner::new(config, PlaywrightLauncher::new());
    let result = runner.run_scenario(&scenario).await;

    let shot = output_dir.join("screenshots").join("ocr.png");
    let written = shot.exists();
    let misplaced = workdir.path().join(&shot).exists();
    let _ = std::fs::remove_dir_all(&output_dir);

    assert_eq!(result.phase, Some(FailurePhase::Assertion));
    assert_eq!(result.screenshot.as_deref(), Some(shot.as_path()));
    assert!(written, "screenshot missing at {}", shot.display());
    assert!(!misplaced, "screenshot resolved against node_workdir");
}
