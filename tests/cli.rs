use assert_cmd::prelude::*;
use predicates::prelude::*;
use predicates::str::contains;
use std::fs;
use std::process::Command;
use tempfile::tempdir;

#[test]
fn headless_run_prints_pass_order_and_saves_state() {
    let dir = tempdir().expect("temp dir");
    let state = dir.path().join("program_state.txt");
    fs::write(&state, "0.1\n0.2\n0.3\n1\n1\n2\n3\n0\n0\n-1\n").expect("write state");

    let mut cmd = Command::cargo_bin("scene-viewer").expect("binary exists");
    cmd.arg("--headless")
        .arg("--state")
        .arg(&state)
        .arg("--resources")
        .arg(dir.path())
        .arg("--frames")
        .arg("2");
    cmd.assert()
        .success()
        .stdout(contains("Loaded scene with 1 model(s) and 3 instance(s)"))
        .stdout(contains("Pass order: foliage -> water -> models -> skybox"))
        .stdout(contains("state DepthFunc(LessEqual)"))
        // overlay was open in the saved state
        .stdout(contains("overlay Camera position: (1.00, 2.00, 3.00)"))
        .stdout(contains("mouse update: off"));

    let saved = fs::read_to_string(&state).expect("state written");
    let lines: Vec<&str> = saved.lines().collect();
    assert_eq!(lines.len(), 10);
    assert_eq!(&lines[..7], &["0.1", "0.2", "0.3", "1", "1", "2", "3"]);
}

#[test]
fn headless_run_without_state_file_uses_defaults() {
    let dir = tempdir().expect("temp dir");
    let state = dir.path().join("fresh.txt");

    let mut cmd = Command::cargo_bin("scene-viewer").expect("binary exists");
    cmd.arg("--headless")
        .arg("--state")
        .arg(&state)
        .arg("--resources")
        .arg(dir.path());
    cmd.assert()
        .success()
        .stdout(contains("Camera position: (0.00, 0.00, 3.00)"))
        .stdout(contains("overlay").not());

    let saved = fs::read_to_string(&state).expect("state written");
    assert!(saved.starts_with("0\n0\n0\n0\n0\n0\n3\n"));
}

#[test]
fn unknown_argument_fails_with_usage() {
    let mut cmd = Command::cargo_bin("scene-viewer").expect("binary exists");
    cmd.arg("--bogus");
    cmd.assert()
        .failure()
        .stderr(contains("Unknown argument: --bogus"))
        .stderr(contains("Usage: scene-viewer"));
}
