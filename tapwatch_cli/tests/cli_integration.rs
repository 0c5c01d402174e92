use assert_cmd::prelude::*;
use predicates::prelude::*;
use rstest::rstest;
use std::fs;
use std::path::PathBuf;
use std::process::Command;
use tempfile::tempdir;

// Minimal valid config for the simulated backend
fn write_valid_config(dir: &tempfile::TempDir) -> PathBuf {
    let toml = r#"
[session]
interval_ms = 100
collaborator_timeout_ms = 500
failure_threshold = 2
control_poll_ms = 10

[capture]
backend = "simulated"

[[field]]
name = "gold"
targets = [1000000.0, 50.0]
region = { x = 10, y = 10, width = 100, height = 20 }
simulate = { start = 100.0, rate_per_sec = 20.0 }

[[field]]
name = "gems"
policy = "nondecreasing"
region = { x = 10, y = 40, width = 100, height = 20 }
simulate = { start = 5.0, rate_per_sec = 1.0 }
"#;
    let path = dir.path().join("cfg.toml");
    fs::write(&path, toml).unwrap();
    path
}

#[rstest]
#[case(&["--help"], 0, "Usage:", "stdout")]
#[case(&["run", "--cycles", "3"], 0, "summary: 3 cycles", "stdout")]
#[case(&["run", "--cycles", "2", "--interval-ms", "10"], 2, "--interval-ms must be >= 100", "stderr")]
#[case(&["parse", "--field", "gold", "1.5K"], 0, "1500", "stdout")]
#[case(&["parse", "--field", "gold", "1,234"], 0, "1234", "stdout")]
#[case(&["parse", "--field", "gold", "abc"], 1, "non-numeric", "stderr")]
#[case(&["parse", "--field", "silver", "12"], 1, "No field named 'silver'", "stderr")]
#[case(&["self-check"], 0, "self-check ok (2 fields)", "stdout")]
#[case(&["replay"], 2, "required", "stderr")]
fn cli_table_cases(
    #[case] args: &[&str],
    #[case] exit_code: i32,
    #[case] needle: &str,
    #[case] stream: &str,
) {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);

    let mut cmd = Command::cargo_bin("tapwatch_cli").unwrap();

    // Always include a valid config to avoid relying on default path
    cmd.arg("--config").arg(&cfg).arg("--log-level").arg("error");

    for a in args {
        cmd.arg(a);
    }

    let assert = cmd.assert().code(exit_code);
    match stream {
        "stdout" => {
            assert.stdout(predicate::str::contains(needle));
        }
        "stderr" => {
            assert.stderr(predicate::str::contains(needle));
        }
        other => panic!("unknown stream: {other}"),
    }
}

#[rstest]
fn run_reports_every_field_each_cycle() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);

    let out = Command::cargo_bin("tapwatch_cli")
        .unwrap()
        .args(["--log-level", "error", "--config"])
        .arg(&cfg)
        .args(["run", "--cycles", "4"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let stdout = String::from_utf8_lossy(&out);
    assert_eq!(stdout.matches("cycle ").count(), 4, "stdout: {stdout}");
    assert!(stdout.contains("gold"));
    assert!(stdout.contains("gems"));
    // 50 is below the simulated start, so it is already reached
    assert!(stdout.contains("50: reached"), "stdout: {stdout}");
}

#[rstest]
fn interactive_stop_ends_an_unbounded_run() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);

    assert_cmd::Command::cargo_bin("tapwatch_cli")
        .unwrap()
        .args(["--log-level", "error", "--config"])
        .arg(&cfg)
        .args(["run", "--interactive"])
        .write_stdin("pause\nresume\nstop\n")
        .timeout(std::time::Duration::from_secs(20))
        .assert()
        .success()
        .stdout(predicate::str::contains("Stopped"));
}

#[rstest]
fn failing_capture_hits_threshold_exit_code() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);

    Command::cargo_bin("tapwatch_cli")
        .unwrap()
        .env("TAPWATCH_TEST_SIM_FAIL", "1")
        .args(["--log-level", "error", "--config"])
        .arg(&cfg)
        .args(["run", "--cycles", "10"])
        .assert()
        .code(3)
        .stderr(predicate::str::contains(
            "What happened: Capture or OCR failed for every field in 2 consecutive cycles",
        ));
}

#[rstest]
fn self_check_reports_failing_fields() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);

    Command::cargo_bin("tapwatch_cli")
        .unwrap()
        .env("TAPWATCH_TEST_SIM_FAIL", "1")
        .arg("--config")
        .arg(&cfg)
        .arg("self-check")
        .assert()
        .code(1)
        .stdout(predicate::str::contains("FAIL gold: window-not-found"))
        .stderr(predicate::str::contains("2 of 2 fields could not be read"));
}

#[rstest]
fn invalid_config_exits_with_two() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("bad.toml");
    fs::write(
        &path,
        r#"
[session]
interval_ms = 10

[[field]]
name = "gold"
region = { x = 0, y = 0, width = 10, height = 10 }
"#,
    )
    .unwrap();

    Command::cargo_bin("tapwatch_cli")
        .unwrap()
        .arg("--config")
        .arg(&path)
        .arg("self-check")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("session.interval_ms must be >= 100"));

    Command::cargo_bin("tapwatch_cli")
        .unwrap()
        .arg("--config")
        .arg(dir.path().join("missing.toml"))
        .arg("self-check")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("cannot read"));
}

#[rstest]
fn init_writes_a_usable_config_once() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("etc").join("tapwatch.toml");

    Command::cargo_bin("tapwatch_cli")
        .unwrap()
        .arg("--config")
        .arg(&path)
        .arg("init")
        .assert()
        .success();
    assert!(fs::read_to_string(&path).unwrap().contains("[[field]]"));

    Command::cargo_bin("tapwatch_cli")
        .unwrap()
        .arg("--config")
        .arg(&path)
        .arg("init")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("--force"));

    Command::cargo_bin("tapwatch_cli")
        .unwrap()
        .arg("--config")
        .arg(&path)
        .args(["init", "--force"])
        .assert()
        .success();

    Command::cargo_bin("tapwatch_cli")
        .unwrap()
        .args(["--log-level", "error", "--config"])
        .arg(&path)
        .args(["parse", "--field", "gold", "12.5K"])
        .assert()
        .success()
        .stdout(predicate::str::contains("12500"));
}

#[rstest]
fn replay_feeds_recorded_text() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);
    let csv = dir.path().join("replay.csv");
    fs::write(
        &csv,
        "t_ms,field,text\n0,gold,100\n5000,gold,110\n10000,gold,119\n15000,gold,300\n20000,gold,129\n25000,gold,\n",
    )
    .unwrap();

    let out = Command::cargo_bin("tapwatch_cli")
        .unwrap()
        .args(["--log-level", "error", "--config"])
        .arg(&cfg)
        .arg("replay")
        .arg("--csv")
        .arg(&csv)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let stdout = String::from_utf8_lossy(&out);
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines.len(), 6, "stdout: {stdout}");
    assert!(lines[3].contains("rejected:implausible-spike"), "{}", lines[3]);
    assert!(lines[4].contains("accepted"));
    assert!(lines[4].contains("+1.80/s"), "{}", lines[4]);
    assert!(lines[5].contains("unparsable:empty"), "{}", lines[5]);
}

#[rstest]
fn replay_rejects_bad_header_and_unknown_field() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);

    let bad = dir.path().join("bad.csv");
    fs::write(&bad, "time,field,text\n0,gold,1\n").unwrap();
    Command::cargo_bin("tapwatch_cli")
        .unwrap()
        .arg("--config")
        .arg(&cfg)
        .args(["replay", "--csv"])
        .arg(&bad)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid headers"));

    let unknown = dir.path().join("unknown.csv");
    fs::write(&unknown, "t_ms,field,text\n0,silver,1\n").unwrap();
    Command::cargo_bin("tapwatch_cli")
        .unwrap()
        .arg("--config")
        .arg(&cfg)
        .args(["replay", "--csv"])
        .arg(&unknown)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("No field named 'silver'"));
}
