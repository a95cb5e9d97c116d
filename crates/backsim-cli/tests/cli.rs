use std::fs;
use std::io::Write;

use assert_cmd::prelude::*;
use predicates::prelude::*;

fn write_config(dir: &tempfile::TempDir) -> std::path::PathBuf {
    let path = dir.path().join("base.yaml");
    let mut f = fs::File::create(&path).unwrap();
    f.write_all(b"database_url: postgres://localhost/backsim_test\nrisk_defaults:\n  risk_max_pct: 2.0\n  size_min: 10.0\n  size_max: 500.0\n")
        .unwrap();
    path
}

#[test]
fn config_hash_prints_a_stable_hash_for_the_same_layered_document() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let config_path = write_config(&dir);

    let mut first = assert_cmd::Command::cargo_bin("backsim")?;
    first.args(["config-hash", &config_path.to_string_lossy()]);
    let first_out = first.assert().success();
    let first_stdout = String::from_utf8(first_out.get_output().stdout.clone())?;
    let first_line = first_stdout.lines().next().unwrap();
    assert!(first_line.starts_with("config_hash="));

    let mut second = assert_cmd::Command::cargo_bin("backsim")?;
    second.args(["config-hash", &config_path.to_string_lossy()]);
    second.assert().success().stdout(predicate::str::contains(first_line));

    Ok(())
}

#[test]
fn run_rejects_a_malformed_start_timestamp_before_touching_the_database() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let config_path = write_config(&dir);

    let mut cmd = assert_cmd::Command::cargo_bin("backsim")?;
    cmd.args([
        "run",
        "--start",
        "not-a-timestamp",
        "--end",
        "2024-01-01T00:05:00Z",
        "--config",
        &config_path.to_string_lossy(),
    ]);

    cmd.assert().failure().stderr(predicate::str::contains("invalid --start timestamp"));

    Ok(())
}
