//! Command-line behaviour of the scaleval binary.

mod common;

use assert_cmd::Command;
use indoc::indoc;
use serde_json::Value;
use std::fs;
use tempfile::TempDir;

fn scaleval(dir: &TempDir) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_scaleval"));
    cmd.current_dir(dir.path())
        .env("SCALEVAL_QUIET", "true")
        .env("NO_COLOR", "1");
    cmd
}

#[test]
fn test_init_writes_config_once() {
    let dir = TempDir::new().unwrap();
    scaleval(&dir).arg("init").assert().success();
    let contents = fs::read_to_string(dir.path().join(".scaleval.toml")).unwrap();
    assert!(contents.contains("[network]"));

    scaleval(&dir).arg("init").assert().failure();
    scaleval(&dir).args(["init", "--force"]).assert().success();
}

#[test]
fn test_analyze_writes_json_report() {
    let dir = TempDir::new().unwrap();
    let survey = common::write_survey(dir.path(), 300, 17);
    let output = dir.path().join("out").join("report.json");

    scaleval(&dir)
        .arg("analyze")
        .arg(&survey)
        .args(["--no-network", "--seed", "5", "--output"])
        .arg(&output)
        .assert()
        .success();

    let json: Value = serde_json::from_str(&fs::read_to_string(&output).unwrap()).unwrap();
    assert_eq!(json["split"]["seed"], 5);
    assert!(json["network"].is_null());
    assert_eq!(json["cfa"]["loadings"].as_array().map(Vec::len), Some(15));
}

#[test]
fn test_analyze_markdown_to_stdout() {
    let dir = TempDir::new().unwrap();
    let survey = common::write_survey(dir.path(), 300, 4);

    let assert = scaleval(&dir)
        .arg("analyze")
        .arg(&survey)
        .args(["--no-network", "--format", "markdown"])
        .assert()
        .success();
    let stdout = String::from_utf8_lossy(&assert.get_output().stdout).to_string();
    assert!(stdout.starts_with("# Scale validation report"));
    assert!(stdout.contains("## Confirmatory fit indices"));
    assert!(stdout.contains("## Heterotrait-monotrait ratio"));
}

#[test]
fn test_analyze_missing_survey_fails() {
    let dir = TempDir::new().unwrap();
    let assert = scaleval(&dir)
        .args(["analyze", "missing.csv"])
        .assert()
        .failure();
    let stderr = String::from_utf8_lossy(&assert.get_output().stderr).to_string();
    assert!(stderr.contains("does not exist"));
}

#[test]
fn test_invalid_config_lists_fields() {
    let dir = TempDir::new().unwrap();
    let survey = common::write_survey(dir.path(), 50, 2);
    fs::write(
        dir.path().join("bad.toml"),
        indoc! {"
            [network]
            workers = 0

            [split]
            exploratory_fraction = 1.5
        "},
    )
    .unwrap();

    let assert = scaleval(&dir)
        .arg("analyze")
        .arg(&survey)
        .args(["--config", "bad.toml"])
        .assert()
        .failure();
    let stderr = String::from_utf8_lossy(&assert.get_output().stderr).to_string();
    assert!(stderr.contains("network.workers"));
    assert!(stderr.contains("split.exploratory_fraction"));
}

#[test]
fn test_content_validity_command() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("ratings.csv"),
        indoc! {"
            item,judge,rating
            A1,j1,4
            A1,j2,4
            A1,j3,3
            A2,j1,1
            A2,j2,2
            A2,j3,1
        "},
    )
    .unwrap();

    let assert = scaleval(&dir)
        .args(["content-validity", "ratings.csv", "--format", "json"])
        .assert()
        .success();
    let json: Value = serde_json::from_slice(&assert.get_output().stdout).unwrap();
    let items = json["items"].as_array().unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0]["item"], "A1");
    assert_eq!(items[1]["adequate"], false);
}
