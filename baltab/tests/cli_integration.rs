//! Integration tests for baltab CLI

use std::fs;
use std::path::Path;
use std::process::Command;

use tempfile::{tempdir, TempDir};

const DATA: &str = "\
treat,age,female,region,clusters
0,30,TRUE,north,1
0,34,FALSE,south,1
0,38,TRUE,north,2
0,42,FALSE,east,2
1,41,TRUE,south,3
1,45,TRUE,north,3
1,49,FALSE,south,4
1,53,FALSE,east,4
";

fn run_baltab(args: &[&str]) -> (String, String, bool) {
    let output = Command::new(env!("CARGO_BIN_EXE_baltab"))
        .args(args)
        .env("NO_COLOR", "1")
        .output()
        .expect("Failed to execute command");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();

    (stdout, stderr, success)
}

fn write_file(dir: &Path, name: &str, content: &str) -> String {
    let path = dir.join(name);
    fs::write(&path, content).unwrap();
    path.to_str().unwrap().to_string()
}

fn data_dir() -> (TempDir, String) {
    let dir = tempdir().unwrap();
    let data = write_file(dir.path(), "data.csv", DATA);
    (dir, data)
}

#[test]
fn test_cli_help() {
    let (stdout, _, success) = run_baltab(&["--help"]);

    assert!(success);
    assert!(stdout.contains("baltab"));
    assert!(stdout.contains("--group"));
    assert!(stdout.contains("--output"));
    assert!(stdout.contains("--dinm-statistic"));
    assert!(stdout.contains("--add-rows"));
}

#[test]
fn test_cli_version() {
    let (stdout, _, success) = run_baltab(&["--version"]);

    assert!(success);
    assert!(stdout.contains("baltab"));
}

#[test]
fn test_plain_output() {
    let (_dir, data) = data_dir();
    let (stdout, stderr, success) = run_baltab(&[&data, "--group", "treat"]);

    assert!(success, "stderr: {}", stderr);
    // flattened header
    assert!(stdout.contains("0 (N=4) / Mean"));
    assert!(stdout.contains("1 (N=4) / Std. Dev."));
    assert!(stdout.contains("Diff. in Means"));
    assert!(stdout.contains("Std. Error"));
    // age: 36.000 vs 47.000, difference 11.000
    assert!(stdout.contains("36.000"));
    assert!(stdout.contains("47.000"));
    assert!(stdout.contains("11.000"));
    assert!(stdout.contains("region: north"));
    // cluster column is not summarized
    assert!(!stdout.lines().any(|l| l.starts_with("clusters")));
}

#[test]
fn test_formula_grouping_and_p_value() {
    let (_dir, data) = data_dir();
    let (stdout, _, success) = run_baltab(&[
        &data,
        "-g",
        "~ treat",
        "--dinm-statistic",
        "p",
        "--fmt",
        "%.2f",
    ]);

    assert!(success);
    assert!(stdout.contains(" p"));
    assert!(!stdout.contains("Std. Error"));
    assert!(stdout.contains("36.00"));
}

#[test]
fn test_no_dinm() {
    let (_dir, data) = data_dir();
    let (stdout, _, success) = run_baltab(&[&data, "-g", "treat", "--no-dinm"]);

    assert!(success);
    assert!(!stdout.contains("Diff. in Means"));
}

#[test]
fn test_json_output() {
    let (_dir, data) = data_dir();
    let (stdout, _, success) = run_baltab(&[&data, "-g", "treat", "--json"]);

    assert!(success);
    let parsed: serde_json::Value = serde_json::from_str(&stdout).expect("Invalid JSON output");
    assert!(parsed.get("columns").is_some());
    assert!(parsed.get("rows").is_some());
    assert!(parsed["meta"].get("hrules").is_some());
    // age, female, then 3 region levels
    assert_eq!(parsed["rows"].as_array().unwrap().len(), 5);
}

#[test]
fn test_json_with_rendered_output_fails() {
    let (dir, data) = data_dir();
    let out = dir.path().join("balance.html");
    let (stdout, stderr, success) =
        run_baltab(&[&data, "-g", "treat", "--json", "-o", out.to_str().unwrap()]);

    assert!(!success);
    assert!(stdout.is_empty());
    assert!(stderr.contains("--json"));
    assert!(!out.exists());
}

#[test]
fn test_latex_keyword() {
    let (_dir, data) = data_dir();
    let (stdout, _, success) = run_baltab(&[&data, "-g", "treat", "-o", "latex", "--title", "Balance"]);

    assert!(success);
    assert!(stdout.contains("\\begin{tabular}"));
    assert!(stdout.contains("\\multicolumn{4}{c}{0 (N=4)}"));
    assert!(stdout.contains("\\caption{Balance}"));
}

#[test]
fn test_file_output() {
    let (dir, data) = data_dir();
    let out = dir.path().join("balance.html");
    let (stdout, _, success) = run_baltab(&[&data, "-g", "treat", "-o", out.to_str().unwrap()]);

    assert!(success);
    assert!(stdout.is_empty());
    let html = fs::read_to_string(&out).unwrap();
    assert!(html.contains("<table"));
    assert!(html.contains("colspan=\"4\""));
}

#[test]
fn test_markdown_file_is_flattened() {
    let (dir, data) = data_dir();
    let out = dir.path().join("balance.md");
    let (_, _, success) = run_baltab(&[&data, "-g", "treat", "-o", out.to_str().unwrap()]);

    assert!(success);
    let md = fs::read_to_string(&out).unwrap();
    assert!(md.contains("0 (N=4) / Mean"));
}

#[test]
fn test_config_selects_backend() {
    let (dir, data) = data_dir();
    let config = write_file(dir.path(), "settings.toml", "latex = \"grid\"\n");
    let (stdout, _, success) = run_baltab(&[&data, "-g", "treat", "-o", "latex", "--config", &config]);

    assert!(success);
    assert!(stdout.contains("\\hline"));
    assert!(!stdout.contains("\\toprule"));
}

#[test]
fn test_add_rows_and_columns() {
    let (dir, data) = data_dir();
    let rows = write_file(dir.path(), "rows.csv", "Observations,4,,,,4,,,,,,\n");
    let cols = write_file(dir.path(), "cols.csv", "Source\nsurvey\n");
    let (stdout, stderr, success) = run_baltab(&[
        &data,
        "-g",
        "treat",
        "--add-rows",
        &rows,
        "--row-positions",
        "0",
        "--add-columns",
        &cols,
    ]);

    assert!(success, "stderr: {}", stderr);
    let lines: Vec<&str> = stdout.lines().collect();
    assert!(lines[0].contains("Source"));
    assert!(lines[2].starts_with("Observations"));
    assert!(lines[3].starts_with("age"));
    assert!(lines[3].contains("survey"));
}

#[test]
fn test_row_width_mismatch_fails() {
    let (dir, data) = data_dir();
    let rows = write_file(dir.path(), "rows.csv", "Observations,4\n");
    let (_, stderr, success) = run_baltab(&[&data, "-g", "treat", "--add-rows", &rows]);

    assert!(!success);
    assert!(stderr.contains("Error:"));
    assert!(stderr.contains("augmentation"));
}

#[test]
fn test_unknown_group_fails() {
    let (_dir, data) = data_dir();
    let (_, stderr, success) = run_baltab(&[&data, "-g", "arm"]);

    assert!(!success);
    assert!(stderr.contains("Error:"));
    assert!(stderr.contains("arm"));
}

#[test]
fn test_unknown_extension_fails_without_writing() {
    let (dir, data) = data_dir();
    let out = dir.path().join("balance.xyz");
    let (_, stderr, success) = run_baltab(&[&data, "-g", "treat", "-o", out.to_str().unwrap()]);

    assert!(!success);
    assert!(stderr.contains("unsupported output"));
    assert!(!out.exists());
}

#[test]
fn test_missing_data_file_fails() {
    let (_, stderr, success) = run_baltab(&["does-not-exist.csv", "-g", "treat"]);

    assert!(!success);
    assert!(stderr.contains("Error:"));
}
