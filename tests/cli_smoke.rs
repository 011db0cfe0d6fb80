use assert_cmd::prelude::*;
use predicates::str::contains;
use std::fs;
use std::process::Command;

fn isolated_cmd(temp: &tempfile::TempDir) -> Command {
    let mut cmd = Command::cargo_bin("gpt-review").unwrap();
    cmd.current_dir(temp.path());
    cmd.env("XDG_CONFIG_HOME", temp.path().join("xdg-config"));
    for var in [
        "OPENAI_API_KEY",
        "OPENAI_MODEL",
        "OPENAI_API_BASE",
        "DIFF_FILE",
        "PR_LABELS_JSON",
        "TPM_LIMIT",
        "MAX_CHUNK_INPUT_TOKENS",
        "CHUNK_OVERHEAD_TOKENS",
        "TOKENS_PER_CALL_ESTIMATE",
        "MAX_SCRIPT_DURATION_SECONDS",
    ] {
        cmd.env_remove(var);
    }
    cmd
}

#[test]
fn prints_help() {
    let mut cmd = Command::cargo_bin("gpt-review").unwrap();
    cmd.arg("--help");
    cmd.assert().success().stdout(contains("Chunked GPT review"));
}

#[test]
fn announces_review_mode() {
    let temp = tempfile::tempdir().unwrap();
    let diff_path = temp.path().join("changes.diff");
    fs::write(&diff_path, "+a\n-b\n").unwrap();

    let mut cmd = isolated_cmd(&temp);
    cmd.args([
        "--provider",
        "mock",
        "--diff-file",
        diff_path.to_str().unwrap(),
        "--labels-json",
        r#"[{"name":"gpt-review-light"}]"#,
    ]);
    cmd.assert().success().stdout(contains("Determined review mode: light"));
}

#[test]
fn diff_file_from_environment_is_honored() {
    let temp = tempfile::tempdir().unwrap();
    let diff_path = temp.path().join("changes.diff");
    fs::write(&diff_path, "+a\n-b\n").unwrap();

    let mut cmd = isolated_cmd(&temp);
    cmd.env("DIFF_FILE", diff_path.to_str().unwrap());
    cmd.args(["--provider", "mock"]);
    cmd.assert().success();
    assert!(temp.path().join("review.txt").exists());
}
