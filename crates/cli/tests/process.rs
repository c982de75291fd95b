use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use tempfile::tempdir;

#[test]
fn strips_a_remove_block_end_to_end() {
    let temp = tempdir().unwrap();
    fs::write(
        temp.path().join("in.js"),
        "A\n//#p rm\ndebug();\n//#p endrm\nB\n",
    )
    .unwrap();

    cargo_bin_cmd!("tagstrip")
        .current_dir(temp.path())
        .args(["--in", "in.js", "--out", "out.js"])
        .assert()
        .success();

    assert_eq!(
        fs::read_to_string(temp.path().join("out.js")).unwrap(),
        "A\nB\n"
    );
}

#[test]
fn ins_directive_survives_with_a_custom_tag() {
    let temp = tempdir().unwrap();
    fs::write(temp.path().join("page.html"), "<div>\n<!--#x ins </div>\n").unwrap();

    cargo_bin_cmd!("tagstrip")
        .current_dir(temp.path())
        .args([
            "--in",
            "page.html",
            "--out",
            "out.html",
            "--tag",
            "custom:<!--#x",
        ])
        .assert()
        .success();

    assert_eq!(
        fs::read_to_string(temp.path().join("out.html")).unwrap(),
        "<div>\n</div>\n"
    );
}

#[test]
fn failing_job_reports_and_exits_with_the_error_offset() {
    let temp = tempdir().unwrap();
    fs::write(temp.path().join("in.js"), "//#p frobnicate\n").unwrap();

    cargo_bin_cmd!("tagstrip")
        .current_dir(temp.path())
        .args(["--in", "in.js", "--out", "out.js"])
        .assert()
        .code(11)
        .stdout(predicate::str::contains("unknown key word"));

    assert!(!temp.path().join("out.js").exists());
}

#[test]
fn werror_fails_a_run_with_warnings() {
    let temp = tempdir().unwrap();
    fs::write(temp.path().join("in.js"), "//#p rmn 9\nA\n").unwrap();

    cargo_bin_cmd!("tagstrip")
        .current_dir(temp.path())
        .args(["--in", "in.js", "--out", "out.js"])
        .assert()
        .success();

    cargo_bin_cmd!("tagstrip")
        .current_dir(temp.path())
        .args(["--in", "in.js", "--out", "out.js", "--werror"])
        .assert()
        .code(11)
        .stdout(predicate::str::contains("[Werror]"));
}

#[test]
fn wsup_silences_listed_warning_ids() {
    let temp = tempdir().unwrap();
    fs::write(temp.path().join("in.js"), "//#p rmn 9\nA\n").unwrap();

    cargo_bin_cmd!("tagstrip")
        .current_dir(temp.path())
        .args(["--in", "in.js", "--out", "out.js", "--werror", "--wsup", "4"])
        .assert()
        .success()
        .stdout(predicate::str::contains("overlapped").not());
}

#[test]
fn json_report_carries_the_diagnostics() {
    let temp = tempdir().unwrap();
    fs::write(temp.path().join("in.js"), "//#p rmn 9\nA\n").unwrap();

    let output = cargo_bin_cmd!("tagstrip")
        .current_dir(temp.path())
        .args(["--in", "in.js", "--out", "out.js", "--json"])
        .output()
        .expect("run tagstrip");

    assert!(output.status.success());
    let report: Value = serde_json::from_slice(&output.stdout).expect("valid json");
    assert_eq!(report["ok"], true);
    assert_eq!(report["warnings"], 1);
    assert_eq!(report["diagnostics"][0]["severity"], "warning");
    assert_eq!(report["diagnostics"][0]["warning_id"], 4);
}

#[test]
fn copy_overwrite_skips_processing() {
    let temp = tempdir().unwrap();
    let data = "//#p rm\nstays\n//#p endrm\n";
    fs::write(temp.path().join("in.js"), data).unwrap();
    fs::write(temp.path().join("out.js"), "old").unwrap();

    cargo_bin_cmd!("tagstrip")
        .current_dir(temp.path())
        .args(["--in", "in.js", "--out", "out.js", "--copy-overwrite"])
        .assert()
        .success();

    assert_eq!(fs::read_to_string(temp.path().join("out.js")).unwrap(), data);
}

#[test]
fn missing_output_argument_is_invalid_usage() {
    cargo_bin_cmd!("tagstrip")
        .args(["--in", "a.js"])
        .assert()
        .code(1);
}
