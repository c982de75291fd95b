use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

fn write_tree(root: &Path, jobfile: &str) {
    fs::write(
        root.join("index.js"),
        "keep\n//#p rm\ndrop\n//#p endrm\n",
    )
    .unwrap();
    fs::write(root.join("run.sh"), "echo ok\n##p rmn 0\n").unwrap();
    fs::write(root.join("tagstripJobs"), jobfile).unwrap();
}

#[test]
fn jobfile_batch_runs_every_listed_job() {
    let temp = tempdir().unwrap();
    write_tree(
        temp.path(),
        "# deploy all scripts\n\
         --in index.js --out-dir deploy\n\
         --in run.sh --out-dir deploy\n",
    );

    // relative jobfile paths resolve against the jobfile's directory
    cargo_bin_cmd!("tagstrip")
        .args(["--jobfile"])
        .arg(temp.path().join("tagstripJobs"))
        .assert()
        .success();

    assert_eq!(
        fs::read_to_string(temp.path().join("deploy/index.js")).unwrap(),
        "keep\n"
    );
    assert_eq!(
        fs::read_to_string(temp.path().join("deploy/run.sh")).unwrap(),
        "echo ok\n"
    );
}

#[test]
fn parse_errors_block_the_batch_unless_forced() {
    let temp = tempdir().unwrap();
    write_tree(
        temp.path(),
        "--in index.js --out-dir deploy\n--bogus-flag\n",
    );

    cargo_bin_cmd!("tagstrip")
        .args(["--jobfile"])
        .arg(temp.path().join("tagstripJobs"))
        .assert()
        .code(2)
        .stdout(predicate::str::contains("jobfile"));
    assert!(!temp.path().join("deploy").exists());

    // forced: the good line runs, the parse error still fails the run
    cargo_bin_cmd!("tagstrip")
        .args(["--jobfile"])
        .arg(temp.path().join("tagstripJobs"))
        .arg("--force-jobfile")
        .assert()
        .code(11);
    assert!(temp.path().join("deploy/index.js").exists());
}

#[test]
fn missing_jobfile_exits_with_the_jobfile_code() {
    let temp = tempdir().unwrap();

    cargo_bin_cmd!("tagstrip")
        .current_dir(temp.path())
        .args(["--jobfile", "no-such-file"])
        .assert()
        .code(2);
}

#[test]
fn include_cycle_fails_the_owning_job_only() {
    let temp = tempdir().unwrap();
    fs::write(temp.path().join("a.js"), "//#p include \"b.js\"\n").unwrap();
    fs::write(temp.path().join("b.js"), "//#p include \"a.js\"\n").unwrap();
    fs::write(temp.path().join("plain.js"), "fine\n").unwrap();
    fs::write(
        temp.path().join("tagstripJobs"),
        "--in a.js --out-dir deploy\n--in plain.js --out-dir deploy\n",
    )
    .unwrap();

    cargo_bin_cmd!("tagstrip")
        .args(["--jobfile"])
        .arg(temp.path().join("tagstripJobs"))
        .assert()
        .code(11)
        .stdout(predicate::str::contains("include loop detected"));

    // the cycle kills only its own job, the batch completes
    assert!(!temp.path().join("deploy/a.js").exists());
    assert_eq!(
        fs::read_to_string(temp.path().join("deploy/plain.js")).unwrap(),
        "fine\n"
    );
}
