//! CLI tests for the `postmerge` binary.

use std::fs;
use std::process::Command;

use assert_cmd::cargo;
use tempfile::TempDir;

const FACE: &str = "%\nO1001 (postmerge_tmp)\n(T1 D=50.)\nN10 G90 G21\nN15 T1 M6\nN20 G0 X0 Y0\nN25 M5\nN30 M30\n%\n";
const DRILL: &str = "%\nO1001 (postmerge_tmp)\n(T2 D=6.)\nN10 G90 G21\nN15 T2 M6\nN20 G0 X10 Y10\nN25 M5\nN30 M30\n%\n";

const JOB: &str = r#"
[[setups]]
name = "Fixtures : Bracket"

[[setups.operations]]
name = "Face1"
tool = 1

[[setups.operations]]
name = "Rough1"
tool = 1

[[setups.operations]]
name = "Drill1"
tool = 2
"#;

fn postmerge() -> Command {
    Command::new(cargo::cargo_bin!("postmerge"))
}

#[test]
fn merge_writes_one_program() {
    let dir = TempDir::new().unwrap();
    let face = dir.path().join("face.nc");
    let drill = dir.path().join("drill.nc");
    let target = dir.path().join("Bracket.nc");
    fs::write(&face, FACE).unwrap();
    fs::write(&drill, DRILL).unwrap();

    let output = postmerge()
        .arg("merge")
        .args(["--name", "Bracket", "-o"])
        .arg(&target)
        .arg(&face)
        .arg(&drill)
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let program = fs::read_to_string(&target).unwrap();
    assert!(program.starts_with("%\nO1001 (Bracket)\n"));
    assert!(program.contains("N20 G0 X0 Y0\nN25 T2 M6\nN30 G0 X10 Y10\n"));
    assert_eq!(program.matches("M30").count(), 1);

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Merged 2 fragments"));
}

#[test]
fn groups_lists_one_line_per_tool() {
    let dir = TempDir::new().unwrap();
    let job = dir.path().join("job.toml");
    fs::write(&job, JOB).unwrap();

    let output = postmerge().arg("groups").arg("--job").arg(&job).output().unwrap();
    assert!(output.status.success());
    assert_eq!(
        String::from_utf8_lossy(&output.stdout),
        "Fixtures : Bracket\n  1. T1: Face1, Rough1\n  2. T2: Drill1\n"
    );
}

#[test]
fn run_without_post_processor_fails() {
    let dir = TempDir::new().unwrap();
    let job = dir.path().join("job.toml");
    fs::write(&job, JOB).unwrap();

    let output = postmerge()
        .arg("run")
        .arg("--job")
        .arg(&job)
        .arg("--output")
        .arg(dir.path())
        .output()
        .unwrap();
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("post processor"));
}
