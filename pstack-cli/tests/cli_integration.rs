use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::time::{SystemTime, UNIX_EPOCH};

struct TestDir {
    path: PathBuf,
}

impl TestDir {
    fn new(tag: &str) -> Self {
        let ts = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| d.as_nanos());
        let path =
            std::env::temp_dir().join(format!("pstack_cli_{tag}_{}_{}", std::process::id(), ts));
        fs::create_dir_all(&path).expect("create temp test dir");
        Self { path }
    }
}

impl Drop for TestDir {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.path);
    }
}

fn run_pstack(args: &[&str], cwd: &Path) -> Output {
    Command::new(env!("CARGO_BIN_EXE_pstack"))
        .args(args)
        .current_dir(cwd)
        .output()
        .expect("run pstack")
}

#[test]
fn eval_expression_prints_result() {
    let dir = TestDir::new("eval");
    let output = run_pstack(&["-e", "1 2 add ="], &dir.path);

    assert!(output.status.success(), "process failed: {output:?}");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains('3'), "expected 3 in stdout, got: {stdout}");
}

#[test]
fn failing_line_does_not_end_the_session() {
    let dir = TestDir::new("recover");
    let output = run_pstack(&["-e", "add\n1 2 add ="], &dir.path);

    assert!(output.status.success(), "process failed: {output:?}");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("stackunderflow"),
        "expected reason code in stderr, got: {stderr}"
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(
        stdout.contains('3'),
        "expected the next line to run, got: {stdout}"
    );
}

#[test]
fn scoping_flag_switches_discipline() {
    let program = "/x 1 def\n/p {x} def\n/x 2 def\np =";
    let dir = TestDir::new("scoping");

    let output = run_pstack(&["-e", program], &dir.path);
    assert!(output.status.success(), "process failed: {output:?}");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(
        stdout.contains('2'),
        "dynamic mode should see the live binding, got: {stdout}"
    );

    let output = run_pstack(&["-e", program, "--scoping", "lexical"], &dir.path);
    assert!(output.status.success(), "process failed: {output:?}");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(
        stdout.contains('1'),
        "lexical mode should see the captured binding, got: {stdout}"
    );
}

#[test]
fn file_input_runs() {
    let dir = TestDir::new("file");
    let source_file = dir.path.join("sample.ps");
    fs::write(&source_file, "3 4 mul =\n").expect("write sample file");

    let output = run_pstack(&["sample.ps"], &dir.path);
    assert!(output.status.success(), "process failed: {output:?}");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("12"), "expected 12 in stdout, got: {stdout}");
}

#[test]
fn multi_line_procedure_in_file() {
    let dir = TestDir::new("multiline");
    let source_file = dir.path.join("sq.ps");
    fs::write(&source_file, "/sq {\n  dup mul\n} def\n5 sq =\n").expect("write source");

    let output = run_pstack(&["sq.ps"], &dir.path);
    assert!(output.status.success(), "process failed: {output:?}");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("25"), "expected 25 in stdout, got: {stdout}");
}

#[test]
fn quit_stops_later_lines() {
    let dir = TestDir::new("quit");
    let output = run_pstack(&["-e", "1 =\nquit\n2 ="], &dir.path);

    assert!(output.status.success(), "process failed: {output:?}");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains('1'), "expected 1 in stdout, got: {stdout}");
    assert!(
        !stdout.contains('2'),
        "quit must stop the session, got: {stdout}"
    );
}

#[test]
fn missing_file_exits_nonzero() {
    let dir = TestDir::new("missing");
    let output = run_pstack(&["does_not_exist.ps"], &dir.path);
    assert!(!output.status.success(), "expected failure: {output:?}");
}
