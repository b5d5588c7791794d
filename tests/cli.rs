//! Binary-level tests: argument handling, exit codes and error tags. The
//! end-to-end section actually assembles, links and runs programs, and is
//! skipped on hosts without a native x86-64 toolchain.

use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::io::Write;
use std::process::{Command, Stdio};

fn lcc() -> Command {
    Command::cargo_bin("lcc").unwrap()
}

fn write_source(dir: &tempfile::TempDir, name: &str, source: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, source).unwrap();
    path
}

#[test]
fn no_input_file_fails() {
    lcc().assert().failure();
}

#[test]
fn version_flag_works() {
    lcc()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn missing_file_reports_io_error() {
    lcc()
        .arg("does-not-exist.lc")
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("could not read"));
}

#[test]
fn unknown_target_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_source(&dir, "ok.lc", "run { };");
    lcc()
        .arg("--target")
        .arg("riscv64")
        .arg(path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown target"));
}

#[test]
fn parse_error_is_tagged_with_position() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_source(&dir, "bad.lc", "run { num x = ; };");
    lcc()
        .arg(path)
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("parse error"))
        .stderr(predicate::str::contains("bad.lc:1:"));
}

#[test]
fn missing_run_block_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_source(&dir, "norun.lc", "fnc f[]:num { return 1; }");
    lcc()
        .arg(path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Missing run block"));
}

#[test]
fn semantic_error_is_tagged() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_source(&dir, "sem.lc", "run { val num X = 1; X = 2; };");
    lcc()
        .arg(path)
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("semantic error"))
        .stderr(predicate::str::contains("Cannot reassign constant X"));
}

#[test]
fn verbose_prints_phase_progress() {
    let dir = tempfile::tempdir().unwrap();
    // fails at the parser, after the lex and parse phases have announced
    // themselves on stdout
    let path = write_source(&dir, "late.lc", "run { num x = ; };");
    lcc()
        .arg("-v")
        .arg(path)
        .assert()
        .failure()
        .stdout(predicate::str::contains("lexing"))
        .stdout(predicate::str::contains("parsing"))
        .stderr(predicate::str::contains("parse error"));
}

#[test]
fn wrong_extension_warns_but_continues() {
    let dir = tempfile::tempdir().unwrap();
    // the parse error proves the pipeline kept going after the warning
    let path = write_source(&dir, "prog.txt", "run {");
    lcc()
        .arg(path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("should end in .lc"))
        .stderr(predicate::str::contains("parse error"));
}

// end-to-end: compile, link and run on a native x86-64 Linux host

fn have_native_toolchain() -> bool {
    cfg!(all(target_os = "linux", target_arch = "x86_64"))
        && Command::new("as").arg("--version").output().is_ok()
        && Command::new("ld").arg("--version").output().is_ok()
}

/// Compile `source`, run the produced executable with `stdin`, return its
/// stdout.
fn run_program(source: &str, stdin: &str) -> String {
    let dir = tempfile::tempdir().unwrap();
    let src = write_source(&dir, "prog.lc", source);
    let exe = dir.path().join("prog");
    lcc()
        .arg("-o")
        .arg(&exe)
        .arg("--target")
        .arg("x86_64")
        .arg(&src)
        .assert()
        .success();
    // intermediates are cleaned up by default
    assert!(!dir.path().join("prog.s").exists());
    assert!(!dir.path().join("prog.o").exists());

    let mut child = Command::new(&exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .spawn()
        .unwrap();
    child
        .stdin
        .as_mut()
        .unwrap()
        .write_all(stdin.as_bytes())
        .unwrap();
    let output = child.wait_with_output().unwrap();
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn runs_hello() {
    if !have_native_toolchain() {
        return;
    }
    assert_eq!(run_program(r#"run { @print["Hello"]; };"#, ""), "Hello\n");
}

#[test]
fn runs_folded_constant() {
    if !have_native_toolchain() {
        return;
    }
    assert_eq!(
        run_program("run { val num X = 2 + 3 * 4; @print[X]; };", ""),
        "14\n"
    );
}

#[test]
fn runs_function_call() {
    if !have_native_toolchain() {
        return;
    }
    assert_eq!(
        run_program(
            "fnc add[num a, num b]:num { return a + b; } run { num r = @add[5, 3]; @print[r]; };",
            ""
        ),
        "8\n"
    );
}

#[test]
fn runs_repeat_dispatch() {
    if !have_native_toolchain() {
        return;
    }
    let source = r#"run { num d = 3; repeat [d] { when [1] { @print["one"]; } when [3] { @print["three"]; } fixed { @print["other"]; } } };"#;
    assert_eq!(run_program(source, ""), "three\n");
}

#[test]
fn runs_stdin_number_roundtrip() {
    if !have_native_toolchain() {
        return;
    }
    assert_eq!(
        run_program(r#"run { num n = @num.read[""]; @print[n]; };"#, "42\n"),
        "42\n"
    );
}

#[test]
fn runs_concatenation() {
    if !have_native_toolchain() {
        return;
    }
    assert_eq!(
        run_program(
            r#"run { text a = "foo"; text b = "bar"; @print[a +>> b]; };"#,
            ""
        ),
        "foobar\n"
    );
}

#[test]
fn runs_interpolation_and_loops() {
    if !have_native_toolchain() {
        return;
    }
    let source = r#"run { for [num i = 1; i < 4; i = i + 1] { @print["i = $i"]; } };"#;
    assert_eq!(run_program(source, ""), "i = 1\ni = 2\ni = 3\n");
}

#[test]
fn keep_asm_flag_retains_the_assembly() {
    if !have_native_toolchain() {
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let src = write_source(&dir, "prog.lc", r#"run { @print["x"]; };"#);
    let exe = dir.path().join("prog");
    lcc()
        .arg("-S")
        .arg("-o")
        .arg(&exe)
        .arg("--target")
        .arg("x86_64")
        .arg(&src)
        .assert()
        .success();
    assert!(dir.path().join("prog.s").exists());
    assert!(!dir.path().join("prog.o").exists());
}
