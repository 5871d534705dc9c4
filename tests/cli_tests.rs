mod common;

use common::TestFile;
use std::process::{Command, Output};

fn scc(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_scc"))
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("failed to run scc")
}

const PROGRAM: &str = "int x;\nint main(void)\n{\n    x = 42;\n    return x;\n}\n";

#[test]
fn test_writes_assembly_to_stdout() -> std::io::Result<()> {
    let file = TestFile::new("main.c", PROGRAM)?;
    let output = scc(&[file.path.to_str().unwrap()]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("main:\n"));
    assert!(stdout.contains("\t.comm\tx,4\n"));
    Ok(())
}

#[test]
fn test_writes_assembly_to_file() -> std::io::Result<()> {
    let file = TestFile::new("main.c", PROGRAM)?;
    let target = file.dir().join("main.s");
    let output = scc(&[
        "--global-prefix",
        "_",
        "-o",
        target.to_str().unwrap(),
        file.path.to_str().unwrap(),
    ]);

    assert!(output.status.success());
    assert!(output.stdout.is_empty());
    let assembly = std::fs::read_to_string(&target)?;
    assert!(assembly.contains("_main:\n"));
    assert!(assembly.contains("\t.comm\t_x,4\n"));
    Ok(())
}

#[test]
fn test_diagnostics_are_not_fatal_by_default() -> std::io::Result<()> {
    let file = TestFile::new("bad.c", "int main(void)\n{\n    break;\n    return 0;\n}\n")?;
    let output = scc(&[file.path.to_str().unwrap()]);

    assert!(output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("break statement not within loop"));
    assert!(stderr.contains("    break;"));

    let output = scc(&["--deny-diagnostics", file.path.to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(1));
    Ok(())
}

#[test]
fn test_json_messages() -> std::io::Result<()> {
    let file = TestFile::new("bad.c", "int main(void) { return y; }\n")?;
    let output = scc(&["--check", "--message-format", "json", file.path.to_str().unwrap()]);

    assert!(output.status.success());
    assert!(output.stdout.is_empty());
    let stderr = String::from_utf8_lossy(&output.stderr);
    let line = stderr.lines().find(|line| line.starts_with('{')).unwrap();
    let value: serde_json::Value = serde_json::from_str(line)?;
    assert_eq!(value["message"], "'y' undeclared");
    assert_eq!(value["location"]["line"], 1);
    Ok(())
}

#[test]
fn test_fatal_errors_exit_with_failure() -> std::io::Result<()> {
    let file = TestFile::new("broken.c", "int main(void) { return 0 }\n")?;
    let output = scc(&[file.path.to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("syntax error"));

    let missing = file.dir().join("missing.c");
    let output = scc(&[missing.to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(1));
    Ok(())
}
