//! CLI integration tests for nova.
//!
//! These tests drive the `nova` binary against scratch projects. They only
//! use copy, remove and shell command recipes, so no C toolchain is needed.

use std::fs;
use std::path::Path;
use std::process::Command;

use assert_cmd::prelude::*;
use predicates::prelude::*;
use tempfile::TempDir;

/// Get the nova binary command.
fn nova() -> Command {
    Command::cargo_bin("nova").unwrap()
}

/// Create a temporary directory for test projects.
fn temp_dir() -> TempDir {
    TempDir::new().unwrap()
}

fn write(path: &Path, contents: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

const COPY_PROJECT: &str = r#"
[namespace]
name = "app"

[[copy]]
from = "data/in.txt"
to = "build/out.txt"

[clean]
paths = ["build"]
"#;

fn copy_project(tmp: &TempDir) -> std::path::PathBuf {
    let root = tmp.path().join("app");
    write(&root.join("nova.toml"), COPY_PROJECT);
    write(&root.join("data/in.txt"), "hello\n");
    root
}

// ============================================================================
// nova build
// ============================================================================

#[test]
fn test_build_default_target_then_noop() {
    let tmp = temp_dir();
    let root = copy_project(&tmp);

    nova()
        .arg("build")
        .current_dir(&root)
        .assert()
        .success()
        .stderr(predicate::str::contains("Copying"))
        .stderr(predicate::str::contains("Finished"));
    assert_eq!(fs::read_to_string(root.join("build/out.txt")).unwrap(), "hello\n");

    nova()
        .arg("build")
        .current_dir(&root)
        .assert()
        .success()
        .stderr(predicate::str::contains("`app|@build` is up to date"))
        .stderr(predicate::str::contains("Copying").not());
}

#[test]
fn test_build_named_file_target_with_directory_flag() {
    let tmp = temp_dir();
    copy_project(&tmp);

    nova()
        .args(["-C", "app", "build", "build/out.txt"])
        .current_dir(tmp.path())
        .assert()
        .success();
    assert!(tmp.path().join("app/build/out.txt").is_file());
}

#[test]
fn test_build_fails_without_manifest() {
    let tmp = temp_dir();

    nova()
        .arg("build")
        .current_dir(tmp.path())
        .assert()
        .code(2)
        .stderr(predicate::str::contains("could not find a nova manifest"));
}

#[test]
fn test_missing_directory_flag_is_a_configuration_error() {
    let tmp = temp_dir();

    nova()
        .args(["-C", "does-not-exist", "build"])
        .current_dir(tmp.path())
        .assert()
        .code(2)
        .stderr(predicate::str::contains("failed to change directory"));
}

#[test]
fn test_unknown_target_is_a_configuration_error() {
    let tmp = temp_dir();
    let root = copy_project(&tmp);

    nova()
        .args(["build", "@nope"])
        .current_dir(&root)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("unknown target `@nope`"));
}

#[test]
fn test_manifest_syntax_error_is_rendered() {
    let tmp = temp_dir();
    write(
        &tmp.path().join("nova.toml"),
        "[namespace]\nname = \"app\"\n\n[[artifact]]\nkind = \"dll\"\n",
    );

    nova()
        .arg("build")
        .current_dir(tmp.path())
        .assert()
        .code(2)
        .stderr(predicate::str::contains("invalid manifest"));
}

#[test]
fn test_cyclic_imports_are_rejected() {
    let tmp = temp_dir();
    write(
        &tmp.path().join("a/nova.toml"),
        "[namespace]\nname = \"a\"\nimports = [\"../b\"]\n",
    );
    write(
        &tmp.path().join("b/nova.toml"),
        "[namespace]\nname = \"b\"\nimports = [\"../a\"]\n",
    );

    nova()
        .args(["-C", "a", "build"])
        .current_dir(tmp.path())
        .assert()
        .code(2)
        .stderr(predicate::str::contains("cyclic import: a -> b -> a"));
}

#[test]
fn test_missing_prerequisite_fails_the_build() {
    let tmp = temp_dir();
    let root = copy_project(&tmp);
    fs::remove_file(root.join("data/in.txt")).unwrap();

    nova()
        .arg("build")
        .current_dir(&root)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("does not exist and no recipe produces it"));
}

#[cfg(unix)]
#[test]
fn test_failing_command_reports_exit_code() {
    let tmp = temp_dir();
    write(
        &tmp.path().join("nova.toml"),
        r#"
[namespace]
name = "app"
default = "@fail"

[[command]]
target = "@fail"
argv = ["sh", "-c", "echo boom >&2; exit 3"]
"#,
    );

    nova()
        .arg("build")
        .current_dir(tmp.path())
        .assert()
        .code(1)
        .stderr(predicate::str::contains("exit code 3"))
        .stderr(predicate::str::contains("boom"))
        .stderr(predicate::str::contains("could not build `app|@fail`"));
}

#[cfg(unix)]
#[test]
fn test_command_sees_defines_and_runs_every_time() {
    let tmp = temp_dir();
    write(
        &tmp.path().join("nova.toml"),
        r#"
[namespace]
name = "app"
default = "@run"

[[command]]
target = "@run"
argv = ["sh", "-c", "echo \"greeting=$GREETING\" >> log.txt"]
"#,
    );

    for _ in 0..2 {
        nova()
            .args(["-D", "GREETING=hi", "build"])
            .current_dir(tmp.path())
            .assert()
            .success();
    }
    assert_eq!(
        fs::read_to_string(tmp.path().join("log.txt")).unwrap(),
        "greeting=hi\ngreeting=hi\n"
    );
}

#[test]
fn test_json_message_format() {
    let tmp = temp_dir();
    let root = copy_project(&tmp);

    let output = nova()
        .args(["build", "--message-format", "json"])
        .current_dir(&root)
        .output()
        .unwrap();
    assert!(output.status.success());

    let reasons: Vec<String> = String::from_utf8(output.stdout)
        .unwrap()
        .lines()
        .map(|line| {
            let value: serde_json::Value = serde_json::from_str(line).unwrap();
            value["reason"].as_str().unwrap().to_string()
        })
        .collect();
    assert_eq!(
        reasons,
        [
            "build-started",
            "target-started",
            "target-finished",
            "build-finished"
        ]
    );
}

// ============================================================================
// nova clean
// ============================================================================

#[test]
fn test_clean_composes_across_namespaces() {
    let tmp = temp_dir();
    write(
        &tmp.path().join("lib/nova.toml"),
        r#"
[namespace]
name = "lib"

[[copy]]
from = "in.txt"
to = "build/lib.txt"

[clean]
paths = ["build"]
"#,
    );
    write(&tmp.path().join("lib/in.txt"), "lib\n");
    write(
        &tmp.path().join("app/nova.toml"),
        r#"
[namespace]
name = "app"
imports = ["../lib"]

[[copy]]
from = "in.txt"
to = "build/app.txt"

[[alias]]
target = "@all"
deps = ["@build", "lib|@build"]

[clean]
paths = ["build"]
deps = ["lib|@clean"]
"#,
    );
    write(&tmp.path().join("app/in.txt"), "app\n");
    let app = tmp.path().join("app");

    nova().args(["build", "@all"]).current_dir(&app).assert().success();
    assert!(tmp.path().join("lib/build/lib.txt").is_file());
    assert!(app.join("build/app.txt").is_file());

    nova().arg("clean").current_dir(&app).assert().success();
    assert!(!tmp.path().join("lib/build").exists());
    assert!(!app.join("build").exists());
}

// ============================================================================
// nova targets / nova flags
// ============================================================================

#[test]
fn test_targets_lists_namespaces() {
    let tmp = temp_dir();
    let root = copy_project(&tmp);

    nova()
        .arg("targets")
        .current_dir(&root)
        .assert()
        .success()
        .stdout(predicate::str::contains("app ("))
        .stdout(predicate::str::contains("default: app|@build"))
        .stdout(predicate::str::contains("build/out.txt [copy]"))
        .stdout(predicate::str::contains("app|@clean [remove]"));
}

#[test]
fn test_targets_unknown_namespace() {
    let tmp = temp_dir();
    let root = copy_project(&tmp);

    nova()
        .args(["targets", "nope"])
        .current_dir(&root)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("unknown namespace `nope`"));
}

#[test]
fn test_flags_layer_environment_manifest_and_profile() {
    let tmp = temp_dir();
    write(
        &tmp.path().join("nova.toml"),
        r#"
[namespace]
name = "lib"

[flags]
CFLAGS = ["-Wall"]

[profile.release.flags]
CFLAGS = ["-O2"]

[profile.debug.flags]
CFLAGS = ["-g"]
"#,
    );

    nova()
        .args(["flags", "lib", "--release"])
        .env("CFLAGS", "-pipe -Wall")
        .current_dir(tmp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("CFLAGS: -pipe -Wall -O2"));

    nova()
        .args(["-D", "DEBUG=1", "flags", "lib"])
        .env_remove("CFLAGS")
        .current_dir(tmp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("CFLAGS: -Wall -g"));
}
