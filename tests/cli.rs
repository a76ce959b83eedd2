use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const OUTPUT: &str = "uservice_nbreport/publish/templates/report-html/app.css";

fn cmd(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("nbreport-assets").unwrap();
    cmd.current_dir(dir).env_remove("RUST_LOG");
    cmd
}

fn project(scss: &str) -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir_all(dir.path().join("scss")).unwrap();
    fs::write(dir.path().join("scss/app.scss"), scss).unwrap();
    dir
}

#[test]
fn environment_defaults_to_dev() {
    let dir = tempfile::tempdir().unwrap();

    cmd(dir.path())
        .arg("environment")
        .assert()
        .success()
        .stdout("dev\n");
}

#[test]
fn environment_explicit_prod() {
    let dir = tempfile::tempdir().unwrap();

    cmd(dir.path())
        .args(["--env", "prod", "environment"])
        .assert()
        .success()
        .stdout("prod\n");
}

#[test]
fn unknown_env_is_config_error() {
    let dir = project("body { color: red; }");

    cmd(dir.path())
        .args(["--env", "stage", "sass"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("ConfigError"));

    assert!(!dir.path().join(OUTPUT).exists());
}

#[test]
fn unknown_task_is_config_error() {
    let dir = tempfile::tempdir().unwrap();

    cmd(dir.path())
        .arg("deploy")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("ConfigError").and(predicate::str::contains("deploy")));
}

#[test]
fn missing_explicit_config_is_config_error() {
    let dir = tempfile::tempdir().unwrap();

    cmd(dir.path())
        .args(["--config", "nope.toml", "environment"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("ConfigError"));
}

#[test]
fn prod_build_is_minified_without_sourcemap() {
    let dir = project("$c: red; body { color: $c; }");

    cmd(dir.path())
        .args(["--env", "prod", "sass"])
        .assert()
        .success();

    let css = fs::read_to_string(dir.path().join(OUTPUT)).unwrap();
    assert!(css.contains("body{color:red}"), "got {css:?}");
    assert!(!css.contains("sourceMappingURL"));
}

#[test]
fn dev_build_embeds_sourcemap() {
    let dir = project("$c: red; body { color: $c; }");

    cmd(dir.path()).arg("sass").assert().success();

    let css = fs::read_to_string(dir.path().join(OUTPUT)).unwrap();
    assert!(css.contains("color: red"));
    assert!(css.contains("sourceMappingURL=data:application/json"));
}

#[test]
fn scss_error_is_build_error() {
    let dir = project("body { color: ");

    cmd(dir.path())
        .args(["--env", "prod", "sass"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("task sass").and(predicate::str::contains("BuildError")));
}

#[test]
fn config_file_moves_output() {
    let dir = project("a { b: c; }");
    fs::write(
        dir.path().join("assets.toml"),
        "[paths]\noutput_dir = \"dist\"\noutput = \"theme.css\"\n",
    )
    .unwrap();

    cmd(dir.path())
        .args(["--env", "prod", "sass"])
        .assert()
        .success();

    assert!(dir.path().join("dist/theme.css").is_file());
    assert!(!dir.path().join(OUTPUT).exists());
}

#[test]
fn lists_tasks() {
    let dir = tempfile::tempdir().unwrap();

    cmd(dir.path())
        .arg("--tasks")
        .assert()
        .success()
        .stdout(
            predicate::str::contains("basic [sass]")
                .and(predicate::str::contains("serve [sass, basic]"))
                .and(predicate::str::contains("default [sass, watch]")),
        );
}

#[cfg(unix)]
mod interrupt {
    use std::process::{Command as StdCommand, Stdio};
    use std::thread::sleep;
    use std::time::{Duration, Instant};

    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    use super::*;

    #[test]
    fn default_task_watches_until_interrupted() {
        let dir = project("body { color: red; }");
        let output = dir.path().join(OUTPUT);

        let mut child = StdCommand::new(assert_cmd::cargo::cargo_bin("nbreport-assets"))
            .current_dir(dir.path())
            .env_remove("RUST_LOG")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .unwrap();

        let start = Instant::now();
        while !output.is_file() && start.elapsed() < Duration::from_secs(10) {
            sleep(Duration::from_millis(50));
        }
        assert!(output.is_file(), "initial build never wrote {OUTPUT}");

        // Still running: the watcher holds the process open
        sleep(Duration::from_millis(500));
        assert!(child.try_wait().unwrap().is_none());

        kill(Pid::from_raw(child.id() as i32), Signal::SIGINT).unwrap();

        let start = Instant::now();
        let status = loop {
            if let Some(status) = child.try_wait().unwrap() {
                break status;
            }
            if start.elapsed() > Duration::from_secs(10) {
                let _ = child.kill();
                panic!("driver did not stop after SIGINT");
            }
            sleep(Duration::from_millis(50));
        };

        assert!(status.success(), "exited with {status:?}");
    }
}

#[cfg(unix)]
mod report_generator {
    use std::os::unix::fs::PermissionsExt;

    use super::*;

    /// Put a fake `lsst-report-html` first on PATH that logs each call
    fn stub(dir: &Path, status: i32) -> String {
        let bin = dir.join("bin");
        fs::create_dir_all(&bin).unwrap();

        let script = bin.join("lsst-report-html");
        fs::write(
            &script,
            format!(
                "#!/bin/sh\ntest -f \"{}\" || exit 99\necho ran >> \"{}\"\nexit {}\n",
                dir.join(OUTPUT).display(),
                dir.join("calls.log").display(),
                status
            ),
        )
        .unwrap();
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();

        let path = std::env::var("PATH").unwrap_or_default();
        format!("{}:{}", bin.display(), path)
    }

    #[test]
    fn basic_runs_generator_once_after_sass() {
        let dir = project("body { color: red; }");
        let path = stub(dir.path(), 0);

        cmd(dir.path()).env("PATH", path).arg("basic").assert().success();

        let calls = fs::read_to_string(dir.path().join("calls.log")).unwrap();
        pretty_assertions::assert_eq!(calls, "ran\n");
    }

    #[test]
    fn failing_generator_fails_basic() {
        let dir = project("body { color: red; }");
        let path = stub(dir.path(), 7);

        cmd(dir.path())
            .env("PATH", path)
            .arg("basic")
            .assert()
            .code(1)
            .stderr(
                predicate::str::contains("task basic")
                    .and(predicate::str::contains("SubprocessError")),
            );

        assert!(dir.path().join("calls.log").is_file());
    }
}
