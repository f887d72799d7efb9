mod common;

use assert_cmd::Command;
use predicates::prelude::*;

fn packager() -> Command {
    Command::cargo_bin("kodegen_bundler_package").unwrap()
}

#[test]
fn test_help() {
    packager()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--main-jar"))
        .stdout(predicate::str::contains("--params-file"));
}

#[test]
fn test_malformed_param_exits_with_failure() {
    packager()
        .args(["--param", "app-name"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("NAME=VALUE"));
}

#[test]
fn test_unknown_param_is_fatal() {
    packager()
        .args(["--quiet", "--param", "no-such-parameter=1"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("no-such-parameter"));
}

#[test]
fn test_app_image_json_report() {
    let ws = common::Workspace::new();

    packager()
        .args(["--type", "app-image", "--json", "--main-jar", "hello.jar"])
        .arg("--input")
        .arg(&ws.input)
        .arg("--dest")
        .arg(&ws.dest)
        .arg("--build-root")
        .arg(&ws.build_root)
        .env("RUST_LOG", "off")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"package_type\": \"app-image\""))
        .stdout(predicate::str::contains("\"state\": \"cleaned-up\""));

    let entries = std::fs::read_dir(&ws.dest).unwrap().count();
    assert_eq!(entries, 1);
}
