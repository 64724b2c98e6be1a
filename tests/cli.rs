use std::fs;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::str::contains;
use tempfile::TempDir;

#[test]
fn help_lists_verbs() {
    let mut cmd = cargo_bin_cmd!("ojet");
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(contains("build"))
        .stdout(contains("serve"))
        .stdout(contains("publish"))
        .stdout(contains("strip"));
}

#[test]
fn add_help_lists_scopes() {
    let mut cmd = cargo_bin_cmd!("ojet");
    cmd.args(["add", "--help"])
        .assert()
        .success()
        .stdout(contains("component"))
        .stdout(contains("pack"))
        .stdout(contains("sass"));
}

#[test]
fn unknown_scope_is_rejected() {
    let mut cmd = cargo_bin_cmd!("ojet");
    cmd.args(["remove", "theme", "x"]).assert().failure();
}

#[test]
fn configure_writes_exchange_url() {
    let app = TempDir::new().unwrap();
    let mut cmd = cargo_bin_cmd!("ojet");
    cmd.args(["configure", "--exchange-url", "https://exchange.example.com/api/"])
        .arg("--project-dir")
        .arg(app.path())
        .assert()
        .success()
        .stdout(contains("Exchange url set: 'https://exchange.example.com/api/'"));
    let written = fs::read_to_string(app.path().join("oraclejetconfig.json")).unwrap();
    assert!(written.contains("exchange.example.com"));
}

#[test]
fn exchange_verbs_require_a_configured_url() {
    let app = TempDir::new().unwrap();
    fs::write(app.path().join("oraclejetconfig.json"), "{}").unwrap();
    let mut cmd = cargo_bin_cmd!("ojet");
    cmd.args(["add", "component", "oj-demo-card"])
        .arg("--project-dir")
        .arg(app.path())
        .assert()
        .failure()
        .stderr(contains("Exchange url is not configured"));
}

#[test]
fn list_on_empty_app_reports_nothing_found() {
    let app = TempDir::new().unwrap();
    let mut cmd = cargo_bin_cmd!("ojet");
    cmd.args(["list", "component"])
        .arg("--project-dir")
        .arg(app.path())
        .assert()
        .success()
        .stdout(contains("No components found."));
}

#[test]
fn create_pack_then_list_it() {
    let app = TempDir::new().unwrap();
    let mut cmd = cargo_bin_cmd!("ojet");
    cmd.args(["create", "pack", "demo-pack"])
        .arg("--project-dir")
        .arg(app.path())
        .assert()
        .success();
    let manifest = app
        .path()
        .join("src/js/jet-composites/demo-pack/component.json");
    let written = fs::read_to_string(manifest).unwrap();
    assert!(written.contains("\"type\": \"pack\""));

    let mut again = cargo_bin_cmd!("ojet");
    again
        .args(["create", "pack", "demo-pack"])
        .arg("--project-dir")
        .arg(app.path())
        .assert()
        .failure();
}

#[test]
fn config_set_writes_requested_file() {
    let temp = TempDir::new().unwrap();
    let file = temp.path().join("nested/config.toml");
    let mut cmd = cargo_bin_cmd!("ojet");
    cmd.args(["config", "set", "tools.cordova.path", "/opt/cordova/bin/cordova", "--file"])
        .arg(&file)
        .assert()
        .success();
    let written = fs::read_to_string(file).unwrap();
    assert!(written.contains("[tools.cordova]"));
    assert!(written.contains("/opt/cordova/bin/cordova"));
}

#[test]
fn strip_removes_ignored_files() {
    let app = TempDir::new().unwrap();
    fs::write(app.path().join(".gitignore"), "/web\n").unwrap();
    fs::create_dir_all(app.path().join("web/js")).unwrap();
    fs::write(app.path().join("web/js/main.js"), "").unwrap();
    fs::create_dir_all(app.path().join("src")).unwrap();
    fs::write(app.path().join("src/index.html"), "").unwrap();
    let mut cmd = cargo_bin_cmd!("ojet");
    cmd.arg("strip")
        .arg("--project-dir")
        .arg(app.path())
        .assert()
        .success();
    assert!(!app.path().join("web").exists());
    assert!(app.path().join("src/index.html").exists());
}
