use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use std::process::Command;
use tempfile::TempDir;

fn write_render_inputs(dir: &Path, template: &str, manifest: &str) {
    fs::write(dir.join("Dockerfile.template"), template).unwrap();
    fs::write(dir.join("manifest.json"), manifest).unwrap();
}

fn render_cmd(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("dockplate").unwrap();
    cmd.arg("render")
        .arg("--template")
        .arg(dir.join("Dockerfile.template"))
        .arg("--manifest")
        .arg(dir.join("manifest.json"))
        .env("HOME", dir);
    cmd
}

fn create_project(root: &Path) {
    fs::write(root.join("gogogo.py"), "print('serve')").unwrap();
    fs::write(root.join("requirements.txt"), "gradio\n").unwrap();
    fs::write(
        root.join("mc.json"),
        r#"{"model_info": {"name": "flood-model"}}"#,
    )
    .unwrap();
    fs::create_dir(root.join("model")).unwrap();
    fs::write(root.join("model").join("weights.bin"), "x").unwrap();
}

#[test]
fn test_help_command() {
    let mut cmd = Command::cargo_bin("dockplate").unwrap();
    cmd.arg("--help");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Usage: dockplate"))
        .stdout(predicate::str::contains("Commands:"))
        .stdout(predicate::str::contains("render"))
        .stdout(predicate::str::contains("generate"))
        .stdout(predicate::str::contains("check"))
        .stdout(predicate::str::contains("config"));
}

#[test]
fn test_version_command() {
    let mut cmd = Command::cargo_bin("dockplate").unwrap();
    cmd.arg("--version");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("dockplate"));
}

#[test]
fn test_render_conditional_present() {
    let temp_dir = TempDir::new().unwrap();
    write_render_inputs(
        temp_dir.path(),
        "COPY base {examples}",
        r#"{"placeholders": {"examples": {"when": true, "present": "examples/ ./examples/", "absent": ""}}}"#,
    );

    render_cmd(temp_dir.path())
        .assert()
        .success()
        .stdout("COPY base examples/ ./examples/");
}

#[test]
fn test_render_conditional_absent() {
    let temp_dir = TempDir::new().unwrap();
    write_render_inputs(
        temp_dir.path(),
        "COPY base {examples}",
        r#"{"placeholders": {"examples": {"when": false, "present": "examples/ ./examples/", "absent": ""}}}"#,
    );

    render_cmd(temp_dir.path())
        .assert()
        .success()
        .stdout("COPY base ");
}

#[test]
fn test_render_to_file_and_report() {
    let temp_dir = TempDir::new().unwrap();
    write_render_inputs(
        temp_dir.path(),
        "FROM {base_image}\n{examples_copy}\nCMD [\"python\", \"gogogo.py\"]\n",
        r#"{
            "schema_version": 1,
            "placeholders": {
                "base_image": "python:3.10-slim",
                "examples_copy": {"when": true, "present": "COPY examples/ ./examples/"}
            }
        }"#,
    );
    let out = temp_dir.path().join("Dockerfile");
    let report = temp_dir.path().join("report.json");

    render_cmd(temp_dir.path())
        .arg("--out")
        .arg(&out)
        .arg("--report")
        .arg(&report)
        .assert()
        .success()
        .stdout("");

    assert_eq!(
        fs::read_to_string(&out).unwrap(),
        "FROM python:3.10-slim\nCOPY examples/ ./examples/\nCMD [\"python\", \"gogogo.py\"]\n"
    );
    let report = fs::read_to_string(report).unwrap();
    assert!(report.contains("\"included\""));
    assert!(report.contains("examples_copy"));
    assert!(!report.contains("CMD"));
}

#[test]
fn test_render_is_deterministic() {
    let temp_dir = TempDir::new().unwrap();
    write_render_inputs(
        temp_dir.path(),
        "FROM {base_image}\nLABEL a={base_image}\n",
        r#"{"placeholders": {"base_image": "alpine:3"}}"#,
    );

    let first = render_cmd(temp_dir.path()).output().unwrap();
    let second = render_cmd(temp_dir.path()).output().unwrap();
    assert!(first.status.success());
    assert_eq!(first.stdout, second.stdout);
    assert_eq!(first.stdout, b"FROM alpine:3\nLABEL a=alpine:3\n");
}

#[test]
fn test_render_missing_template() {
    let temp_dir = TempDir::new().unwrap();
    fs::write(temp_dir.path().join("manifest.json"), r#"{"placeholders": {}}"#).unwrap();

    render_cmd(temp_dir.path())
        .assert()
        .failure()
        .code(3)
        .stderr(predicate::str::contains("Dockerfile.template"));
}

#[test]
fn test_render_malformed_template_before_manifest() {
    let temp_dir = TempDir::new().unwrap();
    // The manifest is missing too; the template error must win.
    fs::write(temp_dir.path().join("Dockerfile.template"), "{unterminated").unwrap();

    render_cmd(temp_dir.path())
        .assert()
        .failure()
        .code(4)
        .stderr(predicate::str::contains("malformed placeholder"));
}

#[test]
fn test_render_invalid_manifest() {
    let temp_dir = TempDir::new().unwrap();
    write_render_inputs(
        temp_dir.path(),
        "FROM {base_image}",
        r#"{"placeholders": {"base_image": {"when": true, "present": "x"}}}"#,
    );

    render_cmd(temp_dir.path())
        .assert()
        .failure()
        .code(5)
        .stderr(predicate::str::contains("base_image"));
}

#[test]
fn test_render_unresolved_placeholder() {
    let temp_dir = TempDir::new().unwrap();
    write_render_inputs(temp_dir.path(), "A {x} B", r#"{"placeholders": {"y": "1"}}"#);

    render_cmd(temp_dir.path())
        .assert()
        .failure()
        .code(6)
        .stdout("")
        .stderr(predicate::str::contains("{x}"));
}

#[test]
fn test_render_rejects_values_that_split_a_marker() {
    let cases = [
        ("{x}}", r#"{"placeholders": {"x": "{ab"}}"#, "{ab"),
        ("RUN {x}{y}", r#"{"placeholders": {"x": "{a", "y": "b}"}}"#, "{a"),
    ];
    for (template, manifest, offending) in cases {
        let temp_dir = TempDir::new().unwrap();
        write_render_inputs(temp_dir.path(), template, manifest);
        let out = temp_dir.path().join("Dockerfile");

        render_cmd(temp_dir.path())
            .arg("--out")
            .arg(&out)
            .assert()
            .failure()
            .code(5)
            .stderr(predicate::str::contains(offending));
        assert!(!out.exists());
    }
}

#[test]
fn test_generate_project_with_examples() {
    let temp_dir = TempDir::new().unwrap();
    create_project(temp_dir.path());
    fs::create_dir(temp_dir.path().join("examples")).unwrap();
    fs::write(temp_dir.path().join("examples").join("in.tif"), "x").unwrap();

    let mut cmd = Command::cargo_bin("dockplate").unwrap();
    cmd.arg("generate").arg(temp_dir.path()).env("HOME", temp_dir.path());
    cmd.assert().success();

    let dockerfile = fs::read_to_string(temp_dir.path().join("Dockerfile.dockplate")).unwrap();
    assert!(dockerfile.starts_with("FROM python:3."));
    assert!(dockerfile.contains("COPY examples/ ./examples/"));
    assert!(dockerfile.contains("COPY model/ ./model/"));
    assert!(!dockerfile.contains("{base_image}"));
}

#[test]
fn test_generate_gpu_without_examples_uses_pinned_image() {
    let temp_dir = TempDir::new().unwrap();
    create_project(temp_dir.path());
    let home = temp_dir.path().join("home");
    fs::create_dir_all(home.join(".dockplate")).unwrap();
    fs::write(
        home.join(".dockplate").join("config.json"),
        r#"{"base_image": "python:3.9-slim"}"#,
    )
    .unwrap();
    let out = temp_dir.path().join("Dockerfile.gpu");

    let mut cmd = Command::cargo_bin("dockplate").unwrap();
    cmd.arg("generate")
        .arg(temp_dir.path())
        .arg("--gpu")
        .arg("--out")
        .arg(&out)
        .env("HOME", &home);
    cmd.assert().success();

    let dockerfile = fs::read_to_string(out).unwrap();
    assert!(dockerfile.contains("FROM python:3.9-slim"));
    assert!(dockerfile.contains("cuda"));
    assert!(!dockerfile.contains("examples/"));
}

#[test]
fn test_generate_uses_project_template() {
    let temp_dir = TempDir::new().unwrap();
    create_project(temp_dir.path());
    fs::create_dir(temp_dir.path().join(".dockplate")).unwrap();
    fs::write(
        temp_dir.path().join(".dockplate").join("dockerfile.template"),
        "FROM {base_image}\n# custom\n{examples_copy}",
    )
    .unwrap();

    let mut cmd = Command::cargo_bin("dockplate").unwrap();
    cmd.arg("generate").arg(temp_dir.path()).env("HOME", temp_dir.path());
    cmd.assert().success();

    let dockerfile = fs::read_to_string(temp_dir.path().join("Dockerfile.dockplate")).unwrap();
    assert!(dockerfile.contains("# custom"));
    assert!(dockerfile.ends_with("# custom\n"));
}

#[test]
fn test_generate_invalid_project() {
    let temp_dir = TempDir::new().unwrap();
    fs::write(temp_dir.path().join("gogogo.py"), "print('serve')").unwrap();

    let mut cmd = Command::cargo_bin("dockplate").unwrap();
    cmd.arg("generate").arg(temp_dir.path()).env("HOME", temp_dir.path());
    cmd.assert()
        .failure()
        .code(8)
        .stderr(predicate::str::contains("mc.json"));
    assert!(!temp_dir.path().join("Dockerfile.dockplate").exists());
}

#[test]
fn test_generate_nonexistent_directory() {
    let mut cmd = Command::cargo_bin("dockplate").unwrap();
    cmd.arg("generate").arg("/nonexistent/directory");

    cmd.assert().failure().code(8);
}

#[test]
fn test_check_command() {
    let temp_dir = TempDir::new().unwrap();
    create_project(temp_dir.path());

    let mut cmd = Command::cargo_bin("dockplate").unwrap();
    cmd.arg("check").arg(temp_dir.path());
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("flood-model"))
        .stdout(predicate::str::contains("Examples: no"));
}

#[test]
fn test_config_set_and_list() {
    let temp_dir = TempDir::new().unwrap();

    let mut cmd = Command::cargo_bin("dockplate").unwrap();
    cmd.args(["config", "set", "base_image", "python:3.10-slim"])
        .env("HOME", temp_dir.path());
    cmd.assert().success();
    assert!(temp_dir.path().join(".dockplate").join("config.json").exists());

    let mut cmd = Command::cargo_bin("dockplate").unwrap();
    cmd.args(["config", "list"]).env("HOME", temp_dir.path());
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("base_image: python:3.10-slim"))
        .stdout(predicate::str::contains("selected base image: python:3.10-slim"));

    let mut cmd = Command::cargo_bin("dockplate").unwrap();
    cmd.args(["config", "set", "default"]).env("HOME", temp_dir.path());
    cmd.assert().success();

    let mut cmd = Command::cargo_bin("dockplate").unwrap();
    cmd.args(["config", "list"]).env("HOME", temp_dir.path());
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("base_image: (detect)"));
}

#[test]
fn test_config_set_unknown_key() {
    let temp_dir = TempDir::new().unwrap();

    let mut cmd = Command::cargo_bin("dockplate").unwrap();
    cmd.args(["config", "set", "docker.host", "tcp://x:2376"])
        .env("HOME", temp_dir.path());
    cmd.assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Unknown config key"));
}

#[test]
fn test_invalid_command() {
    let mut cmd = Command::cargo_bin("dockplate").unwrap();
    cmd.arg("invalid-command");

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("unrecognized subcommand"));
}
