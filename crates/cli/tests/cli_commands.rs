mod common;

use blox_core::config::{load_config, ConfigLayout};
use predicates::prelude::*;
use serde_json::Value;
use tempfile::tempdir;

use common::{write_logic, BARE_YAML, FOO_YAML, INFINITE_YAML};

/// Running the CLI with no arguments should default to the Hello command.
#[test]
fn hello_default_command_runs_successfully() {
    assert_cmd::cargo::cargo_bin_cmd!("sandblox")
        .assert()
        .success()
        .stdout(predicate::str::contains("sandblox v"))
        .stdout(predicate::str::contains("double(21) -> y = 42"));
}

#[test]
fn init_config_writes_defaults_once() {
    let dir = tempdir().expect("tempdir");
    let root = dir.path();

    assert_cmd::cargo::cargo_bin_cmd!("sandblox")
        .arg("--root")
        .arg(root)
        .arg("init-config")
        .assert()
        .success();
    let config = load_config(&ConfigLayout::new(root)).expect("load config");
    assert_eq!(config.backend_type, "session");

    assert_cmd::cargo::cargo_bin_cmd!("sandblox")
        .arg("--root")
        .arg(root)
        .arg("init-config")
        .assert()
        .failure()
        .stderr(predicate::str::contains("pass --force"));

    assert_cmd::cargo::cargo_bin_cmd!("sandblox")
        .arg("init-config")
        .arg("--root")
        .arg(root)
        .arg("--seed")
        .arg("3")
        .arg("--force")
        .assert()
        .success();
    assert_eq!(load_config(&ConfigLayout::new(root)).expect("reload").seed, Some(3));
}

#[test]
fn config_info_reports_defaults_without_a_file() {
    let dir = tempdir().expect("tempdir");

    assert_cmd::cargo::cargo_bin_cmd!("sandblox")
        .arg("config-info")
        .arg("--root")
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("MISSING, using defaults"))
        .stdout(predicate::str::contains("Overhead ratio limit: 15"));
}

#[test]
fn config_info_fails_on_corrupt_config() {
    let dir = tempdir().expect("tempdir");
    let layout = ConfigLayout::new(dir.path());
    std::fs::create_dir_all(&layout.meta_dir).expect("meta dir");
    std::fs::write(&layout.config_path, "not json").expect("write config");

    assert_cmd::cargo::cargo_bin_cmd!("sandblox")
        .arg("config-info")
        .arg("--root")
        .arg(dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to parse config JSON"));
}

#[test]
fn inspect_lists_ordered_outputs_and_state() {
    let dir = tempdir().expect("tempdir");
    write_logic(dir.path(), "foo.yaml", FOO_YAML);

    assert_cmd::cargo::cargo_bin_cmd!("sandblox")
        .arg("--root")
        .arg(dir.path())
        .args(["inspect", "--logic", "foo.yaml", "--arg", "bias=0.5"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Block: foo (scope: foo)"))
        .stdout(predicate::str::contains("Dynamic inputs: foo/x"))
        .stdout(predicate::str::contains("0. b\n  1. a\n  2. c"))
        .stdout(predicate::str::contains("foo/weights [3]"));
}

#[test]
fn inspect_json_honors_the_scope_name() {
    let dir = tempdir().expect("tempdir");
    write_logic(dir.path(), "foo.yaml", FOO_YAML);

    let output = assert_cmd::cargo::cargo_bin_cmd!("sandblox")
        .arg("--root")
        .arg(dir.path())
        .args(["inspect", "--logic", "foo.yaml", "--scope", "net", "--arg", "bias=0.5", "--json"])
        .output()
        .expect("run inspect");
    assert!(output.status.success());
    let snapshot: Value = serde_json::from_slice(&output.stdout).expect("json");
    assert_eq!(snapshot["scope"], "net");
    assert_eq!(snapshot["inputs"], serde_json::json!(["x", "bias", "scale"]));
    assert_eq!(snapshot["dynamic_inputs"], serde_json::json!(["net/x"]));
    assert_eq!(snapshot["state"][0]["name"], "net/counter");
}

#[test]
fn inspect_rejects_bare_value_logic() {
    let dir = tempdir().expect("tempdir");
    write_logic(dir.path(), "bare.yaml", BARE_YAML);

    assert_cmd::cargo::cargo_bin_cmd!("sandblox")
        .arg("--root")
        .arg(dir.path())
        .args(["inspect", "--logic", "bare.yaml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("must either return"));
}

#[test]
fn inspect_fails_for_missing_document() {
    let dir = tempdir().expect("tempdir");

    assert_cmd::cargo::cargo_bin_cmd!("sandblox")
        .arg("--root")
        .arg(dir.path())
        .args(["inspect", "--logic", "nope.yaml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read logic document"));
}

#[test]
fn run_feeds_dynamic_values() {
    let dir = tempdir().expect("tempdir");
    write_logic(dir.path(), "foo.yaml", FOO_YAML);

    let output = assert_cmd::cargo::cargo_bin_cmd!("sandblox")
        .arg("--root")
        .arg(dir.path())
        .args(["run", "--logic", "foo.yaml", "--arg", "bias=0.5", "--repeat", "2", "--json", "100"])
        .output()
        .expect("run");
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let snapshot: Value = serde_json::from_slice(&output.stdout).expect("json");
    let runs = snapshot["runs"].as_array().expect("runs");
    assert_eq!(runs.len(), 2);
    let names: Vec<&str> =
        runs[0].as_array().expect("run").iter().map(|v| v["name"].as_str().expect("name")).collect();
    assert_eq!(names, vec!["b", "a", "c"]);
    let a = runs[0][1]["value"]["data"][0].as_f64().expect("a");
    assert!((100.0..101.0).contains(&a), "a = {a}");
    assert_eq!(runs[1][1], runs[0][1], "state is unchanged between runs");
    assert!(snapshot.get("metadata").is_none());
}

#[test]
fn run_with_seeded_config_is_reproducible() {
    let dir = tempdir().expect("tempdir");
    write_logic(dir.path(), "foo.yaml", FOO_YAML);
    assert_cmd::cargo::cargo_bin_cmd!("sandblox")
        .arg("--root")
        .arg(dir.path())
        .args(["init-config", "--seed", "7"])
        .assert()
        .success();

    let run = || {
        assert_cmd::cargo::cargo_bin_cmd!("sandblox")
            .arg("--root")
            .arg(dir.path())
            .args(["run", "--logic", "foo.yaml", "--arg", "bias=0.5", "--json", "-3"])
            .output()
            .expect("run")
            .stdout
    };
    assert_eq!(run(), run());
}

#[test]
fn run_with_directives_reports_metadata() {
    let dir = tempdir().expect("tempdir");
    write_logic(dir.path(), "foo.yaml", FOO_YAML);

    assert_cmd::cargo::cargo_bin_cmd!("sandblox")
        .arg("--root")
        .arg(dir.path())
        .args(["run", "--logic", "foo.yaml", "--arg", "bias=0.5", "--partitions", "--trace", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Partition graph [cpu:0]"))
        .stdout(predicate::str::contains("foo/a [Add]"));
}

#[test]
fn run_requires_every_dynamic_value() {
    let dir = tempdir().expect("tempdir");
    write_logic(dir.path(), "foo.yaml", FOO_YAML);

    assert_cmd::cargo::cargo_bin_cmd!("sandblox")
        .arg("--root")
        .arg(dir.path())
        .args(["run", "--logic", "foo.yaml", "--arg", "bias=0.5"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("expected 1 dynamic values, got 0"));
}

#[test]
fn run_rejects_unknown_arguments() {
    let dir = tempdir().expect("tempdir");
    write_logic(dir.path(), "foo.yaml", FOO_YAML);

    assert_cmd::cargo::cargo_bin_cmd!("sandblox")
        .arg("--root")
        .arg(dir.path())
        .args(["run", "--logic", "foo.yaml", "--arg", "bias=0.5", "--arg", "gain=2", "1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unexpected parameter `gain`"));
}

#[test]
fn overhead_passes_with_default_limit() {
    let dir = tempdir().expect("tempdir");
    write_logic(dir.path(), "foo.yaml", FOO_YAML);

    assert_cmd::cargo::cargo_bin_cmd!("sandblox")
        .arg("--root")
        .arg(dir.path())
        .args(["overhead", "--logic", "foo.yaml", "--arg", "bias=0.5", "--iterations", "200", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Ratio:"))
        .stdout(predicate::str::contains("(limit 15)"));
}

#[test]
fn overhead_fails_when_limit_is_exceeded() {
    let dir = tempdir().expect("tempdir");
    write_logic(dir.path(), "foo.yaml", FOO_YAML);

    assert_cmd::cargo::cargo_bin_cmd!("sandblox")
        .arg("--root")
        .arg(dir.path())
        .args(["overhead", "--logic", "foo.yaml", "--arg", "bias=0.5", "--iterations", "10", "--limit=-1", "1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("exceeds limit"));
}

#[test]
fn transfer_makes_target_state_equal_to_source() {
    let dir = tempdir().expect("tempdir");
    write_logic(dir.path(), "foo.yaml", FOO_YAML);

    let output = assert_cmd::cargo::cargo_bin_cmd!("sandblox")
        .arg("--root")
        .arg(dir.path())
        .args(["transfer", "--logic", "foo.yaml", "--arg", "bias=0.5", "--json"])
        .output()
        .expect("transfer");
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let snapshot: Value = serde_json::from_slice(&output.stdout).expect("json");
    let variables = snapshot["variables"].as_array().expect("variables");
    assert_eq!(variables.len(), 2);
    assert_eq!(variables[0]["target"], "target/counter");
    assert_eq!(variables[0]["source"], "source/counter");
    assert!(variables.iter().all(|v| v["equal_before"] == false));
    assert!(variables.iter().all(|v| v["equal_after"] == true));
}

#[test]
fn transfer_logs_at_the_command_edge() {
    let dir = tempdir().expect("tempdir");
    write_logic(dir.path(), "foo.yaml", FOO_YAML);

    assert_cmd::cargo::cargo_bin_cmd!("sandblox")
        .env("RUST_LOG", "info")
        .arg("--root")
        .arg(dir.path())
        .args(["transfer", "--logic", "foo.yaml", "--arg", "bias=0.5"])
        .assert()
        .success()
        .stderr(predicate::str::contains("loaded logic document"))
        .stderr(predicate::str::contains("transferred source state into target"));
}

#[test]
fn run_rejects_non_finite_random_ranges() {
    let dir = tempdir().expect("tempdir");
    write_logic(dir.path(), "inf.yaml", INFINITE_YAML);

    assert_cmd::cargo::cargo_bin_cmd!("sandblox")
        .arg("--root")
        .arg(dir.path())
        .args(["run", "--logic", "inf.yaml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("non-finite range"));
}
