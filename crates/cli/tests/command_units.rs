mod common;

use blox_core::config::{load_config, ConfigLayout};
use blox_core::Tensor;
use sandblox::commands::{
    call_args, config_info_command, format_tensor, hello_command, init_config_command,
    inspect_command, open_workspace, overhead_command, run_command, transfer_command, RunOptions,
};
use tempfile::tempdir;

use common::{write_logic, FOO_YAML};

fn root_str(dir: &tempfile::TempDir) -> String {
    dir.path().to_str().expect("utf8 tempdir").to_string()
}

#[test]
fn hello_runs() {
    hello_command().expect("hello");
}

#[test]
fn init_config_then_info() {
    let dir = tempdir().unwrap();
    let root = root_str(&dir);

    init_config_command(&root, Some(11), false).expect("init config");
    let config = load_config(&ConfigLayout::new(dir.path())).expect("load");
    assert_eq!(config.seed, Some(11));

    let err = init_config_command(&root, None, false).unwrap_err();
    assert!(err.to_string().contains("already exists"));
    init_config_command(&root, None, true).expect("force");
    assert!(load_config(&ConfigLayout::new(dir.path())).expect("reload").seed.is_none());

    config_info_command(&root, false).expect("info");
    config_info_command(&root, true).expect("info json");
}

#[test]
fn open_workspace_uses_defaults_without_config() {
    let dir = tempdir().unwrap();
    let workspace = open_workspace(&root_str(&dir)).expect("workspace");
    assert_eq!(workspace.config.overhead_ratio_limit, 15.0);
    assert_eq!(workspace.layout.root, dir.path().canonicalize().unwrap());
}

#[test]
fn call_args_become_named_arguments() {
    let call = call_args(&["bias=0.5".to_string(), "w=1,2".to_string()]).expect("parse");
    let named = call.named_args();
    assert_eq!(named.len(), 2);
    assert_eq!(named[0].0, "bias");
    assert_eq!(named[1].0, "w");
    assert!(call.positional_args().is_empty());

    assert!(call_args(&["oops".to_string()]).is_err());
}

#[test]
fn format_tensor_distinguishes_scalars() {
    assert_eq!(format_tensor(&Tensor::scalar(1.5)), "1.5");
    assert_eq!(format_tensor(&Tensor::from_vec(vec![2], vec![1.0, -2.0]).unwrap()), "[1, -2]");
}

#[test]
fn inspect_and_run_succeed_for_foo() {
    let dir = tempdir().unwrap();
    let root = root_str(&dir);
    write_logic(dir.path(), "foo.yaml", FOO_YAML);
    let args = vec!["bias=0.5".to_string()];

    inspect_command(&root, "foo.yaml", Some("custom"), &args, false).expect("inspect");
    let options = RunOptions { repeat: 3, trace: true, partitions: true, json: false };
    run_command(&root, "foo.yaml", &args, &[2.0], &options).expect("run");

    let err = run_command(&root, "foo.yaml", &args, &[], &options).unwrap_err();
    assert!(format!("{err:#}").contains("dynamic values"));
}

#[test]
fn absolute_logic_paths_are_accepted() {
    let dir = tempdir().unwrap();
    let path = write_logic(dir.path(), "foo.yaml", FOO_YAML);
    let elsewhere = tempdir().unwrap();

    inspect_command(&root_str(&elsewhere), path.to_str().unwrap(), None, &["bias=1".to_string()], true)
        .expect("inspect absolute path");
}

#[test]
fn overhead_report_respects_limits() {
    let dir = tempdir().unwrap();
    let root = root_str(&dir);
    write_logic(dir.path(), "foo.yaml", FOO_YAML);
    let args = vec!["bias=0.5".to_string()];

    let report = overhead_command(&root, "foo.yaml", &args, &[1.0], Some(100), None, false).expect("overhead");
    assert_eq!(report.iterations, 100);
    assert_eq!(report.limit, 15.0);
    assert!(report.within_limit());

    let err = overhead_command(&root, "foo.yaml", &args, &[1.0], Some(10), Some(-1.0), true).unwrap_err();
    assert!(err.to_string().contains("exceeds limit -1"));
}

#[test]
fn transfer_equalizes_every_variable() {
    let dir = tempdir().unwrap();
    let root = root_str(&dir);
    write_logic(dir.path(), "foo.yaml", FOO_YAML);

    let snapshot = transfer_command(&root, "foo.yaml", &["bias=0.5".to_string()], false).expect("transfer");
    assert_eq!(snapshot.logic, "foo");
    let targets: Vec<&str> = snapshot.variables.iter().map(|v| v.target.as_str()).collect();
    assert_eq!(targets, vec!["target/counter", "target/weights"]);
    assert!(snapshot.variables.iter().all(|v| !v.equal_before));
    assert!(snapshot.variables.iter().all(|v| v.equal_after));
}
