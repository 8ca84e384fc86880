mod common;

use std::fs;

use blox_core::logic::declared::ParamDocKind;
use blox_core::Tensor;
use sandblox::{canonicalize_or_current, load_logic_document, parse_call_arg};
use tempfile::tempdir;

#[test]
fn canonicalize_or_current_resolves_existing_path() {
    let tmp = tempdir().expect("tempdir");
    let nested = tmp.path().join("nested");
    fs::create_dir_all(&nested).expect("create nested");

    let result = canonicalize_or_current(nested.to_str().expect("utf8 path")).expect("canonicalize");
    assert_eq!(result, nested.canonicalize().expect("canonicalize nested"));
}

#[test]
fn canonicalize_or_current_joins_missing_path_onto_cwd() {
    let result = canonicalize_or_current("does-not-exist-yet").expect("resolve");
    let cwd = std::env::current_dir().expect("cwd");
    assert_eq!(result, cwd.join("does-not-exist-yet"));
}

#[test]
fn parse_call_arg_reads_scalars_and_vectors() {
    assert_eq!(parse_call_arg("bias=0.5").unwrap(), ("bias".to_string(), Tensor::scalar(0.5)));
    assert_eq!(
        parse_call_arg("w = 1, 2,3").unwrap(),
        ("w".to_string(), Tensor::from_vec(vec![3], vec![1.0, 2.0, 3.0]).unwrap())
    );
    assert_eq!(parse_call_arg("neg=-2").unwrap().1, Tensor::scalar(-2.0));
}

#[test]
fn parse_call_arg_rejects_malformed_input() {
    let err = parse_call_arg("bias").unwrap_err();
    assert!(err.to_string().contains("expected name=value"));

    let err = parse_call_arg("=1").unwrap_err();
    assert!(err.to_string().contains("empty parameter name"));

    let err = parse_call_arg("bias=abc").unwrap_err();
    assert!(err.to_string().contains("Invalid value for argument 'bias'"));
}

#[test]
fn load_logic_document_reads_yaml() {
    let tmp = tempdir().expect("tempdir");
    let path = common::write_logic(tmp.path(), "foo.yaml", common::FOO_YAML);

    let doc = load_logic_document(&path).expect("load yaml");
    assert_eq!(doc.name, "foo");
    assert_eq!(doc.params.len(), 3);
    assert_eq!(doc.params[0].kind, ParamDocKind::Dynamic);
    assert_eq!(doc.params[1].kind, ParamDocKind::Required);
    assert_eq!(doc.params[2].default, Some(1.0));
    let outputs: Vec<&str> = doc.outputs.iter().map(|o| o.name.as_str()).collect();
    assert_eq!(outputs, vec!["b", "a", "c"]);
    assert_eq!(doc.state[1].shape, vec![3]);
}

#[test]
fn load_logic_document_reads_json_by_extension() {
    let tmp = tempdir().expect("tempdir");
    let yaml = load_logic_document(&common::write_logic(tmp.path(), "foo.yml", common::FOO_YAML))
        .expect("load yaml");
    let json = serde_json::to_string(&yaml).expect("to json");
    let path = common::write_logic(tmp.path(), "foo.json", &json);

    assert_eq!(load_logic_document(&path).expect("load json"), yaml);
}

#[test]
fn load_logic_document_reports_context() {
    let tmp = tempdir().expect("tempdir");
    let err = load_logic_document(&tmp.path().join("missing.yaml")).unwrap_err();
    assert!(err.to_string().contains("Failed to read logic document"));

    let path = common::write_logic(tmp.path(), "broken.yaml", "name: [unclosed");
    let err = load_logic_document(&path).unwrap_err();
    assert!(err.to_string().contains("Failed to parse logic document"));
}
