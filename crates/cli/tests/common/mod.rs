#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

pub const FOO_YAML: &str = r#"
name: foo
description: counter plus input, with a fresh random sample per run
params:
  - { name: x, kind: dynamic }
  - { name: bias }
  - { name: scale, kind: optional, default: 1.0 }
state:
  - { name: counter, init: { uniform: { low: 0.0, high: 1.0 } } }
  - { name: weights, shape: [3], init: { uniform: { low: -1.0, high: 1.0 } } }
outputs:
  - { name: b, expr: { random: {} } }
  - { name: a, expr: { add: [ { state: counter }, { input: x } ] } }
  - { name: c, expr: { add: [ { mul: [ { state: weights }, { input: scale } ] }, { input: bias } ] } }
"#;

pub const BARE_YAML: &str = r#"
name: bare
params:
  - { name: x, kind: dynamic }
returns: { add: [ { input: x }, { constant: 1.0 } ] }
"#;

pub const INFINITE_YAML: &str = r#"
name: unbounded
outputs:
  - { name: noise, expr: { random: { high: .inf } } }
"#;

/// Write `body` to `<root>/<name>` and return the full path.
pub fn write_logic(root: &Path, name: &str, body: &str) -> PathBuf {
    let path = root.join(name);
    fs::write(&path, body).expect("write logic document");
    path
}
