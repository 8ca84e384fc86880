use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use blox_core::config::{load_config, BloxConfig, ConfigLayout};
use blox_core::logic::declared::DeclaredLogic;
use blox_core::{Block, BlockProps, CallArgs, Graph, Mold, Scope, Session, Tensor};
use serde::Serialize;
use tracing::{debug, info};

use crate::{canonicalize_or_current, load_logic_document, parse_call_arg};

/// Resolved root plus its effective config.
pub struct Workspace {
    pub layout: ConfigLayout,
    pub config: BloxConfig,
}

pub fn open_workspace(root: &str) -> Result<Workspace> {
    let root_path = canonicalize_or_current(root)?;
    let layout = ConfigLayout::new(&root_path);
    let config = load_config(&layout)?;
    debug!(root = %layout.root.display(), exists = layout.config_path.exists(), "opened workspace");
    Ok(Workspace { layout, config })
}

/// Load and validate the logic document at `path` (relative paths resolve against `root`).
pub fn load_logic(workspace: &Workspace, path: &str) -> Result<DeclaredLogic> {
    let input = Path::new(path);
    let full = if input.is_absolute() { input.to_path_buf() } else { workspace.layout.root.join(input) };
    let doc = load_logic_document(&full)?;
    info!(logic = %doc.name, path = %full.display(), "loaded logic document");
    DeclaredLogic::new(doc).with_context(|| format!("Invalid logic document {}", full.display()))
}

pub fn call_args(raw: &[String]) -> Result<CallArgs> {
    let mut call = CallArgs::new();
    for arg in raw {
        let (name, value) = parse_call_arg(arg)?;
        call = call.named(name, value);
    }
    Ok(call)
}

pub fn dynamic_values(values: &[f64]) -> Vec<Tensor> {
    values.iter().copied().map(Tensor::scalar).collect()
}

/// Build `logic` into `graph` under the scope `scope_name`, optionally attached to `session`.
pub fn instantiate(
    workspace: &Workspace,
    logic: &DeclaredLogic,
    graph: &Graph,
    scope_name: Option<&str>,
    call: CallArgs,
    session: Option<Arc<Session>>,
) -> Result<Block> {
    let mut props = BlockProps::new().backend_type(workspace.config.backend_type.clone());
    if let Some(name) = scope_name {
        props = props.scope_name(name);
    }
    if let Some(session) = session {
        props = props.backend(session);
    }
    let block = Mold::new(logic.clone())
        .instantiate(&Scope::root(graph), props, call)
        .with_context(|| format!("Failed to build block '{}'", logic.document().name))?;
    Ok(block)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NamedValue {
    pub name: String,
    pub value: Tensor,
}

pub fn named_values(pairs: Vec<(String, Tensor)>) -> Vec<NamedValue> {
    pairs.into_iter().map(|(name, value)| NamedValue { name, value }).collect()
}

/// Compact display form: scalars as numbers, everything else as `[a, b, ...]`.
pub fn format_tensor(tensor: &Tensor) -> String {
    if tensor.is_scalar() {
        if let Some(v) = tensor.as_scalar() {
            return format!("{v}");
        }
    }
    let items: Vec<String> = tensor.data.iter().map(|v| format!("{v}")).collect();
    format!("[{}]", items.join(", "))
}

pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let serialized = serde_json::to_string_pretty(value).context("Failed to serialize output to JSON")?;
    println!("{}", serialized);
    Ok(())
}
