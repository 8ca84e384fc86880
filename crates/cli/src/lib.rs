use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use blox_core::logic::declared::LogicDocument;
use blox_core::Tensor;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

pub mod commands;

/// Canonicalize the root path if possible, falling back to the given string
/// relative to the current working directory.
pub fn canonicalize_or_current(root: &str) -> Result<PathBuf> {
    let path = Path::new(root);
    if path == Path::new(".") {
        Ok(env::current_dir().context("Failed to get current directory")?)
    } else {
        // Paths that do not exist yet are joined onto the current dir.
        match path.canonicalize() {
            Ok(p) => Ok(p),
            Err(_) => {
                let cwd = env::current_dir().context("Failed to get current directory")?;
                Ok(cwd.join(path))
            }
        }
    }
}

/// Read a logic document. `.json` files are parsed as JSON, anything else as YAML.
pub fn load_logic_document(path: &Path) -> Result<LogicDocument> {
    let body = fs::read_to_string(path)
        .with_context(|| format!("Failed to read logic document {}", path.display()))?;
    let is_json = path.extension().and_then(|e| e.to_str()) == Some("json");
    let doc = if is_json {
        serde_json::from_str(&body).map_err(anyhow::Error::from)
    } else {
        serde_yaml::from_str(&body).map_err(anyhow::Error::from)
    };
    doc.with_context(|| format!("Failed to parse logic document {}", path.display()))
}

/// Parse a `name=value` call argument.
///
/// The value is a number, or a comma-separated list of numbers for a vector.
pub fn parse_call_arg(raw: &str) -> Result<(String, Tensor)> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| anyhow!("Invalid argument '{raw}': expected name=value"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(anyhow!("Invalid argument '{raw}': empty parameter name"));
    }
    let numbers = value
        .split(',')
        .map(|v| v.trim().parse::<f64>())
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("Invalid value for argument '{name}': {value}"))?;
    let tensor = match numbers.as_slice() {
        [single] if !value.contains(',') => Tensor::scalar(*single),
        _ => Tensor::from_vec(vec![numbers.len()], numbers)?,
    };
    Ok((name.to_string(), tensor))
}

/// Install the global subscriber, writing to stderr.
///
/// `RUST_LOG` wins over `default_filter`. Only the first call takes effect.
pub fn init_tracing(default_filter: &str) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .try_init()
        .ok();
}
