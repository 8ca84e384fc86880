use std::sync::Arc;

use anyhow::{anyhow, Result};
use blox_core::config::{save_config, BloxConfig, ConfigLayout};
use blox_core::{
    BlockProps, Builder, CallArgs, FnLogic, Graph, Inputs, Mold, Out, Scope, Session, Signature,
    Tensor,
};
use serde::Serialize;

use crate::canonicalize_or_current;
use crate::commands::util::{format_tensor, open_workspace, print_json};

/// Smoke test: build and run a one-node block end to end.
pub fn hello_command() -> Result<()> {
    let graph = Graph::new();
    let session = Arc::new(Session::new(&graph));
    let double = FnLogic::new(Signature::new("double").dynamic("x"), |b: &mut Builder, inputs: &Inputs| {
        let x = inputs.expr("double", "x")?;
        let y = b.add("y", x, x)?;
        Ok(Out::new().with("y", y).into())
    });
    let block = Mold::new(double).instantiate(
        &Scope::root(&graph),
        BlockProps::new().backend(session),
        CallArgs::new(),
    )?;
    let values = block.run(&[Tensor::scalar(21.0)])?;

    println!("sandblox v{}", blox_core::version());
    for (name, value) in values.to_pairs() {
        println!("Hello, block: double(21) -> {name} = {}", format_tensor(&value));
    }
    Ok(())
}

/// Write the default config under `root`.
pub fn init_config_command(root: &str, seed: Option<u64>, force: bool) -> Result<()> {
    let root_path = canonicalize_or_current(root)?;
    let layout = ConfigLayout::new(&root_path);
    if layout.config_path.exists() && !force {
        return Err(anyhow!(
            "Config already exists at {}; pass --force to overwrite",
            layout.config_path.display()
        ));
    }

    let config = BloxConfig { seed, ..BloxConfig::default() };
    save_config(&layout, &config)?;

    println!("Initialized sandblox config:");
    println!("  Root: {}", layout.root.display());
    println!("  Config: {}", layout.config_path_relative_string());
    println!("  Backend type: {}", config.backend_type);
    Ok(())
}

#[derive(Serialize)]
pub struct ConfigSnapshot {
    pub root: String,
    pub config_file: String,
    pub config_present: bool,
    pub config: BloxConfig,
}

/// Show the effective config (defaults when no file exists).
pub fn config_info_command(root: &str, json: bool) -> Result<()> {
    let workspace = open_workspace(root)?;
    let snapshot = ConfigSnapshot {
        root: workspace.layout.root.display().to_string(),
        config_file: workspace.layout.config_path.display().to_string(),
        config_present: workspace.layout.config_path.is_file(),
        config: workspace.config,
    };
    if json {
        return print_json(&snapshot);
    }

    let config = &snapshot.config;
    println!("sandblox Config Info");
    println!("====================");
    println!("Root: {}", snapshot.root);
    println!(
        "Config file: {} ({})",
        snapshot.config_file,
        if snapshot.config_present { "OK" } else { "MISSING, using defaults" }
    );
    println!("Config version: {}", config.config_version);
    println!("Backend type: {}", config.backend_type);
    println!("Overhead ratio limit: {}", config.overhead_ratio_limit);
    println!("Overhead iterations: {}", config.overhead_iterations);
    match config.seed {
        Some(seed) => println!("Seed: {seed}"),
        None => println!("Seed: (random)"),
    }
    println!("Log filter: {}", config.log_filter);
    Ok(())
}
