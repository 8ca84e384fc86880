use anyhow::Result;
use blox_core::config::{load_config, ConfigLayout};
use clap::{Parser, Subcommand};
use sandblox::commands::{
    config_info_command, hello_command, init_config_command, inspect_command, overhead_command,
    run_command, transfer_command, RunOptions,
};
use sandblox::{canonicalize_or_current, init_tracing};

/// Build, bind and run named computation blocks.
///
/// This CLI is a thin wrapper around `blox-core`. All substantive logic lives
/// in the library so it can be tested thoroughly and reused from other frontends.
#[derive(Parser, Debug)]
#[command(
    name = "sandblox",
    version,
    about = "Build, bind and run named computation blocks",
    long_about = None
)]
struct Cli {
    /// Workspace root holding `.blox/config.json`. Defaults to the current directory.
    #[arg(long, global = true, default_value = ".")]
    root: String,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Smoke test: build and run a tiny block.
    Hello,

    /// Write the default config to `.blox/config.json`.
    InitConfig {
        /// Seed sessions for reproducible random ops and initializers.
        #[arg(long)]
        seed: Option<u64>,

        /// Overwrite an existing config.
        #[arg(long, default_value_t = false)]
        force: bool,
    },

    /// Show the effective config.
    ConfigInfo {
        /// Emit JSON instead of human-readable text.
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Build a logic document and describe the resulting block.
    Inspect {
        /// Logic document (YAML or JSON).
        #[arg(long)]
        logic: String,

        /// Scope name; defaults to the logic name.
        #[arg(long)]
        scope: Option<String>,

        /// Call argument as `name=value` (repeatable).
        #[arg(long = "arg")]
        args: Vec<String>,

        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Build, bind to a fresh session and run a block.
    ///
    /// VALUES feed the block's dynamic inputs in declaration order.
    Run {
        #[arg(long)]
        logic: String,

        #[arg(long = "arg")]
        args: Vec<String>,

        /// Number of runs.
        #[arg(long, default_value_t = 1)]
        repeat: usize,

        /// Collect per-node timings.
        #[arg(long, default_value_t = false)]
        trace: bool,

        /// Record the executed partition graphs.
        #[arg(long, default_value_t = false)]
        partitions: bool,

        #[arg(long, default_value_t = false)]
        json: bool,

        #[arg(allow_negative_numbers = true)]
        values: Vec<f64>,
    },

    /// Compare block runs against raw backend evaluation.
    Overhead {
        #[arg(long)]
        logic: String,

        #[arg(long = "arg")]
        args: Vec<String>,

        /// Defaults to the config's `overhead_iterations`.
        #[arg(long)]
        iterations: Option<usize>,

        /// Defaults to the config's `overhead_ratio_limit`.
        #[arg(long)]
        limit: Option<f64>,

        #[arg(long, default_value_t = false)]
        json: bool,

        #[arg(allow_negative_numbers = true)]
        values: Vec<f64>,
    },

    /// Build `source` and `target` blocks and copy source state into target.
    Transfer {
        #[arg(long)]
        logic: String,

        #[arg(long = "arg")]
        args: Vec<String>,

        #[arg(long, default_value_t = false)]
        json: bool,
    },
}

/// Log filter from the config under `root`, falling back to the default.
fn log_filter(root: &str) -> String {
    canonicalize_or_current(root)
        .ok()
        .and_then(|path| load_config(&ConfigLayout::new(path)).ok())
        .unwrap_or_default()
        .log_filter
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&log_filter(&cli.root));
    let root = cli.root.as_str();

    // Default to the Hello command if none is provided.
    match cli.command.unwrap_or(Command::Hello) {
        Command::Hello => hello_command()?,
        Command::InitConfig { seed, force } => init_config_command(root, seed, force)?,
        Command::ConfigInfo { json } => config_info_command(root, json)?,
        Command::Inspect { logic, scope, args, json } => {
            inspect_command(root, &logic, scope.as_deref(), &args, json)?
        }
        Command::Run { logic, args, repeat, trace, partitions, json, values } => {
            run_command(root, &logic, &args, &values, &RunOptions { repeat, trace, partitions, json })?
        }
        Command::Overhead { logic, args, iterations, limit, json, values } => {
            overhead_command(root, &logic, &args, &values, iterations, limit, json)?;
        }
        Command::Transfer { logic, args, json } => {
            transfer_command(root, &logic, &args, json)?;
        }
    }

    Ok(())
}
