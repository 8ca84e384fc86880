use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use blox_core::services::overhead::{measure_overhead, OverheadReport};
use blox_core::services::state::list_state;
use blox_core::{Directives, Graph, RunMetadata, Session};
use serde::Serialize;
use tracing::{info, warn};

use crate::commands::util::{
    call_args, dynamic_values, format_tensor, instantiate, load_logic, named_values, open_workspace,
    print_json, NamedValue,
};

#[derive(Debug, Serialize)]
pub struct StateInfo {
    pub name: String,
    pub shape: Vec<usize>,
}

#[derive(Debug, Serialize)]
pub struct InspectSnapshot {
    pub logic: String,
    pub scope: String,
    pub inputs: Vec<String>,
    pub dynamic_inputs: Vec<String>,
    pub outputs: Vec<String>,
    pub state: Vec<StateInfo>,
    pub graph_nodes: usize,
}

/// Build the logic on a fresh graph and describe the resulting block.
pub fn inspect_command(
    root: &str,
    logic_path: &str,
    scope: Option<&str>,
    args: &[String],
    json: bool,
) -> Result<()> {
    let workspace = open_workspace(root)?;
    let logic = load_logic(&workspace, logic_path)?;
    let graph = Graph::new();
    let block = instantiate(&workspace, &logic, &graph, scope, call_args(args)?, None)?;

    let snapshot = InspectSnapshot {
        logic: block.name().to_string(),
        scope: block.scope().absolute_path().to_string(),
        inputs: block.inputs().names().into_iter().map(String::from).collect(),
        dynamic_inputs: block.dynamic_inputs().iter().filter_map(|e| graph.node_name(*e)).collect(),
        outputs: block.outputs().names().to_vec(),
        state: list_state(&block)?
            .iter()
            .map(|v| StateInfo { name: v.name().to_string(), shape: v.shape().to_vec() })
            .collect(),
        graph_nodes: graph.len(),
    };
    if json {
        return print_json(&snapshot);
    }

    println!("Block: {} (scope: {})", snapshot.logic, snapshot.scope);
    println!("Inputs: {}", snapshot.inputs.join(", "));
    if snapshot.dynamic_inputs.is_empty() {
        println!("Dynamic inputs: (none)");
    } else {
        println!("Dynamic inputs: {}", snapshot.dynamic_inputs.join(", "));
    }
    println!("Outputs ({}):", snapshot.outputs.len());
    for (i, name) in snapshot.outputs.iter().enumerate() {
        println!("  {i}. {name}");
    }
    println!("State ({}):", snapshot.state.len());
    if snapshot.state.is_empty() {
        println!("  (none)");
    }
    for var in &snapshot.state {
        println!("  - {} {:?}", var.name, var.shape);
    }
    println!("Graph nodes: {}", snapshot.graph_nodes);
    Ok(())
}

pub struct RunOptions {
    pub repeat: usize,
    pub trace: bool,
    pub partitions: bool,
    pub json: bool,
}

#[derive(Debug, Serialize)]
pub struct RunSnapshot {
    pub logic: String,
    pub runs: Vec<Vec<NamedValue>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<RunMetadata>,
}

/// Build, attach a fresh session, initialize state and run `repeat` times.
pub fn run_command(
    root: &str,
    logic_path: &str,
    args: &[String],
    values: &[f64],
    options: &RunOptions,
) -> Result<()> {
    let workspace = open_workspace(root)?;
    let logic = load_logic(&workspace, logic_path)?;
    let graph = Graph::new();
    let session = Arc::new(Session::from_config(&graph, &workspace.config));
    let block =
        instantiate(&workspace, &logic, &graph, None, call_args(args)?, Some(session.clone()))?;
    session.initialize(block.variables()).context("Failed to initialize block state")?;

    let dynamic = dynamic_values(values);
    let directed = options.trace || options.partitions;
    let mut metadata = RunMetadata::new();
    let mut runs = Vec::with_capacity(options.repeat);
    for _ in 0..options.repeat {
        let outputs = if directed {
            let directives =
                Directives::new().trace(options.trace).output_partition_graphs(options.partitions);
            block.using(directives, &mut metadata).run(&dynamic)?
        } else {
            block.run(&dynamic)?
        };
        runs.push(named_values(outputs.to_pairs()));
    }

    let snapshot = RunSnapshot {
        logic: block.name().to_string(),
        runs,
        metadata: directed.then_some(metadata),
    };
    if options.json {
        return print_json(&snapshot);
    }

    for (i, run) in snapshot.runs.iter().enumerate() {
        println!("Run {}:", i + 1);
        for value in run {
            println!("  {} = {}", value.name, format_tensor(&value.value));
        }
    }
    if let Some(metadata) = &snapshot.metadata {
        for partition in &metadata.partition_graphs {
            println!("Partition graph [{}]: {} nodes", partition.device, partition.nodes.len());
        }
        if !metadata.step_stats.is_empty() {
            println!("Step stats ({} nodes):", metadata.step_stats.len());
            for stat in &metadata.step_stats {
                println!("  - {} [{}] {}ns", stat.node, stat.op, stat.elapsed_ns);
            }
        }
    }
    Ok(())
}

/// Measure run overhead; errors when the ratio exceeds the limit.
pub fn overhead_command(
    root: &str,
    logic_path: &str,
    args: &[String],
    values: &[f64],
    iterations: Option<usize>,
    limit: Option<f64>,
    json: bool,
) -> Result<OverheadReport> {
    let workspace = open_workspace(root)?;
    let logic = load_logic(&workspace, logic_path)?;
    let graph = Graph::new();
    let session = Arc::new(Session::from_config(&graph, &workspace.config));
    let block =
        instantiate(&workspace, &logic, &graph, None, call_args(args)?, Some(session.clone()))?;
    session.initialize(block.variables()).context("Failed to initialize block state")?;

    let iterations = iterations.unwrap_or(workspace.config.overhead_iterations);
    let limit = limit.unwrap_or(workspace.config.overhead_ratio_limit);
    let report = measure_overhead(&block, &dynamic_values(values), iterations, limit)?;

    if json {
        print_json(&report)?;
    } else {
        println!("Overhead for block '{}':", block.name());
        println!("  Iterations: {}", report.iterations);
        println!("  Block runs: {:?}", report.run);
        println!("  Raw evaluations: {:?}", report.raw);
        println!("  Ratio: {:.3} (limit {})", report.ratio, report.limit);
    }
    if !report.within_limit() {
        warn!(block = %block.name(), ratio = report.ratio, limit = report.limit, "overhead limit exceeded");
        return Err(anyhow!(
            "Run overhead ratio {:.3} exceeds limit {}",
            report.ratio,
            report.limit
        ));
    }
    Ok(report)
}

#[derive(Debug, Serialize)]
pub struct TransferEntry {
    pub target: String,
    pub source: String,
    pub equal_before: bool,
    pub equal_after: bool,
}

#[derive(Debug, Serialize)]
pub struct TransferSnapshot {
    pub logic: String,
    pub variables: Vec<TransferEntry>,
}

/// Build `source` and `target` blocks, then copy source state into target.
pub fn transfer_command(root: &str, logic_path: &str, args: &[String], json: bool) -> Result<TransferSnapshot> {
    let workspace = open_workspace(root)?;
    let logic = load_logic(&workspace, logic_path)?;
    let graph = Graph::new();
    let session = Arc::new(Session::from_config(&graph, &workspace.config));
    let call = call_args(args)?;
    let source =
        instantiate(&workspace, &logic, &graph, Some("source"), call.clone(), Some(session.clone()))?;
    let target =
        instantiate(&workspace, &logic, &graph, Some("target"), call, Some(session.clone()))?;
    session.initialize(source.variables()).context("Failed to initialize source state")?;
    session.initialize(target.variables()).context("Failed to initialize target state")?;

    let pairs: Vec<_> = target.variables().iter().zip(source.variables()).collect();
    let mut equal_before = Vec::with_capacity(pairs.len());
    for (t, s) in &pairs {
        equal_before.push(session.value(t)? == session.value(s)?);
    }

    let transfer = target.assign_vars(&source)?;
    session.run(&[transfer], &[]).context("Failed to run state transfer")?;
    info!(logic = %logic.document().name, variables = pairs.len(), "transferred source state into target");

    let mut variables = Vec::with_capacity(pairs.len());
    for ((t, s), before) in pairs.iter().zip(equal_before) {
        variables.push(TransferEntry {
            target: t.name().to_string(),
            source: s.name().to_string(),
            equal_before: before,
            equal_after: session.value(t)? == session.value(s)?,
        });
    }
    let snapshot = TransferSnapshot { logic: logic.document().name.clone(), variables };

    if json {
        print_json(&snapshot)?;
    } else {
        println!("Transferred state for '{}' ({} variables):", snapshot.logic, snapshot.variables.len());
        for entry in &snapshot.variables {
            println!(
                "  - {} <- {} (equal before: {}, after: {})",
                entry.target, entry.source, entry.equal_before, entry.equal_after
            );
        }
    }
    Ok(snapshot)
}
