// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! htn-plan: runs the HTN planner on a grounded JSON model.
//!
//! Configuration comes from an optional JSON file (any subset of
//! `PlannerConfig`) with command-line flags layered on top. Logs go to stderr;
//! stdout carries only the JSON result record.

use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use htn_core::{
    HeuristicKind, Model, ModelDocument, Planner, PlannerConfig, RevisitPolicy, SearchKind,
    SearchResult, TdgWeighting, TracingTelemetry,
};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Exit status when the search ends without a plan.
const NO_PLAN: u8 = 2;

#[derive(Parser, Debug)]
#[command(author, version, about = "Hierarchical task network planner")]
struct Args {
    /// Grounded model document (JSON); `-` reads stdin
    model: PathBuf,
    /// Planner configuration file (JSON); flags override its values
    #[arg(long)]
    config: Option<PathBuf>,
    /// Search engine
    #[arg(long, value_enum)]
    search: Option<SearchArg>,
    /// Heuristic
    #[arg(long, value_enum)]
    heuristic: Option<HeuristicArg>,
    /// Wall-clock budget in seconds
    #[arg(long)]
    time_limit: Option<f64>,
    /// Resident-memory budget in MiB
    #[arg(long)]
    memory_limit: Option<u64>,
    /// Expansions between budget checks
    #[arg(long)]
    check_interval: Option<u64>,
    /// Close landmarks under the top-down graph
    #[arg(long)]
    bidirectional: bool,
    /// Weight landmarks by uniform cost partitioning
    #[arg(long)]
    ucp: bool,
    /// Weight the TDG table by action cost instead of unit cost
    #[arg(long)]
    tdg_cost: bool,
    /// Serve novel nodes first (bfs/dfs only)
    #[arg(long)]
    novelty: bool,
    /// Drop nodes whose hashed (state, task network) key was already reached
    #[arg(long)]
    revisit: bool,
    /// Emit a trace event per expanded and generated node
    #[arg(long)]
    trace_nodes: bool,
    /// Log filter directive (e.g. `debug`, `htn_core=trace`); `RUST_LOG` is also honoured
    #[arg(long, default_value = "info")]
    log_level: String,
    /// Pretty-print the result record
    #[arg(long)]
    pretty: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum SearchArg {
    Astar,
    Gbfs,
    Bfs,
    Dfs,
}

impl From<SearchArg> for SearchKind {
    fn from(arg: SearchArg) -> Self {
        match arg {
            SearchArg::Astar => Self::AStar,
            SearchArg::Gbfs => Self::GreedyBestFirst,
            SearchArg::Bfs => Self::BreadthFirst,
            SearchArg::Dfs => Self::DepthFirst,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum HeuristicArg {
    Blind,
    Lmc,
    Tdg,
    Lmcut,
}

impl From<HeuristicArg> for HeuristicKind {
    fn from(arg: HeuristicArg) -> Self {
        match arg {
            HeuristicArg::Blind => Self::Blind,
            HeuristicArg::Lmc => Self::LandmarkCount,
            HeuristicArg::Tdg => Self::Tdg,
            HeuristicArg::Lmcut => Self::LmCut,
        }
    }
}

/// Result record plus operator names for readers without the model at hand.
#[derive(Serialize)]
struct Report<'a> {
    #[serde(flatten)]
    result: &'a SearchResult,
    plan_names: Vec<&'a str>,
}

fn main() -> Result<ExitCode> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(args.log_level.parse()?))
        .with_writer(std::io::stderr)
        .init();

    let model = load_model(&args.model)?;
    let config = planner_config(&args)?;
    info!(
        facts = model.num_facts(),
        operators = model.num_operators(),
        tasks = model.num_abstract_tasks(),
        methods = model.num_decompositions(),
        "model loaded"
    );

    let mut planner = Planner::new(&model, config).context("invalid planner configuration")?;
    if args.trace_nodes {
        planner = planner.with_telemetry(Box::new(TracingTelemetry));
    }
    let result = planner.run();

    let report = Report {
        result: &result,
        plan_names: result.plan_names(&model),
    };
    let mut out = std::io::stdout().lock();
    if args.pretty {
        serde_json::to_writer_pretty(&mut out, &report)?;
    } else {
        serde_json::to_writer(&mut out, &report)?;
    }
    writeln!(out)?;

    Ok(if result.is_goal() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(NO_PLAN)
    })
}

fn load_model(path: &Path) -> Result<Model> {
    let text = if path == Path::new("-") {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .context("failed to read model from stdin")?;
        text
    } else {
        std::fs::read_to_string(path)
            .with_context(|| format!("failed to read model {}", path.display()))?
    };
    let model = ModelDocument::from_json(&text)
        .and_then(ModelDocument::into_model)
        .with_context(|| format!("failed to load model {}", path.display()))?;
    Ok(model)
}

fn planner_config(args: &Args) -> Result<PlannerConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read config {}", path.display()))?;
            serde_json::from_str(&text)
                .with_context(|| format!("failed to parse config {}", path.display()))?
        }
        None => PlannerConfig::default(),
    };

    if let Some(search) = args.search {
        config.search.kind = search.into();
    }
    if let Some(heuristic) = args.heuristic {
        config.heuristic.kind = heuristic.into();
    }
    if let Some(secs) = args.time_limit {
        let limit = Duration::try_from_secs_f64(secs)
            .with_context(|| format!("--time-limit {secs} is not a valid number of seconds"))?;
        config.search.time_limit = Some(limit);
    }
    if let Some(mib) = args.memory_limit {
        config.search.memory_limit_bytes = Some(mib.saturating_mul(1024 * 1024));
    }
    if let Some(interval) = args.check_interval {
        config.search.check_interval = interval;
    }
    if args.bidirectional {
        config.heuristic.landmarks.bidirectional = true;
    }
    if args.ucp {
        config.heuristic.landmarks.use_ucp = true;
    }
    if args.tdg_cost {
        config.heuristic.tdg_weighting = TdgWeighting::Cost;
    }
    if args.novelty {
        config.search.novelty = true;
    }
    if args.revisit {
        config.search.revisit = RevisitPolicy::HashedKey;
    }
    Ok(config)
}
