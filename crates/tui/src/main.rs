mod plain;
mod renderer;

use std::fs;
use std::io::{Write, stdout};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use linetree_core::model::EntryPoint;
use linetree_core::{ProfileSession, RootMatch, ThresholdMode, TreeOptions};
use tracing::{Level, info};
use tracing_subscriber::EnvFilter;

/// Merge a call-graph profile with line-profiler timings and browse the
/// pruned call tree.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// Call-graph dump (JSON)
    call_graph: PathBuf,

    /// Line-profiler dump (JSON)
    #[arg(short, long)]
    line_stats: Option<PathBuf>,

    /// Entry point as FILE:LINE; defaults to the first function with no callers
    #[arg(short, long)]
    entry: Option<EntryPoint>,

    /// Tree options as JSON; flags below override it
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Deepest level that still gets children
    #[arg(long)]
    max_depth: Option<u32>,

    /// Only accept a root that no other profiled function called
    #[arg(long)]
    strict_root: bool,

    /// Prune every level against the top-level threshold
    #[arg(long)]
    fixed_threshold: bool,

    /// Print the tree as text instead of opening the viewer
    #[arg(long, conflicts_with = "json")]
    plain: bool,

    /// Print the rows as JSON instead of opening the viewer
    #[arg(long)]
    json: bool,

    /// With --plain, print line-stats reports under their rows
    #[arg(long, requires = "plain")]
    with_line_stats: bool,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn tree_options(&self) -> Result<TreeOptions> {
        let mut options = match &self.config {
            Some(path) => {
                let data = fs::read(path)
                    .with_context(|| format!("reading config {}", path.display()))?;
                TreeOptions::from_json(&data)
                    .with_context(|| format!("parsing config {}", path.display()))?
            }
            None => TreeOptions::default(),
        };
        if let Some(max_depth) = self.max_depth {
            options.max_depth = max_depth;
        }
        if self.strict_root {
            options.root_match = RootMatch::Strict;
        }
        if self.fixed_threshold {
            options.threshold_mode = ThresholdMode::Fixed;
        }
        options.validate()?;
        Ok(options)
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so stdout stays clean for --plain and --json.
    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("linetree={level},linetree_core={level}")));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_max_level(Level::TRACE)
        .with_writer(std::io::stderr)
        .init();

    let options = cli.tree_options()?;
    let call_graph = fs::read(&cli.call_graph)
        .with_context(|| format!("reading call graph {}", cli.call_graph.display()))?;
    let line_stats = cli
        .line_stats
        .as_ref()
        .map(|path| {
            fs::read(path).with_context(|| format!("reading line stats {}", path.display()))
        })
        .transpose()?;

    let session =
        ProfileSession::from_dumps(&call_graph, line_stats.as_deref(), cli.entry.clone(), options)?;
    let view = session.rows();
    info!(rows = view.len(), "call tree ready");

    if cli.json {
        let mut out = stdout().lock();
        serde_json::to_writer_pretty(&mut out, &view)?;
        writeln!(out)?;
    } else if cli.plain {
        plain::write_tree(&mut stdout().lock(), &view, cli.with_line_stats)?;
    } else {
        renderer::render_tui(&view)?;
    }
    Ok(())
}
