//! `msd`: command-line drivers for the molecular spintronic device engine.

mod worker;

use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::json;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use msd_sim::{MolProto, SweepConfig};

#[derive(Parser, Debug)]
#[command(name = "msd", version, about = "Monte Carlo simulation of molecular spintronic devices")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a parameter sweep described by a JSON file, one simulation per point.
    Sweep {
        #[arg(value_name = "FILE")]
        config: PathBuf,
        /// Override the worker count from the file.
        #[arg(short, long)]
        workers: Option<usize>,
        /// Hide the progress bar.
        #[arg(long, default_value_t = false)]
        quiet: bool,
    },
    /// Host one simulation behind the line protocol on stdin/stdout.
    Worker,
    /// Decode a binary molecule prototype and print it as JSON.
    MolInfo {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_target(false).with_writer(io::stderr))
        .init();

    match Cli::parse().command {
        Command::Sweep {
            config,
            workers,
            quiet,
        } => sweep(&config, workers, quiet),
        Command::Worker => worker::serve(io::stdin().lock(), io::stdout().lock()),
        Command::MolInfo { file } => mol_info(&file),
    }
}

fn sweep(path: &PathBuf, workers: Option<usize>, quiet: bool) -> Result<()> {
    let text = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let mut cfg: SweepConfig =
        serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))?;
    if let Some(w) = workers {
        cfg.workers = w;
    }
    if cfg.workers == 0 {
        cfg.workers = rayon::current_num_threads();
    }
    info!(file = %path.display(), points = cfg.points, workers = cfg.workers, "sweep loaded");

    let pb = if quiet {
        ProgressBar::hidden()
    } else {
        ProgressBar::new(cfg.points as u64)
    };
    pb.set_style(
        ProgressStyle::with_template(
            "{msg} [{bar:40}] {pos}/{len} [{elapsed_precise} < {eta_precise}, {per_sec}]",
        )
        .context("progress bar template")?
        .progress_chars("=> "),
    );
    pb.set_message("points");

    let mut out = BufWriter::new(io::stdout().lock());
    let mut write_err = None;
    let cancel = Arc::new(AtomicBool::new(false));
    let points = msd_sim::run_sweep(&cfg, cancel, |point| {
        pb.inc(1);
        let line = serde_json::to_string(point).map_err(anyhow::Error::from);
        let written = line.and_then(|l| writeln!(out, "{l}").map_err(anyhow::Error::from));
        if let Err(e) = written {
            write_err.get_or_insert(e);
        }
    });
    pb.finish_and_clear();
    let points = points?;
    if let Some(e) = write_err {
        return Err(e.context("writing sweep output"));
    }
    out.flush()?;
    info!(points = points.len(), "sweep written");
    Ok(())
}

fn mol_info(path: &PathBuf) -> Result<()> {
    let bytes = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let proto = MolProto::deserialize(&bytes).with_context(|| format!("decoding {}", path.display()))?;
    let nodes: Vec<_> = proto
        .nodes()
        .enumerate()
        .map(|(index, p)| json!({ "index": index, "parameters": p }))
        .collect();
    let info = json!({
        "nodes": nodes,
        "edges": proto.edges(),
        "leftLead": proto.left_lead(),
        "rightLead": proto.right_lead(),
    });
    println!("{}", serde_json::to_string_pretty(&info)?);
    Ok(())
}
