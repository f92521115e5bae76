use anyhow::{Context, Result};
use bhvext::api::{
    clade, parse_newick, random_pair, ratio_table, summary, to_newick, GeodesicEngine, GtpEngine,
    ReplayToken, SolveCfg, SolveError, SpaceCfg,
};
use clap::{Parser, Subcommand};
use serde_json::json;
use std::path::{Path, PathBuf};
use tracing::Level;
use tracing_subscriber::fmt::SubscriberBuilder;

mod problem;
mod provenance;

use problem::{ProblemFile, SolutionRecord};
use provenance::{write_sidecar, Payload};

#[derive(Parser)]
#[command(name = "bhvext")]
#[command(about = "Minimum distance between orthant extension spaces in tree space")]
struct Cmd {
    /// Log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    action: Action,
}

#[derive(Subcommand)]
enum Action {
    /// Solve a problem file and print the closest pair of trees
    Solve {
        #[arg(long)]
        input: PathBuf,
        /// Write the result as JSON (plus a provenance sidecar)
        #[arg(long)]
        out: Option<PathBuf>,
        /// Let original leaf edges vary too
        #[arg(long)]
        unrestricted: bool,
        #[arg(long)]
        max_iterations: Option<usize>,
    },
    /// Geodesic distance and ratio sequence between two Newick trees
    Geodesic {
        #[arg(long)]
        a: String,
        #[arg(long)]
        b: String,
    },
    /// List the interior edges of a Newick tree with their indices
    Edges {
        #[arg(long)]
        tree: String,
    },
    /// Solve a random pair of spaces
    Demo {
        #[arg(long, default_value_t = 8)]
        leaves: usize,
        #[arg(long, default_value_t = 0)]
        seed: u64,
        #[arg(long)]
        unrestricted: bool,
    },
}

fn main() -> Result<()> {
    let cmd = Cmd::parse();
    let level = match cmd.verbose {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    SubscriberBuilder::default()
        .with_target(false)
        .with_max_level(level)
        .init();
    match cmd.action {
        Action::Solve {
            input,
            out,
            unrestricted,
            max_iterations,
        } => solve(&input, out.as_deref(), unrestricted, max_iterations),
        Action::Geodesic { a, b } => geodesic(&a, &b),
        Action::Edges { tree } => edges(&tree),
        Action::Demo {
            leaves,
            seed,
            unrestricted,
        } => demo(leaves, seed, unrestricted),
    }
}

fn solve(
    input: &Path,
    out: Option<&Path>,
    unrestricted: bool,
    max_iterations: Option<usize>,
) -> Result<()> {
    let text = std::fs::read_to_string(input)
        .with_context(|| format!("reading {}", input.display()))?;
    let problem = ProblemFile::from_json(&text)?;
    let (a, b) = problem.spaces()?;
    let mut cfg = SolveCfg::default().with_restricted(!(unrestricted || problem.unrestricted));
    if let Some(n) = max_iterations {
        cfg = cfg.with_max_iterations(n);
    }
    tracing::info!(input = %input.display(), restricted = cfg.restricted, "solve");

    let sol = report_outcome(bhvext::solve(GtpEngine, &a, &b, cfg))?;
    println!("{}", summary(&sol));

    if let Some(out) = out {
        if let Some(parent) = out.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("creating {}", parent.display()))?;
            }
        }
        let record = SolutionRecord::new(&sol);
        std::fs::write(out, serde_json::to_vec_pretty(&record)?)
            .with_context(|| format!("writing {}", out.display()))?;
        let payload = Payload {
            command: "solve",
            inputs: vec![input.to_string_lossy().into_owned()],
            params: json!({
                "restricted": cfg.restricted,
                "eps_grad": cfg.eps_grad,
                "eps_deriv": cfg.eps_deriv,
                "max_iterations": cfg.max_iterations,
            }),
        };
        let side = write_sidecar(out, &payload)?;
        tracing::info!(out = %out.display(), provenance = %side.display(), "wrote result");
    }
    Ok(())
}

/// Print the last consistent point before handing a failed run back as an error.
fn report_outcome(
    res: std::result::Result<bhvext::DistanceSolution, SolveError>,
) -> Result<bhvext::DistanceSolution> {
    match res {
        Ok(sol) => Ok(sol),
        Err(err) => {
            if let Some(best) = err.best() {
                eprintln!("last consistent point:\n{best}");
            }
            Err(err.into())
        }
    }
}

fn geodesic(a: &str, b: &str) -> Result<()> {
    let ta = parse_newick(a).context("tree a")?;
    let tb = parse_newick(b).context("tree b")?;
    let g = GtpEngine.geodesic(&ta, &tb)?;
    println!("distance {:.12}", g.distance);
    print!("{}", ratio_table(&g, &ta, &tb));
    Ok(())
}

fn edges(tree: &str) -> Result<()> {
    let t = parse_newick(tree).context("tree")?;
    println!("{}", to_newick(&t));
    for (i, e) in t.edges().iter().enumerate() {
        println!("{i:>3}  {:>10.6}  {}", e.length, clade(&t, i));
    }
    Ok(())
}

fn demo(leaves: usize, seed: u64, unrestricted: bool) -> Result<()> {
    let space_cfg = if unrestricted {
        SpaceCfg::default().unrestricted(0.5)
    } else {
        SpaceCfg::default()
    };
    let (a, b) = random_pair(leaves, space_cfg, ReplayToken::new(seed, 0))?;
    let start = GtpEngine.geodesic(a.start(), b.start())?.distance;
    println!("start distance {start:.12}");
    let cfg = SolveCfg::default().with_restricted(!unrestricted);
    let sol = report_outcome(bhvext::solve(GtpEngine, &a, &b, cfg))?;
    println!("{}", summary(&sol));
    Ok(())
}
