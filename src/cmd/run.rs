use crate::reports;
use clap::Args;
use ratesmooth::api::Analysis;
use ratesmooth::config::Config;
use ratesmooth::optimizer::runner::ProgressCallback;
use ratesmooth::tree::Tree;
use ratesmooth::SmoothResult;
use tracing::{debug, info, warn};

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    #[command(flatten)]
    pub config: Config,

    /// Input tree (nested JSON nodes).
    #[arg(short, long)]
    pub tree: String,

    /// Write node ages and rates as CSV.
    #[arg(short, long)]
    pub output: Option<String>,

    /// Write the chronogram (edge lengths in time units) as JSON.
    #[arg(long)]
    pub chronogram: Option<String>,

    /// Write the ratogram (edge lengths are rates) as JSON.
    #[arg(long)]
    pub ratogram: Option<String>,
}

struct LogProgress;

impl ProgressCallback for LogProgress {
    fn on_progress(&self, restart: usize, round: usize, value: f64) -> bool {
        debug!("restart #{} round {}: {:.6e}", restart, round, value);
        true
    }
}

pub fn run(args: &RunArgs, config: Config) -> SmoothResult<()> {
    info!("Loading tree: {}", args.tree);
    let tree = Tree::load_from_file(&args.tree)?;

    let mut analysis = Analysis::new(tree, config);
    let report = analysis.run_with(&LogProgress)?;

    reports::print_node_table(&report.dated);
    reports::print_diagnostics(&report.optimization);
    for w in report.warnings() {
        warn!("{}", w);
    }

    if let Some(path) = &args.output {
        reports::write_ages_csv(path, &report.dated)?;
        info!("Ages written to {}", path);
    }
    if let Some(path) = &args.chronogram {
        report.dated.chronogram()?.save_to_file(path)?;
        info!("Chronogram written to {}", path);
    }
    if let Some(path) = &args.ratogram {
        report.dated.ratogram()?.save_to_file(path)?;
        info!("Ratogram written to {}", path);
    }

    Ok(())
}
