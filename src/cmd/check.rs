use crate::reports;
use clap::Args;
use ratesmooth::api::prepare;
use ratesmooth::config::Config;
use ratesmooth::tree::Tree;
use ratesmooth::SmoothResult;
use tracing::{info, warn};

#[derive(Args, Debug, Clone)]
pub struct CheckArgs {
    #[command(flatten)]
    pub config: Config,

    /// Input tree (nested JSON nodes).
    #[arg(short, long)]
    pub tree: String,
}

pub fn run(args: &CheckArgs, config: Config) -> SmoothResult<()> {
    let mut tree = Tree::load_from_file(&args.tree)?;
    let array = prepare(&mut tree, &config)?;

    reports::print_bounds_table(&array);
    for w in &array.warnings {
        warn!("{}", w);
    }
    info!(
        "{} node(s), {} free age(s), branch multiplier {}",
        array.n,
        array.variable_index.len(),
        array.multiplier
    );
    Ok(())
}
