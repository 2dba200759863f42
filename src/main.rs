use clap::{CommandFactory, FromArgMatches, Parser, Subcommand};
use ratesmooth::config::Config;
use std::process;
use tracing::{error, Level};

mod cmd;
mod reports;

#[derive(Parser, Debug)]
#[command(author, version, about = "Divergence time estimation by nonparametric rate smoothing", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// JSON configuration file; command-line flags override its values.
    #[arg(global = true, short, long)]
    config: Option<String>,

    #[arg(global = true, long, default_value_t = false)]
    debug: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Estimate node ages and rates.
    Run(cmd::run::RunArgs),
    /// Preprocess the tree and show propagated bounds, without optimizing.
    Check(cmd::check::CheckArgs),
}

fn main() {
    // Raw matches tell user input apart from defaults.
    let matches = Cli::command().get_matches();
    let cli = Cli::from_arg_matches(&matches).unwrap_or_else(|e| e.exit());

    let level = if cli.debug { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .init();

    let (cli_config, sub_matches) = match &cli.command {
        Commands::Run(args) => (&args.config, matches.subcommand_matches("run")),
        Commands::Check(args) => (&args.config, matches.subcommand_matches("check")),
    };

    let config = match &cli.config {
        Some(path) => {
            let mut file_config = Config::load_from_file(path).unwrap_or_else(|e| {
                error!("Cannot load configuration '{}': {}", path, e);
                process::exit(1);
            });
            if let Some(m) = sub_matches {
                file_config.merge_from_cli(cli_config, m);
            }
            file_config
        }
        None => cli_config.clone(),
    };

    let result = match &cli.command {
        Commands::Run(args) => cmd::run::run(args, config),
        Commands::Check(args) => cmd::check::run(args, config),
    };

    if let Err(e) = result {
        error!("{}", e);
        process::exit(1);
    }
}
