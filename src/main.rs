use clap::{Parser, Subcommand};

use commands::GlobalArgs;

mod commands;
mod output;

use commands::{configs, dump, import, prepare, prune, remove};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(name = "vhosts")]
#[command(version = VERSION)]
#[command(about = "Provision and tear down per-branch preview virtual hosts")]
struct Cli {
    /// Configuration file (default: /opt/scripts/config/env.json)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<String>,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Dump a MySQL database, rotate old dumps, sync to storage
    Dump(dump::DumpArgs),
    /// Import the latest dump into a virtual host database
    Import(import::ImportArgs),
    /// Create nginx, php-fpm and pm2 configuration for a virtual host
    Configs(configs::ConfigsArgs),
    /// Check out a commit into a virtual host and deploy it
    Prepare(prepare::PrepareArgs),
    /// Remove a virtual host with its database and configuration
    Remove(remove::RemoveArgs),
    /// Remove every virtual host whose branch is gone from the remote
    Prune(prune::PruneArgs),
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();
}

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let global = GlobalArgs {
        config_path: vhosts::config::resolve_path(cli.config.as_deref()),
    };

    let (json_result, exit_code) = commands::run_json(cli.command, &global);
    if let Err(e) = output::print_json_result(json_result) {
        log::error!("{}", e);
    }

    std::process::ExitCode::from(exit_code_to_u8(exit_code))
}

fn exit_code_to_u8(code: i32) -> u8 {
    if code <= 0 {
        0
    } else if code >= 255 {
        255
    } else {
        code as u8
    }
}
