use std::path::PathBuf;

use clap::Args;

use vhosts::config::{self, Config};
use vhosts::db::{DbCredentials, DEFAULT_PORT};

pub mod configs;
pub mod dump;
pub mod import;
pub mod prepare;
pub mod prune;
pub mod remove;

pub type CmdResult<T> = vhosts::Result<(T, i32)>;

pub(crate) struct GlobalArgs {
    pub config_path: PathBuf,
}

impl GlobalArgs {
    pub fn load_config(&self) -> vhosts::Result<Config> {
        config::load(&self.config_path)
    }
}

/// MySQL connection used to create and drop virtual host databases.
#[derive(Args, Debug, Clone)]
pub struct DbConnectionArgs {
    /// Database user
    #[arg(long, default_value = "root")]
    pub user: String,

    /// Database password
    #[arg(long, env = "MYSQL_PWD", default_value = "", hide_env_values = true)]
    pub password: String,

    /// Database hostname
    #[arg(long, default_value = "localhost")]
    pub hostname: String,

    /// Database port
    #[arg(long, default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Default database of the connection
    #[arg(long)]
    pub database: Option<String>,
}

impl DbConnectionArgs {
    pub fn credentials(&self) -> DbCredentials {
        DbCredentials {
            user: self.user.clone(),
            password: self.password.clone(),
            hostname: self.hostname.clone(),
            port: self.port,
            database: self.database.clone(),
        }
    }
}

macro_rules! dispatch {
    ($args:expr, $global:expr, $module:ident) => {
        crate::output::map_cmd_result_to_json($module::run($args, $global))
    };
}

pub(crate) fn run_json(
    command: crate::Commands,
    global: &GlobalArgs,
) -> (vhosts::Result<serde_json::Value>, i32) {
    match command {
        crate::Commands::Dump(args) => dispatch!(args, global, dump),
        crate::Commands::Import(args) => dispatch!(args, global, import),
        crate::Commands::Configs(args) => dispatch!(args, global, configs),
        crate::Commands::Prepare(args) => dispatch!(args, global, prepare),
        crate::Commands::Remove(args) => dispatch!(args, global, remove),
        crate::Commands::Prune(args) => dispatch!(args, global, prune),
    }
}
