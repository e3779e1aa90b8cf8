use std::path::PathBuf;

use clap::Args;

use vhosts::dump::{self, DumpOptions, DumpResult};

use super::{CmdResult, GlobalArgs};

#[derive(Args)]
pub struct DumpArgs {
    /// Database user
    #[arg(long, short = 'u', default_value = "root")]
    pub user: String,

    /// MySQL hostname
    #[arg(long, default_value = "localhost")]
    pub host: String,

    /// Database to dump
    #[arg(long, conflicts_with = "db_all")]
    pub db: Option<String>,

    /// Dump every database; the file is named after this server
    #[arg(long)]
    pub db_all: bool,

    /// Local directory the dump is written to
    #[arg(long, default_value = dump::DEFAULT_BACKUP_DIR)]
    pub backup_dir: PathBuf,

    /// Storage directory the backup dir is synchronized to
    #[arg(long, default_value = dump::DEFAULT_STORAGE_DIR)]
    pub storage_dir: PathBuf,

    /// Write plain SQL instead of gzip
    #[arg(long)]
    pub no_gzip: bool,

    /// Delete compressed dumps older than this many days
    #[arg(long, default_value_t = dump::DEFAULT_RETENTION_DAYS)]
    pub retention_days: u64,
}

pub fn run(args: DumpArgs, _global: &GlobalArgs) -> CmdResult<DumpResult> {
    let opts = DumpOptions {
        user: args.user,
        host: args.host,
        database: args.db,
        all_databases: args.db_all,
        backup_dir: args.backup_dir,
        storage_dir: args.storage_dir,
        gzip: !args.no_gzip,
        retention_days: args.retention_days,
    };

    Ok((dump::run(&opts)?, 0))
}
