use clap::Args;

use vhosts::import::{self, ImportResult};

use super::{CmdResult, DbConnectionArgs, GlobalArgs};

#[derive(Args)]
pub struct ImportArgs {
    /// Virtual host refslug (CI_COMMIT_REF_SLUG)
    #[arg(long, visible_alias = "branch")]
    pub refslug: String,

    #[command(flatten)]
    pub db: DbConnectionArgs,
}

pub fn run(args: ImportArgs, global: &GlobalArgs) -> CmdResult<ImportResult> {
    let config = global.load_config()?;
    Ok((import::run(&config, &args.refslug, &args.db.credentials())?, 0))
}
