use clap::Args;

use vhosts::remove::{self, RemoveResult};

use super::{CmdResult, DbConnectionArgs, GlobalArgs};

#[derive(Args)]
pub struct RemoveArgs {
    /// Virtual host to remove
    #[arg(long)]
    pub refslug: String,

    #[command(flatten)]
    pub db: DbConnectionArgs,
}

pub fn run(args: RemoveArgs, global: &GlobalArgs) -> CmdResult<RemoveResult> {
    let config = global.load_config()?;
    Ok((remove::run(&config, &args.refslug, &args.db.credentials())?, 0))
}
