use clap::Args;

use vhosts::remove::{self, PruneResult};

use super::{CmdResult, DbConnectionArgs, GlobalArgs};

#[derive(Args)]
pub struct PruneArgs {
    /// Checkout whose `origin` lists the live branches
    #[arg(long)]
    pub refslug: String,

    #[command(flatten)]
    pub db: DbConnectionArgs,
}

pub fn run(args: PruneArgs, global: &GlobalArgs) -> CmdResult<PruneResult> {
    let config = global.load_config()?;
    Ok((remove::prune(&config, &args.refslug, &args.db.credentials())?, 0))
}
