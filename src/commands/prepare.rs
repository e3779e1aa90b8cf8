use clap::Args;

use vhosts::prepare::{self, PrepareResult};

use super::{CmdResult, GlobalArgs};

#[derive(Args)]
pub struct PrepareArgs {
    /// Virtual host refslug (CI_COMMIT_REF_SLUG)
    #[arg(long)]
    pub refslug: String,

    /// Commit to check out (CI_COMMIT_SHA)
    #[arg(long)]
    pub commitsha: String,
}

pub fn run(args: PrepareArgs, global: &GlobalArgs) -> CmdResult<PrepareResult> {
    let config = global.load_config()?;
    Ok((prepare::run(&config, &args.refslug, &args.commitsha)?, 0))
}
