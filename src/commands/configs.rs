use clap::Args;

use vhosts::vhost::{self, ConfigsResult};

use super::{CmdResult, GlobalArgs};

#[derive(Args)]
pub struct ConfigsArgs {
    /// Virtual host refslug (CI_COMMIT_REF_SLUG)
    #[arg(long)]
    pub refslug: String,
}

pub fn run(args: ConfigsArgs, global: &GlobalArgs) -> CmdResult<ConfigsResult> {
    let config = global.load_config()?;
    Ok((vhost::run(&config, &args.refslug)?, 0))
}
