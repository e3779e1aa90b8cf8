//! Deployment command lists.
//!
//! The configuration stores post-checkout steps as one comma-separated
//! string (`"composer install,yarn,yarn build"`). Each step is a complete
//! shell command line and is run verbatim, in order, inside the host dir.

use std::path::Path;

use serde::Serialize;

use crate::process;
use crate::Result;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployStep {
    pub command: String,
    pub exit_code: i32,
}

/// Split a comma-separated command list, dropping empty entries.
pub fn split_commands(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string)
        .collect()
}

/// Run every command from `list` in `dir`. Stops at the first failure.
pub fn run_commands(list: &str, dir: &Path) -> Result<Vec<DeployStep>> {
    let commands = split_commands(list);
    if commands.is_empty() {
        log::info!("No deployment commands configured");
    }

    let mut steps = Vec::with_capacity(commands.len());
    for command in commands {
        let output = process::shell(&command, Some(dir))?;
        steps.push(DeployStep {
            command,
            exit_code: output.exit_code,
        });
    }
    Ok(steps)
}
