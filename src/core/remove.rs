//! Tear down virtual hosts: one by name, or every host whose branch no
//! longer exists on the remote.

use std::path::PathBuf;

use serde::Serialize;

use crate::config::Config;
use crate::db::{self, DbCredentials, MysqlServer, SqlExecutor};
use crate::files;
use crate::host::HostProfile;
use crate::io;
use crate::process::{self, CommandSpec};
use crate::slugify;
use crate::vhost;
use crate::Result;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveResult {
    pub refslug: String,
    pub database: String,
    pub removed: Vec<PathBuf>,
    pub pm2_deleted: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PruneResult {
    pub branches: Vec<String>,
    pub hosts: Vec<String>,
    pub removed: Vec<RemoveResult>,
}

/// Drop the host's database and user, delete its checkout and configs.
/// Services are not restarted here.
pub fn remove_host<E: SqlExecutor + ?Sized>(
    config: &Config,
    refslug: &str,
    profile: HostProfile,
    executor: &mut E,
) -> Result<RemoveResult> {
    slugify::validate_refslug(refslug)?;
    let database = slugify::db_name(refslug);
    log::info!("Removing virtual host {} (database {})", refslug, database);

    db::run_statements(executor, &db::remove_statements(&database))?;

    let mut targets = vec![
        config.host_dir(refslug)?,
        config.nginx_dir()?.join(format!("{}.conf", refslug)),
        config.fpm_dir()?.join(format!("{}.conf", refslug)),
    ];

    let mut pm2_deleted = false;
    if profile.uses_pm2() {
        process::run(
            &CommandSpec::new("sudo").args(["-u", vhost::SERVICE_USER, "pm2", "delete", "--silent", refslug]),
        )?;
        pm2_deleted = true;
        targets.push(config.pm2_dir()?.join(format!("{}.json", refslug)));
    }

    let mut removed = Vec::new();
    for target in targets {
        if io::remove_path(&target)? {
            removed.push(target);
        }
    }

    Ok(RemoveResult {
        refslug: refslug.to_string(),
        database,
        removed,
        pm2_deleted,
    })
}

/// Branch names from `git ls-remote --heads` output.
pub fn parse_remote_heads(output: &str) -> Vec<String> {
    output
        .lines()
        .filter_map(|line| line.split_whitespace().nth(1))
        .filter_map(|reference| reference.strip_prefix("refs/heads/"))
        .map(str::to_string)
        .collect()
}

pub fn remote_branches(config: &Config, refslug: &str) -> Result<Vec<String>> {
    let checkout = config.host_dir(refslug)?;
    let output = process::run(
        &CommandSpec::new("git")
            .args(["ls-remote", "--heads", "origin"])
            .current_dir(checkout),
    )?;
    Ok(parse_remote_heads(&output.stdout))
}

/// Host directories that match no live branch and are not protected.
pub fn stale_hosts(folders: &[String], branches: &[String], protected: &[String]) -> Vec<String> {
    let mut live: Vec<String> = branches.iter().map(|b| slugify::ref_slug(b)).collect();
    live.extend(protected.iter().cloned());
    files::difference(folders, &live)
        .into_iter()
        .map(str::to_string)
        .collect()
}

pub fn prune_with<E: SqlExecutor + ?Sized>(
    config: &Config,
    refslug: &str,
    profile: HostProfile,
    executor: &mut E,
) -> Result<PruneResult> {
    slugify::validate_refslug(refslug)?;

    let branches = remote_branches(config, refslug)?;
    log::info!("Remote branches: {}", branches.join(", "));

    let hosts = files::list_dirs(&config.root_dir()?)?;
    log::info!("Host directories: {}", hosts.join(", "));

    let mut removed = Vec::new();
    for stale in stale_hosts(&hosts, &branches, &config.protected_dirs()) {
        log::info!("This folder and settings will be deleted: {}", stale);
        removed.push(remove_host(config, &stale, profile, executor)?);
    }

    Ok(PruneResult {
        branches,
        hosts,
        removed,
    })
}

pub fn run(config: &Config, refslug: &str, credentials: &DbCredentials) -> Result<RemoveResult> {
    let profile = HostProfile::detect()?;
    let mut server = MysqlServer::connect(credentials)?;
    let result = remove_host(config, refslug, profile, &mut server);
    server.close();
    let result = result?;
    vhost::restart_services()?;
    Ok(result)
}

pub fn prune(config: &Config, refslug: &str, credentials: &DbCredentials) -> Result<PruneResult> {
    let profile = HostProfile::detect()?;
    let mut server = MysqlServer::connect(credentials)?;
    let result = prune_with(config, refslug, profile, &mut server);
    server.close();
    let result = result?;
    vhost::restart_services()?;
    Ok(result)
}
