//! Check out a commit into a virtual host directory and run its deployment
//! commands.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::config::Config;
use crate::deploy::{self, DeployStep};
use crate::error::Error;
use crate::host::HostProfile;
use crate::io;
use crate::process::{self, CommandSpec};
use crate::slugify;
use crate::template::{self, TemplateVars};
use crate::Result;

#[cfg(unix)]
const HOST_DIR_MODE: u32 = 0o750;

/// Loopback address the node library uses for the external API.
const EXTERNAL_SERVER_API: &str = "https://127.0.0.1";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrepareResult {
    pub refslug: String,
    pub commit: String,
    pub host_dir: PathBuf,
    pub created: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub env_file: Option<PathBuf>,
    pub steps: Vec<DeployStep>,
    pub settings_parsed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LibraryEnv {
    pub production: LibraryEnvSection,
    pub development: LibraryEnvSection,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LibraryEnvSection {
    #[serde(rename = "BASE_CONFIG")]
    pub base_config: LibraryDatabase,
    #[serde(rename = "EXTERNAL_SERVER_API")]
    pub external_server_api: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LibraryDatabase {
    #[serde(rename = "BASE_NAME")]
    pub base_name: String,
    #[serde(rename = "USER_NAME")]
    pub user_name: String,
    #[serde(rename = "PASSWORD")]
    pub password: String,
    #[serde(rename = "HOST")]
    pub host: String,
}

/// Node library configuration pointing both environments at the host's
/// database.
pub fn library_env(database: &str) -> LibraryEnv {
    let section = LibraryEnvSection {
        base_config: LibraryDatabase {
            base_name: database.to_string(),
            user_name: database.to_string(),
            password: database.to_string(),
            host: "localhost".to_string(),
        },
        external_server_api: EXTERNAL_SERVER_API.to_string(),
    };
    LibraryEnv {
        production: section.clone(),
        development: section,
    }
}

fn git(host_dir: &Path) -> CommandSpec {
    CommandSpec::new("git").current_dir(host_dir)
}

fn create_host_dir(path: &Path) -> Result<()> {
    let mut builder = std::fs::DirBuilder::new();
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(HOST_DIR_MODE);
    }
    builder.create(path).map_err(|e| {
        Error::internal_io(e.to_string(), Some(format!("create {}", path.display())))
    })
}

/// Application environment written before the first deployment, depending
/// on the host profile.
fn write_app_env(
    config: &Config,
    refslug: &str,
    database: &str,
    host_dir: &Path,
    profile: HostProfile,
) -> Result<Option<PathBuf>> {
    match profile {
        HostProfile::Intranet => {
            let path = host_dir.join("env.json");
            io::write_json_pretty(&path, &library_env(database), "write library env.json")?;
            log::info!("Library JSON configuration {} created", path.display());
            Ok(Some(path))
        }
        HostProfile::Laravel => {
            let template_path = config.require("server.envtmpl", &config.server.envtmpl)?;
            let path = host_dir.join(".env");
            template::render_file(
                Path::new(template_path),
                &path,
                &[
                    (TemplateVars::APP_URL, refslug),
                    (TemplateVars::DB_DATABASE, database),
                    (TemplateVars::DB_USERNAME, database),
                    (TemplateVars::DB_PASSWORD, database),
                ],
            )?;
            Ok(Some(path))
        }
        HostProfile::Plain => Ok(None),
    }
}

/// Copy the `.example` settings and let the project's parse script fill in
/// the database credentials. Skipped when either settings file exists.
pub fn parse_settings(config: &Config, host_dir: &Path, database: &str) -> Result<bool> {
    let settings = host_dir.join(config.require("server.settings", &config.server.settings)?);
    let dbconn = host_dir.join(config.require("server.dbconn", &config.server.dbconn)?);

    if settings.exists() || dbconn.exists() {
        log::debug!("Settings already present in {}", host_dir.display());
        return Ok(false);
    }

    log::info!("Run parse settings...");
    for target in [&settings, &dbconn] {
        let mut example = target.clone().into_os_string();
        example.push(".example");
        io::copy_if_missing(Path::new(&example), target)?;
    }

    let script = config.require("server.parse", &config.server.parse)?;
    process::run(
        &CommandSpec::new("php")
            .args(["-f", script])
            .arg(host_dir.display().to_string())
            .args([database, database])
            .current_dir(host_dir),
    )?;
    log::info!("Parse complete.");
    Ok(true)
}

pub fn run_with_profile(
    config: &Config,
    refslug: &str,
    commitsha: &str,
    profile: HostProfile,
) -> Result<PrepareResult> {
    slugify::validate_refslug(refslug)?;
    if commitsha.trim().is_empty() {
        return Err(Error::validation_missing_argument(vec!["commitsha".to_string()]));
    }

    let host_dir = config.host_dir(refslug)?;
    let database = slugify::db_name(refslug);
    let created = !host_dir.exists();
    let mut env_file = None;

    let steps = if !created {
        log::info!("Directory {} exists", host_dir.display());
        process::run(&git(&host_dir).args(["fetch", "--prune", "origin"]))?;
        process::run(&git(&host_dir).args(["checkout", commitsha]))?;
        deploy::run_commands(&config.server.cmd_dir_exist, &host_dir)?
    } else {
        log::info!("Create directory {}", host_dir.display());
        create_host_dir(&host_dir)?;
        // Written before deployment: build steps read it.
        env_file = write_app_env(config, refslug, &database, &host_dir, profile)?;

        let giturl = config.require("server.giturl", &config.server.giturl)?;
        process::run(&git(&host_dir).arg("init"))?;
        process::run(
            &git(&host_dir).args(["remote", "add", "-t", refslug, "-f", "origin", giturl]),
        )?;
        process::run(&git(&host_dir).args(["checkout", commitsha]))?;
        deploy::run_commands(&config.server.cmd_dir_not_exist, &host_dir)?
    };

    let settings_parsed = if profile == HostProfile::Intranet {
        parse_settings(config, &host_dir, &database)?
    } else {
        false
    };

    Ok(PrepareResult {
        refslug: refslug.to_string(),
        commit: commitsha.to_string(),
        host_dir,
        created,
        env_file,
        steps,
        settings_parsed,
    })
}

pub fn run(config: &Config, refslug: &str, commitsha: &str) -> Result<PrepareResult> {
    run_with_profile(config, refslug, commitsha, HostProfile::detect()?)
}
