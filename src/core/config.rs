//! Tool configuration.
//!
//! One JSON document describes the server the tools run on: where virtual
//! hosts live, where dumps are stored, where web-server configs go and which
//! deployment commands to run. It is loaded once at startup and passed by
//! reference to every workflow.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::io;
use crate::Result;

pub const DEFAULT_CONFIG_PATH: &str = "/opt/scripts/config/env.json";
pub const CONFIG_ENV_VAR: &str = "VHOSTS_CONFIG";

/// Directory names under `rootdir` that never belong to a virtual host.
pub const DEFAULT_PROTECTED_DIRS: &[&str] = &["pm2json", "log", "intranet", "default"];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Parent of every virtual host checkout.
    pub rootdir: String,
    /// Where imported dumps are copied and unpacked.
    pub dbdir: String,
    /// Where the dump job publishes archives.
    pub storagedir: String,
    pub nginxdir: String,
    pub fpmdir: String,
    /// Domain suffix appended to the refslug for the virtual host name.
    pub subdomain: String,
    pub server: ServerConfig,

    #[serde(skip)]
    pub source: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Directory holding pm2 process files.
    pub pm2: String,
    pub nginxtmpl: String,
    /// Template for the Laravel `.env` file.
    pub envtmpl: String,
    /// Settings directory of the checkout, relative to the host dir.
    pub settings: String,
    /// Database connection settings file, relative to the host dir.
    pub dbconn: String,
    /// PHP script that writes database settings into the checkout.
    pub parse: String,
    pub giturl: String,
    #[serde(rename = "cmd-dir-exist")]
    pub cmd_dir_exist: String,
    #[serde(rename = "cmd-dir-not-exist")]
    pub cmd_dir_not_exist: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protected: Option<Vec<String>>,
}

/// Resolve the configuration path: explicit flag, then `VHOSTS_CONFIG`, then
/// the default location. `~` is expanded.
pub fn resolve_path(explicit: Option<&str>) -> PathBuf {
    let raw = explicit
        .map(str::to_string)
        .or_else(|| std::env::var(CONFIG_ENV_VAR).ok().filter(|v| !v.is_empty()))
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    PathBuf::from(shellexpand::tilde(&raw).to_string())
}

/// Load and decode the configuration. A malformed document is fatal.
pub fn load(path: &Path) -> Result<Config> {
    let display = path.display().to_string();
    let content = io::read_file(path, &format!("read config {}", display)).map_err(|e| {
        e.with_hint(format!(
            "Create {} or point --config / {} at the configuration file",
            display, CONFIG_ENV_VAR
        ))
    })?;

    let mut config: Config =
        serde_json::from_str(&content).map_err(|e| Error::config_invalid_json(&display, e))?;
    config.source = Some(path.to_path_buf());
    log::debug!("Loaded configuration from {}", display);
    Ok(config)
}

impl Config {
    fn source_display(&self) -> Option<String> {
        self.source.as_ref().map(|p| p.display().to_string())
    }

    /// Value of a key that a workflow cannot do without.
    pub fn require<'a>(&self, key: &str, value: &'a str) -> Result<&'a str> {
        if value.trim().is_empty() {
            return Err(Error::config_missing_key(key, self.source_display()));
        }
        Ok(value)
    }

    pub fn root_dir(&self) -> Result<PathBuf> {
        self.require("rootdir", &self.rootdir).map(PathBuf::from)
    }

    pub fn db_dir(&self) -> Result<PathBuf> {
        self.require("dbdir", &self.dbdir).map(PathBuf::from)
    }

    pub fn storage_dir(&self) -> Result<PathBuf> {
        self.require("storagedir", &self.storagedir).map(PathBuf::from)
    }

    pub fn nginx_dir(&self) -> Result<PathBuf> {
        self.require("nginxdir", &self.nginxdir).map(PathBuf::from)
    }

    pub fn fpm_dir(&self) -> Result<PathBuf> {
        self.require("fpmdir", &self.fpmdir).map(PathBuf::from)
    }

    pub fn pm2_dir(&self) -> Result<PathBuf> {
        self.require("server.pm2", &self.server.pm2).map(PathBuf::from)
    }

    /// Checkout directory of a virtual host.
    pub fn host_dir(&self, refslug: &str) -> Result<PathBuf> {
        Ok(self.root_dir()?.join(refslug))
    }

    /// Public host name, `<refslug>.<subdomain>`.
    pub fn server_name(&self, refslug: &str) -> String {
        let subdomain = self.subdomain.trim_start_matches('.');
        if subdomain.is_empty() {
            refslug.to_string()
        } else {
            format!("{}.{}", refslug, subdomain)
        }
    }

    pub fn protected_dirs(&self) -> Vec<String> {
        match &self.server.protected {
            Some(list) => list.clone(),
            None => DEFAULT_PROTECTED_DIRS.iter().map(|s| s.to_string()).collect(),
        }
    }
}
