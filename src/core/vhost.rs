//! Web-server and process-manager configuration for a virtual host.
//!
//! Each host gets an nginx server block, a php-fpm pool and, on intranet
//! hosts, a pm2 process file for the node backend. Files that already exist
//! are left untouched so re-running a pipeline never moves a host to new
//! ports.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::config::Config;
use crate::error::Error;
use crate::host::HostProfile;
use crate::io;
use crate::port;
use crate::process::{self, CommandSpec};
use crate::slugify;
use crate::template::{self, TemplateVars};
use crate::Result;

/// System user owning the pm2 daemon and the php-fpm pools.
pub const SERVICE_USER: &str = "user";
const SERVICE_UID: u32 = 1000;
const SERVICE_GID: u32 = 1000;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigFile {
    pub path: PathBuf,
    pub created: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigsResult {
    pub refslug: String,
    pub server_name: String,
    pub port_php: u16,
    pub port_node: u16,
    pub nginx: ConfigFile,
    pub fpm: ConfigFile,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pm2: Option<ConfigFile>,
    pub services_restarted: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Pm2File {
    pub apps: Vec<Pm2App>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Pm2App {
    pub exec_mode: String,
    pub script: String,
    pub args: Vec<String>,
    pub name: String,
    pub cwd: String,
    pub env: Pm2Env,
    pub error_file: String,
    pub out_file: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Pm2Env {
    #[serde(rename = "PORT")]
    pub port: u16,
    #[serde(rename = "NODE_ENV")]
    pub node_env: String,
}

pub fn pm2_file(refslug: &str, host_dir: &Path, port_node: u16) -> Pm2File {
    Pm2File {
        apps: vec![Pm2App {
            exec_mode: "fork_mode".to_string(),
            script: "tools/run.js".to_string(),
            args: vec!["start".to_string()],
            name: refslug.to_string(),
            cwd: host_dir.display().to_string(),
            env: Pm2Env {
                port: port_node,
                node_env: "development".to_string(),
            },
            error_file: format!("log/{}.err.log", refslug),
            out_file: format!("log/{}.out.log", refslug),
        }],
    }
}

/// php-fpm pool definition listening on `127.0.0.1:<port_php>`.
pub fn fpm_pool(refslug: &str, port_php: u16, profile: HostProfile) -> String {
    let mut pool = String::new();
    let _ = writeln!(pool, "[{}]", refslug);
    let _ = writeln!(pool, "listen = 127.0.0.1:{}", port_php);
    let _ = writeln!(pool, "user = {}", SERVICE_USER);
    pool.push_str(
        "pm = static\n\
         pm.max_children = 2\n\
         pm.max_requests = 500\n\
         request_terminate_timeout = 65m\n\
         php_admin_value[max_execution_time] = 300\n\
         php_admin_value[sendmail_path] = false\n",
    );
    if profile == HostProfile::Intranet {
        pool.push_str("php_admin_value[mbstring.func_overload] = 4\n");
    }
    pool
}

fn pm2(args: &[&str]) -> CommandSpec {
    CommandSpec::new("sudo")
        .args(["-u", SERVICE_USER, "pm2"])
        .args(args.iter().copied())
}

fn write_nginx(config: &Config, refslug: &str, port_php: u16, port_node: u16) -> Result<ConfigFile> {
    let path = config.nginx_dir()?.join(format!("{}.conf", refslug));
    if path.exists() {
        log::info!("Nginx configuration {} exists", path.display());
        return Ok(ConfigFile { path, created: false });
    }

    let template_path = config.require("server.nginxtmpl", &config.server.nginxtmpl)?;
    let server_name = config.server_name(refslug);
    let port_php = port_php.to_string();
    let port_node = port_node.to_string();
    template::render_file(
        Path::new(template_path),
        &path,
        &[
            (TemplateVars::SERVER_NAME, server_name.as_str()),
            (TemplateVars::PORT_PHP, port_php.as_str()),
            (TemplateVars::PORT_NODE, port_node.as_str()),
            (TemplateVars::REF_SLUG, refslug),
        ],
    )?;
    Ok(ConfigFile { path, created: true })
}

fn write_fpm(config: &Config, refslug: &str, port_php: u16, profile: HostProfile) -> Result<ConfigFile> {
    let path = config.fpm_dir()?.join(format!("{}.conf", refslug));
    if path.exists() {
        log::info!("Php-fpm configuration {} exists", path.display());
        return Ok(ConfigFile { path, created: false });
    }

    io::write_file(
        &path,
        &fpm_pool(refslug, port_php, profile),
        &format!("write {}", path.display()),
    )?;
    log::info!("Php-fpm configuration {} created", path.display());
    Ok(ConfigFile { path, created: true })
}

/// Write the pm2 file if missing and (re)start the process.
fn start_pm2(config: &Config, refslug: &str, port_node: u16) -> Result<ConfigFile> {
    let path = config.pm2_dir()?.join(format!("{}.json", refslug));
    let path_arg = path.display().to_string();

    if path.exists() {
        process::run(&pm2(&["describe", refslug]))?;
        // A process that is already gone is fine here.
        let deleted = process::execute(&pm2(&["delete", "-s", refslug]));
        if !deleted.success() {
            log::warn!("pm2 delete {} failed: {}", refslug, deleted.stderr.trim_end());
        }
        process::run(&pm2(&["start", &path_arg]))?;
        return Ok(ConfigFile { path, created: false });
    }

    let host_dir = config.host_dir(refslug)?;
    let file = pm2_file(refslug, &host_dir, port_node);
    io::write_json_pretty(&path, &file, &format!("write {}", path_arg))?;
    log::info!("PM2 configuration {} created", path_arg);

    std::os::unix::fs::chown(&path, Some(SERVICE_UID), Some(SERVICE_GID)).map_err(|e| {
        Error::internal_io(e.to_string(), Some(format!("chown {}", path_arg)))
    })?;

    process::run(&pm2(&["start", &path_arg]))?;
    Ok(ConfigFile { path, created: true })
}

pub fn restart_services() -> Result<()> {
    process::run(&CommandSpec::new("systemctl").args(["restart", "nginx", "php-fpm"]))?;
    Ok(())
}

pub fn run_with_profile(config: &Config, refslug: &str, profile: HostProfile) -> Result<ConfigsResult> {
    slugify::validate_refslug(refslug)?;

    let (port_php, port_node) = port::random_port_pair()?;

    let nginx = write_nginx(config, refslug, port_php, port_node)?;
    let fpm = write_fpm(config, refslug, port_php, profile)?;

    let services_restarted = fpm.created;
    if services_restarted {
        restart_services()?;
    }

    let pm2 = if profile.uses_pm2() {
        Some(start_pm2(config, refslug, port_node)?)
    } else {
        None
    };

    Ok(ConfigsResult {
        refslug: refslug.to_string(),
        server_name: config.server_name(refslug),
        port_php,
        port_node,
        nginx,
        fpm,
        pm2,
        services_restarted,
    })
}

pub fn run(config: &Config, refslug: &str) -> Result<ConfigsResult> {
    run_with_profile(config, refslug, HostProfile::detect()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_in(dir: &Path) -> Config {
        let nginx = dir.join("nginx");
        let fpm = dir.join("fpm");
        std::fs::create_dir_all(&nginx).unwrap();
        std::fs::create_dir_all(&fpm).unwrap();
        let template = dir.join("nginx.tmpl");
        std::fs::write(
            &template,
            "server_name {{ServerName}};\nfastcgi_pass 127.0.0.1:{{PortPhp}};\nproxy_pass http://127.0.0.1:{{PortNode}};\nroot /var/www/{{RefSlug}};\n",
        )
        .unwrap();

        let mut config = Config::default();
        config.rootdir = dir.join("www").display().to_string();
        config.nginxdir = nginx.display().to_string();
        config.fpmdir = fpm.display().to_string();
        config.subdomain = "dev.example.org".to_string();
        config.server.nginxtmpl = template.display().to_string();
        config
    }

    #[test]
    fn fpm_pool_lines() {
        let pool = fpm_pool("66-chuck", 8123, HostProfile::Plain);
        assert!(pool.starts_with("[66-chuck]\nlisten = 127.0.0.1:8123\nuser = user\npm = static\n"));
        assert!(pool.ends_with("php_admin_value[sendmail_path] = false\n"));
        assert!(!pool.contains("mbstring"));
    }

    #[test]
    fn intranet_pool_overloads_mbstring() {
        let pool = fpm_pool("x", 8123, HostProfile::Intranet);
        assert!(pool.ends_with("php_admin_value[mbstring.func_overload] = 4\n"));
    }

    #[test]
    fn pm2_file_json_shape() {
        let file = pm2_file("66-chuck", Path::new("/var/www/66-chuck"), 8500);
        let json = serde_json::to_value(&file).unwrap();
        let app = &json["apps"][0];

        assert_eq!(app["exec_mode"], "fork_mode");
        assert_eq!(app["script"], "tools/run.js");
        assert_eq!(app["args"][0], "start");
        assert_eq!(app["cwd"], "/var/www/66-chuck");
        assert_eq!(app["env"]["PORT"], 8500);
        assert_eq!(app["env"]["NODE_ENV"], "development");
        assert_eq!(app["error_file"], "log/66-chuck.err.log");
        assert_eq!(app["out_file"], "log/66-chuck.out.log");
    }

    #[test]
    fn nginx_config_rendered_from_template() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());

        let file = write_nginx(&config, "66-chuck", 8100, 8200).unwrap();

        assert!(file.created);
        let content = std::fs::read_to_string(&file.path).unwrap();
        assert!(content.contains("server_name 66-chuck.dev.example.org;"));
        assert!(content.contains("127.0.0.1:8100"));
        assert!(content.contains("127.0.0.1:8200"));
        assert!(content.contains("root /var/www/66-chuck;"));
    }

    #[test]
    fn existing_configs_are_kept() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        let nginx_path = dir.path().join("nginx/66-chuck.conf");
        let fpm_path = dir.path().join("fpm/66-chuck.conf");
        std::fs::write(&nginx_path, "custom").unwrap();
        std::fs::write(&fpm_path, "custom").unwrap();

        // No files created, so no service restart and no pm2 on a plain host.
        let result = run_with_profile(&config, "66-chuck", HostProfile::Plain).unwrap();

        assert!(!result.nginx.created);
        assert!(!result.fpm.created);
        assert!(!result.services_restarted);
        assert!(result.pm2.is_none());
        assert_eq!(std::fs::read_to_string(&nginx_path).unwrap(), "custom");
    }

    #[test]
    fn missing_template_key_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config_in(dir.path());
        config.server.nginxtmpl.clear();

        let err = write_nginx(&config, "x", 8100, 8200).unwrap_err();
        assert_eq!(err.details["key"], "server.nginxtmpl");
    }
}
