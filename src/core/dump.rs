//! Database dump job: mysqldump into a (gzipped) file, rotate old dumps,
//! publish the backup directory to storage.

use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::thread;
use std::time::{Duration, SystemTime};

use chrono::{DateTime, Local};
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::Serialize;

use crate::error::{CommandFailedDetails, Error};
use crate::host;
use crate::process::{self, exit_code_of, CommandSpec};
use crate::Result;

pub const DEFAULT_BACKUP_DIR: &str = "/opt/backup/db";
pub const DEFAULT_STORAGE_DIR: &str = "/mnt/backup";
pub const DEFAULT_RETENTION_DAYS: u64 = 14;

const ROTATE_PATTERN: &str = "*.sql.gz";
const SECONDS_PER_DAY: u64 = 24 * 60 * 60;

#[derive(Debug, Clone)]
pub struct DumpOptions {
    pub user: String,
    pub host: String,
    pub database: Option<String>,
    pub all_databases: bool,
    pub backup_dir: PathBuf,
    pub storage_dir: PathBuf,
    pub gzip: bool,
    pub retention_days: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DumpResult {
    pub file: PathBuf,
    pub bytes: u64,
    pub rotated: Vec<PathBuf>,
    pub storage_dir: PathBuf,
}

/// `<db or hostname>_<YYYYmmdd.HHMMSS>.sql`, plus `.gz` when compressed.
pub fn dump_filename(prefix: &str, now: &DateTime<Local>, gzip: bool) -> String {
    let mut name = format!("{}_{}.sql", prefix, now.format("%Y%m%d.%H%M%S"));
    if gzip {
        name.push_str(".gz");
    }
    name
}

pub fn mysqldump_command(opts: &DumpOptions) -> Result<CommandSpec> {
    let spec = CommandSpec::new("mysqldump")
        .arg(format!("-u{}", opts.user))
        .arg(format!("-h{}", opts.host))
        .arg("--single-transaction");

    if opts.all_databases {
        return Ok(spec.arg("--all-databases"));
    }

    match opts.database.as_deref().filter(|d| !d.is_empty()) {
        Some(db) => Ok(spec.arg(db)),
        None => Err(Error::validation_missing_argument(vec!["db".to_string()])
            .with_hint("Pass --db <name> or --db-all")),
    }
}

pub fn rsync_command(backup_dir: &Path, storage_dir: &Path) -> CommandSpec {
    CommandSpec::new("rsync").args([
        "-avpz".to_string(),
        "--progress".to_string(),
        "--stats".to_string(),
        "--delete".to_string(),
        format!("{}/", backup_dir.display()),
        format!("{}/", storage_dir.display()),
    ])
}

/// Stream the command's stdout into `destination`, gzip-compressed when
/// `gzip` is set. Returns the size of the written file.
///
/// Output goes to `<destination>.part` first and is renamed into place only
/// once the command exits zero, so a failed dump leaves no file behind.
pub fn write_command_output(spec: &CommandSpec, destination: &Path, gzip: bool) -> Result<u64> {
    let command_line = spec.display();
    log::info!("run command: {} > {}", command_line, destination.display());

    let partial = partial_path(destination);
    if let Err(err) = stream_to_file(spec, &command_line, &partial, gzip) {
        discard_partial(&partial);
        return Err(err);
    }

    if let Err(e) = fs::rename(&partial, destination) {
        discard_partial(&partial);
        return Err(Error::internal_io(
            e.to_string(),
            Some(format!("rename {}", partial.display())),
        ));
    }

    let bytes = fs::metadata(destination)
        .map(|m| m.len())
        .map_err(|e| Error::internal_io(e.to_string(), Some("stat dump".to_string())))?;
    log::info!("Dump file {} created ({} bytes)", destination.display(), bytes);
    Ok(bytes)
}

fn partial_path(destination: &Path) -> PathBuf {
    let mut name = destination
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".part");
    destination.with_file_name(name)
}

fn discard_partial(partial: &Path) {
    match fs::remove_file(partial) {
        Ok(()) => log::warn!("Removed incomplete dump {}", partial.display()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => log::warn!("Could not remove {}: {}", partial.display(), e),
    }
}

fn stream_to_file(spec: &CommandSpec, command_line: &str, path: &Path, gzip: bool) -> Result<()> {
    let file = File::create(path).map_err(|e| {
        Error::internal_io(e.to_string(), Some(format!("create {}", path.display())))
    })?;

    let mut child = spec
        .to_command()
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| Error::command_spawn_failed(command_line, e.to_string()))?;

    let mut stdout = child
        .stdout
        .take()
        .ok_or_else(|| Error::internal_unexpected("child stdout not captured"))?;
    let stderr = child.stderr.take();

    let (copied, stderr_bytes) = thread::scope(|scope| {
        let stderr_reader = scope.spawn(move || {
            let mut bytes = Vec::new();
            if let Some(mut pipe) = stderr {
                if let Err(e) = pipe.read_to_end(&mut bytes) {
                    log::warn!("Reading stderr of {} failed: {}", command_line, e);
                }
            }
            bytes
        });

        let copied = copy_into(&mut stdout, file, gzip);
        drop(stdout);
        (copied, stderr_reader.join().unwrap_or_default())
    });

    let status = child
        .wait()
        .map_err(|e| Error::command_spawn_failed(command_line, e.to_string()))?;

    if !status.success() {
        return Err(Error::command_failed(CommandFailedDetails {
            command: command_line.to_string(),
            exit_code: exit_code_of(status),
            stdout: String::new(),
            stderr: String::from_utf8_lossy(&stderr_bytes).into_owned(),
        }));
    }

    copied.map_err(|e| Error::internal_io(e.to_string(), Some(format!("write {}", path.display()))))
}

fn copy_into(source: &mut impl Read, file: File, gzip: bool) -> io::Result<()> {
    if gzip {
        let mut encoder = GzEncoder::new(file, Compression::default());
        io::copy(source, &mut encoder)?;
        encoder.finish()?.sync_all()
    } else {
        let mut file = file;
        io::copy(source, &mut file)?;
        file.flush()
    }
}

/// Delete `*.sql.gz` files under `dir` last modified more than
/// `retention_days` before `now`.
pub fn rotate(dir: &Path, retention_days: u64, now: SystemTime) -> Result<Vec<PathBuf>> {
    let cutoff = now
        .checked_sub(Duration::from_secs(retention_days * SECONDS_PER_DAY))
        .unwrap_or(SystemTime::UNIX_EPOCH);

    let mut removed = Vec::new();
    for path in crate::files::find_files(dir, ROTATE_PATTERN)? {
        let modified = fs::metadata(&path)
            .and_then(|m| m.modified())
            .map_err(|e| Error::internal_io(e.to_string(), Some(format!("stat {}", path.display()))))?;

        if modified < cutoff {
            fs::remove_file(&path).map_err(|e| {
                Error::internal_io(e.to_string(), Some(format!("remove {}", path.display())))
            })?;
            log::info!("Rotated old dump {}", path.display());
            removed.push(path);
        }
    }
    Ok(removed)
}

pub fn run(opts: &DumpOptions) -> Result<DumpResult> {
    let spec = mysqldump_command(opts)?;

    let prefix = if opts.all_databases {
        let name = host::hostname()?;
        log::info!("Dumping all databases of {}", name);
        name
    } else {
        let db = opts.database.clone().unwrap_or_default();
        log::info!("Dumping database {}", db);
        db
    };

    let file = opts
        .backup_dir
        .join(dump_filename(&prefix, &Local::now(), opts.gzip));
    let bytes = write_command_output(&spec, &file, opts.gzip)?;

    let rotated = rotate(&opts.backup_dir, opts.retention_days, SystemTime::now())?;
    process::run(&rsync_command(&opts.backup_dir, &opts.storage_dir))?;

    log::info!("Dump of {} finished", prefix);
    Ok(DumpResult {
        file,
        bytes,
        rotated,
        storage_dir: opts.storage_dir.clone(),
    })
}
