//! Import the newest published dump into a virtual host's database.

use std::path::{Path, PathBuf};

use chrono::Local;
use serde::Serialize;

use crate::archive;
use crate::config::Config;
use crate::db::{self, DbCredentials, MysqlServer, SqlExecutor};
use crate::decompress;
use crate::error::Error;
use crate::files;
use crate::host::HostProfile;
use crate::io;
use crate::pipeline;
use crate::process::{self, CommandSpec};
use crate::slugify;
use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum DumpFormat {
    TarGz,
    SqlGz,
}

impl DumpFormat {
    pub fn from_path(path: &Path) -> Result<Self> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
            Ok(DumpFormat::TarGz)
        } else if name.ends_with(".gz") {
            Ok(DumpFormat::SqlGz)
        } else {
            Err(Error::validation_invalid_argument(
                "dump",
                "dump file must be a .tar.gz, .tgz or .sql.gz archive",
                Some(path.display().to_string()),
            ))
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StagedDump {
    pub source: PathBuf,
    pub format: DumpFormat,
    pub sql_file: PathBuf,
    pub bytes: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportResult {
    pub refslug: String,
    pub database: String,
    pub dump: StagedDump,
    pub salary_scrubbed: bool,
    pub cleaned: Vec<PathBuf>,
}

/// Newest `*.gz` under `storage_dir`, by path order, the same as
/// `find <dir> -type f -name '*.gz' | sort | tail -n 1`.
pub fn latest_dump(storage_dir: &Path) -> Result<PathBuf> {
    let stages = [
        CommandSpec::new("find").args([
            storage_dir.display().to_string(),
            "-type".to_string(),
            "f".to_string(),
            "-name".to_string(),
            "*.gz".to_string(),
        ]),
        CommandSpec::new("sort"),
        CommandSpec::new("tail").args(["-n", "1"]),
    ];

    let output = pipeline::run(&stages).into_result()?;
    let latest = output.stdout_lossy().trim().to_string();
    if latest.is_empty() {
        return Err(Error::validation_invalid_argument(
            "storagedir",
            "no dump archives found",
            Some(storage_dir.display().to_string()),
        )
        .with_hint("Run `vhosts dump` on the database server first"));
    }

    log::info!("Latest dump is {}", latest);
    Ok(PathBuf::from(latest))
}

/// Decode a local copy of a dump into `sql_file`.
pub fn unpack(local: &Path, sql_file: &Path) -> Result<StagedDump> {
    let format = DumpFormat::from_path(local)?;
    let bytes = match format {
        DumpFormat::TarGz => archive::extract_tar_gz(local, sql_file)?.bytes,
        DumpFormat::SqlGz => decompress::gunzip_file(local, sql_file)?,
    };

    Ok(StagedDump {
        source: local.to_path_buf(),
        format,
        sql_file: sql_file.to_path_buf(),
        bytes,
    })
}

/// Copy the newest dump into `dbdir` and unpack it next to the copy.
pub fn stage(config: &Config) -> Result<StagedDump> {
    let storage_dir = config.storage_dir()?;
    let db_dir = config.db_dir()?;

    let latest = latest_dump(&storage_dir)?;
    let file_name = latest
        .file_name()
        .ok_or_else(|| Error::internal_unexpected(format!("dump path {} has no file name", latest.display())))?;

    process::run(
        &CommandSpec::new("rsync")
            .args(["-P", "-t"])
            .arg(latest.display().to_string())
            .arg(format!("{}/", db_dir.display())),
    )?;

    let local = db_dir.join(file_name);
    let sql_file = db_dir.join(format!("dump_{}.sql", Local::now().format("%Y%m%d.%H%M%S")));
    let mut staged = unpack(&local, &sql_file)?;
    staged.source = latest;
    Ok(staged)
}

/// Feed `sql_file` to the `mysql` client for `database`.
pub fn load_sql(user: &str, database: &str, sql_file: &Path) -> Result<()> {
    process::run(
        &CommandSpec::new("mysql")
            .arg(format!("-u{}", user))
            .arg(database)
            .stdin_file(sql_file),
    )?;
    Ok(())
}

/// Remove `*.sql*` leftovers from `dbdir`.
pub fn clean_db_dir(db_dir: &Path) -> Result<Vec<PathBuf>> {
    let mut removed = Vec::new();
    for path in files::find_files(db_dir, "*.sql*")? {
        io::remove_path(&path)?;
        removed.push(path);
    }
    Ok(removed)
}

pub fn run_with<E: SqlExecutor + ?Sized>(
    config: &Config,
    refslug: &str,
    user: &str,
    profile: HostProfile,
    executor: &mut E,
) -> Result<ImportResult> {
    slugify::validate_refslug(refslug)?;
    let database = slugify::db_name(refslug);

    let staged = stage(config)?;

    db::run_statements(executor, &db::recreate_statements(&database))?;
    load_sql(user, &database, &staged.sql_file)?;

    let salary_scrubbed = profile == HostProfile::Laravel;
    if salary_scrubbed {
        db::run_statements(executor, &db::scrub_salary_statements(&database))?;
    }

    let cleaned = clean_db_dir(&config.db_dir()?)?;

    Ok(ImportResult {
        refslug: refslug.to_string(),
        database,
        dump: staged,
        salary_scrubbed,
        cleaned,
    })
}

pub fn run(config: &Config, refslug: &str, credentials: &DbCredentials) -> Result<ImportResult> {
    let profile = HostProfile::detect()?;
    let mut server = MysqlServer::connect(credentials)?;
    let result = run_with(config, refslug, &credentials.user, profile, &mut server);
    server.close();
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::fs::File;
    use std::io::Write;

    fn gzip(path: &Path, data: &[u8]) {
        let mut encoder = GzEncoder::new(File::create(path).unwrap(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap();
    }

    #[test]
    fn format_from_extension() {
        assert_eq!(
            DumpFormat::from_path(Path::new("/s/a_20240101.120000.tar.gz")).unwrap(),
            DumpFormat::TarGz
        );
        assert_eq!(DumpFormat::from_path(Path::new("a.tgz")).unwrap(), DumpFormat::TarGz);
        assert_eq!(
            DumpFormat::from_path(Path::new("a.sql.gz")).unwrap(),
            DumpFormat::SqlGz
        );
        assert!(DumpFormat::from_path(Path::new("a.sql")).is_err());
    }

    #[test]
    fn latest_dump_picks_last_sorted_path() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("2024")).unwrap();
        for name in [
            "2024/db_20240101.000000.sql.gz",
            "2024/db_20240301.000000.sql.gz",
            "2024/db_20240201.000000.sql.gz",
            "2024/notes.txt",
        ] {
            std::fs::write(dir.path().join(name), "").unwrap();
        }

        let latest = latest_dump(dir.path()).unwrap();
        assert_eq!(latest, dir.path().join("2024/db_20240301.000000.sql.gz"));
    }

    #[test]
    fn latest_dump_on_empty_storage_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = latest_dump(dir.path()).unwrap_err();
        assert_eq!(err.code.as_str(), "validation.invalid_argument");
    }

    #[test]
    fn unpack_sql_gz_appends_to_sql_file() {
        let dir = tempfile::tempdir().unwrap();
        let local = dir.path().join("db.sql.gz");
        gzip(&local, b"INSERT INTO t VALUES (1);\n");
        let sql_file = dir.path().join("dump.sql");

        let staged = unpack(&local, &sql_file).unwrap();

        assert_eq!(staged.format, DumpFormat::SqlGz);
        assert_eq!(staged.bytes, 26);
        assert_eq!(
            std::fs::read_to_string(&sql_file).unwrap(),
            "INSERT INTO t VALUES (1);\n"
        );
    }

    #[test]
    fn clean_db_dir_removes_sql_leftovers() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["db.sql.gz", "dump_1.sql", "keep.txt"] {
            std::fs::write(dir.path().join(name), "").unwrap();
        }

        let removed = clean_db_dir(dir.path()).unwrap();

        assert_eq!(removed.len(), 2);
        assert!(dir.path().join("keep.txt").exists());
    }
}
