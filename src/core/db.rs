//! MySQL administration for virtual host databases.
//!
//! Every virtual host owns one database and one user of the same name. The
//! statements that create and drop them are plain DDL strings; they are run
//! in order and the first failure stops the sequence, since a half-created
//! database must not be imported into.

use mysql_async::prelude::*;
use mysql_async::{Conn, Opts, OptsBuilder};
use serde::Serialize;
use tokio::runtime::Runtime;

use crate::error::Error;
use crate::Result;

pub const DEFAULT_PORT: u16 = 3306;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DbCredentials {
    pub user: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub hostname: String,
    pub port: u16,
    /// Default schema of the administrative connection.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
}

impl Default for DbCredentials {
    fn default() -> Self {
        Self {
            user: "root".to_string(),
            password: String::new(),
            hostname: "localhost".to_string(),
            port: DEFAULT_PORT,
            database: None,
        }
    }
}

/// Something that can run a single SQL statement and report affected rows.
pub trait SqlExecutor {
    fn execute(&mut self, sql: &str) -> Result<u64>;
}

/// Blocking MySQL connection, driven by a private single-threaded runtime.
pub struct MysqlServer {
    runtime: Runtime,
    conn: Option<Conn>,
}

impl MysqlServer {
    pub fn connect(credentials: &DbCredentials) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| Error::internal_io(e.to_string(), Some("start runtime".to_string())))?;

        let builder = OptsBuilder::default()
            .ip_or_hostname(credentials.hostname.clone())
            .tcp_port(credentials.port)
            .user(Some(credentials.user.clone()))
            .pass(Some(credentials.password.clone()))
            .db_name(credentials.database.clone().filter(|d| !d.is_empty()));
        let opts: Opts = builder.into();

        let conn = runtime.block_on(async {
            let mut conn = Conn::new(opts).await?;
            conn.ping().await?;
            Ok::<_, mysql_async::Error>(conn)
        });
        let conn = conn.map_err(|e| Error::database_connect_failed(e.to_string()))?;

        log::info!(
            "Connected to MySQL at {}:{} as {}",
            credentials.hostname,
            credentials.port,
            credentials.user
        );

        Ok(Self {
            runtime,
            conn: Some(conn),
        })
    }

    pub fn close(mut self) {
        if let Some(conn) = self.conn.take() {
            if let Err(e) = self.runtime.block_on(conn.disconnect()) {
                log::warn!("MySQL disconnect failed: {}", e);
            }
        }
    }
}

impl SqlExecutor for MysqlServer {
    fn execute(&mut self, sql: &str) -> Result<u64> {
        let conn = self
            .conn
            .as_mut()
            .ok_or_else(|| Error::database_connect_failed("connection already closed"))?;

        self.runtime
            .block_on(async {
                conn.query_drop(sql).await?;
                Ok::<_, mysql_async::Error>(conn.affected_rows())
            })
            .map_err(|e| Error::database_statement_failed(sql, e.to_string()))
    }
}

/// Run `statements` in order, stopping at the first failure.
pub fn run_statements<E: SqlExecutor + ?Sized>(executor: &mut E, statements: &[String]) -> Result<()> {
    for sql in statements {
        log::info!("MySQL: Running: {}", sql);
        match executor.execute(sql) {
            Ok(rows) => log::info!("Query OK, {} rows affected", rows),
            Err(err) => {
                log::error!("MySQL statement failed: {}: {}", sql, err.details["error"]);
                return Err(err);
            }
        }
    }
    Ok(())
}

pub fn drop_database(name: &str) -> String {
    format!("DROP DATABASE IF EXISTS {};", name)
}

pub fn create_database(name: &str) -> String {
    format!(
        "CREATE DATABASE {} CHARACTER SET utf8 collate utf8_unicode_ci;",
        name
    )
}

/// The host's user has the database name as user name and password.
pub fn grant_all(name: &str) -> String {
    format!(
        "GRANT ALL PRIVILEGES ON {name}.* TO '{name}'@'localhost' IDENTIFIED BY '{name}';"
    )
}

pub fn flush_privileges() -> String {
    "FLUSH PRIVILEGES;".to_string()
}

pub fn drop_user(name: &str) -> String {
    format!("DROP USER '{}'@'localhost';", name)
}

/// Fresh, empty database and user for an import.
pub fn recreate_statements(name: &str) -> Vec<String> {
    vec![
        drop_database(name),
        create_database(name),
        grant_all(name),
        flush_privileges(),
    ]
}

pub fn remove_statements(name: &str) -> Vec<String> {
    vec![drop_database(name), drop_user(name), flush_privileges()]
}

/// Replace personal salary data in an imported Laravel database.
pub fn scrub_salary_statements(name: &str) -> Vec<String> {
    vec![format!(
        "UPDATE {}.user_data SET salary = 10000, salary_proposed = 11000;",
        name
    )]
}
