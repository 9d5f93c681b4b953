//! MySQL/MariaDB adapter over `mysql_async` (feature `mysql`).
//!
//! Implements the driver capability for MySQL. Connect arguments are an
//! explicit, enumerated configuration structure — no positional/keyword
//! guessing. Metadata probes run the same statements an operator would:
//! `SELECT VERSION()`, `SELECT @@session.time_zone`,
//! `SELECT @@transaction_isolation`.

use crate::driver::{Connection, Cursor, ProbeError, ProbeResult};
use crate::error::{Result, TapError};
use async_trait::async_trait;
use mysql_async::prelude::*;
use mysql_async::{Conn, OptsBuilder, Params};
use sqltap_core::{flags, ParamValue};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Connect configuration for the MySQL adapter.
#[derive(Debug, Clone)]
pub struct MysqlConnectConfig {
    /// Server hostname or IP.
    pub host: String,
    /// Server TCP port.
    pub port: u16,
    /// Username.
    pub user: Option<String>,
    /// Password.
    pub password: Option<String>,
    /// Initial database.
    pub database: Option<String>,
}

impl Default for MysqlConnectConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 3306,
            user: None,
            password: None,
            database: None,
        }
    }
}

impl MysqlConnectConfig {
    /// Target a specific host and port.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Self::default()
        }
    }

    /// Set the username.
    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    /// Set the password.
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Set the initial database.
    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }
}

/// Convert a parameter value to a MySQL wire value. Nested structures have
/// no MySQL representation and are stringified.
fn to_mysql_value(value: &ParamValue) -> mysql_async::Value {
    match value {
        ParamValue::Null => mysql_async::Value::NULL,
        ParamValue::Bool(b) => mysql_async::Value::from(*b),
        ParamValue::Int(n) => mysql_async::Value::from(*n),
        ParamValue::UInt(n) => mysql_async::Value::from(*n),
        ParamValue::Float(n) => mysql_async::Value::from(*n),
        ParamValue::Str(s) => mysql_async::Value::from(s.clone()),
        ParamValue::Bytes(b) => mysql_async::Value::from(b.clone()),
        nested @ (ParamValue::Seq(_) | ParamValue::Map(_)) => {
            mysql_async::Value::from(nested.to_string())
        }
    }
}

fn to_mysql_params(params: &ParamValue) -> Params {
    match params {
        ParamValue::Seq(items) => Params::Positional(items.iter().map(to_mysql_value).collect()),
        ParamValue::Map(entries) => Params::Named(
            entries
                .iter()
                .map(|(k, v)| (k.clone().into_bytes(), to_mysql_value(v)))
                .collect(),
        ),
        scalar => Params::Positional(vec![to_mysql_value(scalar)]),
    }
}

fn driver_err(e: mysql_async::Error) -> TapError {
    TapError::driver(e.to_string())
}

fn probe_err(e: mysql_async::Error) -> ProbeError {
    ProbeError::new(e.to_string())
}

type SharedConn = Arc<Mutex<Option<Conn>>>;

/// MySQL connection implementing the driver capability.
pub struct MysqlConnection {
    conn: SharedConn,
    host: String,
    port: u16,
    user: Option<String>,
    database: Option<String>,
}

impl MysqlConnection {
    /// Connect to a MySQL server.
    pub async fn connect(config: &MysqlConnectConfig) -> Result<Self> {
        let opts = OptsBuilder::default()
            .ip_or_hostname(config.host.clone())
            .tcp_port(config.port)
            .user(config.user.clone())
            .pass(config.password.clone())
            .db_name(config.database.clone());

        let conn = Conn::new(opts)
            .await
            .map_err(|e| TapError::driver(format!("failed to connect to MySQL: {e}")))?;

        Ok(Self {
            conn: Arc::new(Mutex::new(Some(conn))),
            host: config.host.clone(),
            port: config.port,
            user: config.user.clone(),
            database: config.database.clone(),
        })
    }

    async fn probe_first(&mut self, query: &str) -> ProbeResult<String> {
        let mut guard = self.conn.lock().await;
        let conn = guard
            .as_mut()
            .ok_or_else(|| ProbeError::new("connection closed"))?;
        conn.query_first::<String, _>(query)
            .await
            .map_err(probe_err)
    }
}

#[async_trait]
impl Connection for MysqlConnection {
    type Cursor = MysqlCursor;

    async fn cursor(&mut self) -> Result<Self::Cursor> {
        Ok(MysqlCursor {
            conn: Arc::clone(&self.conn),
            row_count: None,
        })
    }

    async fn commit(&mut self) -> Result<()> {
        let mut guard = self.conn.lock().await;
        let conn = guard
            .as_mut()
            .ok_or_else(|| TapError::driver("connection closed"))?;
        conn.query_drop("COMMIT").await.map_err(driver_err)
    }

    async fn rollback(&mut self) -> Result<()> {
        let mut guard = self.conn.lock().await;
        let conn = guard
            .as_mut()
            .ok_or_else(|| TapError::driver("connection closed"))?;
        conn.query_drop("ROLLBACK").await.map_err(driver_err)
    }

    async fn close(&mut self) -> Result<()> {
        let conn = self.conn.lock().await.take();
        match conn {
            Some(conn) => conn.disconnect().await.map_err(driver_err),
            None => Ok(()),
        }
    }

    fn driver_flags(&self) -> u32 {
        flags::DRIVER_MYSQL
    }

    fn user(&self) -> Option<String> {
        self.user.clone()
    }

    fn database(&self) -> Option<String> {
        self.database.clone()
    }

    async fn server_host(&mut self) -> ProbeResult<String> {
        Ok(Some(format!("{}:{}", self.host, self.port)))
    }

    async fn server_version(&mut self) -> ProbeResult<String> {
        self.probe_first("SELECT VERSION()").await
    }

    async fn connection_id(&mut self) -> ProbeResult<u64> {
        let guard = self.conn.lock().await;
        let conn = guard
            .as_ref()
            .ok_or_else(|| ProbeError::new("connection closed"))?;
        Ok(Some(conn.id() as u64))
    }

    async fn session_time_zone(&mut self) -> ProbeResult<String> {
        self.probe_first("SELECT @@session.time_zone").await
    }

    async fn isolation_level(&mut self) -> ProbeResult<String> {
        self.probe_first("SELECT @@transaction_isolation").await
    }

    async fn client_flags(&mut self) -> ProbeResult<u32> {
        // mysql_async does not expose the negotiated capability flags.
        Ok(None)
    }

    async fn server_flags(&mut self) -> ProbeResult<u32> {
        // Status flags ride on OK packets the driver keeps to itself.
        Ok(None)
    }
}

/// MySQL statement cursor.
pub struct MysqlCursor {
    conn: SharedConn,
    row_count: Option<i64>,
}

impl MysqlCursor {
    fn placeholders(params: &ParamValue) -> String {
        match params {
            ParamValue::Seq(items) => vec!["?"; items.len()].join(", "),
            ParamValue::Map(entries) => entries
                .iter()
                .map(|(k, _)| format!(":{k}"))
                .collect::<Vec<_>>()
                .join(", "),
            _ => "?".to_string(),
        }
    }
}

#[async_trait]
impl Cursor for MysqlCursor {
    async fn execute(&mut self, sql: &str, params: Option<&ParamValue>) -> Result<()> {
        let mut guard = self.conn.lock().await;
        let conn = guard
            .as_mut()
            .ok_or_else(|| TapError::driver("connection closed"))?;

        match params {
            Some(p) => conn.exec_drop(sql, to_mysql_params(p)).await,
            None => conn.query_drop(sql).await,
        }
        .map_err(driver_err)?;

        self.row_count = Some(conn.affected_rows() as i64);
        Ok(())
    }

    async fn execute_many(&mut self, sql: &str, param_sets: &[ParamValue]) -> Result<()> {
        let mut guard = self.conn.lock().await;
        let conn = guard
            .as_mut()
            .ok_or_else(|| TapError::driver("connection closed"))?;

        let mut total: i64 = 0;
        for set in param_sets {
            conn.exec_drop(sql, to_mysql_params(set))
                .await
                .map_err(driver_err)?;
            total += conn.affected_rows() as i64;
        }
        self.row_count = Some(total);
        Ok(())
    }

    async fn call_proc(&mut self, name: &str, params: Option<&ParamValue>) -> Result<()> {
        let mut guard = self.conn.lock().await;
        let conn = guard
            .as_mut()
            .ok_or_else(|| TapError::driver("connection closed"))?;

        match params {
            Some(p) => {
                let call = format!("CALL {name}({})", Self::placeholders(p));
                conn.exec_drop(call, to_mysql_params(p)).await
            }
            None => conn.query_drop(format!("CALL {name}()")).await,
        }
        .map_err(driver_err)?;

        self.row_count = Some(conn.affected_rows() as i64);
        Ok(())
    }

    fn row_count(&self) -> Option<i64> {
        self.row_count
    }

    fn server_info(&self) -> ProbeResult<String> {
        // The OK-packet info string is not exposed by mysql_async.
        Ok(None)
    }

    async fn close(&mut self) -> Result<()> {
        Ok(())
    }
}
