//! Per-connection capture session and cursor interception.
//!
//! A [`CaptureSession`] owns exactly one driver connection for its whole
//! life: created on connect, destroyed on close. It intercepts the three
//! statement call shapes (single execute, batched execute, stored-procedure
//! call), builds one event per logical statement, and routes events through
//! the transaction buffer or straight to the publisher according to policy.
//!
//! Interception is strictly observational: the delegated call always runs,
//! its error is always re-raised, and nothing the capture layer does can
//! fail the instrumented application. The session itself needs no locking —
//! a cursor borrows it mutably, which pins each session to one caller at a
//! time.

use crate::buffer::TransactionBuffer;
use crate::config::Settings;
use crate::driver::{Connection, Cursor, ProbeResult};
use crate::error::{Result, TapError};
use crate::pool;
use crate::publish::EventPublisher;
use chrono::Utc;
use sqltap_core::{
    classify, display_params, flags, parse_use_database, IsolationLevel, ParamValue,
    StatementEvent, StatementKind,
};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// Get the local hostname via the `hostname` command, falling back to
/// "unknown-host".
fn client_hostname() -> String {
    std::process::Command::new("hostname")
        .output()
        .ok()
        .filter(|o| o.status.success())
        .map(|o| String::from_utf8_lossy(&o.stdout).trim().to_owned())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "unknown-host".to_owned())
}

/// Fold a probe outcome into a field value and a failure bit.
fn fold_probe<T>(result: ProbeResult<T>, bit: u32, probe_flags: &mut u32, what: &str) -> Option<T> {
    match result {
        Ok(value) => value,
        Err(e) => {
            debug!("{what} probe failed: {e}");
            *probe_flags |= bit;
            None
        }
    }
}

/// Everything known about one finished driver call, before it becomes
/// events.
struct StatementOutcome<'a> {
    sql: &'a str,
    params: Option<&'a ParamValue>,
    timestamp_ms: i64,
    duration_ns: u64,
    update_count: Option<i64>,
    server_info: Option<String>,
    error: Option<&'a TapError>,
    force_capture: bool,
    extra_iflags: u32,
}

/// Per-connection capture state machine.
pub struct CaptureSession<C: Connection> {
    conn: C,
    publisher: Arc<dyn EventPublisher>,
    settings: Settings,
    buffer: TransactionBuffer,

    execution_count: u64,
    db_name: Option<String>,
    stmt_db_name: Option<String>,

    user: Option<String>,
    client: String,
    server_host: Option<String>,
    server_version: Option<String>,
    connection_id: Option<u64>,
    default_tz: Option<String>,
    server_tz: Option<String>,
    isolation_lvl: Option<IsolationLevel>,
    client_flags: Option<u32>,
    cached_server_flags: Option<u32>,
    /// Connect-time probe failure bits, fixed for the session's life.
    probe_flags: u32,
}

impl<C: Connection> CaptureSession<C> {
    /// Open a session over a freshly connected driver connection.
    ///
    /// Runs the connect-time metadata probes once, best-effort: a failed
    /// probe sets its flag bit and leaves the field empty. Never fails.
    pub async fn open(
        mut conn: C,
        publisher: Arc<dyn EventPublisher>,
        settings: Settings,
    ) -> Self {
        pool::increment();

        let mut probe_flags = 0u32;

        let server_host = fold_probe(
            conn.server_host().await,
            flags::ERR_SERVER_HOST,
            &mut probe_flags,
            "server host",
        );
        let server_version = fold_probe(
            conn.server_version().await,
            flags::ERR_SERVER_VERSION,
            &mut probe_flags,
            "server version",
        );
        let connection_id = fold_probe(
            conn.connection_id().await,
            flags::ERR_CONNECTION_ID,
            &mut probe_flags,
            "connection id",
        );
        let server_tz = fold_probe(
            conn.session_time_zone().await,
            flags::ERR_SERVER_TZ,
            &mut probe_flags,
            "session timezone",
        );
        let isolation_lvl = fold_probe(
            conn.isolation_level().await,
            flags::ERR_ISOLATION,
            &mut probe_flags,
            "isolation level",
        )
        .and_then(|raw| IsolationLevel::parse(&raw));
        let client_flags = fold_probe(
            conn.client_flags().await,
            flags::ERR_CLIENT_FLAGS,
            &mut probe_flags,
            "client flags",
        );

        let default_tz = Some(chrono::Local::now().offset().to_string());
        let db_name = conn.database();

        Self {
            user: conn.user(),
            client: client_hostname(),
            stmt_db_name: db_name.clone(),
            db_name,
            conn,
            publisher,
            settings,
            buffer: TransactionBuffer::new(),
            execution_count: 0,
            server_host,
            server_version,
            connection_id,
            default_tz,
            server_tz,
            isolation_lvl,
            client_flags,
            cached_server_flags: None,
            probe_flags,
        }
    }

    /// Open an intercepting cursor. The cursor borrows the session, so
    /// transaction control waits until the cursor is dropped.
    pub async fn cursor(&mut self) -> Result<CaptureCursor<'_, C>> {
        let cursor = self.conn.cursor().await?;
        Ok(CaptureCursor {
            cursor,
            session: self,
        })
    }

    /// Commit the open transaction, then hand the buffered events to the
    /// publisher as one ordered batch.
    pub async fn commit(&mut self) -> Result<()> {
        self.conn.commit().await?;
        self.flush_on_commit().await;
        Ok(())
    }

    /// Roll back the open transaction and discard buffered events without
    /// delivering them.
    pub async fn rollback(&mut self) -> Result<()> {
        self.conn.rollback().await?;
        self.buffer.clear();
        Ok(())
    }

    /// Close the session and the underlying connection.
    pub async fn close(mut self) -> Result<()> {
        if !self.settings.buffer_until_commit {
            if let Err(e) = self.publisher.flush().await {
                debug!("publisher flush during close failed: {e}");
            }
        }
        pool::decrement();
        self.conn.close().await
    }

    /// Per-connection execution counter.
    pub fn execution_count(&self) -> u64 {
        self.execution_count
    }

    /// Database currently tracked across `USE` statements.
    pub fn statement_database(&self) -> Option<&str> {
        self.stmt_db_name.as_deref()
    }

    /// Server-side connection id, when probed successfully.
    pub fn connection_id(&self) -> Option<u64> {
        self.connection_id
    }

    /// Number of events staged for the open transaction.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Settings this session runs with.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    fn apply_inline_debug(&self, sql: &str) -> String {
        if !self.settings.inline_debug {
            return sql.to_string();
        }
        let tag = self
            .settings
            .inline_debug_tag
            .as_deref()
            .unwrap_or(&self.settings.service_name);
        let id = self
            .connection_id
            .map(|v| v.to_string())
            .unwrap_or_else(|| "unknown".to_string());
        let user = self.user.as_deref().unwrap_or("unknown");
        format!(
            "/* Id [{id}] User [{user}] Client [{}] Count [{}] Debug [{tag}] */\n{sql}",
            self.client,
            self.execution_count + 1,
        )
    }

    fn should_capture(&self, sql: &str, force: bool) -> bool {
        if self.settings.capture_all {
            return true;
        }
        match classify(sql) {
            StatementKind::Use | StatementKind::Write => true,
            StatementKind::Call => self.settings.capture_callproc || force,
            StatementKind::Ddl => self.settings.capture_ddl || force,
            StatementKind::Other => force,
        }
    }

    fn track_statement_database(&mut self, sql: &str) {
        if classify(sql) != StatementKind::Use {
            return;
        }
        if let Some(db) = parse_use_database(sql) {
            self.stmt_db_name = Some(db);
        }
    }

    /// Protocol/driver bits, connect-time probe bits, and a fresh
    /// server-flags probe (re-taken per statement, cached for the event).
    async fn base_iflags(&mut self) -> u32 {
        let mut iflags = flags::PROTOCOL_V8 | self.conn.driver_flags() | self.probe_flags;
        match self.conn.server_flags().await {
            Ok(value) => self.cached_server_flags = value,
            Err(e) => {
                debug!("server flags probe failed: {e}");
                self.cached_server_flags = None;
                iflags |= flags::ERR_SERVER_FLAGS;
            }
        }
        iflags
    }

    fn build_event(
        &self,
        outcome: &StatementOutcome<'_>,
        iflags: u32,
        execution_count: u64,
        query_params: Option<Vec<String>>,
        is_last: bool,
    ) -> StatementEvent {
        StatementEvent {
            timestamp: outcome.timestamp_ms,
            server_host: self.server_host.clone(),
            server_version: self.server_version.clone(),
            user: self.user.clone(),
            client: Some(self.client.clone()),
            db_name: self.db_name.clone(),
            stmt_db_name: self.stmt_db_name.clone().or_else(|| self.db_name.clone()),
            debug: self.settings.inline_debug_tag.clone(),
            connection_id: self.connection_id,
            total_pool_count: Some(pool::current()),
            execution_count: Some(execution_count),
            duration_ns: is_last.then_some(outcome.duration_ns),
            server_flags: self.cached_server_flags,
            client_flags: self.client_flags,
            i_flags: iflags,
            default_tz: self.default_tz.clone(),
            server_tz: self.server_tz.clone(),
            isolation_lvl: self.isolation_lvl,
            update_count: if is_last { outcome.update_count } else { None },
            sql: self
                .settings
                .include_sql
                .then(|| outcome.sql.to_string()),
            query_params,
            error_message: outcome.error.map(|e| e.to_string()),
            server_info: if is_last {
                outcome.server_info.clone()
            } else {
                None
            },
        }
    }

    async fn route(&mut self, event: StatementEvent, errored: bool) {
        // A failed statement may never see a commit, so it skips the
        // buffer no matter the policy.
        if errored || !self.settings.buffer_until_commit {
            self.publish_best_effort(event).await;
        } else {
            self.buffer.push(event);
        }
    }

    async fn after_statement(&mut self, outcome: StatementOutcome<'_>) {
        self.execution_count += 1;
        self.track_statement_database(outcome.sql);

        if !self.should_capture(outcome.sql, outcome.force_capture) {
            return;
        }

        let iflags = self.base_iflags().await | outcome.extra_iflags;
        let query_params = if self.settings.include_params {
            display_params(outcome.params, &self.settings.redaction)
        } else {
            None
        };

        let event = self.build_event(&outcome, iflags, self.execution_count, query_params, true);
        let errored = outcome.error.is_some();
        self.route(event, errored).await;
    }

    async fn after_execute_many(
        &mut self,
        outcome: StatementOutcome<'_>,
        recorded_params: Vec<Option<Vec<String>>>,
    ) {
        self.track_statement_database(outcome.sql);

        let n = recorded_params.len();
        if !self.should_capture(outcome.sql, outcome.force_capture) {
            self.execution_count += n as u64;
            return;
        }

        let iflags = self.base_iflags().await | outcome.extra_iflags;
        let errored = outcome.error.is_some();

        for (i, recorded) in recorded_params.into_iter().enumerate() {
            self.execution_count += 1;
            let is_last = i == n - 1;
            let query_params = if self.settings.include_params {
                recorded
            } else {
                None
            };
            let event =
                self.build_event(&outcome, iflags, self.execution_count, query_params, is_last);
            self.route(event, errored).await;
        }
    }

    async fn publish_best_effort(&self, event: StatementEvent) {
        if let Err(e) = self.publisher.publish(event).await {
            debug!("event publish failed: {e}");
        }
    }

    async fn flush_on_commit(&mut self) {
        let events = self.buffer.drain();
        if events.is_empty() {
            return;
        }
        if let Err(e) = self.publisher.publish_batch(events.clone()).await {
            warn!("batch publish failed, falling back to per-event delivery: {e}");
            for event in events {
                self.publish_best_effort(event).await;
            }
        }
    }
}

/// Intercepting cursor produced by [`CaptureSession::cursor`].
pub struct CaptureCursor<'a, C: Connection> {
    cursor: C::Cursor,
    session: &'a mut CaptureSession<C>,
}

impl<C: Connection> CaptureCursor<'_, C> {
    /// Execute one statement, capturing one event.
    pub async fn execute(&mut self, sql: &str, params: Option<&ParamValue>) -> Result<()> {
        let sql = self.session.apply_inline_debug(sql);

        let start = Instant::now();
        let result = self.cursor.execute(&sql, params).await;
        let (timestamp_ms, duration_ns) = finish_timing(start);

        let (server_info, info_flag) = extract_server_info(&self.cursor);
        let outcome = StatementOutcome {
            sql: &sql,
            params,
            timestamp_ms,
            duration_ns,
            update_count: self.cursor.row_count(),
            server_info,
            error: result.as_ref().err(),
            force_capture: false,
            extra_iflags: info_flag,
        };
        self.session.after_statement(outcome).await;

        result
    }

    /// Execute one statement once per parameter set, capturing one event
    /// per set. Only the last event carries duration, update count, and
    /// server info — per-set timing inside one driver call is not
    /// observable.
    pub async fn execute_many(&mut self, sql: &str, param_sets: &[ParamValue]) -> Result<()> {
        let sql = self.session.apply_inline_debug(sql);

        // Project parameters before delegation; the driver may consume
        // them destructively.
        let recorded: Vec<Option<Vec<String>>> = param_sets
            .iter()
            .map(|set| display_params(Some(set), &self.session.settings.redaction))
            .collect();

        let start = Instant::now();
        let result = self.cursor.execute_many(&sql, param_sets).await;
        let (timestamp_ms, duration_ns) = finish_timing(start);

        let (server_info, info_flag) = extract_server_info(&self.cursor);
        let outcome = StatementOutcome {
            sql: &sql,
            params: None,
            timestamp_ms,
            duration_ns,
            update_count: self.cursor.row_count(),
            server_info,
            error: result.as_ref().err(),
            force_capture: false,
            extra_iflags: info_flag,
        };
        self.session.after_execute_many(outcome, recorded).await;

        result
    }

    /// Call a stored procedure, capturing one event. Always captured,
    /// independent of the selective-capture policy.
    pub async fn call_proc(&mut self, name: &str, params: Option<&ParamValue>) -> Result<()> {
        let sql = self.session.apply_inline_debug(&format!("CALL {name}"));

        let start = Instant::now();
        let result = self.cursor.call_proc(name, params).await;
        let (timestamp_ms, duration_ns) = finish_timing(start);

        let (server_info, info_flag) = extract_server_info(&self.cursor);
        let outcome = StatementOutcome {
            sql: &sql,
            params,
            timestamp_ms,
            duration_ns,
            update_count: self.cursor.row_count(),
            server_info,
            error: result.as_ref().err(),
            force_capture: true,
            extra_iflags: info_flag,
        };
        self.session.after_statement(outcome).await;

        result
    }

    /// Affected/returned row count of the last call, when known.
    pub fn row_count(&self) -> Option<i64> {
        self.cursor.row_count()
    }

    /// Close the underlying cursor.
    pub async fn close(mut self) -> Result<()> {
        self.cursor.close().await
    }
}

/// Duration at nanosecond resolution plus the derived wall-clock start:
/// end minus duration.
fn finish_timing(start: Instant) -> (i64, u64) {
    let duration_ns = start.elapsed().as_nanos() as u64;
    let end_ms = Utc::now().timestamp_millis();
    let timestamp_ms = end_ms - (duration_ns / 1_000_000) as i64;
    (timestamp_ms, duration_ns)
}

fn extract_server_info<Cur: Cursor>(cursor: &Cur) -> (Option<String>, u32) {
    match cursor.server_info() {
        Ok(info) => (info, 0),
        Err(e) => {
            debug!("server info extraction failed: {e}");
            (None, flags::ERR_SERVER_INFO)
        }
    }
}
