//! Scripted in-memory driver for exercising the capture pipeline without
//! a database.

#![allow(dead_code)]

use async_trait::async_trait;
use sqltap::driver::{Connection, Cursor, ProbeError, ProbeResult};
use sqltap::error::{Result, TapError};
use sqltap::{flags, ParamValue};
use std::sync::{Arc, Mutex};

/// Shared handles into a [`MockConnection`] and its cursors.
#[derive(Clone, Default)]
pub struct MockHandles {
    /// SQL delegated to the driver, in call order.
    pub executed: Arc<Mutex<Vec<String>>>,
    /// When set, the next cursor call fails with this message.
    pub fail_next: Arc<Mutex<Option<String>>>,
}

impl MockHandles {
    pub fn executed_sql(&self) -> Vec<String> {
        self.executed.lock().unwrap().clone()
    }

    pub fn fail_next_call(&self, message: &str) {
        *self.fail_next.lock().unwrap() = Some(message.to_string());
    }
}

pub struct MockConnection {
    user: Option<String>,
    database: Option<String>,
    fail_probes: bool,
    handles: MockHandles,
}

impl MockConnection {
    pub fn new() -> (Self, MockHandles) {
        let handles = MockHandles::default();
        (
            Self {
                user: Some("root".to_string()),
                database: Some("test".to_string()),
                fail_probes: false,
                handles: handles.clone(),
            },
            handles,
        )
    }

    /// Every metadata probe fails with a reason.
    pub fn with_failing_probes() -> (Self, MockHandles) {
        let (mut conn, handles) = Self::new();
        conn.fail_probes = true;
        (conn, handles)
    }

    fn probe<T>(&self, value: T) -> ProbeResult<T> {
        if self.fail_probes {
            Err(ProbeError::new("probe disabled"))
        } else {
            Ok(Some(value))
        }
    }
}

#[async_trait]
impl Connection for MockConnection {
    type Cursor = MockCursor;

    async fn cursor(&mut self) -> Result<MockCursor> {
        Ok(MockCursor {
            handles: self.handles.clone(),
            row_count: None,
        })
    }

    async fn commit(&mut self) -> Result<()> {
        Ok(())
    }

    async fn rollback(&mut self) -> Result<()> {
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        Ok(())
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
        self.probe("localhost:3306".to_string())
    }

    async fn server_version(&mut self) -> ProbeResult<String> {
        self.probe("8.0.36".to_string())
    }

    async fn connection_id(&mut self) -> ProbeResult<u64> {
        self.probe(7)
    }

    async fn session_time_zone(&mut self) -> ProbeResult<String> {
        self.probe("SYSTEM".to_string())
    }

    async fn isolation_level(&mut self) -> ProbeResult<String> {
        self.probe("REPEATABLE-READ".to_string())
    }

    async fn client_flags(&mut self) -> ProbeResult<u32> {
        self.probe(0)
    }

    async fn server_flags(&mut self) -> ProbeResult<u32> {
        self.probe(2)
    }
}

pub struct MockCursor {
    handles: MockHandles,
    row_count: Option<i64>,
}

impl MockCursor {
    fn take_failure(&self) -> Option<TapError> {
        self.handles
            .fail_next
            .lock()
            .unwrap()
            .take()
            .map(TapError::driver)
    }
}

#[async_trait]
impl Cursor for MockCursor {
    async fn execute(&mut self, sql: &str, _params: Option<&ParamValue>) -> Result<()> {
        self.handles.executed.lock().unwrap().push(sql.to_string());
        if let Some(err) = self.take_failure() {
            return Err(err);
        }
        self.row_count = Some(1);
        Ok(())
    }

    async fn execute_many(&mut self, sql: &str, param_sets: &[ParamValue]) -> Result<()> {
        self.handles.executed.lock().unwrap().push(sql.to_string());
        if let Some(err) = self.take_failure() {
            return Err(err);
        }
        self.row_count = Some(param_sets.len() as i64);
        Ok(())
    }

    async fn call_proc(&mut self, name: &str, _params: Option<&ParamValue>) -> Result<()> {
        self.handles
            .executed
            .lock()
            .unwrap()
            .push(format!("CALL {name}"));
        if let Some(err) = self.take_failure() {
            return Err(err);
        }
        self.row_count = Some(0);
        Ok(())
    }

    fn row_count(&self) -> Option<i64> {
        self.row_count
    }

    fn server_info(&self) -> ProbeResult<String> {
        Ok(Some(
            "Rows matched: 1  Changed: 1  Warnings: 0".to_string(),
        ))
    }

    async fn close(&mut self) -> Result<()> {
        Ok(())
    }
}
