//! End-to-end capture behavior over a scripted driver and in-memory sink.

mod common;

use common::MockConnection;
use sqltap::prelude::*;
use sqltap::{flags, Settings};
use std::sync::Arc;

async fn open_session(
    settings: Settings,
) -> (
    CaptureSession<MockConnection>,
    Arc<MemorySink>,
    common::MockHandles,
) {
    let (conn, handles) = MockConnection::new();
    let sink = Arc::new(MemorySink::new());
    let session = CaptureSession::open(conn, sink.clone(), settings).await;
    (session, sink, handles)
}

fn immediate_settings() -> Settings {
    Settings::default().with_buffer_until_commit(false)
}

#[tokio::test]
async fn test_single_execute_produces_one_event() {
    let (mut session, sink, _handles) = open_session(immediate_settings()).await;

    let mut cursor = session.cursor().await.unwrap();
    cursor
        .execute(
            "INSERT INTO t (a) VALUES (?)",
            Some(&ParamValue::seq([ParamValue::Int(1)])),
        )
        .await
        .unwrap();
    drop(cursor);

    let events = sink.events();
    assert_eq!(events.len(), 1);
    let event = &events[0];
    assert_eq!(event.execution_count, Some(1));
    assert_eq!(event.update_count, Some(1));
    assert!(event.duration_ns.is_some());
    assert_eq!(event.server_host.as_deref(), Some("localhost:3306"));
    assert_eq!(event.server_version.as_deref(), Some("8.0.36"));
    assert_eq!(event.connection_id, Some(7));
    assert_eq!(event.user.as_deref(), Some("root"));
    assert_eq!(event.db_name.as_deref(), Some("test"));
    assert_eq!(event.stmt_db_name.as_deref(), Some("test"));
    assert_eq!(event.sql.as_deref(), Some("INSERT INTO t (a) VALUES (?)"));
    assert_eq!(event.query_params.as_deref(), Some(&["1".to_string()][..]));
    assert!(event.error_message.is_none());
    assert!(flags::has(event.i_flags, flags::PROTOCOL_V8 | flags::DRIVER_MYSQL));

    session.close().await.unwrap();
}

#[tokio::test]
async fn test_batched_execute_emits_one_event_per_param_set() {
    let (mut session, sink, _handles) = open_session(immediate_settings()).await;

    let mut cursor = session.cursor().await.unwrap();
    cursor
        .execute_many(
            "INSERT INTO t (a) VALUES (?)",
            &[
                ParamValue::seq([ParamValue::Int(1)]),
                ParamValue::seq([ParamValue::Int(2)]),
                ParamValue::seq([ParamValue::Int(3)]),
            ],
        )
        .await
        .unwrap();
    drop(cursor);

    let events = sink.events();
    assert_eq!(events.len(), 3);

    // all but the last: no duration, no update count, no server info
    for event in &events[..2] {
        assert!(event.duration_ns.is_none());
        assert!(event.update_count.is_none());
        assert!(event.server_info.is_none());
    }

    // the last carries the aggregates
    let last = &events[2];
    assert!(last.duration_ns.is_some());
    assert_eq!(last.update_count, Some(3));
    assert!(last.server_info.is_some());

    // strictly increasing execution counter, one tick per set
    let counts: Vec<_> = events.iter().map(|e| e.execution_count).collect();
    assert_eq!(counts, [Some(1), Some(2), Some(3)]);

    // per-set parameters
    assert_eq!(events[0].query_params.as_deref(), Some(&["1".to_string()][..]));
    assert_eq!(events[1].query_params.as_deref(), Some(&["2".to_string()][..]));
    assert_eq!(events[2].query_params.as_deref(), Some(&["3".to_string()][..]));

    session.close().await.unwrap();
}

#[tokio::test]
async fn test_rollback_discards_buffered_events() {
    let (mut session, sink, _handles) = open_session(Settings::default()).await;

    let mut cursor = session.cursor().await.unwrap();
    cursor.execute("INSERT INTO t VALUES (1)", None).await.unwrap();
    cursor.execute("INSERT INTO t VALUES (2)", None).await.unwrap();
    drop(cursor);
    assert_eq!(session.buffered(), 2);

    session.rollback().await.unwrap();
    assert_eq!(session.buffered(), 0);
    assert!(sink.is_empty());

    // a later commit has nothing left to deliver
    session.commit().await.unwrap();
    assert!(sink.is_empty());

    session.close().await.unwrap();
}

#[tokio::test]
async fn test_commit_delivers_buffer_as_one_ordered_batch() {
    let (mut session, sink, _handles) = open_session(Settings::default()).await;

    let mut cursor = session.cursor().await.unwrap();
    for i in 1..=3 {
        cursor
            .execute(&format!("INSERT INTO t VALUES ({i})"), None)
            .await
            .unwrap();
    }
    drop(cursor);
    assert!(sink.is_empty());

    session.commit().await.unwrap();

    assert_eq!(sink.batch_sizes(), [3]);
    let counts: Vec<_> = sink.events().iter().map(|e| e.execution_count).collect();
    assert_eq!(counts, [Some(1), Some(2), Some(3)]);

    session.close().await.unwrap();
}

#[tokio::test]
async fn test_commit_falls_back_to_per_event_delivery() {
    let (mut session, sink, _handles) = open_session(Settings::default()).await;
    sink.fail_batches(true);

    let mut cursor = session.cursor().await.unwrap();
    cursor.execute("INSERT INTO t VALUES (1)", None).await.unwrap();
    cursor.execute("INSERT INTO t VALUES (2)", None).await.unwrap();
    drop(cursor);

    session.commit().await.unwrap();

    // no successful batch hand-off, but every event arrived, in order
    assert!(sink.batch_sizes().is_empty());
    let counts: Vec<_> = sink.events().iter().map(|e| e.execution_count).collect();
    assert_eq!(counts, [Some(1), Some(2)]);

    session.close().await.unwrap();
}

#[tokio::test]
async fn test_failed_statement_publishes_immediately_and_reraises() {
    let (mut session, sink, handles) = open_session(Settings::default()).await;

    let mut cursor = session.cursor().await.unwrap();
    handles.fail_next_call("1062: duplicate entry");
    let err = cursor
        .execute("INSERT INTO t VALUES (1)", None)
        .await
        .unwrap_err();
    assert!(err.is_driver());
    drop(cursor);

    // bypasses the transaction buffer entirely
    assert_eq!(session.buffered(), 0);
    let events = sink.events();
    assert_eq!(events.len(), 1);
    let message = events[0].error_message.as_deref().unwrap();
    assert!(message.contains("1062: duplicate entry"));

    session.close().await.unwrap();
}

#[tokio::test]
async fn test_failed_batch_publishes_every_record_immediately() {
    let (mut session, sink, handles) = open_session(Settings::default()).await;

    let mut cursor = session.cursor().await.unwrap();
    handles.fail_next_call("server has gone away");
    let err = cursor
        .execute_many(
            "INSERT INTO t VALUES (?)",
            &[
                ParamValue::seq([ParamValue::Int(1)]),
                ParamValue::seq([ParamValue::Int(2)]),
            ],
        )
        .await
        .unwrap_err();
    assert!(err.is_driver());
    drop(cursor);

    assert_eq!(session.buffered(), 0);
    let events = sink.events();
    assert_eq!(events.len(), 2);
    assert!(events.iter().all(|e| e.error_message.is_some()));

    session.close().await.unwrap();
}

#[tokio::test]
async fn test_use_statement_tracks_statement_database() {
    let (mut session, sink, _handles) = open_session(immediate_settings()).await;
    assert_eq!(session.statement_database(), Some("test"));

    let mut cursor = session.cursor().await.unwrap();
    cursor.execute("USE otherdb", None).await.unwrap();
    cursor.execute("INSERT INTO t VALUES (1)", None).await.unwrap();
    cursor.execute("USE `quoted-db`;", None).await.unwrap();
    cursor.execute("SELECT 1", None).await.unwrap();
    drop(cursor);

    assert_eq!(session.statement_database(), Some("quoted-db"));

    let events = sink.events();
    // the USE event itself reports the new database
    assert_eq!(events[0].stmt_db_name.as_deref(), Some("otherdb"));
    assert_eq!(events[1].stmt_db_name.as_deref(), Some("otherdb"));
    assert_eq!(events[2].stmt_db_name.as_deref(), Some("quoted-db"));
    // non-USE statements leave tracking unchanged
    assert_eq!(events[3].stmt_db_name.as_deref(), Some("quoted-db"));
    // the connect-time database never moves
    assert!(events.iter().all(|e| e.db_name.as_deref() == Some("test")));

    session.close().await.unwrap();
}

#[tokio::test]
async fn test_selective_capture_policy() {
    let settings = Settings {
        capture_all: false,
        capture_ddl: false,
        capture_callproc: false,
        ..immediate_settings()
    };
    let (mut session, sink, _handles) = open_session(settings).await;

    let mut cursor = session.cursor().await.unwrap();
    cursor.execute("SELECT 1", None).await.unwrap(); // not captured
    cursor.execute("CREATE TABLE t (a INT)", None).await.unwrap(); // not captured
    cursor.execute("INSERT INTO t VALUES (1)", None).await.unwrap(); // write: captured
    cursor.execute("USE otherdb", None).await.unwrap(); // USE: captured
    cursor.call_proc("audit_proc", None).await.unwrap(); // forced: captured
    drop(cursor);

    let events = sink.events();
    assert_eq!(events.len(), 3);
    assert_eq!(events[0].sql.as_deref(), Some("INSERT INTO t VALUES (1)"));
    assert_eq!(events[1].sql.as_deref(), Some("USE otherdb"));
    assert_eq!(events[2].sql.as_deref(), Some("CALL audit_proc"));

    // skipped statements still advance the counter
    assert_eq!(session.execution_count(), 5);
    assert_eq!(events[2].execution_count, Some(5));

    session.close().await.unwrap();
}

#[tokio::test]
async fn test_ddl_captured_when_policy_allows() {
    let settings = Settings {
        capture_all: false,
        capture_ddl: true,
        ..immediate_settings()
    };
    let (mut session, sink, _handles) = open_session(settings).await;

    let mut cursor = session.cursor().await.unwrap();
    cursor.execute("DROP TABLE t", None).await.unwrap();
    drop(cursor);

    assert_eq!(sink.len(), 1);
    session.close().await.unwrap();
}

#[tokio::test]
async fn test_payload_toggles() {
    let settings = Settings {
        include_sql: false,
        include_params: false,
        ..immediate_settings()
    };
    let (mut session, sink, _handles) = open_session(settings).await;

    let mut cursor = session.cursor().await.unwrap();
    cursor
        .execute(
            "INSERT INTO t VALUES (?)",
            Some(&ParamValue::seq([ParamValue::Int(1)])),
        )
        .await
        .unwrap();
    drop(cursor);

    let events = sink.events();
    assert!(events[0].sql.is_none());
    assert!(events[0].query_params.is_none());

    session.close().await.unwrap();
}

#[tokio::test]
async fn test_params_are_redacted_in_events() {
    let (mut session, sink, _handles) = open_session(immediate_settings()).await;

    let mut cursor = session.cursor().await.unwrap();
    cursor
        .execute(
            "UPDATE users SET password = :password WHERE name = :n",
            Some(&ParamValue::map([
                ("password", ParamValue::str("hunter2")),
                ("n", ParamValue::str("Jane")),
            ])),
        )
        .await
        .unwrap();
    drop(cursor);

    let events = sink.events();
    assert_eq!(
        events[0].query_params.as_deref(),
        Some(&["password=***".to_string(), "n=Jane".to_string()][..])
    );

    session.close().await.unwrap();
}

#[tokio::test]
async fn test_inline_debug_prefixes_delegated_sql() {
    let settings = immediate_settings().with_inline_debug("job-1");
    let (mut session, sink, handles) = open_session(settings).await;

    let mut cursor = session.cursor().await.unwrap();
    cursor.execute("SELECT 1", None).await.unwrap();
    cursor.execute("SELECT 2", None).await.unwrap();
    drop(cursor);

    let delegated = handles.executed_sql();
    assert!(delegated[0].starts_with("/* Id [7] User [root] Client ["));
    // pre-increment counter: first statement carries Count [1]
    assert!(delegated[0].contains("Count [1] Debug [job-1] */\nSELECT 1"));
    assert!(delegated[1].contains("Count [2]"));

    // the event carries the tag and the prefixed SQL it executed
    let events = sink.events();
    assert_eq!(events[0].debug.as_deref(), Some("job-1"));
    assert!(events[0].sql.as_deref().unwrap().ends_with("SELECT 1"));

    session.close().await.unwrap();
}

#[tokio::test]
async fn test_probe_failures_set_flag_bits_and_leave_fields_null() {
    let (conn, _handles) = MockConnection::with_failing_probes();
    let sink = Arc::new(MemorySink::new());
    let mut session = CaptureSession::open(conn, sink.clone(), immediate_settings()).await;

    let mut cursor = session.cursor().await.unwrap();
    cursor.execute("INSERT INTO t VALUES (1)", None).await.unwrap();
    drop(cursor);

    let events = sink.events();
    let event = &events[0];
    assert!(event.server_host.is_none());
    assert!(event.server_version.is_none());
    assert!(event.connection_id.is_none());
    assert!(event.server_tz.is_none());
    assert!(event.isolation_lvl.is_none());
    assert!(event.client_flags.is_none());
    assert!(event.server_flags.is_none());

    for bit in [
        flags::ERR_SERVER_HOST,
        flags::ERR_SERVER_VERSION,
        flags::ERR_CONNECTION_ID,
        flags::ERR_SERVER_TZ,
        flags::ERR_ISOLATION,
        flags::ERR_CLIENT_FLAGS,
        flags::ERR_SERVER_FLAGS,
    ] {
        assert!(flags::has(event.i_flags, bit), "missing bit {bit:#x}");
    }
    // probe failures never block capture
    assert!(flags::has(event.i_flags, flags::PROTOCOL_V8));

    session.close().await.unwrap();
}

#[tokio::test]
async fn test_execution_counter_spans_call_shapes() {
    let (mut session, sink, _handles) = open_session(immediate_settings()).await;

    let mut cursor = session.cursor().await.unwrap();
    cursor.execute("INSERT INTO t VALUES (1)", None).await.unwrap();
    cursor
        .execute_many(
            "INSERT INTO t VALUES (?)",
            &[
                ParamValue::seq([ParamValue::Int(2)]),
                ParamValue::seq([ParamValue::Int(3)]),
            ],
        )
        .await
        .unwrap();
    cursor.call_proc("p", None).await.unwrap();
    drop(cursor);

    let counts: Vec<_> = sink.events().iter().map(|e| e.execution_count).collect();
    assert_eq!(counts, [Some(1), Some(2), Some(3), Some(4)]);
    assert_eq!(session.execution_count(), 4);

    session.close().await.unwrap();
}

#[tokio::test]
async fn test_isolation_level_parsed_from_probe() {
    let (mut session, sink, _handles) = open_session(immediate_settings()).await;

    let mut cursor = session.cursor().await.unwrap();
    cursor.execute("INSERT INTO t VALUES (1)", None).await.unwrap();
    drop(cursor);

    // mock reports REPEATABLE-READ; the event carries code 4
    let events = sink.events();
    let json = events[0].to_json().unwrap();
    assert!(json.contains("\"isolationLvl\":4"));

    session.close().await.unwrap();
}
