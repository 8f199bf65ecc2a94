//! End-to-end invocation tests against the scripted driver

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use pretty_assertions::assert_eq;
use procall_connection::{ConnectionPool, PoolConfig};
use procall_core::{
    CallArgument, ColumnMeta, LargeObject, ProcallError, QueryResult, SqlType, Value,
};
use procall_driver_tests::fixtures::{ScriptedConnection, ScriptedConnectionFactory, initialize_logging};
use procall_invoker::{
    InvocationRequest, InvokeError, InvokerConfig, StoredProcedureInvoker, TemporalZone,
    EXECUTE_DURATION_ATTRIBUTE, OUTPUT_COUNT_ATTRIBUTE, RESULT_SET_COUNT_ATTRIBUTE,
    ROW_COUNT_ATTRIBUTE, STATEMENT_ATTRIBUTE,
};

const CALL: &str = "{call add_person(?, ?)}";

fn invoker(conn: &ScriptedConnection, config: InvokerConfig) -> StoredProcedureInvoker {
    initialize_logging();
    StoredProcedureInvoker::with_factory(config, ScriptedConnectionFactory::new(conn.clone())).unwrap()
}

fn config() -> InvokerConfig {
    InvokerConfig::default()
        .with_statement(CALL)
        .with_time_zone(TemporalZone::Utc)
}

fn request(pairs: &[(&str, &str)]) -> InvocationRequest {
    pairs
        .iter()
        .fold(InvocationRequest::new(), |request, (k, v)| request.with_attribute(*k, *v))
}

fn two_people() -> QueryResult {
    QueryResult::new(
        vec![
            ColumnMeta::new("ID", SqlType::Integer, 0),
            ColumnMeta::new("NAME", SqlType::VarChar, 1),
        ],
        vec![
            vec![Value::Int32(1), Value::String("Tom".into())],
            vec![Value::Int32(2), Value::String("Ann".into())],
        ],
    )
}

// =============================================================================
// Documents and tallies
// =============================================================================

#[tokio::test]
async fn test_result_set_with_named_output() {
    let conn = ScriptedConnection::new()
        .with_result_set(two_people())
        .with_output(2, Value::Int32(7));
    let invoker = invoker(&conn, config());

    let outcome = invoker
        .invoke(&request(&[
            ("procedure.args.in.1.type", "12"),
            ("procedure.args.in.1.value", "Tom"),
            ("procedure.args.out.2.type", "4"),
            ("procedure.args.out.2.name", "ID"),
        ]))
        .await
        .unwrap();

    assert_eq!(
        outcome.document_text(),
        r#"{"Results":[[{"ID":1,"NAME":"Tom"},{"ID":2,"NAME":"Ann"}]],"Outputs":{"ID":7}}"#
    );
    assert_eq!(
        (outcome.tally.result_sets, outcome.tally.rows, outcome.tally.outputs),
        (1, 2, 1)
    );

    let attributes = outcome.attributes();
    assert_eq!(attributes[RESULT_SET_COUNT_ATTRIBUTE], "1");
    assert_eq!(attributes[ROW_COUNT_ATTRIBUTE], "2");
    assert_eq!(attributes[OUTPUT_COUNT_ATTRIBUTE], "1");
    assert_eq!(
        attributes[EXECUTE_DURATION_ATTRIBUTE],
        outcome.duration_ms.to_string()
    );

    let log = conn.log();
    let log = log.lock();
    assert_eq!(log.prepared, vec![CALL.to_string()]);
    assert!(matches!(
        &log.bindings[&1],
        CallArgument::Value(Value::String(name)) if name == "Tom"
    ));
    assert_eq!(log.registered.get(&2), Some(&SqlType::Integer));
    assert_eq!(log.statements_closed, 1);
}

#[tokio::test]
async fn test_nothing_returned() {
    let conn = ScriptedConnection::new();
    let outcome = invoker(&conn, config())
        .invoke(&InvocationRequest::new())
        .await
        .unwrap();

    assert_eq!(outcome.document_text(), "{}");
    assert_eq!(
        (outcome.tally.result_sets, outcome.tally.rows, outcome.tally.outputs),
        (0, 0, 0)
    );
}

#[tokio::test]
async fn test_leading_empty_result_set_is_dropped() {
    let conn = ScriptedConnection::new()
        .with_result_set(QueryResult::new(
            vec![ColumnMeta::new("ID", SqlType::Integer, 0)],
            vec![],
        ))
        .with_result_set(two_people());

    let outcome = invoker(&conn, config())
        .invoke(&InvocationRequest::new())
        .await
        .unwrap();

    assert_eq!(
        outcome.document_text(),
        r#"{"Results":[[{"ID":1,"NAME":"Tom"},{"ID":2,"NAME":"Ann"}]]}"#
    );
    assert_eq!(outcome.tally.result_sets, 1);
    assert_eq!(outcome.tally.rows, 2);
}

#[tokio::test]
async fn test_decimal_round_trips_through_inout() {
    let conn = ScriptedConnection::new();
    let outcome = invoker(&conn, config())
        .invoke(&request(&[
            ("procedure.args.inout.1.type", "3"),
            ("procedure.args.inout.1.value", "123.45"),
        ]))
        .await
        .unwrap();

    let document: serde_json::Value = serde_json::from_slice(&outcome.document).unwrap();
    assert_eq!(document["Outputs"]["inout-1"].as_f64(), Some(123.45));
    assert_eq!(outcome.tally.outputs, 1);
}

// =============================================================================
// Parameter sources and coercion
// =============================================================================

#[tokio::test]
async fn test_request_attributes_override_config_per_field() {
    let conn = ScriptedConnection::new();
    let config = config()
        .with_parameter("procedure.args.in.1.type", "12")
        .with_parameter("procedure.args.in.1.value", "default")
        .with_parameter("procedure.args.out.2.type", "4");
    let invoker = invoker(&conn, config);

    invoker
        .invoke(&request(&[("procedure.args.in.1.value", "override")]))
        .await
        .unwrap();

    let log = conn.log();
    let log = log.lock();
    assert!(matches!(
        &log.bindings[&1],
        CallArgument::Value(Value::String(v)) if v == "override"
    ));
    assert_eq!(log.registered.get(&2), Some(&SqlType::Integer));
}

#[tokio::test]
async fn test_binary_formats() {
    let conn = ScriptedConnection::new();
    let invoker = invoker(&conn, config());

    invoker
        .invoke(&request(&[
            ("procedure.args.in.1.type", "-3"),
            ("procedure.args.in.1.value", "00FF"),
            ("procedure.args.in.1.format", "hex"),
            ("procedure.args.in.2.type", "-2"),
            ("procedure.args.in.2.value", "AA=="),
            ("procedure.args.in.2.format", "base64"),
        ]))
        .await
        .unwrap();

    {
        let log = conn.log();
        let log = log.lock();
        assert!(matches!(
            &log.bindings[&1],
            CallArgument::Value(Value::Bytes(b)) if b == &vec![0x00, 0xFF]
        ));
        assert!(matches!(
            &log.bindings[&2],
            CallArgument::Value(Value::Bytes(b)) if b == &vec![0x00]
        ));
    }

    let err = invoker
        .invoke(&request(&[
            ("procedure.args.in.1.type", "-2"),
            ("procedure.args.in.1.value", "00"),
            ("procedure.args.in.1.format", "weird"),
        ]))
        .await
        .unwrap_err();
    assert!(matches!(err, InvokeError::UnsupportedFormat { index: 1, .. }));
    assert!(err.is_pre_execution());
}

#[tokio::test]
async fn test_epoch_millis_date() {
    let conn = ScriptedConnection::new();
    invoker(&conn, config())
        .invoke(&request(&[
            ("procedure.args.in.1.type", "91"),
            ("procedure.args.in.1.value", "1700000000000"),
        ]))
        .await
        .unwrap();

    let expected = NaiveDate::from_ymd_opt(2023, 11, 14).unwrap();
    assert!(matches!(
        conn.log().lock().bindings[&1],
        CallArgument::Value(Value::Date(d)) if d == expected
    ));
}

#[tokio::test]
async fn test_malformed_attribute_fails_before_connecting() {
    let conn = ScriptedConnection::new();
    let err = invoker(&conn, config())
        .invoke(&request(&[("procedure.args.in.1.type", "VARCHAR")]))
        .await
        .unwrap_err();

    assert!(matches!(err, InvokeError::MalformedParameter { .. }));
    assert!(conn.log().lock().prepared.is_empty());
}

// =============================================================================
// Statement resolution
// =============================================================================

#[tokio::test]
async fn test_statement_from_request_attribute() {
    let conn = ScriptedConnection::new();
    let invoker = invoker(&conn, InvokerConfig::default());

    invoker
        .invoke(&request(&[(STATEMENT_ATTRIBUTE, "{call from_record}")]))
        .await
        .unwrap();
    assert_eq!(conn.log().lock().prepared, vec!["{call from_record}".to_string()]);

    let err = invoker
        .invoke(&request(&[(STATEMENT_ATTRIBUTE, "  ")]))
        .await
        .unwrap_err();
    assert!(matches!(err, InvokeError::Configuration(_)));
}

#[tokio::test]
async fn test_configured_statement_wins() {
    let conn = ScriptedConnection::new();
    invoker(&conn, config())
        .invoke(&request(&[(STATEMENT_ATTRIBUTE, "{call ignored}")]))
        .await
        .unwrap();
    assert_eq!(conn.log().lock().prepared, vec![CALL.to_string()]);
}

#[tokio::test]
async fn test_validate_setup() {
    let conn = ScriptedConnection::new();
    let unconfigured = invoker(&conn, InvokerConfig::default());
    assert!(matches!(
        unconfigured.validate_setup(false),
        Err(InvokeError::Configuration(_))
    ));
    assert!(unconfigured.validate_setup(true).is_ok());
    assert!(invoker(&conn, config()).validate_setup(false).is_ok());
}

// =============================================================================
// Timeouts and cleanup
// =============================================================================

#[tokio::test]
async fn test_query_timeout_is_applied() {
    let conn = ScriptedConnection::new();
    invoker(&conn, config().with_timeout_secs(30))
        .invoke(&InvocationRequest::new())
        .await
        .unwrap();
    assert_eq!(conn.log().lock().query_timeouts, vec![Duration::from_secs(30)]);
}

#[tokio::test]
async fn test_execution_timeout() {
    let conn = ScriptedConnection::new().with_execute_delay(Duration::from_secs(5));
    let invoker = invoker(&conn, config().with_timeout_secs(1));

    let err = invoker.invoke(&InvocationRequest::new()).await.unwrap_err();

    assert!(matches!(err, InvokeError::Execution(ProcallError::Timeout(_))));
    assert!(!err.is_pre_execution());
    let log = conn.log();
    let log = log.lock();
    assert_eq!(log.executions, 0);
    assert_eq!(log.statements_closed, 1);
}

#[tokio::test]
async fn test_execution_failure() {
    let conn = ScriptedConnection::new().with_execute_failure("ORA-06550: wrong arguments");
    let err = invoker(&conn, config())
        .invoke(&InvocationRequest::new())
        .await
        .unwrap_err();

    match err {
        InvokeError::Execution(ProcallError::Driver(message)) => {
            assert!(message.contains("ORA-06550"))
        }
        other => panic!("expected driver failure, got {other:?}"),
    }
    assert_eq!(conn.log().lock().statements_closed, 1);
}

#[tokio::test]
async fn test_large_objects_freed_after_success() {
    let conn = ScriptedConnection::new();
    let text = "z".repeat(700);
    invoker(&conn, config())
        .invoke(&request(&[
            ("procedure.args.in.1.type", "2005"),
            ("procedure.args.in.1.value", text.as_str()),
            ("procedure.args.in.2.type", "2011"),
            ("procedure.args.in.2.value", "national"),
        ]))
        .await
        .unwrap();

    let log = conn.log();
    let log = log.lock();
    assert_eq!(log.clobs.len(), 2);
    assert_eq!(log.bound_clob_text(1), Some(text));
    assert!(log.clobs[1].is_national());
    assert!(log.all_clobs_freed());
}

#[tokio::test]
async fn test_large_objects_freed_after_bind_failure() {
    let conn = ScriptedConnection::new();
    let err = invoker(&conn, config())
        .invoke(&request(&[
            ("procedure.args.in.1.type", "2005"),
            ("procedure.args.in.1.value", "allocated first"),
            ("procedure.args.in.2.type", "4"),
            ("procedure.args.in.2.value", "not a number"),
        ]))
        .await
        .unwrap_err();

    assert!(matches!(err, InvokeError::Parse { index: 2, .. }));
    let log = conn.log();
    let log = log.lock();
    assert_eq!(log.clobs.len(), 1);
    assert!(log.all_clobs_freed());
    assert_eq!(log.executions, 0);
    assert_eq!(log.statements_closed, 1);
}

#[tokio::test]
async fn test_large_object_release_failure_is_execution_error() {
    let conn = ScriptedConnection::new().with_clob_free_failure();
    let err = invoker(&conn, config())
        .invoke(&request(&[
            ("procedure.args.in.1.type", "2005"),
            ("procedure.args.in.1.value", "text"),
        ]))
        .await
        .unwrap_err();
    assert!(matches!(err, InvokeError::Execution(ProcallError::LargeObject(_))));
}

// =============================================================================
// Pooling
// =============================================================================

#[tokio::test]
async fn test_connection_returned_after_failures() {
    let conn = ScriptedConnection::new();
    let config = config().with_pool(PoolConfig::new(0, 1).with_acquire_timeout_ms(100));
    let invoker = invoker(&conn, config);

    let bad = request(&[
        ("procedure.args.in.1.type", "4"),
        ("procedure.args.in.1.value", "many"),
    ]);
    for _ in 0..3 {
        assert!(matches!(
            invoker.invoke(&bad).await,
            Err(InvokeError::Parse { .. })
        ));
    }

    invoker.invoke(&InvocationRequest::new()).await.unwrap();

    let stats = invoker.pool().stats();
    assert_eq!(stats.leased, 0);
    assert_eq!(stats.idle, 1);
    assert_eq!(stats.opened, 1);
}

#[tokio::test]
async fn test_exhausted_pool_is_connection_error() {
    initialize_logging();
    let conn = ScriptedConnection::new();
    let pool = Arc::new(ConnectionPool::new(
        PoolConfig::new(0, 1).with_acquire_timeout_ms(50),
        ScriptedConnectionFactory::new(conn.clone()),
    ));
    let invoker = StoredProcedureInvoker::new(config(), pool.clone()).unwrap();

    let _held = pool.get().await.unwrap();
    let err = invoker.invoke(&InvocationRequest::new()).await.unwrap_err();

    assert!(matches!(err, InvokeError::Connection(ProcallError::Timeout(_))));
    assert!(conn.log().lock().prepared.is_empty());
}

#[tokio::test]
async fn test_concurrent_invocations_share_the_pool() {
    let conn = ScriptedConnection::new()
        .with_update_count(1)
        .with_execute_delay(Duration::from_millis(20));
    let config = config().with_pool(PoolConfig::new(0, 2).with_acquire_timeout_ms(2_000));
    let invoker = Arc::new(invoker(&conn, config));

    let handles: Vec<_> = (0..6)
        .map(|_| {
            let invoker = invoker.clone();
            tokio::spawn(async move { invoker.invoke(&InvocationRequest::new()).await })
        })
        .collect();

    for handle in handles {
        let outcome = handle.await.unwrap().unwrap();
        assert_eq!(outcome.document_text(), r#"{"Results":[1]}"#);
    }

    let stats = invoker.pool().stats();
    assert_eq!(stats.leased, 0);
    assert!(stats.opened <= 2);
    assert_eq!(conn.log().lock().executions, 6);
}

#[test]
fn test_invalid_config_is_rejected() {
    let conn = ScriptedConnection::new();
    let mut config = config();
    config.parameter_prefix = String::new();
    let result =
        StoredProcedureInvoker::with_factory(config, ScriptedConnectionFactory::new(conn));
    assert!(matches!(result, Err(InvokeError::Configuration(_))));
}
