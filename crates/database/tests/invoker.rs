use configuration::ConnectionConfig;
use core_types::{CallRequest, Pagination, ParamValue, Target};
use database::testing::{row, ScriptedConnector};
use database::{ConnectionSupervisor, DbError, ProcedureInvoker};
use futures::future::join_all;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

async fn connected_invoker(connector: &ScriptedConnector, config: ConnectionConfig) -> ProcedureInvoker {
    let supervisor = Arc::new(ConnectionSupervisor::new(config, Arc::new(connector.clone())));
    supervisor.connect().await.unwrap();
    ProcedureInvoker::new(supervisor)
}

fn order_lookup(id: i32) -> CallRequest {
    CallRequest::new("GetOrderById", Target::procedure("usp_sales_orders_get_by_id"))
        .with_param("SalesOrderID", id)
}

/// Answers with one row echoing the first argument.
fn echo_first_param(connector: &ScriptedConnector) {
    connector.set_responder(|statement| {
        let id = statement.params.first().map(ParamValue::to_json).unwrap_or_default();
        Ok(vec![row(json!({ "SalesOrderID": id }))])
    });
}

#[tokio::test(start_paused = true)]
async fn invoke_returns_rows_and_logs_the_bound_statement() {
    let connector = ScriptedConnector::new().with_responder(|_| {
        Ok(vec![
            row(json!({"BusinessEntityID": 1, "FirstName": "Ken"})),
            row(json!({"BusinessEntityID": 2, "FirstName": "Terri"})),
        ])
    });
    let invoker = connected_invoker(&connector, ConnectionConfig::default()).await;

    let call = CallRequest::new("ListPersons", Target::procedure("usp_persons_get_all"))
        .with_pagination(Pagination::new(2, 10).unwrap());
    let result = invoker.invoke(&call).await.unwrap();

    assert_eq!(result.len(), 2);
    assert_eq!(result.rows[1]["FirstName"], json!("Terri"));

    let statements = connector.statements();
    assert_eq!(statements.len(), 1);
    assert_eq!(statements[0].sql, "SELECT * FROM usp_persons_get_all($1, $2)");
    assert_eq!(statements[0].params, vec![ParamValue::Int(10), ParamValue::Int(10)]);
}

#[tokio::test(start_paused = true)]
async fn concurrent_invokes_do_not_mix_parameters() {
    let connector = ScriptedConnector::new().with_query_delay(Duration::from_millis(5));
    echo_first_param(&connector);
    let invoker = connected_invoker(&connector, ConnectionConfig::default()).await;

    let ids: Vec<i32> = (43659..43659 + 40).collect();
    let results = join_all(ids.iter().map(|id| {
        let invoker = invoker.clone();
        let call = order_lookup(*id);
        async move { invoker.invoke(&call).await }
    }))
    .await;

    for (id, result) in ids.iter().zip(results) {
        let result = result.unwrap();
        assert_eq!(result.rows[0]["SalesOrderID"], json!(id));
    }
    assert_eq!(connector.handles_acquired(), 40);
    assert_eq!(connector.handles_released(), 40);
}

#[tokio::test(start_paused = true)]
async fn handle_is_released_when_the_statement_fails() {
    let connector = ScriptedConnector::new()
        .with_responder(|_| Err(DbError::Backend("function usp_sales_orders_get_by_id(integer) does not exist".into())));
    let invoker = connected_invoker(&connector, ConnectionConfig::default()).await;

    let err = invoker.invoke(&order_lookup(1)).await.unwrap_err();

    assert!(matches!(err, DbError::Backend(_)));
    assert_eq!(connector.handles_acquired(), 1);
    assert_eq!(connector.handles_released(), 1);
}

#[tokio::test(start_paused = true)]
async fn slow_statements_time_out_and_release_their_handle() {
    let connector = ScriptedConnector::new().with_query_delay(Duration::from_secs(10));
    let mut config = ConnectionConfig::default();
    config.request_timeout_ms = 200;
    let invoker = connected_invoker(&connector, config).await;

    let err = invoker.invoke(&order_lookup(1)).await.unwrap_err();

    match err {
        DbError::RequestTimeout { operation, timeout } => {
            assert_eq!(operation, "GetOrderById");
            assert_eq!(timeout, Duration::from_millis(200));
        }
        other => panic!("expected RequestTimeout, got {other:?}"),
    }
    assert_eq!(connector.handles_released(), 1);
}

#[tokio::test(start_paused = true)]
async fn broken_connection_surfaces_without_retry() {
    let connector = ScriptedConnector::new();
    let invoker = connected_invoker(&connector, ConnectionConfig::default()).await;
    connector.set_online(false);

    assert!(invoker.invoke(&order_lookup(1)).await.is_err());

    assert_eq!(connector.statements().len(), 1);
    assert_eq!(connector.open_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn invoke_before_connect_fails_without_touching_the_backend() {
    let connector = ScriptedConnector::new();
    let supervisor = Arc::new(ConnectionSupervisor::new(
        ConnectionConfig::default(),
        Arc::new(connector.clone()),
    ));
    let invoker = ProcedureInvoker::new(supervisor);

    assert!(matches!(
        invoker.invoke(&order_lookup(1)).await,
        Err(DbError::NotConnected)
    ));
    assert_eq!(connector.open_calls(), 0);
    assert!(connector.statements().is_empty());
}

#[tokio::test(start_paused = true)]
async fn bad_procedure_name_is_rejected_before_acquiring() {
    let connector = ScriptedConnector::new();
    let invoker = connected_invoker(&connector, ConnectionConfig::default()).await;

    let call = CallRequest::new("Evil", Target::procedure("x; DROP TABLE person"));
    assert!(matches!(
        invoker.invoke(&call).await,
        Err(DbError::InvalidProcedureName(_))
    ));
    assert_eq!(connector.handles_acquired(), 0);
}
