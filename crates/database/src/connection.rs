use crate::backend::{BoundStatement, Connector, DatabaseHandle, DatabasePool, Handle, PoolStatus, SharedPool};
use crate::error::DbError;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use configuration::ConnectionConfig;
use core_types::{ParamType, ParamValue, Row};
use rust_decimal::Decimal;
use serde_json::{Number, Value as JsonValue};
use sqlx::pool::PoolConnection;
use sqlx::postgres::{PgArguments, PgConnectOptions, PgPoolOptions, PgRow, PgSslMode};
use sqlx::query::Query;
use sqlx::{Column, Connection, PgConnection, PgPool, Postgres, Row as _, TypeInfo, ValueRef};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

const APPLICATION_NAME: &str = "adventureworks-api";

/// Translates our settings into driver connect options.
///
/// TLS follows the two flags: no encryption disables TLS, encryption with a
/// trusted certificate requires TLS without verification, otherwise TLS is
/// fully verified.
pub fn connect_options(config: &ConnectionConfig) -> PgConnectOptions {
    let ssl_mode = match (config.encrypt, config.trust_server_certificate) {
        (false, _) => PgSslMode::Disable,
        (true, true) => PgSslMode::Require,
        (true, false) => PgSslMode::VerifyFull,
    };

    PgConnectOptions::new()
        .host(&config.host)
        .port(config.port)
        .database(&config.database)
        .username(&config.user)
        .password(config.password.expose())
        .ssl_mode(ssl_mode)
        .application_name(APPLICATION_NAME)
        // Server-side cap matching the client-side request timeout.
        .options([("statement_timeout", config.request_timeout_ms.to_string())])
}

/// Opens PostgreSQL pools with `sqlx`.
#[derive(Debug, Clone, Default)]
pub struct PgConnector;

#[async_trait]
impl Connector for PgConnector {
    async fn open(&self, config: &ConnectionConfig) -> Result<SharedPool, DbError> {
        let pool = PgPoolOptions::new()
            .min_connections(config.pool.min_connections)
            .max_connections(config.pool.max_connections)
            .idle_timeout(config.pool.idle_timeout())
            .acquire_timeout(config.pool.acquire_timeout())
            .connect_with(connect_options(config))
            .await?;

        Ok(Arc::new(PgDatabasePool {
            pool,
            acquire_timeout: config.pool.acquire_timeout(),
        }))
    }

    async fn probe(&self, config: &ConnectionConfig) -> Result<(), DbError> {
        let mut conn = PgConnection::connect_with(&connect_options(config)).await?;
        sqlx::query("SELECT 1").execute(&mut conn).await?;
        conn.close().await?;
        Ok(())
    }
}

/// A `PgPool` behind the `DatabasePool` seam.
#[derive(Debug, Clone)]
pub struct PgDatabasePool {
    pool: PgPool,
    acquire_timeout: Duration,
}

#[async_trait]
impl DatabasePool for PgDatabasePool {
    async fn acquire(&self) -> Result<Handle, DbError> {
        let conn = self.pool.acquire().await.map_err(|e| match e {
            sqlx::Error::PoolTimedOut => DbError::AcquireTimeout(self.acquire_timeout),
            sqlx::Error::PoolClosed => DbError::Closed,
            other => other.into(),
        })?;
        Ok(Box::new(PgHandle { conn }))
    }

    async fn ping(&self) -> Result<(), DbError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn close(&self) {
        self.pool.close().await;
    }

    fn status(&self) -> PoolStatus {
        PoolStatus {
            size: self.pool.size(),
            idle: self.pool.num_idle() as u32,
        }
    }
}

/// One pooled PostgreSQL connection. Returned to the pool on drop.
pub struct PgHandle {
    conn: PoolConnection<Postgres>,
}

#[async_trait]
impl DatabaseHandle for PgHandle {
    async fn fetch_all(&mut self, statement: &BoundStatement) -> Result<Vec<Row>, DbError> {
        let mut query = sqlx::query(&statement.sql);
        for value in &statement.params {
            query = bind_value(query, value);
        }

        let rows = query.fetch_all(&mut *self.conn).await?;
        rows.iter().map(decode_row).collect()
    }
}

fn bind_value<'q>(
    query: Query<'q, Postgres, PgArguments>,
    value: &ParamValue,
) -> Query<'q, Postgres, PgArguments> {
    match value {
        ParamValue::Int(v) => query.bind(*v),
        ParamValue::Decimal(v) => query.bind(*v),
        ParamValue::Date(v) => query.bind(*v),
        ParamValue::String(v) => query.bind(v.clone()),
        ParamValue::Bool(v) => query.bind(*v),
        ParamValue::Null(ty) => match ty {
            ParamType::Int => query.bind(None::<i32>),
            ParamType::Decimal => query.bind(None::<Decimal>),
            ParamType::Date => query.bind(None::<NaiveDate>),
            ParamType::String => query.bind(None::<String>),
            ParamType::Bool => query.bind(None::<bool>),
        },
    }
}

/// Converts a driver row into a JSON object, keeping column order.
fn decode_row(row: &PgRow) -> Result<Row, DbError> {
    let mut out = Row::new();
    for column in row.columns() {
        let value = decode_column(row, column.ordinal(), column.type_info().name())
            .map_err(|e| DbError::Decode {
                column: column.name().to_string(),
                message: e.to_string(),
            })?;
        out.insert(column.name().to_string(), value);
    }
    Ok(out)
}

fn decode_column(row: &PgRow, index: usize, type_name: &str) -> Result<JsonValue, sqlx::Error> {
    if row.try_get_raw(index)?.is_null() {
        return Ok(JsonValue::Null);
    }

    let value = match type_name {
        "BOOL" => JsonValue::Bool(row.try_get::<bool, _>(index)?),
        "INT2" => JsonValue::from(row.try_get::<i16, _>(index)?),
        "INT4" => JsonValue::from(row.try_get::<i32, _>(index)?),
        "INT8" => JsonValue::from(row.try_get::<i64, _>(index)?),
        "FLOAT4" => float(f64::from(row.try_get::<f32, _>(index)?)),
        "FLOAT8" => float(row.try_get::<f64, _>(index)?),
        // Exact decimals travel as strings so money columns keep every digit.
        "NUMERIC" => JsonValue::String(row.try_get::<Decimal, _>(index)?.to_string()),
        "DATE" => JsonValue::String(row.try_get::<NaiveDate, _>(index)?.format("%Y-%m-%d").to_string()),
        "TIME" => JsonValue::String(row.try_get::<NaiveTime, _>(index)?.to_string()),
        "TIMESTAMP" => JsonValue::String(
            row.try_get::<NaiveDateTime, _>(index)?
                .format("%Y-%m-%dT%H:%M:%S%.f")
                .to_string(),
        ),
        "TIMESTAMPTZ" => JsonValue::String(row.try_get::<DateTime<Utc>, _>(index)?.to_rfc3339()),
        "UUID" => JsonValue::String(row.try_get::<Uuid, _>(index)?.to_string()),
        "JSON" | "JSONB" => row.try_get::<JsonValue, _>(index)?,
        _ => match row.try_get::<String, _>(index) {
            Ok(text) => JsonValue::String(text),
            Err(_) => JsonValue::Null,
        },
    };
    Ok(value)
}

fn float(value: f64) -> JsonValue {
    Number::from_f64(value)
        .map(JsonValue::Number)
        .unwrap_or(JsonValue::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use configuration::Secret;

    #[test]
    fn tls_mode_follows_encrypt_and_trust_flags() {
        let mut config = ConnectionConfig::default();
        assert!(matches!(connect_options(&config).get_ssl_mode(), PgSslMode::Disable));

        config.encrypt = true;
        config.trust_server_certificate = true;
        assert!(matches!(connect_options(&config).get_ssl_mode(), PgSslMode::Require));

        config.trust_server_certificate = false;
        assert!(matches!(connect_options(&config).get_ssl_mode(), PgSslMode::VerifyFull));
    }

    #[test]
    fn connect_options_carry_target() {
        let config = ConnectionConfig {
            host: "db.internal".into(),
            port: 6543,
            database: "sales".into(),
            user: "api".into(),
            password: Secret::new("pw"),
            ..ConnectionConfig::default()
        };
        let options = connect_options(&config);
        assert_eq!(options.get_host(), "db.internal");
        assert_eq!(options.get_port(), 6543);
        assert_eq!(options.get_database(), Some("sales"));
        assert_eq!(options.get_username(), "api");
    }
}
