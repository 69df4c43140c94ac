//! Recorded SQL queries over the `sqlx` Any driver
//!
//! The query text becomes the record's command. Positional parameters are
//! recorded under `"1"`, `"2"`, ... in bind order.

use gs_common::CommandRecord;
use gs_config::DatabaseConfig;
use indexmap::IndexMap;
use sqlx::any::{Any, AnyPoolOptions, AnyRow};
use sqlx::AnyPool;
use sqlx::Row;
use tracing::{debug, info};

use crate::{ConnectorError, ConnectorResult};

/// Open a pool for any of the compiled-in drivers (sqlite, postgres, mysql).
pub async fn connect(config: &DatabaseConfig) -> ConnectorResult<AnyPool> {
    if config.url.is_empty() {
        return Err(ConnectorError::Config("database.url is not set".to_string()));
    }
    sqlx::any::install_default_drivers();

    let pool = AnyPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.url)
        .await?;

    info!(max_connections = config.max_connections, "Database pool connected");
    Ok(pool)
}

/// A positional query parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlParam {
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Null,
}

impl SqlParam {
    fn to_json(&self) -> serde_json::Value {
        match self {
            SqlParam::Text(v) => serde_json::Value::from(v.as_str()),
            SqlParam::Int(v) => serde_json::Value::from(*v),
            SqlParam::Float(v) => serde_json::Value::from(*v),
            SqlParam::Bool(v) => serde_json::Value::from(*v),
            SqlParam::Null => serde_json::Value::Null,
        }
    }
}

impl From<&str> for SqlParam {
    fn from(v: &str) -> Self {
        SqlParam::Text(v.to_string())
    }
}

impl From<String> for SqlParam {
    fn from(v: String) -> Self {
        SqlParam::Text(v)
    }
}

impl From<i64> for SqlParam {
    fn from(v: i64) -> Self {
        SqlParam::Int(v)
    }
}

impl From<i32> for SqlParam {
    fn from(v: i32) -> Self {
        SqlParam::Int(v.into())
    }
}

impl From<f64> for SqlParam {
    fn from(v: f64) -> Self {
        SqlParam::Float(v)
    }
}

impl From<bool> for SqlParam {
    fn from(v: bool) -> Self {
        SqlParam::Bool(v)
    }
}

impl<T: Into<SqlParam>> From<Option<T>> for SqlParam {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(SqlParam::Null)
    }
}

#[derive(Debug, Clone)]
pub struct RecordedQuery {
    sql: String,
    params: Vec<SqlParam>,
}

impl RecordedQuery {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    pub fn bind(mut self, param: impl Into<SqlParam>) -> Self {
        self.params.push(param.into());
        self
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// The provenance record for this query.
    pub fn record(&self) -> CommandRecord {
        let parameters: IndexMap<String, serde_json::Value> = self
            .params
            .iter()
            .enumerate()
            .map(|(i, p)| ((i + 1).to_string(), p.to_json()))
            .collect();

        CommandRecord::new(self.sql.as_str()).with_parameters(parameters)
    }

    pub async fn fetch_all(&self, pool: &AnyPool) -> ConnectorResult<(Vec<AnyRow>, CommandRecord)> {
        let mut query = sqlx::query::<Any>(&self.sql);
        for param in &self.params {
            query = match param {
                SqlParam::Text(v) => query.bind(v.clone()),
                SqlParam::Int(v) => query.bind(*v),
                SqlParam::Float(v) => query.bind(*v),
                SqlParam::Bool(v) => query.bind(*v),
                SqlParam::Null => query.bind(Option::<String>::None),
            };
        }

        let rows = query.fetch_all(pool).await?;
        debug!(rows = rows.len(), params = self.params.len(), "Query executed");
        Ok((rows, self.record()))
    }
}

/// Read an identifier column that may be stored as text or as an integer.
pub fn id_column(row: &AnyRow, column: &str) -> ConnectorResult<String> {
    match row.try_get::<String, _>(column) {
        Ok(value) => Ok(value),
        Err(_) => Ok(row.try_get::<i64, _>(column)?.to_string()),
    }
}

/// Read a nullable identifier column, text or integer.
pub fn optional_id(row: &AnyRow, column: &str) -> ConnectorResult<Option<String>> {
    match row.try_get::<Option<String>, _>(column) {
        Ok(value) => Ok(value),
        Err(_) => Ok(row.try_get::<Option<i64>, _>(column)?.map(|v| v.to_string())),
    }
}

/// Read a nullable text column.
pub fn optional_text(row: &AnyRow, column: &str) -> ConnectorResult<Option<String>> {
    Ok(row.try_get::<Option<String>, _>(column)?)
}
