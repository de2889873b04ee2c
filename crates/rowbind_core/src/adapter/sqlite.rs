//! SQLite adapter over rusqlite.
//!
//! # Responsibility
//! - Implement the `Adapter` contract against a single SQLite connection.
//! - Translate criteria mappings into parameterized predicates.
//!
//! # Invariants
//! - Every table/column name reaching SQL text passes identifier validation.
//! - All values are bound as parameters, never interpolated.
//! - No migrations, pooling, or transaction management happens here.

use crate::adapter::{
    render_order_by, Adapter, AdapterError, AdapterResult, Criteria, Criterion, OrderBy, Row, Value,
};
use log::{error, info};
use once_cell::sync::Lazy;
use regex::Regex;
use rusqlite::{params_from_iter, Connection};
use std::time::{Duration, Instant};

static SQL_IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier pattern is valid"));

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);
const MEMORY_DSN: &str = ":memory:";

/// SQLite-backed adapter owning one connection and its DSN configuration.
pub struct SqliteAdapter {
    conn: Option<Connection>,
    dsn: Option<String>,
}

impl Default for SqliteAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl SqliteAdapter {
    /// Creates an unconnected adapter with no DSN.
    pub fn new() -> Self {
        Self {
            conn: None,
            dsn: None,
        }
    }

    /// Creates an unconnected adapter with a DSN (file path or `:memory:`).
    pub fn with_dsn(dsn: impl Into<String>) -> Self {
        Self {
            conn: None,
            dsn: Some(dsn.into()),
        }
    }

    /// Opens an in-memory database, already connected.
    pub fn open_in_memory() -> AdapterResult<Self> {
        let mut adapter = Self::with_dsn(MEMORY_DSN);
        adapter.connect()?;
        Ok(adapter)
    }

    pub fn set_dsn(&mut self, dsn: impl Into<String>) {
        self.dsn = Some(dsn.into());
    }

    pub fn dsn(&self) -> Option<&str> {
        self.dsn.as_deref()
    }

    /// Establishes the connection for the configured DSN.
    ///
    /// A missing DSN falls back to an in-memory database. Calling this on an
    /// already connected adapter is a no-op.
    ///
    /// # Side effects
    /// - Emits `adapter_connect` logging events with duration and status.
    pub fn connect(&mut self) -> AdapterResult<()> {
        if self.conn.is_some() {
            return Ok(());
        }

        let started_at = Instant::now();
        let dsn = self.dsn.as_deref().unwrap_or(MEMORY_DSN);
        let mode = if dsn == MEMORY_DSN { "memory" } else { "file" };
        info!("event=adapter_connect module=adapter status=start mode={mode}");

        let open_result = if dsn == MEMORY_DSN {
            Connection::open_in_memory()
        } else {
            Connection::open(dsn)
        };

        let conn = match open_result {
            Ok(conn) => conn,
            Err(err) => {
                error!(
                    "event=adapter_connect module=adapter status=error mode={mode} duration_ms={} error={err}",
                    started_at.elapsed().as_millis()
                );
                return Err(err.into());
            }
        };
        conn.busy_timeout(BUSY_TIMEOUT)?;

        info!(
            "event=adapter_connect module=adapter status=ok mode={mode} duration_ms={}",
            started_at.elapsed().as_millis()
        );
        self.conn = Some(conn);
        Ok(())
    }

    /// Returns the underlying connection when connected.
    ///
    /// Exposed so callers can run schema setup; the repository core never
    /// touches it.
    pub fn connection(&self) -> Option<&Connection> {
        self.conn.as_ref()
    }

    fn require_connection(&self) -> AdapterResult<&Connection> {
        self.conn.as_ref().ok_or(AdapterError::NotConnected)
    }
}

impl Adapter for SqliteAdapter {
    fn select_by(
        &self,
        table: &str,
        criteria: &Criteria,
        order: Option<&OrderBy>,
    ) -> AdapterResult<Vec<Row>> {
        let conn = self.require_connection()?;
        check_identifier(table)?;
        if let Some(order) = order {
            check_identifier(order.column_name())?;
        }

        let (where_sql, values) = where_clause(criteria)?;
        let mut sql = format!("SELECT * FROM {table}{where_sql}");
        let order_sql = render_order_by(order);
        if !order_sql.is_empty() {
            sql.push(' ');
            sql.push_str(&order_sql);
        }

        let mut stmt = conn.prepare(&sql)?;
        let columns: Vec<String> = stmt
            .column_names()
            .iter()
            .map(|name| name.to_string())
            .collect();
        let mut rows = stmt.query(params_from_iter(values))?;

        let mut records = Vec::new();
        while let Some(row) = rows.next()? {
            let mut record = Row::new();
            for (index, column) in columns.iter().enumerate() {
                record.insert(column.clone(), row.get::<_, Value>(index)?);
            }
            records.push(record);
        }
        Ok(records)
    }

    fn insert(&self, table: &str, row: &Row, id_field: &str) -> AdapterResult<Option<Value>> {
        let conn = self.require_connection()?;
        check_identifier(table)?;
        check_identifier(id_field)?;
        for column in row.keys() {
            check_identifier(column)?;
        }

        let sql = if row.is_empty() {
            format!("INSERT INTO {table} DEFAULT VALUES RETURNING {id_field}")
        } else {
            let columns: Vec<&str> = row.keys().map(String::as_str).collect();
            let placeholders = vec!["?"; columns.len()].join(", ");
            format!(
                "INSERT INTO {table} ({}) VALUES ({placeholders}) RETURNING {id_field}",
                columns.join(", ")
            )
        };

        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(row.values().cloned()))?;
        match rows.next()? {
            Some(returned) => Ok(Some(returned.get::<_, Value>(0)?)),
            None => Ok(None),
        }
    }

    fn update(&self, table: &str, row: &Row, key: &Criteria) -> AdapterResult<bool> {
        let conn = self.require_connection()?;
        check_identifier(table)?;
        if row.is_empty() {
            return Ok(false);
        }
        for column in row.keys() {
            check_identifier(column)?;
        }

        let assignments: Vec<String> = row.keys().map(|column| format!("{column} = ?")).collect();
        let (where_sql, key_values) = where_clause(key)?;
        let sql = format!(
            "UPDATE {table} SET {}{where_sql}",
            assignments.join(", ")
        );

        let mut values: Vec<Value> = row.values().cloned().collect();
        values.extend(key_values);
        let changed = conn.execute(&sql, params_from_iter(values))?;
        Ok(changed > 0)
    }

    fn delete(&self, table: &str, key: &Criteria) -> AdapterResult<bool> {
        let conn = self.require_connection()?;
        check_identifier(table)?;

        let (where_sql, values) = where_clause(key)?;
        let sql = format!("DELETE FROM {table}{where_sql}");
        let changed = conn.execute(&sql, params_from_iter(values))?;
        Ok(changed > 0)
    }

    fn is_connected(&self) -> bool {
        self.conn.is_some()
    }
}

fn check_identifier(name: &str) -> AdapterResult<()> {
    if SQL_IDENTIFIER.is_match(name) {
        Ok(())
    } else {
        Err(AdapterError::InvalidIdentifier(name.to_string()))
    }
}

fn where_clause(criteria: &Criteria) -> AdapterResult<(String, Vec<Value>)> {
    if criteria.is_empty() {
        return Ok((String::new(), Vec::new()));
    }

    let mut predicates = Vec::with_capacity(criteria.len());
    let mut values = Vec::new();
    for (field, criterion) in criteria {
        check_identifier(field)?;
        match criterion {
            Criterion::Eq(Value::Null) => predicates.push(format!("{field} IS NULL")),
            Criterion::Eq(value) => {
                predicates.push(format!("{field} = ?"));
                values.push(value.clone());
            }
            Criterion::Between(range) => {
                predicates.push(format!("{field} BETWEEN ? AND ?"));
                values.push(range.start().clone());
                values.push(range.end().clone());
            }
        }
    }
    Ok((format!(" WHERE {}", predicates.join(" AND ")), values))
}
