//! Adapter contract between the repository engine and physical storage.
//!
//! # Responsibility
//! - Define the row-level CRUD operations a store must provide.
//! - Define the shared row/value/ordering vocabulary for adapters.
//!
//! # Invariants
//! - Adapters own the physical connection; the repository never sees SQL.
//! - Result row order is the adapter's to decide and must be preserved
//!   upstream.

use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod sqlite;
pub mod where_params;

pub use rusqlite::types::Value;
pub use sqlite::SqliteAdapter;
pub use where_params::{Between, Criteria, Criterion};

/// Flat field-name to scalar mapping exchanged with adapters.
pub type Row = BTreeMap<String, Value>;

pub type AdapterResult<T> = Result<T, AdapterError>;

#[derive(Debug)]
pub enum AdapterError {
    NotConnected,
    InvalidIdentifier(String),
    Sqlite(rusqlite::Error),
}

impl Display for AdapterError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotConnected => write!(f, "adapter is not connected"),
            Self::InvalidIdentifier(name) => write!(f, "invalid sql identifier: {name}"),
            Self::Sqlite(err) => write!(f, "{err}"),
        }
    }
}

impl Error for AdapterError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::NotConnected | Self::InvalidIdentifier(_) => None,
        }
    }
}

impl From<rusqlite::Error> for AdapterError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}

/// Sort direction for one ordering column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

impl Display for Direction {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordering specification carrying exactly one column.
///
/// The single-column shape is deliberate: an ordering map with several
/// entries has no deterministic meaning, so it is unrepresentable here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderBy {
    /// Bare column; the store's default direction applies.
    Column(String),
    /// Column with an explicit direction.
    Directed(String, Direction),
}

impl OrderBy {
    pub fn column(name: impl Into<String>) -> Self {
        Self::Column(name.into())
    }

    pub fn directed(name: impl Into<String>, direction: Direction) -> Self {
        Self::Directed(name.into(), direction)
    }

    pub fn column_name(&self) -> &str {
        match self {
            Self::Column(name) | Self::Directed(name, _) => name,
        }
    }
}

/// Renders an ordering spec as a SQL fragment, empty for `None`.
pub fn render_order_by(order: Option<&OrderBy>) -> String {
    match order {
        None => String::new(),
        Some(OrderBy::Column(field)) => format!("order by {field}"),
        Some(OrderBy::Directed(field, direction)) => format!("order by {field} {direction}"),
    }
}

/// Row-level CRUD contract executed against a named table.
///
/// # Contract
/// - `select_by` returns rows in store order; callers must not assume any
///   sorting beyond the `order` argument.
/// - `insert` returns the store-assigned identity value, or `None` when the
///   store reports none.
/// - `update`/`delete` report whether at least one row was written.
pub trait Adapter {
    fn select_by(
        &self,
        table: &str,
        criteria: &Criteria,
        order: Option<&OrderBy>,
    ) -> AdapterResult<Vec<Row>>;

    fn insert(&self, table: &str, row: &Row, id_field: &str) -> AdapterResult<Option<Value>>;

    fn update(&self, table: &str, row: &Row, key: &Criteria) -> AdapterResult<bool>;

    fn delete(&self, table: &str, key: &Criteria) -> AdapterResult<bool>;

    fn is_connected(&self) -> bool;
}

#[cfg(test)]
mod tests {
    use super::{render_order_by, Direction, OrderBy};

    #[test]
    fn render_order_by_with_direction() {
        let order = OrderBy::directed("age", Direction::Desc);
        assert_eq!(render_order_by(Some(&order)), "order by age desc");
    }

    #[test]
    fn render_order_by_bare_column_uses_store_default() {
        let order = OrderBy::column("age");
        assert_eq!(render_order_by(Some(&order)), "order by age");
    }

    #[test]
    fn render_order_by_none_is_empty() {
        assert_eq!(render_order_by(None), "");
    }

    #[test]
    fn column_name_covers_both_shapes() {
        assert_eq!(OrderBy::column("age").column_name(), "age");
        assert_eq!(
            OrderBy::directed("age", Direction::Asc).column_name(),
            "age"
        );
    }
}
