//! Metadata-driven data mapper core.
//! Binds plain domain entities to relational rows through a table/field
//! metadata registry, without entities knowing about persistence.

pub mod adapter;
pub mod logging;
pub mod meta;
pub mod repo;

pub use adapter::{
    render_order_by, Adapter, AdapterError, AdapterResult, Between, Criteria, Criterion,
    Direction, OrderBy, Row, SqliteAdapter, Value,
};
pub use logging::{default_log_level, init_logging, logging_status};
pub use meta::{
    AccessorKind, EntityBinding, FieldConfig, FieldDef, FilterConfig, FilterDirection, MetaError,
    MetaRegistry, MetaResult, TableConfig, TableDef,
};
pub use repo::repository::{RepoError, RepoResult, Repository, SaveOutcome};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
