//! Typed criteria fragments passed through find-style calls to adapters.
//!
//! # Responsibility
//! - Express equality and range predicates without raw SQL at call sites.
//!
//! # Invariants
//! - `Between` is immutable after construction; bounds are inclusive.

use crate::adapter::Value;
use std::collections::BTreeMap;

/// Criteria mapping from field name to predicate, as consumed by adapters.
pub type Criteria = BTreeMap<String, Criterion>;

/// One predicate against a single column.
#[derive(Debug, Clone, PartialEq)]
pub enum Criterion {
    /// Equality against a scalar; `Value::Null` means `IS NULL`.
    Eq(Value),
    /// Inclusive range comparison.
    Between(Between),
}

impl Criterion {
    /// Builds an equality criterion from any scalar convertible to `Value`.
    pub fn eq(value: impl Into<Value>) -> Self {
        Self::Eq(value.into())
    }

    /// Builds an inclusive range criterion.
    pub fn between(start: impl Into<Value>, end: impl Into<Value>) -> Self {
        Self::Between(Between::new(start, end))
    }
}

/// Inclusive range pair signaling a `BETWEEN` predicate to the adapter.
///
/// Both bounds must be plain scalars of the same comparable type as the
/// target column; the core does not check bound ordering.
#[derive(Debug, Clone, PartialEq)]
pub struct Between {
    start: Value,
    end: Value,
}

impl Between {
    pub fn new(start: impl Into<Value>, end: impl Into<Value>) -> Self {
        Self {
            start: start.into(),
            end: end.into(),
        }
    }

    pub fn start(&self) -> &Value {
        &self.start
    }

    pub fn end(&self) -> &Value {
        &self.end
    }
}
