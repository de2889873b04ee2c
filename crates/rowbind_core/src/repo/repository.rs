//! Metadata-driven repository engine.
//!
//! # Responsibility
//! - Resolve table/field metadata and dispatch entity accessors by name.
//! - Orchestrate find/save/delete against a borrowed adapter.
//!
//! # Invariants
//! - Entities are only touched through their registered binding closures.
//! - Identity presence is the single source of truth for insert-vs-update.
//! - Result order always mirrors the adapter's row order.

use crate::adapter::{Adapter, AdapterError, Criteria, Criterion, Row, Value};
use crate::meta::{AccessorKind, FilterDirection, MetaRegistry, TableDef};
use log::debug;
use std::any::{type_name, Any, TypeId};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Mutex;

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error taxonomy.
///
/// Adapter failures are relayed unchanged; the repository neither retries
/// nor interprets them.
#[derive(Debug)]
pub enum RepoError {
    /// Explicitly named table is not in the registry.
    UnknownTable(String),
    /// Registry holds no tables, so no default table exists.
    NoTables,
    /// Entity type has no registered binding.
    UnboundType(&'static str),
    /// Identity field required but absent from the row (caller precondition).
    MissingIdentity { table: String, field: String },
    /// Binding produced an entity of an unexpected type.
    EntityTypeMismatch { class: String },
    Adapter(AdapterError),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownTable(name) => write!(f, "table not registered: {name}"),
            Self::NoTables => write!(f, "metadata registry has no tables"),
            Self::UnboundType(name) => write!(f, "entity type not bound: {name}"),
            Self::MissingIdentity { table, field } => {
                write!(f, "row for table {table} is missing identity field {field}")
            }
            Self::EntityTypeMismatch { class } => {
                write!(f, "binding for class {class} produced an unexpected entity type")
            }
            Self::Adapter(err) => write!(f, "{err}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Adapter(err) => Some(err),
            _ => None,
        }
    }
}

impl From<AdapterError> for RepoError {
    fn from(value: AdapterError) -> Self {
        Self::Adapter(value)
    }
}

/// Which write path `save_raw` took, with the relayed adapter outcome.
#[derive(Debug, Clone, PartialEq)]
pub enum SaveOutcome {
    /// Insert path; `Some` carries the store-assigned identity.
    Inserted(Option<Value>),
    /// Update path; `true` when the store reported a row written.
    Updated(bool),
}

impl SaveOutcome {
    pub fn succeeded(&self) -> bool {
        matches!(self, Self::Inserted(Some(_)) | Self::Updated(true))
    }

    pub fn inserted_id(&self) -> Option<&Value> {
        match self {
            Self::Inserted(Some(id)) => Some(id),
            _ => None,
        }
    }
}

/// Metadata-driven CRUD engine over a borrowed adapter.
///
/// Owns its registry (read-only after construction) and a memoization cache
/// for table-name resolution. The same adapter may back several
/// repositories.
pub struct Repository<'a, A: Adapter> {
    adapter: &'a A,
    registry: MetaRegistry,
    table_cache: Mutex<BTreeMap<String, String>>,
}

impl<'a, A: Adapter> Repository<'a, A> {
    pub fn new(adapter: &'a A, registry: MetaRegistry) -> Self {
        Self {
            adapter,
            registry,
            table_cache: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn registry(&self) -> &MetaRegistry {
        &self.registry
    }

    pub fn adapter(&self) -> &A {
        self.adapter
    }

    // --- metadata resolution ---

    /// Resolves a table name from an entity class identifier.
    ///
    /// No class means the first-registered (default) table. Successful
    /// resolutions are memoized; a cache hit short-circuits the scan.
    pub fn table_name(&self, class: Option<&str>) -> Option<String> {
        let cache_key = format!("table_name|{}|", class.unwrap_or(""));
        if let Ok(cache) = self.table_cache.lock() {
            if let Some(hit) = cache.get(&cache_key) {
                return Some(hit.clone());
            }
        }

        let resolved = match class {
            None => self.registry.first(),
            Some(class) => self.registry.table_for_class(class),
        }
        .map(|table| table.name().to_string())?;

        if let Ok(mut cache) = self.table_cache.lock() {
            cache.insert(cache_key, resolved.clone());
        }
        Some(resolved)
    }

    pub fn id_field(&self, table: &str) -> RepoResult<&str> {
        Ok(self.table(table)?.id_field())
    }

    /// Known field names of a table, in declaration order.
    pub fn fields(&self, table: &str) -> RepoResult<Vec<&str>> {
        Ok(self.table(table)?.field_names())
    }

    /// Resolves the accessor name for a field and operation kind.
    ///
    /// Fallback policy: a field with no descriptor, or a descriptor that
    /// declares neither accessor, yields the conventional synthesized name;
    /// a descriptor that merely omits the requested kind yields `None`.
    pub fn field_method(
        &self,
        table: &str,
        field: &str,
        kind: AccessorKind,
    ) -> RepoResult<Option<String>> {
        Ok(field_method_in(self.table(table)?, field, kind))
    }

    pub fn field_filter(
        &self,
        table: &str,
        field: &str,
        direction: FilterDirection,
    ) -> RepoResult<Option<&str>> {
        Ok(self
            .table(table)?
            .field(field)
            .and_then(|def| def.filter(direction)))
    }

    /// Declared validator names for a field, empty when undeclared.
    pub fn field_validators(&self, table: &str, field: &str) -> RepoResult<&[String]> {
        Ok(self
            .table(table)?
            .field(field)
            .map(|def| def.validators())
            .unwrap_or(&[]))
    }

    fn table(&self, name: &str) -> RepoResult<&TableDef> {
        self.registry
            .table(name)
            .ok_or_else(|| RepoError::UnknownTable(name.to_string()))
    }

    fn table_or_default(&self, table: Option<&str>) -> RepoResult<&TableDef> {
        match table {
            Some(name) => self.table(name),
            None => self.registry.first().ok_or(RepoError::NoTables),
        }
    }

    fn table_for_entity<E: Any>(&self) -> RepoResult<&TableDef> {
        self.registry
            .table_for_type(TypeId::of::<E>())
            .ok_or_else(|| RepoError::UnboundType(type_name::<E>()))
    }

    // --- entity field access ---

    /// Reads a field through its get accessor, applying the declared output
    /// filter. `None` when no accessor is resolvable.
    pub fn get_field<E: Any>(&self, entity: &E, field: &str) -> RepoResult<Option<Value>> {
        let table = self.table_for_entity::<E>()?;
        Ok(get_field_on(table, entity, field))
    }

    /// Writes a field through its set accessor, applying the declared input
    /// filter first. `false` when no set accessor is resolvable.
    pub fn set_field<E: Any>(&self, entity: &mut E, field: &str, value: Value) -> RepoResult<bool> {
        let table = self.table_for_entity::<E>()?;
        Ok(set_field_on(table, entity, field, value))
    }

    /// Runs declared validators in order, short-circuiting on the first
    /// rejection. Validators the binding does not register are skipped.
    pub fn validate_field<E: Any>(
        &self,
        entity: &E,
        field: &str,
        value: &Value,
    ) -> RepoResult<bool> {
        let table = self.table_for_entity::<E>()?;
        let Some(def) = table.field(field) else {
            return Ok(true);
        };
        for validator in def.validators() {
            if let Some(false) = table.binding().validate(entity, validator, value) {
                return Ok(false);
            }
        }
        Ok(true)
    }

    // --- entity/row translation ---

    /// Applies a row onto an entity. Row keys outside the table's known
    /// fields are silently dropped.
    pub fn load<E: Any>(&self, entity: &mut E, row: &Row) -> RepoResult<()> {
        let table = self.table_for_entity::<E>()?;
        load_on(table, entity, row);
        Ok(())
    }

    /// Snapshots an entity into a row covering every known field; values
    /// with no resolvable accessor become `Value::Null` entries.
    pub fn reserve<E: Any>(&self, entity: &E) -> RepoResult<Row> {
        let table = self.table_for_entity::<E>()?;
        Ok(reserve_on(table, entity))
    }

    /// Instantiates a zero-valued entity, loading `row` into it when given.
    pub fn create<E: Any>(&self, row: Option<&Row>) -> RepoResult<E> {
        let table = self.table_for_entity::<E>()?;
        let mut entity = table.binding().new_entity();
        if let Some(row) = row {
            load_on(table, entity.as_mut(), row);
        }
        match entity.downcast::<E>() {
            Ok(boxed) => Ok(*boxed),
            Err(_) => Err(RepoError::EntityTypeMismatch {
                class: table.class().to_string(),
            }),
        }
    }

    // --- row-level primitives ---

    pub fn find_raw(&self, criteria: &Criteria, table: Option<&str>) -> RepoResult<Vec<Row>> {
        let table = self.table_or_default(table)?;
        Ok(self.adapter.select_by(table.name(), criteria, None)?)
    }

    /// Inserts a row, stripping any caller-supplied identity first.
    ///
    /// Returns the store-assigned identity, or `None` when the adapter
    /// reports none.
    pub fn insert_raw(&self, mut row: Row, table: Option<&str>) -> RepoResult<Option<Value>> {
        let table = self.table_or_default(table)?;
        row.remove(table.id_field());
        let id = self.adapter.insert(table.name(), &row, table.id_field())?;
        debug!(
            "event=insert_raw module=repo table={} assigned={}",
            table.name(),
            id.is_some()
        );
        Ok(id)
    }

    /// Updates the row keyed by its identity field.
    ///
    /// The identity must be present in `row`; its absence is a caller
    /// precondition violation and fails loudly.
    pub fn update_raw(&self, mut row: Row, table: Option<&str>) -> RepoResult<bool> {
        let table = self.table_or_default(table)?;
        let id = row
            .remove(table.id_field())
            .ok_or_else(|| RepoError::MissingIdentity {
                table: table.name().to_string(),
                field: table.id_field().to_string(),
            })?;
        let key = Criteria::from([(table.id_field().to_string(), Criterion::Eq(id))]);
        Ok(self.adapter.update(table.name(), &row, &key)?)
    }

    /// Routes to update iff the identity field is present and non-empty,
    /// otherwise to insert. This presence check is the single source of
    /// truth for insert-vs-update branching.
    pub fn save_raw(&self, row: Row, table: Option<&str>) -> RepoResult<SaveOutcome> {
        let table = self.table_or_default(table)?;
        let has_id = row
            .get(table.id_field())
            .map(is_present_id)
            .unwrap_or(false);
        if has_id {
            let updated = self.update_raw(row, Some(table.name()))?;
            Ok(SaveOutcome::Updated(updated))
        } else {
            let id = self.insert_raw(row, Some(table.name()))?;
            Ok(SaveOutcome::Inserted(id))
        }
    }

    pub fn delete_by_id(&self, id: Value, table: Option<&str>) -> RepoResult<bool> {
        let table = self.table_or_default(table)?;
        let key = Criteria::from([(table.id_field().to_string(), Criterion::Eq(id))]);
        Ok(self.adapter.delete(table.name(), &key)?)
    }

    // --- entity-level CRUD ---

    /// Persists an entity, branching on identity presence; a successful
    /// insert writes the newly assigned identity back into the entity.
    pub fn save<E: Any>(&self, entity: &mut E) -> RepoResult<bool> {
        let table = self.table_for_entity::<E>()?;
        let table_name = table.name().to_string();
        let id_field = table.id_field().to_string();
        let row = reserve_on(table, entity);

        let has_id = row.get(&id_field).map(is_present_id).unwrap_or(false);
        if has_id {
            let updated = self.update_raw(row, Some(&table_name))?;
            debug!("event=save module=repo table={table_name} mode=update written={updated}");
            Ok(updated)
        } else {
            match self.insert_raw(row, Some(&table_name))? {
                Some(id) => {
                    set_field_on(table, entity, &id_field, id);
                    debug!("event=save module=repo table={table_name} mode=insert status=ok");
                    Ok(true)
                }
                None => Ok(false),
            }
        }
    }

    /// Deletes an entity by its identity. An entity with an empty or absent
    /// identity was never persisted, so this reports failure without
    /// touching the adapter.
    pub fn delete<E: Any>(&self, entity: &E) -> RepoResult<bool> {
        let table = self.table_for_entity::<E>()?;
        match get_field_on(table, entity, table.id_field()) {
            Some(id) if is_present_id(&id) => self.delete_by_id(id, Some(table.name())),
            _ => Ok(false),
        }
    }

    /// Finds entities matching `criteria`, preserving the adapter's row
    /// order in the result.
    pub fn find<E: Any>(&self, criteria: &Criteria) -> RepoResult<Vec<E>> {
        let table = self.table_for_entity::<E>()?;
        let rows = self.adapter.select_by(table.name(), criteria, None)?;
        debug!(
            "event=find module=repo table={} rows={}",
            table.name(),
            rows.len()
        );
        let mut items = Vec::with_capacity(rows.len());
        for row in rows {
            items.push(self.create::<E>(Some(&row))?);
        }
        Ok(items)
    }

    pub fn find_one<E: Any>(&self, criteria: &Criteria) -> RepoResult<Option<E>> {
        Ok(self.find::<E>(criteria)?.into_iter().next())
    }

    pub fn find_by_id<E: Any>(&self, id: impl Into<Value>) -> RepoResult<Option<E>> {
        let table = self.table_for_entity::<E>()?;
        let criteria = Criteria::from([(table.id_field().to_string(), Criterion::Eq(id.into()))]);
        self.find_one::<E>(&criteria)
    }
}

fn field_method_in(table: &TableDef, field: &str, kind: AccessorKind) -> Option<String> {
    match table.field(field) {
        None => Some(kind.conventional_accessor(field)),
        Some(def) if def.declares_no_accessors() => Some(kind.conventional_accessor(field)),
        Some(def) => def.accessor(kind).map(str::to_string),
    }
}

fn get_field_on(table: &TableDef, entity: &dyn Any, field: &str) -> Option<Value> {
    let accessor = field_method_in(table, field, AccessorKind::Get)?;
    let value = table.binding().get(entity, &accessor)?;
    match table
        .field(field)
        .and_then(|def| def.filter(FilterDirection::Output))
    {
        Some(filter) => Some(table.binding().filter(entity, filter, value)),
        None => Some(value),
    }
}

// Order is fixed: input filter first, then the set accessor.
fn set_field_on(table: &TableDef, entity: &mut dyn Any, field: &str, value: Value) -> bool {
    let value = match table
        .field(field)
        .and_then(|def| def.filter(FilterDirection::Input))
    {
        Some(filter) => table.binding().filter(&*entity, filter, value),
        None => value,
    };
    let Some(accessor) = field_method_in(table, field, AccessorKind::Set) else {
        return false;
    };
    table.binding().set(entity, &accessor, value)
}

fn load_on(table: &TableDef, entity: &mut dyn Any, row: &Row) {
    for (field, value) in row {
        if table.field(field).is_none() {
            // Unknown column, skip.
            continue;
        }
        set_field_on(table, entity, field, value.clone());
    }
}

fn reserve_on(table: &TableDef, entity: &dyn Any) -> Row {
    let mut row = Row::new();
    for field in table.field_names() {
        let value = get_field_on(table, entity, field).unwrap_or(Value::Null);
        row.insert(field.to_string(), value);
    }
    row
}

/// Identity presence check driving insert-vs-update branching.
///
/// Empty means `Null`, integer zero, or empty text, mirroring how
/// store-assigned identities start out unset.
fn is_present_id(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Integer(id) => *id != 0,
        Value::Text(id) => !id.is_empty(),
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::is_present_id;
    use crate::adapter::Value;

    #[test]
    fn empty_identity_values_are_absent() {
        assert!(!is_present_id(&Value::Null));
        assert!(!is_present_id(&Value::Integer(0)));
        assert!(!is_present_id(&Value::Text(String::new())));
    }

    #[test]
    fn concrete_identity_values_are_present() {
        assert!(is_present_id(&Value::Integer(5)));
        assert!(is_present_id(&Value::Text("a1".to_string())));
    }
}
