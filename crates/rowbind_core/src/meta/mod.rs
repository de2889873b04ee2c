//! Table and field metadata registry.
//!
//! # Responsibility
//! - Describe how each table maps to an entity type and its field accessors.
//! - Reject registrations that would make reverse lookup ambiguous.
//!
//! # Invariants
//! - Table names are unique registry keys; registration order is preserved
//!   and the first-registered table is the default table.
//! - Each entity class and Rust type appears at most once across a registry.

use serde::Deserialize;
use std::any::{Any, TypeId};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

mod binding;

pub use binding::EntityBinding;
pub(crate) use binding::ErasedBinding;

/// Accessor operation kind for field-method resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessorKind {
    Get,
    Set,
}

impl AccessorKind {
    pub fn prefix(self) -> &'static str {
        match self {
            Self::Get => "get",
            Self::Set => "set",
        }
    }

    /// Synthesizes the conventional accessor name for a field, e.g.
    /// `Set` + `name` -> `setName`.
    pub fn conventional_accessor(self, field: &str) -> String {
        let mut name = String::with_capacity(self.prefix().len() + field.len());
        name.push_str(self.prefix());
        let mut chars = field.chars();
        if let Some(first) = chars.next() {
            name.extend(first.to_uppercase());
            name.push_str(chars.as_str());
        }
        name
    }
}

/// Conversion direction for field filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterDirection {
    /// Row to entity, applied before the set accessor.
    Input,
    /// Entity to row, applied after the get accessor.
    Output,
}

/// Per-field accessor, filter, and validator names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldDef {
    name: String,
    get: Option<String>,
    set: Option<String>,
    input_filter: Option<String>,
    output_filter: Option<String>,
    validators: Vec<String>,
}

impl FieldDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_get(mut self, accessor: impl Into<String>) -> Self {
        self.get = Some(accessor.into());
        self
    }

    pub fn with_set(mut self, accessor: impl Into<String>) -> Self {
        self.set = Some(accessor.into());
        self
    }

    pub fn with_input_filter(mut self, filter: impl Into<String>) -> Self {
        self.input_filter = Some(filter.into());
        self
    }

    pub fn with_output_filter(mut self, filter: impl Into<String>) -> Self {
        self.output_filter = Some(filter.into());
        self
    }

    pub fn with_validator(mut self, validator: impl Into<String>) -> Self {
        self.validators.push(validator.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn accessor(&self, kind: AccessorKind) -> Option<&str> {
        match kind {
            AccessorKind::Get => self.get.as_deref(),
            AccessorKind::Set => self.set.as_deref(),
        }
    }

    pub fn filter(&self, direction: FilterDirection) -> Option<&str> {
        match direction {
            FilterDirection::Input => self.input_filter.as_deref(),
            FilterDirection::Output => self.output_filter.as_deref(),
        }
    }

    /// Declared validator names in declaration order.
    pub fn validators(&self) -> &[String] {
        &self.validators
    }

    /// True when the descriptor declares neither accessor, which makes the
    /// conventional fallback apply for both kinds.
    pub fn declares_no_accessors(&self) -> bool {
        self.get.is_none() && self.set.is_none()
    }
}

/// Metadata unit binding one table name to an entity type and its fields.
pub struct TableDef {
    name: String,
    id_field: String,
    fields: Vec<FieldDef>,
    binding: Box<dyn ErasedBinding>,
}

impl TableDef {
    pub fn new<E: Any + Send + Sync>(
        name: impl Into<String>,
        id_field: impl Into<String>,
        binding: EntityBinding<E>,
    ) -> Self {
        Self {
            name: name.into(),
            id_field: id_field.into(),
            fields: Vec::new(),
            binding: Box::new(binding),
        }
    }

    /// Builds a table descriptor from an external config document.
    ///
    /// The config `class` must match the binding's class. Config fields
    /// deserialize from a map, so field order here is name-sorted; tables
    /// built through `with_field` keep declaration order instead.
    pub fn from_config<E: Any + Send + Sync>(
        name: impl Into<String>,
        config: &TableConfig,
        binding: EntityBinding<E>,
    ) -> Result<Self, MetaError> {
        let name = name.into();
        if config.class != binding.class() {
            return Err(MetaError::ClassMismatch {
                table: name,
                config_class: config.class.clone(),
                binding_class: binding.class().to_string(),
            });
        }

        let mut table = Self::new(name, config.id.clone(), binding);
        for (field_name, field_config) in &config.fields {
            let mut field = FieldDef::new(field_name.clone());
            field.get = field_config.get.clone();
            field.set = field_config.set.clone();
            field.input_filter = field_config.filters.input.clone();
            field.output_filter = field_config.filters.output.clone();
            field.validators = field_config.validators.clone();
            table.fields.push(field);
        }
        Ok(table)
    }

    pub fn with_field(mut self, field: FieldDef) -> Self {
        self.fields.push(field);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Entity-type identifier carried by the binding.
    pub fn class(&self) -> &str {
        self.binding.class()
    }

    pub fn id_field(&self) -> &str {
        &self.id_field
    }

    /// Known field names in declaration order.
    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(FieldDef::name).collect()
    }

    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|field| field.name == name)
    }

    pub(crate) fn binding(&self) -> &dyn ErasedBinding {
        self.binding.as_ref()
    }

    pub(crate) fn entity_type(&self) -> TypeId {
        self.binding.entity_type()
    }
}

impl std::fmt::Debug for TableDef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TableDef")
            .field("name", &self.name)
            .field("class", &self.class())
            .field("id_field", &self.id_field)
            .field("fields", &self.fields)
            .finish_non_exhaustive()
    }
}

/// Registry of table descriptors, keyed by table name.
#[derive(Default)]
pub struct MetaRegistry {
    tables: Vec<TableDef>,
}

impl MetaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers one table descriptor.
    pub fn register(&mut self, table: TableDef) -> Result<(), MetaError> {
        if !is_valid_table_name(&table.name) {
            return Err(MetaError::InvalidTableName(table.name));
        }
        if self.table(&table.name).is_some() {
            return Err(MetaError::DuplicateTable(table.name));
        }
        let duplicate_class = self.tables.iter().any(|existing| {
            existing.class() == table.class() || existing.entity_type() == table.entity_type()
        });
        if duplicate_class {
            return Err(MetaError::DuplicateClass(table.class().to_string()));
        }

        self.tables.push(table);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn table(&self, name: &str) -> Option<&TableDef> {
        self.tables.iter().find(|table| table.name == name)
    }

    /// First-registered table, the default for single-table repositories.
    pub fn first(&self) -> Option<&TableDef> {
        self.tables.first()
    }

    pub fn table_for_class(&self, class: &str) -> Option<&TableDef> {
        self.tables.iter().find(|table| table.class() == class)
    }

    pub(crate) fn table_for_type(&self, entity_type: TypeId) -> Option<&TableDef> {
        self.tables
            .iter()
            .find(|table| table.entity_type() == entity_type)
    }

    /// Table names in registration order.
    pub fn table_names(&self) -> Vec<&str> {
        self.tables.iter().map(TableDef::name).collect()
    }
}

pub type MetaResult<T> = Result<T, MetaError>;

/// Registry build errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetaError {
    InvalidTableName(String),
    DuplicateTable(String),
    DuplicateClass(String),
    ClassMismatch {
        table: String,
        config_class: String,
        binding_class: String,
    },
}

impl Display for MetaError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidTableName(name) => write!(f, "table name is invalid: {name}"),
            Self::DuplicateTable(name) => write!(f, "table already registered: {name}"),
            Self::DuplicateClass(class) => {
                write!(f, "entity class already registered: {class}")
            }
            Self::ClassMismatch {
                table,
                config_class,
                binding_class,
            } => write!(
                f,
                "table {table} config declares class {config_class} but binding is {binding_class}"
            ),
        }
    }
}

impl Error for MetaError {}

/// External metadata document for one table.
///
/// Key names follow the established configuration schema so existing
/// metadata files remain loadable.
#[derive(Debug, Clone, Deserialize)]
pub struct TableConfig {
    pub class: String,
    pub id: String,
    #[serde(default)]
    pub fields: BTreeMap<String, FieldConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FieldConfig {
    pub get: Option<String>,
    pub set: Option<String>,
    #[serde(default)]
    pub filters: FilterConfig,
    #[serde(default)]
    pub validators: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FilterConfig {
    pub input: Option<String>,
    pub output: Option<String>,
}

fn is_valid_table_name(value: &str) -> bool {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
