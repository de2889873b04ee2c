//! Per-entity-type accessor bindings.
//!
//! # Responsibility
//! - Register named get/set/filter/validate closures for one entity type.
//! - Erase the entity type so one registry can hold heterogeneous bindings.
//!
//! # Invariants
//! - Accessors are resolved by name; a name with no registered closure is
//!   skipped, never an error.
//! - Closures are registered once at registry-build time and immutable after.

use crate::adapter::Value;
use std::any::{Any, TypeId};
use std::collections::BTreeMap;

type NewFn<E> = Box<dyn Fn() -> E + Send + Sync>;
type GetFn<E> = Box<dyn Fn(&E) -> Value + Send + Sync>;
type SetFn<E> = Box<dyn Fn(&mut E, Value) + Send + Sync>;
type FilterFn<E> = Box<dyn Fn(&E, Value) -> Value + Send + Sync>;
type ValidateFn<E> = Box<dyn Fn(&E, &Value) -> bool + Send + Sync>;

/// Named accessor table for one entity type.
///
/// The binding is the entity capability contract: the repository reads and
/// writes entities exclusively through closures registered here, looked up
/// by the accessor names declared in field metadata.
pub struct EntityBinding<E> {
    class: String,
    new_fn: NewFn<E>,
    getters: BTreeMap<String, GetFn<E>>,
    setters: BTreeMap<String, SetFn<E>>,
    filters: BTreeMap<String, FilterFn<E>>,
    validators: BTreeMap<String, ValidateFn<E>>,
}

impl<E: Any + Send + Sync> EntityBinding<E> {
    /// Creates a binding for `class` with a zero-value constructor.
    ///
    /// `class` is the entity-type identifier used for reverse lookup from
    /// metadata; it must be unique across a registry.
    pub fn new(class: impl Into<String>, new_fn: impl Fn() -> E + Send + Sync + 'static) -> Self {
        Self {
            class: class.into(),
            new_fn: Box::new(new_fn),
            getters: BTreeMap::new(),
            setters: BTreeMap::new(),
            filters: BTreeMap::new(),
            validators: BTreeMap::new(),
        }
    }

    pub fn class(&self) -> &str {
        &self.class
    }

    pub fn with_getter(
        mut self,
        name: impl Into<String>,
        f: impl Fn(&E) -> Value + Send + Sync + 'static,
    ) -> Self {
        self.getters.insert(name.into(), Box::new(f));
        self
    }

    pub fn with_setter(
        mut self,
        name: impl Into<String>,
        f: impl Fn(&mut E, Value) + Send + Sync + 'static,
    ) -> Self {
        self.setters.insert(name.into(), Box::new(f));
        self
    }

    /// Registers a value filter usable in either conversion direction.
    pub fn with_filter(
        mut self,
        name: impl Into<String>,
        f: impl Fn(&E, Value) -> Value + Send + Sync + 'static,
    ) -> Self {
        self.filters.insert(name.into(), Box::new(f));
        self
    }

    pub fn with_validator(
        mut self,
        name: impl Into<String>,
        f: impl Fn(&E, &Value) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.validators.insert(name.into(), Box::new(f));
        self
    }
}

/// Object-safe view over an `EntityBinding` with the entity type erased.
///
/// Downcast failures behave like missing accessors: reads return `None`,
/// writes report `false`.
pub(crate) trait ErasedBinding: Send + Sync {
    fn class(&self) -> &str;

    fn entity_type(&self) -> TypeId;

    fn new_entity(&self) -> Box<dyn Any>;

    fn get(&self, entity: &dyn Any, accessor: &str) -> Option<Value>;

    fn set(&self, entity: &mut dyn Any, accessor: &str, value: Value) -> bool;

    /// Applies the named filter, passing the value through unchanged when the
    /// filter is not registered.
    fn filter(&self, entity: &dyn Any, name: &str, value: Value) -> Value;

    /// Runs the named validator; `None` when it is not registered.
    fn validate(&self, entity: &dyn Any, name: &str, value: &Value) -> Option<bool>;
}

impl<E: Any + Send + Sync> ErasedBinding for EntityBinding<E> {
    fn class(&self) -> &str {
        &self.class
    }

    fn entity_type(&self) -> TypeId {
        TypeId::of::<E>()
    }

    fn new_entity(&self) -> Box<dyn Any> {
        Box::new((self.new_fn)())
    }

    fn get(&self, entity: &dyn Any, accessor: &str) -> Option<Value> {
        let entity = entity.downcast_ref::<E>()?;
        let getter = self.getters.get(accessor)?;
        Some(getter(entity))
    }

    fn set(&self, entity: &mut dyn Any, accessor: &str, value: Value) -> bool {
        let Some(entity) = entity.downcast_mut::<E>() else {
            return false;
        };
        match self.setters.get(accessor) {
            Some(setter) => {
                setter(entity, value);
                true
            }
            None => false,
        }
    }

    fn filter(&self, entity: &dyn Any, name: &str, value: Value) -> Value {
        match (entity.downcast_ref::<E>(), self.filters.get(name)) {
            (Some(entity), Some(filter)) => filter(entity, value),
            _ => value,
        }
    }

    fn validate(&self, entity: &dyn Any, name: &str, value: &Value) -> Option<bool> {
        let entity = entity.downcast_ref::<E>()?;
        let validator = self.validators.get(name)?;
        Some(validator(entity, value))
    }
}

#[cfg(test)]
mod tests {
    use super::{EntityBinding, ErasedBinding};
    use crate::adapter::Value;

    #[derive(Default)]
    struct Probe {
        label: String,
    }

    fn probe_binding() -> EntityBinding<Probe> {
        EntityBinding::new("Probe", Probe::default)
            .with_getter("getLabel", |probe| Value::Text(probe.label.clone()))
            .with_setter("setLabel", |probe, value| {
                if let Value::Text(label) = value {
                    probe.label = label;
                }
            })
            .with_filter("upper", |_, value| match value {
                Value::Text(text) => Value::Text(text.to_uppercase()),
                other => other,
            })
            .with_validator("nonEmpty", |_, value| {
                !matches!(value, Value::Text(text) if text.is_empty())
            })
    }

    #[test]
    fn named_accessors_dispatch_through_erasure() {
        let binding = probe_binding();
        let mut entity = binding.new_entity();

        assert!(binding.set(entity.as_mut(), "setLabel", Value::Text("x".to_string())));
        assert_eq!(
            binding.get(entity.as_ref(), "getLabel"),
            Some(Value::Text("x".to_string()))
        );
    }

    #[test]
    fn unregistered_accessors_are_skipped() {
        let binding = probe_binding();
        let mut entity = binding.new_entity();

        assert!(!binding.set(entity.as_mut(), "setGhost", Value::Null));
        assert_eq!(binding.get(entity.as_ref(), "getGhost"), None);
        assert_eq!(binding.validate(entity.as_ref(), "ghostCheck", &Value::Null), None);
    }

    #[test]
    fn missing_filter_passes_value_through() {
        let binding = probe_binding();
        let entity = binding.new_entity();

        let filtered = binding.filter(entity.as_ref(), "upper", Value::Text("ab".to_string()));
        assert_eq!(filtered, Value::Text("AB".to_string()));
        let untouched = binding.filter(entity.as_ref(), "ghost", Value::Text("ab".to_string()));
        assert_eq!(untouched, Value::Text("ab".to_string()));
    }
}
