//! Schema lookup for typed objects.
//!
//! An [`ObjectValue`](crate::model::ObjectValue) consults its registry when a
//! field is read but was never set. The registry answers three questions: what
//! type a field is declared with, whether a type is an object type, and which
//! default value a type has.

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::model::{ListRef, MapValue, Val};

/// Read-only schema service shared by objects.
pub trait SchemaRegistry: fmt::Debug + Send + Sync {
    /// Returns the declared type of `field` on object type `type_name`.
    fn field_type(&self, type_name: &str, field: &str) -> Option<Arc<str>>;

    /// Returns true if `type_name` is a registered object type.
    fn is_object(&self, type_name: &str) -> bool;

    /// Returns the default value for a non-object type.
    fn default_value(&self, type_name: &str) -> Option<Val<'static>>;
}

/// An object type: a name and its declared fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaType {
    name: Arc<str>,
    fields: FxHashMap<String, Arc<str>>,
}

impl SchemaType {
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self {
            name: name.into(),
            fields: FxHashMap::default(),
        }
    }

    /// Declares a field with the given type name.
    pub fn field(mut self, name: impl Into<String>, type_name: impl Into<Arc<str>>) -> Self {
        self.fields.insert(name.into(), type_name.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn field_type(&self, name: &str) -> Option<&Arc<str>> {
        self.fields.get(name)
    }
}

/// In-memory schema registry.
///
/// Types and defaults are registered up front; the context is then shared
/// behind an `Arc` by every object built against it.
#[derive(Debug, Clone, Default)]
pub struct SchemaContext {
    types: FxHashMap<Arc<str>, SchemaType>,
    defaults: FxHashMap<Arc<str>, Val<'static>>,
}

impl SchemaContext {
    /// Creates an empty context with no types and no defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a context carrying zero-value defaults for the built-in types.
    pub fn with_standard_defaults() -> Self {
        let mut ctx = Self::new();
        ctx.set_default("bool", Val::Bool(false));
        ctx.set_default("bytes", Val::Bytes(Cow::Borrowed(&[])));
        ctx.set_default("double", Val::Double(0.0));
        ctx.set_default("int", Val::Int(0));
        ctx.set_default("uint", Val::Uint(0));
        ctx.set_default("string", Val::String(Cow::Borrowed("")));
        ctx.set_default("null", Val::Null);
        ctx.set_default("list", Val::List(ListRef::Vals(Vec::new())));
        ctx.set_default("map", Val::Map(Cow::Owned(MapValue::new())));
        ctx
    }

    /// Registers an object type, replacing any previous one of the same name.
    pub fn add_type(&mut self, schema_type: SchemaType) {
        self.types.insert(Arc::clone(&schema_type.name), schema_type);
    }

    /// Sets the default value for a type name.
    pub fn set_default(&mut self, type_name: impl Into<Arc<str>>, value: Val<'static>) {
        self.defaults.insert(type_name.into(), value);
    }

    pub fn get_type(&self, name: &str) -> Option<&SchemaType> {
        self.types.get(name)
    }
}

impl SchemaRegistry for SchemaContext {
    fn field_type(&self, type_name: &str, field: &str) -> Option<Arc<str>> {
        self.types
            .get(type_name)
            .and_then(|t| t.field_type(field))
            .cloned()
    }

    fn is_object(&self, type_name: &str) -> bool {
        self.types.contains_key(type_name)
    }

    fn default_value(&self, type_name: &str) -> Option<Val<'static>> {
        self.defaults.get(type_name).cloned()
    }
}
