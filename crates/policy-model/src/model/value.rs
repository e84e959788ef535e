//! The policy value graph.
//!
//! Decoded documents become a tree of [`DynValue`] nodes. Each node records the
//! source id it was built from and holds a [`ValueNode`]: a scalar, a list, or a
//! map of named fields. Maps can later be given a schema type by converting them
//! into an [`ObjectValue`].

use std::borrow::Cow;
use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::error::{BuildError, ValueError};
use crate::model::val::{no_such_overload, ListRef, Type, Val};
use crate::model::{FromVal, Id, SchemaRegistry, SourceInfo, NIL_ID};
use crate::util::Timestamp;

/// Payload of a [`DynValue`].
#[derive(Debug, Clone, Default, PartialEq)]
pub enum ValueNode {
    /// Not yet populated.
    #[default]
    Absent,
    Bool(bool),
    Bytes(Vec<u8>),
    Double(f64),
    Int(i64),
    Uint(u64),
    String(String),
    Null,
    Timestamp(Timestamp),
    List(ListValue),
    Map(MapValue),
    /// A map re-typed in place by [`DynValue::convert_to_object`].
    Object(ObjectValue),
}

impl ValueNode {
    /// Returns the kind name used in diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            ValueNode::Absent => "absent",
            ValueNode::Bool(_) => "bool",
            ValueNode::Bytes(_) => "bytes",
            ValueNode::Double(_) => "double",
            ValueNode::Int(_) => "int",
            ValueNode::Uint(_) => "uint",
            ValueNode::String(_) => "string",
            ValueNode::Null => "null",
            ValueNode::Timestamp(_) => "timestamp",
            ValueNode::List(_) => "list",
            ValueNode::Map(_) => "map",
            ValueNode::Object(_) => "object",
        }
    }

    /// Converts a scalar expression value into a node.
    ///
    /// Lists, maps, objects, types and errors are rejected; they are built
    /// structurally rather than assigned.
    pub fn from_scalar(target: &'static str, value: Val<'_>) -> Result<Self, BuildError> {
        let node = match value {
            Val::Bool(b) => ValueNode::Bool(b),
            Val::Bytes(b) => ValueNode::Bytes(b.into_owned()),
            Val::Double(d) => ValueNode::Double(d),
            Val::Int(i) => ValueNode::Int(i),
            Val::Uint(u) => ValueNode::Uint(u),
            Val::String(s) => ValueNode::String(s.into_owned()),
            Val::Null => ValueNode::Null,
            Val::Timestamp(ts) => ValueNode::Timestamp(ts),
            other => {
                return Err(BuildError::UnsupportedValueKind {
                    target,
                    kind: other.kind_name().to_string(),
                });
            }
        };
        Ok(node)
    }
}

/// Structural commitment of a [`DynValue`].
///
/// A node starts `Unset`; the first structural operation fixes it as a list or
/// a struct and it stays that way.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    Unset,
    List,
    Struct,
}

impl Shape {
    pub fn name(&self) -> &'static str {
        match self {
            Shape::Unset => "unset",
            Shape::List => "list",
            Shape::Struct => "struct",
        }
    }
}

/// A value node tagged with its source id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DynValue {
    pub id: Id,
    pub value: ValueNode,
}

impl DynValue {
    /// Creates an absent node.
    pub fn new(id: Id) -> Self {
        Self {
            id,
            value: ValueNode::Absent,
        }
    }

    pub fn with_value(id: Id, value: ValueNode) -> Self {
        Self { id, value }
    }

    /// Returns the structural commitment. Scalars count as uncommitted.
    pub fn shape(&self) -> Shape {
        match self.value {
            ValueNode::List(_) => Shape::List,
            ValueNode::Map(_) | ValueNode::Object(_) => Shape::Struct,
            _ => Shape::Unset,
        }
    }

    /// Returns true once any value has been stored.
    pub fn is_set(&self) -> bool {
        !matches!(self.value, ValueNode::Absent)
    }

    /// Returns the model type of the payload, or `None` while absent.
    pub fn model_type(&self) -> Option<Type> {
        let t = match &self.value {
            ValueNode::Absent => return None,
            ValueNode::Bool(_) => Type::Bool,
            ValueNode::Bytes(_) => Type::Bytes,
            ValueNode::Double(_) => Type::Double,
            ValueNode::Int(_) => Type::Int,
            ValueNode::Uint(_) => Type::Uint,
            ValueNode::String(_) => Type::String,
            ValueNode::Null => Type::Null,
            ValueNode::Timestamp(_) => Type::Timestamp,
            ValueNode::List(_) => Type::List,
            ValueNode::Map(_) => Type::Map,
            ValueNode::Object(obj) => Type::Object(obj.object_type()),
        };
        Some(t)
    }

    /// Returns the expression view of the payload.
    ///
    /// Strings, bytes, lists and maps are borrowed, not copied. An absent node
    /// yields an [`ValueError::UnsetValue`] error value.
    pub fn expr_value(&self) -> Val<'_> {
        match &self.value {
            ValueNode::Absent => Val::Err(ValueError::UnsetValue { id: self.id }),
            ValueNode::Bool(b) => Val::Bool(*b),
            ValueNode::Bytes(b) => Val::Bytes(Cow::Borrowed(b)),
            ValueNode::Double(d) => Val::Double(*d),
            ValueNode::Int(i) => Val::Int(*i),
            ValueNode::Uint(u) => Val::Uint(*u),
            ValueNode::String(s) => Val::String(Cow::Borrowed(s)),
            ValueNode::Null => Val::Null,
            ValueNode::Timestamp(ts) => Val::Timestamp(*ts),
            ValueNode::List(list) => Val::List(ListRef::Model(list)),
            ValueNode::Map(map) => Val::Map(Cow::Borrowed(map)),
            ValueNode::Object(obj) => Val::Object(Cow::Borrowed(obj)),
        }
    }

    /// Compares the payload with another value.
    pub fn equal(&self, other: &Val<'_>) -> Val<'static> {
        self.expr_value().equal(other)
    }

    pub fn convert_to_type(&self, target: &Type) -> Val<'_> {
        self.expr_value().convert_to_type(target)
    }

    pub fn convert_to_native<T: FromVal>(&self) -> Result<T, ValueError> {
        T::from_val(&self.expr_value())
    }

    /// Re-types a map payload as an object of `type_name`, in place.
    ///
    /// The conversion is one-way: afterwards the node reads as an object and
    /// unset fields resolve through `registry`. Any other payload, including an
    /// object, is left untouched and reported as an unsupported conversion.
    pub fn convert_to_object(
        &mut self,
        type_name: impl Into<Arc<str>>,
        registry: Arc<dyn SchemaRegistry>,
    ) -> Result<(), ValueError> {
        let type_name: Arc<str> = type_name.into();
        match std::mem::take(&mut self.value) {
            ValueNode::Map(map) => {
                self.value = ValueNode::Object(map.into_object(type_name, registry));
                Ok(())
            }
            other => {
                let err = ValueError::UnsupportedConversion {
                    from: other.kind_name().to_string(),
                    to: type_name.to_string(),
                };
                self.value = other;
                Err(err)
            }
        }
    }

    /// Gives a map payload a schema type, consuming the node.
    pub fn into_object(
        self,
        type_name: impl Into<Arc<str>>,
        registry: Arc<dyn SchemaRegistry>,
    ) -> Result<ObjectValue, ValueError> {
        let type_name: Arc<str> = type_name.into();
        match self.value {
            ValueNode::Map(map) => Ok(map.into_object(type_name, registry)),
            other => Err(ValueError::UnsupportedConversion {
                from: other.kind_name().to_string(),
                to: type_name.to_string(),
            }),
        }
    }

    /// Commits the node to a struct, replacing any scalar payload.
    ///
    /// Returns `None` if the node is already a list or an object.
    pub(crate) fn commit_struct(&mut self) -> Option<&mut MapValue> {
        match self.value {
            ValueNode::List(_) | ValueNode::Object(_) => return None,
            ValueNode::Map(_) => {}
            _ => {
                tracing::trace!(id = self.id, "committing dynamic value to struct");
                self.value = ValueNode::Map(MapValue::new());
            }
        }
        match &mut self.value {
            ValueNode::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Commits the node to a list, replacing any scalar payload.
    ///
    /// Returns `None` if the node is already a struct or an object.
    pub(crate) fn commit_list(&mut self) -> Option<&mut ListValue> {
        match self.value {
            ValueNode::Map(_) | ValueNode::Object(_) => return None,
            ValueNode::List(_) => {}
            _ => {
                tracing::trace!(id = self.id, "committing dynamic value to list");
                self.value = ValueNode::List(ListValue::new());
            }
        }
        match &mut self.value {
            ValueNode::List(list) => Some(list),
            _ => None,
        }
    }
}

/// A named slot in a struct.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    /// Id of the key element.
    pub id: Id,
    pub name: String,
    pub value: DynValue,
}

impl Field {
    /// Creates a field with an absent value.
    pub fn new(id: Id, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            value: DynValue::new(NIL_ID),
        }
    }

    /// Creates a field whose value is pre-seeded with `value`.
    pub fn with_value(id: Id, name: impl Into<String>, value: ValueNode) -> Self {
        Self {
            id,
            name: name.into(),
            value: DynValue::with_value(NIL_ID, value),
        }
    }
}

/// Ordered fields with a name index.
///
/// Fields are kept in insertion order. When a name repeats, lookups see the
/// latest field while earlier ones stay in the ordered list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StructValue {
    fields: Vec<Field>,
    index: FxHashMap<String, usize>,
}

impl StructValue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a field and returns it for population.
    pub fn add_field(&mut self, field: Field) -> &mut Field {
        let pos = self.fields.len();
        self.index.insert(field.name.clone(), pos);
        self.fields.push(field);
        &mut self.fields[pos]
    }

    /// Returns the latest field named `name`.
    pub fn get_field(&self, name: &str) -> Option<&Field> {
        self.index.get(name).map(|&pos| &self.fields[pos])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// All fields in insertion order, including shadowed duplicates.
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Fields visible to lookups, in insertion order.
    pub fn visible(&self) -> impl Iterator<Item = &Field> {
        self.fields
            .iter()
            .enumerate()
            .filter(|(pos, field)| self.index.get(field.name.as_str()) == Some(pos))
            .map(|(_, field)| field)
    }

    /// Distinct field names, ordered by their last write.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.visible().map(|field| field.name.as_str())
    }

    /// Number of distinct names.
    pub fn key_count(&self) -> usize {
        self.index.len()
    }

    /// Number of stored fields, including shadowed duplicates.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

// =============================================================================
// Lists
// =============================================================================

/// An ordered list of value nodes. Grows only by appending.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListValue {
    entries: Vec<DynValue>,
}

impl ListValue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an entry and returns it for population.
    pub fn push(&mut self, entry: DynValue) -> &mut DynValue {
        let pos = self.entries.len();
        self.entries.push(entry);
        &mut self.entries[pos]
    }

    pub fn entries(&self) -> &[DynValue] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the expression view of this list.
    pub fn as_val(&self) -> Val<'_> {
        Val::List(ListRef::Model(self))
    }

    pub fn get(&self, index: &Val<'_>) -> Val<'_> {
        ListRef::Model(self).get(index)
    }

    pub fn contains(&self, value: &Val<'_>) -> Val<'static> {
        ListRef::Model(self).contains(value)
    }

    pub fn equal(&self, other: &Val<'_>) -> Val<'static> {
        self.as_val().equal(other)
    }

    /// Returns a new list of this list's elements followed by `other`'s.
    pub fn concat<'s>(&'s self, other: &'s Val<'_>) -> Val<'s> {
        match other {
            Val::List(rhs) => ListRef::Model(self).concat(rhs),
            Val::Err(err) => Val::Err(err.clone()),
            rhs => no_such_overload("add", &self.as_val(), rhs),
        }
    }

    pub fn values(&self) -> impl Iterator<Item = Val<'_>> {
        self.entries.iter().map(DynValue::expr_value)
    }

    /// Mutable access to the entries. The list itself cannot grow or shrink
    /// through this view.
    pub fn entries_mut(&mut self) -> &mut [DynValue] {
        &mut self.entries
    }
}

// =============================================================================
// Maps
// =============================================================================

/// A string-keyed structure with no schema.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MapValue {
    fields: StructValue,
}

impl MapValue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_field(&mut self, field: Field) -> &mut Field {
        self.fields.add_field(field)
    }

    pub fn get_field(&self, name: &str) -> Option<&Field> {
        self.fields.get_field(name)
    }

    pub fn fields(&self) -> &StructValue {
        &self.fields
    }

    /// Number of distinct keys.
    pub fn size(&self) -> usize {
        self.fields.key_count()
    }

    /// Looks up a key.
    ///
    /// A non-string key is reported as a found error value; a missing key is
    /// `None`.
    pub fn find(&self, key: &Val<'_>) -> Option<Val<'_>> {
        match key {
            Val::String(name) => self
                .fields
                .get_field(name)
                .map(|field| field.value.expr_value()),
            Val::Err(err) => Some(Val::Err(err.clone())),
            other => Some(no_such_overload("index", &self.as_val(), other)),
        }
    }

    /// Looks up a key, turning a miss into [`ValueError::NoSuchKey`].
    pub fn get(&self, key: &Val<'_>) -> Val<'_> {
        match self.find(key) {
            Some(v) => v,
            None => Val::Err(ValueError::NoSuchKey {
                key: key.to_string(),
            }),
        }
    }

    /// Key presence; an error found under the key is propagated.
    pub fn contains(&self, key: &Val<'_>) -> Val<'static> {
        match self.find(key) {
            Some(Val::Err(err)) => Val::Err(err),
            Some(_) => Val::Bool(true),
            None => Val::Bool(false),
        }
    }

    /// Whether `key` names a field. Non-string keys are an error.
    pub fn is_set(&self, key: &Val<'_>) -> Val<'static> {
        match key {
            Val::String(name) => Val::Bool(self.fields.contains(name)),
            Val::Err(err) => Val::Err(err.clone()),
            other => no_such_overload("has", &self.as_val(), other),
        }
    }

    /// Iterates the distinct keys as string values.
    pub fn keys(&self) -> impl Iterator<Item = Val<'_>> {
        self.fields
            .names()
            .map(|name| Val::String(Cow::Borrowed(name)))
    }

    pub fn as_val(&self) -> Val<'_> {
        Val::Map(Cow::Borrowed(self))
    }

    pub fn equal(&self, other: &Val<'_>) -> Val<'static> {
        self.as_val().equal(other)
    }

    /// Order-independent key-wise equality.
    pub fn equal_map(&self, other: &MapValue) -> Val<'static> {
        if self.size() != other.size() {
            return Val::Bool(false);
        }
        for field in self.fields.visible() {
            let Some(rhs) = other.get_field(&field.name) else {
                return Val::Bool(false);
            };
            match field.value.equal(&rhs.value.expr_value()) {
                Val::Bool(true) => {}
                result => return result,
            }
        }
        Val::Bool(true)
    }

    pub fn convert_to_type(&self, target: &Type) -> Val<'_> {
        self.as_val().convert_to_type(target)
    }

    /// Re-types this map as an object of `type_name`. Fields carry over as-is.
    pub fn into_object(
        self,
        type_name: impl Into<Arc<str>>,
        registry: Arc<dyn SchemaRegistry>,
    ) -> ObjectValue {
        let type_name = type_name.into();
        tracing::debug!(
            type_name = %type_name,
            fields = self.fields.key_count(),
            "converted map to object"
        );
        ObjectValue {
            fields: self.fields,
            type_name,
            registry,
        }
    }
}

// =============================================================================
// Objects
// =============================================================================

/// A struct with a declared schema type.
///
/// Reads of unset fields resolve through the schema: declared object-typed
/// fields yield an empty object of that type and other declared fields yield
/// the registry's default for their type.
#[derive(Debug, Clone)]
pub struct ObjectValue {
    fields: StructValue,
    type_name: Arc<str>,
    registry: Arc<dyn SchemaRegistry>,
}

/// Structural equality: same type name and same stored fields. The registry
/// is not compared.
impl PartialEq for ObjectValue {
    fn eq(&self, other: &Self) -> bool {
        self.type_name == other.type_name && self.fields == other.fields
    }
}

impl ObjectValue {
    /// Creates an object with no fields set.
    pub fn new(type_name: impl Into<Arc<str>>, registry: Arc<dyn SchemaRegistry>) -> Self {
        Self {
            fields: StructValue::new(),
            type_name: type_name.into(),
            registry,
        }
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Returns the shared type name.
    pub fn object_type(&self) -> Arc<str> {
        Arc::clone(&self.type_name)
    }

    pub fn registry(&self) -> &Arc<dyn SchemaRegistry> {
        &self.registry
    }

    pub fn fields(&self) -> &StructValue {
        &self.fields
    }

    pub fn add_field(&mut self, field: Field) -> &mut Field {
        self.fields.add_field(field)
    }

    /// Resolves a field by name.
    pub fn get_field(&self, name: &str) -> Val<'_> {
        if let Some(field) = self.fields.get_field(name) {
            return field.value.expr_value();
        }
        let Some(field_type) = self.registry.field_type(&self.type_name, name) else {
            return Val::Err(ValueError::NoSuchField {
                type_name: self.type_name.to_string(),
                field: name.to_string(),
            });
        };
        if self.registry.is_object(&field_type) {
            let nested = ObjectValue::new(field_type, Arc::clone(&self.registry));
            return Val::Object(Cow::Owned(nested));
        }
        match self.registry.default_value(&field_type) {
            Some(default) => default,
            None => Val::Err(ValueError::NoDefault {
                path: format!("{}.{}", self.type_name, name),
            }),
        }
    }

    /// Field access; the key must be a string.
    pub fn get(&self, key: &Val<'_>) -> Val<'_> {
        match key {
            Val::String(name) => self.get_field(name),
            Val::Err(err) => Val::Err(err.clone()),
            other => no_such_overload("index", &self.as_val(), other),
        }
    }

    /// Whether a field is explicitly set. Undeclared fields are an error.
    pub fn is_set(&self, key: &Val<'_>) -> Val<'static> {
        let name = match key {
            Val::String(name) => name,
            Val::Err(err) => return Val::Err(err.clone()),
            other => return no_such_overload("has", &self.as_val(), other),
        };
        if self.fields.contains(name) {
            return Val::Bool(true);
        }
        match self.registry.field_type(&self.type_name, name) {
            Some(_) => Val::Bool(false),
            None => Val::Err(ValueError::NoSuchField {
                type_name: self.type_name.to_string(),
                field: name.to_string(),
            }),
        }
    }

    pub fn as_val(&self) -> Val<'_> {
        Val::Object(Cow::Borrowed(self))
    }

    pub fn equal(&self, other: &Val<'_>) -> Val<'static> {
        self.as_val().equal(other)
    }

    /// Field-wise equality over every field set on either side, resolving
    /// unset fields through the schema.
    pub fn equal_object(&self, other: &ObjectValue) -> Val<'static> {
        if self.type_name != other.type_name {
            return no_such_overload("equal", &self.as_val(), &other.as_val());
        }
        let extra = other
            .fields
            .names()
            .filter(|name| !self.fields.contains(name));
        for name in self.fields.names().chain(extra) {
            match self.get_field(name).equal(&other.get_field(name)) {
                Val::Bool(true) => {}
                result => return result,
            }
        }
        Val::Bool(true)
    }

    pub fn convert_to_type(&self, target: &Type) -> Val<'_> {
        self.as_val().convert_to_type(target)
    }
}

/// A decoded free-form document: its root map plus source metadata.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedValue {
    pub id: Id,
    pub value: MapValue,
    pub info: SourceInfo,
}

impl ParsedValue {
    pub fn new(info: SourceInfo) -> Self {
        Self {
            id: NIL_ID,
            value: MapValue::new(),
            info,
        }
    }
}
