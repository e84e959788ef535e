//! Expression values.
//!
//! [`Val`] is the currency exchanged with an expression engine. Scalars are held
//! inline or borrowed from the model; lists, maps and objects are views over the
//! model graph, so producing a `Val` for a large structure is cheap.
//!
//! Equality is homogeneous: comparing values whose type names differ yields a
//! [`ValueError::NoSuchOverload`] error value rather than `false`.

use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use crate::error::ValueError;
use crate::model::{DynValue, ListValue, MapValue, ObjectValue};
use crate::util::Timestamp;

/// Runtime type of a [`Val`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    Bool,
    Bytes,
    Double,
    Int,
    Uint,
    String,
    Null,
    Timestamp,
    List,
    Map,
    /// Schema-declared object type, identified by name.
    Object(Arc<str>),
    /// The type of type values.
    Type,
    Error,
}

impl Type {
    /// Returns the name used for homogeneous equality and diagnostics.
    pub fn type_name(&self) -> &str {
        match self {
            Type::Bool => "bool",
            Type::Bytes => "bytes",
            Type::Double => "double",
            Type::Int => "int",
            Type::Uint => "uint",
            Type::String => "string",
            Type::Null => "null",
            Type::Timestamp => "timestamp",
            Type::List => "list",
            Type::Map => "map",
            Type::Object(name) => name,
            Type::Type => "type",
            Type::Error => "error",
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

/// A dynamically typed value.
#[derive(Debug, Clone)]
pub enum Val<'a> {
    Bool(bool),
    Bytes(Cow<'a, [u8]>),
    Double(f64),
    Int(i64),
    Uint(u64),
    String(Cow<'a, str>),
    Null,
    Timestamp(Timestamp),
    List(ListRef<'a>),
    Map(Cow<'a, MapValue>),
    Object(Cow<'a, ObjectValue>),
    Type(Type),
    /// An error carried as a value.
    Err(ValueError),
}

/// A list value: either a view over a model list or a list of computed values.
#[derive(Debug, Clone)]
pub enum ListRef<'a> {
    Model(&'a ListValue),
    Vals(Vec<Val<'a>>),
}

impl<'a> Val<'a> {
    /// Returns the runtime type.
    pub fn value_type(&self) -> Type {
        match self {
            Val::Bool(_) => Type::Bool,
            Val::Bytes(_) => Type::Bytes,
            Val::Double(_) => Type::Double,
            Val::Int(_) => Type::Int,
            Val::Uint(_) => Type::Uint,
            Val::String(_) => Type::String,
            Val::Null => Type::Null,
            Val::Timestamp(_) => Type::Timestamp,
            Val::List(_) => Type::List,
            Val::Map(_) => Type::Map,
            Val::Object(obj) => Type::Object(obj.object_type()),
            Val::Type(_) => Type::Type,
            Val::Err(_) => Type::Error,
        }
    }

    /// Returns a static name for the value's shape; objects report `object`.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Val::Bool(_) => "bool",
            Val::Bytes(_) => "bytes",
            Val::Double(_) => "double",
            Val::Int(_) => "int",
            Val::Uint(_) => "uint",
            Val::String(_) => "string",
            Val::Null => "null",
            Val::Timestamp(_) => "timestamp",
            Val::List(_) => "list",
            Val::Map(_) => "map",
            Val::Object(_) => "object",
            Val::Type(_) => "type",
            Val::Err(_) => "error",
        }
    }

    /// Returns true for error values.
    pub fn is_error(&self) -> bool {
        matches!(self, Val::Err(_))
    }

    /// Returns the boolean payload, if this is a bool.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Val::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the error payload, if this is an error value.
    pub fn as_error(&self) -> Option<&ValueError> {
        match self {
            Val::Err(err) => Some(err),
            _ => None,
        }
    }

    /// Detaches the value from the model graph by copying borrowed data.
    pub fn into_owned(self) -> Val<'static> {
        match self {
            Val::Bool(b) => Val::Bool(b),
            Val::Bytes(b) => Val::Bytes(Cow::Owned(b.into_owned())),
            Val::Double(d) => Val::Double(d),
            Val::Int(i) => Val::Int(i),
            Val::Uint(u) => Val::Uint(u),
            Val::String(s) => Val::String(Cow::Owned(s.into_owned())),
            Val::Null => Val::Null,
            Val::Timestamp(ts) => Val::Timestamp(ts),
            Val::List(list) => Val::List(ListRef::Vals(list.values().map(Val::into_owned).collect())),
            Val::Map(map) => Val::Map(Cow::Owned(map.into_owned())),
            Val::Object(obj) => Val::Object(Cow::Owned(obj.into_owned())),
            Val::Type(t) => Val::Type(t),
            Val::Err(err) => Val::Err(err),
        }
    }

    // =========================================================================
    // Capability contract
    // =========================================================================

    /// Compares two values under homogeneous equality.
    ///
    /// Returns `Bool` when the types match and an error value otherwise. An error
    /// operand is returned as-is.
    pub fn equal(&self, other: &Val<'_>) -> Val<'static> {
        if let Val::Err(err) = self {
            return Val::Err(err.clone());
        }
        let (lhs, rhs) = (self.value_type(), other.value_type());
        if lhs.type_name() != rhs.type_name() {
            return no_such_overload("equal", self, other);
        }
        match (self, other) {
            (Val::Bool(a), Val::Bool(b)) => Val::Bool(a == b),
            (Val::Bytes(a), Val::Bytes(b)) => Val::Bool(a == b),
            (Val::Double(a), Val::Double(b)) => Val::Bool(a == b),
            (Val::Int(a), Val::Int(b)) => Val::Bool(a == b),
            (Val::Uint(a), Val::Uint(b)) => Val::Bool(a == b),
            (Val::String(a), Val::String(b)) => Val::Bool(a == b),
            (Val::Null, Val::Null) => Val::Bool(true),
            (Val::Timestamp(a), Val::Timestamp(b)) => Val::Bool(a == b),
            (Val::List(a), Val::List(b)) => a.equal(b),
            (Val::Map(a), Val::Map(b)) => a.equal_map(b),
            (Val::Object(a), Val::Object(b)) => a.equal_object(b),
            (Val::Type(a), Val::Type(b)) => Val::Bool(a.type_name() == b.type_name()),
            _ => no_such_overload("equal", self, other),
        }
    }

    /// Converts the value to another runtime type.
    pub fn convert_to_type(&self, target: &Type) -> Val<'a> {
        match self {
            Val::Err(_) => self.clone(),
            Val::List(_) | Val::Map(_) => match target {
                Type::Type => Val::Type(self.value_type()),
                t if t.type_name() == self.kind_name() => self.clone(),
                t => unsupported_conversion(self, t),
            },
            Val::Object(obj) => match target {
                Type::Type => Val::Type(self.value_type()),
                t if t.type_name() == obj.type_name() => self.clone(),
                t => unsupported_conversion(self, t),
            },
            _ => self.convert_scalar(target),
        }
    }

    /// Converts the value into a Rust-native type.
    pub fn convert_to_native<T: FromVal>(&self) -> Result<T, ValueError> {
        T::from_val(self)
    }

    /// Returns the number of elements (lists, maps) or characters/bytes.
    pub fn size(&self) -> Val<'static> {
        match self {
            Val::List(list) => Val::Int(list.len() as i64),
            Val::Map(map) => Val::Int(map.size() as i64),
            Val::String(s) => Val::Int(s.chars().count() as i64),
            Val::Bytes(b) => Val::Int(b.len() as i64),
            Val::Err(err) => Val::Err(err.clone()),
            other => Val::Err(ValueError::no_such_overload("size", &[other.kind_name()])),
        }
    }

    /// Indexes a list by position, or a map or object by field name.
    pub fn get(&self, key: &Val<'_>) -> Val<'_> {
        match self {
            Val::List(list) => list.get(key),
            Val::Map(map) => map.get(key),
            Val::Object(obj) => obj.get(key),
            Val::Err(err) => Val::Err(err.clone()),
            other => no_such_overload("index", other, key),
        }
    }

    /// Looks up a map key without turning a miss into an error.
    pub fn find(&self, key: &Val<'_>) -> Option<Val<'_>> {
        match self {
            Val::Map(map) => map.find(key),
            Val::Err(err) => Some(Val::Err(err.clone())),
            other => Some(no_such_overload("find", other, key)),
        }
    }

    /// Tests list membership or map key presence.
    pub fn contains(&self, value: &Val<'_>) -> Val<'static> {
        match self {
            Val::List(list) => list.contains(value),
            Val::Map(map) => map.contains(value),
            Val::Err(err) => Val::Err(err.clone()),
            other => no_such_overload("in", value, other),
        }
    }

    /// Iterates list elements or map keys.
    pub fn iterator(&self) -> Result<Box<dyn Iterator<Item = Val<'_>> + '_>, ValueError> {
        match self {
            Val::List(list) => {
                let list: &ListRef<'_> = list;
                Ok(Box::new(list.values()))
            }
            Val::Map(map) => Ok(Box::new(map.keys())),
            Val::Err(err) => Err(err.clone()),
            other => Err(ValueError::no_such_overload("iterator", &[other.kind_name()])),
        }
    }

    /// Concatenates two lists into a new list; neither operand is modified.
    pub fn concat<'s>(&'s self, other: &'s Val<'_>) -> Val<'s> {
        match (self, other) {
            (Val::List(a), Val::List(b)) => a.concat(b),
            (Val::Err(err), _) | (_, Val::Err(err)) => Val::Err(err.clone()),
            _ => no_such_overload("add", self, other),
        }
    }

    // =========================================================================
    // Scalar conversions
    // =========================================================================

    fn convert_scalar(&self, target: &Type) -> Val<'a> {
        if *target == Type::Type {
            return Val::Type(self.value_type());
        }
        if target.type_name() == self.kind_name() {
            return self.clone();
        }
        match (self, target) {
            (Val::Int(i), Type::Uint) => u64::try_from(*i)
                .map(Val::Uint)
                .unwrap_or_else(|_| range_error(i, "uint")),
            (Val::Int(i), Type::Double) => Val::Double(*i as f64),
            (Val::Int(i), Type::Timestamp) => Timestamp::from_unix_seconds(*i)
                .map(Val::Timestamp)
                .unwrap_or_else(|| range_error(i, "timestamp")),
            (Val::Uint(u), Type::Int) => i64::try_from(*u)
                .map(Val::Int)
                .unwrap_or_else(|_| range_error(u, "int")),
            (Val::Uint(u), Type::Double) => Val::Double(*u as f64),
            (Val::Double(d), Type::Int) => {
                if d.is_finite() && *d >= i64::MIN as f64 && *d < i64::MAX as f64 {
                    Val::Int(*d as i64)
                } else {
                    range_error(d, "int")
                }
            }
            (Val::Double(d), Type::Uint) => {
                if d.is_finite() && *d >= 0.0 && *d < u64::MAX as f64 {
                    Val::Uint(*d as u64)
                } else {
                    range_error(d, "uint")
                }
            }
            (Val::String(s), Type::Int) => parse_or_err(s, target, Val::Int),
            (Val::String(s), Type::Uint) => parse_or_err(s, target, Val::Uint),
            (Val::String(s), Type::Double) => parse_or_err(s, target, Val::Double),
            (Val::String(s), Type::Bool) => match s.as_ref() {
                "true" | "True" | "TRUE" | "t" | "1" => Val::Bool(true),
                "false" | "False" | "FALSE" | "f" | "0" => Val::Bool(false),
                _ => unsupported_conversion(self, target),
            },
            (Val::String(s), Type::Bytes) => Val::Bytes(match s {
                Cow::Borrowed(s) => Cow::Borrowed((*s).as_bytes()),
                Cow::Owned(s) => Cow::Owned(s.clone().into_bytes()),
            }),
            (Val::String(s), Type::Timestamp) => match Timestamp::parse_rfc3339(s) {
                Ok(ts) => Val::Timestamp(ts),
                Err(err) => Val::Err(ValueError::InvalidTimestamp {
                    message: err.to_string(),
                }),
            },
            (Val::Bytes(b), Type::String) => match std::str::from_utf8(b) {
                Ok(s) => Val::String(Cow::Owned(s.to_string())),
                Err(_) => unsupported_conversion(self, target),
            },
            (Val::Timestamp(ts), Type::Int) => Val::Int(ts.unix_seconds()),
            (
                Val::Bool(_) | Val::Int(_) | Val::Uint(_) | Val::Double(_) | Val::Timestamp(_),
                Type::String,
            ) => Val::String(Cow::Owned(self.to_string())),
            _ => unsupported_conversion(self, target),
        }
    }
}

fn parse_or_err<'a, T: std::str::FromStr>(s: &str, target: &Type, f: fn(T) -> Val<'a>) -> Val<'a> {
    match s.parse::<T>() {
        Ok(v) => f(v),
        Err(_) => Val::Err(ValueError::UnsupportedConversion {
            from: format!("string '{s}'"),
            to: target.type_name().to_string(),
        }),
    }
}

fn range_error<'a>(value: &dyn fmt::Display, to: &'static str) -> Val<'a> {
    Val::Err(ValueError::RangeError {
        value: value.to_string(),
        to,
    })
}

pub(crate) fn unsupported_conversion<'a>(from: &Val<'_>, to: &Type) -> Val<'a> {
    Val::Err(ValueError::UnsupportedConversion {
        from: from.value_type().type_name().to_string(),
        to: to.type_name().to_string(),
    })
}

/// Builds the error for an operation applied to operand types it does not support.
///
/// An operand that is already an error is propagated instead.
pub(crate) fn no_such_overload(op: &'static str, lhs: &Val<'_>, rhs: &Val<'_>) -> Val<'static> {
    if let Val::Err(err) = rhs {
        return Val::Err(err.clone());
    }
    let (l, r) = (lhs.value_type(), rhs.value_type());
    Val::Err(ValueError::no_such_overload(op, &[l.type_name(), r.type_name()]))
}

// =============================================================================
// Lists
// =============================================================================

impl<'a> ListRef<'a> {
    /// Returns the number of elements.
    pub fn len(&self) -> usize {
        match self {
            ListRef::Model(list) => list.len(),
            ListRef::Vals(vals) => vals.len(),
        }
    }

    /// Returns true if the list has no elements.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the element at `index`, if any.
    pub fn at(&self, index: usize) -> Option<Val<'a>> {
        match self {
            ListRef::Model(list) => {
                let list: &'a ListValue = *list;
                list.entries().get(index).map(DynValue::expr_value)
            }
            ListRef::Vals(vals) => vals.get(index).cloned(),
        }
    }

    /// Iterates over the elements in order.
    pub fn values(&self) -> impl Iterator<Item = Val<'a>> + '_ {
        (0..self.len()).filter_map(move |i| self.at(i))
    }

    /// Indexes the list; only `int` indices are accepted.
    pub fn get(&self, index: &Val<'_>) -> Val<'a> {
        let i = match index {
            Val::Int(i) => *i,
            Val::Err(err) => return Val::Err(err.clone()),
            other => {
                return Val::Err(ValueError::UnsupportedIndex {
                    found: other.kind_name().to_string(),
                });
            }
        };
        match usize::try_from(i).ok().and_then(|i| self.at(i)) {
            Some(v) => v,
            None => Val::Err(ValueError::IndexOutOfBounds {
                index: i,
                len: self.len(),
            }),
        }
    }

    /// Returns whether `value` equals an element.
    ///
    /// A match anywhere wins. Otherwise the first non-boolean comparison result is
    /// returned, and `false` only when every comparison was a clean `false`.
    pub fn contains(&self, value: &Val<'_>) -> Val<'static> {
        if let Val::Err(err) = value {
            return Val::Err(err.clone());
        }
        let mut first_err = None;
        for elem in self.values() {
            match elem.equal(value) {
                Val::Bool(true) => return Val::Bool(true),
                Val::Bool(false) => {}
                other => {
                    if first_err.is_none() {
                        first_err = Some(other);
                    }
                }
            }
        }
        first_err.unwrap_or(Val::Bool(false))
    }

    /// Element-wise equality; the first non-`true` comparison decides.
    pub fn equal(&self, other: &ListRef<'_>) -> Val<'static> {
        if self.len() != other.len() {
            return Val::Bool(false);
        }
        for (a, b) in self.values().zip(other.values()) {
            match a.equal(&b) {
                Val::Bool(true) => {}
                other => return other,
            }
        }
        Val::Bool(true)
    }

    /// Produces a new list holding `self` followed by `other`.
    ///
    /// The result borrows the operands' element data, not the views, so it may
    /// outlive a temporary `ListRef`.
    pub fn concat<'s>(&self, other: &ListRef<'s>) -> Val<'s>
    where
        'a: 's,
    {
        let mut vals: Vec<Val<'s>> = Vec::with_capacity(self.len() + other.len());
        for v in self.values() {
            vals.push(v);
        }
        for v in other.values() {
            vals.push(v);
        }
        Val::List(ListRef::Vals(vals))
    }
}

// =============================================================================
// Native conversion
// =============================================================================

/// Rust types a [`Val`] can be converted into.
pub trait FromVal: Sized {
    fn from_val(val: &Val<'_>) -> Result<Self, ValueError>;
}

/// Error for a value whose shape does not fit the requested native type.
///
/// Maps and objects have no native form at all and report `NotImplemented`.
fn native_mismatch(val: &Val<'_>, target: &'static str) -> ValueError {
    match val {
        Val::Err(err) => err.clone(),
        Val::Map(_) => ValueError::NotImplemented {
            feature: "map conversion to native types",
        },
        Val::Object(_) => ValueError::NotImplemented {
            feature: "object conversion to native types",
        },
        other => ValueError::UnsupportedConversion {
            from: other.value_type().type_name().to_string(),
            to: target.to_string(),
        },
    }
}

impl FromVal for bool {
    fn from_val(val: &Val<'_>) -> Result<Self, ValueError> {
        match val {
            Val::Bool(b) => Ok(*b),
            other => Err(native_mismatch(other, "bool")),
        }
    }
}

impl FromVal for i64 {
    fn from_val(val: &Val<'_>) -> Result<Self, ValueError> {
        match val {
            Val::Int(i) => Ok(*i),
            other => Err(native_mismatch(other, "i64")),
        }
    }
}

impl FromVal for u64 {
    fn from_val(val: &Val<'_>) -> Result<Self, ValueError> {
        match val {
            Val::Uint(u) => Ok(*u),
            other => Err(native_mismatch(other, "u64")),
        }
    }
}

impl FromVal for f64 {
    fn from_val(val: &Val<'_>) -> Result<Self, ValueError> {
        match val {
            Val::Double(d) => Ok(*d),
            other => Err(native_mismatch(other, "f64")),
        }
    }
}

impl FromVal for String {
    fn from_val(val: &Val<'_>) -> Result<Self, ValueError> {
        match val {
            Val::String(s) => Ok(s.to_string()),
            other => Err(native_mismatch(other, "String")),
        }
    }
}

impl FromVal for Box<[u8]> {
    fn from_val(val: &Val<'_>) -> Result<Self, ValueError> {
        match val {
            Val::Bytes(b) => Ok(Box::from(b.as_ref())),
            other => Err(native_mismatch(other, "bytes")),
        }
    }
}

impl FromVal for Timestamp {
    fn from_val(val: &Val<'_>) -> Result<Self, ValueError> {
        match val {
            Val::Timestamp(ts) => Ok(*ts),
            other => Err(native_mismatch(other, "Timestamp")),
        }
    }
}

impl FromVal for () {
    fn from_val(val: &Val<'_>) -> Result<Self, ValueError> {
        match val {
            Val::Null => Ok(()),
            other => Err(native_mismatch(other, "()")),
        }
    }
}

impl<T: FromVal> FromVal for Option<T> {
    fn from_val(val: &Val<'_>) -> Result<Self, ValueError> {
        match val {
            Val::Null => Ok(None),
            other => T::from_val(other).map(Some),
        }
    }
}

impl<T: FromVal> FromVal for Vec<T> {
    /// Sequences convert element by element.
    fn from_val(val: &Val<'_>) -> Result<Self, ValueError> {
        match val {
            Val::List(list) => list.values().map(|v| T::from_val(&v)).collect(),
            other => Err(native_mismatch(other, "Vec")),
        }
    }
}

impl<T: FromVal> FromVal for BTreeMap<String, T> {
    fn from_val(val: &Val<'_>) -> Result<Self, ValueError> {
        Err(native_mismatch(val, "BTreeMap"))
    }
}

impl<T: FromVal, S> FromVal for HashMap<String, T, S> {
    fn from_val(val: &Val<'_>) -> Result<Self, ValueError> {
        Err(native_mismatch(val, "HashMap"))
    }
}

// =============================================================================
// Construction and display
// =============================================================================

impl From<bool> for Val<'static> {
    fn from(b: bool) -> Self {
        Val::Bool(b)
    }
}

impl From<i64> for Val<'static> {
    fn from(i: i64) -> Self {
        Val::Int(i)
    }
}

impl From<u64> for Val<'static> {
    fn from(u: u64) -> Self {
        Val::Uint(u)
    }
}

impl From<f64> for Val<'static> {
    fn from(d: f64) -> Self {
        Val::Double(d)
    }
}

impl<'a> From<&'a str> for Val<'a> {
    fn from(s: &'a str) -> Self {
        Val::String(Cow::Borrowed(s))
    }
}

impl From<String> for Val<'static> {
    fn from(s: String) -> Self {
        Val::String(Cow::Owned(s))
    }
}

impl<'a> From<&'a [u8]> for Val<'a> {
    fn from(b: &'a [u8]) -> Self {
        Val::Bytes(Cow::Borrowed(b))
    }
}

impl From<Vec<u8>> for Val<'static> {
    fn from(b: Vec<u8>) -> Self {
        Val::Bytes(Cow::Owned(b))
    }
}

impl From<Timestamp> for Val<'static> {
    fn from(ts: Timestamp) -> Self {
        Val::Timestamp(ts)
    }
}

impl<'a> From<Vec<Val<'a>>> for Val<'a> {
    fn from(vals: Vec<Val<'a>>) -> Self {
        Val::List(ListRef::Vals(vals))
    }
}

impl fmt::Display for Val<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Val::Bool(b) => write!(f, "{b}"),
            Val::Bytes(b) => write!(f, "b\"{}\"", b.escape_ascii()),
            Val::Double(d) => write!(f, "{d}"),
            Val::Int(i) => write!(f, "{i}"),
            Val::Uint(u) => write!(f, "{u}u"),
            Val::String(s) => write!(f, "{s:?}"),
            Val::Null => f.write_str("null"),
            Val::Timestamp(ts) => write!(f, "{ts}"),
            Val::List(list) => {
                f.write_str("[")?;
                for (i, v) in list.values().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{v}")?;
                }
                f.write_str("]")
            }
            Val::Map(map) => {
                f.write_str("{")?;
                for (i, field) in map.fields().visible().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{:?}: {}", field.name, field.value.expr_value())?;
                }
                f.write_str("}")
            }
            Val::Object(obj) => {
                write!(f, "{}{{", obj.type_name())?;
                for (i, field) in obj.fields().visible().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}: {}", field.name, field.value.expr_value())?;
                }
                f.write_str("}")
            }
            Val::Type(t) => write!(f, "{t}"),
            Val::Err(err) => write!(f, "error: {err}"),
        }
    }
}
