//! Capability traits an expression engine programs against.
//!
//! Every model value is a [`Value`]; lists and maps add the collection
//! capabilities. Each implementation forwards to the type's inherent methods,
//! so the traits add no behavior of their own.

use crate::error::ValueError;
use crate::model::{DynValue, FromVal, ListRef, ListValue, MapValue, ObjectValue, Type, Val};

/// Core value contract.
pub trait Value {
    /// Returns the expression view of the value.
    fn to_val(&self) -> Val<'_>;

    fn value_type(&self) -> Type {
        self.to_val().value_type()
    }

    fn equal(&self, other: &Val<'_>) -> Val<'static> {
        self.to_val().equal(other)
    }

    fn convert_to_type(&self, target: &Type) -> Val<'_>;

    fn convert_to_native<T: FromVal>(&self) -> Result<T, ValueError>
    where
        Self: Sized,
    {
        T::from_val(&self.to_val())
    }
}

/// Element count.
pub trait Sizer {
    fn size(&self) -> Val<'static>;
}

/// Keyed or positional access.
pub trait Indexer {
    fn get(&self, key: &Val<'_>) -> Val<'_>;
}

/// Membership test.
pub trait Container {
    fn contains(&self, value: &Val<'_>) -> Val<'static>;
}

/// Element (list) or key (map) iteration.
pub trait Iterable {
    fn iterator(&self) -> Box<dyn Iterator<Item = Val<'_>> + '_>;
}

pub trait Lister: Value + Sizer + Indexer + Container + Iterable {
    /// Returns a new list; `self` is unchanged.
    fn concat<'s>(&'s self, other: &'s Val<'_>) -> Val<'s>;
}

pub trait Mapper: Value + Sizer + Indexer + Container + Iterable {
    /// Looks up a key; `None` means absent.
    fn find(&self, key: &Val<'_>) -> Option<Val<'_>>;
}

// =============================================================================
// Val
// =============================================================================

impl Value for Val<'_> {
    fn to_val(&self) -> Val<'_> {
        self.clone()
    }

    fn value_type(&self) -> Type {
        Val::value_type(self)
    }

    fn equal(&self, other: &Val<'_>) -> Val<'static> {
        Val::equal(self, other)
    }

    fn convert_to_type(&self, target: &Type) -> Val<'_> {
        Val::convert_to_type(self, target)
    }
}

// =============================================================================
// DynValue
// =============================================================================

impl Value for DynValue {
    fn to_val(&self) -> Val<'_> {
        self.expr_value()
    }

    fn convert_to_type(&self, target: &Type) -> Val<'_> {
        DynValue::convert_to_type(self, target)
    }
}

// =============================================================================
// ListValue
// =============================================================================

impl Value for ListValue {
    fn to_val(&self) -> Val<'_> {
        self.as_val()
    }

    fn value_type(&self) -> Type {
        Type::List
    }

    fn convert_to_type(&self, target: &Type) -> Val<'_> {
        self.as_val().convert_to_type(target)
    }
}

impl Sizer for ListValue {
    fn size(&self) -> Val<'static> {
        Val::Int(self.len() as i64)
    }
}

impl Indexer for ListValue {
    fn get(&self, key: &Val<'_>) -> Val<'_> {
        ListRef::Model(self).get(key)
    }
}

impl Container for ListValue {
    fn contains(&self, value: &Val<'_>) -> Val<'static> {
        ListRef::Model(self).contains(value)
    }
}

impl Iterable for ListValue {
    fn iterator(&self) -> Box<dyn Iterator<Item = Val<'_>> + '_> {
        Box::new(self.values())
    }
}

impl Lister for ListValue {
    fn concat<'s>(&'s self, other: &'s Val<'_>) -> Val<'s> {
        ListValue::concat(self, other)
    }
}

// =============================================================================
// MapValue
// =============================================================================

impl Value for MapValue {
    fn to_val(&self) -> Val<'_> {
        self.as_val()
    }

    fn value_type(&self) -> Type {
        Type::Map
    }

    fn equal(&self, other: &Val<'_>) -> Val<'static> {
        MapValue::equal(self, other)
    }

    fn convert_to_type(&self, target: &Type) -> Val<'_> {
        MapValue::convert_to_type(self, target)
    }
}

impl Sizer for MapValue {
    fn size(&self) -> Val<'static> {
        Val::Int(MapValue::size(self) as i64)
    }
}

impl Indexer for MapValue {
    fn get(&self, key: &Val<'_>) -> Val<'_> {
        MapValue::get(self, key)
    }
}

impl Container for MapValue {
    fn contains(&self, value: &Val<'_>) -> Val<'static> {
        MapValue::contains(self, value)
    }
}

impl Iterable for MapValue {
    fn iterator(&self) -> Box<dyn Iterator<Item = Val<'_>> + '_> {
        Box::new(self.keys())
    }
}

impl Mapper for MapValue {
    fn find(&self, key: &Val<'_>) -> Option<Val<'_>> {
        MapValue::find(self, key)
    }
}

// =============================================================================
// ObjectValue
// =============================================================================

impl Value for ObjectValue {
    fn to_val(&self) -> Val<'_> {
        self.as_val()
    }

    fn equal(&self, other: &Val<'_>) -> Val<'static> {
        ObjectValue::equal(self, other)
    }

    fn convert_to_type(&self, target: &Type) -> Val<'_> {
        ObjectValue::convert_to_type(self, target)
    }
}

impl Indexer for ObjectValue {
    fn get(&self, key: &Val<'_>) -> Val<'_> {
        ObjectValue::get(self, key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Field, ValueNode};

    fn sum_sizes(values: &[&dyn Sizer]) -> i64 {
        values
            .iter()
            .map(|v| match v.size() {
                Val::Int(n) => n,
                _ => 0,
            })
            .sum()
    }

    fn first_key<M: Mapper>(map: &M) -> Option<String> {
        map.iterator().next().map(|k| k.to_string())
    }

    #[test]
    fn test_collections_through_traits() {
        let mut list = ListValue::new();
        list.push(DynValue::with_value(1, ValueNode::Int(1)));
        list.push(DynValue::with_value(2, ValueNode::Int(2)));

        let mut map = MapValue::new();
        map.add_field(Field::with_value(3, "only", ValueNode::Bool(true)));

        assert_eq!(sum_sizes(&[&list, &map]), 3);
        assert_eq!(first_key(&map).as_deref(), Some("\"only\""));
        assert!(matches!(Indexer::get(&list, &Val::from(0i64)), Val::Int(1)));
        assert!(matches!(Container::contains(&list, &Val::from(2i64)), Val::Bool(true)));
        assert_eq!(Value::value_type(&map), Type::Map);
    }

    fn joined<L: Lister>(lhs: &L, rhs: &Val<'_>) -> Vec<i64> {
        lhs.concat(rhs).convert_to_native().unwrap()
    }

    #[test]
    fn test_list_concat_through_trait() {
        let mut a = ListValue::new();
        a.push(DynValue::with_value(1, ValueNode::Int(1)));
        let mut b = ListValue::new();
        b.push(DynValue::with_value(2, ValueNode::Int(2)));
        b.push(DynValue::with_value(3, ValueNode::Int(3)));

        assert_eq!(joined(&a, &b.as_val()), vec![1, 2, 3]);
        assert_eq!(joined(&b, &a.as_val()), vec![2, 3, 1]);
        assert!(Lister::concat(&a, &Val::from("x")).is_error());
        assert_eq!(a.len(), 1);
    }

    #[test]
    fn test_native_via_value_trait() {
        let v = DynValue::with_value(1, ValueNode::String("x".into()));
        let s: String = Value::convert_to_native(&v).unwrap();
        assert_eq!(s, "x");
        assert_eq!(Value::value_type(&v), Type::String);
    }
}
