//! Incremental construction of the model from a document walk.
//!
//! A decoder drives a [`Builder`] with four operations: `id` tags the current
//! node, `assign` stores a scalar, `prop` descends into a named field and
//! `prop_at` appends to a list. Child builders borrow their parent's storage,
//! so a descent never outlives the node it was created from.
//!
//! Closed contexts (the instance and its selector grammar) accept a fixed set
//! of names. Open contexts (`metadata`, `rules`, documents) accept any name and
//! commit a node to struct or list shape on first use.
//!
//! # Example
//!
//! ```
//! use policy_model::model::{Builder, Instance, Val};
//!
//! let mut inst = Instance::new();
//! let mut root = Builder::Instance(&mut inst);
//! root.prop(1, "kind").unwrap().assign(Val::from("Policy")).unwrap();
//! assert_eq!(inst.kind_name(), Some("Policy"));
//! ```

use crate::error::BuildError;
use crate::model::{
    DynValue, ExprMatcher, Field, Id, Instance, LabelMatcher, ListValue, MapValue, MatchExpressions,
    MatchLabels, ParsedValue, Selector, Shape, Val, ValueNode,
};

/// A construction cursor over one node of the model.
#[derive(Debug)]
pub enum Builder<'a> {
    Instance(&'a mut Instance),
    Selector(&'a mut Selector),
    MatchLabels(&'a mut MatchLabels),
    MatchExpressions(&'a mut MatchExpressions),
    ExprMatcher(&'a mut ExprMatcher),
    /// Root of a free-form document.
    Document(&'a mut ParsedValue),
    Struct(&'a mut MapValue),
    List(&'a mut ListValue),
    /// A node whose shape is decided by the first structural operation.
    Dyn(&'a mut DynValue),
}

impl<'a> Builder<'a> {
    /// Returns the context name reported in errors.
    pub fn context_name(&self) -> &'static str {
        match self {
            Builder::Instance(_) => "instance",
            Builder::Selector(_) => "selector",
            Builder::MatchLabels(_) => "matchLabels",
            Builder::MatchExpressions(_) => "matchExpressions",
            Builder::ExprMatcher(_) => "exprMatcher",
            Builder::Document(_) => "document",
            Builder::Struct(_) => "struct",
            Builder::List(_) => "list",
            Builder::Dyn(_) => "dyn",
        }
    }

    /// Tags the current node with a source id.
    ///
    /// Plain structs and lists have no id slot; their owning field carries it.
    pub fn id(&mut self, id: Id) {
        match self {
            Builder::Instance(inst) => inst.id = id,
            Builder::Selector(sel) => sel.id = id,
            Builder::MatchLabels(labels) => labels.id = id,
            Builder::MatchExpressions(exprs) => exprs.id = id,
            Builder::ExprMatcher(matcher) => matcher.id = id,
            Builder::Document(doc) => doc.id = id,
            Builder::Dyn(dv) => dv.id = id,
            Builder::Struct(_) | Builder::List(_) => {}
        }
    }

    /// Stores a scalar in the current node.
    ///
    /// Only an uncommitted dynamic node accepts a scalar. Lists, maps, objects,
    /// types and errors are never assignable. A rejected assignment leaves the
    /// node unchanged.
    pub fn assign(&mut self, value: Val<'_>) -> Result<(), BuildError> {
        match self {
            Builder::Dyn(dv) => match dv.shape() {
                Shape::Unset => {
                    dv.value = ValueNode::from_scalar("dyn", value)?;
                    Ok(())
                }
                shape => Err(BuildError::ShapeMismatch {
                    target: shape.name(),
                    shape: value.kind_name(),
                }),
            },
            other => Err(BuildError::ShapeMismatch {
                target: other.context_name(),
                shape: value.kind_name(),
            }),
        }
    }

    /// Descends into the field `name`, creating it.
    ///
    /// `id` is the id of the key element. Repeating a name creates a new field
    /// that shadows the earlier one.
    pub fn prop(&mut self, id: Id, name: &str) -> Result<Builder<'_>, BuildError> {
        match self {
            Builder::Instance(inst) => instance_prop(inst, id, name),
            Builder::Selector(sel) => selector_prop(sel, id, name),
            Builder::MatchLabels(labels) => {
                let matcher = push_last(&mut labels.matchers, LabelMatcher::new(id, name));
                Ok(Builder::Dyn(&mut matcher.value))
            }
            Builder::ExprMatcher(matcher) => expr_matcher_prop(matcher, id, name),
            Builder::Document(doc) => Ok(struct_prop(&mut doc.value, id, name)),
            Builder::Struct(map) => Ok(struct_prop(map, id, name)),
            Builder::Dyn(dv) => {
                let target = dv.value.kind_name();
                let map = dv.commit_struct().ok_or(BuildError::ShapeMismatch {
                    target,
                    shape: "struct",
                })?;
                Ok(struct_prop(map, id, name))
            }
            other => Err(BuildError::ShapeMismatch {
                target: other.context_name(),
                shape: "struct",
            }),
        }
    }

    /// Appends a new element and descends into it.
    ///
    /// `index` must be an integer in `0..=len`. Whatever the index, the element
    /// is appended at the end.
    pub fn prop_at(&mut self, index: Val<'_>) -> Result<Builder<'_>, BuildError> {
        match self {
            Builder::MatchExpressions(exprs) => {
                check_index(&index, exprs.matchers.len())?;
                let matcher = push_last(&mut exprs.matchers, ExprMatcher::default());
                Ok(Builder::ExprMatcher(matcher))
            }
            Builder::List(list) => list_prop_at(list, &index),
            Builder::Dyn(dv) => {
                let len = match &dv.value {
                    ValueNode::Map(_) | ValueNode::Object(_) => {
                        return Err(BuildError::ShapeMismatch {
                            target: "struct",
                            shape: "list",
                        });
                    }
                    ValueNode::List(list) => list.len(),
                    _ => 0,
                };
                check_index(&index, len)?;
                let list = dv.commit_list().ok_or(BuildError::ShapeMismatch {
                    target: "struct",
                    shape: "list",
                })?;
                list_prop_at(list, &index)
            }
            other => Err(BuildError::ShapeMismatch {
                target: other.context_name(),
                shape: "list",
            }),
        }
    }
}

impl<'a> From<&'a mut Instance> for Builder<'a> {
    fn from(inst: &'a mut Instance) -> Self {
        Builder::Instance(inst)
    }
}

impl<'a> From<&'a mut ParsedValue> for Builder<'a> {
    fn from(doc: &'a mut ParsedValue) -> Self {
        Builder::Document(doc)
    }
}

impl<'a> From<&'a mut DynValue> for Builder<'a> {
    fn from(dv: &'a mut DynValue) -> Self {
        Builder::Dyn(dv)
    }
}

// =============================================================================
// Context handlers
// =============================================================================

fn instance_prop<'s>(inst: &'s mut Instance, id: Id, name: &str) -> Result<Builder<'s>, BuildError> {
    let builder = match name {
        "version" => Builder::Dyn(&mut inst.version.insert(Field::new(id, name)).value),
        "kind" => Builder::Dyn(&mut inst.kind.insert(Field::new(id, name)).value),
        "description" => Builder::Dyn(&mut inst.description.insert(Field::new(id, name)).value),
        "metadata" => {
            let field = Field::with_value(id, name, ValueNode::Map(MapValue::new()));
            Builder::Dyn(&mut inst.metadata.insert(field).value)
        }
        "rules" => {
            let field = Field::with_value(id, name, ValueNode::List(ListValue::new()));
            Builder::Dyn(&mut inst.rules.insert(field).value)
        }
        "selector" => Builder::Selector(inst.selector.insert(Selector::new(id))),
        _ => {
            return Err(BuildError::NoSuchProperty {
                target: "instance",
                property: name.to_string(),
            });
        }
    };
    Ok(builder)
}

fn selector_prop<'s>(sel: &'s mut Selector, id: Id, name: &str) -> Result<Builder<'s>, BuildError> {
    match name {
        "matchLabels" => Ok(Builder::MatchLabels(
            sel.match_labels.insert(MatchLabels::new(id)),
        )),
        "matchExpressions" => Ok(Builder::MatchExpressions(
            sel.match_expressions.insert(MatchExpressions::new(id)),
        )),
        _ => Err(BuildError::NoSuchProperty {
            target: "selector",
            property: name.to_string(),
        }),
    }
}

fn expr_matcher_prop<'s>(
    matcher: &'s mut ExprMatcher,
    id: Id,
    name: &str,
) -> Result<Builder<'s>, BuildError> {
    let slot = match name {
        "key" => matcher.key.insert(DynValue::new(id)),
        "operator" => matcher.operator.insert(DynValue::new(id)),
        "values" => matcher
            .values
            .insert(DynValue::with_value(id, ValueNode::List(ListValue::new()))),
        _ => {
            return Err(BuildError::NoSuchProperty {
                target: "exprMatcher",
                property: name.to_string(),
            });
        }
    };
    Ok(Builder::Dyn(slot))
}

fn struct_prop<'s>(map: &'s mut MapValue, id: Id, name: &str) -> Builder<'s> {
    let field = map.add_field(Field::new(id, name));
    Builder::Dyn(&mut field.value)
}

fn list_prop_at<'s>(list: &'s mut ListValue, index: &Val<'_>) -> Result<Builder<'s>, BuildError> {
    check_index(index, list.len())?;
    Ok(Builder::Dyn(list.push(DynValue::default())))
}

/// Accepts `int` or `uint` indices in `0..=len`.
fn check_index(index: &Val<'_>, len: usize) -> Result<(), BuildError> {
    let i = match index {
        Val::Int(i) => i128::from(*i),
        Val::Uint(u) => i128::from(*u),
        other => {
            return Err(BuildError::InvalidIndexType {
                expected: "int",
                found: other.kind_name().to_string(),
            });
        }
    };
    if i < 0 || i > len as i128 {
        return Err(BuildError::IndexOutOfRange { index: i, len });
    }
    Ok(())
}

fn push_last<T>(items: &mut Vec<T>, item: T) -> &mut T {
    let pos = items.len();
    items.push(item);
    &mut items[pos]
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::error::ErrorKind;
    use crate::model::{SchemaContext, SchemaRegistry, SchemaType, Type};
    use crate::util::Timestamp;

    #[test]
    fn test_instance_scalar_fields() {
        let mut inst = Instance::new();
        let mut root = Builder::Instance(&mut inst);
        root.id(1);
        {
            let mut kind = root.prop(2, "kind").unwrap();
            kind.id(3);
            kind.assign(Val::from("Policy")).unwrap();
        }
        root.prop(4, "version").unwrap().assign(Val::from("v1")).unwrap();

        assert_eq!(inst.id, 1);
        let kind = inst.kind.as_ref().unwrap();
        assert_eq!(kind.id, 2);
        assert_eq!(kind.value.id, 3);
        assert_eq!(inst.kind_name(), Some("Policy"));
        assert_eq!(inst.version_name(), Some("v1"));
    }

    #[test]
    fn test_instance_is_closed() {
        let mut inst = Instance::new();
        let err = Builder::Instance(&mut inst).prop(1, "spec").unwrap_err();
        assert_eq!(
            err,
            BuildError::NoSuchProperty {
                target: "instance",
                property: "spec".into()
            }
        );
        assert!(matches!(
            Builder::Instance(&mut inst).assign(Val::from(1i64)),
            Err(BuildError::ShapeMismatch { target: "instance", .. })
        ));
        assert!(matches!(
            Builder::Instance(&mut inst).prop_at(Val::from(0i64)),
            Err(BuildError::ShapeMismatch { target: "instance", shape: "list" })
        ));
    }

    #[test]
    fn test_metadata_is_struct() {
        let mut inst = Instance::new();
        let mut root = Builder::Instance(&mut inst);
        let mut meta = root.prop(1, "metadata").unwrap();
        meta.prop(2, "name").unwrap().assign(Val::from("web")).unwrap();
        assert!(matches!(
            meta.prop_at(Val::from(0i64)),
            Err(BuildError::ShapeMismatch { target: "struct", shape: "list" })
        ));
        assert!(matches!(
            meta.assign(Val::from("x")),
            Err(BuildError::ShapeMismatch { target: "struct", .. })
        ));
        assert_eq!(inst.name(), Some("web"));
    }

    #[test]
    fn test_rules_is_list() {
        let mut inst = Instance::new();
        let mut root = Builder::Instance(&mut inst);
        let mut rules = root.prop(1, "rules").unwrap();
        rules.prop_at(Val::from(0i64)).unwrap().assign(Val::from("r0")).unwrap();
        {
            let mut second = rules.prop_at(Val::from(1u64)).unwrap();
            second.prop(3, "name").unwrap().assign(Val::from("r1")).unwrap();
        }
        assert!(matches!(
            rules.prop(4, "bogus"),
            Err(BuildError::ShapeMismatch { target: "list", shape: "struct" })
        ));
        assert_eq!(inst.rule_count(), 2);
    }

    #[test]
    fn test_selector_grammar() {
        let mut inst = Instance::new();
        let mut root = Builder::Instance(&mut inst);
        let mut sel = root.prop(1, "selector").unwrap();
        {
            let mut labels = sel.prop(2, "matchLabels").unwrap();
            labels.prop(3, "env").unwrap().assign(Val::from("prod")).unwrap();
            labels.prop(4, "tier").unwrap().assign(Val::from("web")).unwrap();
        }
        {
            let mut exprs = sel.prop(5, "matchExpressions").unwrap();
            let mut m = exprs.prop_at(Val::from(0i64)).unwrap();
            m.prop(6, "key").unwrap().assign(Val::from("app")).unwrap();
            m.prop(7, "operator").unwrap().assign(Val::from("In")).unwrap();
            let mut values = m.prop(8, "values").unwrap();
            values.prop_at(Val::from(0i64)).unwrap().assign(Val::from("a")).unwrap();
            assert!(matches!(
                m.prop(9, "unknown"),
                Err(BuildError::NoSuchProperty { target: "exprMatcher", .. })
            ));
        }
        assert!(matches!(
            sel.prop(10, "other"),
            Err(BuildError::NoSuchProperty { target: "selector", .. })
        ));

        let sel = inst.selector.as_ref().unwrap();
        let labels = &sel.match_labels.as_ref().unwrap().matchers;
        assert_eq!(labels.len(), 2);
        assert_eq!(labels[0].key.id, 3);
        assert_eq!(labels[0].key.value, ValueNode::String("env".into()));
        assert_eq!(labels[1].value.value, ValueNode::String("web".into()));

        let exprs = &sel.match_expressions.as_ref().unwrap().matchers;
        assert_eq!(exprs.len(), 1);
        match &exprs[0].values.as_ref().unwrap().value {
            ValueNode::List(list) => assert_eq!(list.len(), 1),
            other => panic!("Expected list, got {other:?}"),
        }
    }

    #[test]
    fn test_match_expressions_index_checks() {
        let mut exprs = MatchExpressions::new(1);
        let mut b = Builder::MatchExpressions(&mut exprs);
        assert!(matches!(
            b.prop_at(Val::from("0")),
            Err(BuildError::InvalidIndexType { expected: "int", .. })
        ));
        assert!(matches!(
            b.prop_at(Val::from(1i64)),
            Err(BuildError::IndexOutOfRange { index: 1, len: 0 })
        ));
        assert!(matches!(
            b.prop_at(Val::from(-1i64)),
            Err(BuildError::IndexOutOfRange { index: -1, .. })
        ));
        b.prop_at(Val::from(0i64)).unwrap();
        assert!(matches!(
            b.prop(2, "key"),
            Err(BuildError::ShapeMismatch { target: "matchExpressions", .. })
        ));
        assert_eq!(exprs.matchers.len(), 1);
    }

    #[test]
    fn test_prop_at_always_appends() {
        let mut list = ListValue::new();
        let mut b = Builder::List(&mut list);
        b.prop_at(Val::from(0i64)).unwrap().assign(Val::from(10i64)).unwrap();
        b.prop_at(Val::from(1i64)).unwrap().assign(Val::from(11i64)).unwrap();
        // an in-range index below len still appends
        b.prop_at(Val::from(0i64)).unwrap().assign(Val::from(12i64)).unwrap();
        let values: Vec<i64> = list.as_val().convert_to_native().unwrap();
        assert_eq!(values, vec![10, 11, 12]);
    }

    #[test]
    fn test_dyn_shape_commitment() {
        let mut dv = DynValue::new(1);
        {
            let mut b = Builder::Dyn(&mut dv);
            b.prop(2, "a").unwrap().assign(Val::from(1i64)).unwrap();
            let err = b.prop_at(Val::from(0i64)).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::ShapeMismatch);
        }
        assert_eq!(dv.shape(), Shape::Struct);

        let mut dv = DynValue::new(1);
        {
            let mut b = Builder::Dyn(&mut dv);
            b.prop_at(Val::from(0i64)).unwrap();
            assert!(matches!(
                b.prop(2, "a"),
                Err(BuildError::ShapeMismatch { target: "list", shape: "struct" })
            ));
            assert!(b.assign(Val::from(true)).is_err());
        }
        assert_eq!(dv.shape(), Shape::List);
    }

    #[test]
    fn test_bad_index_does_not_commit() {
        let mut dv = DynValue::new(1);
        let mut b = Builder::Dyn(&mut dv);
        assert!(b.prop_at(Val::from(3i64)).is_err());
        assert!(b.prop(2, "a").is_ok());
        assert_eq!(dv.shape(), Shape::Struct);
    }

    #[test]
    fn test_assign_rejects_non_scalars() {
        let mut dv = DynValue::new(1);
        let mut b = Builder::Dyn(&mut dv);
        let err = b.assign(Val::from(vec![Val::from(1i64)])).unwrap_err();
        assert_eq!(
            err,
            BuildError::UnsupportedValueKind {
                target: "dyn",
                kind: "list".into()
            }
        );
        assert!(b.assign(Val::Type(crate::model::Type::Int)).is_err());
        // node unchanged
        assert!(!dv.is_set());
    }

    #[test]
    fn test_assign_every_scalar_kind() {
        let ts = Timestamp::from_epoch_micros(1_700_000_000_000_000);
        let cases: Vec<(Val<'static>, Type)> = vec![
            (Val::from(true), Type::Bool),
            (Val::from(vec![1u8, 2]), Type::Bytes),
            (Val::from(2.5f64), Type::Double),
            (Val::from(-3i64), Type::Int),
            (Val::from(u64::MAX), Type::Uint),
            (Val::from("text"), Type::String),
            (Val::Null, Type::Null),
            (Val::from(ts), Type::Timestamp),
        ];
        for (value, expected) in cases {
            let mut dv = DynValue::new(1);
            Builder::Dyn(&mut dv).assign(value.clone()).unwrap();
            assert_eq!(dv.model_type(), Some(expected.clone()));
            assert_eq!(dv.expr_value().value_type(), expected);
            assert!(matches!(dv.equal(&value), Val::Bool(true)));
        }
    }

    #[test]
    fn test_typed_object_is_closed_to_builders() {
        let mut schema = SchemaContext::with_standard_defaults();
        schema.add_type(SchemaType::new("T").field("a", "int"));
        let registry: Arc<dyn SchemaRegistry> = Arc::new(schema);

        let mut dv = DynValue::with_value(1, ValueNode::Map(MapValue::new()));
        dv.convert_to_object("T", registry).unwrap();
        let mut b = Builder::Dyn(&mut dv);
        assert!(matches!(
            b.prop(2, "a"),
            Err(BuildError::ShapeMismatch { target: "object", shape: "struct" })
        ));
        assert!(matches!(
            b.prop_at(Val::from(0i64)),
            Err(BuildError::ShapeMismatch { target: "struct", shape: "list" })
        ));
        assert!(b.assign(Val::from(1i64)).is_err());
        assert_eq!(dv.value.kind_name(), "object");
    }

    #[test]
    fn test_scalar_then_struct() {
        let mut dv = DynValue::new(1);
        let mut b = Builder::Dyn(&mut dv);
        b.assign(Val::from(5i64)).unwrap();
        // reassigning an uncommitted scalar replaces it
        b.assign(Val::from("five")).unwrap();
        b.prop(2, "n").unwrap().assign(Val::Null).unwrap();
        assert!(matches!(dv.value, ValueNode::Map(_)));
    }

    #[test]
    fn test_document_root() {
        let mut doc = ParsedValue::default();
        let mut b = Builder::from(&mut doc);
        b.id(1);
        b.prop(2, "anything").unwrap().assign(Val::from(1.5f64)).unwrap();
        assert!(b.prop_at(Val::from(0i64)).is_err());
        assert_eq!(doc.id, 1);
        assert!(matches!(doc.value.get(&Val::from("anything")), Val::Double(d) if d == 1.5));
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Indexes in `0..=len` append one element; anything else is rejected
        /// and leaves the list untouched.
        #[test]
        fn prop_at_bounds(len in 0usize..8, index in -4i64..12) {
            let mut list = ListValue::new();
            for i in 0..len {
                list.push(DynValue::with_value(i as Id + 1, ValueNode::Int(i as i64)));
            }
            let mut b = Builder::List(&mut list);
            let accepted = b.prop_at(Val::from(index)).is_ok();
            prop_assert_eq!(accepted, index >= 0 && index as usize <= len);
            let expected = if accepted { len + 1 } else { len };
            prop_assert_eq!(list.len(), expected);
        }
    }
}
