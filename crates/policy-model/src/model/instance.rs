//! Policy instances.
//!
//! An instance is a closed record: its top-level keys are fixed, and the
//! `selector` subtree has its own closed grammar for label and expression
//! matchers. Free-form content lives under `metadata` and `rules`.

use std::sync::Arc;

use crate::error::ValueError;
use crate::model::{
    DynValue, Field, Id, ListValue, MapValue, SchemaRegistry, SourceInfo, ValueNode, NIL_ID,
};

/// A decoded policy instance.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Instance {
    pub id: Id,
    pub version: Option<Field>,
    pub kind: Option<Field>,
    pub description: Option<Field>,
    /// Free-form struct.
    pub metadata: Option<Field>,
    pub selector: Option<Selector>,
    /// Free-form list.
    pub rules: Option<Field>,
    pub source_info: Option<SourceInfo>,
}

impl Instance {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the `metadata` struct, if present and structured.
    pub fn metadata(&self) -> Option<&MapValue> {
        match &self.metadata.as_ref()?.value.value {
            ValueNode::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Returns the `rules` list, if present.
    pub fn rules(&self) -> Option<&ListValue> {
        match &self.rules.as_ref()?.value.value {
            ValueNode::List(list) => Some(list),
            _ => None,
        }
    }

    /// Number of rules; zero when absent.
    pub fn rule_count(&self) -> usize {
        self.rules().map_or(0, ListValue::len)
    }

    /// Re-types every rule as an object of `rule_type`, in place.
    ///
    /// After this, reads through [`Instance::rules`] resolve unset rule fields
    /// through `registry`. Rules already typed as `rule_type` are left alone.
    /// If any rule is neither a struct nor such an object, nothing is
    /// converted. Returns the number of rules converted.
    pub fn type_rules(
        &mut self,
        rule_type: &str,
        registry: &Arc<dyn SchemaRegistry>,
    ) -> Result<usize, ValueError> {
        let Some(rules) = self.rules_mut() else {
            return Ok(0);
        };
        for rule in rules.entries() {
            match &rule.value {
                ValueNode::Map(_) => {}
                ValueNode::Object(obj) if obj.type_name() == rule_type => {}
                other => {
                    return Err(ValueError::UnsupportedConversion {
                        from: other.kind_name().to_string(),
                        to: rule_type.to_string(),
                    });
                }
            }
        }
        let rule_type: Arc<str> = Arc::from(rule_type);
        let mut converted = 0;
        for rule in rules.entries_mut() {
            if matches!(rule.value, ValueNode::Map(_)) {
                rule.convert_to_object(Arc::clone(&rule_type), Arc::clone(registry))?;
                converted += 1;
            }
        }
        Ok(converted)
    }

    fn rules_mut(&mut self) -> Option<&mut ListValue> {
        match &mut self.rules.as_mut()?.value.value {
            ValueNode::List(list) => Some(list),
            _ => None,
        }
    }

    /// The instance name: `metadata.name`, falling back to `metadata.uid`.
    pub fn name(&self) -> Option<&str> {
        self.metadata_string("name")
            .or_else(|| self.metadata_string("uid"))
    }

    /// The instance namespace: `metadata.namespace`, or `default`.
    pub fn namespace(&self) -> &str {
        self.metadata_string("namespace").unwrap_or("default")
    }

    pub fn kind_name(&self) -> Option<&str> {
        field_string(self.kind.as_ref()?)
    }

    pub fn version_name(&self) -> Option<&str> {
        field_string(self.version.as_ref()?)
    }

    fn metadata_string(&self, key: &str) -> Option<&str> {
        field_string(self.metadata()?.get_field(key)?)
    }
}

fn field_string(field: &Field) -> Option<&str> {
    match &field.value.value {
        ValueNode::String(s) => Some(s.as_str()),
        _ => None,
    }
}

/// Label and expression based selection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Selector {
    pub id: Id,
    pub match_labels: Option<MatchLabels>,
    pub match_expressions: Option<MatchExpressions>,
}

impl Selector {
    pub fn new(id: Id) -> Self {
        Self {
            id,
            ..Self::default()
        }
    }
}

/// `matchLabels`: every key in the mapping becomes a [`LabelMatcher`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatchLabels {
    pub id: Id,
    pub matchers: Vec<LabelMatcher>,
}

impl MatchLabels {
    pub fn new(id: Id) -> Self {
        Self {
            id,
            matchers: Vec::new(),
        }
    }
}

/// A label key and the value it must equal.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LabelMatcher {
    /// Always a string: the label name.
    pub key: DynValue,
    pub value: DynValue,
}

impl LabelMatcher {
    pub fn new(id: Id, key: &str) -> Self {
        Self {
            key: DynValue::with_value(id, ValueNode::String(key.to_string())),
            value: DynValue::new(NIL_ID),
        }
    }
}

/// `matchExpressions`: a list of [`ExprMatcher`]s.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatchExpressions {
    pub id: Id,
    pub matchers: Vec<ExprMatcher>,
}

impl MatchExpressions {
    pub fn new(id: Id) -> Self {
        Self {
            id,
            matchers: Vec::new(),
        }
    }
}

/// One set-based requirement: `key`, `operator` and optional `values`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExprMatcher {
    pub id: Id,
    pub key: Option<DynValue>,
    pub operator: Option<DynValue>,
    /// Pre-seeded as a list when present.
    pub values: Option<DynValue>,
}

impl ExprMatcher {
    pub fn new(id: Id) -> Self {
        Self {
            id,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{SchemaContext, SchemaType, Type, Val};

    fn metadata(entries: &[(&str, &str)]) -> Field {
        let mut map = MapValue::new();
        for (name, value) in entries {
            map.add_field(Field::with_value(1, *name, ValueNode::String(value.to_string())));
        }
        Field::with_value(1, "metadata", ValueNode::Map(map))
    }

    #[test]
    fn test_name_falls_back_to_uid() {
        let mut inst = Instance::new();
        assert_eq!(inst.name(), None);

        inst.metadata = Some(metadata(&[("uid", "u-1")]));
        assert_eq!(inst.name(), Some("u-1"));

        inst.metadata = Some(metadata(&[("uid", "u-1"), ("name", "web")]));
        assert_eq!(inst.name(), Some("web"));
    }

    #[test]
    fn test_namespace_default() {
        let mut inst = Instance::new();
        assert_eq!(inst.namespace(), "default");
        inst.metadata = Some(metadata(&[("namespace", "prod")]));
        assert_eq!(inst.namespace(), "prod");
    }

    #[test]
    fn test_rule_count() {
        let mut inst = Instance::new();
        assert_eq!(inst.rule_count(), 0);

        let mut rules = ListValue::new();
        rules.push(DynValue::with_value(2, ValueNode::Int(1)));
        rules.push(DynValue::with_value(3, ValueNode::Int(2)));
        inst.rules = Some(Field::with_value(1, "rules", ValueNode::List(rules)));
        assert_eq!(inst.rule_count(), 2);
    }

    fn rule_registry() -> Arc<dyn SchemaRegistry> {
        let mut schema = SchemaContext::with_standard_defaults();
        schema.add_type(SchemaType::new("Rule").field("name", "string").field("limit", "int"));
        Arc::new(schema)
    }

    fn named_rule(id: Id, name: &str) -> DynValue {
        let mut rule = MapValue::new();
        rule.add_field(Field::with_value(id + 1, "name", ValueNode::String(name.into())));
        DynValue::with_value(id, ValueNode::Map(rule))
    }

    #[test]
    fn test_type_rules_in_place() {
        let registry = rule_registry();
        let mut inst = Instance::new();
        assert_eq!(inst.type_rules("Rule", &registry), Ok(0));

        let mut rules = ListValue::new();
        rules.push(named_rule(2, "r0"));
        inst.rules = Some(Field::with_value(1, "rules", ValueNode::List(rules)));

        // before typing, an unset field is a missing key
        {
            let view = inst.rules().unwrap().as_val();
            let rule = view.get(&Val::from(0i64));
            assert!(matches!(
                rule.get(&Val::from("limit")),
                Val::Err(ValueError::NoSuchKey { .. })
            ));
        }

        assert_eq!(inst.type_rules("Rule", &registry), Ok(1));
        {
            let view = inst.rules().unwrap().as_val();
            let rule = view.get(&Val::from(0i64));
            assert_eq!(rule.value_type(), Type::Object("Rule".into()));
            assert!(matches!(rule.get(&Val::from("limit")), Val::Int(0)));
            assert!(matches!(rule.get(&Val::from("name")), Val::String(ref s) if s == "r0"));
        }

        // already typed rules are kept
        assert_eq!(inst.type_rules("Rule", &registry), Ok(0));
    }

    #[test]
    fn test_type_rules_all_or_nothing() {
        let registry = rule_registry();
        let mut rules = ListValue::new();
        rules.push(named_rule(2, "r0"));
        rules.push(DynValue::with_value(4, ValueNode::Int(1)));
        let mut inst = Instance::new();
        inst.rules = Some(Field::with_value(1, "rules", ValueNode::List(rules)));

        assert!(matches!(
            inst.type_rules("Rule", &registry),
            Err(ValueError::UnsupportedConversion { ref from, .. }) if from == "int"
        ));
        let first = &inst.rules().unwrap().entries()[0];
        assert!(matches!(first.value, ValueNode::Map(_)));
    }

    #[test]
    fn test_label_matcher_key() {
        let m = LabelMatcher::new(9, "app");
        assert_eq!(m.key.id, 9);
        assert_eq!(m.key.value, ValueNode::String("app".into()));
        assert!(!m.value.is_set());
    }
}
