//! Semantic validation for policy instances.
//!
//! Decoding only checks that a document fits the instance grammar. This module
//! checks what the grammar cannot: required fields, field kinds, and the
//! consistency of selector requirements. Rule contents can additionally be
//! checked against a schema with [`validate_rules`].

use std::sync::Arc;

use crate::error::ValidationError;
use crate::model::{
    DynValue, ExprMatcher, Field, Id, Instance, LabelMatcher, SchemaRegistry, ValueNode,
};

/// Operators accepted in `matchExpressions`.
pub const OPERATORS: [&str; 3] = ["In", "NotIn", "Exists"];

/// Validates the structure of an instance.
///
/// This performs the following checks:
/// - `version` and `kind` are present strings
/// - `metadata` is a struct with a string `name` or `uid`
/// - `description`, when present, is a string
/// - `rules`, when present, is a list
/// - label matcher values are scalars
/// - expression matchers have a string key and a known operator, `In` and
///   `NotIn` carry values and `Exists` carries none
pub fn validate_instance(instance: &Instance) -> Result<(), ValidationError> {
    require_string(instance.id, instance.version.as_ref(), "version")?;
    require_string(instance.id, instance.kind.as_ref(), "kind")?;

    let metadata = instance.metadata.as_ref().ok_or(ValidationError::MissingField {
        id: instance.id,
        field: "metadata",
    })?;
    expect_kind(metadata.id, &metadata.name, &metadata.value, "struct")?;
    if instance.name().is_none() {
        return Err(ValidationError::MissingName { id: metadata.id });
    }

    if let Some(description) = &instance.description {
        expect_kind(description.id, "description", &description.value, "string")?;
    }
    if let Some(rules) = &instance.rules {
        expect_kind(rules.id, "rules", &rules.value, "list")?;
    }

    if let Some(selector) = &instance.selector {
        if let Some(labels) = &selector.match_labels {
            labels.matchers.iter().try_for_each(validate_label)?;
        }
        if let Some(exprs) = &selector.match_expressions {
            exprs.matchers.iter().try_for_each(validate_expression)?;
        }
    }

    Ok(())
}

/// Validates every rule against an object type.
///
/// Each rule must be a struct, or an object already typed as `rule_type`,
/// whose fields are all declared on `rule_type`.
/// Fields declared with a built-in type must hold a value of that type; fields
/// declared with an object type must hold a struct.
pub fn validate_rules(
    instance: &Instance,
    registry: &Arc<dyn SchemaRegistry>,
    rule_type: &str,
) -> Result<(), ValidationError> {
    let Some(rules) = instance.rules() else {
        return Ok(());
    };
    for (i, rule) in rules.entries().iter().enumerate() {
        let fields = match &rule.value {
            ValueNode::Map(map) => map.fields(),
            ValueNode::Object(obj) if obj.type_name() == rule_type => obj.fields(),
            other => {
                return Err(ValidationError::TypeMismatch {
                    id: rule.id,
                    field: format!("rules[{i}]"),
                    expected: "struct".to_string(),
                    found: other.kind_name(),
                });
            }
        };
        for field in fields.visible() {
            let Some(declared) = registry.field_type(rule_type, &field.name) else {
                return Err(ValidationError::UndeclaredField {
                    id: field.id,
                    type_name: rule_type.to_string(),
                    field: field.name.clone(),
                });
            };
            let expected = if registry.is_object(&declared) {
                "map"
            } else {
                &*declared
            };
            let found = field.value.value.kind_name();
            if found != expected {
                return Err(ValidationError::TypeMismatch {
                    id: field.id,
                    field: format!("rules[{i}].{}", field.name),
                    expected: declared.to_string(),
                    found,
                });
            }
        }
    }
    Ok(())
}

fn require_string(
    instance_id: Id,
    field: Option<&Field>,
    name: &'static str,
) -> Result<(), ValidationError> {
    let field = field.ok_or(ValidationError::MissingField {
        id: instance_id,
        field: name,
    })?;
    expect_kind(field.id, name, &field.value, "string")
}

fn expect_kind(
    id: Id,
    field: &str,
    value: &DynValue,
    expected: &'static str,
) -> Result<(), ValidationError> {
    let found = match &value.value {
        ValueNode::Map(_) => "struct",
        other => other.kind_name(),
    };
    if found == expected {
        Ok(())
    } else {
        Err(ValidationError::TypeMismatch {
            id,
            field: field.to_string(),
            expected: expected.to_string(),
            found,
        })
    }
}

fn validate_label(matcher: &LabelMatcher) -> Result<(), ValidationError> {
    match &matcher.value.value {
        ValueNode::List(_) | ValueNode::Map(_) | ValueNode::Object(_) | ValueNode::Absent => {
            Err(ValidationError::TypeMismatch {
                id: matcher.value.id,
                field: format!("selector.matchLabels.{}", label_name(matcher)),
                expected: "scalar".to_string(),
                found: matcher.value.value.kind_name(),
            })
        }
        _ => Ok(()),
    }
}

fn label_name(matcher: &LabelMatcher) -> &str {
    match &matcher.key.value {
        ValueNode::String(s) => s.as_str(),
        _ => "",
    }
}

fn validate_expression(matcher: &ExprMatcher) -> Result<(), ValidationError> {
    let key = matcher.key.as_ref().ok_or(ValidationError::MissingField {
        id: matcher.id,
        field: "key",
    })?;
    expect_kind(key.id, "key", key, "string")?;

    let operator = matcher.operator.as_ref().ok_or(ValidationError::MissingField {
        id: matcher.id,
        field: "operator",
    })?;
    expect_kind(operator.id, "operator", operator, "string")?;
    let op = match &operator.value {
        ValueNode::String(s) => s.as_str(),
        _ => "",
    };
    let Some(op) = OPERATORS.iter().copied().find(|known| *known == op) else {
        return Err(ValidationError::UnknownOperator {
            id: operator.id,
            operator: op.to_string(),
        });
    };

    let value_count = match matcher.values.as_ref().map(|v| &v.value) {
        None => 0,
        Some(ValueNode::List(list)) => list.len(),
        Some(other) => {
            return Err(ValidationError::TypeMismatch {
                id: matcher.id,
                field: "values".to_string(),
                expected: "list".to_string(),
                found: other.kind_name(),
            });
        }
    };
    match (op, value_count) {
        ("Exists", 0) => Ok(()),
        ("Exists", _) => Err(ValidationError::UnexpectedValues { id: matcher.id }),
        (_, 0) => Err(ValidationError::MissingValues {
            id: matcher.id,
            operator: op,
        }),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::decode_instance;
    use crate::model::{SchemaContext, SchemaType};

    const VALID: &str = "\
version: v1
kind: Policy
metadata:
  name: web
selector:
  matchLabels:
    env: prod
  matchExpressions:
    - key: app
      operator: In
      values: [a]
    - key: canary
      operator: Exists
rules:
  - name: r0
    limit: 5
";

    #[test]
    fn test_valid_instance() {
        let inst = decode_instance(VALID).unwrap();
        assert!(validate_instance(&inst).is_ok());
    }

    #[test]
    fn test_missing_kind() {
        let inst = decode_instance("version: v1\nmetadata:\n  name: x\n").unwrap();
        assert!(matches!(
            validate_instance(&inst),
            Err(ValidationError::MissingField { field: "kind", .. })
        ));
    }

    #[test]
    fn test_kind_must_be_string() {
        let inst = decode_instance("version: v1\nkind: 3\nmetadata:\n  name: x\n").unwrap();
        match validate_instance(&inst) {
            Err(ValidationError::TypeMismatch { field, found, .. }) => {
                assert_eq!(field, "kind");
                assert_eq!(found, "int");
            }
            other => panic!("Expected TypeMismatch, got {other:?}"),
        }
    }

    #[test]
    fn test_uid_satisfies_name() {
        let inst = decode_instance("version: v1\nkind: P\nmetadata:\n  uid: u1\n").unwrap();
        assert!(validate_instance(&inst).is_ok());

        let inst = decode_instance("version: v1\nkind: P\nmetadata:\n  labels: {}\n").unwrap();
        assert!(matches!(
            validate_instance(&inst),
            Err(ValidationError::MissingName { .. })
        ));
    }

    #[test]
    fn test_label_value_must_be_scalar() {
        let text = "version: v1\nkind: P\nmetadata: {name: x}\nselector:\n  matchLabels:\n    env: [a]\n";
        let inst = decode_instance(text).unwrap();
        match validate_instance(&inst) {
            Err(ValidationError::TypeMismatch { field, .. }) => {
                assert_eq!(field, "selector.matchLabels.env");
            }
            other => panic!("Expected TypeMismatch, got {other:?}"),
        }
    }

    fn with_expression(expr: &str) -> Instance {
        let text = format!(
            "version: v1\nkind: P\nmetadata: {{name: x}}\nselector:\n  matchExpressions:\n    - {expr}\n"
        );
        decode_instance(&text).unwrap()
    }

    #[test]
    fn test_expression_rules() {
        let inst = with_expression("{key: a, operator: Matches, values: [x]}");
        assert!(matches!(
            validate_instance(&inst),
            Err(ValidationError::UnknownOperator { ref operator, .. }) if operator == "Matches"
        ));

        let inst = with_expression("{key: a, operator: NotIn}");
        assert!(matches!(
            validate_instance(&inst),
            Err(ValidationError::MissingValues { operator: "NotIn", .. })
        ));

        let inst = with_expression("{key: a, operator: In, values: []}");
        assert!(matches!(
            validate_instance(&inst),
            Err(ValidationError::MissingValues { operator: "In", .. })
        ));

        let inst = with_expression("{key: a, operator: Exists, values: [x]}");
        assert!(matches!(
            validate_instance(&inst),
            Err(ValidationError::UnexpectedValues { .. })
        ));

        let inst = with_expression("{operator: Exists}");
        assert!(matches!(
            validate_instance(&inst),
            Err(ValidationError::MissingField { field: "key", .. })
        ));
    }

    fn rule_registry() -> Arc<dyn SchemaRegistry> {
        let mut schema = SchemaContext::with_standard_defaults();
        schema.add_type(
            SchemaType::new("Rule")
                .field("name", "string")
                .field("limit", "int")
                .field("match", "Match"),
        );
        schema.add_type(SchemaType::new("Match").field("path", "string"));
        Arc::new(schema)
    }

    #[test]
    fn test_validate_rules() {
        let registry = rule_registry();
        let inst = decode_instance(VALID).unwrap();
        assert!(validate_rules(&inst, &registry, "Rule").is_ok());

        let inst = decode_instance("rules:\n  - name: r\n    match: {path: /}\n").unwrap();
        assert!(validate_rules(&inst, &registry, "Rule").is_ok());

        let inst = decode_instance("rules:\n  - name: r\n    extra: 1\n").unwrap();
        assert!(matches!(
            validate_rules(&inst, &registry, "Rule"),
            Err(ValidationError::UndeclaredField { ref field, .. }) if field == "extra"
        ));

        let inst = decode_instance("rules:\n  - limit: lots\n").unwrap();
        match validate_rules(&inst, &registry, "Rule") {
            Err(ValidationError::TypeMismatch { field, expected, found, .. }) => {
                assert_eq!(field, "rules[0].limit");
                assert_eq!(expected, "int");
                assert_eq!(found, "string");
            }
            other => panic!("Expected TypeMismatch, got {other:?}"),
        }

        let mut inst = decode_instance("rules:\n  - name: r\n    limit: 2\n").unwrap();
        inst.type_rules("Rule", &registry).unwrap();
        assert!(validate_rules(&inst, &registry, "Rule").is_ok());
        assert!(matches!(
            validate_rules(&inst, &registry, "Match"),
            Err(ValidationError::TypeMismatch { found: "object", .. })
        ));

        let inst = decode_instance("rules:\n  - just-a-string\n").unwrap();
        assert!(matches!(
            validate_rules(&inst, &registry, "Rule"),
            Err(ValidationError::TypeMismatch { .. })
        ));
    }
}
