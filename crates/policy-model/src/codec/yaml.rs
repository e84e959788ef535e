//! Tree walker over `serde_yaml` values.

use std::borrow::Cow;

use serde_yaml::value::{Tag, TaggedValue};
use serde_yaml::{Mapping, Value};

use crate::codec::{DecodeOptions, ErrorPolicy};
use crate::error::DecodeError;
use crate::model::{Builder, IdGen, SourceInfo, Val};
use crate::util::Timestamp;

/// Parses `text` and drives `root` over the resulting tree.
///
/// Returns the recorded source info and, under the skip policy, the errors of
/// skipped subtrees.
pub(crate) fn decode_into(
    text: &str,
    options: &DecodeOptions,
    root: &mut Builder<'_>,
) -> Result<(SourceInfo, Vec<DecodeError>), DecodeError> {
    if text.len() > options.max_document_len {
        return Err(DecodeError::LengthExceedsLimit {
            field: "document",
            len: text.len(),
            max: options.max_document_len,
        });
    }

    let doc: Value = if text.trim().is_empty() {
        Value::Null
    } else {
        serde_yaml::from_str(text)?
    };

    let mut walker = Walker {
        options,
        ids: IdGen::new(),
        info: SourceInfo::new(options.description.as_str(), text),
        errors: Vec::new(),
    };

    tracing::debug!(description = %options.description, len = text.len(), "decoding document");

    if doc.is_null() {
        // An empty document builds nothing but still tags the root.
        let id = walker.ids.next_id();
        walker.info.set_path(id, "");
        root.id(id);
    } else {
        let result = walker.walk(root, &doc, "", 0);
        walker.settle(result)?;
    }

    tracing::debug!(
        description = %options.description,
        nodes = walker.ids.issued(),
        skipped = walker.errors.len(),
        "decoded document"
    );
    Ok((walker.info, walker.errors))
}

struct Walker<'o> {
    options: &'o DecodeOptions,
    ids: IdGen,
    info: SourceInfo,
    errors: Vec<DecodeError>,
}

impl Walker<'_> {
    /// Applies the error policy to the outcome of a subtree.
    fn settle(&mut self, result: Result<(), DecodeError>) -> Result<(), DecodeError> {
        match (result, self.options.on_error) {
            (Ok(()), _) => Ok(()),
            (Err(err), ErrorPolicy::Abort) => Err(err),
            (Err(err), ErrorPolicy::Skip) => {
                tracing::debug!(error = %err, "skipping subtree");
                self.errors.push(err);
                Ok(())
            }
        }
    }

    fn walk(
        &mut self,
        builder: &mut Builder<'_>,
        node: &Value,
        path: &str,
        depth: usize,
    ) -> Result<(), DecodeError> {
        if depth > self.options.max_depth {
            return Err(DecodeError::DepthExceeded {
                path: path.to_string(),
                max: self.options.max_depth,
            });
        }
        let id = self.ids.next_id();
        self.info.set_path(id, path);
        builder.id(id);
        self.walk_node(builder, node, path, depth)
    }

    fn walk_node(
        &mut self,
        builder: &mut Builder<'_>,
        node: &Value,
        path: &str,
        depth: usize,
    ) -> Result<(), DecodeError> {
        match node {
            Value::Mapping(map) => self.walk_mapping(builder, map, path, depth),
            Value::Sequence(seq) => self.walk_sequence(builder, seq, path, depth),
            Value::Tagged(tagged) if is_timestamp(&tagged.tag) => {
                let ts = timestamp_scalar(tagged, path)?;
                assign(builder, Val::Timestamp(ts), path)
            }
            Value::Tagged(tagged) => self.walk_node(builder, &tagged.value, path, depth),
            Value::Null => assign(builder, Val::Null, path),
            Value::Bool(b) => assign(builder, Val::Bool(*b), path),
            Value::Number(n) => {
                let val = if let Some(i) = n.as_i64() {
                    Val::Int(i)
                } else if let Some(u) = n.as_u64() {
                    Val::Uint(u)
                } else {
                    Val::Double(n.as_f64().unwrap_or(f64::NAN))
                };
                assign(builder, val, path)
            }
            Value::String(s) => assign(builder, Val::String(Cow::Borrowed(s)), path),
        }
    }

    fn walk_mapping(
        &mut self,
        builder: &mut Builder<'_>,
        map: &Mapping,
        path: &str,
        depth: usize,
    ) -> Result<(), DecodeError> {
        for (key, value) in map {
            let name = match key {
                Value::String(name) => name.as_str(),
                other => {
                    let result = Err(DecodeError::UnsupportedKey {
                        path: path.to_string(),
                        found: node_kind(other),
                    });
                    self.settle(result)?;
                    continue;
                }
            };
            let child_path = join(path, name);
            let key_id = self.ids.next_id();
            self.info.set_path(key_id, child_path.as_str());

            let result = match builder.prop(key_id, name) {
                Ok(mut child) => self.walk(&mut child, value, &child_path, depth + 1),
                Err(source) => Err(DecodeError::Build {
                    path: child_path,
                    source,
                }),
            };
            self.settle(result)?;
        }
        Ok(())
    }

    fn walk_sequence(
        &mut self,
        builder: &mut Builder<'_>,
        seq: &[Value],
        path: &str,
        depth: usize,
    ) -> Result<(), DecodeError> {
        // Skipped elements leave no entry, so the next index is the count appended so far.
        let mut appended: i64 = 0;
        for (i, item) in seq.iter().enumerate() {
            let child_path = format!("{path}[{i}]");
            let result = match builder.prop_at(Val::Int(appended)) {
                Ok(mut child) => {
                    appended += 1;
                    self.walk(&mut child, item, &child_path, depth + 1)
                }
                Err(source) => Err(DecodeError::Build {
                    path: child_path,
                    source,
                }),
            };
            self.settle(result)?;
        }
        Ok(())
    }
}

fn assign(builder: &mut Builder<'_>, value: Val<'_>, path: &str) -> Result<(), DecodeError> {
    builder.assign(value).map_err(|source| DecodeError::Build {
        path: path.to_string(),
        source,
    })
}

fn join(path: &str, name: &str) -> String {
    if path.is_empty() {
        name.to_string()
    } else {
        format!("{path}.{name}")
    }
}

fn is_timestamp(tag: &Tag) -> bool {
    let tag = tag.to_string();
    let name = tag.trim_start_matches('!');
    name == "timestamp" || name == "tag:yaml.org,2002:timestamp"
}

fn timestamp_scalar(tagged: &TaggedValue, path: &str) -> Result<Timestamp, DecodeError> {
    match &tagged.value {
        Value::String(s) => Timestamp::parse_rfc3339(s).map_err(|err| DecodeError::InvalidScalar {
            path: path.to_string(),
            message: err.to_string(),
        }),
        other => Err(DecodeError::InvalidScalar {
            path: path.to_string(),
            message: format!("timestamp tag on {} value", node_kind(other)),
        }),
    }
}

fn node_kind(node: &Value) -> &'static str {
    match node {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Sequence(_) => "sequence",
        Value::Mapping(_) => "mapping",
        Value::Tagged(_) => "tagged",
    }
}
