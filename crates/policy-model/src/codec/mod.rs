//! YAML decoding into the policy model.
//!
//! The decoder parses text with `serde_yaml` and walks the resulting tree,
//! driving a [`Builder`](crate::model::Builder) with one `id` per node, `prop`
//! per mapping key, `prop_at` per sequence element and `assign` per scalar.
//! Ids are handed out from 1 in document order and each id's dotted path is
//! recorded in the result's [`SourceInfo`](crate::model::SourceInfo).

mod yaml;

use crate::error::DecodeError;
use crate::limits::{MAX_DOCUMENT_LEN, MAX_NESTING_DEPTH};
use crate::model::{Builder, Instance, ParsedValue};

/// What the decoder does when a subtree cannot be built.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ErrorPolicy {
    /// Stop at the first error.
    #[default]
    Abort,
    /// Record the error, skip the subtree and keep going.
    Skip,
}

/// Options for decoding documents.
#[derive(Debug, Clone)]
pub struct DecodeOptions {
    /// Deepest nesting accepted; the root is depth 0.
    pub max_depth: usize,
    /// Largest accepted input, in bytes.
    pub max_document_len: usize,
    pub on_error: ErrorPolicy,
    /// Names the source in the result's source info.
    pub description: String,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            max_depth: MAX_NESTING_DEPTH,
            max_document_len: MAX_DOCUMENT_LEN,
            on_error: ErrorPolicy::Abort,
            description: "<input>".to_string(),
        }
    }
}

impl DecodeOptions {
    /// Creates default options: standard limits, abort on first error.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates options that abort on the first error.
    pub fn strict() -> Self {
        Self::default()
    }

    /// Creates options that skip failing subtrees and collect their errors.
    pub fn lenient() -> Self {
        Self {
            on_error: ErrorPolicy::Skip,
            ..Self::default()
        }
    }

    /// Sets the source description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// A decoded value plus the errors of any skipped subtrees.
#[derive(Debug, Clone)]
pub struct Decoded<T> {
    pub value: T,
    /// Always empty under [`ErrorPolicy::Abort`].
    pub errors: Vec<DecodeError>,
}

impl<T> Decoded<T> {
    /// Returns true if nothing was skipped.
    pub fn is_complete(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Decodes a policy instance with default options.
pub fn decode_instance(text: &str) -> Result<Instance, DecodeError> {
    decode_instance_with_options(text, &DecodeOptions::default()).map(|decoded| decoded.value)
}

/// Decodes a policy instance.
pub fn decode_instance_with_options(
    text: &str,
    options: &DecodeOptions,
) -> Result<Decoded<Instance>, DecodeError> {
    let mut instance = Instance::new();
    let (info, errors) = yaml::decode_into(text, options, &mut Builder::Instance(&mut instance))?;
    instance.source_info = Some(info);
    Ok(Decoded {
        value: instance,
        errors,
    })
}

/// Decodes a free-form document with default options.
pub fn decode_value(text: &str) -> Result<ParsedValue, DecodeError> {
    decode_value_with_options(text, &DecodeOptions::default()).map(|decoded| decoded.value)
}

/// Decodes a free-form document. The root must be a mapping.
pub fn decode_value_with_options(
    text: &str,
    options: &DecodeOptions,
) -> Result<Decoded<ParsedValue>, DecodeError> {
    let mut doc = ParsedValue::default();
    let (info, errors) = yaml::decode_into(text, options, &mut Builder::Document(&mut doc))?;
    doc.info = info;
    Ok(Decoded { value: doc, errors })
}
