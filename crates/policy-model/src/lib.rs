//! Policy model: a typed object model and dynamic values for YAML policy instances.
//!
//! This crate turns policy documents into a value graph that an expression
//! engine can evaluate against, and provides decoding and validation for them.
//!
//! # Overview
//!
//! A policy instance is a closed record (`version`, `kind`, `description`,
//! `metadata`, `selector`, `rules`). Free-form parts are represented as a tree
//! of dynamic values:
//! - **Builders** construct the tree incrementally from a document walk
//! - **Values** expose the tree to an engine through capability traits
//! - **Objects** give maps a schema type with default-value resolution
//!
//! # Quick Start
//!
//! ```rust
//! use policy_model::{decode_instance, validate_instance, Val};
//!
//! let text = "\
//! version: v1
//! kind: Policy
//! metadata:
//!   name: web
//! rules:
//!   - name: r0
//!     limit: 10
//! ";
//!
//! let instance = decode_instance(text).unwrap();
//! validate_instance(&instance).unwrap();
//! assert_eq!(instance.name(), Some("web"));
//!
//! let rules = instance.rules().unwrap().as_val();
//! let limit = rules.get(&Val::from(0i64)).get(&Val::from("limit")).convert_to_native::<i64>();
//! assert_eq!(limit, Ok(10));
//! ```
//!
//! # Modules
//!
//! - [`model`]: Value graph, expression values, instances, builders, schema
//! - [`codec`]: YAML decoding into the model
//! - [`validate`]: Semantic validation
//! - [`error`]: Error types
//! - [`limits`]: Limits for decoding untrusted input
//! - [`util`]: Timestamps
//!
//! # Equality
//!
//! Values compare only with values of the same type name. `1 == "1"` is not
//! `false` but a "no such overload" error value, which the engine surfaces.
//!
//! # Concurrency
//!
//! A finished model is immutable. Every model type is `Send + Sync`, so one
//! instance can be evaluated from many threads at once.

pub mod codec;
pub mod error;
pub mod limits;
pub mod model;
pub mod util;
pub mod validate;

// Re-export commonly used types at crate root
pub use codec::{
    decode_instance, decode_instance_with_options, decode_value, decode_value_with_options,
    DecodeOptions, Decoded, ErrorPolicy,
};
pub use error::{BuildError, DecodeError, ErrorKind, ValidationError, ValueError};
pub use model::{
    Builder, DynValue, Field, Id, Instance, ListValue, MapValue, ObjectValue, ParsedValue,
    SchemaContext, SchemaRegistry, SchemaType, SourceInfo, Type, Val, ValueNode, NIL_ID,
};
pub use util::Timestamp;
pub use validate::{validate_instance, validate_rules};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
