//! Data model types for policy documents.
//!
//! This module contains all the core types for representing decoded policies:
//! - Identifiers (source element ids)
//! - The value graph (dynamic nodes, structs, lists, maps, typed objects)
//! - Expression values and the capability traits an engine programs against
//! - Policy instances and their selector grammar
//! - Builders (incremental construction from a document walk)

pub mod builder;
pub mod id;
pub mod instance;
pub mod schema;
pub mod source;
pub mod traits;
pub mod val;
pub mod value;

pub use builder::Builder;
pub use id::{Id, IdGen, NIL_ID};
pub use instance::{
    ExprMatcher, Instance, LabelMatcher, MatchExpressions, MatchLabels, Selector,
};
pub use schema::{SchemaContext, SchemaRegistry, SchemaType};
pub use source::{Location, SourceInfo};
pub use traits::{Container, Indexer, Iterable, Lister, Mapper, Sizer, Value};
pub use val::{FromVal, ListRef, Type, Val};
pub use value::{
    DynValue, Field, ListValue, MapValue, ObjectValue, ParsedValue, Shape, StructValue, ValueNode,
};
