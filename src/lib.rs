//! schema-walk
//!
//! A cycle-safe, mutation-safe reference visitor for self-referential JSON
//! Schema documents.
//!
//! ## Features
//!
//! - **Arena Node Model**: schemas, `$ref` nodes, keyed maps, lists and
//!   opaque objects live in one [`SchemaDocument`] and are addressed by
//!   [`NodeId`]
//! - **Single Visit**: every node reachable from the root is visited at most
//!   once per traversal, so cycles terminate and shared sub-trees keep one
//!   identity
//! - **In-Place Rewriting**: the [`ReferenceVisitor`] hook can keep, replace
//!   or delete any reference-capable node; the change is committed into the
//!   parent through a single-use [`ReplacementChannel`]
//! - **Cooperative Cancellation**: traversals check a [`CancellationToken`]
//!   before every node
//! - **JSON Codec**: order-preserving parse/print in [`codec`]
//!
//! ## Architecture
//!
//! ```text
//! SchemaDocument (arena)
//! ├── Node::Schema      core slots, visited in a fixed order
//! ├── Node::Reference   plain `$ref` objects
//! ├── Node::Object      typed members (structural fallback)
//! ├── Node::Map/List    keyed and ordered containers
//! ├── Node::Dictionary  keyed entries plus typed members
//! ├── Node::Sequence    forward-only, read-only
//! └── Node::Scalar      leaves
//! ```

pub mod cancel;
pub mod checked;
pub mod codec;
pub mod config;
pub mod document;
pub mod error;
pub mod extension;
pub mod visitor;

pub use cancel::CancellationToken;
pub use checked::CheckedSet;
pub use config::WalkConfig;
pub use document::{
    DictionaryNode, JsonReference, JsonSchema, Member, Node, NodeId, ObjectNode, SchemaDocument,
    SchemaField, SchemaList, SchemaMap, SlotMap,
};
pub use error::{CodecError, Result, VisitError};
pub use extension::{
    generate_schema, ExtensionAnnotation, ExtensionDataProvider, PropertyDescriptor,
    TypeDescriptor,
};
pub use visitor::{
    from_fn, visit, visit_from, visit_with_cancel, CollectedReference, Outcome,
    ReferenceCollector, ReferenceRewriter, ReferenceVisitor, ReplacementChannel, Walker,
};
