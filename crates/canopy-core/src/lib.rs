//! Core engine for Canopy: the entity model, schema registry, format
//! backends, and the serialization, unserialization, and cloning passes,
//! with the ergonomics exported via the `prelude`.
#![warn(unreachable_pub)]

pub mod annotations;
pub mod arena;
pub mod backend;
pub mod cloner;
pub mod compare;
pub mod document;
pub mod entity;
pub mod error;
pub mod node;
pub mod schema;
pub mod serialize;
pub mod types;
pub mod unserialize;
pub mod value;
pub mod version;

// test
#[cfg(test)]
pub(crate) mod test_fixtures;

pub use error::Error;

///
/// Prelude
///
/// Prelude contains only domain vocabulary and the engine entry points.
/// Backend internals and per-module error types stay behind their modules.
///

pub mod prelude {
    pub use crate::{
        arena::Handle,
        cloner::{CloneDefinitions, CloneOptions, Cloner},
        compare::{diff, structurally_equal},
        document::{DocId, DocumentLoader, NoLoader, Workspace},
        entity::Entity,
        error::Error,
        schema::{Cardinality, KindId, KindSpec, SchemaRegistry},
        serialize::{serialize_document, RefStyle, SerializeOptions},
        unserialize::unserialize_document,
        value::{ScalarType, Value},
        version::Version,
    };
}
