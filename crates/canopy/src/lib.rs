//! Canopy is a schema-first, format-agnostic object-graph serialization
//! engine.
//!
//! This is the public meta-crate. Downstream users depend on **canopy**
//! only; it re-exports the stable public API from `canopy-core`.

pub use canopy_core as core;

pub use canopy_core::Error;

//
// Prelude
//

pub mod prelude {
    pub use canopy_core::prelude::*;
}
