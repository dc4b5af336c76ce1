pub mod registry;

pub use registry::{KindId, RegistryError, SchemaRegistry};

use crate::{
    entity::Entity,
    serialize::{NodeWriter, SerializeError},
    unserialize::{NodeReader, UnserializeError},
    value::{ScalarType, Value},
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Per-kind serialization hook; populates a node through the writer.
pub type SerializeHook = fn(&Entity, &mut NodeWriter<'_>) -> Result<(), SerializeError>;

/// Per-kind construction hook; rebuilds an entity through the reader.
pub type ConstructHook = fn(&mut NodeReader<'_>) -> Result<Entity, UnserializeError>;

///
/// Cardinality
///
/// How many children of one declared kind a container expects.
///

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum Cardinality {
    Exactly(usize),
    OneOrMore,
    ZeroOrMore,
}

impl Cardinality {
    /// Returns `true` if `count` satisfies this cardinality.
    #[must_use]
    pub const fn admits(self, count: usize) -> bool {
        match self {
            Self::Exactly(n) => count == n,
            Self::OneOrMore => count >= 1,
            Self::ZeroOrMore => true,
        }
    }
}

impl fmt::Display for Cardinality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exactly(n) => write!(f, "exactly {n}"),
            Self::OneOrMore => write!(f, "one or more"),
            Self::ZeroOrMore => write!(f, "zero or more"),
        }
    }
}

///
/// AttrSpec
///
/// One declared defining attribute. A `default` marks the attribute
/// optional on read; absent optional attributes are never materialized, so
/// round trips preserve absence.
///

#[derive(Clone, Debug)]
pub struct AttrSpec {
    pub name: &'static str,
    pub ty: ScalarType,
    pub default: Option<Value>,
}

///
/// BodySpec
///
/// Declared body scalar for leaf-like kinds.
///

#[derive(Clone, Copy, Debug)]
pub struct BodySpec {
    pub ty: ScalarType,
    pub allow_empty: bool,
}

///
/// ChildSpec
///
/// One row of the explicit `{kind -> role}` member table. Roles are fixed at
/// schema registration; the engine never derives them from type names at
/// runtime.
///

#[derive(Clone, Debug)]
pub struct ChildSpec {
    pub kind: &'static str,
    pub role: &'static str,
    pub cardinality: Cardinality,
    pub allow_ref: bool,
}

///
/// KindSpec
///
/// Declaration of one entity kind: identity, defining attributes, body,
/// member roles, and the optional per-kind hooks. Kinds without hooks are
/// served by the engine's schema-driven defaults.
///

#[derive(Clone, Debug)]
pub struct KindSpec {
    pub name: &'static str,

    /// Serialized name used only for major format version 1.
    pub legacy_name: Option<&'static str>,

    /// Carries an identifying `name` attribute; required for members of
    /// containers and for document-level kinds.
    pub named: bool,

    /// Addressable from outside its document by `(name, url)`.
    pub document_level: bool,

    /// Ephemeral kinds are excluded from clone memoization.
    pub temporary: bool,

    pub cloneable: bool,

    /// Designated stochastic-seed attribute, dropped by seed-free clones.
    pub seed_attr: Option<&'static str>,

    pub attrs: Vec<AttrSpec>,
    pub body: Option<BodySpec>,
    pub children: Vec<ChildSpec>,

    pub serialize: Option<SerializeHook>,
    pub construct: Option<ConstructHook>,
}

impl KindSpec {
    /// Declare a new kind with the given canonical serialized name.
    #[must_use]
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            legacy_name: None,
            named: false,
            document_level: false,
            temporary: false,
            cloneable: true,
            seed_attr: None,
            attrs: Vec::new(),
            body: None,
            children: Vec::new(),
            serialize: None,
            construct: None,
        }
    }

    /// Serialized name accepted and emitted for major version 1 only.
    #[must_use]
    pub const fn legacy(mut self, name: &'static str) -> Self {
        self.legacy_name = Some(name);
        self
    }

    #[must_use]
    pub const fn named(mut self) -> Self {
        self.named = true;
        self
    }

    /// Document-level kinds are always named.
    #[must_use]
    pub const fn document_level(mut self) -> Self {
        self.document_level = true;
        self.named = true;
        self
    }

    #[must_use]
    pub const fn temporary(mut self) -> Self {
        self.temporary = true;
        self
    }

    #[must_use]
    pub const fn no_clone(mut self) -> Self {
        self.cloneable = false;
        self
    }

    #[must_use]
    pub const fn seeded(mut self, attr: &'static str) -> Self {
        self.seed_attr = Some(attr);
        self
    }

    /// Declare a required defining attribute.
    #[must_use]
    pub fn attr(mut self, name: &'static str, ty: ScalarType) -> Self {
        self.attrs.push(AttrSpec {
            name,
            ty,
            default: None,
        });
        self
    }

    /// Declare an optional defining attribute with a read-time default.
    #[must_use]
    pub fn attr_default(mut self, name: &'static str, ty: ScalarType, default: Value) -> Self {
        self.attrs.push(AttrSpec {
            name,
            ty,
            default: Some(default),
        });
        self
    }

    /// Declare a body scalar.
    #[must_use]
    pub const fn body(mut self, ty: ScalarType, allow_empty: bool) -> Self {
        self.body = Some(BodySpec { ty, allow_empty });
        self
    }

    /// Declare a member role for children of `kind`.
    #[must_use]
    pub fn child(
        mut self,
        kind: &'static str,
        role: &'static str,
        cardinality: Cardinality,
        allow_ref: bool,
    ) -> Self {
        self.children.push(ChildSpec {
            kind,
            role,
            cardinality,
            allow_ref,
        });
        self
    }

    /// Install a custom serialization hook.
    #[must_use]
    pub const fn on_serialize(mut self, hook: SerializeHook) -> Self {
        self.serialize = Some(hook);
        self
    }

    /// Install a custom construction hook.
    #[must_use]
    pub const fn on_construct(mut self, hook: ConstructHook) -> Self {
        self.construct = Some(hook);
        self
    }

    /// Returns `true` if this kind declares member roles.
    #[must_use]
    pub const fn is_container(&self) -> bool {
        !self.children.is_empty()
    }

    /// Look up the role a member kind plays inside this container.
    #[must_use]
    pub fn role_of(&self, member_kind: &str) -> Option<&'static str> {
        self.children
            .iter()
            .find(|c| c.kind == member_kind)
            .map(|c| c.role)
    }

    /// Find the declared attribute spec for `name`.
    #[must_use]
    pub fn attr_spec(&self, name: &str) -> Option<&AttrSpec> {
        self.attrs.iter().find(|a| a.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cardinality_admission() {
        assert!(Cardinality::Exactly(2).admits(2));
        assert!(!Cardinality::Exactly(2).admits(1));
        assert!(Cardinality::OneOrMore.admits(5));
        assert!(!Cardinality::OneOrMore.admits(0));
        assert!(Cardinality::ZeroOrMore.admits(0));
    }

    #[test]
    fn role_table_is_explicit() {
        let spec = KindSpec::new("Component")
            .child("Parameter", "parameter", Cardinality::ZeroOrMore, false)
            .child("Alias", "alias", Cardinality::ZeroOrMore, false);

        assert_eq!(spec.role_of("Parameter"), Some("parameter"));
        assert_eq!(spec.role_of("Alias"), Some("alias"));
        assert_eq!(spec.role_of("Unknown"), None);
        assert!(spec.is_container());
    }
}
