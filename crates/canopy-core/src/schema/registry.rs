use crate::{schema::KindSpec, version::Version};
use std::collections::HashMap;
use thiserror::Error as ThisError;

/// Reserved element tag for cross-document references.
pub const REFERENCE_TAG: &str = "Reference";

/// Reserved element tag for annotation blocks.
pub const ANNOTATIONS_TAG: &str = "Annotations";

const RESERVED_TAGS: &[&str] = &[REFERENCE_TAG, ANNOTATIONS_TAG];

///
/// RegistryError
///

#[derive(Debug, ThisError)]
pub enum RegistryError {
    #[error("kind '{0}' is already registered")]
    DuplicateKind(String),

    #[error("'{0}' is a reserved tag and cannot name a kind")]
    ReservedTag(String),

    #[error("kind '{0}' is not registered")]
    UnknownKind(String),
}

///
/// KindId
///
/// Dense identifier of a registered kind. Valid only against the registry
/// that minted it.
///

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct KindId(u32);

impl KindId {
    #[cfg(test)]
    pub(crate) const fn default_for_tests() -> Self {
        Self(0)
    }
}

///
/// SchemaRegistry
///
/// Explicit kind registry. Domain schemas register their kinds here during
/// setup; nothing is populated by import-order side effects, and the
/// registry is a plain owned object with clear init/teardown ownership.
///

#[derive(Debug, Default)]
pub struct SchemaRegistry {
    kinds: Vec<KindSpec>,
    by_name: HashMap<&'static str, KindId>,
    by_legacy: HashMap<&'static str, KindId>,
}

impl SchemaRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a kind, returning its identifier.
    pub fn register(&mut self, spec: KindSpec) -> Result<KindId, RegistryError> {
        for tag in [Some(spec.name), spec.legacy_name].into_iter().flatten() {
            if RESERVED_TAGS.contains(&tag) {
                return Err(RegistryError::ReservedTag(tag.to_string()));
            }
        }
        if self.by_name.contains_key(spec.name) || self.by_legacy.contains_key(spec.name) {
            return Err(RegistryError::DuplicateKind(spec.name.to_string()));
        }
        if let Some(legacy) = spec.legacy_name
            && (self.by_name.contains_key(legacy) || self.by_legacy.contains_key(legacy))
        {
            return Err(RegistryError::DuplicateKind(legacy.to_string()));
        }

        let id = KindId(u32::try_from(self.kinds.len()).expect("kind count exceeds u32"));
        self.by_name.insert(spec.name, id);
        if let Some(legacy) = spec.legacy_name {
            self.by_legacy.insert(legacy, id);
        }
        self.kinds.push(spec);

        Ok(id)
    }

    /// Number of registered kinds.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.kinds.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }

    /// Resolve a kind id to its spec.
    ///
    /// Panics if `id` was minted by a different registry; ids never escape
    /// the workspace that owns this registry.
    #[must_use]
    pub fn spec(&self, id: KindId) -> &KindSpec {
        &self.kinds[id.0 as usize]
    }

    /// Look up a kind by canonical name.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<KindId> {
        self.by_name.get(name).copied()
    }

    /// Look up a kind by canonical name, failing if unregistered.
    pub fn id_of(&self, name: &str) -> Result<KindId, RegistryError> {
        self.lookup(name)
            .ok_or_else(|| RegistryError::UnknownKind(name.to_string()))
    }

    /// The tag emitted for a kind under the given document version.
    #[must_use]
    pub fn tag_for(&self, id: KindId, version: Version) -> &'static str {
        let spec = self.spec(id);

        match spec.legacy_name {
            Some(legacy) if version.major == 1 => legacy,
            _ => spec.name,
        }
    }

    /// Resolve a serialized tag to a kind under the given document version.
    /// A kind with a legacy name answers only to that name in major
    /// version 1, and only to its canonical name elsewhere.
    #[must_use]
    pub fn kind_by_tag(&self, tag: &str, version: Version) -> Option<KindId> {
        let id = self
            .by_name
            .get(tag)
            .or_else(|| self.by_legacy.get(tag))
            .copied()?;

        (self.tag_for(id, version) == tag).then_some(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::version::{V1, V2};

    #[test]
    fn duplicate_registration_is_rejected() {
        let mut reg = SchemaRegistry::new();
        reg.register(KindSpec::new("Parameter")).expect("fresh kind");

        let err = reg.register(KindSpec::new("Parameter")).expect_err("dup");
        assert!(matches!(err, RegistryError::DuplicateKind(_)));
    }

    #[test]
    fn reserved_tags_cannot_name_kinds() {
        let mut reg = SchemaRegistry::new();

        for tag in [REFERENCE_TAG, ANNOTATIONS_TAG] {
            let err = reg.register(KindSpec::new(tag)).expect_err("reserved");
            assert!(matches!(err, RegistryError::ReservedTag(_)));
        }
    }

    #[test]
    fn legacy_names_apply_to_major_version_one_only() {
        let mut reg = SchemaRegistry::new();
        let id = reg
            .register(KindSpec::new("Component").legacy("ComponentClass"))
            .expect("fresh kind");

        assert_eq!(reg.tag_for(id, V1), "ComponentClass");
        assert_eq!(reg.tag_for(id, V2), "Component");

        assert_eq!(reg.kind_by_tag("ComponentClass", V1), Some(id));
        assert_eq!(reg.kind_by_tag("Component", V1), None);
        assert_eq!(reg.kind_by_tag("Component", V2), Some(id));
        assert_eq!(reg.kind_by_tag("ComponentClass", V2), None);
    }
}
