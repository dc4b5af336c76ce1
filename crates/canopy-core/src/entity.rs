use crate::{
    annotations::Annotations,
    arena::Handle,
    document::DocId,
    schema::KindId,
    types::KeyedList,
    value::Value,
};
use std::collections::BTreeMap;
use thiserror::Error as ThisError;

/// Reserved attribute carrying an entity's identifying name.
pub const NAME_ATTR: &str = "name";

///
/// ContainerError
///

#[derive(Debug, ThisError)]
pub enum ContainerError {
    #[error("role '{role}' already contains a member named '{name}'")]
    DuplicateName { role: String, name: String },

    #[error("role '{role}' has no member named '{name}'")]
    NotFound { role: String, name: String },

    #[error("stale entity handle")]
    StaleHandle,

    #[error("kind '{member}' plays no role inside '{container}'")]
    UnknownRole { container: String, member: String },

    #[error("unnamed '{kind}' entity cannot be a container member")]
    Unnamed { kind: String },
}

///
/// RoleMembers
///
/// One role of a container: the name-keyed member table plus the role's
/// index side-table. Member iteration order is insertion order and is not
/// part of structural equality; the index table persists across round trips
/// through the annotation channel.
///

#[derive(Clone, Debug, Default)]
pub struct RoleMembers {
    pub role: &'static str,
    pub members: KeyedList<String, Handle>,
    pub indices: BTreeMap<String, usize>,
}

///
/// Entity
///
/// Dynamic, schema-described entity record: the kind it instantiates, its
/// identifying name (for named kinds), declared attribute values, optional
/// body, per-role member tables, and the annotation side-channel.
///

#[derive(Clone, Debug)]
pub struct Entity {
    kind: KindId,
    pub name: Option<String>,
    attrs: Vec<(&'static str, Value)>,
    pub body: Option<Value>,
    roles: Vec<RoleMembers>,
    pub annotations: Annotations,
    pub(crate) document: Option<DocId>,
}

impl Entity {
    /// Create an empty entity of the given kind.
    #[must_use]
    pub const fn new(kind: KindId) -> Self {
        Self {
            kind,
            name: None,
            attrs: Vec::new(),
            body: None,
            roles: Vec::new(),
            annotations: Annotations::new(),
            document: None,
        }
    }

    /// Create a named entity of the given kind.
    #[must_use]
    pub fn named(kind: KindId, name: impl Into<String>) -> Self {
        let mut entity = Self::new(kind);
        entity.name = Some(name.into());

        entity
    }

    #[must_use]
    pub const fn kind(&self) -> KindId {
        self.kind
    }

    /// The document this entity is a root of, if any.
    #[must_use]
    pub const fn document(&self) -> Option<DocId> {
        self.document
    }

    // ------------------------------------------------------------------
    // Attributes
    // ------------------------------------------------------------------

    /// Set or replace a declared attribute value.
    pub fn set_attr(&mut self, name: &'static str, value: impl Into<Value>) {
        let value = value.into();

        match self.attrs.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = value,
            None => self.attrs.push((name, value)),
        }
    }

    /// Return a declared attribute value if set.
    #[must_use]
    pub fn attr(&self, name: &str) -> Option<&Value> {
        self.attrs
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| v)
    }

    /// Remove a declared attribute, returning its value if set.
    pub fn remove_attr(&mut self, name: &str) -> Option<Value> {
        let index = self.attrs.iter().position(|(n, _)| *n == name)?;

        Some(self.attrs.remove(index).1)
    }

    /// Iterate over set attributes in insertion order.
    pub fn attrs(&self) -> impl Iterator<Item = (&'static str, &Value)> {
        self.attrs.iter().map(|(n, v)| (*n, v))
    }

    // ------------------------------------------------------------------
    // Container membership
    // ------------------------------------------------------------------

    /// Iterate over this container's roles in first-use order.
    pub fn roles(&self) -> impl Iterator<Item = &RoleMembers> {
        self.roles.iter()
    }

    /// Returns `true` if any role has members or assigned indices.
    #[must_use]
    pub fn has_members(&self) -> bool {
        self.roles.iter().any(|r| !r.members.is_empty())
    }

    /// Add a member under `role`. On a duplicate name the container is
    /// unchanged.
    pub fn add_member(
        &mut self,
        role: &'static str,
        name: impl Into<String>,
        member: Handle,
    ) -> Result<(), ContainerError> {
        let name = name.into();

        self.role_mut(role)
            .members
            .try_insert(name, member)
            .map_err(|(name, _)| ContainerError::DuplicateName {
                role: role.to_string(),
                name,
            })
    }

    /// Remove the member named `name` from `role`. The member's index
    /// assignment is released for reuse.
    pub fn remove_member(&mut self, role: &str, name: &str) -> Result<Handle, ContainerError> {
        let entry = self.roles.iter_mut().find(|r| r.role == role);

        let not_found = || ContainerError::NotFound {
            role: role.to_string(),
            name: name.to_string(),
        };

        let entry = entry.ok_or_else(not_found)?;
        let member = entry.members.remove(name).ok_or_else(not_found)?;
        entry.indices.remove(name);

        Ok(member)
    }

    /// Look up the member named `name` within `role`.
    pub fn member(&self, role: &str, name: &str) -> Result<Handle, ContainerError> {
        self.roles
            .iter()
            .find(|r| r.role == role)
            .and_then(|r| r.members.get(name).copied())
            .ok_or_else(|| ContainerError::NotFound {
                role: role.to_string(),
                name: name.to_string(),
            })
    }

    /// Iterate over `(name, handle)` members of `role` in insertion order.
    pub fn members<'a>(&'a self, role: &str) -> impl Iterator<Item = (&'a str, Handle)> {
        self.roles
            .iter()
            .find(|r| r.role == role)
            .into_iter()
            .flat_map(|r| r.members.iter().map(|(n, h)| (n.as_str(), *h)))
    }

    // ------------------------------------------------------------------
    // Index side-table
    // ------------------------------------------------------------------

    /// Return the stable index of the member named `name` within `role`,
    /// assigning one on first use.
    ///
    /// Allocation takes the smallest non-negative integer not already
    /// assigned within the role, so an index freed by a removal is reused
    /// before the table grows. This compacted-index policy is deliberate;
    /// persisted documents depend on it.
    pub fn index_of(&mut self, role: &str, name: &str) -> Result<usize, ContainerError> {
        let entry = self
            .roles
            .iter_mut()
            .find(|r| r.role == role)
            .filter(|r| r.members.contains_key(name))
            .ok_or_else(|| ContainerError::NotFound {
                role: role.to_string(),
                name: name.to_string(),
            })?;

        if let Some(index) = entry.indices.get(name) {
            return Ok(*index);
        }

        let index = (0..).find(|i| !entry.indices.values().any(|v| v == i))
            .expect("unbounded search yields a free index");
        entry.indices.insert(name.to_string(), index);

        Ok(index)
    }

    /// Install an index assignment verbatim, as restored from a persisted
    /// document or copied by the cloner.
    pub fn set_index(&mut self, role: &'static str, name: impl Into<String>, index: usize) {
        self.role_mut(role).indices.insert(name.into(), index);
    }

    /// Iterate over every assigned `(role, member name, index)` triple.
    pub fn all_indices(&self) -> impl Iterator<Item = (&'static str, &str, usize)> {
        self.roles.iter().flat_map(|r| {
            r.indices
                .iter()
                .map(move |(name, index)| (r.role, name.as_str(), *index))
        })
    }

    /// Returns `true` if any role has assigned indices.
    #[must_use]
    pub fn has_indices(&self) -> bool {
        self.roles.iter().any(|r| !r.indices.is_empty())
    }

    fn role_mut(&mut self, role: &'static str) -> &mut RoleMembers {
        if let Some(index) = self.roles.iter().position(|r| r.role == role) {
            return &mut self.roles[index];
        }

        self.roles.push(RoleMembers {
            role,
            ..RoleMembers::default()
        });

        self.roles.last_mut().expect("role just pushed")
    }
}
