use crate::{
    arena::Handle,
    document::{DocId, Workspace},
    entity::{ContainerError, Entity},
    error::ConfigError,
};
use std::collections::HashMap;
use thiserror::Error as ThisError;

///
/// CloneError
///

#[derive(Debug, ThisError)]
pub enum CloneError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Container(#[from] ContainerError),

    #[error("stale entity handle")]
    StaleHandle,

    #[error("kind '{0}' cannot be cloned")]
    Unsupported(String),
}

///
/// CloneDefinitions
///
/// Which document-level entities a clone pass copies. `Local` shares any
/// definition living outside the bounding document instead of copying it.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CloneDefinitions {
    All,
    Local,
}

///
/// CloneOptions
///

#[derive(Clone, Copy, Debug, Default)]
pub struct CloneOptions {
    /// Definition policy; defaults to `Local` when a bounding document is
    /// given and `All` otherwise.
    pub definitions: Option<CloneDefinitions>,

    /// Bounding document for the `Local` policy.
    pub document: Option<DocId>,

    /// Copy designated seed attributes verbatim. By default they are
    /// dropped so clones draw fresh randomness.
    pub random_seeds: bool,

    /// Leave annotation side-channels behind.
    pub skip_annotations: bool,
}

///
/// Cloner
///
/// Deep-copies object graphs while preserving sharing: an entity reached
/// twice yields one copy, referenced from both sites. The memo persists
/// across calls, so clones made through one `Cloner` share substructure.
///

pub struct Cloner<'a> {
    ws: &'a mut Workspace,
    definitions: CloneDefinitions,
    document: Option<DocId>,
    random_seeds: bool,
    skip_annotations: bool,
    memo: HashMap<Handle, Handle>,
}

impl<'a> Cloner<'a> {
    pub fn new(ws: &'a mut Workspace, options: CloneOptions) -> Result<Self, CloneError> {
        let definitions = match options.definitions {
            Some(CloneDefinitions::Local) if options.document.is_none() => {
                return Err(ConfigError::LocalCloneWithoutDocument.into());
            }
            Some(definitions) => definitions,
            None if options.document.is_some() => CloneDefinitions::Local,
            None => CloneDefinitions::All,
        };

        Ok(Self {
            ws,
            definitions,
            document: options.document,
            random_seeds: options.random_seeds,
            skip_annotations: options.skip_annotations,
            memo: HashMap::new(),
        })
    }

    /// Clone the graph reachable from `handle`, returning the copy's root.
    pub fn clone_entity(&mut self, handle: Handle) -> Result<Handle, CloneError> {
        self.clone_inner(handle, true)
    }

    fn clone_inner(&mut self, handle: Handle, is_root: bool) -> Result<Handle, CloneError> {
        if let Some(copy) = self.memo.get(&handle) {
            return Ok(*copy);
        }

        let entity = self
            .ws
            .entity(handle)
            .ok_or(CloneError::StaleHandle)?
            .clone();
        let spec = self.ws.registry().spec(entity.kind()).clone();

        // Under the Local policy, definitions not owned by the bounding
        // document are shared rather than copied.
        if !is_root
            && self.definitions == CloneDefinitions::Local
            && spec.document_level
            && entity.document() != self.document
        {
            return Ok(handle);
        }

        if !spec.cloneable {
            return Err(CloneError::Unsupported(spec.name.to_string()));
        }

        let mut copy = Entity::new(entity.kind());
        copy.name.clone_from(&entity.name);
        for (name, value) in entity.attrs() {
            if !self.random_seeds && spec.seed_attr == Some(name) {
                continue;
            }
            copy.set_attr(name, value.clone());
        }
        copy.body.clone_from(&entity.body);
        if !self.skip_annotations {
            copy.annotations = entity.annotations.clone();
        }

        // Memoize before descending so diamonds collapse onto one copy.
        let copy_handle = self.ws.insert(copy);
        if !spec.temporary {
            self.memo.insert(handle, copy_handle);
        }

        for role in entity.roles() {
            for (name, member) in role.members.iter().map(|(n, h)| (n.clone(), *h)) {
                let cloned = self.clone_inner(member, false)?;
                self.ws
                    .entity_mut(copy_handle)
                    .ok_or(CloneError::StaleHandle)?
                    .add_member(role.role, name, cloned)?;
            }
        }
        for (role, name, index) in entity.all_indices() {
            self.ws
                .entity_mut(copy_handle)
                .ok_or(CloneError::StaleHandle)?
                .set_index(role, name, index);
        }

        Ok(copy_handle)
    }
}
