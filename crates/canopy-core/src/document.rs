use crate::{
    arena::{Arena, Handle},
    entity::{ContainerError, Entity},
    schema::{KindSpec, SchemaRegistry},
    types::KeyedList,
    unserialize::UnserializeError,
    version::Version,
};
use std::collections::HashSet;
use thiserror::Error as ThisError;

/// Root element tag of every serialized document.
pub const DOCUMENT_TAG: &str = "Canopy";

/// Root attribute carrying the document format version.
pub const VERSION_ATTR: &str = "version";

/// Reference attribute naming the target document.
pub const URL_ATTR: &str = "url";

///
/// DocumentError
///

#[derive(Debug, ThisError)]
pub enum DocumentError {
    #[error("document already has a root named '{0}'")]
    DuplicateRoot(String),

    #[error("kind '{0}' is not document-level and cannot be a document root")]
    NotDocumentLevel(String),

    #[error("document roots must be named")]
    UnnamedRoot,
}

///
/// DocId
///
/// Identifier of a document registered in a workspace.
///

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct DocId(u32);

///
/// Document
///
/// A named scope of document-level entities. Roots are addressable by name
/// from within the document and by `(name, url)` from outside it.
///

#[derive(Debug)]
pub struct Document {
    pub url: Option<String>,
    pub version: Version,
    roots: KeyedList<String, Handle>,
}

impl Document {
    /// Iterate over `(name, handle)` roots in insertion order.
    pub fn roots(&self) -> impl Iterator<Item = (&str, Handle)> {
        self.roots.iter().map(|(n, h)| (n.as_str(), *h))
    }

    #[must_use]
    pub fn root(&self, name: &str) -> Option<Handle> {
        self.roots.get(name).copied()
    }
}

///
/// Reference
///
/// A by-name pointer to a document-level entity. A missing `url` targets the
/// referencing document itself.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Reference {
    pub name: String,
    pub url: Option<String>,
}

///
/// DocumentLoader
///
/// Resolves a document url to a loaded document on behalf of the
/// unserializer. Implementations fetch the bytes, pick a backend, and call
/// back into [`crate::unserialize::unserialize_document`].
///

pub trait DocumentLoader {
    fn load(&mut self, url: &str, ws: &mut Workspace) -> Result<DocId, UnserializeError>;
}

///
/// NoLoader
///
/// Loader for self-contained documents; any cross-document url fails.
///

#[derive(Debug, Default)]
pub struct NoLoader;

impl DocumentLoader for NoLoader {
    fn load(&mut self, url: &str, _ws: &mut Workspace) -> Result<DocId, UnserializeError> {
        Err(UnserializeError::LoadFailed {
            url: url.to_string(),
            message: "no document loader configured".to_string(),
        })
    }
}

///
/// Workspace
///
/// Owns the schema registry, the entity arena, and every loaded document.
/// All engine passes run against exactly one workspace; handles and kind ids
/// are meaningless outside the workspace that minted them.
///

#[derive(Debug)]
pub struct Workspace {
    registry: SchemaRegistry,
    arena: Arena<Entity>,
    documents: Vec<Document>,

    /// `(root name, document url)` pairs currently being resolved; used to
    /// detect reference cycles across nested unserializer runs.
    pub(crate) in_flight: HashSet<(String, Option<String>)>,
}

impl Workspace {
    #[must_use]
    pub fn new(registry: SchemaRegistry) -> Self {
        Self {
            registry,
            arena: Arena::new(),
            documents: Vec::new(),
            in_flight: HashSet::new(),
        }
    }

    #[must_use]
    pub const fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    // ------------------------------------------------------------------
    // Entities
    // ------------------------------------------------------------------

    /// Insert an entity, returning its handle.
    pub fn insert(&mut self, entity: Entity) -> Handle {
        self.arena.insert(entity)
    }

    #[must_use]
    pub fn entity(&self, handle: Handle) -> Option<&Entity> {
        self.arena.get(handle)
    }

    #[must_use]
    pub fn entity_mut(&mut self, handle: Handle) -> Option<&mut Entity> {
        self.arena.get_mut(handle)
    }

    /// The kind spec of a live entity.
    #[must_use]
    pub fn spec_of(&self, handle: Handle) -> Option<&KindSpec> {
        self.entity(handle).map(|e| self.registry.spec(e.kind()))
    }

    /// Add `child` as a member of `parent`, inferring the role from the
    /// parent's declared member table.
    pub fn add_member(&mut self, parent: Handle, child: Handle) -> Result<(), ContainerError> {
        let parent_spec = self.spec_of(parent).ok_or_else(stale)?;
        let child_spec = self.spec_of(child).ok_or_else(stale)?;

        let role = parent_spec.role_of(child_spec.name).ok_or_else(|| {
            ContainerError::UnknownRole {
                container: parent_spec.name.to_string(),
                member: child_spec.name.to_string(),
            }
        })?;

        let name = self
            .entity(child)
            .and_then(|e| e.name.clone())
            .ok_or_else(|| ContainerError::Unnamed {
                kind: child_spec.name.to_string(),
            })?;

        self.entity_mut(parent)
            .ok_or_else(stale)?
            .add_member(role, name, child)
    }

    // ------------------------------------------------------------------
    // Documents
    // ------------------------------------------------------------------

    /// Register a new empty document.
    pub fn new_document(&mut self, url: Option<String>, version: Version) -> DocId {
        let id = DocId(u32::try_from(self.documents.len()).expect("document count exceeds u32"));
        self.documents.push(Document {
            url,
            version,
            roots: KeyedList::new(),
        });

        id
    }

    #[must_use]
    pub fn document(&self, id: DocId) -> &Document {
        &self.documents[id.0 as usize]
    }

    #[must_use]
    pub fn document_mut(&mut self, id: DocId) -> &mut Document {
        &mut self.documents[id.0 as usize]
    }

    /// Find an already-loaded document by url.
    #[must_use]
    pub fn document_by_url(&self, url: &str) -> Option<DocId> {
        self.documents
            .iter()
            .position(|d| d.url.as_deref() == Some(url))
            .map(|i| DocId(u32::try_from(i).expect("document count exceeds u32")))
    }

    /// Install `handle` as a named root of `doc`. The entity's kind must be
    /// document-level and the entity named.
    pub fn add_root(&mut self, doc: DocId, handle: Handle) -> Result<(), DocumentError> {
        let spec = self
            .spec_of(handle)
            .ok_or(DocumentError::UnnamedRoot)?;
        if !spec.document_level {
            return Err(DocumentError::NotDocumentLevel(spec.name.to_string()));
        }

        let name = self
            .entity(handle)
            .and_then(|e| e.name.clone())
            .ok_or(DocumentError::UnnamedRoot)?;

        self.document_mut(doc)
            .roots
            .try_insert(name, handle)
            .map_err(|(name, _)| DocumentError::DuplicateRoot(name))?;
        if let Some(entity) = self.entity_mut(handle) {
            entity.document = Some(doc);
        }

        Ok(())
    }

    /// Look up a document root by name.
    #[must_use]
    pub fn lookup_root(&self, doc: DocId, name: &str) -> Option<Handle> {
        self.document(doc).root(name)
    }
}

const fn stale() -> ContainerError {
    ContainerError::StaleHandle
}

// ----------------------------------------------------------------------
// Url arithmetic
// ----------------------------------------------------------------------

/// Resolve `url` against the document at `base`. Absolute urls pass through;
/// relative ones are joined onto the base's directory with `.` and `..`
/// segments collapsed.
#[must_use]
pub fn resolve_url(base: Option<&str>, url: &str) -> String {
    if url.contains("://") {
        return url.to_string();
    }
    let Some(base) = base else {
        return url.to_string();
    };
    if url.starts_with('/') {
        return url.to_string();
    }

    let (prefix, base_path) = match base.split_once("://") {
        Some((scheme, rest)) => {
            let (host, path) = rest.split_once('/').unwrap_or((rest, ""));
            (format!("{scheme}://{host}"), path)
        }
        None => (String::new(), base),
    };

    let absolute = base_path.starts_with('/');
    let dir = base_path.rsplit_once('/').map_or("", |(d, _)| d);

    let mut segments: Vec<&str> = dir.split('/').filter(|s| !s.is_empty()).collect();
    for segment in url.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }

    let joined = segments.join("/");
    if absolute || !prefix.is_empty() {
        format!("{prefix}/{joined}")
    } else {
        joined
    }
}

/// Express `to` relative to the document at `from` when both sit in the same
/// directory; otherwise `to` is returned unchanged.
#[must_use]
pub fn relative_url(from: Option<&str>, to: &str) -> String {
    let Some(from) = from else {
        return to.to_string();
    };

    let from_dir = from.rsplit_once('/').map_or("", |(d, _)| d);
    let (to_dir, to_name) = to.rsplit_once('/').unwrap_or(("", to));

    if from_dir == to_dir && !to_name.is_empty() {
        format!("./{to_name}")
    } else {
        to.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_urls_join_onto_the_base_directory() {
        assert_eq!(
            resolve_url(Some("/models/main.json"), "./shared.json"),
            "/models/shared.json"
        );
        assert_eq!(
            resolve_url(Some("/models/main.json"), "../lib/shared.json"),
            "/lib/shared.json"
        );
        assert_eq!(
            resolve_url(Some("http://host/models/main.json"), "shared.json"),
            "http://host/models/shared.json"
        );
    }

    #[test]
    fn absolute_urls_pass_through() {
        assert_eq!(
            resolve_url(Some("/models/main.json"), "http://host/other.json"),
            "http://host/other.json"
        );
        assert_eq!(resolve_url(None, "shared.json"), "shared.json");
    }

    #[test]
    fn sibling_documents_relativize() {
        assert_eq!(
            relative_url(Some("/models/main.json"), "/models/shared.json"),
            "./shared.json"
        );
        assert_eq!(
            relative_url(Some("/models/main.json"), "/lib/shared.json"),
            "/lib/shared.json"
        );
    }
}
