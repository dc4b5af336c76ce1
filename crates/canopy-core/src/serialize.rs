use crate::{
    annotations::{
        CORE_NS, INDEX_MEMBER_ATTR, INDEX_ROLE_ATTR, INDEX_TAG, INDEX_VALUE_ATTR, NS_ATTR,
    },
    arena::Handle,
    backend::{write_tree, BackendError, ElemId, WriteBackend},
    document::{relative_url, DocId, Workspace, VERSION_ATTR, URL_ATTR},
    entity::{Entity, NAME_ATTR},
    error::ConfigError,
    node::Node,
    schema::{
        registry::{ANNOTATIONS_TAG, REFERENCE_TAG},
        KindSpec, SerializeHook,
    },
    value::Value,
};
use std::{collections::BTreeMap, str::FromStr};
use thiserror::Error as ThisError;

///
/// SerializeError
///

#[derive(Debug, ThisError)]
pub enum SerializeError {
    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("'{0}' group written twice")]
    DuplicateWithin(String),

    #[error("kind '{kind}' requires attribute '{attr}'")]
    MissingAttribute { kind: String, attr: String },

    #[error("kind '{0}' requires a body")]
    MissingBody(String),

    #[error("kind '{0}' is not document-level and cannot be referenced")]
    NotDocumentLevel(String),

    #[error("stale entity handle")]
    StaleHandle,

    #[error("unnamed '{0}' entity cannot be referenced")]
    Unnamed(String),
}

///
/// RefStyle
///
/// How the engine writes document-level entities encountered below the
/// document roots.
///

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum RefStyle {
    /// Reference entities that already belong to a document, inline the
    /// rest. Same-document targets are referenced without a url.
    #[default]
    Contextual,

    /// Reference wherever a reference is representable.
    Prefer,

    /// Inline everything.
    Inline,

    /// Reference everything referenceable, always document-locally.
    Force,
}

impl FromStr for RefStyle {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "default" => Ok(Self::Contextual),
            "prefer-reference" => Ok(Self::Prefer),
            "force-inline" => Ok(Self::Inline),
            "force-reference" => Ok(Self::Force),
            other => Err(ConfigError::UnknownRefStyle(other.to_string())),
        }
    }
}

///
/// SerializeOptions
///

#[derive(Clone, Copy, Debug, Default)]
pub struct SerializeOptions {
    pub ref_style: RefStyle,

    /// Emit absolute urls in references instead of relativizing against the
    /// serializing document.
    pub absolute_refs: bool,

    /// Persist container index side-tables through the annotation channel.
    pub save_indices: bool,

    /// Drop all annotation blocks from the output.
    pub skip_annotations: bool,
}

/// Serialize every root of `doc` into `backend`.
pub fn serialize_document<B: WriteBackend>(
    ws: &Workspace,
    doc: DocId,
    backend: &mut B,
    options: SerializeOptions,
) -> Result<(), SerializeError> {
    let root = backend.root_elem();
    backend.set_attr(root, VERSION_ATTR, &ws.document(doc).version.to_string())?;

    let mut ser = Serializer {
        ws,
        doc,
        options,
        backend,
    };

    let roots: Vec<Handle> = ws.document(doc).roots().map(|(_, h)| h).collect();
    for handle in roots {
        ser.visit(handle, root, Some(false), true)?;
    }

    Ok(())
}

enum RefDecision {
    Inline,
    Reference { url: Option<String> },
}

///
/// Serializer
///
/// One serialization pass: walks the object graph from the document roots,
/// asking each kind's hook (or the schema-driven default) to populate its
/// element through a [`NodeWriter`].
///

struct Serializer<'a, B> {
    ws: &'a Workspace,
    doc: DocId,
    options: SerializeOptions,
    backend: &'a mut B,
}

impl<B: WriteBackend> Serializer<'_, B> {
    fn visit(
        &mut self,
        handle: Handle,
        parent: ElemId,
        reference: Option<bool>,
        multiple: bool,
    ) -> Result<(), SerializeError> {
        let ws = self.ws;
        let entity = ws.entity(handle).ok_or(SerializeError::StaleHandle)?;
        let spec = ws.registry().spec(entity.kind());

        if let RefDecision::Reference { url } = self.ref_decision(entity, spec, reference)? {
            let elem = self.backend.create_elem(REFERENCE_TAG, parent, multiple)?;
            self.backend
                .set_attr(elem, NAME_ATTR, entity.name.as_deref().unwrap_or_default())?;
            if let Some(url) = url {
                self.backend.set_attr(elem, URL_ATTR, &url)?;
            }
            return Ok(());
        }

        let tag = ws.registry().tag_for(entity.kind(), ws.document(self.doc).version);
        let elem = self.backend.create_elem(tag, parent, multiple)?;

        let hook: SerializeHook = spec.serialize.unwrap_or(serialize_via_spec);
        let mut writer = NodeWriter {
            vis: self,
            elem,
            withins: BTreeMap::new(),
        };
        hook(entity, &mut writer)?;

        self.write_annotations(entity, elem)
    }

    /// Decide whether `entity` is written inline or as a reference, and with
    /// which url. An explicit `reference` request overrides the configured
    /// style; forced references are always document-local.
    fn ref_decision(
        &self,
        entity: &Entity,
        spec: &KindSpec,
        reference: Option<bool>,
    ) -> Result<RefDecision, SerializeError> {
        let referenceable = spec.document_level && entity.name.is_some();

        let want = reference.unwrap_or(match self.options.ref_style {
            RefStyle::Inline => false,
            RefStyle::Force => true,
            RefStyle::Prefer => referenceable,
            RefStyle::Contextual => referenceable && entity.document().is_some(),
        });
        if !want {
            return Ok(RefDecision::Inline);
        }

        if !spec.document_level {
            return Err(SerializeError::NotDocumentLevel(spec.name.to_string()));
        }
        if entity.name.is_none() {
            return Err(SerializeError::Unnamed(spec.name.to_string()));
        }

        if self.options.ref_style == RefStyle::Force && reference.is_none() {
            return Ok(RefDecision::Reference { url: None });
        }

        let url = entity
            .document()
            .filter(|d| *d != self.doc)
            .and_then(|d| self.ws.document(d).url.clone())
            .map(|url| {
                if self.options.absolute_refs {
                    url
                } else {
                    relative_url(self.ws.document(self.doc).url.as_deref(), &url)
                }
            });

        Ok(RefDecision::Reference { url })
    }

    /// Append the entity's annotation block: carried annotations first, then
    /// the persisted index side-table.
    fn write_annotations(&mut self, entity: &Entity, elem: ElemId) -> Result<(), SerializeError> {
        if self.options.skip_annotations {
            return Ok(());
        }

        let mut entries: Vec<Node> = entity.annotations.to_vec();
        if self.options.save_indices {
            for (role, member, index) in entity.all_indices() {
                let mut node = Node::new(INDEX_TAG);
                node.set_attr(NS_ATTR, CORE_NS);
                node.set_attr(INDEX_ROLE_ATTR, role);
                node.set_attr(INDEX_MEMBER_ATTR, member);
                node.set_attr(INDEX_VALUE_ATTR, index.to_string());
                entries.push(node);
            }
        }
        if entries.is_empty() {
            return Ok(());
        }

        let block = self.backend.create_elem(ANNOTATIONS_TAG, elem, false)?;
        for entry in &entries {
            write_tree(self.backend, block, entry)?;
        }

        Ok(())
    }
}

/// Object-safe serializer surface the writer talks through, erasing the
/// backend type so per-kind hooks stay plain fn pointers.
trait SerializeVisit {
    fn ws(&self) -> &Workspace;

    fn visit_child(
        &mut self,
        handle: Handle,
        parent: ElemId,
        reference: Option<bool>,
        multiple: bool,
    ) -> Result<(), SerializeError>;

    fn create(&mut self, tag: &str, parent: ElemId, multiple: bool)
        -> Result<ElemId, SerializeError>;

    fn put_attr(&mut self, elem: ElemId, name: &str, value: &str) -> Result<(), SerializeError>;

    fn put_body(&mut self, elem: ElemId, value: &str, sole: bool) -> Result<(), SerializeError>;
}

impl<B: WriteBackend> SerializeVisit for Serializer<'_, B> {
    fn ws(&self) -> &Workspace {
        self.ws
    }

    fn visit_child(
        &mut self,
        handle: Handle,
        parent: ElemId,
        reference: Option<bool>,
        multiple: bool,
    ) -> Result<(), SerializeError> {
        self.visit(handle, parent, reference, multiple)
    }

    fn create(
        &mut self,
        tag: &str,
        parent: ElemId,
        multiple: bool,
    ) -> Result<ElemId, SerializeError> {
        Ok(self.backend.create_elem(tag, parent, multiple)?)
    }

    fn put_attr(&mut self, elem: ElemId, name: &str, value: &str) -> Result<(), SerializeError> {
        Ok(self.backend.set_attr(elem, name, value)?)
    }

    fn put_body(&mut self, elem: ElemId, value: &str, sole: bool) -> Result<(), SerializeError> {
        Ok(self.backend.set_body(elem, value, sole)?)
    }
}

///
/// NodeWriter
///
/// Surface handed to serialization hooks for populating one element.
/// Attribute and body values travel as [`Value`]s and are written in
/// canonical text form; children recurse through the engine so reference
/// style and annotations apply uniformly.
///

pub struct NodeWriter<'w> {
    vis: &'w mut dyn SerializeVisit,
    elem: ElemId,
    withins: BTreeMap<String, ElemId>,
}

impl NodeWriter<'_> {
    /// The workspace being serialized, for hooks that inspect neighbors.
    #[must_use]
    pub fn workspace(&self) -> &Workspace {
        self.vis.ws()
    }

    /// Write an attribute in canonical text form.
    pub fn attr(&mut self, name: &str, value: impl Into<Value>) -> Result<(), SerializeError> {
        self.vis.put_attr(self.elem, name, &value.into().to_string())
    }

    /// Write the element body. `sole` marks the body as the element's only
    /// content, which compact formats may inline.
    pub fn body(&mut self, value: impl Into<Value>, sole: bool) -> Result<(), SerializeError> {
        self.vis.put_body(self.elem, &value.into().to_string(), sole)
    }

    /// Serialize a child entity beneath this element.
    pub fn child(&mut self, handle: Handle) -> Result<(), SerializeError> {
        self.vis.visit_child(handle, self.elem, None, false)
    }

    /// Serialize each entity of an iterator beneath this element.
    pub fn children(
        &mut self,
        handles: impl IntoIterator<Item = Handle>,
    ) -> Result<(), SerializeError> {
        for handle in handles {
            self.vis.visit_child(handle, self.elem, None, true)?;
        }

        Ok(())
    }

    /// Serialize a child inside a `within` wrapper element. Reusing a
    /// wrapper requires `multiple`.
    pub fn child_in(
        &mut self,
        handle: Handle,
        within: &str,
        multiple: bool,
    ) -> Result<(), SerializeError> {
        let wrapper = match self.withins.get(within) {
            Some(wrapper) if multiple => *wrapper,
            Some(_) => return Err(SerializeError::DuplicateWithin(within.to_string())),
            None => {
                let wrapper = self.vis.create(within, self.elem, false)?;
                self.withins.insert(within.to_string(), wrapper);
                wrapper
            }
        };

        self.vis.visit_child(handle, wrapper, None, multiple)
    }

    /// Serialize a child, overriding the configured reference style.
    pub fn child_ref(
        &mut self,
        handle: Handle,
        reference: bool,
    ) -> Result<(), SerializeError> {
        self.vis.visit_child(handle, self.elem, Some(reference), true)
    }
}

/// Schema-driven default serialization: identifying name, declared
/// attributes that are set, declared body, then members role by role.
pub fn serialize_via_spec(
    entity: &Entity,
    writer: &mut NodeWriter<'_>,
) -> Result<(), SerializeError> {
    let spec = writer.workspace().registry().spec(entity.kind()).clone();

    if spec.named {
        let name = entity
            .name
            .clone()
            .ok_or_else(|| SerializeError::Unnamed(spec.name.to_string()))?;
        writer.attr(NAME_ATTR, name)?;
    }

    for attr_spec in &spec.attrs {
        match entity.attr(attr_spec.name) {
            Some(value) => writer.attr(attr_spec.name, value.clone())?,
            // Optional attributes keep their absence across round trips.
            None if attr_spec.default.is_some() => {}
            None => {
                return Err(SerializeError::MissingAttribute {
                    kind: spec.name.to_string(),
                    attr: attr_spec.name.to_string(),
                })
            }
        }
    }

    if let Some(body_spec) = spec.body {
        match &entity.body {
            Some(value) => {
                let sole = !spec.named && spec.attrs.is_empty() && spec.children.is_empty();
                writer.body(value.clone(), sole)?;
            }
            None if body_spec.allow_empty => {}
            None => return Err(SerializeError::MissingBody(spec.name.to_string())),
        }
    }

    let mut written_roles: Vec<&str> = Vec::new();
    for child_spec in &spec.children {
        if written_roles.contains(&child_spec.role) {
            continue;
        }
        written_roles.push(child_spec.role);

        let members: Vec<Handle> = entity.members(child_spec.role).map(|(_, h)| h).collect();
        for member in members {
            if child_spec.allow_ref {
                writer.children([member])?;
            } else {
                writer.child_ref(member, false)?;
            }
        }
    }

    Ok(())
}
