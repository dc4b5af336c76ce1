use crate::{
    annotations::{
        CORE_NS, INDEX_MEMBER_ATTR, INDEX_ROLE_ATTR, INDEX_TAG, INDEX_VALUE_ATTR, NS_ATTR,
        VALIDATION_ENABLED_ATTR, VALIDATION_TAG,
    },
    arena::Handle,
    backend::{read_tree, BackendError, ElemId, ReadBackend},
    document::{
        resolve_url, DocId, DocumentError, DocumentLoader, Workspace, URL_ATTR, VERSION_ATTR,
    },
    entity::{ContainerError, Entity, NAME_ATTR},
    node::Node,
    schema::{
        registry::{ANNOTATIONS_TAG, REFERENCE_TAG},
        Cardinality, ConstructHook, KindId, KindSpec,
    },
    value::{ConvertError, FromScalar, ScalarType, Value},
    version::{Version, VersionError},
};
use std::collections::BTreeSet;
use thiserror::Error as ThisError;

///
/// UnserializeError
///

#[derive(Debug, ThisError)]
#[remain::sorted]
pub enum UnserializeError {
    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("'{tag}' holds {found} '{kind}' children, expected {expected}")]
    Cardinality {
        tag: String,
        kind: String,
        expected: String,
        found: usize,
    },

    #[error(transparent)]
    Container(#[from] ContainerError),

    #[error("in '{tag}' {item}: {source}")]
    Conversion {
        tag: String,
        item: String,
        source: ConvertError,
    },

    #[error("resolution of '{0}' depends on itself")]
    CyclicReference(String),

    #[error(transparent)]
    Document(#[from] DocumentError),

    #[error("failed to load document '{url}': {message}")]
    LoadFailed { url: String, message: String },

    #[error("'{tag}' requires attribute '{attr}'")]
    MissingAttribute { tag: String, attr: String },

    #[error("'{0}' requires a body")]
    MissingBody(String),

    #[error("'{tag}' holds no child of kind {expected}")]
    MissingChild { tag: String, expected: String },

    #[error("no serialization found for '{name}'{}", url.as_deref().map(|u| format!(" in '{u}'")).unwrap_or_default())]
    MissingSerialization { name: String, url: Option<String> },

    #[error("document has no format version")]
    MissingVersion,

    #[error("'{tag}' holds more than one child of kind {expected}")]
    MultipleMatch { tag: String, expected: String },

    #[error("attributes of '{tag}' were not consumed: {attrs}")]
    UnconsumedAttrs { tag: String, attrs: String },

    #[error("body of '{0}' was not consumed")]
    UnconsumedBody(String),

    #[error("children of '{tag}' were not consumed: {tags}")]
    UnconsumedChildren { tag: String, tags: String },

    #[error("reference to '{name}' resolved to a '{found}', expected {expected}")]
    UnexpectedType {
        name: String,
        expected: String,
        found: String,
    },

    #[error("tag '{0}' matches no registered kind under this format version")]
    UnknownTag(String),

    #[error(transparent)]
    Version(#[from] VersionError),
}

///
/// AllowRef
///
/// Whether a requested child may arrive as a `Reference` element.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AllowRef {
    No,
    Yes,
    Only,
}

/// Unserialize a complete document from `backend` into the workspace.
///
/// Roots are registered up front and resolved lazily, so a root may
/// reference a later sibling; cycles are reported rather than followed.
/// `url` becomes the document's address for cross-document references.
pub fn unserialize_document<B: ReadBackend>(
    ws: &mut Workspace,
    backend: &B,
    loader: &mut dyn DocumentLoader,
    url: Option<String>,
) -> Result<DocId, UnserializeError> {
    let root = backend.root_elem();
    let version: Version = backend
        .attr(root, VERSION_ATTR)
        .ok_or(UnserializeError::MissingVersion)?
        .parse()?;
    let doc = ws.new_document(url, version);

    let mut pending: Vec<(String, KindId, ElemId)> = Vec::new();
    for (tag, elem) in backend.children(root) {
        if tag == ANNOTATIONS_TAG {
            continue;
        }
        let kind = ws
            .registry()
            .kind_by_tag(&tag, version)
            .ok_or_else(|| UnserializeError::UnknownTag(tag.clone()))?;
        let name = backend
            .attr(elem, NAME_ATTR)
            .ok_or_else(|| UnserializeError::MissingAttribute {
                tag: tag.clone(),
                attr: NAME_ATTR.to_string(),
            })?;
        if pending.iter().any(|(n, _, _)| *n == name) {
            return Err(DocumentError::DuplicateRoot(name).into());
        }
        pending.push((name, kind, elem));
    }

    let mut unser = Unserializer {
        ws,
        backend,
        loader,
        doc,
        version,
        pending,
    };
    let names: Vec<String> = unser.pending.iter().map(|(n, _, _)| n.clone()).collect();
    for name in names {
        unser.resolve_root(&name)?;
    }

    Ok(doc)
}

///
/// Unserializer
///
/// One unserialization pass over a single document. Roots resolve on
/// demand; every resolution runs the kind's construction hook against a
/// [`NodeReader`] and then enforces strict consumption of the element.
///

struct Unserializer<'a, B> {
    ws: &'a mut Workspace,
    backend: &'a B,
    loader: &'a mut dyn DocumentLoader,
    doc: DocId,
    version: Version,
    pending: Vec<(String, KindId, ElemId)>,
}

impl<B: ReadBackend> Unserializer<'_, B> {
    /// Resolve the named root, visiting its element if it has not been
    /// built yet.
    fn resolve_root(&mut self, name: &str) -> Result<Handle, UnserializeError> {
        if let Some(handle) = self.ws.lookup_root(self.doc, name) {
            return Ok(handle);
        }

        let (kind, elem) = self
            .pending
            .iter()
            .find(|(n, _, _)| n == name)
            .map(|(_, k, e)| (*k, *e))
            .ok_or_else(|| UnserializeError::MissingSerialization {
                name: name.to_string(),
                url: self.ws.document(self.doc).url.clone(),
            })?;

        let key = (name.to_string(), self.ws.document(self.doc).url.clone());
        if !self.ws.in_flight.insert(key.clone()) {
            return Err(UnserializeError::CyclicReference(name.to_string()));
        }
        let visited = self.visit_elem(kind, elem);
        self.ws.in_flight.remove(&key);

        let handle = visited?;
        self.ws.add_root(self.doc, handle)?;

        Ok(handle)
    }

    /// Build the entity for one element: run the construction hook, enforce
    /// strict consumption, then restore the annotation side-channel.
    fn visit_elem(&mut self, kind: KindId, elem: ElemId) -> Result<Handle, UnserializeError> {
        let spec = self.ws.registry().spec(kind).clone();
        let tag = self
            .ws
            .registry()
            .tag_for(kind, self.version)
            .to_string();

        let mut annotations = Vec::new();
        let mut annotation_blocks = 0;
        let mut children = Vec::new();
        for (child_tag, child_elem) in self.backend.children(elem) {
            if child_tag == ANNOTATIONS_TAG {
                annotation_blocks += 1;
                if annotation_blocks > 1 {
                    return Err(UnserializeError::MultipleMatch {
                        tag,
                        expected: ANNOTATIONS_TAG.to_string(),
                    });
                }
                for (entry_tag, entry) in self.backend.children(child_elem) {
                    annotations.push(read_tree(self.backend, entry, &entry_tag));
                }
            } else {
                children.push(ChildSlot {
                    tag: child_tag,
                    elem: child_elem,
                    consumed: false,
                });
            }
        }

        let validate = !annotations.iter().any(|n| {
            n.tag == VALIDATION_TAG
                && n.attr(NS_ATTR) == Some(CORE_NS)
                && n.attr(VALIDATION_ENABLED_ATTR) == Some("false")
        });

        let unprocessed_attrs: BTreeSet<String> =
            self.backend.attr_keys(elem).into_iter().collect();
        let body_present = self.backend.body(elem, false).is_some();

        let hook: ConstructHook = spec.construct.unwrap_or(construct_via_spec);
        let mut reader = NodeReader {
            vis: self,
            elem,
            tag,
            kind,
            spec,
            unprocessed_attrs,
            children,
            body_consumed: false,
            validate,
            ref_mismatch: None,
        };
        let mut entity = hook(&mut reader)?;

        // Strict consumption: everything in the element must have been
        // claimed by the hook.
        if !reader.unprocessed_attrs.is_empty() {
            return Err(UnserializeError::UnconsumedAttrs {
                tag: reader.tag,
                attrs: reader
                    .unprocessed_attrs
                    .iter()
                    .cloned()
                    .collect::<Vec<_>>()
                    .join(", "),
            });
        }
        let leftover: Vec<&str> = reader
            .children
            .iter()
            .filter(|c| !c.consumed)
            .map(|c| c.tag.as_str())
            .collect();
        if !leftover.is_empty() {
            return Err(UnserializeError::UnconsumedChildren {
                tag: reader.tag,
                tags: leftover.join(", "),
            });
        }
        if body_present && !reader.body_consumed {
            return Err(UnserializeError::UnconsumedBody(reader.tag));
        }
        let tag = reader.tag;
        let spec = reader.spec;

        self.restore_annotations(&mut entity, &spec, &tag, annotations)?;

        Ok(self.ws.insert(entity))
    }

    /// Re-attach carried annotations, consuming the engine's own vocabulary:
    /// `Index` entries feed the container side-table verbatim and
    /// `Validation` toggles are dropped after use.
    fn restore_annotations(
        &self,
        entity: &mut Entity,
        spec: &KindSpec,
        tag: &str,
        annotations: Vec<Node>,
    ) -> Result<(), UnserializeError> {
        for node in annotations {
            if node.attr(NS_ATTR) == Some(CORE_NS) && node.tag == INDEX_TAG {
                let role_text = required_attr(&node, INDEX_ROLE_ATTR, tag)?;
                let member = required_attr(&node, INDEX_MEMBER_ATTR, tag)?;
                let value = required_attr(&node, INDEX_VALUE_ATTR, tag)?;

                let role = spec
                    .children
                    .iter()
                    .find(|c| c.role == role_text)
                    .map(|c| c.role)
                    .ok_or_else(|| ContainerError::UnknownRole {
                        container: spec.name.to_string(),
                        member: role_text.clone(),
                    })?;
                let index = usize::from_text(&value).map_err(|source| {
                    UnserializeError::Conversion {
                        tag: tag.to_string(),
                        item: format!("index of '{member}'"),
                        source,
                    }
                })?;

                entity.set_index(role, member, index);
            } else if node.attr(NS_ATTR) == Some(CORE_NS) && node.tag == VALIDATION_TAG {
                // Already applied while reading the element.
            } else {
                entity.annotations.push_entry(node);
            }
        }

        Ok(())
    }

    /// Resolve a `Reference` element to a live handle, loading the target
    /// document if necessary.
    fn resolve_reference(
        &mut self,
        name: &str,
        url: Option<&str>,
    ) -> Result<Handle, UnserializeError> {
        let Some(url) = url else {
            return self.resolve_root(name);
        };

        let own_url = self.ws.document(self.doc).url.clone();
        let resolved = resolve_url(own_url.as_deref(), url);
        if own_url.as_deref() == Some(resolved.as_str()) {
            return self.resolve_root(name);
        }

        let key = (name.to_string(), Some(resolved.clone()));
        if self.ws.in_flight.contains(&key) {
            return Err(UnserializeError::CyclicReference(name.to_string()));
        }

        let target = match self.ws.document_by_url(&resolved) {
            Some(doc) => doc,
            None => self.loader.load(&resolved, self.ws)?,
        };

        self.ws
            .lookup_root(target, name)
            .ok_or_else(|| UnserializeError::MissingSerialization {
                name: name.to_string(),
                url: Some(resolved),
            })
    }
}

fn required_attr(node: &Node, attr: &str, tag: &str) -> Result<String, UnserializeError> {
    node.attr(attr)
        .map(ToString::to_string)
        .ok_or_else(|| UnserializeError::MissingAttribute {
            tag: tag.to_string(),
            attr: attr.to_string(),
        })
}

#[derive(Debug)]
struct ChildSlot {
    tag: String,
    elem: ElemId,
    consumed: bool,
}

/// Object-safe unserializer surface the reader talks through, erasing the
/// backend type so per-kind hooks stay plain fn pointers.
trait UnserializeVisit {
    fn ws(&self) -> &Workspace;
    fn insert(&mut self, entity: Entity) -> Handle;
    fn version(&self) -> Version;
    fn visit(&mut self, kind: KindId, elem: ElemId) -> Result<Handle, UnserializeError>;
    fn resolve_ref(&mut self, name: &str, url: Option<&str>)
        -> Result<Handle, UnserializeError>;
    fn elem_children(&self, elem: ElemId) -> Vec<(String, ElemId)>;
    fn elem_attr(&self, elem: ElemId, name: &str) -> Option<String>;
    fn elem_attr_keys(&self, elem: ElemId) -> Vec<String>;
    fn elem_body(&self, elem: ElemId, sole: bool) -> Option<String>;
}

impl<B: ReadBackend> UnserializeVisit for Unserializer<'_, B> {
    fn ws(&self) -> &Workspace {
        self.ws
    }

    fn insert(&mut self, entity: Entity) -> Handle {
        self.ws.insert(entity)
    }

    fn version(&self) -> Version {
        self.version
    }

    fn visit(&mut self, kind: KindId, elem: ElemId) -> Result<Handle, UnserializeError> {
        self.visit_elem(kind, elem)
    }

    fn resolve_ref(
        &mut self,
        name: &str,
        url: Option<&str>,
    ) -> Result<Handle, UnserializeError> {
        self.resolve_reference(name, url)
    }

    fn elem_children(&self, elem: ElemId) -> Vec<(String, ElemId)> {
        self.backend.children(elem)
    }

    fn elem_attr(&self, elem: ElemId, name: &str) -> Option<String> {
        self.backend.attr(elem, name)
    }

    fn elem_attr_keys(&self, elem: ElemId) -> Vec<String> {
        self.backend.attr_keys(elem)
    }

    fn elem_body(&self, elem: ElemId, sole: bool) -> Option<String> {
        self.backend.body(elem, sole)
    }
}

///
/// NodeReader
///
/// Surface handed to construction hooks for consuming one element. Every
/// read marks its target consumed; whatever a hook leaves behind fails the
/// engine's strict-consumption check afterwards.
///

pub struct NodeReader<'r> {
    vis: &'r mut dyn UnserializeVisit,
    elem: ElemId,
    tag: String,
    kind: KindId,
    spec: KindSpec,
    unprocessed_attrs: BTreeSet<String>,
    children: Vec<ChildSlot>,
    body_consumed: bool,
    validate: bool,
    ref_mismatch: Option<UnserializeError>,
}

impl NodeReader<'_> {
    #[must_use]
    pub const fn kind(&self) -> KindId {
        self.kind
    }

    #[must_use]
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// `false` when a `Validation` annotation disabled checking for this
    /// subtree; cardinality constraints are then not enforced.
    #[must_use]
    pub const fn validate_enabled(&self) -> bool {
        self.validate
    }

    /// The workspace being populated, for hooks that inspect neighbors.
    #[must_use]
    pub fn workspace(&self) -> &Workspace {
        self.vis.ws()
    }

    /// Insert an auxiliary entity built by the hook itself.
    pub fn insert(&mut self, entity: Entity) -> Handle {
        self.vis.insert(entity)
    }

    /// Consume the identifying name attribute.
    pub fn name(&mut self) -> Result<String, UnserializeError> {
        self.attr(NAME_ATTR)
    }

    /// Consume a required attribute, converting it to `T`.
    pub fn attr<T: FromScalar>(&mut self, name: &str) -> Result<T, UnserializeError> {
        self.attr_opt(name)?
            .ok_or_else(|| UnserializeError::MissingAttribute {
                tag: self.tag.clone(),
                attr: name.to_string(),
            })
    }

    /// Consume an optional attribute.
    pub fn attr_opt<T: FromScalar>(&mut self, name: &str) -> Result<Option<T>, UnserializeError> {
        let Some(text) = self.vis.elem_attr(self.elem, name) else {
            return Ok(None);
        };
        self.unprocessed_attrs.remove(name);

        T::from_text(&text)
            .map(Some)
            .map_err(|source| UnserializeError::Conversion {
                tag: self.tag.clone(),
                item: format!("attribute '{name}'"),
                source,
            })
    }

    /// Consume an optional attribute, falling back to `default`.
    pub fn attr_or<T: FromScalar>(
        &mut self,
        name: &str,
        default: T,
    ) -> Result<T, UnserializeError> {
        Ok(self.attr_opt(name)?.unwrap_or(default))
    }

    /// Consume the element body, converting it to `T`.
    pub fn body<T: FromScalar>(&mut self) -> Result<T, UnserializeError> {
        self.body_opt()?
            .ok_or_else(|| UnserializeError::MissingBody(self.tag.clone()))
    }

    /// Consume the element body if present.
    pub fn body_opt<T: FromScalar>(&mut self) -> Result<Option<T>, UnserializeError> {
        let sole = !self.spec.named && self.spec.attrs.is_empty() && self.spec.children.is_empty();
        let Some(text) = self.vis.elem_body(self.elem, sole) else {
            return Ok(None);
        };
        self.body_consumed = true;

        T::from_text(&text)
            .map(Some)
            .map_err(|source| UnserializeError::Conversion {
                tag: self.tag.clone(),
                item: "body".to_string(),
                source,
            })
    }

    /// Consume exactly one child of any of the given kinds.
    pub fn child(
        &mut self,
        kinds: &[&str],
        allow_ref: AllowRef,
    ) -> Result<Handle, UnserializeError> {
        let mut matches = self.take_children(kinds, allow_ref, Some(1))?;

        match matches.len() {
            1 => Ok(matches.remove(0)),
            0 => Err(self.ref_mismatch.take().unwrap_or_else(|| {
                UnserializeError::MissingChild {
                    tag: self.tag.clone(),
                    expected: kinds.join("|"),
                }
            })),
            _ => Err(UnserializeError::MultipleMatch {
                tag: self.tag.clone(),
                expected: kinds.join("|"),
            }),
        }
    }

    /// Consume exactly one child of any of the given kinds held inside a
    /// `within` wrapper element. The wrapper is a pure grouping element and
    /// must carry nothing but the wrapped child.
    pub fn child_in(
        &mut self,
        kinds: &[&str],
        within: &str,
        allow_ref: AllowRef,
    ) -> Result<Handle, UnserializeError> {
        let mut wrapper = None;
        for (index, slot) in self.children.iter().enumerate() {
            if slot.consumed || slot.tag != within {
                continue;
            }
            if wrapper.is_some() {
                return Err(UnserializeError::MultipleMatch {
                    tag: self.tag.clone(),
                    expected: within.to_string(),
                });
            }
            wrapper = Some(index);
        }
        let Some(index) = wrapper else {
            return Err(UnserializeError::MissingChild {
                tag: self.tag.clone(),
                expected: within.to_string(),
            });
        };
        self.children[index].consumed = true;
        let elem = self.children[index].elem;

        let attrs = self.vis.elem_attr_keys(elem);
        if !attrs.is_empty() {
            return Err(UnserializeError::UnconsumedAttrs {
                tag: within.to_string(),
                attrs: attrs.join(", "),
            });
        }
        if self.vis.elem_body(elem, false).is_some() {
            return Err(UnserializeError::UnconsumedBody(within.to_string()));
        }

        let inner: Vec<ChildSlot> = self
            .vis
            .elem_children(elem)
            .into_iter()
            .map(|(tag, elem)| ChildSlot {
                tag,
                elem,
                consumed: false,
            })
            .collect();
        let outer = std::mem::replace(&mut self.children, inner);
        let result = self.child(kinds, allow_ref);
        let inner = std::mem::replace(&mut self.children, outer);
        let handle = result?;

        let leftover: Vec<&str> = inner
            .iter()
            .filter(|c| !c.consumed)
            .map(|c| c.tag.as_str())
            .collect();
        if !leftover.is_empty() {
            return Err(UnserializeError::UnconsumedChildren {
                tag: within.to_string(),
                tags: leftover.join(", "),
            });
        }

        Ok(handle)
    }

    /// Consume every child of any of the given kinds, in document order.
    pub fn children(
        &mut self,
        kinds: &[&str],
        allow_ref: AllowRef,
    ) -> Result<Vec<Handle>, UnserializeError> {
        self.take_children(kinds, allow_ref, None)
    }

    /// Consume children of one declared kind and check the declared
    /// cardinality.
    fn children_checked(
        &mut self,
        kind: &str,
        cardinality: Cardinality,
        allow_ref: AllowRef,
    ) -> Result<Vec<Handle>, UnserializeError> {
        let matches = self.take_children(&[kind], allow_ref, None)?;

        if self.validate && !cardinality.admits(matches.len()) {
            return Err(UnserializeError::Cardinality {
                tag: self.tag.clone(),
                kind: kind.to_string(),
                expected: cardinality.to_string(),
                found: matches.len(),
            });
        }

        Ok(matches)
    }

    /// Scan unconsumed children for the requested kinds, visiting inline
    /// elements and resolving references. A reference is consumed only when
    /// its target matches one of the kinds; a mismatched resolution is
    /// remembered so single-child reads can report the wrong type instead
    /// of a missing child. `limit` caps the number of matches collected;
    /// one extra is taken so callers can detect surplus.
    fn take_children(
        &mut self,
        kinds: &[&str],
        allow_ref: AllowRef,
        limit: Option<usize>,
    ) -> Result<Vec<Handle>, UnserializeError> {
        let version = self.vis.version();
        let mut matches = Vec::new();
        self.ref_mismatch = None;

        for index in 0..self.children.len() {
            if let Some(limit) = limit
                && matches.len() > limit
            {
                break;
            }
            if self.children[index].consumed {
                continue;
            }
            let tag = self.children[index].tag.clone();
            let elem = self.children[index].elem;

            if tag == REFERENCE_TAG {
                if allow_ref == AllowRef::No {
                    continue;
                }
                let handle = self.read_reference(elem)?;
                let found = self
                    .vis
                    .ws()
                    .entity(handle)
                    .map(|e| self.vis.ws().registry().spec(e.kind()).name)
                    .unwrap_or_default();
                if kinds.contains(&found) {
                    self.children[index].consumed = true;
                    matches.push(handle);
                } else {
                    let name = self
                        .vis
                        .ws()
                        .entity(handle)
                        .and_then(|e| e.name.clone())
                        .unwrap_or_default();
                    self.ref_mismatch = Some(UnserializeError::UnexpectedType {
                        name,
                        expected: kinds.join("|"),
                        found: found.to_string(),
                    });
                }
                continue;
            }

            if allow_ref == AllowRef::Only {
                continue;
            }
            let Some(kind) = self.vis.ws().registry().kind_by_tag(&tag, version) else {
                continue;
            };
            if !kinds.contains(&self.vis.ws().registry().spec(kind).name) {
                continue;
            }

            self.children[index].consumed = true;
            matches.push(self.vis.visit(kind, elem)?);
        }

        Ok(matches)
    }

    /// Strictly read one `Reference` element and resolve its target.
    fn read_reference(&mut self, elem: ElemId) -> Result<Handle, UnserializeError> {
        let name =
            self.vis
                .elem_attr(elem, NAME_ATTR)
                .ok_or_else(|| UnserializeError::MissingAttribute {
                    tag: REFERENCE_TAG.to_string(),
                    attr: NAME_ATTR.to_string(),
                })?;
        let url = self.vis.elem_attr(elem, URL_ATTR);

        let extra: Vec<String> = self
            .vis
            .elem_attr_keys(elem)
            .into_iter()
            .filter(|k| k != NAME_ATTR && k != URL_ATTR)
            .collect();
        if !extra.is_empty() {
            return Err(UnserializeError::UnconsumedAttrs {
                tag: REFERENCE_TAG.to_string(),
                attrs: extra.join(", "),
            });
        }
        if !self.vis.elem_children(elem).is_empty() {
            return Err(UnserializeError::UnconsumedChildren {
                tag: REFERENCE_TAG.to_string(),
                tags: "any".to_string(),
            });
        }
        if self.vis.elem_body(elem, false).is_some() {
            return Err(UnserializeError::UnconsumedBody(REFERENCE_TAG.to_string()));
        }

        self.vis.resolve_ref(&name, url.as_deref())
    }
}

/// Schema-driven default construction: identifying name, declared
/// attributes, declared body, then members role by role with cardinality
/// checks.
pub fn construct_via_spec(reader: &mut NodeReader<'_>) -> Result<Entity, UnserializeError> {
    let spec = reader.spec.clone();
    let mut entity = Entity::new(reader.kind());

    if spec.named {
        entity.name = Some(reader.name()?);
    }

    for attr_spec in &spec.attrs {
        let value: Option<Value> = reader.attr_opt_typed(attr_spec.name, attr_spec.ty)?;
        match value {
            Some(value) => entity.set_attr(attr_spec.name, value),
            // Optional attributes stay absent; the default is a read-time
            // fallback for hooks, not materialized state.
            None if attr_spec.default.is_some() => {}
            None => {
                return Err(UnserializeError::MissingAttribute {
                    tag: reader.tag().to_string(),
                    attr: attr_spec.name.to_string(),
                })
            }
        }
    }

    if let Some(body_spec) = spec.body {
        let value = reader.body_opt_typed(body_spec.ty)?;
        match value {
            Some(value) => entity.body = Some(value),
            None if body_spec.allow_empty => {}
            None => return Err(UnserializeError::MissingBody(reader.tag().to_string())),
        }
    }

    for child_spec in &spec.children {
        let allow_ref = if child_spec.allow_ref {
            AllowRef::Yes
        } else {
            AllowRef::No
        };
        let members =
            reader.children_checked(child_spec.kind, child_spec.cardinality, allow_ref)?;

        for member in members {
            let name = reader
                .workspace()
                .entity(member)
                .and_then(|e| e.name.clone())
                .ok_or_else(|| ContainerError::Unnamed {
                    kind: child_spec.kind.to_string(),
                })?;
            entity.add_member(child_spec.role, name, member)?;
        }
    }

    Ok(entity)
}

impl NodeReader<'_> {
    /// Consume an optional attribute as a schema-typed [`Value`].
    fn attr_opt_typed(
        &mut self,
        name: &str,
        ty: ScalarType,
    ) -> Result<Option<Value>, UnserializeError> {
        let Some(text) = self.vis.elem_attr(self.elem, name) else {
            return Ok(None);
        };
        self.unprocessed_attrs.remove(name);

        ty.parse(&text)
            .map(Some)
            .map_err(|source| UnserializeError::Conversion {
                tag: self.tag.clone(),
                item: format!("attribute '{name}'"),
                source,
            })
    }

    /// Consume the body as a schema-typed [`Value`], if present.
    fn body_opt_typed(
        &mut self,
        ty: ScalarType,
    ) -> Result<Option<Value>, UnserializeError> {
        let sole = !self.spec.named && self.spec.attrs.is_empty() && self.spec.children.is_empty();
        let Some(text) = self.vis.elem_body(self.elem, sole) else {
            return Ok(None);
        };
        self.body_consumed = true;

        ty.parse(&text)
            .map(Some)
            .map_err(|source| UnserializeError::Conversion {
                tag: self.tag.clone(),
                item: "body".to_string(),
                source,
            })
    }
}
