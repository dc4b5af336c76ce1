use crate::{
    backend::{BackendError, ElemId, ReadBackend, WriteBackend},
    document::DOCUMENT_TAG,
    node::Node,
};

///
/// MemoryBackend
///
/// In-memory element store implementing both backend surfaces. Doubles as
/// the reference backend for tests and as the pivot for text codecs, which
/// convert between a serialized byte form and its [`Node`] tree.
///

#[derive(Debug)]
pub struct MemoryBackend {
    recs: Vec<Rec>,
}

#[derive(Debug)]
struct Rec {
    tag: String,
    attrs: Vec<(String, String)>,
    body: Option<String>,
    children: Vec<ElemId>,
}

impl Rec {
    fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            attrs: Vec::new(),
            body: None,
            children: Vec::new(),
        }
    }
}

impl MemoryBackend {
    /// Create a backend holding an empty document root.
    #[must_use]
    pub fn new() -> Self {
        Self {
            recs: vec![Rec::new(DOCUMENT_TAG)],
        }
    }

    /// Build a backend from a complete document tree. The node's own tag
    /// becomes the root tag.
    #[must_use]
    pub fn from_tree(node: &Node) -> Self {
        let mut backend = Self {
            recs: vec![Rec::new(&node.tag)],
        };
        backend.fill(ElemId(0), node);

        backend
    }

    /// Extract the complete document tree.
    #[must_use]
    pub fn into_tree(self) -> Node {
        self.subtree(ElemId(0))
    }

    fn fill(&mut self, elem: ElemId, node: &Node) {
        self.rec_mut(elem).attrs.clone_from(&node.attrs);
        self.rec_mut(elem).body.clone_from(&node.body);

        for child in &node.children {
            let id = self.push(Rec::new(&child.tag));
            self.rec_mut(elem).children.push(id);
            self.fill(id, child);
        }
    }

    fn subtree(&self, elem: ElemId) -> Node {
        let rec = self.rec(elem);
        let mut node = Node::new(&rec.tag);
        node.attrs.clone_from(&rec.attrs);
        node.body.clone_from(&rec.body);
        for child in &rec.children {
            node.push_child(self.subtree(*child));
        }

        node
    }

    fn push(&mut self, rec: Rec) -> ElemId {
        let id = ElemId(u32::try_from(self.recs.len()).expect("element count exceeds u32"));
        self.recs.push(rec);

        id
    }

    fn rec(&self, elem: ElemId) -> &Rec {
        &self.recs[elem.0 as usize]
    }

    fn rec_mut(&mut self, elem: ElemId) -> &mut Rec {
        &mut self.recs[elem.0 as usize]
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl WriteBackend for MemoryBackend {
    fn root_elem(&mut self) -> ElemId {
        ElemId(0)
    }

    fn create_elem(
        &mut self,
        tag: &str,
        parent: ElemId,
        _multiple: bool,
    ) -> Result<ElemId, BackendError> {
        if parent.0 as usize >= self.recs.len() {
            return Err(BackendError::UnknownElem);
        }

        let id = self.push(Rec::new(tag));
        self.rec_mut(parent).children.push(id);

        Ok(id)
    }

    fn set_attr(&mut self, elem: ElemId, name: &str, value: &str) -> Result<(), BackendError> {
        if elem.0 as usize >= self.recs.len() {
            return Err(BackendError::UnknownElem);
        }
        self.rec_mut(elem)
            .attrs
            .push((name.to_string(), value.to_string()));

        Ok(())
    }

    fn set_body(&mut self, elem: ElemId, value: &str, _sole: bool) -> Result<(), BackendError> {
        if elem.0 as usize >= self.recs.len() {
            return Err(BackendError::UnknownElem);
        }
        self.rec_mut(elem).body = Some(value.to_string());

        Ok(())
    }
}

impl ReadBackend for MemoryBackend {
    fn root_elem(&self) -> ElemId {
        ElemId(0)
    }

    fn children(&self, elem: ElemId) -> Vec<(String, ElemId)> {
        self.rec(elem)
            .children
            .iter()
            .map(|id| (self.rec(*id).tag.clone(), *id))
            .collect()
    }

    fn attr(&self, elem: ElemId, name: &str) -> Option<String> {
        self.rec(elem)
            .attrs
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.clone())
    }

    fn attr_keys(&self, elem: ElemId) -> Vec<String> {
        self.rec(elem).attrs.iter().map(|(n, _)| n.clone()).collect()
    }

    fn body(&self, elem: ElemId, _sole: bool) -> Option<String> {
        self.rec(elem).body.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tree_conversion_round_trips() {
        let mut tree = Node::new(DOCUMENT_TAG);
        tree.set_attr("version", "2.0");
        let comp = tree.push_child(Node::new("Component"));
        comp.set_attr("name", "cell");
        comp.push_child(Node::new("Parameter")).set_attr("name", "rate");

        let backend = MemoryBackend::from_tree(&tree);
        assert_eq!(backend.into_tree(), tree);
    }

    #[test]
    fn write_surface_builds_document_order() {
        let mut backend = MemoryBackend::new();
        let root = WriteBackend::root_elem(&mut backend);
        let a = backend.create_elem("Alias", root, true).expect("writable");
        backend.set_attr(a, "name", "gain").expect("writable");
        backend.set_body(a, "2.0", true).expect("writable");
        backend.create_elem("Alias", root, true).expect("writable");

        let children = ReadBackend::children(&backend, ReadBackend::root_elem(&backend));
        assert_eq!(children.len(), 2);
        assert_eq!(backend.attr(children[0].1, "name").as_deref(), Some("gain"));
        assert_eq!(backend.body(children[0].1, true).as_deref(), Some("2.0"));
    }
}
