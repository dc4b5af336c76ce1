pub mod json;
pub mod memory;

pub use memory::MemoryBackend;

use crate::node::Node;
use thiserror::Error as ThisError;

///
/// BackendError
///

#[derive(Debug, ThisError)]
pub enum BackendError {
    #[error("malformed document: {0}")]
    Malformed(String),

    #[error("unknown element id")]
    UnknownElem,
}

///
/// ElemId
///
/// Opaque handle to one element inside a backend. Ids are minted by a
/// backend and are meaningless to any other backend instance.
///

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct ElemId(pub u32);

///
/// WriteBackend
///
/// Element-building surface a format exposes to the serialization engine.
/// The engine drives these calls in document order; `multiple` and `sole`
/// tell formats that cannot repeat keys (or that inline a sole body) how the
/// element will be used.
///

pub trait WriteBackend {
    /// The document root element.
    fn root_elem(&mut self) -> ElemId;

    /// Create a child element under `parent`. `multiple` is `true` when
    /// siblings with the same tag may follow.
    fn create_elem(&mut self, tag: &str, parent: ElemId, multiple: bool)
        -> Result<ElemId, BackendError>;

    fn set_attr(&mut self, elem: ElemId, name: &str, value: &str) -> Result<(), BackendError>;

    /// Set the element's body text. `sole` is `true` when the body is the
    /// element's only content.
    fn set_body(&mut self, elem: ElemId, value: &str, sole: bool) -> Result<(), BackendError>;
}

///
/// ReadBackend
///
/// Element-inspection surface a format exposes to the unserialization
/// engine. Readers only ever receive ids previously handed out by the same
/// backend.
///

pub trait ReadBackend {
    fn root_elem(&self) -> ElemId;

    /// Tagged children of `elem` in document order.
    fn children(&self, elem: ElemId) -> Vec<(String, ElemId)>;

    fn attr(&self, elem: ElemId, name: &str) -> Option<String>;

    fn attr_keys(&self, elem: ElemId) -> Vec<String>;

    fn body(&self, elem: ElemId, sole: bool) -> Option<String>;
}

/// Write a detached [`Node`] subtree beneath `parent`. Used for annotation
/// blocks, which bypass the schema entirely.
pub fn write_tree<B>(backend: &mut B, parent: ElemId, node: &Node) -> Result<(), BackendError>
where
    B: WriteBackend + ?Sized,
{
    let elem = backend.create_elem(&node.tag, parent, true)?;

    for (name, value) in &node.attrs {
        backend.set_attr(elem, name, value)?;
    }
    if let Some(body) = &node.body {
        backend.set_body(elem, body, false)?;
    }
    for child in &node.children {
        write_tree(backend, elem, child)?;
    }

    Ok(())
}

/// Read the subtree rooted at `elem` back into a detached [`Node`].
pub fn read_tree<B>(backend: &B, elem: ElemId, tag: &str) -> Node
where
    B: ReadBackend + ?Sized,
{
    let mut node = Node::new(tag);

    for name in backend.attr_keys(elem) {
        if let Some(value) = backend.attr(elem, &name) {
            node.set_attr(name, value);
        }
    }
    node.body = backend.body(elem, false);
    for (child_tag, child) in backend.children(elem) {
        node.push_child(read_tree(backend, child, &child_tag));
    }

    node
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tree_helpers_round_trip_detached_subtrees() {
        let mut node = Node::new("Index");
        node.set_attr("role", "parameter");
        node.body = Some("7".to_string());
        node.push_child(Node::new("Hint")).set_attr("kind", "dense");

        let mut backend = MemoryBackend::new();
        let root = WriteBackend::root_elem(&mut backend);
        write_tree(&mut backend, root, &node).expect("writable");

        let children = ReadBackend::children(&backend, ReadBackend::root_elem(&backend));
        assert_eq!(children.len(), 1);
        let (tag, elem) = &children[0];
        assert_eq!(read_tree(&backend, *elem, tag), node);
    }
}
