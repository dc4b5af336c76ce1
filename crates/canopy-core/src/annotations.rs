use crate::node::Node;
use derive_more::Deref;
use serde::{Deserialize, Serialize};

/// Namespace reserved for the engine's own annotation vocabulary.
pub const CORE_NS: &str = "urn:canopy:core";

/// Reserved attribute carrying an annotation entry's namespace.
pub const NS_ATTR: &str = "@namespace";

/// Annotation tag for one persisted index side-table entry.
pub const INDEX_TAG: &str = "Index";

/// `Index` entry attribute: member role within the container.
pub const INDEX_ROLE_ATTR: &str = "role";

/// `Index` entry attribute: member name within the role.
pub const INDEX_MEMBER_ATTR: &str = "member";

/// `Index` entry attribute: assigned integer.
pub const INDEX_VALUE_ATTR: &str = "value";

/// Annotation tag toggling schema-level validation for a subtree.
pub const VALIDATION_TAG: &str = "Validation";

/// `Validation` attribute: `"false"` disables validation.
pub const VALIDATION_ENABLED_ATTR: &str = "enabled";

///
/// Annotations
///
/// Namespaced side-channel of detached [`Node`] subtrees attached to an
/// entity, independent of its declared schema. Entry identity is
/// `(namespace, tag)`; the namespace rides in a reserved `@namespace`
/// attribute on each entry. Annotations never participate in structural
/// equality.
///

#[derive(Clone, Debug, Default, Deref, Deserialize, Eq, PartialEq, Serialize)]
#[repr(transparent)]
#[serde(transparent)]
pub struct Annotations(Vec<Node>);

impl Annotations {
    /// Create an empty annotation set.
    #[must_use]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    /// Append a fresh entry under `(namespace, tag)` and return it for
    /// attribute population.
    pub fn add(&mut self, namespace: &str, tag: &str) -> &mut Node {
        let mut node = Node::new(tag);
        node.set_attr(NS_ATTR, namespace);
        self.0.push(node);

        self.0.last_mut().expect("entry just pushed")
    }

    /// Append an already-built entry subtree.
    pub fn push_entry(&mut self, node: Node) {
        self.0.push(node);
    }

    /// Iterate over entries under `(namespace, tag)`.
    pub fn entries<'a>(
        &'a self,
        namespace: &'a str,
        tag: &'a str,
    ) -> impl Iterator<Item = &'a Node> {
        self.0.iter().filter(move |n| matches(n, namespace, tag))
    }

    /// Remove and return every entry under `(namespace, tag)`.
    pub fn pop(&mut self, namespace: &str, tag: &str) -> Vec<Node> {
        let mut taken = Vec::new();
        let mut index = 0;

        while index < self.0.len() {
            if matches(&self.0[index], namespace, tag) {
                taken.push(self.0.remove(index));
            } else {
                index += 1;
            }
        }

        taken
    }
}

fn matches(node: &Node, namespace: &str, tag: &str) -> bool {
    node.tag == tag && node.attr(NS_ATTR) == Some(namespace)
}
