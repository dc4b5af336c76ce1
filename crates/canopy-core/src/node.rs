use serde::{Deserialize, Serialize};

///
/// Node
///
/// Format-agnostic intermediate tree: a tagged element with a string
/// attribute mapping, an optional body scalar, and ordered, tagged children.
/// Attribute values travel as canonical text; typed conversion happens in
/// the engines. Nodes are never persisted directly; each backend maps them
/// onto its own physical syntax.
///

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct Node {
    pub tag: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attrs: Vec<(String, String)>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Node>,
}

impl Node {
    /// Create an empty element with the given tag.
    #[must_use]
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..Self::default()
        }
    }

    /// Return the attribute value for `name` if present.
    #[must_use]
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Set or replace an attribute value.
    pub fn set_attr(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();

        match self.attrs.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = value,
            None => self.attrs.push((name, value)),
        }
    }

    /// Remove an attribute, returning its value if present.
    pub fn remove_attr(&mut self, name: &str) -> Option<String> {
        let index = self.attrs.iter().position(|(n, _)| n == name)?;

        Some(self.attrs.remove(index).1)
    }

    /// Iterate over attribute names.
    pub fn attr_keys(&self) -> impl Iterator<Item = &str> {
        self.attrs.iter().map(|(n, _)| n.as_str())
    }

    /// Append a child element and return a mutable reference to it.
    pub fn push_child(&mut self, child: Node) -> &mut Node {
        self.children.push(child);

        self.children.last_mut().expect("child just pushed")
    }

    /// Iterate over children with the given tag.
    pub fn children_tagged<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = &'a Node> {
        self.children.iter().filter(move |c| c.tag == tag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attrs_replace_in_place() {
        let mut node = Node::new("Parameter");
        node.set_attr("name", "rate");
        node.set_attr("name", "scale");

        assert_eq!(node.attr("name"), Some("scale"));
        assert_eq!(node.attrs.len(), 1);
    }

    #[test]
    fn serde_skips_empty_fields() {
        let node = Node::new("Alias");
        let json = serde_json::to_string(&node).expect("serializable");
        assert_eq!(json, r#"{"tag":"Alias"}"#);

        let back: Node = serde_json::from_str(&json).expect("deserializable");
        assert_eq!(back, node);
    }
}
