use crate::{backend::BackendError, node::Node};
use serde_json::{Map, Value as Json};

//
// Lossless JSON codec for document trees. An element becomes an object with
// its tag under "@tag", attributes as plain string members, the body under
// "@body", and ordered children under "@children". The reserved members
// cannot collide with attributes because attribute names never start
// with '@'.
//

const TAG_KEY: &str = "@tag";
const BODY_KEY: &str = "@body";
const CHILDREN_KEY: &str = "@children";

/// Encode a document tree as a JSON value.
#[must_use]
pub fn encode(node: &Node) -> Json {
    let mut map = Map::new();
    map.insert(TAG_KEY.to_string(), Json::String(node.tag.clone()));

    for (name, value) in &node.attrs {
        map.insert(name.clone(), Json::String(value.clone()));
    }
    if let Some(body) = &node.body {
        map.insert(BODY_KEY.to_string(), Json::String(body.clone()));
    }
    if !node.children.is_empty() {
        let children = node.children.iter().map(encode).collect();
        map.insert(CHILDREN_KEY.to_string(), Json::Array(children));
    }

    Json::Object(map)
}

/// Decode a JSON value back into a document tree.
pub fn decode(json: &Json) -> Result<Node, BackendError> {
    let Json::Object(map) = json else {
        return Err(malformed("element is not an object"));
    };

    let tag = match map.get(TAG_KEY) {
        Some(Json::String(tag)) => tag.clone(),
        Some(_) => return Err(malformed("'@tag' is not a string")),
        None => return Err(malformed("element has no '@tag'")),
    };
    let mut node = Node::new(tag);

    for (key, value) in map {
        match key.as_str() {
            TAG_KEY => {}
            BODY_KEY => match value {
                Json::String(body) => node.body = Some(body.clone()),
                _ => return Err(malformed("'@body' is not a string")),
            },
            CHILDREN_KEY => match value {
                Json::Array(children) => {
                    for child in children {
                        node.push_child(decode(child)?);
                    }
                }
                _ => return Err(malformed("'@children' is not an array")),
            },
            attr => match value {
                Json::String(text) => node.set_attr(attr, text.clone()),
                _ => return Err(malformed(format!("attribute '{attr}' is not a string"))),
            },
        }
    }

    Ok(node)
}

/// Render a document tree as pretty-printed JSON text.
pub fn to_string(node: &Node) -> Result<String, BackendError> {
    serde_json::to_string_pretty(&encode(node)).map_err(|err| malformed(err.to_string()))
}

/// Parse JSON text into a document tree.
pub fn from_str(text: &str) -> Result<Node, BackendError> {
    let json: Json = serde_json::from_str(text).map_err(|err| malformed(err.to_string()))?;

    decode(&json)
}

fn malformed(message: impl Into<String>) -> BackendError {
    BackendError::Malformed(message.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::DOCUMENT_TAG;
    use serde_json::json;

    fn sample() -> Node {
        let mut tree = Node::new(DOCUMENT_TAG);
        tree.set_attr("version", "2.0");
        let comp = tree.push_child(Node::new("Component"));
        comp.set_attr("name", "cell");
        let param = comp.push_child(Node::new("Parameter"));
        param.set_attr("name", "rate");
        param.body = Some("1.5".to_string());

        tree
    }

    #[test]
    fn text_round_trip_is_lossless() {
        let tree = sample();
        let text = to_string(&tree).expect("encodable");

        assert_eq!(from_str(&text).expect("decodable"), tree);
    }

    #[test]
    fn repeated_tags_survive_the_children_array() {
        let mut tree = Node::new(DOCUMENT_TAG);
        for name in ["a", "b"] {
            tree.push_child(Node::new("Alias")).set_attr("name", name);
        }

        let back = decode(&encode(&tree)).expect("decodable");
        assert_eq!(back.children_tagged("Alias").count(), 2);
    }

    #[test]
    fn missing_tag_is_rejected() {
        let err = decode(&json!({ "name": "cell" })).expect_err("malformed");
        assert!(matches!(err, BackendError::Malformed(_)));
    }
}
