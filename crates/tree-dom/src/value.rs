//! JsonML-style conversion between nodes and `serde_json::Value`.
//!
//! An element is `["TAG", {attrs}, ...children]`, a text node is a plain
//! string. Namespaced attributes encode their key as `"ns name"`.

use serde_json::{json, Map, Value};
use thiserror::Error;

use crate::node::Node;

#[derive(Debug, Error, PartialEq)]
pub enum FromValueError {
    #[error("expected string or array, got {0}")]
    UnexpectedValue(String),
    #[error("element array is missing its tag")]
    MissingTag,
    #[error("element tag must be a string")]
    TagNotAString,
    #[error("attribute map values must be strings")]
    AttrNotAString,
    #[error("second element entry must be an attribute object")]
    AttrsNotAnObject,
}

/// Builds a detached node tree from a JsonML value.
pub fn node_from_value(value: &Value) -> Result<Node, FromValueError> {
    match value {
        Value::String(s) => Ok(Node::text(s)),
        Value::Array(items) => {
            let tag = items.first().ok_or(FromValueError::MissingTag)?;
            let tag = tag.as_str().ok_or(FromValueError::TagNotAString)?;
            let node = Node::element(tag);
            let mut children = &items[1..];
            if let Some(first) = children.first() {
                if first.is_null() {
                    children = &children[1..];
                } else if !first.is_string() && !first.is_array() {
                    let attrs = first
                        .as_object()
                        .ok_or(FromValueError::AttrsNotAnObject)?;
                    for (key, val) in attrs {
                        let val = val.as_str().ok_or(FromValueError::AttrNotAString)?;
                        let (ns, name) = match key.split_once(' ') {
                            Some((ns, name)) => (Some(ns), name),
                            None => (None, key.as_str()),
                        };
                        node.set_attr_ns(name, ns, Some(val));
                    }
                    children = &children[1..];
                }
            }
            for child in children {
                let child = node_from_value(child)?;
                node.append_child(&child);
            }
            Ok(node)
        }
        other => Err(FromValueError::UnexpectedValue(other.to_string())),
    }
}

/// Serializes a node tree to its JsonML value.
pub fn node_to_value(node: &Node) -> Value {
    if let Some(text) = node.text_value() {
        return Value::String(text);
    }
    let mut attrs = Map::new();
    for attr in node.attrs() {
        let key = match &attr.ns {
            Some(ns) => format!("{} {}", ns, attr.name),
            None => attr.name.clone(),
        };
        attrs.insert(key, Value::String(attr.value));
    }
    let mut out = vec![json!(node.node_name()), Value::Object(attrs)];
    for child in node.children() {
        out.push(node_to_value(&child));
    }
    Value::Array(out)
}
