//! Minimal selector matching over the document tree: id, class and
//! attribute selectors, which is exactly the locator vocabulary the
//! popup engine needs.

use crate::tree::Document;
use indextree::NodeId;

/// A parsed locator selector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    /// `#some-id`
    Id(String),
    /// `.some-class`
    Class(String),
    /// `[name="value"]` or `[name=value]`; a bare `[name]` matches any value.
    Attr { name: String, value: Option<String> },
}

impl Selector {
    /// Parse a selector string. Returns `None` for anything outside the
    /// id / class / attribute vocabulary.
    pub fn parse(input: &str) -> Option<Self> {
        let input = input.trim();
        if let Some(id) = input.strip_prefix('#') {
            if id.is_empty() {
                return None;
            }
            return Some(Self::Id(id.to_string()));
        }
        if let Some(class) = input.strip_prefix('.') {
            if class.is_empty() {
                return None;
            }
            return Some(Self::Class(class.to_string()));
        }
        if let Some(body) = input.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
            if let Some((name, value)) = body.split_once('=') {
                let value = value.trim_matches('"').trim_matches('\'');
                return Some(Self::Attr {
                    name: name.to_string(),
                    value: Some(value.to_string()),
                });
            }
            if body.is_empty() {
                return None;
            }
            return Some(Self::Attr {
                name: body.to_string(),
                value: None,
            });
        }
        None
    }

    /// Whether the given element matches this selector.
    pub fn matches(&self, doc: &Document, node: NodeId) -> bool {
        if doc.tag(node).is_none() {
            return false;
        }
        match self {
            Self::Id(id) => doc.attr(node, "id") == Some(id.as_str()),
            Self::Class(class) => doc.has_class(node, class),
            Self::Attr { name, value } => match value {
                Some(value) => doc.attr(node, name) == Some(value.as_str()),
                None => doc.attr(node, name).is_some(),
            },
        }
    }

    /// First matching element in document order within the subtree
    /// rooted at `scope`, excluding `scope` itself.
    pub fn find_first(&self, doc: &Document, scope: NodeId) -> Option<NodeId> {
        doc.descendants(scope)
            .filter(|&n| n != scope)
            .find(|&n| self.matches(doc, n))
    }
}
