//! Arena-backed document tree: node data, attributes, inline styles and
//! the tree surgery primitives (append / insert-before / detach) that
//! content relocation is built on.

mod printing;

use anyhow::Error;
use indextree::{Arena, NodeId};
use smallvec::SmallVec;

/// What a node is: the document root, an element, text, or a comment.
#[derive(Debug, Clone, Default)]
pub enum NodeKind {
    #[default]
    Document,
    Element {
        tag: String,
    },
    Text {
        text: String,
    },
    Comment {
        text: String,
    },
}

/// Data stored for each node in the arena.
#[derive(Debug, Clone, Default)]
pub struct NodeData {
    pub kind: NodeKind,
    pub attrs: SmallVec<(String, String), 4>,
    /// Inline styles, kept separate from attributes so the overlay
    /// machinery can toggle presentation without touching markup.
    pub styles: SmallVec<(String, String), 4>,
}

/// A document tree. Nodes live in an `indextree` arena; detached nodes
/// stay in the arena and can be re-attached anywhere, which is what
/// makes relocation a move rather than a copy.
pub struct Document {
    arena: Arena<NodeData>,
    root: NodeId,
}

impl Document {
    /// Create an empty document with a single root node.
    pub fn new() -> Self {
        let mut arena = Arena::new();
        let root = arena.new_node(NodeData::default());
        Self { arena, root }
    }

    /// Parse a complete HTML string into a fresh document. The parsed
    /// markup lands under a container element appended to the root.
    pub fn from_html(html: &str) -> Result<Self, Error> {
        let mut doc = Self::new();
        let root = doc.root;
        crate::parser::parse_fragment(&mut doc, root, html)?;
        Ok(doc)
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Create a detached element node.
    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.arena.new_node(NodeData {
            kind: NodeKind::Element {
                tag: tag.to_string(),
            },
            ..NodeData::default()
        })
    }

    /// Create a detached text node.
    pub fn create_text(&mut self, text: &str) -> NodeId {
        self.arena.new_node(NodeData {
            kind: NodeKind::Text {
                text: text.to_string(),
            },
            ..NodeData::default()
        })
    }

    /// Create a detached comment node.
    pub fn create_comment(&mut self, text: &str) -> NodeId {
        self.arena.new_node(NodeData {
            kind: NodeKind::Comment {
                text: text.to_string(),
            },
            ..NodeData::default()
        })
    }

    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.arena[id].get().kind
    }

    /// Tag name if the node is an element.
    pub fn tag(&self, id: NodeId) -> Option<&str> {
        match &self.arena[id].get().kind {
            NodeKind::Element { tag } => Some(tag.as_str()),
            _ => None,
        }
    }

    // ---- tree surgery ----

    /// Append `child` as the last child of `parent`. Detaches `child`
    /// from its current position first.
    pub fn append(&mut self, parent: NodeId, child: NodeId) {
        child.detach(&mut self.arena);
        parent.append(child, &mut self.arena);
    }

    /// Insert `node` immediately before `reference` under the same
    /// parent. Detaches `node` from its current position first.
    pub fn insert_before(&mut self, node: NodeId, reference: NodeId) {
        node.detach(&mut self.arena);
        reference.insert_before(node, &mut self.arena);
    }

    /// Detach a node (and its subtree) from its parent. The subtree
    /// stays alive and can be re-attached later.
    pub fn detach(&mut self, id: NodeId) {
        id.detach(&mut self.arena);
    }

    /// Detach a subtree and mark all of its nodes removed.
    pub fn remove_subtree(&mut self, id: NodeId) {
        id.remove_subtree(&mut self.arena);
    }

    // ---- traversal ----

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.arena.get(id).and_then(indextree::Node::parent)
    }

    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        self.arena.get(id).and_then(indextree::Node::next_sibling)
    }

    pub fn first_child(&self, id: NodeId) -> Option<NodeId> {
        self.arena.get(id).and_then(indextree::Node::first_child)
    }

    pub fn children(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        id.children(&self.arena)
    }

    pub fn child_count(&self, id: NodeId) -> usize {
        id.children(&self.arena).count()
    }

    /// Position of a node among its parent's children.
    pub fn child_index(&self, id: NodeId) -> Option<usize> {
        let parent = self.parent(id)?;
        parent.children(&self.arena).position(|c| c == id)
    }

    /// Depth-first traversal of the subtree rooted at `id`, including
    /// `id` itself.
    pub fn descendants(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        id.descendants(&self.arena)
    }

    /// Walk from `id` to the root, including `id` itself.
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        id.ancestors(&self.arena)
    }

    /// First element with the given tag in the subtree rooted at `scope`.
    pub fn find_by_tag(&self, scope: NodeId, tag: &str) -> Option<NodeId> {
        self.descendants(scope)
            .find(|&n| self.tag(n).is_some_and(|t| t.eq_ignore_ascii_case(tag)))
    }

    // ---- attributes ----

    pub fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
        self.arena[id]
            .get()
            .attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn set_attr(&mut self, id: NodeId, name: &str, value: &str) {
        let attrs = &mut self.arena[id].get_mut().attrs;
        if let Some(entry) = attrs.iter_mut().find(|(k, _)| k == name) {
            entry.1 = value.to_string();
        } else {
            attrs.push((name.to_string(), value.to_string()));
        }
    }

    pub fn remove_attr(&mut self, id: NodeId, name: &str) {
        self.arena[id].get_mut().attrs.retain(|(k, _)| k != name);
    }

    // ---- inline styles ----

    pub fn style(&self, id: NodeId, name: &str) -> Option<&str> {
        self.arena[id]
            .get()
            .styles
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn set_style(&mut self, id: NodeId, name: &str, value: &str) {
        let styles = &mut self.arena[id].get_mut().styles;
        if let Some(entry) = styles.iter_mut().find(|(k, _)| k == name) {
            entry.1 = value.to_string();
        } else {
            styles.push((name.to_string(), value.to_string()));
        }
    }

    pub fn remove_style(&mut self, id: NodeId, name: &str) {
        self.arena[id].get_mut().styles.retain(|(k, _)| k != name);
    }

    // ---- class helpers ----

    pub fn has_class(&self, id: NodeId, class: &str) -> bool {
        self.attr(id, "class")
            .is_some_and(|list| list.split_whitespace().any(|c| c == class))
    }

    /// Whether any class on the node starts with the given prefix.
    pub fn has_class_prefix(&self, id: NodeId, prefix: &str) -> bool {
        self.attr(id, "class")
            .is_some_and(|list| list.split_whitespace().any(|c| c.starts_with(prefix)))
    }

    pub fn add_class(&mut self, id: NodeId, class: &str) {
        if self.has_class(id, class) {
            return;
        }
        let joined = match self.attr(id, "class") {
            Some(existing) if !existing.is_empty() => format!("{existing} {class}"),
            _ => class.to_string(),
        };
        self.set_attr(id, "class", &joined);
    }

    pub fn remove_class(&mut self, id: NodeId, class: &str) {
        if let Some(list) = self.attr(id, "class") {
            let kept: Vec<&str> = list.split_whitespace().filter(|c| *c != class).collect();
            let joined = kept.join(" ");
            self.set_attr(id, "class", &joined);
        }
    }

    /// Concatenated text of every text node under `id`.
    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        for n in self.descendants(id) {
            if let NodeKind::Text { text } = &self.arena[n].get().kind {
                out.push_str(text);
            }
        }
        out
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}
