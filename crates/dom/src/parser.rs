//! HTML5 parsing using html5ever.
//!
//! Fetched popup documents arrive as raw HTML text; this module parses
//! them with html5ever and converts the result into the arena tree,
//! attached under a caller-supplied parent so embedded content sees a
//! real document from the moment it exists.

use crate::tree::Document;
use anyhow::{Error, anyhow};
use html5ever::tendril::TendrilSink;
use html5ever::{ParseOpts, parse_document};
use indextree::NodeId;
use log::trace;
use markup5ever_rcdom::{Handle, NodeData as RcNodeData, RcDom};

/// Parse a complete HTML string and graft it into `doc` under a fresh
/// container element appended to `parent`. Returns the container.
pub fn parse_fragment(doc: &mut Document, parent: NodeId, html: &str) -> Result<NodeId, Error> {
    let opts = ParseOpts::default();
    let rc_dom: RcDom = parse_document(RcDom::default(), opts)
        .from_utf8()
        .read_from(&mut html.as_bytes())
        .map_err(|err| anyhow!("failed to read HTML input: {err}"))?;

    let container = doc.create_element("div");
    doc.append(parent, container);
    convert_node(doc, &rc_dom.document, container);
    trace!("parsed fragment of {} bytes", html.len());
    Ok(container)
}

/// Convert an html5ever node into the arena representation.
fn convert_node(doc: &mut Document, rc_node: &Handle, parent: NodeId) {
    match &rc_node.data {
        RcNodeData::Document => {
            for child in rc_node.children.borrow().iter() {
                convert_node(doc, child, parent);
            }
        }

        RcNodeData::Doctype { .. } | RcNodeData::ProcessingInstruction { .. } => {}

        RcNodeData::Text { contents } => {
            let text = contents.borrow().to_string();
            // Skip whitespace-only text nodes
            if text.trim().is_empty() {
                return;
            }
            let node = doc.create_text(&text);
            doc.append(parent, node);
        }

        RcNodeData::Comment { contents } => {
            let node = doc.create_comment(&contents.to_string());
            doc.append(parent, node);
        }

        RcNodeData::Element { name, attrs, .. } => {
            let node = doc.create_element(&name.local.to_string());
            for attr in attrs.borrow().iter() {
                doc.set_attr(node, &attr.name.local.to_string(), &attr.value.to_string());
            }
            doc.append(parent, node);
            for child in rc_node.children.borrow().iter() {
                convert_node(doc, child, node);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_elements_text_and_attrs() {
        let mut doc = Document::new();
        let root = doc.root();
        let container =
            parse_fragment(&mut doc, root, r#"<html><body><p id="x">hi</p></body></html>"#)
                .expect("parse");
        assert_eq!(doc.parent(container), Some(root));
        let p = doc.find_by_tag(container, "p").expect("p element");
        assert_eq!(doc.attr(p, "id"), Some("x"));
        assert_eq!(doc.text_content(p), "hi");
    }

    #[test]
    fn skips_whitespace_only_text() {
        let mut doc = Document::new();
        let root = doc.root();
        let container =
            parse_fragment(&mut doc, root, "<html><body>  \n  <div></div></body></html>")
                .expect("parse");
        let body = doc.find_by_tag(container, "body").expect("body");
        assert_eq!(doc.child_count(body), 1);
    }

    #[test]
    fn from_html_finds_body() {
        let doc = Document::from_html("<html><body><main>content</main></body></html>")
            .expect("parse");
        let body = doc.find_by_tag(doc.root(), "body").expect("body");
        assert_eq!(doc.text_content(body), "content");
    }
}
