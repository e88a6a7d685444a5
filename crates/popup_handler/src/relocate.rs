//! Content relocation: moves a node subtree from its original location
//! into the overlay and reverses the move on close. Relocation is a
//! move, never a copy; the record captures exactly where the content
//! came from so restoration reproduces the original position.

use dom::{Document, NodeId, Selector};
use log::trace;

use crate::error::LoadError;

/// Restoration token: where extracted content lived before it was
/// moved into the overlay. Exists only while content is displayed.
#[derive(Debug, Clone, Copy)]
pub struct RelocationRecord {
    pub source_parent: NodeId,
    pub next_sibling: Option<NodeId>,
}

/// Move popup content out of an activated fragment into the overlay's
/// content region.
///
/// With no locator, every child of `root` is adopted in order. With a
/// locator, the first matching descendant is moved; before detaching,
/// the presentation theme of its nearest enclosing `section` ancestor
/// is stamped onto the element so the theme context survives the move.
pub fn extract(
    doc: &mut Document,
    root: NodeId,
    locator: Option<&str>,
    content_region: NodeId,
) -> Result<RelocationRecord, LoadError> {
    match locator {
        None => {
            while let Some(child) = doc.first_child(root) {
                doc.append(content_region, child);
            }
            Ok(RelocationRecord {
                source_parent: root,
                next_sibling: None,
            })
        }
        Some(raw) => {
            let not_found = || LoadError::LocatorNotFound {
                locator: raw.to_string(),
            };
            let selector = Selector::parse(raw).ok_or_else(not_found)?;
            let block = selector.find_first(doc, root).ok_or_else(not_found)?;
            propagate_section_theme(doc, block);

            let record = RelocationRecord {
                source_parent: doc.parent(block).unwrap_or(root),
                next_sibling: doc.next_sibling(block),
            };
            doc.append(content_region, block);
            trace!("extracted {raw} into overlay");
            Ok(record)
        }
    }
}

/// Move every remaining child of the content region back to where the
/// extracted content came from, preserving the original order and
/// position exactly.
pub fn restore(doc: &mut Document, record: RelocationRecord, content_region: NodeId) {
    while let Some(child) = doc.first_child(content_region) {
        match record.next_sibling {
            Some(sibling) => doc.insert_before(child, sibling),
            None => doc.append(record.source_parent, child),
        }
    }
}

/// Copy the inherited `data-section-theme` attribute from the nearest
/// enclosing `section` ancestor onto the element itself.
fn propagate_section_theme(doc: &mut Document, block: NodeId) {
    let theme = doc
        .ancestors(block)
        .skip(1)
        .find(|&a| doc.tag(a).is_some_and(|t| t.eq_ignore_ascii_case("section")))
        .and_then(|section| doc.attr(section, "data-section-theme"))
        .map(str::to_string);
    if let Some(theme) = theme {
        doc.set_attr(block, "data-section-theme", &theme);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fragment() -> (Document, NodeId) {
        let doc = Document::from_html(
            r#"
            <html><body><div id="sections">
              <section data-section-theme="dark">
                <div id="first">1</div>
                <div id="second">2</div>
                <div id="third">3</div>
              </section>
            </div></body></html>
            "#,
        )
        .expect("parse");
        let root = Selector::Id(String::from("sections"))
            .find_first(&doc, doc.root())
            .expect("sections");
        (doc, root)
    }

    fn content_region(doc: &mut Document) -> NodeId {
        let region = doc.create_element("div");
        let root = doc.root();
        doc.append(root, region);
        region
    }

    #[test]
    fn extract_with_locator_round_trips_position() {
        let (mut doc, root) = fragment();
        let region = content_region(&mut doc);
        let second = Selector::parse("#second")
            .expect("selector")
            .find_first(&doc, root)
            .expect("second");
        let original_parent = doc.parent(second).expect("parent");
        assert_eq!(doc.child_index(second), Some(1));

        let record = extract(&mut doc, root, Some("#second"), region).expect("extract");
        assert_eq!(doc.parent(second), Some(region));
        assert_eq!(doc.child_count(original_parent), 2);

        restore(&mut doc, record, region);
        assert_eq!(doc.parent(second), Some(original_parent));
        assert_eq!(doc.child_index(second), Some(1));
        assert_eq!(doc.child_count(region), 0);
    }

    #[test]
    fn extract_without_locator_adopts_all_children_in_order() {
        let (mut doc, root) = fragment();
        let region = content_region(&mut doc);

        let record = extract(&mut doc, root, None, region).expect("extract");
        assert_eq!(doc.child_count(root), 0);
        assert_eq!(doc.child_count(region), 1);

        restore(&mut doc, record, region);
        assert_eq!(doc.child_count(root), 1);
        let section = doc.first_child(root).expect("section");
        let ids: Vec<String> = doc
            .children(section)
            .filter_map(|c| doc.attr(c, "id").map(str::to_string))
            .collect();
        assert_eq!(ids, vec!["first", "second", "third"]);
    }

    #[test]
    fn restore_keeps_order_for_multiple_nodes() {
        let (mut doc, root) = fragment();
        let region = content_region(&mut doc);
        let record = extract(&mut doc, root, None, region).expect("extract");

        // restoring several nodes must not reverse them
        restore(&mut doc, record, region);
        let section = doc.first_child(root).expect("section");
        assert_eq!(doc.child_count(section), 3);
    }

    #[test]
    fn section_theme_is_propagated() {
        let (mut doc, root) = fragment();
        let region = content_region(&mut doc);
        extract(&mut doc, root, Some("#second"), region).expect("extract");
        let second = doc.first_child(region).expect("moved node");
        assert_eq!(doc.attr(second, "data-section-theme"), Some("dark"));
    }

    #[test]
    fn missing_locator_is_not_found() {
        let (mut doc, root) = fragment();
        let region = content_region(&mut doc);
        let err = extract(&mut doc, root, Some("#absent"), region).unwrap_err();
        assert!(matches!(err, LoadError::LocatorNotFound { .. }));
    }
}
