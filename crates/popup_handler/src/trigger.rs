//! Link intent parsing: recognizes popup-trigger hrefs and splits them
//! into a remote URL plus an optional content locator.

/// The two equivalent trigger prefixes a popup link may use.
pub const TRIGGER_PREFIXES: [&str; 2] = ["#wm-popup=", "#wmpopup="];

/// Marker introducing a structural-class locator.
const FLOATING_ELEMENT_MARKER: &str = ".fe-";
/// Marker introducing a section-identifier attribute locator.
const SECTION_ID_MARKER: &str = "[data-section-id=";

/// What a trigger href points at: a remote document and, optionally,
/// one sub-element within it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetSpec {
    pub url: String,
    pub locator: Option<String>,
}

/// Parse a trigger href into a target specification.
///
/// Returns `None` when the href does not carry a recognized trigger
/// prefix; such clicks are not intercepted and default navigation
/// proceeds. Locator forms, in priority order: a `#` fragment (id
/// selector), a floating-element class marker (taken verbatim), a
/// section-identifier attribute marker (taken verbatim), or nothing.
pub fn parse_trigger(href: &str) -> Option<TargetSpec> {
    let path = TRIGGER_PREFIXES
        .iter()
        .find_map(|prefix| href.strip_prefix(prefix))?;

    if let Some((url, fragment)) = path.split_once('#') {
        return Some(TargetSpec {
            url: url.to_string(),
            locator: Some(format!("#{fragment}")),
        });
    }
    if let Some(index) = path.find(FLOATING_ELEMENT_MARKER) {
        return Some(TargetSpec {
            url: path[..index].to_string(),
            locator: Some(path[index..].to_string()),
        });
    }
    if let Some(index) = path.find(SECTION_ID_MARKER) {
        return Some(TargetSpec {
            url: path[..index].to_string(),
            locator: Some(path[index..].to_string()),
        });
    }
    Some(TargetSpec {
        url: path.to_string(),
        locator: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_fragment_locator() {
        assert_eq!(
            parse_trigger("#wm-popup=/page-a#block-1"),
            Some(TargetSpec {
                url: String::from("/page-a"),
                locator: Some(String::from("#block-1")),
            })
        );
    }

    #[test]
    fn no_locator() {
        assert_eq!(
            parse_trigger("#wmpopup=/page-b"),
            Some(TargetSpec {
                url: String::from("/page-b"),
                locator: None,
            })
        );
    }

    #[test]
    fn floating_element_locator() {
        assert_eq!(
            parse_trigger("#wm-popup=/page-c.fe-block-123"),
            Some(TargetSpec {
                url: String::from("/page-c"),
                locator: Some(String::from(".fe-block-123")),
            })
        );
    }

    #[test]
    fn section_id_locator() {
        assert_eq!(
            parse_trigger(r#"#wmpopup=/page-d[data-section-id="abc"]"#),
            Some(TargetSpec {
                url: String::from("/page-d"),
                locator: Some(String::from(r#"[data-section-id="abc"]"#)),
            })
        );
    }

    #[test]
    fn fragment_takes_priority_over_markers() {
        assert_eq!(
            parse_trigger("#wm-popup=/page.fe-x#block"),
            Some(TargetSpec {
                url: String::from("/page.fe-x"),
                locator: Some(String::from("#block")),
            })
        );
    }

    #[test]
    fn unrecognized_href_is_not_intercepted() {
        assert_eq!(parse_trigger("#anchor"), None);
        assert_eq!(parse_trigger("/plain/link"), None);
        assert_eq!(parse_trigger("#wm-popup/missing-equals"), None);
    }
}
