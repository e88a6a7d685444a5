//! Scroll lock: freezes the background page while a popup is open and
//! restores the exact scroll offset on close.

use core::time::Duration;
use dom::{Document, NodeId};
use log::trace;
use tokio::time::sleep;

/// Class toggled on the body while a popup is open.
pub const SCROLL_LOCK_CLASS: &str = "wm-popup-open";

/// Delay before restoring the original scroll behavior, so the
/// restored offset does not animate during the close.
pub const BEHAVIOR_RESTORE_DELAY: Duration = Duration::from_millis(50);

/// Host viewport state the lock manipulates.
#[derive(Debug, Clone)]
pub struct Viewport {
    /// Current vertical scroll offset in pixels.
    pub scroll_y: f64,
    /// Document-level scroll behavior (`auto` or `smooth`).
    pub scroll_behavior: String,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            scroll_y: 0.0,
            scroll_behavior: String::from("auto"),
        }
    }
}

#[derive(Debug)]
struct SavedScroll {
    offset: f64,
    behavior: String,
}

/// Locks background scroll while a popup is open.
#[derive(Debug, Default)]
pub struct ScrollLock {
    saved: Option<SavedScroll>,
}

impl ScrollLock {
    pub fn engaged(&self) -> bool {
        self.saved.is_some()
    }

    /// Record the current offset and fix the background in place,
    /// offset upward so the visual position does not jump.
    pub fn engage(&mut self, doc: &mut Document, body: NodeId, viewport: &mut Viewport) {
        if self.saved.is_some() {
            return;
        }
        let offset = viewport.scroll_y;
        self.saved = Some(SavedScroll {
            offset,
            behavior: viewport.scroll_behavior.clone(),
        });
        viewport.scroll_behavior = String::from("auto");

        doc.add_class(body, SCROLL_LOCK_CLASS);
        doc.set_style(body, "top", &format!("-{offset}px"));
        doc.set_style(body, "position", "fixed");
        doc.set_style(body, "width", "100%");
        trace!("scroll locked at {offset}px");
    }

    /// Undo the lock, restore the recorded offset to the pixel, and
    /// after a short delay restore the original scroll behavior.
    pub async fn disengage(&mut self, doc: &mut Document, body: NodeId, viewport: &mut Viewport) {
        let Some(saved) = self.saved.take() else {
            return;
        };

        doc.remove_class(body, SCROLL_LOCK_CLASS);
        doc.remove_style(body, "top");
        doc.remove_style(body, "position");
        doc.remove_style(body, "width");

        viewport.scroll_y = saved.offset;
        sleep(BEHAVIOR_RESTORE_DELAY).await;
        viewport.scroll_behavior = saved.behavior;
        trace!("scroll unlocked, restored to {}px", saved.offset);
    }
}
