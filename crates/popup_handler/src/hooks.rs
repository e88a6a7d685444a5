//! Lifecycle hook/event bus.
//!
//! Six lifecycle points, one ordered listener list per point. Two
//! listener kinds share the list: plain hook callbacks and structured
//! notification listeners. At every transition all hooks fire first,
//! in registration order, then all notifiers; a failing hook is logged
//! and never prevents later listeners or the transition itself.

use anyhow::Error;
use dom::NodeId;
use log::{trace, warn};

/// The six lifecycle points surrounding init, open, and close.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecyclePoint {
    BeforeInit,
    AfterInit,
    BeforeOpen,
    AfterOpen,
    BeforeClose,
    AfterClose,
}

impl LifecyclePoint {
    pub const ALL: [Self; 6] = [
        Self::BeforeInit,
        Self::AfterInit,
        Self::BeforeOpen,
        Self::AfterOpen,
        Self::BeforeClose,
        Self::AfterClose,
    ];

    /// Key used in the configuration hook table.
    pub fn hook_name(self) -> &'static str {
        match self {
            Self::BeforeInit => "beforeInit",
            Self::AfterInit => "afterInit",
            Self::BeforeOpen => "beforeOpenPopup",
            Self::AfterOpen => "afterOpenPopup",
            Self::BeforeClose => "beforeClosePopup",
            Self::AfterClose => "afterClosePopup",
        }
    }

    /// Name carried by the structured notification.
    pub fn event_name(self) -> &'static str {
        match self {
            Self::BeforeInit => "wmPopup:beforeInit",
            Self::AfterInit => "wmPopup:afterInit",
            Self::BeforeOpen => "wmPopup:beforeOpenPopup",
            Self::AfterOpen => "wmPopup:afterOpenPopup",
            Self::BeforeClose => "wmPopup:beforeClosePopup",
            Self::AfterClose => "wmPopup:afterClosePopup",
        }
    }

    fn index(self) -> usize {
        match self {
            Self::BeforeInit => 0,
            Self::AfterInit => 1,
            Self::BeforeOpen => 2,
            Self::AfterOpen => 3,
            Self::BeforeClose => 4,
            Self::AfterClose => 5,
        }
    }
}

/// Arguments passed to hook callbacks.
#[derive(Debug, Clone, Copy)]
pub struct HookArgs<'a> {
    pub url: Option<&'a str>,
    pub locator: Option<&'a str>,
    /// Overlay shell node; absent only before the structure is built.
    pub overlay: Option<NodeId>,
}

/// Structured notification payload dispatched alongside hooks.
#[derive(Debug, Clone)]
pub struct PopupNotification {
    pub point: LifecyclePoint,
    pub name: &'static str,
    pub url: Option<String>,
    pub locator: Option<String>,
    pub overlay: Option<NodeId>,
}

pub type HookFn = Box<dyn FnMut(&HookArgs<'_>) -> Result<(), Error> + Send>;
/// Returns `false` to cancel the notification's default, mirroring a
/// cancelable document event.
pub type NotifierFn = Box<dyn FnMut(&PopupNotification) -> bool + Send>;

/// A registered listener: either a hook callback or a structured
/// notification listener.
pub enum Listener {
    Hook(HookFn),
    Notifier(NotifierFn),
}

/// Ordered hook table supplied through the configuration surface.
#[derive(Default)]
pub struct HookTable {
    entries: Vec<(LifecyclePoint, Listener)>,
}

impl HookTable {
    pub fn on(
        &mut self,
        point: LifecyclePoint,
        callback: impl FnMut(&HookArgs<'_>) -> Result<(), Error> + Send + 'static,
    ) {
        self.entries
            .push((point, Listener::Hook(Box::new(callback))));
    }

    pub fn on_notification(
        &mut self,
        point: LifecyclePoint,
        listener: impl FnMut(&PopupNotification) -> bool + Send + 'static,
    ) {
        self.entries
            .push((point, Listener::Notifier(Box::new(listener))));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl std::fmt::Debug for HookTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookTable")
            .field("entries", &self.entries.len())
            .finish()
    }
}

/// Per-point listener lists owned by the engine.
#[derive(Default)]
pub struct HookBus {
    points: [Vec<Listener>; 6],
}

impl HookBus {
    /// Move every entry of a configuration hook table into the bus,
    /// preserving registration order.
    pub fn install(&mut self, table: HookTable) {
        for (point, listener) in table.entries {
            self.points[point.index()].push(listener);
        }
    }

    pub fn on(
        &mut self,
        point: LifecyclePoint,
        callback: impl FnMut(&HookArgs<'_>) -> Result<(), Error> + Send + 'static,
    ) {
        self.points[point.index()].push(Listener::Hook(Box::new(callback)));
    }

    pub fn on_notification(
        &mut self,
        point: LifecyclePoint,
        listener: impl FnMut(&PopupNotification) -> bool + Send + 'static,
    ) {
        self.points[point.index()].push(Listener::Notifier(Box::new(listener)));
    }

    /// Fire every listener registered at a lifecycle point. Hooks run
    /// first in registration order, then notifiers; the return value is
    /// `false` when any notifier canceled the default.
    pub fn fire(
        &mut self,
        point: LifecyclePoint,
        url: Option<&str>,
        locator: Option<&str>,
        overlay: Option<NodeId>,
    ) -> bool {
        let args = HookArgs {
            url,
            locator,
            overlay,
        };
        let list = &mut self.points[point.index()];
        for listener in list.iter_mut() {
            if let Listener::Hook(callback) = listener {
                if let Err(err) = callback(&args) {
                    warn!("{} hook failed: {err:#}", point.hook_name());
                }
            }
        }

        let notification = PopupNotification {
            point,
            name: point.event_name(),
            url: url.map(str::to_string),
            locator: locator.map(str::to_string),
            overlay,
        };
        let mut proceed = true;
        for listener in list.iter_mut() {
            if let Listener::Notifier(notify) = listener {
                proceed &= notify(&notification);
            }
        }
        if !proceed {
            trace!("{} notification default canceled", point.event_name());
        }
        proceed
    }
}
