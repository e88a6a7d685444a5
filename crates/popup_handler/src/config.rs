//! Configuration settings for the popup engine.
//!
//! Settings are resolved once at startup by merging built-in defaults
//! with user-supplied overrides, and never mutated afterwards. The
//! debug flag can additionally be driven from the environment.

use crate::hooks::HookTable;
use core::time::Duration;
use std::env;

/// How the overlay appears and disappears.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Animation {
    /// Fade the container in over the configured duration; on close,
    /// fade container and overlay out before teardown.
    #[default]
    Fade,
    /// No animation: full opacity at once, immediate teardown.
    None,
}

/// Where the close button is attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClosePlacement {
    /// Inside the popup container.
    #[default]
    Content,
    /// On the overlay shell itself.
    Overlay,
}

/// Resolved, immutable popup settings.
pub struct PopupConfig {
    pub open_animation: Animation,
    pub open_animation_duration_ms: u64,
    pub close_on_overlay_click: bool,
    pub close_on_escape: bool,
    pub close_placement: ClosePlacement,
    pub max_width: String,
    pub max_height: String,
    pub z_index: u32,
    /// Short-circuit `open` after entering `Loading`, for inspecting
    /// the loading indicator without a real fetch.
    pub debug_loading: bool,
    /// HTML template rendered inside the loading indicator.
    pub loading_template: String,
    /// Lifecycle hook table, drained into the engine's bus at init.
    pub hooks: HookTable,
}

impl Default for PopupConfig {
    fn default() -> Self {
        Self {
            open_animation: Animation::Fade,
            open_animation_duration_ms: 300,
            close_on_overlay_click: true,
            close_on_escape: true,
            close_placement: ClosePlacement::Content,
            max_width: String::from("800px"),
            max_height: String::from("80vh"),
            z_index: 9999,
            debug_loading: false,
            loading_template: String::from(r#"<div class="loading"></div>"#),
            hooks: HookTable::default(),
        }
    }
}

/// User-supplied overrides; `None` fields keep the built-in default.
#[derive(Default)]
pub struct PopupOverrides {
    pub open_animation: Option<Animation>,
    pub open_animation_duration_ms: Option<u64>,
    pub close_on_overlay_click: Option<bool>,
    pub close_on_escape: Option<bool>,
    pub close_placement: Option<ClosePlacement>,
    pub max_width: Option<String>,
    pub max_height: Option<String>,
    pub z_index: Option<u32>,
    pub debug_loading: Option<bool>,
    pub loading_template: Option<String>,
    pub hooks: HookTable,
}

impl PopupConfig {
    /// Merge user overrides over the built-in defaults.
    #[must_use]
    pub fn resolve(overrides: PopupOverrides) -> Self {
        let defaults = Self::default();
        Self {
            open_animation: overrides.open_animation.unwrap_or(defaults.open_animation),
            open_animation_duration_ms: overrides
                .open_animation_duration_ms
                .unwrap_or(defaults.open_animation_duration_ms),
            close_on_overlay_click: overrides
                .close_on_overlay_click
                .unwrap_or(defaults.close_on_overlay_click),
            close_on_escape: overrides.close_on_escape.unwrap_or(defaults.close_on_escape),
            close_placement: overrides.close_placement.unwrap_or(defaults.close_placement),
            max_width: overrides.max_width.unwrap_or(defaults.max_width),
            max_height: overrides.max_height.unwrap_or(defaults.max_height),
            z_index: overrides.z_index.unwrap_or(defaults.z_index),
            debug_loading: overrides.debug_loading.unwrap_or(defaults.debug_loading),
            loading_template: overrides
                .loading_template
                .unwrap_or(defaults.loading_template),
            hooks: overrides.hooks,
        }
    }

    /// Load overrides from environment variables.
    ///
    /// Reads `WM_POPUP_DEBUG_LOADING`: set to "1" to park the machine
    /// in the loading state on every open (default: disabled).
    #[must_use]
    pub fn from_env() -> Self {
        let debug_loading = env::var("WM_POPUP_DEBUG_LOADING").ok().as_deref() == Some("1");
        Self::resolve(PopupOverrides {
            debug_loading: Some(debug_loading),
            ..PopupOverrides::default()
        })
    }

    /// The open/close animation duration as a `Duration`.
    #[must_use]
    pub fn open_animation_duration(&self) -> Duration {
        Duration::from_millis(self.open_animation_duration_ms)
    }
}

impl std::fmt::Debug for PopupConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PopupConfig")
            .field("open_animation", &self.open_animation)
            .field(
                "open_animation_duration_ms",
                &self.open_animation_duration_ms,
            )
            .field("close_on_overlay_click", &self.close_on_overlay_click)
            .field("close_on_escape", &self.close_on_escape)
            .field("close_placement", &self.close_placement)
            .field("max_width", &self.max_width)
            .field("max_height", &self.max_height)
            .field("z_index", &self.z_index)
            .field("debug_loading", &self.debug_loading)
            .field("hooks", &self.hooks)
            .finish_non_exhaustive()
    }
}
