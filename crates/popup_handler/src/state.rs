//! Popup engine and overlay state machine.
//!
//! The engine owns the host document, the overlay structure it builds
//! into it, and a four-state machine (`Closed`, `Loading`,
//! `ContentVisible`, `Closing`) that serializes every open and close.
//! At most one popup session exists at a time; opening while content
//! is visible closes the current session first, and requests that
//! arrive mid-transition are rejected.

use crate::config::{Animation, ClosePlacement, PopupConfig};
use crate::error::LoadError;
use crate::hooks::{HookBus, LifecyclePoint};
use crate::loader::{ContentActivator, FragmentFetcher, FragmentLoader};
use crate::relocate::{self, RelocationRecord};
use crate::scroll::{ScrollLock, Viewport};
use crate::trigger::parse_trigger;
use anyhow::{Context, Error};
use core::mem;
use core::time::Duration;
use dom::{Document, NodeId, parser};
use log::{debug, error, info, trace};
use std::sync::Arc;
use tokio::time::sleep;

/// Delay between attaching the container at opacity zero and starting
/// the fade, so the transition actually animates.
const FADE_KICKOFF_DELAY: Duration = Duration::from_millis(10);

/// Delay before probing freshly shown content for a lone video block.
const VIDEO_PROBE_DELAY: Duration = Duration::from_millis(100);

/// Where the overlay is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayState {
    Closed,
    /// Overlay visible with the loading indicator, content not yet in.
    Loading,
    ContentVisible,
    Closing,
}

/// The currently open popup and how to undo it.
#[derive(Debug)]
pub struct PopupSession {
    pub url: String,
    pub locator: Option<String>,
    /// `None` when the session shows synthesized error content, which
    /// is discarded instead of restored.
    pub relocation: Option<RelocationRecord>,
}

/// Overlay structure nodes, built once at engine init.
#[derive(Debug, Clone, Copy)]
struct OverlayNodes {
    overlay: NodeId,
    container: NodeId,
    content: NodeId,
    close_button: NodeId,
    loading: NodeId,
}

/// The popup engine: document, overlay structure, loader, hooks, and
/// the state machine tying them together.
pub struct PopupEngine {
    config: PopupConfig,
    doc: Document,
    viewport: Viewport,
    body: NodeId,
    nodes: OverlayNodes,
    /// Hidden node fetched fragments are parsed and activated under.
    staging: NodeId,
    loader: FragmentLoader,
    hooks: HookBus,
    scroll: ScrollLock,
    state: OverlayState,
    session: Option<PopupSession>,
}

impl PopupEngine {
    /// Build the overlay structure into the host document and wire up
    /// the lifecycle bus. Fires `beforeInit` and `afterInit`.
    pub fn new(
        mut doc: Document,
        mut config: PopupConfig,
        fetcher: Arc<dyn FragmentFetcher>,
        activator: Box<dyn ContentActivator>,
    ) -> Result<Self, Error> {
        let body = doc
            .find_by_tag(doc.root(), "body")
            .context("host document has no body")?;

        let mut hooks = HookBus::default();
        hooks.install(mem::take(&mut config.hooks));
        hooks.fire(LifecyclePoint::BeforeInit, None, None, None);

        let staging = doc.create_element("div");
        doc.add_class(staging, "wm-popup-staging");
        doc.set_style(staging, "display", "none");
        doc.append(body, staging);

        let nodes = build_overlay(&mut doc, body, &config)?;
        info!("popup overlay initialized");
        hooks.fire(LifecyclePoint::AfterInit, None, None, Some(nodes.overlay));

        Ok(Self {
            config,
            doc,
            viewport: Viewport::default(),
            body,
            nodes,
            staging,
            loader: FragmentLoader::new(fetcher, activator),
            hooks,
            scroll: ScrollLock::default(),
            state: OverlayState::Closed,
            session: None,
        })
    }

    /// Open a popup for `url`, optionally narrowing to the element the
    /// locator selects.
    ///
    /// Content already visible is closed first, then the open proceeds
    /// normally. While a transition is already in flight the request is
    /// dropped and `Ok(false)` is returned. Load failures do not fail
    /// the open: the overlay shows error content instead and the
    /// failing URL stays uncached so a later open can retry.
    pub async fn open(&mut self, url: &str, locator: Option<&str>) -> Result<bool, Error> {
        match self.state {
            OverlayState::ContentVisible => {
                self.close().await;
            }
            OverlayState::Loading | OverlayState::Closing => {
                debug!("open({url}) dropped, overlay is {:?}", self.state);
                return Ok(false);
            }
            OverlayState::Closed => {}
        }

        self.hooks.fire(
            LifecyclePoint::BeforeOpen,
            Some(url),
            locator,
            Some(self.nodes.overlay),
        );

        self.scroll
            .engage(&mut self.doc, self.body, &mut self.viewport);
        self.doc.set_style(self.nodes.overlay, "display", "block");
        self.doc.set_style(self.nodes.container, "display", "none");
        self.doc.set_style(self.nodes.loading, "display", "block");
        self.doc.set_style(self.nodes.content, "display", "none");
        self.doc
            .set_attr(self.nodes.overlay, "data-popup-id", &popup_id(url, locator));
        self.state = OverlayState::Loading;

        if self.config.debug_loading {
            debug!("debug loading enabled, parking in loading state");
            return Ok(true);
        }

        let session = match self.resolve_content(url, locator).await {
            Ok(relocation) => PopupSession {
                url: url.to_string(),
                locator: locator.map(str::to_string),
                relocation: Some(relocation),
            },
            Err(err) => {
                error!("popup content failed for {url}: {err}");
                self.doc.remove_attr(self.nodes.overlay, "data-popup-id");
                self.render_error(url, locator);
                PopupSession {
                    url: url.to_string(),
                    locator: locator.map(str::to_string),
                    relocation: None,
                }
            }
        };
        self.session = Some(session);

        self.show_content().await;
        self.state = OverlayState::ContentVisible;
        self.hooks.fire(
            LifecyclePoint::AfterOpen,
            Some(url),
            locator,
            Some(self.nodes.overlay),
        );
        self.autoplay_single_video().await;
        Ok(true)
    }

    /// Close the visible popup, restore relocated content to its
    /// source position, and unlock scroll. Returns `false` when there
    /// is nothing to close, including mid-load.
    pub async fn close(&mut self) -> bool {
        if self.state != OverlayState::ContentVisible {
            debug!("close dropped, overlay is {:?}", self.state);
            return false;
        }
        let url = self.session.as_ref().map(|session| session.url.clone());
        let locator = self
            .session
            .as_ref()
            .and_then(|session| session.locator.clone());
        self.hooks.fire(
            LifecyclePoint::BeforeClose,
            url.as_deref(),
            locator.as_deref(),
            Some(self.nodes.overlay),
        );
        self.state = OverlayState::Closing;

        if self.config.open_animation == Animation::Fade {
            let duration = self.config.open_animation_duration_ms;
            self.doc.set_style(self.nodes.container, "opacity", "0");
            self.doc.set_style(
                self.nodes.overlay,
                "transition",
                &format!("opacity {duration}ms"),
            );
            self.doc.set_style(self.nodes.overlay, "opacity", "0");
            sleep(self.config.open_animation_duration()).await;
        }

        if let Some(session) = self.session.take() {
            match session.relocation {
                Some(record) => {
                    relocate::restore(&mut self.doc, record, self.nodes.content);
                    trace!("restored content for {}", session.url);
                }
                None => {
                    while let Some(child) = self.doc.first_child(self.nodes.content) {
                        self.doc.remove_subtree(child);
                    }
                }
            }
        }

        self.scroll
            .disengage(&mut self.doc, self.body, &mut self.viewport)
            .await;

        self.doc.set_style(self.nodes.overlay, "display", "none");
        self.doc.remove_style(self.nodes.overlay, "opacity");
        self.doc.remove_style(self.nodes.overlay, "transition");
        self.doc.remove_style(self.nodes.container, "opacity");
        self.doc.remove_style(self.nodes.container, "transition");
        self.doc.remove_attr(self.nodes.overlay, "data-popup-id");
        self.state = OverlayState::Closed;
        self.hooks.fire(
            LifecyclePoint::AfterClose,
            url.as_deref(),
            locator.as_deref(),
            Some(self.nodes.overlay),
        );
        true
    }

    /// Open from a trigger link. Non-trigger hrefs are left alone and
    /// reported as such.
    pub async fn handle_trigger_click(&mut self, href: &str) -> Result<bool, Error> {
        let Some(spec) = parse_trigger(href) else {
            return Ok(false);
        };
        self.open(&spec.url, spec.locator.as_deref()).await
    }

    /// A click landed on `target`; closes only when the click hit the
    /// overlay backdrop itself and the setting allows it.
    pub async fn handle_overlay_click(&mut self, target: NodeId) -> bool {
        if self.config.close_on_overlay_click && target == self.nodes.overlay {
            self.close().await
        } else {
            false
        }
    }

    pub async fn handle_escape(&mut self) -> bool {
        if self.config.close_on_escape {
            self.close().await
        } else {
            false
        }
    }

    pub async fn handle_close_button(&mut self) -> bool {
        self.close().await
    }

    async fn resolve_content(
        &mut self,
        url: &str,
        locator: Option<&str>,
    ) -> Result<RelocationRecord, LoadError> {
        let root = self.loader.load(&mut self.doc, self.staging, url).await?;
        relocate::extract(&mut self.doc, root, locator, self.nodes.content)
    }

    /// Swap the loading indicator for the content and run the open
    /// animation.
    async fn show_content(&mut self) {
        self.doc.set_style(self.nodes.loading, "display", "none");
        self.doc.set_style(self.nodes.content, "display", "block");
        self.doc.set_style(self.nodes.container, "display", "block");
        match self.config.open_animation {
            Animation::Fade => {
                let duration = self.config.open_animation_duration_ms;
                self.doc.set_style(self.nodes.container, "opacity", "0");
                sleep(FADE_KICKOFF_DELAY).await;
                self.doc.set_style(
                    self.nodes.container,
                    "transition",
                    &format!("opacity {duration}ms"),
                );
                self.doc.set_style(self.nodes.container, "opacity", "1");
            }
            Animation::None => {
                self.doc.set_style(self.nodes.container, "opacity", "1");
            }
        }
    }

    /// Synthesize in-overlay error content naming the URL and target.
    fn render_error(&mut self, url: &str, locator: Option<&str>) {
        let wrapper = self.doc.create_element("div");
        self.doc.add_class(wrapper, "wm-popup-error");

        let heading = self.doc.create_element("h2");
        let heading_text = self.doc.create_text("Error Loading Content");
        self.doc.append(heading, heading_text);
        self.doc.append(wrapper, heading);

        let message = if locator.is_some() {
            "There was an error fetching the content. Doublecheck the URL and target."
        } else {
            "There was an error fetching the content. Doublecheck the URL."
        };
        let body = self.doc.create_element("p");
        let body_text = self.doc.create_text(message);
        self.doc.append(body, body_text);
        self.doc.append(wrapper, body);

        let url_line = self.doc.create_element("p");
        let url_text = self.doc.create_text(&format!("URL: {url}"));
        self.doc.append(url_line, url_text);
        self.doc.append(wrapper, url_line);

        if let Some(target) = locator {
            let target_line = self.doc.create_element("p");
            let target_text = self.doc.create_text(&format!("Target: {target}"));
            self.doc.append(target_line, target_text);
            self.doc.append(wrapper, target_line);
        }

        self.doc.append(self.nodes.content, wrapper);
    }

    /// When the content region holds exactly one video block, unmute
    /// it and, if its embedded settings ask for autoplay, start it.
    async fn autoplay_single_video(&mut self) {
        let Some(block) = self.single_video_block() else {
            return;
        };
        sleep(VIDEO_PROBE_DELAY).await;

        let autoplay = self
            .doc
            .attr(block, "data-block-json")
            .and_then(|json| serde_json::from_str::<serde_json::Value>(json).ok())
            .and_then(|value| value["settings"]["autoPlay"].as_bool())
            .unwrap_or(false);

        let Some(video) = self.doc.find_by_tag(block, "video") else {
            return;
        };
        self.doc.set_attr(video, "muted", "false");
        if autoplay {
            self.doc.set_attr(video, "data-playing", "true");
            trace!("autoplaying lone video block");
        }
    }

    /// The lone video block in the content region, when the region
    /// holds exactly one element and that element is a video block or
    /// a floating element wrapping one.
    fn single_video_block(&self) -> Option<NodeId> {
        let mut elements = self
            .doc
            .children(self.nodes.content)
            .filter(|&id| self.doc.tag(id).is_some());
        let only = elements.next()?;
        if elements.next().is_some() {
            return None;
        }

        let is_video_block = |id: NodeId| {
            self.doc.has_class(id, "sqs-block-video") && self.doc.attr(id, "data-block-json").is_some()
        };
        if is_video_block(only) {
            return Some(only);
        }
        if self.doc.has_class(only, "fe-block") {
            return self.doc.descendants(only).skip(1).find(|&id| is_video_block(id));
        }
        None
    }

    pub fn document(&self) -> &Document {
        &self.doc
    }

    pub fn document_mut(&mut self) -> &mut Document {
        &mut self.doc
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn viewport_mut(&mut self) -> &mut Viewport {
        &mut self.viewport
    }

    pub fn state(&self) -> OverlayState {
        self.state
    }

    pub fn session(&self) -> Option<&PopupSession> {
        self.session.as_ref()
    }

    pub fn hooks(&mut self) -> &mut HookBus {
        &mut self.hooks
    }

    pub fn body(&self) -> NodeId {
        self.body
    }

    pub fn overlay(&self) -> NodeId {
        self.nodes.overlay
    }

    pub fn container(&self) -> NodeId {
        self.nodes.container
    }

    pub fn content_region(&self) -> NodeId {
        self.nodes.content
    }

    pub fn close_button(&self) -> NodeId {
        self.nodes.close_button
    }

    pub fn loading_element(&self) -> NodeId {
        self.nodes.loading
    }

    pub fn is_cached(&self, url: &str) -> bool {
        self.loader.cached(url).is_some()
    }

    pub fn cached_fragment(&self, url: &str) -> Option<NodeId> {
        self.loader.cached(url)
    }
}

impl std::fmt::Debug for PopupEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PopupEngine")
            .field("state", &self.state)
            .field("session", &self.session)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Identifier stamped on the overlay shell while a popup is open.
fn popup_id(url: &str, locator: Option<&str>) -> String {
    match locator {
        Some(locator) => format!("{url}{locator}"),
        None => url.to_string(),
    }
}

/// Build the hidden overlay shell under the body: overlay backdrop,
/// content container, content region, loading indicator, close button.
fn build_overlay(
    doc: &mut Document,
    body: NodeId,
    config: &PopupConfig,
) -> Result<OverlayNodes, Error> {
    let overlay = doc.create_element("div");
    doc.add_class(overlay, "wm-popup-overlay");
    doc.set_style(overlay, "display", "none");
    doc.set_style(overlay, "z-index", &config.z_index.to_string());
    doc.append(body, overlay);

    let container = doc.create_element("div");
    doc.add_class(container, "wm-popup-container");
    doc.set_style(container, "max-width", &config.max_width);
    doc.set_style(container, "max-height", &config.max_height);
    doc.append(overlay, container);

    let content = doc.create_element("div");
    doc.add_class(content, "wm-popup-content");
    doc.append(container, content);

    // on the overlay shell, not the container; the container is hidden
    // for the whole loading phase
    let loading = doc.create_element("div");
    doc.add_class(loading, "wm-popup-loading");
    doc.set_style(loading, "display", "none");
    doc.append(overlay, loading);
    fill_from_template(doc, loading, &config.loading_template)?;

    let close_button = doc.create_element("button");
    doc.add_class(close_button, "wm-popup-close");
    doc.set_attr(close_button, "aria-label", "Close");
    let glyph = doc.create_element("svg");
    doc.set_attr(glyph, "viewBox", "0 0 16 16");
    let path = doc.create_element("path");
    doc.set_attr(path, "d", "M1 1 L15 15 M15 1 L1 15");
    doc.append(glyph, path);
    doc.append(close_button, glyph);
    match config.close_placement {
        ClosePlacement::Content => doc.append(container, close_button),
        ClosePlacement::Overlay => doc.append(overlay, close_button),
    }

    Ok(OverlayNodes {
        overlay,
        container,
        content,
        close_button,
        loading,
    })
}

/// Parse an HTML template and graft its nodes directly under `parent`,
/// without the parser's scaffolding.
fn fill_from_template(doc: &mut Document, parent: NodeId, template: &str) -> Result<(), Error> {
    let scaffold = parser::parse_fragment(doc, parent, template)?;
    let source = doc.find_by_tag(scaffold, "body").unwrap_or(scaffold);
    while let Some(child) = doc.first_child(source) {
        doc.append(parent, child);
    }
    doc.remove_subtree(scaffold);
    Ok(())
}
