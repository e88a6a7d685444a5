//! Popup engine: turns an in-page hyperlink into an on-demand overlay
//! showing content fetched from another document.
//!
//! This crate orchestrates trigger parsing, fetch-once fragment
//! caching, content activation, node relocation between the source
//! document and the overlay, open/close animation sequencing, scroll
//! locking, and the lifecycle hook/event protocol around every
//! transition.

pub mod config;
pub mod error;
pub mod hooks;
pub mod loader;
pub mod relocate;
pub mod scroll;
pub mod state;
pub mod trigger;
/// URL streaming utilities for http, https, and file schemes
pub mod url;
