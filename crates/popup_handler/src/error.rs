//! Error kinds caught at the overlay state machine boundary.

use thiserror::Error;

/// Failures that can occur while resolving popup content. All of
/// these are converted into visible error content rather than
/// propagated out of `open`, and none of them populate the cache.
#[derive(Debug, Error)]
pub enum LoadError {
    /// Network or remote-resource failure, including unreadable bodies.
    #[error("failed to fetch {url}: {message}")]
    Fetch { url: String, message: String },

    /// The content-activation collaborator rejected the fragment.
    #[error("content activation failed for {url}")]
    Activation {
        url: String,
        #[source]
        source: anyhow::Error,
    },

    /// The requested sub-element is absent from the fetched document.
    #[error("locator {locator:?} not found in fetched content")]
    LocatorNotFound { locator: String },
}
