//! Fragment cache & loader.
//!
//! Fetches a remote document once per URL, stages it inside the host
//! document so embedded content initializes against a real tree, runs
//! the content-activation collaborator, and caches the activated root
//! node. Failures are never cached; the next open of the same URL
//! retries. Concurrent fetches of one unresolved URL collapse into a
//! single request.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use anyhow::Error;
use dom::{Document, NodeId, Selector, parser};
use futures::future::BoxFuture;
use log::{debug, trace};
use tokio::sync::OnceCell;

use crate::error::LoadError;

/// The network fetch primitive: resolves a popup URL to raw HTML text.
pub trait FragmentFetcher: Send + Sync {
    fn fetch(&self, url: &str) -> BoxFuture<'static, Result<String, Error>>;
}

/// The content-activation collaborator: re-initializes embedded
/// widgets and platform blocks inside a newly attached subtree. Must
/// complete before the subtree is considered ready.
pub trait ContentActivator: Send {
    fn activate<'a>(
        &'a mut self,
        doc: &'a mut Document,
        root: NodeId,
    ) -> BoxFuture<'a, Result<(), Error>>;
}

/// Activator that treats every subtree as immediately ready.
pub struct NoopActivator;

impl ContentActivator for NoopActivator {
    fn activate<'a>(
        &'a mut self,
        _doc: &'a mut Document,
        _root: NodeId,
    ) -> BoxFuture<'a, Result<(), Error>> {
        Box::pin(async { Ok(()) })
    }
}

type FetchSlot = Arc<OnceCell<Result<Arc<str>, String>>>;

/// Collapses concurrent in-flight fetches of the same URL into one
/// request. Entries are dropped once the request settles, so a failed
/// fetch is retried by the next caller instead of being remembered.
#[derive(Clone, Default)]
pub struct FetchCoalescer {
    in_flight: Arc<Mutex<HashMap<String, FetchSlot>>>,
}

impl FetchCoalescer {
    /// Fetch a URL, joining an already in-flight request when present.
    pub async fn fetch(
        &self,
        fetcher: &Arc<dyn FragmentFetcher>,
        url: &str,
    ) -> Result<Arc<str>, String> {
        let slot = {
            let mut map = self.in_flight.lock().expect("fetch coalescer lock");
            map.entry(url.to_string()).or_default().clone()
        };

        let fetcher = Arc::clone(fetcher);
        let owned = url.to_string();
        let result = slot
            .get_or_init(|| async move {
                trace!("fetching {owned}");
                match fetcher.fetch(&owned).await {
                    Ok(body) => Ok(Arc::from(body)),
                    Err(err) => Err(format!("{err:#}")),
                }
            })
            .await
            .clone();

        self.in_flight
            .lock()
            .expect("fetch coalescer lock")
            .remove(url);
        result
    }
}

/// Fetches, activates, and caches popup fragments, one root node per
/// URL for the process lifetime.
pub struct FragmentLoader {
    fetcher: Arc<dyn FragmentFetcher>,
    activator: Box<dyn ContentActivator>,
    coalescer: FetchCoalescer,
    cache: HashMap<String, NodeId>,
}

impl FragmentLoader {
    pub fn new(fetcher: Arc<dyn FragmentFetcher>, activator: Box<dyn ContentActivator>) -> Self {
        Self {
            fetcher,
            activator,
            coalescer: FetchCoalescer::default(),
            cache: HashMap::new(),
        }
    }

    /// The cached activated root for a URL, if one exists.
    pub fn cached(&self, url: &str) -> Option<NodeId> {
        self.cache.get(url).copied()
    }

    /// Resolve a URL to its activated root node, idempotent per URL.
    ///
    /// On a cache miss the fetched document is parsed under `staging`
    /// (a hidden node inside the host document), handed to the
    /// activation collaborator, and only then detached and cached.
    pub async fn load(
        &mut self,
        doc: &mut Document,
        staging: NodeId,
        url: &str,
    ) -> Result<NodeId, LoadError> {
        if let Some(&root) = self.cache.get(url) {
            trace!("fragment cache hit for {url}");
            return Ok(root);
        }

        let body = self
            .coalescer
            .fetch(&self.fetcher, url)
            .await
            .map_err(|message| LoadError::Fetch {
                url: url.to_string(),
                message,
            })?;

        let container =
            parser::parse_fragment(doc, staging, &body).map_err(|err| LoadError::Fetch {
                url: url.to_string(),
                message: format!("{err:#}"),
            })?;
        doc.add_class(container, "temp-popup-container");

        if let Err(source) = self.activator.activate(doc, container).await {
            doc.remove_subtree(container);
            return Err(LoadError::Activation {
                url: url.to_string(),
                source,
            });
        }

        let root = fragment_root(doc, container);
        if root == container {
            doc.detach(container);
        } else {
            doc.detach(root);
            doc.remove_subtree(container);
        }

        debug!("cached activated fragment for {url}");
        self.cache.insert(url.to_string(), root);
        Ok(root)
    }
}

/// Pick the node worth keeping out of a freshly parsed page: the
/// `#sections` wrapper when present, else the document body, else the
/// parse container itself.
fn fragment_root(doc: &Document, container: NodeId) -> NodeId {
    Selector::Id(String::from("sections"))
        .find_first(doc, container)
        .or_else(|| doc.find_by_tag(container, "body"))
        .unwrap_or(container)
}
