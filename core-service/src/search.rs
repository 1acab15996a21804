//! Interactive search with debouncing and stale-result suppression.
//!
//! Each keystroke calls [`SearchSession::update`]. A query is only sent once
//! the input has been quiet for the configured debounce period, and only the
//! newest query's response is ever published: every update bumps a
//! generation counter, and a response whose generation is no longer current
//! is dropped. Searches are read-only and run independently of indexing.

use bridge_traits::{RemoteSearchClient, SearchQuery, SearchResults, SemanticQuery};
use core_runtime::config::SearchSettings;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// What the result list should currently show
#[derive(Debug, Clone, PartialEq)]
pub enum SearchState {
    Idle,
    /// Waiting for the debounce period or the response
    Pending { query: String },
    Ready(SearchResults),
    Failed { query: String, message: String },
}

pub struct SearchSession {
    client: Arc<dyn RemoteSearchClient>,
    settings: SearchSettings,
    generation: Arc<AtomicU64>,
    state: Arc<watch::Sender<SearchState>>,
    pending: Mutex<Option<JoinHandle<()>>>,
}

impl SearchSession {
    pub fn new(client: Arc<dyn RemoteSearchClient>, settings: SearchSettings) -> Self {
        let (state, _) = watch::channel(SearchState::Idle);
        Self {
            client,
            settings,
            generation: Arc::new(AtomicU64::new(0)),
            state: Arc::new(state),
            pending: Mutex::new(None),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<SearchState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> SearchState {
        self.state.borrow().clone()
    }

    /// Build the request sent for `text`
    pub fn build_query(&self, text: &str) -> SearchQuery {
        SearchQuery {
            query: text.to_string(),
            limit: self.settings.limit,
            highlight_fields: self.settings.highlight_fields.clone(),
            crop_fields: vec!["content".to_string()],
            crop_length: self.settings.crop_length,
            semantic: self.semantic(),
        }
    }

    #[cfg(feature = "semantic-search")]
    fn semantic(&self) -> Option<SemanticQuery> {
        self.settings.semantic.as_ref().map(|s| SemanticQuery {
            embedder: s.embedder.clone(),
            ratio: s.ratio,
        })
    }

    #[cfg(not(feature = "semantic-search"))]
    fn semantic(&self) -> Option<SemanticQuery> {
        None
    }

    /// Record new input. Must be called from within a tokio runtime.
    ///
    /// Blank input clears the results immediately.
    pub fn update(&self, text: impl Into<String>) {
        let text = text.into();
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        let mut pending = match self.pending.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(task) = pending.take() {
            task.abort();
        }

        if text.trim().is_empty() {
            self.state.send_replace(SearchState::Idle);
            return;
        }

        self.state.send_replace(SearchState::Pending {
            query: text.clone(),
        });

        let query = self.build_query(text.trim());
        let client = self.client.clone();
        let current = self.generation.clone();
        let state = self.state.clone();
        let debounce = self.settings.debounce;

        *pending = Some(tokio::spawn(async move {
            tokio::time::sleep(debounce).await;
            if current.load(Ordering::SeqCst) != generation {
                return;
            }

            debug!(generation, "Sending search query");
            let outcome = client.search(&query).await;

            if current.load(Ordering::SeqCst) != generation {
                debug!(generation, "Discarding stale search response");
                return;
            }
            match outcome {
                Ok(results) => {
                    state.send_replace(SearchState::Ready(results));
                }
                Err(e) => {
                    warn!(error = %e, "Search failed");
                    state.send_replace(SearchState::Failed {
                        query: query.query,
                        message: e.to_string(),
                    });
                }
            }
        }));
    }

    /// Run a single query immediately, bypassing the debounce
    pub async fn search_now(&self, text: &str) -> bridge_traits::error::Result<SearchResults> {
        self.client.search(&self.build_query(text)).await
    }
}

impl Drop for SearchSession {
    fn drop(&mut self) {
        if let Ok(mut pending) = self.pending.lock() {
            if let Some(task) = pending.take() {
                task.abort();
            }
        }
    }
}
