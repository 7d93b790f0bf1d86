//! Debounced search per client session.
//!
//! Every keystroke bumps a generation counter and schedules a delayed search.
//! A search only runs if no newer keystroke arrived during the delay, and its
//! results are only published if the generation is still current when the
//! store answers.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::{debug, warn};
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::browse::{is_searchable, normalize_query, search, SearchResults};
use crate::db::PollStore;

pub struct SearchSession {
    store: Arc<dyn PollStore>,
    delay: Duration,
    generation: Arc<AtomicU64>,
    results: Arc<RwLock<Option<SearchResults>>>,
}

impl SearchSession {
    pub fn new(store: Arc<dyn PollStore>, delay: Duration) -> Self {
        Self {
            store,
            delay,
            generation: Arc::new(AtomicU64::new(0)),
            results: Arc::new(RwLock::new(None)),
        }
    }

    /// Records a new query. Returns the scheduled search, or `None` when the
    /// query is too short, in which case results are cleared immediately.
    pub async fn query_changed(&self, raw_query: &str) -> Option<JoinHandle<()>> {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let query = normalize_query(raw_query);

        if !is_searchable(&query) {
            *self.results.write().await = None;
            return None;
        }

        let store = Arc::clone(&self.store);
        let current = Arc::clone(&self.generation);
        let results = Arc::clone(&self.results);
        let delay = self.delay;

        Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if current.load(Ordering::SeqCst) != generation {
                debug!("Search for {:?} superseded before it ran", query);
                return;
            }

            match search(store.as_ref(), &query).await {
                Ok(found) => {
                    // generation is checked while holding the write lock
                    let mut published = results.write().await;
                    if current.load(Ordering::SeqCst) != generation {
                        debug!("Dropping stale results for {:?}", query);
                        return;
                    }
                    *published = Some(found);
                }
                Err(e) => warn!("Search for {:?} failed: {}", query, e),
            }
        }))
    }

    pub async fn latest(&self) -> Option<SearchResults> {
        self.results.read().await.clone()
    }
}

struct TrackedSession {
    session: Arc<SearchSession>,
    last_seen: Instant,
}

/// One `SearchSession` per client session id, dropped after sitting idle.
pub struct SearchSessions {
    store: Arc<dyn PollStore>,
    delay: Duration,
    sessions: Mutex<HashMap<String, TrackedSession>>,
}

impl SearchSessions {
    pub fn new(store: Arc<dyn PollStore>, delay: Duration) -> Self {
        Self {
            store,
            delay,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub async fn session(&self, session_id: &str) -> Arc<SearchSession> {
        let mut sessions = self.sessions.lock().await;
        let tracked = sessions.entry(session_id.to_string()).or_insert_with(|| TrackedSession {
            session: Arc::new(SearchSession::new(Arc::clone(&self.store), self.delay)),
            last_seen: Instant::now(),
        });
        tracked.last_seen = Instant::now();
        Arc::clone(&tracked.session)
    }

    async fn existing(&self, session_id: &str) -> Option<Arc<SearchSession>> {
        let mut sessions = self.sessions.lock().await;
        let tracked = sessions.get_mut(session_id)?;
        tracked.last_seen = Instant::now();
        Some(Arc::clone(&tracked.session))
    }

    /// Feeds a keystroke into the session and waits for its debounce window.
    /// Returns whatever results are current afterwards, which may belong to a
    /// newer query if this one was superseded.
    pub async fn type_query(&self, session_id: &str, raw_query: &str) -> Option<SearchResults> {
        // a short query from an unknown session has nothing to clear or cancel
        let session = if is_searchable(&normalize_query(raw_query)) {
            self.session(session_id).await
        } else {
            self.existing(session_id).await?
        };
        if let Some(handle) = session.query_changed(raw_query).await {
            if let Err(e) = handle.await {
                warn!("Search task for session {} did not finish: {}", session_id, e);
            }
        }
        session.latest().await
    }

    /// Drops sessions with no keystroke for `max_idle`. Returns how many went.
    pub async fn evict_idle(&self, max_idle: Duration) -> usize {
        let mut sessions = self.sessions.lock().await;
        let before = sessions.len();
        sessions.retain(|_, tracked| tracked.last_seen.elapsed() < max_idle);
        before - sessions.len()
    }

    pub async fn active(&self) -> usize {
        self.sessions.lock().await.len()
    }
}
