mod browse;
mod vote;

use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::routing::{get, post};
use axum::{Json, Router};
use log::info;
use tokio::sync::RwLock;

use crate::browse::debounce::SearchSessions;
use crate::conditions::{ComfortPanel, ComfortPanelService};
use crate::db::PollStore;
use crate::error::{AppError, AppResult};
use crate::voting::ballot::SessionBallots;
use crate::voting::stats::{compute_stats, PollStats};

pub const SESSION_HEADER: &str = "x-session-id";

pub struct AppState {
    pub store: Arc<dyn PollStore>,
    pub ballots: SessionBallots,
    pub searches: SearchSessions,
    pub conditions: ComfortPanelService,
    pub stats: RwLock<Option<PollStats>>,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    pub fn new(store: Arc<dyn PollStore>, conditions: ComfortPanelService, search_debounce: Duration) -> SharedState {
        Arc::new(Self {
            searches: SearchSessions::new(Arc::clone(&store), search_debounce),
            store,
            ballots: SessionBallots::new(),
            conditions,
            stats: RwLock::new(None),
        })
    }
}

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/polls/search", get(browse::search_polls))
        .route("/polls/category/:slug", get(browse::polls_by_category))
        .route("/polls/tag/:tag", get(browse::polls_by_tag))
        .route("/polls/results", get(vote::ranked_results))
        .route("/polls/:poll_id/results", get(vote::poll_results))
        .route("/polls/:poll_id/votes", post(vote::cast_vote))
        .route("/locations", get(browse::list_states))
        .route("/locations/:state", get(browse::state_cities))
        .route("/locations/:state/:city/polls", get(browse::city_polls))
        .route("/stats", get(stats))
        .route("/conditions/:place", get(conditions))
        .with_state(state)
}

// Session id from the request headers, if the client sent a usable one
fn session_id(headers: &HeaderMap) -> Option<String> {
    headers
        .get(SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn require_session(headers: &HeaderMap) -> AppResult<String> {
    session_id(headers).ok_or_else(|| AppError::InvalidInput(format!("missing {} header", SESSION_HEADER)))
}

/// Latest snapshot from the refresher, or a fresh computation before the first one lands.
async fn stats(State(state): State<SharedState>) -> AppResult<Json<PollStats>> {
    if let Some(snapshot) = state.stats.read().await.clone() {
        return Ok(Json(snapshot));
    }

    info!("No stats snapshot yet, computing on demand");
    let fresh = compute_stats(state.store.as_ref()).await?;
    *state.stats.write().await = Some(fresh.clone());
    Ok(Json(fresh))
}

async fn conditions(State(state): State<SharedState>, Path(place): Path<String>) -> AppResult<Json<ComfortPanel>> {
    Ok(Json(state.conditions.build(&place).await?))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::conditions::tests::{speeds, FakeGeocoder, FakeWeather};
    use crate::testing::{numbered_polls, sedan_suv_poll, MemoryStore};
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use serde_json::Value;
    use tower::ServiceExt;

    pub(crate) fn test_state(store: Arc<MemoryStore>) -> SharedState {
        let conditions = ComfortPanelService::new(
            Arc::new(FakeGeocoder::default()),
            Arc::new(FakeWeather::default()),
            Arc::new(speeds(10.0, 60.0)),
        );
        AppState::new(store, conditions, Duration::from_millis(300))
    }

    pub(crate) async fn send(state: SharedState, request: Request<Body>) -> (StatusCode, Value) {
        let response = router(state).oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    pub(crate) fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn stats_are_computed_when_no_snapshot_exists() {
        let mut polls = numbered_polls(2, |i| format!("Prom limo {}", i));
        polls.push(sedan_suv_poll());
        let state = test_state(Arc::new(MemoryStore::with_polls(polls)));

        let (status, body) = send(state.clone(), get("/stats")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total_polls"], 3);
        assert_eq!(body["total_votes"], 10);
        assert!(state.stats.read().await.is_some());
    }

    #[tokio::test]
    async fn conditions_render_even_for_unknown_places() {
        let state = test_state(Arc::new(MemoryStore::default()));

        let (status, body) = send(state, get("/conditions/Nowhereville")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["coordinates"]["lat"], 0.0);
        assert_eq!(body["weather"]["status"], "ready");
        assert_eq!(body["weather"]["headline"]["value"], "62%");
        assert_eq!(body["traffic"]["tier"], "Heavy");
        assert!(body["location_notice"].is_string());
    }

    #[test]
    fn session_header_must_be_non_blank() {
        let mut headers = HeaderMap::new();
        assert!(require_session(&headers).is_err());
        headers.insert(SESSION_HEADER, "  ".parse().unwrap());
        assert!(session_id(&headers).is_none());
        headers.insert(SESSION_HEADER, "abc".parse().unwrap());
        assert_eq!(require_session(&headers).unwrap(), "abc");
    }
}
