use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::Json;
use log::info;
use serde::{Deserialize, Serialize};

use crate::browse::PAGE_SIZE;
use crate::error::{AppError, AppResult};
use crate::models::PollFilter;
use crate::voting::ballot::{BallotState, VoteOutcome};
use crate::voting::plurality::{calculate_results, rank_results};
use crate::voting::PollResults;

use super::{require_session, session_id, SharedState};

#[derive(Debug, Deserialize)]
pub struct VoteRequest {
    pub option_id: String,
}

/// Results plus where the caller's session stands on this poll.
#[derive(Debug, Serialize)]
pub struct ResultsResponse {
    #[serde(flatten)]
    pub results: PollResults,
    pub ballot: BallotState,
    pub can_vote: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct ResultsParams {
    pub category: Option<String>,
}

pub async fn cast_vote(
    State(state): State<SharedState>,
    Path(poll_id): Path<String>,
    headers: HeaderMap,
    Json(request): Json<VoteRequest>,
) -> AppResult<Json<VoteOutcome>> {
    let session = require_session(&headers)?;
    let option_id = request.option_id.trim();
    if option_id.is_empty() {
        return Err(AppError::InvalidInput("option_id must not be empty".to_string()));
    }

    info!("Vote request: session={}, poll_id={}, option_id={}", session, poll_id, option_id);
    let outcome = state
        .ballots
        .submit_vote(state.store.as_ref(), &session, &poll_id, option_id)
        .await?;
    Ok(Json(outcome))
}

pub async fn poll_results(
    State(state): State<SharedState>,
    Path(poll_id): Path<String>,
    headers: HeaderMap,
) -> AppResult<Json<ResultsResponse>> {
    let poll = state.store.get_poll(&poll_id).await?;
    let ballot = match session_id(&headers) {
        Some(session) => state.ballots.state(&session, &poll_id).await,
        None => BallotState::Unvoted,
    };

    Ok(Json(ResultsResponse {
        results: calculate_results(&poll),
        can_vote: ballot.accepts_selection(),
        ballot,
    }))
}

/// First page of polls, optionally narrowed to a category, most-voted first.
pub async fn ranked_results(
    State(state): State<SharedState>,
    Query(params): Query<ResultsParams>,
) -> AppResult<Json<Vec<PollResults>>> {
    let filter = match params.category.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
        Some(category) => PollFilter::CategoryContains(category.to_lowercase()),
        None => PollFilter::All,
    };

    let polls = state.store.fetch_polls(&filter, 0, PAGE_SIZE).await?;
    let results = polls.iter().map(calculate_results).collect();
    Ok(Json(rank_results(results)))
}
