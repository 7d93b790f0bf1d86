use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::browse::{self, LocationView, Pager, SearchResults};
use crate::error::{AppError, AppResult};
use crate::models::{Poll, PollFilter};
use crate::reference;

use super::{session_id, SharedState};

#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub q: String,
}

/// `total` is the count from the first page; passing it back skips the recount.
#[derive(Debug, Default, Deserialize)]
pub struct PageParams {
    pub offset: Option<u64>,
    pub total: Option<u64>,
}

/// One page of a browse listing. `next_offset` feeds the following "load more".
#[derive(Debug, Serialize)]
pub struct PageResponse {
    pub polls: Vec<Poll>,
    pub next_offset: u64,
    pub has_more: bool,
    pub total: Option<u64>,
    pub error: Option<String>,
}

impl From<Pager> for PageResponse {
    fn from(pager: Pager) -> Self {
        let error = pager
            .last_error
            .then(|| "Could not load more polls, try again.".to_string());
        Self {
            polls: pager.polls,
            next_offset: pager.offset,
            has_more: pager.has_more,
            total: pager.total,
            error,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StateSummary {
    pub name: &'static str,
    pub abbreviation: &'static str,
    pub city_count: usize,
}

#[derive(Debug, Serialize)]
pub struct CitiesResponse {
    pub state: &'static str,
    pub cities: Vec<&'static str>,
}

/// With a session header the query goes through that session's debounce.
pub async fn search_polls(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Query(params): Query<SearchParams>,
) -> AppResult<Json<SearchResults>> {
    match session_id(&headers) {
        Some(session) => {
            let latest = state.searches.type_query(&session, &params.q).await;
            Ok(Json(latest.unwrap_or_else(|| SearchResults {
                query: browse::normalize_query(&params.q),
                ..Default::default()
            })))
        }
        None => Ok(Json(browse::search(state.store.as_ref(), &params.q).await?)),
    }
}

async fn page(state: &SharedState, filter: PollFilter, params: PageParams) -> PageResponse {
    let store = state.store.as_ref();
    let offset = params.offset.unwrap_or(0);
    let pager = match params.total {
        Some(total) => Pager::resume(store, filter, offset, total).await,
        None => Pager::starting_at(store, filter, offset).await,
    };
    pager.into()
}

pub async fn polls_by_category(
    State(state): State<SharedState>,
    Path(slug): Path<String>,
    Query(params): Query<PageParams>,
) -> AppResult<Json<PageResponse>> {
    match params.offset {
        None | Some(0) => Ok(Json(browse::browse_by_category(state.store.as_ref(), &slug).await?.into())),
        Some(_) => Ok(Json(page(&state, PollFilter::CategoryContains(slug.trim().to_lowercase()), params).await)),
    }
}

pub async fn polls_by_tag(
    State(state): State<SharedState>,
    Path(tag): Path<String>,
    Query(params): Query<PageParams>,
) -> AppResult<Json<PageResponse>> {
    match params.offset {
        None | Some(0) => Ok(Json(browse::browse_by_tag(state.store.as_ref(), &tag).await?.into())),
        Some(_) => Ok(Json(page(&state, PollFilter::Tag(tag.trim().to_lowercase()), params).await)),
    }
}

pub async fn list_states() -> Json<Vec<StateSummary>> {
    Json(
        reference::states()
            .iter()
            .map(|s| StateSummary {
                name: s.name,
                abbreviation: s.abbreviation,
                city_count: s.cities.len(),
            })
            .collect(),
    )
}

pub async fn state_cities(
    State(state): State<SharedState>,
    Path(state_name): Path<String>,
) -> AppResult<Json<CitiesResponse>> {
    match browse::browse_by_location(state.store.as_ref(), &state_name, None).await? {
        LocationView::Cities { state, cities } => Ok(Json(CitiesResponse { state, cities })),
        LocationView::Polls { .. } => Err(AppError::InvalidInput("expected a city listing".to_string())),
    }
}

pub async fn city_polls(
    State(state): State<SharedState>,
    Path((state_name, city)): Path<(String, String)>,
    Query(params): Query<PageParams>,
) -> AppResult<Json<PageResponse>> {
    if reference::state(&state_name).is_none() {
        return Err(AppError::NotFound(format!("state {}", state_name.trim())));
    }

    match params.offset {
        None | Some(0) => match browse::browse_by_location(state.store.as_ref(), &state_name, Some(&city)).await? {
            LocationView::Polls { page, .. } => Ok(Json(page.into())),
            LocationView::Cities { .. } => Err(AppError::InvalidInput("city must not be empty".to_string())),
        },
        Some(_) => Ok(Json(page(&state, PollFilter::QuestionContains(city.trim().to_string()), params).await)),
    }
}
