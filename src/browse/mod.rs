//! Finding polls: free-text search, category, tag and location browsing.

pub mod debounce;

use lazy_static::lazy_static;
use log::{debug, warn};
use regex::Regex;
use serde::Serialize;

use crate::db::PollStore;
use crate::error::{AppError, AppResult};
use crate::models::{Poll, PollFilter};
use crate::reference::{self, PlaceMatch};

pub const PAGE_SIZE: u64 = 50;
pub const SEARCH_CAP: usize = 12;
pub const MIN_QUERY_LEN: usize = 2;

lazy_static! {
    static ref WHITESPACE: Regex = Regex::new(r"\s+").expect("whitespace pattern is valid");
}

/// Accumulates pages of polls for one filter.
#[derive(Debug, Clone, Serialize)]
pub struct Pager {
    #[serde(skip)]
    filter: PollFilter,
    pub polls: Vec<Poll>,
    pub offset: u64,
    pub has_more: bool,
    pub total: Option<u64>,
    pub last_error: bool,
}

impl Pager {
    fn new(filter: PollFilter, offset: u64) -> Self {
        Self {
            filter,
            polls: Vec::new(),
            offset,
            has_more: true,
            total: None,
            last_error: false,
        }
    }

    /// Counts matching polls once, then loads the first page.
    pub async fn open(store: &dyn PollStore, filter: PollFilter) -> Self {
        Self::starting_at(store, filter, 0).await
    }

    /// Same as `open` but the first page starts at `offset`.
    pub async fn starting_at(store: &dyn PollStore, filter: PollFilter, offset: u64) -> Self {
        let total = match store.count_polls(&filter).await {
            Ok(total) => Some(total),
            Err(e) => {
                warn!("Could not count polls for {:?}: {}", filter, e);
                None
            }
        };
        Self::load_from(store, filter, offset, total).await
    }

    /// Picks up a listing whose total the caller already knows, skipping the count query.
    pub async fn resume(store: &dyn PollStore, filter: PollFilter, offset: u64, total: u64) -> Self {
        Self::load_from(store, filter, offset, Some(total)).await
    }

    async fn load_from(store: &dyn PollStore, filter: PollFilter, offset: u64, total: Option<u64>) -> Self {
        let mut pager = Self::new(filter, offset);
        pager.total = total;
        if total.is_some_and(|total| offset >= total) {
            pager.has_more = false;
            return pager;
        }

        pager.load_more(store).await;
        pager
    }

    /// Fetches the next page and appends it. Returns how many polls were added.
    /// On failure the accumulated list is left as it was and `last_error` is set.
    pub async fn load_more(&mut self, store: &dyn PollStore) -> usize {
        if !self.has_more {
            return 0;
        }

        let page = match store.fetch_polls(&self.filter, self.offset, PAGE_SIZE).await {
            Ok(page) => page,
            Err(e) => {
                warn!("Failed to load polls at offset {}: {}", self.offset, e);
                self.last_error = true;
                return 0;
            }
        };

        let added = page.len();
        self.last_error = false;
        self.offset += added as u64;
        self.polls.extend(page);

        let reached_total = self.total.map_or(false, |total| self.offset >= total);
        self.has_more = (added as u64) == PAGE_SIZE && !reached_total;
        debug!("Loaded {} polls, offset now {}, has_more={}", added, self.offset, self.has_more);
        added
    }
}

pub async fn browse_by_category(store: &dyn PollStore, slug: &str) -> AppResult<Pager> {
    let slug = slug.trim();
    if slug.is_empty() {
        return Err(AppError::InvalidInput("category must not be empty".to_string()));
    }
    Ok(Pager::open(store, PollFilter::CategoryContains(slug.to_lowercase())).await)
}

pub async fn browse_by_tag(store: &dyn PollStore, tag: &str) -> AppResult<Pager> {
    let tag = tag.trim();
    if tag.is_empty() {
        return Err(AppError::InvalidInput("tag must not be empty".to_string()));
    }
    Ok(Pager::open(store, PollFilter::Tag(tag.to_lowercase())).await)
}

#[derive(Debug, Serialize)]
#[serde(tag = "view", rename_all = "snake_case")]
pub enum LocationView {
    Cities { state: &'static str, cities: Vec<&'static str> },
    Polls { city: String, page: Pager },
}

/// Lists a state's cities, or the polls mentioning a chosen city.
pub async fn browse_by_location(
    store: &dyn PollStore,
    state: &str,
    city: Option<&str>,
) -> AppResult<LocationView> {
    let known = reference::state(state).ok_or_else(|| AppError::NotFound(format!("state {}", state.trim())))?;

    match city.map(str::trim).filter(|c| !c.is_empty()) {
        None => Ok(LocationView::Cities {
            state: known.name,
            cities: reference::cities_in(known.name).unwrap_or_default(),
        }),
        Some(city) => {
            let page = Pager::open(store, PollFilter::QuestionContains(city.to_string())).await;
            Ok(LocationView::Polls {
                city: city.to_string(),
                page,
            })
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SearchResults {
    pub query: String,
    pub polls: Vec<Poll>,
    pub total: u64,
    pub places: Vec<PlaceMatch>,
}

/// Collapses runs of whitespace and trims.
pub fn normalize_query(raw: &str) -> String {
    WHITESPACE.replace_all(raw.trim(), " ").into_owned()
}

pub fn is_searchable(query: &str) -> bool {
    query.chars().count() >= MIN_QUERY_LEN
}

/// Polls whose question contains the query plus matching states and cities.
/// Queries shorter than `MIN_QUERY_LEN` return empty results without touching the store.
pub async fn search(store: &dyn PollStore, raw_query: &str) -> AppResult<SearchResults> {
    let query = normalize_query(raw_query);
    if !is_searchable(&query) {
        return Ok(SearchResults {
            query,
            ..Default::default()
        });
    }

    let filter = PollFilter::QuestionContains(query.clone());
    let total = store.count_polls(&filter).await?;
    let polls = store.fetch_polls(&filter, 0, SEARCH_CAP as u64).await?;
    let places = reference::match_places(&query, SEARCH_CAP);

    Ok(SearchResults {
        query,
        polls,
        total,
        places,
    })
}
