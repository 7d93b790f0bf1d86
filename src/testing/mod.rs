use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;

use crate::db::{PollStore, VoteSummary};
use crate::error::{AppError, AppResult};
use crate::models::{OptionCount, Poll, PollFilter, PollOption};

/// "Best vehicle?" with Sedan=3 and SUV=7.
pub fn sedan_suv_poll() -> Poll {
    Poll {
        id: "best-vehicle".to_string(),
        question: "Best vehicle?".to_string(),
        category_slug: Some("fleet".to_string()),
        category_name: Some("Fleet".to_string()),
        tags: Vec::new(),
        options: vec![
            PollOption { id: "sedan".to_string(), label: "Sedan".to_string(), vote_count: 3, position: 0 },
            PollOption { id: "suv".to_string(), label: "SUV".to_string(), vote_count: 7, position: 1 },
        ],
        created_at: Utc::now(),
    }
}

pub fn numbered_polls(n: usize, question: impl Fn(usize) -> String) -> Vec<Poll> {
    (0..n)
        .map(|i| {
            let mut poll = Poll::new(question(i), Some("prom".to_string()), Vec::new(), vec!["Yes".into(), "No".into()]);
            poll.id = format!("poll-{}", i);
            poll
        })
        .collect()
}

/// In-memory `PollStore` that counts calls and can be told to fail.
#[derive(Default)]
pub struct MemoryStore {
    polls: Mutex<Vec<Poll>>,
    pub increments: AtomicUsize,
    pub fetches: AtomicUsize,
    pub counts: AtomicUsize,
    pub fail_increments: AtomicBool,
    pub fail_fetches: AtomicBool,
    pub fail_rereads: AtomicBool,
    pub fetched_filters: Mutex<Vec<PollFilter>>,
}

impl MemoryStore {
    pub fn with_polls(polls: Vec<Poll>) -> Self {
        Self {
            polls: Mutex::new(polls),
            ..Default::default()
        }
    }

    pub fn calls(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }

    pub fn votes_for(&self, option_id: &str) -> Option<u64> {
        self.polls
            .lock()
            .unwrap()
            .iter()
            .flat_map(|p| p.options.iter())
            .find(|o| o.id == option_id)
            .map(|o| o.vote_count)
    }

    fn matching(&self, filter: &PollFilter) -> Vec<Poll> {
        self.polls
            .lock()
            .unwrap()
            .iter()
            .filter(|p| !p.question.to_lowercase().starts_with("your opinion on"))
            .filter(|p| match filter {
                PollFilter::All => true,
                PollFilter::QuestionContains(q) => p.question.to_lowercase().contains(&q.trim().to_lowercase()),
                PollFilter::CategoryContains(c) => p
                    .category_slug
                    .as_deref()
                    .unwrap_or("")
                    .to_lowercase()
                    .contains(&c.trim().to_lowercase()),
                PollFilter::Tag(t) => p.tags.contains(&t.trim().to_lowercase()),
            })
            .cloned()
            .collect()
    }
}

#[async_trait]
impl PollStore for MemoryStore {
    async fn increment_vote(&self, option_id: &str) -> AppResult<()> {
        self.increments.fetch_add(1, Ordering::SeqCst);
        if self.fail_increments.load(Ordering::SeqCst) {
            return Err(AppError::IncompleteData("store offline".to_string()));
        }
        let mut polls = self.polls.lock().unwrap();
        let option = polls
            .iter_mut()
            .flat_map(|p| p.options.iter_mut())
            .find(|o| o.id == option_id)
            .ok_or_else(|| AppError::NotFound(option_id.to_string()))?;
        option.vote_count += 1;
        Ok(())
    }

    async fn option_counts(&self, poll_id: &str) -> AppResult<Vec<OptionCount>> {
        if self.fail_rereads.load(Ordering::SeqCst) {
            return Err(AppError::IncompleteData("re-read failed".to_string()));
        }
        self.polls
            .lock()
            .unwrap()
            .iter()
            .find(|p| p.id == poll_id)
            .map(|p| p.options.iter().map(PollOption::to_count).collect())
            .ok_or_else(|| AppError::NotFound(poll_id.to_string()))
    }

    async fn count_polls(&self, filter: &PollFilter) -> AppResult<u64> {
        self.counts.fetch_add(1, Ordering::SeqCst);
        if self.fail_fetches.load(Ordering::SeqCst) {
            return Err(AppError::IncompleteData("count failed".to_string()));
        }
        Ok(self.matching(filter).len() as u64)
    }

    async fn fetch_polls(&self, filter: &PollFilter, offset: u64, limit: u64) -> AppResult<Vec<Poll>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.fetched_filters.lock().unwrap().push(filter.clone());
        if self.fail_fetches.load(Ordering::SeqCst) {
            return Err(AppError::IncompleteData("fetch failed".to_string()));
        }
        Ok(self
            .matching(filter)
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect())
    }

    async fn get_poll(&self, poll_id: &str) -> AppResult<Poll> {
        self.polls
            .lock()
            .unwrap()
            .iter()
            .find(|p| p.id == poll_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(poll_id.to_string()))
    }

    async fn category_counts(&self) -> AppResult<Vec<(String, u64)>> {
        let mut counts: Vec<(String, u64)> = Vec::new();
        for poll in self.matching(&PollFilter::All) {
            if let Some(slug) = poll.category_slug {
                match counts.iter_mut().find(|(s, _)| *s == slug) {
                    Some((_, n)) => *n += 1,
                    None => counts.push((slug, 1)),
                }
            }
        }
        counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        Ok(counts)
    }

    async fn count_categories(&self) -> AppResult<u64> {
        Ok(self.category_counts().await?.len() as u64)
    }

    async fn vote_summary(&self) -> AppResult<VoteSummary> {
        let polls = self.matching(&PollFilter::All);
        let options = polls.iter().flat_map(|p| p.options.iter());
        Ok(VoteSummary {
            total_votes: options.clone().map(|o| o.vote_count).sum(),
            max_option_votes: options.map(|o| o.vote_count).max().unwrap_or(0),
            polls_with_votes: polls.iter().filter(|p| p.total_votes() > 0).count() as u64,
        })
    }
}
