//! Per-session voting on a single poll.
//!
//! A ballot moves `Unvoted -> Voting -> Voted`. Selecting an option bumps the
//! local tally right away; once the store confirms, the tally is replaced by the
//! store's own counts. If the store rejects the write the optimistic bump is
//! undone and the ballot lands in `Failed`, which accepts a new selection.

use std::collections::HashMap;
use std::time::Duration;

use log::{info, warn};
use serde::Serialize;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::db::PollStore;
use crate::error::{AppError, AppResult};
use crate::models::{OptionCount, Poll};
use crate::voting::plurality::calculate_results;
use crate::voting::PollResults;

pub const VOTE_FAILED_MESSAGE: &str = "Vote failed, try again.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BallotState {
    Unvoted,
    Voting { option_id: String },
    Voted { option_id: String },
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BallotEvent {
    Select(String),
    Confirmed,
    Rejected(String),
}

impl BallotState {
    pub fn accepts_selection(&self) -> bool {
        matches!(self, BallotState::Unvoted | BallotState::Failed { .. })
    }
}

pub fn transition(state: &BallotState, event: BallotEvent) -> AppResult<BallotState> {
    use BallotEvent::*;
    use BallotState::*;

    match (state, event) {
        (Unvoted | Failed { .. }, Select(option_id)) => Ok(Voting { option_id }),
        (Voting { option_id }, Confirmed) => Ok(Voted {
            option_id: option_id.clone(),
        }),
        (Voting { .. }, Rejected(reason)) => Ok(Failed { reason }),
        (Voting { .. }, Select(_)) => Err(AppError::VoteRejected("a vote is already in flight".to_string())),
        (Voted { .. }, _) => Err(AppError::VoteRejected("already voted on this poll".to_string())),
        (Unvoted | Failed { .. }, Confirmed | Rejected(_)) => {
            Err(AppError::InvalidInput("no vote in flight".to_string()))
        }
    }
}

#[derive(Debug, Clone)]
pub struct Ballot {
    poll: Poll,
    state: BallotState,
    // counts from before the optimistic bump
    rollback: Option<Vec<u64>>,
}

impl Ballot {
    pub fn new(poll: Poll) -> Self {
        Self {
            poll,
            state: BallotState::Unvoted,
            rollback: None,
        }
    }

    pub fn state(&self) -> &BallotState {
        &self.state
    }

    pub fn results(&self) -> PollResults {
        calculate_results(&self.poll)
    }

    pub fn chosen_option(&self) -> Option<&str> {
        match &self.state {
            BallotState::Voting { option_id } | BallotState::Voted { option_id } => Some(option_id),
            _ => None,
        }
    }

    /// Select an option and apply the optimistic +1.
    pub fn begin(&mut self, option_id: &str) -> AppResult<()> {
        if self.poll.option(option_id).is_none() {
            return Err(AppError::NotFound(format!(
                "option {} in poll {}",
                option_id, self.poll.id
            )));
        }

        self.state = transition(&self.state, BallotEvent::Select(option_id.to_string()))?;
        self.rollback = Some(self.poll.options.iter().map(|o| o.vote_count).collect());

        if let Some(option) = self.poll.options.iter_mut().find(|o| o.id == option_id) {
            option.vote_count += 1;
        }
        Ok(())
    }

    /// Settle the in-flight vote. On success the re-read counts, when
    /// available, overwrite the optimistic tally.
    pub fn complete(&mut self, outcome: AppResult<()>, reread: Option<Vec<OptionCount>>) -> AppResult<&BallotState> {
        match outcome {
            Ok(()) => {
                self.state = transition(&self.state, BallotEvent::Confirmed)?;
                self.rollback = None;
                if let Some(counts) = reread {
                    self.apply_counts(&counts);
                }
            }
            Err(e) => {
                warn!("Vote on poll {} failed, rolling back: {}", self.poll.id, e);
                self.state = transition(&self.state, BallotEvent::Rejected(VOTE_FAILED_MESSAGE.to_string()))?;
                if let Some(previous) = self.rollback.take() {
                    self.poll = self.poll.clone().with_counts(&previous);
                }
            }
        }
        Ok(&self.state)
    }

    fn apply_counts(&mut self, counts: &[OptionCount]) {
        for option in self.poll.options.iter_mut() {
            if let Some(fresh) = counts.iter().find(|c| c.option_id == option.id) {
                option.vote_count = fresh.vote_count;
            }
        }
    }
}

/// One store increment, then a re-read of the poll's counts when it succeeds.
pub async fn write_vote(
    store: &dyn PollStore,
    poll_id: &str,
    option_id: &str,
) -> (AppResult<()>, Option<Vec<OptionCount>>) {
    info!("Recording vote: poll_id={}, option_id={}", poll_id, option_id);
    let outcome = store.increment_vote(option_id).await;
    let reread = match outcome {
        Ok(()) => reread_counts(store, poll_id).await,
        Err(_) => None,
    };
    (outcome, reread)
}

async fn reread_counts(store: &dyn PollStore, poll_id: &str) -> Option<Vec<OptionCount>> {
    match store.option_counts(poll_id).await {
        Ok(counts) => Some(counts),
        Err(e) => {
            // keep the optimistic tally
            warn!("Could not re-read counts for poll {}: {}", poll_id, e);
            None
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct VoteOutcome {
    pub state: BallotState,
    pub chosen_option: Option<String>,
    pub results: PollResults,
    pub error: Option<String>,
}

impl VoteOutcome {
    fn from_ballot(ballot: &Ballot) -> Self {
        let error = match ballot.state() {
            BallotState::Failed { reason } => Some(reason.clone()),
            _ => None,
        };
        Self {
            state: ballot.state().clone(),
            chosen_option: ballot.chosen_option().map(str::to_string),
            results: ballot.results(),
            error,
        }
    }
}

struct TrackedBallot {
    ballot: Ballot,
    last_seen: Instant,
}

/// Ballots keyed by (session id, poll id). Stands in for the browser's
/// "has voted" flag, so it offers the same guarantee: one vote per session
/// for as long as the session stays active.
#[derive(Default)]
pub struct SessionBallots {
    ballots: Mutex<HashMap<(String, String), TrackedBallot>>,
}

impl SessionBallots {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn state(&self, session_id: &str, poll_id: &str) -> BallotState {
        self.ballots
            .lock()
            .await
            .get(&(session_id.to_string(), poll_id.to_string()))
            .map(|tracked| tracked.ballot.state().clone())
            .unwrap_or(BallotState::Unvoted)
    }

    pub async fn submit_vote(
        &self,
        store: &dyn PollStore,
        session_id: &str,
        poll_id: &str,
        option_id: &str,
    ) -> AppResult<VoteOutcome> {
        let key = (session_id.to_string(), poll_id.to_string());

        let known = self.ballots.lock().await.contains_key(&key);
        if !known {
            let poll = store.get_poll(poll_id).await?;
            self.ballots
                .lock()
                .await
                .entry(key.clone())
                .or_insert_with(|| TrackedBallot {
                    ballot: Ballot::new(poll),
                    last_seen: Instant::now(),
                });
        }

        {
            let mut ballots = self.ballots.lock().await;
            let tracked = ballots
                .get_mut(&key)
                .ok_or_else(|| AppError::NotFound(format!("poll {}", poll_id)))?;
            tracked.last_seen = Instant::now();
            tracked.ballot.begin(option_id)?;
        }

        let (outcome, reread) = write_vote(store, poll_id, option_id).await;

        let mut ballots = self.ballots.lock().await;
        let tracked = ballots
            .get_mut(&key)
            .ok_or_else(|| AppError::NotFound(format!("poll {}", poll_id)))?;
        tracked.last_seen = Instant::now();
        tracked.ballot.complete(outcome, reread)?;
        Ok(VoteOutcome::from_ballot(&tracked.ballot))
    }

    /// Forgets ballots untouched for `max_idle`. A vote still in flight is kept.
    pub async fn evict_idle(&self, max_idle: Duration) -> usize {
        let mut ballots = self.ballots.lock().await;
        let before = ballots.len();
        ballots.retain(|_, tracked| {
            matches!(tracked.ballot.state(), BallotState::Voting { .. }) || tracked.last_seen.elapsed() < max_idle
        });
        before - ballots.len()
    }

    pub async fn active(&self) -> usize {
        self.ballots.lock().await.len()
    }
}
