use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Poll {
    pub id: String,
    pub question: String,
    pub category_slug: Option<String>,
    pub category_name: Option<String>,
    pub tags: Vec<String>,
    pub options: Vec<PollOption>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollOption {
    pub id: String,
    pub label: String,
    pub vote_count: u64,
    pub position: i64,
}

/// Authoritative count for one option, as re-read from the store after a vote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionCount {
    pub option_id: String,
    pub vote_count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollFilter {
    All,
    QuestionContains(String),
    CategoryContains(String),
    Tag(String),
}

impl Poll {
    pub fn new(
        question: String,
        category_slug: Option<String>,
        tags: Vec<String>,
        labels: Vec<String>,
    ) -> Self {
        let options = labels
            .into_iter()
            .enumerate()
            .map(|(i, label)| PollOption {
                id: Uuid::new_v4().to_string(),
                label,
                vote_count: 0,
                position: i as i64,
            })
            .collect();

        Self {
            id: Uuid::new_v4().to_string(),
            question,
            category_slug,
            category_name: None,
            tags: tags.into_iter().map(|t| t.trim().to_lowercase()).collect(),
            options,
            created_at: Utc::now(),
        }
    }

    pub fn total_votes(&self) -> u64 {
        self.options.iter().map(|o| o.vote_count).sum()
    }

    pub fn option(&self, option_id: &str) -> Option<&PollOption> {
        self.options.iter().find(|o| o.id == option_id)
    }

    pub fn with_counts(mut self, counts: &[u64]) -> Self {
        for (option, count) in self.options.iter_mut().zip(counts) {
            option.vote_count = *count;
        }
        self
    }
}

impl PollOption {
    pub fn to_count(&self) -> OptionCount {
        OptionCount {
            option_id: self.id.clone(),
            vote_count: self.vote_count,
        }
    }
}
