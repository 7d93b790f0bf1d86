//! One-off import of polls from a JSON file into an empty database.
//!
//! ```json
//! [{ "question": "Best vehicle?", "category": "fleet", "tags": ["suv"],
//!    "options": ["Sedan", "SUV"], "votes": [3, 7] }]
//! ```

use std::path::Path;

use log::info;
use serde::Deserialize;

use crate::db::Database;
use crate::error::{AppError, AppResult};
use crate::models::Poll;

#[derive(Debug, Deserialize)]
pub struct SeedPoll {
    pub question: String,
    pub category: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub options: Vec<String>,
    #[serde(default)]
    pub votes: Vec<u64>,
}

impl SeedPoll {
    fn into_poll(self) -> AppResult<Poll> {
        if self.question.trim().is_empty() || self.options.is_empty() {
            return Err(AppError::Seed(format!("poll {:?} needs a question and options", self.question)));
        }
        if self.votes.len() > self.options.len() {
            return Err(AppError::Seed(format!("poll {:?} has more vote counts than options", self.question)));
        }
        let category = self.category.map(|c| c.trim().to_lowercase()).filter(|c| !c.is_empty());
        Ok(Poll::new(self.question, category, self.tags, self.options).with_counts(&self.votes))
    }
}

pub fn parse_seed(raw: &str) -> AppResult<Vec<Poll>> {
    let entries: Vec<SeedPoll> = serde_json::from_str(raw).map_err(|e| AppError::Seed(e.to_string()))?;
    entries.into_iter().map(SeedPoll::into_poll).collect()
}

/// Imports the file only when the database holds no polls yet. Returns how many were added.
pub async fn import_seed(db: &Database, path: &Path) -> AppResult<usize> {
    if !db.is_empty().await? {
        info!("Database already has polls, skipping seed {}", path.display());
        return Ok(0);
    }

    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| AppError::Seed(format!("{}: {}", path.display(), e)))?;
    let polls = parse_seed(&raw)?;

    for poll in &polls {
        db.create_poll(poll).await?;
    }
    info!("Seeded {} polls from {}", polls.len(), path.display());
    Ok(polls.len())
}
