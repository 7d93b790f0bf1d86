use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::db::PollStore;
use crate::error::AppResult;
use crate::models::PollFilter;
use crate::reference;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PollStats {
    pub total_polls: u64,
    pub total_votes: u64,
    pub total_categories: u64,
    pub top_category: Option<String>,
    pub top_category_name: Option<String>,
    pub top_category_count: u64,
    pub avg_votes_per_poll: u64,
    pub most_voted_option_votes: u64,
    pub polls_with_votes: u64,
    pub display: StatsDisplay,
    pub computed_at: DateTime<Utc>,
}

/// Compact counters for the stats bar.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatsDisplay {
    pub total_polls: String,
    pub total_votes: String,
    pub avg_votes_per_poll: String,
}

pub async fn compute_stats(store: &dyn PollStore) -> AppResult<PollStats> {
    let total_polls = store.count_polls(&PollFilter::All).await?;
    let summary = store.vote_summary().await?;
    let total_categories = store.count_categories().await?;
    let category_counts = store.category_counts().await?;

    // counts arrive sorted, but don't rely on it
    let top = category_counts
        .iter()
        .fold(None::<&(String, u64)>, |best, entry| match best {
            Some(b) if b.1 >= entry.1 => Some(b),
            _ => Some(entry),
        });

    let avg_votes_per_poll = if total_polls > 0 {
        (summary.total_votes as f64 / total_polls as f64).round() as u64
    } else {
        0
    };

    let top_category_name = top.map(|(slug, _)| {
        reference::category(slug)
            .map(|c| c.title.to_string())
            .unwrap_or_else(|| format_category_name(slug))
    });

    Ok(PollStats {
        total_polls,
        total_votes: summary.total_votes,
        total_categories,
        top_category: top.map(|(slug, _)| slug.clone()),
        top_category_name,
        top_category_count: top.map(|(_, n)| *n).unwrap_or(0),
        avg_votes_per_poll,
        most_voted_option_votes: summary.max_option_votes,
        polls_with_votes: summary.polls_with_votes,
        display: StatsDisplay {
            total_polls: format_count(total_polls),
            total_votes: format_count(summary.total_votes),
            avg_votes_per_poll: format_count(avg_votes_per_poll),
        },
        computed_at: Utc::now(),
    })
}

/// Compact counter text: "950", "1.2K", "2.4M+".
pub fn format_count(n: u64) -> String {
    if n >= 1_000_000 {
        format!("{:.1}M+", n as f64 / 1_000_000.0)
    } else if n >= 1_000 {
        format!("{:.1}K", n as f64 / 1_000.0)
    } else {
        n.to_string()
    }
}

/// "bachelor-parties" -> "Bachelor Parties"
pub fn format_category_name(slug: &str) -> String {
    slug.split('-')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
