use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, info};
use sqlx::{
    migrate::MigrateDatabase,
    sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow},
    Row, Sqlite,
};

use crate::error::{AppError, AppResult};
use crate::models::{OptionCount, Poll, PollFilter, PollOption};

pub mod seed;

// Seeded placeholder questions that never show up in browse or search.
const PLACEHOLDER_PREFIX: &str = "Your opinion on%";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VoteSummary {
    pub total_votes: u64,
    pub max_option_votes: u64,
    pub polls_with_votes: u64,
}

/// Operations the poll features need from the backing store.
#[async_trait]
pub trait PollStore: Send + Sync {
    /// Atomically add one vote to an option.
    async fn increment_vote(&self, option_id: &str) -> AppResult<()>;

    /// Current counts for every option of a poll, in display order.
    async fn option_counts(&self, poll_id: &str) -> AppResult<Vec<OptionCount>>;

    async fn count_polls(&self, filter: &PollFilter) -> AppResult<u64>;

    async fn fetch_polls(&self, filter: &PollFilter, offset: u64, limit: u64) -> AppResult<Vec<Poll>>;

    async fn get_poll(&self, poll_id: &str) -> AppResult<Poll>;

    /// Number of polls per category slug.
    async fn category_counts(&self) -> AppResult<Vec<(String, u64)>>;

    async fn count_categories(&self) -> AppResult<u64>;

    async fn vote_summary(&self) -> AppResult<VoteSummary>;
}

pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub async fn new(db_url: &str) -> AppResult<Self> {
        // Create database if it doesn't exist
        if !Sqlite::database_exists(db_url).await.unwrap_or(false) {
            info!("Creating database at {}", db_url);
            Sqlite::create_database(db_url).await?;
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(db_url)
            .await?;

        Self::from_pool(pool).await
    }

    pub async fn from_pool(pool: SqlitePool) -> AppResult<Self> {
        Self::init_schema(&pool).await?;
        Ok(Self { pool })
    }

    /// True when no polls at all are stored, placeholders included.
    pub async fn is_empty(&self) -> AppResult<bool> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM polls").fetch_one(&self.pool).await?;
        Ok(row.try_get::<i64, _>("n")? == 0)
    }

    async fn init_schema(pool: &SqlitePool) -> AppResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS poll_categories (
                slug TEXT PRIMARY KEY,
                name TEXT NOT NULL
            );
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS polls (
                id TEXT PRIMARY KEY,
                question TEXT NOT NULL,
                category_slug TEXT,
                created_at TEXT NOT NULL
            );
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS poll_options (
                id TEXT PRIMARY KEY,
                poll_id TEXT NOT NULL,
                label TEXT NOT NULL,
                vote_count INTEGER NOT NULL DEFAULT 0 CHECK (vote_count >= 0),
                position INTEGER NOT NULL,
                FOREIGN KEY (poll_id) REFERENCES polls(id) ON DELETE CASCADE
            );
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS poll_tags (
                poll_id TEXT NOT NULL,
                tag TEXT NOT NULL,
                PRIMARY KEY (poll_id, tag),
                FOREIGN KEY (poll_id) REFERENCES polls(id) ON DELETE CASCADE
            );
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_poll_options_poll ON poll_options (poll_id, position)")
            .execute(pool)
            .await?;

        Ok(())
    }

    pub async fn create_category(&self, slug: &str, name: &str) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO poll_categories (slug, name) VALUES (?, ?)
            ON CONFLICT(slug) DO UPDATE SET name = excluded.name
            "#,
        )
        .bind(slug)
        .bind(name)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Insert a poll with its options and tags. Polls are authored out-of-band;
    /// this is used by seeding and tests.
    pub async fn create_poll(&self, poll: &Poll) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("INSERT INTO polls (id, question, category_slug, created_at) VALUES (?, ?, ?, ?)")
            .bind(&poll.id)
            .bind(&poll.question)
            .bind(&poll.category_slug)
            .bind(poll.created_at)
            .execute(&mut *tx)
            .await?;

        for option in &poll.options {
            sqlx::query(
                r#"
                INSERT INTO poll_options (id, poll_id, label, vote_count, position)
                VALUES (?, ?, ?, ?, ?)
                "#,
            )
            .bind(&option.id)
            .bind(&poll.id)
            .bind(&option.label)
            .bind(option.vote_count as i64)
            .bind(option.position)
            .execute(&mut *tx)
            .await?;
        }

        for tag in &poll.tags {
            sqlx::query("INSERT OR IGNORE INTO poll_tags (poll_id, tag) VALUES (?, ?)")
                .bind(&poll.id)
                .bind(tag)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn load_options(&self, poll_id: &str) -> AppResult<Vec<PollOption>> {
        let options = sqlx::query(
            r#"
            SELECT id, label, vote_count, position
            FROM poll_options
            WHERE poll_id = ?
            ORDER BY position, id
            "#,
        )
        .bind(poll_id)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(|row| PollOption {
            id: row.get::<String, _>("id"),
            label: row.get::<String, _>("label"),
            vote_count: to_count(row.get::<i64, _>("vote_count")),
            position: row.get::<i64, _>("position"),
        })
        .collect();

        Ok(options)
    }

    async fn load_tags(&self, poll_id: &str) -> AppResult<Vec<String>> {
        let tags = sqlx::query("SELECT tag FROM poll_tags WHERE poll_id = ? ORDER BY tag")
            .bind(poll_id)
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(|row| row.get::<String, _>("tag"))
            .collect();
        Ok(tags)
    }

    async fn hydrate(&self, row: SqliteRow) -> AppResult<Poll> {
        let id = row.get::<String, _>("id");
        let created_at: DateTime<Utc> = row.try_get("created_at")?;
        let options = self.load_options(&id).await?;
        let tags = self.load_tags(&id).await?;

        Ok(Poll {
            question: row.get::<String, _>("question"),
            category_slug: row.get::<Option<String>, _>("category_slug"),
            category_name: row.get::<Option<String>, _>("category_name"),
            tags,
            options,
            created_at,
            id,
        })
    }
}

#[async_trait]
impl PollStore for Database {
    async fn increment_vote(&self, option_id: &str) -> AppResult<()> {
        let result = sqlx::query("UPDATE poll_options SET vote_count = vote_count + 1 WHERE id = ?")
            .bind(option_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("poll option {}", option_id)));
        }
        Ok(())
    }

    async fn option_counts(&self, poll_id: &str) -> AppResult<Vec<OptionCount>> {
        let counts: Vec<OptionCount> = self
            .load_options(poll_id)
            .await?
            .iter()
            .map(PollOption::to_count)
            .collect();

        if counts.is_empty() {
            return Err(AppError::NotFound(format!("poll {}", poll_id)));
        }
        Ok(counts)
    }

    async fn count_polls(&self, filter: &PollFilter) -> AppResult<u64> {
        let (clause, param) = filter_clause(filter);
        let sql = format!("SELECT COUNT(*) AS n FROM polls p WHERE {}", clause);

        let mut query = sqlx::query(&sql).bind(PLACEHOLDER_PREFIX);
        if let Some(param) = param {
            query = query.bind(param);
        }
        let row = query.fetch_one(&self.pool).await?;
        Ok(to_count(row.get::<i64, _>("n")))
    }

    async fn fetch_polls(&self, filter: &PollFilter, offset: u64, limit: u64) -> AppResult<Vec<Poll>> {
        let (clause, param) = filter_clause(filter);
        let sql = format!(
            r#"
            SELECT p.id, p.question, p.category_slug, p.created_at, c.name AS category_name
            FROM polls p
            LEFT JOIN poll_categories c ON c.slug = p.category_slug
            WHERE {}
            ORDER BY p.created_at, p.id
            LIMIT ? OFFSET ?
            "#,
            clause
        );

        let mut query = sqlx::query(&sql).bind(PLACEHOLDER_PREFIX);
        if let Some(param) = param {
            query = query.bind(param);
        }
        let rows = query
            .bind(limit as i64)
            .bind(offset as i64)
            .fetch_all(&self.pool)
            .await?;

        debug!("Fetched {} poll row(s) for {:?} at offset {}", rows.len(), filter, offset);

        let mut polls = Vec::with_capacity(rows.len());
        for row in rows {
            polls.push(self.hydrate(row).await?);
        }
        Ok(polls)
    }

    async fn get_poll(&self, poll_id: &str) -> AppResult<Poll> {
        let row = sqlx::query(
            r#"
            SELECT p.id, p.question, p.category_slug, p.created_at, c.name AS category_name
            FROM polls p
            LEFT JOIN poll_categories c ON c.slug = p.category_slug
            WHERE p.id = ?
            "#,
        )
        .bind(poll_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("poll {}", poll_id)))?;

        self.hydrate(row).await
    }

    async fn category_counts(&self) -> AppResult<Vec<(String, u64)>> {
        let counts = sqlx::query(
            r#"
            SELECT category_slug, COUNT(*) AS n
            FROM polls
            WHERE category_slug IS NOT NULL AND question NOT LIKE ?
            GROUP BY category_slug
            ORDER BY n DESC, category_slug
            "#,
        )
        .bind(PLACEHOLDER_PREFIX)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(|row| (row.get::<String, _>("category_slug"), to_count(row.get::<i64, _>("n"))))
        .collect();
        Ok(counts)
    }

    async fn count_categories(&self) -> AppResult<u64> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM poll_categories")
            .fetch_one(&self.pool)
            .await?;
        Ok(to_count(row.get::<i64, _>("n")))
    }

    async fn vote_summary(&self) -> AppResult<VoteSummary> {
        let row = sqlx::query(
            r#"
            SELECT
                COALESCE(SUM(o.vote_count), 0) AS total_votes,
                COALESCE(MAX(o.vote_count), 0) AS max_option_votes,
                COUNT(DISTINCT CASE WHEN o.vote_count > 0 THEN o.poll_id END) AS polls_with_votes
            FROM poll_options o
            JOIN polls p ON p.id = o.poll_id
            WHERE p.question NOT LIKE ?
            "#,
        )
        .bind(PLACEHOLDER_PREFIX)
        .fetch_one(&self.pool)
        .await?;

        Ok(VoteSummary {
            total_votes: to_count(row.get::<i64, _>("total_votes")),
            max_option_votes: to_count(row.get::<i64, _>("max_option_votes")),
            polls_with_votes: to_count(row.get::<i64, _>("polls_with_votes")),
        })
    }
}

/// WHERE clause for a filter. The first placeholder is always the
/// placeholder-question prefix; the optional second one is the filter value.
fn filter_clause(filter: &PollFilter) -> (String, Option<String>) {
    let base = "p.question NOT LIKE ?".to_string();
    match filter {
        PollFilter::All => (base, None),
        PollFilter::QuestionContains(text) => (
            format!(r"{} AND LOWER(p.question) LIKE ? ESCAPE '\'", base),
            Some(contains_pattern(text)),
        ),
        PollFilter::CategoryContains(slug) => (
            format!(r"{} AND LOWER(COALESCE(p.category_slug, '')) LIKE ? ESCAPE '\'", base),
            Some(contains_pattern(slug)),
        ),
        PollFilter::Tag(tag) => (
            format!(
                "{} AND EXISTS (SELECT 1 FROM poll_tags t WHERE t.poll_id = p.id AND t.tag = ?)",
                base
            ),
            Some(tag.trim().to_lowercase()),
        ),
    }
}

fn contains_pattern(text: &str) -> String {
    format!("%{}%", escape_like(&text.trim().to_lowercase()))
}

/// Escape LIKE wildcards so user text matches literally.
fn escape_like(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn to_count(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    async fn memory_db() -> Database {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        Database::from_pool(pool).await.unwrap()
    }

    fn poll(question: &str, category: Option<&str>, labels: &[&str]) -> Poll {
        Poll::new(
            question.to_string(),
            category.map(str::to_string),
            Vec::new(),
            labels.iter().map(|l| l.to_string()).collect(),
        )
    }

    #[tokio::test]
    async fn increment_is_visible_in_counts() {
        let db = memory_db().await;
        let p = poll("Best vehicle?", None, &["Sedan", "SUV"]).with_counts(&[3, 7]);
        db.create_poll(&p).await.unwrap();

        db.increment_vote(&p.options[0].id).await.unwrap();

        let counts = db.option_counts(&p.id).await.unwrap();
        assert_eq!(counts[0].vote_count, 4);
        assert_eq!(counts[1].vote_count, 7);
    }

    #[tokio::test]
    async fn increment_unknown_option_is_not_found() {
        let db = memory_db().await;
        let err = db.increment_vote("missing").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn options_come_back_in_position_order() {
        let db = memory_db().await;
        let mut p = poll("Order?", None, &["First", "Second", "Third"]);
        p.options.reverse();
        db.create_poll(&p).await.unwrap();

        let loaded = db.get_poll(&p.id).await.unwrap();
        let labels: Vec<_> = loaded.options.iter().map(|o| o.label.as_str()).collect();
        assert_eq!(labels, ["First", "Second", "Third"]);
    }

    #[tokio::test]
    async fn question_filter_is_case_insensitive_and_literal() {
        let db = memory_db().await;
        db.create_poll(&poll("Best party bus in Anchorage?", None, &["A", "B"])).await.unwrap();
        db.create_poll(&poll("100% worth the limo?", None, &["Yes", "No"])).await.unwrap();
        db.create_poll(&poll("Your opinion on Anchorage", None, &["Yes", "No"])).await.unwrap();

        let anchorage = PollFilter::QuestionContains("ANCHORAGE".to_string());
        assert_eq!(db.count_polls(&anchorage).await.unwrap(), 1);

        let percent = PollFilter::QuestionContains("0%".to_string());
        let hits = db.fetch_polls(&percent, 0, 50).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert!(hits[0].question.starts_with("100%"));

        assert_eq!(db.count_polls(&PollFilter::All).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn category_and_tag_filters() {
        let db = memory_db().await;
        db.create_category("prom", "prom").await.unwrap();
        let mut tagged = poll("Prom limo color?", Some("prom"), &["Black", "White"]);
        tagged.tags = vec!["anchorage".to_string(), "alaska".to_string()];
        db.create_poll(&tagged).await.unwrap();
        db.create_poll(&poll("Wedding shuttle?", Some("weddings"), &["Yes", "No"])).await.unwrap();

        let prom = db
            .fetch_polls(&PollFilter::CategoryContains("Prom".to_string()), 0, 50)
            .await
            .unwrap();
        assert_eq!(prom.len(), 1);
        assert_eq!(prom[0].category_name.as_deref(), Some("prom"));
        assert_eq!(prom[0].tags, ["alaska", "anchorage"]);

        let alaska = db.count_polls(&PollFilter::Tag("Alaska".to_string())).await.unwrap();
        assert_eq!(alaska, 1);
    }

    #[tokio::test]
    async fn pages_respect_offset_and_limit() {
        let db = memory_db().await;
        let start = Utc::now();
        for i in 0..5 {
            let mut p = poll(&format!("Poll {}", i), None, &["A"]);
            p.created_at = start + Duration::seconds(i);
            db.create_poll(&p).await.unwrap();
        }

        let page = db.fetch_polls(&PollFilter::All, 2, 2).await.unwrap();
        let questions: Vec<_> = page.iter().map(|p| p.question.as_str()).collect();
        assert_eq!(questions, ["Poll 2", "Poll 3"]);
    }

    #[tokio::test]
    async fn summary_and_category_counts() {
        let db = memory_db().await;
        db.create_category("prom", "Prom").await.unwrap();
        db.create_category("weddings", "Weddings").await.unwrap();
        db.create_poll(&poll("A?", Some("prom"), &["x", "y"]).with_counts(&[2, 5])).await.unwrap();
        db.create_poll(&poll("B?", Some("prom"), &["x"])).await.unwrap();
        db.create_poll(&poll("C?", Some("weddings"), &["x"]).with_counts(&[1])).await.unwrap();

        let summary = db.vote_summary().await.unwrap();
        assert_eq!(
            summary,
            VoteSummary { total_votes: 8, max_option_votes: 5, polls_with_votes: 2 }
        );
        assert_eq!(db.count_categories().await.unwrap(), 2);
        assert_eq!(
            db.category_counts().await.unwrap(),
            vec![("prom".to_string(), 2), ("weddings".to_string(), 1)]
        );
    }

    #[tokio::test]
    async fn summary_skips_placeholder_polls() {
        let db = memory_db().await;
        db.create_poll(&poll("Real poll?", None, &["x", "y"]).with_counts(&[1, 3])).await.unwrap();
        db.create_poll(&poll("Your opinion on Juneau", None, &["Yes"]).with_counts(&[40])).await.unwrap();

        let summary = db.vote_summary().await.unwrap();
        assert_eq!(
            summary,
            VoteSummary { total_votes: 4, max_option_votes: 3, polls_with_votes: 1 }
        );
        assert_eq!(db.count_polls(&PollFilter::All).await.unwrap(), 1);
    }

    #[test]
    fn like_wildcards_are_escaped() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
    }
}
