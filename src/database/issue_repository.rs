use crate::database::error::DatabaseError;
use crate::database::repository::IssueStore;
use async_trait::async_trait;
use sqlx::{types::BigDecimal, FromRow, PgPool};
use uuid::Uuid;

/// Campaign ("issue") aggregate entity
///
/// `raised_amount` is a running total of confirmed contributions in major
/// units. It is monotonically non-decreasing and only ever mutated through
/// [`IssueRepository::apply_raised_amount_delta`].
#[derive(Debug, Clone, FromRow)]
pub struct Issue {
    pub id: Uuid,
    pub title: String,
    pub summary: Option<String>,
    pub goal_amount: BigDecimal,
    pub raised_amount: BigDecimal,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

const ISSUE_COLUMNS: &str =
    "id, title, summary, goal_amount, raised_amount, created_at, updated_at";

/// Repository for campaign aggregates
pub struct IssueRepository {
    pool: PgPool,
}

impl IssueRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_issue_by_id(&self, id: Uuid) -> Result<Option<Issue>, DatabaseError> {
        sqlx::query_as::<_, Issue>(&format!("SELECT {ISSUE_COLUMNS} FROM issues WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(DatabaseError::from_sqlx)
    }

    /// Add `delta` to the campaign's raised total.
    ///
    /// The increment happens in a single UPDATE so Postgres serializes
    /// concurrent writers on the row; the application never reads the old
    /// total and writes a new one.
    pub async fn increment_raised_amount(
        &self,
        id: Uuid,
        delta: &BigDecimal,
    ) -> Result<Issue, DatabaseError> {
        sqlx::query_as::<_, Issue>(&format!(
            "UPDATE issues
             SET raised_amount = raised_amount + $2, updated_at = NOW()
             WHERE id = $1
             RETURNING {ISSUE_COLUMNS}"
        ))
        .bind(id)
        .bind(delta)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?
        .ok_or_else(|| DatabaseError::not_found("issue", id.to_string()))
    }

    /// Open campaigns, most recent first (used by listing surfaces)
    pub async fn list_recent(&self, limit: i64) -> Result<Vec<Issue>, DatabaseError> {
        sqlx::query_as::<_, Issue>(&format!(
            "SELECT {ISSUE_COLUMNS} FROM issues ORDER BY created_at DESC LIMIT $1"
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }
}

#[async_trait]
impl IssueStore for IssueRepository {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Issue>, DatabaseError> {
        self.find_issue_by_id(id).await
    }

    async fn apply_raised_amount_delta(
        &self,
        id: Uuid,
        delta: &BigDecimal,
    ) -> Result<Issue, DatabaseError> {
        self.increment_raised_amount(id, delta).await
    }
}
