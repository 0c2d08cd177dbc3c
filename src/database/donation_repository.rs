use crate::database::error::DatabaseError;
use crate::database::repository::DonationStore;
use async_trait::async_trait;
use sqlx::{types::BigDecimal, FromRow, PgPool};
use uuid::Uuid;

/// Donation entity
///
/// `amount` is in major currency units and is fixed at creation;
/// verification never rewrites it. `status` is one of
/// `pending`/`completed`/`failed`; the state machine lives in the
/// verification service.
#[derive(Debug, Clone, FromRow)]
pub struct Donation {
    pub id: Uuid,
    pub reference: String,
    pub amount: BigDecimal,
    pub currency: String,
    pub donor_name: Option<String>,
    pub donor_email: Option<String>,
    pub target_issue_id: Option<Uuid>,
    pub status: String,
    pub message: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// Input for creating a donation. Status is not part of the input; every
/// donation starts `pending`.
#[derive(Debug, Clone)]
pub struct NewDonation {
    pub reference: String,
    pub amount: BigDecimal,
    pub currency: String,
    pub donor_name: Option<String>,
    pub donor_email: Option<String>,
    pub target_issue_id: Option<Uuid>,
}

const DONATION_COLUMNS: &str = "id, reference, amount, currency, donor_name, donor_email, \
                                target_issue_id, status, message, created_at, updated_at";

/// Repository for donation records
pub struct DonationRepository {
    pool: PgPool,
}

impl DonationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create_donation(&self, donation: NewDonation) -> Result<Donation, DatabaseError> {
        sqlx::query_as::<_, Donation>(&format!(
            "INSERT INTO donations
             (reference, amount, currency, donor_name, donor_email, target_issue_id, status)
             VALUES ($1, $2, $3, $4, $5, $6, 'pending')
             RETURNING {DONATION_COLUMNS}"
        ))
        .bind(&donation.reference)
        .bind(&donation.amount)
        .bind(&donation.currency)
        .bind(&donation.donor_name)
        .bind(&donation.donor_email)
        .bind(donation.target_issue_id)
        .fetch_one(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    pub async fn find_donation_by_id(&self, id: Uuid) -> Result<Option<Donation>, DatabaseError> {
        sqlx::query_as::<_, Donation>(&format!(
            "SELECT {DONATION_COLUMNS} FROM donations WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    pub async fn find_donation_by_reference(
        &self,
        reference: &str,
    ) -> Result<Option<Donation>, DatabaseError> {
        sqlx::query_as::<_, Donation>(&format!(
            "SELECT {DONATION_COLUMNS} FROM donations WHERE reference = $1"
        ))
        .bind(reference)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    pub async fn update_donation_status(
        &self,
        id: Uuid,
        status: &str,
        message: Option<&str>,
    ) -> Result<Donation, DatabaseError> {
        sqlx::query_as::<_, Donation>(&format!(
            "UPDATE donations
             SET status = $2, message = COALESCE($3, message), updated_at = NOW()
             WHERE id = $1
             RETURNING {DONATION_COLUMNS}"
        ))
        .bind(id)
        .bind(status)
        .bind(message)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?
        .ok_or_else(|| DatabaseError::not_found("donation", id.to_string()))
    }

    pub async fn update_donation_status_by_reference(
        &self,
        reference: &str,
        status: &str,
        message: Option<&str>,
    ) -> Result<Donation, DatabaseError> {
        sqlx::query_as::<_, Donation>(&format!(
            "UPDATE donations
             SET status = $2, message = COALESCE($3, message), updated_at = NOW()
             WHERE reference = $1
             RETURNING {DONATION_COLUMNS}"
        ))
        .bind(reference)
        .bind(status)
        .bind(message)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?
        .ok_or_else(|| DatabaseError::not_found("donation", reference))
    }

    /// Recent donations for a campaign, newest first
    pub async fn find_by_issue(
        &self,
        issue_id: Uuid,
        limit: i64,
    ) -> Result<Vec<Donation>, DatabaseError> {
        sqlx::query_as::<_, Donation>(&format!(
            "SELECT {DONATION_COLUMNS} FROM donations
             WHERE target_issue_id = $1
             ORDER BY created_at DESC
             LIMIT $2"
        ))
        .bind(issue_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }
}

#[async_trait]
impl DonationStore for DonationRepository {
    async fn create(&self, donation: NewDonation) -> Result<Donation, DatabaseError> {
        self.create_donation(donation).await
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Donation>, DatabaseError> {
        self.find_donation_by_id(id).await
    }

    async fn find_by_reference(&self, reference: &str) -> Result<Option<Donation>, DatabaseError> {
        self.find_donation_by_reference(reference).await
    }

    async fn update_status(
        &self,
        id: Uuid,
        status: &str,
        message: Option<&str>,
    ) -> Result<Donation, DatabaseError> {
        self.update_donation_status(id, status, message).await
    }

    async fn update_status_by_reference(
        &self,
        reference: &str,
        status: &str,
        message: Option<&str>,
    ) -> Result<Donation, DatabaseError> {
        self.update_donation_status_by_reference(reference, status, message)
            .await
    }
}
