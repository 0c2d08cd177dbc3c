//! Store interfaces the verification workflow depends on.
//!
//! The orchestrator and services hold these traits rather than concrete
//! repositories, so the whole flow can be exercised against in-memory
//! implementations in tests. Repositories own every mutation; callers never
//! mutate a Donation or Issue in memory and write it back.

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use uuid::Uuid;

use crate::database::donation_repository::{Donation, NewDonation};
use crate::database::error::DatabaseError;
use crate::database::issue_repository::Issue;

/// Persistence contract for donation records.
///
/// `update_status*` map a missing row to `DatabaseErrorKind::NotFound`.
/// Writing the same terminal status twice is harmless; the no-transition-
/// out-of-terminal rule is enforced by the orchestrator, not here.
#[async_trait]
pub trait DonationStore: Send + Sync {
    /// Insert a new donation. Status always starts at `pending`.
    async fn create(&self, donation: NewDonation) -> Result<Donation, DatabaseError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Donation>, DatabaseError>;

    async fn find_by_reference(&self, reference: &str) -> Result<Option<Donation>, DatabaseError>;

    async fn update_status(
        &self,
        id: Uuid,
        status: &str,
        message: Option<&str>,
    ) -> Result<Donation, DatabaseError>;

    async fn update_status_by_reference(
        &self,
        reference: &str,
        status: &str,
        message: Option<&str>,
    ) -> Result<Donation, DatabaseError>;
}

/// Persistence contract for campaign aggregates.
#[async_trait]
pub trait IssueStore: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Issue>, DatabaseError>;

    /// Atomically add `delta` to the campaign's running raised-amount total.
    ///
    /// Implementations must perform the increment in the storage layer in a
    /// single statement; concurrent donations to the same campaign are
    /// expected and must not lose updates.
    async fn apply_raised_amount_delta(
        &self,
        id: Uuid,
        delta: &BigDecimal,
    ) -> Result<Issue, DatabaseError>;
}
