use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

use crate::error::CdResult;
use crate::model::*;

/// Storage backend for habits and their completion history.
#[async_trait]
pub trait HabitStore: Send + Sync {
    async fn insert(&self, habit: &Habit) -> CdResult<()>;
    async fn get(&self, id: Uuid) -> CdResult<Option<Habit>>;
    async fn update(&self, habit: &Habit) -> CdResult<()>;
    async fn delete(&self, id: Uuid) -> CdResult<bool>;
    /// List habits matching `filter`, newest first by creation time.
    /// `limit: None` returns every match.
    async fn list(
        &self,
        filter: &HabitFilter,
        limit: Option<usize>,
        offset: usize,
    ) -> CdResult<Vec<Habit>>;
    /// Append `day` to the habit's completion history iff it is not
    /// already present, as a single atomic operation. Returns true iff
    /// an entry was appended. This is the only write path for
    /// completions; there is no unconditional append.
    async fn mark_completed(&self, id: Uuid, day: NaiveDate) -> CdResult<bool>;
}

/// Storage backend for user accounts.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn insert_user(&self, user: &User) -> CdResult<()>;
    async fn find_user_by_email(&self, email: &str) -> CdResult<Option<User>>;
    async fn find_user_by_token_hash(&self, token_hash: &str) -> CdResult<Option<User>>;
}

/// Credential verification boundary. The service is agnostic to how
/// tokens are issued; it only needs a verified identity to compare
/// against habit ownership.
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> CdResult<VerifiedIdentity>;
}
