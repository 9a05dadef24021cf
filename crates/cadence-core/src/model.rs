use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Habit
// ---------------------------------------------------------------------------

/// A tracked activity owned by one user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Habit {
    pub id: Uuid,
    pub title: String,
    pub category: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub owner_id: Uuid,
    pub owner_email: String,
    pub owner_name: String,
    pub created_at: DateTime<Utc>,
    /// Calendar days on which the habit was marked done, ascending.
    /// At most one entry per day; the store enforces this at write time.
    #[serde(default)]
    pub completion_history: Vec<NaiveDate>,
}

impl Habit {
    pub fn new(title: impl Into<String>, owner: &VerifiedIdentity) -> Self {
        Self {
            id: Uuid::now_v7(),
            title: title.into(),
            category: String::new(),
            description: None,
            image_url: None,
            owner_id: owner.id,
            owner_email: owner.email.clone(),
            owner_name: owner.display_name.clone(),
            created_at: Utc::now(),
            completion_history: Vec::new(),
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_image_url(mut self, image_url: impl Into<String>) -> Self {
        self.image_url = Some(image_url.into());
        self
    }
}

/// Transport representation of a habit: the stored record plus its
/// streak, recomputed at read time. Streaks are never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HabitWithStreak {
    #[serde(flatten)]
    pub habit: Habit,
    pub current_streak: u32,
}

/// Outcome of marking a habit complete for a day.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionOutcome {
    pub habit: HabitWithStreak,
    /// True when the day was already recorded and the call was a no-op.
    pub already_completed_today: bool,
}

// ---------------------------------------------------------------------------
// User & Identity
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub display_name: String,
    pub photo_url: Option<String>,
    /// SHA-256 of the bearer token issued at registration. Never the
    /// token itself, and never serialized outward.
    #[serde(skip_serializing, default)]
    pub token_hash: String,
    pub created_at: DateTime<Utc>,
}

/// A verified caller identity, produced by an [`crate::IdentityVerifier`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifiedIdentity {
    pub id: Uuid,
    pub email: String,
    pub display_name: String,
}

impl From<&User> for VerifiedIdentity {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            display_name: user.display_name.clone(),
        }
    }
}

/// Outcome of a registration request. Registration is create-once per
/// email: re-registering reports the existing account and mints no
/// second token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrationOutcome {
    pub user: User,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    pub created: bool,
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegisterUser {
    pub email: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub photo_url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewHabit {
    pub title: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
}

/// Whitelisted mutable fields for habit updates. Ownership, creation
/// time, and the completion history are not writable through this.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HabitPatch {
    pub title: Option<String>,
    pub category: Option<String>,
    pub description: Option<String>,
    pub image_url: Option<String>,
}

impl HabitPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.category.is_none()
            && self.description.is_none()
            && self.image_url.is_none()
    }
}

// ---------------------------------------------------------------------------
// Query Filter
// ---------------------------------------------------------------------------

/// Listing predicate. Present fields AND together; absent fields
/// impose no constraint. `search` is a case-insensitive substring
/// match on the title; `categories` is case-sensitive exact
/// membership.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HabitFilter {
    pub owner: Option<Uuid>,
    pub search: Option<String>,
    pub categories: Option<Vec<String>>,
}
