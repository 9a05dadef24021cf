//! Service orchestration: every habit and user operation the transport
//! layer exposes goes through [`CadenceEngine`].

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use uuid::Uuid;

use cadence_core::{day, streak, *};
use cadence_storage::SqliteStore;

use crate::config::EngineConfig;
use crate::identity;

pub struct CadenceEngine {
    pub habits: Arc<dyn HabitStore>,
    pub users: Arc<dyn UserStore>,
    pub config: EngineConfig,
}

impl CadenceEngine {
    /// Initialize the engine from configuration, opening (or creating)
    /// the SQLite database under `data_dir`.
    pub fn init(config: EngineConfig) -> CdResult<Self> {
        let data_dir = PathBuf::from(&config.data_dir);
        std::fs::create_dir_all(&data_dir)
            .map_err(|e| CadenceError::Storage(format!("create data dir: {e}")))?;

        let store = Arc::new(SqliteStore::open(&data_dir.join("cadence.sqlite"))?);
        tracing::info!(data_dir = %config.data_dir, "engine initialized");

        let habits: Arc<dyn HabitStore> = store.clone();
        let users: Arc<dyn UserStore> = store;
        Ok(Self::new(habits, users, config))
    }

    /// Assemble an engine from explicit stores. The persistence handle
    /// is passed in rather than reached for globally, so tests can
    /// substitute doubles.
    pub fn new(
        habits: Arc<dyn HabitStore>,
        users: Arc<dyn UserStore>,
        config: EngineConfig,
    ) -> Self {
        Self {
            habits,
            users,
            config,
        }
    }

    // -----------------------------------------------------------------
    // Users
    // -----------------------------------------------------------------

    /// Register a user. Create-once per email: a repeat registration is
    /// a no-op that reports the existing account and mints no second
    /// token.
    pub async fn register_user(&self, req: RegisterUser) -> CdResult<RegistrationOutcome> {
        let email = req.email.trim();
        if email.is_empty() || !email.contains('@') {
            return Err(CadenceError::InvalidInput(
                "a valid email is required".into(),
            ));
        }

        if let Some(existing) = self.users.find_user_by_email(email).await? {
            return Ok(RegistrationOutcome {
                user: existing,
                token: None,
                created: false,
            });
        }

        let token = identity::generate_token();
        let user = User {
            id: Uuid::now_v7(),
            email: email.to_string(),
            display_name: req.display_name.trim().to_string(),
            photo_url: req.photo_url,
            token_hash: identity::hash_token(&token),
            created_at: Utc::now(),
        };
        self.users.insert_user(&user).await?;
        tracing::info!(user_id = %user.id, "user registered");

        Ok(RegistrationOutcome {
            user,
            token: Some(token),
            created: true,
        })
    }

    // -----------------------------------------------------------------
    // Habits
    // -----------------------------------------------------------------

    pub async fn create_habit(
        &self,
        caller: &VerifiedIdentity,
        req: NewHabit,
    ) -> CdResult<HabitWithStreak> {
        if req.title.trim().is_empty() {
            return Err(CadenceError::InvalidInput("title must not be empty".into()));
        }

        let mut habit = Habit::new(req.title.trim(), caller).with_category(req.category);
        if let Some(description) = req.description {
            habit = habit.with_description(description);
        }
        if let Some(image_url) = req.image_url {
            habit = habit.with_image_url(image_url);
        }

        self.habits.insert(&habit).await?;
        tracing::info!(habit_id = %habit.id, owner = %caller.id, "habit created");
        Ok(self.snapshot(habit))
    }

    pub async fn get_habit(&self, id: Uuid) -> CdResult<HabitWithStreak> {
        let habit = self
            .habits
            .get(id)
            .await?
            .ok_or(CadenceError::HabitNotFound(id))?;
        Ok(self.snapshot(habit))
    }

    /// Newest habits, capped at the configured limit.
    pub async fn latest_habits(&self) -> CdResult<Vec<HabitWithStreak>> {
        let habits = self
            .habits
            .list(&HabitFilter::default(), Some(self.config.latest_limit), 0)
            .await?;
        Ok(self.snapshot_all(habits))
    }

    /// Public listing with optional free-text title search and category
    /// membership constraints. Uncapped: every match is returned.
    pub async fn public_habits(
        &self,
        search: Option<String>,
        categories: Option<Vec<String>>,
    ) -> CdResult<Vec<HabitWithStreak>> {
        let filter = HabitFilter {
            owner: None,
            search: search.filter(|s| !s.trim().is_empty()),
            categories: categories.filter(|c| !c.is_empty()),
        };
        let habits = self.habits.list(&filter, None, 0).await?;
        Ok(self.snapshot_all(habits))
    }

    pub async fn my_habits(&self, caller: &VerifiedIdentity) -> CdResult<Vec<HabitWithStreak>> {
        let filter = HabitFilter {
            owner: Some(caller.id),
            ..Default::default()
        };
        let habits = self.habits.list(&filter, None, 0).await?;
        Ok(self.snapshot_all(habits))
    }

    /// Apply the whitelisted mutable fields; everything else on the
    /// record is untouchable through update.
    pub async fn update_habit(
        &self,
        caller: &VerifiedIdentity,
        id: Uuid,
        patch: HabitPatch,
    ) -> CdResult<HabitWithStreak> {
        let mut habit = self
            .habits
            .get(id)
            .await?
            .ok_or(CadenceError::HabitNotFound(id))?;
        ensure_owner(&habit, caller)?;

        if let Some(title) = patch.title {
            if title.trim().is_empty() {
                return Err(CadenceError::InvalidInput("title must not be empty".into()));
            }
            habit.title = title.trim().to_string();
        }
        if let Some(category) = patch.category {
            habit.category = category;
        }
        if let Some(description) = patch.description {
            habit.description = Some(description);
        }
        if let Some(image_url) = patch.image_url {
            habit.image_url = Some(image_url);
        }

        self.habits.update(&habit).await?;
        Ok(self.snapshot(habit))
    }

    pub async fn delete_habit(&self, caller: &VerifiedIdentity, id: Uuid) -> CdResult<()> {
        let habit = self
            .habits
            .get(id)
            .await?
            .ok_or(CadenceError::HabitNotFound(id))?;
        ensure_owner(&habit, caller)?;

        self.habits.delete(id).await?;
        tracing::info!(habit_id = %id, "habit deleted");
        Ok(())
    }

    // -----------------------------------------------------------------
    // Completion recording
    // -----------------------------------------------------------------

    /// Mark the habit complete for today. Idempotent: repeat calls on
    /// the same calendar day are successful no-ops.
    pub async fn complete_habit(
        &self,
        caller: &VerifiedIdentity,
        id: Uuid,
    ) -> CdResult<CompletionOutcome> {
        self.complete_habit_on(caller, id, day::today()).await
    }

    /// Completion recorder for an explicit day key. The check-and-append
    /// is a single conditional mutation at the storage boundary, so
    /// concurrent duplicate requests cannot double-record a day.
    pub async fn complete_habit_on(
        &self,
        caller: &VerifiedIdentity,
        id: Uuid,
        today: NaiveDate,
    ) -> CdResult<CompletionOutcome> {
        let habit = self
            .habits
            .get(id)
            .await?
            .ok_or(CadenceError::HabitNotFound(id))?;
        ensure_owner(&habit, caller)?;

        let appended = self.habits.mark_completed(id, today).await?;
        if appended {
            tracing::debug!(habit_id = %id, day = %today, "completion recorded");
        }

        let habit = self
            .habits
            .get(id)
            .await?
            .ok_or(CadenceError::HabitNotFound(id))?;
        Ok(CompletionOutcome {
            habit: snapshot_on(habit, today),
            already_completed_today: !appended,
        })
    }

    // -----------------------------------------------------------------
    // Streak attachment
    // -----------------------------------------------------------------

    fn snapshot(&self, habit: Habit) -> HabitWithStreak {
        snapshot_on(habit, day::today())
    }

    fn snapshot_all(&self, habits: Vec<Habit>) -> Vec<HabitWithStreak> {
        let today = day::today();
        habits
            .into_iter()
            .map(|habit| snapshot_on(habit, today))
            .collect()
    }
}

fn snapshot_on(habit: Habit, today: NaiveDate) -> HabitWithStreak {
    let current_streak = streak::current_streak(habit.completion_history.iter().copied(), today);
    HabitWithStreak {
        habit,
        current_streak,
    }
}

fn ensure_owner(habit: &Habit, caller: &VerifiedIdentity) -> CdResult<()> {
    if habit.owner_id != caller.id {
        return Err(CadenceError::Forbidden(
            "only the habit owner may do this".into(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_engine() -> CadenceEngine {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let habits: Arc<dyn HabitStore> = store.clone();
        CadenceEngine::new(habits, store, EngineConfig::default())
    }

    async fn registered_identity(engine: &CadenceEngine, email: &str) -> (VerifiedIdentity, String) {
        let outcome = engine
            .register_user(RegisterUser {
                email: email.into(),
                display_name: "Tester".into(),
                photo_url: None,
            })
            .await
            .unwrap();
        let token = outcome.token.unwrap();
        (VerifiedIdentity::from(&outcome.user), token)
    }

    fn d(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[tokio::test]
    async fn registration_is_create_once_per_email() {
        let engine = test_engine();
        let first = engine
            .register_user(RegisterUser {
                email: "ada@example.com".into(),
                display_name: "Ada".into(),
                photo_url: None,
            })
            .await
            .unwrap();
        assert!(first.created);
        assert!(first.token.is_some());

        let second = engine
            .register_user(RegisterUser {
                email: "ada@example.com".into(),
                display_name: "Someone Else".into(),
                photo_url: None,
            })
            .await
            .unwrap();
        assert!(!second.created);
        assert!(second.token.is_none());
        assert_eq!(second.user.id, first.user.id);
    }

    #[tokio::test]
    async fn registration_rejects_bogus_email() {
        let engine = test_engine();
        let err = engine
            .register_user(RegisterUser {
                email: "   ".into(),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, CadenceError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn issued_token_verifies_to_the_registered_identity() {
        let engine = test_engine();
        let (identity, token) = registered_identity(&engine, "ada@example.com").await;

        let verified = engine.verify(&token).await.unwrap();
        assert_eq!(verified.id, identity.id);
        assert_eq!(verified.email, "ada@example.com");

        let err = engine.verify("cad_not-a-real-token").await.unwrap_err();
        assert!(matches!(err, CadenceError::InvalidCredential(_)));
    }

    #[tokio::test]
    async fn create_rejects_blank_title() {
        let engine = test_engine();
        let (identity, _) = registered_identity(&engine, "ada@example.com").await;

        let err = engine
            .create_habit(
                &identity,
                NewHabit {
                    title: "   ".into(),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, CadenceError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn new_habit_starts_with_zero_streak() {
        let engine = test_engine();
        let (identity, _) = registered_identity(&engine, "ada@example.com").await;

        let created = engine
            .create_habit(
                &identity,
                NewHabit {
                    title: "Morning Run".into(),
                    category: "health".into(),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(created.current_streak, 0);
        assert!(created.habit.completion_history.is_empty());
        assert_eq!(created.habit.owner_id, identity.id);
    }

    #[tokio::test]
    async fn completing_twice_in_a_day_records_one_entry() {
        let engine = test_engine();
        let (identity, _) = registered_identity(&engine, "ada@example.com").await;
        let created = engine
            .create_habit(
                &identity,
                NewHabit {
                    title: "Stretch".into(),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let today = d("2024-03-10");
        let first = engine
            .complete_habit_on(&identity, created.habit.id, today)
            .await
            .unwrap();
        assert!(!first.already_completed_today);
        assert_eq!(first.habit.current_streak, 1);

        let second = engine
            .complete_habit_on(&identity, created.habit.id, today)
            .await
            .unwrap();
        assert!(second.already_completed_today);
        assert_eq!(second.habit.current_streak, 1);
        assert_eq!(second.habit.habit.completion_history, vec![today]);
    }

    #[tokio::test]
    async fn consecutive_days_grow_the_streak() {
        let engine = test_engine();
        let (identity, _) = registered_identity(&engine, "ada@example.com").await;
        let created = engine
            .create_habit(
                &identity,
                NewHabit {
                    title: "Read".into(),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        engine
            .complete_habit_on(&identity, created.habit.id, d("2024-03-09"))
            .await
            .unwrap();
        let outcome = engine
            .complete_habit_on(&identity, created.habit.id, d("2024-03-10"))
            .await
            .unwrap();
        assert_eq!(outcome.habit.current_streak, 2);
    }

    #[tokio::test]
    async fn non_owner_completion_is_forbidden_and_mutates_nothing() {
        let engine = test_engine();
        let (ada, _) = registered_identity(&engine, "ada@example.com").await;
        let (bea, _) = registered_identity(&engine, "bea@example.com").await;
        let created = engine
            .create_habit(
                &ada,
                NewHabit {
                    title: "Meditate".into(),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let err = engine
            .complete_habit_on(&bea, created.habit.id, d("2024-03-10"))
            .await
            .unwrap_err();
        assert!(matches!(err, CadenceError::Forbidden(_)));

        let reloaded = engine.get_habit(created.habit.id).await.unwrap();
        assert!(reloaded.habit.completion_history.is_empty());
    }

    #[tokio::test]
    async fn completing_a_missing_habit_is_not_found() {
        let engine = test_engine();
        let (identity, _) = registered_identity(&engine, "ada@example.com").await;

        let missing = Uuid::now_v7();
        let err = engine
            .complete_habit_on(&identity, missing, d("2024-03-10"))
            .await
            .unwrap_err();
        assert!(matches!(err, CadenceError::HabitNotFound(id) if id == missing));
    }

    #[tokio::test]
    async fn update_applies_only_whitelisted_fields() {
        let engine = test_engine();
        let (identity, _) = registered_identity(&engine, "ada@example.com").await;
        let created = engine
            .create_habit(
                &identity,
                NewHabit {
                    title: "Run".into(),
                    category: "health".into(),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let updated = engine
            .update_habit(
                &identity,
                created.habit.id,
                HabitPatch {
                    title: Some("Evening Run".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.habit.title, "Evening Run");
        assert_eq!(updated.habit.category, "health");
        assert_eq!(updated.habit.owner_id, identity.id);
        assert_eq!(updated.habit.created_at, created.habit.created_at);
    }

    #[tokio::test]
    async fn update_and_delete_are_owner_gated() {
        let engine = test_engine();
        let (ada, _) = registered_identity(&engine, "ada@example.com").await;
        let (bea, _) = registered_identity(&engine, "bea@example.com").await;
        let created = engine
            .create_habit(
                &ada,
                NewHabit {
                    title: "Journal".into(),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let err = engine
            .update_habit(
                &bea,
                created.habit.id,
                HabitPatch {
                    title: Some("Hijacked".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, CadenceError::Forbidden(_)));

        let err = engine.delete_habit(&bea, created.habit.id).await.unwrap_err();
        assert!(matches!(err, CadenceError::Forbidden(_)));

        engine.delete_habit(&ada, created.habit.id).await.unwrap();
        let err = engine.get_habit(created.habit.id).await.unwrap_err();
        assert!(matches!(err, CadenceError::HabitNotFound(_)));
    }

    #[tokio::test]
    async fn latest_listing_respects_the_cap() {
        let engine = test_engine();
        let (identity, _) = registered_identity(&engine, "ada@example.com").await;
        for i in 0..8 {
            engine
                .create_habit(
                    &identity,
                    NewHabit {
                        title: format!("habit-{i}"),
                        ..Default::default()
                    },
                )
                .await
                .unwrap();
        }

        let latest = engine.latest_habits().await.unwrap();
        assert_eq!(latest.len(), 6);
    }

    #[tokio::test]
    async fn public_listing_is_uncapped() {
        let engine = test_engine();
        let (identity, _) = registered_identity(&engine, "ada@example.com").await;
        for i in 0..110 {
            engine
                .create_habit(
                    &identity,
                    NewHabit {
                        title: format!("habit-{i}"),
                        ..Default::default()
                    },
                )
                .await
                .unwrap();
        }

        let public = engine.public_habits(None, None).await.unwrap();
        assert_eq!(public.len(), 110);
        let mine = engine.my_habits(&identity).await.unwrap();
        assert_eq!(mine.len(), 110);
    }

    #[tokio::test]
    async fn my_habits_only_lists_the_callers() {
        let engine = test_engine();
        let (ada, _) = registered_identity(&engine, "ada@example.com").await;
        let (bea, _) = registered_identity(&engine, "bea@example.com").await;

        engine
            .create_habit(
                &ada,
                NewHabit {
                    title: "Run".into(),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        engine
            .create_habit(
                &bea,
                NewHabit {
                    title: "Swim".into(),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let mine = engine.my_habits(&ada).await.unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].habit.title, "Run");
    }
}
