//! SQLite-backed habit and user storage.
//!
//! One database file holds three tables: `users`, `habits`, and
//! `habit_completions`. Completions are rows keyed by
//! `(habit_id, day)` rather than an array column, which lets the
//! at-most-one-entry-per-day invariant live in the schema and makes
//! [`HabitStore::mark_completed`] a single conditional insert.

use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use cadence_core::*;

/// Default number of connections in the pool.
/// SQLite WAL mode supports 1 writer + N readers, so even a small pool
/// eliminates head-of-line blocking for concurrent read queries.
const DEFAULT_POOL_SIZE: usize = 4;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS users (
    id TEXT PRIMARY KEY,
    email TEXT NOT NULL UNIQUE,
    display_name TEXT NOT NULL,
    photo_url TEXT,
    token_hash TEXT NOT NULL,
    created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_users_token_hash ON users(token_hash);

CREATE TABLE IF NOT EXISTS habits (
    id TEXT PRIMARY KEY,
    title TEXT NOT NULL,
    category TEXT NOT NULL,
    description TEXT,
    image_url TEXT,
    owner_id TEXT NOT NULL,
    owner_email TEXT NOT NULL,
    owner_name TEXT NOT NULL,
    created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_habits_owner ON habits(owner_id);
CREATE INDEX IF NOT EXISTS idx_habits_created_at ON habits(created_at);

CREATE TABLE IF NOT EXISTS habit_completions (
    habit_id TEXT NOT NULL REFERENCES habits(id) ON DELETE CASCADE,
    day TEXT NOT NULL,
    PRIMARY KEY (habit_id, day)
) WITHOUT ROWID;
";

pub struct SqliteStore {
    /// Connection pool — round-robin across `DEFAULT_POOL_SIZE`
    /// connections, each independently protected by a Mutex so callers
    /// can run synchronous rusqlite operations without holding an
    /// async lock.
    pool: Vec<Mutex<Connection>>,
    next_slot: std::sync::atomic::AtomicUsize,
}

impl SqliteStore {
    /// Execute a synchronous closure with a pooled database connection.
    ///
    /// Picks the next connection via round-robin, locks it, runs the
    /// closure, then releases. Because the closure is `FnOnce` (not
    /// async), the `MutexGuard` is guaranteed to drop before any
    /// `.await` — keeping the enclosing future `Send`.
    fn with_conn<F, T>(&self, f: F) -> CdResult<T>
    where
        F: FnOnce(&Connection) -> CdResult<T>,
    {
        let idx = self
            .next_slot
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed)
            % self.pool.len();
        let conn = self.pool[idx]
            .lock()
            .map_err(|e| CadenceError::Storage(e.to_string()))?;
        f(&conn)
    }

    fn open_connection(path: &Path) -> CdResult<Connection> {
        let conn = Connection::open(path)
            .map_err(|e| CadenceError::Storage(format!("failed to open sqlite: {e}")))?;

        conn.execute_batch(
            "PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON; PRAGMA busy_timeout=5000;",
        )
        .map_err(|e| CadenceError::Storage(format!("pragma error: {e}")))?;

        Ok(conn)
    }

    pub fn open(path: &Path) -> CdResult<Self> {
        let mut pool = Vec::with_capacity(DEFAULT_POOL_SIZE);
        for _ in 0..DEFAULT_POOL_SIZE {
            pool.push(Mutex::new(Self::open_connection(path)?));
        }

        let store = Self {
            pool,
            next_slot: std::sync::atomic::AtomicUsize::new(0),
        };
        store.run_migrations()?;
        Ok(store)
    }

    pub fn open_in_memory() -> CdResult<Self> {
        // In-memory DBs: use a shared cache URI so all pool connections
        // see the same data. Without this, each connection gets its own
        // isolated database. SQLITE_OPEN_URI is required for rusqlite
        // to parse the URI.
        let uri = format!("file:memdb{}?mode=memory&cache=shared", Uuid::new_v4());
        let flags = rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
            | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
            | rusqlite::OpenFlags::SQLITE_OPEN_NO_MUTEX
            | rusqlite::OpenFlags::SQLITE_OPEN_URI;
        let mut pool = Vec::with_capacity(DEFAULT_POOL_SIZE);
        for _ in 0..DEFAULT_POOL_SIZE {
            let conn = Connection::open_with_flags(&uri, flags).map_err(|e| {
                CadenceError::Storage(format!("failed to open in-memory sqlite: {e}"))
            })?;
            conn.execute_batch("PRAGMA foreign_keys=ON; PRAGMA busy_timeout=5000;")
                .map_err(|e| CadenceError::Storage(format!("pragma error: {e}")))?;
            pool.push(Mutex::new(conn));
        }

        let store = Self {
            pool,
            next_slot: std::sync::atomic::AtomicUsize::new(0),
        };
        store.run_migrations()?;
        Ok(store)
    }

    fn run_migrations(&self) -> CdResult<()> {
        self.with_conn(|conn| {
            conn.execute_batch(SCHEMA)
                .map_err(|e| CadenceError::Storage(format!("schema migration failed: {e}")))?;
            tracing::debug!("schema migration complete");
            Ok(())
        })
    }

    fn row_to_habit(row: &rusqlite::Row<'_>) -> rusqlite::Result<Habit> {
        let id_str: String = row.get(0)?;
        let owner_id_str: String = row.get(5)?;
        let created_at_str: String = row.get(8)?;

        Ok(Habit {
            id: parse_uuid_str(0, &id_str)?,
            title: row.get(1)?,
            category: row.get(2)?,
            description: row.get(3)?,
            image_url: row.get(4)?,
            owner_id: parse_uuid_str(5, &owner_id_str)?,
            owner_email: row.get(6)?,
            owner_name: row.get(7)?,
            created_at: parse_dt_strict(8, &created_at_str)?,
            completion_history: Vec::new(), // loaded separately
        })
    }

    fn row_to_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
        let id_str: String = row.get(0)?;
        let created_at_str: String = row.get(5)?;

        Ok(User {
            id: parse_uuid_str(0, &id_str)?,
            email: row.get(1)?,
            display_name: row.get(2)?,
            photo_url: row.get(3)?,
            token_hash: row.get(4)?,
            created_at: parse_dt_strict(5, &created_at_str)?,
        })
    }

    fn load_completions(conn: &Connection, habit_id: Uuid) -> CdResult<Vec<NaiveDate>> {
        let mut stmt = conn
            .prepare("SELECT day FROM habit_completions WHERE habit_id = ?1 ORDER BY day")
            .map_err(|e| CadenceError::Storage(e.to_string()))?;

        let rows = stmt
            .query_map(params![habit_id.to_string()], |row| {
                let day: String = row.get(0)?;
                parse_day_str(0, &day)
            })
            .map_err(|e| CadenceError::Storage(e.to_string()))?;

        let mut days = Vec::new();
        for row in rows {
            days.push(row.map_err(|e| CadenceError::Storage(e.to_string()))?);
        }
        Ok(days)
    }

    fn find_user_where(&self, clause: &str, value: &str) -> CdResult<Option<User>> {
        let sql = format!(
            "SELECT id, email, display_name, photo_url, token_hash, created_at
             FROM users WHERE {clause} = ?1"
        );
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare(&sql)
                .map_err(|e| CadenceError::Storage(e.to_string()))?;
            stmt.query_row(params![value], Self::row_to_user)
                .optional()
                .map_err(|e| CadenceError::Storage(e.to_string()))
        })
    }
}

#[async_trait]
impl HabitStore for SqliteStore {
    async fn insert(&self, habit: &Habit) -> CdResult<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO habits (id, title, category, description, image_url,
                 owner_id, owner_email, owner_name, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    habit.id.to_string(),
                    habit.title,
                    habit.category,
                    habit.description,
                    habit.image_url,
                    habit.owner_id.to_string(),
                    habit.owner_email,
                    habit.owner_name,
                    habit.created_at.to_rfc3339(),
                ],
            )
            .map_err(|e| CadenceError::Storage(format!("insert failed: {e}")))?;
            Ok(())
        })
    }

    async fn get(&self, id: Uuid) -> CdResult<Option<Habit>> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT id, title, category, description, image_url,
                     owner_id, owner_email, owner_name, created_at
                     FROM habits WHERE id = ?1",
                )
                .map_err(|e| CadenceError::Storage(e.to_string()))?;

            let habit = stmt
                .query_row(params![id.to_string()], Self::row_to_habit)
                .optional()
                .map_err(|e| CadenceError::Storage(e.to_string()))?;

            if let Some(mut habit) = habit {
                habit.completion_history = Self::load_completions(conn, habit.id)?;
                Ok(Some(habit))
            } else {
                Ok(None)
            }
        })
    }

    async fn update(&self, habit: &Habit) -> CdResult<()> {
        self.with_conn(|conn| {
            let rows = conn
                .execute(
                    "UPDATE habits SET title = ?2, category = ?3, description = ?4,
                     image_url = ?5 WHERE id = ?1",
                    params![
                        habit.id.to_string(),
                        habit.title,
                        habit.category,
                        habit.description,
                        habit.image_url,
                    ],
                )
                .map_err(|e| CadenceError::Storage(format!("update failed: {e}")))?;

            if rows == 0 {
                return Err(CadenceError::HabitNotFound(habit.id));
            }
            Ok(())
        })
    }

    async fn delete(&self, id: Uuid) -> CdResult<bool> {
        self.with_conn(|conn| {
            let rows = conn
                .execute("DELETE FROM habits WHERE id = ?1", params![id.to_string()])
                .map_err(|e| CadenceError::Storage(format!("delete failed: {e}")))?;
            Ok(rows > 0)
        })
    }

    async fn list(
        &self,
        filter: &HabitFilter,
        limit: Option<usize>,
        offset: usize,
    ) -> CdResult<Vec<Habit>> {
        self.with_conn(|conn| {
            let mut sql = String::from(
                "SELECT id, title, category, description, image_url,
                 owner_id, owner_email, owner_name, created_at
                 FROM habits WHERE 1=1",
            );
            let mut param_values: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();
            let mut param_idx = 1;

            if let Some(owner) = filter.owner {
                sql.push_str(&format!(" AND owner_id = ?{param_idx}"));
                param_values.push(Box::new(owner.to_string()));
                param_idx += 1;
            }

            if let Some(ref search) = filter.search {
                sql.push_str(&format!(" AND LOWER(title) LIKE ?{param_idx} ESCAPE '\\'"));
                param_values.push(Box::new(format!(
                    "%{}%",
                    escape_like(&search.to_lowercase())
                )));
                param_idx += 1;
            }

            if let Some(ref categories) = filter.categories {
                if !categories.is_empty() {
                    let placeholders: Vec<String> = categories
                        .iter()
                        .map(|_| {
                            let p = format!("?{param_idx}");
                            param_idx += 1;
                            p
                        })
                        .collect();
                    sql.push_str(&format!(" AND category IN ({})", placeholders.join(",")));
                    for category in categories {
                        param_values.push(Box::new(category.clone()));
                    }
                }
            }

            sql.push_str(&format!(
                " ORDER BY created_at DESC LIMIT ?{param_idx} OFFSET ?{}",
                param_idx + 1
            ));
            // SQLite treats a negative LIMIT as "no limit".
            param_values.push(Box::new(limit.map_or(-1, |n| n as i64)));
            param_values.push(Box::new(offset as i64));

            let params_refs: Vec<&dyn rusqlite::types::ToSql> =
                param_values.iter().map(|p| p.as_ref()).collect();

            let mut stmt = conn
                .prepare(&sql)
                .map_err(|e| CadenceError::Storage(e.to_string()))?;
            let rows = stmt
                .query_map(params_refs.as_slice(), Self::row_to_habit)
                .map_err(|e| CadenceError::Storage(e.to_string()))?;

            let mut habits = Vec::new();
            for row in rows {
                let mut habit = row.map_err(|e| CadenceError::Storage(e.to_string()))?;
                habit.completion_history = Self::load_completions(conn, habit.id)?;
                habits.push(habit);
            }

            Ok(habits)
        })
    }

    async fn mark_completed(&self, id: Uuid, day: NaiveDate) -> CdResult<bool> {
        self.with_conn(|conn| {
            // Conditional append in one statement. Concurrent duplicate
            // requests race on the (habit_id, day) primary key and at
            // most one of them changes a row.
            let rows = conn
                .execute(
                    "INSERT INTO habit_completions (habit_id, day) VALUES (?1, ?2)
                     ON CONFLICT(habit_id, day) DO NOTHING",
                    params![id.to_string(), day.to_string()],
                )
                .map_err(|e| CadenceError::Storage(format!("mark completed failed: {e}")))?;
            Ok(rows > 0)
        })
    }
}

#[async_trait]
impl UserStore for SqliteStore {
    async fn insert_user(&self, user: &User) -> CdResult<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (id, email, display_name, photo_url, token_hash, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    user.id.to_string(),
                    user.email,
                    user.display_name,
                    user.photo_url,
                    user.token_hash,
                    user.created_at.to_rfc3339(),
                ],
            )
            .map_err(|e| CadenceError::Storage(format!("insert user failed: {e}")))?;
            Ok(())
        })
    }

    async fn find_user_by_email(&self, email: &str) -> CdResult<Option<User>> {
        self.find_user_where("email", email)
    }

    async fn find_user_by_token_hash(&self, token_hash: &str) -> CdResult<Option<User>> {
        self.find_user_where("token_hash", token_hash)
    }
}

fn parse_uuid_str(column: usize, s: &str) -> rusqlite::Result<Uuid> {
    Uuid::parse_str(s)
        .map_err(|err| rusqlite::Error::FromSqlConversionFailure(column, Type::Text, Box::new(err)))
}

fn parse_dt_strict(column: usize, s: &str) -> rusqlite::Result<chrono::DateTime<Utc>> {
    chrono::DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|err| rusqlite::Error::FromSqlConversionFailure(column, Type::Text, Box::new(err)))
}

fn parse_day_str(column: usize, s: &str) -> rusqlite::Result<NaiveDate> {
    s.parse::<NaiveDate>()
        .map_err(|err| rusqlite::Error::FromSqlConversionFailure(column, Type::Text, Box::new(err)))
}

/// Escape `%`, `_`, and `\` so user text is always a literal substring
/// in a LIKE pattern.
fn escape_like(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
