//! Local SQLite store for training sessions, profiles and follow relations.
//!
//! Sessions are partitioned per user; a session id is only unique within its
//! owner's partition.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::{Context, Result, anyhow, bail};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};

use crate::debug_log::{self, Timed};
use crate::types::{
    ProfileColor, ProfileUpdate, SessionId, TrainingSession, UserId, UserProfile,
};
use crate::utils::{format_timestamp, hash_text, parse_timestamp};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS sessions (
    user_id    TEXT NOT NULL,
    id         TEXT NOT NULL,
    start_time TEXT NOT NULL,
    end_time   TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    PRIMARY KEY (user_id, id)
);
CREATE INDEX IF NOT EXISTS sessions_by_created ON sessions (user_id, created_at);

CREATE TABLE IF NOT EXISTS profiles (
    user_id       TEXT PRIMARY KEY,
    name          TEXT,
    email         TEXT,
    place         TEXT,
    height_cm     REAL,
    weight_kg     REAL,
    profile_color TEXT,
    created_at    TEXT NOT NULL,
    updated_at    TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS following (
    user_id     TEXT NOT NULL,
    target_id   TEXT NOT NULL,
    followed_at TEXT NOT NULL,
    PRIMARY KEY (user_id, target_id)
);
";

static SESSION_COUNTER: AtomicU64 = AtomicU64::new(0);

pub struct Store {
    conn: Connection,
}

/// Session row as stored, before timestamp parsing.
struct SessionRow {
    id: String,
    start_time: String,
    end_time: Option<String>,
    created_at: String,
    updated_at: String,
}

struct ProfileRow {
    name: Option<String>,
    email: Option<String>,
    place: Option<String>,
    height_cm: Option<f64>,
    weight_kg: Option<f64>,
    profile_color: Option<String>,
    created_at: String,
    updated_at: String,
}

/// Current time at the millisecond precision the store persists.
pub fn now_millis() -> DateTime<Utc> {
    let now = Utc::now();
    DateTime::from_timestamp_millis(now.timestamp_millis()).unwrap_or(now)
}

fn parse_required(ts: &str, field: &str) -> Result<DateTime<Utc>> {
    parse_timestamp(ts).with_context(|| format!("Invalid {field} timestamp in store: {ts}"))
}

impl Store {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create data directory {}", parent.display())
            })?;
        }

        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database {}", path.display()))?;
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)
            .context("Failed to initialize database schema")?;
        Ok(Self { conn })
    }

    // ------------------------------------------------------------------
    // Sessions
    // ------------------------------------------------------------------

    pub fn start_training(&self, user: &UserId) -> Result<SessionId> {
        self.start_training_at(user, now_millis())
    }

    pub fn start_training_at(&self, user: &UserId, at: DateTime<Utc>) -> Result<SessionId> {
        let _timed = Timed::new("STORE", format!("start_training {user}"));
        let id = new_session_id(user, &at);
        let ts = format_timestamp(&at);

        self.conn
            .execute(
                "INSERT INTO sessions (user_id, id, start_time, end_time, created_at, updated_at)
                 VALUES (?1, ?2, ?3, NULL, ?3, ?3)",
                params![user.as_str(), id.as_str(), ts],
            )
            .context("Failed to start training")?;

        Ok(id)
    }

    pub fn finish_training(&self, user: &UserId, session: &SessionId) -> Result<()> {
        self.finish_training_at(user, session, now_millis())
    }

    /// Record the end of a started session. Finishing again overwrites the
    /// previous end time.
    pub fn finish_training_at(
        &self,
        user: &UserId,
        session: &SessionId,
        at: DateTime<Utc>,
    ) -> Result<()> {
        let _timed = Timed::new("STORE", format!("finish_training {user}/{session}"));
        let ts = format_timestamp(&at);

        let changed = self
            .conn
            .execute(
                "UPDATE sessions SET end_time = ?1, updated_at = ?1
                 WHERE user_id = ?2 AND id = ?3",
                params![ts, user.as_str(), session.as_str()],
            )
            .context("Failed to finish training")?;

        if changed == 0 {
            bail!("Training session {session} not found for user {user}");
        }
        Ok(())
    }

    /// All sessions of `user`, newest first.
    pub fn list_sessions(&self, user: &UserId) -> Result<Vec<TrainingSession>> {
        let _timed = Timed::new("STORE", format!("list_sessions {user}"));
        let mut stmt = self.conn.prepare(
            "SELECT id, start_time, end_time, created_at, updated_at
             FROM sessions
             WHERE user_id = ?1
             ORDER BY created_at DESC, rowid DESC",
        )?;

        let rows = stmt
            .query_map([user.as_str()], |row| {
                Ok(SessionRow {
                    id: row.get(0)?,
                    start_time: row.get(1)?,
                    end_time: row.get(2)?,
                    created_at: row.get(3)?,
                    updated_at: row.get(4)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to fetch training sessions")?;

        rows.into_iter()
            .map(|row| session_from_row(user, row))
            .collect()
    }

    /// The most recently started session that has not been finished yet.
    pub fn active_session(&self, user: &UserId) -> Result<Option<TrainingSession>> {
        let row = self
            .conn
            .query_row(
                "SELECT id, start_time, end_time, created_at, updated_at
                 FROM sessions
                 WHERE user_id = ?1 AND end_time IS NULL
                 ORDER BY created_at DESC, rowid DESC
                 LIMIT 1",
                [user.as_str()],
                |row| {
                    Ok(SessionRow {
                        id: row.get(0)?,
                        start_time: row.get(1)?,
                        end_time: row.get(2)?,
                        created_at: row.get(3)?,
                        updated_at: row.get(4)?,
                    })
                },
            )
            .optional()
            .context("Failed to look up active session")?;

        row.map(|row| session_from_row(user, row)).transpose()
    }

    // ------------------------------------------------------------------
    // Profiles
    // ------------------------------------------------------------------

    pub fn get_profile(&self, user: &UserId) -> Result<Option<UserProfile>> {
        let row = self
            .conn
            .query_row(
                "SELECT name, email, place, height_cm, weight_kg, profile_color,
                        created_at, updated_at
                 FROM profiles WHERE user_id = ?1",
                [user.as_str()],
                |row| {
                    Ok(ProfileRow {
                        name: row.get(0)?,
                        email: row.get(1)?,
                        place: row.get(2)?,
                        height_cm: row.get(3)?,
                        weight_kg: row.get(4)?,
                        profile_color: row.get(5)?,
                        created_at: row.get(6)?,
                        updated_at: row.get(7)?,
                    })
                },
            )
            .optional()
            .context("Failed to fetch user data")?;

        let Some(row) = row else {
            return Ok(None);
        };

        let profile_color = match row.profile_color.as_deref() {
            Some(color) => match color.parse::<ProfileColor>() {
                Ok(c) => Some(c),
                Err(_) => {
                    debug_log::log("STORE", "profile_color", &format!("ignoring {color}"));
                    None
                }
            },
            None => None,
        };

        Ok(Some(UserProfile {
            user_id: user.clone(),
            name: row.name,
            email: row.email,
            place: row.place,
            height_cm: row.height_cm,
            weight_kg: row.weight_kg,
            profile_color,
            created_at: parse_required(&row.created_at, "created_at")?,
            updated_at: parse_required(&row.updated_at, "updated_at")?,
        }))
    }

    /// Create the profile on first write, otherwise apply only the provided fields.
    pub fn upsert_profile(&self, user: &UserId, update: ProfileUpdate) -> Result<UserProfile> {
        let now = now_millis();
        let profile = match self.get_profile(user)? {
            Some(mut existing) => {
                if update.name.is_some() {
                    existing.name = update.name;
                }
                if update.email.is_some() {
                    existing.email = update.email;
                }
                if update.place.is_some() {
                    existing.place = update.place;
                }
                if update.height_cm.is_some() {
                    existing.height_cm = update.height_cm;
                }
                if update.weight_kg.is_some() {
                    existing.weight_kg = update.weight_kg;
                }
                if update.profile_color.is_some() {
                    existing.profile_color = update.profile_color;
                }
                existing.updated_at = now;
                existing
            }
            None => UserProfile {
                user_id: user.clone(),
                name: update.name,
                email: update.email,
                place: update.place,
                height_cm: update.height_cm,
                weight_kg: update.weight_kg,
                profile_color: update.profile_color,
                created_at: now,
                updated_at: now,
            },
        };

        self.conn
            .execute(
                "INSERT INTO profiles
                    (user_id, name, email, place, height_cm, weight_kg, profile_color,
                     created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                 ON CONFLICT(user_id) DO UPDATE SET
                    name = excluded.name,
                    email = excluded.email,
                    place = excluded.place,
                    height_cm = excluded.height_cm,
                    weight_kg = excluded.weight_kg,
                    profile_color = excluded.profile_color,
                    updated_at = excluded.updated_at",
                params![
                    user.as_str(),
                    profile.name,
                    profile.email,
                    profile.place,
                    profile.height_cm,
                    profile.weight_kg,
                    profile.profile_color.map(|c| c.as_str()),
                    format_timestamp(&profile.created_at),
                    format_timestamp(&profile.updated_at),
                ],
            )
            .context("Failed to update user data")?;

        Ok(profile)
    }

    pub fn delete_profile(&self, user: &UserId) -> Result<bool> {
        let deleted = self
            .conn
            .execute("DELETE FROM profiles WHERE user_id = ?1", [user.as_str()])
            .context("Failed to delete user data")?;
        Ok(deleted > 0)
    }

    // ------------------------------------------------------------------
    // Following
    // ------------------------------------------------------------------

    /// Follow `target`. Following someone twice keeps the original follow time.
    pub fn follow(&self, user: &UserId, target: &UserId) -> Result<()> {
        if user == target {
            return Err(anyhow!("Users cannot follow themselves"));
        }

        self.conn
            .execute(
                "INSERT INTO following (user_id, target_id, followed_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(user_id, target_id) DO NOTHING",
                params![user.as_str(), target.as_str(), format_timestamp(&Utc::now())],
            )
            .with_context(|| format!("Failed to follow {target}"))?;
        Ok(())
    }

    pub fn unfollow(&self, user: &UserId, target: &UserId) -> Result<bool> {
        let removed = self
            .conn
            .execute(
                "DELETE FROM following WHERE user_id = ?1 AND target_id = ?2",
                params![user.as_str(), target.as_str()],
            )
            .with_context(|| format!("Failed to unfollow {target}"))?;
        Ok(removed > 0)
    }

    pub fn is_following(&self, user: &UserId, target: &UserId) -> Result<bool> {
        let found: Option<i64> = self
            .conn
            .query_row(
                "SELECT 1 FROM following WHERE user_id = ?1 AND target_id = ?2",
                params![user.as_str(), target.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// Followed user ids, oldest follow first.
    pub fn following_list(&self, user: &UserId) -> Result<Vec<UserId>> {
        let mut stmt = self.conn.prepare(
            "SELECT target_id FROM following WHERE user_id = ?1
             ORDER BY followed_at, rowid",
        )?;

        let ids = stmt
            .query_map([user.as_str()], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to fetch following list")?;

        Ok(ids.into_iter().map(UserId).collect())
    }
}

fn session_from_row(user: &UserId, row: SessionRow) -> Result<TrainingSession> {
    let end_time = match row.end_time.as_deref() {
        Some(ts) => Some(parse_required(ts, "end_time")?),
        None => None,
    };

    Ok(TrainingSession {
        id: SessionId(row.id),
        user_id: user.clone(),
        start_time: parse_required(&row.start_time, "start_time")?,
        end_time,
        created_at: parse_required(&row.created_at, "created_at")?,
        updated_at: parse_required(&row.updated_at, "updated_at")?,
    })
}

fn new_session_id(user: &UserId, at: &DateTime<Utc>) -> SessionId {
    let counter = SESSION_COUNTER.fetch_add(1, Ordering::Relaxed);
    let nanos = at.timestamp_nanos_opt().unwrap_or_else(|| at.timestamp());
    let seed = format!("{user}:{nanos}:{counter}:{}", std::process::id());
    SessionId(hash_text(&seed)[..20].to_string())
}
