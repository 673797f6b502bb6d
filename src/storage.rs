use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use chrono::Utc;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::model::{Post, SortMode, Subscription};

pub const DEFAULT_SUBREDDIT: &str = "r/technology";

/// The durable entries the app keeps. Each value is stored as JSON text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    Subscriptions,
    SelectedSubreddit,
    SavedPosts,
    Sort,
}

impl Key {
    pub const ALL: [Key; 4] = [
        Key::Subscriptions,
        Key::SelectedSubreddit,
        Key::SavedPosts,
        Key::Sort,
    ];

    fn as_str(&self) -> &'static str {
        match self {
            Key::Subscriptions => "subreddits",
            Key::SelectedSubreddit => "selectedSubreddit",
            Key::SavedPosts => "savedPosts",
            Key::Sort => "sort",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
    defaults: Defaults,
}

/// Values a key falls back to when nothing has been written yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Defaults {
    pub subreddit: String,
    pub sort: SortMode,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            subreddit: DEFAULT_SUBREDDIT.to_string(),
            sort: SortMode::default(),
        }
    }
}

impl Defaults {
    pub fn subscriptions(&self) -> Vec<Subscription> {
        vec![Subscription {
            display_name: self.subreddit.clone(),
            canonical_path: None,
        }]
    }
}

#[derive(Debug, Default, Clone)]
pub struct Options {
    pub path: Option<PathBuf>,
    pub defaults: Defaults,
}

impl Store {
    pub fn open(opts: Options) -> Result<Self> {
        let path = if let Some(path) = opts.path {
            path
        } else {
            default_path().context("storage: resolve default path")?
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("storage: create directory {}", parent.display()))?;
        }

        let conn = Connection::open(&path)
            .with_context(|| format!("storage: open database at {}", path.display()))?;
        conn.pragma_update(None, "journal_mode", "WAL")
            .context("storage: set WAL")?;
        conn.pragma_update(None, "busy_timeout", 5000)
            .context("storage: set busy timeout")?;
        migrate(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            defaults: opts.defaults,
        })
    }

    pub fn open_in_memory(defaults: Defaults) -> Result<Self> {
        let conn = Connection::open_in_memory().context("storage: open in-memory database")?;
        migrate(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            defaults,
        })
    }

    pub fn defaults(&self) -> &Defaults {
        &self.defaults
    }

    fn get_raw(&self, key: Key) -> Result<Option<String>> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT value FROM preferences WHERE key = ?1",
            params![key.as_str()],
            |row| row.get(0),
        )
        .optional()
        .with_context(|| format!("storage: read {}", key.as_str()))
    }

    fn set_raw(&self, key: Key, value: &str) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            r#"
INSERT INTO preferences (key, value, updated_at)
VALUES (?1, ?2, ?3)
ON CONFLICT(key) DO UPDATE SET
  value = excluded.value,
  updated_at = excluded.updated_at
"#,
            params![key.as_str(), value, Utc::now().timestamp()],
        )
        .with_context(|| format!("storage: write {}", key.as_str()))?;
        debug!(key = key.as_str(), bytes = value.len(), "preference written");
        Ok(())
    }

    /// Reads and decodes a JSON value. A value that no longer decodes is
    /// treated as absent so a bad entry never blocks startup.
    fn get_json<T: DeserializeOwned>(&self, key: Key) -> Result<Option<T>> {
        let Some(raw) = self.get_raw(key)? else {
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(value) => Ok(Some(value)),
            Err(err) => {
                warn!(key = key.as_str(), error = %err, "discarding undecodable preference");
                Ok(None)
            }
        }
    }

    fn set_json<T: Serialize + ?Sized>(&self, key: Key, value: &T) -> Result<()> {
        let raw = serde_json::to_string(value)
            .with_context(|| format!("storage: encode {}", key.as_str()))?;
        self.set_raw(key, &raw)
    }

    pub fn subscriptions(&self) -> Result<Vec<Subscription>> {
        Ok(self
            .get_json(Key::Subscriptions)?
            .unwrap_or_else(|| self.defaults.subscriptions()))
    }

    pub fn set_subscriptions(&self, subscriptions: &[Subscription]) -> Result<()> {
        self.set_json(Key::Subscriptions, subscriptions)
    }

    pub fn selected_subreddit(&self) -> Result<String> {
        Ok(self
            .get_json::<String>(Key::SelectedSubreddit)?
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| self.defaults.subreddit.clone()))
    }

    pub fn set_selected_subreddit(&self, name: &str) -> Result<()> {
        self.set_json(Key::SelectedSubreddit, name)
    }

    pub fn saved_posts(&self) -> Result<Vec<Post>> {
        Ok(self.get_json(Key::SavedPosts)?.unwrap_or_default())
    }

    pub fn set_saved_posts(&self, posts: &[Post]) -> Result<()> {
        self.set_json(Key::SavedPosts, posts)
    }

    pub fn sort(&self) -> Result<SortMode> {
        Ok(self.get_json(Key::Sort)?.unwrap_or(self.defaults.sort))
    }

    pub fn set_sort(&self, sort: SortMode) -> Result<()> {
        self.set_json(Key::Sort, &sort)
    }

    /// Resets every key to its default. Callers confirm with the user first.
    pub fn clear_all(&self) -> Result<()> {
        let conn = self.conn.lock();
        for key in Key::ALL {
            conn.execute(
                "DELETE FROM preferences WHERE key = ?1",
                params![key.as_str()],
            )
            .with_context(|| format!("storage: clear {}", key.as_str()))?;
        }
        debug!("preferences cleared");
        Ok(())
    }
}

fn migrate(conn: &Connection) -> Result<()> {
    conn.execute(
        r#"
CREATE TABLE IF NOT EXISTS schema_migrations (
  version INTEGER PRIMARY KEY,
  applied_at INTEGER NOT NULL
)
"#,
        [],
    )?;

    let current: i64 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )
        .unwrap_or(0);

    for (idx, sql) in migrations().iter().enumerate() {
        let version = (idx + 1) as i64;
        if version <= current {
            continue;
        }
        conn.execute_batch(sql)?;
        conn.execute(
            "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
            params![
                version,
                SystemTime::now()
                    .duration_since(UNIX_EPOCH)
                    .unwrap_or(Duration::from_secs(0))
                    .as_secs() as i64,
            ],
        )?;
    }
    Ok(())
}

fn migrations() -> Vec<&'static str> {
    vec![
        r#"
CREATE TABLE IF NOT EXISTS preferences (
  key TEXT PRIMARY KEY,
  value TEXT NOT NULL,
  updated_at INTEGER NOT NULL
);
"#,
    ]
}

pub fn default_path() -> Option<PathBuf> {
    dirs::data_dir().map(|dir| dir.join("zennit").join("preferences.db"))
}
