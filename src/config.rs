use std::collections::HashMap;
use std::env;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::warn;

use crate::model::{CommentSort, SortMode};

const DEFAULT_ENV_PREFIX: &str = "ZENNIT";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Config {
    #[serde(default)]
    pub reddit: RedditConfig,
    #[serde(default)]
    pub feed: FeedConfig,
    #[serde(default)]
    pub ui: UIConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RedditConfig {
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub timeout: Duration,
    #[serde(default = "default_count")]
    pub count: u32,
}

impl Default for RedditConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            base_url: default_base_url(),
            timeout: default_timeout(),
            count: default_count(),
        }
    }
}

fn default_user_agent() -> String {
    format!("zennit/{}", crate::VERSION)
}

fn default_base_url() -> String {
    crate::reddit::DEFAULT_BASE_URL.to_string()
}

fn default_timeout() -> Duration {
    Duration::from_secs(20)
}

fn default_count() -> u32 {
    crate::reddit::DEFAULT_LISTING_COUNT
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FeedConfig {
    #[serde(default = "default_subreddit")]
    pub default_subreddit: String,
    #[serde(default, deserialize_with = "lenient_sort")]
    pub sort: SortMode,
    #[serde(default, deserialize_with = "lenient_sort")]
    pub comment_sort: CommentSort,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            default_subreddit: default_subreddit(),
            sort: SortMode::default(),
            comment_sort: CommentSort::default(),
        }
    }
}

/// Unknown sort names fall back to the default instead of failing the load.
fn lenient_sort<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr + Default,
    T::Err: fmt::Display,
{
    let raw = String::deserialize(deserializer)?;
    Ok(raw.parse().unwrap_or_else(|err| {
        warn!(value = %raw, error = %err, "ignoring unrecognized sort");
        T::default()
    }))
}

fn default_subreddit() -> String {
    crate::storage::DEFAULT_SUBREDDIT.to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UIConfig {
    #[serde(default = "default_toast_duration", with = "humantime_serde")]
    pub toast_duration: Duration,
    #[serde(default = "default_date_format")]
    pub date_format: String,
}

impl Default for UIConfig {
    fn default() -> Self {
        Self {
            toast_duration: default_toast_duration(),
            date_format: default_date_format(),
        }
    }
}

fn default_toast_duration() -> Duration {
    crate::state::DEFAULT_TOAST_DURATION
}

fn default_date_format() -> String {
    crate::view::DATE_FORMAT.to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct StorageConfig {
    #[serde(default)]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    pub config_file: Option<PathBuf>,
    pub env_prefix: Option<String>,
}

pub fn load(options: LoadOptions) -> Result<Config> {
    let mut cfg = Config::default();

    if let Some(path) = options.config_file.as_ref() {
        anyhow::ensure!(
            path.exists(),
            "config: file {} does not exist",
            path.display()
        );
        cfg = merge_config(cfg, read_config_file(path)?);
    } else if let Some(default_path) = default_config_path() {
        if default_path.exists() {
            cfg = merge_config(cfg, read_config_file(&default_path)?);
        }
    }

    let prefix = options.env_prefix.as_deref().unwrap_or(DEFAULT_ENV_PREFIX);
    cfg = merge_config(cfg, load_env(prefix));

    Ok(cfg)
}

fn read_config_file(path: &Path) -> Result<Config> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file at {}", path.display()))?;
    let config: Config = serde_yaml::from_str(&data)
        .with_context(|| format!("Failed to parse config file at {}", path.display()))?;
    Ok(config)
}

/// Overlays every field of `other` that differs from the built-in default.
fn merge_config(mut base: Config, other: Config) -> Config {
    let defaults = Config::default();

    if !other.reddit.user_agent.is_empty() && other.reddit.user_agent != defaults.reddit.user_agent
    {
        base.reddit.user_agent = other.reddit.user_agent;
    }
    if !other.reddit.base_url.is_empty() && other.reddit.base_url != defaults.reddit.base_url {
        base.reddit.base_url = other.reddit.base_url;
    }
    if other.reddit.timeout != defaults.reddit.timeout {
        base.reddit.timeout = other.reddit.timeout;
    }
    if other.reddit.count != 0 && other.reddit.count != defaults.reddit.count {
        base.reddit.count = other.reddit.count;
    }

    if !other.feed.default_subreddit.trim().is_empty()
        && other.feed.default_subreddit != defaults.feed.default_subreddit
    {
        base.feed.default_subreddit = other.feed.default_subreddit;
    }
    if other.feed.sort != defaults.feed.sort {
        base.feed.sort = other.feed.sort;
    }
    if other.feed.comment_sort != defaults.feed.comment_sort {
        base.feed.comment_sort = other.feed.comment_sort;
    }

    if other.ui.toast_duration != defaults.ui.toast_duration {
        base.ui.toast_duration = other.ui.toast_duration;
    }
    if !other.ui.date_format.is_empty() && other.ui.date_format != defaults.ui.date_format {
        base.ui.date_format = other.ui.date_format;
    }

    if other.storage.path.is_some() {
        base.storage.path = other.storage.path;
    }

    base
}

fn load_env(prefix: &str) -> Config {
    let mut map: HashMap<String, String> = HashMap::new();
    let upper_prefix = format!("{}_", prefix.to_uppercase());

    for (key, value) in env::vars() {
        if let Some(stripped) = key.strip_prefix(&upper_prefix) {
            let normalized = stripped.to_ascii_lowercase().replace("__", ".");
            map.insert(normalized, value);
        }
    }

    let mut cfg = Config::default();
    for (key, value) in map {
        apply_env_value(&mut cfg, &key, value);
    }
    cfg
}

fn apply_env_value(cfg: &mut Config, key: &str, value: String) {
    match key {
        "reddit.user_agent" => cfg.reddit.user_agent = value,
        "reddit.base_url" => cfg.reddit.base_url = value,
        "reddit.timeout" => match humantime::parse_duration(&value) {
            Ok(duration) => cfg.reddit.timeout = duration,
            Err(err) => warn!(key, error = %err, "ignoring invalid duration"),
        },
        "reddit.count" => {
            if let Ok(parsed) = value.parse::<u32>() {
                cfg.reddit.count = parsed;
            }
        }
        "feed.default_subreddit" => cfg.feed.default_subreddit = value,
        "feed.sort" => match value.parse() {
            Ok(sort) => cfg.feed.sort = sort,
            Err(err) => warn!(key, error = %err, "ignoring invalid sort"),
        },
        "feed.comment_sort" => match value.parse() {
            Ok(sort) => cfg.feed.comment_sort = sort,
            Err(err) => warn!(key, error = %err, "ignoring invalid comment sort"),
        },
        "ui.toast_duration" => match humantime::parse_duration(&value) {
            Ok(duration) => cfg.ui.toast_duration = duration,
            Err(err) => warn!(key, error = %err, "ignoring invalid duration"),
        },
        "ui.date_format" => cfg.ui.date_format = value,
        "storage.path" => cfg.storage.path = Some(PathBuf::from(value)),
        _ => {}
    }
}

pub fn default_path() -> Option<PathBuf> {
    default_config_path()
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("zennit").join("config.yaml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn isolated() -> LoadOptions {
        LoadOptions {
            config_file: None,
            env_prefix: Some("ZENNIT_TEST_NONE".into()),
        }
    }

    #[test]
    fn defaults_cover_every_section() {
        let cfg = Config::default();
        assert_eq!(cfg.reddit.timeout, Duration::from_secs(20));
        assert_eq!(cfg.reddit.count, 25);
        assert_eq!(cfg.feed.default_subreddit, "r/technology");
        assert_eq!(cfg.ui.toast_duration, Duration::from_secs(3));
        assert!(cfg.storage.path.is_none());
        assert!(load(isolated()).is_ok());
    }

    #[test]
    fn file_values_override_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(
            &path,
            "reddit:\n  timeout: 5s\nfeed:\n  default_subreddit: r/rust\n  sort: top\nui:\n  toast_duration: 1500ms\n",
        )
        .unwrap();
        let cfg = load(LoadOptions {
            config_file: Some(path),
            env_prefix: Some("ZENNIT_TEST_FILE".into()),
        })
        .unwrap();
        assert_eq!(cfg.reddit.timeout, Duration::from_secs(5));
        assert_eq!(cfg.reddit.count, 25);
        assert_eq!(cfg.feed.default_subreddit, "r/rust");
        assert_eq!(cfg.feed.sort, SortMode::Top);
        assert_eq!(cfg.ui.toast_duration, Duration::from_millis(1500));
    }

    #[test]
    fn unknown_sort_in_file_falls_back() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(
            &path,
            "feed:\n  sort: sideways\n  comment_sort: Top\n  default_subreddit: r/rust\n",
        )
        .unwrap();
        let cfg = load(LoadOptions {
            config_file: Some(path),
            env_prefix: Some("ZENNIT_TEST_LENIENT".into()),
        })
        .unwrap();
        assert_eq!(cfg.feed.sort, SortMode::Hot);
        assert_eq!(cfg.feed.comment_sort, CommentSort::Top);
        assert_eq!(cfg.feed.default_subreddit, "r/rust");
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let dir = tempdir().unwrap();
        let err = load(LoadOptions {
            config_file: Some(dir.path().join("absent.yaml")),
            env_prefix: Some("ZENNIT_TEST_ABSENT".into()),
        })
        .unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn env_overrides() {
        env::set_var("ZENNIT_TEST_ENV_FEED__SORT", "rising");
        env::set_var("ZENNIT_TEST_ENV_REDDIT__COUNT", "50");
        env::set_var("ZENNIT_TEST_ENV_FEED__COMMENT_SORT", "sideways");
        let cfg = load(LoadOptions {
            config_file: None,
            env_prefix: Some("ZENNIT_TEST_ENV".into()),
        })
        .unwrap();
        assert_eq!(cfg.feed.sort, SortMode::Rising);
        assert_eq!(cfg.reddit.count, 50);
        assert_eq!(cfg.feed.comment_sort, CommentSort::Best);
        env::remove_var("ZENNIT_TEST_ENV_FEED__SORT");
        env::remove_var("ZENNIT_TEST_ENV_REDDIT__COUNT");
        env::remove_var("ZENNIT_TEST_ENV_FEED__COMMENT_SORT");
    }
}
