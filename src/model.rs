use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A post as the app keeps it, normalized from a listing entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    pub title: String,
    pub author: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub url: Option<String>,
    pub subreddit: String,
    #[serde(default)]
    pub created_at: i64,
    #[serde(default)]
    pub gallery_data: Option<GalleryData>,
    #[serde(default)]
    pub media_metadata: Option<BTreeMap<String, MediaMetadata>>,
    #[serde(default)]
    pub is_pinned: bool,
    #[serde(default)]
    pub upvote_score: i64,
    #[serde(default)]
    pub media: Option<Media>,
}

impl Post {
    /// Canonical discussion URL used when sharing.
    pub fn share_url(&self) -> String {
        let subreddit = self.subreddit.trim().trim_matches('/');
        if subreddit.starts_with("r/") {
            format!("https://www.reddit.com/{}/comments/{}/", subreddit, self.id)
        } else {
            format!("https://www.reddit.com/comments/{}/", self.id)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GalleryData {
    #[serde(default)]
    pub items: Vec<GalleryItem>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GalleryItem {
    pub media_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct MediaMetadata {
    #[serde(default, rename = "s")]
    pub source: MediaSource,
}

impl MediaMetadata {
    pub fn best_url(&self) -> Option<&str> {
        self.source
            .url
            .as_deref()
            .or(self.source.gif.as_deref())
            .filter(|url| !url.trim().is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct MediaSource {
    #[serde(default, rename = "u")]
    pub url: Option<String>,
    #[serde(default)]
    pub gif: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Media {
    #[serde(default)]
    pub video: Option<Video>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Video {
    pub fallback_url: String,
}

/// A node in a comment tree.
#[derive(Debug, Clone, PartialEq)]
pub struct Comment {
    pub author: String,
    pub body: String,
    pub media_metadata: Option<BTreeMap<String, MediaMetadata>>,
    pub is_pinned: bool,
    pub upvote_score: i64,
    pub replies: Vec<Comment>,
    pub is_visible: bool,
}

impl Comment {
    /// Walks an index path from a list of roots down to one node.
    pub fn at_path_mut<'a>(roots: &'a mut [Comment], path: &[usize]) -> Option<&'a mut Comment> {
        let (first, rest) = path.split_first()?;
        let mut node = roots.get_mut(*first)?;
        for index in rest {
            node = node.replies.get_mut(*index)?;
        }
        Some(node)
    }

    pub fn descendant_count(&self) -> usize {
        self.replies
            .iter()
            .map(|reply| 1 + reply.descendant_count())
            .sum()
    }
}

/// One of the three listing shapes Reddit can serve.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FeedTarget {
    Subreddit(String),
    User(String),
    Multi { user: String, name: String },
}

impl FeedTarget {
    /// Parses `r/x`, `u/x`, `user/x/m/y` (with or without a leading slash).
    /// A bare name is read as a subreddit.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim().trim_matches('/');
        if trimmed.is_empty() {
            return None;
        }
        let parts: Vec<&str> = trimmed.split('/').filter(|p| !p.is_empty()).collect();
        match parts.as_slice() {
            [prefix, name] if prefix.eq_ignore_ascii_case("r") => {
                Some(FeedTarget::Subreddit((*name).to_string()))
            }
            [prefix, name] if prefix.eq_ignore_ascii_case("u") || prefix.eq_ignore_ascii_case("user") => {
                Some(FeedTarget::User((*name).to_string()))
            }
            [prefix, user, m, name]
                if (prefix.eq_ignore_ascii_case("user") || prefix.eq_ignore_ascii_case("u"))
                    && m.eq_ignore_ascii_case("m") =>
            {
                Some(FeedTarget::Multi {
                    user: (*user).to_string(),
                    name: (*name).to_string(),
                })
            }
            [name] if is_plain_name(name) => Some(FeedTarget::Subreddit((*name).to_string())),
            _ => None,
        }
    }

    pub fn display_name(&self) -> String {
        match self {
            FeedTarget::Subreddit(name) => format!("r/{name}"),
            FeedTarget::User(name) => format!("u/{name}"),
            FeedTarget::Multi { name, .. } => format!("m/{name}"),
        }
    }

    pub fn canonical_path(&self) -> Option<String> {
        match self {
            FeedTarget::Multi { user, name } => Some(format!("user/{user}/m/{name}")),
            _ => None,
        }
    }
}

fn is_plain_name(name: &str) -> bool {
    name.chars()
        .all(|ch| ch.is_ascii_alphanumeric() || ch == '_' || ch == '-')
}

/// A subscribed feed as stored in preferences.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub canonical_path: Option<String>,
}

impl Subscription {
    pub fn from_target(target: &FeedTarget) -> Self {
        Self {
            display_name: target.display_name(),
            canonical_path: target.canonical_path(),
        }
    }

    /// The identifier the Reddit client understands for this subscription.
    pub fn target(&self) -> Option<FeedTarget> {
        self.canonical_path
            .as_deref()
            .and_then(FeedTarget::parse)
            .or_else(|| FeedTarget::parse(&self.display_name))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SortMode {
    #[default]
    Hot,
    New,
    Top,
    Rising,
}

impl SortMode {
    pub const ALL: [SortMode; 4] = [SortMode::Hot, SortMode::New, SortMode::Top, SortMode::Rising];

    pub fn as_str(&self) -> &'static str {
        match self {
            SortMode::Hot => "hot",
            SortMode::New => "new",
            SortMode::Top => "top",
            SortMode::Rising => "rising",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SortMode::Hot => "Hot",
            SortMode::New => "New",
            SortMode::Top => "Top",
            SortMode::Rising => "Rising",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CommentSort {
    #[default]
    Best,
    Top,
    New,
    Controversial,
}

impl CommentSort {
    pub const ALL: [CommentSort; 4] = [
        CommentSort::Best,
        CommentSort::Top,
        CommentSort::New,
        CommentSort::Controversial,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CommentSort::Best => "best",
            CommentSort::Top => "top",
            CommentSort::New => "new",
            CommentSort::Controversial => "controversial",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            CommentSort::Best => "Best",
            CommentSort::Top => "Top",
            CommentSort::New => "New",
            CommentSort::Controversial => "Controversial",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unrecognized sort option {0:?}")]
pub struct UnknownSort(pub String);

impl FromStr for SortMode {
    type Err = UnknownSort;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SortMode::ALL
            .into_iter()
            .find(|mode| mode.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownSort(s.to_string()))
    }
}

impl FromStr for CommentSort {
    type Err = UnknownSort;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CommentSort::ALL
            .into_iter()
            .find(|mode| mode.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownSort(s.to_string()))
    }
}

impl fmt::Display for SortMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for CommentSort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
