//! Declarative screen model derived from [`AppState`].
//!
//! Nothing here touches the terminal. The ui layer draws a [`Screen`] and maps
//! key presses back to intents.

use chrono::{DateTime, TimeZone, Utc};

use crate::content::{self, ContentVariant};
use crate::format::{self, Formatted};
use crate::model::{Comment, CommentSort, Post, SortMode};
use crate::state::{AppState, Popup, View};

pub const DATE_FORMAT: &str = "%m/%d/%Y, %I:%M %p";

#[derive(Debug, Clone, PartialEq)]
pub struct Screen {
    pub header: Header,
    pub banner: Option<String>,
    pub body: Body,
    pub sidebar: Option<Sidebar>,
    pub dialog: Option<Dialog>,
    pub image_overlay: Option<String>,
    pub toast: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub title: String,
    pub sort: SortMode,
    pub show_sort: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    Loading(&'static str),
    Feed(Vec<PostRow>),
    Detail(Box<PostDetail>),
    Saved(Vec<PostRow>),
    Settings(SettingsPanel),
    About(AboutPanel),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostRow {
    pub id: String,
    pub title: String,
    pub author: String,
    pub subreddit: String,
    pub date: String,
    pub score: String,
    pub pinned: bool,
    pub saved: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PostDetail {
    pub row: PostRow,
    pub body: Formatted,
    pub content: ContentVariant,
    pub comment_sort: CommentSort,
    pub loading_comments: bool,
    pub comments: Vec<CommentNode>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CommentNode {
    pub path: Vec<usize>,
    pub depth: usize,
    pub author: String,
    pub score: String,
    pub pinned: bool,
    /// `None` while collapsed.
    pub body: Option<Formatted>,
    pub images: Vec<String>,
    pub hidden_replies: usize,
    pub replies: Vec<CommentNode>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sidebar {
    pub entries: Vec<SidebarEntry>,
    pub edit_mode: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SidebarEntry {
    pub name: String,
    pub selected: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dialog {
    pub message: String,
    pub confirm_label: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingsPanel {
    pub subscriptions: Vec<String>,
    pub selected: String,
    pub saved_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AboutPanel {
    pub version: &'static str,
    pub lines: Vec<&'static str>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewOptions {
    pub date_format: String,
}

impl Default for ViewOptions {
    fn default() -> Self {
        Self {
            date_format: DATE_FORMAT.to_string(),
        }
    }
}

pub fn render(state: &AppState, options: &ViewOptions) -> Screen {
    let body = match &state.view {
        View::Feed if state.loading_posts && state.posts.is_empty() => {
            Body::Loading("Loading posts...")
        }
        View::Feed => Body::Feed(
            state
                .posts
                .iter()
                .map(|post| post_row(state, options, post))
                .collect(),
        ),
        View::PostDetail { post } => Body::Detail(Box::new(post_detail(state, options, post))),
        View::Saved => Body::Saved(
            state
                .saved_posts
                .iter()
                .map(|post| post_row(state, options, post))
                .collect(),
        ),
        View::Settings => Body::Settings(SettingsPanel {
            subscriptions: state
                .subscriptions
                .iter()
                .map(|sub| sub.display_name.clone())
                .collect(),
            selected: state.selected_subreddit.clone(),
            saved_count: state.saved_posts.len(),
        }),
        View::About => Body::About(AboutPanel {
            version: crate::VERSION,
            lines: vec![
                "Zennit is a distraction-free Reddit reader.",
                "Posts and comments are fetched from Reddit's public JSON endpoints.",
                "Subscriptions and saved posts stay on this machine.",
            ],
        }),
    };

    let title = match &state.view {
        View::Feed => state.selected_subreddit.clone(),
        View::PostDetail { post } => post.subreddit.clone(),
        View::Saved => "Saved posts".to_string(),
        View::Settings => "Settings".to_string(),
        View::About => "About".to_string(),
    };

    Screen {
        header: Header {
            title,
            sort: state.sort,
            show_sort: matches!(state.view, View::Feed),
        },
        banner: state.blocked_banner.then(|| {
            "Reddit refused the request. An ad or content blocker may be interfering; press R to reload."
                .to_string()
        }),
        body,
        sidebar: state.sidebar_open.then(|| Sidebar {
            entries: state
                .subscriptions
                .iter()
                .map(|sub| SidebarEntry {
                    name: sub.display_name.clone(),
                    selected: sub.display_name.eq_ignore_ascii_case(&state.selected_subreddit),
                })
                .collect(),
            edit_mode: state.edit_mode,
        }),
        dialog: state.popup.as_ref().map(dialog),
        image_overlay: state.enlarged_image.clone(),
        toast: state.toast.as_ref().map(|toast| toast.message.clone()),
    }
}

fn dialog(popup: &Popup) -> Dialog {
    match popup {
        Popup::RemoveSubscription { display_name } => Dialog {
            message: format!("Remove {display_name} from your subscriptions?"),
            confirm_label: "Remove",
        },
        Popup::DeleteSaved { .. } => Dialog {
            message: "Delete this saved post?".to_string(),
            confirm_label: "Delete",
        },
        Popup::ClearCache => Dialog {
            message: "Clear all subscriptions and saved posts?".to_string(),
            confirm_label: "Clear",
        },
    }
}

fn post_row(state: &AppState, options: &ViewOptions, post: &Post) -> PostRow {
    PostRow {
        id: post.id.clone(),
        title: post.title.clone(),
        author: post.author.clone(),
        subreddit: post.subreddit.clone(),
        date: format_date(post.created_at, &chrono::Local, &options.date_format),
        score: format_score(post.upvote_score),
        pinned: post.is_pinned,
        saved: state.is_saved(&post.id),
    }
}

fn post_detail(state: &AppState, options: &ViewOptions, post: &Post) -> PostDetail {
    PostDetail {
        row: post_row(state, options, post),
        body: format::format(&post.content),
        content: content::resolve(post),
        comment_sort: state.comment_sort,
        loading_comments: state.loading_comments,
        comments: comment_nodes(&state.comments, &[]),
    }
}

/// Builds the render tree for a comment forest. Collapsed nodes keep their
/// header but drop body and replies.
pub fn comment_nodes(comments: &[Comment], parent: &[usize]) -> Vec<CommentNode> {
    comments
        .iter()
        .enumerate()
        .map(|(index, comment)| {
            let mut path = parent.to_vec();
            path.push(index);
            let (body, images, replies) = if comment.is_visible {
                let formatted = format::format(&comment.body);
                let mut images = comment_images(comment);
                for url in &formatted.extracted_image_urls {
                    if !images.contains(url) {
                        images.push(url.clone());
                    }
                }
                let replies = comment_nodes(&comment.replies, &path);
                (Some(formatted), images, replies)
            } else {
                (None, Vec::new(), Vec::new())
            };
            CommentNode {
                depth: parent.len(),
                author: comment.author.clone(),
                score: format_score(comment.upvote_score),
                pinned: comment.is_pinned,
                body,
                images,
                hidden_replies: if comment.is_visible {
                    0
                } else {
                    comment.descendant_count()
                },
                replies,
                path,
            }
        })
        .collect()
}

fn comment_images(comment: &Comment) -> Vec<String> {
    comment
        .media_metadata
        .iter()
        .flat_map(|metadata| metadata.values())
        .filter_map(|entry| entry.best_url())
        .map(content::decode_amp)
        .collect()
}

/// Depth-first visit of every rendered node, parents before children.
pub fn walk_comments<'a>(nodes: &'a [CommentNode], visit: &mut impl FnMut(&'a CommentNode)) {
    for node in nodes {
        visit(node);
        walk_comments(&node.replies, visit);
    }
}

pub fn format_score(score: i64) -> String {
    let sign = if score < 0 { "-" } else { "" };
    let value = score.unsigned_abs();
    let (scaled, suffix) = match value {
        0..=999 => return score.to_string(),
        // Anything that rounds to 1000.0K is shown as millions.
        1_000..=999_949 => (value as f64 / 1_000.0, "K"),
        _ => (value as f64 / 1_000_000.0, "M"),
    };
    let rounded = format!("{scaled:.1}");
    let trimmed = rounded.strip_suffix(".0").unwrap_or(&rounded);
    format!("{sign}{trimmed}{suffix}")
}

pub fn format_date<Tz: TimeZone>(unix_seconds: i64, tz: &Tz, pattern: &str) -> String
where
    Tz::Offset: std::fmt::Display,
{
    match DateTime::<Utc>::from_timestamp(unix_seconds, 0) {
        Some(utc) => utc.with_timezone(tz).format(pattern).to_string(),
        None => String::new(),
    }
}
