//! Application state and the reducer that owns every mutation of it.
//!
//! The runtime calls [`update`] with one [`Intent`] at a time and executes the
//! returned [`Effect`]s. Network results come back as intents carrying the
//! request id they answer, so a response for anything but the newest request
//! is dropped.

use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::model::{Comment, CommentSort, FeedTarget, Post, SortMode, Subscription};
use crate::reddit::FetchError;
use crate::storage::Defaults;

pub const DEFAULT_TOAST_DURATION: Duration = Duration::from_secs(3);

/// Exactly one top-level view is active at a time.
#[derive(Debug, Clone, PartialEq)]
pub enum View {
    Feed,
    PostDetail { post: Box<Post> },
    Saved,
    Settings,
    About,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Popup {
    RemoveSubscription { display_name: String },
    DeleteSaved { post_id: String },
    ClearCache,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toast {
    pub message: String,
    pub expires_at: Instant,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct PendingPosts {
    request_id: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct PendingComments {
    request_id: u64,
    post_id: String,
    sort: CommentSort,
}

#[derive(Debug, Clone)]
pub struct Init {
    pub subscriptions: Vec<Subscription>,
    pub selected_subreddit: String,
    pub saved_posts: Vec<Post>,
    pub sort: SortMode,
    pub comment_sort: CommentSort,
    pub defaults: Defaults,
    pub toast_duration: Duration,
}

impl Default for Init {
    fn default() -> Self {
        let defaults = Defaults::default();
        Self {
            subscriptions: defaults.subscriptions(),
            selected_subreddit: defaults.subreddit.clone(),
            saved_posts: Vec::new(),
            sort: defaults.sort,
            comment_sort: CommentSort::default(),
            defaults,
            toast_duration: DEFAULT_TOAST_DURATION,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppState {
    pub view: View,
    pub subscriptions: Vec<Subscription>,
    pub selected_subreddit: String,
    pub posts: Vec<Post>,
    pub comments: Vec<Comment>,
    pub saved_posts: Vec<Post>,
    pub sort: SortMode,
    pub comment_sort: CommentSort,
    pub loading_posts: bool,
    pub loading_comments: bool,
    pub blocked_banner: bool,
    pub edit_mode: bool,
    pub sidebar_open: bool,
    pub enlarged_image: Option<String>,
    pub popup: Option<Popup>,
    pub toast: Option<Toast>,
    defaults: Defaults,
    toast_duration: Duration,
    next_request_id: u64,
    pending_posts: Option<PendingPosts>,
    pending_comments: Option<PendingComments>,
}

#[derive(Debug)]
pub enum Intent {
    /// Initial listing load after startup.
    Start,
    OpenFeed,
    OpenPost { post_id: String },
    OpenSaved,
    OpenSettings,
    OpenAbout,
    GoBack,
    SelectSubreddit(String),
    SetSort(SortMode),
    SetCommentSort(CommentSort),
    RefreshPosts,
    RefreshComments,
    /// Banner action: hide the banner and fetch again.
    Reload,
    DismissBanner,
    AddSubscription(String),
    RequestRemoveSubscription(String),
    ToggleEditMode,
    SavePost { post_id: String },
    RequestDeleteSaved { post_id: String },
    RequestClearCache,
    ConfirmPopup,
    CancelPopup,
    ToggleSidebar,
    CloseSidebar,
    ShowImage(String),
    CloseImage,
    ToggleComment(Vec<usize>),
    SharePost { post_id: String },
    ShareFinished(Result<String, String>),
    OpenExternal(String),
    ShowToast(String),
    PostsLoaded {
        request_id: u64,
        result: Result<Vec<Post>, FetchError>,
    },
    CommentsLoaded {
        request_id: u64,
        post_id: String,
        sort: CommentSort,
        result: Result<Vec<Comment>, FetchError>,
    },
    Tick,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    FetchListing {
        request_id: u64,
        target: FeedTarget,
        sort: SortMode,
    },
    FetchComments {
        request_id: u64,
        subreddit: String,
        post_id: String,
        sort: CommentSort,
    },
    PersistSubscriptions(Vec<Subscription>),
    PersistSelectedSubreddit(String),
    PersistSort(SortMode),
    PersistSavedPosts(Vec<Post>),
    ClearStore,
    Share { url: String },
    OpenExternal { url: String },
}

impl AppState {
    pub fn new(init: Init) -> Self {
        Self {
            view: View::Feed,
            subscriptions: init.subscriptions,
            selected_subreddit: init.selected_subreddit,
            posts: Vec::new(),
            comments: Vec::new(),
            saved_posts: init.saved_posts,
            sort: init.sort,
            comment_sort: init.comment_sort,
            loading_posts: false,
            loading_comments: false,
            blocked_banner: false,
            edit_mode: false,
            sidebar_open: false,
            enlarged_image: None,
            popup: None,
            toast: None,
            defaults: init.defaults,
            toast_duration: init.toast_duration,
            next_request_id: 1,
            pending_posts: None,
            pending_comments: None,
        }
    }

    pub fn detail_post(&self) -> Option<&Post> {
        match &self.view {
            View::PostDetail { post } => Some(post),
            _ => None,
        }
    }

    pub fn is_saved(&self, post_id: &str) -> bool {
        self.saved_posts.iter().any(|post| post.id == post_id)
    }

    /// The listing target for the selected subreddit. Subscriptions are
    /// consulted first so `m/` names resolve through their canonical path.
    pub fn current_target(&self) -> Option<FeedTarget> {
        self.subscriptions
            .iter()
            .find(|sub| sub.display_name.eq_ignore_ascii_case(&self.selected_subreddit))
            .and_then(Subscription::target)
            .or_else(|| FeedTarget::parse(&self.selected_subreddit))
    }

    fn find_post(&self, post_id: &str) -> Option<&Post> {
        self.detail_post()
            .filter(|post| post.id == post_id)
            .or_else(|| self.posts.iter().find(|post| post.id == post_id))
            .or_else(|| self.saved_posts.iter().find(|post| post.id == post_id))
    }

    fn next_request(&mut self) -> u64 {
        let id = self.next_request_id;
        self.next_request_id = self.next_request_id.wrapping_add(1);
        id
    }

    fn set_toast(&mut self, message: impl Into<String>, now: Instant) {
        self.toast = Some(Toast {
            message: message.into(),
            expires_at: now + self.toast_duration,
        });
    }

    fn request_posts(&mut self, now: Instant) -> Vec<Effect> {
        let Some(target) = self.current_target() else {
            self.pending_posts = None;
            self.loading_posts = false;
            let message = format!("Cannot load {}", self.selected_subreddit);
            self.set_toast(message, now);
            return Vec::new();
        };
        let request_id = self.next_request();
        self.pending_posts = Some(PendingPosts { request_id });
        self.loading_posts = true;
        vec![Effect::FetchListing {
            request_id,
            target,
            sort: self.sort,
        }]
    }

    fn request_comments(&mut self) -> Vec<Effect> {
        let Some(post) = self.detail_post() else {
            return Vec::new();
        };
        let subreddit = post.subreddit.clone();
        let post_id = post.id.clone();
        let request_id = self.next_request();
        let sort = self.comment_sort;
        self.pending_comments = Some(PendingComments {
            request_id,
            post_id: post_id.clone(),
            sort,
        });
        self.loading_comments = true;
        self.comments.clear();
        vec![Effect::FetchComments {
            request_id,
            subreddit,
            post_id,
            sort,
        }]
    }

    fn leave_detail(&mut self) {
        self.pending_comments = None;
        self.loading_comments = false;
        self.comments.clear();
    }

    fn switch_view(&mut self, view: View) {
        if matches!(self.view, View::PostDetail { .. }) {
            self.leave_detail();
        }
        self.view = view;
    }
}

/// Applies one intent and returns the effects the runtime must execute.
pub fn update(state: &mut AppState, intent: Intent, now: Instant) -> Vec<Effect> {
    match intent {
        Intent::Start | Intent::RefreshPosts => state.request_posts(now),
        Intent::OpenFeed | Intent::GoBack => {
            state.switch_view(View::Feed);
            Vec::new()
        }
        Intent::OpenSaved => {
            state.switch_view(View::Saved);
            Vec::new()
        }
        Intent::OpenSettings => {
            state.switch_view(View::Settings);
            Vec::new()
        }
        Intent::OpenAbout => {
            state.switch_view(View::About);
            Vec::new()
        }
        Intent::OpenPost { post_id } => {
            let Some(post) = state.find_post(&post_id).cloned() else {
                debug!(post_id, "open requested for unknown post");
                return Vec::new();
            };
            state.switch_view(View::PostDetail {
                post: Box::new(post),
            });
            state.request_comments()
        }
        Intent::SelectSubreddit(name) => {
            let name = name.trim().to_string();
            if name.is_empty() {
                return Vec::new();
            }
            state.selected_subreddit = name.clone();
            state.sidebar_open = false;
            state.blocked_banner = false;
            state.switch_view(View::Feed);
            let mut effects = vec![Effect::PersistSelectedSubreddit(name)];
            effects.extend(state.request_posts(now));
            effects
        }
        Intent::SetSort(sort) => {
            state.sort = sort;
            let mut effects = vec![Effect::PersistSort(sort)];
            effects.extend(state.request_posts(now));
            effects
        }
        Intent::SetCommentSort(sort) => {
            state.comment_sort = sort;
            state.request_comments()
        }
        Intent::RefreshComments => state.request_comments(),
        Intent::Reload => {
            state.blocked_banner = false;
            state.request_posts(now)
        }
        Intent::DismissBanner => {
            state.blocked_banner = false;
            Vec::new()
        }
        Intent::AddSubscription(raw) => add_subscription(state, &raw, now),
        Intent::RequestRemoveSubscription(display_name) => {
            state.popup = Some(Popup::RemoveSubscription { display_name });
            Vec::new()
        }
        Intent::ToggleEditMode => {
            state.edit_mode = !state.edit_mode;
            Vec::new()
        }
        Intent::SavePost { post_id } => save_post(state, &post_id, now),
        Intent::RequestDeleteSaved { post_id } => {
            if state.is_saved(&post_id) {
                state.popup = Some(Popup::DeleteSaved { post_id });
            }
            Vec::new()
        }
        Intent::RequestClearCache => {
            state.popup = Some(Popup::ClearCache);
            Vec::new()
        }
        Intent::ConfirmPopup => confirm_popup(state, now),
        Intent::CancelPopup => {
            state.popup = None;
            Vec::new()
        }
        Intent::ToggleSidebar => {
            state.sidebar_open = !state.sidebar_open;
            Vec::new()
        }
        Intent::CloseSidebar => {
            state.sidebar_open = false;
            Vec::new()
        }
        Intent::ShowImage(url) => {
            state.enlarged_image = Some(url);
            Vec::new()
        }
        Intent::CloseImage => {
            state.enlarged_image = None;
            Vec::new()
        }
        Intent::ToggleComment(path) => {
            if let Some(node) = Comment::at_path_mut(&mut state.comments, &path) {
                node.is_visible = !node.is_visible;
            }
            Vec::new()
        }
        Intent::SharePost { post_id } => match state.find_post(&post_id) {
            Some(post) => vec![Effect::Share {
                url: post.share_url(),
            }],
            None => Vec::new(),
        },
        Intent::ShareFinished(result) => {
            match result {
                Ok(message) => state.set_toast(message, now),
                Err(err) => warn!(error = %err, "share failed"),
            }
            Vec::new()
        }
        Intent::OpenExternal(url) => vec![Effect::OpenExternal { url }],
        Intent::ShowToast(message) => {
            state.set_toast(message, now);
            Vec::new()
        }
        Intent::PostsLoaded { request_id, result } => {
            posts_loaded(state, request_id, result);
            Vec::new()
        }
        Intent::CommentsLoaded {
            request_id,
            post_id,
            sort,
            result,
        } => {
            comments_loaded(state, request_id, &post_id, sort, result);
            Vec::new()
        }
        Intent::Tick => {
            if state
                .toast
                .as_ref()
                .is_some_and(|toast| toast.expires_at <= now)
            {
                state.toast = None;
            }
            Vec::new()
        }
    }
}

fn add_subscription(state: &mut AppState, raw: &str, now: Instant) -> Vec<Effect> {
    let Some(target) = FeedTarget::parse(raw) else {
        state.set_toast("Use r/name, u/name or user/name/m/multi", now);
        return Vec::new();
    };
    let subscription = Subscription::from_target(&target);
    if state
        .subscriptions
        .iter()
        .any(|sub| sub.display_name.eq_ignore_ascii_case(&subscription.display_name))
    {
        state.set_toast(format!("{} is already in your list", subscription.display_name), now);
        return Vec::new();
    }
    info!(subscription = %subscription.display_name, "subscription added");
    state.set_toast(format!("Added {}", subscription.display_name), now);
    state.subscriptions.push(subscription);
    vec![Effect::PersistSubscriptions(state.subscriptions.clone())]
}

fn save_post(state: &mut AppState, post_id: &str, now: Instant) -> Vec<Effect> {
    if state.is_saved(post_id) {
        state.set_toast("Post already saved", now);
        return Vec::new();
    }
    let Some(post) = state.find_post(post_id).cloned() else {
        return Vec::new();
    };
    state.saved_posts.push(post);
    state.set_toast("Post saved", now);
    vec![Effect::PersistSavedPosts(state.saved_posts.clone())]
}

fn confirm_popup(state: &mut AppState, now: Instant) -> Vec<Effect> {
    let Some(popup) = state.popup.take() else {
        return Vec::new();
    };
    match popup {
        Popup::RemoveSubscription { display_name } => {
            state
                .subscriptions
                .retain(|sub| sub.display_name != display_name);
            state.set_toast(format!("Removed {display_name}"), now);
            vec![Effect::PersistSubscriptions(state.subscriptions.clone())]
        }
        Popup::DeleteSaved { post_id } => {
            state.saved_posts.retain(|post| post.id != post_id);
            state.set_toast("Saved post deleted", now);
            vec![Effect::PersistSavedPosts(state.saved_posts.clone())]
        }
        Popup::ClearCache => {
            state.subscriptions = state.defaults.subscriptions();
            state.selected_subreddit = state.defaults.subreddit.clone();
            state.saved_posts.clear();
            state.sort = state.defaults.sort;
            state.edit_mode = false;
            state.switch_view(View::Feed);
            state.set_toast("Cache cleared", now);
            let mut effects = vec![Effect::ClearStore];
            effects.extend(state.request_posts(now));
            effects
        }
    }
}

fn posts_loaded(state: &mut AppState, request_id: u64, result: Result<Vec<Post>, FetchError>) {
    if state.pending_posts.as_ref().map(|p| p.request_id) != Some(request_id) {
        debug!(request_id, "dropping stale listing response");
        return;
    }
    state.pending_posts = None;
    state.loading_posts = false;
    match result {
        Ok(posts) => {
            state.posts = posts;
            state.blocked_banner = false;
        }
        Err(err) => {
            warn!(error = %err, kind = ?err.kind(), "listing fetch failed");
            state.blocked_banner = true;
        }
    }
}

fn comments_loaded(
    state: &mut AppState,
    request_id: u64,
    post_id: &str,
    sort: CommentSort,
    result: Result<Vec<Comment>, FetchError>,
) {
    let current = state.pending_comments.as_ref().is_some_and(|pending| {
        pending.request_id == request_id && pending.post_id == post_id && pending.sort == sort
    });
    let showing = state.detail_post().is_some_and(|post| post.id == post_id);
    if !current || !showing {
        debug!(request_id, post_id, "dropping stale comment response");
        return;
    }
    state.pending_comments = None;
    state.loading_comments = false;
    match result {
        Ok(comments) => state.comments = comments,
        Err(err) => {
            warn!(error = %err, post_id, "comment fetch failed");
            state.comments.clear();
        }
    }
}
