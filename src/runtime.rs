use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Result;
use crossbeam_channel::{unbounded, Receiver, Sender};
use tracing::{debug, error};

use crate::data::RedditApi;
use crate::model::FeedTarget;
use crate::share::{self, ShareTarget};
use crate::state::{self, AppState, Effect, Init, Intent};
use crate::storage::Store;

/// Executes reducer effects. Network calls run on their own thread and report
/// back through the intent channel; preference writes happen inline.
pub struct Runtime {
    api: Arc<dyn RedditApi>,
    store: Store,
    share: Arc<dyn ShareTarget>,
    tx: Sender<Intent>,
}

impl Runtime {
    pub fn new(
        api: Arc<dyn RedditApi>,
        store: Store,
        share: Arc<dyn ShareTarget>,
    ) -> (Self, Receiver<Intent>) {
        let (tx, rx) = unbounded();
        (
            Self {
                api,
                store,
                share,
                tx,
            },
            rx,
        )
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn dispatch(&self, state: &mut AppState, intent: Intent, now: Instant) {
        for effect in state::update(state, intent, now) {
            self.execute(effect);
        }
    }

    /// Applies every intent delivered since the last call.
    pub fn drain(&self, rx: &Receiver<Intent>, state: &mut AppState) -> usize {
        let mut applied = 0;
        while let Ok(intent) = rx.try_recv() {
            self.dispatch(state, intent, Instant::now());
            applied += 1;
        }
        applied
    }

    /// Blocks for the next intent, up to `timeout`, and applies it.
    pub fn apply_next(
        &self,
        rx: &Receiver<Intent>,
        state: &mut AppState,
        timeout: Duration,
    ) -> bool {
        match rx.recv_timeout(timeout) {
            Ok(intent) => {
                self.dispatch(state, intent, Instant::now());
                true
            }
            Err(_) => false,
        }
    }

    pub fn execute(&self, effect: Effect) {
        match effect {
            Effect::FetchListing {
                request_id,
                target,
                sort,
            } => {
                let api = Arc::clone(&self.api);
                let tx = self.tx.clone();
                thread::spawn(move || {
                    debug!(request_id, target = %target.display_name(), %sort, "fetching listing");
                    let result = api.listing(&target, sort);
                    let _ = tx.send(Intent::PostsLoaded { request_id, result });
                });
            }
            Effect::FetchComments {
                request_id,
                subreddit,
                post_id,
                sort,
            } => {
                let api = Arc::clone(&self.api);
                let tx = self.tx.clone();
                thread::spawn(move || {
                    debug!(request_id, post_id, %sort, "fetching comments");
                    let result = api.comments(&subreddit, &post_id, sort);
                    let _ = tx.send(Intent::CommentsLoaded {
                        request_id,
                        post_id,
                        sort,
                        result,
                    });
                });
            }
            Effect::PersistSubscriptions(subscriptions) => {
                self.persist(self.store.set_subscriptions(&subscriptions));
            }
            Effect::PersistSelectedSubreddit(name) => {
                self.persist(self.store.set_selected_subreddit(&name));
            }
            Effect::PersistSort(sort) => self.persist(self.store.set_sort(sort)),
            Effect::PersistSavedPosts(posts) => {
                self.persist(self.store.set_saved_posts(&posts));
            }
            Effect::ClearStore => self.persist(self.store.clear_all()),
            Effect::Share { url } => {
                let result = self.share.share(&url).map_err(|err| err.to_string());
                let _ = self.tx.send(Intent::ShareFinished(result));
            }
            Effect::OpenExternal { url } => {
                if !share::open_in_browser(&url) {
                    let _ = self
                        .tx
                        .send(Intent::ShowToast("Could not open a browser".into()));
                }
            }
        }
    }

    fn persist(&self, result: Result<()>) {
        if let Err(err) = result {
            error!(error = ?err, "preference write failed");
            let _ = self
                .tx
                .send(Intent::ShowToast("Could not save preferences".into()));
        }
    }
}

/// Startup state: stored preferences first, then any feed passed on the
/// command line.
pub fn initial_state(
    store: &Store,
    comment_sort: crate::model::CommentSort,
    toast_duration: Duration,
    subreddit_override: Option<&str>,
) -> Result<AppState> {
    let mut selected_subreddit = store.selected_subreddit()?;
    if let Some(name) = subreddit_override {
        anyhow::ensure!(
            FeedTarget::parse(name).is_some(),
            "unrecognized feed {name:?}; use r/name, u/name or user/name/m/multi"
        );
        selected_subreddit = name.trim().to_string();
    }
    Ok(AppState::new(Init {
        subscriptions: store.subscriptions()?,
        selected_subreddit,
        saved_posts: store.saved_posts()?,
        sort: store.sort()?,
        comment_sort,
        defaults: store.defaults().clone(),
        toast_duration,
    }))
}
