use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::Receiver;
use parking_lot::Mutex;

use zennit::data::{MockRedditApi, RedditApi};
use zennit::model::{Comment, CommentSort, FeedTarget, Post, SortMode};
use zennit::reddit::FetchError;
use zennit::runtime::{initial_state, Runtime};
use zennit::share::{ShareError, ShareTarget};
use zennit::state::{AppState, Intent, View};
use zennit::storage::{Defaults, Store};

const WAIT: Duration = Duration::from_secs(5);

#[derive(Default)]
struct RecordingShare {
    urls: Mutex<Vec<String>>,
}

impl ShareTarget for RecordingShare {
    fn share(&self, url: &str) -> Result<String, ShareError> {
        self.urls.lock().push(url.to_string());
        Ok("Link copied".into())
    }
}

struct BlockedApi;

impl RedditApi for BlockedApi {
    fn listing(&self, _target: &FeedTarget, _sort: SortMode) -> Result<Vec<Post>, FetchError> {
        Err(FetchError::Blocked { status: 403 })
    }

    fn comments(
        &self,
        _subreddit: &str,
        _post_id: &str,
        _sort: CommentSort,
    ) -> Result<Vec<Comment>, FetchError> {
        Err(FetchError::Blocked { status: 403 })
    }
}

struct Harness {
    runtime: Runtime,
    rx: Receiver<Intent>,
    state: AppState,
    share: Arc<RecordingShare>,
}

impl Harness {
    fn with_api(api: Arc<dyn RedditApi>, store: Store) -> Self {
        let share = Arc::new(RecordingShare::default());
        let state = initial_state(&store, CommentSort::Best, Duration::from_secs(3), None)
            .expect("initial state");
        let (runtime, rx) = Runtime::new(api, store, share.clone());
        Self {
            runtime,
            rx,
            state,
            share,
        }
    }

    fn offline() -> Self {
        let store = Store::open_in_memory(Defaults::default()).expect("store");
        Self::with_api(Arc::new(MockRedditApi), store)
    }

    fn send(&mut self, intent: Intent) {
        self.runtime.dispatch(&mut self.state, intent, Instant::now());
    }

    fn settle(&mut self) {
        assert!(
            self.runtime.apply_next(&self.rx, &mut self.state, WAIT),
            "expected an async result"
        );
    }

    fn start(&mut self) {
        self.send(Intent::Start);
        self.settle();
    }
}

#[test]
fn start_loads_first_page() {
    let mut h = Harness::offline();
    h.start();
    assert!(!h.state.loading_posts);
    assert_eq!(h.state.posts.len(), 2);
    assert!(h.state.posts[0].is_pinned);
    assert!(h.state.posts[0].title.contains("r/technology"));
}

#[test]
fn blocked_listing_raises_banner_and_reload_clears_it() {
    let store = Store::open_in_memory(Defaults::default()).expect("store");
    let mut h = Harness::with_api(Arc::new(BlockedApi), store);
    h.start();
    assert!(h.state.blocked_banner);
    assert!(h.state.posts.is_empty());

    h.send(Intent::Reload);
    assert!(!h.state.blocked_banner);
    assert!(h.state.loading_posts);
    h.settle();
    assert!(h.state.blocked_banner);
}

#[test]
fn opening_a_post_loads_its_comments() {
    let mut h = Harness::offline();
    h.start();
    h.send(Intent::OpenPost {
        post_id: "welcome".into(),
    });
    assert!(matches!(h.state.view, View::PostDetail { .. }));
    assert!(h.state.loading_comments);
    h.settle();
    assert!(!h.state.loading_comments);
    assert_eq!(h.state.comments.len(), 1);
    assert_eq!(h.state.comments[0].replies.len(), 1);
}

#[test]
fn saves_are_persisted_once() {
    let mut h = Harness::offline();
    h.start();
    h.send(Intent::SavePost {
        post_id: "welcome".into(),
    });
    h.send(Intent::SavePost {
        post_id: "welcome".into(),
    });
    h.send(Intent::SavePost {
        post_id: "links".into(),
    });

    let stored = h.runtime.store().saved_posts().expect("saved posts");
    let ids: Vec<&str> = stored.iter().map(|post| post.id.as_str()).collect();
    assert_eq!(ids, vec!["welcome", "links"]);
}

#[test]
fn deleting_a_saved_post_keeps_the_rest() {
    let mut h = Harness::offline();
    h.start();
    for id in ["welcome", "links"] {
        h.send(Intent::SavePost { post_id: id.into() });
    }
    h.send(Intent::RequestDeleteSaved {
        post_id: "welcome".into(),
    });
    h.send(Intent::ConfirmPopup);

    let stored = h.runtime.store().saved_posts().expect("saved posts");
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].id, "links");
}

#[test]
fn back_to_back_subscription_changes_are_all_stored() {
    let mut h = Harness::offline();
    h.send(Intent::AddSubscription("r/rust".into()));
    h.send(Intent::AddSubscription("u/spez".into()));
    h.send(Intent::AddSubscription("user/alice/m/tech".into()));

    let names: Vec<String> = h
        .runtime
        .store()
        .subscriptions()
        .expect("subscriptions")
        .into_iter()
        .map(|sub| sub.display_name)
        .collect();
    assert_eq!(
        names,
        vec!["r/technology", "r/rust", "u/spez", "m/tech"]
    );
}

#[test]
fn selection_and_sort_survive_a_restart() {
    let store = Store::open_in_memory(Defaults::default()).expect("store");
    let mut h = Harness::with_api(Arc::new(MockRedditApi), store.clone());
    h.send(Intent::AddSubscription("r/rust".into()));
    h.send(Intent::SelectSubreddit("r/rust".into()));
    h.settle();
    h.send(Intent::SetSort(SortMode::Top));
    h.settle();

    let restored = initial_state(&store, CommentSort::Best, Duration::from_secs(3), None)
        .expect("restored state");
    assert_eq!(restored.selected_subreddit, "r/rust");
    assert_eq!(restored.sort, SortMode::Top);
    assert_eq!(restored.subscriptions.len(), 2);
}

#[test]
fn clearing_the_cache_resets_the_store() {
    let mut h = Harness::offline();
    h.start();
    h.send(Intent::AddSubscription("r/rust".into()));
    h.send(Intent::SelectSubreddit("r/rust".into()));
    h.settle();
    h.send(Intent::SavePost {
        post_id: "welcome".into(),
    });

    h.send(Intent::RequestClearCache);
    h.send(Intent::ConfirmPopup);
    h.settle();

    let store = h.runtime.store();
    assert!(store.saved_posts().expect("saved").is_empty());
    assert_eq!(store.selected_subreddit().expect("selected"), "r/technology");
    assert_eq!(store.subscriptions().expect("subs").len(), 1);
    assert_eq!(store.sort().expect("sort"), SortMode::Hot);
    assert_eq!(h.state.selected_subreddit, "r/technology");
    assert!(h.state.saved_posts.is_empty());
}

#[test]
fn sharing_copies_the_permalink() {
    let mut h = Harness::offline();
    h.start();
    h.send(Intent::SharePost {
        post_id: "links".into(),
    });
    h.settle();

    let urls = h.share.urls.lock().clone();
    assert_eq!(urls.len(), 1);
    assert!(urls[0].contains("/comments/links"), "{}", urls[0]);
    assert_eq!(
        h.state.toast.as_ref().map(|toast| toast.message.as_str()),
        Some("Link copied")
    );
}

#[test]
fn command_line_feed_must_parse() {
    let store = Store::open_in_memory(Defaults::default()).expect("store");
    assert!(initial_state(&store, CommentSort::Best, Duration::from_secs(1), Some("not a feed")).is_err());
    let state = initial_state(&store, CommentSort::Best, Duration::from_secs(1), Some("r/rust"))
        .expect("state");
    assert_eq!(state.selected_subreddit, "r/rust");
}
