use std::collections::BTreeMap;
use std::time::Duration;

use reqwest::blocking::{Client as HttpClient, Response};
use reqwest::header::{ACCEPT, USER_AGENT};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use crate::model::{
    Comment, CommentSort, FeedTarget, GalleryData, Media, MediaMetadata, Post, SortMode, Video,
};

pub const DEFAULT_BASE_URL: &str = "https://www.reddit.com/";
pub const DEFAULT_LISTING_COUNT: u32 = 25;

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub user_agent: String,
    pub base_url: Option<String>,
    pub timeout: Duration,
    pub count: Option<u32>,
    pub http_client: Option<HttpClient>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            user_agent: format!("zennit/{}", crate::VERSION),
            base_url: None,
            timeout: Duration::from_secs(20),
            count: Some(DEFAULT_LISTING_COUNT),
            http_client: None,
        }
    }
}

/// How a failure is surfaced to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Upstream answered with a non-success status. Usually a content blocker.
    NetworkBlocked,
    NetworkFailure,
}

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("reddit: request returned status {status}")]
    Blocked { status: u16 },
    #[error("reddit: request failed: {0}")]
    Network(#[from] reqwest::Error),
    #[error("reddit: invalid request url: {0}")]
    Url(#[from] url::ParseError),
    #[error("reddit: decode response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("reddit: comments payload missing elements")]
    MissingElements,
}

impl FetchError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            FetchError::Blocked { .. } => ErrorKind::NetworkBlocked,
            _ => ErrorKind::NetworkFailure,
        }
    }
}

pub struct Client {
    http: HttpClient,
    user_agent: String,
    base_url: Url,
    count: Option<u32>,
}

impl Client {
    pub fn new(config: ClientConfig) -> Result<Self, FetchError> {
        let user_agent = if config.user_agent.trim().is_empty() {
            ClientConfig::default().user_agent
        } else {
            config.user_agent
        };
        let base = config
            .base_url
            .filter(|base| !base.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let base_url = Url::parse(&base)?;
        let http = match config.http_client {
            Some(client) => client,
            None => HttpClient::builder().timeout(config.timeout).build()?,
        };

        Ok(Client {
            http,
            user_agent,
            base_url,
            count: config.count,
        })
    }

    /// Fetches one page of posts for a subreddit, user or multi-subreddit.
    /// The full page always replaces whatever the caller held before.
    pub fn listing(&self, target: &FeedTarget, sort: SortMode) -> Result<Vec<Post>, FetchError> {
        let path = listing_path(target, sort);
        let mut params = Vec::new();
        if let Some(count) = self.count {
            params.push(("count".to_string(), count.to_string()));
        }
        let resp = self.request(&path, &params)?;
        let body = resp.text()?;
        let posts = parse_listing_payload(&body)?;
        debug!(path = %path, count = posts.len(), "listing fetched");
        Ok(posts)
    }

    pub fn comments(
        &self,
        subreddit: &str,
        post_id: &str,
        sort: CommentSort,
    ) -> Result<Vec<Comment>, FetchError> {
        let path = comments_path(subreddit, post_id);
        let params = vec![("sort".to_string(), sort.as_str().to_string())];
        let resp = self.request(&path, &params)?;
        let body = resp.text()?;
        let comments = parse_comments_payload(&body)?;
        debug!(path = %path, roots = comments.len(), "comment tree fetched");
        Ok(comments)
    }

    fn request(&self, path: &str, params: &[(String, String)]) -> Result<Response, FetchError> {
        let mut url = self.base_url.join(path.trim_start_matches('/'))?;
        if !params.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (k, v) in params {
                pairs.append_pair(k, v);
            }
        }

        let resp = self
            .http
            .get(url)
            .header(USER_AGENT, self.user_agent.clone())
            .header(ACCEPT, "application/json")
            .send()?;

        if resp.status().is_success() {
            Ok(resp)
        } else {
            let status = resp.status().as_u16();
            warn!(path, status, "reddit answered with non-success status");
            Err(FetchError::Blocked { status })
        }
    }
}

pub fn listing_path(target: &FeedTarget, sort: SortMode) -> String {
    match target {
        FeedTarget::Subreddit(name) => format!("/r/{}/{}.json", name, sort.as_str()),
        FeedTarget::User(name) => format!("/user/{}/submitted/{}.json", name, sort.as_str()),
        FeedTarget::Multi { user, name } => {
            format!("/user/{}/m/{}/{}.json", user, name, sort.as_str())
        }
    }
}

/// Posts carry their subreddit as `r/name` or `u/name`. Only real subreddits
/// get a prefixed discussion path; everything else uses the global one.
pub fn comments_path(subreddit: &str, post_id: &str) -> String {
    match FeedTarget::parse(subreddit) {
        Some(FeedTarget::Subreddit(name)) => format!("/r/{}/comments/{}.json", name, post_id),
        _ => format!("/comments/{}.json", post_id),
    }
}

/// Decodes the two-element comments response. Element 0 describes the post
/// and is not needed; element 1 holds the comment tree.
pub fn parse_comments_payload(body: &str) -> Result<Vec<Comment>, FetchError> {
    let mut payload: Vec<Value> = serde_json::from_str(body)?;
    if payload.len() < 2 {
        return Err(FetchError::MissingElements);
    }
    let tree = payload.swap_remove(1);
    let listing: ListingEnvelope<RawComment> = serde_json::from_value(tree)?;
    Ok(normalize_comments(listing.data))
}

pub fn parse_listing_payload(body: &str) -> Result<Vec<Post>, FetchError> {
    let envelope: ListingEnvelope<RawPost> = serde_json::from_str(body)?;
    Ok(envelope
        .data
        .children
        .into_iter()
        .map(|thing| Post::from(thing.data))
        .collect())
}

fn normalize_comments(listing: Listing<RawComment>) -> Vec<Comment> {
    listing
        .children
        .into_iter()
        .filter(|thing| thing.kind == "t1")
        .map(|thing| Comment::from(thing.data))
        .collect()
}

#[derive(Debug, Clone, Deserialize)]
pub struct Listing<T> {
    #[serde(default = "Vec::new")]
    pub children: Vec<Thing<T>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Thing<T> {
    #[serde(default)]
    pub kind: String,
    pub data: T,
}

#[derive(Debug, Clone, Deserialize)]
struct ListingEnvelope<T> {
    data: Listing<T>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawPost {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub selftext: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub subreddit_name_prefixed: String,
    #[serde(default)]
    pub created_utc: f64,
    #[serde(default)]
    pub gallery_data: Option<GalleryData>,
    #[serde(default)]
    pub media_metadata: Option<BTreeMap<String, MediaMetadata>>,
    #[serde(default)]
    pub stickied: bool,
    #[serde(default)]
    pub ups: i64,
    #[serde(default)]
    pub downs: i64,
    #[serde(default)]
    pub media: Option<RawMedia>,
    #[serde(default)]
    pub secure_media: Option<RawMedia>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawMedia {
    #[serde(default)]
    pub reddit_video: Option<RawVideo>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawVideo {
    #[serde(default)]
    pub fallback_url: String,
}

// `ups - downs` is a display heuristic: upstream reports `downs` as 0.
impl From<RawPost> for Post {
    fn from(raw: RawPost) -> Self {
        let video = raw
            .media
            .and_then(|media| media.reddit_video)
            .or_else(|| raw.secure_media.and_then(|media| media.reddit_video))
            .filter(|video| !video.fallback_url.trim().is_empty())
            .map(|video| Video {
                fallback_url: video.fallback_url,
            });
        Post {
            id: raw.id,
            title: raw.title,
            author: raw.author,
            content: raw.selftext,
            url: raw.url.filter(|url| !url.trim().is_empty()),
            subreddit: raw.subreddit_name_prefixed,
            created_at: raw.created_utc.trunc() as i64,
            gallery_data: raw.gallery_data,
            media_metadata: raw.media_metadata,
            is_pinned: raw.stickied,
            upvote_score: raw.ups.saturating_sub(raw.downs),
            media: video.map(|video| Media { video: Some(video) }),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RawComment {
    pub author: String,
    pub body: String,
    pub media_metadata: Option<BTreeMap<String, MediaMetadata>>,
    pub stickied: bool,
    pub ups: i64,
    pub downs: i64,
    pub replies: Option<Listing<RawComment>>,
}

impl<'de> Deserialize<'de> for RawComment {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct CommentHelper {
            #[serde(default)]
            author: String,
            #[serde(default)]
            body: String,
            #[serde(default)]
            media_metadata: Option<BTreeMap<String, MediaMetadata>>,
            #[serde(default)]
            stickied: bool,
            #[serde(default)]
            ups: i64,
            #[serde(default)]
            downs: i64,
            #[serde(default)]
            replies: Value,
        }

        let helper = CommentHelper::deserialize(deserializer)?;
        // Reddit sends `""` for a terminal node and a full listing otherwise.
        let replies = if helper.replies.is_object() {
            serde_json::from_value::<ListingEnvelope<RawComment>>(helper.replies)
                .ok()
                .map(|listing| listing.data)
        } else {
            None
        };
        Ok(RawComment {
            author: helper.author,
            body: helper.body,
            media_metadata: helper.media_metadata,
            stickied: helper.stickied,
            ups: helper.ups,
            downs: helper.downs,
            replies,
        })
    }
}

impl From<RawComment> for Comment {
    fn from(raw: RawComment) -> Self {
        Comment {
            author: raw.author,
            body: raw.body,
            media_metadata: raw.media_metadata,
            is_pinned: raw.stickied,
            upvote_score: raw.ups.saturating_sub(raw.downs),
            replies: raw.replies.map(normalize_comments).unwrap_or_default(),
            is_visible: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::thread;

    #[test]
    fn listing_paths_follow_target_shape() {
        for sort in SortMode::ALL {
            let s = sort.as_str();
            assert_eq!(
                listing_path(&FeedTarget::Subreddit("rust".into()), sort),
                format!("/r/rust/{s}.json")
            );
            assert_eq!(
                listing_path(&FeedTarget::User("spez".into()), sort),
                format!("/user/spez/submitted/{s}.json")
            );
            assert_eq!(
                listing_path(
                    &FeedTarget::Multi {
                        user: "alice".into(),
                        name: "tech".into()
                    },
                    sort
                ),
                format!("/user/alice/m/tech/{s}.json")
            );
        }
    }

    #[test]
    fn comment_paths() {
        assert_eq!(comments_path("r/rust", "abc"), "/r/rust/comments/abc.json");
        assert_eq!(comments_path("u/spez", "abc"), "/comments/abc.json");
    }

    #[test]
    fn normalizes_listing_entries() {
        let body = json!({
            "kind": "Listing",
            "data": {
                "after": "t3_next",
                "children": [{
                    "kind": "t3",
                    "data": {
                        "id": "abc",
                        "title": "Hello",
                        "author": "someone",
                        "selftext": "",
                        "url": "https://v.redd.it/xyz",
                        "subreddit_name_prefixed": "r/videos",
                        "created_utc": 1700000000.0,
                        "stickied": true,
                        "ups": 120000,
                        "downs": 0,
                        "media": { "reddit_video": { "fallback_url": "https://v.redd.it/xyz/DASH_720.mp4" } }
                    }
                }]
            }
        })
        .to_string();

        let posts = parse_listing_payload(&body).unwrap();
        assert_eq!(posts.len(), 1);
        let post = &posts[0];
        assert_eq!(post.id, "abc");
        assert_eq!(post.subreddit, "r/videos");
        assert_eq!(post.created_at, 1_700_000_000);
        assert!(post.is_pinned);
        assert_eq!(post.upvote_score, 120000);
        assert_eq!(
            post.media.as_ref().and_then(|m| m.video.as_ref()).map(|v| v.fallback_url.as_str()),
            Some("https://v.redd.it/xyz/DASH_720.mp4")
        );
    }

    #[test]
    fn normalizes_comment_tree_recursively() {
        let body = json!([
            { "kind": "Listing", "data": { "children": [{ "kind": "t3", "data": { "id": "abc", "title": "T" } }] } },
            { "kind": "Listing", "data": { "children": [
                {
                    "kind": "t1",
                    "data": {
                        "author": "a",
                        "body": "top",
                        "ups": 10,
                        "downs": 2,
                        "replies": { "kind": "Listing", "data": { "children": [
                            { "kind": "t1", "data": {
                                "author": "b",
                                "body": "child",
                                "ups": 3,
                                "replies": { "kind": "Listing", "data": { "children": [
                                    { "kind": "t1", "data": { "author": "c", "body": "deep", "replies": "" } }
                                ] } }
                            } },
                            { "kind": "more", "data": { "count": 4, "children": ["x"] } }
                        ] } }
                    }
                },
                { "kind": "t1", "data": { "author": "d", "body": "alone", "replies": "" } }
            ] } }
        ])
        .to_string();

        let comments = parse_comments_payload(&body).unwrap();
        assert_eq!(comments.len(), 2);
        assert_eq!(comments[0].upvote_score, 8);
        assert_eq!(comments[0].replies.len(), 1);
        assert_eq!(comments[0].replies[0].replies[0].body, "deep");
        assert!(comments[0].replies[0].replies[0].replies.is_empty());
        assert!(comments[1].replies.is_empty());
        assert!(comments.iter().all(|c| c.is_visible));
    }

    #[test]
    fn short_comment_payload_is_rejected() {
        let err = parse_comments_payload("[]").unwrap_err();
        assert!(matches!(err, FetchError::MissingElements));
        assert_eq!(err.kind(), ErrorKind::NetworkFailure);
        assert_eq!(FetchError::Blocked { status: 403 }.kind(), ErrorKind::NetworkBlocked);
    }

    struct Seen {
        url: String,
        user_agent: Option<String>,
    }

    /// Answers exactly one request on a loopback port and reports what it saw.
    fn serve_once(status: u16, body: String) -> (Client, thread::JoinHandle<Seen>) {
        let server = tiny_http::Server::http("127.0.0.1:0").expect("bind loopback");
        let base = format!("http://{}/", server.server_addr());
        let handle = thread::spawn(move || {
            let request = server.recv().expect("incoming request");
            let seen = Seen {
                url: request.url().to_string(),
                user_agent: request
                    .headers()
                    .iter()
                    .find(|header| header.field.equiv("User-Agent"))
                    .map(|header| header.value.to_string()),
            };
            request
                .respond(tiny_http::Response::from_string(body).with_status_code(status))
                .expect("respond");
            seen
        });
        let client = Client::new(ClientConfig {
            user_agent: "zennit-test".into(),
            base_url: Some(base),
            timeout: Duration::from_secs(5),
            count: Some(DEFAULT_LISTING_COUNT),
            http_client: None,
        })
        .expect("client");
        (client, handle)
    }

    #[test]
    fn non_success_status_is_blocked() {
        let (client, server) = serve_once(403, "forbidden".into());
        let err = client
            .listing(&FeedTarget::Subreddit("x".into()), SortMode::Hot)
            .unwrap_err();
        assert!(matches!(err, FetchError::Blocked { status: 403 }));
        assert_eq!(err.kind(), ErrorKind::NetworkBlocked);

        let seen = server.join().expect("server thread");
        assert_eq!(seen.url, "/r/x/hot.json?count=25");
        assert_eq!(seen.user_agent.as_deref(), Some("zennit-test"));
    }

    #[test]
    fn listing_round_trips_over_http() {
        let body = json!({
            "kind": "Listing",
            "data": { "children": [
                { "kind": "t3", "data": { "id": "p1", "title": "One", "subreddit_name_prefixed": "u/alice" } }
            ] }
        })
        .to_string();
        let (client, server) = serve_once(200, body);
        let posts = client
            .listing(&FeedTarget::User("alice".into()), SortMode::New)
            .unwrap();
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].id, "p1");
        assert_eq!(
            server.join().expect("server thread").url,
            "/user/alice/submitted/new.json?count=25"
        );
    }

    #[test]
    fn comments_request_carries_sort() {
        let body = json!([
            { "kind": "Listing", "data": { "children": [] } },
            { "kind": "Listing", "data": { "children": [
                { "kind": "t1", "data": { "author": "a", "body": "hi", "replies": "" } }
            ] } }
        ])
        .to_string();
        let (client, server) = serve_once(200, body);
        let comments = client.comments("r/rust", "abc", CommentSort::Top).unwrap();
        assert_eq!(comments.len(), 1);
        assert_eq!(
            server.join().expect("server thread").url,
            "/r/rust/comments/abc.json?sort=top"
        );
    }

    #[test]
    fn malformed_body_is_a_failure() {
        let (client, server) = serve_once(200, "<html>".into());
        let err = client
            .listing(&FeedTarget::Subreddit("x".into()), SortMode::Top)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NetworkFailure);
        server.join().expect("server thread");
    }
}
