use crate::model::{Comment, CommentSort, FeedTarget, Post, SortMode};
use crate::reddit::{self, FetchError};

/// Read access to Reddit, as the runtime sees it.
pub trait RedditApi: Send + Sync {
    fn listing(&self, target: &FeedTarget, sort: SortMode) -> Result<Vec<Post>, FetchError>;
    fn comments(
        &self,
        subreddit: &str,
        post_id: &str,
        sort: CommentSort,
    ) -> Result<Vec<Comment>, FetchError>;
}

impl RedditApi for reddit::Client {
    fn listing(&self, target: &FeedTarget, sort: SortMode) -> Result<Vec<Post>, FetchError> {
        reddit::Client::listing(self, target, sort)
    }

    fn comments(
        &self,
        subreddit: &str,
        post_id: &str,
        sort: CommentSort,
    ) -> Result<Vec<Comment>, FetchError> {
        reddit::Client::comments(self, subreddit, post_id, sort)
    }
}

/// Canned content for `--offline` and tests.
#[derive(Default)]
pub struct MockRedditApi;

impl RedditApi for MockRedditApi {
    fn listing(&self, target: &FeedTarget, _sort: SortMode) -> Result<Vec<Post>, FetchError> {
        let subreddit = target.display_name();
        Ok(vec![
            mock_post(
                "welcome",
                &subreddit,
                &format!("Sample posts for {subreddit}"),
                "Offline mode shows **sample** content.\n\n- nothing is fetched\n- saving still works",
            ),
            mock_post("links", &subreddit, "A link post", ""),
        ])
    }

    fn comments(
        &self,
        _subreddit: &str,
        post_id: &str,
        _sort: CommentSort,
    ) -> Result<Vec<Comment>, FetchError> {
        Ok(vec![Comment {
            author: "zennit".into(),
            body: format!("Comments for `{post_id}` are unavailable offline."),
            media_metadata: None,
            is_pinned: true,
            upvote_score: 1,
            replies: vec![Comment {
                author: "zennit".into(),
                body: "> replies nest like this".into(),
                media_metadata: None,
                is_pinned: false,
                upvote_score: 0,
                replies: Vec::new(),
                is_visible: true,
            }],
            is_visible: true,
        }])
    }
}

fn mock_post(id: &str, subreddit: &str, title: &str, body: &str) -> Post {
    Post {
        id: id.into(),
        title: title.into(),
        author: "zennit".into(),
        content: body.into(),
        url: (id == "links").then(|| "https://www.rust-lang.org/".to_string()),
        subreddit: subreddit.into(),
        created_at: 0,
        gallery_data: None,
        media_metadata: None,
        is_pinned: id == "welcome",
        upvote_score: 1234,
        media: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::{self, ContentVariant};
    use std::sync::Arc;

    #[test]
    fn mock_listing_is_labelled_with_target() {
        let api: Arc<dyn RedditApi> = Arc::new(MockRedditApi);
        let posts = api
            .listing(&FeedTarget::User("spez".into()), SortMode::New)
            .unwrap();
        assert_eq!(posts.len(), 2);
        assert_eq!(posts[0].subreddit, "u/spez");
        assert_eq!(
            content::resolve(&posts[1]),
            ContentVariant::ExternalLink {
                url: "https://www.rust-lang.org/".into()
            }
        );
    }

    #[test]
    fn mock_comments_have_replies() {
        let comments = MockRedditApi
            .comments("r/rust", "abc", CommentSort::Top)
            .unwrap();
        assert_eq!(comments[0].replies.len(), 1);
        assert!(comments[0].body.contains("abc"));
    }
}
