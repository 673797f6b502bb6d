use url::Url;

use crate::model::Post;

const GALLERY_MARKER: &str = "reddit.com/gallery/";
const COMMENTS_MARKER: &str = "/comments/";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentVariant {
    Video { fallback_url: String },
    Gallery { items: Vec<GalleryImage> },
    YouTubeEmbed { video_id: String },
    ExternalImage { url: String },
    ExternalLink { url: String },
    None,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GalleryImage {
    pub media_id: String,
    pub url: String,
}

impl ContentVariant {
    /// URL to hand to a browser or player, if the variant has one.
    pub fn external_url(&self) -> Option<String> {
        match self {
            ContentVariant::Video { fallback_url } => Some(fallback_url.clone()),
            ContentVariant::YouTubeEmbed { video_id } => {
                Some(format!("https://www.youtube.com/watch?v={video_id}"))
            }
            ContentVariant::ExternalImage { url } | ContentVariant::ExternalLink { url } => {
                Some(url.clone())
            }
            ContentVariant::Gallery { items } => items.first().map(|item| item.url.clone()),
            ContentVariant::None => None,
        }
    }
}

/// Priority cascade; the first rule that matches wins.
pub fn resolve(post: &Post) -> ContentVariant {
    if let Some(video) = post.media.as_ref().and_then(|media| media.video.as_ref()) {
        return ContentVariant::Video {
            fallback_url: video.fallback_url.clone(),
        };
    }

    let Some(url) = post.url.as_deref().map(str::trim).filter(|url| !url.is_empty()) else {
        return ContentVariant::None;
    };

    if url.contains(GALLERY_MARKER) {
        let items = gallery_images(post);
        if items.is_empty() {
            return ContentVariant::None;
        }
        return ContentVariant::Gallery { items };
    }

    let parsed = Url::parse(url).ok();
    if let Some(video_id) = parsed.as_ref().and_then(youtube_video_id) {
        return ContentVariant::YouTubeEmbed { video_id };
    }

    if url.contains(COMMENTS_MARKER) {
        return ContentVariant::None;
    }

    let reddit_hosted = parsed
        .as_ref()
        .and_then(|url| url.host_str())
        .map(is_reddit_media_host)
        .unwrap_or(false);
    if reddit_hosted {
        ContentVariant::ExternalImage {
            url: url.to_string(),
        }
    } else {
        ContentVariant::ExternalLink {
            url: url.to_string(),
        }
    }
}

/// Gallery order comes from `gallery_data`; items with no metadata entry are
/// skipped.
pub fn gallery_images(post: &Post) -> Vec<GalleryImage> {
    let (Some(gallery), Some(metadata)) = (&post.gallery_data, &post.media_metadata) else {
        return Vec::new();
    };
    gallery
        .items
        .iter()
        .filter_map(|item| {
            let url = metadata.get(&item.media_id)?.best_url()?;
            Some(GalleryImage {
                media_id: item.media_id.clone(),
                url: decode_amp(url),
            })
        })
        .collect()
}

pub fn decode_amp(url: &str) -> String {
    url.replace("&amp;", "&")
}

fn youtube_video_id(url: &Url) -> Option<String> {
    let host = url.host_str()?.trim_start_matches("www.").trim_start_matches("m.");
    let id = match host {
        "youtu.be" => url.path_segments()?.find(|segment| !segment.is_empty())?.to_string(),
        "youtube.com" | "music.youtube.com" => {
            let from_query = url
                .query_pairs()
                .find(|(key, _)| key == "v")
                .map(|(_, value)| value.into_owned());
            match from_query {
                Some(id) => id,
                None => {
                    let mut segments = url.path_segments()?;
                    match segments.next()? {
                        "shorts" | "embed" | "live" => segments.next()?.to_string(),
                        _ => return None,
                    }
                }
            }
        }
        _ => return None,
    };
    if id.is_empty() {
        None
    } else {
        Some(id)
    }
}

fn is_reddit_media_host(host: &str) -> bool {
    let host = host.to_ascii_lowercase();
    host == "redd.it"
        || host.ends_with(".redd.it")
        || host == "reddit.com"
        || host.ends_with(".reddit.com")
        || host.ends_with(".redditmedia.com")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{GalleryData, GalleryItem, Media, MediaMetadata, MediaSource, Video};
    use std::collections::BTreeMap;

    fn post(url: Option<&str>) -> Post {
        Post {
            id: "abc".into(),
            title: "title".into(),
            author: "author".into(),
            content: String::new(),
            url: url.map(str::to_string),
            subreddit: "r/pics".into(),
            created_at: 0,
            gallery_data: None,
            media_metadata: None,
            is_pinned: false,
            upvote_score: 0,
            media: None,
        }
    }

    fn with_gallery(mut post: Post) -> Post {
        post.gallery_data = Some(GalleryData {
            items: vec![
                GalleryItem { media_id: "one".into() },
                GalleryItem { media_id: "missing".into() },
                GalleryItem { media_id: "two".into() },
            ],
        });
        let mut metadata = BTreeMap::new();
        for id in ["one", "two"] {
            metadata.insert(
                id.to_string(),
                MediaMetadata {
                    source: MediaSource {
                        url: Some(format!("https://preview.redd.it/{id}.jpg?width=1&amp;s=x")),
                        gif: None,
                    },
                },
            );
        }
        post.media_metadata = Some(metadata);
        post
    }

    #[test]
    fn video_wins_over_gallery() {
        let mut p = with_gallery(post(Some("https://www.reddit.com/gallery/abc")));
        p.media = Some(Media {
            video: Some(Video {
                fallback_url: "https://v.redd.it/abc/DASH_720.mp4".into(),
            }),
        });
        assert_eq!(
            resolve(&p),
            ContentVariant::Video {
                fallback_url: "https://v.redd.it/abc/DASH_720.mp4".into()
            }
        );
    }

    #[test]
    fn gallery_joins_metadata_in_order() {
        let p = with_gallery(post(Some("https://www.reddit.com/gallery/abc")));
        let ContentVariant::Gallery { items } = resolve(&p) else {
            panic!("expected gallery");
        };
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].media_id, "one");
        assert_eq!(items[0].url, "https://preview.redd.it/one.jpg?width=1&s=x");
        assert_eq!(items[1].media_id, "two");
    }

    #[test]
    fn gallery_without_metadata_is_none() {
        let p = post(Some("https://www.reddit.com/gallery/abc"));
        assert_eq!(resolve(&p), ContentVariant::None);
    }

    #[test]
    fn youtube_ids_are_extracted() {
        assert_eq!(
            resolve(&post(Some("https://youtu.be/abc123"))),
            ContentVariant::YouTubeEmbed {
                video_id: "abc123".into()
            }
        );
        assert_eq!(
            resolve(&post(Some("https://www.youtube.com/watch?v=xyz789&t=10"))),
            ContentVariant::YouTubeEmbed {
                video_id: "xyz789".into()
            }
        );
    }

    #[test]
    fn reddit_hosts_become_images_and_others_links() {
        assert_eq!(
            resolve(&post(Some("https://i.redd.it/cat.png"))),
            ContentVariant::ExternalImage {
                url: "https://i.redd.it/cat.png".into()
            }
        );
        assert_eq!(
            resolve(&post(Some("https://example.com/article"))),
            ContentVariant::ExternalLink {
                url: "https://example.com/article".into()
            }
        );
    }

    #[test]
    fn self_posts_resolve_to_none() {
        assert_eq!(
            resolve(&post(Some("https://www.reddit.com/r/pics/comments/abc/title/"))),
            ContentVariant::None
        );
        assert_eq!(resolve(&post(None)), ContentVariant::None);
    }
}
