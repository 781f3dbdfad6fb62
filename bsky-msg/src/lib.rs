// https://github.com/bluesky-social/atproto/tree/main/lexicons/app/bsky

use bsky_ref::{Did, PostUri};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use serde_with::{serde_as, DefaultOnError};

#[serde_as]
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub did: Did,
    pub handle: String,
    #[serde_as(deserialize_as = "DefaultOnError")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde_as(deserialize_as = "DefaultOnError")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde_as(deserialize_as = "DefaultOnError")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde_as(deserialize_as = "DefaultOnError")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub followers_count: Option<u64>,
    #[serde_as(deserialize_as = "DefaultOnError")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub follows_count: Option<u64>,
    #[serde_as(deserialize_as = "DefaultOnError")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub posts_count: Option<u64>,
}

#[serde_as]
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostView {
    pub uri: PostUri,
    pub cid: String,
    pub author: Profile,
    pub record: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embed: Option<Value>,
    #[serde_as(deserialize_as = "DefaultOnError")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_count: Option<u64>,
    #[serde_as(deserialize_as = "DefaultOnError")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repost_count: Option<u64>,
    #[serde_as(deserialize_as = "DefaultOnError")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub like_count: Option<u64>,
    #[serde_as(deserialize_as = "DefaultOnError")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub indexed_at: Option<String>,
}

impl PostView {
    /// Text of the post record, or empty when the record carries none.
    pub fn text(&self) -> &str {
        self.record
            .get("text")
            .and_then(Value::as_str)
            .unwrap_or("")
    }

    /// Whether the post carries an attachment (images, external card, quote, video).
    pub fn has_embed(&self) -> bool {
        matches!(&self.embed, Some(embed) if !embed.is_null())
    }
}

/// A node of `app.bsky.feed.getPostThread`, discriminated by `$type`.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(tag = "$type")]
pub enum ThreadNode {
    #[serde(rename = "app.bsky.feed.defs#threadViewPost")]
    Post(ThreadViewPost),
    #[serde(rename = "app.bsky.feed.defs#notFoundPost")]
    NotFound(NotFoundPost),
    #[serde(rename = "app.bsky.feed.defs#blockedPost")]
    Blocked(BlockedPost),
    #[serde(other)]
    Unknown,
}

impl ThreadNode {
    pub fn into_post(self) -> Option<ThreadViewPost> {
        match self {
            ThreadNode::Post(post) => Some(post),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct ThreadViewPost {
    pub post: PostView,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replies: Option<Vec<ThreadNode>>,
}

impl ThreadViewPost {
    /// Immediate replies that resolved to visible posts; not-found and blocked nodes are dropped.
    pub fn reply_posts(&self) -> Vec<PostView> {
        self.replies
            .iter()
            .flatten()
            .filter_map(|node| match node {
                ThreadNode::Post(reply) => Some(reply.post.clone()),
                _ => None,
            })
            .collect()
    }
}

#[serde_as]
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotFoundPost {
    pub uri: String,
    #[serde_as(deserialize_as = "DefaultOnError")]
    #[serde(default)]
    pub not_found: bool,
}

#[serde_as]
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct BlockedPost {
    pub uri: String,
    #[serde_as(deserialize_as = "DefaultOnError")]
    #[serde(default)]
    pub blocked: bool,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct GetPostThreadOutput {
    pub thread: ThreadNode,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ResolveHandleOutput {
    pub did: Did,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct GetFollowersOutput {
    pub followers: Vec<Profile>,
    #[serde(default)]
    pub cursor: Option<String>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Like {
    pub actor: Profile,
    #[serde(default)]
    pub created_at: Option<String>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct GetLikesOutput {
    pub likes: Vec<Like>,
    #[serde(default)]
    pub cursor: Option<String>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GetRepostedByOutput {
    pub reposted_by: Vec<Profile>,
    #[serde(default)]
    pub cursor: Option<String>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct GetProfilesOutput {
    pub profiles: Vec<Profile>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct GetPostsOutput {
    pub posts: Vec<PostView>,
}

#[derive(Clone, Debug, Serialize)]
pub struct CreateSessionInput<'a> {
    pub identifier: &'a str,
    pub password: &'a str,
}

#[derive(Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionOutput {
    pub access_jwt: String,
    pub refresh_jwt: String,
    pub handle: String,
    pub did: Did,
}

/// Body of a failed XRPC call.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct XrpcErrorBody {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// One page of a cursor-driven listing.
#[derive(Clone, Debug, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub cursor: Option<String>,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, cursor: Option<String>) -> Self {
        Self { items, cursor }
    }
}

impl From<GetFollowersOutput> for Page<Profile> {
    fn from(output: GetFollowersOutput) -> Self {
        Page::new(output.followers, output.cursor)
    }
}

impl From<GetLikesOutput> for Page<Profile> {
    fn from(output: GetLikesOutput) -> Self {
        Page::new(
            output.likes.into_iter().map(|like| like.actor).collect(),
            output.cursor,
        )
    }
}

impl From<GetRepostedByOutput> for Page<Profile> {
    fn from(output: GetRepostedByOutput) -> Self {
        Page::new(output.reposted_by, output.cursor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn post_json(did: &str, handle: &str, rkey: &str) -> Value {
        json!({
            "uri": format!("at://{}/app.bsky.feed.post/{}", did, rkey),
            "cid": "bafyreib",
            "author": { "did": did, "handle": handle, "displayName": handle },
            "record": { "$type": "app.bsky.feed.post", "text": format!("hello from {}", handle) },
            "replyCount": 2,
            "indexedAt": "2024-01-01T00:00:00.000Z"
        })
    }

    #[test]
    fn test_decode_thread_with_mixed_replies() {
        let mut with_image = post_json("did:plc:carol", "carol.test", "c1");
        with_image["embed"] = json!({ "$type": "app.bsky.embed.images#view", "images": [] });

        let body = json!({
            "thread": {
                "$type": "app.bsky.feed.defs#threadViewPost",
                "post": post_json("did:plc:alice", "alice.test", "root"),
                "replies": [
                    { "$type": "app.bsky.feed.defs#threadViewPost", "post": post_json("did:plc:bob", "bob.test", "b1") },
                    { "$type": "app.bsky.feed.defs#blockedPost", "uri": "at://did:plc:x/app.bsky.feed.post/y", "blocked": true,
                      "author": { "did": "did:plc:x" } },
                    { "$type": "app.bsky.feed.defs#threadViewPost", "post": with_image },
                    { "$type": "app.bsky.feed.defs#somethingNew" }
                ]
            }
        });

        let output: GetPostThreadOutput = serde_json::from_value(body).unwrap();
        let thread = output.thread.into_post().unwrap();
        assert_eq!(thread.post.author.handle, "alice.test");
        assert_eq!(thread.post.text(), "hello from alice.test");

        let replies = thread.reply_posts();
        assert_eq!(replies.len(), 2);
        assert_eq!(replies[0].author.handle, "bob.test");
        assert!(!replies[0].has_embed());
        assert!(replies[1].has_embed());
    }

    #[test]
    fn test_decode_not_found_thread() {
        let body = json!({
            "thread": {
                "$type": "app.bsky.feed.defs#notFoundPost",
                "uri": "at://did:plc:alice/app.bsky.feed.post/gone",
                "notFound": true
            }
        });
        let output: GetPostThreadOutput = serde_json::from_value(body).unwrap();
        assert!(matches!(
            output.thread,
            ThreadNode::NotFound(NotFoundPost { not_found: true, .. })
        ));
        assert!(output.thread.into_post().is_none());
    }

    #[test]
    fn test_bad_optional_fields_default() {
        let profile: Profile = serde_json::from_value(json!({
            "did": "did:plc:bob",
            "handle": "bob.test",
            "followersCount": "lots"
        }))
        .unwrap();
        assert_eq!(profile.followers_count, None);
    }

    #[test]
    fn test_likes_page() {
        let output: GetLikesOutput = serde_json::from_value(json!({
            "uri": "at://did:plc:alice/app.bsky.feed.post/root",
            "likes": [
                { "actor": { "did": "did:plc:bob", "handle": "bob.test" }, "createdAt": "2024-01-01T00:00:00Z", "indexedAt": "2024-01-01T00:00:00Z" }
            ],
            "cursor": "abc"
        }))
        .unwrap();
        let page: Page<Profile> = output.into();
        assert_eq!(page.items[0].handle, "bob.test");
        assert_eq!(page.cursor.as_deref(), Some("abc"));
    }
}
