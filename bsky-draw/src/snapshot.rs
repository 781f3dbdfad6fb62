use bsky_client::Upstream;
use bsky_msg::{PostView, Profile, ThreadViewPost};
use bsky_ref::{Did, PostRef, PostUri};
use itertools::Itertools;
use log::{info, trace};
use serde::{Serialize, Serializer};
use std::collections::HashSet;

use crate::{
    collect::{collect_all, PAGE_LIMIT},
    DrawError,
};

pub type HandleSet = HashSet<String>;

/// Point-in-time capture of a post and everyone who engaged with it.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngagementSnapshot {
    pub post: PostView,
    pub post_id: String,
    pub replies: Vec<PostView>,
    #[serde(serialize_with = "sorted")]
    pub liked_by: HandleSet,
    #[serde(serialize_with = "sorted")]
    pub reposted_by: HandleSet,
    #[serde(serialize_with = "sorted")]
    pub author_followers: HandleSet,
}

fn sorted<S: Serializer>(handles: &HandleSet, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_seq(handles.iter().sorted())
}

impl EngagementSnapshot {
    pub fn author_handle(&self) -> &str {
        self.post.author.handle.as_str()
    }
}

/// Resolves a web post reference to its engagement snapshot.
pub async fn post_info<U: Upstream>(
    upstream: &U,
    post_ref: &PostRef,
) -> Result<EngagementSnapshot, DrawError> {
    let author_did = resolve_author(upstream, post_ref).await?;
    assemble(upstream, &author_did, post_ref.post_id()).await
}

pub async fn resolve_author<U: Upstream>(
    upstream: &U,
    post_ref: &PostRef,
) -> Result<Did, DrawError> {
    if let Some(did) = post_ref.author_did() {
        return Ok(did);
    }

    let handle = post_ref.author_handle();
    trace!("Resolving handle {}", handle);
    upstream
        .resolve_handle(handle)
        .await
        .map_err(DrawError::not_found_or_upstream(format!(
            "Unable to find profile with handle \"{}\"",
            handle
        )))
}

/// Fetches a post and its replies down to `depth`. A missing, deleted or
/// blocked post is reported as the same `NotFound`.
pub async fn fetch_post<U: Upstream>(
    upstream: &U,
    author_did: &Did,
    post_id: &str,
    depth: u16,
) -> Result<ThreadViewPost, DrawError> {
    let uri = PostUri::new(author_did.clone(), post_id);
    let message = format!(
        "Unable to find post with ID \"{}\", or the post is blocked",
        post_id
    );

    let node = upstream
        .get_post_thread(&uri, depth, 0)
        .await
        .map_err(DrawError::not_found_or_upstream(message.as_str()))?;

    node.into_post().ok_or(DrawError::NotFound(message))
}

pub async fn assemble<U: Upstream>(
    upstream: &U,
    author_did: &Did,
    post_id: &str,
) -> Result<EngagementSnapshot, DrawError> {
    let thread = fetch_post(upstream, author_did, post_id, 1).await?;
    let replies = thread.reply_posts();
    let post = thread.post;

    let (author_followers, liked_by, reposted_by) = tokio::try_join!(
        followers_of(upstream, &post.author.did),
        likers_of(upstream, &post.uri),
        reposters_of(upstream, &post.uri),
    )?;

    info!(
        "Post {} has {} replies, {} likes, {} reposts, author has {} followers",
        post.uri,
        replies.len(),
        liked_by.len(),
        reposted_by.len(),
        author_followers.len()
    );

    Ok(EngagementSnapshot {
        post,
        post_id: post_id.to_string(),
        replies,
        liked_by,
        reposted_by,
        author_followers,
    })
}

async fn followers_of<U: Upstream>(upstream: &U, actor: &Did) -> Result<HandleSet, DrawError> {
    let profiles = collect_all(move |cursor| async move {
        upstream
            .list_followers(actor, PAGE_LIMIT, cursor.as_deref())
            .await
    })
    .await
    .map_err(DrawError::upstream("Unable to fetch post author's follower list"))?;

    Ok(handles(profiles))
}

async fn likers_of<U: Upstream>(upstream: &U, uri: &PostUri) -> Result<HandleSet, DrawError> {
    let profiles = collect_all(move |cursor| async move {
        upstream
            .list_likers(uri, PAGE_LIMIT, cursor.as_deref())
            .await
    })
    .await
    .map_err(DrawError::upstream("Unable to fetch post likes"))?;

    Ok(handles(profiles))
}

async fn reposters_of<U: Upstream>(upstream: &U, uri: &PostUri) -> Result<HandleSet, DrawError> {
    let profiles = collect_all(move |cursor| async move {
        upstream
            .list_reposters(uri, PAGE_LIMIT, cursor.as_deref())
            .await
    })
    .await
    .map_err(DrawError::upstream("Unable to fetch post reposts"))?;

    Ok(handles(profiles))
}

fn handles(profiles: Vec<Profile>) -> HandleSet {
    profiles.into_iter().map(|profile| profile.handle).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{did, FakeUpstream, ThreadState};

    fn post_ref(url: &str) -> PostRef {
        PostRef::from_string(url.to_string()).unwrap()
    }

    #[tokio::test]
    async fn test_assembles_snapshot() {
        let upstream = FakeUpstream::new("alice.test", "root")
            .likers(&["a.test", "b.test", "c.test"])
            .reposters(&["b.test", "d.test"])
            .followers(&["b.test", "c.test"])
            .reply("c.test", "r1", false)
            .reply("e.test", "r2", true);

        let snapshot = post_info(
            &upstream,
            &post_ref("https://bsky.app/profile/alice.test/post/root"),
        )
        .await
        .unwrap();

        assert_eq!(snapshot.author_handle(), "alice.test");
        assert_eq!(snapshot.post_id, "root");
        assert_eq!(snapshot.replies.len(), 2);
        assert_eq!(snapshot.liked_by.len(), 3);
        assert!(snapshot.reposted_by.contains("d.test"));
        assert!(snapshot.author_followers.contains("c.test"));
    }

    #[tokio::test]
    async fn test_handle_sets_serialize_sorted() {
        let upstream = FakeUpstream::new("alice.test", "root")
            .likers(&["d.test", "b.test", "c.test", "a.test"])
            .reposters(&["z.test", "m.test"])
            .followers(&["y.test", "x.test"]);

        let snapshot = assemble(&upstream, &did("alice.test"), "root").await.unwrap();
        let json = serde_json::to_value(&snapshot).unwrap();

        assert_eq!(
            json["likedBy"],
            serde_json::json!(["a.test", "b.test", "c.test", "d.test"])
        );
        assert_eq!(json["repostedBy"], serde_json::json!(["m.test", "z.test"]));
        assert_eq!(json["authorFollowers"], serde_json::json!(["x.test", "y.test"]));
    }

    #[tokio::test]
    async fn test_collects_across_pages() {
        let likers: Vec<String> = (0..250).map(|n| format!("user{}.test", n)).collect();
        let likers: Vec<&str> = likers.iter().map(String::as_str).collect();
        let upstream = FakeUpstream::new("alice.test", "root").likers(&likers);

        let snapshot = assemble(&upstream, &did("alice.test"), "root").await.unwrap();

        assert_eq!(snapshot.liked_by.len(), 250);
        assert_eq!(upstream.calls("app.bsky.feed.getLikes"), 3);
    }

    #[tokio::test]
    async fn test_did_profile_skips_resolution() {
        let upstream = FakeUpstream::new("alice.test", "root");
        let url = format!("https://bsky.app/profile/{}/post/root", did("alice.test"));

        let snapshot = post_info(&upstream, &post_ref(&url)).await.unwrap();

        assert_eq!(snapshot.author_handle(), "alice.test");
        assert_eq!(upstream.calls("com.atproto.identity.resolveHandle"), 0);
    }

    #[tokio::test]
    async fn test_unknown_handle_is_not_found() {
        let upstream = FakeUpstream::new("alice.test", "root");
        let result = post_info(
            &upstream,
            &post_ref("https://bsky.app/profile/nobody.test/post/root"),
        )
        .await;
        assert!(matches!(
            result,
            Err(DrawError::NotFound(message)) if message.contains("nobody.test")
        ));
    }

    #[tokio::test]
    async fn test_missing_and_blocked_posts_report_identically() {
        let mut messages = Vec::new();
        for state in [ThreadState::NotFound, ThreadState::Blocked, ThreadState::Gone] {
            let upstream = FakeUpstream::new("alice.test", "root").thread_state(state);
            match assemble(&upstream, &did("alice.test"), "root").await {
                Err(DrawError::NotFound(message)) => messages.push(message),
                other => panic!("expected not found, got {:?}", other.map(|_| ())),
            }
        }
        assert!(messages.iter().all(|message| message == &messages[0]));
    }

    #[tokio::test]
    async fn test_listing_failure_aborts_assembly() {
        let upstream = FakeUpstream::new("alice.test", "root")
            .likers(&["a.test"])
            .fail("app.bsky.graph.getFollowers");

        let result = assemble(&upstream, &did("alice.test"), "root").await;

        assert!(matches!(result, Err(DrawError::Upstream { .. })));
    }
}
