use bsky_client::Upstream;
use bsky_msg::{PostView, Profile};
use bsky_ref::{Did, PostUri};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

use crate::{snapshot::fetch_post, DrawError};

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DrawingInfo {
    pub post: PostView,
    pub winners: Vec<Profile>,
    pub winner_replies: BTreeMap<Did, Vec<WinnerReply>>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct WinnerReply {
    pub uri: PostUri,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embed: Option<Value>,
}

impl From<PostView> for WinnerReply {
    fn from(post: PostView) -> Self {
        WinnerReply {
            text: post.text().to_string(),
            uri: post.uri,
            embed: post.embed,
        }
    }
}

/// Re-fetches a stored drawing for display: the post alone, the winners'
/// current profiles, and the replies recorded for each winner.
pub async fn drawing_info<U: Upstream>(
    upstream: &U,
    author_did: &Did,
    post_id: &str,
    winner_dids: &[Did],
    winner_reply_uris: &BTreeMap<Did, Vec<PostUri>>,
) -> Result<DrawingInfo, DrawError> {
    let post = fetch_post(upstream, author_did, post_id, 0).await?.post;

    let actors: Vec<String> = winner_dids.iter().map(Did::to_string).collect();
    let winners = upstream
        .get_profiles(&actors)
        .await
        .map_err(DrawError::upstream("Unable to fetch winner profiles"))?;

    let mut winner_replies = BTreeMap::new();
    for (winner, uris) in winner_reply_uris {
        let replies = if uris.is_empty() {
            Vec::new()
        } else {
            upstream
                .get_posts(uris)
                .await
                .map_err(DrawError::upstream(format!(
                    "Unable to fetch replies of winner {}",
                    winner
                )))?
                .into_iter()
                .map(WinnerReply::from)
                .collect()
        };
        winner_replies.insert(winner.clone(), replies);
    }

    Ok(DrawingInfo {
        post,
        winners,
        winner_replies,
    })
}
