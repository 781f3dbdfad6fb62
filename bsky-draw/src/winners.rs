use bsky_client::Upstream;
use bsky_msg::{PostView, Profile};
use bsky_ref::PostUri;
use log::{trace, warn};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

use crate::DrawError;

/// A winner's qualifying reply as surfaced with the result.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct WinningReply {
    pub uri: PostUri,
    pub record: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embed: Option<Value>,
}

impl From<&PostView> for WinningReply {
    fn from(reply: &PostView) -> Self {
        WinningReply {
            uri: reply.uri.clone(),
            record: reply.record.clone(),
            embed: reply.embed.clone(),
        }
    }
}

/// Winner handle to every qualifying reply that winner wrote.
pub type WinningReplies = BTreeMap<String, Vec<WinningReply>>;

/// Looks up full profiles for the winners in one batched call, kept in draw order.
///
/// Handles are those seen at collection time; an account that changed its
/// handle since then is missing from the upstream answer and is left out here.
pub async fn winner_profiles<U: Upstream>(
    upstream: &U,
    winners: &[String],
) -> Result<Vec<Profile>, DrawError> {
    trace!("Fetching profiles for {:?}", winners);
    let mut profiles = upstream
        .get_profiles(winners)
        .await
        .map_err(DrawError::upstream("Could not fetch profiles of winners"))?;

    profiles.sort_by_key(|profile| {
        winners
            .iter()
            .position(|winner| winner == &profile.handle)
            .unwrap_or(usize::MAX)
    });

    if profiles.len() != winners.len() {
        warn!(
            "Asked for {} winner profiles, upstream returned {}",
            winners.len(),
            profiles.len()
        );
    }

    Ok(profiles)
}

pub fn winning_replies(winners: &[String], qualifying: &[&PostView]) -> WinningReplies {
    winners
        .iter()
        .map(|winner| {
            let replies = qualifying
                .iter()
                .filter(|reply| &reply.author.handle == winner)
                .map(|reply| WinningReply::from(*reply))
                .collect();
            (winner.clone(), replies)
        })
        .collect()
}
