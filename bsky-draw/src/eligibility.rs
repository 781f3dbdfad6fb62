use bsky_msg::PostView;
use log::debug;

use crate::{snapshot::HandleSet, DrawError, DrawOptions, EngagementSnapshot};

/// The entrant pool after every requirement has been applied.
#[derive(Clone, Debug)]
pub struct Eligibility<'a> {
    pub entrants: HandleSet,
    /// Present only when a reply requirement is active.
    pub qualifying_replies: Option<Vec<&'a PostView>>,
}

/// Replies that satisfy the reply requirement, if there is one.
pub fn qualifying_replies<'a>(
    replies: &'a [PostView],
    options: &DrawOptions,
) -> Option<Vec<&'a PostView>> {
    if options.require_reply_image {
        Some(replies.iter().filter(|reply| reply.has_embed()).collect())
    } else if options.require_reply {
        Some(replies.iter().collect())
    } else {
        None
    }
}

pub fn eligible_entrants<'a>(
    snapshot: &'a EngagementSnapshot,
    options: &DrawOptions,
) -> Result<Eligibility<'a>, DrawError> {
    let mut entrants: HandleSet = snapshot
        .replies
        .iter()
        .map(|reply| reply.author.handle.clone())
        .chain(snapshot.liked_by.iter().cloned())
        .chain(snapshot.reposted_by.iter().cloned())
        .collect();

    entrants.remove(snapshot.author_handle());
    debug!("Seeded pool with {} entrants", entrants.len());

    if options.require_repost {
        entrants.retain(|handle| snapshot.reposted_by.contains(handle));
    }
    if options.require_like {
        entrants.retain(|handle| snapshot.liked_by.contains(handle));
    }
    if options.require_follow {
        entrants.retain(|handle| snapshot.author_followers.contains(handle));
    }

    let qualifying_replies = qualifying_replies(&snapshot.replies, options);
    if let Some(replies) = &qualifying_replies {
        let repliers: HandleSet = replies
            .iter()
            .map(|reply| reply.author.handle.clone())
            .collect();
        entrants.retain(|handle| repliers.contains(handle));
    }

    debug!("{} entrants remain after requirements", entrants.len());
    if entrants.is_empty() {
        return Err(DrawError::EmptyPool);
    }

    Ok(Eligibility {
        entrants,
        qualifying_replies,
    })
}
