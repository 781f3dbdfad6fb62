use bsky_client::{Connect, Credentials, Upstream};
use bsky_msg::Profile;
use bsky_ref::{AppPassword, PostRef};
use log::info;
use rand::Rng;
use serde::Serialize;

mod collect;
mod drawing_info;
mod eligibility;
mod error;
mod options;
mod select;
mod snapshot;
mod winners;
#[cfg(test)]
mod testing;

pub use collect::{collect_all, PAGE_LIMIT};
pub use drawing_info::{drawing_info, DrawingInfo, WinnerReply};
pub use eligibility::{eligible_entrants, qualifying_replies, Eligibility};
pub use error::DrawError;
pub use options::DrawOptions;
pub use select::{select_winners, Selection};
pub use snapshot::{assemble, fetch_post, post_info, resolve_author, EngagementSnapshot, HandleSet};
pub use winners::{winner_profiles, winning_replies, WinningReplies, WinningReply};

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DrawResult {
    pub post_info: EngagementSnapshot,
    pub winners: Vec<Profile>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub winning_replies: Option<WinningReplies>,
    /// Every eligible entrant, sorted.
    pub final_entrant_pool: Vec<String>,
    pub requested_winner_count: usize,
    pub verified: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Verification {
    pub verified: bool,
}

/// Draws winners for the post at `post_url`.
///
/// With `options.password` set the draw logs in as the post author, which
/// marks the result verified; otherwise `default_credentials` are used.
/// Inputs are validated before any network call.
pub async fn draw_winners<C: Connect, R: Rng + ?Sized>(
    connector: &C,
    default_credentials: &Credentials,
    post_url: &str,
    options: &DrawOptions,
    rng: &mut R,
) -> Result<DrawResult, DrawError> {
    let post_ref = PostRef::from_string(post_url.to_string())?;
    options.validate()?;

    let (credentials, verified) = match &options.password {
        Some(password) => {
            let password = AppPassword::from_string(password.clone())?;
            (
                Credentials::new(post_ref.author_handle(), password.as_str()),
                true,
            )
        }
        None => (default_credentials.clone(), false),
    };

    let upstream = connect(connector, &credentials).await?;
    run_draw(&upstream, &post_ref, options, verified, rng).await
}

/// The draw itself, over an already authenticated session.
pub async fn run_draw<U: Upstream, R: Rng + ?Sized>(
    upstream: &U,
    post_ref: &PostRef,
    options: &DrawOptions,
    verified: bool,
    rng: &mut R,
) -> Result<DrawResult, DrawError> {
    let post_info = post_info(upstream, post_ref).await?;

    let eligibility = eligible_entrants(&post_info, options)?;
    let selection = select_winners(&eligibility.entrants, options.winner_count, rng);
    info!(
        "Drew {} of {} entrants for {}",
        selection.winners.len(),
        selection.entrants.len(),
        post_info.post.uri
    );

    let winners = winner_profiles(upstream, &selection.winners).await?;
    let winning_replies = eligibility
        .qualifying_replies
        .as_ref()
        .map(|replies| winning_replies(&selection.winners, replies));

    Ok(DrawResult {
        post_info,
        winners,
        winning_replies,
        final_entrant_pool: selection.entrants,
        requested_winner_count: options.winner_count,
        verified,
    })
}

/// Looks up the engagement snapshot for a web post URL.
pub async fn parse_post<C: Connect>(
    connector: &C,
    credentials: &Credentials,
    post_url: &str,
) -> Result<EngagementSnapshot, DrawError> {
    let post_ref = PostRef::from_string(post_url.to_string())?;
    let upstream = connect(connector, credentials).await?;
    post_info(&upstream, &post_ref).await
}

/// Proves control of `handle` by logging in with an app password.
pub async fn verify_handle<C: Connect>(
    connector: &C,
    handle: &str,
    password: &str,
) -> Result<Verification, DrawError> {
    let handle = handle.trim();
    if handle.is_empty() {
        return Err(DrawError::Validation("Missing handle".to_string()));
    }
    let password = AppPassword::from_string(password.to_string())?;

    connect(connector, &Credentials::new(handle, password.as_str())).await?;
    Ok(Verification { verified: true })
}

pub async fn connect<C: Connect>(
    connector: &C,
    credentials: &Credentials,
) -> Result<C::Client, DrawError> {
    connector.connect(credentials).await.map_err(|source| {
        let context = if source.is_unauthorized() {
            format!("Bluesky rejected the login for {}", credentials.identifier)
        } else {
            "Unable to authorize with Bluesky".to_string()
        };
        DrawError::Upstream { context, source }
    })
}
