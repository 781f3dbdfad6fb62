use async_trait::async_trait;
use bsky_msg::{Page, PostView, Profile, ThreadNode};
use bsky_ref::{Did, PostUri};
use std::{fmt, time::Duration};
use thiserror::Error as ThisError;

mod xrpc;
pub use xrpc::{XrpcClient, XrpcConnector};

pub const DEFAULT_SERVICE: &str = "https://bsky.social";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, ThisError)]
pub enum Error {
    #[error("Failed to build http client, cause: {0}")]
    Build(#[source] reqwest::Error),
    #[error("Request to {method} timed out")]
    Timeout { method: &'static str },
    #[error("Failed to send request to {method}, cause: {source}")]
    Transport {
        method: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("{method} failed with status {status}: {}", detail(.error, .message))]
    Xrpc {
        method: &'static str,
        status: u16,
        error: Option<String>,
        message: Option<String>,
    },
    #[error("Failed to decode response from {method}, cause: {source}")]
    Decode {
        method: &'static str,
        #[source]
        source: reqwest::Error,
    },
}

fn detail<'a>(error: &'a Option<String>, message: &'a Option<String>) -> &'a str {
    message
        .as_deref()
        .or(error.as_deref())
        .unwrap_or("no message")
}

impl Error {
    /// Whether upstream reported the subject as absent rather than failing.
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::Xrpc { status, error, .. } => {
                *status == 404
                    || matches!(
                        error.as_deref(),
                        Some("NotFound") | Some("InvalidRequest") | Some("BlockedActor")
                    )
            }
            _ => false,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Error::Xrpc { status: 401, .. })
            || matches!(
                self,
                Error::Xrpc { error: Some(error), .. } if error == "AuthenticationRequired"
            )
    }
}

#[derive(Clone, Debug)]
pub struct ClientConfig {
    pub service: String,
    pub timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            service: DEFAULT_SERVICE.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

#[derive(Clone)]
pub struct Credentials {
    pub identifier: String,
    pub password: String,
}

impl Credentials {
    pub fn new(identifier: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("identifier", &self.identifier)
            .field("password", &"****")
            .finish()
    }
}

/// The slice of the upstream API a drawing consumes.
///
/// Implementations hold an already authenticated session; callers pass one
/// client by reference through a whole operation.
#[async_trait]
pub trait Upstream: Send + Sync {
    async fn resolve_handle(&self, handle: &str) -> Result<Did, Error>;

    async fn get_post_thread(
        &self,
        uri: &PostUri,
        depth: u16,
        parent_height: u16,
    ) -> Result<ThreadNode, Error>;

    async fn list_followers(
        &self,
        actor: &Did,
        limit: u8,
        cursor: Option<&str>,
    ) -> Result<Page<Profile>, Error>;

    async fn list_likers(
        &self,
        uri: &PostUri,
        limit: u8,
        cursor: Option<&str>,
    ) -> Result<Page<Profile>, Error>;

    async fn list_reposters(
        &self,
        uri: &PostUri,
        limit: u8,
        cursor: Option<&str>,
    ) -> Result<Page<Profile>, Error>;

    /// Actors may be handles or DIDs.
    async fn get_profiles(&self, actors: &[String]) -> Result<Vec<Profile>, Error>;

    async fn get_posts(&self, uris: &[PostUri]) -> Result<Vec<PostView>, Error>;
}

/// Opens an authenticated [`Upstream`] session.
#[async_trait]
pub trait Connect: Send + Sync {
    type Client: Upstream;

    async fn connect(&self, credentials: &Credentials) -> Result<Self::Client, Error>;
}
