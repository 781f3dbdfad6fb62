use async_trait::async_trait;
use bsky_msg::{
    CreateSessionInput, GetFollowersOutput, GetLikesOutput, GetPostThreadOutput, GetPostsOutput,
    GetProfilesOutput, GetRepostedByOutput, Page, PostView, Profile, ResolveHandleOutput,
    SessionOutput, ThreadNode, XrpcErrorBody,
};
use bsky_ref::{Did, PostUri};
use log::{debug, trace};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use std::future::Future;

use crate::{ClientConfig, Connect, Credentials, Error, Upstream};

/// Upstream cap on actors/uris per `getProfiles` / `getPosts` request.
pub const MAX_BATCH: usize = 25;

type Params = Vec<(&'static str, String)>;

/// Builds authenticated [`XrpcClient`]s against one service.
#[derive(Clone, Debug)]
pub struct XrpcConnector {
    http: Client,
    service: String,
}

impl XrpcConnector {
    pub fn new(config: &ClientConfig) -> Result<Self, Error> {
        let http = Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("bsky-raffle/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(Error::Build)?;

        Ok(Self {
            http,
            service: config.service.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl Connect for XrpcConnector {
    type Client = XrpcClient;

    async fn connect(&self, credentials: &Credentials) -> Result<XrpcClient, Error> {
        XrpcClient::login(self.http.clone(), self.service.clone(), credentials).await
    }
}

struct Session {
    access_jwt: String,
    refresh_jwt: String,
}

pub struct XrpcClient {
    http: Client,
    service: String,
    session: Session,
}

impl XrpcClient {
    pub async fn login(
        http: Client,
        service: String,
        credentials: &Credentials,
    ) -> Result<Self, Error> {
        const METHOD: &str = "com.atproto.server.createSession";
        debug!("Logging in as {}", credentials.identifier);

        let request = http
            .post(format!("{}/xrpc/{}", service, METHOD))
            .json(&CreateSessionInput {
                identifier: credentials.identifier.as_str(),
                password: credentials.password.as_str(),
            });
        let output: SessionOutput = send(METHOD, request).await?;
        debug!("Logged in as {} ({})", output.handle, output.did);

        Ok(Self {
            http,
            service,
            session: output.into(),
        })
    }

    /// Trades the refresh token for a new access token.
    pub async fn refresh_session(&mut self) -> Result<(), Error> {
        const METHOD: &str = "com.atproto.server.refreshSession";
        trace!("{}", METHOD);

        let request = self
            .http
            .post(self.url(METHOD))
            .bearer_auth(&self.session.refresh_jwt);
        let output: SessionOutput = send(METHOD, request).await?;
        self.session = output.into();

        Ok(())
    }

    fn url(&self, method: &str) -> String {
        format!("{}/xrpc/{}", self.service, method)
    }

    async fn query<T: DeserializeOwned>(
        &self,
        method: &'static str,
        params: &Params,
    ) -> Result<T, Error> {
        trace!("{} {:?}", method, params);

        let request = self
            .http
            .get(self.url(method))
            .bearer_auth(&self.session.access_jwt)
            .query(params);
        send(method, request).await
    }
}

impl From<SessionOutput> for Session {
    fn from(output: SessionOutput) -> Self {
        Session {
            access_jwt: output.access_jwt,
            refresh_jwt: output.refresh_jwt,
        }
    }
}

async fn send<T: DeserializeOwned>(
    method: &'static str,
    request: RequestBuilder,
) -> Result<T, Error> {
    let response = request
        .send()
        .await
        .map_err(|source| transport_error(method, source))?;
    let response = check_status(method, response).await?;

    response.json::<T>().await.map_err(|source| {
        if source.is_timeout() {
            Error::Timeout { method }
        } else {
            Error::Decode { method, source }
        }
    })
}

fn transport_error(method: &'static str, source: reqwest::Error) -> Error {
    if source.is_timeout() {
        Error::Timeout { method }
    } else {
        Error::Transport { method, source }
    }
}

async fn check_status(method: &'static str, response: Response) -> Result<Response, Error> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body: XrpcErrorBody = response.json().await.unwrap_or_default();
    Err(Error::Xrpc {
        method,
        status: status.as_u16(),
        error: body.error,
        message: body.message,
    })
}

fn page_params(key: &'static str, subject: String, limit: u8, cursor: Option<&str>) -> Params {
    let mut params = vec![(key, subject), ("limit", limit.to_string())];
    if let Some(cursor) = cursor.filter(|cursor| !cursor.is_empty()) {
        params.push(("cursor", cursor.to_string()));
    }
    params
}

fn batch_params<T: ToString>(key: &'static str, batch: &[T]) -> Params {
    batch.iter().map(|item| (key, item.to_string())).collect()
}

/// Issues one request per [`MAX_BATCH`] items, in order. The first failed
/// request fails the whole call and later batches are not sent.
async fn batched<I, T, F, Fut>(items: &[I], mut fetch: F) -> Result<Vec<T>, Error>
where
    F: FnMut(&[I]) -> Fut,
    Fut: Future<Output = Result<Vec<T>, Error>>,
{
    let mut results = Vec::with_capacity(items.len());
    for batch in items.chunks(MAX_BATCH) {
        results.extend(fetch(batch).await?);
    }
    Ok(results)
}

#[async_trait]
impl Upstream for XrpcClient {
    async fn resolve_handle(&self, handle: &str) -> Result<Did, Error> {
        let params = vec![("handle", handle.to_string())];
        let output: ResolveHandleOutput = self
            .query("com.atproto.identity.resolveHandle", &params)
            .await?;
        Ok(output.did)
    }

    async fn get_post_thread(
        &self,
        uri: &PostUri,
        depth: u16,
        parent_height: u16,
    ) -> Result<ThreadNode, Error> {
        let params = vec![
            ("uri", uri.to_string()),
            ("depth", depth.to_string()),
            ("parentHeight", parent_height.to_string()),
        ];
        let output: GetPostThreadOutput =
            self.query("app.bsky.feed.getPostThread", &params).await?;
        Ok(output.thread)
    }

    async fn list_followers(
        &self,
        actor: &Did,
        limit: u8,
        cursor: Option<&str>,
    ) -> Result<Page<Profile>, Error> {
        let params = page_params("actor", actor.to_string(), limit, cursor);
        let output: GetFollowersOutput = self.query("app.bsky.graph.getFollowers", &params).await?;
        Ok(output.into())
    }

    async fn list_likers(
        &self,
        uri: &PostUri,
        limit: u8,
        cursor: Option<&str>,
    ) -> Result<Page<Profile>, Error> {
        let params = page_params("uri", uri.to_string(), limit, cursor);
        let output: GetLikesOutput = self.query("app.bsky.feed.getLikes", &params).await?;
        Ok(output.into())
    }

    async fn list_reposters(
        &self,
        uri: &PostUri,
        limit: u8,
        cursor: Option<&str>,
    ) -> Result<Page<Profile>, Error> {
        let params = page_params("uri", uri.to_string(), limit, cursor);
        let output: GetRepostedByOutput =
            self.query("app.bsky.feed.getRepostedBy", &params).await?;
        Ok(output.into())
    }

    async fn get_profiles(&self, actors: &[String]) -> Result<Vec<Profile>, Error> {
        let client = self;
        batched(actors, move |batch| {
            let params = batch_params("actors", batch);
            async move {
                let output: GetProfilesOutput =
                    client.query("app.bsky.actor.getProfiles", &params).await?;
                Ok(output.profiles)
            }
        })
        .await
    }

    async fn get_posts(&self, uris: &[PostUri]) -> Result<Vec<PostView>, Error> {
        let client = self;
        batched(uris, move |batch| {
            let params = batch_params("uris", batch);
            async move {
                let output: GetPostsOutput = client.query("app.bsky.feed.getPosts", &params).await?;
                Ok(output.posts)
            }
        })
        .await
    }
}
