use async_trait::async_trait;
use bsky_client::{Connect, Credentials, Error, Upstream};
use bsky_msg::{BlockedPost, NotFoundPost, Page, PostView, Profile, ThreadNode, ThreadViewPost};
use bsky_ref::{Did, PostUri};
use serde_json::json;
use std::{
    collections::{HashMap, HashSet},
    sync::Mutex,
};

pub fn did(handle: &str) -> Did {
    Did::from_string(format!("did:plc:{}", handle.replace('.', "-"))).unwrap()
}

pub fn profile(handle: &str) -> Profile {
    Profile {
        did: did(handle),
        handle: handle.to_string(),
        display_name: None,
        description: None,
        avatar: None,
        followers_count: None,
        follows_count: None,
        posts_count: None,
    }
}

pub fn post(handle: &str, rkey: &str, with_image: bool) -> PostView {
    PostView {
        uri: PostUri::new(did(handle), rkey),
        cid: format!("cid-{}", rkey),
        author: profile(handle),
        record: json!({ "$type": "app.bsky.feed.post", "text": format!("{} says hi", handle) }),
        embed: if with_image {
            Some(json!({ "$type": "app.bsky.embed.images#view", "images": [{ "alt": "" }] }))
        } else {
            None
        },
        reply_count: None,
        repost_count: None,
        like_count: None,
        indexed_at: None,
    }
}

#[derive(Clone, Copy, Debug)]
pub enum ThreadState {
    Visible,
    NotFound,
    Blocked,
    Gone,
}

/// In-memory upstream serving a single post and its engagement.
pub struct FakeUpstream {
    author: String,
    post_id: String,
    thread_state: ThreadState,
    replies: Vec<PostView>,
    likers: Vec<Profile>,
    reposters: Vec<Profile>,
    followers: Vec<Profile>,
    failing: HashSet<&'static str>,
    hidden_profiles: HashSet<String>,
    calls: Mutex<HashMap<&'static str, usize>>,
}

impl FakeUpstream {
    pub fn new(author: &str, post_id: &str) -> Self {
        Self {
            author: author.to_string(),
            post_id: post_id.to_string(),
            thread_state: ThreadState::Visible,
            replies: Vec::new(),
            likers: Vec::new(),
            reposters: Vec::new(),
            followers: Vec::new(),
            failing: HashSet::new(),
            hidden_profiles: HashSet::new(),
            calls: Mutex::new(HashMap::new()),
        }
    }

    pub fn likers(mut self, handles: &[&str]) -> Self {
        self.likers = handles.iter().map(|handle| profile(handle)).collect();
        self
    }

    pub fn reposters(mut self, handles: &[&str]) -> Self {
        self.reposters = handles.iter().map(|handle| profile(handle)).collect();
        self
    }

    pub fn followers(mut self, handles: &[&str]) -> Self {
        self.followers = handles.iter().map(|handle| profile(handle)).collect();
        self
    }

    pub fn reply(mut self, handle: &str, rkey: &str, with_image: bool) -> Self {
        self.replies.push(post(handle, rkey, with_image));
        self
    }

    pub fn thread_state(mut self, state: ThreadState) -> Self {
        self.thread_state = state;
        self
    }

    pub fn fail(mut self, method: &'static str) -> Self {
        self.failing.insert(method);
        self
    }

    /// Profile lookups silently omit this handle, as after a handle change.
    pub fn hide_profile(mut self, handle: &str) -> Self {
        self.hidden_profiles.insert(handle.to_string());
        self
    }

    pub fn calls(&self, method: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .get(method)
            .copied()
            .unwrap_or(0)
    }

    fn record(&self, method: &'static str) -> Result<(), Error> {
        *self.calls.lock().unwrap().entry(method).or_insert(0) += 1;
        if self.failing.contains(method) {
            Err(Error::Xrpc {
                method,
                status: 502,
                error: Some("UpstreamFailure".to_string()),
                message: None,
            })
        } else {
            Ok(())
        }
    }

    fn known_profiles(&self) -> impl Iterator<Item = Profile> + '_ {
        std::iter::once(profile(&self.author))
            .chain(self.likers.iter().cloned())
            .chain(self.reposters.iter().cloned())
            .chain(self.followers.iter().cloned())
            .chain(self.replies.iter().map(|reply| reply.author.clone()))
    }

    fn paginate(items: &[Profile], limit: u8, cursor: Option<&str>) -> Page<Profile> {
        let start: usize = cursor.map(|cursor| cursor.parse().unwrap()).unwrap_or(0);
        let end = (start + limit as usize).min(items.len());
        let next = if end < items.len() {
            Some(end.to_string())
        } else {
            None
        };
        Page::new(items[start..end].to_vec(), next)
    }
}

fn not_found(method: &'static str) -> Error {
    Error::Xrpc {
        method,
        status: 400,
        error: Some("NotFound".to_string()),
        message: None,
    }
}

#[async_trait]
impl Upstream for FakeUpstream {
    async fn resolve_handle(&self, handle: &str) -> Result<Did, Error> {
        self.record("com.atproto.identity.resolveHandle")?;
        self.known_profiles()
            .find(|profile| profile.handle == handle)
            .map(|profile| profile.did)
            .ok_or(Error::Xrpc {
                method: "com.atproto.identity.resolveHandle",
                status: 400,
                error: Some("InvalidRequest".to_string()),
                message: Some("Unable to resolve handle".to_string()),
            })
    }

    async fn get_post_thread(
        &self,
        uri: &PostUri,
        depth: u16,
        _parent_height: u16,
    ) -> Result<ThreadNode, Error> {
        self.record("app.bsky.feed.getPostThread")?;
        if uri.did() != &did(&self.author) || uri.rkey() != self.post_id {
            return Err(not_found("app.bsky.feed.getPostThread"));
        }

        match self.thread_state {
            ThreadState::Visible => Ok(ThreadNode::Post(ThreadViewPost {
                post: post(&self.author, &self.post_id, false),
                replies: if depth > 0 {
                    Some(
                        self.replies
                            .iter()
                            .map(|reply| {
                                ThreadNode::Post(ThreadViewPost {
                                    post: reply.clone(),
                                    replies: None,
                                })
                            })
                            .collect(),
                    )
                } else {
                    None
                },
            })),
            ThreadState::NotFound => Ok(ThreadNode::NotFound(NotFoundPost {
                uri: uri.to_string(),
                not_found: true,
            })),
            ThreadState::Blocked => Ok(ThreadNode::Blocked(BlockedPost {
                uri: uri.to_string(),
                blocked: true,
            })),
            ThreadState::Gone => Err(not_found("app.bsky.feed.getPostThread")),
        }
    }

    async fn list_followers(
        &self,
        _actor: &Did,
        limit: u8,
        cursor: Option<&str>,
    ) -> Result<Page<Profile>, Error> {
        self.record("app.bsky.graph.getFollowers")?;
        Ok(Self::paginate(&self.followers, limit, cursor))
    }

    async fn list_likers(
        &self,
        _uri: &PostUri,
        limit: u8,
        cursor: Option<&str>,
    ) -> Result<Page<Profile>, Error> {
        self.record("app.bsky.feed.getLikes")?;
        Ok(Self::paginate(&self.likers, limit, cursor))
    }

    async fn list_reposters(
        &self,
        _uri: &PostUri,
        limit: u8,
        cursor: Option<&str>,
    ) -> Result<Page<Profile>, Error> {
        self.record("app.bsky.feed.getRepostedBy")?;
        Ok(Self::paginate(&self.reposters, limit, cursor))
    }

    async fn get_profiles(&self, actors: &[String]) -> Result<Vec<Profile>, Error> {
        self.record("app.bsky.actor.getProfiles")?;
        let known: Vec<Profile> = self.known_profiles().collect();
        Ok(actors
            .iter()
            .filter(|actor| !self.hidden_profiles.contains(*actor))
            .filter_map(|actor| {
                known
                    .iter()
                    .find(|profile| {
                        &profile.handle == actor || profile.did.as_str() == actor.as_str()
                    })
                    .cloned()
            })
            .collect())
    }

    async fn get_posts(&self, uris: &[PostUri]) -> Result<Vec<PostView>, Error> {
        self.record("app.bsky.feed.getPosts")?;
        Ok(uris
            .iter()
            .filter_map(|uri| self.replies.iter().find(|reply| &reply.uri == uri).cloned())
            .collect())
    }
}

/// Hands out [`FakeUpstream`]s and remembers who logged in.
pub struct FakeConnector {
    pub upstream: fn() -> FakeUpstream,
    pub accepted_password: Option<&'static str>,
    pub logins: Mutex<Vec<String>>,
}

impl FakeConnector {
    pub fn new(upstream: fn() -> FakeUpstream) -> Self {
        Self {
            upstream,
            accepted_password: None,
            logins: Mutex::new(Vec::new()),
        }
    }

    pub fn accepting(mut self, password: &'static str) -> Self {
        self.accepted_password = Some(password);
        self
    }

    pub fn logins(&self) -> Vec<String> {
        self.logins.lock().unwrap().clone()
    }
}

#[async_trait]
impl Connect for FakeConnector {
    type Client = FakeUpstream;

    async fn connect(&self, credentials: &Credentials) -> Result<FakeUpstream, Error> {
        self.logins
            .lock()
            .unwrap()
            .push(credentials.identifier.clone());

        match self.accepted_password {
            Some(password) if password != credentials.password => Err(Error::Xrpc {
                method: "com.atproto.server.createSession",
                status: 401,
                error: Some("AuthenticationRequired".to_string()),
                message: Some("Invalid identifier or password".to_string()),
            }),
            _ => Ok((self.upstream)()),
        }
    }
}
