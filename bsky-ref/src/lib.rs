use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::{convert::TryFrom, fmt};
use thiserror::Error as ThisError;

pub const POST_COLLECTION: &str = "app.bsky.feed.post";

#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum RefError {
    #[error("Does not match as {ref_type}: {input}")]
    BadFormat {
        ref_type: &'static str,
        input: String,
    },
}

/// A post as addressed by its human-facing web URL:
/// `<domain>/profile/<handle>/post/<id>`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostRef {
    author_handle: String,
    post_id: String,
}

impl PostRef {
    pub fn from_string(string: String) -> Result<Self, RefError> {
        let caps = match Self::single_regex().captures(string.as_str()) {
            Some(caps) => caps,
            None => return Err(Self::bad_format(string)),
        };
        let author_handle = caps.name("handle").map(|m| m.as_str()).unwrap_or("");
        let post_id = caps.name("id").map(|m| m.as_str()).unwrap_or("");
        if author_handle.is_empty() || post_id.is_empty() {
            return Err(Self::bad_format(string));
        }

        Ok(Self {
            author_handle: author_handle.to_string(),
            post_id: post_id.to_string(),
        })
    }

    pub fn author_handle(&self) -> &str {
        self.author_handle.as_str()
    }

    pub fn post_id(&self) -> &str {
        self.post_id.as_str()
    }

    /// The profile segment of a web URL may already carry a DID instead of a handle.
    pub fn author_did(&self) -> Option<Did> {
        if Did::is_match(self.author_handle()) {
            Some(Did(self.author_handle.clone()))
        } else {
            None
        }
    }

    pub fn single_regex() -> &'static Regex {
        lazy_static! {
            static ref RE: Regex = Regex::new(
                r"^(?:[a-zA-Z][a-zA-Z0-9+.-]*://)?[^/\s]+/profile/(?P<handle>[^/?#\s]+)/post/(?P<id>[a-z0-9_-]+)/?(?:[?#]\S*)?$"
            )
            .unwrap();
        }
        &RE
    }

    pub fn is_match(string: &str) -> bool {
        Self::single_regex().is_match(string)
    }

    fn bad_format(input: String) -> RefError {
        RefError::BadFormat {
            ref_type: "Post URL",
            input,
        }
    }
}

impl TryFrom<String> for PostRef {
    type Error = RefError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        PostRef::from_string(value)
    }
}

impl TryFrom<&str> for PostRef {
    type Error = RefError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        PostRef::from_string(value.to_string())
    }
}

/// Durable account identifier, e.g. `did:plc:z72i7hdynmk6r22z27h6tvur`.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
#[serde(try_from = "String")]
pub struct Did(String);

impl Did {
    pub fn from_string(string: String) -> Result<Self, RefError> {
        if !Self::is_match(string.as_str()) {
            Err(RefError::BadFormat {
                ref_type: "Did",
                input: string,
            })
        } else {
            Ok(Self(string))
        }
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    pub fn single_regex() -> &'static Regex {
        lazy_static! {
            static ref RE: Regex = Regex::new(r"^did:[a-z]+:[a-zA-Z0-9._:%-]*[a-zA-Z0-9._-]$").unwrap();
        }
        &RE
    }

    pub fn is_match(string: &str) -> bool {
        Self::single_regex().is_match(string)
    }
}

impl TryFrom<String> for Did {
    type Error = RefError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Did::from_string(value)
    }
}

impl From<&Did> for String {
    fn from(value: &Did) -> String {
        value.to_string()
    }
}

impl fmt::Display for Did {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// AT-URI of a post record: `at://<did>/app.bsky.feed.post/<rkey>`.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
#[serde(try_from = "String", into = "String")]
pub struct PostUri {
    did: Did,
    rkey: String,
}

impl PostUri {
    pub fn new(did: Did, rkey: impl Into<String>) -> Self {
        Self {
            did,
            rkey: rkey.into(),
        }
    }

    pub fn from_string(string: String) -> Result<Self, RefError> {
        let parsed = Self::single_regex().captures(string.as_str()).and_then(|caps| {
            let did = Did::from_string(caps.name("did")?.as_str().to_string()).ok()?;
            let rkey = caps.name("rkey")?.as_str().to_string();
            Some(Self { did, rkey })
        });

        parsed.ok_or(RefError::BadFormat {
            ref_type: "Post URI",
            input: string,
        })
    }

    pub fn did(&self) -> &Did {
        &self.did
    }

    pub fn rkey(&self) -> &str {
        self.rkey.as_str()
    }

    pub fn single_regex() -> &'static Regex {
        lazy_static! {
            static ref RE: Regex = Regex::new(
                r"^at://(?P<did>did:[^/\s]+)/app\.bsky\.feed\.post/(?P<rkey>[a-zA-Z0-9._:~-]+)$"
            )
            .unwrap();
        }
        &RE
    }

    pub fn is_match(string: &str) -> bool {
        Self::single_regex().is_match(string)
    }
}

impl TryFrom<String> for PostUri {
    type Error = RefError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        PostUri::from_string(value)
    }
}

impl From<&PostUri> for String {
    fn from(value: &PostUri) -> String {
        value.to_string()
    }
}

impl From<PostUri> for String {
    fn from(value: PostUri) -> String {
        value.to_string()
    }
}

impl fmt::Display for PostUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "at://{}/{}/{}", self.did, POST_COLLECTION, self.rkey)
    }
}

/// App password credential, `xxxx-xxxx-xxxx-xxxx`.
#[derive(Clone, PartialEq, Eq)]
pub struct AppPassword(String);

impl AppPassword {
    pub fn from_string(string: String) -> Result<Self, RefError> {
        if !Self::is_match(string.as_str()) {
            // never echo the rejected secret back
            Err(RefError::BadFormat {
                ref_type: "App password",
                input: "<redacted>".to_string(),
            })
        } else {
            Ok(Self(string))
        }
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    pub fn single_regex() -> &'static Regex {
        lazy_static! {
            static ref RE: Regex =
                Regex::new(r"^[a-z0-9]{4}-[a-z0-9]{4}-[a-z0-9]{4}-[a-z0-9]{4}$").unwrap();
        }
        &RE
    }

    pub fn is_match(string: &str) -> bool {
        Self::single_regex().is_match(string)
    }
}

impl TryFrom<String> for AppPassword {
    type Error = RefError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        AppPassword::from_string(value)
    }
}

impl fmt::Debug for AppPassword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AppPassword(****)")
    }
}
