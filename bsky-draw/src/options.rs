use serde::{Deserialize, Serialize};

use crate::DrawError;

/// Entry requirements for a drawing. Every active flag narrows the pool.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DrawOptions {
    pub winner_count: usize,
    pub require_repost: bool,
    pub require_like: bool,
    pub require_follow: bool,
    pub require_reply: bool,
    pub require_reply_image: bool,
    #[serde(skip_serializing)]
    pub password: Option<String>,
}

impl Default for DrawOptions {
    fn default() -> Self {
        Self {
            winner_count: 1,
            require_repost: false,
            require_like: false,
            require_follow: false,
            require_reply: false,
            require_reply_image: false,
            password: None,
        }
    }
}

impl DrawOptions {
    pub fn validate(&self) -> Result<(), DrawError> {
        if self.winner_count < 1 {
            return Err(DrawError::Validation(
                "winner count must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Whether entrants are narrowed to reply authors, which also surfaces their replies.
    pub fn requires_reply(&self) -> bool {
        self.require_reply || self.require_reply_image
    }
}
