use bsky_ref::RefError;
use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum DrawError {
    #[error("Invalid input: {0}")]
    Validation(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{context}, cause: {source}")]
    Upstream {
        context: String,
        #[source]
        source: bsky_client::Error,
    },
    #[error("Post has no eligible entries based on provided options")]
    EmptyPool,
}

impl DrawError {
    pub fn upstream(context: impl Into<String>) -> impl FnOnce(bsky_client::Error) -> DrawError {
        let context = context.into();
        move |source| DrawError::Upstream { context, source }
    }

    /// Upstream reports of an absent subject become `NotFound` with `message`;
    /// anything else stays an upstream failure.
    pub fn not_found_or_upstream(
        message: impl Into<String>,
    ) -> impl FnOnce(bsky_client::Error) -> DrawError {
        let message = message.into();
        move |source| {
            if source.is_not_found() {
                DrawError::NotFound(message)
            } else {
                DrawError::Upstream {
                    context: message,
                    source,
                }
            }
        }
    }
}

impl From<RefError> for DrawError {
    fn from(error: RefError) -> Self {
        DrawError::Validation(error.to_string())
    }
}
