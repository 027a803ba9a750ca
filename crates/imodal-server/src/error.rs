use thiserror::Error;

use imodal::Method;

pub type Result<T> = std::result::Result<T, ServerError>;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("no route matches {method} {path}")]
    RouteNotFound { method: Method, path: String },

    #[error("modal base url `{url}` cannot be resolved: {source}")]
    InvalidBaseUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("failed to encode the modal payload: {0}")]
    Payload(#[from] serde_json::Error),

    #[error("route handler failed: {0}")]
    Handler(String),
}
