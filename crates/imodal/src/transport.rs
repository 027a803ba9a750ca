//! The network seam: sending a [`PageRequest`] and decoding the page object.
//!
//! The core never retries or rewrites transport failures; whatever a
//! [`Transport`] returns is what the caller of `visit`/`reload` sees.

use std::rc::Rc;

use thiserror::Error;

use crate::protocol::{PageRequest, PageResponse};

#[derive(Debug, Error)]
pub enum TransportError {
    #[cfg(feature = "http")]
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server answered {status} for {url}")]
    Status { status: u16, url: String },

    #[error("invalid request url `{url}`: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("malformed page response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("network error: {0}")]
    Network(String),
}

/// Sends page requests.
///
/// Futures returned by implementations need not be `Send`: the modal stack
/// is single-threaded and awaits them on the thread that owns it.
#[allow(async_fn_in_trait)]
pub trait Transport {
    async fn send(&self, request: PageRequest) -> Result<PageResponse, TransportError>;
}

impl<T: Transport + ?Sized> Transport for &T {
    async fn send(&self, request: PageRequest) -> Result<PageResponse, TransportError> {
        (**self).send(request).await
    }
}

impl<T: Transport + ?Sized> Transport for Rc<T> {
    async fn send(&self, request: PageRequest) -> Result<PageResponse, TransportError> {
        (**self).send(request).await
    }
}

#[cfg(feature = "http")]
pub use http::HttpTransport;

#[cfg(feature = "http")]
mod http {
    use std::time::Duration;

    use tracing::debug;
    use url::Url;

    use super::{Transport, TransportError};
    use crate::config::ClientConfig;
    use crate::protocol::{Method, PageRequest, PageResponse};

    /// `reqwest`-backed transport.
    #[derive(Debug, Clone)]
    pub struct HttpTransport {
        client: reqwest::Client,
        base_url: Option<Url>,
    }

    impl HttpTransport {
        pub fn new(config: &ClientConfig) -> Result<Self, TransportError> {
            let client = reqwest::Client::builder()
                .timeout(Duration::from_millis(config.timeout_ms))
                .build()?;
            Self::with_client(client, config.base_url.as_deref())
        }

        /// Use a preconfigured client. `base_url` anchors relative targets.
        pub fn with_client(client: reqwest::Client, base_url: Option<&str>) -> Result<Self, TransportError> {
            let base_url = base_url
                .map(|raw| {
                    Url::parse(raw).map_err(|source| TransportError::InvalidUrl {
                        url: raw.to_string(),
                        source,
                    })
                })
                .transpose()?;
            Ok(Self { client, base_url })
        }

        fn resolve(&self, target: &str) -> Result<Url, TransportError> {
            let parsed = match (&self.base_url, Url::parse(target)) {
                (_, Ok(absolute)) => Ok(absolute),
                (Some(base), Err(url::ParseError::RelativeUrlWithoutBase)) => base.join(target),
                (_, Err(err)) => Err(err),
            };
            parsed.map_err(|source| TransportError::InvalidUrl {
                url: target.to_string(),
                source,
            })
        }
    }

    fn to_reqwest(method: Method) -> reqwest::Method {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Patch => reqwest::Method::PATCH,
            Method::Delete => reqwest::Method::DELETE,
        }
    }

    impl Transport for HttpTransport {
        async fn send(&self, request: PageRequest) -> Result<PageResponse, TransportError> {
            let url = self.resolve(&request.url)?;
            debug!(method = %request.method, %url, "sending page request");

            let mut builder = self.client.request(to_reqwest(request.method), url);
            for (name, value) in &request.headers {
                builder = builder.header(name.as_str(), value.as_str());
            }
            if let Some(body) = &request.body {
                builder = builder.json(body);
            }

            let response = builder.send().await?.error_for_status()?;
            let bytes = response.bytes().await?;
            Ok(serde_json::from_slice(&bytes)?)
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        fn transport(base: Option<&str>) -> HttpTransport {
            HttpTransport::with_client(reqwest::Client::new(), base).unwrap()
        }

        #[test]
        fn relative_targets_join_the_base_url() {
            let t = transport(Some("https://app.test/admin/"));
            assert_eq!(
                t.resolve("/users/5?tab=roles").unwrap().as_str(),
                "https://app.test/users/5?tab=roles"
            );
        }

        #[test]
        fn absolute_targets_ignore_the_base_url() {
            let t = transport(Some("https://app.test"));
            assert_eq!(
                t.resolve("https://other.test/x").unwrap().as_str(),
                "https://other.test/x"
            );
        }

        #[test]
        fn relative_target_without_base_is_rejected() {
            let t = transport(None);
            assert!(matches!(
                t.resolve("/users"),
                Err(TransportError::InvalidUrl { .. })
            ));
        }

        #[test]
        fn invalid_base_url_is_rejected() {
            assert!(HttpTransport::with_client(reqwest::Client::new(), Some("not a url")).is_err());
        }
    }
}
