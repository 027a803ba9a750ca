//! The server's view of an incoming request.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use imodal::protocol::{X_INERTIAUI_MODAL, header};
use imodal::{Headers, Method, Props};
use indexmap::IndexMap;
use serde_json::Value;
use url::Url;

/// Session storage shared between a request and any request derived from it.
pub type Session = Rc<RefCell<Props>>;

/// Resolves the authenticated user lazily.
pub type UserResolver = Rc<dyn Fn() -> Option<Value>>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

#[derive(Clone)]
pub struct IncomingRequest {
    pub method: Method,
    /// Absolute request url, query included.
    pub url: Url,
    pub headers: Headers,
    pub cookies: IndexMap<String, String>,
    pub files: IndexMap<String, UploadedFile>,
    pub locale: Option<String>,
    pub default_locale: Option<String>,
    pub session: Option<Session>,
    pub user_resolver: Option<UserResolver>,
    pub json: Option<Value>,
}

impl fmt::Debug for IncomingRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IncomingRequest")
            .field("method", &self.method)
            .field("url", &self.url.as_str())
            .field("headers", &self.headers)
            .field("cookies", &self.cookies.keys().collect::<Vec<_>>())
            .field("files", &self.files.keys().collect::<Vec<_>>())
            .field("locale", &self.locale)
            .field("default_locale", &self.default_locale)
            .field("has_session", &self.session.is_some())
            .field("has_user_resolver", &self.user_resolver.is_some())
            .field("json", &self.json)
            .finish()
    }
}

impl IncomingRequest {
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: Headers::new(),
            cookies: IndexMap::new(),
            files: IndexMap::new(),
            locale: None,
            default_locale: None,
            session: None,
            user_resolver: None,
            json: None,
        }
    }

    #[must_use]
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        imodal::protocol::set_header(&mut self.headers, name, value);
        self
    }

    #[must_use]
    pub fn with_cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.cookies.insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_json(mut self, json: Value) -> Self {
        self.json = Some(json);
        self
    }

    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        header(&self.headers, name)
    }

    /// True when the client asked for the modal-only payload.
    #[must_use]
    pub fn wants_modal(&self) -> bool {
        self.header(X_INERTIAUI_MODAL)
            .is_some_and(|value| !value.is_empty() && value != "0")
    }

    #[must_use]
    pub fn path(&self) -> &str {
        self.url.path()
    }

    /// The resolved user, if a resolver is attached.
    #[must_use]
    pub fn user(&self) -> Option<Value> {
        self.user_resolver.as_ref().and_then(|resolve| resolve())
    }
}
