//! Serving one route both as a full page and as a modal.
//!
//! A route that renders a modal page calls [`ModalResponseExt::modal`] with
//! the url of the page the modal should sit on top of. Requests from the
//! modal client (`X-InertiaUI-Modal`) get the page as-is. Any other request
//! is re-dispatched as a GET to the base url, and the modal page travels
//! along as the `_inertiaui_modal` shared prop so the client can open it
//! over the base page.

use imodal::query::{ArrayFormat, DuplicateKeys, parse_query_with, stringify};
use imodal::{PageResponse, Props};
use serde::{Deserialize, Serialize};
use tracing::{debug, debug_span};
use url::Url;

use crate::error::{Result, ServerError};
use crate::request::IncomingRequest;
use crate::router::RouteDispatcher;

/// Shared prop carrying the modal page on a re-dispatched response.
pub const MODAL_SHARED_PROP: &str = "_inertiaui_modal";

/// The modal page, as shared with the base page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModalPayload {
    pub base_url: String,
    pub component: String,
    pub props: Props,
    pub version: Option<String>,
}

impl ModalPayload {
    pub fn new(base_url: impl Into<String>, page: PageResponse) -> Self {
        Self {
            base_url: base_url.into(),
            component: page.component,
            props: page.props,
            version: page.version,
        }
    }

    /// The GET request for the base page, derived from `original`.
    ///
    /// The original query wins over the base url's own query, key by key.
    /// A repeated bare key keeps its last value.
    /// Headers, cookies, files, locales, session, user resolver, and JSON
    /// body carry over unchanged.
    pub fn base_request(&self, original: &IncomingRequest) -> Result<IncomingRequest> {
        let mut url = original
            .url
            .join(&self.base_url)
            .map_err(|source| ServerError::InvalidBaseUrl {
                url: self.base_url.clone(),
                source,
            })?;

        let mut query = parse_query_with(url.query().unwrap_or_default(), DuplicateKeys::Last);
        for (key, value) in parse_query_with(original.url.query().unwrap_or_default(), DuplicateKeys::Last) {
            query.insert(key, value);
        }
        let encoded = stringify(&query, ArrayFormat::Brackets);
        url.set_query((!encoded.is_empty()).then_some(encoded.as_str()));
        url.set_fragment(None);

        Ok(IncomingRequest {
            method: imodal::Method::Get,
            url,
            headers: original.headers.clone(),
            cookies: original.cookies.clone(),
            files: original.files.clone(),
            locale: original.locale.clone(),
            default_locale: original.default_locale.clone(),
            session: original.session.clone(),
            user_resolver: original.user_resolver.clone(),
            json: original.json.clone(),
        })
    }
}

/// Outcome of [`ModalResponseExt::modal`].
#[derive(Debug, Clone, PartialEq)]
pub enum ModalResponse {
    /// The client asked for the modal payload; send the page unchanged.
    Direct(PageResponse),
    /// Render the base page with the modal shared into it.
    Redispatch(ModalPayload),
}

impl ModalResponse {
    /// Produce the page to send for `request`.
    pub fn render<D: RouteDispatcher>(self, request: &IncomingRequest, dispatcher: &D) -> Result<PageResponse> {
        match self {
            Self::Direct(page) => Ok(page),
            Self::Redispatch(payload) => {
                let span = debug_span!("imodal.redispatch", base_url = %payload.base_url);
                let _entered = span.enter();

                let base_request = payload.base_request(request)?;
                let mut page = dispatcher.dispatch(&base_request)?;
                let shared = serde_json::to_value(&payload)?;
                // Props the base page sets itself win over shared ones.
                page.props.entry(MODAL_SHARED_PROP).or_insert(shared);
                debug!(component = %payload.component, base = %page.component, "rendered modal over base page");
                Ok(page)
            }
        }
    }
}

/// Adds `.modal(base_url)` to page responses.
pub trait ModalResponseExt {
    fn modal(self, request: &IncomingRequest, base_url: impl Into<String>) -> ModalResponse;
}

impl ModalResponseExt for PageResponse {
    fn modal(self, request: &IncomingRequest, base_url: impl Into<String>) -> ModalResponse {
        if request.wants_modal() {
            ModalResponse::Direct(self)
        } else {
            ModalResponse::Redispatch(ModalPayload::new(base_url, self))
        }
    }
}

/// Parse `raw` as an absolute url, for hosts building requests by hand.
pub fn absolute_url(raw: &str) -> Result<Url> {
    Url::parse(raw).map_err(|source| ServerError::InvalidBaseUrl {
        url: raw.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use imodal::Method;
    use serde_json::json;

    fn request(url: &str) -> IncomingRequest {
        IncomingRequest::new(Method::Get, absolute_url(url).unwrap())
    }

    fn edit_page() -> PageResponse {
        let mut props = Props::new();
        props.insert("user".into(), json!({ "id": 1 }));
        PageResponse::new("Users/Edit", "/users/1/edit").with_props(props).with_version("v3")
    }

    #[test]
    fn modal_request_is_served_directly() {
        let req = request("https://app.test/users/1/edit").with_header("X-InertiaUI-Modal", "true");
        assert_eq!(edit_page().modal(&req, "/users"), ModalResponse::Direct(edit_page()));
    }

    #[test]
    fn payload_serializes_camel_case() {
        let payload = ModalPayload::new("/users", edit_page());
        assert_eq!(
            serde_json::to_value(&payload).unwrap(),
            json!({
                "baseUrl": "/users",
                "component": "Users/Edit",
                "props": { "user": { "id": 1 } },
                "version": "v3",
            })
        );
    }

    #[test]
    fn base_request_merges_queries_and_forces_get() {
        let mut original = request("https://app.test/users/1/edit?tab=roles&page=3#x").with_cookie("sid", "abc");
        original.method = Method::Post;
        original.locale = Some("nl".into());

        let base = ModalPayload::new("/users?page=1&sort=name", edit_page())
            .base_request(&original)
            .unwrap();

        assert_eq!(base.method, Method::Get);
        assert_eq!(base.url.as_str(), "https://app.test/users?page=3&sort=name&tab=roles");
        assert_eq!(base.cookies.get("sid").map(String::as_str), Some("abc"));
        assert_eq!(base.locale.as_deref(), Some("nl"));
    }

    #[test]
    fn base_request_keeps_last_repeated_key() {
        let original = request("https://app.test/users/1/edit?page=1&page=2&ids[]=4&ids[]=5");

        let base = ModalPayload::new("/users?page=9", edit_page())
            .base_request(&original)
            .unwrap();

        assert_eq!(base.url.as_str(), "https://app.test/users?page=2&ids[]=4&ids[]=5");
    }

    #[test]
    fn absolute_base_url_keeps_its_host() {
        let base = ModalPayload::new("https://other.test/home", edit_page())
            .base_request(&request("https://app.test/users/1/edit"))
            .unwrap();
        assert_eq!(base.url.as_str(), "https://other.test/home");
    }
}
