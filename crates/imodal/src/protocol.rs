//! Wire-level pieces of the page protocol: header names, request and
//! response shapes.

use std::fmt;
use std::str::FromStr;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::props::Props;

pub const ACCEPT: &str = "Accept";
pub const ACCEPT_PAGE: &str = "text/html, application/xhtml+xml";
pub const X_REQUESTED_WITH: &str = "X-Requested-With";
pub const XML_HTTP_REQUEST: &str = "XMLHttpRequest";
pub const X_INERTIA: &str = "X-Inertia";
pub const X_INERTIA_VERSION: &str = "X-Inertia-Version";
pub const X_INERTIA_PARTIAL_COMPONENT: &str = "X-Inertia-Partial-Component";
pub const X_INERTIA_PARTIAL_DATA: &str = "X-Inertia-Partial-Data";
/// Asks the server for the modal-only payload instead of a full page.
pub const X_INERTIAUI_MODAL: &str = "X-InertiaUI-Modal";

/// Header names keep the caller's casing; lookups and replacement are
/// case-insensitive.
pub type Headers = IndexMap<String, String>;

/// Insert `name: value`, dropping any existing header whose name matches
/// case-insensitively.
pub fn set_header(headers: &mut Headers, name: &str, value: impl Into<String>) {
    headers.retain(|existing, _| !existing.eq_ignore_ascii_case(name));
    headers.insert(name.to_string(), value.into());
}

#[must_use]
pub fn header<'a>(headers: &'a Headers, name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(existing, _)| existing.eq_ignore_ascii_case(name))
        .map(|(_, value)| value.as_str())
}

/// Overlay the headers every modal request carries.
///
/// Protocol headers win over caller-supplied ones with the same name.
pub fn apply_modal_headers(headers: &mut Headers, version: Option<&str>) {
    set_header(headers, ACCEPT, ACCEPT_PAGE);
    set_header(headers, X_REQUESTED_WITH, XML_HTTP_REQUEST);
    set_header(headers, X_INERTIA, "true");
    match version {
        Some(version) => set_header(headers, X_INERTIA_VERSION, version),
        None => headers.retain(|existing, _| !existing.eq_ignore_ascii_case(X_INERTIA_VERSION)),
    }
    set_header(headers, X_INERTIAUI_MODAL, "true");
}

/// Headers for a partial reload of `component` limited to `keys`.
#[must_use]
pub fn partial_reload_headers(component: &str, version: Option<&str>, keys: &[String]) -> Headers {
    let mut headers = Headers::new();
    apply_modal_headers(&mut headers, version);
    set_header(&mut headers, X_INERTIA_PARTIAL_COMPONENT, component);
    set_header(&mut headers, X_INERTIA_PARTIAL_DATA, keys.join(","));
    headers
}

/// HTTP method of a navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Method {
    #[default]
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported HTTP method `{0}`")]
pub struct UnknownMethod(pub String);

impl FromStr for Method {
    type Err = UnknownMethod;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "get" => Ok(Self::Get),
            "post" => Ok(Self::Post),
            "put" => Ok(Self::Put),
            "patch" => Ok(Self::Patch),
            "delete" => Ok(Self::Delete),
            _ => Err(UnknownMethod(s.to_string())),
        }
    }
}

/// A fully prepared request handed to a [`crate::Transport`].
#[derive(Debug, Clone, PartialEq)]
pub struct PageRequest {
    pub method: Method,
    pub url: String,
    pub headers: Headers,
    /// JSON body; `None` for GET requests.
    pub body: Option<Value>,
}

impl PageRequest {
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        header(&self.headers, name)
    }
}

/// The page object a server returns for a modal request.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PageResponse {
    pub component: String,
    #[serde(default)]
    pub props: Props,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub version: Option<String>,
}

impl PageResponse {
    pub fn new(component: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            url: url.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_props(mut self, props: Props) -> Self {
        self.props = props;
        self
    }

    #[must_use]
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn modal_headers_override_caller_casing() {
        let mut headers = Headers::new();
        headers.insert("accept".to_string(), "application/json".to_string());
        headers.insert("X-Custom".to_string(), "1".to_string());

        apply_modal_headers(&mut headers, Some("v1"));

        assert_eq!(header(&headers, "Accept"), Some(ACCEPT_PAGE));
        assert!(headers.contains_key("Accept"));
        assert!(!headers.contains_key("accept"));
        assert_eq!(header(&headers, "x-custom"), Some("1"));
        assert_eq!(header(&headers, X_INERTIA_VERSION), Some("v1"));
        assert_eq!(header(&headers, X_INERTIAUI_MODAL), Some("true"));
        assert_eq!(header(&headers, X_REQUESTED_WITH), Some(XML_HTTP_REQUEST));
    }

    #[test]
    fn unknown_version_omits_header() {
        let mut headers = Headers::new();
        headers.insert("x-inertia-version".to_string(), "stale".to_string());
        apply_modal_headers(&mut headers, None);
        assert_eq!(header(&headers, X_INERTIA_VERSION), None);
    }

    #[test]
    fn partial_reload_headers_join_keys() {
        let headers = partial_reload_headers("Users/Edit", Some("abc"), &["user".into(), "roles".into()]);
        assert_eq!(header(&headers, X_INERTIA_PARTIAL_COMPONENT), Some("Users/Edit"));
        assert_eq!(header(&headers, X_INERTIA_PARTIAL_DATA), Some("user,roles"));
        assert_eq!(header(&headers, X_INERTIA), Some("true"));
    }

    #[test]
    fn method_parses_case_insensitively() {
        assert_eq!("get".parse::<Method>(), Ok(Method::Get));
        assert_eq!("PATCH".parse::<Method>(), Ok(Method::Patch));
        assert!("TRACE".parse::<Method>().is_err());
    }

    #[test]
    fn response_decodes_without_optional_fields() {
        let response: PageResponse =
            serde_json::from_value(json!({ "component": "Item", "props": { "id": 5 } })).unwrap();
        assert_eq!(response.component, "Item");
        assert_eq!(response.props.get("id"), Some(&json!(5)));
        assert!(response.url.is_empty());
        assert_eq!(response.version, None);
    }
}
