//! Merging navigation payloads into query strings.
//!
//! GET navigations carry their payload in the query string. The existing
//! query is decoded into a nested structure (`a[b]=1`, `a[]=1`, `a[0]=1`),
//! the payload is deep-merged over it, and the result is encoded again with
//! the requested [`ArrayFormat`]. Keys are written literally, values are
//! percent-encoded.
//!
//! The returned url keeps the shape of the input: a host only when the input
//! had one, relative paths stay relative, fragments are preserved.

use std::fmt;
use std::str::FromStr;

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use url::Url;
use url::form_urlencoded;

use crate::error::{ModalError, Result};
use crate::props::Props;
use crate::protocol::Method;

/// Indices above this are kept as object keys rather than array slots.
const ARRAY_LIMIT: usize = 20;

/// Bracket segments decoded per key; deeper brackets stay in one literal
/// trailing segment.
const MAX_DEPTH: usize = 5;

/// Characters left bare in encoded values: RFC 3986 unreserved.
const VALUE_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'.').remove(b'_').remove(b'~');

const PARSE_BASE: &str = "http://localhost";

/// How arrays are spelled in an encoded query string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArrayFormat {
    /// `tags[]=a&tags[]=b`
    #[default]
    Brackets,
    /// `tags[0]=a&tags[1]=b`
    Indices,
}

impl fmt::Display for ArrayFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Brackets => "brackets",
            Self::Indices => "indices",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown array format `{0}` (expected `brackets` or `indices`)")]
pub struct UnknownArrayFormat(pub String);

impl FromStr for ArrayFormat {
    type Err = UnknownArrayFormat;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "brackets" => Ok(Self::Brackets),
            "indices" => Ok(Self::Indices),
            _ => Err(UnknownArrayFormat(s.to_string())),
        }
    }
}

/// Fold `data` into `href` for GET, or hand it back as the body otherwise.
///
/// Returns the url to request and the payload left for the body (empty for
/// GET requests that consumed it).
pub fn merge_data_into_query_string(
    method: Method,
    href: &str,
    data: &Props,
    format: ArrayFormat,
) -> Result<(String, Props)> {
    let merges = method == Method::Get && !data.is_empty();

    let has_host = href.starts_with("http://") || href.starts_with("https://");
    let has_absolute_path = has_host || href.starts_with('/');
    let has_relative_path = !has_absolute_path && !href.starts_with('#') && !href.starts_with('?');
    let has_search = href.contains('?') || merges;
    let has_hash = href.contains('#');

    let invalid = |source| ModalError::InvalidTarget {
        target: href.to_string(),
        source,
    };
    let base = Url::parse(PARSE_BASE).map_err(invalid)?;
    let mut url = base.join(href).map_err(invalid)?;

    let body = if merges {
        let mut merged = Value::Object(parse_query(url.query().unwrap_or_default()));
        deep_merge(&mut merged, &Value::Object(data.clone()));
        let encoded = match &merged {
            Value::Object(map) => stringify(map, format),
            _ => String::new(),
        };
        url.set_query((!encoded.is_empty()).then_some(encoded.as_str()));
        Props::new()
    } else {
        data.clone()
    };

    let mut out = String::with_capacity(href.len() + 16);
    if has_host {
        out.push_str(url.scheme());
        out.push_str("://");
        out.push_str(url.host_str().unwrap_or_default());
        if let Some(port) = url.port() {
            out.push(':');
            out.push_str(&port.to_string());
        }
    }
    if has_absolute_path {
        out.push_str(url.path());
    }
    if has_relative_path {
        out.push_str(url.path().get(1..).unwrap_or_default());
    }
    if has_search && let Some(query) = url.query().filter(|q| !q.is_empty()) {
        out.push('?');
        out.push_str(query);
    }
    if has_hash && let Some(fragment) = url.fragment().filter(|f| !f.is_empty()) {
        out.push('#');
        out.push_str(fragment);
    }

    Ok((out, body))
}

/// What a repeated key means when decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DuplicateKeys {
    /// `e=1&e=2` decodes to `["1", "2"]`.
    #[default]
    Combine,
    /// `e=1&e=2` decodes to `"2"`.
    Last,
}

/// Decode a query string into nested props, combining repeated keys.
#[must_use]
pub fn parse_query(query: &str) -> Props {
    parse_query_with(query, DuplicateKeys::Combine)
}

/// Decode a query string into nested props.
///
/// Keys nest at most five brackets deep. Sparse array indices are
/// compacted, so `d[1]=y` decodes to `["y"]`.
#[must_use]
pub fn parse_query_with(query: &str, duplicates: DuplicateKeys) -> Props {
    let mut root = Value::Object(Map::new());
    for (key, value) in form_urlencoded::parse(query.trim_start_matches('?').as_bytes()) {
        if key.is_empty() {
            continue;
        }
        let segments = key_segments(&key);
        assign(&mut root, &segments, Value::String(value.into_owned()), duplicates);
    }
    compact(&mut root);
    match root {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

/// Encode nested props as a query string.
#[must_use]
pub fn stringify(data: &Props, format: ArrayFormat) -> String {
    let mut pairs = Vec::new();
    for (key, value) in data {
        encode_pairs(key, value, format, &mut pairs);
    }
    pairs.join("&")
}

/// `a[b][]` becomes `["a", "b", ""]`. Keys without a bracketed tail are a
/// single segment. Past [`MAX_DEPTH`] brackets the remainder is kept as one
/// literal segment.
fn key_segments(key: &str) -> Vec<String> {
    let Some(open) = key.find('[').filter(|&i| i > 0) else {
        return vec![key.to_string()];
    };
    let mut segments = vec![key[..open].to_string()];
    let mut rest = &key[open..];
    while segments.len() <= MAX_DEPTH
        && let Some(stripped) = rest.strip_prefix('[')
    {
        let Some(close) = stripped.find(']') else {
            break;
        };
        segments.push(stripped[..close].to_string());
        rest = &stripped[close + 1..];
    }
    if !rest.is_empty() {
        // Unbalanced tail is kept as a literal segment.
        segments.push(rest.to_string());
    }
    segments
}

fn assign(slot: &mut Value, segments: &[String], value: Value, duplicates: DuplicateKeys) {
    let Some((head, rest)) = segments.split_first() else {
        match slot {
            Value::Null => *slot = value,
            existing if duplicates == DuplicateKeys::Last => *existing = value,
            Value::Array(items) => items.push(value),
            existing => {
                let previous = existing.take();
                *existing = Value::Array(vec![previous, value]);
            }
        }
        return;
    };

    if head.is_empty() {
        if !slot.is_array() {
            *slot = Value::Array(Vec::new());
        }
        if let Value::Array(items) = slot {
            let mut child = Value::Null;
            assign(&mut child, rest, value, duplicates);
            items.push(child);
        }
        return;
    }

    if let Ok(index) = head.parse::<usize>()
        && index <= ARRAY_LIMIT
        && (slot.is_null() || slot.is_array())
    {
        if slot.is_null() {
            *slot = Value::Array(Vec::new());
        }
        if let Value::Array(items) = slot {
            if items.len() <= index {
                items.resize(index + 1, Value::Null);
            }
            assign(&mut items[index], rest, value, duplicates);
        }
        return;
    }

    if let Value::Array(items) = slot {
        let converted: Map<String, Value> = items
            .drain(..)
            .enumerate()
            .filter(|(_, v)| !v.is_null())
            .map(|(i, v)| (i.to_string(), v))
            .collect();
        *slot = Value::Object(converted);
    }
    if !slot.is_object() {
        *slot = Value::Object(Map::new());
    }
    if let Value::Object(map) = slot {
        let child = map.entry(head.clone()).or_insert(Value::Null);
        assign(child, rest, value, duplicates);
    }
}

/// Drop the holes left by sparse array indices.
fn compact(value: &mut Value) {
    match value {
        Value::Array(items) => {
            items.retain(|item| !item.is_null());
            items.iter_mut().for_each(compact);
        }
        Value::Object(map) => map.values_mut().for_each(compact),
        _ => {}
    }
}

/// Objects merge key by key; anything else in `source` replaces `target`.
fn deep_merge(target: &mut Value, source: &Value) {
    match (target, source) {
        (Value::Object(target), Value::Object(source)) => {
            for (key, value) in source {
                match target.get_mut(key) {
                    Some(existing) => deep_merge(existing, value),
                    None => {
                        target.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (target, source) => *target = source.clone(),
    }
}

fn encode_pairs(prefix: &str, value: &Value, format: ArrayFormat, out: &mut Vec<String>) {
    match value {
        Value::Null => out.push(format!("{prefix}=")),
        Value::Bool(b) => out.push(format!("{prefix}={b}")),
        Value::Number(n) => out.push(format!("{prefix}={}", encode_value(&n.to_string()))),
        Value::String(s) => out.push(format!("{prefix}={}", encode_value(s))),
        Value::Array(items) => {
            for (index, item) in items.iter().enumerate() {
                let key = match format {
                    ArrayFormat::Brackets => format!("{prefix}[]"),
                    ArrayFormat::Indices => format!("{prefix}[{index}]"),
                };
                encode_pairs(&key, item, format, out);
            }
        }
        Value::Object(map) => {
            for (key, item) in map {
                encode_pairs(&format!("{prefix}[{key}]"), item, format, out);
            }
        }
    }
}

fn encode_value(raw: &str) -> String {
    utf8_percent_encode(raw, VALUE_ENCODE_SET).to_string()
}
