//! Prop maps, modal presentation props, and reload filters.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Page props keyed by name, in server order.
pub type Props = Map<String, Value>;

/// Attribute names the client treats as modal presentation props rather
/// than page props.
pub const MODAL_PROP_NAMES: [&str; 7] = [
    "closeButton",
    "closeExplicitly",
    "maxWidth",
    "paddingClasses",
    "panelClasses",
    "position",
    "slideover",
];

/// Where the modal panel is anchored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModalPosition {
    #[default]
    Center,
    Top,
    Bottom,
    Left,
    Right,
}

/// Presentation options for one modal. Unset fields defer to the renderer's
/// defaults.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ModalProps {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub close_button: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub close_explicitly: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_width: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub padding_classes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub panel_classes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<ModalPosition>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slideover: Option<bool>,
}

impl ModalProps {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn slideover(mut self, slideover: bool) -> Self {
        self.slideover = Some(slideover);
        self
    }

    #[must_use]
    pub fn max_width(mut self, max_width: impl Into<String>) -> Self {
        self.max_width = Some(max_width.into());
        self
    }

    #[must_use]
    pub fn position(mut self, position: ModalPosition) -> Self {
        self.position = Some(position);
        self
    }

    #[must_use]
    pub fn close_explicitly(mut self, close_explicitly: bool) -> Self {
        self.close_explicitly = Some(close_explicitly);
        self
    }

    /// Separate the modal presentation keys from an attribute map.
    ///
    /// Returns the typed presentation props and the remaining attributes.
    pub fn split_attrs(attrs: Props) -> Result<(Self, Props), serde_json::Error> {
        let (modal, rest): (Props, Props) = attrs
            .into_iter()
            .partition(|(key, _)| MODAL_PROP_NAMES.contains(&key.as_str()));
        let modal = serde_json::from_value(Value::Object(modal))?;
        Ok((modal, rest))
    }
}

/// Prop-key filters for a partial reload.
///
/// `only` keeps the listed keys; `except` then removes the listed keys.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReloadOptions {
    pub only: Option<Vec<String>>,
    pub except: Option<Vec<String>>,
}

impl ReloadOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn only<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.only = Some(keys.into_iter().map(Into::into).collect());
        self
    }

    #[must_use]
    pub fn except<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.except = Some(keys.into_iter().map(Into::into).collect());
        self
    }

    /// Apply the filters to `keys`, preserving their order.
    pub fn filter_keys<'a>(&self, keys: impl IntoIterator<Item = &'a str>) -> Vec<String> {
        keys.into_iter()
            .filter(|key| {
                self.only
                    .as_ref()
                    .is_none_or(|only| only.iter().any(|k| k == key))
            })
            .filter(|key| {
                self.except
                    .as_ref()
                    .is_none_or(|except| !except.iter().any(|k| k == key))
            })
            .map(str::to_string)
            .collect()
    }
}
