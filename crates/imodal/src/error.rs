use thiserror::Error;

use crate::modal::ModalId;
use crate::transport::TransportError;

pub type Result<T> = std::result::Result<T, ModalError>;

/// Errors surfaced by stack, registry, and navigation operations.
///
/// Redundant lifecycle calls (a second `close()`, `after_leave()` while still
/// open) are not errors; they are silent no-ops on [`crate::Modal`].
#[derive(Debug, Error)]
pub enum ModalError {
    #[error(
        "the modal root is not mounted; call ModalStack::mount_root() from the host layout before opening modals"
    )]
    RootMissing,

    #[error("the local modal \"{name}\" has not been registered")]
    LocalModalNotRegistered { name: String },

    #[error("unknown modal component `{name}`")]
    UnknownComponent { name: String },

    #[error("invalid navigation target `{target}`: {source}")]
    InvalidTarget {
        target: String,
        #[source]
        source: url::ParseError,
    },

    #[error("modal {id} was not loaded from a url and cannot be reloaded")]
    NotReloadable { id: ModalId },

    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl ModalError {
    /// Integration mistakes that retrying cannot fix.
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::RootMissing | Self::LocalModalNotRegistered { .. } | Self::UnknownComponent { .. }
        )
    }
}
