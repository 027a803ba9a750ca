#![forbid(unsafe_code)]

//! Stacked modal navigation for server-driven single-page clients.
//!
//! A [`NavigationResolver`] turns a navigation target into a [`Modal`] on a
//! [`ModalStack`]: `#name` targets open a registered local modal, everything
//! else is fetched from the server as a page object. Each modal keeps the
//! response it was opened with so it can be partially reloaded later.
//!
//! ```ignore
//! let stack = ModalStack::new();
//! let _root = stack.mount_root();
//! let resolver = NavigationResolver::new(stack.clone(), LocalModalRegistry::new(), transport, config);
//!
//! let modal = resolver.visit(Visit::get("/users/1/edit")).await?;
//! render(&stack);
//! stack.after_render();
//!
//! modal.reload(resolver.transport(), &ReloadOptions::new().only(["roles"])).await?;
//! ```
//!
//! Everything is single-threaded: handles are `Rc`-based and futures are not
//! `Send`.

pub mod component;
pub mod config;
pub mod error;
pub mod event;
pub mod modal;
pub mod props;
pub mod protocol;
pub mod query;
pub mod registry;
pub mod resolver;
pub mod stack;
pub mod transport;

pub use component::{AnyComponent, ComponentRef, ComponentRegistry, ComponentResolver};
pub use config::{ClientConfig, ConfigError};
pub use error::{ModalError, Result};
pub use event::{EventChannel, Listener, ListenerTeardown, attribute_to_event_name};
pub use modal::{Modal, ModalCallback, ModalId, ReloadOutcome};
pub use props::{ModalPosition, ModalProps, Props, ReloadOptions};
pub use protocol::{Headers, Method, PageRequest, PageResponse};
pub use query::{ArrayFormat, merge_data_into_query_string};
pub use registry::{LocalModal, LocalModalCallback, LocalModalRegistry};
pub use resolver::{NavigationResolver, Visit};
pub use stack::{ModalStack, RootMount};
#[cfg(feature = "http")]
pub use transport::HttpTransport;
pub use transport::{Transport, TransportError};

pub use imodal_runtime::{Subscription, TickQueue};
