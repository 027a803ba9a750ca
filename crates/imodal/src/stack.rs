//! The ordered stack of open modals.
//!
//! `ModalStack` owns the modals in push order: index 0 is the bottom, the
//! last entry is on top. It is a handle; clones share the same stack.
//!
//! # Invariants
//!
//! - Order is push order. Removal from the middle keeps the relative order
//!   of the rest.
//! - Ids are unique within the stack.
//! - A pushed modal is not open until the host has rendered once and called
//!   [`ModalStack::after_render`].
//! - Subscribers see one notification per membership change.
//!
//! # Failure Modes
//!
//! - Lookups for ids that are not in the stack return `None`.
//! - Opening a modal through navigation while no root is mounted is an
//!   error ([`ModalError::RootMissing`]); raw [`ModalStack::push`] is not
//!   checked.
//!
//! # Example
//!
//! ```ignore
//! let stack = ModalStack::new();
//! let _root = stack.mount_root();
//!
//! let modal = stack.push(None, response, ModalProps::default(), None, None);
//! render(&stack);
//! stack.after_render(); // modal.is_open() == true
//!
//! modal.close();
//! modal.after_leave(); // removed from the stack
//! ```

use std::cell::Cell;
use std::rc::{Rc, Weak};

use imodal_runtime::{Observable, Subscription, TickQueue};
use tracing::{debug, warn};

use crate::component::ComponentRef;
use crate::error::{ModalError, Result};
use crate::modal::{Modal, ModalCallback, ModalId, ModalSeed};
use crate::props::ModalProps;
use crate::protocol::PageResponse;

pub(crate) struct StackShared {
    modals: Observable<Vec<Modal>>,
    root_mounts: Cell<usize>,
    ticks: TickQueue,
}

impl StackShared {
    pub(crate) fn position(&self, id: ModalId) -> Option<usize> {
        self.modals.with(|modals| modals.iter().position(|m| m.id() == id))
    }

    pub(crate) fn at(&self, index: usize) -> Option<Modal> {
        self.modals.with(|modals| modals.get(index).cloned())
    }

    pub(crate) fn len(&self) -> usize {
        self.modals.with(Vec::len)
    }

    pub(crate) fn last_id(&self) -> Option<ModalId> {
        self.modals.with(|modals| modals.last().map(Modal::id))
    }

    /// Drop `id` from the stack. Returns `false` if it was not a member.
    pub(crate) fn remove(&self, id: ModalId) -> bool {
        self.modals.update(|modals| modals.retain(|m| m.id() != id))
    }
}

/// Shared, observable stack of modals.
#[derive(Clone)]
pub struct ModalStack {
    shared: Rc<StackShared>,
}

impl Default for ModalStack {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ModalStack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModalStack")
            .field("modals", &self.snapshot())
            .field("root_mounts", &self.shared.root_mounts.get())
            .field("pending_ticks", &self.shared.ticks.pending())
            .finish()
    }
}

impl ModalStack {
    #[must_use]
    pub fn new() -> Self {
        Self::with_tick_queue(TickQueue::new())
    }

    /// Use a tick queue shared with the rest of the host.
    #[must_use]
    pub fn with_tick_queue(ticks: TickQueue) -> Self {
        Self {
            shared: Rc::new(StackShared {
                modals: Observable::new(Vec::new()),
                root_mounts: Cell::new(0),
                ticks,
            }),
        }
    }

    /// Append a new closed modal and schedule it to open after the next
    /// render.
    pub fn push(
        &self,
        component: Option<ComponentRef>,
        response: PageResponse,
        modal_props: ModalProps,
        on_close: Option<ModalCallback>,
        on_after_leave: Option<ModalCallback>,
    ) -> Modal {
        let modal = Modal::new(
            ModalSeed {
                component,
                response,
                modal_props,
                on_close,
                on_after_leave,
            },
            Rc::downgrade(&self.shared),
        );

        self.shared.modals.update(|modals| modals.push(modal.clone()));
        debug!(
            id = %modal.id(),
            component = %modal.response().component,
            depth = self.len(),
            "pushed modal"
        );

        let pending = modal.clone();
        self.shared.ticks.defer(move || {
            pending.show();
        });
        modal
    }

    /// Drop every modal without running close callbacks.
    pub fn reset(&self) {
        let dropped = self.len();
        if self.shared.modals.set(Vec::new()) {
            debug!(dropped, "modal stack reset");
        }
    }

    // --- Queries ---

    /// The modals in bottom-to-top order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Modal> {
        self.shared.modals.get()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.shared.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn get(&self, id: ModalId) -> Option<Modal> {
        self.shared
            .modals
            .with(|modals| modals.iter().find(|m| m.id() == id).cloned())
    }

    #[must_use]
    pub fn contains(&self, id: ModalId) -> bool {
        self.shared.position(id).is_some()
    }

    #[must_use]
    pub fn top(&self) -> Option<Modal> {
        self.shared.modals.with(|modals| modals.last().cloned())
    }

    /// Observe membership changes. The callback receives the whole stack.
    pub fn subscribe(&self, callback: impl Fn(&[Modal]) + 'static) -> Subscription {
        self.shared.modals.subscribe(move |modals| callback(modals))
    }

    /// Bumped once per membership change.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.shared.modals.version()
    }

    // --- Render tick ---

    /// Run the work deferred until after a render pass. Returns how many
    /// tasks ran.
    pub fn after_render(&self) -> usize {
        self.shared.ticks.flush()
    }

    #[must_use]
    pub fn tick_queue(&self) -> TickQueue {
        self.shared.ticks.clone()
    }

    // --- Root presence ---

    /// Record that the host has mounted the modal root. The root counts as
    /// present until the returned guard is dropped.
    pub fn mount_root(&self) -> RootMount {
        self.shared.root_mounts.set(self.shared.root_mounts.get() + 1);
        RootMount {
            shared: Rc::downgrade(&self.shared),
        }
    }

    #[must_use]
    pub fn is_root_present(&self) -> bool {
        self.shared.root_mounts.get() > 0
    }

    pub fn verify_root(&self) -> Result<()> {
        if self.is_root_present() {
            Ok(())
        } else {
            warn!("modal requested before the modal root was mounted");
            Err(ModalError::RootMissing)
        }
    }
}

/// Keeps the modal root marked as mounted.
#[must_use = "the root is unmounted when the guard is dropped"]
pub struct RootMount {
    shared: Weak<StackShared>,
}

impl std::fmt::Debug for RootMount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RootMount").finish_non_exhaustive()
    }
}

impl Drop for RootMount {
    fn drop(&mut self) {
        if let Some(shared) = self.shared.upgrade() {
            shared.root_mounts.set(shared.root_mounts.get().saturating_sub(1));
        }
    }
}
