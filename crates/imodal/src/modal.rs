//! A single frame in the modal stack.
//!
//! A [`Modal`] is a cheap, clonable handle. Every handle to the same modal
//! shares its open flag, props, and [`EventChannel`].
//!
//! # Lifecycle
//!
//! ```text
//!   push ──► closed (member) ──tick──► open ──close()──► closed ──after_leave()──► removed
//!                                        ▲                  │
//!                                        └──── show() ──────┘
//! ```
//!
//! # Invariants
//!
//! - The id never changes. Stack membership is looked up by id on every
//!   query; positions are never cached.
//! - `show`, `close`, and `after_leave` are no-ops on non-members.
//! - `close` unregisters every listener before `on_close` runs.
//! - `after_leave` while open is a no-op, so an exit-transition handler that
//!   fires early cannot detach a visible modal.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use imodal_runtime::{Observable, Subscription};
use serde_json::Value;
use tracing::{Instrument, debug, debug_span};

use crate::component::ComponentRef;
use crate::error::{ModalError, Result};
use crate::event::{EventChannel, Listener, ListenerTeardown};
use crate::props::{ModalProps, Props, ReloadOptions};
use crate::protocol::{Method, PageRequest, PageResponse, partial_reload_headers};
use crate::stack::StackShared;
use crate::transport::Transport;

static MODAL_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Process-unique modal identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModalId(u64);

impl ModalId {
    fn next() -> Self {
        Self(MODAL_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    #[inline]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ModalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "imodal_{}", self.0)
    }
}

/// Lifecycle callback supplied by whoever opened the modal.
pub type ModalCallback = Rc<dyn Fn()>;

/// Result of applying a reload response.
#[derive(Debug, Clone, PartialEq)]
pub enum ReloadOutcome {
    /// The response was merged; carries the props after the merge.
    Applied(Props),
    /// The modal left the stack before the response arrived.
    Discarded,
}

pub(crate) struct ModalSeed {
    pub component: Option<ComponentRef>,
    pub response: PageResponse,
    pub modal_props: ModalProps,
    pub on_close: Option<ModalCallback>,
    pub on_after_leave: Option<ModalCallback>,
}

struct ModalInner {
    id: ModalId,
    open: Observable<bool>,
    component: RefCell<Option<ComponentRef>>,
    props: Observable<Props>,
    response: PageResponse,
    modal_props: ModalProps,
    name: RefCell<Option<String>>,
    events: EventChannel,
    on_close: Option<ModalCallback>,
    on_after_leave: Option<ModalCallback>,
    stack: Weak<StackShared>,
}

/// Handle to one stacked modal.
#[derive(Clone)]
pub struct Modal {
    inner: Rc<ModalInner>,
}

impl PartialEq for Modal {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl Eq for Modal {}

impl fmt::Debug for Modal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Modal")
            .field("id", &self.inner.id)
            .field("open", &self.is_open())
            .field("component", &*self.inner.component.borrow())
            .field("name", &*self.inner.name.borrow())
            .field("url", &self.inner.response.url)
            .finish_non_exhaustive()
    }
}

impl Modal {
    pub(crate) fn new(seed: ModalSeed, stack: Weak<StackShared>) -> Self {
        let props = Observable::new(seed.response.props.clone());
        Self {
            inner: Rc::new(ModalInner {
                id: ModalId::next(),
                open: Observable::new(false),
                component: RefCell::new(seed.component),
                props,
                response: seed.response,
                modal_props: seed.modal_props,
                name: RefCell::new(None),
                events: EventChannel::new(),
                on_close: seed.on_close,
                on_after_leave: seed.on_after_leave,
                stack,
            }),
        }
    }

    // --- Identity & content ---

    #[inline]
    pub fn id(&self) -> ModalId {
        self.inner.id
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.inner.open.get()
    }

    /// Observe the open flag; renderers drive enter/exit transitions from it.
    pub fn subscribe_open(&self, callback: impl Fn(bool) + 'static) -> Subscription {
        self.inner.open.subscribe(move |open| callback(*open))
    }

    #[must_use]
    pub fn component(&self) -> Option<ComponentRef> {
        self.inner.component.borrow().clone()
    }

    /// Supply the content handle, typically from a local-modal callback.
    pub fn set_component(&self, component: ComponentRef) {
        *self.inner.component.borrow_mut() = Some(component);
    }

    /// The page object this modal was opened with.
    #[must_use]
    pub fn response(&self) -> &PageResponse {
        &self.inner.response
    }

    #[must_use]
    pub fn modal_props(&self) -> &ModalProps {
        &self.inner.modal_props
    }

    /// Registry name, for modals opened as local modals.
    #[must_use]
    pub fn name(&self) -> Option<String> {
        self.inner.name.borrow().clone()
    }

    pub(crate) fn set_name(&self, name: impl Into<String>) {
        *self.inner.name.borrow_mut() = Some(name.into());
    }

    // --- Props ---

    /// Snapshot of the current content props.
    #[must_use]
    pub fn props(&self) -> Props {
        self.inner.props.get()
    }

    #[must_use]
    pub fn prop(&self, key: &str) -> Option<Value> {
        self.inner.props.with(|props| props.get(key).cloned())
    }

    pub fn with_props<R>(&self, f: impl FnOnce(&Props) -> R) -> R {
        self.inner.props.with(f)
    }

    /// Merge `patch` into the content props and return the new snapshot.
    ///
    /// Keys missing from `patch` keep their values. Subscribers are notified
    /// only if something changed.
    pub fn patch_props(&self, patch: Props) -> Props {
        self.inner.props.update(|props| {
            for (key, value) in patch {
                props.insert(key, value);
            }
        });
        self.inner.props.get()
    }

    pub fn subscribe_props(&self, callback: impl Fn(&Props) + 'static) -> Subscription {
        self.inner.props.subscribe(callback)
    }

    /// Bumped once per patch that changed the props.
    #[must_use]
    pub fn props_version(&self) -> u64 {
        self.inner.props.version()
    }

    // --- Events ---

    #[must_use]
    pub fn events(&self) -> &EventChannel {
        &self.inner.events
    }

    pub fn on(&self, event: impl Into<String>, callback: impl Fn(&[Value]) + 'static) -> Listener {
        self.inner.events.on(event, callback)
    }

    pub fn off(&self, event: &str, listener: Option<&Listener>) {
        self.inner.events.off(event, listener);
    }

    pub fn emit(&self, event: &str, args: &[Value]) -> usize {
        self.inner.events.emit(event, args)
    }

    /// See [`EventChannel::register_from_attributes`].
    pub fn register_listeners_from_attributes<K, I>(&self, attrs: I) -> ListenerTeardown
    where
        K: AsRef<str>,
        I: IntoIterator<Item = (K, Listener)>,
    {
        self.inner.events.register_from_attributes(attrs)
    }

    // --- Stack position ---

    /// Current position in the stack, or `None` once removed.
    #[must_use]
    pub fn index(&self) -> Option<usize> {
        self.inner.stack.upgrade()?.position(self.inner.id)
    }

    #[must_use]
    pub fn is_member(&self) -> bool {
        self.index().is_some()
    }

    /// The modal directly below this one.
    #[must_use]
    pub fn parent(&self) -> Option<Modal> {
        let index = self.index()?.checked_sub(1)?;
        self.inner.stack.upgrade()?.at(index)
    }

    /// The modal directly above this one.
    #[must_use]
    pub fn child(&self) -> Option<Modal> {
        let index = self.index()? + 1;
        self.inner.stack.upgrade()?.at(index)
    }

    /// True when the stack holds fewer than two modals or this one is last.
    #[must_use]
    pub fn is_on_top_of_stack(&self) -> bool {
        match self.inner.stack.upgrade() {
            Some(stack) => stack.len() < 2 || stack.last_id() == Some(self.inner.id),
            None => true,
        }
    }

    // --- Lifecycle ---

    /// Open the modal. Returns `false` (and does nothing) if it is already
    /// open or not in the stack.
    pub fn show(&self) -> bool {
        if !self.is_member() || self.is_open() {
            return false;
        }
        self.inner.open.set(true);
        debug!(id = %self.inner.id, "modal shown");
        true
    }

    /// Close the modal: drop its listeners, clear the open flag, then run
    /// `on_close`. Returns `false` if it was not open or not in the stack.
    pub fn close(&self) -> bool {
        if !self.is_member() || !self.is_open() {
            return false;
        }
        self.inner.events.clear();
        self.inner.open.set(false);
        debug!(id = %self.inner.id, "modal closed");
        if let Some(on_close) = &self.inner.on_close {
            on_close();
        }
        true
    }

    /// Detach a closed modal from the stack once its exit transition is
    /// done, then run `on_after_leave`. Returns `false` while the modal is
    /// still open or already detached.
    pub fn after_leave(&self) -> bool {
        if self.is_open() {
            return false;
        }
        let Some(stack) = self.inner.stack.upgrade() else {
            return false;
        };
        if !stack.remove(self.inner.id) {
            return false;
        }
        debug!(id = %self.inner.id, depth = stack.len(), "modal detached");
        if let Some(on_after_leave) = &self.inner.on_after_leave {
            on_after_leave();
        }
        true
    }

    // --- Partial reload ---

    /// Prop keys a reload with `options` asks for, in original order.
    #[must_use]
    pub fn reload_keys(&self, options: &ReloadOptions) -> Vec<String> {
        options.filter_keys(self.inner.response.props.keys().map(String::as_str))
    }

    /// Build the partial-reload request without sending it.
    pub fn reload_request(&self, options: &ReloadOptions) -> Result<(PageRequest, Vec<String>)> {
        let response = &self.inner.response;
        if response.url.is_empty() {
            return Err(ModalError::NotReloadable { id: self.inner.id });
        }
        let keys = self.reload_keys(options);
        let request = PageRequest {
            method: Method::Get,
            url: response.url.clone(),
            headers: partial_reload_headers(&response.component, response.version.as_deref(), &keys),
            body: None,
        };
        Ok((request, keys))
    }

    /// Merge the requested `keys` of a reload response into the props.
    ///
    /// Responses for modals that have left the stack are discarded.
    pub fn apply_reload(&self, keys: &[String], response: PageResponse) -> ReloadOutcome {
        if !self.is_member() {
            debug!(id = %self.inner.id, "discarding reload for detached modal");
            return ReloadOutcome::Discarded;
        }
        let patch: Props = response
            .props
            .into_iter()
            .filter(|(key, _)| keys.iter().any(|k| k == key))
            .collect();
        ReloadOutcome::Applied(self.patch_props(patch))
    }

    /// Re-fetch this modal's props from its original url and merge them.
    ///
    /// Concurrent reloads are independent; the last response to arrive wins
    /// per key.
    pub async fn reload<T: Transport>(&self, transport: &T, options: &ReloadOptions) -> Result<ReloadOutcome> {
        let (request, keys) = self.reload_request(options)?;
        let span = debug_span!("imodal.reload", id = %self.inner.id, url = %request.url);
        async move {
            let response = transport.send(request).await?;
            Ok::<_, ModalError>(self.apply_reload(&keys, response))
        }
        .instrument(span)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stack::ModalStack;
    use serde_json::json;
    use std::cell::Cell;

    fn props(value: Value) -> Props {
        match value {
            Value::Object(map) => map,
            _ => unreachable!("fixture must be an object"),
        }
    }

    fn counter() -> (Rc<Cell<u32>>, ModalCallback) {
        let hits = Rc::new(Cell::new(0));
        let h = Rc::clone(&hits);
        (hits, Rc::new(move || h.set(h.get() + 1)))
    }

    fn page(component: &str, url: &str, value: Value) -> PageResponse {
        PageResponse::new(component, url)
            .with_props(props(value))
            .with_version("v1")
    }

    fn shown(stack: &ModalStack, response: PageResponse) -> Modal {
        let modal = stack.push(None, response, ModalProps::default(), None, None);
        stack.after_render();
        modal
    }

    #[test]
    fn ids_are_unique_and_displayed_with_prefix() {
        let stack = ModalStack::new();
        let a = stack.push(None, PageResponse::default(), ModalProps::default(), None, None);
        let b = stack.push(None, PageResponse::default(), ModalProps::default(), None, None);
        assert_ne!(a.id(), b.id());
        assert!(a.id().to_string().starts_with("imodal_"));
    }

    #[test]
    fn show_waits_for_membership_and_is_idempotent() {
        let stack = ModalStack::new();
        let modal = stack.push(None, PageResponse::default(), ModalProps::default(), None, None);
        assert!(!modal.is_open());

        assert_eq!(stack.after_render(), 1);
        assert!(modal.is_open());
        assert!(!modal.show());
    }

    #[test]
    fn close_twice_runs_on_close_once() {
        let stack = ModalStack::new();
        let (closes, on_close) = counter();
        let modal = stack.push(None, PageResponse::default(), ModalProps::default(), Some(on_close), None);
        stack.after_render();

        assert!(modal.close());
        assert!(!modal.close());
        assert_eq!(closes.get(), 1);
        assert!(!modal.is_open());
        assert!(modal.is_member());
    }

    #[test]
    fn close_drops_listeners_before_on_close() {
        let stack = ModalStack::new();
        let seen_listeners = Rc::new(Cell::new(true));
        let slot: Rc<RefCell<Option<Modal>>> = Rc::new(RefCell::new(None));

        let (seen, slot_ref) = (Rc::clone(&seen_listeners), Rc::clone(&slot));
        let on_close: ModalCallback = Rc::new(move || {
            if let Some(modal) = slot_ref.borrow().as_ref() {
                seen.set(modal.events().has_listeners());
            }
        });
        let modal = stack.push(None, PageResponse::default(), ModalProps::default(), Some(on_close), None);
        *slot.borrow_mut() = Some(modal.clone());
        stack.after_render();

        let hits = Rc::new(Cell::new(0));
        let h = Rc::clone(&hits);
        modal.on("saved", move |_| h.set(h.get() + 1));

        modal.close();
        assert!(!seen_listeners.get());
        assert_eq!(modal.emit("saved", &[]), 0);
        assert_eq!(hits.get(), 0);
        slot.borrow_mut().take();
    }

    #[test]
    fn after_leave_while_open_keeps_modal() {
        let stack = ModalStack::new();
        let (leaves, on_after_leave) = counter();
        let modal = stack.push(None, PageResponse::default(), ModalProps::default(), None, Some(on_after_leave));
        stack.after_render();

        assert!(!modal.after_leave());
        assert!(modal.is_member());
        assert_eq!(leaves.get(), 0);

        modal.close();
        assert!(modal.after_leave());
        assert!(!modal.is_member());
        assert_eq!(leaves.get(), 1);

        assert!(!modal.after_leave());
        assert_eq!(leaves.get(), 1);
    }

    #[test]
    fn removed_modal_ignores_lifecycle_calls() {
        let stack = ModalStack::new();
        let (closes, on_close) = counter();
        let modal = stack.push(None, PageResponse::default(), ModalProps::default(), Some(on_close), None);
        stack.after_render();
        modal.close();
        modal.after_leave();

        assert!(!modal.show());
        assert!(!modal.is_open());
        assert!(!modal.close());
        assert_eq!(closes.get(), 1);
    }

    #[test]
    fn parent_child_and_top_follow_stack_order() {
        let stack = ModalStack::new();
        let a = shown(&stack, PageResponse::default());
        assert!(a.is_on_top_of_stack());
        assert_eq!(a.parent(), None);
        assert_eq!(a.child(), None);

        let b = shown(&stack, PageResponse::default());
        let c = shown(&stack, PageResponse::default());

        assert_eq!(b.parent(), Some(a.clone()));
        assert_eq!(b.child(), Some(c.clone()));
        assert!(!a.is_on_top_of_stack());
        assert!(!b.is_on_top_of_stack());
        assert!(c.is_on_top_of_stack());

        b.close();
        b.after_leave();
        assert_eq!(c.parent(), Some(a.clone()));
        assert_eq!(c.index(), Some(1));
        assert_eq!(b.index(), None);
    }

    #[test]
    fn patch_merges_and_notifies() {
        let stack = ModalStack::new();
        let modal = shown(&stack, page("Item", "/items/1", json!({ "a": 1, "b": 2 })));

        let notified = Rc::new(Cell::new(0));
        let n = Rc::clone(&notified);
        let _sub = modal.subscribe_props(move |_| n.set(n.get() + 1));

        let after = modal.patch_props(props(json!({ "b": 3, "c": 4 })));
        assert_eq!(Value::Object(after), json!({ "a": 1, "b": 3, "c": 4 }));
        assert_eq!(notified.get(), 1);
        assert_eq!(modal.props_version(), 1);

        modal.patch_props(props(json!({ "b": 3 })));
        assert_eq!(notified.get(), 1);
    }

    #[test]
    fn reload_request_carries_partial_headers() {
        let stack = ModalStack::new();
        let modal = shown(&stack, page("Users/Edit", "/users/1/edit", json!({ "user": {}, "roles": [], "audit": [] })));

        let (request, keys) = modal
            .reload_request(&ReloadOptions::new().except(["audit"]))
            .unwrap();

        assert_eq!(keys, vec!["user", "roles"]);
        assert_eq!(request.method, Method::Get);
        assert_eq!(request.url, "/users/1/edit");
        assert_eq!(request.header("X-Inertia-Partial-Component"), Some("Users/Edit"));
        assert_eq!(request.header("X-Inertia-Partial-Data"), Some("user,roles"));
        assert_eq!(request.header("X-Inertia-Version"), Some("v1"));
        assert!(request.body.is_none());
    }

    #[test]
    fn apply_reload_merges_only_requested_keys() {
        let stack = ModalStack::new();
        let modal = shown(&stack, page("Item", "/items/1", json!({ "a": 1, "b": 2 })));
        let keys = modal.reload_keys(&ReloadOptions::new().only(["a"]));

        let outcome = modal.apply_reload(&keys, page("Item", "/items/1", json!({ "a": 10, "b": 20, "z": 0 })));

        assert_eq!(outcome, ReloadOutcome::Applied(props(json!({ "a": 10, "b": 2 }))));
    }

    #[test]
    fn apply_reload_discards_for_detached_modal() {
        let stack = ModalStack::new();
        let modal = shown(&stack, page("Item", "/items/1", json!({ "a": 1 })));
        modal.close();
        modal.after_leave();

        let outcome = modal.apply_reload(&["a".to_string()], page("Item", "/items/1", json!({ "a": 2 })));
        assert_eq!(outcome, ReloadOutcome::Discarded);
        assert_eq!(modal.prop("a"), Some(json!(1)));
    }

    #[test]
    fn local_modal_cannot_reload() {
        let stack = ModalStack::new();
        let modal = shown(&stack, PageResponse::default());
        assert!(matches!(
            modal.reload_request(&ReloadOptions::new()),
            Err(ModalError::NotReloadable { .. })
        ));
    }

    #[test]
    fn open_flag_is_observable() {
        let stack = ModalStack::new();
        let modal = stack.push(None, PageResponse::default(), ModalProps::default(), None, None);
        let log = Rc::new(RefCell::new(Vec::new()));
        let l = Rc::clone(&log);
        let _sub = modal.subscribe_open(move |open| l.borrow_mut().push(open));

        stack.after_render();
        modal.close();
        assert_eq!(*log.borrow(), vec![true, false]);
    }
}
