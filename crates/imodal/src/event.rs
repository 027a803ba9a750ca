//! Per-modal named event channel.
//!
//! Every [`crate::Modal`] owns one [`EventChannel`]. Listeners registered on
//! one modal are invisible to every other modal.
//!
//! # Invariants
//!
//! 1. `emit` calls listeners in registration order.
//! 2. `emit` works on a snapshot: a listener removed during emission is
//!    skipped if it has not run yet, and a listener added during emission
//!    first runs on the next `emit`.
//! 3. Listener identity is the `Rc` allocation; registering the same
//!    [`Listener`] twice makes it run twice, and `off` removes every copy.

use std::cell::RefCell;
use std::rc::Rc;

use ahash::AHashMap;
use serde_json::Value;
use tracing::trace;

/// A registered event callback. Compared by pointer identity.
pub type Listener = Rc<dyn Fn(&[Value])>;

/// Named-listener registry. Cloning yields another handle to the same
/// registry.
#[derive(Clone, Default)]
pub struct EventChannel {
    listeners: Rc<RefCell<AHashMap<String, Vec<Listener>>>>,
}

impl std::fmt::Debug for EventChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let listeners = self.listeners.borrow();
        let mut counts: Vec<(&str, usize)> = listeners
            .iter()
            .map(|(event, list)| (event.as_str(), list.len()))
            .collect();
        counts.sort_unstable();
        f.debug_struct("EventChannel")
            .field("listeners", &counts)
            .finish()
    }
}

impl EventChannel {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `callback` for `event`, returning the handle needed to
    /// remove it again.
    pub fn on(&self, event: impl Into<String>, callback: impl Fn(&[Value]) + 'static) -> Listener {
        let listener: Listener = Rc::new(callback);
        self.add_listener(event, Rc::clone(&listener));
        listener
    }

    /// Register an existing listener handle for `event`.
    pub fn add_listener(&self, event: impl Into<String>, listener: Listener) {
        self.listeners
            .borrow_mut()
            .entry(event.into())
            .or_default()
            .push(listener);
    }

    /// Remove `listener` from `event`, or every listener of `event` when
    /// `listener` is `None`.
    pub fn off(&self, event: &str, listener: Option<&Listener>) {
        let mut listeners = self.listeners.borrow_mut();
        match listener {
            Some(listener) => {
                let drained = listeners.get_mut(event).is_some_and(|list| {
                    list.retain(|existing| !Rc::ptr_eq(existing, listener));
                    list.is_empty()
                });
                if drained {
                    listeners.remove(event);
                }
            }
            None => {
                listeners.remove(event);
            }
        }
    }

    /// Remove every listener of every event.
    pub fn clear(&self) {
        self.listeners.borrow_mut().clear();
    }

    /// Invoke the listeners of `event` with `args`. Returns how many ran.
    pub fn emit(&self, event: &str, args: &[Value]) -> usize {
        let snapshot: Vec<Listener> = match self.listeners.borrow().get(event) {
            Some(list) => list.clone(),
            None => return 0,
        };

        let mut invoked = 0;
        for listener in snapshot {
            if !self.is_registered(event, &listener) {
                continue;
            }
            listener(args);
            invoked += 1;
        }
        trace!(event, invoked, "emitted modal event");
        invoked
    }

    #[must_use]
    pub fn is_registered(&self, event: &str, listener: &Listener) -> bool {
        self.listeners
            .borrow()
            .get(event)
            .is_some_and(|list| list.iter().any(|existing| Rc::ptr_eq(existing, listener)))
    }

    #[must_use]
    pub fn listener_count(&self, event: &str) -> usize {
        self.listeners.borrow().get(event).map_or(0, Vec::len)
    }

    #[must_use]
    pub fn has_listeners(&self) -> bool {
        self.listeners.borrow().values().any(|list| !list.is_empty())
    }

    /// Names of events with at least one listener, sorted.
    #[must_use]
    pub fn events(&self) -> Vec<String> {
        let mut events: Vec<String> = self
            .listeners
            .borrow()
            .iter()
            .filter(|(_, list)| !list.is_empty())
            .map(|(event, _)| event.clone())
            .collect();
        events.sort_unstable();
        events
    }

    /// Register handler-style attributes (`onRefreshKey`) as event listeners
    /// (`refresh-key`). Attributes that are not handler-style are skipped.
    ///
    /// The returned [`ListenerTeardown`] removes exactly the listeners
    /// registered here.
    pub fn register_from_attributes<K, I>(&self, attrs: I) -> ListenerTeardown
    where
        K: AsRef<str>,
        I: IntoIterator<Item = (K, Listener)>,
    {
        let mut registered = Vec::new();
        for (key, listener) in attrs {
            let Some(event) = attribute_to_event_name(key.as_ref()) else {
                continue;
            };
            self.add_listener(event.clone(), Rc::clone(&listener));
            registered.push((event, listener));
        }
        ListenerTeardown {
            channel: self.clone(),
            registered,
        }
    }
}

/// Undoes one [`EventChannel::register_from_attributes`] call.
#[must_use = "keep the teardown to unregister the attribute listeners later"]
pub struct ListenerTeardown {
    channel: EventChannel,
    registered: Vec<(String, Listener)>,
}

impl std::fmt::Debug for ListenerTeardown {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerTeardown")
            .field(
                "events",
                &self.registered.iter().map(|(e, _)| e.as_str()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl ListenerTeardown {
    /// Event names this teardown covers, in registration order.
    pub fn events(&self) -> impl Iterator<Item = &str> {
        self.registered.iter().map(|(event, _)| event.as_str())
    }

    /// Unregister every listener this teardown covers.
    pub fn teardown(self) {
        for (event, listener) in &self.registered {
            self.channel.off(event, Some(listener));
        }
    }
}

/// Convert a handler attribute name into an event name.
///
/// `onRefreshKey` becomes `refresh-key`. Returns `None` when `key` does not
/// start with `on` or has nothing after it.
#[must_use]
pub fn attribute_to_event_name(key: &str) -> Option<String> {
    let rest = key.strip_prefix("on")?;
    let mut chars = rest.chars();
    let first = chars.next()?;

    let mut event = String::with_capacity(rest.len() + 4);
    event.extend(first.to_lowercase());
    for c in chars {
        if c.is_ascii_uppercase() {
            event.push('-');
        }
        event.extend(c.to_lowercase());
    }
    Some(event)
}
