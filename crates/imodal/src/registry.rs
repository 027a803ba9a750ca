//! Named local modals.
//!
//! A local modal has no server round-trip: navigating to `#name` pushes an
//! empty modal and hands it to the callback registered under `name`, which
//! supplies the content.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use ahash::AHashMap;
use tracing::debug;

use crate::modal::Modal;

/// Fills a freshly pushed local modal.
pub type LocalModalCallback = Rc<dyn Fn(&Modal)>;

#[derive(Clone)]
pub struct LocalModal {
    pub name: String,
    pub callback: LocalModalCallback,
}

impl fmt::Debug for LocalModal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalModal")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Name-keyed local modal callbacks. Clones share the same registry.
#[derive(Clone, Default)]
pub struct LocalModalRegistry {
    entries: Rc<RefCell<AHashMap<String, LocalModal>>>,
}

impl fmt::Debug for LocalModalRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalModalRegistry")
            .field("names", &self.names())
            .finish()
    }
}

impl LocalModalRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `callback` under `name`, replacing any earlier registration.
    pub fn register(&self, name: impl Into<String>, callback: impl Fn(&Modal) + 'static) {
        let name = name.into();
        let replaced = self
            .entries
            .borrow_mut()
            .insert(
                name.clone(),
                LocalModal {
                    name: name.clone(),
                    callback: Rc::new(callback),
                },
            )
            .is_some();
        debug!(name, replaced, "registered local modal");
    }

    /// Returns `true` if `name` was registered.
    pub fn remove(&self, name: &str) -> bool {
        self.entries.borrow_mut().remove(name).is_some()
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<LocalModal> {
        self.entries.borrow().get(name).cloned()
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.borrow().contains_key(name)
    }

    /// Registered names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entries.borrow().keys().cloned().collect();
        names.sort_unstable();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::ComponentRef;
    use crate::props::ModalProps;
    use crate::protocol::PageResponse;
    use crate::stack::ModalStack;

    #[test]
    fn last_registration_wins() {
        let registry = LocalModalRegistry::new();
        registry.register("confirm", |modal: &Modal| modal.set_component(ComponentRef::new("Old")));
        registry.register("confirm", |modal: &Modal| modal.set_component(ComponentRef::new("New")));

        let stack = ModalStack::new();
        let modal = stack.push(None, PageResponse::default(), ModalProps::default(), None, None);
        let entry = registry.get("confirm").unwrap();
        (entry.callback)(&modal);

        assert_eq!(modal.component().map(|c| c.name().to_string()).as_deref(), Some("New"));
        assert_eq!(registry.names(), vec!["confirm".to_string()]);
    }

    #[test]
    fn remove_reports_presence() {
        let registry = LocalModalRegistry::new();
        registry.register("help", |_: &Modal| {});
        assert!(registry.contains("help"));
        assert!(registry.remove("help"));
        assert!(!registry.remove("help"));
        assert!(registry.get("help").is_none());
    }

    #[test]
    fn clones_share_entries() {
        let registry = LocalModalRegistry::new();
        registry.clone().register("a", |_: &Modal| {});
        assert!(registry.contains("a"));
    }
}
