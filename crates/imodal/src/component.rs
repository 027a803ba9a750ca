//! Resolving server component names into renderable handles.

use std::fmt;
use std::rc::Rc;

use ahash::AHashSet;

use crate::error::{ModalError, Result};

/// Opaque handle to the content a modal renders.
///
/// The handle carries the server component name; hosts map it to whatever
/// their renderer needs.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ComponentRef(Rc<str>);

impl ComponentRef {
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(Rc::from(name.as_ref()))
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ComponentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Turns a server component name into a [`ComponentRef`].
///
/// Resolution may suspend (lazy-loaded component bundles), so it is async.
#[allow(async_fn_in_trait)]
pub trait ComponentResolver {
    async fn resolve(&self, name: &str) -> Result<ComponentRef>;
}

impl<F> ComponentResolver for F
where
    F: Fn(&str) -> Result<ComponentRef>,
{
    async fn resolve(&self, name: &str) -> Result<ComponentRef> {
        self(name)
    }
}

/// Accepts every component name.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnyComponent;

impl ComponentResolver for AnyComponent {
    async fn resolve(&self, name: &str) -> Result<ComponentRef> {
        Ok(ComponentRef::new(name))
    }
}

/// A fixed set of known component names.
#[derive(Debug, Clone, Default)]
pub struct ComponentRegistry {
    known: AHashSet<String>,
}

impl ComponentRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, name: impl Into<String>) -> Self {
        self.register(name);
        self
    }

    pub fn register(&mut self, name: impl Into<String>) {
        self.known.insert(name.into());
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.known.contains(name)
    }
}

impl ComponentResolver for ComponentRegistry {
    async fn resolve(&self, name: &str) -> Result<ComponentRef> {
        if self.contains(name) {
            Ok(ComponentRef::new(name))
        } else {
            Err(ModalError::UnknownComponent {
                name: name.to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn registry_rejects_unknown_names() {
        let registry = ComponentRegistry::new().with("Users/Edit");

        let found = registry.resolve("Users/Edit").await.unwrap();
        assert_eq!(found.name(), "Users/Edit");

        let missing = registry.resolve("Users/Show").await.unwrap_err();
        assert!(matches!(missing, ModalError::UnknownComponent { name } if name == "Users/Show"));
    }

    #[tokio::test]
    async fn closures_resolve() {
        let resolver = |name: &str| Ok::<_, ModalError>(ComponentRef::new(format!("lazy:{name}")));
        assert_eq!(resolver.resolve("Item").await.unwrap().name(), "lazy:Item");
    }

    #[test]
    fn component_refs_compare_by_name() {
        assert_eq!(ComponentRef::new("A"), ComponentRef::new("A"));
        assert_ne!(ComponentRef::new("A"), ComponentRef::new("B"));
        assert_eq!(ComponentRef::new("A").to_string(), "A");
    }
}
