use imodal::{ModalStack, PageResponse, Props, RootMount};
use serde_json::Value;

/// Object props from a `json!` literal. Non-object values yield empty props.
#[must_use]
pub fn props(value: Value) -> Props {
    match value {
        Value::Object(map) => map,
        _ => Props::new(),
    }
}

/// A page object at asset version `v1`.
#[must_use]
pub fn page(component: &str, url: &str, value: Value) -> PageResponse {
    PageResponse::new(component, url)
        .with_props(props(value))
        .with_version("v1")
}

/// A fresh stack with its root already mounted. Keep the guard alive for the
/// length of the test.
#[must_use]
pub fn mounted() -> (ModalStack, RootMount) {
    let stack = ModalStack::new();
    let root = stack.mount_root();
    (stack, root)
}
