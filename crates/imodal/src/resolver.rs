//! Turning navigation targets into stacked modals.
//!
//! A target that starts with `#` names a local modal and never touches the
//! network. Anything else is fetched through the [`Transport`]; the payload
//! is folded into the query string for GET and sent as the body otherwise.
//!
//! Failures never mutate the stack: the local-name lookup, the request, and
//! component resolution all happen before the push.

use std::cell::RefCell;
use std::rc::Rc;

use serde_json::Value;
use tracing::{Instrument, debug, info_span};

use crate::component::{AnyComponent, ComponentResolver};
use crate::config::ClientConfig;
use crate::error::{ModalError, Result};
use crate::modal::{Modal, ModalCallback, ReloadOutcome};
use crate::props::{ModalProps, Props, ReloadOptions};
use crate::protocol::{Headers, Method, PageRequest, PageResponse, apply_modal_headers, set_header};
use crate::query::{ArrayFormat, merge_data_into_query_string};
use crate::registry::LocalModalRegistry;
use crate::stack::ModalStack;
use crate::transport::Transport;

/// Marks a target as a local modal name.
pub const LOCAL_MODAL_PREFIX: char = '#';

/// One navigation request.
#[derive(Clone, Default)]
pub struct Visit {
    pub target: String,
    pub method: Method,
    pub payload: Props,
    pub headers: Headers,
    pub modal_props: ModalProps,
    pub on_close: Option<ModalCallback>,
    pub on_after_leave: Option<ModalCallback>,
    /// Falls back to the client config when unset.
    pub array_format: Option<ArrayFormat>,
}

impl std::fmt::Debug for Visit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Visit")
            .field("target", &self.target)
            .field("method", &self.method)
            .field("payload", &self.payload)
            .field("headers", &self.headers)
            .field("modal_props", &self.modal_props)
            .field("array_format", &self.array_format)
            .finish_non_exhaustive()
    }
}

impl Visit {
    pub fn new(method: Method, target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            method,
            ..Self::default()
        }
    }

    pub fn get(target: impl Into<String>) -> Self {
        Self::new(Method::Get, target)
    }

    pub fn post(target: impl Into<String>) -> Self {
        Self::new(Method::Post, target)
    }

    #[must_use]
    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    #[must_use]
    pub fn payload(mut self, payload: Props) -> Self {
        self.payload = payload;
        self
    }

    /// Add one payload field.
    #[must_use]
    pub fn field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.payload.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn header(mut self, name: &str, value: impl Into<String>) -> Self {
        set_header(&mut self.headers, name, value);
        self
    }

    #[must_use]
    pub fn modal_props(mut self, modal_props: ModalProps) -> Self {
        self.modal_props = modal_props;
        self
    }

    #[must_use]
    pub fn on_close(mut self, callback: impl Fn() + 'static) -> Self {
        let callback: ModalCallback = Rc::new(callback);
        self.on_close = Some(callback);
        self
    }

    #[must_use]
    pub fn on_after_leave(mut self, callback: impl Fn() + 'static) -> Self {
        let callback: ModalCallback = Rc::new(callback);
        self.on_after_leave = Some(callback);
        self
    }

    #[must_use]
    pub fn array_format(mut self, format: ArrayFormat) -> Self {
        self.array_format = Some(format);
        self
    }

    /// The local modal name, if this visit targets one.
    #[must_use]
    pub fn local_name(&self) -> Option<&str> {
        self.target.strip_prefix(LOCAL_MODAL_PREFIX)
    }
}

/// Opens modals on a [`ModalStack`] from navigation targets.
pub struct NavigationResolver<T, C = AnyComponent> {
    stack: ModalStack,
    local_modals: LocalModalRegistry,
    transport: T,
    components: C,
    config: ClientConfig,
    page_version: RefCell<Option<String>>,
}

impl<T, C> std::fmt::Debug for NavigationResolver<T, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NavigationResolver")
            .field("stack", &self.stack)
            .field("local_modals", &self.local_modals)
            .field("config", &self.config)
            .field("page_version", &*self.page_version.borrow())
            .finish_non_exhaustive()
    }
}

impl<T: Transport> NavigationResolver<T> {
    pub fn new(stack: ModalStack, local_modals: LocalModalRegistry, transport: T, config: ClientConfig) -> Self {
        Self {
            stack,
            local_modals,
            transport,
            components: AnyComponent,
            config,
            page_version: RefCell::new(None),
        }
    }
}

impl<T: Transport, C: ComponentResolver> NavigationResolver<T, C> {
    /// Swap the component resolver.
    pub fn with_components<C2: ComponentResolver>(self, components: C2) -> NavigationResolver<T, C2> {
        NavigationResolver {
            stack: self.stack,
            local_modals: self.local_modals,
            transport: self.transport,
            components,
            config: self.config,
            page_version: self.page_version,
        }
    }

    #[must_use]
    pub fn stack(&self) -> &ModalStack {
        &self.stack
    }

    #[must_use]
    pub fn local_modals(&self) -> &LocalModalRegistry {
        &self.local_modals
    }

    #[must_use]
    pub fn transport(&self) -> &T {
        &self.transport
    }

    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Record the asset version of the page currently shown by the host.
    pub fn set_page_version(&self, version: Option<String>) {
        *self.page_version.borrow_mut() = version;
    }

    /// Version sent with visits: the current page's, else the configured one.
    #[must_use]
    pub fn current_version(&self) -> Option<String> {
        self.page_version
            .borrow()
            .clone()
            .or_else(|| self.config.asset_version.clone())
    }

    pub fn register_local_modal(&self, name: impl Into<String>, callback: impl Fn(&Modal) + 'static) {
        self.local_modals.register(name, callback);
    }

    pub fn remove_local_modal(&self, name: &str) -> bool {
        self.local_modals.remove(name)
    }

    /// Open `visit` as a new modal on top of the stack.
    pub async fn visit(&self, visit: Visit) -> Result<Modal> {
        let span = info_span!("imodal.visit", target = %visit.target, method = %visit.method);
        self.visit_inner(visit).instrument(span).await
    }

    async fn visit_inner(&self, visit: Visit) -> Result<Modal> {
        self.stack.verify_root()?;

        if let Some(name) = visit.local_name().map(str::to_string) {
            return self.push_local(&name, visit.modal_props, visit.on_close, visit.on_after_leave);
        }

        let request = self.build_request(&visit)?;
        let response = self.transport.send(request).await?;
        debug!(component = %response.component, url = %response.url, "modal page received");
        self.push_from_response_data(response, visit.modal_props, visit.on_close, visit.on_after_leave)
            .await
    }

    /// The request a remote visit would send.
    pub fn build_request(&self, visit: &Visit) -> Result<PageRequest> {
        let format = visit.array_format.unwrap_or(self.config.array_format);
        let (url, body) = merge_data_into_query_string(visit.method, &visit.target, &visit.payload, format)?;

        let mut headers = self.config.extra_headers.clone();
        for (name, value) in &visit.headers {
            set_header(&mut headers, name, value.clone());
        }
        apply_modal_headers(&mut headers, self.current_version().as_deref());

        let body = (visit.method != Method::Get).then(|| Value::Object(body));
        Ok(PageRequest {
            method: visit.method,
            url,
            headers,
            body,
        })
    }

    /// Push a registered local modal and let its callback fill it.
    pub fn push_local(
        &self,
        name: &str,
        modal_props: ModalProps,
        on_close: Option<ModalCallback>,
        on_after_leave: Option<ModalCallback>,
    ) -> Result<Modal> {
        let entry = self
            .local_modals
            .get(name)
            .ok_or_else(|| ModalError::LocalModalNotRegistered { name: name.to_string() })?;

        let modal = self
            .stack
            .push(None, PageResponse::default(), modal_props, on_close, on_after_leave);
        modal.set_name(entry.name.as_str());
        debug!(id = %modal.id(), name, "opened local modal");
        (entry.callback)(&modal);
        Ok(modal)
    }

    /// Resolve the response's component and push a modal seeded with it.
    pub async fn push_from_response_data(
        &self,
        response: PageResponse,
        modal_props: ModalProps,
        on_close: Option<ModalCallback>,
        on_after_leave: Option<ModalCallback>,
    ) -> Result<Modal> {
        self.stack.verify_root()?;
        let component = self.components.resolve(&response.component).await?;
        Ok(self
            .stack
            .push(Some(component), response, modal_props, on_close, on_after_leave))
    }

    /// Partially reload `modal` through this resolver's transport.
    pub async fn reload(&self, modal: &Modal, options: &ReloadOptions) -> Result<ReloadOutcome> {
        modal.reload(&self.transport, options).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::{ComponentRef, ComponentRegistry};
    use crate::protocol::{X_INERTIA_VERSION, X_INERTIAUI_MODAL};
    use crate::transport::TransportError;
    use serde_json::json;
    use std::cell::Cell;

    /// Answers every request with a copy of `response` and counts calls.
    struct EchoTransport {
        response: PageResponse,
        calls: Cell<usize>,
    }

    impl Transport for EchoTransport {
        async fn send(&self, _request: PageRequest) -> std::result::Result<PageResponse, TransportError> {
            self.calls.set(self.calls.get() + 1);
            Ok(self.response.clone())
        }
    }

    fn resolver(response: PageResponse) -> NavigationResolver<EchoTransport> {
        NavigationResolver::new(
            ModalStack::new(),
            LocalModalRegistry::new(),
            EchoTransport {
                response,
                calls: Cell::new(0),
            },
            ClientConfig::default(),
        )
    }

    fn item() -> PageResponse {
        let mut props = Props::new();
        props.insert("id".into(), json!(5));
        PageResponse::new("Item", "/items/5").with_props(props).with_version("v1")
    }

    #[test]
    fn get_payload_goes_into_query() {
        let resolver = resolver(item());
        let request = resolver
            .build_request(&Visit::get("/items?page=1").field("sort", "name"))
            .unwrap();
        assert_eq!(request.url, "/items?page=1&sort=name");
        assert!(request.body.is_none());
    }

    #[test]
    fn post_payload_goes_into_body() {
        let resolver = resolver(item());
        let request = resolver.build_request(&Visit::post("/items").field("name", "lamp")).unwrap();
        assert_eq!(request.url, "/items");
        assert_eq!(request.body, Some(json!({ "name": "lamp" })));
    }

    #[test]
    fn protocol_headers_override_caller_headers() {
        let resolver = resolver(item());
        resolver.set_page_version(Some("page-v".into()));
        let request = resolver
            .build_request(&Visit::get("/items").header("x-inertiaui-modal", "false").header("X-Trace", "1"))
            .unwrap();
        assert_eq!(request.header(X_INERTIAUI_MODAL), Some("true"));
        assert_eq!(request.header(X_INERTIA_VERSION), Some("page-v"));
        assert_eq!(request.header("X-Trace"), Some("1"));
    }

    #[test]
    fn version_falls_back_to_config() {
        let mut config = ClientConfig::default();
        config.asset_version = Some("cfg".into());
        let resolver = NavigationResolver::new(
            ModalStack::new(),
            LocalModalRegistry::new(),
            EchoTransport {
                response: item(),
                calls: Cell::new(0),
            },
            config,
        );
        assert_eq!(resolver.current_version().as_deref(), Some("cfg"));
        resolver.set_page_version(Some("page".into()));
        assert_eq!(resolver.current_version().as_deref(), Some("page"));
    }

    #[tokio::test]
    async fn visit_without_root_fails_before_fetching() {
        let resolver = resolver(item());
        let err = resolver.visit(Visit::get("/items/5")).await.unwrap_err();
        assert!(matches!(err, ModalError::RootMissing));
        assert_eq!(resolver.transport().calls.get(), 0);
        assert!(resolver.stack().is_empty());
    }

    #[tokio::test]
    async fn remote_visit_pushes_resolved_component() {
        let resolver = resolver(item());
        let _root = resolver.stack().mount_root();

        let modal = resolver.visit(Visit::get("/items/5")).await.unwrap();

        assert_eq!(modal.component(), Some(ComponentRef::new("Item")));
        assert_eq!(modal.prop("id"), Some(json!(5)));
        assert_eq!(resolver.stack().top(), Some(modal));
    }

    #[tokio::test]
    async fn unknown_component_pushes_nothing() {
        let resolver = resolver(item()).with_components(ComponentRegistry::new().with("Other"));
        let _root = resolver.stack().mount_root();

        let err = resolver.visit(Visit::get("/items/5")).await.unwrap_err();
        assert!(matches!(err, ModalError::UnknownComponent { ref name } if name == "Item"));
        assert!(resolver.stack().is_empty());
    }

    #[tokio::test]
    async fn local_visit_names_modal_and_skips_transport() {
        let resolver = resolver(item());
        let _root = resolver.stack().mount_root();
        let seen = Rc::new(Cell::new(false));
        let s = Rc::clone(&seen);
        resolver.register_local_modal("confirm", move |modal: &Modal| {
            s.set(true);
            modal.set_component(ComponentRef::new("Confirm"));
        });

        let modal = resolver.visit(Visit::get("#confirm")).await.unwrap();

        assert!(seen.get());
        assert_eq!(modal.name().as_deref(), Some("confirm"));
        assert_eq!(modal.component(), Some(ComponentRef::new("Confirm")));
        assert_eq!(resolver.transport().calls.get(), 0);
    }

    #[tokio::test]
    async fn local_callback_may_register_more_modals() {
        let resolver = Rc::new(resolver(item()));
        let _root = resolver.stack().mount_root();
        let registry = resolver.local_modals().clone();
        resolver.register_local_modal("outer", move |_: &Modal| {
            registry.register("inner", |_: &Modal| {});
        });

        resolver.visit(Visit::get("#outer")).await.unwrap();
        assert!(resolver.local_modals().contains("inner"));
    }
}
