//! Route lookup for re-dispatched requests.

use std::fmt;

use imodal::{Method, PageResponse};
use indexmap::IndexMap;
use tracing::debug;

use crate::error::{Result, ServerError};
use crate::request::IncomingRequest;

/// Runs the route that matches a request.
pub trait RouteDispatcher {
    /// Returns [`ServerError::RouteNotFound`] when nothing matches.
    fn dispatch(&self, request: &IncomingRequest) -> Result<PageResponse>;
}

impl<D: RouteDispatcher + ?Sized> RouteDispatcher for &D {
    fn dispatch(&self, request: &IncomingRequest) -> Result<PageResponse> {
        (**self).dispatch(request)
    }
}

type Handler = Box<dyn Fn(&IncomingRequest) -> Result<PageResponse>>;

/// Exact-path route table.
#[derive(Default)]
pub struct Router {
    routes: IndexMap<(Method, String), Handler>,
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router")
            .field(
                "routes",
                &self
                    .routes
                    .keys()
                    .map(|(method, path)| format!("{method} {path}"))
                    .collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl Router {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `method path`. A later registration for the
    /// same pair replaces the earlier one.
    #[must_use]
    pub fn route(
        mut self,
        method: Method,
        path: impl Into<String>,
        handler: impl Fn(&IncomingRequest) -> Result<PageResponse> + 'static,
    ) -> Self {
        self.routes.insert((method, path.into()), Box::new(handler));
        self
    }

    #[must_use]
    pub fn get(
        self,
        path: impl Into<String>,
        handler: impl Fn(&IncomingRequest) -> Result<PageResponse> + 'static,
    ) -> Self {
        self.route(Method::Get, path, handler)
    }

    #[must_use]
    pub fn matches(&self, request: &IncomingRequest) -> bool {
        self.routes
            .contains_key(&(request.method, request.path().to_string()))
    }
}

impl RouteDispatcher for Router {
    fn dispatch(&self, request: &IncomingRequest) -> Result<PageResponse> {
        let key = (request.method, request.path().to_string());
        let handler = self.routes.get(&key).ok_or_else(|| ServerError::RouteNotFound {
            method: request.method,
            path: key.1.clone(),
        })?;
        debug!(method = %request.method, path = %key.1, "dispatching route");
        handler(request)
    }
}
