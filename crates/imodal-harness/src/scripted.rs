use std::cell::RefCell;
use std::collections::VecDeque;

use imodal::{PageRequest, PageResponse, Transport, TransportError};
use tracing::trace;

/// One canned answer.
#[derive(Debug, Clone)]
pub enum ScriptedReply {
    Page(PageResponse),
    /// Fails with a non-2xx status for the requested url.
    Status(u16),
    /// Fails with [`TransportError::Network`].
    Network(String),
}

/// A [`Transport`] that answers from a queue.
///
/// Replies are consumed in order. When the queue is empty, the fallback
/// reply (if any) answers; otherwise the request fails with a network error
/// naming the url.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    replies: RefCell<VecDeque<ScriptedReply>>,
    fallback: RefCell<Option<ScriptedReply>>,
    requests: RefCell<Vec<PageRequest>>,
}

impl ScriptedTransport {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer every request with `response`.
    #[must_use]
    pub fn always(response: PageResponse) -> Self {
        let transport = Self::new();
        *transport.fallback.borrow_mut() = Some(ScriptedReply::Page(response));
        transport
    }

    pub fn reply(&self, response: PageResponse) -> &Self {
        self.push(ScriptedReply::Page(response))
    }

    pub fn fail_status(&self, status: u16) -> &Self {
        self.push(ScriptedReply::Status(status))
    }

    pub fn fail_network(&self, message: impl Into<String>) -> &Self {
        self.push(ScriptedReply::Network(message.into()))
    }

    pub fn push(&self, reply: ScriptedReply) -> &Self {
        self.replies.borrow_mut().push_back(reply);
        self
    }

    /// Every request received so far, oldest first.
    #[must_use]
    pub fn requests(&self) -> Vec<PageRequest> {
        self.requests.borrow().clone()
    }

    #[must_use]
    pub fn last_request(&self) -> Option<PageRequest> {
        self.requests.borrow().last().cloned()
    }

    #[must_use]
    pub fn request_count(&self) -> usize {
        self.requests.borrow().len()
    }

    /// Replies still queued.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.replies.borrow().len()
    }
}

impl Transport for ScriptedTransport {
    async fn send(&self, request: PageRequest) -> Result<PageResponse, TransportError> {
        let url = request.url.clone();
        trace!(method = %request.method, %url, "scripted request");
        self.requests.borrow_mut().push(request);

        let reply = self
            .replies
            .borrow_mut()
            .pop_front()
            .or_else(|| self.fallback.borrow().clone());
        match reply {
            Some(ScriptedReply::Page(page)) => Ok(page),
            Some(ScriptedReply::Status(status)) => Err(TransportError::Status { status, url }),
            Some(ScriptedReply::Network(message)) => Err(TransportError::Network(message)),
            None => Err(TransportError::Network(format!("no scripted reply for {url}"))),
        }
    }
}
