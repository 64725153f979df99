//! Scripted transport for exercising the flows without a server.

use std::cell::RefCell;
use std::collections::VecDeque;

use async_trait::async_trait;
use futures::channel::oneshot;

use crate::error::RequestError;
use crate::transport::{HttpCommandRequest, HttpResponse, RequestTransport};

type Reply = Result<HttpResponse, RequestError>;

enum Scripted {
    Ready(Reply),
    Gated(oneshot::Receiver<Reply>),
}

/// Hands out queued replies in order and records every request it sees.
#[derive(Default)]
pub struct ScriptedTransport {
    replies: RefCell<VecDeque<Scripted>>,
    requests: RefCell<Vec<HttpCommandRequest>>,
    on_request: RefCell<Option<Box<dyn Fn(&HttpCommandRequest)>>>,
}

/// Holds a queued reply back until `release` is called.
pub struct ResponseGate {
    sender: oneshot::Sender<Reply>,
}

impl ResponseGate {
    pub fn release(self, reply: Reply) {
        let _ = self.sender.send(reply);
    }
}

impl ScriptedTransport {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, response: HttpResponse) -> &Self {
        self.push(Scripted::Ready(Ok(response)))
    }

    pub fn respond_json(&self, status: u16, body: &serde_json::Value) -> &Self {
        self.respond(HttpResponse::new(status, body.to_string()))
    }

    pub fn fail_transport(&self, message: &str) -> &Self {
        self.push(Scripted::Ready(Err(RequestError::transport(message))))
    }

    pub fn gate(&self) -> ResponseGate {
        let (sender, receiver) = oneshot::channel();
        self.push(Scripted::Gated(receiver));
        ResponseGate { sender }
    }

    /// Runs `hook` synchronously when a request reaches the transport, before
    /// any reply is produced.
    pub fn on_request(&self, hook: impl Fn(&HttpCommandRequest) + 'static) {
        *self.on_request.borrow_mut() = Some(Box::new(hook));
    }

    #[must_use]
    pub fn requests(&self) -> Vec<HttpCommandRequest> {
        self.requests.borrow().clone()
    }

    #[must_use]
    pub fn request_count(&self) -> usize {
        self.requests.borrow().len()
    }

    #[must_use]
    pub fn last_request(&self) -> Option<HttpCommandRequest> {
        self.requests.borrow().last().cloned()
    }

    fn push(&self, scripted: Scripted) -> &Self {
        self.replies.borrow_mut().push_back(scripted);
        self
    }
}

#[async_trait(?Send)]
impl RequestTransport for ScriptedTransport {
    async fn post(&self, request: &HttpCommandRequest) -> Result<HttpResponse, RequestError> {
        self.requests.borrow_mut().push(request.clone());
        if let Some(hook) = self.on_request.borrow().as_ref() {
            hook(request);
        }

        let next = self.replies.borrow_mut().pop_front();
        match next {
            Some(Scripted::Ready(reply)) => reply,
            Some(Scripted::Gated(receiver)) => receiver
                .await
                .unwrap_or_else(|_| Err(RequestError::transport("response gate dropped"))),
            None => Err(RequestError::transport("no scripted response left")),
        }
    }
}
