//! Scripted [`GatewayHttp`] for adapter tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::error::{PaymentError, PaymentResult};
use crate::http::GatewayHttp;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentRequest {
    pub method: &'static str,
    pub url: String,
    pub body: Option<String>,
}

#[derive(Default)]
struct State {
    /// `Err` entries are replayed as transport failures.
    replies: VecDeque<Result<String, String>>,
    sent: Vec<SentRequest>,
}

#[derive(Clone, Default)]
pub struct FakeGatewayHttp {
    state: Arc<Mutex<State>>,
}

impl FakeGatewayHttp {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(&self, body: impl Into<String>) {
        self.state.lock().unwrap().replies.push_back(Ok(body.into()));
    }

    pub fn fail(&self, message: &str) {
        self.state
            .lock()
            .unwrap()
            .replies
            .push_back(Err(message.to_string()));
    }

    pub fn sent(&self) -> Vec<SentRequest> {
        self.state.lock().unwrap().sent.clone()
    }

    fn next(&self, request: SentRequest) -> PaymentResult<String> {
        let mut state = self.state.lock().unwrap();
        state.sent.push(request);
        match state.replies.pop_front() {
            Some(Ok(body)) => Ok(body),
            Some(Err(message)) => Err(PaymentError::Transport(message)),
            None => Err(PaymentError::Transport("no scripted reply".into())),
        }
    }
}

#[async_trait]
impl GatewayHttp for FakeGatewayHttp {
    async fn post_form(&self, url: &str, body: String) -> PaymentResult<String> {
        self.next(SentRequest {
            method: "POST",
            url: url.to_string(),
            body: Some(body),
        })
    }

    async fn get(&self, url: &str) -> PaymentResult<String> {
        self.next(SentRequest {
            method: "GET",
            url: url.to_string(),
            body: None,
        })
    }
}
