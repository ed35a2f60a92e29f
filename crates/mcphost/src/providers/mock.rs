use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::models::message::Message;
use crate::models::tool::Tool;
use crate::providers::base::{Provider, Usage};
use crate::providers::errors::ProviderError;

/// A mock provider that returns pre-configured responses for testing
#[derive(Clone, Default)]
pub struct MockProvider {
    responses: Arc<Mutex<VecDeque<Result<(Message, Usage), ProviderError>>>>,
    requests: Arc<Mutex<Vec<Vec<Message>>>>,
    hanging: Arc<AtomicBool>,
}

impl MockProvider {
    /// Create a new mock provider with a sequence of responses
    pub fn new(responses: Vec<Message>) -> Self {
        let provider = Self::default();
        for response in responses {
            provider.push_response(response);
        }
        provider
    }

    pub fn push_response(&self, message: Message) {
        self.responses
            .lock()
            .unwrap()
            .push_back(Ok((message, Usage::new(Some(10), Some(5), Some(15)))));
    }

    pub fn push_error(&self, error: ProviderError) {
        self.responses.lock().unwrap().push_back(Err(error));
    }

    /// Never answer again, so every later call runs into its timeout
    pub fn hang(&self) {
        self.hanging.store(true, Ordering::SeqCst);
    }

    /// The history the provider was called with, one entry per call
    pub fn requests(&self) -> Vec<Vec<Message>> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    fn model(&self) -> &str {
        "mock-model"
    }

    async fn complete(
        &self,
        messages: &[Message],
        _tools: &[Tool],
    ) -> Result<(Message, Usage), ProviderError> {
        self.requests.lock().unwrap().push(messages.to_vec());
        if self.hanging.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        // Return empty response if no more pre-configured responses
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok((Message::assistant().with_text(""), Usage::default())))
    }
}
