use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use super::Fetch;
use crate::error::SyncError;

/// In-memory transport for tests: unknown URLs fail like an unreachable host.
#[derive(Default)]
pub struct FakeTransport {
    responses: HashMap<String, Vec<u8>>,
    requests: Mutex<Vec<String>>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, url: &str, body: impl Into<Vec<u8>>) -> Self {
        self.responses.insert(url.to_owned(), body.into());
        self
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Fetch for FakeTransport {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, SyncError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(url.to_owned());
        }
        self.responses
            .get(url)
            .cloned()
            .ok_or_else(|| SyncError::network(url, "connection refused"))
    }
}
