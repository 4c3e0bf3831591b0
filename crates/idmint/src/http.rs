use std::time::Duration;

use serde_json::Value;

use crate::Result;

/// Outbound coordinator calls never wait longer than this.
const COORDINATOR_TIMEOUT: Duration = Duration::from_secs(5);

/// A JSON-over-HTTP POST capability.
///
/// The etcd and Spanner strategies speak their coordinator protocols through
/// this seam, so the protocol logic (transactions, lease claims, response
/// parsing) is testable against scripted transports.
pub trait HttpPost: Send + Sync {
    /// POSTs `body` to `url` and returns the decoded JSON response.
    fn post_json(&self, url: &str, body: &Value) -> Result<Value>;
}

impl<T: HttpPost + ?Sized> HttpPost for std::sync::Arc<T> {
    fn post_json(&self, url: &str, body: &Value) -> Result<Value> {
        (**self).post_json(url, body)
    }
}

/// The production transport: a blocking client with the coordinator timeout.
pub struct HttpClient {
    client: reqwest::blocking::Client,
}

impl HttpClient {
    /// Builds a client with the 5-second coordinator timeout applied to every
    /// request.
    pub fn new() -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(COORDINATOR_TIMEOUT)
            .build()?;
        Ok(Self { client })
    }
}

impl HttpPost for HttpClient {
    fn post_json(&self, url: &str, body: &Value) -> Result<Value> {
        Ok(self.client.post(url).json(body).send()?.json()?)
    }
}
