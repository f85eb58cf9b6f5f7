use crate::error::FetchError;
use price_client::http::{build_client, send_json};
use reqwest::Client;
use retry_utils::{retry_with_policy, RetryPolicy};
use serde_json::{json, Value};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// JSON-RPC 2.0 over HTTP POST with retries on transient failures
#[derive(Clone)]
pub struct JsonRpcClient {
    http: Client,
    retry: RetryPolicy,
    request_id: Arc<AtomicU64>,
}

impl JsonRpcClient {
    pub fn new(timeout: Duration, retry: RetryPolicy) -> Result<Self, FetchError> {
        Ok(Self {
            http: build_client(timeout)?,
            retry,
            request_id: Arc::new(AtomicU64::new(1)),
        })
    }

    fn next_request_id(&self) -> u64 {
        self.request_id.fetch_add(1, Ordering::SeqCst)
    }

    /// Call `method` and return its `result`, `Value::Null` when absent
    pub async fn call(&self, url: &str, method: &str, params: Value) -> Result<Value, FetchError> {
        retry_with_policy(
            || self.call_once(url, method, params.clone()),
            &self.retry,
            |e: &FetchError| e.retry_class(),
        )
        .await
    }

    async fn call_once(&self, url: &str, method: &str, params: Value) -> Result<Value, FetchError> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": self.next_request_id(),
            "method": method,
            "params": params,
        });
        debug!("RPC {}", method);

        let response = send_json(self.http.post(url).json(&body), method).await?;
        parse_envelope(response)
    }
}

pub(crate) fn parse_envelope(mut response: Value) -> Result<Value, FetchError> {
    if let Some(error) = response.get("error").filter(|e| !e.is_null()) {
        let code = error.get("code").and_then(Value::as_i64).unwrap_or_default();
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("unknown error");
        return Err(FetchError::from_rpc_error(code, message));
    }
    Ok(response
        .get_mut("result")
        .map(Value::take)
        .unwrap_or(Value::Null))
}

/// Collect pages until the cursor runs out or `max_pages` is reached.
///
/// `fetch_page` receives the cursor of the previous page (`None` first) and
/// returns the page items plus the next cursor.
pub async fn paginate<T, F, Fut>(
    label: &str,
    max_pages: u32,
    mut fetch_page: F,
) -> Result<Vec<T>, FetchError>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = Result<(Vec<T>, Option<String>), FetchError>>,
{
    let mut items = Vec::new();
    let mut cursor = None;

    for page in 0..max_pages {
        let (mut batch, next) = fetch_page(cursor.take()).await?;
        debug!("{}: page {} returned {} items", label, page + 1, batch.len());
        items.append(&mut batch);

        match next {
            Some(next) => cursor = Some(next),
            None => return Ok(items),
        }
    }

    if cursor.is_some() {
        warn!(
            "{}: stopped after {} pages with more data available ({} items)",
            label,
            max_pages,
            items.len()
        );
    }
    Ok(items)
}
