use reqwest::{Client, RequestBuilder};
use rust_decimal::Decimal;
use serde_json::Value;
use std::time::Duration;
pub use tax_core::decimal_from_json;
use tax_core::ProviderError;
use tracing::debug;

pub const USER_AGENT: &str = concat!("tax-ledger/", env!("CARGO_PKG_VERSION"));

/// Build an HTTP client with a request timeout and the crate user agent
pub fn build_client(timeout: Duration) -> Result<Client, ProviderError> {
    Client::builder()
        .timeout(timeout)
        .connect_timeout(timeout)
        .user_agent(USER_AGENT)
        .pool_idle_timeout(Duration::from_secs(90))
        .build()
        .map_err(|e| ProviderError::Fatal(format!("Failed to build HTTP client: {}", e)))
}

/// Classify a transport-level reqwest failure
pub fn map_transport_error(e: reqwest::Error, context: &str) -> ProviderError {
    // URLs can carry API keys
    let e = e.without_url();
    if e.is_timeout() || e.is_connect() || e.is_request() {
        ProviderError::Transient(format!("{}: {}", context, e))
    } else if e.is_decode() {
        ProviderError::DataShape(format!("{}: {}", context, e))
    } else if let Some(status) = e.status() {
        ProviderError::from_status(status.as_u16(), context)
    } else {
        ProviderError::Transient(format!("{}: {}", context, e))
    }
}

/// Send a request and decode its JSON body, mapping non-success statuses
pub async fn send_json(request: RequestBuilder, context: &str) -> Result<Value, ProviderError> {
    let response = request
        .send()
        .await
        .map_err(|e| map_transport_error(e, context))?;

    let status = response.status();
    if !status.is_success() {
        debug!("{} returned HTTP {}", context, status);
        return Err(ProviderError::from_status(status.as_u16(), context));
    }

    response
        .json::<Value>()
        .await
        .map_err(|e| ProviderError::DataShape(format!("{}: {}", context, e)))
}

/// Require a strictly positive price at `value`
pub fn positive_price(value: Option<&Value>, context: &str) -> Result<Decimal, ProviderError> {
    let price = value
        .and_then(decimal_from_json)
        .ok_or_else(|| ProviderError::DataShape(format!("{}: missing price", context)))?;

    if price <= Decimal::ZERO {
        return Err(ProviderError::NotFound(format!(
            "{}: non-positive price {}",
            context, price
        )));
    }
    Ok(price)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[test]
    fn test_positive_price() {
        assert_eq!(positive_price(Some(&json!("3.2")), "t"), Ok(dec!(3.2)));
        assert!(matches!(
            positive_price(Some(&json!(0)), "t"),
            Err(ProviderError::NotFound(_))
        ));
        assert!(matches!(
            positive_price(None, "t"),
            Err(ProviderError::DataShape(_))
        ));
    }
}
