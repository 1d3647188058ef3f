use std::collections::BTreeMap;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

use crate::{FalError, Result};

/// Per-request timeout; polling time is bounded separately by the poll policy.
pub(crate) const HTTP_TIMEOUT: Duration = Duration::from_secs(60);

pub(super) fn header_map_from_pairs(headers: &BTreeMap<String, String>) -> Result<HeaderMap> {
    let mut out = HeaderMap::new();
    for (name, value) in headers {
        let name = name.trim();
        if name.is_empty() {
            continue;
        }
        let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|err| {
            FalError::Config(format!("invalid http header name {name:?}: {err}"))
        })?;

        let header_value = HeaderValue::from_str(value).map_err(|err| {
            FalError::Config(format!(
                "invalid http header value for {name:?} (value={value:?}): {err}"
            ))
        })?;

        out.insert(header_name, header_value);
    }
    Ok(out)
}

pub(crate) fn build_http_client(
    timeout: Duration,
    headers: &BTreeMap<String, String>,
) -> Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder().timeout(timeout);
    if !headers.is_empty() {
        builder = builder.default_headers(header_map_from_pairs(headers)?);
    }
    builder.build().map_err(FalError::Http)
}

pub(crate) fn default_http_client() -> Result<reqwest::Client> {
    build_http_client(HTTP_TIMEOUT, &BTreeMap::new())
}
