use futures_util::StreamExt;
use serde::de::DeserializeOwned;

use crate::error::Stage;
use crate::{FalError, Result};

const MAX_ERROR_BODY_BYTES: usize = 64 * 1024;

pub(crate) async fn response_text_truncated(
    response: reqwest::Response,
    max_bytes: usize,
) -> String {
    let (bytes, truncated) = response_bytes_truncated(response, max_bytes).await;
    let mut body = String::from_utf8_lossy(&bytes).to_string();
    if truncated {
        if !body.is_empty() {
            body.push('\n');
        }
        body.push_str("...(truncated)");
    }
    body
}

async fn response_bytes_truncated(
    response: reqwest::Response,
    max_bytes: usize,
) -> (Vec<u8>, bool) {
    let max_bytes = max_bytes.max(1);
    let mut out = Vec::<u8>::new();
    let mut truncated = false;

    let mut stream = response.bytes_stream();
    while let Some(next) = stream.next().await {
        let Ok(chunk) = next else {
            break;
        };
        let remaining = max_bytes.saturating_sub(out.len());
        if remaining == 0 {
            truncated = true;
            break;
        }
        if chunk.len() <= remaining {
            out.extend_from_slice(chunk.as_ref());
        } else {
            out.extend_from_slice(&chunk.as_ref()[..remaining]);
            truncated = true;
            break;
        }
    }
    (out, truncated)
}

pub(crate) async fn send_checked(
    stage: Stage,
    req: reqwest::RequestBuilder,
) -> Result<reqwest::Response> {
    let response = req.send().await?;
    let status = response.status();
    if !status.is_success() {
        let body = response_text_truncated(response, MAX_ERROR_BODY_BYTES).await;
        return Err(FalError::Api {
            stage,
            status,
            body,
        });
    }
    Ok(response)
}

pub(crate) async fn send_checked_json<T: DeserializeOwned>(
    stage: Stage,
    req: reqwest::RequestBuilder,
) -> Result<T> {
    let response = send_checked(stage, req).await?;
    // Read as text first so a malformed body surfaces as a json error, not a transport one.
    let text = response.text().await?;
    Ok(serde_json::from_str::<T>(&text)?)
}

pub(crate) fn join_endpoint(base_url: &str, endpoint: &str) -> String {
    let base = base_url.trim_end_matches('/');
    let endpoint = endpoint.trim_start_matches('/');
    if endpoint.is_empty() {
        return base.to_string();
    }
    format!("{base}/{endpoint}")
}
