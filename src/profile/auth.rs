use reqwest::header::{HeaderName, HeaderValue};

use crate::{FalError, Result};

use super::env::Env;

pub(crate) const DEFAULT_API_KEY_ENV: &[&str] = &["FAL_KEY", "FAL_API_KEY"];

/// `Authorization: Key <token>`, the scheme the fal.ai queue expects.
#[derive(Clone)]
pub(crate) struct HttpAuth {
    pub(crate) header: HeaderName,
    pub(crate) value: HeaderValue,
}

impl std::fmt::Debug for HttpAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpAuth")
            .field("header", &self.header)
            .field("value", &"<redacted>")
            .finish()
    }
}

impl HttpAuth {
    pub(crate) fn key(token: &str) -> Result<Self> {
        Self::header_value("authorization", Some("Key "), token)
    }

    pub(crate) fn header_value(header: &str, prefix: Option<&str>, token: &str) -> Result<Self> {
        let header = header.trim();
        if header.is_empty() {
            return Err(FalError::Config(
                "auth header name must be non-empty".to_string(),
            ));
        }

        let header = HeaderName::from_bytes(header.as_bytes()).map_err(|err| {
            FalError::Config(format!("invalid auth header name {header:?}: {err}"))
        })?;

        let mut out = String::new();
        if let Some(prefix) = prefix {
            out.push_str(prefix);
        }
        out.push_str(token.trim());
        let mut value = HeaderValue::from_str(&out).map_err(|err| FalError::InvalidSetting {
            name: "fal_ai_api_key",
            details: format!("not a valid header value: {err}"),
        })?;
        value.set_sensitive(true);

        Ok(Self { header, value })
    }

    pub(crate) fn apply(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        req.header(self.header.clone(), self.value.clone())
    }
}

/// Explicit key wins; otherwise the first populated env key. `None` sends no auth header.
pub(crate) fn resolve_api_key<S: AsRef<str>>(
    explicit: Option<&str>,
    env: &Env,
    keys: &[S],
) -> Option<String> {
    if let Some(key) = explicit.map(str::trim).filter(|key| !key.is_empty()) {
        return Some(key.to_string());
    }
    if keys.is_empty() {
        return env.first_of(DEFAULT_API_KEY_ENV);
    }
    env.first_of(keys)
}
