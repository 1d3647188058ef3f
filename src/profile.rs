mod auth;
mod config;
mod env;
mod http;
mod settings;

pub(crate) use auth::{HttpAuth, resolve_api_key};
pub use config::{FalConfig, PollOverrides};
pub use env::{Env, parse_dotenv};
pub(crate) use http::{HTTP_TIMEOUT, build_http_client, default_http_client};
pub use settings::{ProviderSettings, SettingDefaults, UserSettings};
