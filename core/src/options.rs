//! Client configuration.
//!
//! `Options` can be built in code, deserialized from any serde format, or
//! read from `VKAPI_*` environment variables. Every field is optional.

use serde::Deserialize;

use crate::http::HttpMethod;

/// API version sent as `v` when none is configured.
pub const DEFAULT_VERSION: &str = "5.59";

/// Production endpoint host.
pub const DEFAULT_BASE_URL: &str = "https://api.vk.com";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Options {
    /// Sent as `access_token` unless the call already carries that key.
    /// An empty token counts as unset.
    pub access_token: Option<String>,
    /// Sent as `v`; falls back to `DEFAULT_VERSION`.
    pub version: Option<String>,
    pub base_url: String,
    pub http_method: HttpMethod,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            access_token: None,
            version: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            http_method: HttpMethod::Get,
        }
    }
}

impl Options {
    /// Read `VKAPI_ACCESS_TOKEN`, `VKAPI_VERSION` and `VKAPI_BASE_URL`,
    /// keeping defaults for unset variables.
    pub fn from_env() -> Self {
        let mut options = Self::default();
        if let Ok(token) = std::env::var("VKAPI_ACCESS_TOKEN") {
            options.access_token = Some(token);
        }
        if let Ok(version) = std::env::var("VKAPI_VERSION") {
            options.version = Some(version);
        }
        if let Ok(base_url) = std::env::var("VKAPI_BASE_URL") {
            options.base_url = base_url;
        }
        options
    }

    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_http_method(mut self, method: HttpMethod) -> Self {
        self.http_method = method;
        self
    }

    /// The configured token, if non-empty.
    pub fn access_token(&self) -> Option<&str> {
        self.access_token.as_deref().filter(|token| !token.is_empty())
    }

    pub fn version(&self) -> &str {
        self.version.as_deref().unwrap_or(DEFAULT_VERSION)
    }
}
