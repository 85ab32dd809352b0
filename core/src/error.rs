//! Error types for the API client.
//!
//! # Design
//! Three layers can fail and each keeps its own variant: the transport
//! (connection, TLS, I/O), the envelope decoder (body is not the expected
//! JSON), and the remote API itself (a well-formed `error` object). Nothing
//! is retried or reinterpreted on the way up.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::http::TransportError;
use crate::params::Params;

/// Errors returned by `VkClient`.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The HTTP round-trip failed before a response body was available.
    #[error("transport error: {0}")]
    Transport(#[source] TransportError),

    /// The response body is not a valid envelope for the expected type.
    #[error("malformed response: {0}")]
    Decode(#[from] serde_json::Error),

    /// The API answered with an `error` object.
    #[error(transparent)]
    Remote(#[from] RemoteError),
}

impl ApiError {
    /// The remote error, if the API rejected the call.
    pub fn remote(&self) -> Option<&RemoteError> {
        match self {
            ApiError::Remote(err) => Some(err),
            _ => None,
        }
    }

    pub fn is_captcha(&self) -> bool {
        self.remote().is_some_and(RemoteError::is_captcha)
    }

    pub fn is_auth_failed(&self) -> bool {
        self.remote().is_some_and(RemoteError::is_auth_failed)
    }

    pub fn is_rate_limited(&self) -> bool {
        self.remote().is_some_and(RemoteError::is_rate_limited)
    }
}

/// Error object reported by the API.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteError {
    #[serde(rename = "error_code")]
    pub code: u64,
    #[serde(rename = "error_msg")]
    pub message: String,

    /// Only set for `CAPTCHA_NEEDED`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub captcha_sid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub captcha_img: Option<String>,
}

impl RemoteError {
    pub const UNKNOWN: u64 = 1;
    pub const UNKNOWN_METHOD: u64 = 3;
    pub const AUTH_FAILED: u64 = 5;
    pub const TOO_MANY_REQUESTS: u64 = 6;
    pub const INVALID_REQUEST: u64 = 8;
    pub const CAPTCHA_NEEDED: u64 = 14;
    pub const ACCESS_DENIED: u64 = 15;
    pub const INVALID_PARAM: u64 = 100;

    pub fn new(code: u64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            ..Self::default()
        }
    }

    pub fn is_captcha(&self) -> bool {
        self.code == Self::CAPTCHA_NEEDED
    }

    pub fn is_auth_failed(&self) -> bool {
        self.code == Self::AUTH_FAILED
    }

    pub fn is_rate_limited(&self) -> bool {
        self.code == Self::TOO_MANY_REQUESTS
    }

    /// The captcha challenge, when the error carries one.
    pub fn captcha(&self) -> Option<Captcha> {
        let sid = self.captcha_sid.as_deref().filter(|sid| !sid.is_empty())?;
        Some(Captcha {
            sid: sid.to_string(),
            img: self.captcha_img.clone().unwrap_or_default(),
        })
    }
}

impl fmt::Display for RemoteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.captcha() {
            Some(captcha) => write!(
                f,
                "vkapi: {} ({}); captcha_sid: {}, captcha_img: {}",
                self.message, self.code, captcha.sid, captcha.img
            ),
            None => write!(f, "vkapi: {} ({})", self.message, self.code),
        }
    }
}

impl std::error::Error for RemoteError {}

/// Captcha challenge attached to a `CAPTCHA_NEEDED` error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Captcha {
    pub sid: String,
    pub img: String,
}

impl Captcha {
    /// Parameters to add to the repeated call once the user solved the
    /// captcha shown at `img`.
    pub fn answer(&self, key: impl Into<String>) -> Params {
        let mut params = Params::new();
        params.set("captcha_sid", self.sid.as_str());
        params.set("captcha_key", key);
        params
    }
}
