//! Request builder and envelope parser for API method calls.
//!
//! # Design
//! `VkClient` holds only its `Options` and carries no mutable state between
//! calls. A call is split into `build_exec`, which merges the configured
//! defaults into the parameters and produces an `HttpRequest`, and
//! `parse_exec`, which unwraps the `{"error": ...}` / `{"response": ...}`
//! envelope of an `HttpResponse`. `exec` and `call` chain the two around a
//! caller-supplied `Transport`; failures are returned once, never retried.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::form_urlencoded;

use crate::encoder::encode;
use crate::error::{ApiError, RemoteError};
use crate::http::{HttpMethod, HttpRequest, HttpResponse, Transport};
use crate::options::Options;
use crate::params::Params;

const METHOD_PREFIX: &str = "/method/";
const ACCESS_TOKEN: &str = "access_token";
const VERSION: &str = "v";
const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Percent-encode `method` as a single path segment.
fn method_segment(method: &str) -> String {
    form_urlencoded::byte_serialize(method.trim_start_matches('/').as_bytes())
        .map(|chunk| if chunk == "+" { "%20" } else { chunk })
        .collect()
}

#[derive(Deserialize)]
struct Envelope<T> {
    error: Option<RemoteError>,
    response: Option<T>,
}

/// Stateless client for the method-call API.
#[derive(Debug, Clone, Default)]
pub struct VkClient {
    options: Options,
}

impl VkClient {
    pub fn new(mut options: Options) -> Self {
        options.base_url = options.base_url.trim_end_matches('/').to_string();
        Self { options }
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Build the request for `method`.
    ///
    /// `access_token` and `v` are added only when `params` has no such key.
    /// A key present with no values counts, so clearing it keeps the
    /// default off the wire.
    pub fn build_exec(&self, method: &str, mut params: Params) -> HttpRequest {
        if let Some(token) = self.options.access_token() {
            params.set_default(ACCESS_TOKEN, token);
        }
        params.set_default(VERSION, self.options.version());

        let url = format!(
            "{}{}{}",
            self.options.base_url,
            METHOD_PREFIX,
            method_segment(method)
        );
        let encoded = params.encode();

        match self.options.http_method {
            HttpMethod::Get => HttpRequest {
                method: HttpMethod::Get,
                url: if encoded.is_empty() {
                    url
                } else {
                    format!("{url}?{encoded}")
                },
                headers: Vec::new(),
                body: None,
            },
            HttpMethod::Post => HttpRequest {
                method: HttpMethod::Post,
                url,
                headers: vec![("content-type".to_string(), FORM_CONTENT_TYPE.to_string())],
                body: Some(encoded),
            },
        }
    }

    /// `build_exec` with parameters encoded from a struct or map.
    pub fn build_call<P: Serialize + ?Sized>(&self, method: &str, params: &P) -> HttpRequest {
        self.build_exec(method, encode(params))
    }

    /// Unwrap the response envelope.
    ///
    /// The HTTP status is not consulted: the API reports failures inside the
    /// envelope. A missing `response` is decoded from `null`, which suits
    /// `()`, `Option<_>` and `serde_json::Value` targets.
    pub fn parse_exec<T: DeserializeOwned>(&self, response: HttpResponse) -> Result<T, ApiError> {
        let envelope: Envelope<T> = serde_json::from_str(&response.body)?;
        if let Some(err) = envelope.error {
            return Err(ApiError::Remote(err));
        }
        match envelope.response {
            Some(value) => Ok(value),
            None => Ok(T::deserialize(serde_json::Value::Null)?),
        }
    }

    /// Call `method` over `transport`.
    pub fn exec<T, X>(&self, transport: &X, method: &str, params: Params) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        X: Transport + ?Sized,
    {
        let request = self.build_exec(method, params);
        debug!(method, http_method = ?request.method, "calling API method");

        let response = transport.send(&request).map_err(ApiError::Transport)?;
        self.parse_exec(response).inspect_err(|err| {
            if let Some(remote) = err.remote() {
                debug!(method, code = remote.code, "API method returned an error");
            }
        })
    }

    /// `exec` with parameters encoded from a struct or map.
    pub fn call<T, P, X>(&self, transport: &X, method: &str, params: &P) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        P: Serialize + ?Sized,
        X: Transport + ?Sized,
    {
        self.exec(transport, method, encode(params))
    }
}
