//! Low-level client core for the VK method-call API.
//!
//! # Overview
//! Turns typed request values into flat request parameters, builds
//! `HttpRequest` values for `https://api.vk.com/method/<name>`, and unwraps
//! the JSON envelope of the `HttpResponse` into a typed result or a
//! `RemoteError`. The network round-trip is delegated to a `Transport`
//! supplied by the caller (host-does-IO pattern).
//!
//! # Design
//! - `encode` projects any `Serialize` struct or map onto `Params`; serde
//!   attributes act as the field descriptors (name, skip, skip-if-empty).
//! - `VkClient` is stateless beyond its `Options` and splits each call into
//!   `build_exec` and `parse_exec`, so the I/O boundary is explicit.
//! - No API object schemas are defined here; callers declare only the
//!   fields they need.
//!
//! ```
//! use serde::Serialize;
//! use vkapi_core::{encode, is_empty, Options, VkClient};
//!
//! #[derive(Serialize)]
//! struct UsersGet {
//!     user_ids: Vec<u64>,
//!     #[serde(skip_serializing_if = "is_empty")]
//!     fields: Vec<&'static str>,
//!     #[serde(skip_serializing_if = "is_empty")]
//!     name_case: &'static str,
//! }
//!
//! let params = encode(&UsersGet {
//!     user_ids: vec![111, 222, 333],
//!     fields: vec!["first_name", "last_name", "screen_name"],
//!     name_case: "nom",
//! });
//! assert_eq!(
//!     params.encode(),
//!     "fields=first_name%2Clast_name%2Cscreen_name&name_case=nom&user_ids=111%2C222%2C333"
//! );
//!
//! let client = VkClient::new(Options::default());
//! let request = client.build_exec("users.get", params);
//! assert!(request.url.starts_with("https://api.vk.com/method/users.get?"));
//! ```

pub mod client;
pub mod encoder;
pub mod error;
pub mod http;
pub mod options;
pub mod params;

pub use client::VkClient;
pub use encoder::{encode, is_empty};
pub use error::{ApiError, Captcha, RemoteError};
pub use http::{HttpMethod, HttpRequest, HttpResponse, Transport, TransportError};
pub use options::{Options, DEFAULT_BASE_URL, DEFAULT_VERSION};
pub use params::Params;
