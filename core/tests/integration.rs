//! End-to-end calls against the live mock server.
//!
//! # Design
//! Starts the mock server on a random port, then drives `VkClient` over real
//! HTTP with a ureq-backed `Transport`. Validates that parameter encoding,
//! default merging and envelope parsing agree with the server.

use serde::{Deserialize, Serialize};
use vkapi_core::{
    is_empty, ApiError, HttpMethod, HttpRequest, HttpResponse, Options, Params, Transport,
    TransportError, VkClient,
};

/// Executes `HttpRequest`s with ureq.
///
/// Status codes are not treated as errors, so every body reaches the
/// client's envelope parser.
struct UreqTransport {
    agent: ureq::Agent,
}

impl UreqTransport {
    fn new() -> Self {
        let agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .build()
            .new_agent();
        Self { agent }
    }
}

impl Transport for UreqTransport {
    fn send(&self, req: &HttpRequest) -> Result<HttpResponse, TransportError> {
        let mut response = match (req.method, &req.body) {
            (HttpMethod::Get, _) => self.agent.get(&req.url).call()?,
            (HttpMethod::Post, Some(body)) => {
                let mut builder = self.agent.post(&req.url);
                for (name, value) in &req.headers {
                    builder = builder.header(name.as_str(), value.as_str());
                }
                builder.send(body.as_bytes())?
            }
            (HttpMethod::Post, None) => self.agent.post(&req.url).send_empty()?,
        };

        let status = response.status().as_u16();
        let body = response.body_mut().read_to_string()?;
        Ok(HttpResponse {
            status,
            headers: Vec::new(),
            body,
        })
    }
}

/// Start the mock server on a random port and return its base URL.
fn spawn_server(token: Option<&'static str>) -> String {
    let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = std_listener.local_addr().unwrap();
    std_listener.set_nonblocking(true).unwrap();

    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let listener = tokio::net::TcpListener::from_std(std_listener).unwrap();
            match token {
                Some(token) => mock_server::run_with_token(listener, token).await,
                None => mock_server::run(listener).await,
            }
        })
        .unwrap();
    });

    format!("http://{addr}")
}

fn client(base_url: &str) -> VkClient {
    VkClient::new(
        Options::default()
            .with_base_url(base_url)
            .with_access_token("dummy_token"),
    )
}

#[derive(Serialize)]
struct SearchRequest {
    #[serde(rename = "bool_param")]
    flag: bool,
    #[serde(rename = "string_param")]
    string: String,
    #[serde(rename = "number_param")]
    number: u64,
    #[serde(rename = "repeated_param")]
    repeated: Vec<u64>,
    #[serde(rename = "empty_param", skip_serializing_if = "is_empty")]
    empty: String,
    #[serde(skip)]
    #[allow(dead_code)]
    omitted: String,
    #[serde(rename = "pointer_param")]
    pointer: Option<String>,
    #[serde(rename = "nil_param")]
    nil: Option<String>,
}

#[test]
fn echo_receives_encoded_struct_and_defaults() {
    let base = spawn_server(None);
    let transport = UreqTransport::new();

    let request = SearchRequest {
        flag: true,
        string: "string value".to_string(),
        number: 42,
        repeated: vec![1, 2, 3],
        empty: String::new(),
        omitted: "omitted".to_string(),
        pointer: Some("p".to_string()),
        nil: None,
    };

    let echoed: Params = client(&base)
        .call(&transport, "utils.echo", &request)
        .unwrap();

    let expected: Params = [
        ("access_token", "dummy_token"),
        ("bool_param", "1"),
        ("number_param", "42"),
        ("pointer_param", "p"),
        ("repeated_param", "1,2,3"),
        ("string_param", "string value"),
        ("v", "5.59"),
    ]
    .into_iter()
    .collect();
    assert_eq!(echoed, expected);
}

#[test]
fn cleared_token_is_not_sent() {
    let base = spawn_server(None);
    let transport = UreqTransport::new();

    let mut params = Params::new();
    params.clear_values("access_token");
    params.set("v", "5.131");
    let echoed: Params = client(&base).exec(&transport, "utils.echo", params).unwrap();

    assert!(!echoed.contains_key("access_token"));
    assert_eq!(echoed.get("v"), Some("5.131"));
}

#[test]
fn form_post_carries_params_in_body() {
    let base = spawn_server(None);
    let transport = UreqTransport::new();
    let client = VkClient::new(
        Options::default()
            .with_base_url(&base)
            .with_http_method(HttpMethod::Post),
    );

    let mut params = Params::new();
    params.set("message", "hello, world");
    let echoed: Params = client.exec(&transport, "utils.echo", params).unwrap();

    assert_eq!(echoed.get("message"), Some("hello, world"));
    assert_eq!(echoed.get("v"), Some("5.59"));
}

#[derive(Serialize)]
struct UsersGet<'a> {
    user_ids: &'a [u64],
    #[serde(skip_serializing_if = "is_empty")]
    fields: Vec<&'a str>,
}

#[derive(Debug, Deserialize, PartialEq)]
struct User {
    id: u64,
    first_name: String,
    last_name: String,
    #[serde(default)]
    screen_name: Option<String>,
}

#[test]
fn users_get_decodes_typed_response() {
    let base = spawn_server(None);
    let transport = UreqTransport::new();
    let client = client(&base);

    let users: Vec<User> = client
        .call(
            &transport,
            "users.get",
            &UsersGet {
                user_ids: &[42, 2],
                fields: vec!["screen_name"],
            },
        )
        .unwrap();
    assert_eq!(users.len(), 2);
    assert_eq!(users[0].id, 42);
    assert_eq!(users[0].first_name, "FirstName");
    assert_eq!(users[1].screen_name.as_deref(), Some("alan"));

    let users: Vec<User> = client
        .call(
            &transport,
            "users.get",
            &UsersGet {
                user_ids: &[1],
                fields: Vec::new(),
            },
        )
        .unwrap();
    assert_eq!(users[0].last_name, "Lovelace");
    assert!(users[0].screen_name.is_none());
}

#[test]
fn remote_errors_are_structured() {
    let base = spawn_server(None);
    let transport = UreqTransport::new();
    let client = client(&base);

    let err = client
        .exec::<serde_json::Value, _>(&transport, "does.notExist", Params::new())
        .unwrap_err();
    let remote = err.remote().expect("remote error");
    assert_eq!(remote.code, 3);
    assert_eq!(err.to_string(), "vkapi: Unknown method passed (3)");

    let err = client
        .exec::<Vec<User>, _>(&transport, "users.get", Params::new())
        .unwrap_err();
    assert_eq!(err.remote().map(|remote| remote.code), Some(100));
}

#[test]
fn captcha_challenge_can_be_answered() {
    let base = spawn_server(None);
    let transport = UreqTransport::new();
    let client = client(&base);

    let err = client
        .exec::<u32, _>(&transport, "captcha.force", Params::new())
        .unwrap_err();
    assert!(err.is_captcha());
    let captcha = err.remote().and_then(|remote| remote.captcha()).unwrap();
    assert!(captcha.img.contains(&captcha.sid));
    assert!(err.to_string().contains(&captcha.sid));

    let answer = captcha.answer("abc");
    let result: u32 = client.exec(&transport, "captcha.force", answer).unwrap();
    assert_eq!(result, 1);
}

#[test]
fn access_token_is_checked_by_server() {
    let base = spawn_server(Some("secret"));
    let transport = UreqTransport::new();

    let err = client(&base)
        .exec::<Params, _>(&transport, "utils.echo", Params::new())
        .unwrap_err();
    assert!(err.is_auth_failed());

    let client = VkClient::new(
        Options::default()
            .with_base_url(&base)
            .with_access_token("secret"),
    );
    let echoed: Params = client.exec(&transport, "utils.echo", Params::new()).unwrap();
    assert_eq!(echoed.get("access_token"), Some("secret"));
}

#[test]
fn malformed_body_is_a_decode_error() {
    let base = spawn_server(None);
    let transport = UreqTransport::new();

    let err = client(&base)
        .exec::<serde_json::Value, _>(&transport, "test.malformed", Params::new())
        .unwrap_err();
    assert!(matches!(err, ApiError::Decode(_)));
}

#[test]
fn unreachable_server_is_a_transport_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = client(&format!("http://{addr}"))
        .exec::<serde_json::Value, _>(&UreqTransport::new(), "utils.echo", Params::new())
        .unwrap_err();
    assert!(matches!(err, ApiError::Transport(_)));
}
