//! Verify encoding and build/parse against JSON test vectors stored in
//! `test-vectors/`.
//!
//! Each exec vector describes client options, call parameters, the expected
//! request, a simulated response, and either the expected result or the
//! expected remote error. Results are compared as parsed JSON so field
//! ordering never matters.

use vkapi_core::{encode, ApiError, HttpMethod, HttpResponse, Options, Params, RemoteError, VkClient};

/// Parse the method string from test vectors into `HttpMethod`.
fn parse_method(s: &str) -> HttpMethod {
    match s {
        "GET" => HttpMethod::Get,
        "POST" => HttpMethod::Post,
        other => panic!("unknown method: {other}"),
    }
}

// ---------------------------------------------------------------------------
// Encode
// ---------------------------------------------------------------------------

#[test]
fn encode_test_vectors() {
    let raw = include_str!("../../test-vectors/encode.json");
    let vectors: serde_json::Value = serde_json::from_str(raw).unwrap();

    for case in vectors["cases"].as_array().unwrap() {
        let name = case["name"].as_str().unwrap();
        let expected: Params = serde_json::from_value(case["expected"].clone()).unwrap();
        assert_eq!(encode(&case["input"]), expected, "{name}: params");
    }
}

// ---------------------------------------------------------------------------
// Exec
// ---------------------------------------------------------------------------

#[test]
fn exec_test_vectors() {
    let raw = include_str!("../../test-vectors/exec.json");
    let vectors: serde_json::Value = serde_json::from_str(raw).unwrap();

    for case in vectors["cases"].as_array().unwrap() {
        let name = case["name"].as_str().unwrap();
        let options: Options = serde_json::from_value(case["options"].clone()).unwrap();
        let params: Params = serde_json::from_value(case["params"].clone()).unwrap();
        let client = VkClient::new(options);

        // Verify build
        let expected_req = &case["expected_request"];
        let req = client.build_exec(case["method"].as_str().unwrap(), params);
        assert_eq!(req.method, parse_method(expected_req["method"].as_str().unwrap()), "{name}: method");
        assert_eq!(req.url, expected_req["url"].as_str().unwrap(), "{name}: url");
        assert_eq!(req.body.as_deref(), expected_req["body"].as_str(), "{name}: body");

        // Verify parse
        let sim = &case["simulated_response"];
        let response = HttpResponse {
            status: sim["status"].as_u64().unwrap() as u16,
            headers: Vec::new(),
            body: sim["body"].as_str().unwrap().to_string(),
        };
        let result = client.parse_exec::<serde_json::Value>(response);

        if let Some(expected_error) = case.get("expected_error") {
            let expected: RemoteError = serde_json::from_value(expected_error.clone()).unwrap();
            match result {
                Err(ApiError::Remote(err)) => assert_eq!(err, expected, "{name}: remote error"),
                other => panic!("{name}: expected remote error, got {other:?}"),
            }
        } else {
            assert_eq!(result.unwrap(), case["expected_result"], "{name}: parsed result");
        }
    }
}
