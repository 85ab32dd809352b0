use std::{collections::BTreeMap, sync::Arc};

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Form, Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::net::TcpListener;
use uuid::Uuid;

pub const UNKNOWN_METHOD: u64 = 3;
pub const AUTH_FAILED: u64 = 5;
pub const INVALID_REQUEST: u64 = 8;
pub const CAPTCHA_NEEDED: u64 = 14;
pub const INVALID_PARAM: u64 = 100;

/// Parameters of one call, every value kept in arrival order.
pub type Params = BTreeMap<String, Vec<String>>;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: u64,
    pub first_name: String,
    pub last_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screen_name: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestParam {
    pub key: String,
    pub value: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiError {
    pub error_code: u64,
    pub error_msg: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub captcha_sid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub captcha_img: Option<String>,
    #[serde(default)]
    pub request_params: Vec<RequestParam>,
}

/// Body of every JSON answer: exactly one of `response` or `error`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Envelope {
    Response(Value),
    Error(ApiError),
}

#[derive(Clone)]
struct AppState {
    access_token: Option<Arc<str>>,
    users: Arc<Vec<User>>,
}

/// Router that accepts any (or no) access token.
pub fn app() -> Router {
    router(None)
}

/// Router that rejects calls whose `access_token` differs from `token`.
pub fn app_with_token(token: &str) -> Router {
    router(Some(Arc::from(token)))
}

fn router(access_token: Option<Arc<str>>) -> Router {
    let state = AppState {
        access_token,
        users: Arc::new(seed_users()),
    };
    Router::new()
        .route("/method/{method}", get(call_query).post(call_form))
        .with_state(state)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

pub async fn run_with_token(listener: TcpListener, token: &str) -> Result<(), std::io::Error> {
    axum::serve(listener, app_with_token(token)).await
}

fn seed_users() -> Vec<User> {
    [
        (1, "Ada", "Lovelace", "ada"),
        (2, "Alan", "Turing", "alan"),
        (42, "FirstName", "LastName", "id42"),
    ]
    .into_iter()
    .map(|(id, first, last, screen)| User {
        id,
        first_name: first.to_string(),
        last_name: last.to_string(),
        screen_name: Some(screen.to_string()),
    })
    .collect()
}

async fn call_query(
    State(state): State<AppState>,
    Path(method): Path<String>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Response {
    dispatch(&state, &method, collect(pairs))
}

async fn call_form(
    State(state): State<AppState>,
    Path(method): Path<String>,
    Form(pairs): Form<Vec<(String, String)>>,
) -> Response {
    dispatch(&state, &method, collect(pairs))
}

fn collect(pairs: Vec<(String, String)>) -> Params {
    let mut params = Params::new();
    for (key, value) in pairs {
        params.entry(key).or_default().push(value);
    }
    params
}

fn last<'a>(params: &'a Params, key: &str) -> Option<&'a str> {
    params.get(key).and_then(|values| values.last()).map(String::as_str)
}

fn dispatch(state: &AppState, method: &str, params: Params) -> Response {
    tracing::info!(method, params = params.len(), "handling call");

    if method == "test.malformed" {
        return (StatusCode::BAD_GATEWAY, "<html>502 Bad Gateway</html>").into_response();
    }

    let envelope = match handle(state, method, &params) {
        Ok(response) => Envelope::Response(response),
        Err((code, msg)) => Envelope::Error(error(code, msg, &params)),
    };
    Json(envelope).into_response()
}

type Handled = Result<Value, (u64, String)>;

fn handle(state: &AppState, method: &str, params: &Params) -> Handled {
    if last(params, "v").map_or(true, str::is_empty) {
        return Err((INVALID_REQUEST, "Invalid request: v is required".to_string()));
    }
    if let Some(expected) = &state.access_token {
        if last(params, "access_token") != Some(&**expected) {
            return Err((
                AUTH_FAILED,
                "User authorization failed: invalid access_token".to_string(),
            ));
        }
    }

    match method {
        "utils.echo" => Ok(serde_json::json!(params)),
        "users.get" => users_get(state, params),
        "captcha.force" => captcha_force(params),
        _ => Err((UNKNOWN_METHOD, "Unknown method passed".to_string())),
    }
}

fn users_get(state: &AppState, params: &Params) -> Handled {
    let raw = last(params, "user_ids").filter(|ids| !ids.is_empty()).ok_or_else(|| {
        (
            INVALID_PARAM,
            "One of the parameters specified was missing or invalid: user_ids is undefined"
                .to_string(),
        )
    })?;
    let ids = raw
        .split(',')
        .map(|id| id.trim().parse::<u64>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|_| {
            (
                INVALID_PARAM,
                "One of the parameters specified was missing or invalid: invalid user id"
                    .to_string(),
            )
        })?;
    let with_screen_name = last(params, "fields")
        .is_some_and(|fields| fields.split(',').any(|field| field == "screen_name"));

    let users: Vec<User> = ids
        .iter()
        .filter_map(|id| state.users.iter().find(|user| user.id == *id))
        .map(|user| User {
            screen_name: user.screen_name.clone().filter(|_| with_screen_name),
            ..user.clone()
        })
        .collect();
    Ok(serde_json::json!(users))
}

fn captcha_force(params: &Params) -> Handled {
    let answered = last(params, "captcha_sid").is_some() && last(params, "captcha_key").is_some();
    if answered {
        Ok(Value::from(1))
    } else {
        Err((CAPTCHA_NEEDED, "Captcha needed".to_string()))
    }
}

fn error(code: u64, msg: String, params: &Params) -> ApiError {
    let (captcha_sid, captcha_img) = if code == CAPTCHA_NEEDED {
        let sid = Uuid::new_v4().simple().to_string();
        let img = format!("https://api.vk.com/captcha.php?sid={sid}&s=1");
        (Some(sid), Some(img))
    } else {
        (None, None)
    };
    let request_params = params
        .iter()
        .filter(|(key, _)| key.as_str() != "access_token")
        .flat_map(|(key, values)| {
            values.iter().map(move |value| RequestParam {
                key: key.clone(),
                value: value.clone(),
            })
        })
        .collect();
    ApiError {
        error_code: code,
        error_msg: msg,
        captcha_sid,
        captcha_img,
        request_params,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> Params {
        collect(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    fn state() -> AppState {
        AppState {
            access_token: None,
            users: Arc::new(seed_users()),
        }
    }

    #[test]
    fn envelope_serializes_as_single_branch() {
        let json = serde_json::to_value(Envelope::Response(Value::from(1))).unwrap();
        assert_eq!(json, serde_json::json!({ "response": 1 }));

        let err = error(42, "Test error".to_string(), &Params::new());
        let json = serde_json::to_value(Envelope::Error(err)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "error": { "error_code": 42, "error_msg": "Test error", "request_params": [] }
            })
        );
    }

    #[test]
    fn collect_keeps_repeated_values() {
        let params = params(&[("id", "1"), ("id", "2"), ("v", "5.59")]);
        assert_eq!(params["id"], vec!["1", "2"]);
        assert_eq!(last(&params, "id"), Some("2"));
    }

    #[test]
    fn version_is_required() {
        let err = handle(&state(), "utils.echo", &params(&[])).unwrap_err();
        assert_eq!(err.0, INVALID_REQUEST);
    }

    #[test]
    fn token_is_checked_when_configured() {
        let state = AppState {
            access_token: Some(Arc::from("secret")),
            ..state()
        };
        let err = handle(&state, "utils.echo", &params(&[("v", "5.59")])).unwrap_err();
        assert_eq!(err.0, AUTH_FAILED);
        let ok = handle(
            &state,
            "utils.echo",
            &params(&[("v", "5.59"), ("access_token", "secret")]),
        );
        assert!(ok.is_ok());
    }

    #[test]
    fn users_get_filters_and_projects() {
        let response = users_get(&state(), &params(&[("user_ids", "42,7,1")])).unwrap();
        let users: Vec<User> = serde_json::from_value(response).unwrap();
        assert_eq!(users.len(), 2);
        assert_eq!(users[0].id, 42);
        assert!(users[0].screen_name.is_none());

        let response = users_get(
            &state(),
            &params(&[("user_ids", "2"), ("fields", "photo_50,screen_name")]),
        )
        .unwrap();
        let users: Vec<User> = serde_json::from_value(response).unwrap();
        assert_eq!(users[0].screen_name.as_deref(), Some("alan"));
    }

    #[test]
    fn users_get_rejects_bad_ids() {
        let err = users_get(&state(), &params(&[("user_ids", "1,x")])).unwrap_err();
        assert_eq!(err.0, INVALID_PARAM);
        let err = users_get(&state(), &params(&[])).unwrap_err();
        assert_eq!(err.0, INVALID_PARAM);
    }

    #[test]
    fn captcha_error_carries_challenge_and_hides_token() {
        let params = params(&[("v", "5.59"), ("access_token", "secret")]);
        let err = error(CAPTCHA_NEEDED, "Captcha needed".to_string(), &params);
        let sid = err.captcha_sid.clone().unwrap();
        assert_eq!(sid.len(), 32);
        assert!(err.captcha_img.unwrap().contains(&sid));
        assert_eq!(
            err.request_params,
            vec![RequestParam {
                key: "v".to_string(),
                value: "5.59".to_string()
            }]
        );
    }
}
