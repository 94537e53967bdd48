//! Kick API routes: map paths to upstream endpoints and shape the payloads.
//!
//! Every handler goes through [`Dispatcher`](crate::proxy::dispatcher::Dispatcher)
//! and turns a failed envelope into a user-facing error: 404 when Kick says the
//! resource does not exist, 401 when it rejects the session token, and a
//! generic 500 otherwise. Upstream error detail is logged, not returned.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::proxy::response::NormalizedResponse;
use crate::server::AppState;

/// Error body returned to API consumers.
#[derive(Debug, Serialize, PartialEq)]
pub struct ApiError {
    detail: String,
    status_code: u16,
}

impl ApiError {
    fn new(status: StatusCode, detail: impl Into<String>) -> Self {
        Self {
            detail: detail.into(),
            status_code: status.as_u16(),
        }
    }

    fn not_found(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, detail)
    }

    fn unauthorized(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, detail)
    }

    fn internal(action: &str) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Internal server error while {action}"),
        )
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self)).into_response()
    }
}

type ApiResult<T = Value> = Result<Json<T>, ApiError>;

/// Translate a failed envelope. `subject` names the missing resource for 404s.
fn upstream_failure(resp: &NormalizedResponse, subject: &str, action: &str) -> ApiError {
    if resp.status_code() == 404 {
        return ApiError::not_found(format!("{subject} not found"));
    }
    tracing::error!(
        status = resp.status_code(),
        error = resp.error().unwrap_or("-"),
        has_body = resp.data().is_some(),
        "Error {action}"
    );
    ApiError::internal(action)
}

/// Unwrap a successful envelope's data, or map the failure.
fn expect_data(resp: NormalizedResponse, subject: &str, action: &str) -> Result<Value, ApiError> {
    if !resp.is_success() {
        return Err(upstream_failure(&resp, subject, action));
    }
    Ok(resp.into_data().unwrap_or(Value::Null))
}

/// Channel slugs are embedded in the upstream path, so keep them to the
/// characters Kick itself allows.
fn channel_slug(name: &str) -> Result<&str, ApiError> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid {
        Ok(name)
    } else {
        Err(ApiError::not_found(format!("Channel '{name}' not found")))
    }
}

fn channel_subject(name: &str) -> String {
    format!("Channel '{name}'")
}

/// Read and validate `Authorization: Bearer <token>`.
fn session_token(headers: &HeaderMap) -> Result<&str, ApiError> {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| {
            ApiError::unauthorized("Session token is required. Format: 'Bearer your-token-here'")
        })?;

    if !token.starts_with("Bearer ") {
        return Err(ApiError::unauthorized(
            "Invalid session token format. Must start with 'Bearer'",
        ));
    }
    Ok(token)
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/v2/channels/{channel}/chatroom", get(chatroom))
        .route("/api/v2/channels/{channel}/chatroom/rules", get(chatroom_rules))
        .route("/api/v2/channels/{channel}/messages", get(messages))
        .route(
            "/api/v2/channels/{channel}/users/{user_id}/identity",
            get(user_identity),
        )
        .route("/api/v2/channels/{channel}/videos", get(videos))
        .route("/api/v2/channels/{channel}/clips", get(clips))
        .route("/api/v2/channels/{channel}/recent-categories", get(recent_categories))
        .route("/api/v2/channels/{channel}/leaderboards", get(leaderboards))
        .route("/api/v2/channels/{channel}/me", get(channel_me))
        .route("/api/v2/channels/{channel}/polls", get(polls))
        .route("/api/v2/channels/{channel}/info", get(channel_info))
        .route("/api/v2/messages/send/{chatroom_id}", post(send_message))
}

/// GET chatroom settings for a channel.
async fn chatroom(State(state): State<Arc<AppState>>, Path(channel): Path<String>) -> ApiResult {
    let channel = channel_slug(&channel)?;
    let resp = state
        .dispatcher
        .get(&format!("/api/v2/channels/{channel}/chatroom"), None)
        .await;
    Ok(Json(expect_data(resp, &channel_subject(channel), "fetching chatroom info")?))
}

/// GET chatroom rules, flattened to `{ "rules": "..." }`.
async fn chatroom_rules(
    State(state): State<Arc<AppState>>,
    Path(channel): Path<String>,
) -> ApiResult {
    let channel = channel_slug(&channel)?;
    let resp = state
        .dispatcher
        .get(&format!("/api/v2/channels/{channel}/chatroom/rules"), None)
        .await;
    let data = expect_data(resp, &channel_subject(channel), "fetching rules")?;
    Ok(Json(json!({ "rules": extract_rules(&data) })))
}

fn extract_rules(data: &Value) -> Value {
    match data.pointer("/data/rules") {
        Some(Value::String(s)) if !s.is_empty() => Value::String(s.clone()),
        Some(v) if !v.is_null() && v.as_str().is_none() => v.clone(),
        _ => Value::String(String::new()),
    }
}

#[derive(Debug, Deserialize)]
struct MessagesQuery {
    start_time: Option<String>,
}

/// GET recent chat messages, optionally only those after `start_time`.
async fn messages(
    State(state): State<Arc<AppState>>,
    Path(channel_id): Path<u64>,
    Query(query): Query<MessagesQuery>,
) -> ApiResult {
    let mut filters = serde_json::Map::new();
    if let Some(start_time) = query.start_time {
        filters.insert("start_time".to_string(), Value::String(start_time));
    }

    let resp = state
        .dispatcher
        .get_with_body(
            &format!("/api/v2/channels/{channel_id}/messages"),
            &Value::Object(filters),
        )
        .await;
    let data = expect_data(resp, &format!("Channel '{channel_id}'"), "fetching messages")?;
    Ok(Json(list_field(&data, "messages")))
}

/// `data[field]` if it is present, else an empty list.
fn list_field(data: &Value, field: &str) -> Value {
    data.get(field)
        .filter(|v| !v.is_null())
        .cloned()
        .unwrap_or_else(|| json!([]))
}

/// GET a user's identity (badges, color) within a channel.
async fn user_identity(
    State(state): State<Arc<AppState>>,
    Path((channel_id, user_id)): Path<(u64, u64)>,
) -> ApiResult {
    let resp = state
        .dispatcher
        .get(
            &format!("/api/v2/channels/{channel_id}/users/{user_id}/identity"),
            None,
        )
        .await;
    Ok(Json(expect_data(
        resp,
        &format!("User '{user_id}' in channel '{channel_id}'"),
        "fetching user identity",
    )?))
}

/// Past broadcast as exposed by this API.
#[derive(Debug, Serialize, PartialEq)]
pub struct Video {
    pub id: i64,
    pub title: String,
    pub url: String,
    pub thumbnail_url: String,
    /// Seconds (Kick reports milliseconds).
    pub duration: i64,
    pub views: i64,
    pub created_at: String,
}

fn shape_video(site: &str, channel: &str, raw: &Value) -> Option<Video> {
    let id = raw.get("id")?.as_i64()?;
    let duration_ms = match raw.get("duration")? {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.parse().ok()?,
        _ => return None,
    };
    Some(Video {
        id,
        title: raw
            .get("session_title")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        url: format!("{}/{channel}/video/{id}", site.trim_end_matches('/')),
        thumbnail_url: raw
            .pointer("/thumbnail/src")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        duration: (duration_ms as i64) / 1000,
        views: raw.get("views").and_then(Value::as_i64).unwrap_or(0),
        created_at: raw.get("created_at")?.as_str()?.replace('Z', "+00:00"),
    })
}

/// GET past broadcasts of a channel.
async fn videos(
    State(state): State<Arc<AppState>>,
    Path(channel): Path<String>,
) -> ApiResult<Vec<Video>> {
    let channel = channel_slug(&channel)?;
    let action = "fetching videos";
    let resp = state
        .dispatcher
        .get(&format!("/api/v2/channels/{channel}/videos"), None)
        .await;
    let data = expect_data(resp, &channel_subject(channel), action)?;

    let site = &state.dispatcher.config().target_base_url;
    let raw = data.as_array().map(Vec::as_slice).unwrap_or_default();
    let videos = raw
        .iter()
        .map(|v| shape_video(site, channel, v))
        .collect::<Option<Vec<_>>>()
        .ok_or_else(|| {
            tracing::error!(channel = %channel, "Unexpected video payload shape");
            ApiError::internal(action)
        })?;
    Ok(Json(videos))
}

#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
enum ClipSort {
    #[default]
    Views,
    Date,
    Trending,
}

#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
enum ClipWindow {
    #[serde(rename = "24h")]
    Day,
    #[serde(rename = "7d")]
    Week,
    #[serde(rename = "30d")]
    Month,
    #[default]
    #[serde(rename = "all")]
    All,
}

#[derive(Debug, Deserialize)]
struct ClipsQuery {
    #[serde(default)]
    sort: ClipSort,
    #[serde(default)]
    time: ClipWindow,
}

/// GET clips of a channel, sorted and filtered by time window.
async fn clips(
    State(state): State<Arc<AppState>>,
    Path(channel): Path<String>,
    Query(query): Query<ClipsQuery>,
) -> ApiResult {
    let channel = channel_slug(&channel)?;
    let resp = state
        .dispatcher
        .get_with_body(
            &format!("/api/v2/channels/{channel}/clips"),
            &json!({ "sort": query.sort, "time": query.time }),
        )
        .await;
    let data = expect_data(resp, &channel_subject(channel), "fetching clips")?;
    Ok(Json(list_field(&data, "clips")))
}

/// GET categories the channel streamed recently.
async fn recent_categories(
    State(state): State<Arc<AppState>>,
    Path(channel): Path<String>,
) -> ApiResult {
    let channel = channel_slug(&channel)?;
    let resp = state
        .dispatcher
        .get(&format!("/api/v2/channels/{channel}/recent-categories"), None)
        .await;
    Ok(Json(expect_data(
        resp,
        &channel_subject(channel),
        "fetching recent categories",
    )?))
}

/// GET gift leaderboards (all time, weekly, monthly).
async fn leaderboards(
    State(state): State<Arc<AppState>>,
    Path(channel): Path<String>,
) -> ApiResult {
    let channel = channel_slug(&channel)?;
    let resp = state
        .dispatcher
        .get(&format!("/api/v2/channels/{channel}/leaderboards"), None)
        .await;
    let data = expect_data(resp, &channel_subject(channel), "fetching leaderboards")?;
    Ok(Json(shape_leaderboards(&data)))
}

fn shape_leaderboards(data: &Value) -> Value {
    let enabled = |key: &str| data.get(key).and_then(Value::as_bool).unwrap_or(true);
    json!({
        "gifts": list_field(data, "gifts"),
        "gifts_enabled": enabled("gifts_enabled"),
        "gifts_week": list_field(data, "gifts_week"),
        "gifts_week_enabled": enabled("gifts_week_enabled"),
        "gifts_month": list_field(data, "gifts_month"),
        "gifts_month_enabled": enabled("gifts_month_enabled"),
    })
}

/// GET the caller's relationship with a channel. Forwards the session token
/// when one is supplied.
async fn channel_me(
    State(state): State<Arc<AppState>>,
    Path(channel): Path<String>,
    headers: HeaderMap,
) -> ApiResult {
    let channel = channel_slug(&channel)?;
    let auth = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());
    let resp = state
        .dispatcher
        .get(&format!("/api/v2/channels/{channel}/me"), auth)
        .await;
    if resp.status_code() == 401 {
        return Err(ApiError::unauthorized("Invalid or expired session token"));
    }
    Ok(Json(expect_data(
        resp,
        &channel_subject(channel),
        "fetching user channel info",
    )?))
}

/// GET the active poll. A channel without one answers `{ "polls": null }`.
async fn polls(State(state): State<Arc<AppState>>, Path(channel): Path<String>) -> ApiResult {
    let channel = channel_slug(&channel)?;
    let resp = state
        .dispatcher
        .get(&format!("/api/v2/channels/{channel}/polls"), None)
        .await;
    if resp.status_code() == 404 && resp.error().is_none() {
        return Ok(Json(json!({ "polls": null })));
    }
    Ok(Json(expect_data(resp, &channel_subject(channel), "fetching polls")?))
}

/// GET channel details: livestream state, owner, and so on.
async fn channel_info(
    State(state): State<Arc<AppState>>,
    Path(channel): Path<String>,
) -> ApiResult {
    let channel = channel_slug(&channel)?;
    let resp = state
        .dispatcher
        .get(&format!("/api/v2/channels/{channel}/info"), None)
        .await;
    Ok(Json(expect_data(
        resp,
        &channel_subject(channel),
        "fetching channel info",
    )?))
}

#[derive(Debug, Deserialize)]
struct OutgoingMessage {
    content: String,
    #[serde(rename = "type", default = "default_message_type")]
    kind: String,
}

impl OutgoingMessage {
    fn upstream_body(&self) -> Value {
        json!({"content": self.content, "type": self.kind})
    }
}

fn default_message_type() -> String {
    "message".to_string()
}

/// POST a chat message as the session token's owner.
async fn send_message(
    State(state): State<Arc<AppState>>,
    Path(chatroom_id): Path<u64>,
    headers: HeaderMap,
    Json(message): Json<OutgoingMessage>,
) -> ApiResult {
    let auth = session_token(&headers)?;
    let body = message.upstream_body();

    let resp = state
        .dispatcher
        .post(&format!("/api/v2/messages/send/{chatroom_id}"), Some(auth), &body)
        .await;
    if resp.status_code() == 401 {
        return Err(ApiError::unauthorized("Invalid or expired session token"));
    }
    Ok(Json(expect_data(
        resp,
        &format!("Chatroom '{chatroom_id}'"),
        "sending message",
    )?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DispatchConfig;
    use crate::proxy::dispatcher::Dispatcher;
    use crate::stats::ProxyStats;
    use axum::body::Body;
    use axum::http::Request;
    use std::time::Duration;
    use tower::ServiceExt;
    use wiremock::matchers::{body_json, header as header_eq, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn app_for(server: &MockServer) -> Router {
        Mock::given(path("/cookies"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "cookies": {"cf_clearance": "ok"},
                "user_agent": "test-agent"
            })))
            .mount(server)
            .await;

        let config = DispatchConfig {
            target_base_url: server.uri(),
            bypass_provider_url: "http://127.0.0.1".to_string(),
            bypass_provider_port: server.address().port(),
            backoff_step: Duration::from_millis(1),
            ..DispatchConfig::default()
        };
        let dispatcher = Dispatcher::new(config, ProxyStats::new()).unwrap();
        crate::server::router(Arc::new(AppState::new(Default::default(), dispatcher)))
    }

    async fn call(app: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    fn get_req(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[test]
    fn test_rules_extraction() {
        assert_eq!(
            extract_rules(&json!({"data": {"rules": "be nice"}})),
            json!("be nice")
        );
        assert_eq!(extract_rules(&json!({"data": {"rules": null}})), json!(""));
        assert_eq!(extract_rules(&json!({"data": {}})), json!(""));
        assert_eq!(extract_rules(&json!({})), json!(""));
    }

    #[test]
    fn test_video_shaping() {
        let raw = json!({
            "id": 77,
            "session_title": "late night",
            "thumbnail": {"src": "https://img/77.jpg"},
            "duration": 3_723_000,
            "views": 1200,
            "created_at": "2024-05-01T20:00:00Z"
        });
        let video = shape_video("https://kick.com/", "foo", &raw).unwrap();

        assert_eq!(
            video,
            Video {
                id: 77,
                title: "late night".to_string(),
                url: "https://kick.com/foo/video/77".to_string(),
                thumbnail_url: "https://img/77.jpg".to_string(),
                duration: 3723,
                views: 1200,
                created_at: "2024-05-01T20:00:00+00:00".to_string(),
            }
        );

        assert!(shape_video("https://kick.com", "foo", &json!({"id": 1})).is_none());
    }

    #[test]
    fn test_leaderboard_defaults() {
        let shaped = shape_leaderboards(&json!({"gifts": [{"user": "a"}], "gifts_week_enabled": false}));
        assert_eq!(shaped["gifts"], json!([{"user": "a"}]));
        assert_eq!(shaped["gifts_enabled"], json!(true));
        assert_eq!(shaped["gifts_week"], json!([]));
        assert_eq!(shaped["gifts_week_enabled"], json!(false));
        assert_eq!(shaped["gifts_month_enabled"], json!(true));
    }

    #[test]
    fn test_channel_slug_rejects_path_tricks() {
        assert!(channel_slug("xqc").is_ok());
        assert!(channel_slug("some_user-1").is_ok());
        assert!(channel_slug("a?b=c").is_err());
        assert!(channel_slug("..").is_err());
        assert!(channel_slug("").is_err());
    }

    #[test]
    fn test_session_token_validation() {
        let mut headers = HeaderMap::new();
        assert_eq!(session_token(&headers).unwrap_err().status_code, 401);

        headers.insert(header::AUTHORIZATION, "Token abc".parse().unwrap());
        assert!(session_token(&headers)
            .unwrap_err()
            .detail
            .contains("Must start with 'Bearer'"));

        headers.insert(header::AUTHORIZATION, "Bearer abc".parse().unwrap());
        assert_eq!(session_token(&headers).unwrap(), "Bearer abc");
    }

    #[tokio::test]
    async fn test_channel_info_passthrough() {
        let server = MockServer::start().await;
        Mock::given(path("/api/v2/channels/foo/info"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 1, "slug": "foo"})))
            .mount(&server)
            .await;

        let (status, body) = call(app_for(&server).await, get_req("/api/v2/channels/foo/info")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"id": 1, "slug": "foo"}));
    }

    #[tokio::test]
    async fn test_upstream_404_maps_to_not_found() {
        let server = MockServer::start().await;
        Mock::given(path("/api/v2/channels/ghost/info"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let (status, body) = call(app_for(&server).await, get_req("/api/v2/channels/ghost/info")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(
            body,
            json!({"detail": "Channel 'ghost' not found", "status_code": 404})
        );
    }

    #[tokio::test]
    async fn test_upstream_failure_is_generic_500() {
        let server = MockServer::start().await;
        Mock::given(path("/api/v2/channels/foo/leaderboards"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let (status, body) = call(
            app_for(&server).await,
            get_req("/api/v2/channels/foo/leaderboards"),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body["detail"],
            json!("Internal server error while fetching leaderboards")
        );
    }

    #[tokio::test]
    async fn test_polls_404_is_empty_result() {
        let server = MockServer::start().await;
        Mock::given(path("/api/v2/channels/foo/polls"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let (status, body) = call(app_for(&server).await, get_req("/api/v2/channels/foo/polls")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"polls": null}));
    }

    #[tokio::test]
    async fn test_clips_forward_filters() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v2/channels/foo/clips"))
            .and(body_json(json!({"sort": "date", "time": "7d"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"clips": [{"id": "c1"}]})))
            .expect(1)
            .mount(&server)
            .await;

        let (status, body) = call(
            app_for(&server).await,
            get_req("/api/v2/channels/foo/clips?sort=date&time=7d"),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!([{"id": "c1"}]));
    }

    #[tokio::test]
    async fn test_messages_default_to_empty_list() {
        let server = MockServer::start().await;
        Mock::given(path("/api/v2/channels/12/messages"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"cursor": null})))
            .mount(&server)
            .await;

        let (status, body) = call(app_for(&server).await, get_req("/api/v2/channels/12/messages")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!([]));
    }

    #[tokio::test]
    async fn test_send_message_requires_token() {
        let server = MockServer::start().await;
        let request = Request::builder()
            .method("POST")
            .uri("/api/v2/messages/send/5")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"content": "hello"}"#))
            .unwrap();

        let (status, body) = call(app_for(&server).await, request).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(
            body["detail"],
            json!("Session token is required. Format: 'Bearer your-token-here'")
        );
    }

    #[test]
    fn test_outgoing_message_body_keeps_type() {
        let default: OutgoingMessage = serde_json::from_value(json!({"content": "hi"})).unwrap();
        assert_eq!(default.upstream_body(), json!({"content": "hi", "type": "message"}));

        let reply: OutgoingMessage =
            serde_json::from_value(json!({"content": "hi", "type": "reply"})).unwrap();
        assert_eq!(reply.upstream_body(), json!({"content": "hi", "type": "reply"}));
    }

    #[tokio::test]
    async fn test_send_message_forwards_token_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v2/messages/send/5"))
            .and(header_eq("authorization", "Bearer tok"))
            .and(body_json(json!({"content": "hello", "type": "message"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {"id": "m1"}})))
            .expect(1)
            .mount(&server)
            .await;

        let request = Request::builder()
            .method("POST")
            .uri("/api/v2/messages/send/5")
            .header("content-type", "application/json")
            .header("authorization", "Bearer tok")
            .body(Body::from(r#"{"content": "hello"}"#))
            .unwrap();

        let (status, body) = call(app_for(&server).await, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"data": {"id": "m1"}}));
    }

    #[tokio::test]
    async fn test_send_message_rejected_token() {
        let server = MockServer::start().await;
        Mock::given(path("/api/v2/messages/send/5"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let request = Request::builder()
            .method("POST")
            .uri("/api/v2/messages/send/5")
            .header("content-type", "application/json")
            .header("authorization", "Bearer stale")
            .body(Body::from(r#"{"content": "hello", "type": "message"}"#))
            .unwrap();

        let (status, body) = call(app_for(&server).await, request).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["detail"], json!("Invalid or expired session token"));
    }
}
