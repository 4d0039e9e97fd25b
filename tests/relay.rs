use std::sync::Arc;

use axum::body::Body;
use axum::http::{HeaderMap, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use mediassist::config::{AppConfig, ClientConfig, FeaturesConfig, ServerConfig, UpstreamConfig};
use mediassist::relay::SYSTEM_PROMPT;
use mediassist::routing::dispatch_request;
use mediassist::state::AppState;
use parking_lot::Mutex;
use serde_json::{json, Value};

const SSE_BODY: &str = "data: {\"choices\":[{\"delta\":{\"content\":\"Headaches \"}}]}\n\n\
data: {\"choices\":[{\"delta\":{\"content\":\"can have many causes.\"}}]}\n\n\
data: [DONE]\n\n";

fn build_config(base_url: String, api_key: Option<&str>) -> AppConfig {
    AppConfig {
        server: ServerConfig::default(),
        upstream: UpstreamConfig {
            base_url,
            model: "google/gemini-2.5-flash".to_string(),
            api_key: api_key.map(str::to_string),
            api_key_env: "MEDIASSIST_RELAY_TEST_KEY_NOT_SET".to_string(),
        },
        client: ClientConfig {
            chat_url: "http://127.0.0.1:1/functions/v1/medical-chat".to_string(),
            publishable_key: String::new(),
            max_buffered_bytes: 1024 * 1024,
        },
        features: FeaturesConfig::default(),
    }
}

fn build_state(base_url: String, api_key: Option<&str>) -> Arc<AppState> {
    Arc::new(AppState::new(build_config(base_url, api_key)).expect("build state"))
}

async fn spawn_upstream(app: Router) -> (String, tokio::task::JoinHandle<()>) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind mock upstream");
    let addr = listener.local_addr().expect("local addr");
    let server = tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    (format!("http://{addr}/v1"), server)
}

fn chat_request(body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/functions/v1/medical-chat")
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(&body).expect("serialize request")))
        .expect("build request")
}

async fn dispatch(state: Arc<AppState>, request: Request<Body>) -> Response {
    dispatch_request(state, Arc::<str>::from("/functions/v1"), request)
        .await
        .expect("dispatch")
}

async fn json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read response body");
    serde_json::from_slice(&body).expect("json payload")
}

fn assert_cors(headers: &HeaderMap) {
    assert_eq!(headers["access-control-allow-origin"], "*");
    assert_eq!(
        headers["access-control-allow-headers"],
        "authorization, x-client-info, apikey, content-type"
    );
}

fn status_upstream(status: StatusCode) -> Router {
    Router::new().route(
        "/v1/chat/completions",
        post(move || async move {
            (status, Json(json!({"error": {"message": "upstream said no"}}))).into_response()
        }),
    )
}

#[tokio::test]
async fn test_relay_injects_system_prompt_and_streams_bytes_through() {
    let captured: Arc<Mutex<Option<(Value, Option<String>)>>> = Arc::new(Mutex::new(None));
    let capture = Arc::clone(&captured);
    let app = Router::new().route(
        "/v1/chat/completions",
        post(move |headers: HeaderMap, Json(body): Json<Value>| {
            let capture = Arc::clone(&capture);
            async move {
                let auth = headers
                    .get("authorization")
                    .and_then(|value| value.to_str().ok())
                    .map(str::to_string);
                *capture.lock() = Some((body, auth));
                ([("content-type", "text/event-stream")], SSE_BODY).into_response()
            }
        }),
    );
    let (base_url, server) = spawn_upstream(app).await;
    let state = build_state(base_url, Some("upstream-secret"));

    let response = dispatch(
        state,
        chat_request(json!({
            "messages": [{"role": "user", "content": "I have a headache"}]
        })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "text/event-stream");
    assert_cors(response.headers());

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read response body");
    assert_eq!(&body[..], SSE_BODY.as_bytes());

    let (upstream_body, auth) = captured.lock().take().expect("upstream was called");
    assert_eq!(auth.as_deref(), Some("Bearer upstream-secret"));
    assert_eq!(upstream_body["model"], "google/gemini-2.5-flash");
    assert_eq!(upstream_body["stream"], true);
    assert_eq!(
        upstream_body["messages"],
        json!([
            {"role": "system", "content": SYSTEM_PROMPT},
            {"role": "user", "content": "I have a headache"}
        ])
    );

    server.abort();
}

#[tokio::test]
async fn test_relay_maps_rate_limit() {
    let (base_url, server) = spawn_upstream(status_upstream(StatusCode::TOO_MANY_REQUESTS)).await;
    let response = dispatch(
        build_state(base_url, Some("k")),
        chat_request(json!({"messages": [{"role": "user", "content": "hi"}]})),
    )
    .await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_cors(response.headers());
    assert_eq!(
        json_body(response).await,
        json!({"error": "Rate limit exceeded. Please try again in a moment."})
    );
    server.abort();
}

#[tokio::test]
async fn test_relay_maps_credits_exhausted() {
    let (base_url, server) = spawn_upstream(status_upstream(StatusCode::PAYMENT_REQUIRED)).await;
    let response = dispatch(
        build_state(base_url, Some("k")),
        chat_request(json!({"messages": [{"role": "user", "content": "hi"}]})),
    )
    .await;
    assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);
    assert_cors(response.headers());
    assert_eq!(
        json_body(response).await,
        json!({"error": "AI service credits exhausted. Please contact support."})
    );
    server.abort();
}

#[tokio::test]
async fn test_relay_maps_other_upstream_failures_to_500() {
    let (base_url, server) = spawn_upstream(status_upstream(StatusCode::BAD_GATEWAY)).await;
    let response = dispatch(
        build_state(base_url, Some("k")),
        chat_request(json!({"messages": [{"role": "user", "content": "hi"}]})),
    )
    .await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_cors(response.headers());
    assert_eq!(json_body(response).await, json!({"error": "AI gateway error: 502"}));
    server.abort();
}

#[tokio::test]
async fn test_relay_without_api_key_is_not_configured() {
    let state = build_state("http://127.0.0.1:1/v1".to_string(), None);
    let response = dispatch(
        state,
        chat_request(json!({"messages": [{"role": "user", "content": "hi"}]})),
    )
    .await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_cors(response.headers());
    assert_eq!(json_body(response).await, json!({"error": "AI service not configured"}));
}

#[tokio::test]
async fn test_relay_rejects_malformed_body() {
    let state = build_state("http://127.0.0.1:1/v1".to_string(), Some("k"));
    let request = Request::builder()
        .method("POST")
        .uri("/functions/v1/medical-chat")
        .body(Body::from("{not json"))
        .expect("build request");
    let response = dispatch(state, request).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_cors(response.headers());
    let payload = json_body(response).await;
    assert!(payload["error"]
        .as_str()
        .is_some_and(|message| message.starts_with("Invalid request")));
}

#[tokio::test]
async fn test_relay_unreachable_upstream_is_500() {
    let state = build_state("http://127.0.0.1:1/v1".to_string(), Some("k"));
    let response = dispatch(
        state,
        chat_request(json!({"messages": [{"role": "user", "content": "hi"}]})),
    )
    .await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_cors(response.headers());
}

#[tokio::test]
async fn test_preflight_and_health() {
    let state = build_state("http://127.0.0.1:1/v1".to_string(), Some("k"));

    let preflight = Request::builder()
        .method("OPTIONS")
        .uri("/functions/v1/medical-chat")
        .body(Body::empty())
        .expect("build request");
    let response = dispatch(Arc::clone(&state), preflight).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_cors(response.headers());

    let health = Request::builder()
        .method("GET")
        .uri("/functions/v1")
        .body(Body::empty())
        .expect("build request");
    let response = dispatch(Arc::clone(&state), health).await;
    assert_eq!(response.status(), StatusCode::OK);
    let payload = json_body(response).await;
    assert_eq!(payload["status"], "mediassist relay is running");
    assert_eq!(payload["config"]["model"], "google/gemini-2.5-flash");
    assert_eq!(payload["config"]["api_key_configured"], true);

    let missing = Request::builder()
        .method("POST")
        .uri("/functions/v1/other")
        .body(Body::empty())
        .expect("build request");
    assert_eq!(dispatch(state, missing).await.status(), StatusCode::NOT_FOUND);
}
