use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequestParts, State};
use axum::http::request::Parts;
use axum::http::{header, HeaderValue, Method};
use axum::routing::{get, post};
use axum::{Json, Router};
use axum_extra::headers::authorization::Bearer;
use axum_extra::headers::Authorization;
use axum_extra::TypedHeader;
use chrono::Utc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::auth::AuthService;
use crate::chat::Advisor;
use crate::error::AppError;
use crate::models::{
    ChatRequest, ChatResponse, ConsultRequest, HealthResponse, LoginRequest, LoginResponse,
    RegisterRequest, RegisterResponse,
};

pub struct AppState {
    pub auth: AuthService,
    pub advisor: Advisor,
}

/// Email of the caller, taken from a valid bearer token.
#[derive(Debug, Clone)]
pub struct AuthUser(pub String);

#[axum::async_trait]
impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<AppState>) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
                .await
                .map_err(|_| AppError::Auth("Not authenticated".to_string()))?;
        let email = state.auth.verify_token(bearer.token())?;
        Ok(AuthUser(email))
    }
}

pub fn router(state: Arc<AppState>, cors_origins: &[String]) -> Router {
    let origins: Vec<HeaderValue> = cors_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin {}", origin);
                None
            }
        })
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    Router::new()
        .route("/register", post(register_handler))
        .route("/login", post(login_handler))
        .route("/api/chat", post(chat_handler))
        .route("/api/consult", post(consult_handler))
        .route("/api/health", get(health_check))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn register_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<Json<RegisterResponse>, AppError> {
    let Json(request) = payload?;
    Ok(Json(state.auth.register(request).await?))
}

async fn login_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<LoginResponse>, AppError> {
    let Json(request) = payload?;
    Ok(Json(state.auth.login(request).await?))
}

async fn chat_handler(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, AppError> {
    let Json(request) = payload?;
    let answer = state.advisor.chat(&user, &request.question).await?;
    Ok(Json(ChatResponse { answer }))
}

async fn consult_handler(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    payload: Result<Json<ConsultRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, AppError> {
    let Json(request) = payload?;
    let answer = state
        .advisor
        .consult(&user, &request.question, &request.screenshot)
        .await?;
    Ok(Json(ChatResponse { answer }))
}

async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: Utc::now().to_rfc3339(),
        indexed_chunks: state.advisor.indexed_chunks(),
        vision_enabled: state.advisor.vision_enabled(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::{HistoryStore, InMemoryHistoryStore, Role};
    use crate::test_support::{auth_config, retriever, MemorySheets, StubGenerator};
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn app() -> Router {
        app_with_state().0
    }

    fn app_with_state() -> (Router, Arc<AppState>) {
        let state = Arc::new(AppState {
            auth: AuthService::new(auth_config(), Arc::new(MemorySheets::default())),
            advisor: Advisor::new(
                retriever(),
                Arc::new(InMemoryHistoryStore::default()),
                Arc::new(StubGenerator::replying("Start a SIP and stay invested.")),
                None,
            ),
        });
        (router(state.clone(), &["http://localhost:3000".to_string()]), state)
    }

    fn post_json(uri: &str, body: Value, token: Option<&str>) -> Request<Body> {
        let mut builder = Request::post(uri).header(header::CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    async fn call(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    #[tokio::test]
    async fn test_register_login_chat_flow() {
        let (app, state) = app_with_state();
        let creds = json!({ "Email": "a@x.com", "Password": "pw", "Name": "A" });

        let (status, body) = call(&app, post_json("/register", creds.clone(), None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["user"], json!({ "Name": "A", "Email": "a@x.com" }));

        let (status, body) = call(&app, post_json("/register", creds, None)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["detail"], "User already exists");

        let (status, body) = call(
            &app,
            post_json("/login", json!({ "Email": "a@x.com", "Password": "wrong" }), None),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["detail"], "Invalid credentials");

        let (status, body) = call(
            &app,
            post_json("/login", json!({ "Email": "a@x.com", "Password": "pw" }), None),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let token = body["token"].as_str().unwrap().to_string();

        let (status, body) = call(
            &app,
            post_json("/api/chat", json!({ "question": "What is SIP?" }), Some(&token)),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["answer"], "Start a SIP and stay invested.");

        let history = state.advisor.history().get("a@x.com").await;
        let roles: Vec<Role> = history.iter().map(|turn| turn.role).collect();
        assert_eq!(roles, vec![Role::User, Role::Assistant]);
        assert_eq!(history[0].content, "What is SIP?");
    }

    #[tokio::test]
    async fn test_chat_requires_valid_token() {
        let app = app();
        let question = json!({ "question": "What is SIP?" });

        let response = app
            .clone()
            .oneshot(post_json("/api/chat", question.clone(), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(response.headers()[header::WWW_AUTHENTICATE], "Bearer");

        let (status, body) = call(&app, post_json("/api/chat", question, Some("garbage"))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["detail"], "Could not validate credentials");
    }

    #[tokio::test]
    async fn test_malformed_json_is_bad_request_with_detail() {
        let app = app();
        let request = Request::post("/login")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{\"Email\": "))
            .unwrap();
        let (status, body) = call(&app, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["detail"].as_str().is_some_and(|d| !d.is_empty()));

        let (status, body) = call(&app, post_json("/register", json!({ "Email": "a@x.com" }), None)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["detail"].is_string());
    }

    #[tokio::test]
    async fn test_consult_without_vision_is_503() {
        let app = app();
        let token = AuthService::new(auth_config(), Arc::new(MemorySheets::default()))
            .generate_token("a@x.com")
            .unwrap();
        let (status, _) = call(
            &app,
            post_json("/api/consult", json!({ "question": "q", "screenshot": "abc" }), Some(&token)),
        )
        .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_health_reports_index() {
        let app = app();
        let request = Request::get("/api/health").body(Body::empty()).unwrap();
        let (status, body) = call(&app, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["indexed_chunks"], 5);
        assert_eq!(body["vision_enabled"], false);
    }

    #[tokio::test]
    async fn test_cors_preflight_allows_configured_origin() {
        let request = Request::builder()
            .method(Method::OPTIONS)
            .uri("/api/chat")
            .header(header::ORIGIN, "http://localhost:3000")
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
            .body(Body::empty())
            .unwrap();
        let response = app().oneshot(request).await.unwrap();
        assert_eq!(
            response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "http://localhost:3000"
        );
        assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_CREDENTIALS], "true");
    }
}
