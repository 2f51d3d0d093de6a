/// HTTP server setup and routing
use crate::{
    context::AppContext,
    error::{ApiError, ApiResult, ErrorResponse},
};
use axum::{
    http::{header, Method, StatusCode},
    response::Json,
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;

/// Build the main application router
/// Returns Router<()> because state is already provided
pub fn build_router(ctx: AppContext) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    Router::new()
        .merge(crate::api::routes(&ctx))
        // Provide state - converts Router<AppContext> to Router<()>
        .with_state(ctx)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .fallback(not_found)
}

/// 404 handler
async fn not_found() -> (StatusCode, Json<ErrorResponse>) {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse {
            status: StatusCode::NOT_FOUND.as_u16(),
            message: "Endpoint not found".to_string(),
        }),
    )
}

/// Start the HTTP server and run until Ctrl-C
pub async fn serve(ctx: AppContext) -> ApiResult<()> {
    let addr = format!("{}:{}", ctx.config.service.hostname, ctx.config.service.port);

    info!("Tasklane listening on {}", addr);
    info!("   Service URL: {}", ctx.service_url());

    let db = ctx.db.clone();
    let app = build_router(ctx);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| ApiError::Internal(format!("Failed to bind to {}: {}", addr, e)))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| ApiError::Internal(format!("Server error: {}", e)))?;

    db.close().await;
    info!("Server shut down gracefully");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to install Ctrl-C handler: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Received shutdown signal");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        api::middleware,
        auth::AuthenticatedUser,
        config::tests::test_config,
        crypto::AccessClaims,
        db,
    };
    use axum::{
        body::{to_bytes, Body},
        http::{HeaderMap, Request},
        middleware::from_fn_with_state,
        routing::get,
    };
    use chrono::Utc;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde_json::{json, Value};
    use std::sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    };
    use tower::ServiceExt;
    use uuid::Uuid;

    async fn test_app() -> (Router, AppContext) {
        let ctx = AppContext::with_pool(db::test_pool().await, test_config());
        (build_router(ctx.clone()), ctx)
    }

    async fn send(app: &Router, req: Request<Body>) -> (StatusCode, HeaderMap, Value) {
        let response = app.clone().oneshot(req).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, headers, body)
    }

    fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn credentials(username: &str) -> Value {
        json!({
            "username": username,
            "email": format!("{}@example.com", username),
            "password": "password123",
        })
    }

    async fn register(app: &Router, username: &str, role: &str) -> (StatusCode, Value) {
        let mut body = credentials(username);
        body["role"] = json!(role);
        let (status, _, body) = send(app, json_request("POST", "/api/register", body)).await;
        (status, body)
    }

    /// Log in and return (access token, `refreshToken=...` cookie pair)
    async fn login(app: &Router, username: &str) -> (String, String) {
        let (status, headers, body) =
            send(app, json_request("POST", "/api/login", credentials(username))).await;
        assert_eq!(status, StatusCode::OK, "{body}");

        let set_cookie = headers
            .get(header::SET_COOKIE)
            .unwrap()
            .to_str()
            .unwrap()
            .to_string();
        assert!(set_cookie.contains("HttpOnly"));
        let pair = set_cookie.split(';').next().unwrap().to_string();
        assert!(pair.starts_with("refreshToken="));

        let token = body["data"]["accessToken"].as_str().unwrap().to_string();
        (token, pair)
    }

    fn get_req(uri: &str, bearer: Option<&str>, cookie: Option<&str>) -> Request<Body> {
        with_auth("GET", uri, bearer, cookie)
    }

    fn with_auth(method: &str, uri: &str, bearer: Option<&str>, cookie: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = bearer {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let (app, _) = test_app().await;
        let (status, _, body) = send(&app, get_req("/health", None, None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");

        let (status, _, body) = send(&app, get_req("/health/ready", None, None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ready");
    }

    #[tokio::test]
    async fn test_unknown_route_uses_error_envelope() {
        let (app, _) = test_app().await;
        let (status, _, body) = send(&app, get_req("/nope", None, None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["status"], 404);
    }

    #[tokio::test]
    async fn test_session_lifecycle() {
        let (app, _) = test_app().await;

        let (status, body) = register(&app, "alice123", "BASIC").await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert!(body["data"]["id"].is_string());

        let (token, cookie) = login(&app, "alice123").await;
        assert!(!token.is_empty());

        let (status, _, body) = send(&app, get_req("/api/authentication", Some(&token), None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["username"], "alice123");
        assert_eq!(body["data"]["role"], "BASIC");
        assert!(body["data"].get("password").is_none());

        let (status, _, body) = send(&app, get_req("/api/refresh", None, Some(&cookie))).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["data"]["accessToken"].is_string());

        let (status, headers, _) =
            send(&app, with_auth("DELETE", "/api/logout", None, Some(&cookie))).await;
        assert_eq!(status, StatusCode::OK);
        let cleared = headers.get(header::SET_COOKIE).unwrap().to_str().unwrap();
        assert!(cleared.contains("Max-Age=0"));

        let (status, _, body) = send(&app, get_req("/api/refresh", None, Some(&cookie))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], "refresh token not found");
    }

    #[tokio::test]
    async fn test_refresh_without_cookie() {
        let (app, _) = test_app().await;
        let (status, _, body) = send(&app, get_req("/api/refresh", None, None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["message"], "No Cookie");
    }

    #[tokio::test]
    async fn test_second_admin_rejected() {
        let (app, _) = test_app().await;
        let (status, _) = register(&app, "admin01", "ADMIN").await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = register(&app, "admin02", "ADMIN").await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["message"], "admin is maximum one person");
    }

    #[tokio::test]
    async fn test_duplicate_email_conflicts() {
        let (app, _) = test_app().await;
        register(&app, "alice123", "BASIC").await;
        let (status, _) = register(&app, "alice123", "BASIC").await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_wrong_password_is_generic_bad_request() {
        let (app, _) = test_app().await;
        register(&app, "alice123", "BASIC").await;

        let mut body = credentials("alice123");
        body["password"] = json!("password999");
        let (status, _, body) = send(&app, json_request("POST", "/api/login", body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Email or Username or Password Wrong");
    }

    #[tokio::test]
    async fn test_malformed_json_is_bad_request() {
        let (app, _) = test_app().await;
        let req = Request::builder()
            .method("POST")
            .uri("/api/register")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let (status, _, body) = send(&app, req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["status"], 400);
    }

    #[tokio::test]
    async fn test_malformed_header_never_reaches_handler() {
        let ctx = AppContext::with_pool(db::test_pool().await, test_config());
        let reached = Arc::new(AtomicBool::new(false));
        let flag = reached.clone();

        let app: Router = Router::new()
            .route(
                "/probe",
                get(move |user: AuthenticatedUser| {
                    let flag = flag.clone();
                    async move {
                        flag.store(true, Ordering::SeqCst);
                        user.username
                    }
                }),
            )
            .route_layer(from_fn_with_state(ctx.clone(), middleware::authenticate))
            .with_state(ctx);

        let cases = [
            (None, StatusCode::UNAUTHORIZED),
            (Some(""), StatusCode::UNAUTHORIZED),
            (Some("token-only"), StatusCode::BAD_REQUEST),
            (Some("Bearer a b"), StatusCode::BAD_REQUEST),
        ];
        for (value, expected) in cases {
            let mut builder = Request::builder().uri("/probe");
            if let Some(value) = value {
                builder = builder.header(header::AUTHORIZATION, value);
            }
            let (status, _, _) = send(&app, builder.body(Body::empty()).unwrap()).await;
            assert_eq!(status, expected, "{value:?}");
        }
        assert!(!reached.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_expired_access_token_is_forbidden() {
        let (app, ctx) = test_app().await;
        let now = Utc::now().timestamp();
        let claims = AccessClaims {
            id: Uuid::new_v4(),
            username: "alice123".to_string(),
            email: "alice123@example.com".to_string(),
            iss: ctx.config.authentication.issuer.clone(),
            iat: now - 120,
            exp: now - 60,
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(ctx.config.authentication.jwt_secret.as_bytes()),
        )
        .unwrap();

        let (status, _, body) = send(&app, get_req("/api/authentication", Some(&token), None)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["message"], "token has expired");
    }

    #[tokio::test]
    async fn test_admin_gate_rejects_basic() {
        let (app, _) = test_app().await;
        register(&app, "alice123", "BASIC").await;
        let (token, cookie) = login(&app, "alice123").await;

        let (status, _, _) = send(&app, get_req("/api/admin/users", Some(&token), None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _, _) =
            send(&app, get_req("/api/moderator/users", Some(&token), Some(&cookie))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_moderator_needs_cookie() {
        let (app, _) = test_app().await;
        register(&app, "moder01", "MODERATOR").await;
        let (token, cookie) = login(&app, "moder01").await;

        let (status, _, _) = send(&app, get_req("/api/moderator/users", Some(&token), None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _, body) =
            send(&app, get_req("/api/moderator/users", Some(&token), Some(&cookie))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["pagination"]["data"], 1);
    }

    #[tokio::test]
    async fn test_admin_delete_and_restore() {
        let (app, _) = test_app().await;
        register(&app, "admin01", "ADMIN").await;
        let (_, body) = register(&app, "alice123", "BASIC").await;
        let alice = body["data"]["id"].as_str().unwrap().to_string();
        let (token, _) = login(&app, "admin01").await;
        let uri = format!("/api/admin/user/{}", alice);

        // Restoring a live account is a no-op success
        let (status, _, _) = send(&app, with_auth("PATCH", &uri, Some(&token), None)).await;
        assert_eq!(status, StatusCode::OK);

        let (status, _, _) = send(&app, with_auth("DELETE", &uri, Some(&token), None)).await;
        assert_eq!(status, StatusCode::OK);

        // Deleted accounts cannot log in
        let (status, _, _) =
            send(&app, json_request("POST", "/api/login", credentials("alice123"))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _, _) = send(&app, with_auth("PATCH", &uri, Some(&token), None)).await;
        assert_eq!(status, StatusCode::OK);
        login(&app, "alice123").await;

        let missing = format!("/api/admin/users?id={}&id={}", alice, Uuid::new_v4());
        let (status, _, _) = send(&app, with_auth("DELETE", &missing, Some(&token), None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_task_routes() {
        let (app, _) = test_app().await;
        let (_, body) = register(&app, "alice123", "BASIC").await;
        let alice = body["data"]["id"].as_str().unwrap().to_string();
        let (_, cookie) = login(&app, "alice123").await;

        let task = json!({
            "task_name": "write report",
            "description": "quarterly numbers",
            "due_date": { "year": 2030, "month": 2, "day": 28 },
            "priority": 1,
            "completed": false,
        });
        let uri = format!("/api/user/{}/todolist", alice);

        let mut req = json_request("POST", &uri, task.clone());
        req.headers_mut().insert(header::COOKIE, cookie.parse().unwrap());
        let (status, _, body) = send(&app, req).await;
        assert_eq!(status, StatusCode::OK, "{body}");
        let task_id = body["data"]["task_id"].as_i64().unwrap();

        let (status, _, body) =
            send(&app, get_req(&format!("{}/{}", uri, task_id), None, Some(&cookie))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["todolist"]["task_name"], "write report");

        let mut impossible = task.clone();
        impossible["due_date"]["day"] = json!(30);
        let mut req = json_request("POST", &uri, impossible);
        req.headers_mut().insert(header::COOKIE, cookie.parse().unwrap());
        let (status, _, _) = send(&app, req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let batch_uri = format!("/api/user/{}/todolists", alice);
        let mut req = json_request("POST", &batch_uri, json!({ "todo_list": [] }));
        req.headers_mut().insert(header::COOKIE, cookie.parse().unwrap());
        let (status, _, _) = send(&app, req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _, _) = send(
            &app,
            get_req(&format!("{}?page={}", uri, i64::MAX), None, Some(&cookie)),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _, body) = send(
            &app,
            get_req(&format!("/api/user/{}/todolist/s?search=_", alice), None, Some(&cookie)),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["pagination"]["data"], 0);

        // Without the cookie the gate refuses before the handler runs
        let (status, _, _) = send(&app, json_request("POST", &uri, task)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
}
