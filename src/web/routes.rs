//! HTTP route handlers.

use std::sync::Arc;

use axum::{
    extract::{Extension, Json},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use tracing::info;

use crate::AppState;

/// JSON error response helper, matching the scrape outcome shape.
fn err_response(status: StatusCode, msg: &str) -> impl IntoResponse {
    (
        status,
        Json(serde_json::json!({ "success": false, "error": msg })),
    )
}

/// Build the API router with all endpoints.
pub fn api_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/scrape", post(trigger_scrape))
        .layer(Extension(state))
}

async fn health() -> &'static str {
    "healthy server"
}

/// Runs one scrape. Concurrent triggers get a 409 instead of a second
/// browser, a run holds the gate for its whole duration.
async fn trigger_scrape(Extension(state): Extension<Arc<AppState>>) -> impl IntoResponse {
    let Ok(_gate) = state.scrape_gate.try_lock() else {
        return err_response(StatusCode::CONFLICT, "a scrape is already running").into_response();
    };

    info!("scrape triggered via web API");
    let outcome = state.scraper.run().await;
    let status = if outcome.is_success() {
        StatusCode::OK
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    (status, Json(outcome)).into_response()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::browser::fake::{FakeElement, FakePage, FakeSessionFactory};
    use crate::db::memory::MemoryTrendStore;
    use crate::login::LoginFlowConfig;
    use crate::scrape::{ScrapeConfig, Scraper};

    fn scripted_page() -> Arc<FakePage> {
        let page = FakePage::new().with_title("Log in to X");
        let phase = page.phase_handle();
        page.push_phase(vec![
            (
                r#"input[autocomplete="username"]"#,
                vec![Arc::new(FakeElement::new(""))],
            ),
            (
                r#"[role="button"]"#,
                vec![Arc::new(FakeElement::new("Next").advances(&phase))],
            ),
        ]);
        page.push_phase(vec![
            (
                r#"input[name="password"]"#,
                vec![Arc::new(FakeElement::new(""))],
            ),
            (
                r#"[role="button"]"#,
                vec![Arc::new(FakeElement::new("Log in").advances(&phase))],
            ),
        ]);
        page.push_phase(vec![(
            r#"[data-testid="trend"]"#,
            vec![Arc::new(FakeElement::new("row").with_children(
                r#"[dir="ltr"]"#,
                vec![Arc::new(FakeElement::new("#Topic"))],
            ))],
        )]);
        Arc::new(page)
    }

    async fn test_state(ip_uri: &str) -> Arc<AppState> {
        let config = ScrapeConfig {
            ip_endpoint: ip_uri.to_string(),
            navigation_timeout: Duration::from_millis(200),
            trends_timeout: Duration::from_millis(200),
            login: LoginFlowConfig {
                username: "scraper@example.com".to_string(),
                password: "hunter2".to_string(),
                field_timeout: Duration::from_millis(200),
                password_timeout: Duration::from_millis(200),
                verification_probe: Duration::from_millis(50),
                post_login_settle: Duration::from_millis(0),
                ..LoginFlowConfig::default()
            },
            ..ScrapeConfig::default()
        };
        let scraper = Scraper::new(
            config,
            Arc::new(FakeSessionFactory::new(scripted_page())),
            Arc::new(MemoryTrendStore::new()),
        );
        Arc::new(AppState::new(scraper))
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health_reports_healthy_server() {
        let server = MockServer::start().await;
        let app = api_router(test_state(&server.uri()).await);
        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"healthy server");
    }

    #[tokio::test]
    async fn test_scrape_endpoint_returns_stored_record() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ip": "203.0.113.7" })))
            .mount(&server)
            .await;

        let app = api_router(test_state(&server.uri()).await);
        let response = app
            .oneshot(Request::post("/scrape").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["trend1"], "#Topic");
        assert_eq!(body["data"]["ipAddress"], "203.0.113.7");
    }

    #[tokio::test]
    async fn test_concurrent_scrape_gets_conflict() {
        let server = MockServer::start().await;
        let state = test_state(&server.uri()).await;
        let _held = state.scrape_gate.lock().await;

        let app = api_router(state.clone());
        let response = app
            .oneshot(Request::post("/scrape").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::CONFLICT);
        let body = body_json(response).await;
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn test_failed_scrape_returns_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let app = api_router(test_state(&server.uri()).await);
        let response = app
            .oneshot(Request::post("/scrape").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert_eq!(body["success"], false);
    }
}
