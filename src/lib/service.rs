//! HTTP endpoint that turns a description into a calculator definition.
use super::config::ServiceConfig;
use super::generator::schema::{ErrorResponse, GenerateResponse};
use super::generator::{Backend, Llm};
use super::loader;
use anyhow::Context;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, HeaderName, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

const GENERATION_FAILED: &str = "Failed to generate calculator";

#[derive(Clone, Default)]
pub struct AppState {
    /// `None` when no model API key is configured.
    pub backend: Option<Arc<dyn Backend>>,
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::POST, Method::OPTIONS])
        .allow_headers([
            header::AUTHORIZATION,
            HeaderName::from_static("x-client-info"),
            HeaderName::from_static("apikey"),
            header::CONTENT_TYPE,
        ]);
    Router::new()
        .route("/", post(generate_calculator).options(preflight))
        .route(
            "/generate-calculator",
            post(generate_calculator).options(preflight),
        )
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}

async fn preflight() -> StatusCode {
    StatusCode::OK
}

fn failure(status: StatusCode, body: ErrorResponse) -> Response {
    (status, Json(body)).into_response()
}

async fn generate_calculator(State(state): State<AppState>, body: Bytes) -> Response {
    let Some(backend) = state.backend else {
        error!("model API key not configured");
        return failure(
            StatusCode::INTERNAL_SERVER_ERROR,
            ErrorResponse::new("Model API key not configured"),
        );
    };

    let request: serde_json::Value = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => {
            warn!("request body is not JSON: {e}");
            return failure(
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorResponse::new(GENERATION_FAILED).with_details(e),
            );
        }
    };
    let Some(prompt) = request
        .get("prompt")
        .and_then(|p| p.as_str())
        .map(str::trim)
        .filter(|p| !p.is_empty())
    else {
        return failure(StatusCode::BAD_REQUEST, ErrorResponse::new("Prompt is required"));
    };

    info!("generating calculator for prompt: {prompt}");
    let calculator = match backend.generate(prompt).await {
        Ok(calculator) => calculator,
        Err(e) => {
            error!("fails to generate calculator: {e:#}");
            return failure(
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorResponse::new(GENERATION_FAILED).with_details(format!("{e:#}")),
            );
        }
    };
    if let Err(e) = loader::check_structure(&calculator) {
        error!("invalid calculator structure: {calculator:?}");
        return failure(
            StatusCode::INTERNAL_SERVER_ERROR,
            ErrorResponse::new(GENERATION_FAILED).with_details(e),
        );
    }

    info!("generated calculator `{}`", calculator.title);
    Json(GenerateResponse { calculator }).into_response()
}

/// Runs the endpoint until ctrl-c or SIGTERM.
pub async fn serve(config: ServiceConfig) -> anyhow::Result<()> {
    let backend: Option<Arc<dyn Backend>> = match config.model.api_key {
        Some(_) => Some(Arc::new(Llm::try_new(config.model.clone())?)),
        None => {
            warn!("`OPENAI_API_KEY` is not set: every generation request will fail");
            None
        }
    };
    let listener = TcpListener::bind(config.listen)
        .await
        .with_context(|| format!("fails to bind {}", config.listen))?;
    info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, router(AppState { backend }))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .with_context(|| "fails to serve the generation endpoint")?;
    info!("shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("fails to listen for ctrl-c: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("fails to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received ctrl-c"),
        _ = terminate => info!("received SIGTERM"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lib::config::ModelConfig;
    use crate::lib::field::Field;
    use crate::lib::generator::completion_api::tests::fake_provider;
    use crate::lib::generator::GeneratedCalculatorSpec;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    struct Fixed(Result<GeneratedCalculatorSpec, &'static str>);

    #[async_trait]
    impl Backend for Fixed {
        async fn generate(&self, _prompt: &str) -> anyhow::Result<GeneratedCalculatorSpec> {
            self.0.clone().map_err(|e| anyhow::anyhow!(e))
        }
    }

    fn doubler() -> GeneratedCalculatorSpec {
        GeneratedCalculatorSpec {
            title: "Doubler".to_string(),
            description: String::new(),
            fields: vec![Field::input("x", "X", 0.0), Field::output("y", "Y")],
            calculate_function: "return { y: values.x * 2 }".to_string(),
        }
    }

    fn state(reply: Result<GeneratedCalculatorSpec, &'static str>) -> AppState {
        AppState {
            backend: Some(Arc::new(Fixed(reply))),
        }
    }

    async fn call(state: AppState, uri: &str, body: &str) -> (StatusCode, serde_json::Value) {
        let request = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let response = router(state).oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn generates_on_both_paths() {
        for uri in ["/", "/generate-calculator"] {
            let (status, body) = call(state(Ok(doubler())), uri, r#"{"prompt":"double"}"#).await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body["calculator"]["title"], "Doubler");
            assert_eq!(body["calculator"]["calculateFunction"], "return { y: values.x * 2 }");
        }
    }
    #[tokio::test]
    async fn missing_key() {
        let (status, body) = call(AppState::default(), "/", r#"{"prompt":"double"}"#).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Model API key not configured");
    }
    #[tokio::test]
    async fn missing_prompt() {
        for body in [r#"{}"#, r#"{"prompt":""}"#, r#"{"prompt":"  "}"#, r#"{"prompt":3}"#] {
            let (status, body) = call(state(Ok(doubler())), "/", body).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(body["error"], "Prompt is required");
        }
    }
    #[tokio::test]
    async fn body_is_not_json() {
        let (status, body) = call(state(Ok(doubler())), "/", "prompt=double").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], GENERATION_FAILED);
        assert!(body["details"].is_string());
    }
    #[tokio::test]
    async fn model_failure_carries_details() {
        let (status, body) = call(state(Err("upstream 429")), "/", r#"{"prompt":"x"}"#).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], GENERATION_FAILED);
        assert_eq!(body["details"], "upstream 429");
    }
    #[tokio::test]
    async fn blank_title_is_rejected() {
        let mut reply = doubler();
        reply.title = String::new();
        let (status, body) = call(state(Ok(reply)), "/", r#"{"prompt":"x"}"#).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["details"], "generated calculator has no title");
    }
    #[tokio::test]
    async fn preflight_allows_any_origin() {
        let request = Request::builder()
            .method(Method::OPTIONS)
            .uri("/generate-calculator")
            .header(header::ORIGIN, "https://calcnest.test")
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
            .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "apikey")
            .body(Body::empty())
            .unwrap();
        let response = router(AppState::default()).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let headers = response.headers();
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        let allowed = headers[header::ACCESS_CONTROL_ALLOW_HEADERS].to_str().unwrap();
        assert!(allowed.contains("x-client-info"));
        assert!(allowed.contains("apikey"));
    }
    #[tokio::test]
    async fn end_to_end_with_a_model_provider() {
        let config: ModelConfig = fake_provider(
            r#"{"title": "Doubler", "fields": [{"name": "x", "label": "X"}], "calculateFunction": ""}"#,
        )
        .await;
        let state = AppState {
            backend: Some(Arc::new(Llm::try_new(config).unwrap())),
        };
        let (status, body) = call(state, "/", r#"{"prompt":"double"}"#).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["calculator"]["fields"][0]["name"], "x");
    }
}
