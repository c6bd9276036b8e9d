use super::schema::{GenerateRequest, GenerateResponse, GeneratedCalculatorSpec};
use super::Backend;
use crate::lib::config::EndpointConfig;
use anyhow::Context;
use async_trait::async_trait;
use reqwest::header::HeaderMap;
use tracing::info;

/// A remote generation endpoint speaking `{prompt}` → `{calculator}`.
#[derive(Clone, Debug)]
pub struct Endpoint {
    client: reqwest::Client,
    url: String,
    headers: HeaderMap,
}

impl Endpoint {
    pub fn try_new(config: &EndpointConfig) -> anyhow::Result<Self> {
        let mut headers = HeaderMap::new();
        if let Some(key) = &config.key {
            headers.insert("Authorization", format!("Bearer {key}").parse()?);
            headers.insert("apikey", key.parse()?);
        }
        Ok(Self {
            client: reqwest::Client::new(),
            url: config.url.clone(),
            headers,
        })
    }
}

#[async_trait]
impl Backend for Endpoint {
    async fn generate(&self, prompt: &str) -> anyhow::Result<GeneratedCalculatorSpec> {
        info!(target: "llm", "request calculator from {}", self.url);
        let response = self
            .client
            .post(&self.url)
            .headers(self.headers.clone())
            .json(&GenerateRequest {
                prompt: prompt.to_string(),
            })
            .send()
            .await
            .with_context(|| format!("fails to reach the endpoint {}", self.url))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("endpoint answered {status}: {body}");
        }
        let GenerateResponse { calculator } = response
            .json()
            .await
            .with_context(|| "fails to decode the endpoint response")?;
        Ok(calculator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderMap as RequestHeaders, StatusCode};
    use axum::routing::post;
    use axum::{Json, Router};

    async fn spawn(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, router).await });
        format!("http://{address}/generate-calculator")
    }

    fn endpoint(url: String, key: Option<&str>) -> Endpoint {
        Endpoint::try_new(&EndpointConfig {
            url,
            key: key.map(str::to_string),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn sends_prompt_and_keys() {
        let router = Router::new().route(
            "/generate-calculator",
            post(|headers: RequestHeaders, Json(request): Json<GenerateRequest>| async move {
                assert_eq!(headers["apikey"], "anon");
                assert_eq!(headers["authorization"], "Bearer anon");
                Json(serde_json::json!({
                    "calculator": {
                        "title": request.prompt,
                        "fields": [],
                        "calculateFunction": "return {}"
                    }
                }))
            }),
        );
        let url = spawn(router).await;
        let calculator = endpoint(url, Some("anon")).generate("Echo").await.unwrap();
        assert_eq!(calculator.title, "Echo");
    }

    #[tokio::test]
    async fn error_status_is_a_failure() {
        let router = Router::new().route(
            "/generate-calculator",
            post(|| async {
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(serde_json::json!({ "error": "Failed to generate calculator" })),
                )
            }),
        );
        let url = spawn(router).await;
        let error = endpoint(url, None).generate("x").await.unwrap_err();
        assert!(error.to_string().contains("500"));
    }

    #[tokio::test]
    async fn malformed_body_is_a_failure() {
        let router = Router::new().route(
            "/generate-calculator",
            post(|| async { Json(serde_json::json!({ "calculator": { "fields": 3 } })) }),
        );
        let url = spawn(router).await;
        assert!(endpoint(url, None).generate("x").await.is_err());
    }
}
