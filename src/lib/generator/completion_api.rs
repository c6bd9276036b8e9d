use super::prompt::Prompt;
use super::schema::GeneratedCalculatorSpec;
use super::Backend;
use crate::lib::config::ModelConfig;
use anyhow::Context;
use async_trait::async_trait;
use reqwest::header::HeaderMap;
use schemars::schema_for;
use schemars::JsonSchema;
use serde::Deserialize;
use serde::Serialize;
use tracing::info;

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone)]
pub struct MessageOut {
    role: String,
    content: String,
}

impl MessageOut {
    pub fn new_system(content: String) -> MessageOut {
        MessageOut {
            role: "system".to_string(),
            content,
        }
    }
    pub fn new_user(content: String) -> MessageOut {
        MessageOut {
            role: "user".to_string(),
            content,
        }
    }
}

#[derive(Serialize, Debug, Default, Clone)]
#[serde(rename_all = "snake_case")]
enum OpenAIResponseFormatOptions {
    #[default]
    JsonSchema,
}

#[derive(Serialize, Debug, Clone)]
pub struct OpenAIJsonSchema {
    name: String,
    schema: schemars::schema::RootSchema,
    strict: bool,
}

impl OpenAIJsonSchema {
    /// Non-strict: strict mode would require every optional member.
    pub fn new<T: JsonSchema>() -> Self {
        let schema = schema_for!(T);
        let name = schema
            .schema
            .metadata
            .as_ref()
            .and_then(|meta| meta.title.clone())
            .unwrap_or_default();
        Self {
            name,
            schema,
            strict: false,
        }
    }
}

#[derive(Serialize, Debug, Clone)]
pub struct OpenAIResponseFormat {
    r#type: OpenAIResponseFormatOptions,
    json_schema: OpenAIJsonSchema,
}

impl OpenAIResponseFormat {
    pub fn json<T: JsonSchema>() -> Self {
        Self {
            r#type: OpenAIResponseFormatOptions::JsonSchema,
            json_schema: OpenAIJsonSchema::new::<T>(),
        }
    }
}

#[derive(Serialize, Debug, Default, Clone)]
pub struct CompletionParameters {
    pub model: String,
    pub messages: Vec<MessageOut>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_format: Option<OpenAIResponseFormat>,
}

#[derive(Serialize, Deserialize, Debug)]
pub(super) struct MessageReceived {
    pub(super) role: String,
    #[serde(default)]
    pub(super) content: String,
}

#[derive(Serialize, Deserialize, Debug)]
pub(super) struct CompletionChoice {
    #[serde(default)]
    pub(super) index: usize,
    pub(super) message: MessageReceived,
    pub(super) finish_reason: Option<String>,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct CompletionResponse {
    pub(super) choices: Vec<CompletionChoice>,
}

impl CompletionResponse {
    pub fn contents(&self) -> impl Iterator<Item = &str> + '_ {
        self.choices.iter().map(|c| c.message.content.as_str())
    }

    /// Content of the first choice with a surrounding markdown fence removed.
    pub fn extract_json(&self) -> Option<String> {
        let content = self.contents().next()?;
        let trimmed = content.trim();
        if !trimmed.starts_with("```") {
            return Some(trimmed.to_string());
        }
        let inner = trimmed
            .lines()
            .skip(1)
            .map_while(|line| (line.trim_end() != "```").then_some(line))
            .fold(String::new(), |mut acc, line| {
                acc.push_str(line);
                acc.push('\n');
                acc
            });
        Some(inner)
    }
}

/// Chat-completion client for an OpenAI compatible provider.
#[derive(Clone, Debug)]
pub struct Llm {
    client: reqwest::Client,
    headers: HeaderMap,
    config: ModelConfig,
}

impl Llm {
    pub fn try_new(config: ModelConfig) -> anyhow::Result<Self> {
        let token = config
            .api_key
            .as_deref()
            .with_context(|| "fails to find the model API key `OPENAI_API_KEY`")?;
        let mut headers = HeaderMap::new();
        headers.insert("Authorization", format!("Bearer {token}").parse()?);
        Ok(Self {
            client: reqwest::Client::new(),
            headers,
            config,
        })
    }

    pub async fn model_complete(
        &self,
        parameters: &CompletionParameters,
    ) -> anyhow::Result<CompletionResponse> {
        let url = format!("{}/chat/completions", self.config.base_url);
        let response = self
            .client
            .post(&url)
            .json(parameters)
            .headers(self.headers.clone())
            .send()
            .await
            .with_context(|| format!("fails to reach the model provider at {url}"))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("model provider answered {status}: {body}");
        }
        let response_json = response
            .json()
            .await
            .with_context(|| "fails to decode the completion response")?;
        Ok(response_json)
    }

    fn parameters(&self, prompt: &Prompt) -> CompletionParameters {
        CompletionParameters {
            model: self.config.model.clone(),
            messages: prompt.to_llm_messages(),
            temperature: Some(self.config.temperature),
            max_tokens: Some(self.config.max_tokens),
            response_format: Some(OpenAIResponseFormat::json::<GeneratedCalculatorSpec>()),
        }
    }
}

#[async_trait]
impl Backend for Llm {
    async fn generate(&self, prompt: &str) -> anyhow::Result<GeneratedCalculatorSpec> {
        info!(target: "llm", "prompt: {prompt}");
        let parameters = self.parameters(&Prompt::for_calculator(prompt));
        let response = self.model_complete(&parameters).await?;
        let content = response
            .extract_json()
            .with_context(|| "fails to find a choice in the completion response")?;
        info!(target: "llm", "generated content: {content}");
        let calculator = serde_json::from_str(&content)
            .with_context(|| "fails to parse the generated calculator")?;
        Ok(calculator)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use axum::http::HeaderMap as RequestHeaders;
    use axum::routing::post;
    use axum::{Json, Router};

    impl CompletionResponse {
        pub(crate) fn new(content: String) -> Self {
            CompletionResponse {
                choices: vec![CompletionChoice {
                    index: 0,
                    message: MessageReceived {
                        role: "assistant".to_string(),
                        content,
                    },
                    finish_reason: Some("stop".to_string()),
                }],
            }
        }
    }

    /// A loopback chat-completion provider that always replies `content`.
    pub(crate) async fn fake_provider(content: &'static str) -> ModelConfig {
        let router = Router::new().route(
            "/v1/chat/completions",
            post(move |headers: RequestHeaders, Json(body): Json<serde_json::Value>| async move {
                assert_eq!(headers["authorization"], "Bearer sk-test");
                assert_eq!(body["model"], "gpt-4o-mini");
                assert_eq!(body["max_tokens"], 1000);
                assert_eq!(body["messages"][1]["role"], "user");
                Json(serde_json::json!({
                    "id": "chatcmpl-1",
                    "object": "chat.completion",
                    "choices": [{
                        "index": 0,
                        "message": { "role": "assistant", "content": content },
                        "finish_reason": "stop"
                    }]
                }))
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, router).await });
        ModelConfig {
            api_key: Some("sk-test".to_string()),
            base_url: format!("http://{address}/v1"),
            ..Default::default()
        }
    }

    #[test]
    fn extract_fenced_json() {
        let res = CompletionResponse::new("```json\n{ \"title\": \"T\" }\n```".to_string());
        assert_eq!(res.extract_json().unwrap(), "{ \"title\": \"T\" }\n");
        let res = CompletionResponse::new("  { \"title\": \"T\" }\n".to_string());
        assert_eq!(res.extract_json().unwrap(), "{ \"title\": \"T\" }");
    }
    #[test]
    fn missing_key_is_an_error() {
        assert!(Llm::try_new(ModelConfig::default()).is_err());
    }
    #[test]
    fn request_carries_schema_and_sampling() {
        let llm = Llm::try_new(ModelConfig {
            api_key: Some("sk-test".to_string()),
            ..Default::default()
        })
        .unwrap();
        let parameters = llm.parameters(&Prompt::for_calculator("tip calculator"));
        let body = serde_json::to_value(&parameters).unwrap();
        assert_eq!(body["model"], "gpt-4o-mini");
        assert_eq!(body["temperature"].as_f64().map(|t| (t * 10.0).round()), Some(3.0));
        assert_eq!(body["response_format"]["type"], "json_schema");
        assert_eq!(body["response_format"]["json_schema"]["name"], "calculator");
        assert_eq!(body["messages"][1]["content"], "tip calculator");
    }
    #[tokio::test]
    async fn generate_through_a_provider() {
        let config = fake_provider(
            "```json\n{\"title\": \"Doubler\", \"fields\": [{\"name\": \"x\", \"label\": \"X\"}, {\"name\": \"y\", \"label\": \"Y\", \"readonly\": true}], \"calculateFunction\": \"return { y: values.x * 2 }\"}\n```",
        )
        .await;
        let calculator = Llm::try_new(config).unwrap().generate("doubler").await.unwrap();
        assert_eq!(calculator.title, "Doubler");
        assert_eq!(calculator.fields.len(), 2);
    }
    #[tokio::test]
    async fn unparsable_content_is_a_failure() {
        let config = fake_provider("I cannot help with that.").await;
        let error = Llm::try_new(config).unwrap().generate("x").await.unwrap_err();
        assert!(format!("{error:#}").contains("fails to parse"));
    }

    #[ignore]
    #[tokio::test]
    async fn structured_inference_request() -> anyhow::Result<()> {
        let llm = Llm::try_new(ModelConfig::from_env()?)?;
        let calculator = llm
            .generate("Compound interest calculator for savings growth")
            .await?;
        eprintln!("{calculator:#?}");
        Ok(())
    }
}
