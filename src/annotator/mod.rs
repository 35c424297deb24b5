use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::config::OpenAiConfig;
use crate::error::{Result, ScraperError};

const OPENAI_API_URL: &str = "https://api.openai.com/v1";

/// Relevance judgment produced by the model for one tweet.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Annotation {
    pub insight: String,
    pub importance_level: u8,
}

impl Annotation {
    /// Fixed sentinel used whenever the model call or its response fails.
    pub fn error_sentinel() -> Self {
        Self {
            insight: "Erro na IA".to_string(),
            importance_level: 0,
        }
    }
}

/// Seam for the relevance classifier so the pipeline can run against a fake.
#[async_trait]
pub trait Annotator: Send + Sync {
    /// Never fails: degraded responses collapse to the error sentinel.
    async fn annotate(&self, text: &str) -> Annotation;
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

pub struct OpenAiAnnotator {
    http: reqwest::Client,
    api_key: String,
    model: String,
    temperature: f32,
    request_delay: Duration,
    base_url: String,
}

impl OpenAiAnnotator {
    pub fn new(config: &OpenAiConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| {
                ScraperError::NetworkError(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self {
            http,
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            temperature: config.temperature,
            request_delay: Duration::from_secs(config.request_delay_secs),
            base_url: OPENAI_API_URL.to_string(),
        })
    }

    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = url.to_string();
        self
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", self.api_key)).map_err(|e| {
                ScraperError::AnnotationError(format!("Invalid API key header: {}", e))
            })?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(headers)
    }

    fn build_prompt(text: &str) -> String {
        format!(
            r#"Analise o seguinte tweet e diga se ele contém informação relevante sobre investimentos.

Responda em JSON com duas chaves:
- "insight": um resumo da oportunidade (ou "Nenhum")
- "importance_level": número de 1 a 5 (5 = muito importante)

Tweet: "{}""#,
            text
        )
    }

    async fn try_annotate(&self, text: &str) -> Result<Annotation> {
        let url = format!("{}/chat/completions", self.base_url);
        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: Self::build_prompt(text),
            }],
            temperature: self.temperature,
        };

        debug!(model = %request.model, "OpenAI chat request");

        let response = self
            .http
            .post(&url)
            .headers(self.headers()?)
            .json(&request)
            .send()
            .await
            .map_err(|e| ScraperError::NetworkError(format!("OpenAI request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(ScraperError::AnnotationError(format!(
                "OpenAI API error ({}): {}",
                status, error_text
            ))
            .into());
        }

        let chat_response: ChatResponse = response
            .json()
            .await
            .map_err(|e| ScraperError::AnnotationError(format!("Invalid response body: {}", e)))?;

        let content = chat_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| ScraperError::AnnotationError("No choice in response".to_string()))?;

        parse_annotation_content(&content)
    }
}

/// Parse the model's message content as the `{insight, importance_level}` object.
///
/// Models occasionally wrap the JSON in a markdown code fence; strip it first.
fn parse_annotation_content(content: &str) -> Result<Annotation> {
    let stripped = content
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();

    let annotation: Annotation = serde_json::from_str(stripped)
        .map_err(|e| ScraperError::AnnotationError(format!("Malformed annotation JSON: {}", e)))?;
    Ok(annotation)
}

#[async_trait]
impl Annotator for OpenAiAnnotator {
    async fn annotate(&self, text: &str) -> Annotation {
        // unconditional pause before every call, rate-limit mitigation
        sleep(self.request_delay).await;

        match self.try_annotate(text).await {
            Ok(annotation) => annotation,
            Err(e) => {
                warn!("Erro na IA: {}", e);
                Annotation::error_sentinel()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_embeds_tweet_text() {
        let prompt = OpenAiAnnotator::build_prompt("BTC vai subir");
        assert!(prompt.contains(r#"Tweet: "BTC vai subir""#));
        assert!(prompt.contains("\"insight\""));
        assert!(prompt.contains("\"importance_level\""));
    }

    #[test]
    fn test_parse_annotation_content() {
        let annotation =
            parse_annotation_content(r#"{"insight": "Comprar BTC", "importance_level": 4}"#)
                .unwrap();
        assert_eq!(annotation.insight, "Comprar BTC");
        assert_eq!(annotation.importance_level, 4);
    }

    #[test]
    fn test_parse_annotation_strips_code_fence() {
        let content = "```json\n{\"insight\": \"Nenhum\", \"importance_level\": 1}\n```";
        let annotation = parse_annotation_content(content).unwrap();
        assert_eq!(annotation.insight, "Nenhum");
        assert_eq!(annotation.importance_level, 1);
    }

    #[test]
    fn test_parse_annotation_rejects_malformed_json() {
        assert!(parse_annotation_content("not json at all").is_err());
        assert!(parse_annotation_content("{\"insight\": \"x\"}").is_err());
    }

    #[test]
    fn test_error_sentinel() {
        let sentinel = Annotation::error_sentinel();
        assert_eq!(sentinel.insight, "Erro na IA");
        assert_eq!(sentinel.importance_level, 0);
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_yields_sentinel() {
        // port 9 (discard) refuses the connection, simulating a network failure
        let annotator = OpenAiAnnotator::new(&OpenAiConfig {
            api_key: "test-key".to_string(),
            model: "gpt-4.1".to_string(),
            temperature: 0.3,
            request_delay_secs: 0,
        })
        .unwrap()
        .with_base_url("http://127.0.0.1:9");

        let annotation = annotator.annotate("BTC vai subir").await;
        assert_eq!(annotation, Annotation::error_sentinel());
    }
}
