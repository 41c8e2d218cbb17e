use crate::{config::UpstreamConfig, model::UploadedFile};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

const SYSTEM_PROMPT: &str = "You are an assistant that extracts structured information \
     (Issue Category, Title, Description) from images or videos.";
const USER_PROMPT: &str = "Extract Issue Category, Title, and Description from this file.";
const MAX_ERROR_BODY: usize = 300;

#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("no API key configured")]
    MissingApiKey,
    #[error("credentials rejected: {0}")]
    Unauthorized(String),
    #[error("rate limited: {0}")]
    RateLimited(String),
    #[error("unexpected status {status}: {message}")]
    Status { status: u16, message: String },
    #[error("request timed out")]
    Timeout,
    #[error("network failure: {0}")]
    Network(#[source] reqwest::Error),
    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

impl From<reqwest::Error> for UpstreamError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            UpstreamError::Timeout
        } else {
            UpstreamError::Network(err)
        }
    }
}

/// Turns an image into the model's free-text answer.
#[async_trait]
pub trait Extractor: Send + Sync {
    async fn extract(&self, file: &UploadedFile) -> Result<String, UpstreamError>;
}

/// Calls an OpenAI-compatible `/chat/completions` endpoint.
pub struct OpenAiExtractor {
    http: reqwest::Client,
    config: UpstreamConfig,
}

impl OpenAiExtractor {
    pub fn new(config: UpstreamConfig) -> reqwest::Result<Self> {
        let http = reqwest::Client::builder().timeout(config.timeout).build()?;

        Ok(Self { http, config })
    }

    async fn send(
        &self,
        url: &str,
        api_key: &str,
        body: &ChatRequest<'_>,
    ) -> reqwest::Result<reqwest::Response> {
        self.http
            .post(url)
            .bearer_auth(api_key)
            .json(body)
            .send()
            .await
    }
}

#[async_trait]
impl Extractor for OpenAiExtractor {
    async fn extract(&self, file: &UploadedFile) -> Result<String, UpstreamError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or(UpstreamError::MissingApiKey)?;

        let image_url = data_url(file);
        let body = ChatRequest::new(&self.config.model, &image_url);
        let url = format!("{}/chat/completions", self.config.base_url);

        debug!(
            model = %self.config.model,
            media_type = %file.media_type,
            bytes = file.bytes.len(),
            "Requesting extraction"
        );

        let response = match self.send(&url, api_key, &body).await {
            Err(err) if err.is_connect() => {
                warn!("Could not connect to extraction service, retrying once: {err}");
                self.send(&url, api_key, &body).await?
            }
            other => other?,
        };

        let status = response.status();
        let text = response.text().await?;
        debug!(%status, "Extraction service responded");

        if status.is_success() {
            answer_from_envelope(&text)
        } else if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            Err(UpstreamError::Unauthorized(error_message(&text)))
        } else if status == StatusCode::TOO_MANY_REQUESTS {
            Err(UpstreamError::RateLimited(error_message(&text)))
        } else {
            Err(UpstreamError::Status {
                status: status.as_u16(),
                message: error_message(&text),
            })
        }
    }
}

fn data_url(file: &UploadedFile) -> String {
    format!(
        "data:{};base64,{}",
        file.media_type,
        STANDARD.encode(&file.bytes)
    )
}

fn answer_from_envelope(text: &str) -> Result<String, UpstreamError> {
    let envelope: ChatResponse = serde_json::from_str(text)
        .map_err(|err| UpstreamError::MalformedResponse(err.to_string()))?;

    let content = envelope
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| UpstreamError::MalformedResponse("no choices returned".to_owned()))?
        .message
        .content
        .unwrap_or_default();

    if content.trim().is_empty() {
        return Err(UpstreamError::MalformedResponse(
            "empty answer returned".to_owned(),
        ));
    }

    Ok(content)
}

/// Prefers the `error.message` of an OpenAI-style error body, otherwise a
/// truncated copy of the raw body.
fn error_message(text: &str) -> String {
    if let Ok(ErrorEnvelope { error }) = serde_json::from_str(text) {
        return error.message;
    }

    let text = text.trim();
    match text.char_indices().nth(MAX_ERROR_BODY) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None if text.is_empty() => "no details".to_owned(),
        None => text.to_owned(),
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
}

impl<'a> ChatRequest<'a> {
    fn new(model: &'a str, image_url: &'a str) -> Self {
        Self {
            model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: MessageContent::Text(SYSTEM_PROMPT),
                },
                ChatMessage {
                    role: "user",
                    content: MessageContent::Parts(vec![
                        ContentPart::Text { text: USER_PROMPT },
                        ContentPart::ImageUrl {
                            image_url: ImageUrl { url: image_url },
                        },
                    ]),
                },
            ],
        }
    }
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: MessageContent<'a>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum MessageContent<'a> {
    Text(&'a str),
    Parts(Vec<ContentPart<'a>>),
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart<'a> {
    Text { text: &'a str },
    ImageUrl { image_url: ImageUrl<'a> },
}

#[derive(Serialize)]
struct ImageUrl<'a> {
    url: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}
