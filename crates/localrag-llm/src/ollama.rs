use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, instrument};

use localrag_core::config::LlmSettings;
use localrag_core::traits::{ChatModel, FragmentStream};
use localrag_core::types::{ChatMessage, ChatRequest};
use localrag_core::{Error, Result};

use crate::ndjson::{self, ChatChunk};

/// [`ChatModel`] backed by Ollama's `/api/chat` endpoint.
#[derive(Debug, Clone)]
pub struct OllamaClient {
    http: reqwest::Client,
    base_url: String,
}

#[derive(Serialize)]
struct ChatBody<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
    options: Options,
}

#[derive(Serialize)]
struct Options {
    num_predict: u32,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

#[derive(Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<ModelTag>,
}

#[derive(Deserialize)]
struct ModelTag {
    name: String,
}

impl OllamaClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { http: reqwest::Client::new(), base_url }
    }

    pub fn from_settings(settings: &LlmSettings) -> Self {
        Self::new(&settings.base_url)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Names of the models installed on the server.
    #[instrument(skip(self), fields(base_url = %self.base_url))]
    pub async fn list_models(&self) -> Result<Vec<String>> {
        let url = format!("{}/api/tags", self.base_url);
        let response = self.http.get(&url).send().await.map_err(|e| request_failed(&url, &e))?;
        let response = check_status(response).await?;
        let tags: TagsResponse = response
            .json()
            .await
            .map_err(|e| Error::Generation(format!("failed to parse model list: {e}")))?;
        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }

    async fn send(&self, request: &ChatRequest, stream: bool) -> Result<reqwest::Response> {
        let url = format!("{}/api/chat", self.base_url);
        let body = ChatBody {
            model: &request.model,
            messages: &request.messages,
            stream,
            options: Options { num_predict: request.max_tokens },
        };
        debug!(model = %request.model, messages = request.messages.len(), stream, "sending chat request");
        let response = self.http.post(&url).json(&body).send().await.map_err(|e| request_failed(&url, &e))?;
        check_status(response).await
    }
}

#[async_trait]
impl ChatModel for OllamaClient {
    #[instrument(skip_all, fields(model = %request.model))]
    async fn chat(&self, request: &ChatRequest) -> Result<String> {
        let response = self.send(request, false).await?;
        let chunk: ChatChunk = response.json().await.map_err(|e| {
            error!(error = %e, "failed to parse chat response");
            Error::Generation(format!("failed to parse chat response: {e}"))
        })?;
        if let Some(message) = chunk.error {
            return Err(Error::Generation(message));
        }
        let answer = chunk.message.map(|m| m.content).unwrap_or_default();
        debug!(chars = answer.chars().count(), "chat response received");
        Ok(answer)
    }

    #[instrument(skip_all, fields(model = %request.model))]
    async fn chat_stream(&self, request: &ChatRequest) -> Result<FragmentStream> {
        let response = self.send(request, true).await?;
        Ok(ndjson::fragments(response.bytes_stream()))
    }
}

fn request_failed(url: &str, e: &reqwest::Error) -> Error {
    error!(url, error = %e, "request to Ollama failed");
    Error::Generation(format!("request to {url} failed: {e}"))
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let detail = serde_json::from_str::<ErrorBody>(&body).map(|e| e.error).unwrap_or(body);
    error!(%status, "Ollama API error");
    Err(Error::Generation(format!("Ollama returned {status}: {detail}")))
}
