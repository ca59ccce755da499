use crate::config::Config;
use crate::events::{ModelKind, ResponseFragment, Turn};
use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::stream::{self, BoxStream};
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::pin::Pin;
use std::time::Duration;

/// Lazy, single-pass sequence of fragments for one streamed call
pub type FragmentStream = BoxStream<'static, Result<ResponseFragment, LlmError>>;

/// Failures surfaced by the request adapter
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LlmError {
    #[error("API error: {0}")]
    Api(String),
    #[error("Rate limited")]
    RateLimited,
    #[error("Network error: {0}")]
    Network(String),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Request timeout")]
    Timeout,
    #[error("Model returned an empty answer")]
    EmptyResponse,
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            LlmError::Timeout
        } else {
            LlmError::Network(err.to_string())
        }
    }
}

/// Outbound call to a chat-completion service.
///
/// Implementations are constructed explicitly and shared behind an `Arc`,
/// so callers never depend on process-wide client state.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Start a streamed completion. Consuming the stream to exhaustion is the
    /// only way to know the call succeeded; dropping it cancels the request.
    async fn stream_chat(&self, turns: &[Turn], model: ModelKind) -> Result<FragmentStream, LlmError>;

    /// Run a non-streamed completion and return the answer text.
    async fn complete(&self, turns: &[Turn], model: ModelKind) -> Result<String, LlmError>;
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'static str,
    messages: &'a [Turn],
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    #[serde(default)]
    error: Option<ApiErrorBody>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: Delta,
}

#[derive(Debug, Default, Deserialize)]
struct Delta {
    #[serde(default)]
    reasoning_content: Option<String>,
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    message: Option<String>,
}

impl StreamChunk {
    /// Reasoning wins when a delta carries both fields
    fn into_fragment(self) -> ResponseFragment {
        let delta = self
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.delta)
            .unwrap_or_default();

        match (delta.reasoning_content, delta.content) {
            (Some(reasoning), _) if !reasoning.is_empty() => ResponseFragment::Reasoning(reasoning),
            (_, Some(content)) if !content.is_empty() => ResponseFragment::Final(content),
            _ => ResponseFragment::Untagged,
        }
    }
}

/// Incremental Server-Sent Events decoder for chat-completion streams.
///
/// Bytes are buffered until a full line is available, so multi-byte
/// characters split across network chunks decode intact.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    done: bool,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the `[DONE]` terminator has been seen
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Feed raw bytes, returning every fragment completed by them
    pub fn feed(&mut self, chunk: &[u8]) -> Result<Vec<ResponseFragment>, LlmError> {
        self.buffer.extend_from_slice(chunk);

        let mut fragments = Vec::new();
        while let Some(newline_pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=newline_pos).collect();
            if let Some(fragment) = self.decode_line(&String::from_utf8_lossy(&line))? {
                fragments.push(fragment);
            }
        }
        Ok(fragments)
    }

    /// Flush a trailing line that arrived without a newline
    pub fn finish(&mut self) -> Result<Vec<ResponseFragment>, LlmError> {
        let rest = std::mem::take(&mut self.buffer);
        let fragment = self.decode_line(&String::from_utf8_lossy(&rest))?;
        Ok(fragment.into_iter().collect())
    }

    fn decode_line(&mut self, line: &str) -> Result<Option<ResponseFragment>, LlmError> {
        let line = line.trim();
        if self.done || line.is_empty() || line.starts_with(':') {
            return Ok(None);
        }

        let Some(data) = line.strip_prefix("data:") else {
            return Ok(None);
        };
        let data = data.trim_start();

        if data == "[DONE]" {
            self.done = true;
            return Ok(None);
        }

        let chunk: StreamChunk = match serde_json::from_str(data) {
            Ok(chunk) => chunk,
            Err(e) => {
                tracing::debug!(error = %e, "skipping undecodable stream line");
                return Ok(None);
            }
        };

        if let Some(error) = chunk.error {
            let message = error.message.unwrap_or_else(|| "stream reported an error".to_string());
            return Err(LlmError::Api(message));
        }

        Ok(Some(chunk.into_fragment()))
    }
}

struct SseStreamState<S> {
    bytes: Pin<Box<S>>,
    decoder: SseDecoder,
    pending: VecDeque<ResponseFragment>,
    idle_timeout: Option<Duration>,
    exhausted: bool,
}

/// Turn a byte stream carrying SSE into a lazy fragment stream.
///
/// The stream ends after `[DONE]` or when the body ends. A transport error, an
/// `error` chunk, or a gap longer than `idle_timeout` between chunks is yielded
/// as an `Err` item, after which the stream terminates.
pub fn decode_sse_stream<S, B, E>(bytes: S, idle_timeout: Option<Duration>) -> FragmentStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Into<LlmError> + Send + 'static,
{
    let state = SseStreamState {
        bytes: Box::pin(bytes),
        decoder: SseDecoder::new(),
        pending: VecDeque::new(),
        idle_timeout,
        exhausted: false,
    };

    stream::try_unfold(state, |mut st| async move {
        loop {
            if let Some(fragment) = st.pending.pop_front() {
                return Ok::<_, LlmError>(Some((fragment, st)));
            }
            if st.exhausted || st.decoder.is_done() {
                return Ok(None);
            }

            let next = match st.idle_timeout {
                Some(limit) => tokio::time::timeout(limit, st.bytes.next())
                    .await
                    .map_err(|_| LlmError::Timeout)?,
                None => st.bytes.next().await,
            };

            match next {
                Some(chunk) => {
                    let chunk = chunk.map_err(Into::<LlmError>::into)?;
                    let fragments = st.decoder.feed(chunk.as_ref())?;
                    st.pending.extend(fragments);
                }
                None => {
                    st.exhausted = true;
                    let fragments = st.decoder.finish()?;
                    st.pending.extend(fragments);
                }
            }
        }
    })
    .boxed()
}

/// DeepSeek client over the OpenAI-compatible chat-completions API
#[derive(Clone)]
pub struct DeepSeekClient {
    client: reqwest::Client,
    config: Config,
}

impl DeepSeekClient {
    pub fn new(config: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self::with_client(config, client))
    }

    fn with_client(config: &Config, client: reqwest::Client) -> Self {
        Self {
            client,
            config: config.clone(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.config.base_url)
    }

    async fn send(&self, payload: &ChatRequest<'_>, timeout: Duration) -> Result<reqwest::Response, LlmError> {
        tracing::debug!(
            model = payload.model,
            messages = payload.messages.len(),
            stream = payload.stream,
            "sending chat completion request"
        );

        let request = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.config.api_key)
            .json(payload)
            .send();

        let response = tokio::time::timeout(timeout, request)
            .await
            .map_err(|_| LlmError::Timeout)??;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let error_text = response.text().await.unwrap_or_default();
        tracing::warn!(status = status.as_u16(), "DeepSeek API returned an error status");

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(LlmError::RateLimited);
        }

        let message = serde_json::from_str::<ErrorEnvelope>(&error_text)
            .ok()
            .and_then(|envelope| envelope.error.message)
            .unwrap_or_else(|| format!("HTTP {}", status.as_u16()));
        Err(LlmError::Api(message))
    }
}

#[async_trait]
impl ChatBackend for DeepSeekClient {
    async fn stream_chat(&self, turns: &[Turn], model: ModelKind) -> Result<FragmentStream, LlmError> {
        let payload = ChatRequest {
            model: model.api_id(),
            messages: turns,
            stream: true,
        };
        let timeout = self.config.timeout_for(model);

        let response = self.send(&payload, timeout).await?;
        Ok(decode_sse_stream(response.bytes_stream(), Some(timeout)))
    }

    async fn complete(&self, turns: &[Turn], model: ModelKind) -> Result<String, LlmError> {
        let payload = ChatRequest {
            model: model.api_id(),
            messages: turns,
            stream: false,
        };
        let timeout = self.config.timeout_for(model);

        let body = tokio::time::timeout(timeout, async {
            let response = self.send(&payload, timeout).await?;
            response.json::<CompletionResponse>().await.map_err(LlmError::from)
        })
        .await
        .map_err(|_| LlmError::Timeout)??;

        let choice = body
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::Parse("Invalid API response: no choices".to_string()))?;

        Ok(choice.message.content.unwrap_or_default())
    }
}
