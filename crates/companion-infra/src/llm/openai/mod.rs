//! OpenAI-compatible completion service.
//!
//! Any endpoint that speaks the chat-completions protocol works: the base
//! URL and model come from `[provider]` in `config.toml`. Uses
//! [`async_openai`] for request types and SSE streaming.

pub mod streaming;

use std::time::Duration;

use async_openai::Client;
use async_openai::config::OpenAIConfig;
use async_openai::types::chat::{
    ChatCompletionRequestAssistantMessage, ChatCompletionRequestAssistantMessageContent,
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessage,
    ChatCompletionRequestSystemMessageContent, ChatCompletionRequestUserMessage,
    ChatCompletionRequestUserMessageContent, ChatCompletionStreamOptions,
    CreateChatCompletionRequest,
};
use futures_util::StreamExt;
use secrecy::{ExposeSecret, SecretString};

use companion_core::completion::{CompletionService, EventStream};
use companion_types::config::ProviderSettings;
use companion_types::llm::{
    CompletionRequest, CompletionResponse, LlmError, MessageRole, ProviderCapabilities,
    StopReason, Usage,
};

use self::streaming::{map_openai_stream, stop_reason};

/// Completion service for OpenAI-compatible chat endpoints.
///
/// Holds no client when the credential is missing; every call then fails
/// with `LlmError::NotConfigured` before touching the network.
///
/// Does not derive Debug, since the client carries the API key.
pub struct OpenAiCompletionService {
    client: Option<Client<OpenAIConfig>>,
    model: String,
    api_key_env: String,
    capabilities: ProviderCapabilities,
}

impl OpenAiCompletionService {
    pub fn new(settings: &ProviderSettings, api_key: Option<SecretString>) -> Self {
        let client = api_key
            .filter(|key| !key.expose_secret().trim().is_empty())
            .map(|key| {
                let config = OpenAIConfig::new()
                    .with_api_key(key.expose_secret())
                    .with_api_base(&settings.base_url);
                Client::with_config(config)
            });

        Self {
            client,
            model: settings.model.clone(),
            api_key_env: settings.api_key_env.clone(),
            capabilities: ProviderCapabilities {
                streaming: true,
                max_context_tokens: 128_000,
                max_output_tokens: 16_384,
            },
        }
    }

    pub fn is_configured(&self) -> bool {
        self.client.is_some()
    }

    fn not_configured(&self) -> LlmError {
        LlmError::NotConfigured(format!("set {} to enable replies", self.api_key_env))
    }

    fn build_request(&self, request: &CompletionRequest, stream: bool) -> CreateChatCompletionRequest {
        let mut messages: Vec<ChatCompletionRequestMessage> =
            Vec::with_capacity(request.messages.len() + 1);

        if let Some(ref system) = request.system {
            messages.push(system_message(system));
        }

        for msg in &request.messages {
            let oai_msg = match msg.role {
                MessageRole::System => system_message(&msg.content),
                MessageRole::User => {
                    ChatCompletionRequestMessage::User(ChatCompletionRequestUserMessage {
                        content: ChatCompletionRequestUserMessageContent::Text(msg.content.clone()),
                        name: None,
                    })
                }
                MessageRole::Assistant => {
                    #[allow(deprecated)]
                    ChatCompletionRequestMessage::Assistant(ChatCompletionRequestAssistantMessage {
                        content: Some(ChatCompletionRequestAssistantMessageContent::Text(
                            msg.content.clone(),
                        )),
                        refusal: None,
                        name: None,
                        audio: None,
                        tool_calls: None,
                        function_call: None,
                    })
                }
            };
            messages.push(oai_msg);
        }

        let model = if request.model.is_empty() {
            self.model.clone()
        } else {
            request.model.clone()
        };

        let mut req = CreateChatCompletionRequest {
            model,
            messages,
            max_completion_tokens: Some(request.max_tokens),
            temperature: request.temperature.map(|t| t as f32),
            ..Default::default()
        };

        if stream {
            req.stream = Some(true);
            req.stream_options = Some(ChatCompletionStreamOptions {
                include_usage: Some(true),
                include_obfuscation: None,
            });
        }

        req
    }
}

fn system_message(text: &str) -> ChatCompletionRequestMessage {
    ChatCompletionRequestMessage::System(ChatCompletionRequestSystemMessage {
        content: ChatCompletionRequestSystemMessageContent::Text(text.to_string()),
        name: None,
    })
}

impl CompletionService for OpenAiCompletionService {
    fn name(&self) -> &str {
        "openai"
    }

    fn capabilities(&self) -> &ProviderCapabilities {
        &self.capabilities
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let client = self.client.as_ref().ok_or_else(|| self.not_configured())?;
        let oai_request = self.build_request(request, false);

        let chat = client.chat();
        let call = chat.create(oai_request);
        let response = match request.timeout_ms {
            Some(ms) => tokio::time::timeout(Duration::from_millis(ms), call)
                .await
                .map_err(|_| LlmError::Timeout(ms))?,
            None => call.await,
        }
        .map_err(map_openai_error)?;

        let first = response.choices.first();
        let content = first
            .and_then(|c| c.message.content.clone())
            .unwrap_or_default();
        let stop_reason = first
            .and_then(|c| c.finish_reason.as_ref())
            .map(stop_reason)
            .unwrap_or(StopReason::EndTurn);
        let usage = response
            .usage
            .map(|u| Usage {
                input_tokens: u.prompt_tokens,
                output_tokens: u.completion_tokens,
            })
            .unwrap_or_default();

        Ok(CompletionResponse {
            id: response.id,
            content,
            model: response.model,
            stop_reason,
            usage,
        })
    }

    fn stream(&self, request: CompletionRequest) -> EventStream {
        let Some(client) = self.client.clone() else {
            let err = self.not_configured();
            return Box::pin(futures_util::stream::once(async move { Err(err) }));
        };
        let oai_request = self.build_request(&request, true);

        Box::pin(async_stream::try_stream! {
            let oai_stream = client
                .chat()
                .create_stream(oai_request)
                .await
                .map_err(map_openai_error)?;

            let mut inner = map_openai_stream(oai_stream);
            while let Some(event) = inner.next().await {
                let event = event?;
                yield event;
            }
        })
    }
}

/// Map an `async_openai::error::OpenAIError` to an [`LlmError`].
fn map_openai_error(err: async_openai::error::OpenAIError) -> LlmError {
    use async_openai::error::OpenAIError;

    match &err {
        OpenAIError::ApiError(api_err) => {
            let code = api_err.code.as_deref().unwrap_or("");
            let error_type = api_err.r#type.as_deref().unwrap_or("");

            if code == "invalid_api_key"
                || error_type == "authentication_error"
                || api_err.message.contains("Incorrect API key")
            {
                LlmError::AuthenticationFailed
            } else if code == "rate_limit_exceeded" || error_type == "rate_limit_error" {
                LlmError::RateLimited {
                    retry_after_ms: None,
                }
            } else {
                LlmError::Provider {
                    message: api_err.message.clone(),
                }
            }
        }
        OpenAIError::Reqwest(reqwest_err) => match reqwest_err.status().map(|s| s.as_u16()) {
            Some(401) => LlmError::AuthenticationFailed,
            Some(429) => LlmError::RateLimited {
                retry_after_ms: None,
            },
            _ => LlmError::Provider {
                message: err.to_string(),
            },
        },
        OpenAIError::JSONDeserialize(_, content) => {
            LlmError::Deserialization(format!("failed to parse response: {content}"))
        }
        OpenAIError::StreamError(stream_err) => LlmError::Stream(stream_err.to_string()),
        OpenAIError::InvalidArgument(msg) => LlmError::InvalidRequest(msg.clone()),
        _ => LlmError::Provider {
            message: err.to_string(),
        },
    }
}
