use super::models::{
    AiConfig, AiMessage, AiProviderResponse, AiResponse, MessagePart,
};
use async_trait::async_trait;
use std::error::Error;

/// How many request/tool-execution rounds a single chat turn may take before
/// we give up and return whatever text the model produced last. Keeps a
/// confused model from looping on the same tool forever.
const MAX_TOOL_ROUNDS: usize = 4;

#[async_trait]
pub trait AiProvider: Send + Sync {
    /// Sends a chat completion request to the AI provider.
    ///
    /// Returns an `AiProviderResponse` containing the main content, optional
    /// thinking/reasoning, and any function calls the model wants executed.
    async fn chat_complete(
        &self,
        messages: &[AiMessage],
        config: &AiConfig,
    ) -> Result<AiProviderResponse, Box<dyn Error + Send + Sync>>;
}

// Blanket implementation for Box<dyn AiProvider>
// This allows us to use trait objects in the AiService, enabling
// runtime switching between different AI providers.
#[async_trait]
impl AiProvider for Box<dyn AiProvider> {
    async fn chat_complete(
        &self,
        messages: &[AiMessage],
        config: &AiConfig,
    ) -> Result<AiProviderResponse, Box<dyn Error + Send + Sync>> {
        // Delegate to the inner provider
        (**self).chat_complete(messages, config).await
    }
}

/// Executes function calls requested by the model.
///
/// Implementations run the actual side effects (Drive search, etc.) and
/// return a JSON value the model can read. Returning `Err` marks the call as
/// failed; the error text is still fed back to the model as the tool result
/// so the conversation can continue.
#[async_trait]
pub trait FunctionCallHandler: Send + Sync {
    async fn handle_function_call(
        &self,
        name: &str,
        args: &serde_json::Value,
    ) -> Result<serde_json::Value, String>;

    fn supported_functions(&self) -> Vec<String>;
}

pub struct AiService<P: AiProvider> {
    provider: P,
    system_prompt: String,
    config: AiConfig,
    handler: Option<Box<dyn FunctionCallHandler>>,
}

impl<P: AiProvider> AiService<P> {
    pub fn new(provider: P, system_prompt: String, config: AiConfig) -> Self {
        Self {
            provider,
            system_prompt,
            config,
            handler: None,
        }
    }

    /// Attaches a function-call handler so the model's tool requests get
    /// executed instead of ignored.
    pub fn with_function_handler(mut self, handler: Box<dyn FunctionCallHandler>) -> Self {
        self.handler = Some(handler);
        self
    }

    /// Runs one chat turn: sends the system prompt plus context to the
    /// provider, executes any requested function calls, feeds the results
    /// back, and repeats until the model answers with plain text (or the
    /// round budget runs out).
    pub async fn chat(
        &self,
        context_messages: &[AiMessage],
    ) -> Result<AiResponse, Box<dyn Error + Send + Sync>> {
        // Build messages for API: System Prompt + Context
        let mut messages = Vec::new();
        messages.push(AiMessage::text("system", self.system_prompt.clone()));
        messages.extend(context_messages.iter().cloned());

        let mut last_response = AiProviderResponse::default();

        for round in 0..MAX_TOOL_ROUNDS {
            let response = self.provider.chat_complete(&messages, &self.config).await?;

            let calls = match &response.function_calls {
                Some(calls) if !calls.is_empty() => calls.clone(),
                _ => {
                    return Ok(AiResponse {
                        answer: response.content,
                        reasoning: response.thinking,
                    });
                }
            };

            tracing::debug!(
                "Tool round {}: model requested {} function call(s)",
                round + 1,
                calls.len()
            );

            // Replay the assistant turn (text + tool-use parts) so the
            // provider sees its own calls in the transcript.
            let mut assistant_parts = Vec::new();
            if !response.content.is_empty() {
                assistant_parts.push(MessagePart::Text(response.content.clone()));
            }
            for call in &calls {
                assistant_parts.push(MessagePart::ToolUse {
                    id: call.id.clone(),
                    name: call.name.clone(),
                    args: call.args.clone(),
                });
            }
            messages.push(AiMessage {
                role: "assistant".to_string(),
                parts: assistant_parts,
            });

            // Execute each call and feed the results back as one user turn.
            let mut result_parts = Vec::new();
            for call in &calls {
                let result = self.execute_call(&call.name, &call.args).await;
                result_parts.push(MessagePart::ToolResult {
                    id: call.id.clone(),
                    content: result,
                });
            }
            messages.push(AiMessage {
                role: "user".to_string(),
                parts: result_parts,
            });

            last_response = response;
        }

        tracing::warn!(
            "Tool round budget ({}) exhausted; returning last model text",
            MAX_TOOL_ROUNDS
        );

        Ok(AiResponse {
            answer: if last_response.content.is_empty() {
                "I could not finish answering within the tool budget.".to_string()
            } else {
                last_response.content
            },
            reasoning: last_response.thinking,
        })
    }

    async fn execute_call(&self, name: &str, args: &serde_json::Value) -> String {
        let Some(handler) = self.handler.as_ref() else {
            tracing::warn!("Model requested function '{}' but no handler is attached", name);
            return format!("Error: no handler available for function '{}'", name);
        };

        match handler.handle_function_call(name, args).await {
            Ok(value) => match value {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            },
            Err(e) => {
                tracing::warn!("Function call '{}' failed: {}", name, e);
                format!("Error: {}", e)
            }
        }
    }
}
