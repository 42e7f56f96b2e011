// =============================================================================
// ANTHROPIC CLIENT - Messages API Integration
// =============================================================================
//
// `AiProvider` implementation for Anthropic's Messages API
// (https://docs.anthropic.com/en/api/messages).
//
// **Wire format notes:**
// - Authentication: `x-api-key` header plus a pinned `anthropic-version`.
// - The system prompt is a top-level `system` field, not a message role.
// - Message content is an array of typed blocks. Tool calls come back as
//   `tool_use` blocks; results go back as `tool_result` blocks inside a
//   user message, matched by `tool_use_id`. Models with extended thinking
//   enabled also return `thinking` blocks, surfaced as the response's
//   reasoning.
// - `max_tokens` is mandatory, so we apply a default when the config does
//   not set one.
//
// **Environment variables:**
// - `ANTHROPIC_API_KEY` - your key from https://console.anthropic.com/

use crate::core::ai::{
    models::{AiConfig, AiMessage, AiProviderResponse, AiTool, FunctionCall, MessagePart},
    AiProvider,
};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::error::Error;

const MESSAGES_ENDPOINT: &str = "https://api.anthropic.com/v1/messages";
const API_VERSION: &str = "2023-06-01";

/// `max_tokens` is required by the API; used when the config leaves it unset.
const DEFAULT_MAX_TOKENS: u32 = 1024;

// =============================================================================
// ANTHROPIC API DATA STRUCTURES
// =============================================================================

/// One typed content block inside a message.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    ToolResult {
        tool_use_id: String,
        content: String,
    },
    /// Extended-thinking block; response-only. The signature field it
    /// carries on the wire is ignored since we never replay these.
    Thinking {
        thinking: String,
    },
}

#[derive(Debug, Serialize)]
struct ApiMessage {
    /// "user" or "assistant"; the system prompt never appears here.
    role: String,
    content: Vec<ContentBlock>,
}

/// Tool definition in Anthropic's format: a JSON-schema `input_schema`.
#[derive(Debug, Serialize)]
struct ApiTool {
    name: String,
    description: String,
    input_schema: serde_json::Value,
}

/// The request body for the messages endpoint.
#[derive(Debug, Serialize)]
struct MessagesRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<ApiMessage>,

    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,

    temperature: f32,

    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<ApiTool>>,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,

    #[allow(dead_code)]
    stop_reason: Option<String>,
}

/// Error body: `{"type": "error", "error": {"type": ..., "message": ...}}`.
#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
    #[allow(dead_code)]
    #[serde(rename = "type")]
    error_type: Option<String>,
}

// =============================================================================
// ANTHROPIC CLIENT IMPLEMENTATION
// =============================================================================

pub struct AnthropicClient {
    /// HTTP client for making requests.
    client: Client,

    /// API key for authentication.
    api_key: String,
}

impl AnthropicClient {
    pub fn new(api_key: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
        }
    }

    /// Converts our generic `AiMessage` into Anthropic's block format.
    fn convert_message(msg: &AiMessage) -> ApiMessage {
        let content = msg
            .parts
            .iter()
            .map(|part| match part {
                MessagePart::Text(text) => ContentBlock::Text { text: text.clone() },
                MessagePart::ToolUse { id, name, args } => ContentBlock::ToolUse {
                    id: id.clone(),
                    name: name.clone(),
                    input: args.clone(),
                },
                MessagePart::ToolResult { id, content } => ContentBlock::ToolResult {
                    tool_use_id: id.clone(),
                    content: content.clone(),
                },
            })
            .collect();

        ApiMessage {
            role: msg.role.clone(),
            content,
        }
    }

    /// Converts our core `AiTool` definitions into Anthropic's tool format.
    fn convert_tools(tools: &[AiTool]) -> Vec<ApiTool> {
        tools
            .iter()
            .map(|tool| match tool {
                AiTool::FunctionDeclaration(def) => {
                    let mut properties = serde_json::Map::new();
                    for (name, prop) in &def.parameters.properties {
                        let mut schema = serde_json::Map::new();
                        schema.insert(
                            "type".to_string(),
                            serde_json::Value::String(prop.prop_type.clone()),
                        );
                        if let Some(description) = &prop.description {
                            schema.insert(
                                "description".to_string(),
                                serde_json::Value::String(description.clone()),
                            );
                        }
                        if let Some(values) = &prop.enum_values {
                            schema.insert(
                                "enum".to_string(),
                                serde_json::Value::Array(
                                    values
                                        .iter()
                                        .map(|v| serde_json::Value::String(v.clone()))
                                        .collect(),
                                ),
                            );
                        }
                        properties.insert(name.clone(), serde_json::Value::Object(schema));
                    }

                    ApiTool {
                        name: def.name.clone(),
                        description: def.description.clone(),
                        input_schema: serde_json::json!({
                            "type": def.parameters.param_type,
                            "properties": properties,
                            "required": def.parameters.required,
                        }),
                    }
                }
            })
            .collect()
    }

    /// Splits a response's blocks into text content, thinking, and function
    /// calls.
    fn parse_content(
        blocks: &[ContentBlock],
    ) -> (String, Option<String>, Option<Vec<FunctionCall>>) {
        let text: Vec<&str> = blocks
            .iter()
            .filter_map(|b| match b {
                ContentBlock::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect();

        let thinking: Vec<&str> = blocks
            .iter()
            .filter_map(|b| match b {
                ContentBlock::Thinking { thinking } => Some(thinking.as_str()),
                _ => None,
            })
            .collect();

        let calls: Vec<FunctionCall> = blocks
            .iter()
            .filter_map(|b| match b {
                ContentBlock::ToolUse { id, name, input } => Some(FunctionCall {
                    id: id.clone(),
                    name: name.clone(),
                    args: input.clone(),
                }),
                _ => None,
            })
            .collect();

        (
            text.join("\n"),
            if thinking.is_empty() {
                None
            } else {
                Some(thinking.join("\n"))
            },
            if calls.is_empty() { None } else { Some(calls) },
        )
    }
}

#[async_trait]
impl AiProvider for AnthropicClient {
    async fn chat_complete(
        &self,
        messages: &[AiMessage],
        config: &AiConfig,
    ) -> Result<AiProviderResponse, Box<dyn Error + Send + Sync>> {
        // System messages become the top-level system field.
        let system = messages
            .iter()
            .find(|m| m.role == "system")
            .map(|m| m.text_content());

        let api_messages: Vec<ApiMessage> = messages
            .iter()
            .filter(|m| m.role != "system")
            .map(Self::convert_message)
            .collect();

        let tools = config
            .tools
            .as_ref()
            .map(|t| Self::convert_tools(t))
            .filter(|t| !t.is_empty());

        let request = MessagesRequest {
            model: config.model.clone(),
            max_tokens: config.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            messages: api_messages,
            system,
            temperature: config.temperature,
            top_p: config.top_p,
            tools,
        };

        tracing::debug!(
            "Anthropic request to model {}: {} messages, {} tool(s)",
            config.model,
            messages.len(),
            config.tools.as_ref().map(|t| t.len()).unwrap_or(0)
        );

        let response = self
            .client
            .post(MESSAGES_ENDPOINT)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await?;

            // Try to parse the structured error body for a cleaner message
            if let Ok(parsed) = serde_json::from_str::<ApiErrorResponse>(&error_text) {
                return Err(
                    format!("Anthropic API error ({}): {}", status, parsed.error.message).into(),
                );
            }

            return Err(format!("Anthropic API error: {} - {}", status, error_text).into());
        }

        let response_json: MessagesResponse = response.json().await?;
        let (content, thinking, function_calls) = Self::parse_content(&response_json.content);

        tracing::debug!(
            "Anthropic response: {} chars content, {} function call(s)",
            content.len(),
            function_calls.as_ref().map(|f| f.len()).unwrap_or(0)
        );

        Ok(AiProviderResponse {
            content,
            thinking,
            function_calls,
        })
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ai::models::{FunctionDef, FunctionParameters, PropertyDef};
    use std::collections::HashMap;

    #[test]
    fn test_convert_text_message() {
        let msg = AiMessage::text("user", "Hello!");
        let converted = AnthropicClient::convert_message(&msg);

        assert_eq!(converted.role, "user");
        assert!(matches!(
            &converted.content[0],
            ContentBlock::Text { text } if text == "Hello!"
        ));
    }

    #[test]
    fn test_convert_tool_result_message() {
        let msg = AiMessage {
            role: "user".to_string(),
            parts: vec![MessagePart::ToolResult {
                id: "toolu_1".to_string(),
                content: "report text".to_string(),
            }],
        };
        let converted = AnthropicClient::convert_message(&msg);

        match &converted.content[0] {
            ContentBlock::ToolResult {
                tool_use_id,
                content,
            } => {
                assert_eq!(tool_use_id, "toolu_1");
                assert_eq!(content, "report text");
            }
            other => panic!("expected ToolResult block, got {:?}", other),
        }
    }

    #[test]
    fn test_convert_tools_builds_input_schema() {
        let mut properties = HashMap::new();
        properties.insert(
            "query".to_string(),
            PropertyDef {
                prop_type: "string".to_string(),
                description: Some("search keywords".to_string()),
                enum_values: None,
            },
        );
        let def = FunctionDef {
            name: "search_drive".to_string(),
            description: "Searches Drive".to_string(),
            parameters: FunctionParameters {
                param_type: "object".to_string(),
                properties,
                required: vec!["query".to_string()],
            },
        };

        let tools = AnthropicClient::convert_tools(&[AiTool::FunctionDeclaration(def)]);

        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].name, "search_drive");
        let schema = &tools[0].input_schema;
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["properties"]["query"]["type"], "string");
        assert_eq!(schema["required"][0], "query");
    }

    #[test]
    fn test_parse_content_text_only() {
        let blocks = vec![ContentBlock::Text {
            text: "The answer.".to_string(),
        }];
        let (content, thinking, calls) = AnthropicClient::parse_content(&blocks);
        assert_eq!(content, "The answer.");
        assert!(thinking.is_none());
        assert!(calls.is_none());
    }

    #[test]
    fn test_parse_content_extracts_tool_use() {
        let json = r#"{
            "content": [
                {"type": "text", "text": "Let me check."},
                {"type": "tool_use", "id": "toolu_9", "name": "search_drive",
                 "input": {"query": "Resume"}}
            ],
            "stop_reason": "tool_use"
        }"#;
        let response: MessagesResponse = serde_json::from_str(json).unwrap();
        let (content, _, calls) = AnthropicClient::parse_content(&response.content);

        assert_eq!(content, "Let me check.");
        let calls = calls.unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].id, "toolu_9");
        assert_eq!(calls[0].name, "search_drive");
        assert_eq!(calls[0].args["query"], "Resume");
    }

    #[test]
    fn test_parse_content_surfaces_thinking_blocks() {
        let json = r#"{
            "content": [
                {"type": "thinking", "thinking": "The user wants the resume.",
                 "signature": "sig_abc"},
                {"type": "text", "text": "Jason is a software engineer."}
            ],
            "stop_reason": "end_turn"
        }"#;
        let response: MessagesResponse = serde_json::from_str(json).unwrap();
        let (content, thinking, calls) = AnthropicClient::parse_content(&response.content);

        assert_eq!(content, "Jason is a software engineer.");
        assert_eq!(thinking.as_deref(), Some("The user wants the resume."));
        assert!(calls.is_none());
    }

    #[test]
    fn test_request_serialization_skips_unset_fields() {
        let request = MessagesRequest {
            model: "claude-3-haiku-20240307".to_string(),
            max_tokens: 1024,
            messages: vec![],
            system: None,
            temperature: 0.0,
            top_p: None,
            tools: None,
        };

        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains("\"max_tokens\":1024"));
        assert!(!json.contains("system"));
        assert!(!json.contains("top_p"));
        assert!(!json.contains("tools"));
    }

    #[test]
    fn test_api_error_body_parsing() {
        let json = r#"{"type": "error", "error": {"type": "authentication_error", "message": "invalid x-api-key"}}"#;
        let parsed: ApiErrorResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.error.message, "invalid x-api-key");
    }
}
