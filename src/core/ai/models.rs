use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One part of a message's content.
///
/// Plain chat turns are a single `Text` part. During a tool round the
/// assistant turn carries `ToolUse` parts and the follow-up user turn carries
/// the matching `ToolResult` parts, keyed by the provider-assigned call id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum MessagePart {
    Text(String),
    ToolUse {
        id: String,
        name: String,
        args: serde_json::Value,
    },
    ToolResult {
        id: String,
        content: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiMessage {
    pub role: String,
    pub parts: Vec<MessagePart>,
}

impl AiMessage {
    /// Convenience constructor for a plain text turn.
    pub fn text(role: &str, content: impl Into<String>) -> Self {
        Self {
            role: role.to_string(),
            parts: vec![MessagePart::Text(content.into())],
        }
    }

    /// Concatenates the text parts of this message, ignoring tool traffic.
    pub fn text_content(&self) -> String {
        self.parts
            .iter()
            .filter_map(|p| match p {
                MessagePart::Text(t) => Some(t.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[derive(Debug, Clone, Default)]
pub struct AiConfig {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
    pub top_p: Option<f32>,
    /// Tools the model may call, in our provider-agnostic format.
    pub tools: Option<Vec<AiTool>>,
}

/// A tool that can be offered to the model.
#[derive(Debug, Clone)]
pub enum AiTool {
    FunctionDeclaration(FunctionDef),
}

/// A custom function the model can call.
#[derive(Debug, Clone)]
pub struct FunctionDef {
    /// Name of the function (used in function calls).
    pub name: String,

    /// Human-readable description. The model uses this to decide when to
    /// call the function.
    pub description: String,

    /// JSON Schema describing the function's parameters.
    pub parameters: FunctionParameters,
}

/// JSON Schema for function parameters.
#[derive(Debug, Clone)]
pub struct FunctionParameters {
    /// Always "object" for function parameters.
    pub param_type: String,

    /// Map of parameter names to their schemas.
    pub properties: HashMap<String, PropertyDef>,

    /// List of required parameter names.
    pub required: Vec<String>,
}

/// Schema for a single property/parameter.
#[derive(Debug, Clone)]
pub struct PropertyDef {
    /// JSON Schema type: "string", "number", "integer", "boolean", ...
    pub prop_type: String,

    /// Description of the parameter.
    pub description: Option<String>,

    /// For enum types, the list of allowed values.
    pub enum_values: Option<Vec<String>>,
}

/// A function call requested by the model.
#[derive(Debug, Clone)]
pub struct FunctionCall {
    /// Provider-assigned id for matching the result back to the call.
    pub id: String,
    pub name: String,
    pub args: serde_json::Value,
}

/// Response from an AI provider for a single request.
///
/// Providers return the main content plus any optional thinking and any
/// function calls the model wants executed. The tool-execution loop lives in
/// `AiService`, not in the provider.
#[derive(Debug, Clone, Default)]
pub struct AiProviderResponse {
    /// The main response content from the model.
    pub content: String,

    /// Optional thinking/reasoning process from the model.
    pub thinking: Option<String>,

    /// Function calls the model wants executed before it can answer.
    pub function_calls: Option<Vec<FunctionCall>>,
}

/// Final response after processing by AiService.
#[derive(Debug, Clone)]
pub struct AiResponse {
    pub answer: String,
    pub reasoning: Option<String>,
}
