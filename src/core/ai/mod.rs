pub mod ai_service;
pub mod models;

pub use ai_service::{AiProvider, AiService, FunctionCallHandler};
pub use models::{AiConfig, AiMessage, AiResponse, AiTool, MessagePart};
