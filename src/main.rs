// This is the entry point of the Drive assistant.
//
// **Architecture Overview:**
// - `core/` = Business logic (search pipeline, agent loop; platform-agnostic)
// - `infra/` = Implementations of core traits (Google Drive, Anthropic)
//
// This file's job is to:
// 1. Load configuration
// 2. Initialize services (dependency injection)
// 3. Run the interactive chat loop

// These attrs point each module declaration at a more descriptive root file
// so we don't end up with a pile of mod.rs files that all look the same.
#[path = "core/core_layer.rs"]
mod core;
#[path = "infra/infra_layer.rs"]
mod infra;

use crate::core::ai::{AiConfig, AiMessage, AiService, AiTool, FunctionCallHandler};
use crate::core::drive::{search_drive_function, DriveSearchService, SearchPolicy};
use crate::infra::ai::AnthropicClient;
use crate::infra::google::GoogleDriveClient;
use async_trait::async_trait;
use std::io::{BufRead, Write};

const DEFAULT_MODEL: &str = "claude-3-haiku-20240307";

const DEFAULT_SYSTEM_PROMPT: &str =
    "You are Jason's personal assistant. You have access to his Google Drive. \
     When asked about Jason's details, you MUST use the search_drive tool. \
     If the search returns content from a PDF or Doc, analyze it carefully to \
     provide a summary.";

/// Reads the search policy bounds from the environment, falling back to the
/// defaults for anything unset or unparsable.
fn search_policy_from_env() -> SearchPolicy {
    let defaults = SearchPolicy::default();
    SearchPolicy {
        page_size: std::env::var("DRIVE_SEARCH_PAGE_SIZE")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.page_size),
        truncation_chars: std::env::var("DRIVE_SEARCH_TRUNCATE_CHARS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.truncation_chars),
        pdf_page_limit: std::env::var("DRIVE_SEARCH_PDF_PAGES")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.pdf_page_limit),
    }
}

/// How much of each tool result gets echoed to the console.
const TOOL_OUTPUT_PREVIEW_CHARS: usize = 200;

/// Wraps a function handler so the console shows when a tool runs and a
/// short preview of what it returned, before the model reads it. Purely a
/// terminal-UX concern, so it lives here and not in core.
struct ToolEcho<H> {
    inner: H,
}

#[async_trait]
impl<H: FunctionCallHandler> FunctionCallHandler for ToolEcho<H> {
    async fn handle_function_call(
        &self,
        name: &str,
        args: &serde_json::Value,
    ) -> Result<serde_json::Value, String> {
        println!("\n[TOOL] Running {}...", name);
        std::io::stdout().flush().ok();

        let result = self.inner.handle_function_call(name, args).await;

        if let Ok(serde_json::Value::String(output)) = &result {
            println!(
                "[TOOL OUTPUT]: {}...",
                preview(output, TOOL_OUTPUT_PREVIEW_CHARS)
            );
        }
        result
    }

    fn supported_functions(&self) -> Vec<String> {
        self.inner.supported_functions()
    }
}

/// First `max_chars` characters of `text`, never splitting mid-character.
fn preview(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

fn system_prompt_from_env() -> String {
    if let Ok(path) = std::env::var("DRIVEBOT_SYSTEM_PROMPT_FILE") {
        match std::fs::read_to_string(&path) {
            Ok(prompt) => return prompt,
            Err(e) => {
                tracing::warn!("Failed to read system prompt file at {}: {}", path, e);
            }
        }
    }
    std::env::var("DRIVEBOT_SYSTEM_PROMPT").unwrap_or_else(|_| DEFAULT_SYSTEM_PROMPT.to_string())
}

#[tokio::main]
async fn main() {
    // Initialize logging so we can see what's happening
    tracing_subscriber::fmt::init();

    // Load environment variables from .env file (if it exists)
    dotenv::dotenv().ok();

    let api_key = std::env::var("ANTHROPIC_API_KEY").expect(
        "Missing ANTHROPIC_API_KEY environment variable! Create a .env file with your key.",
    );
    let model = std::env::var("ANTHROPIC_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());

    // ========================================================================
    // DEPENDENCY INJECTION
    // ========================================================================
    // Create our services with their dependencies.
    // This is the "composition root" where we wire everything together.

    let drive_client = GoogleDriveClient::from_env()
        .await
        .expect("Failed to load Google Drive credentials");
    let search_service = DriveSearchService::new(drive_client, search_policy_from_env());

    let ai_client = AnthropicClient::new(api_key);
    let ai_config = AiConfig {
        model,
        temperature: 0.0,
        max_tokens: Some(1024),
        top_p: None,
        tools: Some(vec![AiTool::FunctionDeclaration(search_drive_function())]),
    };
    let ai_service = AiService::new(ai_client, system_prompt_from_env(), ai_config)
        .with_function_handler(Box::new(ToolEcho {
            inner: search_service,
        }));

    // ========================================================================
    // CHAT LOOP
    // ========================================================================

    println!("\n🚀 DriveBot is online! Ask about Jason's Drive (exit/quit to leave).");

    let stdin = std::io::stdin();
    let mut history: Vec<AiMessage> = Vec::new();

    loop {
        print!("\nUser: ");
        std::io::stdout().flush().ok();

        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) => break, // EOF
            Ok(_) => {}
            Err(e) => {
                tracing::error!("Failed to read input: {}", e);
                break;
            }
        }

        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if input.eq_ignore_ascii_case("exit") || input.eq_ignore_ascii_case("quit") {
            break;
        }

        history.push(AiMessage::text("user", input));

        match ai_service.chat(&history).await {
            Ok(response) => {
                if let Some(reasoning) = &response.reasoning {
                    tracing::debug!("Model reasoning: {}", reasoning);
                }
                println!("AI: {}", response.answer);
                history.push(AiMessage::text("assistant", response.answer));
            }
            Err(e) => {
                // Worst case the user sees an error line, never a stack trace.
                tracing::error!("AI error: {}", e);
                println!("AI: Error: {}", e);
            }
        }
    }

    println!("Goodbye!");
}
