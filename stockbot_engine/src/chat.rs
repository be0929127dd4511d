/// chat.rs — Conversational assistant with function calling
///
/// TURN:
///   1. append the user message to the session log
///   2. send log + tool schemas to the completion endpoint
///   3a. plain text      → append as the assistant message
///   3b. function call   → dispatch through the ToolRegistry, append
///                         "preamble\nresult" as the assistant message
///
/// The session is an explicit value owned by the caller; nothing about the
/// conversation is global.
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::config::AppConfig;
use crate::data::MarketData;
use crate::error::{EngineError, Result};
use crate::tools::{ToolKind, ToolRegistry};

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a financial market specialist with expertise in stocks, \
options trading and investment strategies. You give accurate, data-driven answers about market trends, \
technical and fundamental analysis, options strategies such as covered calls, iron condors and spreads, \
market indicators (RSI, MACD, SMA, EMA, Bollinger Bands), risk management, portfolio allocation and \
hedging, economic news and its impact on markets, and short- and long-term investment strategies. \
Use the provided functions whenever a question needs live prices or indicator values.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role:    Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self { role, content: content.into() }
    }
}

/// What the model answered with.
#[derive(Debug, Clone, PartialEq)]
pub enum AssistantReply {
    Text(String),
    FunctionCall {
        name:      String,
        arguments: Value,
        /// Text the model sent alongside the call, if any.
        preamble:  Option<String>,
    },
}

#[async_trait]
pub trait ChatCompletion: Send + Sync {
    async fn complete(&self, messages: &[ChatMessage], functions: &[Value]) -> Result<AssistantReply>;
}

// ── Session ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct ChatSession {
    system_prompt: String,
    messages:      Vec<ChatMessage>,
}

impl Default for ChatSession {
    fn default() -> Self {
        Self::new(DEFAULT_SYSTEM_PROMPT)
    }
}

impl ChatSession {
    pub fn new(system_prompt: &str) -> Self {
        Self {
            system_prompt: system_prompt.to_string(),
            messages:      vec![ChatMessage::new(Role::System, system_prompt)],
        }
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn push(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }

    /// Back to just the system prompt.
    pub fn reset(&mut self) {
        self.messages.clear();
        self.messages.push(ChatMessage::new(Role::System, self.system_prompt.as_str()));
    }

    /// One full turn.  Returns the assistant message that was appended.  On
    /// error the user message stays in the log and nothing else is added.
    pub async fn ask<C, D>(&mut self, llm: &C, tools: &ToolRegistry<D>, prompt: &str) -> Result<String>
    where
        C: ChatCompletion + ?Sized,
        D: MarketData,
    {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Err(EngineError::InvalidInput("empty prompt".into()));
        }
        self.push(ChatMessage::new(Role::User, prompt));

        let reply = llm.complete(&self.messages, &tools.schemas()).await?;
        let content = match reply {
            AssistantReply::Text(text) => text,
            AssistantReply::FunctionCall { name, arguments, preamble } => {
                let result = tools.dispatch(&name, &arguments).await?;
                match preamble.filter(|p| !p.trim().is_empty()) {
                    // SIP answers stand alone
                    Some(_) if tools.lookup(&name) == Some(ToolKind::SipRoi) => result,
                    Some(p) => format!("{}\n{}", p, result),
                    None => result,
                }
            }
        };
        self.push(ChatMessage::new(Role::Assistant, content.as_str()));
        Ok(content)
    }

    /// `ask`, with any failure rendered as the user-facing message.
    pub async fn respond<C, D>(&mut self, llm: &C, tools: &ToolRegistry<D>, prompt: &str) -> String
    where
        C: ChatCompletion + ?Sized,
        D: MarketData,
    {
        match self.ask(llm, tools, prompt).await {
            Ok(text) => text,
            Err(e) => {
                warn!("Chat turn failed: {}", e);
                format!("An error occurred: {}", e)
            }
        }
    }
}

// ── OpenAI chat completions ───────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content:       Option<String>,
    #[serde(default)]
    function_call: Option<RawFunctionCall>,
}

#[derive(Debug, Deserialize)]
struct RawFunctionCall {
    name:      String,
    /// JSON object encoded as a string.
    arguments: String,
}

fn parse_completion(body: &str) -> Result<AssistantReply> {
    let resp: CompletionResponse = serde_json::from_str(body)?;
    let message = resp
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| EngineError::Parse("completion has no choices".into()))?
        .message;

    match message.function_call {
        Some(call) => {
            let arguments: Value = if call.arguments.trim().is_empty() {
                json!({})
            } else {
                serde_json::from_str(&call.arguments)?
            };
            Ok(AssistantReply::FunctionCall { name: call.name, arguments, preamble: message.content })
        }
        None => Ok(AssistantReply::Text(message.content.unwrap_or_default())),
    }
}

pub struct OpenAiChatClient {
    client:      Client,
    api_key:     String,
    base_url:    String,
    model:       String,
    temperature: f64,
}

impl OpenAiChatClient {
    pub fn new(api_key: &str, base_url: &str, model: &str, temperature: f64) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()?;
        Ok(Self {
            client,
            api_key:  api_key.to_owned(),
            base_url: base_url.trim_end_matches('/').to_owned(),
            model:    model.to_owned(),
            temperature,
        })
    }

    pub fn from_config(cfg: &AppConfig) -> Result<Self> {
        if cfg.openai_api_key.is_empty() {
            return Err(EngineError::Config("OPENAI_API_KEY not set".into()));
        }
        Self::new(&cfg.openai_api_key, &cfg.openai_url, &cfg.openai_model, cfg.openai_temperature)
    }
}

#[async_trait]
impl ChatCompletion for OpenAiChatClient {
    async fn complete(&self, messages: &[ChatMessage], functions: &[Value]) -> Result<AssistantReply> {
        let body = json!({
            "model": self.model,
            "messages": messages,
            "functions": functions,
            "function_call": "auto",
            "temperature": self.temperature,
        });
        debug!("chat completion: {} messages, model {}", messages.len(), self.model);

        let resp = self.client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        let text = resp.text().await?;
        if !status.is_success() {
            return Err(match status.as_u16() {
                401 | 403 => EngineError::Auth,
                429 => EngineError::RateLimited,
                code => EngineError::Remote { status: code, body: text },
            });
        }

        let reply = parse_completion(&text)?;
        if let AssistantReply::FunctionCall { name, .. } = &reply {
            info!("Model requested function {}", name);
        }
        Ok(reply)
    }
}
