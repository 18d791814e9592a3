use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::session::{Message, Role, ToolCall};
use crate::settings::ModelSettings;

/// Wire shape of a chat-completions message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub role: Role,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: Role::System, content: Some(content.into()), name: None, tool_calls: Vec::new(), tool_call_id: None }
    }

    pub fn tool_result(call: &ToolCall, content: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: Some(content.into()),
            name: Some(call.function.name.clone()),
            tool_calls: Vec::new(),
            tool_call_id: Some(call.id.clone()),
        }
    }

    pub fn text(&self) -> &str { self.content.as_deref().unwrap_or("") }
}

impl From<&Message> for ChatMessage {
    fn from(m: &Message) -> Self {
        Self {
            role: m.role,
            content: Some(m.content.clone()),
            name: m.name.clone(),
            tool_calls: m.tool_calls.clone().unwrap_or_default(),
            tool_call_id: m.tool_call_id.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FunctionSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub parameters: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ToolSpec {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub function: FunctionSpec,
}

#[derive(Debug, Clone, Copy)]
pub struct CompletionRequest<'a> {
    pub model: &'a str,
    pub messages: &'a [ChatMessage],
    pub tools: &'a [ToolSpec],
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Choice {
    pub message: ChatMessage,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[async_trait]
pub trait CompletionService: Send + Sync {
    /// `Ok(None)` means the service answered without any choice.
    async fn complete(&self, req: CompletionRequest<'_>) -> anyhow::Result<Option<Choice>>;
}

#[derive(Clone)]
pub struct OpenAICompatible {
    base_url: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl OpenAICompatible {
    pub fn new(settings: &ModelSettings) -> anyhow::Result<Self> {
        let parsed = url::Url::parse(&settings.base_url)?;
        if !matches!(parsed.scheme(), "http" | "https") {
            anyhow::bail!("unsupported completion endpoint scheme: {}", parsed.scheme());
        }
        Ok(Self {
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            api_key: settings.api_key.clone(),
            client: reqwest::Client::new(),
        })
    }

    fn endpoint(&self) -> String { format!("{}/chat/completions", self.base_url) }
}

#[derive(Debug, Serialize)]
struct OaiChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "no_tools")]
    tools: &'a [ToolSpec],
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<&'static str>,
}

fn no_tools(tools: &&[ToolSpec]) -> bool { tools.is_empty() }

#[derive(Debug, Deserialize)]
struct OaiChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[async_trait]
impl CompletionService for OpenAICompatible {
    async fn complete(&self, req: CompletionRequest<'_>) -> anyhow::Result<Option<Choice>> {
        let body = OaiChatRequest {
            model: req.model,
            messages: req.messages,
            tools: req.tools,
            tool_choice: (!req.tools.is_empty()).then_some("auto"),
        };
        let mut rb = self.client.post(self.endpoint()).json(&body);
        if let Some(key) = &self.api_key {
            rb = rb.bearer_auth(key);
        }
        let resp = rb.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            let excerpt: String = text.chars().take(500).collect();
            anyhow::bail!("model call failed: {status}: {excerpt}");
        }
        let v: OaiChatResponse = resp.json().await?;
        Ok(v.choices.into_iter().next())
    }
}
