use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::agent::tools::ToolDispatcher;
use crate::models::{ChatMessage, CompletionRequest, CompletionService};
use crate::session::{Message, ToolCall};
use crate::storage::HistoryRepository;

pub const MAX_ROUNDS: usize = 15;
pub const NO_RESPONSE_TEXT: &str = "No response from the model.";
pub const MAX_ROUNDS_TEXT: &str =
    "I stopped after reaching the maximum number of tool rounds without a final answer.";

static THINK_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<think>.*?</think>").expect("static regex"));

pub struct AgentContext<'a> {
    pub model: &'a dyn CompletionService,
    pub tools: &'a dyn ToolDispatcher,
    pub history: &'a dyn HistoryRepository,
    pub model_name: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnOutcome {
    pub text: String,
    pub rounds: usize,
    pub tool_calls: usize,
    /// False for the no-response and round-cap fallbacks, which are not persisted.
    pub completed: bool,
}

pub fn strip_reasoning(text: &str) -> String {
    THINK_BLOCK.replace_all(text, "").trim().to_string()
}

fn parse_arguments(raw: &str) -> Value {
    match serde_json::from_str::<Value>(raw) {
        Ok(v @ Value::Object(_)) => v,
        _ => Value::Object(Default::default()),
    }
}

async fn run_tool(ctx: &AgentContext<'_>, call: &ToolCall, chat_jid: &str) -> String {
    let name = call.function.name.as_str();
    let args = parse_arguments(&call.function.arguments);
    metrics::counter!("agent_tool_calls_total").increment(1);
    match ctx.tools.invoke(name, args, chat_jid).await {
        Ok(result) => {
            debug!(tool = name, call_id = %call.id, bytes = result.len(), "tool finished");
            result
        }
        Err(e) => {
            warn!(tool = name, call_id = %call.id, error = %e, "tool failed");
            format!("Error: {e:#}")
        }
    }
}

async fn finish(ctx: &AgentContext<'_>, content: &str, rounds: usize, tool_calls: usize) -> anyhow::Result<TurnOutcome> {
    let text = strip_reasoning(content);
    ctx.history.append(&Message::assistant(text.clone())).await?;
    info!(rounds, tool_calls, chars = text.len(), "turn complete");
    Ok(TurnOutcome { text, rounds, tool_calls, completed: true })
}

/// Runs one user turn through the tool-calling loop.
///
/// Only the user message and a completed assistant answer are written to history;
/// intermediate tool traffic lives in the working set for this turn only.
pub async fn run_turn(
    ctx: &AgentContext<'_>,
    system_prompt: &str,
    user_text: &str,
    chat_jid: &str,
) -> anyhow::Result<TurnOutcome> {
    let mut history = ctx.history.load().await?;
    let user = Message::user(user_text);
    ctx.history.append(&user).await?;
    history.push(user);

    let mut messages = Vec::with_capacity(history.len() + 1);
    messages.push(ChatMessage::system(system_prompt));
    messages.extend(history.iter().map(ChatMessage::from));

    let tools = ctx.tools.catalog();
    let mut tool_calls = 0;

    for round in 1..=MAX_ROUNDS {
        metrics::counter!("agent_rounds_total").increment(1);
        let req = CompletionRequest { model: ctx.model_name, messages: &messages, tools: &tools };
        let Some(choice) = ctx.model.complete(req).await? else {
            warn!(round, "completion returned no choice");
            metrics::counter!("agent_fallbacks_total", "kind" => "no_response").increment(1);
            return Ok(TurnOutcome { text: NO_RESPONSE_TEXT.into(), rounds: round, tool_calls, completed: false });
        };

        let assistant = choice.message;
        let calls = assistant.tool_calls.clone();
        let content = assistant.text().to_string();
        messages.push(assistant);

        if calls.is_empty() {
            return finish(ctx, &content, round, tool_calls).await;
        }

        debug!(round, requested = calls.len(), "executing tool calls");
        for call in &calls {
            let result = run_tool(ctx, call, chat_jid).await;
            messages.push(ChatMessage::tool_result(call, result));
            tool_calls += 1;
        }

        if choice.finish_reason.as_deref() == Some("stop") {
            return finish(ctx, &content, round, tool_calls).await;
        }
    }

    warn!(rounds = MAX_ROUNDS, tool_calls, "round cap reached");
    metrics::counter!("agent_fallbacks_total", "kind" => "max_rounds").increment(1);
    Ok(TurnOutcome { text: MAX_ROUNDS_TEXT.into(), rounds: MAX_ROUNDS, tool_calls, completed: false })
}
