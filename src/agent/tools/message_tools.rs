use chrono::Utc;
use serde_json::json;
use uuid::Uuid;

use super::ToolContext;

/// Queues an outbound chat message for the host. File names are time-prefixed so the
/// host delivers them in order.
pub fn send_message(ctx: &ToolContext<'_>, text: &str) -> anyhow::Result<String> {
    if text.trim().is_empty() {
        anyhow::bail!("message text is empty");
    }
    let now = Utc::now();
    let payload = json!({
        "type": "message",
        "chatJid": ctx.chat_jid,
        "text": text,
        "groupFolder": ctx.group_folder,
        "timestamp": now.to_rfc3339(),
    });
    let simple = Uuid::new_v4().simple().to_string();
    let file_name = format!("{}-{}.json", now.timestamp_millis(), &simple[..8]);
    let path = crate::file_ops::write_json_atomic(ctx.outbox, &file_name, &payload)?;
    tracing::info!(chat_jid = ctx.chat_jid, path = %path.display(), "queued outbound message");
    Ok("Message sent.".into())
}
