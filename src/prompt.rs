use std::path::Path;

use chrono::{DateTime, Utc};

pub const DEFAULT_ASSISTANT_NAME: &str = "Andy";
pub const PROMPT_FILE: &str = "CLAUDE.md";
pub const SCHEDULED_TASK_PREFIX: &str = "[SCHEDULED TASK - The following message was sent automatically and is not coming directly from the user or group.]";

async fn read_prompt_file(dir: &Path) -> Option<String> {
    let path = dir.join(PROMPT_FILE);
    match tokio::fs::read_to_string(&path).await {
        Ok(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Ok(_) => None,
        Err(e) => {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(path = %path.display(), error = %e, "could not read prompt file");
            }
            None
        }
    }
}

fn default_prompt(assistant_name: &str) -> String {
    format!(
        "You are {assistant_name}, a personal assistant taking part in a chat conversation. \
         Answer concisely in plain text suitable for a messaging app. \
         Use the available tools when they help, and say so plainly when something fails."
    )
}

/// Builds the system prompt for a session.
///
/// Non-main groups get the shared global instructions ahead of their own; the main
/// group only reads its own file.
pub async fn build_system_prompt(
    group_dir: &Path,
    global_dir: &Path,
    is_main: bool,
    assistant_name: Option<&str>,
    now: DateTime<Utc>,
) -> String {
    let name = assistant_name.filter(|n| !n.trim().is_empty()).unwrap_or(DEFAULT_ASSISTANT_NAME);
    let mut sections = Vec::new();
    if !is_main {
        sections.extend(read_prompt_file(global_dir).await);
    }
    sections.extend(read_prompt_file(group_dir).await);
    if sections.is_empty() {
        sections.push(default_prompt(name));
    }
    sections.push(format!(
        "Runtime context:\n- Your name is {name}.\n- Current time (UTC): {}.\n- The send_message tool delivers to the chat immediately; your final answer is sent when you finish.",
        now.format("%Y-%m-%d %H:%M")
    ));
    sections.join("\n\n")
}

pub fn initial_prompt(prompt: &str, is_scheduled_task: bool, pending: &[String]) -> String {
    let mut text = if is_scheduled_task {
        format!("{SCHEDULED_TASK_PREFIX}\n\n{prompt}")
    } else {
        prompt.to_string()
    };
    if !pending.is_empty() {
        text.push('\n');
        text.push_str(&pending.join("\n"));
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn falls_back_to_default_when_no_files() {
        let dir = tempdir().unwrap();
        let prompt = build_system_prompt(&dir.path().join("g"), &dir.path().join("global"), false, Some("Bo"), Utc::now()).await;
        assert!(prompt.starts_with("You are Bo,"));
        assert!(prompt.contains("Your name is Bo."));
    }

    #[tokio::test]
    async fn non_main_puts_global_before_group() {
        let dir = tempdir().unwrap();
        let (group, global) = (dir.path().join("g"), dir.path().join("global"));
        std::fs::create_dir_all(&group).unwrap();
        std::fs::create_dir_all(&global).unwrap();
        std::fs::write(group.join(PROMPT_FILE), "group rules").unwrap();
        std::fs::write(global.join(PROMPT_FILE), "global rules").unwrap();

        let other = build_system_prompt(&group, &global, false, None, Utc::now()).await;
        assert!(other.starts_with("global rules\n\ngroup rules"));
        assert!(other.contains(DEFAULT_ASSISTANT_NAME));

        let main = build_system_prompt(&group, &global, true, None, Utc::now()).await;
        assert!(main.starts_with("group rules"));
        assert!(!main.contains("global rules"));
    }

    #[test]
    fn initial_prompt_prefixes_scheduled_tasks_and_folds_pending() {
        assert_eq!(initial_prompt("hi", false, &[]), "hi");
        let pending = vec!["a".to_string(), "b".to_string()];
        assert_eq!(initial_prompt("hi", false, &pending), "hi\na\nb");
        let scheduled = initial_prompt("report", true, &[]);
        assert!(scheduled.starts_with(SCHEDULED_TASK_PREFIX));
        assert!(scheduled.ends_with("\n\nreport"));
    }
}
