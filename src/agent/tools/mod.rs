use std::path::PathBuf;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::models::{FunctionSpec, ToolSpec};

pub mod file_tools;
pub mod message_tools;

pub const DEFAULT_READ_BYTES: usize = 65536;
pub const DEFAULT_LIST_MAX: usize = 200;

/// Every tool the model may call. Adding a tool means adding a variant, a catalog entry
/// and a match arm in [`WorkspaceTools::dispatch`].
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(tag = "name", content = "arguments", rename_all = "snake_case")]
pub enum ToolRequest {
    SendMessage { text: String },
    ReadFile { path: String, #[serde(default)] max_bytes: Option<usize> },
    WriteFile { path: String, content: String },
    ListFiles { #[serde(default)] max: Option<usize> },
    SearchFiles { pattern: String, #[serde(default)] max: Option<usize> },
}

impl ToolRequest {
    pub fn parse(name: &str, args: Value) -> anyhow::Result<Self> {
        serde_json::from_value(json!({ "name": name, "arguments": args }))
            .map_err(|e| anyhow::anyhow!("invalid call to {name}: {e}"))
    }
}

fn function(name: &'static str, description: &'static str, parameters: Value) -> ToolSpec {
    ToolSpec { kind: "function", function: FunctionSpec { name, description, parameters } }
}

pub fn catalog() -> Vec<ToolSpec> {
    vec![
        function(
            "send_message",
            "Send a message to the current chat immediately, before the final answer. Use for progress updates or multiple messages.",
            json!({
                "type": "object",
                "properties": { "text": { "type": "string", "description": "Message text" } },
                "required": ["text"]
            }),
        ),
        function(
            "read_file",
            "Read a text file from the group workspace.",
            json!({
                "type": "object",
                "properties": {
                    "path": { "type": "string", "description": "Path relative to the workspace" },
                    "max_bytes": { "type": "integer", "minimum": 1 }
                },
                "required": ["path"]
            }),
        ),
        function(
            "write_file",
            "Create or overwrite a file in the group workspace.",
            json!({
                "type": "object",
                "properties": {
                    "path": { "type": "string", "description": "Path relative to the workspace" },
                    "content": { "type": "string" }
                },
                "required": ["path", "content"]
            }),
        ),
        function(
            "list_files",
            "List files in the group workspace.",
            json!({
                "type": "object",
                "properties": { "max": { "type": "integer", "minimum": 1 } }
            }),
        ),
        function(
            "search_files",
            "Find workspace files whose relative path matches a regular expression.",
            json!({
                "type": "object",
                "properties": {
                    "pattern": { "type": "string" },
                    "max": { "type": "integer", "minimum": 1 }
                },
                "required": ["pattern"]
            }),
        ),
    ]
}

#[async_trait]
pub trait ToolDispatcher: Send + Sync {
    fn catalog(&self) -> Vec<ToolSpec>;
    async fn invoke(&self, name: &str, args: Value, chat_jid: &str) -> anyhow::Result<String>;
}

pub struct ToolContext<'a> {
    pub chat_jid: &'a str,
    pub group_folder: &'a str,
    pub workspace: &'a std::path::Path,
    pub outbox: &'a std::path::Path,
}

#[derive(Debug, Clone)]
pub struct WorkspaceTools {
    pub workspace: PathBuf,
    pub outbox: PathBuf,
    pub group_folder: String,
}

impl WorkspaceTools {
    pub fn new(workspace: impl Into<PathBuf>, outbox: impl Into<PathBuf>, group_folder: impl Into<String>) -> Self {
        Self { workspace: workspace.into(), outbox: outbox.into(), group_folder: group_folder.into() }
    }

    pub fn dispatch(&self, ctx: &ToolContext<'_>, request: ToolRequest) -> anyhow::Result<String> {
        match request {
            ToolRequest::SendMessage { text } => message_tools::send_message(ctx, &text),
            ToolRequest::ReadFile { path, max_bytes } => {
                file_tools::read(ctx, &path, max_bytes.unwrap_or(DEFAULT_READ_BYTES))
            }
            ToolRequest::WriteFile { path, content } => file_tools::write(ctx, &path, &content),
            ToolRequest::ListFiles { max } => file_tools::list(ctx, max.unwrap_or(DEFAULT_LIST_MAX)),
            ToolRequest::SearchFiles { pattern, max } => {
                file_tools::search(ctx, &pattern, max.unwrap_or(DEFAULT_LIST_MAX))
            }
        }
    }
}

#[async_trait]
impl ToolDispatcher for WorkspaceTools {
    fn catalog(&self) -> Vec<ToolSpec> { catalog() }

    async fn invoke(&self, name: &str, args: Value, chat_jid: &str) -> anyhow::Result<String> {
        let request = ToolRequest::parse(name, args)?;
        let tools = self.clone();
        let chat_jid = chat_jid.to_string();
        // Workspace walks and file IO block; keep them off the runtime thread.
        tokio::task::spawn_blocking(move || {
            let ctx = ToolContext {
                chat_jid: &chat_jid,
                group_folder: &tools.group_folder,
                workspace: &tools.workspace,
                outbox: &tools.outbox,
            };
            tools.dispatch(&ctx, request)
        })
        .await?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn catalog_covers_every_variant() {
        let names: Vec<_> = catalog().iter().map(|t| t.function.name).collect();
        assert_eq!(names, vec!["send_message", "read_file", "write_file", "list_files", "search_files"]);
        for name in names {
            // Every advertised name must map to a variant; argument errors are fine here.
            let err = ToolRequest::parse(name, json!({})).err().map(|e| e.to_string()).unwrap_or_default();
            assert!(!err.contains("unknown variant"), "{name}: {err}");
        }
    }

    #[test]
    fn parse_maps_arguments_and_defaults() {
        assert_eq!(
            ToolRequest::parse("read_file", json!({"path": "a.txt"})).unwrap(),
            ToolRequest::ReadFile { path: "a.txt".into(), max_bytes: None }
        );
        assert_eq!(ToolRequest::parse("list_files", json!({})).unwrap(), ToolRequest::ListFiles { max: None });
    }

    #[test]
    fn unknown_tool_and_missing_arguments_are_errors() {
        let err = ToolRequest::parse("launch_rockets", json!({})).unwrap_err();
        assert!(err.to_string().contains("launch_rockets"));
        assert!(ToolRequest::parse("write_file", json!({"path": "x"})).is_err());
    }

    #[tokio::test]
    async fn invoke_round_trips_through_workspace() {
        let dir = tempdir().unwrap();
        let workspace = dir.path().join("group");
        std::fs::create_dir_all(&workspace).unwrap();
        let tools = WorkspaceTools::new(&workspace, dir.path().join("messages"), "g");

        let wrote = tools.invoke("write_file", json!({"path": "notes/a.md", "content": "hi"}), "c@g.us").await.unwrap();
        assert!(wrote.contains("notes/a.md"));
        let read = tools.invoke("read_file", json!({"path": "notes/a.md"}), "c@g.us").await.unwrap();
        assert_eq!(read, "hi");
        assert!(tools.invoke("read_file", json!({"path": "../../etc/passwd"}), "c@g.us").await.is_err());
        let listed = tools.invoke("list_files", json!({}), "c@g.us").await.unwrap();
        assert!(listed.contains("a.md"));
    }
}
