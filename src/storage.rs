use std::path::{Path, PathBuf};

use anyhow::Context;
use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

use crate::session::Message;

/// Number of most recent records loaded into model context.
pub const HISTORY_LIMIT: usize = 50;

#[async_trait]
pub trait HistoryRepository: Send + Sync {
    async fn load(&self) -> anyhow::Result<Vec<Message>>;
    async fn append(&self, msg: &Message) -> anyhow::Result<()>;
}

/// Append-only JSONL conversation log, one message per line.
#[derive(Debug, Clone)]
pub struct JsonlHistoryStore {
    path: PathBuf,
}

impl JsonlHistoryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

fn parse_lines(raw: &str, path: &Path) -> Vec<Message> {
    let mut out = Vec::new();
    for (idx, line) in raw.lines().enumerate() {
        if line.trim().is_empty() { continue; }
        match serde_json::from_str::<Message>(line) {
            Ok(m) => out.push(m),
            Err(e) => tracing::warn!(path = %path.display(), line = idx + 1, error = %e, "skipping malformed history line"),
        }
    }
    out
}

fn keep_last<T>(mut items: Vec<T>, limit: usize) -> Vec<T> {
    if items.len() > limit {
        items.drain(..items.len() - limit);
    }
    items
}

#[async_trait]
impl HistoryRepository for JsonlHistoryStore {
    async fn load(&self) -> anyhow::Result<Vec<Message>> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(s) => s,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e).with_context(|| format!("reading history {}", self.path.display())),
        };
        let messages = keep_last(parse_lines(&raw, &self.path), HISTORY_LIMIT);
        tracing::debug!(path = %self.path.display(), loaded = messages.len(), "history loaded");
        Ok(messages)
    }

    async fn append(&self, msg: &Message) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("creating history dir {}", parent.display()))?;
        }
        let mut line = serde_json::to_string(msg)?;
        line.push('\n');
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .with_context(|| format!("opening history {}", self.path.display()))?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        file.sync_data().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Role;
    use tempfile::tempdir;

    #[tokio::test]
    async fn missing_file_loads_empty() {
        let dir = tempdir().unwrap();
        let store = JsonlHistoryStore::new(dir.path().join("none.jsonl"));
        assert!(store.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn append_creates_parent_and_survives_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested/deeper/history.jsonl");
        {
            let store = JsonlHistoryStore::new(&path);
            store.append(&Message::user("hello")).await.unwrap();
            store.append(&Message::assistant("hi there")).await.unwrap();
        }
        let reopened = JsonlHistoryStore::new(&path);
        let got = reopened.load().await.unwrap();
        assert_eq!(got.len(), 2);
        assert_eq!(got[0].role, Role::User);
        assert_eq!(got[0].content, "hello");
        assert_eq!(got[1].role, Role::Assistant);
        assert_eq!(got[1].content, "hi there");
    }

    #[tokio::test]
    async fn load_returns_last_fifty_in_order() {
        let dir = tempdir().unwrap();
        let store = JsonlHistoryStore::new(dir.path().join("h.jsonl"));
        for i in 0..73 {
            store.append(&Message::user(format!("m{i}"))).await.unwrap();
        }
        let got = store.load().await.unwrap();
        assert_eq!(got.len(), HISTORY_LIMIT);
        assert_eq!(got.first().unwrap().content, "m23");
        assert_eq!(got.last().unwrap().content, "m72");
        for (offset, m) in got.iter().enumerate() {
            assert_eq!(m.content, format!("m{}", 23 + offset));
        }
    }

    #[tokio::test]
    async fn malformed_line_is_skipped_and_later_lines_survive() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("h.jsonl");
        let store = JsonlHistoryStore::new(&path);
        store.append(&Message::user("one")).await.unwrap();
        store.append(&Message::assistant("two")).await.unwrap();
        {
            use std::io::Write;
            let mut f = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
            writeln!(f, "{{not json at all").unwrap();
            writeln!(f).unwrap();
        }
        store.append(&Message::user("three")).await.unwrap();

        let got = store.load().await.unwrap();
        let contents: Vec<_> = got.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["one", "two", "three"]);
    }

    #[tokio::test]
    async fn append_never_truncates_existing_content() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("h.jsonl");
        let store = JsonlHistoryStore::new(&path);
        store.append(&Message::user("a")).await.unwrap();
        let before = std::fs::read_to_string(&path).unwrap();
        store.append(&Message::user("b")).await.unwrap();
        let after = std::fs::read_to_string(&path).unwrap();
        assert!(after.starts_with(&before));
        assert_eq!(after.lines().count(), 2);
    }

    #[tokio::test]
    async fn append_fails_when_parent_cannot_be_created() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, b"x").unwrap();
        let store = JsonlHistoryStore::new(blocker.join("h.jsonl"));
        assert!(store.append(&Message::user("x")).await.is_err());
    }
}
