use std::path::PathBuf;
use std::time::Duration;

use crate::session::ControlMessage;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Debug, PartialEq, Eq)]
pub enum NextInput {
    Message(String),
    Closed,
}

/// Filesystem mailbox shared with the host: one JSON file per message plus a close sentinel.
#[derive(Debug, Clone)]
pub struct ControlChannel {
    input_dir: PathBuf,
    close_sentinel: PathBuf,
    poll_interval: Duration,
}

impl ControlChannel {
    pub fn new(input_dir: impl Into<PathBuf>, close_sentinel: impl Into<PathBuf>, poll_interval: Duration) -> Self {
        Self { input_dir: input_dir.into(), close_sentinel: close_sentinel.into(), poll_interval }
    }

    /// Consumes the sentinel if present.
    pub async fn should_close(&self) -> bool {
        if tokio::fs::try_exists(&self.close_sentinel).await.unwrap_or(false) {
            if let Err(e) = tokio::fs::remove_file(&self.close_sentinel).await {
                tracing::warn!(path = %self.close_sentinel.display(), error = %e, "failed to remove close sentinel");
            }
            return true;
        }
        false
    }

    async fn pending_files(&self) -> anyhow::Result<Vec<PathBuf>> {
        let mut rd = match tokio::fs::read_dir(&self.input_dir).await {
            Ok(rd) => rd,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut files = Vec::new();
        while let Some(entry) = rd.next_entry().await? {
            let path = entry.path();
            if path == self.close_sentinel { continue; }
            if path.extension().and_then(|e| e.to_str()) != Some("json") { continue; }
            files.push(path);
        }
        files.sort();
        Ok(files)
    }

    pub async fn drain(&self) -> anyhow::Result<Vec<String>> {
        let mut texts = Vec::new();
        for path in self.pending_files().await? {
            let raw = tokio::fs::read_to_string(&path).await;
            if let Err(e) = tokio::fs::remove_file(&path).await {
                tracing::warn!(path = %path.display(), error = %e, "failed to delete control file");
            }
            let parsed = raw
                .map_err(anyhow::Error::from)
                .and_then(|s| serde_json::from_str::<ControlMessage>(&s).map_err(anyhow::Error::from));
            match parsed {
                Ok(msg) => match msg.actionable_text() {
                    Some(text) => texts.push(text),
                    None => tracing::debug!(path = %path.display(), "ignoring non-actionable control file"),
                },
                Err(e) => tracing::warn!(path = %path.display(), error = %e, "discarding malformed control file"),
            }
        }
        Ok(texts)
    }

    /// Blocks until the host sends more input or closes the session. Never times out.
    pub async fn wait_for_next(&self) -> anyhow::Result<NextInput> {
        loop {
            if self.should_close().await {
                return Ok(NextInput::Closed);
            }
            let texts = self.drain().await?;
            if !texts.is_empty() {
                return Ok(NextInput::Message(texts.join("\n")));
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}
