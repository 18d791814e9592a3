use std::io::Write;

use serde::Serialize;

// Must match the host's stream parser byte for byte.
pub const OUTPUT_START_MARKER: &str = "---NANOCLAW_OUTPUT_START---";
pub const OUTPUT_END_MARKER: &str = "---NANOCLAW_OUTPUT_END---";

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Success,
    Error,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OutputRecord {
    pub status: Status,
    pub result: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl OutputRecord {
    pub fn success(result: impl Into<String>, session_id: &str) -> Self {
        Self { status: Status::Success, result: Some(result.into()), session_id: Some(session_id.into()), error: None }
    }

    /// Result-less frame telling the host the session is alive and waiting.
    pub fn heartbeat(session_id: &str) -> Self {
        Self { status: Status::Success, result: None, session_id: Some(session_id.into()), error: None }
    }

    pub fn error(error: impl Into<String>, session_id: Option<&str>) -> Self {
        Self { status: Status::Error, result: None, session_id: session_id.map(Into::into), error: Some(error.into()) }
    }
}

pub struct OutputFramer<W: Write> {
    writer: W,
}

impl OutputFramer<std::io::Stdout> {
    pub fn stdout() -> Self { Self::new(std::io::stdout()) }
}

impl<W: Write> OutputFramer<W> {
    pub fn new(writer: W) -> Self { Self { writer } }

    pub fn emit(&mut self, record: &OutputRecord) -> anyhow::Result<()> {
        let json = serde_json::to_string(record)?;
        let frame = format!("{OUTPUT_START_MARKER}\n{json}\n{OUTPUT_END_MARKER}\n");
        self.writer.write_all(frame.as_bytes())?;
        self.writer.flush()?;
        Ok(())
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W { self.writer }
}

/// Extracts every framed payload from a captured stream, ignoring noise between frames.
#[cfg(test)]
pub fn parse_frames(stream: &str) -> Vec<serde_json::Value> {
    let mut out = Vec::new();
    let mut lines = stream.lines();
    while let Some(line) = lines.next() {
        if line != OUTPUT_START_MARKER { continue; }
        let body = lines.next().expect("payload after start marker");
        let end = lines.next().expect("end marker after payload");
        assert_eq!(end, OUTPUT_END_MARKER);
        out.push(serde_json::from_str(body).expect("valid json payload"));
    }
    out
}
