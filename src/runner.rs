use std::io::Write;

use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{error, info, warn};

use crate::agent::engine::{run_turn, AgentContext};
use crate::agent::tools::WorkspaceTools;
use crate::control::{ControlChannel, NextInput};
use crate::error::RunnerError;
use crate::models::OpenAICompatible;
use crate::output::{OutputFramer, OutputRecord};
use crate::prompt::{build_system_prompt, initial_prompt};
use crate::session::{ContainerInput, Session};
use crate::settings::{resolve_model_settings, RunnerPaths, SettingsLayer};
use crate::storage::JsonlHistoryStore;

/// Everything resolved before the first turn runs.
#[derive(Debug)]
pub struct Startup {
    pub session: Session,
    pub input: ContainerInput,
    pub system_prompt: String,
    pub prompt: String,
}

impl Startup {
    /// Consumes messages the host queued before the session began and folds them into the
    /// first prompt. Run this only once nothing else can fail before the first turn.
    pub async fn fold_pending(&mut self, control: &ControlChannel) {
        let pending = control.drain().await.unwrap_or_else(|e| {
            warn!(error = %e, "could not drain pending messages at startup");
            Vec::new()
        });
        if !pending.is_empty() {
            info!(count = pending.len(), "folding pending messages into the initial prompt");
        }
        self.prompt = initial_prompt(&self.input.prompt, self.input.is_scheduled_task.unwrap_or(false), &pending);
    }
}

enum Phase {
    Running(String),
    AwaitingInput,
    Closed,
}

fn emit<W: Write>(out: &mut OutputFramer<W>, record: &OutputRecord) -> Result<(), RunnerError> {
    out.emit(record).map_err(RunnerError::Output)
}

/// Reports a fatal error to the host, then hands it back for the exit status.
fn fail<W: Write>(out: &mut OutputFramer<W>, err: RunnerError, session_id: Option<&str>) -> RunnerError {
    error!(session_id, error = %err, "session failed");
    if let Err(e) = out.emit(&OutputRecord::error(err.to_string(), session_id)) {
        error!(error = %e, "could not emit error frame");
    }
    err
}

async fn remove_staging_file(paths: &RunnerPaths) {
    match tokio::fs::remove_file(&paths.staging_file).await {
        Ok(()) => info!(path = %paths.staging_file.display(), "removed staging input"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %paths.staging_file.display(), error = %e, "could not remove staging input"),
    }
}

pub async fn start<R, W>(
    paths: &RunnerPaths,
    mut reader: R,
    out: &mut OutputFramer<W>,
) -> Result<Startup, RunnerError>
where
    R: AsyncRead + Unpin,
    W: Write,
{
    let mut raw = String::new();
    if let Err(e) = reader.read_to_string(&mut raw).await {
        return Err(fail(out, RunnerError::Startup(e.into()), None));
    }
    let input: ContainerInput = match serde_json::from_str(&raw) {
        Ok(input) => input,
        Err(e) => return Err(fail(out, RunnerError::InvalidInput(e), None)),
    };
    remove_staging_file(paths).await;

    let session = Session::new(&input);
    info!(
        session_id = %session.id,
        chat_jid = %session.chat_jid,
        group = %session.group_folder,
        is_main = session.is_main,
        "session starting"
    );

    let system_prompt = build_system_prompt(
        &paths.group_dir,
        &paths.global_dir,
        input.is_main,
        input.assistant_name.as_deref(),
        session.started_at,
    )
    .await;

    let prompt = initial_prompt(&input.prompt, input.is_scheduled_task.unwrap_or(false), &[]);

    Ok(Startup { session, input, system_prompt, prompt })
}

pub async fn serve<W: Write>(
    startup: Startup,
    agent: &AgentContext<'_>,
    control: &ControlChannel,
    out: &mut OutputFramer<W>,
) -> Result<(), RunnerError> {
    let Startup { session, system_prompt, prompt, .. } = startup;
    let sid = session.id.as_str();
    let mut phase = Phase::Running(prompt);
    let mut turns = 0usize;

    loop {
        phase = match phase {
            Phase::Running(text) => {
                turns += 1;
                info!(session_id = sid, turn = turns, chars = text.len(), "turn started");
                let outcome = match run_turn(agent, &system_prompt, &text, &session.chat_jid).await {
                    Ok(outcome) => outcome,
                    Err(e) => return Err(fail(out, RunnerError::Turn(e), Some(sid))),
                };
                emit(out, &OutputRecord::success(outcome.text, sid))?;
                if control.should_close().await {
                    Phase::Closed
                } else {
                    emit(out, &OutputRecord::heartbeat(sid))?;
                    Phase::AwaitingInput
                }
            }
            Phase::AwaitingInput => match control.wait_for_next().await {
                Ok(NextInput::Message(text)) => Phase::Running(text),
                Ok(NextInput::Closed) => Phase::Closed,
                Err(e) => return Err(fail(out, RunnerError::Turn(e), Some(sid))),
            },
            Phase::Closed => {
                info!(session_id = sid, turns, "close requested, ending session");
                return Ok(());
            }
        };
    }
}

/// Full production wiring: stdin payload in, framed results out.
pub async fn run<R, W>(paths: RunnerPaths, reader: R, out: &mut OutputFramer<W>) -> Result<(), RunnerError>
where
    R: AsyncRead + Unpin,
    W: Write,
{
    let control = ControlChannel::new(&paths.ipc_input_dir, &paths.close_sentinel, paths.poll_interval);
    let mut startup = start(&paths, reader, out).await?;

    let secrets = SettingsLayer::from_map(startup.input.secrets.take().unwrap_or_default());
    let settings = resolve_model_settings(&secrets, &SettingsLayer::from_env());
    let model = match OpenAICompatible::new(&settings) {
        Ok(model) => model,
        Err(e) => return Err(fail(out, RunnerError::Startup(e), Some(startup.session.id.as_str()))),
    };
    info!(model = %settings.model, base_url = %settings.base_url, "completion endpoint configured");

    let tools = WorkspaceTools::new(&paths.group_dir, &paths.ipc_messages_dir, startup.session.group_folder.clone());
    let history = JsonlHistoryStore::new(&paths.history_file);
    startup.fold_pending(&control).await;
    let agent = AgentContext { model: &model, tools: &tools, history: &history, model_name: &settings.model };
    serve(startup, &agent, &control, out).await
}
