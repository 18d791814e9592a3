use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

mod agent;
mod control;
mod discovery;
mod error;
mod file_ops;
mod models;
mod output;
mod prompt;
mod runner;
mod session;
mod settings;
mod storage;

use settings::RunnerPaths;

#[derive(Debug, Parser)]
#[command(name = "agent_runner")]
#[command(about = "Single-session chat agent worker driven over stdin/stdout and a file mailbox", long_about = None)]
struct Cli {
    #[arg(long, env = "RUNNER_IPC_INPUT_DIR", default_value = "/workspace/ipc/input")]
    ipc_input_dir: PathBuf,
    #[arg(long, env = "RUNNER_CLOSE_SENTINEL", default_value = "/workspace/ipc/input/_close")]
    close_sentinel: PathBuf,
    #[arg(long, env = "RUNNER_IPC_MESSAGES_DIR", default_value = "/workspace/ipc/messages")]
    ipc_messages_dir: PathBuf,
    #[arg(long, env = "RUNNER_GROUP_DIR", default_value = "/workspace/group")]
    group_dir: PathBuf,
    #[arg(long, env = "RUNNER_GLOBAL_DIR", default_value = "/workspace/global")]
    global_dir: PathBuf,
    #[arg(long, env = "RUNNER_HISTORY_FILE", default_value = "/workspace/group/conversations/history.jsonl")]
    history_file: PathBuf,
    #[arg(long, env = "RUNNER_STAGING_FILE", default_value = "/tmp/input.json")]
    staging_file: PathBuf,
    #[arg(long, env = "RUNNER_POLL_INTERVAL_MS", default_value_t = control::DEFAULT_POLL_INTERVAL.as_millis() as u64)]
    poll_interval_ms: u64,
}

impl From<Cli> for RunnerPaths {
    fn from(cli: Cli) -> Self {
        Self {
            ipc_input_dir: cli.ipc_input_dir,
            close_sentinel: cli.close_sentinel,
            ipc_messages_dir: cli.ipc_messages_dir,
            group_dir: cli.group_dir,
            global_dir: cli.global_dir,
            history_file: cli.history_file,
            staging_file: cli.staging_file,
            poll_interval: Duration::from_millis(cli.poll_interval_ms),
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    // stdout is reserved for output frames.
    fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let paths = RunnerPaths::from(Cli::parse());
    let mut out = output::OutputFramer::stdout();
    match runner::run(paths, tokio::io::stdin(), &mut out).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => ExitCode::from(e.exit_code()),
    }
}
