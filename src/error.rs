/// Process-level failures; each one ends the session with a non-zero exit.
#[derive(thiserror::Error, Debug)]
pub enum RunnerError {
    #[error("failed to parse input: {0}")]
    InvalidInput(#[from] serde_json::Error),

    #[error("startup: {0:#}")]
    Startup(anyhow::Error),

    #[error("turn failed: {0:#}")]
    Turn(anyhow::Error),

    #[error("writing output: {0:#}")]
    Output(anyhow::Error),
}

impl RunnerError {
    pub fn exit_code(&self) -> u8 {
        match self {
            RunnerError::InvalidInput(_) | RunnerError::Startup(_) => 2,
            RunnerError::Turn(_) | RunnerError::Output(_) => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_problems_exit_with_two() {
        let parse = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err = RunnerError::from(parse);
        assert_eq!(err.exit_code(), 2);
        assert!(err.to_string().starts_with("failed to parse input"));
        assert_eq!(RunnerError::Turn(anyhow::anyhow!("boom")).exit_code(), 1);
    }
}
