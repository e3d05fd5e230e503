//! CLI-specific error types and exit code mapping

use runpost_core::error::RunpostError;
use runpost_supervisor::SupervisorError;

/// CLI-specific error type.
///
/// Each variant carries enough context for a user-friendly message.
/// The `exit_code()` method maps errors to process exit codes.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Configuration, rule, or argument validation failure.
    #[error("configuration error: {0}")]
    Config(String),

    /// The supervised command failed or was cancelled.
    #[error("{0}")]
    Command(String),

    /// The supervised command timed out (idle or total runtime).
    #[error("{0}")]
    Timeout(String),

    /// JSON serialisation failed during output rendering.
    #[error("json output error: {0}")]
    JsonSerialize(#[from] serde_json::Error),

    /// IO error (file read, stdout write, etc.).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl CliError {
    /// Map the error to a process exit code.
    ///
    /// | Code | Meaning                        |
    /// |------|--------------------------------|
    /// | 0    | Success                        |
    /// | 1    | Command failed or cancelled    |
    /// | 2    | Configuration error            |
    /// | 3    | Timeout (idle or run)          |
    /// | 10   | IO error                       |
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) => 2,
            Self::Timeout(_) => 3,
            Self::Io(_) => 10,
            Self::JsonSerialize(_) | Self::Command(_) => 1,
        }
    }
}

impl From<RunpostError> for CliError {
    fn from(err: RunpostError) -> Self {
        match err {
            RunpostError::Config(e) => Self::Config(e.to_string()),
            RunpostError::Timeout(e) => Self::Timeout(e.to_string()),
            RunpostError::Command(e) => Self::Command(e.to_string()),
            RunpostError::Io(e) => Self::Io(e),
        }
    }
}

impl From<SupervisorError> for CliError {
    fn from(err: SupervisorError) -> Self {
        RunpostError::from(err).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use runpost_core::types::TimeoutKind;

    #[test]
    fn test_exit_code_config_error() {
        let err = CliError::Config("bad value".to_owned());
        assert_eq!(err.exit_code(), 2, "config error should return exit code 2");
    }

    #[test]
    fn test_exit_code_command_error() {
        let err = CliError::Command("command failed".to_owned());
        assert_eq!(
            err.exit_code(),
            1,
            "command error should return exit code 1"
        );
    }

    #[test]
    fn test_exit_code_timeout_error() {
        let err = CliError::Timeout("timed out".to_owned());
        assert_eq!(
            err.exit_code(),
            3,
            "timeout should return a distinct exit code"
        );
    }

    #[test]
    fn test_exit_code_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err = CliError::Io(io_err);
        assert_eq!(err.exit_code(), 10, "io error should return exit code 10");
    }

    #[test]
    fn supervisor_timeout_maps_to_timeout_exit_code() {
        let err: CliError = SupervisorError::Timeout {
            command: "sleep 10".to_owned(),
            kind: TimeoutKind::Run,
            elapsed_secs: 5.0,
            limit_secs: 4,
        }
        .into();
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn supervisor_rule_error_maps_to_config_exit_code() {
        let err: CliError = SupervisorError::RuleValidation {
            index: 0,
            reason: "severity is required".to_owned(),
        }
        .into();
        assert_eq!(err.exit_code(), 2);
    }
}
