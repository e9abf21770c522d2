use std::fmt;

/// Why a command did not succeed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// Stopped on request (Ctrl-C). Work done so far is kept.
    Cancelled,
    Failed(String),
}

impl CommandError {
    pub fn exit_code(&self) -> i32 {
        match self {
            CommandError::Cancelled => 130,
            CommandError::Failed(_) => 1,
        }
    }
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandError::Cancelled => write!(f, "Cancelled"),
            CommandError::Failed(message) => write!(f, "{message}"),
        }
    }
}

impl From<String> for CommandError {
    fn from(message: String) -> Self {
        CommandError::Failed(message)
    }
}

impl From<resxsync::Error> for CommandError {
    fn from(err: resxsync::Error) -> Self {
        if err.is_cancellation() {
            CommandError::Cancelled
        } else {
            CommandError::Failed(err.to_string())
        }
    }
}
