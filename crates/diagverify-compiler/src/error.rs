use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum InvokeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("No compiler configured: set [compiler] preset or command, or pass --compiler")]
    NoCommand,
    #[error("Unknown compiler preset '{0}'")]
    UnknownPreset(String),
    #[error("Compiler '{program}' not found on PATH")]
    NotFound { program: String },
    #[error("Failed to start compiler '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Compiler '{}' failed with {}{}", .program, .status, format_stderr_tail(.stderr_tail))]
    InternalFault {
        program: String,
        status: String,
        stderr_tail: String,
    },
    #[error("Compiler '{}' timed out after {}s", .program, .timeout.as_secs())]
    Timeout { program: String, timeout: Duration },
}

impl InvokeError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, InvokeError::Timeout { .. })
    }
}

fn format_stderr_tail(tail: &str) -> String {
    if tail.is_empty() {
        String::new()
    } else {
        format!(":\n{}", tail)
    }
}
