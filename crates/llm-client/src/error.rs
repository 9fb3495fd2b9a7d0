//! User-visible failure classes for panel operations.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PanelError {
    /// A required form field is empty after trimming.
    #[error("Заполните все поля")]
    MissingFields,

    #[error("HTTP {status}: {reason}")]
    Http { status: u16, reason: String },

    #[error("{0}")]
    Transport(#[from] reqwest::Error),

    #[error("No active execution session. Open a notebook first")]
    NoSession,

    #[error("Unsupported kernel language: {0}")]
    UnsupportedLanguage(String),

    /// The synthesized snippet printed an error marker.
    #[error("Kernel error: {0}")]
    Kernel(String),

    #[error("Failed to execute in kernel: {0}")]
    Execution(#[source] anyhow::Error),

    #[error("No active notebook found")]
    NoActiveDocument,

    #[error("No active cell found")]
    NoActiveCell,

    #[error("No response to insert")]
    NoResponse,

    #[error("Failed to insert to cell")]
    InsertFailed,

    #[error("Failed to encode request: {0}")]
    Encode(#[from] serde_json::Error),
}

impl PanelError {
    /// Status line shown in the panel for this error.
    pub fn status_text(&self) -> String {
        match self {
            PanelError::Http { .. } | PanelError::Transport(_) => format!("❌ Error: {}", self),
            _ => format!("❌ {}", self),
        }
    }
}
