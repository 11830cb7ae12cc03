use std::path::PathBuf;

/// Every failure the puzzle pipeline can report to its caller.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("Failed to decompress dataset: {0}")]
    Decode(String),

    #[error("Failed to parse dataset: {0}")]
    Parse(String),

    #[error("Malformed row at line {line}: {reason}")]
    MalformedRow { line: u64, reason: String },

    #[error("Invalid position in puzzle {puzzle}: {reason}")]
    InvalidPosition { puzzle: String, reason: String },

    #[error("Invalid move {uci} at ply {ply} in puzzle {puzzle}: {reason}")]
    InvalidMove {
        puzzle: String,
        ply: usize,
        uci: String,
        reason: String,
    },

    #[error("Output file name template is empty")]
    EmptyFilename,

    #[error("Invalid export job: {0}")]
    InvalidExportJob(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Background task failed: {0}")]
    TaskJoin(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<tokio::task::JoinError> for Error {
    fn from(err: tokio::task::JoinError) -> Self {
        Error::TaskJoin(err.to_string())
    }
}

// UI layers receive errors as plain messages.
impl serde::Serialize for Error {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::ser::Serializer,
    {
        serializer.serialize_str(self.to_string().as_ref())
    }
}
