use std::path::PathBuf;

use thiserror::Error;

/// Everything that can go wrong during a single poll cycle
#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("radar API returned error status: {0}")]
    Status(reqwest::StatusCode),

    #[error("failed to parse radar response: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("{}: {source}", path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write csv row: {0}")]
    Csv(#[from] csv::Error),
}

impl TrackerError {
    pub fn filesystem(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Filesystem {
            path: path.into(),
            source,
        }
    }

    /// Coarse category used in log lines
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Network(_) | Self::Status(_) => "network",
            Self::Parse(_) => "parse",
            Self::Filesystem { .. } | Self::Csv(_) => "filesystem",
        }
    }
}
