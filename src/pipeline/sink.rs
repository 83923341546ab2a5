use std::{io, path::Path};

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("encoder stdin pipe unavailable")]
    StdinUnavailable,

    #[error("failed to prepare output directory {path}: {source}")]
    OutputDir {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("write to encoder failed: {0}")]
    Io(#[from] io::Error),

    #[error("encoder input already closed")]
    Closed,

    #[error("encoder exited abnormally: {0}")]
    AbnormalExit(String),
}

/// Destination for the raw frames of one recording episode.
#[async_trait]
pub trait FrameSink: Send {
    /// Forwards one encoded frame, returning how many bytes were accepted.
    async fn write(&mut self, frame: &[u8]) -> Result<usize, SinkError>;

    /// Signals end of input and waits for the encoder to finish the file.
    /// Calling it again after it returned is a no-op.
    async fn stop(&mut self) -> Result<(), SinkError>;

    /// Whether the backing encoder has already gone away.
    fn has_exited(&self) -> bool;
}

/// Creates a fresh [`FrameSink`] for each recording episode.
#[async_trait]
pub trait SinkLauncher: Send + Sync {
    async fn launch(&self, label: &str, output_path: &Path)
        -> Result<Box<dyn FrameSink>, SinkError>;
}
