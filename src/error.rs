use thiserror::Error;

/// Errors surfaced by the demultiplexing core.
///
/// Malformed transport input is never an `Err`: invalid packets, continuity
/// loss and start-code mismatches are reported through return values and the
/// good/bad counters so the pipeline keeps running. Errors are reserved for
/// the stream boundaries (reading a source, writing to a sink).
#[derive(Error, Debug)]
pub enum TsplexError {
    /// I/O failure while reading a packet source or writing to a payload sink
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Structurally invalid data encountered where it cannot be skipped
    #[error("invalid data: {0}")]
    InvalidData(String),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, TsplexError>;
