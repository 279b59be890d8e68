//! Error taxonomy for refresh cycles and startup configuration.

use std::time::Duration;

/// Why one refresh cycle of a feed failed.
///
/// Every variant is local to the cycle that produced it: the previous
/// snapshot stays visible and the loop carries on.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("retrieval failed: {0}")]
    Retrieval(#[from] RetrievalError),

    /// A delimited record is malformed (wrong field count, bad number...).
    #[error("format error on record {record}: {message}")]
    Format { record: u64, message: String },

    #[error("decode error: {0}")]
    Decode(String),

    #[error("unknown charset {0:?}")]
    Charset(String),

    #[error("cannot parse {value:?} as {expected}")]
    TimeParse { value: String, expected: &'static str },
}

impl From<csv::Error> for LoadError {
    fn from(err: csv::Error) -> Self {
        LoadError::Format {
            record: err.position().map(|p| p.record()).unwrap_or(0),
            message: err.to_string(),
        }
    }
}

impl From<quick_xml::DeError> for LoadError {
    fn from(err: quick_xml::DeError) -> Self {
        LoadError::Decode(err.to_string())
    }
}

/// Failure of the byte retrieval collaborator.
#[derive(Debug, thiserror::Error)]
pub enum RetrievalError {
    #[error("unsupported protocol {0:?}")]
    UnsupportedScheme(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SSH error: {0}")]
    Ssh(#[from] ssh2::Error),

    #[error("retrieval timed out after {0:?}")]
    Timeout(Duration),

    #[error("retrieval task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Startup-fatal configuration problems.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("no data provided at all, please provide at least one feed location")]
    NoFeedConfigured,

    #[error("unknown timezone {0:?}")]
    Timezone(String),
}
