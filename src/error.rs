use thiserror::Error;

/// Malformed mechanism payload. Aborts the current AUTH attempt only.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum CodecError {
    #[error("invalid base64")]
    InvalidBase64,
    #[error("malformed PLAIN response")]
    MalformedPlain,
    #[error("malformed CRAM-MD5 response")]
    MalformedCram,
}

/// Failures that end a session. None of them reach the accept loop.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("line exceeds {limit} bytes")]
    LineTooLong { limit: usize },
    #[error("stream error: {0}")]
    Stream(#[from] std::io::Error),
    #[error("idle timeout")]
    Timeout,
}
