//! Failure taxonomy for the IMAP4rev1 client (§4.K).

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("not connected")]
    NotConnected,

    #[error("login rejected by server")]
    BadCredentials,

    #[error("unparseable server response: {0}")]
    BadResponse(String),

    #[error("command {tag} failed: {line}")]
    CommandFailed { tag: String, line: String },

    #[error("operation timed out")]
    TimedOut,

    #[error("tag counter wrapped past its two hex digit range")]
    TagCounterExhausted,

    #[error("string is not pure US-ASCII, which IMAP command syntax requires: {0:?}")]
    NotAscii(String),

    #[error(transparent)]
    Tls(#[from] crate::tls::Error),

    #[error(transparent)]
    Tcp(#[from] crate::tcp::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
