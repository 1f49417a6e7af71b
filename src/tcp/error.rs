//! Failure taxonomy shared by the TCP client, server, and buffered stream
//! (§4.G–I, §7).

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("not connected")]
    NotConnected,

    #[error("already connected")]
    AlreadyConnected,

    #[error("invalid state for this operation")]
    InvalidState,

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("operation timed out")]
    Timeout,

    #[error("peer disconnected")]
    Disconnected,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
