//! Crate-wide error aggregate.
//!
//! Each subsystem defines its own `thiserror` enum (`dns::Error`,
//! `ntp::Error`, `tcp::Error`, `tls::Error`, `imap::Error`) following the
//! taxonomy in the design notes. This `Error` is for callers who want a
//! single type to propagate across subsystem boundaries with `?`.

use thiserror::Error as ThisError;

#[derive(ThisError, Debug)]
pub enum Error {
    #[cfg(feature = "dns")]
    #[error(transparent)]
    Dns(#[from] crate::dns::Error),

    #[cfg(feature = "ntp")]
    #[error(transparent)]
    Ntp(#[from] crate::ntp::Error),

    #[cfg(feature = "tcp")]
    #[error(transparent)]
    Tcp(#[from] crate::tcp::Error),

    #[cfg(feature = "tls")]
    #[error(transparent)]
    Tls(#[from] crate::tls::Error),

    #[cfg(feature = "imap")]
    #[error(transparent)]
    Imap(#[from] crate::imap::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
