//! Failure taxonomy for the TLS client (§4.J).

use thiserror::Error;

/// Why the default remote-certificate check (or a callback that declined
/// to override it) rejected the peer's certificate (§4.J, §7
/// `CertificateInvalid(reason)`).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Error)]
pub enum CertificateInvalidReason {
    /// `now < notBefore` on the end-entity certificate.
    #[error("certificate is not yet valid")]
    NotYetValid,
    /// `now > notAfter` on the end-entity certificate.
    #[error("certificate is no longer valid")]
    NoLongerValid,
    /// Neither date check failed, but the platform chain policy still
    /// reported an error.
    #[error("certificate rejected by the platform chain policy")]
    PlatformRejected,
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid server name: {0}")]
    InvalidServerName(String),

    #[error("no client certificate available and one is required")]
    NoClientCertificate,

    #[error("certificate invalid: {0}")]
    CertificateInvalid(CertificateInvalidReason),

    #[error("handshake completed without negotiating an encrypted cipher suite")]
    NotEncrypted,

    #[error("peer closed the connection")]
    Disconnected,

    #[error(transparent)]
    Tcp(#[from] crate::tcp::Error),

    #[error(transparent)]
    Tls(#[from] rustls::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
