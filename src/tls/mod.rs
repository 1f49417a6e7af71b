//! TLS client handshake over a raw TCP connection (§4.J).

mod client;
mod error;
mod x509;

pub use client::{Client, SelectLocalCert, TlsOptions, TlsStream, ValidateRemoteCert, ValidationFlags};
pub use error::{CertificateInvalidReason, Error};
