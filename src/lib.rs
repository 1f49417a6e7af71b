//! netcore is a small library for speaking a handful of Internet protocols
//! directly on sockets: a recursive-resolver DNS client, an SNTP client and
//! server, an asynchronous TCP client/server pair with a buffered duplex
//! stream, a TLS wrapper around the TCP client, and an IMAP4rev1 client.
//!
//! # Usage (low-level DNS)
//!
//! ```rust
//! use netcore::dns::{Message, Type, Class};
//!
//! let mut m = Message::default();
//! m.add_question("bramp.net", Type::A, Class::Internet);
//! let wire = m.to_vec().expect("failed to encode DNS request");
//! assert!(wire.len() <= 512);
//! ```
//!
//! # Layering
//!
//! ```text
//! imap -> tls -> tcp (client)
//! dns::resolver -> dns::message -> name
//! ntp::client/server -> ntp::packet -> ntp::timestamp
//! tcp::server -> tcp::client
//! tcp::stream -> tcp::client
//! ```

#[macro_use]
mod errors;

mod io;
mod util;

pub mod name;

#[cfg(feature = "dns")]
pub mod dns;

#[cfg(feature = "ntp")]
pub mod ntp;

#[cfg(feature = "tcp")]
pub mod tcp;

#[cfg(feature = "tls")]
pub mod tls;

#[cfg(feature = "imap")]
pub mod imap;

pub mod error;

#[macro_use]
extern crate num_derive;

#[macro_use]
extern crate lazy_static;

pub use crate::error::Error;
pub use crate::name::DomainName;
