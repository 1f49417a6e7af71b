//! Event-driven async TCP client, server, and buffered stream (§4.G–I).
//!
//! ```text
//! tcp::server -> tcp::client -> tcp::stream
//! ```
//! `server` accepts sockets and adopts them as `client`s; `stream` is a
//! buffered read/write façade that either side can layer over a
//! `client`. TLS (§4.J) wraps the same raw connection step `client`
//! exposes via `Client::connect_stream`.

mod client;
mod error;
mod events;
mod server;
mod stream;

pub use client::{ClientOptions, ReceiveInterceptor, State as ClientState};
pub use error::Error;
pub use events::Listeners;
pub use server::{ServerOptions, State as ServerState};
pub use stream::Stream;

pub use client::Client;
pub use server::Server;
