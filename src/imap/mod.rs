//! IMAP4rev1 client: line/literal framing, mailbox operations, and
//! composite SEARCH (§4.K).
//!
//! ```text
//! imap::client -> tls::client (or, for tests, tcp::client)
//!              -> imap::search / imap::utf7 / imap::config / imap::types
//! ```

mod client;
mod config;
mod error;
mod search;
mod types;
mod utf7;

pub use client::Client;
pub use config::{parse_connection_string, ImapConnectionInfo};
pub use error::Error;
pub use search::ImapSearch;
pub use types::{ImapMailboxInfo, ImapMailboxListing};
