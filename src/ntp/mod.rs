//! SNTP datagram codec and one-shot client / injectable-clock server
//! (§4.E–F).
//!
//! ```text
//! ntp::client/server -> ntp::packet -> ntp::timestamp
//! ```

mod client;
mod error;
mod packet;
mod server;
mod timestamp;

pub use client::{query, Answer};
pub use error::Error;
pub use packet::{LeapIndicator, Mode, NtpPacket, ReferenceId, PACKET_LEN};
pub use server::{ClockSource, FixedClock, Hook, Server};
pub use timestamp::NtpTimestamp;
