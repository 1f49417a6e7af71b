//! Failure taxonomy for the NTP datagram codec and client/server (§4.E–F, §7).

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("ntp query timed out")]
    Timeout,

    #[error("malformed ntp packet: {0}")]
    MalformedPacket(String),

    #[error("local clock is more than a quarter-epoch (~34 years) away from the timestamp")]
    ClockOutOfRange,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
