//! One-shot SNTP query (§4.F).
//!
//! Grounded in the teacher's UDP DNS client bind/connect/send/recv shape
//! (`clients::udp::UdpClient::exchange`), adapted to `tokio::net::UdpSocket`
//! and the 48-byte NTP datagram instead of a DNS message.

use std::net::SocketAddr;
use std::time::Duration;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use tokio::net::UdpSocket;
use tokio::time::timeout;

use crate::ntp::error::Error;
use crate::ntp::packet::{LeapIndicator, Mode, NtpPacket, ReferenceId};
use crate::ntp::timestamp::NtpTimestamp;

/// The result of one client/server SNTP exchange (§4.F "Answer
/// post-processing").
#[derive(Clone, Debug)]
pub struct Answer {
    pub packet: NtpPacket,
    pub stratum: u8,
    pub mode: Mode,
    /// `(T4 - T1) - (T3 - T2)`.
    pub round_trip_delay: ChronoDuration,
    /// `((T2 - T1) + (T3 - T4)) / 2`.
    pub clock_offset: ChronoDuration,
}

/// Sends a single mode-3 (client) query to `server` and returns the
/// decoded answer with round-trip delay and clock offset computed (§4.E–F).
pub async fn query(server: SocketAddr, read_timeout: Duration) -> Result<Answer, Error> {
    let bind_addr: SocketAddr = if server.is_ipv4() {
        "0.0.0.0:0".parse().unwrap()
    } else {
        "[::]:0".parse().unwrap()
    };

    let socket = UdpSocket::bind(bind_addr).await?;
    socket.connect(server).await?;

    let t1: DateTime<Utc> = Utc::now();
    let request = NtpPacket {
        leap_indicator: LeapIndicator::NoWarning,
        version: 4,
        mode: Mode::Client,
        stratum: 0,
        poll: 0,
        precision: 0,
        root_delay: 0.0,
        root_dispersion: 0.0,
        reference_id: ReferenceId([0; 4]),
        reference_timestamp: NtpTimestamp::ZERO,
        originate_timestamp: NtpTimestamp::ZERO,
        receive_timestamp: NtpTimestamp::ZERO,
        transmit_timestamp: NtpTimestamp::from_datetime(t1),
    };

    let wire = request.to_vec()?;
    socket.send(&wire).await?;

    let mut buf = [0u8; PACKET_BUF_LEN];
    let len = timeout(read_timeout, socket.recv(&mut buf))
        .await
        .map_err(|_| Error::Timeout)??;

    let t4 = Utc::now();
    let response = NtpPacket::from_slice(&buf[..len])?;

    let t2 = response.receive_timestamp.to_datetime(t4)?;
    let t3 = response.transmit_timestamp.to_datetime(t4)?;

    let round_trip_delay = ChronoDuration::nanoseconds(
        (t4 - t1).num_nanoseconds().unwrap_or(0) - (t3 - t2).num_nanoseconds().unwrap_or(0),
    );
    let clock_offset = ChronoDuration::nanoseconds(
        ((t2 - t1).num_nanoseconds().unwrap_or(0) + (t3 - t4).num_nanoseconds().unwrap_or(0)) / 2,
    );

    Ok(Answer {
        stratum: response.stratum,
        mode: response.mode,
        packet: response,
        round_trip_delay,
        clock_offset,
    })
}

const PACKET_BUF_LEN: usize = 128;
