//! SNTP server that answers requests via an injected clock source (§4.F).
//!
//! New component grounded in the teacher's UDP client socket idiom,
//! generalised from a one-shot exchange into a long-running
//! `tokio::net::UdpSocket` receive loop.

use std::net::SocketAddr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::net::UdpSocket;

use crate::ntp::error::Error;
use crate::ntp::packet::{Mode, NtpPacket, ReferenceId};
use crate::ntp::timestamp::NtpTimestamp;

/// The clock properties a server answers with; injectable so tests can
/// fix stratum/poll/precision/etc. without a real reference clock (§8
/// scenario 2).
pub trait ClockSource: Send + Sync {
    fn stratum(&self) -> u8;
    fn poll(&self) -> i8;
    fn precision(&self) -> i8;
    fn root_delay(&self) -> f64;
    fn root_dispersion(&self) -> f64;
    fn reference_id(&self) -> ReferenceId;
    fn reference_timestamp(&self) -> NtpTimestamp;
    fn now(&self) -> DateTime<Utc>;
}

/// A [`ClockSource`] with every property fixed at construction time, for
/// tests and for servers with a static reference clock.
#[derive(Clone, Debug)]
pub struct FixedClock {
    pub stratum: u8,
    pub poll: i8,
    pub precision: i8,
    pub root_delay: f64,
    pub root_dispersion: f64,
    pub reference_id: ReferenceId,
    pub reference_timestamp: NtpTimestamp,
}

impl ClockSource for FixedClock {
    fn stratum(&self) -> u8 {
        self.stratum
    }
    fn poll(&self) -> i8 {
        self.poll
    }
    fn precision(&self) -> i8 {
        self.precision
    }
    fn root_delay(&self) -> f64 {
        self.root_delay
    }
    fn root_dispersion(&self) -> f64 {
        self.root_dispersion
    }
    fn reference_id(&self) -> ReferenceId {
        self.reference_id
    }
    fn reference_timestamp(&self) -> NtpTimestamp {
        self.reference_timestamp
    }
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Inspect/mutate/drop hook invoked for each decoded request or
/// constructed answer (§4.F). Returning `false` drops the packet
/// (suppressing the send, for the answer hook).
pub type Hook = Arc<dyn Fn(&mut NtpPacket) -> bool + Send + Sync>;

/// An SNTP server bound to a single UDP socket, answering every request
/// from an injected [`ClockSource`] (§4.F).
pub struct Server {
    socket: UdpSocket,
    clock: Arc<dyn ClockSource>,
    on_request: Option<Hook>,
    on_answer: Option<Hook>,
}

impl Server {
    pub async fn bind(addr: SocketAddr, clock: Arc<dyn ClockSource>) -> Result<Server, Error> {
        let socket = UdpSocket::bind(addr).await?;
        Ok(Server {
            socket,
            clock,
            on_request: None,
            on_answer: None,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, Error> {
        Ok(self.socket.local_addr()?)
    }

    /// Installs the request-inspection hook (§4.F). Returning `false`
    /// drops the request: no answer is sent.
    pub fn on_request(&mut self, hook: Hook) {
        self.on_request = Some(hook);
    }

    /// Installs the answer-inspection hook (§4.F). Returning `false`
    /// drops the answer, suppressing the send. Per the REDESIGN FLAGS
    /// note on `OnAnswer`, this always fires when a hook is installed,
    /// regardless of anything about the originating request.
    pub fn on_answer(&mut self, hook: Hook) {
        self.on_answer = Some(hook);
    }

    /// Serves requests until the socket errors or the future is dropped.
    /// Each datagram is answered inline; callers wanting concurrent
    /// handling can `tokio::spawn` this future themselves.
    pub async fn serve(&mut self) -> Result<(), Error> {
        let mut buf = [0u8; 128];
        loop {
            let (len, peer) = self.socket.recv_from(&mut buf).await?;
            let arrival = Utc::now();

            if let Err(e) = self.handle_datagram(&buf[..len], peer, arrival).await {
                log::warn!("ntp: failed to answer {}: {}", peer, e);
            }
        }
    }

    async fn handle_datagram(
        &self,
        datagram: &[u8],
        peer: SocketAddr,
        arrival: DateTime<Utc>,
    ) -> Result<(), Error> {
        let mut request = NtpPacket::from_slice(datagram)?;

        if let Some(hook) = &self.on_request {
            if !hook(&mut request) {
                return Ok(());
            }
        }

        let is_multicast = peer.ip().is_multicast();
        let mut answer = self.build_answer(&request, arrival, is_multicast);

        if let Some(hook) = &self.on_answer {
            if !hook(&mut answer) {
                return Ok(());
            }
        }

        let transmit = self.clock.now();
        answer.transmit_timestamp = NtpTimestamp::from_datetime(transmit);

        let wire = answer.to_vec()?;
        self.socket.send_to(&wire, peer).await?;
        Ok(())
    }

    /// §4.E–F: builds the answer for `request`, arrived at `arrival`.
    /// Multicast requests get a `Broadcast` answer with blanked
    /// originate/receive timestamps; unicast requests echo `originate =
    /// request.transmit` and `receive = arrival`.
    fn build_answer(
        &self,
        request: &NtpPacket,
        arrival: DateTime<Utc>,
        is_multicast: bool,
    ) -> NtpPacket {
        let (mode, poll, originate, receive) = if is_multicast {
            (
                Mode::Broadcast,
                6,
                NtpTimestamp::ZERO,
                NtpTimestamp::ZERO,
            )
        } else {
            let mode = match request.mode {
                Mode::Client => Mode::Server,
                _ => Mode::SymmetricPassive,
            };
            (
                mode,
                self.clock.poll(),
                request.transmit_timestamp,
                NtpTimestamp::from_datetime(arrival),
            )
        };

        NtpPacket {
            leap_indicator: crate::ntp::packet::LeapIndicator::NoWarning,
            version: 4,
            mode,
            stratum: self.clock.stratum(),
            poll,
            precision: self.clock.precision(),
            root_delay: self.clock.root_delay(),
            root_dispersion: self.clock.root_dispersion(),
            reference_id: self.clock.reference_id(),
            reference_timestamp: self.clock.reference_timestamp(),
            originate_timestamp: originate,
            receive_timestamp: receive,
            transmit_timestamp: NtpTimestamp::ZERO, // filled in by handle_datagram, right before send.
        }
    }
}
