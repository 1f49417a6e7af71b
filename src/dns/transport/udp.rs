//! One-shot UDP query/response exchange (§4.D step 3), the per-attempt
//! building block the resolver races across servers.
//!
//! Grounded in the teacher's `clients::udp::UdpClient::exchange`
//! bind/connect/send/recv shape, converted from blocking `std::net` sockets
//! to `tokio::net::UdpSocket` so many attempts can run concurrently.

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::time::timeout;

use crate::dns::types::{Message, StatsBuilder};

pub async fn exchange(
    server: SocketAddr,
    query: &Message,
    read_timeout: Duration,
) -> io::Result<Message> {
    let bind_addr: SocketAddr = if server.is_ipv4() {
        "0.0.0.0:0".parse().unwrap()
    } else {
        "[::]:0".parse().unwrap()
    };

    let socket = UdpSocket::bind(bind_addr).await?;
    socket.connect(server).await?;

    let req = query.to_vec()?;
    let stats = StatsBuilder::start(req.len());

    socket.send(&req).await?;

    let mut buf = [0u8; 4096];
    let len = timeout(read_timeout, socket.recv(&mut buf))
        .await
        .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "udp recv timed out"))??;

    let mut resp = Message::from_slice(&buf[..len])?;
    resp.sender = Some(server);
    resp.stats = Some(stats.end(server, len));

    Ok(resp)
}
