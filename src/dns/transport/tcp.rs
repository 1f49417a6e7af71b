//! One-shot length-prefixed TCP query/response exchange (§4.D step 3),
//! RFC 1035 §4.2.2.
//!
//! Grounded in the teacher's `clients::tcp::TcpClient::exchange` framing,
//! converted to `tokio::net::TcpStream` to match the resolver's concurrent
//! per-server race.

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::dns::types::{Message, StatsBuilder};

fn timed_out() -> io::Error {
    io::Error::new(io::ErrorKind::TimedOut, "tcp exchange timed out")
}

pub async fn exchange(
    server: SocketAddr,
    query: &Message,
    connect_timeout: Duration,
    read_timeout: Duration,
) -> io::Result<Message> {
    let mut stream = timeout(connect_timeout, TcpStream::connect(server))
        .await
        .map_err(|_| timed_out())??;
    stream.set_nodelay(true)?;

    let message = query.to_vec()?;
    let stats = StatsBuilder::start(message.len());

    timeout(read_timeout, async {
        stream
            .write_all(&(message.len() as u16).to_be_bytes())
            .await?;
        stream.write_all(&message).await
    })
    .await
    .map_err(|_| timed_out())??;

    let mut len_buf = [0u8; 2];
    timeout(read_timeout, stream.read_exact(&mut len_buf))
        .await
        .map_err(|_| timed_out())??;
    let len = u16::from_be_bytes(len_buf);

    let mut buf = vec![0u8; len as usize];
    timeout(read_timeout, stream.read_exact(&mut buf))
        .await
        .map_err(|_| timed_out())??;

    let mut resp = Message::from_slice(&buf)?;
    resp.sender = Some(server);
    resp.stats = Some(stats.end(server, buf.len()));

    Ok(resp)
}
