//! Echo round-trips over the TCP client/server/stream stack, and basic
//! accept/disconnect accounting under several concurrent clients.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use netcore::tcp::{Client, ClientOptions, Server};

/// Registers an echo handler on `server`: every accepted client has its
/// received bytes written straight back until it disconnects.
fn install_echo_handler(server: &Server) {
    server.on_client_accepted(Arc::new(move |client: Client| {
        tokio::spawn(async move {
            loop {
                let data = match client.receive(8 * 1024).await {
                    Ok(d) if d.is_empty() => return, // EOF
                    Ok(d) => d,
                    Err(_) => return,
                };
                if client.send(&data).await.is_err() {
                    return;
                }
            }
        });
    }));
}

async fn start_echo_server() -> Server {
    let server = Server::new();
    install_echo_handler(&server);
    server.listen("127.0.0.1:0".parse().unwrap()).await.expect("listen");
    server
}

#[tokio::test]
async fn echoes_many_lines_under_default_queued_writes() {
    let server = start_echo_server().await;
    let addr = server.local_addr().unwrap();

    let client = Client::connect(&addr.ip().to_string(), addr.port(), ClientOptions::default())
        .await
        .expect("connect");
    let stream = client.get_stream();

    const LINES: usize = 200;
    for i in 0..LINES {
        stream
            .write(format!("line {}\n", i).as_bytes())
            .await
            .expect("write");
    }
    stream.flush().await.expect("flush");

    for i in 0..LINES {
        let line = stream.read_until(b'\n').await.expect("read_until");
        assert_eq!(line, format!("line {}\n", i).into_bytes());
    }

    stream.close().await.expect("close");
    server.close().await;
}

#[tokio::test]
async fn echoes_many_lines_under_direct_writes() {
    let server = start_echo_server().await;
    let addr = server.local_addr().unwrap();

    let client = Client::connect(&addr.ip().to_string(), addr.port(), ClientOptions::default())
        .await
        .expect("connect");
    let stream = client.get_stream();
    stream.set_direct_writes(true).await;
    assert!(stream.direct_writes());

    const LINES: usize = 200;
    for i in 0..LINES {
        stream
            .write(format!("direct {}\n", i).as_bytes())
            .await
            .expect("write");
    }
    stream.flush().await.expect("flush"); // no-op in direct mode, but must not error.

    for i in 0..LINES {
        let line = stream.read_until(b'\n').await.expect("read_until");
        assert_eq!(line, format!("direct {}\n", i).into_bytes());
    }

    stream.close().await.expect("close");
    server.close().await;
}

#[tokio::test]
async fn echoes_under_send_on_flush_writes() {
    let server = start_echo_server().await;
    let addr = server.local_addr().unwrap();

    let client = Client::connect(&addr.ip().to_string(), addr.port(), ClientOptions::default())
        .await
        .expect("connect");
    let stream = client.get_stream();
    stream.set_send_on_flush(true).await.expect("set_send_on_flush");

    stream.write(b"alpha ").await.expect("write");
    stream.write(b"beta\n").await.expect("write");
    stream.flush().await.expect("flush");

    let line = stream.read_until(b'\n').await.expect("read_until");
    assert_eq!(line, b"alpha beta\n".to_vec());

    stream.close().await.expect("close");
    server.close().await;
}

#[tokio::test]
async fn set_send_on_flush_rejects_enabling_with_unsent_bytes_queued() {
    let server = start_echo_server().await;
    let addr = server.local_addr().unwrap();

    let client = Client::connect(&addr.ip().to_string(), addr.port(), ClientOptions::default())
        .await
        .expect("connect");
    let stream = client.get_stream();

    // Nothing has yielded back to the background drain task between the
    // write and this call, so the fifo is still non-empty here.
    stream.write(b"queued but not yet flushed").await.unwrap();
    assert!(matches!(
        stream.set_send_on_flush(true).await,
        Err(netcore::tcp::Error::InvalidState)
    ));

    stream.flush().await.expect("flush");
    stream.close().await.expect("close");
    server.close().await;
}

#[tokio::test]
async fn accept_and_disconnect_accounting_across_many_clients() {
    let server = Server::new();

    let accepted = Arc::new(AtomicUsize::new(0));
    let disconnected = Arc::new(AtomicUsize::new(0));

    {
        let accepted = accepted.clone();
        let disconnected = disconnected.clone();
        server.on_client_accepted(Arc::new(move |client: Client| {
            accepted.fetch_add(1, Ordering::SeqCst);
            let disconnected = disconnected.clone();
            client.on_disconnected(Arc::new(move |_| {
                disconnected.fetch_add(1, Ordering::SeqCst);
            }));
        }));
    }

    server.listen("127.0.0.1:0".parse().unwrap()).await.expect("listen");
    let addr = server.local_addr().unwrap();

    const CLIENTS: usize = 50;
    let mut handles = Vec::with_capacity(CLIENTS);
    for _ in 0..CLIENTS {
        handles.push(tokio::spawn(async move {
            let client = Client::connect(
                &addr.ip().to_string(),
                addr.port(),
                ClientOptions::default(),
            )
            .await
            .expect("connect");
            client.close().await;
        }));
    }
    for h in handles {
        h.await.expect("client task panicked");
    }

    // The accept side races independently of each client's own close; give
    // the server's accept/registration tasks a moment to catch up.
    tokio::time::sleep(Duration::from_millis(200)).await;

    assert_eq!(accepted.load(Ordering::SeqCst), CLIENTS);
    assert_eq!(disconnected.load(Ordering::SeqCst), CLIENTS);

    server.close().await;
}
