//! Event-driven async TCP client (§4.G).
//!
//! New component. Grounded in the teacher's DNS `clients::tcp::TcpClient`
//! connect/read/write shape (connect-with-timeout, `set_nodelay`), expanded
//! from a one-shot request/response exchange into a long-lived client with
//! a background reader task and a condvar-like receive FIFO, per the
//! teacher's `StatsBuilder` bookkeeping pattern (request/response sizes,
//! timing) generalised to per-connection byte counters.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpStream, ToSocketAddrs};
use tokio::sync::{Mutex as AsyncMutex, Notify};
use tokio::task::JoinHandle;
use tokio::time::timeout;

use crate::io::Fifo;
use crate::tcp::error::Error;
use crate::tcp::events::Listeners;

/// Connection lifecycle (§3 `TcpAsyncClient`).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum State {
    Disconnected,
    Connecting,
    Connected,
    Closed,
}

/// Configuration applied at connect time; immutable for the client's
/// lifetime (mirrors the server's "none may be altered after `listen()`"
/// rule, §4.H, applied here to a single client).
#[derive(Clone, Debug)]
pub struct ClientOptions {
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
    pub write_timeout: Duration,
    pub buffer_size: usize,
}

impl Default for ClientOptions {
    fn default() -> Self {
        ClientOptions {
            connect_timeout: Duration::from_secs(10),
            read_timeout: Duration::from_secs(30),
            write_timeout: Duration::from_secs(30),
            buffer_size: 64 * 1024,
        }
    }
}

/// A receive interceptor: if it returns `true`, the bytes it was given
/// were "handled" and are not appended to the receive FIFO (§4.G
/// `Received(bytes, handled)`).
pub type ReceiveInterceptor = Arc<dyn Fn(&[u8]) -> bool + Send + Sync>;

struct Shared {
    remote: SocketAddr,
    options: ClientOptions,

    state: AsyncMutex<State>,
    write_half: AsyncMutex<Option<OwnedWriteHalf>>,
    reader_task: AsyncMutex<Option<JoinHandle<()>>>,

    recv_fifo: AsyncMutex<Fifo>,
    recv_notify: Notify,
    recv_disconnected: AtomicBool,

    pending_sends: AtomicUsize,

    on_connected: Listeners<()>,
    on_buffered: Listeners<usize>,
    on_received: Listeners<Vec<u8>>,
    on_error: Listeners<String>,
    on_disconnected: Listeners<()>,

    receive_interceptor: AsyncMutex<Option<ReceiveInterceptor>>,
}

/// An async TCP client carrying its own receive FIFO and send queue
/// (§3 `TcpAsyncClient`, §4.G).
#[derive(Clone)]
pub struct Client {
    shared: Arc<Shared>,
}

impl Client {
    /// Establishes the raw TCP connection the rest of this crate builds
    /// on, shared by [`Client::connect`] and the TLS client (§4.J, which
    /// "delegat[es] to §4.G" for this step).
    pub(crate) async fn connect_stream(
        addr: impl ToSocketAddrs,
        connect_timeout: Duration,
    ) -> Result<TcpStream, Error> {
        let stream = timeout(connect_timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| Error::Timeout)??;
        stream.set_nodelay(true)?;
        Ok(stream)
    }

    /// Connects to `host:port`, transitioning `Disconnected -> Connected`
    /// (§4.G).
    pub async fn connect(
        host: &str,
        port: u16,
        options: ClientOptions,
    ) -> Result<Client, Error> {
        let stream = Self::connect_stream((host, port), options.connect_timeout).await?;
        let client = Self::build(stream, options).await?;
        client.shared.on_connected.emit(());
        Ok(client)
    }

    /// Wraps an already-accepted socket (the TCP server's use, §4.H) in a
    /// `Client`, sharing the rest of the connected-client machinery with
    /// [`Client::connect`].
    pub(crate) async fn from_accepted(
        stream: TcpStream,
        options: ClientOptions,
    ) -> Result<Client, Error> {
        let client = Self::build(stream, options).await?;
        client.shared.on_connected.emit(());
        Ok(client)
    }

    async fn build(stream: TcpStream, options: ClientOptions) -> Result<Client, Error> {
        let remote = stream.peer_addr()?;
        let (read_half, write_half) = stream.into_split();

        let shared = Arc::new(Shared {
            remote,
            options,
            state: AsyncMutex::new(State::Connected),
            write_half: AsyncMutex::new(Some(write_half)),
            reader_task: AsyncMutex::new(None),
            recv_fifo: AsyncMutex::new(Fifo::new()),
            recv_notify: Notify::new(),
            recv_disconnected: AtomicBool::new(false),
            pending_sends: AtomicUsize::new(0),
            on_connected: Listeners::new(),
            on_buffered: Listeners::new(),
            on_received: Listeners::new(),
            on_error: Listeners::new(),
            on_disconnected: Listeners::new(),
            receive_interceptor: AsyncMutex::new(None),
        });

        let client = Client { shared };
        let reader = tokio::spawn(client.clone().reader_loop(read_half));
        *client.shared.reader_task.lock().await = Some(reader);

        Ok(client)
    }

    pub fn remote_addr(&self) -> SocketAddr {
        self.shared.remote
    }

    pub(crate) fn write_timeout(&self) -> Duration {
        self.shared.options.write_timeout
    }

    pub async fn state(&self) -> State {
        *self.shared.state.lock().await
    }

    pub fn on_connected(&self, listener: Arc<dyn Fn(()) + Send + Sync>) -> usize {
        self.shared.on_connected.add(listener)
    }

    pub fn on_buffered(&self, listener: Arc<dyn Fn(usize) + Send + Sync>) -> usize {
        self.shared.on_buffered.add(listener)
    }

    pub fn on_received(&self, listener: Arc<dyn Fn(Vec<u8>) + Send + Sync>) -> usize {
        self.shared.on_received.add(listener)
    }

    pub fn on_error(&self, listener: Arc<dyn Fn(String) + Send + Sync>) -> usize {
        self.shared.on_error.add(listener)
    }

    pub fn on_disconnected(&self, listener: Arc<dyn Fn(()) + Send + Sync>) -> usize {
        self.shared.on_disconnected.add(listener)
    }

    /// Bytes handled by this interceptor are consumed rather than
    /// appended to the receive FIFO (§4.G `Received(bytes, handled)`).
    pub async fn set_receive_interceptor(&self, interceptor: Option<ReceiveInterceptor>) {
        *self.shared.receive_interceptor.lock().await = interceptor;
    }

    /// Synchronously enqueues `data`; returns once the OS has accepted it.
    pub async fn send(&self, data: &[u8]) -> Result<(), Error> {
        self.shared.pending_sends.fetch_add(1, Ordering::SeqCst);
        let result = self.write_now(data).await;
        self.shared.pending_sends.fetch_sub(1, Ordering::SeqCst);
        result
    }

    /// Enqueues `data` without waiting; `completion` fires once the OS has
    /// accepted it (or with the failure, otherwise).
    ///
    /// `pending_sends` is incremented here, before `tokio::spawn` returns,
    /// rather than inside the spawned task: a caller that observes
    /// `has_pending_sends() == false` right after this call must be seeing
    /// a state where the increment has already happened, or `flush`
    /// (§4.I) could race ahead of a send that hasn't reached the OS yet.
    pub fn send_async<F>(&self, data: Vec<u8>, completion: F)
    where
        F: FnOnce(Result<(), Error>) + Send + 'static,
    {
        self.shared.pending_sends.fetch_add(1, Ordering::SeqCst);
        let client = self.clone();
        tokio::spawn(async move {
            let result = client.write_now(&data).await;
            client.shared.pending_sends.fetch_sub(1, Ordering::SeqCst);
            completion(result);
        });
    }

    async fn write_now(&self, data: &[u8]) -> Result<(), Error> {
        let mut guard = self.shared.write_half.lock().await;
        let half = guard.as_mut().ok_or(Error::Disconnected)?;

        match timeout(self.shared.options.write_timeout, half.write_all(data)).await {
            Ok(Ok(())) => {
                self.shared.on_buffered.emit(data.len());
                Ok(())
            }
            Ok(Err(e)) => {
                self.shared.on_error.emit(e.to_string());
                Err(Error::Io(e))
            }
            Err(_) => Err(Error::Timeout),
        }
    }

    /// `true` while at least one `send`/`send_async` call has not yet had
    /// its bytes accepted by the OS.
    pub fn has_pending_sends(&self) -> bool {
        self.shared.pending_sends.load(Ordering::SeqCst) > 0
    }

    /// Returns the buffered-stream façade (§4.I) over this client.
    pub fn get_stream(&self) -> crate::tcp::stream::Stream {
        crate::tcp::stream::Stream::new(self.clone())
    }

    /// Removes up to `max` bytes from the receive FIFO, blocking (via the
    /// client's configured `read_timeout`) until at least one byte is
    /// available, the peer disconnects, or the deadline elapses.
    pub async fn receive(&self, max: usize) -> Result<Vec<u8>, Error> {
        self.receive_with_timeout(max, self.shared.options.read_timeout)
            .await
    }

    pub(crate) async fn receive_with_timeout(
        &self,
        max: usize,
        deadline: Duration,
    ) -> Result<Vec<u8>, Error> {
        loop {
            // Register interest before checking state, so a notify racing
            // with this check is never missed (tokio::sync::Notify's
            // documented usage pattern).
            let notified = self.shared.recv_notify.notified();

            {
                let mut fifo = self.shared.recv_fifo.lock().await;
                if !fifo.is_empty() {
                    return Ok(fifo.dequeue(max));
                }
            }

            if self.shared.recv_disconnected.load(Ordering::SeqCst) {
                return Ok(Vec::new()); // EOF: disconnected with an empty FIFO.
            }

            match timeout(deadline, notified).await {
                Ok(()) => continue,
                Err(_) => return Err(Error::Timeout),
            }
        }
    }

    pub(crate) async fn available(&self) -> usize {
        self.shared.recv_fifo.lock().await.len()
    }

    /// Idempotent. Cancels pending receives (they observe `Disconnected`
    /// and an empty FIFO, returning EOF) and fails pending sends.
    pub async fn close(&self) {
        let mut state = self.shared.state.lock().await;
        if *state == State::Closed {
            return;
        }
        *state = State::Closed;
        drop(state);

        if let Some(mut half) = self.shared.write_half.lock().await.take() {
            let _ = half.shutdown().await;
        }

        if let Some(task) = self.shared.reader_task.lock().await.take() {
            task.abort();
        }

        self.shared.recv_disconnected.store(true, Ordering::SeqCst);
        self.shared.recv_notify.notify_waiters();
        self.shared.on_disconnected.emit(());
    }

    async fn reader_loop(self, mut read_half: OwnedReadHalf) {
        let mut buf = vec![0u8; self.shared.options.buffer_size];
        loop {
            let n = match read_half.read(&mut buf).await {
                Ok(0) => {
                    self.mark_disconnected().await;
                    return;
                }
                Ok(n) => n,
                Err(e) => {
                    self.shared.on_error.emit(e.to_string());
                    self.mark_disconnected().await;
                    return;
                }
            };

            let chunk = &buf[..n];
            let handled = if let Some(interceptor) = self.shared.receive_interceptor.lock().await.as_ref()
            {
                interceptor(chunk)
            } else {
                false
            };

            if !handled {
                self.shared.recv_fifo.lock().await.enqueue(chunk);
                self.shared.on_received.emit(chunk.to_vec());
            }

            self.shared.recv_notify.notify_waiters();
        }
    }

    async fn mark_disconnected(&self) {
        self.shared.recv_disconnected.store(true, Ordering::SeqCst);
        self.shared.recv_notify.notify_waiters();

        let mut state = self.shared.state.lock().await;
        if *state != State::Closed {
            *state = State::Disconnected;
            drop(state);
            self.shared.on_disconnected.emit(());
        }
    }
}
