//! Accept-loop TCP server with a worker-fiber pool (§4.H).
//!
//! New component, grounded in the `tokio::net::TcpListener` accept-loop
//! idiom (multiple tasks concurrently `accept()`ing the same listener is
//! a documented tokio pattern, used here for `accept_threads`) and the
//! teacher's client-registry-under-mutex shape, implied by its
//! `Resolver<E>` generic-client-holder type but not otherwise present in
//! the teacher, which never runs a server.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;

use crate::tcp::client::{Client, ClientOptions};
use crate::tcp::error::Error;
use crate::tcp::events::Listeners;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum State {
    Idle,
    Listening,
    Closed,
}

/// Server-wide configuration; immutable once `listen()` has been called
/// (§4.H: "none may be altered after `listen()`").
#[derive(Clone, Debug)]
pub struct ServerOptions {
    pub accept_threads: usize,
    pub accept_backlog: u32,
    pub buffer_size: usize,
    pub receive_timeout: Duration,
    pub send_timeout: Duration,
}

impl Default for ServerOptions {
    fn default() -> Self {
        ServerOptions {
            accept_threads: 4,
            accept_backlog: 128,
            buffer_size: 64 * 1024,
            receive_timeout: Duration::from_secs(30),
            send_timeout: Duration::from_secs(30),
        }
    }
}

struct Shared {
    state: AsyncMutex<State>,
    options: AsyncMutex<ServerOptions>,
    listener: AsyncMutex<Option<Arc<TcpListener>>>,
    accept_tasks: AsyncMutex<Vec<JoinHandle<()>>>,

    clients: AsyncMutex<HashMap<u64, Client>>,
    next_client_id: AtomicU64,
    busy_workers: AtomicUsize,

    on_client_accepted: Listeners<Client>,
    on_client_exception: Listeners<(Client, String)>,
    on_accept_tasks_busy: Listeners<()>,
}

/// An async TCP server accepting connections with a configurable pool of
/// worker fibers (§3 `TcpAsyncServer`, §4.H).
#[derive(Clone)]
pub struct Server {
    shared: Arc<Shared>,
}

impl Server {
    pub fn new() -> Server {
        Server {
            shared: Arc::new(Shared {
                state: AsyncMutex::new(State::Idle),
                options: AsyncMutex::new(ServerOptions::default()),
                listener: AsyncMutex::new(None),
                accept_tasks: AsyncMutex::new(Vec::new()),
                clients: AsyncMutex::new(HashMap::new()),
                next_client_id: AtomicU64::new(0),
                busy_workers: AtomicUsize::new(0),
                on_client_accepted: Listeners::new(),
                on_client_exception: Listeners::new(),
                on_accept_tasks_busy: Listeners::new(),
            }),
        }
    }

    pub async fn state(&self) -> State {
        *self.shared.state.lock().await
    }

    pub async fn options(&self) -> ServerOptions {
        self.shared.options.lock().await.clone()
    }

    /// Replaces the server's configuration wholesale. Fails with
    /// `InvalidState` once `listen()` has been called.
    pub async fn set_options(&self, options: ServerOptions) -> Result<(), Error> {
        if options.accept_threads == 0 {
            return Err(Error::InvalidArgument("accept_threads must be >= 1".into()));
        }
        if options.accept_backlog == 0 {
            return Err(Error::InvalidArgument("accept_backlog must be >= 1".into()));
        }
        if *self.shared.state.lock().await != State::Idle {
            return Err(Error::InvalidState);
        }
        *self.shared.options.lock().await = options;
        Ok(())
    }

    pub fn on_client_accepted(&self, listener: Arc<dyn Fn(Client) + Send + Sync>) -> usize {
        self.shared.on_client_accepted.add(listener)
    }

    pub fn on_client_exception(
        &self,
        listener: Arc<dyn Fn((Client, String)) + Send + Sync>,
    ) -> usize {
        self.shared.on_client_exception.add(listener)
    }

    pub fn on_accept_tasks_busy(&self, listener: Arc<dyn Fn(()) + Send + Sync>) -> usize {
        self.shared.on_accept_tasks_busy.add(listener)
    }

    /// Binds `endpoint` and starts `accept_threads` worker fibers pulling
    /// from the OS accept queue, transitioning `Idle -> Listening`
    /// (§4.H). `accept_backlog` is validated but, since
    /// `tokio::net::TcpListener::bind` has no backlog parameter of its
    /// own, does not otherwise affect the bound socket's backlog; see
    /// `DESIGN.md`.
    pub async fn listen(&self, endpoint: SocketAddr) -> Result<(), Error> {
        let mut state = self.shared.state.lock().await;
        if *state != State::Idle {
            return Err(Error::InvalidState);
        }

        let listener = Arc::new(TcpListener::bind(endpoint).await?);
        *self.shared.listener.lock().await = Some(listener.clone());
        *state = State::Listening;
        drop(state);

        let options = self.shared.options.lock().await.clone();
        let mut tasks = Vec::with_capacity(options.accept_threads);
        for _ in 0..options.accept_threads {
            let server = self.clone();
            let listener = listener.clone();
            let options = options.clone();
            tasks.push(tokio::spawn(async move {
                server.accept_loop(listener, options).await
            }));
        }
        *self.shared.accept_tasks.lock().await = tasks;
        Ok(())
    }

    pub async fn local_addr(&self) -> Result<SocketAddr, Error> {
        match self.shared.listener.lock().await.as_ref() {
            Some(listener) => Ok(listener.local_addr()?),
            None => Err(Error::InvalidState),
        }
    }

    /// A snapshot of currently-registered clients.
    pub async fn clients(&self) -> Vec<Client> {
        self.shared.clients.lock().await.values().cloned().collect()
    }

    /// Stops accepting and closes every registered client (§4.H).
    pub async fn close(&self) {
        let mut state = self.shared.state.lock().await;
        if *state == State::Closed {
            return;
        }
        *state = State::Closed;
        drop(state);

        for task in self.shared.accept_tasks.lock().await.drain(..) {
            task.abort();
        }

        let clients: Vec<Client> = self.shared.clients.lock().await.values().cloned().collect();
        for client in clients {
            client.close().await;
        }
        self.shared.clients.lock().await.clear();
    }

    async fn accept_loop(self, listener: Arc<TcpListener>, options: ServerOptions) {
        loop {
            let (stream, _peer) = match listener.accept().await {
                Ok(pair) => pair,
                Err(e) => {
                    log::warn!("tcp server: accept failed: {}", e);
                    continue;
                }
            };

            let busy_before = self.shared.busy_workers.fetch_add(1, Ordering::SeqCst);
            if busy_before + 1 >= options.accept_threads {
                self.shared.on_accept_tasks_busy.emit(());
            }

            self.handle_accepted(stream, &options).await;

            self.shared.busy_workers.fetch_sub(1, Ordering::SeqCst);
        }
    }

    async fn handle_accepted(&self, stream: tokio::net::TcpStream, options: &ServerOptions) {
        let client_options = ClientOptions {
            connect_timeout: Duration::from_secs(0),
            read_timeout: options.receive_timeout,
            write_timeout: options.send_timeout,
            buffer_size: options.buffer_size,
        };

        let client = match Client::from_accepted(stream, client_options).await {
            Ok(client) => client,
            Err(e) => {
                log::warn!("tcp server: failed to adopt accepted socket: {}", e);
                return;
            }
        };

        let id = self.shared.next_client_id.fetch_add(1, Ordering::SeqCst);
        self.shared.clients.lock().await.insert(id, client.clone());

        let panicked = self.shared.on_client_accepted.emit_reporting(client.clone());
        if panicked > 0 {
            self.shared.on_client_exception.emit((
                client,
                format!("{} ClientAccepted listener(s) panicked", panicked),
            ));
        }
    }
}

impl Default for Server {
    fn default() -> Self {
        Server::new()
    }
}
