//! Server lifecycle
//!
//! A running server owns one OS thread driving a current-thread tokio
//! runtime. Everything on the socket side lives there; producers talk to it
//! through the [`UpdateSender`] held by the handle.
//!
//! ```text
//!   ServerHandle::start()
//!     └─ thread "chartcast-net"
//!          ├─ bind listener ── ready ──► start() returns
//!          ├─ run_dispatcher()
//!          └─ Listener::run() ◄── shutdown token ── ServerHandle::stop()
//! ```

use std::io;
use std::net::SocketAddr;
use std::sync::mpsc::{self as std_mpsc, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::bridge::{run_dispatcher, UpdateReceiver, UpdateSender};
use crate::broadcast::Broadcaster;
use crate::chart::ChartType;
use crate::error::{Error, Result};
use crate::registry::{StreamKey, StreamRegistry};
use crate::server::config::ServerConfig;
use crate::server::listener::Listener;
use crate::stream::DataStream;

/// Name of the network thread
pub const NET_THREAD_NAME: &str = "chartcast-net";

/// Extra time `stop` allows on top of the connection drain timeout
const SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

struct NetThread {
    join: thread::JoinHandle<()>,
    done: std_mpsc::Receiver<()>,
}

/// A running server
///
/// Dropping the handle stops the server.
pub struct ServerHandle {
    config: Arc<ServerConfig>,
    local_addr: SocketAddr,
    bridge: UpdateSender,
    shutdown: CancellationToken,
    thread: Mutex<Option<NetThread>>,
}

impl ServerHandle {
    /// Bind the listener and start serving
    ///
    /// Returns once the listener accepts connections. Bind failures and
    /// failures to set up the network thread are returned here; nothing
    /// after this point surfaces as an error.
    pub fn start(config: ServerConfig) -> Result<Self> {
        let config = Arc::new(config);
        let registry = Arc::new(StreamRegistry::new());
        let (bridge, updates) = UpdateSender::new(Arc::clone(&registry));
        let shutdown = CancellationToken::new();

        let (ready_tx, ready_rx) = std_mpsc::channel();
        let (done_tx, done_rx) = std_mpsc::channel();

        let join = thread::Builder::new().name(NET_THREAD_NAME.to_string()).spawn({
            let config = Arc::clone(&config);
            let shutdown = shutdown.clone();
            move || {
                net_main(config, registry, updates, shutdown, ready_tx);
                let _ = done_tx.send(());
            }
        })?;

        let local_addr = match ready_rx.recv() {
            Ok(Ok(addr)) => addr,
            Ok(Err(e)) => {
                let _ = join.join();
                tracing::error!(host = %config.host, port = config.port, error = %e, "Failed to start server");
                return Err(e.into());
            }
            Err(_) => {
                let _ = join.join();
                return Err(Error::StartupAborted);
            }
        };

        tracing::info!(
            addr = %local_addr,
            route = %config.route,
            "Server listening"
        );

        Ok(Self {
            config,
            local_addr,
            bridge,
            shutdown,
            thread: Mutex::new(Some(NetThread {
                join,
                done: done_rx,
            })),
        })
    }

    /// Register a stream key (idempotent)
    pub fn register(&self, key: &StreamKey) {
        self.bridge.registry().register(key);
    }

    /// Cache a payload and schedule its broadcast
    ///
    /// Does not wait for delivery. Works after `stop`, in which case only
    /// the cache is updated.
    pub fn push_sync(&self, key: &StreamKey, payload: Value) {
        self.bridge.push_sync(key, payload);
    }

    /// Most recent payload pushed for `key`
    pub fn get_cache(&self, key: &StreamKey) -> Option<Arc<Value>> {
        self.bridge.registry().get_cache(key)
    }

    /// Register `key_word` for `chart_type` and return a producer handle
    pub fn stream(&self, chart_type: ChartType, key_word: &str) -> DataStream {
        DataStream::new(chart_type, key_word, self.bridge.clone())
    }

    /// Registry backing this server
    pub fn registry(&self) -> &Arc<StreamRegistry> {
        self.bridge.registry()
    }

    /// Address the listener is bound to
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// URL clients connect to, using the bound port
    pub fn url(&self) -> String {
        format!(
            "ws://{}:{}{}",
            self.config.host,
            self.local_addr.port(),
            self.config.route
        )
    }

    /// Configuration the server was started with
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Check if the network thread is still serving
    pub fn is_running(&self) -> bool {
        !self.shutdown.is_cancelled() && self.bridge.is_connected()
    }

    /// Stop the server
    ///
    /// Closes the listener and every open connection, then waits a bounded
    /// time for the network thread. Safe to call more than once.
    pub fn stop(&self) {
        let Some(net) = self.thread.lock().take() else {
            return;
        };

        tracing::info!(addr = %self.local_addr, "Stopping server");
        self.shutdown.cancel();

        let wait = self.config.shutdown_timeout + SHUTDOWN_GRACE;
        match net.done.recv_timeout(wait) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                if net.join.join().is_err() {
                    tracing::error!("Network thread panicked");
                }
                tracing::info!(addr = %self.local_addr, "Server stopped");
            }
            Err(RecvTimeoutError::Timeout) => {
                tracing::warn!(
                    addr = %self.local_addr,
                    waited_ms = wait.as_millis() as u64,
                    "Network thread did not stop in time, detaching"
                );
            }
        }
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Body of the network thread
fn net_main(
    config: Arc<ServerConfig>,
    registry: Arc<StreamRegistry>,
    updates: UpdateReceiver,
    shutdown: CancellationToken,
    ready: std_mpsc::Sender<io::Result<SocketAddr>>,
) {
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            let _ = ready.send(Err(e));
            return;
        }
    };

    runtime.block_on(async move {
        let bound = match TcpListener::bind((config.host.as_str(), config.port)).await {
            Ok(listener) => listener.local_addr().map(|addr| (listener, addr)),
            Err(e) => Err(e),
        };
        let (tcp, addr) = match bound {
            Ok(bound) => bound,
            Err(e) => {
                let _ = ready.send(Err(e));
                return;
            }
        };

        let broadcaster = Arc::new(Broadcaster::new());
        let dispatcher = tokio::spawn(run_dispatcher(updates, Arc::clone(&broadcaster)));
        let listener = Listener::new(config, registry, broadcaster, shutdown);

        if ready.send(Ok(addr)).is_err() {
            dispatcher.abort();
            return;
        }

        listener.run(tcp).await;
        dispatcher.abort();
    });
}

/// Owner of at most one running server
///
/// `start` is idempotent: while a server runs it returns that server instead
/// of binding again. `restart` always gives a fresh registry.
#[derive(Default)]
pub struct Server {
    current: Mutex<Option<Arc<ServerHandle>>>,
}

impl Server {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a server, or return the one already running
    pub fn start(&self, config: ServerConfig) -> Result<Arc<ServerHandle>> {
        let mut current = self.current.lock();
        if let Some(handle) = current.as_ref() {
            if handle.is_running() {
                tracing::debug!(addr = %handle.local_addr(), "Server already running");
                return Ok(Arc::clone(handle));
            }
        }

        let handle = Arc::new(ServerHandle::start(config)?);
        *current = Some(Arc::clone(&handle));
        Ok(handle)
    }

    /// Stop the running server, if any
    pub fn stop(&self) {
        let handle = self.current.lock().take();
        if let Some(handle) = handle {
            handle.stop();
        }
    }

    /// Stop, then start with `config`
    pub fn restart(&self, config: ServerConfig) -> Result<Arc<ServerHandle>> {
        self.stop();
        self.start(config)
    }

    /// The running server, if any
    pub fn current(&self) -> Option<Arc<ServerHandle>> {
        self.current
            .lock()
            .as_ref()
            .filter(|handle| handle.is_running())
            .cloned()
    }
}
