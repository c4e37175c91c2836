//! RPC client connection
//!
//! ```text
//!   caller threads ──send──► writer (Mutex<TcpStream>) ──────► server
//!        ▲                                                       │
//!        │ bounded(1) channel per message id                     │
//!        └──── pending map ◄──── connector thread (read loop) ◄──┘
//! ```
//! One physical connection is shared by every caller. The connector thread
//! (re)connects at a fixed interval and, while connected, reads responses
//! and hands each one to the caller waiting on its message id.

use std::collections::HashMap;
use std::io::{self, BufReader};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;

use crate::config::ClientConfig;
use crate::error::{KvError, Result};
use crate::protocol::{read_message, write_message, Command, Message, MessageContent, Response};

/// Description carried by the synthetic ERROR returned when no response
/// arrives in time
pub const INTERRUPTED: &str = "interrupted: no response before timeout";

/// Blocking RPC client over one shared TCP connection
pub struct Client {
    shared: Arc<Shared>,
    config: ClientConfig,
    next_id: AtomicU64,
    /// Dropping the sender wakes the connector out of its backoff sleep
    stop: Mutex<Option<Sender<()>>>,
    connector: Mutex<Option<JoinHandle<()>>>,
}

struct Shared {
    addr: String,
    /// Write half of the live connection; `None` while disconnected
    writer: Mutex<Option<TcpStream>>,
    pending: Mutex<HashMap<String, Sender<Response>>>,
    closed: AtomicBool,
}

impl Client {
    /// Start connecting to `addr` in the background
    ///
    /// Returns immediately; use [`wait_connected`](Self::wait_connected) to
    /// wait for the first connection.
    pub fn connect(addr: impl Into<String>, config: ClientConfig) -> Result<Self> {
        let shared = Arc::new(Shared {
            addr: addr.into(),
            writer: Mutex::new(None),
            pending: Mutex::new(HashMap::new()),
            closed: AtomicBool::new(false),
        });

        let (stop_tx, stop_rx) = channel::bounded::<()>(0);
        let connector = {
            let shared = Arc::clone(&shared);
            let (interval, connect_timeout) = (config.reconnect_interval, config.connect_timeout);
            thread::Builder::new()
                .name("partikv-client".to_string())
                .spawn(move || connector_loop(shared, interval, connect_timeout, stop_rx))?
        };

        Ok(Self {
            shared,
            config,
            next_id: AtomicU64::new(1),
            stop: Mutex::new(Some(stop_tx)),
            connector: Mutex::new(Some(connector)),
        })
    }

    pub fn addr(&self) -> &str {
        &self.shared.addr
    }

    pub fn is_connected(&self) -> bool {
        self.shared.writer.lock().is_some()
    }

    /// Block until connected or `timeout` elapses
    pub fn wait_connected(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if self.is_connected() {
                return true;
            }
            if Instant::now() >= deadline || self.shared.closed.load(Ordering::SeqCst) {
                return false;
            }
            thread::sleep(Duration::from_millis(10));
        }
    }

    /// Send `command` and wait for its response
    ///
    /// Fails with [`KvError::NotConnected`] when there is no connection. A
    /// request whose response never arrives yields an ERROR response
    /// described by [`INTERRUPTED`] once every retry has timed out; the
    /// request itself is never resent.
    pub fn send(&self, command: Command) -> Result<Response> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed).to_string();
        let (tx, rx) = channel::bounded(1);
        self.shared.pending.lock().insert(id.clone(), tx);

        let result = self.send_and_wait(&id, command, &rx);

        self.shared.pending.lock().remove(&id);
        result
    }

    fn send_and_wait(&self, id: &str, command: Command, rx: &Receiver<Response>) -> Result<Response> {
        {
            let mut writer = self.shared.writer.lock();
            let stream = writer.as_mut().ok_or(KvError::NotConnected)?;
            match write_message(stream, &Message::command(id, command)) {
                Ok(()) => {}
                Err(KvError::Io(e)) => {
                    tracing::debug!("Write to {} failed: {}", self.shared.addr, e);
                    let _ = stream.shutdown(Shutdown::Both);
                    *writer = None;
                    return Err(KvError::NotConnected);
                }
                // Rejected before any byte was written; the connection is intact
                Err(e) => return Err(e),
            }
        }

        for attempt in 0..=self.config.retries {
            match rx.recv_timeout(self.config.request_timeout) {
                Ok(response) => return Ok(response),
                Err(RecvTimeoutError::Timeout) => {
                    tracing::debug!("Request {} timed out (attempt {})", id, attempt + 1);
                }
                Err(RecvTimeoutError::Disconnected) => {
                    tracing::debug!("Connection lost while waiting for {}", id);
                    break;
                }
            }
        }

        Ok(Response::error(INTERRUPTED))
    }

    /// Disconnect and stop reconnecting. Idempotent.
    pub fn close(&self) {
        if self.shared.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.stop.lock().take();
        if let Some(stream) = self.shared.writer.lock().take() {
            let _ = stream.shutdown(Shutdown::Both);
        }
        if let Some(handle) = self.connector.lock().take() {
            if handle.join().is_err() {
                tracing::warn!("Client connector thread panicked");
            }
        }
    }

    #[cfg(test)]
    fn pending_len(&self) -> usize {
        self.shared.pending.lock().len()
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        self.close();
    }
}

// =============================================================================
// Connector thread
// =============================================================================

fn connector_loop(
    shared: Arc<Shared>,
    interval: Duration,
    connect_timeout: Duration,
    stop: Receiver<()>,
) {
    while !shared.closed.load(Ordering::SeqCst) {
        match open_stream(&shared.addr, connect_timeout) {
            Ok((reader, writer)) => {
                *shared.writer.lock() = Some(writer);
                // close() may have run between the check above and the store
                if shared.closed.load(Ordering::SeqCst) {
                    if let Some(stream) = shared.writer.lock().take() {
                        let _ = stream.shutdown(Shutdown::Both);
                    }
                    break;
                }
                tracing::debug!("Connected to {}", shared.addr);

                read_loop(&shared, reader);

                if let Some(stream) = shared.writer.lock().take() {
                    let _ = stream.shutdown(Shutdown::Both);
                }
                // Wake callers still waiting on this connection
                shared.pending.lock().clear();
            }
            Err(e) => {
                tracing::trace!("Connect to {} failed: {}", shared.addr, e);
            }
        }

        if shared.closed.load(Ordering::SeqCst) {
            break;
        }
        match stop.recv_timeout(interval) {
            Err(RecvTimeoutError::Timeout) => {}
            _ => break,
        }
    }
    tracing::debug!("Client connector for {} stopped", shared.addr);
}

fn open_stream(addr: &str, timeout: Duration) -> Result<(TcpStream, TcpStream)> {
    let mut last_err = io::Error::new(
        io::ErrorKind::NotFound,
        format!("{} resolved to no address", addr),
    );
    for socket_addr in addr.to_socket_addrs()? {
        match TcpStream::connect_timeout(&socket_addr, timeout) {
            Ok(stream) => {
                stream.set_nodelay(true)?;
                let reader = stream.try_clone()?;
                return Ok((reader, stream));
            }
            Err(e) => last_err = e,
        }
    }
    Err(last_err.into())
}

/// Route responses to waiting callers until the connection drops
fn read_loop(shared: &Shared, stream: TcpStream) {
    let mut reader = BufReader::new(stream);
    loop {
        let message = match read_message(&mut reader) {
            Ok(message) => message,
            Err(KvError::Io(e)) => {
                tracing::debug!("Connection to {} lost: {}", shared.addr, e);
                return;
            }
            Err(e) => {
                tracing::warn!("Closing connection to {}: {}", shared.addr, e);
                return;
            }
        };

        match message.content {
            MessageContent::Response(response) => {
                match shared.pending.lock().remove(&message.id) {
                    Some(tx) => {
                        let _ = tx.try_send(response);
                    }
                    None => tracing::debug!("Dropping response for unknown id {}", message.id),
                }
            }
            MessageContent::Command(command) => {
                tracing::warn!("Ignoring command '{}' sent by server", command.name);
            }
        }
    }
}
