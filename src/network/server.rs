//! TCP Server
//!
//! Two listeners share one command table and database registry:
//! ```text
//!   listen_addr ──► accept thread ──► Connection (PortKind::Public)
//!   admin_addr  ──► accept thread ──► Connection (PortKind::Local)
//! ```
//! Each accepted connection gets its own thread; requests on a connection
//! are handled in arrival order. Accept loops poll a shared shutdown flag.

use std::io::ErrorKind;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::config::Config;
use crate::database::DatabaseManager;
use crate::error::{KvError, Result};

use super::commands::CommandTable;
use super::connection::Connection;
use super::session::PortKind;

const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// TCP server for partikv
pub struct Server {
    config: Config,
    manager: Arc<DatabaseManager>,
    commands: Arc<CommandTable>,
}

impl Server {
    pub fn new(config: Config, manager: Arc<DatabaseManager>) -> Self {
        Self {
            config,
            manager,
            commands: Arc::new(CommandTable::builtin()),
        }
    }

    /// Replace the command table (before `start`)
    pub fn with_commands(mut self, commands: CommandTable) -> Self {
        self.commands = Arc::new(commands);
        self
    }

    /// Bind both listeners and start accepting in the background
    pub fn start(&self) -> Result<ServerHandle> {
        let public = bind(&self.config.listen_addr)?;
        let admin = bind(&self.config.admin_addr)?;
        let public_addr = public.local_addr()?;
        let admin_addr = admin.local_addr()?;

        let shutdown = Arc::new(AtomicBool::new(false));
        let active = Arc::new(AtomicUsize::new(0));

        let mut threads = Vec::with_capacity(2);
        for (listener, port) in [(public, PortKind::Public), (admin, PortKind::Local)] {
            let acceptor = Acceptor {
                listener,
                port,
                manager: Arc::clone(&self.manager),
                commands: Arc::clone(&self.commands),
                shutdown: Arc::clone(&shutdown),
                active: Arc::clone(&active),
                max_connections: self.config.max_connections,
                read_timeout_ms: self.config.read_timeout_ms,
                write_timeout_ms: self.config.write_timeout_ms,
            };
            let handle = thread::Builder::new()
                .name(format!("partikv-accept-{:?}", port).to_lowercase())
                .spawn(move || acceptor.run())?;
            threads.push(handle);
        }

        tracing::info!("Listening on {} (public), {} (local)", public_addr, admin_addr);

        Ok(ServerHandle {
            public_addr,
            admin_addr,
            shutdown,
            threads,
        })
    }

    /// Start and block until the accept loops exit
    pub fn run(&self) -> Result<()> {
        self.start()?.join()
    }
}

/// Running server; dropping it does not stop the accept threads
pub struct ServerHandle {
    public_addr: SocketAddr,
    admin_addr: SocketAddr,
    shutdown: Arc<AtomicBool>,
    threads: Vec<JoinHandle<()>>,
}

impl ServerHandle {
    pub fn public_addr(&self) -> SocketAddr {
        self.public_addr
    }

    pub fn admin_addr(&self) -> SocketAddr {
        self.admin_addr
    }

    /// Stop accepting new connections; established ones run to completion
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }

    pub fn join(self) -> Result<()> {
        for handle in self.threads {
            handle
                .join()
                .map_err(|_| KvError::Network("accept thread panicked".to_string()))?;
        }
        Ok(())
    }

    pub fn stop(self) -> Result<()> {
        self.shutdown();
        self.join()
    }
}

fn bind(addr: &str) -> Result<TcpListener> {
    let listener = TcpListener::bind(addr)
        .map_err(|e| KvError::Network(format!("failed to bind {}: {}", addr, e)))?;
    listener.set_nonblocking(true)?;
    Ok(listener)
}

// =============================================================================
// Accept loop
// =============================================================================

struct Acceptor {
    listener: TcpListener,
    port: PortKind,
    manager: Arc<DatabaseManager>,
    commands: Arc<CommandTable>,
    shutdown: Arc<AtomicBool>,
    active: Arc<AtomicUsize>,
    max_connections: usize,
    read_timeout_ms: u64,
    write_timeout_ms: u64,
}

impl Acceptor {
    fn run(self) {
        while !self.shutdown.load(Ordering::SeqCst) {
            match self.listener.accept() {
                Ok((stream, peer)) => {
                    if let Err(e) = self.spawn_connection(stream) {
                        tracing::warn!("Failed to start connection for {}: {}", peer, e);
                    }
                }
                Err(ref e) if e.kind() == ErrorKind::WouldBlock => {
                    thread::sleep(ACCEPT_POLL_INTERVAL);
                }
                Err(e) => {
                    tracing::warn!("Accept failed on {:?} port: {}", self.port, e);
                    thread::sleep(ACCEPT_POLL_INTERVAL);
                }
            }
        }
        tracing::debug!("Accept loop for {:?} port stopped", self.port);
    }

    fn spawn_connection(&self, stream: TcpStream) -> Result<()> {
        if self.active.load(Ordering::SeqCst) >= self.max_connections {
            tracing::warn!("Connection limit ({}) reached, rejecting", self.max_connections);
            return Ok(());
        }

        // Accepted sockets inherit non-blocking mode on some platforms.
        stream.set_nonblocking(false)?;

        let mut connection = Connection::new(
            stream,
            self.port,
            Arc::clone(&self.manager),
            Arc::clone(&self.commands),
        )?;
        connection.set_timeouts(self.read_timeout_ms, self.write_timeout_ms)?;

        let active = Arc::clone(&self.active);
        active.fetch_add(1, Ordering::SeqCst);
        let spawned = thread::Builder::new()
            .name("partikv-conn".to_string())
            .spawn(move || {
                if let Err(e) = connection.handle() {
                    tracing::debug!("Connection {} closed with error: {}", connection.peer_addr(), e);
                }
                active.fetch_sub(1, Ordering::SeqCst);
            });

        if let Err(e) = spawned {
            self.active.fetch_sub(1, Ordering::SeqCst);
            return Err(e.into());
        }
        Ok(())
    }
}
