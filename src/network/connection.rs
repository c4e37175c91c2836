//! Connection Handler
//!
//! Serves one client connection: reads framed messages, dispatches commands
//! through the [`CommandTable`] and writes each response back with the
//! request's message id.

use std::io::{BufReader, BufWriter, ErrorKind};
use std::net::TcpStream;
use std::sync::Arc;
use std::time::Duration;

use crate::database::DatabaseManager;
use crate::error::{KvError, Result};
use crate::protocol::{read_message, write_message, Message, MessageContent};

use super::commands::CommandTable;
use super::session::{PortKind, Session};

/// Handles a single client connection
pub struct Connection {
    /// Buffered read half
    reader: BufReader<TcpStream>,

    /// Buffered write half
    writer: BufWriter<TcpStream>,

    /// Selected database and open batch
    session: Session,

    commands: Arc<CommandTable>,

    /// Peer address for logging
    peer_addr: String,
}

impl Connection {
    /// Create a new connection handler
    pub fn new(
        stream: TcpStream,
        port: PortKind,
        manager: Arc<DatabaseManager>,
        commands: Arc<CommandTable>,
    ) -> Result<Self> {
        let peer_addr = stream
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "unknown".to_string());

        stream.set_nodelay(true)?;

        let read_stream = stream.try_clone()?;
        let write_stream = stream;

        Ok(Self {
            reader: BufReader::new(read_stream),
            writer: BufWriter::new(write_stream),
            session: Session::new(manager, port),
            commands,
            peer_addr,
        })
    }

    /// Configure socket timeouts; 0 leaves a direction unbounded
    pub fn set_timeouts(&mut self, read_ms: u64, write_ms: u64) -> Result<()> {
        if read_ms > 0 {
            self.reader
                .get_ref()
                .set_read_timeout(Some(Duration::from_millis(read_ms)))?;
        }
        if write_ms > 0 {
            self.writer
                .get_ref()
                .set_write_timeout(Some(Duration::from_millis(write_ms)))?;
        }
        Ok(())
    }

    /// Serve requests until the peer disconnects
    ///
    /// A peer hanging up (or idling past the read timeout) ends the loop
    /// with `Ok`. A malformed frame or payload closes the connection with
    /// the decode error.
    pub fn handle(&mut self) -> Result<()> {
        tracing::debug!(
            "Connection established from {} ({:?} port)",
            self.peer_addr,
            self.session.port()
        );

        loop {
            let message = match read_message(&mut self.reader) {
                Ok(message) => message,
                Err(KvError::Io(ref e)) if is_disconnect(e.kind()) => {
                    tracing::debug!("Client {} disconnected: {}", self.peer_addr, e);
                    return Ok(());
                }
                Err(e) => {
                    tracing::warn!("Closing {}: {}", self.peer_addr, e);
                    return Err(e);
                }
            };

            let Message { id, content } = message;
            let command = match content {
                MessageContent::Command(command) => command,
                MessageContent::Response(_) => {
                    tracing::warn!("Ignoring response message {} from {}", id, self.peer_addr);
                    continue;
                }
            };

            tracing::trace!("Received {} from {}: {:?}", id, self.peer_addr, command.name);
            let response = self.commands.dispatch(&mut self.session, &command);

            if let Err(e) = write_message(&mut self.writer, &Message::response(id, response)) {
                if let KvError::Io(ref io_err) = e {
                    if is_disconnect(io_err.kind()) || io_err.kind() == ErrorKind::BrokenPipe {
                        tracing::debug!(
                            "Client {} disconnected before response could be sent: {}",
                            self.peer_addr,
                            e
                        );
                        return Ok(());
                    }
                }
                tracing::warn!("Error writing to {}: {}", self.peer_addr, e);
                return Err(e);
            }
        }
    }

    pub fn peer_addr(&self) -> &str {
        &self.peer_addr
    }
}

fn is_disconnect(kind: ErrorKind) -> bool {
    matches!(
        kind,
        ErrorKind::UnexpectedEof
            | ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::WouldBlock
            | ErrorKind::TimedOut
    )
}
