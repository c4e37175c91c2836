//! Network Module
//!
//! TCP server side of the RPC protocol.
//!
//! ## Architecture
//! - One accept thread per listener (public data port, local management port)
//! - One thread per connection, owning that connection's [`Session`]
//! - Commands routed through the [`CommandTable`]

mod commands;
mod connection;
mod server;
mod session;

pub use commands::{CommandSpec, CommandTable};
pub use connection::Connection;
pub use server::{Server, ServerHandle};
pub use session::{OpenBatch, PortKind, Session};
