//! Protocol Module
//!
//! Defines the wire protocol for client-server communication.
//!
//! ## Layers
//! ```text
//! ┌──────────┬────────────────────────────────────────────┐
//! │ Len (4)  │ Type (1) │ Message fields ...              │
//! └──────────┴────────────────────────────────────────────┘
//!   frame.rs   codec.rs
//! ```
//!
//! A [`Message`] is `{id, content}` where content is a [`Command`] (client →
//! server) or a [`Response`] (server → client). Responses echo the id of the
//! message they answer.
//!
//! ### Response Codes
//! - 1: SUCCESS
//! - 0: ERROR (sole result element is a UTF-8 description)

mod codec;
mod frame;
mod message;

pub use codec::{
    decode_cluster_info, decode_database_info, decode_message, decode_payload,
    encode_cluster_info, encode_database_info, encode_message, encode_payload, MAX_FIELD_SIZE,
};
pub use frame::{
    encode_frame, read_frame, read_message, write_frame, write_message, FRAME_HEADER_SIZE,
    MAX_FRAME_SIZE,
};
pub use message::{
    ClusterInfo, Command, DatabaseInfo, DatabaseKind, Message, MessageContent, Payload,
    PayloadType, Response, ResponseCode,
};

/// Built-in command names
pub mod commands {
    pub const USE: &str = "use";
    pub const CREATE_DATABASE: &str = "create database";
    pub const ENABLE_DATABASE: &str = "enable database";
    pub const DISABLE_DATABASE: &str = "disable database";
    pub const DROP_DATABASE: &str = "drop database";
    pub const CLUSTER: &str = "cluster";
    pub const SHOW_DATABASES: &str = "show databases";
    pub const PUT: &str = "put";
    pub const GET: &str = "get";
    pub const EXISTS: &str = "exists";
    pub const BATCH_BEGIN: &str = "batch begin";
    pub const BATCH_ABORT: &str = "batch abort";
    pub const BATCH_COMMIT: &str = "batch commit";
}
