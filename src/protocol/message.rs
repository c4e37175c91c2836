//! Message definitions
//!
//! Every type that can cross the wire, and the closed [`Payload`] union that
//! ties each one to its registered type code.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{KvError, Result};

/// Registered payload type codes
///
/// Codes must match between client and server builds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PayloadType {
    Message = 0x01,
    Command = 0x02,
    Response = 0x03,
    DatabaseInfo = 0x04,
    ClusterInfo = 0x05,
}

impl PayloadType {
    pub fn from_code(code: u8) -> Result<Self> {
        match code {
            0x01 => Ok(PayloadType::Message),
            0x02 => Ok(PayloadType::Command),
            0x03 => Ok(PayloadType::Response),
            0x04 => Ok(PayloadType::DatabaseInfo),
            0x05 => Ok(PayloadType::ClusterInfo),
            other => Err(KvError::UnregisteredPayload(other)),
        }
    }
}

/// Any encodable value
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Message(Message),
    Command(Command),
    Response(Response),
    DatabaseInfo(DatabaseInfo),
    ClusterInfo(ClusterInfo),
}

impl Payload {
    pub fn payload_type(&self) -> PayloadType {
        match self {
            Payload::Message(_) => PayloadType::Message,
            Payload::Command(_) => PayloadType::Command,
            Payload::Response(_) => PayloadType::Response,
            Payload::DatabaseInfo(_) => PayloadType::DatabaseInfo,
            Payload::ClusterInfo(_) => PayloadType::ClusterInfo,
        }
    }
}

// =============================================================================
// Message
// =============================================================================

/// Top-level unit on the wire: one per frame
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub id: String,
    pub content: MessageContent,
}

/// Resolved from the encoded type tag, not from connection direction
#[derive(Debug, Clone, PartialEq)]
pub enum MessageContent {
    Command(Command),
    Response(Response),
}

impl Message {
    pub fn command(id: impl Into<String>, command: Command) -> Self {
        Self {
            id: id.into(),
            content: MessageContent::Command(command),
        }
    }

    pub fn response(id: impl Into<String>, response: Response) -> Self {
        Self {
            id: id.into(),
            content: MessageContent::Response(response),
        }
    }
}

// =============================================================================
// Command
// =============================================================================

/// A named remote call with positional byte-array arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub name: String,
    pub parameters: Vec<Vec<u8>>,
}

impl Command {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parameters: Vec::new(),
        }
    }

    pub fn with_parameters(name: impl Into<String>, parameters: Vec<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            parameters,
        }
    }

    /// Append one positional argument
    pub fn arg(mut self, parameter: impl Into<Vec<u8>>) -> Self {
        self.parameters.push(parameter.into());
        self
    }
}

// =============================================================================
// Response
// =============================================================================

/// Response status codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ResponseCode {
    Error = 0,
    Success = 1,
}

impl ResponseCode {
    pub fn from_code(code: i32) -> Result<Self> {
        match code {
            0 => Ok(ResponseCode::Error),
            1 => Ok(ResponseCode::Success),
            other => Err(KvError::Protocol(format!("Unknown response code: {}", other))),
        }
    }
}

/// Outcome of one command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub code: ResponseCode,
    /// Result elements; an ERROR carries its UTF-8 description as the only one
    pub result: Vec<Vec<u8>>,
}

impl Response {
    pub fn success(result: Vec<Vec<u8>>) -> Self {
        Self {
            code: ResponseCode::Success,
            result,
        }
    }

    /// SUCCESS with no result elements
    pub fn ok() -> Self {
        Self::success(Vec::new())
    }

    pub fn error(message: &str) -> Self {
        Self {
            code: ResponseCode::Error,
            result: vec![message.as_bytes().to_vec()],
        }
    }

    pub fn is_success(&self) -> bool {
        self.code == ResponseCode::Success
    }

    /// Description of an ERROR response
    pub fn error_message(&self) -> Option<String> {
        if self.is_success() {
            return None;
        }
        Some(
            self.result
                .first()
                .map(|m| String::from_utf8_lossy(m).into_owned())
                .unwrap_or_default(),
        )
    }
}

// =============================================================================
// Database and Cluster Info
// =============================================================================

/// Which KV semantics a database serves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum DatabaseKind {
    /// Version-chained values (optimistic concurrency)
    Versioned = 0x01,
    /// Existence-conditioned values (compare-and-swap on existence)
    Conditional = 0x02,
}

impl DatabaseKind {
    pub fn from_code(code: u8) -> Result<Self> {
        match code {
            0x01 => Ok(DatabaseKind::Versioned),
            0x02 => Ok(DatabaseKind::Conditional),
            other => Err(KvError::Protocol(format!("Unknown database kind: {}", other))),
        }
    }
}

/// A node's self-reported topology: cluster name -> member URIs
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterInfo {
    pub clusters: BTreeMap<String, Vec<String>>,
}

impl ClusterInfo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cluster<I, S>(mut self, name: impl Into<String>, uris: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.clusters
            .insert(name.into(), uris.into_iter().map(Into::into).collect());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }
}

/// Definition and state of one logical database
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseInfo {
    pub name: String,
    /// 0 means "server default"
    pub partitions: u32,
    pub kind: DatabaseKind,
    pub enabled: bool,
    pub clusters: ClusterInfo,
}

impl DatabaseInfo {
    pub fn new(name: impl Into<String>, kind: DatabaseKind) -> Self {
        Self {
            name: name.into(),
            partitions: 0,
            kind,
            enabled: true,
            clusters: ClusterInfo::default(),
        }
    }

    pub fn partitions(mut self, partitions: u32) -> Self {
        self.partitions = partitions;
        self
    }

    pub fn clusters(mut self, clusters: ClusterInfo) -> Self {
        self.clusters = clusters;
        self
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}
