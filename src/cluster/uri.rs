//! `kvdb://host:port/database` URIs

use std::fmt;
use std::str::FromStr;

use crate::error::{KvError, Result};

pub const SCHEME: &str = "kvdb";

/// Address of one logical database on one node
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KvdbUri {
    pub host: String,
    pub port: u16,
    pub database: String,
}

impl KvdbUri {
    pub fn new(host: impl Into<String>, port: u16, database: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port,
            database: database.into(),
        }
    }

    pub fn parse(uri: &str) -> Result<Self> {
        let invalid = |why: &str| KvError::InvalidUri(format!("{}: {}", uri, why));

        let rest = uri
            .strip_prefix(SCHEME)
            .and_then(|r| r.strip_prefix("://"))
            .ok_or_else(|| invalid("scheme must be kvdb://"))?;

        let (authority, database) = rest
            .split_once('/')
            .ok_or_else(|| invalid("missing database name"))?;
        if database.is_empty() {
            return Err(invalid("missing database name"));
        }

        let (host, port) = if let Some(bracketed) = authority.strip_prefix('[') {
            let (host, tail) = bracketed
                .split_once(']')
                .ok_or_else(|| invalid("unterminated IPv6 host"))?;
            let port = tail.strip_prefix(':').ok_or_else(|| invalid("missing port"))?;
            (host, port)
        } else {
            authority
                .rsplit_once(':')
                .ok_or_else(|| invalid("missing port"))?
        };

        if host.is_empty() {
            return Err(invalid("missing host"));
        }
        let port = port.parse::<u16>().map_err(|_| invalid("invalid port"))?;

        Ok(Self::new(host, port, database))
    }

    /// `host:port`, suitable for `TcpStream::connect`
    pub fn socket_addr(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }

    /// Whether the host names this machine's loopback
    pub fn is_local_host(&self) -> bool {
        is_loopback(&self.host)
    }

    /// Host with loopback aliases folded together, for comparisons
    pub fn normalized_host(&self) -> String {
        if self.is_local_host() {
            "localhost".to_string()
        } else {
            self.host.to_ascii_lowercase()
        }
    }

    /// Same host (modulo loopback aliases and case) and port
    pub fn same_endpoint(&self, other: &KvdbUri) -> bool {
        self.port == other.port && self.normalized_host() == other.normalized_host()
    }
}

fn is_loopback(host: &str) -> bool {
    matches!(
        host.to_ascii_lowercase().as_str(),
        "localhost" | "127.0.0.1" | "::1"
    )
}

impl FromStr for KvdbUri {
    type Err = KvError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for KvdbUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}/{}", SCHEME, self.socket_addr(), self.database)
    }
}
