//! Typed command wrappers
//!
//! [`DatabaseClient`] encodes command parameters and decodes result
//! elements, turning ERROR responses into [`KvError::Remote`].

use crate::cluster::{self, KvdbUri};
use crate::config::ClientConfig;
use crate::error::{KvError, Result};
use crate::kv::ExistencePolicy;
use crate::protocol::{
    commands, decode_cluster_info, decode_database_info, encode_database_info, ClusterInfo,
    Command, DatabaseInfo, Response,
};

use super::connection::Client;

/// A versioned value as returned by `get`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionedValue {
    pub version: i64,
    pub value: Vec<u8>,
}

pub struct DatabaseClient {
    client: Client,
}

impl DatabaseClient {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn into_inner(self) -> Client {
        self.client
    }

    fn call(&self, command: Command) -> Result<Vec<Vec<u8>>> {
        let name = command.name.clone();
        let response = self.client.send(command)?;
        into_result(&name, response)
    }

    // -------------------------------------------------------------------------
    // Administration
    // -------------------------------------------------------------------------

    pub fn use_database(&self, name: &str) -> Result<()> {
        self.call(Command::new(commands::USE).arg(name)).map(drop)
    }

    pub fn create_database(&self, info: &DatabaseInfo) -> Result<DatabaseInfo> {
        let result = self.call(Command::new(commands::CREATE_DATABASE).arg(encode_database_info(info)))?;
        decode_database_info(single(&result, commands::CREATE_DATABASE)?)
    }

    pub fn enable_database(&self, name: &str) -> Result<()> {
        self.call(Command::new(commands::ENABLE_DATABASE).arg(name)).map(drop)
    }

    pub fn disable_database(&self, name: &str) -> Result<()> {
        self.call(Command::new(commands::DISABLE_DATABASE).arg(name)).map(drop)
    }

    pub fn drop_database(&self, name: &str) -> Result<()> {
        self.call(Command::new(commands::DROP_DATABASE).arg(name)).map(drop)
    }

    pub fn show_databases(&self) -> Result<Vec<DatabaseInfo>> {
        self.call(Command::new(commands::SHOW_DATABASES))?
            .iter()
            .map(|raw| decode_database_info(raw))
            .collect()
    }

    /// Topology table of the selected database
    pub fn cluster(&self) -> Result<ClusterInfo> {
        let result = self.call(Command::new(commands::CLUSTER))?;
        decode_cluster_info(single(&result, commands::CLUSTER)?)
    }

    // -------------------------------------------------------------------------
    // Data
    // -------------------------------------------------------------------------

    /// Write `value` if the key is at `expected`; returns the new version
    pub fn put_versioned(&self, key: &[u8], value: &[u8], expected: i64) -> Result<i64> {
        let command = Command::new(commands::PUT)
            .arg(key)
            .arg(value)
            .arg(expected.to_be_bytes().to_vec());
        let result = self.call(command)?;
        decode_i64(single(&result, commands::PUT)?)
    }

    /// Write `value` if the key's existence satisfies `policy`
    pub fn put_conditional(&self, key: &[u8], value: &[u8], policy: ExistencePolicy) -> Result<()> {
        let command = Command::new(commands::PUT)
            .arg(key)
            .arg(value)
            .arg(policy.as_str());
        self.call(command).map(drop)
    }

    /// Latest version and value of a key in a versioned database
    pub fn get_latest(&self, key: &[u8]) -> Result<Option<VersionedValue>> {
        let mut result = self.call(Command::new(commands::GET).arg(key))?;
        match result.len() {
            0 => Ok(None),
            2 => {
                let value = result.pop().unwrap_or_default();
                let version = decode_i64(&result[0])?;
                Ok(Some(VersionedValue { version, value }))
            }
            n => Err(unexpected(commands::GET, n)),
        }
    }

    /// Value of a key at `version` in a versioned database
    pub fn get_at(&self, key: &[u8], version: i64) -> Result<Option<Vec<u8>>> {
        let command = Command::new(commands::GET)
            .arg(key)
            .arg(version.to_be_bytes().to_vec());
        optional(self.call(command)?, commands::GET)
    }

    /// Value of a key in a conditional database
    pub fn get_value(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        optional(self.call(Command::new(commands::GET).arg(key))?, commands::GET)
    }

    pub fn exists(&self, key: &[u8]) -> Result<bool> {
        let result = self.call(Command::new(commands::EXISTS).arg(key))?;
        match single(&result, commands::EXISTS)? {
            [0] => Ok(false),
            [1] => Ok(true),
            other => Err(KvError::Protocol(format!("invalid boolean: {:?}", other))),
        }
    }

    // -------------------------------------------------------------------------
    // Batches
    // -------------------------------------------------------------------------

    pub fn batch_begin(&self) -> Result<()> {
        self.call(Command::new(commands::BATCH_BEGIN)).map(drop)
    }

    pub fn batch_abort(&self) -> Result<()> {
        self.call(Command::new(commands::BATCH_ABORT)).map(drop)
    }

    pub fn batch_commit(&self) -> Result<()> {
        self.call(Command::new(commands::BATCH_COMMIT)).map(drop)
    }
}

/// Ask the node at `remote_uri` for its topology table and compare it with
/// `local_table`, as seen from the node listening on `local_port`
pub fn verify_peer(
    local_port: u16,
    local_table: &ClusterInfo,
    remote_uri: &KvdbUri,
    config: ClientConfig,
) -> Result<bool> {
    let connect_timeout = config.request_timeout;
    let client = Client::connect(remote_uri.socket_addr(), config)?;
    if !client.wait_connected(connect_timeout) {
        return Err(KvError::NotConnected);
    }

    let peer = DatabaseClient::new(client);
    peer.use_database(&remote_uri.database)?;
    let remote_table = peer.cluster()?;

    let matched = cluster::matches(local_port, local_table, remote_uri, &remote_table);
    tracing::info!("Peer {} topology match: {}", remote_uri, matched);
    Ok(matched)
}

fn into_result(name: &str, response: Response) -> Result<Vec<Vec<u8>>> {
    if response.is_success() {
        return Ok(response.result);
    }
    let message = response.error_message().unwrap_or_default();
    tracing::debug!("'{}' failed: {}", name, message);
    Err(KvError::Remote(message))
}

fn single<'a>(result: &'a [Vec<u8>], name: &str) -> Result<&'a [u8]> {
    match result {
        [only] => Ok(only),
        other => Err(unexpected(name, other.len())),
    }
}

fn optional(mut result: Vec<Vec<u8>>, name: &str) -> Result<Option<Vec<u8>>> {
    match result.len() {
        0 => Ok(None),
        1 => Ok(result.pop()),
        n => Err(unexpected(name, n)),
    }
}

fn decode_i64(raw: &[u8]) -> Result<i64> {
    let bytes: [u8; 8] = raw
        .try_into()
        .map_err(|_| KvError::Protocol(format!("expected 8-byte integer, got {} bytes", raw.len())))?;
    Ok(i64::from_be_bytes(bytes))
}

fn unexpected(name: &str, count: usize) -> KvError {
    KvError::Protocol(format!("'{}' returned {} result elements", name, count))
}
