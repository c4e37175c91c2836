//! Command dispatch
//!
//! Maps command names to handlers. Each command declares statically whether
//! it is restricted to the local management port.
//!
//! ## Parameter encoding
//! - strings: UTF-8 bytes
//! - versions: 8-byte big-endian i64
//! - booleans: one byte, 0 or 1
//!
//! | command            | parameters                    | result               |
//! |--------------------|-------------------------------|----------------------|
//! | `use`              | name                          |                      |
//! | `create database`  | encoded DatabaseInfo          | encoded DatabaseInfo |
//! | `enable database`  | name                          |                      |
//! | `disable database` | name                          |                      |
//! | `drop database`    | name                          |                      |
//! | `cluster`          |                               | encoded ClusterInfo  |
//! | `show databases`   |                               | encoded DatabaseInfo*|
//! | `put` (versioned)  | key, value, expected version  | new version          |
//! | `put` (conditional)| key, value, policy            | true                 |
//! | `get` (versioned)  | key [, version]               | [version,] value     |
//! | `get` (conditional)| key                           | value                |
//! | `exists`           | key                           | bool                 |
//! | `batch begin`      |                               |                      |
//! | `batch abort`      |                               |                      |
//! | `batch commit`     |                               |                      |

use std::collections::HashMap;

use crate::database::KvLayer;
use crate::error::{KvError, Result};
use crate::kv::{ExistencePolicy, VersionedEntry, NO_VERSION};
use crate::protocol::{
    commands, decode_database_info, encode_cluster_info, encode_database_info, Command, Response,
};

use super::session::{OpenBatch, PortKind, Session};

type Handler = fn(&mut Session, &[Vec<u8>]) -> Result<Response>;

/// One registered command
#[derive(Clone, Copy)]
pub struct CommandSpec {
    pub name: &'static str,
    /// Only accepted on the local management port
    pub local_only: bool,
    handler: Handler,
}

impl CommandSpec {
    pub fn new(name: &'static str, local_only: bool, handler: Handler) -> Self {
        Self {
            name,
            local_only,
            handler,
        }
    }
}

pub struct CommandTable {
    commands: HashMap<&'static str, CommandSpec>,
}

impl CommandTable {
    pub fn empty() -> Self {
        Self {
            commands: HashMap::new(),
        }
    }

    /// Table with every built-in command
    pub fn builtin() -> Self {
        let mut table = Self::empty();
        table.register(CommandSpec::new(commands::USE, false, handle_use));
        table.register(CommandSpec::new(commands::CREATE_DATABASE, true, handle_create_database));
        table.register(CommandSpec::new(commands::ENABLE_DATABASE, true, handle_enable_database));
        table.register(CommandSpec::new(commands::DISABLE_DATABASE, true, handle_disable_database));
        table.register(CommandSpec::new(commands::DROP_DATABASE, true, handle_drop_database));
        table.register(CommandSpec::new(commands::CLUSTER, true, handle_cluster));
        table.register(CommandSpec::new(commands::SHOW_DATABASES, true, handle_show_databases));
        table.register(CommandSpec::new(commands::PUT, false, handle_put));
        table.register(CommandSpec::new(commands::GET, false, handle_get));
        table.register(CommandSpec::new(commands::EXISTS, false, handle_exists));
        table.register(CommandSpec::new(commands::BATCH_BEGIN, false, handle_batch_begin));
        table.register(CommandSpec::new(commands::BATCH_ABORT, false, handle_batch_abort));
        table.register(CommandSpec::new(commands::BATCH_COMMIT, false, handle_batch_commit));
        table
    }

    pub fn register(&mut self, spec: CommandSpec) {
        self.commands.insert(spec.name, spec);
    }

    pub fn get(&self, name: &str) -> Option<&CommandSpec> {
        self.commands.get(name)
    }

    /// Run `command` against `session`; failures become ERROR responses
    pub fn dispatch(&self, session: &mut Session, command: &Command) -> Response {
        let Some(spec) = self.commands.get(command.name.as_str()) else {
            return handle_unknown(command);
        };

        if spec.local_only && session.port() != PortKind::Local {
            tracing::debug!("Rejected local-only command '{}' on public port", spec.name);
            return Response::error(&format!(
                "Command '{}' is only available on the local management port",
                spec.name
            ));
        }

        match (spec.handler)(session, &command.parameters) {
            Ok(response) => response,
            Err(e) => {
                tracing::debug!("Command '{}' failed: {}", spec.name, e);
                Response::error(&e.to_string())
            }
        }
    }
}

impl Default for CommandTable {
    fn default() -> Self {
        Self::builtin()
    }
}

fn handle_unknown(command: &Command) -> Response {
    tracing::debug!("Unknown command '{}'", command.name);
    Response::error(&format!("Unknown command: {}", command.name))
}

// =============================================================================
// Database administration
// =============================================================================

fn handle_use(session: &mut Session, params: &[Vec<u8>]) -> Result<Response> {
    let name = param_str(params, 0, "database name")?;
    session.use_database(name)?;
    Ok(Response::ok())
}

fn handle_create_database(session: &mut Session, params: &[Vec<u8>]) -> Result<Response> {
    let info = decode_database_info(param(params, 0, "database info")?)?;
    let database = session.manager().create(info)?;
    Ok(Response::success(vec![encode_database_info(&database.info())]))
}

fn handle_enable_database(session: &mut Session, params: &[Vec<u8>]) -> Result<Response> {
    session.manager().enable(param_str(params, 0, "database name")?)?;
    Ok(Response::ok())
}

fn handle_disable_database(session: &mut Session, params: &[Vec<u8>]) -> Result<Response> {
    session.manager().disable(param_str(params, 0, "database name")?)?;
    Ok(Response::ok())
}

fn handle_drop_database(session: &mut Session, params: &[Vec<u8>]) -> Result<Response> {
    let name = param_str(params, 0, "database name")?.to_string();
    session.manager().drop_database(&name)?;
    session.deselect(&name);
    Ok(Response::ok())
}

fn handle_cluster(session: &mut Session, _params: &[Vec<u8>]) -> Result<Response> {
    let clusters = session.database()?.cluster_info();
    Ok(Response::success(vec![encode_cluster_info(&clusters)]))
}

fn handle_show_databases(session: &mut Session, _params: &[Vec<u8>]) -> Result<Response> {
    let infos = session
        .manager()
        .list()
        .iter()
        .map(encode_database_info)
        .collect();
    Ok(Response::success(infos))
}

// =============================================================================
// Data commands
// =============================================================================

fn handle_put(session: &mut Session, params: &[Vec<u8>]) -> Result<Response> {
    let key = param(params, 0, "key")?;
    let value = param(params, 1, "value")?;
    let layer = session.database()?.layer().clone();

    match layer {
        KvLayer::Versioned(store) => {
            let expected = param_i64(params, 2, "expected version")?;
            let version = match session.batch_mut() {
                Some(OpenBatch::Versioned(batch)) => batch.set(key, value, expected)?,
                Some(OpenBatch::Conditional(_)) => return Err(mismatched_batch()),
                None => store.set(key, value, expected)?,
            };
            Ok(Response::success(vec![version.to_be_bytes().to_vec()]))
        }
        KvLayer::Conditional(store) => {
            let policy: ExistencePolicy = param_str(params, 2, "existence policy")?.parse()?;
            let written = match session.batch_mut() {
                Some(OpenBatch::Conditional(batch)) => batch.set(key, value, policy)?,
                Some(OpenBatch::Versioned(_)) => return Err(mismatched_batch()),
                None => store.set(key, value, policy)?,
            };
            if !written {
                return Err(KvError::PolicyViolation(policy.to_string()));
            }
            Ok(Response::success(vec![encode_bool(true)]))
        }
    }
}

fn handle_get(session: &mut Session, params: &[Vec<u8>]) -> Result<Response> {
    let key = param(params, 0, "key")?;
    let layer = session.database()?.layer().clone();

    match layer {
        KvLayer::Versioned(store) => {
            let at = match params.get(1) {
                Some(_) => Some(param_i64(params, 1, "version")?),
                None => None,
            };
            let entry = match (session.batch_mut(), at) {
                (Some(OpenBatch::Versioned(batch)), Some(v)) => batch.get_entry(key, v)?,
                (Some(OpenBatch::Versioned(batch)), None) => batch.get_latest(key)?,
                (Some(OpenBatch::Conditional(_)), _) => return Err(mismatched_batch()),
                (None, Some(v)) => store.get_entry(key, v)?,
                (None, None) => store.get_latest(key)?,
            };
            Ok(match (entry, at) {
                (Some(VersionedEntry { value, .. }), Some(_)) => Response::success(vec![value]),
                (Some(VersionedEntry { version, value, .. }), None) => {
                    Response::success(vec![version.to_be_bytes().to_vec(), value])
                }
                (None, _) => Response::ok(),
            })
        }
        KvLayer::Conditional(store) => {
            let value = match session.batch_mut() {
                Some(OpenBatch::Conditional(batch)) => batch.get(key)?,
                Some(OpenBatch::Versioned(_)) => return Err(mismatched_batch()),
                None => store.get(key)?,
            };
            Ok(match value {
                Some(value) => Response::success(vec![value]),
                None => Response::ok(),
            })
        }
    }
}

fn handle_exists(session: &mut Session, params: &[Vec<u8>]) -> Result<Response> {
    let key = param(params, 0, "key")?;
    let layer = session.database()?.layer().clone();

    let exists = match (layer, session.batch_mut()) {
        (KvLayer::Versioned(_), Some(OpenBatch::Versioned(batch))) => {
            batch.get_version(key)? != NO_VERSION
        }
        (KvLayer::Versioned(store), None) => store.get_version(key)? != NO_VERSION,
        (KvLayer::Conditional(_), Some(OpenBatch::Conditional(batch))) => batch.exist(key)?,
        (KvLayer::Conditional(store), None) => store.exist(key)?,
        _ => return Err(mismatched_batch()),
    };
    Ok(Response::success(vec![encode_bool(exists)]))
}

// =============================================================================
// Batches
// =============================================================================

fn handle_batch_begin(session: &mut Session, _params: &[Vec<u8>]) -> Result<Response> {
    session.begin_batch()?;
    Ok(Response::ok())
}

fn handle_batch_abort(session: &mut Session, _params: &[Vec<u8>]) -> Result<Response> {
    let batch = session.take_batch()?;
    tracing::trace!("Aborted batch with {} pending keys", batch.len());
    Ok(Response::ok())
}

fn handle_batch_commit(session: &mut Session, _params: &[Vec<u8>]) -> Result<Response> {
    session.take_batch()?.commit()?;
    Ok(Response::ok())
}

// =============================================================================
// Parameter helpers
// =============================================================================

fn param<'a>(params: &'a [Vec<u8>], index: usize, what: &str) -> Result<&'a [u8]> {
    params
        .get(index)
        .map(Vec::as_slice)
        .ok_or_else(|| KvError::InvalidArgument(format!("missing {} (parameter {})", what, index)))
}

fn param_str<'a>(params: &'a [Vec<u8>], index: usize, what: &str) -> Result<&'a str> {
    std::str::from_utf8(param(params, index, what)?)
        .map_err(|_| KvError::InvalidArgument(format!("{} is not valid UTF-8", what)))
}

fn param_i64(params: &[Vec<u8>], index: usize, what: &str) -> Result<i64> {
    let raw: [u8; 8] = param(params, index, what)?.try_into().map_err(|_| {
        KvError::InvalidArgument(format!("{} must be an 8-byte big-endian integer", what))
    })?;
    Ok(i64::from_be_bytes(raw))
}

fn encode_bool(value: bool) -> Vec<u8> {
    vec![value as u8]
}

fn mismatched_batch() -> KvError {
    KvError::InvalidArgument("open batch does not belong to the selected database".to_string())
}
