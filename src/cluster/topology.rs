//! Cluster topology matching
//!
//! Decides whether two nodes were configured as members of the same cluster
//! by comparing the topology tables each reports for a database. This only
//! detects configuration drift; it is not a membership protocol.
//!
//! Given the local port, the remote node's URI and both tables:
//! 1. An empty remote table never matches.
//! 2. From each table keep the clusters whose URI list holds both a loopback
//!    URI on the local port and a URI on the remote node's host:port.
//! 3. The kept sets must have the same size, and every locally kept cluster
//!    must be kept remotely under the same name with the same host:port
//!    pairs once both URI lists are sorted on (normalized host, port).

use std::collections::BTreeMap;

use crate::protocol::ClusterInfo;

use super::uri::KvdbUri;

/// Whether `local` and `remote` describe the same cluster membership for
/// the node on `local_port` and the node at `remote_uri`
pub fn matches(
    local_port: u16,
    local: &ClusterInfo,
    remote_uri: &KvdbUri,
    remote: &ClusterInfo,
) -> bool {
    if remote.is_empty() {
        tracing::debug!("Remote {} reports no clusters", remote_uri);
        return false;
    }

    let local_shared = shared_clusters(local, local_port, remote_uri);
    let remote_shared = shared_clusters(remote, local_port, remote_uri);

    if local_shared.len() != remote_shared.len() {
        tracing::debug!(
            "Cluster count differs for {}: local {} vs remote {}",
            remote_uri,
            local_shared.len(),
            remote_shared.len()
        );
        return false;
    }

    for (name, local_uris) in &local_shared {
        let Some(remote_uris) = remote_shared.get(name) else {
            tracing::debug!("Cluster {} missing on {}", name, remote_uri);
            return false;
        };

        if local_uris.len() != remote_uris.len() {
            tracing::debug!("Cluster {} has different member counts on {}", name, remote_uri);
            return false;
        }

        if endpoints(local_uris) != endpoints(remote_uris) {
            tracing::debug!("Cluster {} members differ on {}", name, remote_uri);
            return false;
        }
    }

    true
}

/// Sorted `(normalized host, port)` pairs, so loopback spellings agree
fn endpoints(members: &[KvdbUri]) -> Vec<(String, u16)> {
    let mut endpoints: Vec<_> = members
        .iter()
        .map(|uri| (uri.normalized_host(), uri.port))
        .collect();
    endpoints.sort();
    endpoints
}

/// Clusters in `table` listing both endpoints. Unparseable URIs are
/// ignored.
fn shared_clusters(
    table: &ClusterInfo,
    local_port: u16,
    remote_uri: &KvdbUri,
) -> BTreeMap<String, Vec<KvdbUri>> {
    let mut shared = BTreeMap::new();

    for (name, uris) in &table.clusters {
        let members: Vec<KvdbUri> = uris
            .iter()
            .filter_map(|raw| match KvdbUri::parse(raw) {
                Ok(uri) => Some(uri),
                Err(e) => {
                    tracing::debug!("Ignoring member of cluster {}: {}", name, e);
                    None
                }
            })
            .collect();

        let has_local = members
            .iter()
            .any(|uri| uri.is_local_host() && uri.port == local_port);
        let has_remote = members.iter().any(|uri| uri.same_endpoint(remote_uri));

        if has_local && has_remote {
            shared.insert(name.clone(), members);
        }
    }

    shared
}
