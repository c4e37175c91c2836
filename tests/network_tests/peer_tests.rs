//! Peer verification between two running nodes
//!
//! Topology URIs address each node's management listener.

use std::net::TcpListener;
use std::time::{Duration, Instant};

use partikv::client::verify_peer;
use partikv::cluster::KvdbUri;
use partikv::protocol::{ClusterInfo, DatabaseInfo, DatabaseKind};
use partikv::KvError;

use crate::common::{client_config, TestNode};

fn member(port: u16) -> String {
    format!("kvdb://127.0.0.1:{}/d", port)
}

fn create_with(node: &TestNode, clusters: &ClusterInfo) {
    node.admin()
        .create_database(&DatabaseInfo::new("d", DatabaseKind::Versioned).clusters(clusters.clone()))
        .unwrap();
}

#[test]
fn test_consistent_peers_verify() {
    let a = TestNode::start();
    let b = TestNode::start();
    let table = ClusterInfo::new().with_cluster("c1", [member(a.admin_port()), member(b.admin_port())]);
    create_with(&a, &table);
    create_with(&b, &table);

    let b_uri = KvdbUri::new("127.0.0.1", b.admin_port(), "d");
    assert!(verify_peer(a.admin_port(), &table, &b_uri, client_config()).unwrap());

    let a_uri = KvdbUri::new("localhost", a.admin_port(), "d");
    assert!(verify_peer(b.admin_port(), &table, &a_uri, client_config()).unwrap());
}

#[test]
fn test_drifted_peer_does_not_verify() {
    let a = TestNode::start();
    let b = TestNode::start();
    let a_table = ClusterInfo::new().with_cluster("c1", [member(a.admin_port()), member(b.admin_port())]);
    let b_table = ClusterInfo::new().with_cluster("c1", [member(b.admin_port()), member(1)]);
    create_with(&a, &a_table);
    create_with(&b, &b_table);

    let b_uri = KvdbUri::new("127.0.0.1", b.admin_port(), "d");
    assert!(!verify_peer(a.admin_port(), &a_table, &b_uri, client_config()).unwrap());
}

#[test]
fn test_peer_without_database_is_an_error() {
    let a = TestNode::start();
    let b = TestNode::start();
    let table = ClusterInfo::new().with_cluster("c1", [member(a.admin_port()), member(b.admin_port())]);

    let b_uri = KvdbUri::new("127.0.0.1", b.admin_port(), "d");
    assert!(matches!(
        verify_peer(a.admin_port(), &table, &b_uri, client_config()),
        Err(KvError::Remote(_))
    ));
}

#[test]
fn test_unreachable_peer_is_an_error() {
    let port = TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap().port();
    let uri = KvdbUri::new("127.0.0.1", port, "d");
    let config = partikv::ClientConfig::builder()
        .request_timeout(std::time::Duration::from_millis(300))
        .build();

    assert!(matches!(
        verify_peer(7078, &ClusterInfo::new(), &uri, config),
        Err(KvError::NotConnected)
    ));
}

#[test]
fn test_blackholed_peer_fails_within_timeouts() {
    let uri = KvdbUri::new("10.255.255.1", 7079, "d");
    let config = partikv::ClientConfig::builder()
        .request_timeout(Duration::from_millis(300))
        .connect_timeout(Duration::from_millis(200))
        .build();

    let started = Instant::now();
    assert!(matches!(
        verify_peer(7078, &ClusterInfo::new(), &uri, config),
        Err(KvError::NotConnected)
    ));
    assert!(started.elapsed() < Duration::from_secs(3));
}
