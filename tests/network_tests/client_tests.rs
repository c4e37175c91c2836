//! Client Tests
//!
//! Tests verify:
//! - Concurrent callers sharing one connection each get their own response
//! - Failures surface promptly instead of hanging
//! - Reconnection once a server appears
//! - Shutdown never waits on a hung connect attempt

use std::io::BufReader;
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::{Duration, Instant};

use partikv::client::INTERRUPTED;
use partikv::protocol::{
    read_message, write_message, Command, DatabaseInfo, DatabaseKind, Message, MessageContent,
    Response, MAX_FRAME_SIZE,
};
use partikv::{Client, ClientConfig, KvError};

use crate::common::{client_config, TestNode};

/// Read `count` commands, then answer them in reverse arrival order,
/// echoing each command's first parameter
fn reversing_server(listener: TcpListener, count: usize) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let (stream, _) = listener.accept().unwrap();
        let mut reader = BufReader::new(stream.try_clone().unwrap());
        let mut writer = stream;

        let mut received = Vec::with_capacity(count);
        for _ in 0..count {
            let message = read_message(&mut reader).unwrap();
            let MessageContent::Command(command) = message.content else {
                panic!("server received a response");
            };
            received.push((message.id, command.parameters[0].clone()));
        }

        for (id, echo) in received.into_iter().rev() {
            write_message(&mut writer, &Message::response(id, Response::success(vec![echo])))
                .unwrap();
        }
        // Keep the socket open until the client hangs up
        let _ = read_message(&mut reader);
    })
}

#[test]
fn test_concurrent_sends_get_matching_responses() {
    const CALLERS: usize = 16;

    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let server = reversing_server(listener, CALLERS);

    let client = Arc::new(Client::connect(addr.to_string(), client_config()).unwrap());
    assert!(client.wait_connected(Duration::from_secs(5)));

    let barrier = Arc::new(Barrier::new(CALLERS));
    let callers: Vec<_> = (0..CALLERS)
        .map(|n| {
            let client = Arc::clone(&client);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let tag = format!("caller-{}", n).into_bytes();
                barrier.wait();
                let response = client.send(Command::new("echo").arg(tag.clone())).unwrap();
                assert!(response.is_success());
                assert_eq!(response.result, vec![tag]);
            })
        })
        .collect();

    for caller in callers {
        caller.join().unwrap();
    }
    client.close();
    server.join().unwrap();
}

#[test]
fn test_dropped_connection_wakes_waiting_caller() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let server = thread::spawn(move || {
        let (stream, _) = listener.accept().unwrap();
        let mut reader = BufReader::new(stream);
        read_message(&mut reader).unwrap();
        // Hang up without answering
    });

    let client = Client::connect(addr.to_string(), client_config()).unwrap();
    assert!(client.wait_connected(Duration::from_secs(5)));

    let started = Instant::now();
    let response = client.send(Command::new("get").arg("k")).unwrap();

    assert_eq!(response.error_message().as_deref(), Some(INTERRUPTED));
    assert!(started.elapsed() < Duration::from_secs(4));
    server.join().unwrap();
}

#[test]
fn test_not_connected_until_server_appears() {
    // Reserve a port, then free it for the late server
    let addr = TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap();

    let client = Client::connect(addr.to_string(), client_config()).unwrap();
    assert!(!client.wait_connected(Duration::from_millis(200)));
    assert!(matches!(client.send(Command::new("use")), Err(KvError::NotConnected)));

    let listener = TcpListener::bind(addr).unwrap();
    let server = thread::spawn(move || {
        let (stream, _): (TcpStream, _) = listener.accept().unwrap();
        let mut reader = BufReader::new(stream.try_clone().unwrap());
        let mut writer = stream;
        let message = read_message(&mut reader).unwrap();
        write_message(&mut writer, &Message::response(message.id, Response::ok())).unwrap();
        let _ = read_message(&mut reader);
    });

    assert!(client.wait_connected(Duration::from_secs(5)));
    assert!(client.send(Command::new("use")).unwrap().is_success());

    client.close();
    assert!(!client.is_connected());
    server.join().unwrap();
}

#[test]
fn test_close_is_idempotent() {
    let addr = TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap();
    let client = Client::connect(addr.to_string(), client_config()).unwrap();

    client.close();
    client.close();

    assert!(!client.wait_connected(Duration::from_millis(100)));
}

#[test]
fn test_close_is_prompt_while_connect_hangs() {
    // Non-routable; the connect attempt either hangs or fails at once
    let config = ClientConfig::builder()
        .connect_timeout(Duration::from_millis(200))
        .reconnect_interval(Duration::from_millis(50))
        .build();
    let client = Client::connect("10.255.255.1:7078", config).unwrap();
    assert!(!client.wait_connected(Duration::from_millis(100)));

    let started = Instant::now();
    client.close();
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[test]
fn test_oversized_request_keeps_connection() {
    let node = TestNode::start();
    node.admin()
        .create_database(&DatabaseInfo::new("d", DatabaseKind::Versioned))
        .unwrap();
    let client = node.public();

    let huge = vec![0u8; MAX_FRAME_SIZE as usize + 1];
    let result = client.client().send(Command::new("get").arg(huge));

    assert!(matches!(result, Err(KvError::Protocol(_))));
    assert!(client.client().is_connected());
    client.use_database("d").unwrap();
}
