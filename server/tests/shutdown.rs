//! Integration tests for Quit and the shutdown ordering guarantees.

use std::io::{Read, Write};
use std::net::TcpStream;
use std::time::{Duration, Instant};

use corbel_server::{RegisterError, Server, ServerConfig};

fn send_frame(stream: &mut TcpStream, payload: &[u8]) {
    let mut buf = Vec::with_capacity(4 + payload.len());
    buf.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    buf.extend_from_slice(payload);
    stream.write_all(&buf).unwrap();
}

fn read_frame(stream: &mut TcpStream) -> Vec<u8> {
    let mut header = [0u8; 4];
    stream.read_exact(&mut header).unwrap();
    let mut payload = vec![0u8; u32::from_be_bytes(header) as usize];
    stream.read_exact(&mut payload).unwrap();
    payload
}

#[test]
fn quit_during_idle() {
    let mut server = Server::bind_tcp(ServerConfig::new("127.0.0.1:0")).unwrap();
    let addr = server.addr().to_string();

    server.quit();

    // The listener is gone.
    assert!(TcpStream::connect(&addr).is_err());

    // The channel yields the 199 event and then closes: a blocking
    // iterator must terminate.
    let codes: Vec<u16> = server.events().iter().map(|e| e.code).collect();
    assert_eq!(codes, vec![199]);
}

#[test]
fn quit_is_idempotent_and_fast() {
    let mut server = Server::bind_tcp(ServerConfig::new("127.0.0.1:0")).unwrap();

    let start = Instant::now();
    server.quit();
    server.quit();
    assert!(start.elapsed() < Duration::from_secs(1));
}

#[test]
fn register_after_quit_fails() {
    let mut server = Server::bind_tcp(ServerConfig::new("127.0.0.1:0")).unwrap();
    server
        .register("echo", "blob", |args| Ok(args[0].clone()))
        .unwrap();
    server.quit();

    let err = server
        .register("late", "blob", |args| Ok(args[0].clone()))
        .unwrap_err();
    assert!(matches!(err, RegisterError::Terminated));
}

#[test]
fn quit_drains_inflight_connections() {
    let mut config = ServerConfig::new("127.0.0.1:0");
    // Give workers a deadline so the drain completes without the client's
    // cooperation.
    config.timeout = 100;
    let mut server = Server::bind_tcp(config).unwrap();
    server
        .register("echo", "blob", |args| Ok(args[0].clone()))
        .unwrap();

    let mut conn = TcpStream::connect(server.addr()).unwrap();
    conn.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
    send_frame(&mut conn, b"echo before quit");
    assert_eq!(read_frame(&mut conn), b"before quit");

    // Quit with the connection still open: the worker times out, the
    // drain completes, and only then does the channel close.
    server.quit();

    let codes: Vec<u16> = server.events().iter().map(|e| e.code).collect();
    assert!(codes.contains(&100));
    assert!(codes.contains(&101));
    assert!(codes.contains(&200));
    assert!(codes.contains(&197));
    assert!(codes.contains(&199));
}
