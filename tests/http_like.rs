//! End-to-end: a minimal HTTP-like responder that waits for a blank line
//! terminating the request head before replying with a fixed body.

use std::io::{Read, Write};
use std::net::TcpStream;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use uring_tcp::{ServerConfig, TcpServer};

const RESPONSE: &[u8] =
    b"HTTP/1.0 200 OK\r\nContent-Type: text/plain\r\nContent-Length: 5\r\n\r\nblitz";

fn has_header_terminator(buf: &[u8]) -> bool {
    buf.windows(4).any(|w| w == b"\r\n\r\n")
}

#[test]
fn responds_once_request_head_is_complete() {
    let config = ServerConfig::new(1, 0, 16);
    let mut server = TcpServer::new(config).expect("bind");
    let port = server.local_port().expect("local port");

    server.set_read_callback(Arc::new(|conn| {
        let mut buf = [0u8; 1024];
        let mut request = Vec::new();
        while let Ok(n) = conn.read(&mut buf) {
            request.extend_from_slice(&buf[..n]);
        }
        if has_header_terminator(&request) {
            let _ = conn.write(RESPONSE);
        } else {
            conn.close();
        }
    }));
    server.set_write_callback(Arc::new(|conn| conn.close()));

    let stop_handle = server.stop_handle();
    let join = thread::spawn(move || {
        server.run(Duration::ZERO).expect("server loop");
    });

    thread::sleep(Duration::from_millis(50));
    let mut stream = TcpStream::connect(("127.0.0.1", port)).expect("connect");
    stream
        .write_all(b"GET / HTTP/1.0\r\nHost: localhost\r\n\r\n")
        .expect("write");

    let mut response = Vec::new();
    stream.read_to_end(&mut response).expect("read");
    assert_eq!(response, RESPONSE);

    stop_handle.stop();
    join.join().expect("server thread panicked");
}
