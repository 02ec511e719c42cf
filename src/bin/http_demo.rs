//! Minimal HTTP-like demo: waits for a blank line terminating the request
//! head, then always answers with the same fixed response body.

use std::sync::Arc;
use std::time::Duration;

use uring_tcp::{ServerConfig, TcpServer};

const RESPONSE: &[u8] =
    b"HTTP/1.0 200 OK\r\nContent-Type: text/plain\r\nContent-Length: 5\r\n\r\nblitz";

fn init_tracing() {
    if std::env::var("RUST_LOG").is_ok() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();
    }
}

/// Scans `buf` for a `\r\n\r\n` terminator, matching it byte by byte and
/// resetting the match state on any byte that breaks the sequence.
fn has_header_terminator(buf: &[u8]) -> bool {
    const TERMINATOR: &[u8] = b"\r\n\r\n";
    let mut matched = 0usize;
    for &byte in buf {
        if byte == TERMINATOR[matched] {
            matched += 1;
            if matched == TERMINATOR.len() {
                return true;
            }
        } else {
            matched = if byte == TERMINATOR[0] { 1 } else { 0 };
        }
    }
    false
}

fn main() {
    init_tracing();

    let config = ServerConfig::new(1, 8080, 128);
    let mut server = TcpServer::new(config).expect("failed to bind http demo server");

    server.set_read_callback(Arc::new(|conn| {
        let mut buf = [0u8; 4096];
        let mut request = Vec::new();
        loop {
            match conn.read(&mut buf) {
                Ok(n) => request.extend_from_slice(&buf[..n]),
                Err(_) => break,
            }
        }
        if has_header_terminator(&request) {
            let _ = conn.write(RESPONSE);
        } else {
            conn.close();
        }
    }));

    server.set_write_callback(Arc::new(|conn| {
        conn.close();
    }));

    server.set_error_callback(Arc::new(|conn, err| {
        tracing::debug!(error = %err, "http demo connection error");
        conn.close();
    }));

    let stop_handle = server.stop_handle();
    server
        .set_signal_callback(libc::SIGINT, Box::new(move |_| stop_handle.stop()))
        .expect("failed to register SIGINT handler");

    let port = server.local_port().unwrap_or(0);
    tracing::info!(port, "http demo listening");

    server.run(Duration::from_millis(500)).expect("http demo loop failed");
}
