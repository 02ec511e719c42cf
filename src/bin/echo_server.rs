//! Echo-one-request demo: a single worker that copies every byte read on a
//! connection straight back out, then closes the connection once the reply
//! has been written.

use std::sync::Arc;
use std::time::Duration;

use uring_tcp::{ServerConfig, TcpServer};

fn init_tracing() {
    if std::env::var("RUST_LOG").is_ok() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();
    }
}

fn main() {
    init_tracing();

    let config = ServerConfig::new(1, 7070, 128);
    let mut server = TcpServer::new(config).expect("failed to bind echo server");

    server.set_read_callback(Arc::new(|conn| {
        let mut buf = [0u8; 4096];
        loop {
            match conn.read(&mut buf) {
                Ok(n) => {
                    let _ = conn.write(&buf[..n]);
                }
                Err(_) => break,
            }
        }
    }));

    server.set_write_callback(Arc::new(|conn| {
        conn.close();
    }));

    server.set_error_callback(Arc::new(|conn, err| {
        tracing::debug!(error = %err, "echo connection error");
        conn.close();
    }));

    let stop_handle = server.stop_handle();
    server
        .set_signal_callback(libc::SIGINT, Box::new(move |_| stop_handle.stop()))
        .expect("failed to register SIGINT handler");

    let port = server.local_port().unwrap_or(0);
    tracing::info!(port, "echo server listening");

    server.run(Duration::from_millis(500)).expect("echo server loop failed");
}
