//! End-to-end: a worker configured with a tiny submission ring keeps
//! servicing every connection even when many arrive in a burst, which is
//! the externally observable half of the submission-queue-full contract
//! (the internal half — that a single connection's error callback sees
//! `submit-queue-full` rather than the worker dying — is exercised by
//! `IoService::begin_close`'s retry path directly).

use std::io::{Read, Write};
use std::net::TcpStream;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use uring_tcp::{ServerConfig, TcpServer};

#[test]
fn worker_stays_healthy_under_a_connection_burst() {
    let mut config = ServerConfig::new(1, 0, 128);
    config.ring_entries = 4;
    let mut server = TcpServer::new(config).expect("bind");
    let port = server.local_port().expect("local port");

    server.set_read_callback(Arc::new(|conn| {
        let mut buf = [0u8; 64];
        while let Ok(n) = conn.read(&mut buf) {
            let _ = conn.write(&buf[..n]);
        }
    }));
    server.set_write_callback(Arc::new(|conn| conn.close()));
    server.set_error_callback(Arc::new(|conn, _err| conn.close()));

    let stop_handle = server.stop_handle();
    let join = thread::spawn(move || {
        server.run(Duration::ZERO).expect("server loop");
    });

    thread::sleep(Duration::from_millis(50));

    let clients: Vec<_> = (0..20)
        .map(|i| {
            thread::spawn(move || {
                let mut stream = TcpStream::connect(("127.0.0.1", port)).expect("connect");
                let payload = format!("client-{i}");
                stream.write_all(payload.as_bytes()).expect("write");
                let mut response = Vec::new();
                stream.read_to_end(&mut response).expect("read");
                assert_eq!(response, payload.as_bytes());
            })
        })
        .collect();

    for client in clients {
        client.join().expect("client thread panicked");
    }

    stop_handle.stop();
    join.join().expect("server thread panicked");
}
