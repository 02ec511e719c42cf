//! End-to-end: a read callback that echoes every byte back, and a write
//! callback that closes the connection once the echo has been written.

use std::io::{Read, Write};
use std::net::TcpStream;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use uring_tcp::{ServerConfig, TcpServer};

#[test]
fn echoes_one_request_then_closes() {
    let config = ServerConfig::new(1, 0, 16);
    let mut server = TcpServer::new(config).expect("bind");
    let port = server.local_port().expect("local port");

    server.set_read_callback(Arc::new(|conn| {
        let mut buf = [0u8; 1024];
        while let Ok(n) = conn.read(&mut buf) {
            let _ = conn.write(&buf[..n]);
        }
    }));
    server.set_write_callback(Arc::new(|conn| conn.close()));

    let stop_handle = server.stop_handle();
    let join = thread::spawn(move || {
        server.run(Duration::ZERO).expect("server loop");
    });

    thread::sleep(Duration::from_millis(50));
    let mut stream = TcpStream::connect(("127.0.0.1", port)).expect("connect");
    stream.write_all(b"hello io_uring").expect("write");

    let mut response = Vec::new();
    stream.read_to_end(&mut response).expect("read");
    assert_eq!(response, b"hello io_uring");

    stop_handle.stop();
    join.join().expect("server thread panicked");
}
