//! End-to-end: a 3000-byte payload written across three `write` calls (1500
//! + 1000 + 500 bytes) must arrive at the peer intact, exercising output
//! buffers that span multiple chunks (the default chunk size is 1024 bytes).

use std::io::{Read, Write};
use std::net::TcpStream;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use uring_tcp::{ServerConfig, TcpServer};

#[test]
fn large_multi_call_write_arrives_intact() {
    let config = ServerConfig::new(1, 0, 16);
    let mut server = TcpServer::new(config).expect("bind");
    let port = server.local_port().expect("local port");

    server.set_read_callback(Arc::new(|conn| {
        let mut buf = [0u8; 64];
        while conn.read(&mut buf).is_ok() {}

        let payload: Vec<u8> = (0..3000u32).map(|i| (i % 256) as u8).collect();
        let _ = conn.write(&payload[..1500]);
        let _ = conn.write(&payload[1500..2500]);
        let _ = conn.write(&payload[2500..]);
    }));
    server.set_write_callback(Arc::new(|conn| conn.close()));

    let stop_handle = server.stop_handle();
    let join = thread::spawn(move || {
        server.run(Duration::ZERO).expect("server loop");
    });

    thread::sleep(Duration::from_millis(50));
    let mut stream = TcpStream::connect(("127.0.0.1", port)).expect("connect");
    stream.write_all(b"go").expect("write");

    let mut response = Vec::new();
    stream.read_to_end(&mut response).expect("read");

    let expected: Vec<u8> = (0..3000u32).map(|i| (i % 256) as u8).collect();
    assert_eq!(response.len(), 3000);
    assert_eq!(response, expected);

    stop_handle.stop();
    join.join().expect("server thread panicked");
}
