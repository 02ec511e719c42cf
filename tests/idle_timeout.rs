//! End-to-end: a connection that never sends data is closed once it has
//! been idle longer than the configured timeout.

use std::io::Read;
use std::net::TcpStream;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use uring_tcp::{ServerConfig, TcpServer};

#[test]
fn idle_connection_is_closed_by_the_timer() {
    let config = ServerConfig::new(1, 0, 16);
    let mut server = TcpServer::new(config).expect("bind");
    let port = server.local_port().expect("local port");

    server.set_read_callback(Arc::new(|_conn| {}));
    server.set_write_callback(Arc::new(|conn| conn.close()));
    server.set_timeout_callback(
        Box::new(|handle| handle.close()),
        Duration::from_millis(30),
    );

    let stop_handle = server.stop_handle();
    let join = thread::spawn(move || {
        server.run(Duration::from_millis(10)).expect("server loop");
    });

    thread::sleep(Duration::from_millis(50));
    let mut stream = TcpStream::connect(("127.0.0.1", port)).expect("connect");

    let mut buf = [0u8; 16];
    stream
        .set_read_timeout(Some(Duration::from_secs(2)))
        .expect("set timeout");
    let n = stream.read(&mut buf).expect("read should observe EOF");
    assert_eq!(n, 0, "idle connection should have been closed by the timer");

    stop_handle.stop();
    join.join().expect("server thread panicked");
}
