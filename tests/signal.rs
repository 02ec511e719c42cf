//! End-to-end: a registered signal callback runs on the main loop thread
//! when the process receives that signal.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use uring_tcp::{ServerConfig, TcpServer};

#[test]
fn signal_callback_fires_on_delivery() {
    let config = ServerConfig::new(1, 0, 16);
    let mut server = TcpServer::new(config).expect("bind");

    let delivered = Arc::new(AtomicBool::new(false));
    let delivered_cb = delivered.clone();
    server
        .set_signal_callback(
            libc::SIGUSR1,
            Box::new(move |_sig| delivered_cb.store(true, Ordering::SeqCst)),
        )
        .expect("register signal callback");

    let stop_handle = server.stop_handle();
    let join = thread::spawn(move || {
        server.run(Duration::from_millis(10)).expect("server loop");
    });

    thread::sleep(Duration::from_millis(50));
    unsafe {
        libc::raise(libc::SIGUSR1);
    }

    thread::sleep(Duration::from_millis(100));
    assert!(delivered.load(Ordering::SeqCst), "signal callback never ran");

    stop_handle.stop();
    join.join().expect("server thread panicked");
}
