//! A TCP server framework built on Linux `io_uring`: callback-driven,
//! worker-pool-balanced, with per-connection idle timeouts and OS signal
//! multiplexing.
//!
//! The embedder constructs a [`TcpServer`] from a [`config::ServerConfig`],
//! registers read/write/error/signal/timeout callbacks, then calls
//! [`TcpServer::run`]. Everything below `server` is the engine that makes
//! that loop work: a chunked scatter-gather buffer ([`buf`]), the
//! `io_uring` submission/completion wrapper ([`io`]), the per-connection
//! state ([`net`]), the idle-timeout wheel ([`timer`]), one completion
//! loop per worker thread ([`worker`]) and the round-robin pool that
//! drives them ([`pool`]).

pub mod buf;
pub mod config;
pub mod error;
pub mod io;
pub mod net;
pub mod pool;
pub mod server;
pub mod timer;
pub mod worker;

pub use config::ServerConfig;
pub use error::{IoEngineError, IoResult};
pub use net::Connection;
pub use server::{SignalCallback, StopHandle, TcpServer};
pub use worker::{ErrorCallback, ReadCallback, WriteCallback};
