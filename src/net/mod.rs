//! The listening socket and the per-connection buffers/state the rest of
//! the engine drives.

mod acceptor;
mod connection;
mod handle;

pub use acceptor::Acceptor;
pub use connection::{ConnId, ConnToken, Connection, PipelineStage};
pub use handle::ConnHandle;
