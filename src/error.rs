//! Main Crate Error

#[derive(thiserror::Error, Debug)]
/// dht-engine crate error enum.
pub enum Error {
    /// A request kind this node does not speak. The transport is expected
    /// to reset the stream it came from.
    #[error("Unknown kademlia message type: {0}")]
    UnsupportedMessageType(i32),

    /// A [NodeId](crate::NodeId) was built from the wrong number of bytes.
    #[error("Invalid Id size, expected 32, got {0}")]
    InvalidIdSize(usize),

    #[error(transparent)]
    /// Transparent [std::io::Error]
    Io(#[from] std::io::Error),

    /// A provide RPC failed (timeout, no route, transport error).
    #[error("Couldn't provide block: {0}")]
    Provide(String),

    /// [ReprovideScheduler::start](crate::ReprovideScheduler::start) was called
    /// while the loops were already running.
    #[error("Reprovide scheduler is already running")]
    AlreadyRunning,
}

/// Alias for `Result<T, dht_engine::Error>`.
pub type Result<T, E = Error> = core::result::Result<T, E>;
