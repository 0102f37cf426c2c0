use lavalink_rs::error::LavalinkError;
use thiserror::Error;

/// Failures talking to the Lavalink node or the voice gateway.
#[derive(Debug, Error)]
pub enum NodeError {
    #[error("Lavalink request failed: {0}")]
    Lavalink(#[from] LavalinkError),

    #[error("invalid node request: {0}")]
    Request(#[from] http::uri::InvalidUri),

    #[error("the node client is not connected yet")]
    NotConnected,

    #[error("track loading failed: {0}")]
    LoadFailed(String),

    #[error("voice connection failed: {0}")]
    Voice(String),
}

impl NodeError {
    /// Nothing to clean up on the node: it never had a session, or it dropped ours.
    pub fn is_session_gone(&self) -> bool {
        matches!(
            self,
            NodeError::NotConnected | NodeError::Lavalink(LavalinkError::NoSessionPresent)
        )
    }
}
