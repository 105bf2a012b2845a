//! Acoustic feed over WebSocket
//!
//! The feed layer is organized into:
//! - `codec`: decode a text frame and swap the result into the buffer stores
//! - `client`: connection loop with a fixed reconnect delay

use crate::buffer::BufferError;
use thiserror::Error;

mod client;
mod codec;

pub use client::FeedClient;

/// Default acoustic feed endpoint
pub const DEFAULT_FEED_URL: &str = "ws://localhost:8000/ws/acoustic";

/// Connection lifecycle as seen by the status display
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Open,
    Closed,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Connecting => "connecting",
            ConnectionState::Open => "open",
            ConnectionState::Closed => "closed",
        }
    }
}

#[derive(Error, Debug)]
pub enum FeedError {
    #[error("Failed to connect to {url}: {source}")]
    Connect {
        url: String,
        #[source]
        source: async_tungstenite::tungstenite::Error,
    },
    #[error("WebSocket error: {0}")]
    Transport(#[from] async_tungstenite::tungstenite::Error),
    #[error("Malformed feed message: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid feed payload: {0}")]
    Schema(#[from] BufferError),
}
