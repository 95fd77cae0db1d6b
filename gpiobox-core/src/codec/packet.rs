//! Engine.IO v4 transport packets.
//!
//! Each WebSocket text message is one packet: a single type digit
//! followed by the body.
//!
//! ```text
//! 0{"sid":"…","pingInterval":25000,…}   OPEN (handshake)
//! 1                                    CLOSE
//! 2 / 2probe                           PING
//! 3 / 3probe                           PONG
//! 4<frame>                             MESSAGE carrying a Socket.IO frame
//! 5                                    UPGRADE
//! 6                                    NOOP
//! ```

use serde::{Deserialize, Serialize};

use crate::codec::frame::Frame;
use crate::codec::IdPolicy;
use crate::error::BoxError;

/// Handshake data sent by the server in the OPEN packet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Handshake {
    /// Engine.IO session id.
    pub sid: String,

    /// Transports the server would let us upgrade to.
    #[serde(default)]
    pub upgrades: Vec<String>,

    /// Interval between server pings, in milliseconds.
    #[serde(default = "default_ping_interval")]
    pub ping_interval: u64,

    /// Grace period after a missed ping, in milliseconds.
    #[serde(default = "default_ping_timeout")]
    pub ping_timeout: u64,

    /// Largest payload the server accepts, in bytes.
    #[serde(default)]
    pub max_payload: u64,
}

fn default_ping_interval() -> u64 {
    25_000
}

fn default_ping_timeout() -> u64 {
    20_000
}

/// One Engine.IO packet.
#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
    Open(Handshake),
    Close,
    Ping(String),
    Pong(String),
    Message(Frame),
    Upgrade,
    Noop,
}

impl Packet {
    pub fn decode(text: &str, policy: IdPolicy) -> Result<Self, BoxError> {
        let mut chars = text.chars();
        let Some(kind) = chars.next() else {
            return Err(BoxError::MalformedFrame("empty packet".into()));
        };
        let body = chars.as_str();
        match kind {
            '0' => Ok(Packet::Open(serde_json::from_str(body)?)),
            '1' => Ok(Packet::Close),
            '2' => Ok(Packet::Ping(body.to_string())),
            '3' => Ok(Packet::Pong(body.to_string())),
            '4' => Ok(Packet::Message(Frame::decode(body, policy)?)),
            '5' => Ok(Packet::Upgrade),
            '6' => Ok(Packet::Noop),
            other => Err(BoxError::MalformedFrame(format!(
                "unknown packet type {other:?}"
            ))),
        }
    }

    pub fn encode(&self) -> Result<String, BoxError> {
        Ok(match self {
            Packet::Open(handshake) => format!("0{}", serde_json::to_string(handshake)?),
            Packet::Close => "1".to_string(),
            Packet::Ping(data) => format!("2{data}"),
            Packet::Pong(data) => format!("3{data}"),
            Packet::Message(frame) => format!("4{}", frame.encode()?),
            Packet::Upgrade => "5".to_string(),
            Packet::Noop => "6".to_string(),
        })
    }
}
