//! # gpiobox-core
//!
//! Protocol core for a network-attached single-output controller.
//!
//! This crate contains:
//! - **Output**: `OutputState`, the shared handle over the controlled pin
//! - **Codec**: `EventFrameCodec`, Engine.IO packets wrapping Socket.IO frames
//! - **Network**: `Link` and the `Connector` seam, with a WebSocket connector
//! - **State**: `ConnectionPhase`, `Session`, `ReconnectPolicy`
//! - **Client**: `StreamClient` and its pure frame `Dispatcher`
//! - **Heartbeat**: `HeartbeatScheduler` for periodic state pushes
//! - **Error**: `BoxError`, a typed `thiserror`-based error hierarchy

pub mod client;
pub mod clock;
pub mod codec;
pub mod error;
pub mod heartbeat;
pub mod network;
pub mod output;
pub mod state;

// ── Re-exports for ergonomic usage ───────────────────────────────

pub use client::{Action, ClientConfig, Dispatcher, EventRoute, StreamClient};
pub use clock::{Clock, ManualClock, MonotonicClock};
pub use codec::{EventFrameCodec, Frame, FrameKind, Handshake, IdPolicy, Packet};
pub use error::BoxError;
pub use heartbeat::HeartbeatScheduler;
pub use network::{Connector, Endpoint, Link, WsConnector};
pub use output::{MemoryPin, OutputPin, OutputState};
pub use state::{ConnectionPhase, ReconnectPolicy, Session};
