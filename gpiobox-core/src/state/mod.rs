pub mod connection;

pub use connection::{ConnectionPhase, ReconnectPolicy, Session};
