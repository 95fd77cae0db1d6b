//! Connection state machine for the coordinator link.
//!
//! Provides a `ConnectionPhase` enum that models the lifecycle of the
//! event-stream session, with validated transitions that return
//! `Result` instead of panicking.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::codec::Handshake;
use crate::error::BoxError;

// ── ConnectionPhase ──────────────────────────────────────────────

/// The current phase of the coordinator connection.
///
/// ```text
///  Disconnected ──► Connecting ──► Connected
///       ▲                │              │
///       └────────────────┴──────────────┘
///          (error, close, timeout)
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ConnectionPhase {
    /// No transport. Initial state, and the state every failure returns to.
    #[default]
    Disconnected,

    /// Transport requested; waiting for the handshake packet.
    Connecting {
        /// When the attempt started.
        since: Instant,
    },

    /// Handshake received and namespace CONNECT sent.
    Connected {
        /// When the connection entered the `Connected` state.
        since: Instant,
    },
}

impl std::fmt::Display for ConnectionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "Disconnected"),
            Self::Connecting { .. } => write!(f, "Connecting"),
            Self::Connected { .. } => write!(f, "Connected"),
        }
    }
}

impl ConnectionPhase {
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected { .. })
    }

    pub fn is_connecting(&self) -> bool {
        matches!(self, Self::Connecting { .. })
    }

    pub fn is_disconnected(&self) -> bool {
        matches!(self, Self::Disconnected)
    }

    /// How long the connection has been in the `Connected` state.
    pub fn connected_duration(&self) -> Option<Duration> {
        match self {
            Self::Connected { since } => Some(since.elapsed()),
            _ => None,
        }
    }

    // ── Transitions ──────────────────────────────────────────────

    /// Transition to `Connecting`.
    ///
    /// Valid from: `Disconnected`.
    pub fn begin_connect(&mut self) -> Result<(), BoxError> {
        match self {
            Self::Disconnected => {
                *self = Self::Connecting {
                    since: Instant::now(),
                };
                Ok(())
            }
            _ => Err(BoxError::ProtocolViolation(
                "cannot connect: not in Disconnected state",
            )),
        }
    }

    /// Transition to `Connected`.
    ///
    /// Valid from: `Connecting`.
    pub fn complete_handshake(&mut self) -> Result<(), BoxError> {
        match self {
            Self::Connecting { .. } => {
                *self = Self::Connected {
                    since: Instant::now(),
                };
                Ok(())
            }
            _ => Err(BoxError::ProtocolViolation(
                "cannot complete handshake: not in Connecting state",
            )),
        }
    }

    /// Force-reset to `Disconnected` regardless of current state.
    pub fn force_disconnect(&mut self) {
        *self = Self::Disconnected;
    }
}

// ── Session ──────────────────────────────────────────────────────

/// Data negotiated for the current transport session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// Engine.IO session id from the handshake.
    pub sid: String,

    /// Namespace joined after the handshake.
    pub namespace: String,

    /// Server ping cadence.
    pub ping_interval: Duration,

    /// Grace period after a missed ping.
    pub ping_timeout: Duration,
}

impl Session {
    pub fn from_handshake(handshake: &Handshake, namespace: impl Into<String>) -> Self {
        Self {
            sid: handshake.sid.clone(),
            namespace: namespace.into(),
            ping_interval: Duration::from_millis(handshake.ping_interval),
            ping_timeout: Duration::from_millis(handshake.ping_timeout),
        }
    }

    /// How long the link may stay silent before it is considered dead.
    pub fn liveness_window(&self) -> Duration {
        self.ping_interval + self.ping_timeout
    }
}

// ── ReconnectPolicy ──────────────────────────────────────────────

/// Delay between reconnection attempts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReconnectPolicy {
    /// Same delay after every failure.
    Fixed { interval_ms: u64 },

    /// `initial_ms * multiplier^attempt`, capped at `max_ms`.
    Backoff {
        initial_ms: u64,
        max_ms: u64,
        multiplier: f64,
    },
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        ReconnectPolicy::Fixed { interval_ms: 5_000 }
    }
}

impl ReconnectPolicy {
    /// Delay before attempt number `attempt` (0 = first retry).
    pub fn delay(&self, attempt: u32) -> Duration {
        match *self {
            ReconnectPolicy::Fixed { interval_ms } => Duration::from_millis(interval_ms),
            ReconnectPolicy::Backoff {
                initial_ms,
                max_ms,
                multiplier,
            } => {
                let factor = multiplier.max(1.0).powi(attempt.min(64) as i32);
                let ms = (initial_ms as f64 * factor).min(max_ms as f64);
                Duration::from_millis(ms as u64)
            }
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_lifecycle() {
        let mut phase = ConnectionPhase::Disconnected;

        phase.begin_connect().unwrap();
        assert!(phase.is_connecting());

        phase.complete_handshake().unwrap();
        assert!(phase.is_connected());
        assert!(phase.connected_duration().is_some());

        phase.force_disconnect();
        assert!(phase.is_disconnected());
    }

    #[test]
    fn invalid_transition_connect_when_connected() {
        let mut phase = ConnectionPhase::Connected {
            since: Instant::now(),
        };
        assert!(phase.begin_connect().is_err());
        assert!(phase.is_connected());
    }

    #[test]
    fn invalid_transition_handshake_from_disconnected() {
        let mut phase = ConnectionPhase::Disconnected;
        assert!(phase.complete_handshake().is_err());
        assert!(phase.is_disconnected());
    }

    #[test]
    fn display_format() {
        assert_eq!(ConnectionPhase::Disconnected.to_string(), "Disconnected");
        assert_eq!(
            ConnectionPhase::Connecting {
                since: Instant::now()
            }
            .to_string(),
            "Connecting"
        );
    }

    #[test]
    fn default_phase_is_disconnected() {
        assert!(ConnectionPhase::default().is_disconnected());
    }

    #[test]
    fn fixed_policy_never_grows() {
        let p = ReconnectPolicy::default();
        assert_eq!(p.delay(0), Duration::from_secs(5));
        assert_eq!(p.delay(1000), Duration::from_secs(5));
    }

    #[test]
    fn backoff_policy_is_capped() {
        let p = ReconnectPolicy::Backoff {
            initial_ms: 500,
            max_ms: 8_000,
            multiplier: 2.0,
        };
        assert_eq!(p.delay(0), Duration::from_millis(500));
        assert_eq!(p.delay(1), Duration::from_millis(1_000));
        assert_eq!(p.delay(3), Duration::from_millis(4_000));
        assert_eq!(p.delay(10), Duration::from_millis(8_000));
        assert_eq!(p.delay(u32::MAX), Duration::from_millis(8_000));
    }

    #[test]
    fn session_from_handshake() {
        let h = Handshake {
            sid: "abc".into(),
            upgrades: vec![],
            ping_interval: 25_000,
            ping_timeout: 20_000,
            max_payload: 0,
        };
        let s = Session::from_handshake(&h, "/");
        assert_eq!(s.namespace, "/");
        assert_eq!(s.liveness_window(), Duration::from_secs(45));
    }
}
