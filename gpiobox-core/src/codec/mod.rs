//! Event-stream codec: Engine.IO packets wrapping Socket.IO frames.

pub mod frame;
pub mod packet;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::BoxError;

pub use frame::{DEFAULT_NAMESPACE, Frame, FrameKind};
pub use packet::{Handshake, Packet};

/// How a decoded correlation id is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdPolicy {
    /// An id of `0` counts as "no id". Matches deployed coordinators.
    #[default]
    NonZero,
    /// Any parsed integer, including `0`, is an id.
    AnyParsed,
}

impl IdPolicy {
    pub fn accept(self, id: u64) -> Option<u64> {
        match self {
            IdPolicy::NonZero if id == 0 => None,
            _ => Some(id),
        }
    }
}

/// Stateless text codec, configured with an [`IdPolicy`].
#[derive(Debug, Clone, Copy, Default)]
pub struct EventFrameCodec {
    id_policy: IdPolicy,
}

impl EventFrameCodec {
    pub fn new(id_policy: IdPolicy) -> Self {
        Self { id_policy }
    }

    pub fn id_policy(&self) -> IdPolicy {
        self.id_policy
    }

    /// Decode one transport message.
    pub fn decode(&self, text: &str) -> Result<Packet, BoxError> {
        Packet::decode(text, self.id_policy)
    }

    /// Encode one transport message.
    pub fn encode(&self, packet: &Packet) -> Result<String, BoxError> {
        packet.encode()
    }

    /// Decode a bare frame (no transport prefix).
    pub fn decode_frame(&self, text: &str) -> Result<Frame, BoxError> {
        Frame::decode(text, self.id_policy)
    }

    /// Build and encode a bare frame from its parts.
    pub fn encode_frame(
        &self,
        kind: FrameKind,
        id: Option<u64>,
        name: Option<&str>,
        args: Vec<Value>,
    ) -> Result<String, BoxError> {
        Frame::build(kind, id, name, args)?.encode()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn policy_accept() {
        assert_eq!(IdPolicy::NonZero.accept(0), None);
        assert_eq!(IdPolicy::NonZero.accept(5), Some(5));
        assert_eq!(IdPolicy::AnyParsed.accept(0), Some(0));
    }

    #[test]
    fn parts_round_trip_through_codec() {
        let codec = EventFrameCodec::default();
        let text = codec
            .encode_frame(FrameKind::Event, Some(4), Some("state"), vec![json!({"now": 1})])
            .unwrap();
        assert_eq!(text, r#"24["state",{"now":1}]"#);
        let frame = codec.decode_frame(&text).unwrap();
        assert_eq!(frame.id(), Some(4));
    }

    #[test]
    fn zero_id_round_trip_under_both_policies() {
        let text = Frame::build(FrameKind::Event, Some(0), Some("x"), vec![])
            .unwrap()
            .encode()
            .unwrap();
        assert_eq!(text, r#"20["x"]"#);
        assert_eq!(EventFrameCodec::new(IdPolicy::NonZero).decode_frame(&text).unwrap().id(), None);
        assert_eq!(
            EventFrameCodec::new(IdPolicy::AnyParsed).decode_frame(&text).unwrap().id(),
            Some(0)
        );
    }

    #[test]
    fn policy_deserializes_from_config_text() {
        let p: IdPolicy = serde_json::from_str(r#""any_parsed""#).unwrap();
        assert_eq!(p, IdPolicy::AnyParsed);
    }
}
