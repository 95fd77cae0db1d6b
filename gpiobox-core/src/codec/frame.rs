//! Socket.IO-layer frames.
//!
//! # Wire Format
//!
//! ```text
//! <kind>[<attachments>-][/<namespace>,][<id>][<json>]
//!
//! 0{"sid":"abc"}            CONNECT with handshake data
//! 1                         DISCONNECT
//! 2["state",{"now":12}]     EVENT, no ack wanted
//! 217["ping"]               EVENT, ack id 17
//! 317[{"now":4020}]         ACK for id 17
//! 4{"message":"denied"}     ERROR (connect error)
//! 51-["up",{"_placeholder":true,"num":0}]  BINARY_EVENT, body kept opaque
//! 2/admin,3["x"]            EVENT on namespace /admin, ack id 3
//! ```
//!
//! The default namespace `/` is never written on the wire.

use std::fmt;

use serde_json::Value;

use crate::codec::IdPolicy;
use crate::error::BoxError;

/// The namespace joined when none is configured.
pub const DEFAULT_NAMESPACE: &str = "/";

// ── FrameKind ────────────────────────────────────────────────────

/// Socket.IO packet types, numbered as on the wire.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameKind {
    Connect = 0,
    Disconnect = 1,
    Event = 2,
    Ack = 3,
    Error = 4,
    BinaryEvent = 5,
    BinaryAck = 6,
}

impl FrameKind {
    /// Kinds whose body is `[<id>]<json array>`.
    fn carries_id(self) -> bool {
        matches!(
            self,
            FrameKind::Event | FrameKind::Ack | FrameKind::BinaryEvent | FrameKind::BinaryAck
        )
    }

    fn is_binary(self) -> bool {
        matches!(self, FrameKind::BinaryEvent | FrameKind::BinaryAck)
    }

    fn digit(self) -> char {
        char::from(b'0' + self as u8)
    }
}

impl TryFrom<char> for FrameKind {
    type Error = BoxError;

    fn try_from(c: char) -> Result<Self, BoxError> {
        match c {
            '0' => Ok(FrameKind::Connect),
            '1' => Ok(FrameKind::Disconnect),
            '2' => Ok(FrameKind::Event),
            '3' => Ok(FrameKind::Ack),
            '4' => Ok(FrameKind::Error),
            '5' => Ok(FrameKind::BinaryEvent),
            '6' => Ok(FrameKind::BinaryAck),
            other => Err(BoxError::MalformedFrame(format!(
                "unknown frame kind {other:?}"
            ))),
        }
    }
}

impl fmt::Display for FrameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameKind::Connect => write!(f, "CONNECT"),
            FrameKind::Disconnect => write!(f, "DISCONNECT"),
            FrameKind::Event => write!(f, "EVENT"),
            FrameKind::Ack => write!(f, "ACK"),
            FrameKind::Error => write!(f, "ERROR"),
            FrameKind::BinaryEvent => write!(f, "BINARY_EVENT"),
            FrameKind::BinaryAck => write!(f, "BINARY_ACK"),
        }
    }
}

// ── Frame ────────────────────────────────────────────────────────

/// One decoded Socket.IO frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Connect {
        namespace: String,
        data: Option<Value>,
    },
    Disconnect {
        namespace: String,
    },
    Event {
        namespace: String,
        id: Option<u64>,
        name: String,
        args: Vec<Value>,
    },
    Ack {
        namespace: String,
        id: Option<u64>,
        args: Vec<Value>,
    },
    Error {
        namespace: String,
        data: Option<Value>,
    },
    /// Binary attachments are not supported; the body is kept as text.
    BinaryEvent {
        namespace: String,
        id: Option<u64>,
        attachments: u32,
        body: String,
    },
    BinaryAck {
        namespace: String,
        id: Option<u64>,
        attachments: u32,
        body: String,
    },
}

impl Frame {
    /// CONNECT for `namespace` with no auth payload.
    pub fn connect(namespace: impl Into<String>) -> Self {
        Frame::Connect {
            namespace: namespace.into(),
            data: None,
        }
    }

    /// EVENT on the default namespace without an ack id.
    pub fn event(name: impl Into<String>, args: Vec<Value>) -> Self {
        Frame::Event {
            namespace: DEFAULT_NAMESPACE.to_string(),
            id: None,
            name: name.into(),
            args,
        }
    }

    /// ACK on the default namespace.
    pub fn ack(id: u64, args: Vec<Value>) -> Self {
        Frame::Ack {
            namespace: DEFAULT_NAMESPACE.to_string(),
            id: Some(id),
            args,
        }
    }

    /// Replace the namespace, keeping every other field.
    pub fn in_namespace(mut self, ns: impl Into<String>) -> Self {
        let ns = ns.into();
        match &mut self {
            Frame::Connect { namespace, .. }
            | Frame::Disconnect { namespace }
            | Frame::Event { namespace, .. }
            | Frame::Ack { namespace, .. }
            | Frame::Error { namespace, .. }
            | Frame::BinaryEvent { namespace, .. }
            | Frame::BinaryAck { namespace, .. } => *namespace = ns,
        }
        self
    }

    /// Build a frame from its loose parts.
    ///
    /// `name` is required for EVENT, `id` for ACK. CONNECT and ERROR
    /// take at most one argument as their data object.
    pub fn build(
        kind: FrameKind,
        id: Option<u64>,
        name: Option<&str>,
        args: Vec<Value>,
    ) -> Result<Self, BoxError> {
        let namespace = DEFAULT_NAMESPACE.to_string();
        match kind {
            FrameKind::Connect => Ok(Frame::Connect {
                namespace,
                data: single_data(args)?,
            }),
            FrameKind::Disconnect => Ok(Frame::Disconnect { namespace }),
            FrameKind::Event => {
                let name = name.ok_or(BoxError::ProtocolViolation(
                    "event frame requires an event name",
                ))?;
                Ok(Frame::Event {
                    namespace,
                    id,
                    name: name.to_string(),
                    args,
                })
            }
            FrameKind::Ack => {
                if id.is_none() {
                    return Err(BoxError::ProtocolViolation(
                        "ack frame requires a correlation id",
                    ));
                }
                Ok(Frame::Ack {
                    namespace,
                    id,
                    args,
                })
            }
            FrameKind::Error => Ok(Frame::Error {
                namespace,
                data: single_data(args)?,
            }),
            FrameKind::BinaryEvent | FrameKind::BinaryAck => Err(BoxError::ProtocolViolation(
                "binary frames cannot be built",
            )),
        }
    }

    pub fn kind(&self) -> FrameKind {
        match self {
            Frame::Connect { .. } => FrameKind::Connect,
            Frame::Disconnect { .. } => FrameKind::Disconnect,
            Frame::Event { .. } => FrameKind::Event,
            Frame::Ack { .. } => FrameKind::Ack,
            Frame::Error { .. } => FrameKind::Error,
            Frame::BinaryEvent { .. } => FrameKind::BinaryEvent,
            Frame::BinaryAck { .. } => FrameKind::BinaryAck,
        }
    }

    /// Correlation id, if any.
    pub fn id(&self) -> Option<u64> {
        match self {
            Frame::Event { id, .. }
            | Frame::Ack { id, .. }
            | Frame::BinaryEvent { id, .. }
            | Frame::BinaryAck { id, .. } => *id,
            _ => None,
        }
    }

    pub fn namespace(&self) -> &str {
        match self {
            Frame::Connect { namespace, .. }
            | Frame::Disconnect { namespace }
            | Frame::Event { namespace, .. }
            | Frame::Ack { namespace, .. }
            | Frame::Error { namespace, .. }
            | Frame::BinaryEvent { namespace, .. }
            | Frame::BinaryAck { namespace, .. } => namespace,
        }
    }

    // ── Encoding ─────────────────────────────────────────────────

    /// Serialize to the text that follows the transport `4` prefix.
    pub fn encode(&self) -> Result<String, BoxError> {
        let kind = self.kind();
        let mut out = String::new();
        out.push(kind.digit());

        if let Frame::BinaryEvent { attachments, .. } | Frame::BinaryAck { attachments, .. } = self
        {
            out.push_str(&attachments.to_string());
            out.push('-');
        }

        let ns = self.namespace();
        if ns != DEFAULT_NAMESPACE && !ns.is_empty() {
            out.push_str(ns);
            out.push(',');
        }

        match self {
            Frame::Connect { data, .. } | Frame::Error { data, .. } => {
                if let Some(data) = data {
                    out.push_str(&serde_json::to_string(data)?);
                }
            }
            Frame::Disconnect { .. } => {}
            Frame::Event { id, name, args, .. } => {
                if let Some(id) = id {
                    out.push_str(&id.to_string());
                }
                let mut array = Vec::with_capacity(args.len() + 1);
                array.push(Value::String(name.clone()));
                array.extend(args.iter().cloned());
                out.push_str(&serde_json::to_string(&Value::Array(array))?);
            }
            Frame::Ack { id, args, .. } => {
                let id = id.ok_or(BoxError::ProtocolViolation(
                    "ack frame requires a correlation id",
                ))?;
                out.push_str(&id.to_string());
                out.push_str(&serde_json::to_string(args)?);
            }
            Frame::BinaryEvent { id, body, .. } | Frame::BinaryAck { id, body, .. } => {
                if let Some(id) = id {
                    out.push_str(&id.to_string());
                }
                out.push_str(body);
            }
        }
        Ok(out)
    }

    // ── Decoding ─────────────────────────────────────────────────

    /// Parse the text that follows the transport `4` prefix.
    pub fn decode(text: &str, policy: IdPolicy) -> Result<Self, BoxError> {
        let mut chars = text.chars();
        let kind = match chars.next() {
            Some(c) => FrameKind::try_from(c)?,
            None => return Err(BoxError::MalformedFrame("empty frame".into())),
        };
        let mut rest = chars.as_str();

        let mut attachments = 0;
        if kind.is_binary() {
            let (count, tail) = split_digits(rest);
            let tail = tail.strip_prefix('-').ok_or_else(|| {
                BoxError::MalformedFrame("binary frame without attachment count".into())
            })?;
            attachments = count
                .parse::<u32>()
                .map_err(|_| BoxError::MalformedFrame("bad attachment count".into()))?;
            rest = tail;
        }

        let mut namespace = DEFAULT_NAMESPACE.to_string();
        if rest.starts_with('/') {
            match rest.find(',') {
                Some(end) => {
                    namespace = rest[..end].to_string();
                    rest = &rest[end + 1..];
                }
                None => {
                    namespace = rest.to_string();
                    rest = "";
                }
            }
        }

        let mut id = None;
        if kind.carries_id() {
            let (digits, tail) = split_digits(rest);
            if !digits.is_empty() {
                // Only overflow can fail here; saturate.
                let parsed = digits.parse::<u64>().unwrap_or(u64::MAX);
                id = policy.accept(parsed);
            }
            rest = tail;
        }

        match kind {
            FrameKind::Connect => Ok(Frame::Connect {
                namespace,
                data: optional_json(rest)?,
            }),
            FrameKind::Disconnect => Ok(Frame::Disconnect { namespace }),
            FrameKind::Error => Ok(Frame::Error {
                namespace,
                data: optional_json(rest)?,
            }),
            FrameKind::Event => {
                let mut array = json_array(rest)?;
                if array.is_empty() {
                    return Err(BoxError::MalformedFrame("event without a name".into()));
                }
                let name = match array.remove(0) {
                    Value::String(name) => name,
                    other => {
                        return Err(BoxError::MalformedFrame(format!(
                            "event name must be a string, got {other}"
                        )));
                    }
                };
                Ok(Frame::Event {
                    namespace,
                    id,
                    name,
                    args: array,
                })
            }
            FrameKind::Ack => Ok(Frame::Ack {
                namespace,
                id,
                args: json_array(rest)?,
            }),
            FrameKind::BinaryEvent => Ok(Frame::BinaryEvent {
                namespace,
                id,
                attachments,
                body: rest.to_string(),
            }),
            FrameKind::BinaryAck => Ok(Frame::BinaryAck {
                namespace,
                id,
                attachments,
                body: rest.to_string(),
            }),
        }
    }
}

// ── Helpers ──────────────────────────────────────────────────────

fn split_digits(s: &str) -> (&str, &str) {
    let end = s
        .char_indices()
        .find(|(_, c)| !c.is_ascii_digit())
        .map(|(i, _)| i)
        .unwrap_or(s.len());
    s.split_at(end)
}

fn json_array(body: &str) -> Result<Vec<Value>, BoxError> {
    match serde_json::from_str::<Value>(body)? {
        Value::Array(items) => Ok(items),
        _ => Err(BoxError::MalformedFrame("payload root is not an array".into())),
    }
}

fn optional_json(body: &str) -> Result<Option<Value>, BoxError> {
    if body.is_empty() {
        return Ok(None);
    }
    Ok(Some(serde_json::from_str(body)?))
}

fn single_data(mut args: Vec<Value>) -> Result<Option<Value>, BoxError> {
    match args.len() {
        0 => Ok(None),
        1 => Ok(args.pop()),
        _ => Err(BoxError::ProtocolViolation(
            "connect and error frames take at most one data value",
        )),
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn decode(text: &str) -> Result<Frame, BoxError> {
        Frame::decode(text, IdPolicy::NonZero)
    }

    #[test]
    fn decode_event_without_id() {
        let frame = decode(r#"2["state",{"now":12}]"#).unwrap();
        assert_eq!(frame.kind(), FrameKind::Event);
        assert_eq!(frame.id(), None);
        match frame {
            Frame::Event { name, args, .. } => {
                assert_eq!(name, "state");
                assert_eq!(args, vec![json!({"now": 12})]);
            }
            other => panic!("unexpected frame {other:?}"),
        }
    }

    #[test]
    fn decode_event_with_id() {
        let frame = decode(r#"217["toggle",true]"#).unwrap();
        assert_eq!(frame.id(), Some(17));
    }

    #[test]
    fn oversized_id_saturates() {
        let frame = decode(r#"2123456789012345678901234["toggle"]"#).unwrap();
        assert_eq!(frame.id(), Some(u64::MAX));
        match frame {
            Frame::Event { name, .. } => assert_eq!(name, "toggle"),
            other => panic!("unexpected frame {other:?}"),
        }
    }

    #[test]
    fn kind_from_char() {
        assert_eq!(FrameKind::try_from('4').unwrap(), FrameKind::Error);
        assert!(matches!(
            FrameKind::try_from('9'),
            Err(BoxError::MalformedFrame(_))
        ));
    }

    #[test]
    fn zero_id_depends_on_policy() {
        let text = r#"20["toggle"]"#;
        assert_eq!(Frame::decode(text, IdPolicy::NonZero).unwrap().id(), None);
        assert_eq!(Frame::decode(text, IdPolicy::AnyParsed).unwrap().id(), Some(0));
    }

    #[test]
    fn non_numeric_prefix_means_no_id() {
        let frame = Frame::decode(r#"2["x"]"#, IdPolicy::AnyParsed).unwrap();
        assert_eq!(frame.id(), None);
    }

    #[test]
    fn decode_namespace_and_id() {
        let frame = decode(r#"2/admin,3["x"]"#).unwrap();
        assert_eq!(frame.namespace(), "/admin");
        assert_eq!(frame.id(), Some(3));
    }

    #[test]
    fn decode_connect_with_data() {
        let frame = decode(r#"0{"sid":"abc"}"#).unwrap();
        assert_eq!(
            frame,
            Frame::Connect {
                namespace: "/".into(),
                data: Some(json!({"sid": "abc"}))
            }
        );
    }

    #[test]
    fn truncated_event_is_malformed() {
        let err = decode(r#"2["state",{"now":"#).unwrap_err();
        assert!(matches!(err, BoxError::MalformedFrame(_)));
    }

    #[test]
    fn non_array_event_is_malformed() {
        let err = decode(r#"2{"name":"state"}"#).unwrap_err();
        assert!(matches!(err, BoxError::MalformedFrame(_)));
    }

    #[test]
    fn event_name_must_be_string() {
        assert!(decode("2[42]").is_err());
        assert!(decode("2[]").is_err());
    }

    #[test]
    fn unknown_kind_is_malformed() {
        assert!(matches!(decode("9"), Err(BoxError::MalformedFrame(_))));
        assert!(matches!(decode(""), Err(BoxError::MalformedFrame(_))));
    }

    #[test]
    fn binary_body_stays_opaque() {
        let frame = decode(r#"51-4["up",{"_placeholder":true,"num":0}]"#).unwrap();
        match frame {
            Frame::BinaryEvent {
                id,
                attachments,
                body,
                ..
            } => {
                assert_eq!(id, Some(4));
                assert_eq!(attachments, 1);
                assert!(body.starts_with("[\"up\""));
            }
            other => panic!("unexpected frame {other:?}"),
        }
        // Not JSON, still accepted.
        assert!(decode("61-not json").is_ok());
    }

    #[test]
    fn encode_ack_puts_id_before_array() {
        let text = Frame::ack(17, vec![json!({"now": 4020})]).encode().unwrap();
        assert_eq!(text, r#"317[{"now":4020}]"#);
    }

    #[test]
    fn encode_event_and_namespace() {
        let text = Frame::event("state", vec![json!({"now": 1})])
            .in_namespace("/box")
            .encode()
            .unwrap();
        assert_eq!(text, r#"2/box,["state",{"now":1}]"#);
        assert_eq!(Frame::connect("/").encode().unwrap(), "0");
    }

    #[test]
    fn ack_without_id_is_rejected() {
        assert!(Frame::build(FrameKind::Ack, None, None, vec![]).is_err());
        let frame = Frame::Ack {
            namespace: "/".into(),
            id: None,
            args: vec![],
        };
        assert!(matches!(
            frame.encode(),
            Err(BoxError::ProtocolViolation(_))
        ));
    }

    #[test]
    fn build_then_decode_primary_kinds() {
        let cases = [
            Frame::build(FrameKind::Connect, None, None, vec![json!({"token": "t"})]).unwrap(),
            Frame::build(FrameKind::Event, Some(9), Some("on"), vec![json!(1), json!("a")])
                .unwrap(),
            Frame::build(FrameKind::Ack, Some(9), None, vec![json!({"now": 3})]).unwrap(),
            Frame::build(FrameKind::Error, None, None, vec![json!({"message": "no"})]).unwrap(),
        ];
        for frame in cases {
            let text = frame.encode().unwrap();
            assert_eq!(decode(&text).unwrap(), frame, "wire text {text}");
        }
    }
}
