//! Inbound frame dispatch.
//!
//! `Dispatcher::dispatch` is a pure function of the frame and the
//! current time: it returns the [`Action`]s the client must carry out
//! and never touches the transport or the output itself.
//!
//! Event names are looked up in a route table. Unknown names fall
//! through to the default route, which only acknowledges. Whatever the
//! route, an event carrying an id gets exactly one ACK whose payload is
//! `[{"now": <ms since boot>}]`.

use std::collections::HashMap;

use serde_json::{Value, json};
use tracing::{debug, info, warn};

use crate::codec::Frame;

/// What an event does besides being acknowledged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventRoute {
    /// Acknowledge only.
    AckOnly,
    /// Drive the output to a fixed level.
    SetOutput(bool),
    /// Drive the output from the first argument: `true`/`false`,
    /// `1`/`0`, `"on"`/`"off"`, or `{"state": bool}`.
    OutputFromArg,
}

/// A side effect requested by dispatch.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    SetOutput(bool),
    SendAck { id: u64, args: Vec<Value> },
}

/// Standard acknowledgement payload.
pub fn timestamp_ack(now_ms: u64) -> Vec<Value> {
    vec![json!({ "now": now_ms })]
}

/// Route table plus dispatch logic.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    routes: HashMap<String, EventRoute>,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher {
    /// Dispatcher that acknowledges every event and routes nothing.
    pub fn new() -> Self {
        Self {
            routes: HashMap::new(),
        }
    }

    /// Dispatcher with the `on`, `off` and `output` commands that
    /// mirror the HTTP control routes.
    pub fn with_output_commands() -> Self {
        Self::new()
            .route("on", EventRoute::SetOutput(true))
            .route("off", EventRoute::SetOutput(false))
            .route("output", EventRoute::OutputFromArg)
    }

    pub fn route(mut self, name: impl Into<String>, route: EventRoute) -> Self {
        self.routes.insert(name.into(), route);
        self
    }

    pub fn route_for(&self, name: &str) -> EventRoute {
        self.routes.get(name).copied().unwrap_or(EventRoute::AckOnly)
    }

    pub fn dispatch(&self, frame: &Frame, now_ms: u64) -> Vec<Action> {
        match frame {
            Frame::Connect { namespace, data } => {
                info!(%namespace, ?data, "namespace connected");
                Vec::new()
            }
            Frame::Disconnect { namespace } => {
                info!(%namespace, "namespace disconnected by server");
                Vec::new()
            }
            Frame::Event { id, name, args, .. } => {
                debug!(event = %name, ?id, "event received");
                let mut actions = Vec::new();
                match self.route_for(name) {
                    EventRoute::AckOnly => {}
                    EventRoute::SetOutput(on) => actions.push(Action::SetOutput(on)),
                    EventRoute::OutputFromArg => match args.first().and_then(level_from_arg) {
                        Some(on) => actions.push(Action::SetOutput(on)),
                        None => warn!(event = %name, ?args, "output event without a usable level"),
                    },
                }
                if let Some(id) = *id {
                    actions.push(Action::SendAck {
                        id,
                        args: timestamp_ack(now_ms),
                    });
                }
                actions
            }
            Frame::Ack { id, args, .. } => {
                debug!(?id, ?args, "ack received");
                Vec::new()
            }
            Frame::Error { namespace, data } => {
                warn!(%namespace, ?data, "server reported an error");
                Vec::new()
            }
            Frame::BinaryEvent {
                id, attachments, ..
            } => {
                debug!(?id, attachments, "binary event ignored");
                Vec::new()
            }
            Frame::BinaryAck {
                id, attachments, ..
            } => {
                debug!(?id, attachments, "binary ack ignored");
                Vec::new()
            }
        }
    }
}

fn level_from_arg(arg: &Value) -> Option<bool> {
    match arg {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_u64().map(|n| n != 0),
        Value::String(s) => match s.to_ascii_lowercase().as_str() {
            "on" | "true" | "1" | "high" => Some(true),
            "off" | "false" | "0" | "low" => Some(false),
            _ => None,
        },
        Value::Object(map) => map.get("state").and_then(level_from_arg),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{FrameKind, IdPolicy};

    fn event(text: &str) -> Frame {
        Frame::decode(text, IdPolicy::NonZero).unwrap()
    }

    #[test]
    fn event_with_id_gets_one_timestamp_ack() {
        let actions = Dispatcher::new().dispatch(&event(r#"25["anything",1]"#), 4020);
        assert_eq!(
            actions,
            vec![Action::SendAck {
                id: 5,
                args: vec![json!({"now": 4020})]
            }]
        );
    }

    #[test]
    fn event_without_id_gets_no_ack() {
        assert!(Dispatcher::new().dispatch(&event(r#"2["anything"]"#), 1).is_empty());
    }

    #[test]
    fn same_ack_for_every_event_name() {
        let d = Dispatcher::with_output_commands();
        for name in ["state", "on", "off", "reboot", "x"] {
            let frame = Frame::Event {
                namespace: "/".into(),
                id: Some(7),
                name: name.into(),
                args: vec![],
            };
            let acks: Vec<_> = d
                .dispatch(&frame, 99)
                .into_iter()
                .filter(|a| matches!(a, Action::SendAck { .. }))
                .collect();
            assert_eq!(
                acks,
                vec![Action::SendAck {
                    id: 7,
                    args: timestamp_ack(99)
                }],
                "event {name}"
            );
        }
    }

    #[test]
    fn output_commands_emit_set_output_before_ack() {
        let d = Dispatcher::with_output_commands();
        let actions = d.dispatch(&event(r#"23["on"]"#), 10);
        assert_eq!(actions[0], Action::SetOutput(true));
        assert!(matches!(actions[1], Action::SendAck { id: 3, .. }));

        assert_eq!(d.dispatch(&event(r#"2["off"]"#), 10), vec![Action::SetOutput(false)]);
    }

    #[test]
    fn output_from_arg_accepts_several_shapes() {
        let d = Dispatcher::with_output_commands();
        for (text, want) in [
            (r#"2["output",true]"#, true),
            (r#"2["output",0]"#, false),
            (r#"2["output","ON"]"#, true),
            (r#"2["output",{"state":false}]"#, false),
        ] {
            assert_eq!(d.dispatch(&event(text), 0), vec![Action::SetOutput(want)], "{text}");
        }
        assert!(d.dispatch(&event(r#"2["output","maybe"]"#), 0).is_empty());
    }

    #[test]
    fn unrouted_events_leave_output_alone() {
        let d = Dispatcher::with_output_commands();
        assert_eq!(d.route_for("state"), EventRoute::AckOnly);
        assert!(d.dispatch(&event(r#"2["state",{"on":true}]"#), 0).is_empty());
    }

    #[test]
    fn observe_only_kinds_produce_nothing() {
        let d = Dispatcher::with_output_commands();
        for text in ["0", "1", r#"33[{"ok":true}]"#, r#"4{"message":"x"}"#, "51-2[]", "61-2[]"] {
            let frame = event(text);
            assert_ne!(frame.kind(), FrameKind::Event);
            assert!(d.dispatch(&frame, 0).is_empty(), "{text}");
        }
    }
}
