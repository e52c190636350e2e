//! NIP-01 websocket frames.
//!
//! Frames are JSON arrays whose first element names the message type, so
//! they are encoded and decoded by hand rather than derived.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use prism_crypto::Event;

use crate::RelayError;

/// Subscription filter (the subset Prism uses).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filter {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub authors: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub kinds: Vec<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
}

/// Client to relay.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ClientMessage {
    Event(Event),
    Req { subscription: String, filter: Filter },
    Close(String),
}

impl ClientMessage {
    pub fn to_json(&self) -> String {
        match self {
            Self::Event(event) => json!(["EVENT", event]),
            Self::Req {
                subscription,
                filter,
            } => json!(["REQ", subscription, filter]),
            Self::Close(subscription) => json!(["CLOSE", subscription]),
        }
        .to_string()
    }

    pub fn from_json(text: &str) -> Result<Self, RelayError> {
        let frame = parse_frame(text)?;
        match frame_type(&frame)? {
            "EVENT" => Ok(Self::Event(event_at(&frame, 1)?)),
            "REQ" => Ok(Self::Req {
                subscription: string_at(&frame, 1)?,
                filter: serde_json::from_value(frame.get(2).cloned().unwrap_or(Value::Null))
                    .map_err(|e| RelayError::Protocol(format!("bad filter: {e}")))?,
            }),
            "CLOSE" => Ok(Self::Close(string_at(&frame, 1)?)),
            other => Err(RelayError::Protocol(format!("unknown client message {other}"))),
        }
    }
}

/// Relay to client.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RelayMessage {
    Event { subscription: String, event: Event },
    Eose(String),
    Ok { event_id: String, accepted: bool, message: String },
    Closed { subscription: String, message: String },
    Notice(String),
}

impl RelayMessage {
    pub fn to_json(&self) -> String {
        match self {
            Self::Event {
                subscription,
                event,
            } => json!(["EVENT", subscription, event]),
            Self::Eose(subscription) => json!(["EOSE", subscription]),
            Self::Ok {
                event_id,
                accepted,
                message,
            } => json!(["OK", event_id, accepted, message]),
            Self::Closed {
                subscription,
                message,
            } => json!(["CLOSED", subscription, message]),
            Self::Notice(message) => json!(["NOTICE", message]),
        }
        .to_string()
    }

    pub fn from_json(text: &str) -> Result<Self, RelayError> {
        let frame = parse_frame(text)?;
        match frame_type(&frame)? {
            "EVENT" => Ok(Self::Event {
                subscription: string_at(&frame, 1)?,
                event: event_at(&frame, 2)?,
            }),
            "EOSE" => Ok(Self::Eose(string_at(&frame, 1)?)),
            "OK" => Ok(Self::Ok {
                event_id: string_at(&frame, 1)?,
                accepted: frame.get(2).and_then(Value::as_bool).unwrap_or(false),
                message: optional_string_at(&frame, 3),
            }),
            "CLOSED" => Ok(Self::Closed {
                subscription: string_at(&frame, 1)?,
                message: optional_string_at(&frame, 2),
            }),
            "NOTICE" => Ok(Self::Notice(optional_string_at(&frame, 1))),
            other => Err(RelayError::Protocol(format!("unknown relay message {other}"))),
        }
    }
}

fn parse_frame(text: &str) -> Result<Vec<Value>, RelayError> {
    serde_json::from_str(text).map_err(|e| RelayError::Protocol(format!("bad frame: {e}")))
}

fn frame_type(frame: &[Value]) -> Result<&str, RelayError> {
    frame
        .first()
        .and_then(Value::as_str)
        .ok_or_else(|| RelayError::Protocol("frame without a type".into()))
}

fn string_at(frame: &[Value], index: usize) -> Result<String, RelayError> {
    frame
        .get(index)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| RelayError::Protocol(format!("missing string at position {index}")))
}

fn optional_string_at(frame: &[Value], index: usize) -> String {
    frame
        .get(index)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn event_at(frame: &[Value], index: usize) -> Result<Event, RelayError> {
    let value = frame
        .get(index)
        .cloned()
        .ok_or_else(|| RelayError::Protocol("missing event".into()))?;
    serde_json::from_value(value).map_err(|e| RelayError::Protocol(format!("bad event: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use prism_crypto::{kind, EventTemplate, SigningKey};
    use prism_types::Timestamp;

    #[test]
    fn req_frame_shape() {
        let req = ClientMessage::Req {
            subscription: "sub1".into(),
            filter: Filter {
                authors: vec!["ab".into()],
                kinds: vec![kind::METADATA],
                limit: Some(1),
            },
        };
        let text = req.to_json();
        assert_eq!(
            text,
            r#"["REQ","sub1",{"authors":["ab"],"kinds":[0],"limit":1}]"#
        );
        assert_eq!(ClientMessage::from_json(&text).unwrap(), req);
    }

    #[test]
    fn relay_frames_decode() {
        let key = SigningKey::generate();
        let event = EventTemplate::new(kind::METADATA, "{}").sign(&key, Timestamp::new(10));
        let frame = RelayMessage::Event {
            subscription: "s".into(),
            event: event.clone(),
        }
        .to_json();
        assert_eq!(
            RelayMessage::from_json(&frame).unwrap(),
            RelayMessage::Event {
                subscription: "s".into(),
                event
            }
        );
        assert_eq!(
            RelayMessage::from_json(r#"["OK","abc",false,"blocked: spam"]"#).unwrap(),
            RelayMessage::Ok {
                event_id: "abc".into(),
                accepted: false,
                message: "blocked: spam".into()
            }
        );
        assert_eq!(
            RelayMessage::from_json(r#"["NOTICE"]"#).unwrap(),
            RelayMessage::Notice(String::new())
        );
    }

    #[test]
    fn malformed_frames_rejected() {
        for text in ["{}", "[]", "[1]", r#"["AUTH","x"]"#, r#"["EOSE"]"#, "nope"] {
            assert!(RelayMessage::from_json(text).is_err(), "{text}");
        }
    }
}
