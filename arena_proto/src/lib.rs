//! Wire contract between the arena simulator and mirroring clients.
//!
//! Every frame is a little-endian `u32` length followed by a JSON envelope
//! `{"event": <name>, "data": <payload>}`. Envelopes are decoded in two phases
//! (envelope first, then each payload item) so a single malformed item only
//! costs that item.

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

/// Largest frame body accepted by [`frame_len`].
pub const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

/// Event names carried in the envelope `event` field.
pub mod event {
    pub const CONNECT: &str = "connect";
    pub const SNAPSHOT: &str = "connection";
    pub const CELL_DIFFS: &str = "core_state";
    pub const THREAD_MOVE: &str = "update_thread";
    pub const THREAD_KILL: &str = "kill_thread";
    pub const EVENTS: &str = "events";
    pub const SCOREBOARD: &str = "scoreboard";
    pub const DISCONNECT: &str = "disconnect";
    pub const AUTH: &str = "auth";
}

/// Simulator-assigned thread identifier. Unique among live threads only.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ThreadId {
    Number(i64),
    Name(String),
}

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ThreadId::Number(value) => write!(f, "{}", value),
            ThreadId::Name(name) => f.write_str(name),
        }
    }
}

impl From<i64> for ThreadId {
    fn from(value: i64) -> Self {
        ThreadId::Number(value)
    }
}

impl From<&str> for ThreadId {
    fn from(value: &str) -> Self {
        ThreadId::Name(value.to_string())
    }
}

impl From<String> for ThreadId {
    fn from(value: String) -> Self {
        ThreadId::Name(value)
    }
}

/// Display color token such as `#ff0000`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Color(String);

impl Color {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Parses `#rgb` and `#rrggbb` tokens the way a browser would.
    pub fn to_rgb(&self) -> Option<(u8, u8, u8)> {
        let hex = self.0.strip_prefix('#')?;
        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        match hex.len() {
            3 => {
                let mut channels = [0u8; 3];
                for (slot, digit) in channels.iter_mut().zip(hex.chars()) {
                    let value = digit.to_digit(16)? as u8;
                    *slot = value * 17;
                }
                Some((channels[0], channels[1], channels[2]))
            }
            6 => {
                let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
                let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
                let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
                Some((r, g, b))
            }
            _ => None,
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Color {
    fn from(value: &str) -> Self {
        Color::new(value)
    }
}

/// `[location, byte]` pair from a `core_state` payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellUpdate(pub i64, pub u8);

impl CellUpdate {
    pub fn location(&self) -> i64 {
        self.0
    }

    pub fn value(&self) -> u8 {
        self.1
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadMove {
    pub id: ThreadId,
    pub location: i64,
    pub color: Color,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreEntry {
    pub label: String,
    pub color: Color,
}

/// Opaque, displayable event record.
pub type EventRecord = Value;

/// Items that survived per-item decoding plus a count of the ones that did not.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch<T> {
    pub items: Vec<T>,
    pub rejected: usize,
}

impl<T> Batch<T> {
    pub fn new(items: Vec<T>) -> Self {
        Self { items, rejected: 0 }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl<T> Default for Batch<T> {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

/// Undecoded envelope as it appears on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawEnvelope {
    pub event: String,
    #[serde(default)]
    pub data: Value,
}

impl RawEnvelope {
    pub fn new(event: impl Into<String>, data: Value) -> Self {
        Self {
            event: event.into(),
            data,
        }
    }

    pub fn connect() -> Self {
        Self::new(event::CONNECT, Value::Null)
    }

    pub fn disconnect() -> Self {
        Self::new(event::DISCONNECT, Value::Null)
    }

    pub fn snapshot(bytes: &[u8]) -> Self {
        Self::new(event::SNAPSHOT, json!(bytes))
    }

    pub fn cell_diffs(updates: &[CellUpdate]) -> Self {
        Self::new(event::CELL_DIFFS, json!(updates))
    }

    pub fn thread_moves(moves: &[ThreadMove]) -> Self {
        Self::new(event::THREAD_MOVE, json!(moves))
    }

    pub fn thread_kills(ids: &[ThreadId]) -> Self {
        Self::new(event::THREAD_KILL, json!(ids))
    }

    pub fn events(records: Vec<EventRecord>) -> Self {
        Self::new(event::EVENTS, Value::Array(records))
    }

    pub fn scoreboard(entries: &[ScoreEntry]) -> Self {
        Self::new(event::SCOREBOARD, json!(entries))
    }

    pub fn auth(token: &str) -> Self {
        Self::new(event::AUTH, json!({ "token": token }))
    }

    /// Extracts the token from an `auth` envelope.
    pub fn auth_token(&self) -> Option<&str> {
        if self.event != event::AUTH {
            return None;
        }
        self.data.get("token").and_then(Value::as_str)
    }
}

/// Fully decoded inbound message.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage {
    Connect,
    Snapshot(Vec<u8>),
    CellDiffs(Batch<CellUpdate>),
    ThreadMoves(Batch<ThreadMove>),
    ThreadKills(Batch<ThreadId>),
    Events(Vec<EventRecord>),
    Scoreboard(Batch<ScoreEntry>),
    Disconnect,
}

impl InboundMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            InboundMessage::Connect => event::CONNECT,
            InboundMessage::Snapshot(_) => event::SNAPSHOT,
            InboundMessage::CellDiffs(_) => event::CELL_DIFFS,
            InboundMessage::ThreadMoves(_) => event::THREAD_MOVE,
            InboundMessage::ThreadKills(_) => event::THREAD_KILL,
            InboundMessage::Events(_) => event::EVENTS,
            InboundMessage::Scoreboard(_) => event::SCOREBOARD,
            InboundMessage::Disconnect => event::DISCONNECT,
        }
    }

    /// Items rejected during decoding.
    pub fn rejected(&self) -> usize {
        match self {
            InboundMessage::CellDiffs(batch) => batch.rejected,
            InboundMessage::ThreadMoves(batch) => batch.rejected,
            InboundMessage::ThreadKills(batch) => batch.rejected,
            InboundMessage::Scoreboard(batch) => batch.rejected,
            _ => 0,
        }
    }
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("unknown event '{0}'")]
    UnknownEvent(String),
    #[error("malformed {event} payload: {reason}")]
    Malformed { event: &'static str, reason: String },
}

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("frame io failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("frame body is not a valid envelope: {0}")]
    Json(#[from] serde_json::Error),
    #[error("frame of {len} bytes exceeds limit of {max}")]
    TooLarge { len: usize, max: usize },
}

#[derive(Clone, Copy)]
enum Shape {
    List,
    OneOrMany,
}

impl TryFrom<RawEnvelope> for InboundMessage {
    type Error = DecodeError;

    fn try_from(envelope: RawEnvelope) -> Result<Self, Self::Error> {
        decode_message(envelope)
    }
}

pub fn decode_message(envelope: RawEnvelope) -> Result<InboundMessage, DecodeError> {
    let RawEnvelope { event: name, data } = envelope;
    match name.as_str() {
        event::CONNECT => Ok(InboundMessage::Connect),
        event::DISCONNECT => Ok(InboundMessage::Disconnect),
        event::SNAPSHOT => serde_json::from_value::<Vec<u8>>(data)
            .map(InboundMessage::Snapshot)
            .map_err(|err| DecodeError::Malformed {
                event: event::SNAPSHOT,
                reason: err.to_string(),
            }),
        event::CELL_DIFFS => {
            decode_batch(event::CELL_DIFFS, data, Shape::List).map(InboundMessage::CellDiffs)
        }
        event::THREAD_MOVE => decode_batch(event::THREAD_MOVE, data, Shape::OneOrMany)
            .map(InboundMessage::ThreadMoves),
        event::THREAD_KILL => decode_batch(event::THREAD_KILL, data, Shape::OneOrMany)
            .map(InboundMessage::ThreadKills),
        event::SCOREBOARD => {
            decode_batch(event::SCOREBOARD, data, Shape::List).map(InboundMessage::Scoreboard)
        }
        event::EVENTS => Ok(InboundMessage::Events(match data {
            Value::Array(records) => records,
            Value::Null => Vec::new(),
            other => vec![other],
        })),
        _ => Err(DecodeError::UnknownEvent(name)),
    }
}

fn decode_batch<T: DeserializeOwned>(
    event: &'static str,
    data: Value,
    shape: Shape,
) -> Result<Batch<T>, DecodeError> {
    let raw_items = match (data, shape) {
        (Value::Array(items), _) => items,
        (Value::Null, _) => {
            return Err(DecodeError::Malformed {
                event,
                reason: "missing payload".to_string(),
            })
        }
        (single, Shape::OneOrMany) => vec![single],
        (other, Shape::List) => {
            return Err(DecodeError::Malformed {
                event,
                reason: format!("expected a list, found {}", json_kind(&other)),
            })
        }
    };

    let mut batch = Batch::new(Vec::with_capacity(raw_items.len()));
    for raw in raw_items {
        match serde_json::from_value::<T>(raw) {
            Ok(item) => batch.items.push(item),
            Err(_) => batch.rejected += 1,
        }
    }
    Ok(batch)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "object",
    }
}

pub fn encode_frame(envelope: &RawEnvelope) -> Result<Vec<u8>, FrameError> {
    let body = serde_json::to_vec(envelope)?;
    if body.len() > MAX_FRAME_LEN {
        return Err(FrameError::TooLarge {
            len: body.len(),
            max: MAX_FRAME_LEN,
        });
    }
    let len = body.len() as u32;
    let mut buffer = Vec::with_capacity(4 + body.len());
    buffer.extend_from_slice(&len.to_le_bytes());
    buffer.extend_from_slice(&body);
    Ok(buffer)
}

/// Validates a frame header against `max` and returns the body length.
pub fn frame_len(header: [u8; 4], max: usize) -> Result<usize, FrameError> {
    let len = u32::from_le_bytes(header) as usize;
    if len > max {
        return Err(FrameError::TooLarge { len, max });
    }
    Ok(len)
}

pub fn decode_frame_body(body: &[u8]) -> Result<RawEnvelope, FrameError> {
    Ok(serde_json::from_slice(body)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(text: &str) -> Result<InboundMessage, DecodeError> {
        let envelope: RawEnvelope = serde_json::from_str(text).expect("valid envelope");
        decode_message(envelope)
    }

    #[test]
    fn cell_diffs_drop_only_malformed_items() {
        let message = decode(r#"{"event":"core_state","data":[[1,99],[2,"x"],[3],[4,300],[5,7]]}"#)
            .expect("decodes");
        match message {
            InboundMessage::CellDiffs(batch) => {
                assert_eq!(batch.items, vec![CellUpdate(1, 99), CellUpdate(5, 7)]);
                assert_eq!(batch.rejected, 3);
            }
            other => panic!("unexpected message {:?}", other),
        }
    }

    #[test]
    fn thread_kill_accepts_single_or_many_ids() {
        let single = decode(r#"{"event":"kill_thread","data":"t1"}"#).expect("decodes");
        assert_eq!(
            single,
            InboundMessage::ThreadKills(Batch::new(vec![ThreadId::from("t1")]))
        );

        let many = decode(r#"{"event":"kill_thread","data":["t1",7,null]}"#).expect("decodes");
        match many {
            InboundMessage::ThreadKills(batch) => {
                assert_eq!(batch.items, vec![ThreadId::from("t1"), ThreadId::Number(7)]);
                assert_eq!(batch.rejected, 1);
            }
            other => panic!("unexpected message {:?}", other),
        }
    }

    #[test]
    fn thread_move_accepts_single_object() {
        let message = decode(
            r##"{"event":"update_thread","data":{"id":"t1","location":2,"color":"#ff0000"}}"##,
        )
        .expect("decodes");
        assert_eq!(
            message,
            InboundMessage::ThreadMoves(Batch::new(vec![ThreadMove {
                id: "t1".into(),
                location: 2,
                color: "#ff0000".into(),
            }]))
        );
    }

    #[test]
    fn snapshot_is_rejected_as_a_whole() {
        let err = decode(r#"{"event":"connection","data":[1,2,256]}"#).unwrap_err();
        assert!(matches!(
            err,
            DecodeError::Malformed {
                event: event::SNAPSHOT,
                ..
            }
        ));
    }

    #[test]
    fn scoreboard_requires_list() {
        let err = decode(r#"{"event":"scoreboard","data":{"label":"a"}}"#).unwrap_err();
        assert!(matches!(err, DecodeError::Malformed { .. }));
    }

    #[test]
    fn unknown_event_is_reported() {
        let err = decode(r#"{"event":"state","data":[]}"#).unwrap_err();
        assert!(matches!(err, DecodeError::UnknownEvent(name) if name == "state"));
    }

    #[test]
    fn scalar_event_payload_becomes_single_record() {
        let message = decode(r#"{"event":"events","data":"player 1 joined"}"#).expect("decodes");
        assert_eq!(
            message,
            InboundMessage::Events(vec![Value::String("player 1 joined".into())])
        );
    }

    #[test]
    fn color_tokens_parse_short_and_long_forms() {
        assert_eq!(Color::from("#ff0000").to_rgb(), Some((255, 0, 0)));
        assert_eq!(Color::from("#555").to_rgb(), Some((0x55, 0x55, 0x55)));
        assert_eq!(Color::from("#abcd").to_rgb(), None);
        assert_eq!(Color::from("red").to_rgb(), None);
        assert_eq!(Color::from("#gg0000").to_rgb(), None);
    }

    #[test]
    fn frame_header_limits_body_length() {
        let frame = encode_frame(&RawEnvelope::connect()).expect("encodes");
        let header = [frame[0], frame[1], frame[2], frame[3]];
        let len = frame_len(header, MAX_FRAME_LEN).expect("within limit");
        assert_eq!(len, frame.len() - 4);
        let envelope = decode_frame_body(&frame[4..]).expect("decodes");
        assert_eq!(envelope.event, event::CONNECT);

        assert!(matches!(
            frame_len(header, len - 1),
            Err(FrameError::TooLarge { .. })
        ));
    }

    #[test]
    fn auth_token_is_read_back() {
        let envelope = RawEnvelope::auth("secret");
        assert_eq!(envelope.auth_token(), Some("secret"));
        assert_eq!(RawEnvelope::connect().auth_token(), None);
    }
}
