//! Engine.IO / Socket.IO wire protocol: packet types, constants, and frame decode.
//!
//! A text frame is an Engine.IO packet: one type digit followed by an optional
//! payload. When that packet is a message, the payload is itself a Socket.IO
//! packet with its own type digit. Only Socket.IO event packets are decoded
//! further; their payload is a JSON array `[name, data, ...]`.

use serde_json::value::RawValue;

use crate::types::Event;

// ---------------------------------------------------------------------------
// Protocol constants
// ---------------------------------------------------------------------------

pub const ENGINE_IO_VERSION: &str = "4";
pub const TRANSPORT: &str = "websocket";

/// Message envelope carrying a connect packet for the default namespace.
pub const CONNECT_FRAME: &str = "40";
/// Pong envelope with no payload.
pub const PONG_FRAME: &str = "3";

// ---------------------------------------------------------------------------
// Packet types
// ---------------------------------------------------------------------------

/// Engine.IO (envelope) packet type, the first character of every frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnginePacketType {
    Open,
    Close,
    Ping,
    Pong,
    Message,
    Upgrade,
    Noop,
}

impl EnginePacketType {
    pub fn from_char(c: char) -> Option<Self> {
        match c.to_digit(10)? {
            0 => Some(Self::Open),
            1 => Some(Self::Close),
            2 => Some(Self::Ping),
            3 => Some(Self::Pong),
            4 => Some(Self::Message),
            5 => Some(Self::Upgrade),
            6 => Some(Self::Noop),
            _ => None,
        }
    }
}

/// Socket.IO (application) packet type, the second character of a message frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketPacketType {
    Connect,
    Disconnect,
    Event,
    Ack,
    ConnectError,
    BinaryEvent,
    BinaryAck,
}

impl SocketPacketType {
    pub fn from_char(c: char) -> Option<Self> {
        match c.to_digit(10)? {
            0 => Some(Self::Connect),
            1 => Some(Self::Disconnect),
            2 => Some(Self::Event),
            3 => Some(Self::Ack),
            4 => Some(Self::ConnectError),
            5 => Some(Self::BinaryEvent),
            6 => Some(Self::BinaryAck),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Decode
// ---------------------------------------------------------------------------

/// A frame that decoded cleanly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packet {
    /// Keepalive ping; must be answered with [`PONG_FRAME`].
    Ping,
    /// A Socket.IO event for the handler.
    Event(Event),
    /// Envelope packet that is observed but not acted upon (open, close, pong, ...).
    Ignored(EnginePacketType),
    /// Socket.IO packet other than an event (connect, disconnect, ack, ...).
    Skipped(SocketPacketType),
}

/// Why a frame was dropped. Never fatal to the stream.
#[derive(Debug, thiserror::Error)]
pub enum Discard {
    #[error("packet has no data")]
    Empty,

    #[error("invalid Engine.IO packet type {0:?}")]
    InvalidEngineType(char),

    #[error("message is not a Socket.IO packet")]
    MissingSocketType,

    #[error("invalid Socket.IO packet type {0:?}")]
    InvalidSocketType(char),

    #[error("event packet has no payload")]
    MissingPayload,

    #[error("could not unmarshal Socket.IO event: {0}")]
    InvalidPayload(serde_json::Error),

    #[error("unexpected number of values in Socket.IO event: {0}")]
    TooFewValues(usize),

    #[error("failed to unmarshal event name: {0}")]
    InvalidName(serde_json::Error),

    #[error("failed to handle event data: {0}")]
    InvalidData(serde_json::Error),
}

impl Discard {
    /// `true` when the frame claimed to be an event but its payload was broken,
    /// as opposed to frames that simply carry nothing to deliver.
    pub fn is_malformed(&self) -> bool {
        matches!(
            self,
            Discard::InvalidPayload(_)
                | Discard::TooFewValues(_)
                | Discard::InvalidName(_)
                | Discard::InvalidData(_)
        )
    }
}

/// Decode one text frame.
///
/// Type digits are taken per character, so multi-byte input never splits a
/// code point; the remainder after the header is handed to the JSON parser
/// untouched.
pub fn decode(frame: &str) -> Result<Packet, Discard> {
    let mut chars = frame.chars();

    let first = chars.next().ok_or(Discard::Empty)?;
    let engine = EnginePacketType::from_char(first).ok_or(Discard::InvalidEngineType(first))?;
    match engine {
        EnginePacketType::Ping => return Ok(Packet::Ping),
        EnginePacketType::Message => {}
        other => return Ok(Packet::Ignored(other)),
    }

    let second = chars.next().ok_or(Discard::MissingSocketType)?;
    let socket = SocketPacketType::from_char(second).ok_or(Discard::InvalidSocketType(second))?;
    if socket != SocketPacketType::Event {
        return Ok(Packet::Skipped(socket));
    }

    let payload = chars.as_str();
    if payload.is_empty() {
        return Err(Discard::MissingPayload);
    }
    decode_event(payload).map(Packet::Event)
}

/// Decode an event payload `[name, data, ...]`. Values past the second are ignored.
pub fn decode_event(payload: &str) -> Result<Event, Discard> {
    let values: Vec<&RawValue> = serde_json::from_str(payload).map_err(Discard::InvalidPayload)?;
    let [name, data, ..] = values.as_slice() else {
        return Err(Discard::TooFewValues(values.len()));
    };
    let name: String = serde_json::from_str(name.get()).map_err(Discard::InvalidName)?;
    let data = serde_json::to_string(data).map_err(Discard::InvalidData)?;
    Ok(Event { name, data })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
