//! Engine.IO / Socket.IO text framing.
//!
//! Only the default namespace and text packets are understood. Binary attachments and acks are
//! decoded far enough to be skipped.

// self
use crate::{_prelude::*, error::RealtimeError};

/// Engine.IO ping packet.
pub const PING: &str = "2";
/// Engine.IO pong packet.
pub const PONG: &str = "3";
/// Socket.IO connect request for the default namespace.
pub const NAMESPACE_CONNECT: &str = "40";

/// Engine.IO open handshake.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Handshake {
	/// Session identifier assigned by the server.
	pub sid: String,
	/// Heartbeat period in milliseconds.
	pub ping_interval: u64,
	/// Heartbeat timeout in milliseconds.
	pub ping_timeout: u64,
}
impl Handshake {
	/// Heartbeat period as a duration.
	pub fn ping_period(&self) -> std::time::Duration {
		std::time::Duration::from_millis(self.ping_interval)
	}
}

/// Decoded Engine.IO packet.
#[derive(Clone, Debug, PartialEq)]
pub enum Packet {
	/// `0{...}`
	Open(Handshake),
	/// `1`
	Close,
	/// `2`
	Ping,
	/// `3`
	Pong,
	/// `4...`
	Message(SocketPacket),
	/// `5` or `6`; only meaningful for polling upgrades.
	Noop,
}

/// Decoded Socket.IO packet carried inside an Engine.IO message.
#[derive(Clone, Debug, PartialEq)]
pub enum SocketPacket {
	/// Namespace connected.
	Connect,
	/// Namespace disconnected by the server.
	Disconnect,
	/// Named event with its first argument.
	Event {
		/// Event name.
		name: String,
		/// First argument or `null`.
		payload: Value,
	},
	/// Namespace connection refused.
	ConnectError(String),
	/// Acks and binary packets the bridge does not use.
	Ignored,
}

/// Decodes one websocket text frame.
pub fn decode(text: &str) -> Result<Packet, RealtimeError> {
	let mut chars = text.chars();
	let kind = chars.next().ok_or_else(|| protocol("empty frame"))?;
	let rest = chars.as_str();

	match kind {
		'0' => serde_json::from_str(rest)
			.map(Packet::Open)
			.map_err(|err| protocol(format!("invalid open handshake: {err}"))),
		'1' => Ok(Packet::Close),
		'2' => Ok(Packet::Ping),
		'3' => Ok(Packet::Pong),
		'4' => decode_socket(rest).map(Packet::Message),
		'5' | '6' => Ok(Packet::Noop),
		other => Err(protocol(format!("unknown packet type `{other}`"))),
	}
}

fn decode_socket(text: &str) -> Result<SocketPacket, RealtimeError> {
	let mut chars = text.chars();
	let kind = chars.next().ok_or_else(|| protocol("empty message"))?;
	let body = skip_namespace(chars.as_str());

	match kind {
		'0' => Ok(SocketPacket::Connect),
		'1' => Ok(SocketPacket::Disconnect),
		'2' => decode_event(body.trim_start_matches(|c: char| c.is_ascii_digit())),
		'3' | '5' | '6' => Ok(SocketPacket::Ignored),
		'4' => Ok(SocketPacket::ConnectError(connect_error_message(body))),
		other => Err(protocol(format!("unknown message type `{other}`"))),
	}
}

fn skip_namespace(body: &str) -> &str {
	if body.starts_with('/') {
		body.split_once(',').map_or("", |(_, rest)| rest)
	} else {
		body
	}
}

fn decode_event(body: &str) -> Result<SocketPacket, RealtimeError> {
	let args: Vec<Value> =
		serde_json::from_str(body).map_err(|err| protocol(format!("invalid event: {err}")))?;
	let mut args = args.into_iter();
	let name = match args.next() {
		Some(Value::String(name)) => name,
		_ => return Err(protocol("event name must be a string")),
	};

	Ok(SocketPacket::Event { name, payload: args.next().unwrap_or(Value::Null) })
}

fn connect_error_message(body: &str) -> String {
	match serde_json::from_str::<Value>(body) {
		Ok(Value::String(message)) => message,
		Ok(Value::Object(fields)) => match fields.get("message") {
			Some(Value::String(message)) => message.clone(),
			_ => Value::Object(fields).to_string(),
		},
		_ => body.to_owned(),
	}
}

/// Encodes an event emit as `42[name,payload]`.
pub fn encode_event(name: &str, payload: &Value) -> Result<String, RealtimeError> {
	serde_json::to_string(&(name, payload))
		.map(|args| format!("42{args}"))
		.map_err(|err| protocol(format!("unencodable event `{name}`: {err}")))
}

fn protocol(message: impl Into<String>) -> RealtimeError {
	RealtimeError::Protocol { message: message.into() }
}
