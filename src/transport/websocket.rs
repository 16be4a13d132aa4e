//! Socket.IO over a raw websocket, with reconnection.
//!
//! [`WebSocketTransport`] spawns one task per link. The task connects, performs the Engine.IO
//! handshake for the configured protocol revision, forwards decoded events, and reconnects with
//! jittered exponential backoff until the bridge drops the outbound sender.

// std
use std::collections::VecDeque;
// crates.io
use futures::{SinkExt, StreamExt};
use rand::Rng;
use tokio::{
	net::TcpStream,
	sync::mpsc::{self, UnboundedReceiver, UnboundedSender},
	time::{self, Instant, Interval, MissedTickBehavior},
};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};
// self
use crate::{
	_prelude::*,
	error::RealtimeError,
	transport::{
		OutboundEvent, RealtimeTransport, TransportEvent, TransportLink,
		frame::{self, Packet, SocketPacket},
	},
};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Engine.IO protocol revision spoken on the socket.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineIoVersion {
	/// Socket.IO 1.x/2.x servers: the namespace connects implicitly and the client pings.
	#[default]
	V3,
	/// Socket.IO 3.x+ servers: the client requests the namespace and answers server pings.
	V4,
}
impl EngineIoVersion {
	/// Value of the `EIO` query parameter.
	pub const fn as_str(self) -> &'static str {
		match self {
			EngineIoVersion::V3 => "3",
			EngineIoVersion::V4 => "4",
		}
	}
}

/// Backoff applied between reconnection attempts.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectPolicy {
	/// Delay before the first retry.
	pub base_delay: std::time::Duration,
	/// Upper bound for any delay.
	pub max_delay: std::time::Duration,
	/// Randomization factor in `[0, 1]`.
	pub jitter: f64,
	/// Consecutive failures tolerated before giving up; `None` retries forever.
	pub max_attempts: Option<u32>,
}
impl ReconnectPolicy {
	/// Delay before retry number `attempt` (1-based).
	pub fn delay(&self, attempt: u32) -> std::time::Duration {
		let exponent = attempt.saturating_sub(1).min(16);
		let nominal = self.base_delay.saturating_mul(1 << exponent).min(self.max_delay);
		let jitter = self.jitter.clamp(0., 1.);

		if jitter <= 0. {
			return nominal;
		}

		let mut rng = rand::rng();
		let deviation = nominal.mul_f64(rng.random::<f64>() * jitter);
		let jittered = if rng.random_bool(0.5) {
			nominal.saturating_sub(deviation)
		} else {
			nominal.saturating_add(deviation)
		};

		jittered.min(self.max_delay)
	}

	fn exhausted(&self, attempt: u32) -> bool {
		self.max_attempts.is_some_and(|max| attempt > max)
	}
}
impl Default for ReconnectPolicy {
	fn default() -> Self {
		Self {
			base_delay: std::time::Duration::from_secs(1),
			max_delay: std::time::Duration::from_secs(5),
			jitter: 0.5,
			max_attempts: None,
		}
	}
}

/// Production [`RealtimeTransport`] backed by `tokio-tungstenite`.
#[derive(Clone, Debug, Default)]
pub struct WebSocketTransport {
	version: EngineIoVersion,
	reconnect: ReconnectPolicy,
}
impl WebSocketTransport {
	/// Transport speaking Engine.IO v3 with the default backoff.
	pub fn new() -> Self {
		Self::default()
	}

	/// Selects the Engine.IO revision.
	pub fn with_version(mut self, version: EngineIoVersion) -> Self {
		self.version = version;

		self
	}

	/// Replaces the reconnection policy.
	pub fn with_reconnect(mut self, policy: ReconnectPolicy) -> Self {
		self.reconnect = policy;

		self
	}
}
impl RealtimeTransport for WebSocketTransport {
	fn open(&self, endpoint: &Url) -> Result<TransportLink> {
		let url = socket_url(endpoint, self.version)?;
		let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
		let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
		let driver = LinkDriver {
			url,
			version: self.version,
			policy: self.reconnect.clone(),
			events: inbound_tx,
			outbound: outbound_rx,
			pending: VecDeque::new(),
		};
		let task = tokio::spawn(driver.run());

		Ok(TransportLink::new(inbound_rx, outbound_tx).with_task(task))
	}
}

/// Derives the websocket URL of a Socket.IO endpoint.
pub fn socket_url(endpoint: &Url, version: EngineIoVersion) -> Result<Url, RealtimeError> {
	let scheme = match endpoint.scheme() {
		"https" | "wss" => "wss",
		"http" | "ws" => "ws",
		_ => return Err(endpoint_error(endpoint, "scheme must be http(s) or ws(s)")),
	};
	let mut url = endpoint.clone();

	url.set_scheme(scheme).map_err(|_| endpoint_error(endpoint, "scheme cannot be changed"))?;

	let path = format!("{}/socket.io/", endpoint.path().trim_end_matches('/'));

	url.set_path(&path);
	url.set_fragment(None);
	url.query_pairs_mut()
		.append_pair("EIO", version.as_str())
		.append_pair("transport", "websocket");

	Ok(url)
}

fn endpoint_error(endpoint: &Url, reason: &'static str) -> RealtimeError {
	RealtimeError::Endpoint { endpoint: endpoint.to_string(), reason }
}

enum LinkOutcome {
	/// The bridge released the link.
	Closed,
	/// The socket dropped; reconnect.
	Lost,
}

struct LinkDriver {
	url: Url,
	version: EngineIoVersion,
	policy: ReconnectPolicy,
	events: UnboundedSender<TransportEvent>,
	outbound: UnboundedReceiver<OutboundEvent>,
	/// Encoded emits waiting for the namespace to connect.
	pending: VecDeque<String>,
}
impl LinkDriver {
	async fn run(mut self) {
		let mut failures = 0_u32;

		loop {
			match connect_async(self.url.as_str()).await {
				Ok((socket, _)) => {
					failures = 0;

					if let LinkOutcome::Closed = self.drive(socket).await {
						return;
					}
				},
				Err(err) => self.report(RealtimeError::connect(err)),
			}

			failures += 1;

			if self.policy.exhausted(failures) {
				self.report(RealtimeError::ReconnectExhausted { attempts: failures });

				return;
			}

			let delay = self.policy.delay(failures);

			if let LinkOutcome::Closed = self.backoff(delay).await {
				return;
			}
		}
	}

	/// Sleeps before the next attempt while still accepting emits.
	async fn backoff(&mut self, delay: std::time::Duration) -> LinkOutcome {
		let sleep = time::sleep(delay);

		tokio::pin!(sleep);

		loop {
			tokio::select! {
				_ = &mut sleep => return LinkOutcome::Lost,
				emit = self.outbound.recv() => match emit {
					Some(emit) => self.queue(&emit),
					None => return LinkOutcome::Closed,
				},
				_ = self.events.closed() => return LinkOutcome::Closed,
			}
		}
	}

	async fn drive(&mut self, socket: Socket) -> LinkOutcome {
		let (mut sink, mut stream) = socket.split();
		let mut heartbeat: Option<Interval> = None;
		let mut connected = false;

		let reason = loop {
			tokio::select! {
				incoming = stream.next() => match incoming {
					Some(Ok(Message::Text(text))) => match frame::decode(&text) {
						Ok(Packet::Open(handshake)) => match self.version {
							EngineIoVersion::V3 => {
								let period = handshake.ping_period();

								heartbeat = (!period.is_zero()).then(|| {
									let mut interval = time::interval_at(Instant::now() + period, period);

									interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

									interval
								});
							},
							EngineIoVersion::V4 => {
								if let Err(err) = sink.send(Message::Text(frame::NAMESPACE_CONNECT.into())).await {
									self.report(RealtimeError::socket(err));

									break "transport error";
								}
							},
						},
						Ok(Packet::Ping) if self.version == EngineIoVersion::V4 => {
							if let Err(err) = sink.send(Message::Text(frame::PONG.into())).await {
								self.report(RealtimeError::socket(err));

								break "transport error";
							}
						},
						Ok(Packet::Close) => break "transport close",
						Ok(Packet::Message(SocketPacket::Connect)) => {
							connected = true;

							self.forward(TransportEvent::Connect);

							while let Some(text) = self.pending.pop_front() {
								if let Err(err) = sink.send(Message::Text(text)).await {
									self.report(RealtimeError::socket(err));

									break;
								}
							}
						},
						Ok(Packet::Message(SocketPacket::Disconnect)) => break "io server disconnect",
						Ok(Packet::Message(SocketPacket::Event { name, payload })) =>
							self.forward(TransportEvent::Event { name, payload }),
						Ok(Packet::Message(SocketPacket::ConnectError(message))) =>
							self.report(RealtimeError::Refused { message }),
						Ok(Packet::Ping | Packet::Pong | Packet::Noop | Packet::Message(SocketPacket::Ignored)) => {},
						Err(err) => self.report(err),
					},
					Some(Ok(Message::Close(_))) | None => break "transport close",
					Some(Ok(_)) => {},
					Some(Err(err)) => {
						self.report(RealtimeError::socket(err));

						break "transport error";
					},
				},
				emit = self.outbound.recv() => match emit {
					Some(emit) if connected => {
						let Some(text) = self.encode(&emit) else {
							continue;
						};

						if let Err(err) = sink.send(Message::Text(text)).await {
							self.report(RealtimeError::socket(err));

							break "transport error";
						}
					},
					Some(emit) => self.queue(&emit),
					None => {
						let _ = sink.send(Message::Close(None)).await;

						return LinkOutcome::Closed;
					},
				},
				_ = tick(&mut heartbeat) => {
					if let Err(err) = sink.send(Message::Text(frame::PING.into())).await {
						self.report(RealtimeError::socket(err));

						break "ping timeout";
					}
				},
				_ = self.events.closed() => {
					let _ = sink.send(Message::Close(None)).await;

					return LinkOutcome::Closed;
				},
			}
		};

		if connected {
			self.forward(TransportEvent::Disconnect { reason: reason.into() });
		}

		LinkOutcome::Lost
	}

	fn encode(&self, emit: &OutboundEvent) -> Option<String> {
		match frame::encode_event(&emit.name, &emit.payload) {
			Ok(text) => Some(text),
			Err(err) => {
				self.report(err);

				None
			},
		}
	}

	fn queue(&mut self, emit: &OutboundEvent) {
		if let Some(text) = self.encode(emit) {
			self.pending.push_back(text);
		}
	}

	fn forward(&self, event: TransportEvent) {
		let _ = self.events.send(event);
	}

	fn report(&self, err: RealtimeError) {
		self.forward(TransportEvent::Error(err));
	}
}

async fn tick(heartbeat: &mut Option<Interval>) {
	match heartbeat {
		Some(interval) => {
			interval.tick().await;
		},
		None => std::future::pending().await,
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn socket_urls_follow_the_endpoint_scheme() {
		let secure = Url::parse("https://singularity.gamewisp.com").expect("Endpoint should parse.");
		let plain = Url::parse("http://127.0.0.1:9000/rt/").expect("Endpoint should parse.");

		assert_eq!(
			socket_url(&secure, EngineIoVersion::V3).expect("Secure endpoint should map.").as_str(),
			"wss://singularity.gamewisp.com/socket.io/?EIO=3&transport=websocket"
		);
		assert_eq!(
			socket_url(&plain, EngineIoVersion::V4).expect("Plain endpoint should map.").as_str(),
			"ws://127.0.0.1:9000/rt/socket.io/?EIO=4&transport=websocket"
		);

		let ftp = Url::parse("ftp://example.com").expect("Endpoint should parse.");

		assert!(matches!(
			socket_url(&ftp, EngineIoVersion::V3),
			Err(RealtimeError::Endpoint { .. })
		));
	}

	#[test]
	fn backoff_grows_and_stays_bounded() {
		let policy = ReconnectPolicy { jitter: 0., ..Default::default() };

		assert_eq!(policy.delay(1), std::time::Duration::from_secs(1));
		assert_eq!(policy.delay(2), std::time::Duration::from_secs(2));
		assert_eq!(policy.delay(3), std::time::Duration::from_secs(4));
		assert_eq!(policy.delay(4), std::time::Duration::from_secs(5));
		assert_eq!(policy.delay(40), std::time::Duration::from_secs(5));

		let jittered = ReconnectPolicy::default();

		for attempt in 1..10 {
			let delay = jittered.delay(attempt);

			assert!(delay <= jittered.max_delay);
		}
	}

	#[test]
	fn attempts_are_unlimited_by_default() {
		let policy = ReconnectPolicy::default();

		assert!(!policy.exhausted(u32::MAX));
		assert!(ReconnectPolicy { max_attempts: Some(2), ..policy }.exhausted(3));
	}
}
