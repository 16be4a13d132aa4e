// self
use crate::{_prelude::*, obs::FlowKind, session::SessionState};

/// Type alias that resolves to an instrumented future when tracing is enabled.
#[cfg(feature = "tracing")]
pub type InstrumentedFlow<F> = tracing::instrument::Instrumented<F>;
/// Passthrough future type when tracing is disabled.
#[cfg(not(feature = "tracing"))]
pub type InstrumentedFlow<F> = F;

/// A span builder used by bridge flows.
#[derive(Clone, Debug)]
pub struct FlowSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl FlowSpan {
	/// Creates a new span tagged with the provided flow kind + stage.
	pub fn new(kind: FlowKind, stage: &'static str) -> Self {
		#[cfg(feature = "tracing")]
		{
			let span = tracing::info_span!("wisp_bridge.flow", flow = kind.as_str(), stage);

			Self { span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (kind, stage);

			Self {}
		}
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedFlow<Fut>
	where
		Fut: Future,
	{
		#[cfg(feature = "tracing")]
		{
			use tracing::Instrument;

			fut.instrument(self.span.clone())
		}
		#[cfg(not(feature = "tracing"))]
		{
			fut
		}
	}
}

/// Logs a session state change.
pub fn log_transition(from: SessionState, to: SessionState) {
	#[cfg(feature = "tracing")]
	{
		tracing::info!(
			target: "wisp_bridge::session",
			from = from.as_str(),
			to = to.as_str(),
			"Session state changed."
		);
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (from, to);
	}
}

/// Logs a relayed catalog event.
pub fn log_relay(local_name: &'static str) {
	#[cfg(feature = "tracing")]
	{
		tracing::debug!(target: "wisp_bridge::session", event = local_name, "Relayed realtime event.");
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = local_name;
	}
}

/// Logs an inbound event that is not part of the relay table.
pub fn log_ignored(name: &str) {
	#[cfg(feature = "tracing")]
	{
		tracing::debug!(target: "wisp_bridge::session", event = name, "Ignored unknown realtime event.");
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = name;
	}
}

/// Logs an outbound frame sent on the realtime link.
pub fn log_outbound(name: &str, delivered: bool) {
	#[cfg(feature = "tracing")]
	{
		if delivered {
			tracing::debug!(target: "wisp_bridge::session", event = name, "Sent realtime event.");
		} else {
			tracing::warn!(
				target: "wisp_bridge::session",
				event = name,
				"Realtime link closed before the event could be sent."
			);
		}
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (name, delivered);
	}
}

/// Logs a callback listener or token exchange failure.
pub fn log_server_failure(err: &Error) {
	#[cfg(feature = "tracing")]
	{
		tracing::warn!(target: "wisp_bridge::server", error = %err, "Callback failure.");
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = err;
	}
}

/// Logs a realtime link failure that is surfaced as an `error` event.
pub fn log_session_failure(err: &Error) {
	#[cfg(feature = "tracing")]
	{
		tracing::warn!(target: "wisp_bridge::session", error = %err, "Realtime link failure.");
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = err;
	}
}

/// Logs a callback request that was answered without an exchange.
pub fn log_callback_rejected(reason: &str) {
	#[cfg(feature = "tracing")]
	{
		tracing::info!(target: "wisp_bridge::server", reason, "Rejected authorization callback.");
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = reason;
	}
}

/// Logs the callback listener's bound address.
pub fn log_listening(address: std::net::SocketAddr) {
	#[cfg(feature = "tracing")]
	{
		tracing::info!(target: "wisp_bridge::server", %address, "Callback listener bound.");
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = address;
	}
}
