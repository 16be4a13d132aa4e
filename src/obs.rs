//! Optional observability helpers for exchanges, callbacks, and the realtime session.
//!
//! # Feature Flags
//!
//! - Enable `tracing` (on by default) to emit structured spans named `wisp_bridge.flow` with the
//!   `flow` and `stage` fields, plus events for session transitions, relays, and failures under the
//!   `wisp_bridge::session` and `wisp_bridge::server` targets.
//! - Enable `metrics` to increment `wisp_bridge_flow_total` (labeled by `flow` + `outcome`, where a
//!   refused authorization counts as `rejected` rather than `failure`),
//!   `wisp_bridge_relay_total` (labeled by `event`), and `wisp_bridge_session_transition_total`
//!   (labeled by `to`).

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Flow kinds observed by the bridge.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowKind {
	/// Authorization-code exchange against the token endpoint.
	CodeExchange,
	/// Callback request served by the HTTP route group.
	Callback,
}
impl FlowKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowKind::CodeExchange => "code_exchange",
			FlowKind::Callback => "callback",
		}
	}
}
impl Display for FlowKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowOutcome {
	/// Entry to a bridge helper.
	Attempt,
	/// A token was issued.
	Success,
	/// The platform or the callback request refused the authorization.
	Rejected,
	/// Transport, parse, or endpoint failure.
	Failure,
}
impl FlowOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowOutcome::Attempt => "attempt",
			FlowOutcome::Success => "success",
			FlowOutcome::Rejected => "rejected",
			FlowOutcome::Failure => "failure",
		}
	}
}
impl Display for FlowOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
