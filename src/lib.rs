//! Bridge a subscription platform's OAuth 2.0 authorization flow to its realtime event feed:
//! authorize a channel or subscriber once, then receive subscriber lifecycle events as local
//! events without ever speaking the remote protocol.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod bridge;
pub mod catalog;
pub mod config;
pub mod error;
pub mod event;
pub mod exchange;
pub mod http;
pub mod oauth;
pub mod obs;
pub mod server;
pub mod session;
pub mod transport;

pub use bridge::{Bridge, BridgeBuilder};
pub use config::{BridgeConfig, BridgeConfigBuilder};
pub use event::{BridgeEvent, EventHub};

mod _prelude {
	pub use std::{
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use parking_lot::{Mutex, RwLock};
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use serde_json::Value;
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

pub use reqwest;
pub use serde_json;
pub use url;
#[cfg(test)] use {color_eyre as _, http_body_util as _, httpmock as _, tower as _};
