//! Runs a bridge for a stream overlay and prints every event it emits.
//!
//! Pass a JSON configuration file as the first argument, or set `WISP_CLIENT_ID`,
//! `WISP_CLIENT_SECRET`, and `WISP_REDIRECT_URI` to use the builder with a `/callback` route on
//! port 9000.

// std
use std::{env, fs};
// crates.io
use color_eyre::{Result, eyre::eyre};
// self
use wisp_bridge::{Bridge, BridgeConfig, BridgeEvent};

fn load_config() -> Result<BridgeConfig> {
	if let Some(path) = env::args().nth(1) {
		return Ok(BridgeConfig::from_json_str(&fs::read_to_string(path)?)?);
	}

	let var = |key: &str| env::var(key).map_err(|_| eyre!("Set `{key}` or pass a config file."));

	Ok(BridgeConfig::builder()
		.client_id(var("WISP_CLIENT_ID")?)
		.client_secret(var("WISP_CLIENT_SECRET")?)
		.redirect_uri(var("WISP_REDIRECT_URI")?)
		.redirect_path("/callback")
		.listen_port(9000)
		.build()?)
}

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let bridge = Bridge::start(load_config()?).await?;
	let mut events = bridge.subscribe();

	bridge.on("subscriber-new", |event| {
		println!("New subscriber: {}.", event.to_payload());
	});

	if let Some(address) = bridge.local_addr() {
		println!("Listening on http://{address}.");
	}

	println!("Authorize the channel at {}.", bridge.channel_authorization_url());

	loop {
		tokio::select! {
			event = events.recv() => match event {
				Some(BridgeEvent::ChannelConnect(token)) =>
					println!("Channel authorized (expires at {:?}).", token.expires_at()),
				Some(BridgeEvent::Error(err)) => eprintln!("Bridge error: {err}."),
				Some(event) => println!("{}: {}", event.name(), event.to_payload()),
				None => break,
			},
			_ = tokio::signal::ctrl_c() => break,
		}
	}

	bridge.shutdown().await;

	Ok(())
}
