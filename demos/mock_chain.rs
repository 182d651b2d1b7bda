//! Assembles a chain over the in-process mock transport and prints what every layer logged.

// std
use std::sync::Arc;
// crates.io
use color_eyre::Result;
// self
use tripperware::{
	config::{Config, OAuth2Config},
	http::Method,
	logger::{Logger, MemoryLogger},
	mock::{MockRule, MockTransport},
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let transport = MockTransport::default()
		.with_rule(
			MockRule::path("/oauth/token")
				.respond(200, "{\"access_token\":\"demo-token\",\"token_type\":\"bearer\"}"),
		)
		.with_rule(MockRule::path("/api/session").respond(401, "").respond(200, "{\"user\":\"demo\"}"));
	let config = Config {
		oauth2: Some(OAuth2Config {
			base_uri: None,
			token_path: "/oauth/token".into(),
			client_id: "demo-client".into(),
			client_secret: "demo-secret".into(),
			retry_forbidden: false,
		}),
		..Config::new("https://api.example.com")
	};
	let logger = Arc::new(MemoryLogger::default());
	let client =
		config.client_with_trippers_on(transport.clone(), logger.clone() as Arc<dyn Logger>)?;
	let body = client.send_json(Method::GET, "/api/session", None).await?;

	println!("response: {}", String::from_utf8_lossy(&body));
	println!("trippers: {:?}", client.trippers());

	for entry in logger.entries() {
		let fields = entry.fields.iter().map(ToString::to_string).collect::<Vec<_>>().join(" ");

		println!("[{}] {} {}", entry.level, entry.message, fields);
	}
	for request in transport.requests() {
		println!(
			"sent {} {} authorization={}",
			request.method,
			request.path(),
			request.header("authorization").unwrap_or("-")
		);
	}

	Ok(())
}
