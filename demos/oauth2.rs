//! Calls a protected endpoint with client-credentials auth, logging through `tracing`.
//!
//! ```sh
//! OAUTH_BASE_URI=https://api.example.com OAUTH_CLIENT_ID=id OAUTH_CLIENT_SECRET=secret \
//! 	RUST_LOG=tripperware=debug cargo run --example oauth2 --features tracing
//! ```

// std
use std::{env, sync::Arc};
// crates.io
use color_eyre::{Result, eyre::WrapErr};
use tracing_subscriber::EnvFilter;
// self
use tripperware::{
	config::{Config, OAuth2Config},
	http::Method,
	logger::TracingLogger,
};

fn var_or(name: &str, default: &str) -> String {
	env::var(name).unwrap_or_else(|_| default.to_owned())
}

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;
	tracing_subscriber::fmt()
		.with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
		.init();

	let base_uri = env::var("OAUTH_BASE_URI").wrap_err("OAUTH_BASE_URI must be set.")?;
	let config = Config {
		skip_body: false,
		oauth2: Some(OAuth2Config {
			base_uri: None,
			token_path: var_or("OAUTH_TOKEN_PATH", "/api/oauth"),
			client_id: env::var("OAUTH_CLIENT_ID").wrap_err("OAUTH_CLIENT_ID must be set.")?,
			client_secret: env::var("OAUTH_CLIENT_SECRET")
				.wrap_err("OAUTH_CLIENT_SECRET must be set.")?
				.into(),
			retry_forbidden: env::var("OAUTH_RETRY_FORBIDDEN").is_ok(),
		}),
		..Config::new(base_uri)
	};

	tracing::info!(config = %serde_json::to_string(&config)?, "loaded config");

	let client = config.new_client_with_trippers(Arc::new(TracingLogger))?;
	let body = client.send_json(Method::GET, &var_or("OAUTH_TEST_PATH", "/api/session"), None).await?;

	println!("{}", String::from_utf8_lossy(&body));

	Ok(())
}
