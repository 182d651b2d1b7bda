//! Serde-friendly client configuration and chain assembly.
//!
//! A [`Config`] is usually deserialized from the application's own config source. It validates
//! eagerly, builds the transport, and installs the standard trippers, innermost to outermost:
//! OAuth2 (when configured), basic auth (when user and pass are set), status, log.

// std
use std::time::Duration as StdDuration;
// crates.io
use http::{HeaderMap, HeaderName, HeaderValue};
// self
#[cfg(feature = "reqwest")] use crate::transport::ReqwestTransport;
use crate::{
	_prelude::*,
	client::Client,
	error::ConfigError,
	logger::Logger,
	redact::Redact,
	transport::TransportOptions,
	tripper::{
		BasicTripper, Chain, LogTripper, OAuth2Identity, OAuth2Tripper, RejectionPolicy, RoundTrip,
		StatusTripper, Tripper,
	},
};

fn default_timeout_secs() -> u64 {
	60
}

fn default_timeout_short_secs() -> u64 {
	10
}

/// Client configuration.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Config {
	/// Scheme, host, optional port and path prefix every request path is appended to.
	pub base_uri: String,
	/// Overall request timeout in seconds.
	#[serde(default = "default_timeout_secs")]
	pub timeout_secs: u64,
	/// Connect timeout in seconds.
	#[serde(default = "default_timeout_short_secs")]
	pub timeout_short_secs: u64,
	/// Flat `name, value, name, value, ...` header pairs sent with every request; an odd trailing
	/// entry is ignored.
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub headers: Vec<String>,
	/// Skips TLS certificate verification. Development only.
	#[serde(default)]
	pub skip_verify: bool,
	/// Basic auth username.
	#[serde(default, skip_serializing_if = "String::is_empty")]
	pub user: String,
	/// Basic auth password.
	#[serde(default)]
	pub pass: Redact,
	/// Header names redacted from request logs in addition to `Authorization`.
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub redact_headers: Vec<String>,
	/// Skips logging of request and response bodies.
	#[serde(default)]
	pub skip_body: bool,
	/// OAuth2 client-credentials settings.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub oauth2: Option<OAuth2Config>,
}
impl Config {
	/// Creates a config for `base_uri` with every other setting at its default.
	pub fn new(base_uri: impl Into<String>) -> Self {
		Self {
			base_uri: base_uri.into(),
			timeout_secs: default_timeout_secs(),
			timeout_short_secs: default_timeout_short_secs(),
			headers: Vec::new(),
			skip_verify: false,
			user: String::new(),
			pass: Redact::default(),
			redact_headers: Vec::new(),
			skip_body: false,
			oauth2: None,
		}
	}

	/// Checks URIs, headers, and auth settings without building anything.
	pub fn validate(&self) -> Result<(), ConfigError> {
		parse_uri("base_uri", &self.base_uri)?;
		self.default_headers()?;

		if let Some(oauth2) = &self.oauth2 {
			if self.basic_auth().is_some() {
				return Err(ConfigError::ConflictingAuth);
			}

			oauth2.validate(&self.base_uri)?;
		}

		Ok(())
	}

	/// Returns the configured header pairs as a map.
	pub fn default_headers(&self) -> Result<HeaderMap, ConfigError> {
		let mut headers = HeaderMap::new();

		for pair in self.headers.chunks_exact(2) {
			let name = HeaderName::from_bytes(pair[0].as_bytes()).map_err(|source| {
				ConfigError::InvalidHeaderName { name: pair[0].clone(), source }
			})?;
			let value = HeaderValue::from_str(&pair[1]).map_err(|source| {
				ConfigError::InvalidHeaderValue { name: pair[0].clone(), source }
			})?;

			headers.insert(name, value);
		}

		Ok(headers)
	}

	/// Returns the transport timeouts and TLS settings.
	pub fn transport_options(&self) -> TransportOptions {
		TransportOptions {
			timeout: StdDuration::from_secs(self.timeout_secs),
			connect_timeout: StdDuration::from_secs(self.timeout_short_secs),
			skip_verify: self.skip_verify,
		}
	}

	/// Builds the reqwest transport.
	#[cfg(feature = "reqwest")]
	pub fn build_transport(&self) -> Result<ReqwestTransport, ConfigError> {
		ReqwestTransport::new(self.transport_options())
	}

	/// Builds a client without any tripper.
	#[cfg(feature = "reqwest")]
	pub fn new_client(&self) -> Result<Client> {
		self.client_on(self.build_transport()?)
	}

	/// Builds a client with the standard trippers logging to `logger`.
	#[cfg(feature = "reqwest")]
	pub fn new_client_with_trippers(&self, logger: Arc<dyn Logger>) -> Result<Client> {
		self.client_with_trippers_on(self.build_transport()?, logger)
	}

	/// Builds a client without any tripper on top of `transport`.
	pub fn client_on(&self, transport: impl 'static + RoundTrip) -> Result<Client> {
		self.validate()?;

		Ok(Client::new(&self.base_uri, transport).with_headers(self.default_headers()?))
	}

	/// Builds a client with the standard trippers on top of `transport`.
	pub fn client_with_trippers_on(
		&self,
		transport: impl 'static + RoundTrip,
		logger: Arc<dyn Logger>,
	) -> Result<Client> {
		self.validate()?;

		let mut trippers: Vec<(&'static str, Box<dyn Tripper>)> = Vec::new();

		if let Some(oauth2) = self.oauth2_tripper(logger.clone()) {
			trippers.push(("oauth2", Box::new(oauth2)));
		}
		if let Some((user, pass)) = self.basic_auth() {
			trippers.push(("basic", Box::new(BasicTripper::new(user, pass.expose()))));
		}

		trippers.push(("status", Box::new(StatusTripper::new())));
		trippers.push((
			"log",
			Box::new(LogTripper::new(logger, &self.redact_headers, self.skip_body)),
		));

		Ok(Client::with_chain(&self.base_uri, Chain::build(transport, trippers))
			.with_headers(self.default_headers()?))
	}

	/// Builds the OAuth2 tripper, if configured.
	pub fn oauth2_tripper(&self, logger: Arc<dyn Logger>) -> Option<OAuth2Tripper> {
		self.oauth2.as_ref().map(|oauth2| {
			OAuth2Tripper::new(oauth2.identity(&self.base_uri))
				.with_policy(oauth2.policy())
				.with_logger(logger)
		})
	}

	fn basic_auth(&self) -> Option<(&str, &Redact)> {
		(!self.user.is_empty() && !self.pass.is_empty()).then_some((self.user.as_str(), &self.pass))
	}
}

/// OAuth2 client-credentials settings.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct OAuth2Config {
	/// Token endpoint base URI; defaults to [`Config::base_uri`].
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub base_uri: Option<String>,
	/// Token endpoint path appended to the base URI.
	pub token_path: String,
	/// Client identifier.
	pub client_id: String,
	/// Client secret.
	pub client_secret: Redact,
	/// Also treats `403 Forbidden` as a rejected credential.
	#[serde(default)]
	pub retry_forbidden: bool,
}
impl OAuth2Config {
	/// Returns the identity, resolving the token endpoint against `fallback_base_uri`.
	pub fn identity(&self, fallback_base_uri: &str) -> OAuth2Identity {
		OAuth2Identity::new(
			self.base_uri.as_deref().unwrap_or(fallback_base_uri),
			&self.token_path,
			&self.client_id,
			self.client_secret.clone(),
		)
	}

	/// Returns the rejection policy implied by `retry_forbidden`.
	pub fn policy(&self) -> RejectionPolicy {
		if self.retry_forbidden {
			RejectionPolicy::UnauthorizedOrForbidden
		} else {
			RejectionPolicy::Unauthorized
		}
	}

	fn validate(&self, fallback_base_uri: &str) -> Result<(), ConfigError> {
		if self.token_path.is_empty() {
			return Err(ConfigError::MissingOAuth2Field { field: "token_path" });
		}
		if self.client_id.is_empty() {
			return Err(ConfigError::MissingOAuth2Field { field: "client_id" });
		}
		if self.client_secret.is_empty() {
			return Err(ConfigError::MissingOAuth2Field { field: "client_secret" });
		}

		parse_uri("oauth2.token_uri", &self.identity(fallback_base_uri).token_uri())?;

		Ok(())
	}
}

fn parse_uri(field: &'static str, value: &str) -> Result<Url, ConfigError> {
	Url::parse(value).map_err(|source| ConfigError::InvalidUri {
		field,
		value: value.to_owned(),
		source,
	})
}
