//! Transports sitting at the innermost end of a chain.
//!
//! A transport performs the actual I/O. It reports network failures as
//! [`TransportError`](crate::error::TransportError) and never through a status code; any other status
//! the server answers with is returned as a response.

// std
#[cfg(feature = "reqwest")] use std::ops::Deref;
use std::time::Duration as StdDuration;
// crates.io
#[cfg(feature = "reqwest")] use reqwest::redirect::Policy;
// self
#[cfg(feature = "reqwest")]
use crate::{
	_prelude::*,
	error::{ConfigError, TransportError},
	message::{Body, Request, Response},
	tripper::{RoundTrip, TripFuture},
};

/// Timeouts and TLS settings used to build a [`ReqwestTransport`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TransportOptions {
	/// Overall request timeout.
	pub timeout: StdDuration,
	/// Connect timeout.
	pub connect_timeout: StdDuration,
	/// Skips TLS certificate verification.
	pub skip_verify: bool,
}
impl Default for TransportOptions {
	fn default() -> Self {
		Self {
			timeout: StdDuration::from_secs(60),
			connect_timeout: StdDuration::from_secs(10),
			skip_verify: false,
		}
	}
}

/// Thin wrapper around [`ReqwestClient`] implementing the transport contract.
///
/// Redirects are refused: a `3xx` carrying a `Location` fails the round trip with a transport
/// error instead of being followed. Configure any custom
/// [`ReqwestClient`] passed to [`ReqwestTransport::with_client`] the same way.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug)]
pub struct ReqwestTransport(pub ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestTransport {
	/// Builds a client from `options`.
	pub fn new(options: TransportOptions) -> Result<Self, ConfigError> {
		let client = ReqwestClient::builder()
			.redirect(Policy::custom(|attempt| {
				let refused = format!("Refusing to follow redirect to {}.", attempt.url());

				attempt.error(refused)
			}))
			.timeout(options.timeout)
			.connect_timeout(options.connect_timeout)
			.danger_accept_invalid_certs(options.skip_verify)
			.build()?;

		Ok(Self(client))
	}

	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}
}
#[cfg(feature = "reqwest")]
impl AsRef<ReqwestClient> for ReqwestTransport {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl Deref for ReqwestTransport {
	type Target = ReqwestClient;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl RoundTrip for ReqwestTransport {
	fn round_trip(&self, request: Request) -> TripFuture<'_> {
		Box::pin(async move {
			let head = request.head();
			let mut builder =
				self.0.request(request.method, request.url).headers(request.headers);

			if let Some(body) = request.body {
				builder = builder.body(match body.as_bytes() {
					Some(bytes) => reqwest::Body::from(bytes.clone()),
					None => reqwest::Body::wrap_stream(body.into_stream()),
				});
			}

			let response =
				builder.send().await.map_err(|e| TransportError::network(&head.url, e))?;
			let status = response.status();
			let headers = response.headers().clone();

			Ok(Response::new(status, head)
				.with_headers(headers)
				.with_body(Body::from_stream(response.bytes_stream())))
		})
	}
}

#[cfg(all(test, feature = "reqwest"))]
mod tests {
	// self
	use super::*;

	#[test]
	fn builds_from_default_options() {
		let transport =
			ReqwestTransport::new(TransportOptions::default()).expect("Transport should build.");

		assert!(format!("{transport:?}").starts_with("ReqwestTransport"));
	}
}
