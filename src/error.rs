//! Crate-level error types shared across trippers, transports, and the client facade.

// self
use crate::_prelude::*;

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Transport failure (DNS, TCP, TLS, I/O); never retried by the trippers.
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// The OAuth2 token endpoint could not produce a bearer token.
	///
	/// Shared between every caller that was waiting on the same refresh.
	#[error(transparent)]
	Refresh(Arc<RefreshError>),
	/// The status tripper rejected a non-2xx response.
	#[error(transparent)]
	Status(#[from] StatusError),
	/// A request or response body could not be read.
	#[error(transparent)]
	Body(#[from] BodyError),
	/// The tripper chain is not fully linked.
	#[error(transparent)]
	Chain(#[from] ChainError),

	/// Request target could not be constructed from the base URI and path.
	#[error("Unable to build {method} request to {uri}.")]
	Request {
		/// HTTP method of the failed request.
		method: http::Method,
		/// Concatenated base URI and path.
		uri: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// A request sent through the client facade failed.
	#[error("HTTP {method} request to {base_uri} {path} failed.")]
	Send {
		/// HTTP method of the failed request.
		method: http::Method,
		/// Client base URI.
		base_uri: String,
		/// Request path appended to the base URI.
		path: String,
		/// Failure surfaced by the chain.
		#[source]
		source: Box<Error>,
	},
	/// Request object could not be encoded as JSON.
	#[error("Failed to encode request object as JSON.")]
	Encode {
		/// Underlying serialization failure.
		#[source]
		source: serde_json::Error,
	},
	/// Response body could not be decoded into the requested type.
	#[error("Failed to decode response into {target}.")]
	Decode {
		/// Name of the requested type.
		target: &'static str,
		/// Structured decoding failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
}

impl From<RefreshError> for Error {
	fn from(e: RefreshError) -> Self {
		Self::Refresh(Arc::new(e))
	}
}
impl From<Arc<RefreshError>> for Error {
	fn from(e: Arc<RefreshError>) -> Self {
		Self::Refresh(e)
	}
}

/// Configuration and validation failures.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// A configured URI is invalid.
	#[error("Configured {field} `{value}` is not a valid URI.")]
	InvalidUri {
		/// Config field holding the URI.
		field: &'static str,
		/// Offending value.
		value: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// A configured header name is invalid.
	#[error("Header name `{name}` is invalid.")]
	InvalidHeaderName {
		/// Offending header name.
		name: String,
		/// Underlying parsing failure.
		#[source]
		source: http::header::InvalidHeaderName,
	},
	/// A configured header value is invalid.
	#[error("Value for header `{name}` is invalid.")]
	InvalidHeaderValue {
		/// Header the value belongs to.
		name: String,
		/// Underlying parsing failure.
		#[source]
		source: http::header::InvalidHeaderValue,
	},
	/// A required OAuth2 setting is empty.
	#[error("OAuth2 setting `{field}` must not be empty.")]
	MissingOAuth2Field {
		/// Name of the empty setting.
		field: &'static str,
	},
	/// Basic auth and OAuth2 would both set the Authorization header.
	#[error("Basic auth and OAuth2 cannot be configured together.")]
	ConflictingAuth,
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Transport-level failures.
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling {uri}.")]
	Network {
		/// Target of the failed round trip.
		uri: String,
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(uri: impl Display, src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { uri: uri.to_string(), source: Box::new(src) }
	}
}

/// Failures raised while obtaining a bearer token from the token endpoint.
///
/// None of these commit anything to the credential cache.
#[derive(Debug, ThisError)]
pub enum RefreshError {
	/// Token request body could not be encoded.
	#[error("Failed to encode token request.")]
	Encode(#[source] serde_json::Error),
	/// The round trip to the token endpoint failed.
	#[error("Token request to {uri} failed.")]
	Request {
		/// Token endpoint.
		uri: String,
		/// Failure surfaced by the wrapped segment.
		#[source]
		source: Box<Error>,
	},
	/// Token endpoint answered with a status other than 200.
	#[error("Token request to {uri} returned {status}: {body}.")]
	Status {
		/// Token endpoint.
		uri: String,
		/// HTTP status code.
		status: u16,
		/// Response body text.
		body: String,
	},
	/// Token endpoint answered with malformed JSON.
	#[error("Failed to decode token response from {uri}.")]
	Parse {
		/// Token endpoint.
		uri: String,
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
	/// Token endpoint response has no usable `access_token`.
	#[error("Token response from {uri} is missing access_token.")]
	MissingAccessToken {
		/// Token endpoint.
		uri: String,
	},
	/// Token endpoint issued an `access_token` that cannot be sent in a header.
	#[error("Token response from {uri} carries an access_token unusable as a header value.")]
	InvalidAccessToken {
		/// Token endpoint.
		uri: String,
	},
}

/// Failures raised by the status tripper.
#[derive(Debug, ThisError)]
pub enum StatusError {
	/// Response status is outside of the 2xx range.
	#[error("Unexpected status code {status} with body: {body}")]
	Unexpected {
		/// HTTP status code.
		status: u16,
		/// Response body text.
		body: String,
	},
	/// The diagnostic body could not be read.
	#[error("Failed to read body after unexpected status code {status}.")]
	BodyRead {
		/// HTTP status code.
		status: u16,
		/// Underlying read failure.
		#[source]
		source: BodyError,
	},
}
impl StatusError {
	/// Returns the status code that triggered the failure.
	pub fn status(&self) -> u16 {
		match self {
			Self::Unexpected { status, .. } | Self::BodyRead { status, .. } => *status,
		}
	}
}

/// Body materialization failures.
#[derive(Debug, ThisError)]
pub enum BodyError {
	/// Reading the body stream failed.
	#[error("Failed to read {context} body.")]
	Read {
		/// Which body was being read (e.g. `request`, `response`).
		context: &'static str,
		/// Underlying stream failure.
		#[source]
		source: BoxError,
	},
}

/// Chain wiring failures.
#[derive(Debug, ThisError)]
pub enum ChainError {
	/// A tripper was asked to round trip before being wrapped around a successor.
	#[error("{tripper} tripper has not been wrapped around a transport.")]
	Unwrapped {
		/// Name of the unwrapped tripper.
		tripper: &'static str,
	},
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn send_error_keeps_original_cause() {
		let cause = Error::from(StatusError::Unexpected { status: 404, body: "nope".into() });
		let err = Error::Send {
			method: http::Method::GET,
			base_uri: "https://boxworld.org".into(),
			path: "/cardboard".into(),
			source: Box::new(cause),
		};

		assert_eq!(err.to_string(), "HTTP GET request to https://boxworld.org /cardboard failed.");

		let source =
			StdError::source(&err).expect("Send errors should expose the chain failure as source.");

		assert_eq!(source.to_string(), "Unexpected status code 404 with body: nope");
	}

	#[test]
	fn status_error_reports_status() {
		let err = StatusError::BodyRead {
			status: 500,
			source: BodyError::Read {
				context: "response",
				source: Box::new(std::io::Error::other("reset")),
			},
		};

		assert_eq!(err.status(), 500);
		assert!(StdError::source(&err).is_some());
	}
}
