//! Composable HTTP client tripperware: stack OAuth 2.0 client credentials, basic auth, status
//! validation, and structured request logging around any transport.
//!
//! A [`tripper::Tripper`] wraps the next [`tripper::RoundTrip`] in the chain and may mutate the
//! request on the way in and inspect the response on the way out. [`client::Client`] owns the
//! outermost unit and adds URI/header/JSON conveniences on top.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod client;
pub mod config;
pub mod error;
pub mod logger;
pub mod message;
pub mod mock;
pub mod obs;
pub mod redact;
pub mod transport;
pub mod tripper;
#[cfg(any(test, feature = "test"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for integration tests; enabled via `cfg(test)` or the
	//! `test` crate feature.

	pub use crate::_prelude::*;

	// self
	use crate::{
		logger::{Logger, MemoryLogger},
		mock::{MockRule, MockTransport},
		tripper::{Chain, OAuth2Identity, OAuth2Tripper},
	};

	/// Token path served by [`token_transport`].
	pub const TEST_TOKEN_PATH: &str = "/oauth/token";
	/// Base URI shared by the mock transport fixtures.
	pub const TEST_BASE_URI: &str = "https://api.example.com";

	/// Builds the OAuth2 identity used across tests.
	pub fn test_identity() -> OAuth2Identity {
		OAuth2Identity::new(TEST_BASE_URI, TEST_TOKEN_PATH, "my-client", "my-secret")
	}

	/// Builds a mock transport whose token endpoint issues `token` and whose API endpoints answer
	/// with `api_status`.
	pub fn token_transport(token: &str, api_status: u16) -> MockTransport {
		MockTransport::default()
			.with_rule(MockRule::path(TEST_TOKEN_PATH).respond(
				200,
				format!("{{\"access_token\":\"{token}\",\"token_type\":\"bearer\"}}"),
			))
			.with_fallback(MockRule::any().respond(api_status, "{\"data\":\"ok\"}"))
	}

	/// Wraps `transport` with an [`OAuth2Tripper`] logging into a fresh [`MemoryLogger`].
	pub fn oauth2_chain(
		transport: MockTransport,
		tripper: OAuth2Tripper,
	) -> (Chain, Arc<MemoryLogger>) {
		let logger = Arc::new(MemoryLogger::default());
		let tripper = tripper.with_logger(logger.clone() as Arc<dyn Logger>);

		(Chain::new(transport).with(tripper), logger)
	}
}

mod _prelude {
	pub use std::{
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		sync::Arc,
	};

	pub use async_lock::RwLock as AsyncRwLock;
	pub use bytes::Bytes;
	pub use parking_lot::Mutex;
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::OffsetDateTime;
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

pub use http;
#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(test)] use {color_eyre as _, httpmock as _, tracing_subscriber as _};
