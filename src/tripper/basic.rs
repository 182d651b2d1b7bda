//! Tripper adding a static basic-auth `Authorization` header.

// crates.io
use base64::{Engine, engine::general_purpose::STANDARD};
use http::{HeaderValue, header::AUTHORIZATION};
// self
use crate::{
	_prelude::*,
	message::Request,
	obs::TripSpan,
	tripper::{Next, RoundTrip, TripFuture, Tripper},
};

/// Sets `Authorization: Basic base64(user:pass)` on every request.
#[derive(Debug)]
pub struct BasicTripper {
	auth: HeaderValue,
	next: Next,
}
impl BasicTripper {
	/// Encodes the credentials once, up front.
	pub fn new(username: &str, password: &str) -> Self {
		let encoded = STANDARD.encode(format!("{username}:{password}"));
		// Base64 output is always a valid header value.
		let mut auth = HeaderValue::from_str(&format!("Basic {encoded}"))
			.unwrap_or_else(|_| HeaderValue::from_static("Basic"));

		auth.set_sensitive(true);

		Self { auth, next: Next::unwrapped("basic") }
	}
}
impl RoundTrip for BasicTripper {
	fn round_trip(&self, mut request: Request) -> TripFuture<'_> {
		TripSpan::new("basic", &request).trace(Box::pin(async move {
			let next = self.next.get()?;

			request.headers.insert(AUTHORIZATION, self.auth.clone());

			next.round_trip(request).await
		}))
	}
}
impl Tripper for BasicTripper {
	fn wrap(&mut self, next: Box<dyn RoundTrip>) {
		self.next.set(next);
	}
}
