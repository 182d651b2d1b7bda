//! Tripper rejecting every response outside of the 2xx range.

// self
use crate::{
	_prelude::*,
	error::StatusError,
	message::Request,
	obs::TripSpan,
	tripper::{Next, RoundTrip, TripFuture, Tripper},
};

/// Turns non-2xx responses into [`StatusError::Unexpected`], carrying the body text.
#[derive(Debug)]
pub struct StatusTripper {
	next: Next,
}
impl StatusTripper {
	/// Creates an unwrapped status tripper.
	pub const fn new() -> Self {
		Self { next: Next::unwrapped("status") }
	}
}
impl Default for StatusTripper {
	fn default() -> Self {
		Self::new()
	}
}
impl RoundTrip for StatusTripper {
	fn round_trip(&self, request: Request) -> TripFuture<'_> {
		TripSpan::new("status", &request).trace(Box::pin(async move {
			let response = self.next.get()?.round_trip(request).await?;

			if response.status.is_success() {
				return Ok(response);
			}

			let status = response.status.as_u16();
			let body = response
				.body
				.collect("response")
				.await
				.map_err(|source| StatusError::BodyRead { status, source })?;

			Err(StatusError::Unexpected { status, body: String::from_utf8_lossy(&body).into_owned() }
				.into())
		}))
	}
}
impl Tripper for StatusTripper {
	fn wrap(&mut self, next: Box<dyn RoundTrip>) {
		self.next.set(next);
	}
}
