// self
use crate::{message::Request, tripper::TripFuture};

/// Span covering one tripper's share of a round trip.
///
/// Opened with the tripper name, method, and path; the response status or the failure is recorded
/// once the wrapped trip settles. Compiles to a passthrough without the `tracing` feature.
#[derive(Clone, Debug)]
pub struct TripSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl TripSpan {
	/// Opens a span for `tripper` handling `request`.
	pub fn new(tripper: &'static str, request: &Request) -> Self {
		#[cfg(feature = "tracing")]
		{
			let span = tracing::info_span!(
				"tripperware.trip",
				tripper,
				method = %request.method,
				path = request.url.path(),
				status = tracing::field::Empty,
				error = tracing::field::Empty,
			);

			Self { span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (tripper, request);

			Self {}
		}
	}

	/// Runs `trip` inside the span and records how it ended.
	pub fn trace<'a>(self, trip: TripFuture<'a>) -> TripFuture<'a> {
		#[cfg(feature = "tracing")]
		{
			use tracing::Instrument;

			let span = self.span;

			Box::pin(async move {
				let outcome = trip.instrument(span.clone()).await;

				match &outcome {
					Ok(response) => {
						span.record("status", response.status.as_u16());
					},
					Err(e) => {
						span.record("error", tracing::field::display(e));
					},
				}

				outcome
			})
		}
		#[cfg(not(feature = "tracing"))]
		{
			trip
		}
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use http::{Method, StatusCode};
	// self
	use super::*;
	use crate::{_prelude::*, error::ChainError, message::Response};

	fn request() -> Request {
		Request::new(
			Method::GET,
			Url::parse("https://boxworld.org/cardboard").expect("Fixture URL should parse."),
		)
	}

	#[tokio::test]
	async fn trace_hands_back_the_response() {
		let request = request();
		let head = request.head();
		let trip = async move { Ok::<_, Error>(Response::new(StatusCode::ACCEPTED, head)) };
		let response = TripSpan::new("status", &request)
			.trace(Box::pin(trip))
			.await
			.expect("Traced trip should succeed.");

		assert_eq!(response.status, StatusCode::ACCEPTED);
		assert_eq!(response.request.url.path(), "/cardboard");
	}

	#[tokio::test]
	async fn trace_hands_back_the_failure() {
		let trip = async { Err::<Response, _>(Error::from(ChainError::Unwrapped { tripper: "log" })) };
		let err = TripSpan::new("log", &request())
			.trace(Box::pin(trip))
			.await
			.expect_err("Traced failure should surface.");

		assert!(matches!(err, Error::Chain(ChainError::Unwrapped { tripper: "log" })));
	}
}
