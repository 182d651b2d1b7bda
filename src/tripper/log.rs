//! Tripper logging every request and response as structured fields.

// std
use std::collections::HashSet;
// crates.io
use http::{HeaderMap, header::AUTHORIZATION};
use rand::{Rng, distr::Alphanumeric};
use serde_json::{Map, Value};
// self
use crate::{
	_prelude::*,
	error::BodyError,
	logger::{Field, Logger},
	message::{Body, Request, Response},
	obs::TripSpan,
	redact::REDACTED,
	tripper::{Next, RoundTrip, TripFuture, Tripper},
};

const REQUEST_ID_LEN: usize = 7;

/// Logs `sending request` / `received response` pairs correlated by a `request_id`.
pub struct LogTripper {
	logger: Arc<dyn Logger>,
	redact: HashSet<String>,
	skip_body: bool,
	next: Next,
}
impl LogTripper {
	/// Creates a log tripper; `Authorization` is always redacted in addition to `redact_headers`.
	pub fn new<I, S>(logger: Arc<dyn Logger>, redact_headers: I, skip_body: bool) -> Self
	where
		I: IntoIterator<Item = S>,
		S: AsRef<str>,
	{
		let mut redact = redact_headers
			.into_iter()
			.map(|name| name.as_ref().to_ascii_lowercase())
			.collect::<HashSet<_>>();

		redact.insert(AUTHORIZATION.as_str().to_owned());

		Self { logger, redact, skip_body, next: Next::unwrapped("log") }
	}

	fn request_fields(&self, request: &Request, body: Option<Value>) -> Vec<Field> {
		let query = request.url.query_pairs().fold(Map::new(), |mut query, (key, value)| {
			push_value(&mut query, key.into_owned(), value.into_owned());

			query
		});
		let mut fields = vec![
			Field::new("method", request.method.as_str()),
			Field::new("scheme", request.url.scheme()),
			Field::new("host", request.url.host_str().unwrap_or_default()),
			Field::new("path", request.url.path()),
			Field::new("headers", self.headers(&request.headers)),
			Field::new("query", query),
		];

		fields.extend(body.map(|body| Field::new("body", body)));

		fields
	}

	fn response_fields(
		&self,
		response: &Response,
		started_at: OffsetDateTime,
		body: Option<Value>,
	) -> Vec<Field> {
		let elapsed = OffsetDateTime::now_utc() - started_at;
		let mut fields = vec![
			Field::new("status", response.status.as_u16()),
			Field::new("headers", self.headers(&response.headers)),
			Field::new("elapsed", elapsed.to_string()),
			Field::new("path", response.request.url.path()),
		];

		fields.extend(body.map(|body| Field::new("body", body)));

		fields
	}

	/// Snapshot of `headers` with every redacted name's values replaced by the marker.
	fn headers(&self, headers: &HeaderMap) -> Value {
		headers.iter().fold(Map::new(), |mut snapshot, (name, value)| {
			let value = if self.redact.contains(name.as_str()) {
				REDACTED.to_owned()
			} else {
				String::from_utf8_lossy(value.as_bytes()).into_owned()
			};

			push_value(&mut snapshot, name.as_str().to_owned(), value);

			snapshot
		})
		.into()
	}

	async fn body_field(&self, body: Option<&mut Body>, context: &'static str) -> Option<Value> {
		if self.skip_body {
			return None;
		}

		let text = match body {
			Some(body) => read_text(body, context).await,
			None => String::new(),
		};

		Some(text.into())
	}
}
impl Debug for LogTripper {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("LogTripper")
			.field("redact", &self.redact)
			.field("skip_body", &self.skip_body)
			.field("next", &self.next)
			.finish()
	}
}
impl RoundTrip for LogTripper {
	fn round_trip(&self, mut request: Request) -> TripFuture<'_> {
		TripSpan::new("log", &request).trace(Box::pin(async move {
			let next = self.next.get()?;
			let started_at = OffsetDateTime::now_utc();
			let ctx = self
				.logger
				.with_fields(&request.context, vec![Field::new("request_id", request_id())]);

			request.context = ctx.clone();

			let body = self.body_field(request.body.as_mut(), "request").await;

			self.logger.info(&ctx, "sending request", &self.request_fields(&request, body));

			let mut response = match next.round_trip(request).await {
				Ok(response) => response,
				Err(e) => {
					self.logger.error(&ctx, "request failed", &e, &[]);

					return Err(e);
				},
			};
			let body = self.body_field(Some(&mut response.body), "response").await;

			self.logger.info(
				&ctx,
				"received response",
				&self.response_fields(&response, started_at, body),
			);

			Ok(response)
		}))
	}
}
impl Tripper for LogTripper {
	fn wrap(&mut self, next: Box<dyn RoundTrip>) {
		self.next.set(next);
	}
}

fn request_id() -> String {
	rand::rng().sample_iter(&Alphanumeric).take(REQUEST_ID_LEN).map(char::from).collect()
}

fn push_value(map: &mut Map<String, Value>, key: String, value: String) {
	match map.entry(key).or_insert_with(|| Value::Array(Vec::new())) {
		Value::Array(values) => values.push(value.into()),
		other => *other = Value::Array(vec![value.into()]),
	}
}

async fn read_text(body: &mut Body, context: &'static str) -> String {
	match body.buffer(context).await {
		Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
		Err(BodyError::Read { source, .. }) => format!("error: {source}"),
	}
}
