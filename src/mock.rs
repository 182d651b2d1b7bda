//! Scripted in-process transport for tests and demos.
//!
//! [`MockTransport`] answers requests from an ordered list of [`MockRule`]s and records every
//! request it receives (headers and fully read body included), so tests can assert on exactly what
//! reached the wire.

// std
use std::collections::VecDeque;
// crates.io
use http::{HeaderMap, HeaderValue, Method, StatusCode, header::CONTENT_TYPE};
// self
use crate::{
	_prelude::*,
	error::TransportError,
	message::{Request, Response},
	tripper::{RoundTrip, TripFuture},
};

/// Request captured by [`MockTransport`].
#[derive(Clone, Debug)]
pub struct RecordedRequest {
	/// HTTP method.
	pub method: Method,
	/// Target URI.
	pub url: Url,
	/// Headers as they reached the transport.
	pub headers: HeaderMap,
	/// Body bytes (empty when the request had none).
	pub body: Bytes,
}
impl RecordedRequest {
	/// Returns the header value as text, if present and printable.
	pub fn header(&self, name: &str) -> Option<&str> {
		self.headers.get(name).and_then(|value| value.to_str().ok())
	}

	/// Returns the body as lossy UTF-8 text.
	pub fn body_text(&self) -> String {
		String::from_utf8_lossy(&self.body).into_owned()
	}

	/// Returns the URI path.
	pub fn path(&self) -> &str {
		self.url.path()
	}
}

/// Outcome produced by a [`MockRule`].
#[derive(Clone, Debug)]
enum MockReply {
	Respond { status: u16, body: Bytes },
	Fail(String),
	Hang,
}

/// Matching rule plus the replies it hands out.
///
/// Replies are used in order; the last one repeats forever.
#[derive(Clone, Debug)]
pub struct MockRule {
	method: Option<Method>,
	path: Option<String>,
	replies: VecDeque<MockReply>,
}
impl MockRule {
	/// Matches every request.
	pub fn any() -> Self {
		Self { method: None, path: None, replies: VecDeque::new() }
	}

	/// Matches requests whose URI path equals `path`.
	pub fn path(path: impl Into<String>) -> Self {
		Self { path: Some(path.into()), ..Self::any() }
	}

	/// Restricts the rule to `method`.
	pub fn method(mut self, method: Method) -> Self {
		self.method = Some(method);

		self
	}

	/// Queues a JSON response.
	pub fn respond(mut self, status: u16, body: impl Into<Bytes>) -> Self {
		self.replies.push_back(MockReply::Respond { status, body: body.into() });

		self
	}

	/// Queues a transport failure.
	pub fn fail(mut self, message: impl Into<String>) -> Self {
		self.replies.push_back(MockReply::Fail(message.into()));

		self
	}

	/// Queues a round trip that never completes.
	pub fn hang(mut self) -> Self {
		self.replies.push_back(MockReply::Hang);

		self
	}

	fn matches(&self, request: &RecordedRequest) -> bool {
		self.method.as_ref().is_none_or(|method| *method == request.method)
			&& self.path.as_deref().is_none_or(|path| path == request.url.path())
	}

	fn next_reply(&mut self) -> MockReply {
		if self.replies.len() > 1 {
			self.replies.pop_front().unwrap_or(MockReply::Respond { status: 200, body: Bytes::new() })
		} else {
			self.replies
				.front()
				.cloned()
				.unwrap_or(MockReply::Respond { status: 200, body: Bytes::new() })
		}
	}
}

#[derive(Debug, Default)]
struct MockState {
	rules: Vec<MockRule>,
	fallback: Option<MockRule>,
	requests: Vec<RecordedRequest>,
}

/// Cloneable handle to a scripted transport; clones share rules and recorded requests.
///
/// Requests matching no rule are answered with `404`.
#[derive(Clone, Debug, Default)]
pub struct MockTransport(Arc<Mutex<MockState>>);
impl MockTransport {
	/// Adds a rule; earlier rules win.
	pub fn with_rule(self, rule: MockRule) -> Self {
		self.0.lock().rules.push(rule);

		self
	}

	/// Sets the rule consulted when no other rule matches.
	pub fn with_fallback(self, rule: MockRule) -> Self {
		self.0.lock().fallback = Some(rule);

		self
	}

	/// Returns every request received so far.
	pub fn requests(&self) -> Vec<RecordedRequest> {
		self.0.lock().requests.clone()
	}

	/// Counts requests received for `path`.
	pub fn hits(&self, path: &str) -> usize {
		self.0.lock().requests.iter().filter(|request| request.url.path() == path).count()
	}

	/// Returns the last request received for `path`.
	pub fn last(&self, path: &str) -> Option<RecordedRequest> {
		self.0.lock().requests.iter().rev().find(|request| request.url.path() == path).cloned()
	}

	fn reply_for(&self, recorded: RecordedRequest) -> Option<MockReply> {
		let mut state = self.0.lock();
		let reply = {
			let MockState { rules, fallback, .. } = &mut *state;

			rules
				.iter_mut()
				.find(|rule| rule.matches(&recorded))
				.or_else(|| fallback.as_mut().filter(|rule| rule.matches(&recorded)))
				.map(MockRule::next_reply)
		};

		state.requests.push(recorded);

		reply
	}
}
impl RoundTrip for MockTransport {
	fn round_trip(&self, request: Request) -> TripFuture<'_> {
		Box::pin(async move {
			let head = request.head();
			let body = match request.body {
				Some(body) => body.collect("request").await?,
				None => Bytes::new(),
			};
			let recorded = RecordedRequest {
				method: request.method,
				url: request.url,
				headers: request.headers,
				body,
			};

			match self.reply_for(recorded) {
				Some(MockReply::Respond { status, body }) => {
					let status = StatusCode::from_u16(status).unwrap_or(StatusCode::OK);
					let mut headers = HeaderMap::new();

					headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

					Ok(Response::new(status, head).with_headers(headers).with_body(body))
				},
				Some(MockReply::Fail(message)) =>
					Err(TransportError::network(&head.url, std::io::Error::other(message)).into()),
				Some(MockReply::Hang) => futures_util::future::pending().await,
				None => Ok(Response::new(StatusCode::NOT_FOUND, head)),
			}
		})
	}
}
