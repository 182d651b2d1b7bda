//! Request, response, and body types flowing through the tripper chain.
//!
//! Bodies start out either buffered ([`Bytes`]) or as a single-consumption stream. Any layer that
//! needs to look at a body calls [`Body::buffer`], which drains the stream once and leaves a
//! buffered copy behind, so every later consumer gets its own fresh view of the same bytes.

// crates.io
use bytes::BytesMut;
use futures_util::{Stream, StreamExt};
use http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
// self
use crate::{_prelude::*, error::BodyError, logger::LogContext};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Single-consumption byte stream backing an unbuffered [`Body`].
pub type BodyStream = Pin<Box<dyn Stream<Item = Result<Bytes, BoxError>> + Send>>;

/// Request or response payload.
pub struct Body(BodyInner);
enum BodyInner {
	Full(Bytes),
	Stream(BodyStream),
}
impl Body {
	/// Creates an empty buffered body.
	pub fn empty() -> Self {
		Self(BodyInner::Full(Bytes::new()))
	}

	/// Wraps a byte stream that can be read once.
	pub fn from_stream<S, E>(stream: S) -> Self
	where
		S: 'static + Send + Stream<Item = Result<Bytes, E>>,
		E: Into<BoxError>,
	{
		Self(BodyInner::Stream(Box::pin(stream.map(|chunk| chunk.map_err(Into::into)))))
	}

	/// Returns the buffered bytes, or `None` while the body is still an unread stream.
	pub fn as_bytes(&self) -> Option<&Bytes> {
		match &self.0 {
			BodyInner::Full(bytes) => Some(bytes),
			BodyInner::Stream(_) => None,
		}
	}

	/// Returns an independent copy when the body is buffered.
	pub fn try_clone(&self) -> Option<Self> {
		self.as_bytes().map(|bytes| Self(BodyInner::Full(bytes.clone())))
	}

	/// Drains the stream (if any) and leaves a buffered copy in place.
	///
	/// On a read failure the body is replaced by a stream replaying the bytes read so far followed
	/// by the same failure, so later consumers still observe it.
	///
	/// `context` names the body in error messages (`request`, `response`, ...).
	pub async fn buffer(&mut self, context: &'static str) -> Result<Bytes, BodyError> {
		let mut stream = match std::mem::replace(&mut self.0, BodyInner::Full(Bytes::new())) {
			BodyInner::Full(bytes) => {
				self.0 = BodyInner::Full(bytes.clone());

				return Ok(bytes);
			},
			BodyInner::Stream(stream) => stream,
		};
		let mut buf = BytesMut::new();

		while let Some(chunk) = stream.next().await {
			match chunk {
				Ok(chunk) => buf.extend_from_slice(&chunk),
				Err(source) => {
					let replay: Vec<Result<Bytes, BoxError>> =
						vec![Ok(buf.freeze()), Err(source.to_string().into())];

					self.0 = BodyInner::Stream(Box::pin(futures_util::stream::iter(replay)));

					return Err(BodyError::Read { context, source });
				},
			}
		}

		let bytes = buf.freeze();

		self.0 = BodyInner::Full(bytes.clone());

		Ok(bytes)
	}

	/// Consumes the body, reading it to the end.
	pub async fn collect(self, context: &'static str) -> Result<Bytes, BodyError> {
		match self.0 {
			BodyInner::Full(bytes) => Ok(bytes),
			BodyInner::Stream(mut stream) => {
				let mut buf = BytesMut::new();

				while let Some(chunk) = stream.next().await {
					let chunk = chunk.map_err(|source| BodyError::Read { context, source })?;

					buf.extend_from_slice(&chunk);
				}

				Ok(buf.freeze())
			},
		}
	}

	/// Converts the body into a stream regardless of its current state.
	pub fn into_stream(self) -> BodyStream {
		match self.0 {
			BodyInner::Full(bytes) =>
				Box::pin(futures_util::stream::once(async move { Ok::<_, BoxError>(bytes) })),
			BodyInner::Stream(stream) => stream,
		}
	}
}
impl Default for Body {
	fn default() -> Self {
		Self::empty()
	}
}
impl Debug for Body {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		match &self.0 {
			BodyInner::Full(bytes) => f.debug_tuple("Body").field(&bytes.len()).finish(),
			BodyInner::Stream(_) => f.write_str("Body(<stream>)"),
		}
	}
}
impl From<Bytes> for Body {
	fn from(bytes: Bytes) -> Self {
		Self(BodyInner::Full(bytes))
	}
}
impl From<Vec<u8>> for Body {
	fn from(bytes: Vec<u8>) -> Self {
		Self(BodyInner::Full(bytes.into()))
	}
}
impl From<String> for Body {
	fn from(text: String) -> Self {
		Self(BodyInner::Full(text.into()))
	}
}
impl From<&'static str> for Body {
	fn from(text: &'static str) -> Self {
		Self(BodyInner::Full(Bytes::from_static(text.as_bytes())))
	}
}

/// Method, target, and logging context of a request; kept on every [`Response`].
#[derive(Clone, Debug)]
pub struct RequestHead {
	/// HTTP method.
	pub method: Method,
	/// Absolute target URI.
	pub url: Url,
	/// Logging context the request travelled with.
	pub context: LogContext,
}

/// Outbound request travelling down the chain.
#[derive(Debug)]
pub struct Request {
	/// HTTP method.
	pub method: Method,
	/// Absolute target URI.
	pub url: Url,
	/// Case-insensitive header map; inserting replaces earlier values.
	pub headers: HeaderMap,
	/// Optional payload.
	pub body: Option<Body>,
	/// Logging context carried through every tripper.
	pub context: LogContext,
}
impl Request {
	/// Creates a bodiless request.
	pub fn new(method: Method, url: Url) -> Self {
		Self { method, url, headers: HeaderMap::new(), body: None, context: LogContext::default() }
	}

	/// Sets a header, replacing any previous value.
	pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
		self.headers.insert(name, value);

		self
	}

	/// Attaches a payload.
	pub fn with_body(mut self, body: impl Into<Body>) -> Self {
		self.body = Some(body.into());

		self
	}

	/// Replaces the logging context.
	pub fn with_context(mut self, context: LogContext) -> Self {
		self.context = context;

		self
	}

	/// Returns the method, target, and context of this request.
	pub fn head(&self) -> RequestHead {
		RequestHead {
			method: self.method.clone(),
			url: self.url.clone(),
			context: self.context.clone(),
		}
	}

	/// Buffers the body (if any) so it can be inspected or replayed, returning the bytes.
	pub async fn buffer_body(&mut self) -> Result<Option<Bytes>, BodyError> {
		match self.body.as_mut() {
			Some(body) => body.buffer("request").await.map(Some),
			None => Ok(None),
		}
	}

	/// Returns an independent copy, or `None` if the body is an unread stream.
	pub fn try_clone(&self) -> Option<Self> {
		let body = match &self.body {
			Some(body) => Some(body.try_clone()?),
			None => None,
		};

		Some(Self {
			method: self.method.clone(),
			url: self.url.clone(),
			headers: self.headers.clone(),
			body,
			context: self.context.clone(),
		})
	}
}

/// Response travelling back up the chain.
#[derive(Debug)]
pub struct Response {
	/// HTTP status.
	pub status: StatusCode,
	/// Response headers.
	pub headers: HeaderMap,
	/// Response payload.
	pub body: Body,
	/// The request that produced this response.
	pub request: RequestHead,
}
impl Response {
	/// Creates an empty response for `request`.
	pub fn new(status: StatusCode, request: RequestHead) -> Self {
		Self { status, headers: HeaderMap::new(), body: Body::empty(), request }
	}

	/// Replaces the headers.
	pub fn with_headers(mut self, headers: HeaderMap) -> Self {
		self.headers = headers;

		self
	}

	/// Replaces the payload.
	pub fn with_body(mut self, body: impl Into<Body>) -> Self {
		self.body = body.into();

		self
	}

	/// Reads the whole payload.
	pub async fn bytes(self) -> Result<Bytes> {
		Ok(self.body.collect("response").await?)
	}

	/// Reads the whole payload as lossy UTF-8 text.
	pub async fn text(self) -> Result<String> {
		let bytes = self.bytes().await?;

		Ok(String::from_utf8_lossy(&bytes).into_owned())
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::io;
	// self
	use super::*;

	fn chunked(parts: &[&'static str]) -> Body {
		let chunks: Vec<Result<Bytes, io::Error>> =
			parts.iter().map(|part| Ok(Bytes::from_static(part.as_bytes()))).collect();

		Body::from_stream(futures_util::stream::iter(chunks))
	}

	#[tokio::test]
	async fn buffer_restores_a_fresh_view() {
		let mut body = chunked(&["{\"foo\":", "\"bar\"}"]);

		assert!(body.as_bytes().is_none());
		assert!(body.try_clone().is_none());

		let first = body.buffer("request").await.expect("Buffering a healthy stream should work.");

		assert_eq!(first, Bytes::from_static(b"{\"foo\":\"bar\"}"));

		let copy = body.try_clone().expect("Buffered bodies should be cloneable.");
		let second = body.collect("request").await.expect("Buffered body should collect.");
		let third = copy.collect("request").await.expect("Cloned body should collect.");

		assert_eq!(first, second);
		assert_eq!(first, third);
	}

	#[tokio::test]
	async fn stream_failure_names_the_body() {
		let chunks: Vec<Result<Bytes, io::Error>> =
			vec![Ok(Bytes::from_static(b"partial")), Err(io::Error::other("connection reset"))];
		let mut body = Body::from_stream(futures_util::stream::iter(chunks));
		let err = body.buffer("response").await.expect_err("Broken stream should fail to buffer.");

		assert_eq!(err.to_string(), "Failed to read response body.");
		assert!(body.try_clone().is_none());

		let again = body.collect("response").await.expect_err("Failure should be replayed.");

		match again {
			BodyError::Read { context, source } => {
				assert_eq!(context, "response");
				assert_eq!(source.to_string(), "connection reset");
			},
		}
	}

	#[tokio::test]
	async fn failed_buffer_replays_partial_bytes_first() {
		let chunks: Vec<Result<Bytes, io::Error>> =
			vec![Ok(Bytes::from_static(b"{\"data\":")), Err(io::Error::other("connection reset"))];
		let mut body = Body::from_stream(futures_util::stream::iter(chunks));

		body.buffer("response").await.expect_err("Broken stream should fail to buffer.");

		let mut stream = body.into_stream();
		let first = stream
			.next()
			.await
			.expect("Replay should yield the partial bytes.")
			.expect("Partial bytes should be readable.");

		assert_eq!(first, Bytes::from_static(b"{\"data\":"));
		assert!(stream.next().await.expect("Replay should yield the failure.").is_err());
		assert!(stream.next().await.is_none());
	}

	#[tokio::test]
	async fn request_clone_requires_buffered_body() {
		let url = Url::parse("https://boxworld.org/cardboard").expect("Fixture URL should parse.");
		let mut request = Request::new(Method::POST, url).with_body(chunked(&["abc"]));

		assert!(request.try_clone().is_none());

		let buffered = request.buffer_body().await.expect("Request body should buffer.");

		assert_eq!(buffered, Some(Bytes::from_static(b"abc")));

		let clone = request.try_clone().expect("Buffered request should clone.");
		let body = clone.body.expect("Clone should keep the body.");

		assert_eq!(body.as_bytes(), Some(&Bytes::from_static(b"abc")));
	}
}
