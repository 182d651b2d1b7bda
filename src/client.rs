//! JSON API client facade owning the outermost unit of a tripper chain.

// crates.io
use http::{
	HeaderMap, HeaderName, HeaderValue, Method,
	header::{ACCEPT, CONTENT_TYPE},
};
use serde::de::DeserializeOwned;
// self
use crate::{
	_prelude::*,
	logger::LogContext,
	message::{Body, Request, Response},
	tripper::{Chain, RoundTrip, Tripper},
};

/// Request addressed relative to the client's base URI.
#[derive(Debug)]
pub struct ClientRequest {
	/// HTTP method.
	pub method: Method,
	/// Path appended verbatim to the base URI (leading slash expected).
	pub path: String,
	/// Per-request headers.
	pub headers: HeaderMap,
	/// Optional payload.
	pub body: Option<Body>,
	/// Logging context to start the chain with.
	pub context: LogContext,
}
impl ClientRequest {
	/// Creates a bodiless request.
	pub fn new(method: Method, path: impl Into<String>) -> Self {
		Self {
			method,
			path: path.into(),
			headers: HeaderMap::new(),
			body: None,
			context: LogContext::default(),
		}
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
}

/// HTTP client sending [`ClientRequest`]s through a tripper chain.
///
/// Default headers are applied after the per-request ones and win on conflict.
#[derive(Debug)]
pub struct Client {
	base_uri: String,
	headers: HeaderMap,
	chain: Chain,
}
impl Client {
	/// Creates a client sending straight to `transport`.
	pub fn new(base_uri: impl Into<String>, transport: impl 'static + RoundTrip) -> Self {
		Self { base_uri: base_uri.into(), headers: HeaderMap::new(), chain: Chain::new(transport) }
	}

	/// Creates a client on top of an assembled chain.
	pub fn with_chain(base_uri: impl Into<String>, chain: Chain) -> Self {
		Self { base_uri: base_uri.into(), headers: HeaderMap::new(), chain }
	}

	/// Sets headers sent with every request.
	pub fn with_headers(mut self, headers: HeaderMap) -> Self {
		self.headers = headers;

		self
	}

	/// Wraps the current chain with `tripper`, making it the new outermost unit.
	pub fn with_tripper<T>(self, tripper: T) -> Self
	where
		T: 'static + Tripper,
	{
		Self { chain: self.chain.with(tripper), ..self }
	}

	/// Returns the base URI requests are addressed against.
	pub fn base_uri(&self) -> &str {
		&self.base_uri
	}

	/// Returns tripper names from innermost to outermost.
	pub fn trippers(&self) -> &[&'static str] {
		self.chain.trippers()
	}

	/// Sends `request` through the chain, leaving the response body to the caller.
	pub async fn send(&self, request: ClientRequest) -> Result<Response> {
		let ClientRequest { method, path, mut headers, body, context } = request;
		let uri = format!("{}{}", self.base_uri, path);
		let url = Url::parse(&uri)
			.map_err(|source| Error::Request { method: method.clone(), uri, source })?;

		for (name, value) in &self.headers {
			headers.insert(name.clone(), value.clone());
		}

		let outbound = Request { method: method.clone(), url, headers, body, context };

		self.chain.round_trip(outbound).await.map_err(|e| Error::Send {
			method,
			base_uri: self.base_uri.clone(),
			path,
			source: Box::new(e),
		})
	}

	/// Sends a JSON request and reads the whole response body.
	pub async fn send_json(
		&self,
		method: Method,
		path: &str,
		body: Option<Bytes>,
	) -> Result<Bytes> {
		let mut request = ClientRequest::new(method, path)
			.with_header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
			.with_header(ACCEPT, HeaderValue::from_static("application/json"));

		request.body = body.map(Body::from);

		self.send(request).await?.bytes().await
	}

	/// Encodes `object` (if any) as JSON, sends it, and decodes the response into `R`.
	///
	/// An empty response body decodes as JSON `null`, so `()` and `Option<_>` accept it.
	pub async fn send_object<S, R>(&self, method: Method, path: &str, object: Option<&S>) -> Result<R>
	where
		S: ?Sized + Serialize,
		R: DeserializeOwned,
	{
		let body = object
			.map(|object| serde_json::to_vec(object).map(Bytes::from))
			.transpose()
			.map_err(|source| Error::Encode { source })?;
		let data = self.send_json(method, path, body).await?;
		let data: &[u8] = if data.iter().all(u8::is_ascii_whitespace) { b"null" } else { &data };
		let mut de = serde_json::Deserializer::from_slice(data);

		serde_path_to_error::deserialize(&mut de)
			.map_err(|source| Error::Decode { target: std::any::type_name::<R>(), source })
	}
}
