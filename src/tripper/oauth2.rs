//! OAuth 2.0 client-credentials tripper with a shared token cache and a single credential retry.
//!
//! The tripper authorizes every request with `Authorization: Bearer <token>`. Tokens are fetched
//! lazily from `POST {base_uri}{token_path}` through the wrapped segment and cached until the
//! protected endpoint rejects them. A rejection invalidates the cache, refreshes once, and re-sends
//! the buffered request exactly once; whatever the second attempt returns is final.

mod cache;
mod metrics;
mod refresh;

pub use cache::{TokenCache, TokenLookup};
pub use metrics::TokenMetrics;

// crates.io
use http::{HeaderValue, StatusCode, header::AUTHORIZATION};
// self
use crate::{
	_prelude::*,
	error::{ConfigError, RefreshError},
	logger::{Field, LogContext, Logger, NoopLogger},
	message::{Body, Request},
	obs::{self, RefreshOutcome, TripSpan},
	redact::Redact,
	tripper::{Next, RoundTrip, TripFuture, Tripper},
};

/// Client-credentials identity and token endpoint; immutable once the tripper is built.
#[derive(Clone, Debug)]
pub struct OAuth2Identity {
	base_uri: String,
	token_path: String,
	client_id: String,
	client_secret: Redact,
}
impl OAuth2Identity {
	/// Creates an identity posting to `{base_uri}{token_path}`.
	pub fn new(
		base_uri: impl Into<String>,
		token_path: impl Into<String>,
		client_id: impl Into<String>,
		client_secret: impl Into<Redact>,
	) -> Self {
		Self {
			base_uri: base_uri.into(),
			token_path: token_path.into(),
			client_id: client_id.into(),
			client_secret: client_secret.into(),
		}
	}

	/// Returns the token endpoint URI.
	pub fn token_uri(&self) -> String {
		format!("{}{}", self.base_uri, self.token_path)
	}

	/// Returns the client identifier.
	pub fn client_id(&self) -> &str {
		&self.client_id
	}
}

/// Statuses treated as a rejected credential.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum RejectionPolicy {
	/// Only `401 Unauthorized` triggers a refresh and retry.
	#[default]
	Unauthorized,
	/// Both `401 Unauthorized` and `403 Forbidden` trigger a refresh and retry.
	UnauthorizedOrForbidden,
}
impl RejectionPolicy {
	/// Returns `true` when `status` means the bearer token was rejected.
	pub fn rejects(self, status: StatusCode) -> bool {
		match self {
			Self::Unauthorized => status == StatusCode::UNAUTHORIZED,
			Self::UnauthorizedOrForbidden =>
				status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN,
		}
	}
}

/// Authorizes requests with a cached client-credentials bearer token.
pub struct OAuth2Tripper {
	identity: OAuth2Identity,
	policy: RejectionPolicy,
	cache: Arc<TokenCache>,
	metrics: Arc<TokenMetrics>,
	logger: Arc<dyn Logger>,
	next: Next,
}
impl OAuth2Tripper {
	/// Creates a tripper with an empty cache, the default [`RejectionPolicy`], and no logging.
	pub fn new(identity: OAuth2Identity) -> Self {
		Self {
			identity,
			policy: RejectionPolicy::default(),
			cache: Default::default(),
			metrics: Default::default(),
			logger: Arc::new(NoopLogger),
			next: Next::unwrapped("oauth2"),
		}
	}

	/// Sets the logger receiving token lifecycle entries.
	pub fn with_logger(mut self, logger: Arc<dyn Logger>) -> Self {
		self.logger = logger;

		self
	}

	/// Sets which statuses count as a rejected credential.
	pub fn with_policy(mut self, policy: RejectionPolicy) -> Self {
		self.policy = policy;

		self
	}

	/// Pre-loads the cache with `token`.
	pub fn with_cached_token(mut self, token: impl Into<Redact>) -> Self {
		self.cache = Arc::new(TokenCache::seeded(token));

		self
	}

	/// Returns a handle to the token cache.
	pub fn cache(&self) -> Arc<TokenCache> {
		self.cache.clone()
	}

	/// Returns a handle to the refresh counters.
	pub fn metrics(&self) -> Arc<TokenMetrics> {
		self.metrics.clone()
	}

	/// Returns the cached token, refreshing it through the wrapped segment when the cache is empty.
	pub async fn token(&self, ctx: &LogContext) -> Result<Redact> {
		let next = self.next.get()?;
		let lookup = self.cache.get_or_refresh(|| self.refresh(next, ctx)).await?;

		if let TokenLookup::Cached(_) = &lookup {
			self.metrics.record_cache_hit();
			self.logger.debug(ctx, "using cached oauth token", &[]);
		}

		Ok(lookup.into_token())
	}

	/// Drops the cached token so the next request refreshes it.
	pub async fn clear_token(&self) {
		self.cache.clear().await;
	}

	async fn refresh(
		&self,
		next: &dyn RoundTrip,
		ctx: &LogContext,
	) -> Result<Redact, RefreshError> {
		self.metrics.record_attempt();
		obs::record_token_refresh(RefreshOutcome::Attempt);

		let result = refresh::request_token(next, &self.identity, self.logger.as_ref(), ctx).await;

		match &result {
			Ok(_) => {
				self.metrics.record_success();
				obs::record_token_refresh(RefreshOutcome::Success);
			},
			Err(_) => {
				self.metrics.record_failure();
				obs::record_token_refresh(RefreshOutcome::Failure);
			},
		}

		result
	}
}
impl Debug for OAuth2Tripper {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("OAuth2Tripper")
			.field("identity", &self.identity)
			.field("policy", &self.policy)
			.field("next", &self.next)
			.finish()
	}
}
impl RoundTrip for OAuth2Tripper {
	fn round_trip(&self, mut request: Request) -> TripFuture<'_> {
		TripSpan::new("oauth2", &request).trace(Box::pin(async move {
			let next = self.next.get()?;
			let buffered = request.buffer_body().await?;
			let mut replay = Request {
				method: request.method.clone(),
				url: request.url.clone(),
				headers: request.headers.clone(),
				body: buffered.map(Body::from),
				context: request.context.clone(),
			};
			let ctx = request.context.clone();
			let token = self.token(&ctx).await?;

			authorize(&mut request, &token)?;

			let response = next.round_trip(request).await?;

			if !self.policy.rejects(response.status) {
				return Ok(response);
			}

			let status = response.status.as_u16();

			drop(response);
			self.logger.info(
				&ctx,
				"credential rejected, refreshing token",
				&[Field::new("status", status)],
			);
			self.metrics.record_retry();
			obs::record_credential_retry(status);
			self.cache.invalidate(&token).await;

			let token = self.token(&ctx).await?;

			authorize(&mut replay, &token)?;

			next.round_trip(replay).await
		}))
	}
}
impl Tripper for OAuth2Tripper {
	fn wrap(&mut self, next: Box<dyn RoundTrip>) {
		self.next.set(next);
	}
}

fn authorize(request: &mut Request, token: &Redact) -> Result<()> {
	let mut value = HeaderValue::from_str(&format!("Bearer {}", token.expose())).map_err(|source| {
		ConfigError::InvalidHeaderValue { name: AUTHORIZATION.as_str().into(), source }
	})?;

	value.set_sensitive(true);
	request.headers.insert(AUTHORIZATION, value);

	Ok(())
}

#[cfg(test)]
mod tests {
	// std
	use std::time::Duration as StdDuration;
	// crates.io
	use http::Method;
	// self
	use super::*;
	use crate::{
		_preludet::*,
		mock::{MockRule, MockTransport},
		tripper::Chain,
	};

	fn get(path: &str) -> Request {
		Request::new(
			Method::GET,
			Url::parse(&format!("{TEST_BASE_URI}{path}")).expect("Fixture URL should parse."),
		)
	}

	/// Delays token endpoint answers so concurrent callers pile up behind the refresh.
	struct SlowTokens(MockTransport);
	impl RoundTrip for SlowTokens {
		fn round_trip(&self, request: Request) -> TripFuture<'_> {
			Box::pin(async move {
				if request.url.path() == TEST_TOKEN_PATH {
					tokio::time::sleep(StdDuration::from_millis(50)).await;
				}

				self.0.round_trip(request).await
			})
		}
	}

	#[tokio::test]
	async fn first_request_fetches_token_then_reuses_it() {
		let transport = token_transport("test-token-123", 200);
		let tripper = OAuth2Tripper::new(test_identity());
		let metrics = tripper.metrics();
		let (chain, logger) = oauth2_chain(transport.clone(), tripper);

		for _ in 0..2 {
			let response =
				chain.round_trip(get("/api/data")).await.expect("Round trip should succeed.");

			assert_eq!(response.status, StatusCode::OK);
		}

		assert_eq!(transport.hits(TEST_TOKEN_PATH), 1);
		assert_eq!(transport.hits("/api/data"), 2);
		assert_eq!(
			transport.last("/api/data").and_then(|r| r.header("authorization").map(str::to_owned)),
			Some("Bearer test-token-123".to_owned())
		);
		assert_eq!(metrics.attempts(), 1);
		assert_eq!(metrics.cache_hits(), 1);
		assert!(logger.messages().iter().any(|message| message == "using cached oauth token"));
	}

	#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
	async fn concurrent_requests_trigger_one_refresh() {
		let transport = token_transport("shared-token", 200);
		let tripper = OAuth2Tripper::new(test_identity());
		let chain = Arc::new(Chain::new(SlowTokens(transport.clone())).with(tripper));
		let handles = (0..32)
			.map(|_| {
				let chain = chain.clone();

				tokio::spawn(async move { chain.round_trip(get("/api/data")).await })
			})
			.collect::<Vec<_>>();

		for handle in handles {
			let response = handle
				.await
				.expect("Task should not panic.")
				.expect("Round trip should succeed.");

			assert_eq!(response.status, StatusCode::OK);
		}

		assert_eq!(transport.hits(TEST_TOKEN_PATH), 1);
		assert!(
			transport
				.requests()
				.iter()
				.filter(|r| r.path() == "/api/data")
				.all(|r| r.header("authorization") == Some("Bearer shared-token"))
		);
	}

	#[tokio::test]
	async fn always_unauthorized_retries_exactly_once() {
		let transport = MockTransport::default()
			.with_rule(
				MockRule::path(TEST_TOKEN_PATH).respond(200, "{\"access_token\":\"fresh-token\"}"),
			)
			.with_fallback(MockRule::any().respond(401, "first").respond(401, "second"));
		let tripper = OAuth2Tripper::new(test_identity()).with_cached_token("stale-token");
		let metrics = tripper.metrics();
		let (chain, _) = oauth2_chain(transport.clone(), tripper);
		let response = chain.round_trip(get("/api/data")).await.expect("Round trip should succeed.");

		assert_eq!(response.status, StatusCode::UNAUTHORIZED);
		assert_eq!(response.text().await.expect("Body should be readable."), "second");
		assert_eq!(transport.hits("/api/data"), 2);
		assert_eq!(transport.hits(TEST_TOKEN_PATH), 1);
		assert_eq!(metrics.retries(), 1);
	}

	#[tokio::test]
	async fn stale_token_is_replaced_and_body_replayed() {
		let transport = MockTransport::default()
			.with_rule(
				MockRule::path(TEST_TOKEN_PATH).respond(200, "{\"access_token\":\"fresh-token\"}"),
			)
			.with_fallback(MockRule::any().respond(401, "").respond(200, "{\"data\":\"ok\"}"));
		let tripper = OAuth2Tripper::new(test_identity()).with_cached_token("stale-token");
		let cache = tripper.cache();
		let (chain, logger) = oauth2_chain(transport.clone(), tripper);
		let request = Request::new(
			Method::POST,
			Url::parse(&format!("{TEST_BASE_URI}/api/data")).expect("Fixture URL should parse."),
		)
		.with_body("{\"foo\":\"bar\"}");
		let response = chain.round_trip(request).await.expect("Round trip should succeed.");

		assert_eq!(response.status, StatusCode::OK);

		let sent =
			transport.requests().into_iter().filter(|r| r.path() == "/api/data").collect::<Vec<_>>();

		assert_eq!(sent.len(), 2);
		assert_eq!(sent[0].header("authorization"), Some("Bearer stale-token"));
		assert_eq!(sent[1].header("authorization"), Some("Bearer fresh-token"));
		assert_eq!(sent[0].body_text(), "{\"foo\":\"bar\"}");
		assert_eq!(sent[1].body_text(), "{\"foo\":\"bar\"}");
		assert_eq!(cache.peek().await, Some(Redact::new("fresh-token")));
		assert!(
			logger
				.messages()
				.iter()
				.any(|message| message == "credential rejected, refreshing token")
		);
	}

	#[tokio::test]
	async fn forbidden_follows_the_policy() {
		for (policy, api_hits, token_hits) in [
			(RejectionPolicy::Unauthorized, 1, 0),
			(RejectionPolicy::UnauthorizedOrForbidden, 2, 1),
		] {
			let transport = token_transport("fresh-token", 403);
			let tripper = OAuth2Tripper::new(test_identity())
				.with_cached_token("stale-token")
				.with_policy(policy);
			let (chain, _) = oauth2_chain(transport.clone(), tripper);
			let response =
				chain.round_trip(get("/api/data")).await.expect("Round trip should succeed.");

			assert_eq!(response.status, StatusCode::FORBIDDEN, "{policy:?}");
			assert_eq!(transport.hits("/api/data"), api_hits, "{policy:?}");
			assert_eq!(transport.hits(TEST_TOKEN_PATH), token_hits, "{policy:?}");
		}
	}

	#[tokio::test]
	async fn other_statuses_pass_through_untouched() {
		let transport = token_transport("test-token-123", 500);
		let (chain, _) = oauth2_chain(transport.clone(), OAuth2Tripper::new(test_identity()));
		let response = chain.round_trip(get("/api/data")).await.expect("Round trip should succeed.");

		assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
		assert_eq!(transport.hits("/api/data"), 1);
	}

	#[tokio::test]
	async fn refresh_failure_aborts_without_delegating() {
		let transport = MockTransport::default()
			.with_rule(MockRule::path(TEST_TOKEN_PATH).respond(500, "boom"))
			.with_fallback(MockRule::any().respond(200, ""));
		let tripper = OAuth2Tripper::new(test_identity());
		let cache = tripper.cache();
		let (chain, _) = oauth2_chain(transport.clone(), tripper);
		let err = chain.round_trip(get("/api/data")).await.expect_err("Refresh should fail.");

		match err {
			Error::Refresh(e) => assert!(matches!(*e, RefreshError::Status { status: 500, .. })),
			other => panic!("Unexpected error: {other:?}"),
		}

		assert_eq!(transport.hits("/api/data"), 0);
		assert!(cache.peek().await.is_none());
	}

	#[tokio::test]
	async fn failed_refresh_during_retry_leaves_the_cache_empty() {
		let transport = MockTransport::default()
			.with_rule(MockRule::path(TEST_TOKEN_PATH).respond(500, "token endpoint down"))
			.with_fallback(MockRule::any().respond(401, "expired"));
		let tripper = OAuth2Tripper::new(test_identity()).with_cached_token("stale-token");
		let cache = tripper.cache();
		let metrics = tripper.metrics();
		let (chain, _) = oauth2_chain(transport.clone(), tripper);
		let err = chain.round_trip(get("/api/data")).await.expect_err("Retry refresh should fail.");

		match err {
			Error::Refresh(e) => match e.as_ref() {
				RefreshError::Status { status, body, .. } => {
					assert_eq!(*status, 500);
					assert_eq!(body, "token endpoint down");
				},
				other => panic!("Unexpected refresh failure: {other:?}"),
			},
			other => panic!("Unexpected error: {other:?}"),
		}

		assert_eq!(transport.hits("/api/data"), 1);
		assert_eq!(transport.hits(TEST_TOKEN_PATH), 1);
		assert!(cache.peek().await.is_none());
		assert_eq!(metrics.retries(), 1);
		assert_eq!(metrics.failures(), 1);
	}

	#[tokio::test]
	async fn token_unusable_as_header_is_never_cached() {
		let transport = MockTransport::default()
			.with_rule(
				MockRule::path(TEST_TOKEN_PATH)
					.respond(200, "{\"access_token\":\"bad\\ntoken\"}")
					.respond(200, "{\"access_token\":\"good-token\"}"),
			)
			.with_fallback(MockRule::any().respond(200, ""));
		let tripper = OAuth2Tripper::new(test_identity());
		let cache = tripper.cache();
		let (chain, _) = oauth2_chain(transport.clone(), tripper);
		let err = chain.round_trip(get("/api/data")).await.expect_err("Bad token should be refused.");

		match err {
			Error::Refresh(e) =>
				assert!(matches!(e.as_ref(), RefreshError::InvalidAccessToken { .. })),
			other => panic!("Unexpected error: {other:?}"),
		}

		assert_eq!(transport.hits("/api/data"), 0);
		assert!(cache.peek().await.is_none());

		let response = chain.round_trip(get("/api/data")).await.expect("Next caller should refresh.");

		assert_eq!(response.status, StatusCode::OK);
		assert_eq!(
			transport.last("/api/data").and_then(|r| r.header("authorization").map(str::to_owned)),
			Some("Bearer good-token".to_owned())
		);
	}

	#[tokio::test]
	async fn transport_failure_is_not_retried() {
		let transport = MockTransport::default()
			.with_rule(MockRule::path(TEST_TOKEN_PATH).respond(200, "{\"access_token\":\"t\"}"))
			.with_fallback(MockRule::any().fail("connection reset"));
		let (chain, _) = oauth2_chain(transport.clone(), OAuth2Tripper::new(test_identity()));
		let err = chain.round_trip(get("/api/data")).await.expect_err("Transport should fail.");

		assert!(matches!(err, Error::Transport(_)));
		assert_eq!(transport.hits("/api/data"), 1);
		assert_eq!(transport.hits(TEST_TOKEN_PATH), 1);
	}

	#[tokio::test]
	async fn cancelled_refresh_lets_the_next_caller_retry() {
		let transport = MockTransport::default()
			.with_rule(
				MockRule::path(TEST_TOKEN_PATH)
					.hang()
					.respond(200, "{\"access_token\":\"after-cancel\"}"),
			)
			.with_fallback(MockRule::any().respond(200, ""));
		let (chain, _) = oauth2_chain(transport.clone(), OAuth2Tripper::new(test_identity()));

		assert!(
			tokio::time::timeout(StdDuration::from_millis(50), chain.round_trip(get("/api/data")))
				.await
				.is_err(),
			"Hanging refresh should be cancelled by the deadline."
		);

		let response = tokio::time::timeout(
			StdDuration::from_secs(1),
			chain.round_trip(get("/api/data")),
		)
		.await
		.expect("Second caller should not block on the cancelled refresh.")
		.expect("Second caller should refresh successfully.");

		assert_eq!(response.status, StatusCode::OK);
		assert_eq!(transport.hits(TEST_TOKEN_PATH), 2);
		assert_eq!(
			transport.last("/api/data").and_then(|r| r.header("authorization").map(str::to_owned)),
			Some("Bearer after-cancel".to_owned())
		);
	}

	#[tokio::test]
	async fn unwrapped_tripper_cannot_fetch_tokens() {
		let tripper = OAuth2Tripper::new(test_identity());
		let err = tripper.token(&LogContext::default()).await.expect_err("Token should fail.");

		assert!(matches!(err, Error::Chain(_)));
	}
}
