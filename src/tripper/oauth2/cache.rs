// std
use std::sync::atomic::{AtomicU64, Ordering};
// self
use crate::{_prelude::*, error::RefreshError, redact::Redact};

/// Where [`TokenCache::get_or_refresh`] found its token.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TokenLookup {
	/// Served from the cache.
	Cached(Redact),
	/// Produced by a refresh performed during this call.
	Refreshed(Redact),
}
impl TokenLookup {
	/// Returns the token regardless of its origin.
	pub fn into_token(self) -> Redact {
		match self {
			Self::Cached(token) | Self::Refreshed(token) => token,
		}
	}
}

#[derive(Debug, Default)]
struct Slot {
	token: Option<Redact>,
	/// Most recent failed refresh, tagged with its completion count.
	failure: Option<(u64, Arc<RefreshError>)>,
}

/// Lazily populated bearer token guarded by an async read/write lock.
///
/// Reads share the lock; refreshes and clears take it exclusively. A refresh runs while the write
/// lock is held, so at most one refresh is in flight and every caller that queued behind it
/// observes its token or its failure. Dropping a refreshing future releases the lock without
/// committing anything.
#[derive(Debug, Default)]
pub struct TokenCache {
	slot: AsyncRwLock<Slot>,
	/// Number of completed refreshes, successful or not.
	refreshes: AtomicU64,
}
impl TokenCache {
	/// Creates a cache pre-loaded with `token`.
	pub fn seeded(token: impl Into<Redact>) -> Self {
		Self {
			slot: AsyncRwLock::new(Slot { token: Some(token.into()), failure: None }),
			refreshes: AtomicU64::new(0),
		}
	}

	/// Returns the cached token, running `refresh` under the exclusive lock when the cache is
	/// empty.
	pub async fn get_or_refresh<F, Fut>(&self, refresh: F) -> Result<TokenLookup, Arc<RefreshError>>
	where
		F: FnOnce() -> Fut,
		Fut: Future<Output = Result<Redact, RefreshError>>,
	{
		let seen = self.refreshes.load(Ordering::Acquire);

		if let Some(token) = &self.slot.read().await.token {
			return Ok(TokenLookup::Cached(token.clone()));
		}

		let mut slot = self.slot.write().await;

		if let Some(token) = &slot.token {
			return Ok(TokenLookup::Cached(token.clone()));
		}
		// A refresh failed after this caller arrived.
		if let Some((_, failure)) =
			slot.failure.as_ref().filter(|(generation, _)| *generation > seen)
		{
			return Err(failure.clone());
		}

		let outcome = refresh().await;
		let generation = self.refreshes.fetch_add(1, Ordering::AcqRel) + 1;

		match outcome {
			Ok(token) => {
				slot.token = Some(token.clone());
				slot.failure = None;

				Ok(TokenLookup::Refreshed(token))
			},
			Err(e) => {
				let failure = Arc::new(e);

				slot.failure = Some((generation, failure.clone()));

				Err(failure)
			},
		}
	}

	/// Returns the cached token without refreshing.
	pub async fn peek(&self) -> Option<Redact> {
		self.slot.read().await.token.clone()
	}

	/// Resets the cache to empty. Idempotent.
	pub async fn clear(&self) {
		self.slot.write().await.token = None;
	}

	/// Clears the cache only while it still holds `rejected`.
	///
	/// Returns `false` when a concurrent caller already replaced the token.
	pub async fn invalidate(&self, rejected: &Redact) -> bool {
		let mut slot = self.slot.write().await;

		if slot.token.as_ref().is_none_or(|token| token == rejected) {
			slot.token = None;

			true
		} else {
			false
		}
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::sync::atomic::{AtomicUsize, Ordering};
	// self
	use super::*;

	fn failure() -> RefreshError {
		RefreshError::MissingAccessToken { uri: "https://api.example.com/oauth/token".into() }
	}

	#[tokio::test]
	async fn concurrent_callers_share_one_refresh() {
		let cache = Arc::new(TokenCache::default());
		let calls = Arc::new(AtomicUsize::new(0));
		let handles = (0..16)
			.map(|_| {
				let cache = cache.clone();
				let calls = calls.clone();

				tokio::spawn(async move {
					cache
						.get_or_refresh(|| async move {
							calls.fetch_add(1, Ordering::SeqCst);
							tokio::time::sleep(std::time::Duration::from_millis(50)).await;

							Ok(Redact::new("shared-token"))
						})
						.await
				})
			})
			.collect::<Vec<_>>();

		for handle in handles {
			let lookup = handle
				.await
				.expect("Task should not panic.")
				.expect("Refresh should succeed.");

			assert_eq!(lookup.into_token().expose(), "shared-token");
		}

		assert_eq!(calls.load(Ordering::SeqCst), 1);
	}

	#[tokio::test]
	async fn queued_callers_observe_the_same_failure() {
		let cache = Arc::new(TokenCache::default());
		let calls = Arc::new(AtomicUsize::new(0));
		let handles = (0..8)
			.map(|_| {
				let cache = cache.clone();
				let calls = calls.clone();

				tokio::spawn(async move {
					cache
						.get_or_refresh(|| async move {
							calls.fetch_add(1, Ordering::SeqCst);
							tokio::time::sleep(std::time::Duration::from_millis(50)).await;

							Err(failure())
						})
						.await
				})
			})
			.collect::<Vec<_>>();
		let mut errors = Vec::new();

		for handle in handles {
			errors.push(
				handle.await.expect("Task should not panic.").expect_err("Refresh should fail."),
			);
		}

		assert_eq!(calls.load(Ordering::SeqCst), 1);
		assert!(errors.iter().all(|e| Arc::ptr_eq(e, &errors[0])));
		assert!(cache.peek().await.is_none());

		// Later callers are not served the stale failure.
		let lookup = cache
			.get_or_refresh(|| async { Ok(Redact::new("recovered")) })
			.await
			.expect("Fresh caller should refresh again.");

		assert_eq!(lookup, TokenLookup::Refreshed(Redact::new("recovered")));
	}

	#[tokio::test]
	async fn invalidate_only_clears_the_rejected_token() {
		let cache = TokenCache::seeded("fresh-token");

		assert!(!cache.invalidate(&Redact::new("stale-token")).await);
		assert_eq!(cache.peek().await, Some(Redact::new("fresh-token")));
		assert!(cache.invalidate(&Redact::new("fresh-token")).await);
		assert!(cache.peek().await.is_none());

		cache.clear().await;
		cache.clear().await;

		assert!(cache.peek().await.is_none());
	}

	#[tokio::test]
	async fn dropped_refresh_releases_the_lock() {
		let cache = TokenCache::default();
		let stalled = cache.get_or_refresh(|| async {
			futures_util::future::pending::<Result<Redact, RefreshError>>().await
		});

		assert!(
			tokio::time::timeout(std::time::Duration::from_millis(20), stalled).await.is_err(),
			"Stalled refresh should time out."
		);

		let lookup = cache
			.get_or_refresh(|| async { Ok(Redact::new("after-cancel")) })
			.await
			.expect("Cache should be usable after cancellation.");

		assert_eq!(lookup.into_token().expose(), "after-cancel");
	}
}
