//! Optional observability helpers for the trippers.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to wrap every tripper's share of a round trip in a `tripperware.trip` span
//!   carrying `tripper`, `method`, and `path`, plus `status` or `error` once it settles.
//! - Enable `metrics` to increment `tripperware_token_refresh_total` (labeled by `outcome`) for
//!   every token refresh, and `tripperware_credential_retry_total` (labeled by `status`) for every
//!   credential rejection that triggers a retry.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Outcome labels recorded for each token refresh.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RefreshOutcome {
	/// A refresh call is about to be issued.
	Attempt,
	/// The token endpoint produced a token.
	Success,
	/// The refresh failed and nothing was cached.
	Failure,
}
impl RefreshOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			RefreshOutcome::Attempt => "attempt",
			RefreshOutcome::Success => "success",
			RefreshOutcome::Failure => "failure",
		}
	}
}
impl Display for RefreshOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
