// self
use crate::obs::RefreshOutcome;

/// Records a token refresh outcome via the global metrics recorder (when enabled).
pub fn record_token_refresh(outcome: RefreshOutcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!("tripperware_token_refresh_total", "outcome" => outcome.as_str())
			.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = outcome;
	}
}

/// Records a credential rejection that is about to be retried with a fresh token.
pub fn record_credential_retry(status: u16) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!("tripperware_credential_retry_total", "status" => status.to_string())
			.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = status;
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn recorders_noop_without_metrics() {
		record_token_refresh(RefreshOutcome::Failure);
		record_credential_retry(401);
	}
}
