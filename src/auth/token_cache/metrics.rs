// std
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters for credential lookups and refresh exchanges.
#[derive(Debug, Default)]
pub struct RefreshMetrics {
	lookups: AtomicU64,
	exchanges: AtomicU64,
	failures: AtomicU64,
}
impl RefreshMetrics {
	/// Returns the number of `ensure` calls, including cache hits.
	pub fn lookups(&self) -> u64 {
		self.lookups.load(Ordering::Relaxed)
	}

	/// Returns the number of refresh exchanges sent to the authorization endpoint.
	pub fn exchanges(&self) -> u64 {
		self.exchanges.load(Ordering::Relaxed)
	}

	/// Returns the number of failed refresh exchanges.
	pub fn failures(&self) -> u64 {
		self.failures.load(Ordering::Relaxed)
	}

	pub(crate) fn record_lookup(&self) {
		self.lookups.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_exchange(&self) {
		self.exchanges.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_failure(&self) {
		self.failures.fetch_add(1, Ordering::Relaxed);
	}
}
