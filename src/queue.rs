//! Ordered intake queue between the HTTP accept path and the delivery consumer.
//!
//! Producers only see [`WorkSink`], a one-operation capability that can be satisfied by a
//! test double. [`MemoryQueue`] is the in-process implementation: a bounded FIFO drained by
//! exactly one consumer loop, which awaits the handler for each item before taking the next.

pub mod memory;

pub use memory::*;

// std
use std::ops::Deref;
// self
use crate::_prelude::*;

/// Boxed future returned by [`WorkSink::submit`].
pub type SubmitFuture<'a> = Pin<Box<dyn Future<Output = Result<()>> + 'a + Send>>;

/// Capability to hand work items to the delivery pipeline.
pub trait WorkSink
where
	Self: Send + Sync,
{
	/// Accepts `item` for delivery.
	///
	/// Implementations may wait for buffer space but must fail with [`Error::QueueClosed`] once
	/// they stopped accepting items.
	fn submit(&self, item: WorkItem) -> SubmitFuture<'_>;

	/// Returns `true` while [`submit`](Self::submit) is expected to succeed.
	fn is_accepting(&self) -> bool {
		true
	}
}

/// Opaque track reference flowing through the queue; never inspected by it.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkItem(String);
impl WorkItem {
	/// Wraps a track reference.
	pub fn new(value: impl Into<String>) -> Self {
		Self(value.into())
	}

	/// Borrowed view of the reference.
	pub fn as_str(&self) -> &str {
		&self.0
	}

	/// Returns the owned reference.
	pub fn into_inner(self) -> String {
		self.0
	}
}
impl Deref for WorkItem {
	type Target = str;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}
impl From<String> for WorkItem {
	fn from(value: String) -> Self {
		Self(value)
	}
}
impl From<&str> for WorkItem {
	fn from(value: &str) -> Self {
		Self(value.to_owned())
	}
}
impl Display for WorkItem {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(&self.0)
	}
}

/// What happens to buffered items when the queue is closed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ShutdownPolicy {
	/// Buffered items are discarded; the consumer stops at its next wait.
	#[default]
	Abandon,
	/// The consumer keeps delivering buffered items and stops once the buffer is empty.
	Drain,
}
impl ShutdownPolicy {
	/// Returns a stable label suitable for logs and configuration.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Abandon => "abandon",
			Self::Drain => "drain",
		}
	}
}
impl FromStr for ShutdownPolicy {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.trim().to_ascii_lowercase().as_str() {
			"abandon" => Ok(Self::Abandon),
			"drain" => Ok(Self::Drain),
			other => Err(format!("expected `abandon` or `drain`, got `{other}`")),
		}
	}
}
impl Display for ShutdownPolicy {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
