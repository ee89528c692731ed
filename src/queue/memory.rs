//! Bounded in-process [`WorkSink`] with a single consumer loop.

// std
use std::time::Duration as StdDuration;
// crates.io
use tokio::sync::mpsc::{self, Receiver, Sender};
// self
use crate::{
	_prelude::*,
	obs::{self, Outcome, Stage, StageField, StageSpan},
	queue::{ShutdownPolicy, SubmitFuture, WorkItem, WorkSink},
};

/// In-memory FIFO that favors fast acceptance; no delays, retries, or persistence.
///
/// Submissions wait for space once `capacity` items are buffered. A single call to
/// [`run`](Self::run) owns the read end and awaits the handler for one item at a time, so the
/// delivery order is the submission order and at most one delivery is in flight.
pub struct MemoryQueue {
	capacity: usize,
	policy: ShutdownPolicy,
	sender: Mutex<Option<Sender<WorkItem>>>,
	receiver: Mutex<Option<Receiver<WorkItem>>>,
	closed: CancellationToken,
}
impl MemoryQueue {
	/// Buffer size used by [`MemoryQueue::new`].
	pub const DEFAULT_CAPACITY: usize = 10;
	/// How long [`shutdown`](Self::shutdown) lets a draining consumer run by default.
	pub const DEFAULT_DRAIN_TIMEOUT: StdDuration = StdDuration::from_secs(30);

	/// Creates an open queue with [`Self::DEFAULT_CAPACITY`] slots.
	pub fn new() -> Self {
		Self::with_capacity(Self::DEFAULT_CAPACITY)
	}

	/// Creates an open queue with `capacity` slots (at least one).
	pub fn with_capacity(capacity: usize) -> Self {
		let capacity = capacity.max(1);
		let (sender, receiver) = mpsc::channel(capacity);

		Self {
			capacity,
			policy: ShutdownPolicy::default(),
			sender: Mutex::new(Some(sender)),
			receiver: Mutex::new(Some(receiver)),
			closed: CancellationToken::new(),
		}
	}

	/// Overrides what happens to buffered items on [`close`](Self::close).
	pub fn with_policy(mut self, policy: ShutdownPolicy) -> Self {
		self.policy = policy;

		self
	}

	/// Number of slots in the buffer.
	pub fn capacity(&self) -> usize {
		self.capacity
	}

	/// Active shutdown policy.
	pub fn policy(&self) -> ShutdownPolicy {
		self.policy
	}

	/// Returns `true` until [`close`](Self::close) is called.
	pub fn is_open(&self) -> bool {
		!self.closed.is_cancelled()
	}

	/// Number of buffered items; zero once the queue is closed.
	pub fn len(&self) -> usize {
		self.sender
			.lock()
			.as_ref()
			.map(|sender| sender.max_capacity() - sender.capacity())
			.unwrap_or_default()
	}

	/// Returns `true` if nothing is buffered.
	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// Stops accepting items. Calling it again has no effect.
	///
	/// Submissions waiting for space fail with [`Error::QueueClosed`]. Buffered items are
	/// discarded under [`ShutdownPolicy::Abandon`] and still delivered under
	/// [`ShutdownPolicy::Drain`].
	pub fn close(&self) {
		self.closed.cancel();

		if self.sender.lock().take().is_some() {
			#[cfg(feature = "tracing")]
			tracing::info!(policy = %self.policy, "Closed work queue.");
		}
	}

	/// Closes the queue and waits for `consumer`, the future driving [`run`](Self::run), to
	/// stop.
	///
	/// Under [`ShutdownPolicy::Abandon`] the consumer is cancelled right away. Under
	/// [`ShutdownPolicy::Drain`] it keeps delivering buffered items until the queue is empty
	/// or `drain_timeout` elapses, whichever comes first; only then is `cancel` fired.
	pub async fn shutdown<F>(
		&self,
		cancel: &CancellationToken,
		consumer: F,
		drain_timeout: StdDuration,
	) -> F::Output
	where
		F: Future,
	{
		self.close();

		if self.policy == ShutdownPolicy::Abandon {
			cancel.cancel();

			return consumer.await;
		}

		tokio::pin!(consumer);

		match tokio::time::timeout(drain_timeout, &mut consumer).await {
			Ok(stopped) => stopped,
			Err(_) => {
				#[cfg(feature = "tracing")]
				tracing::warn!(
					timeout_secs = drain_timeout.as_secs_f64(),
					"Drain timed out; cancelling consumer."
				);

				cancel.cancel();

				consumer.await
			},
		}
	}

	/// Enqueues `item`, waiting while the buffer is full.
	pub async fn put(&self, item: WorkItem) -> Result<()> {
		let result = self.put_inner(item).await;

		obs::record_stage_outcome(Stage::Submit, Outcome::of(&result));

		result
	}

	async fn put_inner(&self, item: WorkItem) -> Result<()> {
		let sender = self.sender.lock().clone().ok_or(Error::QueueClosed)?;

		tokio::select! {
			biased;
			_ = self.closed.cancelled() => Err(Error::QueueClosed),
			sent = sender.send(item) => sent.map_err(|_| Error::QueueClosed),
		}
	}

	/// Runs the consumer loop until it is cancelled or the queue is closed.
	///
	/// Each item is passed to `handler`, and the loop waits for the returned future before
	/// taking the next item. `handler` is expected to report its own failures. `cancel` is
	/// observed between items only, never while a handler runs.
	///
	/// Returns the lifecycle error that ended the loop:
	///
	/// - [`Error::QueueCancelled`] once `cancel` fires; remaining items stay buffered.
	/// - [`Error::QueueClosed`] once the queue is closed (and, under [`ShutdownPolicy::Drain`],
	///   empty).
	/// - [`Error::QueueConsumerTaken`] if another call already owns the read end.
	pub async fn run<F, Fut>(&self, cancel: &CancellationToken, mut handler: F) -> Error
	where
		F: FnMut(WorkItem) -> Fut,
		Fut: Future<Output = ()>,
	{
		let Some(mut receiver) = self.receiver.lock().take() else {
			return Error::QueueConsumerTaken;
		};
		let abandon_on_close = self.policy == ShutdownPolicy::Abandon;
		let span =
			StageSpan::new(Stage::Consume, "run").with_field(StageField::Policy, self.policy.as_str());

		span.instrument(async move {
			#[cfg(feature = "tracing")]
			tracing::info!(capacity = self.capacity, policy = %self.policy, "Starting consumer.");

			let stopped = loop {
				let item = tokio::select! {
					biased;
					_ = cancel.cancelled() => break Error::QueueCancelled,
					_ = self.closed.cancelled(), if abandon_on_close => {
						#[cfg(feature = "tracing")]
						if !receiver.is_empty() {
							tracing::warn!(abandoned = receiver.len(), "Discarding buffered items.");
						}

						break Error::QueueClosed;
					},
					next = receiver.recv() => match next {
						Some(item) => item,
						None => break Error::QueueClosed,
					},
				};

				handler(item).await;
			};

			#[cfg(feature = "tracing")]
			tracing::info!(reason = %stopped, "Stopped consumer.");

			stopped
		})
		.await
	}
}
impl Default for MemoryQueue {
	fn default() -> Self {
		Self::new()
	}
}
impl Debug for MemoryQueue {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("MemoryQueue")
			.field("capacity", &self.capacity)
			.field("policy", &self.policy)
			.field("open", &self.is_open())
			.field("consumer_attached", &self.receiver.lock().is_none())
			.finish()
	}
}
impl WorkSink for MemoryQueue {
	fn submit(&self, item: WorkItem) -> SubmitFuture<'_> {
		Box::pin(self.put(item))
	}

	fn is_accepting(&self) -> bool {
		self.is_open()
	}
}
