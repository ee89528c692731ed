//! Observability helpers for the delivery path.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit structured spans named `sparty.stage` with the `stage` and
//!   `call_site` fields. Stages fill in their own [`StageField`]s: the delivered `item`, the
//!   refresh `grant`, the consumer's shutdown `policy`.
//! - Enable `metrics` to increment the `sparty_stage_total` counter for every
//!   attempt/success/failure, labeled by `stage` + `outcome`.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Stages of the relay that are observed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Stage {
	/// Credential refresh exchange against the authorization endpoint.
	Refresh,
	/// Authenticated call against the delivery endpoint.
	Deliver,
	/// Acceptance of a work item into the queue.
	Submit,
	/// Consumer loop lifetime.
	Consume,
}
impl Stage {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Stage::Refresh => "refresh",
			Stage::Deliver => "deliver",
			Stage::Submit => "submit",
			Stage::Consume => "consume",
		}
	}
}
impl Display for Stage {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Optional span fields a stage can attach to its [`StageSpan`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StageField {
	/// Work item being delivered or submitted.
	Item,
	/// Grant type used by a credential refresh.
	Grant,
	/// Shutdown policy of the consumer loop.
	Policy,
}
impl StageField {
	/// Span field name.
	pub const fn as_str(self) -> &'static str {
		match self {
			StageField::Item => "item",
			StageField::Grant => "grant",
			StageField::Policy => "policy",
		}
	}
}

/// Outcome labels recorded for each stage.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Outcome {
	/// Entry to a stage.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
}
impl Outcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Outcome::Attempt => "attempt",
			Outcome::Success => "success",
			Outcome::Failure => "failure",
		}
	}

	/// Maps a result onto its success/failure label.
	pub fn of<T, E>(result: &std::result::Result<T, E>) -> Self {
		if result.is_ok() { Outcome::Success } else { Outcome::Failure }
	}
}
impl Display for Outcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
