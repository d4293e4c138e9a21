//! The order and transaction state machines as pure data (§4.2, §4.4, design
//! note §9: "the state machine [should be] a pure function of (state,
//! event), tested in isolation from the loops that drive it").

pub mod order;
pub mod transaction;

use std::fmt;

/// An event was not a legal transition out of a given status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionError {
	entity: &'static str,
	detail: String,
}

impl TransitionError {
	pub(crate) fn new(entity: &'static str, from: impl fmt::Debug, event: impl fmt::Debug) -> Self {
		Self {
			entity,
			detail: format!("{from:?} has no transition for event {event:?}"),
		}
	}
}

impl fmt::Display for TransitionError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "illegal {} transition: {}", self.entity, self.detail)
	}
}

impl std::error::Error for TransitionError {}
