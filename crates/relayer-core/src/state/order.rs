//! Pure `(MatchedStatus, OrderEvent) -> MatchedStatus` transition table
//! (§4.2's state diagram, design note §9 "state machine as data").
//!
//! Kept free of I/O and policy on purpose: a loop decides *when* an event
//! has occurred (a build failed, a validation passed), this module decides
//! whether that event is legal from the order's current status and what
//! status it lands on. An illegal transition is a state-corruption error
//! (§7 class 5) — it means a loop is about to apply an event the order's
//! history shouldn't allow.

use relayer_types::MatchedStatus;

use super::TransitionError;

/// An event a loop observed about an order, driving its next transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderEvent {
	/// The match loop claimed this order out of `Init` (§4.2 step 1).
	Claimed,
	/// A settlement transaction covering this order was broadcast (§4.2
	/// step 6).
	SettlementBroadcast,
	/// Building, signing, or submitting the covering settlement failed, or
	/// consensus was not reached in time (§4.2 steps 3-6, §9 bug fix: this
	/// always short-circuits before submission, never after a partial
	/// submit).
	SettlementAttemptFailed,
	/// The status-updater loop observed the covering transaction mined
	/// successfully (§4.4).
	TxSucceeded,
	/// The status-updater loop observed the covering transaction reverted
	/// (§4.4).
	TxFailed,
	/// The retry loop revalidated this order and it is still valid (§4.3).
	ValidationPassed,
	/// The retry loop revalidated this order and it is no longer valid
	/// (§4.3).
	ValidationFailed,
	/// `FailCount` reached `max_fail_allowed` (invariant 3).
	FailCountExceeded,
}

/// Applies `event` to an order currently in `from`, returning its next
/// status or an error if the transition isn't in the table.
pub fn transition(from: MatchedStatus, event: OrderEvent) -> Result<MatchedStatus, TransitionError> {
	use MatchedStatus::*;
	use OrderEvent::*;

	if from.is_terminal() {
		return Err(TransitionError::new("order", from, event));
	}

	let to = match (from, event) {
		(Init, Claimed) => MatchedInit,
		(MatchedInit, SettlementBroadcast) => SentPending,
		(MatchedInit, SettlementAttemptFailed) => SentFailed,
		(SentPending, SettlementAttemptFailed) => SentFailed,
		(SentPending, TxSucceeded) => FillComplete,
		(SentPending, TxFailed) => SentFailed,
		(SentFailed, ValidationPassed) => FailedConfirmed,
		(SentFailed, ValidationFailed) => Blocked,
		(SentFailed, FailCountExceeded) => Blocked,
		(MatchedInit, FailCountExceeded) => Blocked,
		_ => return Err(TransitionError::new("order", from, event)),
	};
	Ok(to)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn claim_moves_init_to_matched_init() {
		assert_eq!(transition(MatchedStatus::Init, OrderEvent::Claimed).unwrap(), MatchedStatus::MatchedInit);
	}

	#[test]
	fn broadcast_moves_matched_init_to_sent_pending() {
		assert_eq!(
			transition(MatchedStatus::MatchedInit, OrderEvent::SettlementBroadcast).unwrap(),
			MatchedStatus::SentPending
		);
	}

	#[test]
	fn build_sign_or_submit_failure_short_circuits_to_sent_failed() {
		assert_eq!(
			transition(MatchedStatus::MatchedInit, OrderEvent::SettlementAttemptFailed).unwrap(),
			MatchedStatus::SentFailed
		);
	}

	#[test]
	fn successful_mine_completes_the_fill() {
		assert_eq!(
			transition(MatchedStatus::SentPending, OrderEvent::TxSucceeded).unwrap(),
			MatchedStatus::FillComplete
		);
	}

	#[test]
	fn revalidation_can_either_confirm_or_block() {
		assert_eq!(
			transition(MatchedStatus::SentFailed, OrderEvent::ValidationPassed).unwrap(),
			MatchedStatus::FailedConfirmed
		);
		assert_eq!(
			transition(MatchedStatus::SentFailed, OrderEvent::ValidationFailed).unwrap(),
			MatchedStatus::Blocked
		);
	}

	#[test]
	fn terminal_statuses_reject_every_event() {
		assert!(transition(MatchedStatus::Blocked, OrderEvent::Claimed).is_err());
		assert!(transition(MatchedStatus::FillComplete, OrderEvent::TxFailed).is_err());
	}

	#[test]
	fn events_not_in_the_table_are_rejected() {
		assert!(transition(MatchedStatus::Init, OrderEvent::TxSucceeded).is_err());
		assert!(transition(MatchedStatus::FailedConfirmed, OrderEvent::Claimed).is_err());
	}
}
