//! Pure `(TransactionStatus, TxEvent) -> TransactionStatus` transition table
//! (§4.4's state diagram).

use relayer_types::TransactionStatus;

use super::TransitionError;

/// An event a loop observed about a transaction log, driving its next
/// transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxEvent {
	/// The status-updater loop observed the transaction mined and
	/// successful (§4.4).
	Mined,
	/// The status-updater loop observed the transaction mined and reverted
	/// (§4.4).
	Reverted,
	/// The status-updater loop's grace period elapsed with the transaction
	/// still unknown to the chain (§4.4).
	GraceExpired,
	/// The retry loop reconciled a `Failed` log by revalidating its orders
	/// (§4.3).
	Reconciled,
}

/// Applies `event` to a transaction log currently in `from`, returning its
/// next status or an error if the transition isn't in the table.
pub fn transition(from: TransactionStatus, event: TxEvent) -> Result<TransactionStatus, TransitionError> {
	use TransactionStatus::*;
	use TxEvent::*;

	if from.is_terminal() {
		return Err(TransitionError::new("transaction", from, event));
	}

	let to = match (from, event) {
		(Pending, Mined) => Success,
		(Pending, Reverted) => Failed,
		(Pending, GraceExpired) => NotFound,
		(Failed, Reconciled) => FailedConfirmed,
		_ => return Err(TransitionError::new("transaction", from, event)),
	};
	Ok(to)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn mined_success_completes_the_log() {
		assert_eq!(transition(TransactionStatus::Pending, TxEvent::Mined).unwrap(), TransactionStatus::Success);
	}

	#[test]
	fn mined_revert_marks_failed() {
		assert_eq!(transition(TransactionStatus::Pending, TxEvent::Reverted).unwrap(), TransactionStatus::Failed);
	}

	#[test]
	fn grace_expiry_marks_not_found() {
		assert_eq!(
			transition(TransactionStatus::Pending, TxEvent::GraceExpired).unwrap(),
			TransactionStatus::NotFound
		);
	}

	#[test]
	fn reconciling_a_failed_log_is_terminal() {
		assert_eq!(
			transition(TransactionStatus::Failed, TxEvent::Reconciled).unwrap(),
			TransactionStatus::FailedConfirmed
		);
	}

	#[test]
	fn terminal_statuses_reject_every_event() {
		assert!(transition(TransactionStatus::Success, TxEvent::Mined).is_err());
		assert!(transition(TransactionStatus::FailedConfirmed, TxEvent::Reconciled).is_err());
		assert!(transition(TransactionStatus::Lost, TxEvent::Mined).is_err());
	}

	#[test]
	fn not_found_has_no_outgoing_transition_in_this_table() {
		// §9 open question: NotFound -> Lost reconciliation is deliberately
		// not implemented; no event in this table moves a log out of
		// NotFound.
		assert!(transition(TransactionStatus::NotFound, TxEvent::Reconciled).is_err());
	}
}
