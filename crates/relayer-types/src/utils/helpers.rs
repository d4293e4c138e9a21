//! Helper utilities for common operations.

/// Returns the current UNIX timestamp in seconds, or 0 if system time is
/// somehow before the UNIX epoch.
pub fn current_timestamp() -> u64 {
	std::time::SystemTime::now()
		.duration_since(std::time::UNIX_EPOCH)
		.map(|d| d.as_secs())
		.unwrap_or(0)
}

/// Shortens an identifier to its first and last few characters for log lines,
/// e.g. `"ord_9f31...7a2c"`.
pub fn truncate_id(id: &str) -> String {
	if id.len() <= 14 {
		return id.to_string();
	}
	format!("{}...{}", &id[..8], &id[id.len() - 4..])
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn truncate_id_leaves_short_ids_alone() {
		assert_eq!(truncate_id("ord_1"), "ord_1");
	}

	#[test]
	fn truncate_id_shortens_long_ids() {
		let id = "ord_9f31aa9c2e7d4b1f8a2c7a2c";
		let short = truncate_id(id);
		assert!(short.contains("..."));
		assert!(short.len() < id.len());
	}
}
