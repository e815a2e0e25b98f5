//! Small helpers shared by the layout math and the CLI front-ends.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Returns the current timestamp since the Unix epoch.
pub fn get_timestamp() -> Duration {
	SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.expect("system clock is before the Unix epoch")
}

/// Divides `a` by `b`, rounding up.
pub fn ceil_division(a: u64, b: u64) -> u64 {
	(a + b - 1) / b
}
