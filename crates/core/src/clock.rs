//! Time sources.
//!
//! Browser builds cannot use [`std::time::Instant`], so elapsed-time
//! measurements go through [`Clock`] and the wasm side supplies its own.

/// Monotonic millisecond clock used for locator timings.
pub trait Clock {
	fn now_ms(&self) -> f64;
}

impl<F: Fn() -> f64> Clock for F {
	fn now_ms(&self) -> f64 {
		self()
	}
}

/// [`Clock`] backed by [`std::time::Instant`].
#[cfg(not(all(target_arch = "wasm32", target_os = "unknown")))]
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
	origin: std::time::Instant,
}

#[cfg(not(all(target_arch = "wasm32", target_os = "unknown")))]
impl Default for MonotonicClock {
	fn default() -> Self {
		Self {
			origin: std::time::Instant::now(),
		}
	}
}

#[cfg(not(all(target_arch = "wasm32", target_os = "unknown")))]
impl Clock for MonotonicClock {
	fn now_ms(&self) -> f64 {
		self.origin.elapsed().as_secs_f64() * 1000.0
	}
}

/// Wall clock in Unix milliseconds, `0` if the system clock is before 1970.
#[cfg(not(all(target_arch = "wasm32", target_os = "unknown")))]
pub fn unix_millis() -> u64 {
	std::time::SystemTime::now()
		.duration_since(std::time::UNIX_EPOCH)
		.map(|d| d.as_millis() as u64)
		.unwrap_or(0)
}

/// Whole milliseconds between two clock readings.
pub(crate) fn elapsed_ms(start: f64, end: f64) -> u64 {
	(end - start).max(0.0).round() as u64
}
