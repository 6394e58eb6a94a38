// ---------------------------------------------------------------------------
// SaveScheduler -- the periodic snapshot timer
// ---------------------------------------------------------------------------

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// Fires a tick every `interval`, the first one after an initial delay of
/// `interval`. Shutdown is cooperative: the wait is sliced so stop takes
/// effect within a few milliseconds.
pub struct SaveScheduler {
	stop: Arc<AtomicBool>,
	handle: Option<JoinHandle<()>>,
}

impl SaveScheduler {
	pub fn start<F>(interval: Duration, tick: F) -> Self
	where
		F: Fn() + Send + 'static,
	{
		let stop = Arc::new(AtomicBool::new(false));
		let stop_thread = stop.clone();
		let handle = std::thread::Builder::new()
			.name("simrec-cron".to_string())
			.spawn(move || loop {
				let deadline = Instant::now() + interval;
				loop {
					if stop_thread.load(Ordering::Relaxed) {
						return;
					}
					let now = Instant::now();
					if now >= deadline {
						break;
					}
					let remaining = deadline.saturating_duration_since(now);
					std::thread::sleep(remaining.min(Duration::from_millis(25)));
				}
				tick();
			})
			.ok();
		if handle.is_none() {
			tracing::error!("failed to spawn cron thread");
		}
		Self { stop, handle }
	}

	pub fn stop(&mut self) {
		self.stop.store(true, Ordering::Relaxed);
		if let Some(handle) = self.handle.take() {
			let _ = handle.join();
		}
	}
}

impl Drop for SaveScheduler {
	fn drop(&mut self) {
		self.stop();
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::sync::atomic::AtomicUsize;

	#[test]
	fn ticks_repeatedly_after_initial_delay() {
		let count = Arc::new(AtomicUsize::new(0));
		let count_tick = count.clone();
		let mut cron = SaveScheduler::start(Duration::from_millis(10), move || {
			count_tick.fetch_add(1, Ordering::SeqCst);
		});
		std::thread::sleep(Duration::from_millis(120));
		cron.stop();
		let ticks = count.load(Ordering::SeqCst);
		assert!(ticks >= 2, "expected repeated ticks, got {ticks}");
	}

	#[test]
	fn stop_prevents_further_ticks() {
		let count = Arc::new(AtomicUsize::new(0));
		let count_tick = count.clone();
		let mut cron = SaveScheduler::start(Duration::from_millis(10), move || {
			count_tick.fetch_add(1, Ordering::SeqCst);
		});
		std::thread::sleep(Duration::from_millis(40));
		cron.stop();
		let after_stop = count.load(Ordering::SeqCst);
		std::thread::sleep(Duration::from_millis(40));
		assert_eq!(count.load(Ordering::SeqCst), after_stop);
	}

	#[test]
	fn stop_before_first_tick() {
		let count = Arc::new(AtomicUsize::new(0));
		let count_tick = count.clone();
		let mut cron = SaveScheduler::start(Duration::from_secs(3600), move || {
			count_tick.fetch_add(1, Ordering::SeqCst);
		});
		cron.stop();
		assert_eq!(count.load(Ordering::SeqCst), 0);
	}
}
