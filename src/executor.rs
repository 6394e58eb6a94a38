// ---------------------------------------------------------------------------
// Executors -- serialized writers and the bounded reader pool
// ---------------------------------------------------------------------------
//
// A SerialExecutor is one named worker thread draining one queue: the
// single-writer guarantee for a basis (and for the global namespace) is
// exactly this. The ReaderPool fans read-only work over a fixed set of
// workers behind a bounded queue; a full queue rejects rather than
// blocks. Panics are trapped at the job boundary so a poisoned request
// can never take a worker down.
// ---------------------------------------------------------------------------

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::JoinHandle;

use parking_lot::Mutex;

use crate::error::EngineError;

pub type Job = Box<dyn FnOnce() + Send + 'static>;

fn run_trapped(name: &str, job: Job) {
	if catch_unwind(AssertUnwindSafe(job)).is_err() {
		tracing::error!(worker = name, "panic trapped in worker");
	}
}

// ---------------------------------------------------------------------------
// SerialExecutor
// ---------------------------------------------------------------------------

pub struct SerialExecutor {
	name: String,
	sender: Mutex<Option<mpsc::Sender<Job>>>,
	handle: Mutex<Option<JoinHandle<()>>>,
}

impl SerialExecutor {
	pub fn new(name: &str) -> Self {
		let (sender, receiver) = mpsc::channel::<Job>();
		let thread_name = name.to_string();
		let handle = std::thread::Builder::new()
			.name(thread_name.clone())
			.spawn(move || {
				for job in receiver {
					run_trapped(&thread_name, job);
				}
			})
			.ok();
		if handle.is_none() {
			tracing::error!(worker = name, "failed to spawn executor thread");
		}
		Self {
			name: name.to_string(),
			sender: Mutex::new(Some(sender)),
			handle: Mutex::new(handle),
		}
	}

	/// Enqueue a job. Returns false if the executor has been shut down;
	/// the job is dropped in that case.
	pub fn execute(&self, job: Job) -> bool {
		match self.sender.lock().as_ref() {
			Some(sender) => sender.send(job).is_ok(),
			None => false,
		}
	}

	/// Close the queue and wait for every already-enqueued job to finish.
	/// Must not be called from the executor's own worker thread.
	pub fn shutdown(&self) {
		drop(self.sender.lock().take());
		if let Some(handle) = self.handle.lock().take() {
			if handle.join().is_err() {
				tracing::error!(worker = %self.name, "executor thread panicked");
			}
		}
	}
}

impl Drop for SerialExecutor {
	fn drop(&mut self) {
		self.shutdown();
	}
}

// ---------------------------------------------------------------------------
// ReaderPool
// ---------------------------------------------------------------------------

pub struct ReaderPool {
	sender: Mutex<Option<mpsc::SyncSender<Job>>>,
	handles: Mutex<Vec<JoinHandle<()>>>,
}

impl ReaderPool {
	pub fn new(workers: usize, queue: usize) -> Self {
		let (sender, receiver) = mpsc::sync_channel::<Job>(queue.max(1));
		let receiver = Arc::new(Mutex::new(receiver));
		let mut handles = Vec::with_capacity(workers);
		for i in 0..workers.max(1) {
			let receiver = receiver.clone();
			let name = format!("simrec-reader-{i}");
			let spawned = std::thread::Builder::new().name(name.clone()).spawn(move || {
				loop {
					// hold the lock only for the dequeue, not the job
					let job = match receiver.lock().recv() {
						Ok(job) => job,
						Err(_) => break,
					};
					run_trapped(&name, job);
				}
			});
			match spawned {
				Ok(handle) => handles.push(handle),
				Err(e) => tracing::error!(worker = i, error = %e, "failed to spawn reader"),
			}
		}
		Self {
			sender: Mutex::new(Some(sender)),
			handles: Mutex::new(handles),
		}
	}

	/// Enqueue without blocking. A saturated queue fails with `Rejected`
	/// so the dispatcher can still answer the caller.
	pub fn try_execute(&self, job: Job) -> Result<(), EngineError> {
		let guard = self.sender.lock();
		let Some(sender) = guard.as_ref() else {
			return Err(EngineError::Internal("reader pool shut down".into()));
		};
		match sender.try_send(job) {
			Ok(()) => Ok(()),
			Err(mpsc::TrySendError::Full(_)) => Err(EngineError::Rejected),
			Err(mpsc::TrySendError::Disconnected(_)) => {
				Err(EngineError::Internal("reader pool shut down".into()))
			}
		}
	}

	pub fn shutdown(&self) {
		drop(self.sender.lock().take());
		for handle in self.handles.lock().drain(..) {
			if handle.join().is_err() {
				tracing::error!("reader thread panicked");
			}
		}
	}
}

impl Drop for ReaderPool {
	fn drop(&mut self) {
		self.shutdown();
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::sync::atomic::{AtomicUsize, Ordering};
	use std::time::Duration;

	#[test]
	fn serial_executor_preserves_submission_order() {
		let executor = SerialExecutor::new("test-serial");
		let seen = Arc::new(Mutex::new(Vec::new()));
		for i in 0..100 {
			let seen = seen.clone();
			assert!(executor.execute(Box::new(move || {
				seen.lock().push(i);
			})));
		}
		executor.shutdown();
		let seen = seen.lock();
		assert_eq!(*seen, (0..100).collect::<Vec<_>>());
	}

	#[test]
	fn serial_executor_survives_panicking_job() {
		let executor = SerialExecutor::new("test-panic");
		executor.execute(Box::new(|| panic!("boom")));
		let ran = Arc::new(AtomicUsize::new(0));
		let ran2 = ran.clone();
		executor.execute(Box::new(move || {
			ran2.fetch_add(1, Ordering::SeqCst);
		}));
		executor.shutdown();
		assert_eq!(ran.load(Ordering::SeqCst), 1);
	}

	#[test]
	fn serial_executor_rejects_after_shutdown() {
		let executor = SerialExecutor::new("test-closed");
		executor.shutdown();
		assert!(!executor.execute(Box::new(|| {})));
	}

	#[test]
	fn reader_pool_runs_jobs() {
		let pool = ReaderPool::new(4, 16);
		let count = Arc::new(AtomicUsize::new(0));
		for _ in 0..32 {
			let count = count.clone();
			pool.try_execute(Box::new(move || {
				count.fetch_add(1, Ordering::SeqCst);
			}))
			.unwrap();
		}
		pool.shutdown();
		assert_eq!(count.load(Ordering::SeqCst), 32);
	}

	#[test]
	fn reader_pool_rejects_when_saturated() {
		let pool = ReaderPool::new(1, 1);
		let (gate_tx, gate_rx) = mpsc::channel::<()>();

		// occupy the single worker
		pool.try_execute(Box::new(move || {
			let _ = gate_rx.recv_timeout(Duration::from_secs(5));
		}))
		.unwrap();

		// fill the queue, then expect rejection
		let mut rejected = false;
		for _ in 0..8 {
			if let Err(EngineError::Rejected) = pool.try_execute(Box::new(|| {})) {
				rejected = true;
				break;
			}
			// give the worker a moment to drain if it raced us
			std::thread::sleep(Duration::from_millis(1));
		}
		assert!(rejected);
		let _ = gate_tx.send(());
		pool.shutdown();
	}
}
