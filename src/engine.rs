// ---------------------------------------------------------------------------
// Engine -- the dispatch and coordination layer
// ---------------------------------------------------------------------------
//
// Public operation surface over the catalog, the executors and the
// per-basis kernels. Each operation validates synchronously on the
// caller's thread, then routes work: global namespace mutations and
// enumerations to the management executor, kernel mutations to the owning
// basis's writer, read-only lookups to the bounded reader pool.
// Fire-and-forget writes acknowledge right after enqueue; their failures
// surface in the log under a scope tag. Validation on the caller's thread
// is advisory; ops that mutate the namespace re-check under their
// executor, where the view is authoritative.
// ---------------------------------------------------------------------------

use std::collections::{HashMap, HashSet};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};

use crate::basis::Basis;
use crate::catalog::Catalog;
use crate::config::EngineConfig;
use crate::cron::SaveScheduler;
use crate::error::EngineError;
use crate::events::{RecommendationListener, StoreListener, VectorSetListener};
use crate::executor::{Job, ReaderPool, SerialExecutor};
use crate::store::BasisStore;
use crate::types::{parse_rkey, rkey, Callback, Kind, Reply};
use crate::validate;

// ---------------------------------------------------------------------------
// Shared core
// ---------------------------------------------------------------------------

struct EngineShared {
	config: EngineConfig,
	save_dir: PathBuf,
	catalog: Arc<RwLock<Catalog>>,
	bases: RwLock<HashMap<String, Arc<RwLock<BasisStore>>>>,
	writers: RwLock<HashMap<String, Arc<SerialExecutor>>>,
	mngm: SerialExecutor,
	readers: ReaderPool,
	/// bases with a bsave still draining; a cron fire skips these
	saving: Mutex<HashSet<String>>,
}

impl EngineShared {
	fn dump_path(&self, bkey: &str) -> PathBuf {
		self.save_dir.join(format!("{bkey}.dmp"))
	}

	fn store(&self, bkey: &str) -> Option<Arc<RwLock<BasisStore>>> {
		self.bases.read().get(bkey).cloned()
	}

	fn writer(&self, bkey: &str) -> Option<Arc<SerialExecutor>> {
		self.writers.read().get(bkey).cloned()
	}

	fn store_or_unknown(&self, bkey: &str) -> Result<Arc<RwLock<BasisStore>>, EngineError> {
		self.store(bkey)
			.ok_or_else(|| EngineError::UnknownEntry(bkey.to_string()))
	}

	/// Register a new basis: kernel store with the catalog bridge
	/// attached, catalog entry, writer executor.
	fn create_basis(&self, bkey: &str, schema: Vec<String>) {
		let limit = self.config.basis_limit(bkey);
		let mut store = BasisStore::new(Basis::new(bkey, schema), limit);
		store.add_store_listener(Arc::new(CatalogBridge {
			catalog: self.catalog.clone(),
		}));
		self.bases
			.write()
			.insert(bkey.to_string(), Arc::new(RwLock::new(store)));
		self.catalog.write().add_basis(bkey);
		self.writers.write().insert(
			bkey.to_string(),
			Arc::new(SerialExecutor::new(&format!("simrec-writer-{bkey}"))),
		);
	}

	/// Full basis teardown, run on the management executor. The writer is
	/// detached first so no new work lands, then drained; only after the
	/// writer is gone are the kernel and the catalog entries removed, so
	/// no half-torn state is ever observable.
	fn teardown_basis(&self, bkey: &str) {
		let writer = self.writers.write().remove(bkey);
		if let Some(writer) = writer {
			writer.shutdown();
		}
		self.bases.write().remove(bkey);

		let mut catalog = self.catalog.write();
		for vkey in catalog.vector_sets(bkey) {
			for target in catalog.targets(&vkey) {
				catalog.remove_recommendation(&vkey, &target);
			}
			for source in catalog.sources(&vkey) {
				catalog.remove_recommendation(&source, &vkey);
			}
			catalog.remove_vector_set(&vkey);
		}
		catalog.remove_basis(bkey);
		drop(catalog);

		self.saving.lock().remove(bkey);
	}

	/// Cascade for one vector set, run on its basis's writer. The edge
	/// sets are snapshotted before anything shrinks them.
	fn delete_vector_set(&self, bkey: &str, vkey: &str) -> Result<(), EngineError> {
		let store = self.store_or_unknown(bkey)?;
		let (targets, sources) = {
			let catalog = self.catalog.read();
			(catalog.targets(vkey), catalog.sources(vkey))
		};

		let mut store = store.write();
		for target in &targets {
			if let Err(e) = store.rdel(&rkey(vkey, target)) {
				tracing::warn!(key = %rkey(vkey, target), error = %e, "cascade rdel failed");
			}
			self.catalog.write().remove_recommendation(vkey, target);
		}
		for source in &sources {
			if source == vkey {
				continue;
			}
			if let Err(e) = store.rdel(&rkey(source, vkey)) {
				tracing::warn!(key = %rkey(source, vkey), error = %e, "cascade rdel failed");
			}
			self.catalog.write().remove_recommendation(source, vkey);
		}
		store.vdel(vkey)?;
		drop(store);

		self.catalog.write().remove_vector_set(vkey);
		Ok(())
	}

	fn delete_recommendation(&self, bkey: &str, key: &str) -> Result<(), EngineError> {
		let (source, target) = parse_rkey(key)
			.map(|(s, t)| (s.to_string(), t.to_string()))
			.ok_or_else(|| EngineError::Internal(format!("unparseable recommendation key '{key}'")))?;
		let store = self.store_or_unknown(bkey)?;
		store.write().rdel(key)?;
		self.catalog.write().remove_recommendation(&source, &target);
		Ok(())
	}

	/// Enqueue a snapshot of one basis onto its writer, guarded by the
	/// in-flight flag. Persistence failures are logged and never block
	/// subsequent writes.
	fn enqueue_bsave(self: &Arc<Self>, bkey: &str) {
		if !self.saving.lock().insert(bkey.to_string()) {
			tracing::debug!(basis = %bkey, "save already in flight, skipped");
			return;
		}
		let Some(writer) = self.writer(bkey) else {
			self.saving.lock().remove(bkey);
			return;
		};

		let weak = Arc::downgrade(self);
		let bkey_owned = bkey.to_string();
		let bkey = bkey_owned.clone();
		let accepted = writer.execute(Box::new(move || {
			let Some(shared) = weak.upgrade() else { return };
			let result = match shared.store(&bkey) {
				Some(store) => store.read().bsave(&shared.dump_path(&bkey)),
				None => Err(EngineError::UnknownEntry(bkey.clone())),
			};
			match result {
				Ok(()) => tracing::info!(basis = %bkey, "basis saved"),
				Err(e) => tracing::error!(scope = "bsave", basis = %bkey, error = %e, "save failed"),
			}
			shared.saving.lock().remove(&bkey);
		}));
		if !accepted {
			self.saving.lock().remove(&bkey_owned);
		}
	}

	fn save_all(self: &Arc<Self>) {
		for bkey in self.catalog.read().bases() {
			self.enqueue_bsave(&bkey);
		}
	}

	/// Bump the write counter and emit a progress line every bycount-th
	/// write.
	fn note_write(&self, vkey: &str, verb: &str) {
		let counter = self.catalog.write().bump_counter(vkey);
		if self.config.bycount > 0 && counter % self.config.bycount == 0 {
			tracing::info!("{verb} {counter} to {vkey}");
		}
	}
}

// ---------------------------------------------------------------------------
// Listener bridge
// ---------------------------------------------------------------------------

/// Applies kernel-initiated entity events to the catalog, exactly as
/// `vmk`/`del`/`rmk` would, without re-issuing kernel calls.
struct CatalogBridge {
	catalog: Arc<RwLock<Catalog>>,
}

impl StoreListener for CatalogBridge {
	fn on_vecset_added(&self, bkey: &str, vkey: &str) {
		self.catalog.write().add_vector_set(bkey, vkey);
	}

	fn on_vecset_deleted(&self, _bkey: &str, vkey: &str) {
		self.catalog.write().remove_vector_set(vkey);
	}

	fn on_rec_added(&self, bkey: &str, source: &str, target: &str) {
		self.catalog.write().add_recommendation(bkey, source, target);
	}

	fn on_rec_deleted(&self, _bkey: &str, source: &str, target: &str) {
		self.catalog.write().remove_recommendation(source, target);
	}
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

pub struct Engine {
	shared: Arc<EngineShared>,
	cron: Mutex<Option<SaveScheduler>>,
}

fn ack(callback: Option<Callback>) {
	if let Some(callback) = callback {
		callback(Ok(Reply::Ok));
	}
}

fn reply_err(callback: Option<Callback>, error: EngineError) {
	match callback {
		Some(callback) => callback(Err(error)),
		None => tracing::warn!(error = %error, "internal operation rejected"),
	}
}

impl Engine {
	/// Build the engine, restore every dump under the save directory and
	/// start the periodic save timer.
	pub fn new(config: EngineConfig) -> Self {
		let save_dir = config.save_dir();
		let shared = Arc::new(EngineShared {
			save_dir,
			catalog: Arc::new(RwLock::new(Catalog::new())),
			bases: RwLock::new(HashMap::new()),
			writers: RwLock::new(HashMap::new()),
			mngm: SerialExecutor::new("simrec-mngm"),
			readers: ReaderPool::new(config.reader_workers, config.reader_queue),
			saving: Mutex::new(HashSet::new()),
			config,
		});

		let engine = Self {
			shared: shared.clone(),
			cron: Mutex::new(None),
		};
		engine.load(None);

		let interval = Duration::from_millis(shared.config.saveinterval_ms.max(1));
		let weak = Arc::downgrade(&shared);
		*engine.cron.lock() = Some(SaveScheduler::start(interval, move || {
			if let Some(shared) = weak.upgrade() {
				shared.save_all();
			}
		}));

		engine
	}

	pub fn save_dir(&self) -> &Path {
		&self.shared.save_dir
	}

	/// Stop the timer and drain every executor. Called from Drop; safe to
	/// call twice.
	pub fn shutdown(&self) {
		if let Some(mut cron) = self.cron.lock().take() {
			cron.stop();
		}
		self.shared.mngm.shutdown();
		let writers: Vec<Arc<SerialExecutor>> =
			self.shared.writers.write().drain().map(|(_, w)| w).collect();
		for writer in writers {
			writer.shutdown();
		}
		self.shared.readers.shutdown();
	}

	// -- Submission helpers ----------------------------------------------------

	fn submit_reply<F>(&self, exec: &SerialExecutor, scope: &'static str, callback: Callback, work: F)
	where
		F: FnOnce(&EngineShared) -> Result<Reply, EngineError> + Send + 'static,
	{
		let weak = Arc::downgrade(&self.shared);
		// a closed queue only happens during shutdown; the callback is
		// dropped with the job then
		exec.execute(Box::new(move || {
			let Some(shared) = weak.upgrade() else { return };
			let result = match catch_unwind(AssertUnwindSafe(|| work(&shared))) {
				Ok(result) => result,
				Err(_) => Err(EngineError::kernel(scope, "panic trapped in worker")),
			};
			if let Err(ref e) = result {
				tracing::error!(scope, error = %e, "operation failed");
			}
			callback(result);
		}));
	}

	fn submit_logged<F>(&self, exec: &SerialExecutor, scope: &'static str, work: F)
	where
		F: FnOnce(&EngineShared) -> Result<(), EngineError> + Send + 'static,
	{
		let weak = Arc::downgrade(&self.shared);
		exec.execute(Box::new(move || {
			let Some(shared) = weak.upgrade() else { return };
			let result = match catch_unwind(AssertUnwindSafe(|| work(&shared))) {
				Ok(result) => result,
				Err(_) => Err(EngineError::kernel(scope, "panic trapped in worker")),
			};
			if let Err(e) = result {
				tracing::error!(scope, error = %e, "async operation failed");
			}
		}));
	}

	fn submit_read<F>(&self, scope: &'static str, callback: Callback, work: F)
	where
		F: FnOnce(&EngineShared) -> Result<Reply, EngineError> + Send + 'static,
	{
		// the callback lives outside the job so a rejected request can
		// still be answered
		let slot = Arc::new(Mutex::new(Some(callback)));
		let job_slot = slot.clone();
		let weak = Arc::downgrade(&self.shared);
		let job: Job = Box::new(move || {
			let Some(callback) = job_slot.lock().take() else { return };
			let Some(shared) = weak.upgrade() else { return };
			let result = match catch_unwind(AssertUnwindSafe(|| work(&shared))) {
				Ok(result) => result,
				Err(_) => Err(EngineError::kernel(scope, "panic trapped in worker")),
			};
			callback(result);
		});
		if let Err(error) = self.shared.readers.try_execute(job) {
			tracing::warn!(scope, error = %error, "read rejected");
			if let Some(callback) = slot.lock().take() {
				callback(Err(error));
			}
		}
	}

	// -- Basis operations --------------------------------------------------

	pub fn blist(&self, callback: Callback) {
		self.submit_reply(&self.shared.mngm, "blist", callback, |shared| {
			Ok(Reply::StringList(shared.catalog.read().bases()))
		});
	}

	pub fn bmk(&self, bkey: &str, schema: &[String], callback: Callback) {
		let bkey = bkey.to_string();
		let schema = schema.to_vec();
		self.submit_reply(&self.shared.mngm, "bmk", callback, move |shared| {
			validate::valid_key_format(&bkey)?;
			validate::not_exists(&shared.catalog.read(), &bkey)?;
			shared.create_basis(&bkey, schema);
			Ok(Reply::Ok)
		});
	}

	pub fn brev(&self, bkey: &str, schema: &[String], callback: Callback) {
		{
			let catalog = self.shared.catalog.read();
			if let Err(e) = validate::kind_is(&catalog, "brev", bkey, Kind::Basis)
				.and_then(|()| validate::valid_key_format(bkey))
			{
				callback(Err(e));
				return;
			}
		}
		let Some(writer) = self.shared.writer(bkey) else {
			callback(Err(EngineError::UnknownEntry(bkey.to_string())));
			return;
		};
		let bkey = bkey.to_string();
		let schema = schema.to_vec();
		self.submit_reply(&writer, "brev", callback, move |shared| {
			let store = shared.store_or_unknown(&bkey)?;
			store.write().brev(schema);
			Ok(Reply::Ok)
		});
	}

	pub fn bget(&self, bkey: &str, callback: Callback) {
		{
			let catalog = self.shared.catalog.read();
			if let Err(e) = validate::kind_is(&catalog, "bget", bkey, Kind::Basis) {
				callback(Err(e));
				return;
			}
		}
		let bkey = bkey.to_string();
		self.submit_read("bget", callback, move |shared| {
			let store = shared.store_or_unknown(&bkey)?;
			let schema = store.read().bget();
			Ok(Reply::StringList(schema))
		});
	}

	pub fn bload(&self, bkey: &str, callback: Option<Callback>) {
		let bkey = bkey.to_string();
		self.submit_logged(&self.shared.mngm, "bload", move |shared| {
			validate::valid_key_format(&bkey)?;
			let path = shared.dump_path(&bkey);
			validate::valid_dump_path(&path)?;
			// replacing an existing basis: tear it down synchronously,
			// right here, before the shell of the new one appears
			if shared.catalog.read().contains(&bkey) {
				shared.teardown_basis(&bkey);
			}
			shared.create_basis(&bkey, Vec::new());
			let store = shared.store_or_unknown(&bkey)?;
			store.write().bload(&path)?;
			tracing::info!(basis = %bkey, "basis loaded");
			Ok(())
		});
		ack(callback);
	}

	pub fn bsave(&self, bkey: &str, callback: Option<Callback>) {
		{
			let catalog = self.shared.catalog.read();
			if let Err(e) = validate::kind_is(&catalog, "bsave", bkey, Kind::Basis) {
				reply_err(callback, e);
				return;
			}
		}
		self.shared.enqueue_bsave(bkey);
		ack(callback);
	}

	// -- Vector set operations ----------------------------------------------

	pub fn vlist(&self, bkey: &str, callback: Callback) {
		let bkey = bkey.to_string();
		self.submit_reply(&self.shared.mngm, "vlist", callback, move |shared| {
			let catalog = shared.catalog.read();
			validate::kind_is(&catalog, "vlist", &bkey, Kind::Basis)?;
			Ok(Reply::StringList(catalog.vector_sets(&bkey)))
		});
	}

	pub fn vmk(&self, bkey: &str, vkey: &str, callback: Callback) {
		let bkey = bkey.to_string();
		let vkey = vkey.to_string();
		self.submit_reply(&self.shared.mngm, "vmk", callback, move |shared| {
			{
				let catalog = shared.catalog.read();
				validate::kind_is(&catalog, "vmk", &bkey, Kind::Basis)?;
				validate::valid_key_format(&vkey)?;
				validate::not_exists(&catalog, &vkey)?;
			}
			let store = shared.store_or_unknown(&bkey)?;
			store.write().vmk(&vkey)?;
			shared.catalog.write().add_vector_set(&bkey, &vkey);
			Ok(Reply::Ok)
		});
	}

	pub fn vids(&self, vkey: &str, callback: Callback) {
		let bkey = match self.vector_set_basis("vids", vkey) {
			Ok(bkey) => bkey,
			Err(e) => {
				callback(Err(e));
				return;
			}
		};
		let vkey = vkey.to_string();
		self.submit_read("vids", callback, move |shared| {
			let store = shared.store_or_unknown(&bkey)?;
			let ids = store.read().vids(&vkey)?;
			Ok(Reply::IntList(ids))
		});
	}

	pub fn vget(&self, vkey: &str, vecid: i64, callback: Callback) {
		let bkey = match self.vector_set_basis("vget", vkey) {
			Ok(bkey) => bkey,
			Err(e) => {
				callback(Err(e));
				return;
			}
		};
		let vkey = vkey.to_string();
		self.submit_read("vget", callback, move |shared| {
			let store = shared.store_or_unknown(&bkey)?;
			let components = store.read().vget(&vkey, vecid)?;
			Ok(Reply::FloatList(components))
		});
	}

	pub fn vadd(&self, vkey: &str, vecid: i64, components: Vec<f32>, callback: Callback) {
		self.dense_write("vadd", "adding dense vectors", vkey, vecid, components, callback,
			|store, vkey, vecid, components| store.vadd(vkey, vecid, components));
	}

	pub fn vset(&self, vkey: &str, vecid: i64, components: Vec<f32>, callback: Callback) {
		self.dense_write("vset", "setting dense vectors", vkey, vecid, components, callback,
			|store, vkey, vecid, components| store.vset(vkey, vecid, components));
	}

	pub fn vacc(&self, vkey: &str, vecid: i64, components: Vec<f32>, callback: Callback) {
		self.dense_write("vacc", "accumulating dense vectors", vkey, vecid, components, callback,
			|store, vkey, vecid, components| store.vacc(vkey, vecid, &components));
	}

	pub fn vrem(&self, vkey: &str, vecid: i64, callback: Callback) {
		let bkey = match self.vector_set_basis("vrem", vkey) {
			Ok(bkey) => bkey,
			Err(e) => {
				callback(Err(e));
				return;
			}
		};
		let Some(writer) = self.shared.writer(&bkey) else {
			callback(Err(EngineError::UnknownEntry(bkey)));
			return;
		};
		let vkey = vkey.to_string();
		self.submit_logged(&writer, "vrem", move |shared| {
			let store = shared.store_or_unknown(&bkey)?;
			let result = store.write().vrem(&vkey, vecid);
			result
		});
		callback(Ok(Reply::Ok));
	}

	// -- Sparse vector operations ---------------------------------------------

	pub fn iget(&self, vkey: &str, vecid: i64, callback: Callback) {
		let bkey = {
			let catalog = self.shared.catalog.read();
			match validate::exists(&catalog, vkey)
				.and_then(|()| self.basis_of(&catalog, vkey))
			{
				Ok(bkey) => bkey,
				Err(e) => {
					callback(Err(e));
					return;
				}
			}
		};
		let vkey = vkey.to_string();
		self.submit_read("iget", callback, move |shared| {
			let store = shared.store_or_unknown(&bkey)?;
			let pairs = store.read().iget(&vkey, vecid)?;
			Ok(Reply::IntList(pairs))
		});
	}

	pub fn iadd(&self, vkey: &str, vecid: i64, pairs: Vec<i64>, callback: Callback) {
		self.sparse_write("iadd", "adding sparse vectors", vkey, vecid, pairs, callback,
			|store, vkey, vecid, pairs| store.iadd(vkey, vecid, pairs));
	}

	pub fn iset(&self, vkey: &str, vecid: i64, pairs: Vec<i64>, callback: Callback) {
		self.sparse_write("iset", "setting sparse vectors", vkey, vecid, pairs, callback,
			|store, vkey, vecid, pairs| store.iset(vkey, vecid, pairs));
	}

	pub fn iacc(&self, vkey: &str, vecid: i64, pairs: Vec<i64>, callback: Callback) {
		self.sparse_write("iacc", "accumulating sparse vectors", vkey, vecid, pairs, callback,
			|store, vkey, vecid, pairs| store.iacc(vkey, vecid, pairs));
	}

	// -- Recommendation operations ----------------------------------------------

	pub fn rlist(&self, vkey: &str, callback: Callback) {
		let vkey = vkey.to_string();
		self.submit_reply(&self.shared.mngm, "rlist", callback, move |shared| {
			let catalog = shared.catalog.read();
			validate::kind_is(&catalog, "rlist", &vkey, Kind::VectorSet)?;
			Ok(Reply::StringList(catalog.targets(&vkey)))
		});
	}

	pub fn rmk(&self, source: &str, target: &str, funcscore: &str, callback: Callback) {
		let source = source.to_string();
		let target = target.to_string();
		let funcscore = funcscore.to_string();
		self.submit_reply(&self.shared.mngm, "rmk", callback, move |shared| {
			let bkey = {
				let catalog = shared.catalog.read();
				validate::kind_is(&catalog, "rmk", &source, Kind::VectorSet)?;
				validate::kind_is(&catalog, "rmk", &target, Kind::VectorSet)?;
				validate::same_basis(&catalog, &source, &target)?;
				validate::not_exists(&catalog, &rkey(&source, &target))?;
				catalog
					.basis_of(&source)
					.map(str::to_string)
					.ok_or_else(|| EngineError::UnknownEntry(source.clone()))?
			};
			let store = shared.store_or_unknown(&bkey)?;
			store.write().rmk(&source, &target, &funcscore)?;
			shared
				.catalog
				.write()
				.add_recommendation(&bkey, &source, &target);
			Ok(Reply::Ok)
		});
	}

	pub fn rget(&self, source: &str, vecid: i64, target: &str, callback: Callback) {
		let bkey = match self.relation_basis("rget", source, target) {
			Ok(bkey) => bkey,
			Err(e) => {
				callback(Err(e));
				return;
			}
		};
		let source = source.to_string();
		let target = target.to_string();
		self.submit_read("rget", callback, move |shared| {
			let store = shared.store_or_unknown(&bkey)?;
			let scored = store.read().rget(&source, vecid, &target)?;
			Ok(Reply::StringList(scored))
		});
	}

	pub fn rrec(&self, source: &str, vecid: i64, target: &str, callback: Callback) {
		let bkey = match self.relation_basis("rrec", source, target) {
			Ok(bkey) => bkey,
			Err(e) => {
				callback(Err(e));
				return;
			}
		};
		let source = source.to_string();
		let target = target.to_string();
		self.submit_read("rrec", callback, move |shared| {
			let store = shared.store_or_unknown(&bkey)?;
			let ids = store.read().rrec(&source, vecid, &target)?;
			Ok(Reply::IntList(ids))
		});
	}

	// -- Lifecycle ----------------------------------------------------------

	pub fn del(&self, key: &str, callback: Option<Callback>) {
		let (kind, bkey) = {
			let catalog = self.shared.catalog.read();
			match (catalog.kind_of(key), catalog.basis_of(key)) {
				(Some(kind), Some(bkey)) => (kind, bkey.to_string()),
				_ => {
					reply_err(callback, EngineError::UnknownEntry(key.to_string()));
					return;
				}
			}
		};
		let key = key.to_string();
		match kind {
			Kind::Basis => {
				self.submit_logged(&self.shared.mngm, "del", move |shared| {
					shared.teardown_basis(&key);
					tracing::info!(basis = %key, "basis deleted");
					Ok(())
				});
			}
			Kind::VectorSet => {
				let Some(writer) = self.shared.writer(&bkey) else {
					reply_err(callback, EngineError::UnknownEntry(bkey));
					return;
				};
				self.submit_logged(&writer, "del", move |shared| {
					shared.delete_vector_set(&bkey, &key)
				});
			}
			Kind::Recommendation => {
				let Some(writer) = self.shared.writer(&bkey) else {
					reply_err(callback, EngineError::UnknownEntry(bkey));
					return;
				};
				self.submit_logged(&writer, "del", move |shared| {
					shared.delete_recommendation(&bkey, &key)
				});
			}
		}
		ack(callback);
	}

	/// Restore every `*.dmp` under the save directory. A missing or empty
	/// directory is a clean start, not an error.
	pub fn load(&self, callback: Option<Callback>) {
		let entries = match std::fs::read_dir(&self.shared.save_dir) {
			Ok(entries) => entries,
			Err(_) => {
				ack(callback);
				return;
			}
		};
		for entry in entries.flatten() {
			let path = entry.path();
			if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some("dmp") {
				continue;
			}
			if let Some(bkey) = path.file_stem().and_then(|s| s.to_str()) {
				self.bload(bkey, None);
			}
		}
		ack(callback);
	}

	/// Snapshot every basis.
	pub fn save(&self, callback: Option<Callback>) {
		self.shared.save_all();
		ack(callback);
	}

	// -- Listener forwards -----------------------------------------------------

	pub fn listen_basis(
		&self,
		bkey: &str,
		listener: Arc<dyn StoreListener>,
	) -> Result<(), EngineError> {
		{
			let catalog = self.shared.catalog.read();
			validate::kind_is(&catalog, "listen", bkey, Kind::Basis)?;
		}
		let Some(writer) = self.shared.writer(bkey) else {
			return Err(EngineError::UnknownEntry(bkey.to_string()));
		};
		let bkey = bkey.to_string();
		self.submit_logged(&writer, "listen", move |shared| {
			let store = shared.store_or_unknown(&bkey)?;
			store.write().add_store_listener(listener);
			Ok(())
		});
		Ok(())
	}

	pub fn listen_vector_set(
		&self,
		vkey: &str,
		listener: Box<dyn VectorSetListener>,
	) -> Result<(), EngineError> {
		let bkey = self.vector_set_basis("listen", vkey)?;
		let Some(writer) = self.shared.writer(&bkey) else {
			return Err(EngineError::UnknownEntry(bkey));
		};
		let vkey = vkey.to_string();
		self.submit_logged(&writer, "listen", move |shared| {
			let store = shared.store_or_unknown(&bkey)?;
			store.write().add_vec_listener(&vkey, listener);
			Ok(())
		});
		Ok(())
	}

	pub fn listen_recommendation(
		&self,
		source: &str,
		target: &str,
		listener: Box<dyn RecommendationListener>,
	) -> Result<(), EngineError> {
		let bkey = self.relation_basis("listen", source, target)?;
		let Some(writer) = self.shared.writer(&bkey) else {
			return Err(EngineError::UnknownEntry(bkey));
		};
		let source = source.to_string();
		let target = target.to_string();
		self.submit_logged(&writer, "listen", move |shared| {
			let store = shared.store_or_unknown(&bkey)?;
			store.write().add_rec_listener(&source, &target, listener);
			Ok(())
		});
		Ok(())
	}

	// -- Internals --------------------------------------------------------------

	fn basis_of(&self, catalog: &Catalog, key: &str) -> Result<String, EngineError> {
		catalog
			.basis_of(key)
			.map(str::to_string)
			.ok_or_else(|| EngineError::UnknownEntry(key.to_string()))
	}

	fn vector_set_basis(&self, op: &'static str, vkey: &str) -> Result<String, EngineError> {
		let catalog = self.shared.catalog.read();
		validate::kind_is(&catalog, op, vkey, Kind::VectorSet)?;
		self.basis_of(&catalog, vkey)
	}

	fn relation_basis(
		&self,
		op: &'static str,
		source: &str,
		target: &str,
	) -> Result<String, EngineError> {
		let catalog = self.shared.catalog.read();
		validate::kind_is(&catalog, op, source, Kind::VectorSet)?;
		validate::kind_is(&catalog, op, target, Kind::VectorSet)?;
		validate::exists(&catalog, &rkey(source, target))?;
		self.basis_of(&catalog, source)
	}

	#[allow(clippy::too_many_arguments)]
	fn dense_write<F>(
		&self,
		scope: &'static str,
		verb: &'static str,
		vkey: &str,
		vecid: i64,
		components: Vec<f32>,
		callback: Callback,
		apply: F,
	) where
		F: FnOnce(&mut BasisStore, &str, i64, Vec<f32>) -> Result<(), EngineError> + Send + 'static,
	{
		let checked = self
			.vector_set_basis(scope, vkey)
			.and_then(|bkey| validate::valid_id(vecid).map(|()| bkey))
			.and_then(|bkey| validate::valid_probs(&components).map(|()| bkey));
		let bkey = match checked {
			Ok(bkey) => bkey,
			Err(e) => {
				callback(Err(e));
				return;
			}
		};
		let Some(writer) = self.shared.writer(&bkey) else {
			callback(Err(EngineError::UnknownEntry(bkey)));
			return;
		};
		let vkey = vkey.to_string();
		self.submit_logged(&writer, scope, move |shared| {
			let store = shared.store_or_unknown(&bkey)?;
			apply(&mut *store.write(), &vkey, vecid, components)?;
			shared.note_write(&vkey, verb);
			Ok(())
		});
		callback(Ok(Reply::Ok));
	}

	#[allow(clippy::too_many_arguments)]
	fn sparse_write<F>(
		&self,
		scope: &'static str,
		verb: &'static str,
		vkey: &str,
		vecid: i64,
		pairs: Vec<i64>,
		callback: Callback,
		apply: F,
	) where
		F: FnOnce(&mut BasisStore, &str, i64, &[i64]) -> Result<(), EngineError> + Send + 'static,
	{
		let checked = self
			.vector_set_basis(scope, vkey)
			.and_then(|bkey| validate::valid_id(vecid).map(|()| bkey))
			.and_then(|bkey| {
				let store = self
					.shared
					.store(&bkey)
					.ok_or_else(|| EngineError::UnknownEntry(bkey.clone()))?;
				let dim = store.read().dim();
				validate::valid_sparse_pairs(dim, &pairs)?;
				Ok(bkey)
			});
		let bkey = match checked {
			Ok(bkey) => bkey,
			Err(e) => {
				callback(Err(e));
				return;
			}
		};
		let Some(writer) = self.shared.writer(&bkey) else {
			callback(Err(EngineError::UnknownEntry(bkey)));
			return;
		};
		let vkey = vkey.to_string();
		self.submit_logged(&writer, scope, move |shared| {
			let store = shared.store_or_unknown(&bkey)?;
			apply(&mut *store.write(), &vkey, vecid, &pairs)?;
			shared.note_write(&vkey, verb);
			Ok(())
		});
		callback(Ok(Reply::Ok));
	}
}

impl Drop for Engine {
	fn drop(&mut self) {
		self.shutdown();
	}
}
