// ---------------------------------------------------------------------------
// BasisStore -- per-basis numerical kernel
// ---------------------------------------------------------------------------
//
// One stateful struct per basis integrating the coordinate schema, its
// vector sets and the recommendation relations between them. Every write
// keeps the affected top-K lists fresh and notifies registered listeners
// on the mutating thread. Dump restore emits StoreListener events per
// reconstructed entity so the dispatcher can rebuild its catalog without
// parsing the dump itself.
// ---------------------------------------------------------------------------

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use crate::basis::Basis;
use crate::error::EngineError;
use crate::events::{RecommendationListener, StoreListener, VectorSetListener};
use crate::persistence::{
	decode_components, encode_components, load_dump, save_dump, DumpFile, DumpRecommendation,
	DumpVectorSet, DUMP_VERSION,
};
use crate::recommendation::Recommendation;
use crate::scoring::Scoring;
use crate::types::rkey;
use crate::vectorset::{Vector, VectorSet};

fn pairs_from_flat(flat: &[i64]) -> Vec<(usize, i64)> {
	flat.chunks_exact(2)
		.map(|chunk| (chunk[0] as usize, chunk[1]))
		.collect()
}

fn flat_from_pairs(pairs: &[(usize, i64)]) -> Vec<i64> {
	let mut flat = Vec::with_capacity(pairs.len() * 2);
	for &(index, weight) in pairs {
		flat.push(index as i64);
		flat.push(weight);
	}
	flat
}

pub struct BasisStore {
	basis: Basis,
	/// top-K bound applied to relations made under this basis
	limit: usize,
	vector_sets: HashMap<String, VectorSet>,
	recommendations: HashMap<String, Recommendation>,
	store_listeners: Vec<Arc<dyn StoreListener>>,
	vec_listeners: HashMap<String, Vec<Box<dyn VectorSetListener>>>,
	rec_listeners: HashMap<String, Vec<Box<dyn RecommendationListener>>>,
}

impl BasisStore {
	pub fn new(basis: Basis, limit: usize) -> Self {
		Self {
			basis,
			limit,
			vector_sets: HashMap::new(),
			recommendations: HashMap::new(),
			store_listeners: Vec::new(),
			vec_listeners: HashMap::new(),
			rec_listeners: HashMap::new(),
		}
	}

	pub fn basis(&self) -> &Basis {
		&self.basis
	}

	pub fn dim(&self) -> usize {
		self.basis.dim()
	}

	// -- Basis ---------------------------------------------------------------

	pub fn bget(&self) -> Vec<String> {
		self.basis.schema().to_vec()
	}

	pub fn brev(&mut self, schema: Vec<String>) {
		self.basis.rev(schema);
	}

	// -- Vector sets ---------------------------------------------------------

	pub fn vmk(&mut self, vkey: &str) -> Result<(), EngineError> {
		if self.vector_sets.contains_key(vkey) {
			return Err(EngineError::DuplicateEntry(vkey.to_string()));
		}
		self.vector_sets.insert(vkey.to_string(), VectorSet::new());
		Ok(())
	}

	pub fn vdel(&mut self, vkey: &str) -> Result<(), EngineError> {
		if self.vector_sets.remove(vkey).is_none() {
			return Err(EngineError::UnknownEntry(vkey.to_string()));
		}
		self.vec_listeners.remove(vkey);
		Ok(())
	}

	pub fn vids(&self, vkey: &str) -> Result<Vec<i64>, EngineError> {
		Ok(self.set(vkey)?.ids())
	}

	pub fn vget(&self, vkey: &str, vecid: i64) -> Result<Vec<f32>, EngineError> {
		let set = self.set(vkey)?;
		set.get(vecid)
			.map(|v| v.components(self.basis.dim()))
			.ok_or_else(|| EngineError::UnknownEntry(format!("{vkey}#{vecid}")))
	}

	pub fn vadd(&mut self, vkey: &str, vecid: i64, components: Vec<f32>) -> Result<(), EngineError> {
		self.check_dim("vadd", components.len())?;
		self.set_mut(vkey)?.set_dense(vecid, components);
		self.refresh_after_write(vkey, vecid);
		Ok(())
	}

	pub fn vset(&mut self, vkey: &str, vecid: i64, components: Vec<f32>) -> Result<(), EngineError> {
		self.check_dim("vset", components.len())?;
		self.set_mut(vkey)?.set_dense(vecid, components);
		self.refresh_after_write(vkey, vecid);
		Ok(())
	}

	pub fn vacc(&mut self, vkey: &str, vecid: i64, components: &[f32]) -> Result<(), EngineError> {
		self.check_dim("vacc", components.len())?;
		let dim = self.basis.dim();
		self.set_mut(vkey)?.acc_dense(vecid, dim, components);
		self.refresh_after_write(vkey, vecid);
		Ok(())
	}

	pub fn vrem(&mut self, vkey: &str, vecid: i64) -> Result<(), EngineError> {
		if !self.set_mut(vkey)?.remove(vecid) {
			return Err(EngineError::UnknownEntry(format!("{vkey}#{vecid}")));
		}
		for rec in self.recommendations.values_mut() {
			if rec.source() == vkey {
				rec.source_removed(vecid);
			}
			if rec.target() == vkey {
				rec.target_removed(vecid);
			}
		}
		if let Some(listeners) = self.vec_listeners.get(vkey) {
			for listener in listeners {
				listener.on_vector_removed(vkey, vecid);
			}
		}
		Ok(())
	}

	// -- Sparse views --------------------------------------------------------

	pub fn iget(&self, vkey: &str, vecid: i64) -> Result<Vec<i64>, EngineError> {
		let set = self.set(vkey)?;
		set.get(vecid)
			.map(|v| flat_from_pairs(&v.pairs()))
			.ok_or_else(|| EngineError::UnknownEntry(format!("{vkey}#{vecid}")))
	}

	pub fn iadd(&mut self, vkey: &str, vecid: i64, pairs: &[i64]) -> Result<(), EngineError> {
		self.set_mut(vkey)?.set_sparse(vecid, pairs_from_flat(pairs));
		self.refresh_after_write(vkey, vecid);
		Ok(())
	}

	pub fn iset(&mut self, vkey: &str, vecid: i64, pairs: &[i64]) -> Result<(), EngineError> {
		self.set_mut(vkey)?.set_sparse(vecid, pairs_from_flat(pairs));
		self.refresh_after_write(vkey, vecid);
		Ok(())
	}

	pub fn iacc(&mut self, vkey: &str, vecid: i64, pairs: &[i64]) -> Result<(), EngineError> {
		self.set_mut(vkey)?.acc_sparse(vecid, &pairs_from_flat(pairs));
		self.refresh_after_write(vkey, vecid);
		Ok(())
	}

	// -- Recommendations -----------------------------------------------------

	pub fn rmk(&mut self, source: &str, target: &str, funcscore: &str) -> Result<(), EngineError> {
		let key = rkey(source, target);
		if self.recommendations.contains_key(&key) {
			return Err(EngineError::DuplicateEntry(key));
		}
		let scoring = Scoring::from_name(funcscore)?;
		let source_set = self.set(source)?;
		let target_set = self.set(target)?;
		let mut rec = Recommendation::new(source, target, scoring, self.limit);
		rec.rebuild(self.basis.dim(), source_set, target_set);
		self.recommendations.insert(key, rec);
		Ok(())
	}

	pub fn rdel(&mut self, key: &str) -> Result<(), EngineError> {
		if self.recommendations.remove(key).is_none() {
			return Err(EngineError::UnknownEntry(key.to_string()));
		}
		self.rec_listeners.remove(key);
		Ok(())
	}

	pub fn rget(&self, source: &str, vecid: i64, target: &str) -> Result<Vec<String>, EngineError> {
		Ok(self.relation(source, target)?.recommended_with_scores(vecid))
	}

	pub fn rrec(&self, source: &str, vecid: i64, target: &str) -> Result<Vec<i64>, EngineError> {
		Ok(self.relation(source, target)?.recommended_ids(vecid))
	}

	// -- Listeners -----------------------------------------------------------

	pub fn add_store_listener(&mut self, listener: Arc<dyn StoreListener>) {
		self.store_listeners.push(listener);
	}

	pub fn add_vec_listener(&mut self, vkey: &str, listener: Box<dyn VectorSetListener>) {
		self.vec_listeners
			.entry(vkey.to_string())
			.or_default()
			.push(listener);
	}

	pub fn add_rec_listener(
		&mut self,
		source: &str,
		target: &str,
		listener: Box<dyn RecommendationListener>,
	) {
		self.rec_listeners
			.entry(rkey(source, target))
			.or_default()
			.push(listener);
	}

	// -- Persistence ---------------------------------------------------------

	pub fn bsave(&self, path: &Path) -> Result<(), EngineError> {
		let mut vector_sets: Vec<DumpVectorSet> = Vec::with_capacity(self.vector_sets.len());
		let mut keys: Vec<&String> = self.vector_sets.keys().collect();
		keys.sort();
		for key in keys {
			let set = &self.vector_sets[key];
			let mut entry = DumpVectorSet {
				key: key.clone(),
				dense: Default::default(),
				sparse: Default::default(),
			};
			for (vecid, vector) in set.iter() {
				match vector {
					Vector::Dense(components) => {
						entry.dense.insert(vecid, encode_components(components));
					}
					Vector::Sparse(pairs) => {
						entry.sparse.insert(vecid, flat_from_pairs(pairs));
					}
				}
			}
			vector_sets.push(entry);
		}

		let mut recommendations: Vec<DumpRecommendation> = self
			.recommendations
			.values()
			.map(|rec| DumpRecommendation {
				source: rec.source().to_string(),
				target: rec.target().to_string(),
				scoring: rec.scoring().name().to_string(),
				limit: rec.limit(),
			})
			.collect();
		recommendations.sort_by(|a, b| (&a.source, &a.target).cmp(&(&b.source, &b.target)));

		let dump = DumpFile {
			version: DUMP_VERSION,
			key: self.basis.key().to_string(),
			schema: self.basis.schema().to_vec(),
			vector_sets,
			recommendations,
		};
		save_dump(path, &dump)
	}

	/// Restore from a dump, replacing any current state. Each restored
	/// vector set and relation is announced through the StoreListener
	/// events so the catalog can follow along.
	pub fn bload(&mut self, path: &Path) -> Result<(), EngineError> {
		let dump = load_dump(path)?;
		let bkey = self.basis.key().to_string();

		self.vector_sets.clear();
		self.recommendations.clear();
		self.basis.rev(dump.schema);
		let dim = self.basis.dim();

		for dumped in &dump.vector_sets {
			let mut set = VectorSet::new();
			for (&vecid, encoded) in &dumped.dense {
				set.set_dense(vecid, decode_components(encoded)?);
			}
			for (&vecid, flat) in &dumped.sparse {
				set.set_sparse(vecid, pairs_from_flat(flat));
			}
			self.vector_sets.insert(dumped.key.clone(), set);
			for listener in &self.store_listeners {
				listener.on_vecset_added(&bkey, &dumped.key);
			}
		}

		for dumped in &dump.recommendations {
			let scoring = Scoring::from_name(&dumped.scoring)?;
			let (Some(source_set), Some(target_set)) = (
				self.vector_sets.get(&dumped.source),
				self.vector_sets.get(&dumped.target),
			) else {
				tracing::warn!(
					basis = %bkey,
					source = %dumped.source,
					target = %dumped.target,
					"dump references missing vector set, relation skipped"
				);
				continue;
			};
			let mut rec =
				Recommendation::new(&dumped.source, &dumped.target, scoring, dumped.limit);
			rec.rebuild(dim, source_set, target_set);
			self.recommendations.insert(rkey(&dumped.source, &dumped.target), rec);
			for listener in &self.store_listeners {
				listener.on_rec_added(&bkey, &dumped.source, &dumped.target);
			}
		}

		Ok(())
	}

	// -- Internals -----------------------------------------------------------

	fn set(&self, vkey: &str) -> Result<&VectorSet, EngineError> {
		self.vector_sets
			.get(vkey)
			.ok_or_else(|| EngineError::UnknownEntry(vkey.to_string()))
	}

	fn set_mut(&mut self, vkey: &str) -> Result<&mut VectorSet, EngineError> {
		self.vector_sets
			.get_mut(vkey)
			.ok_or_else(|| EngineError::UnknownEntry(vkey.to_string()))
	}

	fn relation(&self, source: &str, target: &str) -> Result<&Recommendation, EngineError> {
		let key = rkey(source, target);
		self.recommendations
			.get(&key)
			.ok_or(EngineError::UnknownEntry(key))
	}

	fn check_dim(&self, scope: &str, len: usize) -> Result<(), EngineError> {
		if len != self.basis.dim() {
			return Err(EngineError::kernel(
				scope,
				format!(
					"vector has {len} components, basis '{}' has {}",
					self.basis.key(),
					self.basis.dim()
				),
			));
		}
		Ok(())
	}

	/// Propagate one written vector into every relation it participates
	/// in, then notify listeners.
	fn refresh_after_write(&mut self, vkey: &str, vecid: i64) {
		let dim = self.basis.dim();
		let Some(components) = self
			.vector_sets
			.get(vkey)
			.and_then(|set| set.get(vecid))
			.map(|vector| vector.components(dim))
		else {
			return;
		};

		let mut rec_updates: Vec<(String, String, i64)> = Vec::new();
		for rec in self.recommendations.values_mut() {
			if rec.source() == vkey {
				if let Some(target_set) = self.vector_sets.get(rec.target()) {
					rec.rescore_source(dim, vecid, &components, target_set);
					rec_updates.push((rec.source().to_string(), rec.target().to_string(), vecid));
				}
			}
			if rec.target() == vkey {
				if let Some(source_set) = self.vector_sets.get(rec.source()) {
					let touched = rec.target_updated(dim, vecid, &components, source_set);
					for source_id in touched {
						rec_updates.push((
							rec.source().to_string(),
							rec.target().to_string(),
							source_id,
						));
					}
				}
			}
		}

		for (source, target, id) in rec_updates {
			if let Some(listeners) = self.rec_listeners.get(&rkey(&source, &target)) {
				for listener in listeners {
					listener.on_recommendation_updated(&source, &target, id);
				}
			}
		}

		if let Some(listeners) = self.vec_listeners.get(vkey) {
			for listener in listeners {
				listener.on_vector_updated(vkey, vecid, &components);
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use parking_lot::Mutex;

	fn store() -> BasisStore {
		let basis = Basis::new("b1", vec!["x".into(), "y".into(), "z".into()]);
		BasisStore::new(basis, 20)
	}

	#[test]
	fn vector_crud() {
		let mut s = store();
		s.vmk("vs").unwrap();
		s.vadd("vs", 1, vec![0.2, 0.3, 0.5]).unwrap();
		assert_eq!(s.vids("vs").unwrap(), vec![1]);
		assert_eq!(s.vget("vs", 1).unwrap(), vec![0.2, 0.3, 0.5]);
		s.vrem("vs", 1).unwrap();
		assert!(s.vget("vs", 1).is_err());
	}

	#[test]
	fn vmk_duplicate_rejected() {
		let mut s = store();
		s.vmk("vs").unwrap();
		assert!(matches!(s.vmk("vs"), Err(EngineError::DuplicateEntry(_))));
	}

	#[test]
	fn dimension_mismatch_rejected() {
		let mut s = store();
		s.vmk("vs").unwrap();
		assert!(matches!(
			s.vadd("vs", 1, vec![0.5, 0.5]),
			Err(EngineError::Kernel { .. })
		));
	}

	#[test]
	fn sparse_roundtrip() {
		let mut s = store();
		s.vmk("vs").unwrap();
		s.iadd("vs", 1, &[0, 1, 2, 3]).unwrap();
		assert_eq!(s.iget("vs", 1).unwrap(), vec![0, 1, 2, 3]);
		let dense = s.vget("vs", 1).unwrap();
		assert!((dense[0] - 0.25).abs() < 1e-6);
		assert!((dense[2] - 0.75).abs() < 1e-6);
	}

	#[test]
	fn recommendations_stay_fresh() {
		let mut s = store();
		s.vmk("src").unwrap();
		s.vmk("tgt").unwrap();
		s.vadd("src", 1, vec![1.0, 0.0, 0.0]).unwrap();
		s.vadd("tgt", 10, vec![0.0, 1.0, 0.0]).unwrap();
		s.rmk("src", "tgt", "cosine").unwrap();
		assert_eq!(s.rrec("src", 1, "tgt").unwrap(), vec![10]);

		// a closer target shows up first without any rebuild
		s.vadd("tgt", 11, vec![0.9, 0.1, 0.0]).unwrap();
		assert_eq!(s.rrec("src", 1, "tgt").unwrap(), vec![11, 10]);

		s.vrem("tgt", 11).unwrap();
		assert_eq!(s.rrec("src", 1, "tgt").unwrap(), vec![10]);
	}

	#[test]
	fn rmk_unknown_scoring_rejected() {
		let mut s = store();
		s.vmk("src").unwrap();
		s.vmk("tgt").unwrap();
		assert!(s.rmk("src", "tgt", "manhattan").is_err());
	}

	#[test]
	fn rget_pairs_ids_with_scores() {
		let mut s = store();
		s.vmk("src").unwrap();
		s.vmk("tgt").unwrap();
		s.vadd("src", 1, vec![1.0, 0.0, 0.0]).unwrap();
		s.vadd("tgt", 7, vec![1.0, 0.0, 0.0]).unwrap();
		s.rmk("src", "tgt", "cosine").unwrap();
		let flat = s.rget("src", 1, "tgt").unwrap();
		assert_eq!(flat[0], "7");
		assert!(flat[1].parse::<f32>().unwrap() > 0.99);
	}

	struct Recorder(Mutex<Vec<(String, i64)>>);

	impl VectorSetListener for Recorder {
		fn on_vector_updated(&self, vkey: &str, vecid: i64, _components: &[f32]) {
			self.0.lock().push((vkey.to_string(), vecid));
		}
		fn on_vector_removed(&self, vkey: &str, vecid: i64) {
			self.0.lock().push((vkey.to_string(), -vecid));
		}
	}

	#[test]
	fn vector_listeners_observe_mutations() {
		let mut s = store();
		s.vmk("vs").unwrap();
		let recorder = Arc::new(Recorder(Mutex::new(Vec::new())));
		struct Fwd(Arc<Recorder>);
		impl VectorSetListener for Fwd {
			fn on_vector_updated(&self, vkey: &str, vecid: i64, components: &[f32]) {
				self.0.on_vector_updated(vkey, vecid, components);
			}
			fn on_vector_removed(&self, vkey: &str, vecid: i64) {
				self.0.on_vector_removed(vkey, vecid);
			}
		}
		s.add_vec_listener("vs", Box::new(Fwd(recorder.clone())));
		s.vadd("vs", 1, vec![0.2, 0.3, 0.5]).unwrap();
		s.vrem("vs", 1).unwrap();
		let seen = recorder.0.lock().clone();
		assert_eq!(seen, vec![("vs".to_string(), 1), ("vs".to_string(), -1)]);
	}

	#[test]
	fn dump_roundtrip_restores_vectors_and_relations() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("b1.dmp");

		let mut s = store();
		s.vmk("src").unwrap();
		s.vmk("tgt").unwrap();
		s.vadd("src", 1, vec![0.2, 0.3, 0.5]).unwrap();
		s.iadd("tgt", 2, &[0, 1, 1, 3]).unwrap();
		s.rmk("src", "tgt", "jensenshannon").unwrap();
		s.bsave(&path).unwrap();

		let mut restored = BasisStore::new(Basis::new("b1", Vec::new()), 20);
		restored.bload(&path).unwrap();
		assert_eq!(restored.bget(), vec!["x", "y", "z"]);
		assert_eq!(restored.vget("src", 1).unwrap(), vec![0.2, 0.3, 0.5]);
		assert_eq!(restored.iget("tgt", 2).unwrap(), vec![0, 1, 1, 3]);
		assert_eq!(restored.rrec("src", 1, "tgt").unwrap(), vec![2]);
	}

	#[test]
	fn bload_announces_entities() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("b1.dmp");

		let mut s = store();
		s.vmk("src").unwrap();
		s.vmk("tgt").unwrap();
		s.vadd("src", 1, vec![1.0, 0.0, 0.0]).unwrap();
		s.vadd("tgt", 2, vec![1.0, 0.0, 0.0]).unwrap();
		s.rmk("src", "tgt", "cosine").unwrap();
		s.bsave(&path).unwrap();

		#[derive(Default)]
		struct Events(Mutex<Vec<String>>);
		impl StoreListener for Events {
			fn on_vecset_added(&self, bkey: &str, vkey: &str) {
				self.0.lock().push(format!("+v {bkey} {vkey}"));
			}
			fn on_vecset_deleted(&self, bkey: &str, vkey: &str) {
				self.0.lock().push(format!("-v {bkey} {vkey}"));
			}
			fn on_rec_added(&self, bkey: &str, source: &str, target: &str) {
				self.0.lock().push(format!("+r {bkey} {source} {target}"));
			}
			fn on_rec_deleted(&self, bkey: &str, source: &str, target: &str) {
				self.0.lock().push(format!("-r {bkey} {source} {target}"));
			}
		}

		let events = Arc::new(Events::default());
		let mut restored = BasisStore::new(Basis::new("b1", Vec::new()), 20);
		restored.add_store_listener(events.clone());
		restored.bload(&path).unwrap();

		let seen = events.0.lock().clone();
		assert!(seen.contains(&"+v b1 src".to_string()));
		assert!(seen.contains(&"+v b1 tgt".to_string()));
		assert!(seen.contains(&"+r b1 src tgt".to_string()));
	}
}
