// ---------------------------------------------------------------------------
// Recommendation -- live top-K neighbor lists between two vector sets
// ---------------------------------------------------------------------------
//
// A directed relation (source, target) under one basis. For each id in the
// source set it keeps a bounded, score-sorted list of target ids. Lists are
// maintained incrementally as vectors are written or removed; a full
// rebuild runs at relation creation and dump restore.
// ---------------------------------------------------------------------------

use std::collections::HashMap;

use crate::scoring::Scoring;
use crate::vectorset::VectorSet;

/// Default top-K bound per source id.
pub const DEFAULT_LIMIT: usize = 20;

/// One neighbor entry: target id and its similarity score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scored {
	pub id: i64,
	pub score: f32,
}

pub struct Recommendation {
	source: String,
	target: String,
	scoring: Scoring,
	limit: usize,
	/// source id -> neighbors sorted by descending score
	lists: HashMap<i64, Vec<Scored>>,
}

impl Recommendation {
	pub fn new(source: &str, target: &str, scoring: Scoring, limit: usize) -> Self {
		Self {
			source: source.to_string(),
			target: target.to_string(),
			scoring,
			limit,
			lists: HashMap::new(),
		}
	}

	pub fn source(&self) -> &str {
		&self.source
	}

	pub fn target(&self) -> &str {
		&self.target
	}

	pub fn scoring(&self) -> Scoring {
		self.scoring
	}

	pub fn limit(&self) -> usize {
		self.limit
	}

	fn is_self_pair(&self, source_id: i64, target_id: i64) -> bool {
		self.source == self.target && source_id == target_id
	}

	/// Rescore every source id against the full target set.
	pub fn rebuild(&mut self, dim: usize, source_set: &VectorSet, target_set: &VectorSet) {
		self.lists.clear();
		for (source_id, vector) in source_set.iter() {
			let components = vector.components(dim);
			self.rescore_source(dim, source_id, &components, target_set);
		}
	}

	/// A source vector was written: recompute its list from scratch.
	pub fn rescore_source(
		&mut self,
		dim: usize,
		source_id: i64,
		components: &[f32],
		target_set: &VectorSet,
	) {
		let mut list = Vec::new();
		for (target_id, target_vector) in target_set.iter() {
			if self.is_self_pair(source_id, target_id) {
				continue;
			}
			let score = self.scoring.score(components, &target_vector.components(dim));
			insert_bounded(&mut list, Scored { id: target_id, score }, self.limit);
		}
		self.lists.insert(source_id, list);
	}

	/// A target vector was written: re-rank it within every source list.
	/// Returns the source ids whose lists changed.
	pub fn target_updated(
		&mut self,
		dim: usize,
		target_id: i64,
		components: &[f32],
		source_set: &VectorSet,
	) -> Vec<i64> {
		let mut touched = Vec::new();
		for (source_id, source_vector) in source_set.iter() {
			if self.is_self_pair(source_id, target_id) {
				continue;
			}
			let score = self
				.scoring
				.score(&source_vector.components(dim), components);
			let list = self.lists.entry(source_id).or_default();
			list.retain(|s| s.id != target_id);
			insert_bounded(&mut *list, Scored { id: target_id, score }, self.limit);
			touched.push(source_id);
		}
		touched
	}

	/// A source vector is gone: drop its list.
	pub fn source_removed(&mut self, source_id: i64) {
		self.lists.remove(&source_id);
	}

	/// A target vector is gone: purge it from every list.
	pub fn target_removed(&mut self, target_id: i64) {
		for list in self.lists.values_mut() {
			list.retain(|s| s.id != target_id);
		}
	}

	pub fn neighbors(&self, source_id: i64) -> &[Scored] {
		self.lists.get(&source_id).map(Vec::as_slice).unwrap_or(&[])
	}

	/// Neighbor ids only, best first.
	pub fn recommended_ids(&self, source_id: i64) -> Vec<i64> {
		self.neighbors(source_id).iter().map(|s| s.id).collect()
	}

	/// Flat id/score string pairs, best first.
	pub fn recommended_with_scores(&self, source_id: i64) -> Vec<String> {
		let mut out = Vec::new();
		for scored in self.neighbors(source_id) {
			out.push(scored.id.to_string());
			out.push(format!("{:.6}", scored.score));
		}
		out
	}
}

/// Insert into a descending-sorted bounded list, keeping it sorted and
/// at most `limit` long.
fn insert_bounded(list: &mut Vec<Scored>, entry: Scored, limit: usize) {
	let position = list
		.iter()
		.position(|s| s.score < entry.score)
		.unwrap_or(list.len());
	list.insert(position, entry);
	list.truncate(limit);
}
