// ---------------------------------------------------------------------------
// Key Catalog -- the dispatcher's view of the namespace
// ---------------------------------------------------------------------------
//
// One tagged entry per live key plus the derived relationship indices:
// which vector sets live under a basis, which recommendation edges each
// vector set participates in, and per-vector-set write counters. Every
// mutation keeps the forward map and the reverse indices in lockstep;
// drift between them is what this module exists to rule out.
// ---------------------------------------------------------------------------

use std::collections::{HashMap, HashSet};

use crate::types::{rkey, Kind};

/// Catalog record: what a key names and which basis owns it. A basis
/// entry is its own owner.
#[derive(Debug, Clone)]
pub struct Entry {
	pub kind: Kind,
	pub basis: String,
}

#[derive(Debug, Default)]
pub struct Catalog {
	entries: HashMap<String, Entry>,
	/// basis -> vector sets under it, in creation order
	vectors_of: HashMap<String, Vec<String>>,
	/// vector set -> outgoing recommendation targets
	targets_of: HashMap<String, HashSet<String>>,
	/// vector set -> incoming recommendation sources
	sources_of: HashMap<String, HashSet<String>>,
	/// vector set -> writes seen, for progress logging
	counters: HashMap<String, u64>,
}

impl Catalog {
	pub fn new() -> Self {
		Self::default()
	}

	// -- Lookups -------------------------------------------------------------

	pub fn contains(&self, key: &str) -> bool {
		self.entries.contains_key(key)
	}

	pub fn kind_of(&self, key: &str) -> Option<Kind> {
		self.entries.get(key).map(|e| e.kind)
	}

	pub fn basis_of(&self, key: &str) -> Option<&str> {
		self.entries.get(key).map(|e| e.basis.as_str())
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	/// Sorted basis keys.
	pub fn bases(&self) -> Vec<String> {
		let mut keys: Vec<String> = self
			.entries
			.iter()
			.filter(|(_, e)| e.kind == Kind::Basis)
			.map(|(k, _)| k.clone())
			.collect();
		keys.sort();
		keys
	}

	/// Sorted vector-set keys under one basis.
	pub fn vector_sets(&self, bkey: &str) -> Vec<String> {
		let mut keys = self.vectors_of.get(bkey).cloned().unwrap_or_default();
		keys.sort();
		keys
	}

	/// Sorted outgoing recommendation targets of one vector set.
	pub fn targets(&self, vkey: &str) -> Vec<String> {
		let mut keys: Vec<String> = self
			.targets_of
			.get(vkey)
			.map(|s| s.iter().cloned().collect())
			.unwrap_or_default();
		keys.sort();
		keys
	}

	/// Unordered snapshot of incoming recommendation sources. Cascades
	/// iterate snapshots, never the live sets they are shrinking.
	pub fn sources(&self, vkey: &str) -> Vec<String> {
		self.sources_of
			.get(vkey)
			.map(|s| s.iter().cloned().collect())
			.unwrap_or_default()
	}

	// -- Mutations -----------------------------------------------------------

	pub fn add_basis(&mut self, bkey: &str) {
		self.entries.insert(
			bkey.to_string(),
			Entry {
				kind: Kind::Basis,
				basis: bkey.to_string(),
			},
		);
		self.vectors_of.entry(bkey.to_string()).or_default();
	}

	pub fn add_vector_set(&mut self, bkey: &str, vkey: &str) {
		self.entries.insert(
			vkey.to_string(),
			Entry {
				kind: Kind::VectorSet,
				basis: bkey.to_string(),
			},
		);
		let slot = self.vectors_of.entry(bkey.to_string()).or_default();
		if !slot.iter().any(|k| k == vkey) {
			slot.push(vkey.to_string());
		}
	}

	pub fn add_recommendation(&mut self, bkey: &str, source: &str, target: &str) {
		self.entries.insert(
			rkey(source, target),
			Entry {
				kind: Kind::Recommendation,
				basis: bkey.to_string(),
			},
		);
		self.targets_of
			.entry(source.to_string())
			.or_default()
			.insert(target.to_string());
		self.sources_of
			.entry(target.to_string())
			.or_default()
			.insert(source.to_string());
	}

	/// Drop a basis entry. Its vector sets and recommendations must have
	/// been removed already; the cascade order is the caller's job.
	pub fn remove_basis(&mut self, bkey: &str) {
		self.entries.remove(bkey);
		self.vectors_of.remove(bkey);
	}

	pub fn remove_vector_set(&mut self, vkey: &str) {
		if let Some(entry) = self.entries.remove(vkey) {
			if let Some(slot) = self.vectors_of.get_mut(&entry.basis) {
				slot.retain(|k| k != vkey);
			}
		}
		self.targets_of.remove(vkey);
		self.sources_of.remove(vkey);
		self.counters.remove(vkey);
	}

	pub fn remove_recommendation(&mut self, source: &str, target: &str) {
		self.entries.remove(&rkey(source, target));
		if let Some(set) = self.targets_of.get_mut(source) {
			set.remove(target);
		}
		if let Some(set) = self.sources_of.get_mut(target) {
			set.remove(source);
		}
	}

	/// Bump the write counter for a vector set, returning the new value.
	pub fn bump_counter(&mut self, vkey: &str) -> u64 {
		let counter = self.counters.entry(vkey.to_string()).or_insert(0);
		*counter += 1;
		*counter
	}
}
