// ---------------------------------------------------------------------------
// VectorSet -- dense and sparse probability vectors keyed by positive id
// ---------------------------------------------------------------------------

use std::collections::BTreeMap;

use crate::basis::{densify, quantize};

/// One stored vector. A set may hold dense and sparse vectors side by
/// side; every read goes through a conversion view when the stored form
/// differs from the requested one.
#[derive(Debug, Clone)]
pub enum Vector {
	Dense(Vec<f32>),
	Sparse(Vec<(usize, i64)>),
}

impl Vector {
	/// Dense view over `dim` coordinates.
	pub fn components(&self, dim: usize) -> Vec<f32> {
		match self {
			Vector::Dense(components) => components.clone(),
			Vector::Sparse(pairs) => densify(dim, pairs),
		}
	}

	/// Sparse (index, weight) view.
	pub fn pairs(&self) -> Vec<(usize, i64)> {
		match self {
			Vector::Dense(components) => quantize(components),
			Vector::Sparse(pairs) => pairs.clone(),
		}
	}
}

/// A named collection of vectors under one basis.
#[derive(Debug, Clone, Default)]
pub struct VectorSet {
	vectors: BTreeMap<i64, Vector>,
}

impl VectorSet {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn ids(&self) -> Vec<i64> {
		self.vectors.keys().copied().collect()
	}

	pub fn get(&self, vecid: i64) -> Option<&Vector> {
		self.vectors.get(&vecid)
	}

	pub fn len(&self) -> usize {
		self.vectors.len()
	}

	pub fn is_empty(&self) -> bool {
		self.vectors.is_empty()
	}

	pub fn iter(&self) -> impl Iterator<Item = (i64, &Vector)> {
		self.vectors.iter().map(|(&id, v)| (id, v))
	}

	pub fn set_dense(&mut self, vecid: i64, components: Vec<f32>) {
		self.vectors.insert(vecid, Vector::Dense(components));
	}

	/// Accumulate componentwise onto the dense form of the stored vector.
	/// A missing vector starts from zero.
	pub fn acc_dense(&mut self, vecid: i64, dim: usize, components: &[f32]) {
		let mut accumulated = self
			.vectors
			.get(&vecid)
			.map(|v| v.components(dim))
			.unwrap_or_else(|| vec![0.0; components.len().max(dim)]);
		for (slot, &value) in accumulated.iter_mut().zip(components.iter()) {
			*slot += value;
		}
		self.vectors.insert(vecid, Vector::Dense(accumulated));
	}

	pub fn set_sparse(&mut self, vecid: i64, pairs: Vec<(usize, i64)>) {
		self.vectors.insert(vecid, Vector::Sparse(pairs));
	}

	/// Accumulate sparse weights by index onto the stored sparse form.
	pub fn acc_sparse(&mut self, vecid: i64, pairs: &[(usize, i64)]) {
		let mut accumulated = self
			.vectors
			.get(&vecid)
			.map(|v| v.pairs())
			.unwrap_or_default();
		for &(index, weight) in pairs {
			match accumulated.iter_mut().find(|(i, _)| *i == index) {
				Some((_, w)) => *w += weight,
				None => accumulated.push((index, weight)),
			}
		}
		accumulated.sort_by_key(|&(i, _)| i);
		self.vectors.insert(vecid, Vector::Sparse(accumulated));
	}

	pub fn remove(&mut self, vecid: i64) -> bool {
		self.vectors.remove(&vecid).is_some()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn ids_are_sorted() {
		let mut set = VectorSet::new();
		set.set_dense(3, vec![1.0]);
		set.set_dense(1, vec![1.0]);
		set.set_dense(2, vec![1.0]);
		assert_eq!(set.ids(), vec![1, 2, 3]);
	}

	#[test]
	fn set_overwrites() {
		let mut set = VectorSet::new();
		set.set_dense(1, vec![0.1, 0.9]);
		set.set_dense(1, vec![0.5, 0.5]);
		assert_eq!(set.get(1).unwrap().components(2), vec![0.5, 0.5]);
		assert_eq!(set.len(), 1);
	}

	#[test]
	fn acc_dense_accumulates() {
		let mut set = VectorSet::new();
		set.set_dense(1, vec![0.1, 0.2]);
		set.acc_dense(1, 2, &[0.3, 0.3]);
		let components = set.get(1).unwrap().components(2);
		assert!((components[0] - 0.4).abs() < 1e-6);
		assert!((components[1] - 0.5).abs() < 1e-6);
	}

	#[test]
	fn acc_dense_from_missing_starts_at_zero() {
		let mut set = VectorSet::new();
		set.acc_dense(7, 2, &[0.25, 0.75]);
		assert_eq!(set.get(7).unwrap().components(2), vec![0.25, 0.75]);
	}

	#[test]
	fn acc_sparse_merges_by_index() {
		let mut set = VectorSet::new();
		set.set_sparse(1, vec![(0, 2), (3, 5)]);
		set.acc_sparse(1, &[(3, 1), (1, 4)]);
		assert_eq!(set.get(1).unwrap().pairs(), vec![(0, 2), (1, 4), (3, 6)]);
	}

	#[test]
	fn sparse_vector_densifies() {
		let mut set = VectorSet::new();
		set.set_sparse(1, vec![(0, 1), (1, 3)]);
		let components = set.get(1).unwrap().components(2);
		assert!((components[0] - 0.25).abs() < 1e-6);
		assert!((components[1] - 0.75).abs() < 1e-6);
	}

	#[test]
	fn dense_vector_quantizes() {
		let mut set = VectorSet::new();
		set.set_dense(1, vec![0.5, 0.5]);
		assert_eq!(set.get(1).unwrap().pairs(), vec![(0, 2048), (1, 2048)]);
	}

	#[test]
	fn remove_reports_presence() {
		let mut set = VectorSet::new();
		set.set_dense(1, vec![1.0]);
		assert!(set.remove(1));
		assert!(!set.remove(1));
		assert!(set.is_empty());
	}
}
