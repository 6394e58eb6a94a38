// ---------------------------------------------------------------------------
// Basis -- named ordered coordinate labels
// ---------------------------------------------------------------------------

/// Quantization scale used when a dense probability vector is viewed as
/// sparse integer pairs.
pub const SPARSE_SCALE: f32 = 4096.0;

/// A named ordered tuple of coordinate labels defining the space its
/// vector sets live in.
#[derive(Debug, Clone)]
pub struct Basis {
	key: String,
	schema: Vec<String>,
}

impl Basis {
	pub fn new(key: &str, schema: Vec<String>) -> Self {
		Self {
			key: key.to_string(),
			schema,
		}
	}

	pub fn key(&self) -> &str {
		&self.key
	}

	pub fn schema(&self) -> &[String] {
		&self.schema
	}

	pub fn dim(&self) -> usize {
		self.schema.len()
	}

	/// Reorder or rename the coordinate labels.
	pub fn rev(&mut self, schema: Vec<String>) {
		self.schema = schema;
	}
}

/// Expand sparse (index, weight) pairs into a dense distribution over
/// `dim` coordinates: each component is its weight over the weight sum.
/// Out-of-range indices are ignored; zero total weight yields all zeros.
pub fn densify(dim: usize, pairs: &[(usize, i64)]) -> Vec<f32> {
	let mut dense = vec![0.0f32; dim];
	let total: i64 = pairs.iter().map(|&(_, w)| w).sum();
	if total <= 0 {
		return dense;
	}
	for &(index, weight) in pairs {
		if index < dim {
			dense[index] = weight as f32 / total as f32;
		}
	}
	dense
}

/// Collapse a dense probability vector into sparse (index, weight) pairs,
/// quantized by [`SPARSE_SCALE`]. Components that round to zero are omitted.
pub fn quantize(components: &[f32]) -> Vec<(usize, i64)> {
	let mut pairs = Vec::new();
	for (index, &p) in components.iter().enumerate() {
		let weight = (p * SPARSE_SCALE).round() as i64;
		if weight != 0 {
			pairs.push((index, weight));
		}
	}
	pairs
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn rev_replaces_schema() {
		let mut basis = Basis::new("b", vec!["a".into(), "b".into()]);
		basis.rev(vec!["b".into(), "a".into()]);
		assert_eq!(basis.schema(), &["b".to_string(), "a".to_string()]);
		assert_eq!(basis.dim(), 2);
	}

	#[test]
	fn densify_normalizes_weights() {
		let dense = densify(4, &[(0, 1), (2, 3)]);
		assert!((dense[0] - 0.25).abs() < 1e-6);
		assert_eq!(dense[1], 0.0);
		assert!((dense[2] - 0.75).abs() < 1e-6);
		assert_eq!(dense[3], 0.0);
	}

	#[test]
	fn densify_ignores_out_of_range() {
		let dense = densify(2, &[(0, 1), (5, 1)]);
		assert!((dense[0] - 0.5).abs() < 1e-6);
	}

	#[test]
	fn densify_zero_weight() {
		assert_eq!(densify(3, &[(0, 0)]), vec![0.0, 0.0, 0.0]);
	}

	#[test]
	fn quantize_drops_zero_components() {
		let pairs = quantize(&[0.5, 0.0, 0.5]);
		assert_eq!(pairs, vec![(0, 2048), (2, 2048)]);
	}

	#[test]
	fn quantize_densify_roundtrip() {
		let original = vec![0.2f32, 0.3, 0.5];
		let dense = densify(3, &quantize(&original));
		for (a, b) in original.iter().zip(dense.iter()) {
			assert!((a - b).abs() < 1e-3);
		}
	}
}
