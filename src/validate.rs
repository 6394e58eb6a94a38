// ---------------------------------------------------------------------------
// Validators -- pure predicates over the catalog and raw inputs
// ---------------------------------------------------------------------------
//
// Each check either passes or fails with one typed error. Checks that
// consult the catalog are advisory on the caller's thread; the definitive
// re-check runs under the owning executor.
// ---------------------------------------------------------------------------

use std::path::Path;

use crate::catalog::Catalog;
use crate::error::EngineError;
use crate::types::Kind;

/// User keys must leave `_` free for recommendation keys.
pub fn valid_key_format(key: &str) -> Result<(), EngineError> {
	if key.contains('_') {
		return Err(EngineError::InvalidKeyFormat(key.to_string()));
	}
	Ok(())
}

pub fn exists(catalog: &Catalog, key: &str) -> Result<(), EngineError> {
	if !catalog.contains(key) {
		return Err(EngineError::UnknownEntry(key.to_string()));
	}
	Ok(())
}

pub fn not_exists(catalog: &Catalog, key: &str) -> Result<(), EngineError> {
	if catalog.contains(key) {
		return Err(EngineError::DuplicateEntry(key.to_string()));
	}
	Ok(())
}

pub fn kind_is(
	catalog: &Catalog,
	op: &'static str,
	key: &str,
	expected: Kind,
) -> Result<(), EngineError> {
	if catalog.kind_of(key) != Some(expected) {
		return Err(EngineError::KindMismatch {
			op,
			key: key.to_string(),
			expected,
		});
	}
	Ok(())
}

pub fn valid_id(vecid: i64) -> Result<(), EngineError> {
	if vecid < 1 {
		return Err(EngineError::InvalidId(vecid));
	}
	Ok(())
}

pub fn valid_probs(components: &[f32]) -> Result<(), EngineError> {
	for &prob in components {
		if !(0.0..=1.0).contains(&prob) || prob.is_nan() {
			return Err(EngineError::InvalidProbability(prob));
		}
	}
	Ok(())
}

/// Flat (index, weight) pairs: even length, indices within the basis
/// dimension bound, non-negative weights.
pub fn valid_sparse_pairs(max_index: usize, pairs: &[i64]) -> Result<(), EngineError> {
	if pairs.len() % 2 != 0 {
		return Err(EngineError::InvalidSparsePair(
			"sparse vector should be paired".into(),
		));
	}
	for chunk in pairs.chunks_exact(2) {
		let (index, weight) = (chunk[0], chunk[1]);
		if index < 0 || index > max_index as i64 {
			return Err(EngineError::InvalidSparsePair(format!(
				"index '{index}' out of bound"
			)));
		}
		if weight < 0 {
			return Err(EngineError::InvalidSparsePair(format!(
				"weight '{weight}' should be non-negative"
			)));
		}
	}
	Ok(())
}

pub fn same_basis(catalog: &Catalog, source: &str, target: &str) -> Result<(), EngineError> {
	if catalog.basis_of(source) != catalog.basis_of(target) {
		return Err(EngineError::BasisMismatch {
			src_key: source.to_string(),
			target: target.to_string(),
		});
	}
	Ok(())
}

pub fn valid_dump_path(path: &Path) -> Result<(), EngineError> {
	if !path.is_file() {
		return Err(EngineError::DumpMissing(path.display().to_string()));
	}
	Ok(())
}
