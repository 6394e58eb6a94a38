// ---------------------------------------------------------------------------
// Scoring functions -- similarity measures over probability vectors
// ---------------------------------------------------------------------------
//
// Pure functions. Each recommendation relation picks one measure at
// creation time by name.
// ---------------------------------------------------------------------------

use crate::error::EngineError;

/// Similarity measure attached to a recommendation relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scoring {
	Cosine,
	JensenShannon,
}

impl Scoring {
	/// Resolve a measure by its wire name.
	pub fn from_name(name: &str) -> Result<Self, EngineError> {
		match name {
			"cosine" => Ok(Self::Cosine),
			"jensenshannon" => Ok(Self::JensenShannon),
			other => Err(EngineError::kernel(
				"rmk",
				format!("unknown scoring function '{other}'"),
			)),
		}
	}

	pub fn name(&self) -> &'static str {
		match self {
			Self::Cosine => "cosine",
			Self::JensenShannon => "jensenshannon",
		}
	}

	pub fn score(&self, a: &[f32], b: &[f32]) -> f32 {
		match self {
			Self::Cosine => cosine_similarity(a, b),
			Self::JensenShannon => jensen_shannon_similarity(a, b),
		}
	}
}

/// Compute cosine similarity between two f32 vectors.
/// Returns 0.0 for zero-magnitude vectors or dimension mismatches.
/// Result clamped to [-1.0, 1.0].
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
	if a.len() != b.len() || a.is_empty() {
		return 0.0;
	}

	let mut dot: f64 = 0.0;
	let mut norm_a: f64 = 0.0;
	let mut norm_b: f64 = 0.0;

	for i in 0..a.len() {
		let ai = a[i] as f64;
		let bi = b[i] as f64;
		dot += ai * bi;
		norm_a += ai * ai;
		norm_b += bi * bi;
	}

	let denom = norm_a.sqrt() * norm_b.sqrt();
	if denom == 0.0 {
		return 0.0;
	}

	let result = dot / denom;
	if !result.is_finite() {
		return 0.0;
	}
	result.clamp(-1.0, 1.0) as f32
}

/// Similarity derived from Jensen-Shannon divergence: `1 - JSD(p, q) / ln 2`.
/// Inputs are normalized to distributions first; zero-mass or mismatched
/// vectors score 0.0.
pub fn jensen_shannon_similarity(a: &[f32], b: &[f32]) -> f32 {
	if a.len() != b.len() || a.is_empty() {
		return 0.0;
	}

	let sum_a: f64 = a.iter().map(|&x| x as f64).sum();
	let sum_b: f64 = b.iter().map(|&x| x as f64).sum();
	if sum_a <= 0.0 || sum_b <= 0.0 {
		return 0.0;
	}

	let mut divergence: f64 = 0.0;
	for i in 0..a.len() {
		let p = a[i] as f64 / sum_a;
		let q = b[i] as f64 / sum_b;
		let m = 0.5 * (p + q);
		// 0 * ln(0/x) contributes nothing
		if p > 0.0 && m > 0.0 {
			divergence += 0.5 * p * (p / m).ln();
		}
		if q > 0.0 && m > 0.0 {
			divergence += 0.5 * q * (q / m).ln();
		}
	}

	let normalized = divergence / std::f64::consts::LN_2;
	if !normalized.is_finite() {
		return 0.0;
	}
	(1.0 - normalized).clamp(0.0, 1.0) as f32
}
