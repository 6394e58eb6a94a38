use thiserror::Error;

use crate::types::Kind;

#[derive(Debug, Error)]
pub enum EngineError {
	#[error("Invalid key format '{0}'")]
	InvalidKeyFormat(String),
	#[error("Unknown data entry '{0}'")]
	UnknownEntry(String),
	#[error("Data entry '{0}' already exists")]
	DuplicateEntry(String),
	#[error("Operation '{op}' against a non-{expected} key '{key}'")]
	KindMismatch {
		op: &'static str,
		key: String,
		expected: Kind,
	},
	#[error("Invalid id '{0}', should be a positive integer")]
	InvalidId(i64),
	#[error("Invalid probability '{0}', should be between 0 and 1")]
	InvalidProbability(f32),
	#[error("Invalid sparse pair: {0}")]
	InvalidSparsePair(String),
	#[error("Recommendation [{src_key}, {target}] must relate two vector sets with the same basis")]
	BasisMismatch { src_key: String, target: String },
	#[error("Dump file '{0}' does not exist")]
	DumpMissing(String),
	#[error("Kernel failure in '{scope}': {message}")]
	Kernel { scope: String, message: String },
	#[error("Reader pool saturated, request rejected")]
	Rejected,
	#[error("Internal error: {0}")]
	Internal(String),
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
	#[error("Dump corruption: {0}")]
	Corruption(String),
}

impl EngineError {
	/// Stable short code, carried in wire error payloads.
	pub fn code(&self) -> &'static str {
		match self {
			Self::InvalidKeyFormat(_) => "ENGINE_INVALID_KEY",
			Self::UnknownEntry(_) => "ENGINE_UNKNOWN_ENTRY",
			Self::DuplicateEntry(_) => "ENGINE_DUPLICATE_ENTRY",
			Self::KindMismatch { .. } => "ENGINE_KIND_MISMATCH",
			Self::InvalidId(_) => "ENGINE_INVALID_ID",
			Self::InvalidProbability(_) => "ENGINE_INVALID_PROB",
			Self::InvalidSparsePair(_) => "ENGINE_INVALID_PAIR",
			Self::BasisMismatch { .. } => "ENGINE_BASIS_MISMATCH",
			Self::DumpMissing(_) => "ENGINE_DUMP_MISSING",
			Self::Kernel { .. } => "ENGINE_KERNEL",
			Self::Rejected => "ENGINE_REJECTED",
			Self::Internal(_) => "ENGINE_INTERNAL",
			Self::Io(_) => "ENGINE_IO",
			Self::Corruption(_) => "ENGINE_CORRUPT",
		}
	}

	/// Wrap a kernel-layer failure with the scope tag of the operation
	/// that was running when it surfaced.
	pub fn kernel(scope: &str, message: impl Into<String>) -> Self {
		Self::Kernel {
			scope: scope.to_string(),
			message: message.into(),
		}
	}
}
