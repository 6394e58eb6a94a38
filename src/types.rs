use std::fmt;

use crate::error::EngineError;

/// What a catalog key names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
	Basis,
	VectorSet,
	Recommendation,
}

impl fmt::Display for Kind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Kind::Basis => write!(f, "basis"),
			Kind::VectorSet => write!(f, "vector set"),
			Kind::Recommendation => write!(f, "recommendation"),
		}
	}
}

/// Payload delivered to an operation callback on success.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
	Ok,
	StringList(Vec<String>),
	IntList(Vec<i64>),
	FloatList(Vec<f32>),
}

/// Every engine operation reports its outcome through one of these.
/// Validation failures arrive synchronously on the caller's thread;
/// everything else arrives from an executor worker.
pub type Callback = Box<dyn FnOnce(Result<Reply, EngineError>) + Send + 'static>;

/// Recommendation key: source first, then target, joined by the one
/// character user keys may not contain.
pub fn rkey(source: &str, target: &str) -> String {
	format!("{source}_{target}")
}

/// Split a recommendation key back into (source, target). User keys never
/// contain `_`, so splitting on the first occurrence is total.
pub fn parse_rkey(key: &str) -> Option<(&str, &str)> {
	key.split_once('_')
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn rkey_roundtrip() {
		let key = rkey("src", "tgt");
		assert_eq!(key, "src_tgt");
		assert_eq!(parse_rkey(&key), Some(("src", "tgt")));
	}

	#[test]
	fn parse_rkey_rejects_plain_keys() {
		assert_eq!(parse_rkey("plain"), None);
	}

	#[test]
	fn parse_rkey_splits_on_first_separator() {
		// A self-recommendation key of "a" onto "a_b" cannot occur (user
		// keys forbid '_'), so first-split is unambiguous.
		assert_eq!(parse_rkey("a_b"), Some(("a", "b")));
	}
}
