use std::collections::HashMap;
use std::path::PathBuf;

use clap::Parser;
use serde::{Deserialize, Serialize};

use crate::recommendation::DEFAULT_LIMIT;

/// Engine configuration. Front-ends either deserialize this or build it
/// from [`CliArgs`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
	/// Directory holding one `<bkey>.dmp` per basis, relative to the
	/// working directory unless absolute.
	pub savepath: String,
	/// Milliseconds between automatic catalog-wide saves.
	pub saveinterval_ms: u64,
	/// Progress-log granularity for bulk vector writes.
	pub bycount: u64,
	pub reader_workers: usize,
	pub reader_queue: usize,
	/// Per-basis options, keyed by bkey, passed opaquely to the kernel.
	pub basis: HashMap<String, BasisOptions>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BasisOptions {
	/// Top-K bound for recommendation lists under this basis.
	pub limit: Option<usize>,
}

impl Default for EngineConfig {
	fn default() -> Self {
		Self {
			savepath: "dumps".to_string(),
			saveinterval_ms: 120_000,
			bycount: 1000,
			reader_workers: 53,
			reader_queue: 100,
			basis: HashMap::new(),
		}
	}
}

impl EngineConfig {
	pub fn save_dir(&self) -> PathBuf {
		let path = PathBuf::from(&self.savepath);
		if path.is_absolute() {
			path
		} else {
			std::env::current_dir().unwrap_or_default().join(path)
		}
	}

	pub fn basis_limit(&self, bkey: &str) -> usize {
		self.basis
			.get(bkey)
			.and_then(|options| options.limit)
			.unwrap_or(DEFAULT_LIMIT)
	}

	pub fn from_args(args: &CliArgs) -> Self {
		Self {
			savepath: args.savepath.clone(),
			saveinterval_ms: args.saveinterval,
			bycount: args.bycount,
			..Self::default()
		}
	}
}

#[derive(Parser, Debug)]
#[command(name = "simrec-engine", about = "Probability-vector similarity engine with live top-K recommendations")]
pub struct CliArgs {
	/// Dump directory, relative to the working directory
	#[arg(long, default_value = "dumps", env = "SIMREC_SAVEPATH")]
	pub savepath: String,

	/// Milliseconds between automatic saves
	#[arg(long, default_value = "120000", env = "SIMREC_SAVEINTERVAL")]
	pub saveinterval: u64,

	/// Log a progress line every N bulk vector writes
	#[arg(long, default_value = "1000", env = "SIMREC_BYCOUNT")]
	pub bycount: u64,

	/// Log level (trace, debug, info, warn, error)
	#[arg(long, default_value = "info", env = "SIMREC_LOG_LEVEL")]
	pub log_level: String,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn defaults_match_documented_values() {
		let config = EngineConfig::default();
		assert_eq!(config.savepath, "dumps");
		assert_eq!(config.saveinterval_ms, 120_000);
		assert_eq!(config.bycount, 1000);
		assert_eq!(config.reader_workers, 53);
		assert_eq!(config.reader_queue, 100);
	}

	#[test]
	fn absolute_savepath_is_honored() {
		let config = EngineConfig {
			savepath: "/tmp/simrec-dumps".to_string(),
			..Default::default()
		};
		assert_eq!(config.save_dir(), PathBuf::from("/tmp/simrec-dumps"));
	}

	#[test]
	fn basis_limit_falls_back_to_default() {
		let mut config = EngineConfig::default();
		assert_eq!(config.basis_limit("b1"), DEFAULT_LIMIT);
		config
			.basis
			.insert("b1".to_string(), BasisOptions { limit: Some(5) });
		assert_eq!(config.basis_limit("b1"), 5);
		assert_eq!(config.basis_limit("b2"), DEFAULT_LIMIT);
	}

	#[test]
	fn deserializes_with_partial_fields() {
		let config: EngineConfig =
			serde_json::from_str(r#"{ "savepath": "data", "basis": { "b1": { "limit": 3 } } }"#)
				.unwrap();
		assert_eq!(config.savepath, "data");
		assert_eq!(config.basis_limit("b1"), 3);
		assert_eq!(config.bycount, 1000);
	}
}
