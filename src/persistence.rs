// ---------------------------------------------------------------------------
// Dump codec -- gzipped JSON basis snapshots
// ---------------------------------------------------------------------------
//
// One file per basis: `<bkey>.dmp` holding gzipped JSON
// `{ "version": 1, "key", "schema", "vectorSets", "recommendations" }`.
// Dense components travel as base64-encoded little-endian f32 bytes;
// sparse vectors as flat (index, weight) integer pairs. Recommendation
// relations persist their definition only; top-K lists are rebuilt on
// restore from the restored vectors.
// ---------------------------------------------------------------------------

use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use flate2::read::{GzDecoder, GzEncoder};
use flate2::Compression;
use serde::{Deserialize, Serialize};

use crate::error::EngineError;

pub const DUMP_VERSION: u32 = 1;

// ---------------------------------------------------------------------------
// On-disk structures
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize)]
pub struct DumpFile {
	pub version: u32,
	pub key: String,
	pub schema: Vec<String>,
	#[serde(rename = "vectorSets")]
	pub vector_sets: Vec<DumpVectorSet>,
	pub recommendations: Vec<DumpRecommendation>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DumpVectorSet {
	pub key: String,
	/// vecid -> base64 f32 LE components
	pub dense: BTreeMap<i64, String>,
	/// vecid -> flat (index, weight) pairs
	pub sparse: BTreeMap<i64, Vec<i64>>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DumpRecommendation {
	pub source: String,
	pub target: String,
	pub scoring: String,
	pub limit: usize,
}

// ---------------------------------------------------------------------------
// Component encode / decode
// ---------------------------------------------------------------------------

/// Encode an f32 slice as base64 of little-endian bytes.
pub fn encode_components(components: &[f32]) -> String {
	let bytes: Vec<u8> = components.iter().flat_map(|f| f.to_le_bytes()).collect();
	STANDARD.encode(&bytes)
}

/// Decode a base64-encoded f32 LE byte string back to `Vec<f32>`.
pub fn decode_components(encoded: &str) -> Result<Vec<f32>, EngineError> {
	let bytes = STANDARD
		.decode(encoded)
		.map_err(|e| EngineError::Corruption(format!("Invalid base64: {e}")))?;
	if bytes.len() % 4 != 0 {
		return Err(EngineError::Corruption(
			"Invalid component payload length".into(),
		));
	}
	let mut result = Vec::with_capacity(bytes.len() / 4);
	for chunk in bytes.chunks_exact(4) {
		result.push(f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]));
	}
	Ok(result)
}

// ---------------------------------------------------------------------------
// Gzip compress / decompress
// ---------------------------------------------------------------------------

pub fn compress(data: &[u8]) -> Result<Vec<u8>, EngineError> {
	let mut encoder = GzEncoder::new(data, Compression::new(6));
	let mut compressed = Vec::new();
	encoder.read_to_end(&mut compressed).map_err(EngineError::Io)?;
	Ok(compressed)
}

pub fn decompress(data: &[u8]) -> Result<Vec<u8>, EngineError> {
	let mut decoder = GzDecoder::new(data);
	let mut decompressed = Vec::new();
	decoder
		.read_to_end(&mut decompressed)
		.map_err(EngineError::Io)?;
	Ok(decompressed)
}

/// Check for the gzip magic bytes (0x1f, 0x8b).
pub fn is_gzipped(data: &[u8]) -> bool {
	data.len() >= 2 && data[0] == 0x1f && data[1] == 0x8b
}

// ---------------------------------------------------------------------------
// File I/O
// ---------------------------------------------------------------------------

/// Write a dump file, creating parent directories as needed.
pub fn save_dump(path: &Path, dump: &DumpFile) -> Result<(), EngineError> {
	if let Some(parent) = path.parent() {
		std::fs::create_dir_all(parent).map_err(EngineError::Io)?;
	}
	let json = serde_json::to_string(dump)
		.map_err(|e| EngineError::Corruption(format!("Failed to serialize dump: {e}")))?;
	let compressed = compress(json.as_bytes())?;
	std::fs::write(path, &compressed).map_err(EngineError::Io)?;
	Ok(())
}

/// Read a dump file. Plain (uncompressed) JSON is accepted too.
pub fn load_dump(path: &Path) -> Result<DumpFile, EngineError> {
	let raw = std::fs::read(path).map_err(EngineError::Io)?;
	let json_bytes = if is_gzipped(&raw) { decompress(&raw)? } else { raw };
	let json = std::str::from_utf8(&json_bytes)
		.map_err(|e| EngineError::Corruption(format!("Invalid UTF-8 in dump: {e}")))?;
	let dump: DumpFile = serde_json::from_str(json)
		.map_err(|e| EngineError::Corruption(format!("Invalid dump JSON: {e}")))?;
	if dump.version != DUMP_VERSION {
		return Err(EngineError::Corruption(format!(
			"Unsupported dump version: {}",
			dump.version
		)));
	}
	Ok(dump)
}

#[cfg(test)]
mod tests {
	use super::*;

	fn sample_dump() -> DumpFile {
		let mut dense = BTreeMap::new();
		dense.insert(1, encode_components(&[0.2, 0.3, 0.5]));
		let mut sparse = BTreeMap::new();
		sparse.insert(2, vec![0, 4, 2, 12]);
		DumpFile {
			version: DUMP_VERSION,
			key: "b1".into(),
			schema: vec!["a".into(), "b".into(), "c".into()],
			vector_sets: vec![DumpVectorSet {
				key: "vs".into(),
				dense,
				sparse,
			}],
			recommendations: vec![DumpRecommendation {
				source: "vs".into(),
				target: "vs".into(),
				scoring: "cosine".into(),
				limit: 20,
			}],
		}
	}

	#[test]
	fn encode_decode_components_roundtrip() {
		let original = vec![1.0f32, -0.5, 0.0, 0.25, 1e-10];
		let decoded = decode_components(&encode_components(&original)).unwrap();
		assert_eq!(original.len(), decoded.len());
		for (a, b) in original.iter().zip(decoded.iter()) {
			assert!((a - b).abs() < 1e-6);
		}
	}

	#[test]
	fn encode_components_empty() {
		assert_eq!(encode_components(&[]), "");
		assert!(decode_components("").unwrap().is_empty());
	}

	#[test]
	fn decode_components_invalid_base64() {
		assert!(decode_components("!!!bad!!!").is_err());
	}

	#[test]
	fn decode_components_wrong_length() {
		let encoded = STANDARD.encode([0u8, 1, 2]);
		assert!(decode_components(&encoded).is_err());
	}

	#[test]
	fn compress_roundtrip_and_magic() {
		let original = b"simrec dump payload";
		let compressed = compress(original).unwrap();
		assert!(is_gzipped(&compressed));
		assert!(!is_gzipped(original));
		assert_eq!(decompress(&compressed).unwrap(), original);
	}

	#[test]
	fn save_load_roundtrip() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("b1.dmp");
		save_dump(&path, &sample_dump()).unwrap();

		let restored = load_dump(&path).unwrap();
		assert_eq!(restored.key, "b1");
		assert_eq!(restored.schema.len(), 3);
		assert_eq!(restored.vector_sets.len(), 1);
		let set = &restored.vector_sets[0];
		let components = decode_components(&set.dense[&1]).unwrap();
		assert!((components[0] - 0.2).abs() < 1e-6);
		assert_eq!(set.sparse[&2], vec![0, 4, 2, 12]);
		assert_eq!(restored.recommendations[0].scoring, "cosine");
	}

	#[test]
	fn save_creates_parent_dirs() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("nested").join("deep").join("b1.dmp");
		save_dump(&path, &sample_dump()).unwrap();
		assert!(path.exists());
	}

	#[test]
	fn load_rejects_bad_version() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("b1.dmp");
		let mut dump = sample_dump();
		dump.version = 99;
		let json = serde_json::to_string(&dump).unwrap();
		std::fs::write(&path, json).unwrap();
		assert!(matches!(
			load_dump(&path),
			Err(EngineError::Corruption(_))
		));
	}

	#[test]
	fn load_accepts_plain_json() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("b1.dmp");
		let json = serde_json::to_string(&sample_dump()).unwrap();
		std::fs::write(&path, json).unwrap();
		assert_eq!(load_dump(&path).unwrap().key, "b1");
	}

	#[test]
	fn load_missing_file_is_io_error() {
		let dir = tempfile::tempdir().unwrap();
		assert!(matches!(
			load_dump(&dir.path().join("absent.dmp")),
			Err(EngineError::Io(_))
		));
	}
}
