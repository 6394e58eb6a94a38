use serde::Deserialize;

// ── JSON-RPC 2.0 error codes ────────────────────────────────────────────────

pub const INTERNAL_ERROR: i32 = -32603;
pub const METHOD_NOT_FOUND: i32 = -32601;
pub const INVALID_PARAMS: i32 = -32602;
pub const ENGINE_ERROR: i32 = -32000;

// ── Incoming request ────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct JsonRpcRequest {
	pub id: u64,
	pub method: String,
	#[serde(default)]
	pub params: serde_json::Value,
}

// ── Params ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct BkeyParams {
	pub bkey: String,
}

#[derive(Debug, Deserialize)]
pub struct SchemaParams {
	pub bkey: String,
	pub schema: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct VmkParams {
	pub bkey: String,
	pub vkey: String,
}

#[derive(Debug, Deserialize)]
pub struct VkeyParams {
	pub vkey: String,
}

#[derive(Debug, Deserialize)]
pub struct VectorIdParams {
	pub vkey: String,
	pub vecid: i64,
}

#[derive(Debug, Deserialize)]
pub struct DenseVectorParams {
	pub vkey: String,
	pub vecid: i64,
	pub components: Vec<f32>,
}

#[derive(Debug, Deserialize)]
pub struct SparseVectorParams {
	pub vkey: String,
	pub vecid: i64,
	pub pairs: Vec<i64>,
}

#[derive(Debug, Deserialize)]
pub struct RmkParams {
	pub source: String,
	pub target: String,
	pub funcscore: String,
}

#[derive(Debug, Deserialize)]
pub struct RecQueryParams {
	pub source: String,
	pub vecid: i64,
	pub target: String,
}

#[derive(Debug, Deserialize)]
pub struct KeyParams {
	pub key: String,
}
