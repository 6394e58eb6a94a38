// ---------------------------------------------------------------------------
// EngineServer -- JSON-RPC dispatch over stdin/stdout
// ---------------------------------------------------------------------------
//
// One method per engine operation. The read loop never blocks on engine
// work: every operation replies through a callback that writes the
// response line whenever its executor finishes, so responses may arrive
// out of submission order and ids are the only correlation.
// ---------------------------------------------------------------------------

use std::io::BufRead;

use serde::de::DeserializeOwned;
use serde_json::json;

use crate::engine::Engine;
use crate::error::EngineError;
use crate::protocol::*;
use crate::transport::NdjsonTransport;
use crate::types::{Callback, Reply};

pub struct EngineServer {
	engine: Engine,
	transport: NdjsonTransport,
}

fn reply_value(reply: Reply) -> serde_json::Value {
	match reply {
		Reply::Ok => json!("ok"),
		Reply::StringList(values) => json!(values),
		Reply::IntList(values) => json!(values),
		Reply::FloatList(values) => json!(values),
	}
}

impl EngineServer {
	pub fn new(engine: Engine, transport: NdjsonTransport) -> Self {
		Self { engine, transport }
	}

	/// Main loop: read JSON-RPC messages from stdin, dispatch to the
	/// engine, until stdin closes.
	pub fn run(&mut self) -> Result<(), EngineError> {
		let stdin = std::io::stdin();
		let reader = stdin.lock();

		for line_result in reader.lines() {
			let line = line_result?;
			let trimmed = line.trim();
			if trimmed.is_empty() {
				continue;
			}

			match serde_json::from_str::<JsonRpcRequest>(trimmed) {
				Ok(request) => self.dispatch(request),
				Err(e) => {
					tracing::warn!("Parse error: {}", e);
					self.transport.write_error(
						0,
						INTERNAL_ERROR,
						"Parse error: invalid JSON",
						None,
					);
				}
			}
		}

		Ok(())
	}

	fn callback(&self, id: u64) -> Callback {
		let transport = self.transport.clone();
		Box::new(move |result| match result {
			Ok(reply) => transport.write_response(id, reply_value(reply)),
			Err(e) => transport.write_error(
				id,
				ENGINE_ERROR,
				e.to_string(),
				Some(json!({ "engineCode": e.code() })),
			),
		})
	}

	fn params<T: DeserializeOwned>(&self, id: u64, value: serde_json::Value) -> Option<T> {
		match serde_json::from_value(value) {
			Ok(parsed) => Some(parsed),
			Err(e) => {
				self.transport
					.write_error(id, INVALID_PARAMS, format!("Invalid params: {e}"), None);
				None
			}
		}
	}

	fn dispatch(&self, request: JsonRpcRequest) {
		let id = request.id;
		let cb = self.callback(id);
		match request.method.as_str() {
			"blist" => self.engine.blist(cb),
			"bmk" => {
				if let Some(p) = self.params::<SchemaParams>(id, request.params) {
					self.engine.bmk(&p.bkey, &p.schema, cb);
				}
			}
			"brev" => {
				if let Some(p) = self.params::<SchemaParams>(id, request.params) {
					self.engine.brev(&p.bkey, &p.schema, cb);
				}
			}
			"bget" => {
				if let Some(p) = self.params::<BkeyParams>(id, request.params) {
					self.engine.bget(&p.bkey, cb);
				}
			}
			"bload" => {
				if let Some(p) = self.params::<BkeyParams>(id, request.params) {
					self.engine.bload(&p.bkey, Some(cb));
				}
			}
			"bsave" => {
				if let Some(p) = self.params::<BkeyParams>(id, request.params) {
					self.engine.bsave(&p.bkey, Some(cb));
				}
			}
			"vlist" => {
				if let Some(p) = self.params::<BkeyParams>(id, request.params) {
					self.engine.vlist(&p.bkey, cb);
				}
			}
			"vmk" => {
				if let Some(p) = self.params::<VmkParams>(id, request.params) {
					self.engine.vmk(&p.bkey, &p.vkey, cb);
				}
			}
			"vids" => {
				if let Some(p) = self.params::<VkeyParams>(id, request.params) {
					self.engine.vids(&p.vkey, cb);
				}
			}
			"vget" => {
				if let Some(p) = self.params::<VectorIdParams>(id, request.params) {
					self.engine.vget(&p.vkey, p.vecid, cb);
				}
			}
			"vadd" => {
				if let Some(p) = self.params::<DenseVectorParams>(id, request.params) {
					self.engine.vadd(&p.vkey, p.vecid, p.components, cb);
				}
			}
			"vset" => {
				if let Some(p) = self.params::<DenseVectorParams>(id, request.params) {
					self.engine.vset(&p.vkey, p.vecid, p.components, cb);
				}
			}
			"vacc" => {
				if let Some(p) = self.params::<DenseVectorParams>(id, request.params) {
					self.engine.vacc(&p.vkey, p.vecid, p.components, cb);
				}
			}
			"vrem" => {
				if let Some(p) = self.params::<VectorIdParams>(id, request.params) {
					self.engine.vrem(&p.vkey, p.vecid, cb);
				}
			}
			"iget" => {
				if let Some(p) = self.params::<VectorIdParams>(id, request.params) {
					self.engine.iget(&p.vkey, p.vecid, cb);
				}
			}
			"iadd" => {
				if let Some(p) = self.params::<SparseVectorParams>(id, request.params) {
					self.engine.iadd(&p.vkey, p.vecid, p.pairs, cb);
				}
			}
			"iset" => {
				if let Some(p) = self.params::<SparseVectorParams>(id, request.params) {
					self.engine.iset(&p.vkey, p.vecid, p.pairs, cb);
				}
			}
			"iacc" => {
				if let Some(p) = self.params::<SparseVectorParams>(id, request.params) {
					self.engine.iacc(&p.vkey, p.vecid, p.pairs, cb);
				}
			}
			"rlist" => {
				if let Some(p) = self.params::<VkeyParams>(id, request.params) {
					self.engine.rlist(&p.vkey, cb);
				}
			}
			"rmk" => {
				if let Some(p) = self.params::<RmkParams>(id, request.params) {
					self.engine.rmk(&p.source, &p.target, &p.funcscore, cb);
				}
			}
			"rget" => {
				if let Some(p) = self.params::<RecQueryParams>(id, request.params) {
					self.engine.rget(&p.source, p.vecid, &p.target, cb);
				}
			}
			"rrec" => {
				if let Some(p) = self.params::<RecQueryParams>(id, request.params) {
					self.engine.rrec(&p.source, p.vecid, &p.target, cb);
				}
			}
			"del" => {
				if let Some(p) = self.params::<KeyParams>(id, request.params) {
					self.engine.del(&p.key, Some(cb));
				}
			}
			"load" => self.engine.load(Some(cb)),
			"save" => self.engine.save(Some(cb)),
			other => {
				self.transport.write_error(
					id,
					METHOD_NOT_FOUND,
					format!("Method not found: {other}"),
					None,
				);
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn reply_values_map_to_json() {
		assert_eq!(reply_value(Reply::Ok), json!("ok"));
		assert_eq!(
			reply_value(Reply::StringList(vec!["a".into(), "b".into()])),
			json!(["a", "b"])
		);
		assert_eq!(reply_value(Reply::IntList(vec![1, 2])), json!([1, 2]));
		assert_eq!(
			reply_value(Reply::FloatList(vec![0.5])),
			json!([0.5f32])
		);
	}

	#[test]
	fn request_params_default_to_null() {
		let request: JsonRpcRequest =
			serde_json::from_str(r#"{ "id": 1, "method": "blist" }"#).unwrap();
		assert_eq!(request.id, 1);
		assert!(request.params.is_null());
	}
}
