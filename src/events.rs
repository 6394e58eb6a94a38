// ---------------------------------------------------------------------------
// Listener contracts -- one-way event stream out of the kernel
// ---------------------------------------------------------------------------
//
// The kernel emits StoreListener events only when it materializes or
// removes entities internally (dump restore); dispatcher-initiated
// mutations update the catalog directly. Vector-set and recommendation
// listeners fire on every mutation, on the mutating thread.
// ---------------------------------------------------------------------------

/// Basis-level events the dispatcher's catalog bridge subscribes to.
pub trait StoreListener: Send + Sync {
	fn on_vecset_added(&self, bkey: &str, vkey: &str);
	fn on_vecset_deleted(&self, bkey: &str, vkey: &str);
	fn on_rec_added(&self, bkey: &str, source: &str, target: &str);
	fn on_rec_deleted(&self, bkey: &str, source: &str, target: &str);
}

/// Per-vector-set mutation events.
pub trait VectorSetListener: Send + Sync {
	fn on_vector_updated(&self, vkey: &str, vecid: i64, components: &[f32]);
	fn on_vector_removed(&self, vkey: &str, vecid: i64);
}

/// Per-relation events: the top-K list of `vecid` in (source, target)
/// changed.
pub trait RecommendationListener: Send + Sync {
	fn on_recommendation_updated(&self, source: &str, target: &str, vecid: i64);
}
