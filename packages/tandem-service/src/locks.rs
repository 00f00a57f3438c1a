use std::{
	collections::HashMap,
	sync::{Arc, Mutex},
};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Serializes work per (provider, product_id) so concurrent consumers never interleave writes for
/// the same listing. Jobs for different listings proceed in parallel.
#[derive(Default)]
pub(crate) struct KeyLocks {
	entries: Mutex<HashMap<(String, String), Arc<AsyncMutex<()>>>>,
}
impl KeyLocks {
	pub(crate) async fn lock(&self, provider: &str, product_id: &str) -> OwnedMutexGuard<()> {
		let entry = {
			let mut entries = self.entries.lock().unwrap_or_else(|err| err.into_inner());

			// A strong count of one means only the map holds the lock; nobody is waiting on it.
			entries.retain(|_, lock| Arc::strong_count(lock) > 1);
			entries
				.entry((provider.to_string(), product_id.to_string()))
				.or_default()
				.clone()
		};

		entry.lock_owned().await
	}
}
