use std::sync::Arc;

use tandem_queue::JobQueue;
use tandem_service::TandemService;
use tandem_storage::{db::Db, qdrant::QdrantStore};

#[derive(Clone)]
pub struct AppState {
	pub service: Arc<TandemService>,
	pub queue: Arc<JobQueue>,
}
impl AppState {
	pub async fn new(config: tandem_config::Config) -> color_eyre::Result<Self> {
		let db = Db::connect(&config.storage.postgres).await?;

		db.ensure_schema().await?;

		let qdrant = QdrantStore::new(&config.storage.qdrant)?;

		qdrant.ensure_collection().await?;

		let queue = JobQueue::connect(&config.queue).await?;
		let service = TandemService::new(config, db, qdrant);

		Ok(Self { service: Arc::new(service), queue: Arc::new(queue) })
	}
}
