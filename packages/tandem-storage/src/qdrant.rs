use qdrant_client::{
	Qdrant,
	client::Payload,
	qdrant::{
		CreateCollectionBuilder, DeletePointsBuilder, Distance, GetPointsBuilder, PointId,
		PointStruct, PointsIdsList, RetrievedPoint, UpsertPointsBuilder, VectorParamsBuilder,
	},
};
use uuid::Uuid;

use crate::Result;

pub const PAYLOAD_PROVIDER: &str = "provider";
pub const PAYLOAD_PRODUCT_ID: &str = "product_id";
pub const PAYLOAD_TITLE: &str = "title";
pub const PAYLOAD_PAGE_URL: &str = "page_url";
pub const PAYLOAD_SCHEME_ID: &str = "scheme_id";

pub struct QdrantStore {
	pub client: Qdrant,
	pub collection: String,
	pub vector_dim: u32,
}
impl QdrantStore {
	pub fn new(cfg: &tandem_config::Qdrant) -> Result<Self> {
		let client = Qdrant::from_url(&cfg.url).build()?;

		Ok(Self { client, collection: cfg.collection.clone(), vector_dim: cfg.vector_dim })
	}

	pub async fn ensure_collection(&self) -> Result<()> {
		if self.client.collection_exists(&self.collection).await? {
			return Ok(());
		}

		self.client
			.create_collection(CreateCollectionBuilder::new(&self.collection).vectors_config(
				VectorParamsBuilder::new(self.vector_dim as u64, Distance::Cosine),
			))
			.await?;

		Ok(())
	}

	/// Waited upsert so the relational `indexed` flag is only raised once the point is durable.
	pub async fn upsert_point(
		&self,
		point_id: Uuid,
		vector: Vec<f32>,
		payload: Payload,
	) -> Result<()> {
		let point = PointStruct::new(point_id.to_string(), vector, payload);

		self.client
			.upsert_points(UpsertPointsBuilder::new(self.collection.clone(), vec![point]).wait(true))
			.await?;

		Ok(())
	}

	/// Returns `false` when the point was already absent, which callers treat as success.
	pub async fn delete_point(&self, point_id: Uuid) -> Result<bool> {
		let ids = PointsIdsList { ids: vec![PointId::from(point_id.to_string())] };
		let delete = DeletePointsBuilder::new(self.collection.clone()).points(ids).wait(true);

		match self.client.delete_points(delete).await {
			Ok(_) => Ok(true),
			Err(err) =>
				if is_not_found_error(&err) {
					Ok(false)
				} else {
					Err(err.into())
				},
		}
	}

	pub async fn fetch_point(&self, point_id: Uuid) -> Result<Option<RetrievedPoint>> {
		let response = self
			.client
			.get_points(
				GetPointsBuilder::new(
					self.collection.clone(),
					vec![PointId::from(point_id.to_string())],
				)
				.with_payload(true)
				.with_vectors(false),
			)
			.await?;

		Ok(response.result.into_iter().next())
	}
}

fn is_not_found_error(err: &qdrant_client::QdrantError) -> bool {
	let message = err.to_string().to_lowercase();
	let point_not_found =
		(message.contains("not found") || message.contains("404")) && message.contains("point");
	let no_point_found = message.contains("no point") && message.contains("found");

	point_not_found || no_point_found
}
