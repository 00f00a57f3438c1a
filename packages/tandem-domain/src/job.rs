use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use time::{OffsetDateTime, format_description::well_known::Rfc3339};
use uuid::Uuid;

use crate::{Error, Result};

/// Upper bound on a raw queue message. Anything larger is rejected before parsing.
pub const MAX_MESSAGE_BYTES: usize = 1_048_576;
pub const MAX_TITLE_CHARS: usize = 500;
pub const MAX_CONTENT_CHARS: usize = 10_000;
pub const MAX_IMAGES: usize = 20;

pub const DEFAULT_PROVIDER: &str = "bunjang";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobKind {
	Sync,
	Update,
	Delete,
}
impl JobKind {
	pub fn as_str(&self) -> &'static str {
		match self {
			Self::Sync => "sync",
			Self::Update => "update",
			Self::Delete => "delete",
		}
	}

	pub fn parse(raw: &str) -> Option<Self> {
		match raw {
			"sync" => Some(Self::Sync),
			"update" => Some(Self::Update),
			"delete" => Some(Self::Delete),
			_ => None,
		}
	}
}

/// Listing attributes carried by sync and update jobs.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProductPayload {
	pub pid: String,
	pub title: String,
	pub price: Option<i64>,
	pub content: Option<String>,
	pub year: Option<i32>,
	pub mileage: Option<i64>,
	pub page_url: String,
	pub images: Vec<String>,
}

/// A validated change job. Immutable once decoded.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Job {
	pub job_id: Uuid,
	pub kind: JobKind,
	pub product_id: String,
	pub provider: String,
	pub payload: Option<ProductPayload>,
	pub timestamp: Option<OffsetDateTime>,
	pub metadata: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct RawJob {
	id: Option<String>,
	r#type: Option<String>,
	product_id: Option<String>,
	provider: Option<String>,
	product_data: Option<RawProductData>,
	timestamp: Option<String>,
	metadata: Option<Map<String, Value>>,
}

#[derive(Debug, Deserialize)]
struct RawProductData {
	pid: Option<String>,
	title: Option<String>,
	price: Option<i64>,
	content: Option<String>,
	year: Option<i64>,
	mileage: Option<i64>,
	page_url: Option<String>,
	images: Option<Vec<String>>,
}

impl Job {
	/// Decodes and validates one raw queue message.
	///
	/// Rejections carry the offending field; a rejected message is dropped by the caller and
	/// never retried, since replaying the same bytes cannot succeed.
	pub fn decode(raw: &[u8], default_provider: &str) -> Result<Self> {
		if raw.len() > MAX_MESSAGE_BYTES {
			return Err(Error::validation(
				"message",
				format!("message is {} bytes, limit is {MAX_MESSAGE_BYTES}", raw.len()),
			));
		}

		let raw: RawJob = serde_json::from_slice(raw)
			.map_err(|err| Error::Malformed { message: err.to_string() })?;
		let kind = match raw.r#type.as_deref() {
			None => return Err(Error::validation("type", "field is required")),
			Some(value) => JobKind::parse(value)
				.ok_or_else(|| Error::validation("type", format!("unknown job type {value:?}")))?,
		};
		let product_id = match raw.product_id {
			Some(value) if !value.trim().is_empty() => value,
			_ => return Err(Error::validation("product_id", "field is required and non-empty")),
		};
		let provider = match raw.provider {
			Some(value) if !value.trim().is_empty() => value,
			_ => default_provider.to_string(),
		};
		let payload = match (kind, raw.product_data) {
			(JobKind::Delete, _) => None,
			(_, None) =>
				return Err(Error::validation("product_data", "field is required for this job type")),
			(_, Some(data)) => Some(validate_payload(data)?),
		};
		let timestamp = match raw.timestamp {
			None => None,
			Some(value) => Some(
				OffsetDateTime::parse(&value, &Rfc3339)
					.map_err(|_| Error::validation("timestamp", "expected an RFC 3339 timestamp"))?,
			),
		};
		let job_id = raw
			.id
			.and_then(|value| Uuid::parse_str(&value).ok())
			.unwrap_or_else(Uuid::new_v4);

		Ok(Self {
			job_id,
			kind,
			product_id,
			provider,
			payload,
			timestamp,
			metadata: raw.metadata.unwrap_or_default(),
		})
	}
}

fn validate_payload(data: RawProductData) -> Result<ProductPayload> {
	let pid = match data.pid {
		Some(value) if !value.trim().is_empty() => value,
		_ => return Err(Error::validation("product_data.pid", "field is required and non-empty")),
	};
	let title = match data.title {
		Some(value) if !value.trim().is_empty() => value,
		_ => return Err(Error::validation("product_data.title", "field is required and non-empty")),
	};

	if title.chars().count() > MAX_TITLE_CHARS {
		return Err(Error::validation(
			"product_data.title",
			format!("exceeds {MAX_TITLE_CHARS} characters"),
		));
	}

	if let Some(content) = data.content.as_deref()
		&& content.chars().count() > MAX_CONTENT_CHARS
	{
		return Err(Error::validation(
			"product_data.content",
			format!("exceeds {MAX_CONTENT_CHARS} characters"),
		));
	}
	if let Some(price) = data.price
		&& price < 0
	{
		return Err(Error::validation("product_data.price", "must be a non-negative integer"));
	}
	if let Some(mileage) = data.mileage
		&& mileage < 0
	{
		return Err(Error::validation("product_data.mileage", "must be a non-negative integer"));
	}

	let year = match data.year {
		None => None,
		Some(value) if (1_000..=9_999).contains(&value) => Some(value as i32),
		Some(_) =>
			return Err(Error::validation("product_data.year", "must be a 4-digit integer")),
	};
	let images = data.images.unwrap_or_default();

	if images.len() > MAX_IMAGES {
		return Err(Error::validation(
			"product_data.images",
			format!("exceeds {MAX_IMAGES} entries"),
		));
	}

	for url in &images {
		if !is_url_shaped(url) {
			return Err(Error::validation(
				"product_data.images",
				format!("entry {url:?} is not a URL"),
			));
		}
	}

	// The mobile listing page is derivable from the pid when the producer omitted it.
	let page_url = match data.page_url {
		Some(value) if !value.trim().is_empty() => value,
		_ => format!("https://m.bunjang.co.kr/products/{pid}"),
	};

	Ok(ProductPayload {
		pid,
		title,
		price: data.price,
		content: data.content,
		year,
		mileage: data.mileage,
		page_url,
		images,
	})
}

fn is_url_shaped(value: &str) -> bool {
	let rest = value.strip_prefix("https://").or_else(|| value.strip_prefix("http://"));

	match rest {
		Some(rest) => !rest.is_empty() && !rest.starts_with('/'),
		None => false,
	}
}
