use crate::job::ProductPayload;

/// Builds the text handed to the embedding capability from a listing payload.
///
/// Absent attributes are skipped rather than rendered as placeholders, so two listings that
/// differ only in which optional fields are missing still embed differently.
pub fn embedding_text(payload: &ProductPayload) -> String {
	let mut out = payload.title.clone();

	if let Some(year) = payload.year {
		out.push_str(&format!("\nyear: {year}"));
	}
	if let Some(price) = payload.price {
		out.push_str(&format!("\nprice: {price}"));
	}
	if let Some(mileage) = payload.mileage {
		out.push_str(&format!("\nmileage: {mileage}"));
	}
	if let Some(content) = payload.content.as_deref()
		&& !content.trim().is_empty()
	{
		out.push('\n');
		out.push_str(content.trim());
	}

	out
}

#[cfg(test)]
mod tests {
	use super::*;

	fn payload() -> ProductPayload {
		ProductPayload {
			pid: "P1".to_string(),
			title: "2019 Vespa GTS 300".to_string(),
			price: Some(4_500_000),
			content: Some("Well maintained, one owner. ".to_string()),
			year: Some(2_019),
			mileage: Some(12_000),
			page_url: "https://m.bunjang.co.kr/products/P1".to_string(),
			images: Vec::new(),
		}
	}

	#[test]
	fn renders_all_present_fields() {
		let text = embedding_text(&payload());

		assert_eq!(
			text,
			"2019 Vespa GTS 300\nyear: 2019\nprice: 4500000\nmileage: 12000\nWell maintained, one owner."
		);
	}

	#[test]
	fn skips_absent_fields() {
		let mut payload = payload();

		payload.price = None;
		payload.mileage = None;
		payload.content = None;

		assert_eq!(embedding_text(&payload), "2019 Vespa GTS 300\nyear: 2019");
	}
}
