pub fn render_schema() -> String {
	let init = include_str!("../../../sql/init.sql");

	expand_includes(init)
}

fn expand_includes(sql: &str) -> String {
	let mut out = String::new();

	for line in sql.lines() {
		let trimmed = line.trim();

		if let Some(path) = trimmed.strip_prefix("\\ir ") {
			match path.trim() {
				"tables/001_listings.sql" =>
					out.push_str(include_str!("../../../sql/tables/001_listings.sql")),
				"tables/002_failed_operations.sql" =>
					out.push_str(include_str!("../../../sql/tables/002_failed_operations.sql")),
				_ => out.push_str(line),
			}
		} else {
			out.push_str(line);
		}

		out.push('\n');
	}

	out
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn schema_expands_every_include() {
		let sql = render_schema();

		assert!(!sql.contains("\\ir "), "Unexpanded include in rendered schema.");
		assert!(sql.contains("CREATE TABLE IF NOT EXISTS listings"));
		assert!(sql.contains("CREATE TABLE IF NOT EXISTS failed_operations"));
		assert!(sql.contains("uniq_failed_operations_unresolved"));
	}
}
