#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Malformed job message: {message}")]
	Malformed { message: String },
	#[error("Invalid job field {field}: {message}")]
	Validation { field: String, message: String },
}
impl Error {
	pub fn validation(field: &str, message: impl Into<String>) -> Self {
		Self::Validation { field: field.to_string(), message: message.into() }
	}

	/// The offending field, when the error names one.
	pub fn field(&self) -> Option<&str> {
		match self {
			Self::Malformed { .. } => None,
			Self::Validation { field, .. } => Some(field),
		}
	}
}
