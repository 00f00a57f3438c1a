pub mod identity;
pub mod job;
pub mod text;

mod error;

pub use error::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;
