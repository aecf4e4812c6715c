//! Error types for store operations.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
	/// The path argument is neither absent, a string, nor a list of segments.
	#[error("Invalid keypath: {0}")]
	InvalidPath(String),

	#[error("Invalid or missing updater function")]
	Arity,
}

pub type Result<T> = std::result::Result<T, Error>;
