use crate::error::Result;
use crate::evaluation::Evaluation;
use crate::path::{IntoPath, Path};
use crate::store::Store;
use crate::value::Value;

/// A store view bound to a sub-path. Every call joins its path onto the
/// bound one and goes straight to the store.
#[derive(Clone)]
pub struct Cursor {
	store: Store,
	path: Path,
}

impl Cursor {
	pub(crate) fn new(store: Store, path: Path) -> Self {
		Cursor { store, path }
	}

	pub fn path(&self) -> &Path {
		&self.path
	}

	pub fn store(&self) -> &Store {
		&self.store
	}

	fn resolve(&self, path: impl IntoPath) -> Result<Path> {
		Ok(self.path.join(&path.into_path()?))
	}

	pub fn get(&self, cx: &impl AsRef<Evaluation>, path: impl IntoPath) -> Result<Option<Value>> {
		self.store.get(cx, self.resolve(path)?)
	}

	pub fn get_or(
		&self,
		cx: &impl AsRef<Evaluation>,
		path: impl IntoPath,
		fallback: impl Into<Value>,
	) -> Result<Value> {
		self.store.get_or(cx, self.resolve(path)?, fallback)
	}

	pub fn get_once(&self, path: impl IntoPath) -> Result<Option<Value>> {
		self.store.get_once(self.resolve(path)?)
	}

	pub fn get_once_or(&self, path: impl IntoPath, fallback: impl Into<Value>) -> Result<Value> {
		self.store.get_once_or(self.resolve(path)?, fallback)
	}

	pub fn equals(
		&self,
		cx: &impl AsRef<Evaluation>,
		path: impl IntoPath,
		value: impl Into<Value>,
	) -> Result<bool> {
		self.store.equals(cx, self.resolve(path)?, value)
	}

	pub fn set(&self, path: impl IntoPath, value: impl Into<Value>) -> Result<()> {
		self.store.set(self.resolve(path)?, value)
	}

	pub fn delete(&self, path: impl IntoPath) -> Result<()> {
		self.store.delete(self.resolve(path)?)
	}

	pub fn update(&self, path: impl IntoPath, updater: impl FnOnce(Value) -> Value) -> Result<()> {
		self.store.update(self.resolve(path)?, updater)
	}

	pub fn update_or(
		&self,
		path: impl IntoPath,
		fallback: impl Into<Value>,
		updater: impl FnOnce(Value) -> Value,
	) -> Result<()> {
		self.store.update_or(self.resolve(path)?, fallback, updater)
	}

	pub fn set_default(&self, path: impl IntoPath, value: impl Into<Value>) -> Result<()> {
		self.store.set_default(self.resolve(path)?, value)
	}

	pub fn select(&self, path: impl IntoPath) -> Result<Cursor> {
		self.store.select(self.resolve(path)?)
	}
}

impl std::fmt::Debug for Cursor {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Cursor").field("path", &self.path).finish()
	}
}
