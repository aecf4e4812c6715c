use std::fmt::{Debug, Display};
use std::ops::Deref;
use std::rc::Rc;

use smallvec::SmallVec;

use crate::error::{Error, Result};
use crate::value::Value;

pub type Segment = Rc<str>;

/// Canonical location inside the state tree. The empty path is the root.
#[derive(Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Path {
	segments: SmallVec<[Segment; 4]>,
}

/// One step through the dependency tree. Every level has two address
/// spaces (the observers registered there and the child nodes), so a value
/// path alone does not say which one is meant.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DepStep {
	Children,
	Key(Segment),
}

impl Path {
	pub fn root() -> Self {
		Path::default()
	}

	pub fn is_root(&self) -> bool {
		self.segments.is_empty()
	}

	pub fn segments(&self) -> &[Segment] {
		&self.segments
	}

	pub fn push(&mut self, segment: impl Into<Segment>) {
		self.segments.push(segment.into());
	}

	pub fn child(&self, segment: impl Into<Segment>) -> Path {
		let mut path = self.clone();
		path.push(segment);
		path
	}

	/// The first `len` segments of this path.
	pub fn prefix(&self, len: usize) -> Path {
		Path {
			segments: self.segments[..len.min(self.len())].iter().cloned().collect(),
		}
	}

	pub fn join(&self, other: &Path) -> Path {
		let mut path = self.clone();
		path.segments.extend(other.segments.iter().cloned());
		path
	}

	pub fn starts_with(&self, other: &Path) -> bool {
		self.segments.starts_with(&other.segments)
	}

	pub fn to_dependency_path(&self) -> Vec<DepStep> {
		let mut steps = Vec::with_capacity(self.len() * 2 + 1);
		steps.push(DepStep::Children);
		for segment in &self.segments {
			steps.push(DepStep::Key(segment.clone()));
			steps.push(DepStep::Children);
		}
		steps
	}
}

impl Deref for Path {
	type Target = [Segment];
	fn deref(&self) -> &Self::Target {
		&self.segments
	}
}

impl<S: Into<Segment>> FromIterator<S> for Path {
	fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
		Path {
			segments: iter.into_iter().map(Into::into).collect(),
		}
	}
}

impl Display for Path {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(&self.segments.join("."))
	}
}

impl Debug for Path {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "Path({:?})", self.to_string())
	}
}

/// Anything that can name a location in the store.
///
/// Every accepted notation must end up here: a dotted string is split on
/// `.`, a list is taken segment by segment, and absence means the root.
pub trait IntoPath {
	fn into_path(self) -> Result<Path>;
}

impl IntoPath for Path {
	fn into_path(self) -> Result<Path> {
		Ok(self)
	}
}

impl IntoPath for &Path {
	fn into_path(self) -> Result<Path> {
		Ok(self.clone())
	}
}

impl IntoPath for () {
	fn into_path(self) -> Result<Path> {
		Ok(Path::root())
	}
}

impl IntoPath for &str {
	fn into_path(self) -> Result<Path> {
		Ok(self.split('.').collect())
	}
}

impl IntoPath for String {
	fn into_path(self) -> Result<Path> {
		self.as_str().into_path()
	}
}

impl IntoPath for &String {
	fn into_path(self) -> Result<Path> {
		self.as_str().into_path()
	}
}

impl IntoPath for &[&str] {
	fn into_path(self) -> Result<Path> {
		Ok(self.iter().copied().collect())
	}
}

impl<const N: usize> IntoPath for [&str; N] {
	fn into_path(self) -> Result<Path> {
		Ok(self.into_iter().collect())
	}
}

impl IntoPath for Vec<&str> {
	fn into_path(self) -> Result<Path> {
		Ok(self.into_iter().collect())
	}
}

impl IntoPath for Vec<String> {
	fn into_path(self) -> Result<Path> {
		Ok(self.into_iter().collect())
	}
}

impl<T: IntoPath> IntoPath for Option<T> {
	fn into_path(self) -> Result<Path> {
		match self {
			Some(path) => path.into_path(),
			None => Ok(Path::root()),
		}
	}
}

/// Dynamic form, for paths that arrive as data.
impl IntoPath for &Value {
	fn into_path(self) -> Result<Path> {
		match self {
			Value::Undefined => Ok(Path::root()),
			Value::String(s) => s.as_ref().into_path(),
			Value::List(items) => items
				.iter()
				.map(|item| match item {
					Value::String(s) => Ok(s.clone()),
					Value::Number(n) if n.fract() == 0.0 && n.is_finite() => {
						Ok(Segment::from(format!("{}", n)))
					}
					other => Err(Error::InvalidPath(format!("segment {}", other))),
				})
				.collect::<Result<SmallVec<_>>>()
				.map(|segments| Path { segments }),
			other => Err(Error::InvalidPath(other.to_string())),
		}
	}
}

impl IntoPath for Value {
	fn into_path(self) -> Result<Path> {
		(&self).into_path()
	}
}
