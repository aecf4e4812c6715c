use std::collections::BTreeMap;
use std::fmt::Display;
use std::rc::Rc;

use crate::path::Segment;

pub type Map = BTreeMap<Segment, Value>;

/// A node of the state tree.
///
/// Containers are shared through `Rc` and never mutated after they were
/// built, so cloning a `Value` is cheap and a clone is a stable snapshot.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum Value {
	#[default]
	Undefined,
	Null,
	Bool(bool),
	Number(f64),
	String(Rc<str>),
	List(Rc<Vec<Value>>),
	Map(Rc<Map>),
}

impl Value {
	pub fn map<K, V, I>(entries: I) -> Value
	where
		I: IntoIterator<Item = (K, V)>,
		K: Into<Segment>,
		V: Into<Value>,
	{
		Value::Map(Rc::new(
			entries
				.into_iter()
				.map(|(k, v)| (k.into(), v.into()))
				.collect(),
		))
	}

	pub fn list<V, I>(items: I) -> Value
	where
		I: IntoIterator<Item = V>,
		V: Into<Value>,
	{
		Value::List(Rc::new(items.into_iter().map(Into::into).collect()))
	}

	pub fn is_container(&self) -> bool {
		matches!(self, Value::List(_) | Value::Map(_))
	}

	pub fn is_undefined(&self) -> bool {
		matches!(self, Value::Undefined)
	}

	/// Identity comparison: terminals compare by value, containers by
	/// allocation. Two structurally equal containers built separately are
	/// not the same.
	pub fn same(&self, other: &Value) -> bool {
		match (self, other) {
			(Value::Undefined, Value::Undefined) => true,
			(Value::Null, Value::Null) => true,
			(Value::Bool(a), Value::Bool(b)) => a == b,
			(Value::Number(a), Value::Number(b)) => a == b,
			(Value::String(a), Value::String(b)) => a == b,
			(Value::List(a), Value::List(b)) => Rc::ptr_eq(a, b),
			(Value::Map(a), Value::Map(b)) => Rc::ptr_eq(a, b),
			_ => false,
		}
	}

	/// Entry stored under `segment`, if this is a container that has one.
	pub fn child(&self, segment: &str) -> Option<&Value> {
		match self {
			Value::Map(map) => map.get(segment),
			Value::List(items) => index_of(segment).and_then(|i| items.get(i)),
			_ => None,
		}
	}

	pub fn as_f64(&self) -> Option<f64> {
		match self {
			Value::Number(n) => Some(*n),
			_ => None,
		}
	}

	pub fn as_str(&self) -> Option<&str> {
		match self {
			Value::String(s) => Some(&**s),
			_ => None,
		}
	}

	pub fn as_bool(&self) -> Option<bool> {
		match self {
			Value::Bool(b) => Some(*b),
			_ => None,
		}
	}

	pub fn as_list(&self) -> Option<&[Value]> {
		match self {
			Value::List(items) => Some(items.as_slice()),
			_ => None,
		}
	}

	pub fn as_map(&self) -> Option<&Map> {
		match self {
			Value::Map(map) => Some(&**map),
			_ => None,
		}
	}
}

/// List positions are canonical decimal integers ("0", "12", never "01").
pub(crate) fn index_of(segment: &str) -> Option<usize> {
	if !segment.bytes().all(|b| b.is_ascii_digit()) {
		return None;
	}
	if segment.len() > 1 && segment.starts_with('0') {
		return None;
	}
	segment.parse().ok()
}

impl From<bool> for Value {
	fn from(value: bool) -> Self {
		Value::Bool(value)
	}
}

impl From<f64> for Value {
	fn from(value: f64) -> Self {
		Value::Number(value)
	}
}

impl From<i32> for Value {
	fn from(value: i32) -> Self {
		Value::Number(value as f64)
	}
}

impl From<i64> for Value {
	fn from(value: i64) -> Self {
		Value::Number(value as f64)
	}
}

impl From<u32> for Value {
	fn from(value: u32) -> Self {
		Value::Number(value as f64)
	}
}

impl From<usize> for Value {
	fn from(value: usize) -> Self {
		Value::Number(value as f64)
	}
}

impl From<&str> for Value {
	fn from(value: &str) -> Self {
		Value::String(value.into())
	}
}

impl From<String> for Value {
	fn from(value: String) -> Self {
		Value::String(value.into())
	}
}

impl From<Rc<str>> for Value {
	fn from(value: Rc<str>) -> Self {
		Value::String(value)
	}
}

impl From<Vec<Value>> for Value {
	fn from(value: Vec<Value>) -> Self {
		Value::List(Rc::new(value))
	}
}

impl From<Map> for Value {
	fn from(value: Map) -> Self {
		Value::Map(Rc::new(value))
	}
}

impl Display for Value {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Value::Undefined => f.write_str("undefined"),
			Value::Null => f.write_str("null"),
			Value::Bool(b) => write!(f, "{}", b),
			Value::Number(n) => write!(f, "{}", n),
			Value::String(s) => write!(f, "{:?}", s),
			Value::List(items) => {
				f.write_str("[")?;
				for (i, item) in items.iter().enumerate() {
					if i > 0 {
						f.write_str(",")?;
					}
					write!(f, "{}", item)?;
				}
				f.write_str("]")
			}
			Value::Map(map) => {
				f.write_str("{")?;
				for (i, (key, item)) in map.iter().enumerate() {
					if i > 0 {
						f.write_str(",")?;
					}
					write!(f, "{:?}:{}", key, item)?;
				}
				f.write_str("}")
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn containers_compare_by_identity() {
		let a = Value::map([("x", 1)]);
		let b = Value::map([("x", 1)]);
		assert_eq!(a, b);
		assert!(!a.same(&b));
		assert!(a.same(&a.clone()));
	}

	#[test]
	fn terminals_compare_by_value() {
		assert!(Value::from("hi").same(&Value::from(String::from("hi"))));
		assert!(Value::from(2).same(&Value::from(2.0)));
		assert!(!Value::Null.same(&Value::Undefined));
		assert!(!Value::Number(f64::NAN).same(&Value::Number(f64::NAN)));
	}

	#[test]
	fn list_children_need_canonical_indices() {
		let list = Value::list([10, 20, 30]);
		assert_eq!(list.child("1"), Some(&Value::from(20)));
		assert_eq!(list.child("01"), None);
		assert_eq!(list.child("3"), None);
		assert_eq!(list.child("x"), None);
		assert_eq!(Value::from(5).child("0"), None);
	}

	#[test]
	fn display_is_json_like() {
		let value = Value::map([
			("a", Value::list([Value::from(1), Value::Null])),
			("b", Value::from("s")),
		]);
		assert_eq!(value.to_string(), r#"{"a":[1,null],"b":"s"}"#);
	}
}
