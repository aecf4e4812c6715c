//! Copy-on-write access to the state tree.
//!
//! A write never touches an existing container. Every container on the way
//! from the root to the written path is rebuilt as a shallow copy, and
//! everything off that path is shared with the previous root.

use std::rc::Rc;

use crate::path::{Path, Segment};
use crate::value::{index_of, Map, Value};

/// Looks up `path` under `root`. `None` means nothing is stored there,
/// either because a segment is missing or because a terminal was indexed.
pub fn read<'a>(root: &'a Value, path: &Path) -> Option<&'a Value> {
	path.iter().try_fold(root, |node, segment| node.child(segment))
}

/// Returns a new root where `path` holds `value`.
pub fn write(root: &Value, path: &Path, value: Value) -> Value {
	write_segments(root, path.segments(), value)
}

fn write_segments(node: &Value, segments: &[Segment], value: Value) -> Value {
	let Some((head, rest)) = segments.split_first() else {
		return value;
	};

	let child = if rest.is_empty() {
		value
	} else {
		let previous = node.child(head).unwrap_or(&Value::Undefined);
		write_segments(previous, rest, value)
	};

	with_child(node, head, child)
}

/// Gap a write past the end of a list may leave. Anything further away turns
/// the list into a map.
pub const MAX_PADDING: usize = 1024;

/// Shallow copy of `node` with `segment` replaced. Lists stay lists as long
/// as they are addressed by position close to their end.
fn with_child(node: &Value, segment: &Segment, child: Value) -> Value {
	match node {
		Value::List(items) => match index_of(segment) {
			Some(index) if index <= items.len() + MAX_PADDING => {
				let mut items = Vec::clone(items);
				if index < items.len() {
					items[index] = child;
				} else {
					items.resize(index, Value::Undefined);
					items.push(child);
				}
				Value::List(Rc::new(items))
			}
			_ => {
				let mut map: Map = items
					.iter()
					.enumerate()
					.map(|(i, item)| (Segment::from(i.to_string()), item.clone()))
					.collect();
				map.insert(segment.clone(), child);
				Value::Map(Rc::new(map))
			}
		},
		Value::Map(map) => {
			let mut map = Map::clone(map);
			map.insert(segment.clone(), child);
			Value::Map(Rc::new(map))
		}
		_ => {
			let mut map = Map::new();
			map.insert(segment.clone(), child);
			Value::Map(Rc::new(map))
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::path::IntoPath;

	fn path(p: &str) -> Path {
		p.into_path().unwrap()
	}

	fn sample() -> Value {
		Value::map([
			("a", Value::map([("b", Value::from(1)), ("c", Value::from(2))])),
			("d", Value::list([Value::from("x"), Value::from("y")])),
		])
	}

	#[test]
	fn reads_nested_values() {
		let root = sample();
		assert_eq!(read(&root, &path("a.b")), Some(&Value::from(1)));
		assert_eq!(read(&root, &path("d.1")), Some(&Value::from("y")));
		assert!(read(&root, &Path::root()).unwrap().same(&root));
	}

	#[test]
	fn missing_segments_and_terminals_are_not_set() {
		let root = sample();
		assert_eq!(read(&root, &path("a.z")), None);
		assert_eq!(read(&root, &path("a.b.c")), None);
		assert_eq!(read(&root, &path("q.r.s")), None);
	}

	#[test]
	fn stored_undefined_is_present() {
		let root = write(&sample(), &path("a.b"), Value::Undefined);
		assert_eq!(read(&root, &path("a.b")), Some(&Value::Undefined));
	}

	#[test]
	fn write_shares_siblings() {
		let root = sample();
		let next = write(&root, &path("a.b"), Value::from(5));

		assert_eq!(read(&next, &path("a.b")), Some(&Value::from(5)));
		assert_eq!(read(&root, &path("a.b")), Some(&Value::from(1)));

		let old_d = read(&root, &path("d")).unwrap();
		let new_d = read(&next, &path("d")).unwrap();
		assert!(old_d.same(new_d));

		let old_a = read(&root, &path("a")).unwrap();
		let new_a = read(&next, &path("a")).unwrap();
		assert!(!old_a.same(new_a));
	}

	#[test]
	fn write_preserves_lists() {
		let root = sample();
		let next = write(&root, &path("d.0"), Value::from("z"));
		assert_eq!(
			read(&next, &path("d")),
			Some(&Value::list([Value::from("z"), Value::from("y")]))
		);

		let padded = write(&root, &path("d.3"), Value::from("w"));
		assert_eq!(
			read(&padded, &path("d")).and_then(Value::as_list).map(<[Value]>::len),
			Some(4)
		);
		assert_eq!(read(&padded, &path("d.2")), Some(&Value::Undefined));
	}

	#[test]
	fn far_indices_turn_list_into_map() {
		let far = write(&sample(), &path("d.18446744073709551615"), Value::from(1));
		let d = read(&far, &path("d")).unwrap();
		assert!(d.as_map().is_some());
		assert_eq!(read(&far, &path("d.0")), Some(&Value::from("x")));
		assert_eq!(read(&far, &path("d.18446744073709551615")), Some(&Value::from(1)));

		let edge = format!("d.{}", 2 + MAX_PADDING);
		let padded = write(&sample(), &path(&edge), Value::from(1));
		assert_eq!(
			read(&padded, &path("d")).and_then(Value::as_list).map(<[Value]>::len),
			Some(3 + MAX_PADDING)
		);

		let beyond = format!("d.{}", 3 + MAX_PADDING);
		let mapped = write(&sample(), &path(&beyond), Value::from(1));
		assert!(read(&mapped, &path("d")).unwrap().as_map().is_some());
	}

	#[test]
	fn named_key_turns_list_into_map() {
		let next = write(&sample(), &path("d.name"), Value::from(true));
		let d = read(&next, &path("d")).unwrap();
		assert!(d.as_map().is_some());
		assert_eq!(read(&next, &path("d.1")), Some(&Value::from("y")));
		assert_eq!(read(&next, &path("d.name")), Some(&Value::Bool(true)));
	}

	#[test]
	fn write_through_terminals_builds_maps() {
		let next = write(&sample(), &path("a.b.deep"), Value::from(9));
		assert_eq!(read(&next, &path("a.b.deep")), Some(&Value::from(9)));
		assert_eq!(read(&next, &path("a.c")), Some(&Value::from(2)));

		let fresh = write(&Value::Undefined, &path("x.y"), Value::Null);
		assert_eq!(fresh, Value::map([("x", Value::map([("y", Value::Null)]))]));
	}

	#[test]
	fn root_write_replaces_everything() {
		let next = write(&sample(), &Path::root(), Value::from(3));
		assert_eq!(next, Value::from(3));
	}
}
