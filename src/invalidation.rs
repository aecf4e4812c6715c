use std::collections::{BTreeMap, VecDeque};

use crate::path::{Path, Segment};

/// Compacted form of the paths written during one tick.
///
/// `Changed` means "this path and everything below it changed"; a `Branch`
/// only records which children were touched.
#[derive(Clone, Debug, PartialEq)]
pub enum PathTree {
	Changed,
	Branch(BTreeMap<Segment, PathTree>),
}

impl Default for PathTree {
	fn default() -> Self {
		PathTree::Branch(BTreeMap::new())
	}
}

impl PathTree {
	/// Builds the tree shortest path first, so a written prefix swallows
	/// every longer path below it regardless of write order.
	pub fn compact(paths: impl IntoIterator<Item = Path>) -> PathTree {
		let mut paths: Vec<Path> = paths.into_iter().collect();
		paths.sort_by_key(|path| path.len());

		let mut tree = PathTree::default();
		for path in &paths {
			tree.insert(path.segments());
		}
		tree
	}

	fn insert(&mut self, segments: &[Segment]) {
		let Some((last, parents)) = segments.split_last() else {
			*self = PathTree::Changed;
			return;
		};

		let mut node = self;
		for segment in parents {
			let children = match node {
				PathTree::Changed => return,
				PathTree::Branch(children) => children,
			};
			node = children.entry(segment.clone()).or_default();
		}

		if let PathTree::Branch(children) = node {
			children.insert(last.clone(), PathTree::Changed);
		}
	}

	pub fn is_changed(&self) -> bool {
		matches!(self, PathTree::Changed)
	}

	/// Breadth-first list of every path in the tree, with whether it is a
	/// fully changed subtree.
	pub fn walk(&self) -> Vec<(Path, bool)> {
		let mut out = Vec::new();
		let mut queue = VecDeque::from([(Path::root(), self)]);

		while let Some((path, node)) = queue.pop_front() {
			if let PathTree::Branch(children) = node {
				for (segment, child) in children {
					queue.push_back((path.child(segment.clone()), child));
				}
			}
			out.push((path, node.is_changed()));
		}

		out
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::path::IntoPath;

	fn paths(list: &[&str]) -> Vec<Path> {
		list.iter().map(|p| p.into_path().unwrap()).collect()
	}

	fn walked(tree: &PathTree) -> Vec<(String, bool)> {
		tree.walk()
			.into_iter()
			.map(|(p, changed)| (p.to_string(), changed))
			.collect()
	}

	#[test]
	fn prefix_swallows_longer_paths() {
		let tree = PathTree::compact(paths(&["a.b", "a", "c.d"]));
		assert_eq!(
			walked(&tree),
			vec![
				("".to_string(), false),
				("a".to_string(), true),
				("c".to_string(), false),
				("c.d".to_string(), true),
			]
		);
	}

	#[test]
	fn root_write_changes_everything() {
		let tree = PathTree::compact(vec![Path::root()].into_iter().chain(paths(&["a.b"])));
		assert_eq!(tree, PathTree::Changed);
		assert_eq!(walked(&tree), vec![("".to_string(), true)]);
	}

	#[test]
	fn duplicates_collapse() {
		let tree = PathTree::compact(paths(&["x.y", "x.y", "x.z"]));
		assert_eq!(
			walked(&tree),
			vec![
				("".to_string(), false),
				("x".to_string(), false),
				("x.y".to_string(), true),
				("x.z".to_string(), true),
			]
		);
	}

	#[test]
	fn empty_input_visits_only_the_root() {
		let tree = PathTree::compact(Vec::new());
		assert_eq!(walked(&tree), vec![("".to_string(), false)]);
	}
}
