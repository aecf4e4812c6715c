use std::collections::hash_map::Entry;
use std::collections::VecDeque;
use std::rc::Weak;

use fxhash::{FxHashMap, FxHashSet};

use crate::path::{DepStep, Path, Segment};
use crate::reaction::{Observer, ObserverId};
use crate::value::Value;

/// What an observer saw the last time it read its path.
#[derive(Clone, Debug)]
pub enum Observed {
	/// Nothing on record: the next invalidation wakes the observer.
	Unrecorded,
	Absent,
	Present(Value),
}

impl From<Option<Value>> for Observed {
	fn from(value: Option<Value>) -> Self {
		match value {
			Some(value) => Observed::Present(value),
			None => Observed::Absent,
		}
	}
}

impl Observed {
	fn value(&self) -> Option<&Value> {
		match self {
			Observed::Present(value) => Some(value),
			_ => None,
		}
	}
}

pub struct ObserverEntry {
	pub(crate) observer: Weak<dyn Observer>,
	pub(crate) last: Observed,
	pub(crate) equals: Option<Value>,
}

impl ObserverEntry {
	pub fn new(observer: Weak<dyn Observer>, last: Observed, equals: Option<Value>) -> Self {
		ObserverEntry {
			observer,
			last,
			equals,
		}
	}

	pub fn last(&self) -> &Observed {
		&self.last
	}

	/// Decides whether a change at this entry's path is visible to its
	/// observer, given what is stored there now.
	pub fn should_wake(&self, current: Option<&Value>) -> bool {
		if matches!(self.last, Observed::Unrecorded) {
			return true;
		}

		let last = self.last.value();

		// An equality reader only cares whether "== sentinel" flipped.
		if let Some(sentinel) = &self.equals {
			let was = last.unwrap_or(&Value::Undefined).same(sentinel);
			let is = current.unwrap_or(&Value::Undefined).same(sentinel);
			return was != is;
		}

		// Absence is never identical to anything, not even to itself.
		match (last, current) {
			(Some(last), Some(current)) => !last.same(current) || current.is_container(),
			_ => true,
		}
	}

	/// Folds a second read of the same path by the same observer into this
	/// entry. The sentinel survives only if both reads compared against it;
	/// a plain read, or a different sentinel, needs every change.
	fn merge(&mut self, other: ObserverEntry) {
		let equals = match (self.equals.take(), other.equals) {
			(Some(a), Some(b)) if a.same(&b) => Some(a),
			_ => None,
		};
		self.last = other.last;
		self.observer = other.observer;
		self.equals = equals;
	}

	/// Forgets the last value so the next invalidation cannot be suppressed.
	/// Terminal values are kept unless `all_types` is set.
	pub fn reset(&mut self, all_types: bool) {
		let container = self.last.value().map_or(false, Value::is_container);
		if all_types || container {
			self.last = Observed::Unrecorded;
		}
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

#[derive(Default)]
struct Node {
	entries: FxHashMap<ObserverId, ObserverEntry>,
	children: FxHashMap<Segment, NodeId>,
}

impl Node {
	fn is_empty(&self) -> bool {
		self.entries.is_empty() && self.children.is_empty()
	}
}

/// Trie of observed paths, stored as an arena so that nodes refer to each
/// other by index. A node exists only while something at or below it is
/// observed (after pruning).
pub struct Dependencies {
	nodes: Vec<Option<Node>>,
	free: Vec<NodeId>,
	pending_prune: Vec<Path>,
}

impl Default for Dependencies {
	fn default() -> Self {
		Dependencies {
			nodes: vec![Some(Node::default())],
			free: Vec::new(),
			pending_prune: Vec::new(),
		}
	}
}

impl Dependencies {
	pub const ROOT: NodeId = NodeId(0);

	pub fn new() -> Self {
		Self::default()
	}

	fn node(&self, id: NodeId) -> Option<&Node> {
		self.nodes.get(id.0).and_then(Option::as_ref)
	}

	fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
		self.nodes.get_mut(id.0).and_then(Option::as_mut)
	}

	fn alloc(&mut self) -> NodeId {
		match self.free.pop() {
			Some(id) => {
				self.nodes[id.0] = Some(Node::default());
				id
			}
			None => {
				self.nodes.push(Some(Node::default()));
				NodeId(self.nodes.len() - 1)
			}
		}
	}

	/// Number of live nodes, root included.
	pub fn len(&self) -> usize {
		self.nodes.iter().filter(|n| n.is_some()).count()
	}

	pub fn is_empty(&self) -> bool {
		self.node(Self::ROOT).map_or(true, Node::is_empty)
	}

	/// Follows dependency steps from the root. The node a path refers to is
	/// the one whose children map the last step lands in.
	pub fn resolve(&self, steps: &[DepStep]) -> Option<NodeId> {
		let mut current = Self::ROOT;
		let mut in_children = false;

		for step in steps {
			match step {
				DepStep::Children if !in_children => in_children = true,
				DepStep::Key(segment) if in_children => {
					current = *self.node(current)?.children.get(segment)?;
					in_children = false;
				}
				_ => return None,
			}
		}

		in_children.then_some(current)
	}

	pub fn locate(&self, path: &Path) -> Option<NodeId> {
		self.resolve(&path.to_dependency_path())
	}

	fn locate_or_create(&mut self, path: &Path) -> NodeId {
		let mut current = Self::ROOT;
		for step in path.to_dependency_path() {
			let DepStep::Key(segment) = step else {
				continue;
			};
			let existing = self
				.node(current)
				.and_then(|node| node.children.get(&segment).copied());
			current = match existing {
				Some(next) => next,
				None => {
					let next = self.alloc();
					if let Some(node) = self.node_mut(current) {
						node.children.insert(segment, next);
					}
					next
				}
			};
		}
		current
	}

	pub fn add(&mut self, path: &Path, id: ObserverId, entry: ObserverEntry) {
		let node = self.locate_or_create(path);
		if let Some(node) = self.node_mut(node) {
			match node.entries.entry(id) {
				Entry::Occupied(mut existing) => existing.get_mut().merge(entry),
				Entry::Vacant(slot) => {
					slot.insert(entry);
				}
			}
		}
	}

	/// Removes the entry of `id` at `path`. Empty nodes are left in place
	/// until the next [`Dependencies::prune`].
	pub fn remove(&mut self, path: &Path, id: ObserverId) -> bool {
		let removed = match self.locate(path).and_then(|n| self.node_mut(n)) {
			Some(node) => node.entries.remove(&id).is_some(),
			None => false,
		};
		if removed {
			self.pending_prune.push(path.clone());
		}
		removed
	}

	pub fn has_pending_prune(&self) -> bool {
		!self.pending_prune.is_empty()
	}

	/// Deletes every node that became empty since the last prune, deepest
	/// paths first so that a parent is only looked at once its children are
	/// settled.
	pub fn prune(&mut self) -> usize {
		let mut seen = FxHashSet::default();
		let mut paths = std::mem::take(&mut self.pending_prune);
		paths.retain(|path| seen.insert(path.clone()));
		paths.sort_by(|a, b| b.len().cmp(&a.len()));

		let mut removed = 0;
		for path in paths {
			let mut chain = Vec::with_capacity(path.len());
			let mut current = Self::ROOT;
			for segment in path.iter() {
				let Some(next) = self.node(current).and_then(|n| n.children.get(segment).copied())
				else {
					break;
				};
				chain.push((current, segment.clone(), next));
				current = next;
			}

			for (parent, segment, child) in chain.into_iter().rev() {
				if !self.node(child).map_or(false, Node::is_empty) {
					break;
				}
				if let Some(parent) = self.node_mut(parent) {
					parent.children.remove(&segment);
				}
				self.nodes[child.0] = None;
				self.free.push(child);
				removed += 1;
			}
		}

		removed
	}

	pub fn entries(&self, node: NodeId) -> impl Iterator<Item = (&ObserverId, &ObserverEntry)> {
		self.node(node).into_iter().flat_map(|n| n.entries.iter())
	}

	pub fn entries_mut(
		&mut self,
		node: NodeId,
	) -> impl Iterator<Item = (&ObserverId, &mut ObserverEntry)> {
		self.node_mut(node).into_iter().flat_map(|n| n.entries.iter_mut())
	}

	/// Breadth-first listing of `node` and all nodes below it, paired with
	/// their paths (`base` being the path of `node`).
	pub fn subtree(&self, node: NodeId, base: &Path) -> Vec<(Path, NodeId)> {
		let mut out = Vec::new();
		let mut queue = VecDeque::from([(base.clone(), node)]);

		while let Some((path, id)) = queue.pop_front() {
			if let Some(n) = self.node(id) {
				for (segment, child) in &n.children {
					queue.push_back((path.child(segment.clone()), *child));
				}
			}
			out.push((path, id));
		}

		out
	}

	/// Every observer entry in the subtree rooted at `node`, with the path
	/// it was registered at.
	pub fn collect_observers_under(
		&self,
		node: NodeId,
		base: &Path,
	) -> Vec<(Path, ObserverId, &ObserverEntry)> {
		self.subtree(node, base)
			.into_iter()
			.flat_map(|(path, id)| {
				self.entries(id)
					.map(move |(observer, entry)| (path.clone(), *observer, entry))
			})
			.collect()
	}
}
