use std::cell::RefCell;
use std::rc::{Rc, Weak};

use fxhash::FxHashSet;
use snowflake::ProcessUniqueId;

use crate::batch::{Runtime, Scheduler, Tag};
use crate::cursor::Cursor;
use crate::dependencies::{Dependencies, Observed, ObserverEntry};
use crate::error::{Error, Result};
use crate::evaluation::Evaluation;
use crate::invalidation::PathTree;
use crate::path::{IntoPath, Path};
use crate::reaction::{Observer, ObserverId};
use crate::tree;
use crate::value::Value;

pub type Transform = Rc<dyn Fn(Value) -> Value>;

#[derive(Clone, Default)]
pub struct StoreOptions {
	/// Applied to every present value handed out by `get` and to the input
	/// of updaters. Raw values are what gets stored and compared.
	pub transform: Option<Transform>,
}

impl StoreOptions {
	pub fn transform(mut self, transform: impl Fn(Value) -> Value + 'static) -> Self {
		self.transform = Some(Rc::new(transform));
		self
	}
}

#[derive(Clone, Copy, Debug, Default)]
pub struct ForceOptions {
	/// Also forget terminal values, not only containers.
	pub all_types: bool,
	/// Leave the subtree below the path alone.
	pub no_children: bool,
}

/// The function passed to [`Store::update_with`]. It may be missing, for
/// callers that forward an optional updater.
pub struct Updater<'a>(Option<Box<dyn FnOnce(Value) -> Value + 'a>>);

impl<'a> Updater<'a> {
	pub fn none() -> Self {
		Updater(None)
	}
}

impl<'a, F> From<F> for Updater<'a>
where
	F: FnOnce(Value) -> Value + 'a,
{
	fn from(func: F) -> Self {
		Updater(Some(Box::new(func)))
	}
}

/// Reactive store for a tree of values.
///
/// Reads through an [`Evaluation`] subscribe the running reaction to the
/// path they read. Writes replace the root copy-on-write and are collected
/// until the runtime flushes; the flush wakes exactly the observers whose
/// view changed, each at most once.
#[derive(Clone)]
pub struct Store {
	body: Rc<StoreBody>,
}

struct StoreBody {
	inner: RefCell<StoreInner>,
	scheduler: Rc<dyn Scheduler>,
	options: StoreOptions,
	invalidate_tag: Tag,
	prune_tag: Tag,
	this: Weak<StoreBody>,
}

struct StoreInner {
	root: Value,
	dependencies: Dependencies,
	pending: Vec<Path>,
}

#[derive(Default)]
struct ReadOptions {
	equals: Option<Value>,
	no_transform: bool,
}

impl Store {
	pub fn new(runtime: &Runtime, initial: impl Into<Value>) -> Self {
		Self::with_scheduler(runtime.scheduler(), initial, StoreOptions::default())
	}

	pub fn with_options(runtime: &Runtime, initial: impl Into<Value>, options: StoreOptions) -> Self {
		Self::with_scheduler(runtime.scheduler(), initial, options)
	}

	/// Builds a store on any scheduler. A non-container initial value starts
	/// the store with an empty map.
	pub fn with_scheduler(
		scheduler: Rc<dyn Scheduler>,
		initial: impl Into<Value>,
		options: StoreOptions,
	) -> Self {
		let initial = initial.into();
		let root = if initial.is_container() {
			initial
		} else {
			Value::Map(Default::default())
		};

		let owner = ProcessUniqueId::new();
		Store {
			body: Rc::new_cyclic(|this| StoreBody {
				inner: RefCell::new(StoreInner {
					root,
					dependencies: Dependencies::new(),
					pending: Vec::new(),
				}),
				scheduler,
				options,
				invalidate_tag: Tag::new(owner, "invalidate"),
				prune_tag: Tag::new(owner, "prune"),
				this: this.clone(),
			}),
		}
	}

	/// The current root. Later writes never modify it.
	pub fn snapshot(&self) -> Value {
		self.body.inner.borrow().root.clone()
	}

	/// Tracked read: `None` when nothing is stored at `path`.
	pub fn get(&self, cx: &impl AsRef<Evaluation>, path: impl IntoPath) -> Result<Option<Value>> {
		let path = path.into_path()?;
		Ok(self.body.read(Some(cx.as_ref()), path, ReadOptions::default()))
	}

	pub fn get_or(
		&self,
		cx: &impl AsRef<Evaluation>,
		path: impl IntoPath,
		fallback: impl Into<Value>,
	) -> Result<Value> {
		Ok(self.get(cx, path)?.unwrap_or_else(|| fallback.into()))
	}

	/// Read without subscribing.
	pub fn get_once(&self, path: impl IntoPath) -> Result<Option<Value>> {
		let path = path.into_path()?;
		Ok(self.body.read(None, path, ReadOptions::default()))
	}

	pub fn get_once_or(&self, path: impl IntoPath, fallback: impl Into<Value>) -> Result<Value> {
		Ok(self.get_once(path)?.unwrap_or_else(|| fallback.into()))
	}

	/// Tracked check whether the raw value at `path` is `value`. The reader
	/// is woken only when the answer flips.
	pub fn equals(
		&self,
		cx: &impl AsRef<Evaluation>,
		path: impl IntoPath,
		value: impl Into<Value>,
	) -> Result<bool> {
		let path = path.into_path()?;
		Ok(self.body.equals(Some(cx.as_ref()), path, value.into()))
	}

	pub fn equals_once(&self, path: impl IntoPath, value: impl Into<Value>) -> Result<bool> {
		let path = path.into_path()?;
		Ok(self.body.equals(None, path, value.into()))
	}

	/// Stores `value` at `path`. Writing a terminal that is already there is
	/// a no-op; container writes always go through.
	///
	/// Observers are notified when the runtime flushes: at the end of the
	/// outermost [`Runtime::batch`], or on an explicit [`Runtime::flush`]
	/// for writes made outside any batch.
	pub fn set(&self, path: impl IntoPath, value: impl Into<Value>) -> Result<()> {
		let path = path.into_path()?;
		self.body.set(path, value.into());
		Ok(())
	}

	pub fn delete(&self, path: impl IntoPath) -> Result<()> {
		self.set(path, Value::Undefined)
	}

	pub fn update(&self, path: impl IntoPath, updater: impl FnOnce(Value) -> Value) -> Result<()> {
		self.update_with(path, None, Updater::from(updater))
	}

	pub fn update_or(
		&self,
		path: impl IntoPath,
		fallback: impl Into<Value>,
		updater: impl FnOnce(Value) -> Value,
	) -> Result<()> {
		self.update_with(path, Some(fallback.into()), Updater::from(updater))
	}

	/// Applies `updater` to the current value (or `fallback`) and stores the
	/// result unless it is identical to what went in.
	pub fn update_with(&self, path: impl IntoPath, fallback: Option<Value>, updater: Updater) -> Result<()> {
		let path = path.into_path()?;
		let updater = updater.0.ok_or(Error::Arity)?;
		self.body.update(path, fallback.unwrap_or_default(), updater);
		Ok(())
	}

	/// Sets `path` only if nothing is stored there. Never subscribes.
	pub fn set_default(&self, path: impl IntoPath, value: impl Into<Value>) -> Result<()> {
		let path = path.into_path()?;
		if self.body.read(None, path.clone(), ReadOptions::default()).is_none() {
			self.body.set(path, value.into());
		}
		Ok(())
	}

	pub fn select(&self, path: impl IntoPath) -> Result<Cursor> {
		Ok(Cursor::new(self.clone(), path.into_path()?))
	}

	/// Queues `path` as changed without writing anything.
	pub fn invalidate(&self, path: impl IntoPath) -> Result<()> {
		let path = path.into_path()?;
		self.body.enqueue(&mut self.body.inner.borrow_mut(), path);
		Ok(())
	}

	/// Makes sure the next flush wakes the observers of `path` even if their
	/// values look unchanged. Cached values are forgotten on every level from
	/// the root down to `path` and, unless `no_children`, below it.
	pub fn force_invalidate(&self, path: impl IntoPath, options: ForceOptions) -> Result<()> {
		let path = path.into_path()?;
		self.body.force_invalidate(path, options);
		Ok(())
	}

	/// Number of observer registrations, mostly useful in tests.
	pub fn observer_count(&self) -> usize {
		let inner = self.body.inner.borrow();
		let deps = &inner.dependencies;
		deps.collect_observers_under(Dependencies::ROOT, &Path::root()).len()
	}

	/// Number of live dependency nodes, root included.
	pub fn dependency_nodes(&self) -> usize {
		self.body.inner.borrow().dependencies.len()
	}

	pub fn is_observed(&self, path: impl IntoPath) -> Result<bool> {
		let path = path.into_path()?;
		Ok(self.body.inner.borrow().dependencies.locate(&path).is_some())
	}
}

impl StoreBody {
	fn read(&self, cx: Option<&Evaluation>, path: Path, options: ReadOptions) -> Option<Value> {
		let value = tree::read(&self.inner.borrow().root, &path).cloned();

		if let Some(cx) = cx {
			self.track(cx, path, value.clone(), options.equals);
		}

		match (value, &self.options.transform) {
			(Some(value), Some(transform)) if !options.no_transform => Some(transform(value)),
			(value, _) => value,
		}
	}

	fn track(&self, cx: &Evaluation, path: Path, value: Option<Value>, equals: Option<Value>) {
		let id = cx.id();
		let entry = ObserverEntry::new(cx.observer(), Observed::from(value), equals);
		self.inner.borrow_mut().dependencies.add(&path, id, entry);

		let this = self.this.clone();
		cx.on_invalidate(Box::new(move || {
			if let Some(this) = this.upgrade() {
				this.remove_dependency(&path, id);
			}
		}));
	}

	fn equals(&self, cx: Option<&Evaluation>, path: Path, value: Value) -> bool {
		let options = ReadOptions {
			equals: Some(value.clone()),
			no_transform: true,
		};
		let current = self.read(cx, path, options).unwrap_or_default();
		current.same(&value)
	}

	fn set(&self, path: Path, value: Value) {
		let mut inner = self.inner.borrow_mut();

		if path.is_root() {
			inner.root = value;
		} else {
			if let Some(current) = tree::read(&inner.root, &path) {
				if !current.is_container() && current.same(&value) {
					tracing::trace!(%path, "write is a no-op");
					return;
				}
			}
			inner.root = tree::write(&inner.root, &path, value);
		}

		self.enqueue(&mut inner, path);
	}

	fn update(&self, path: Path, fallback: Value, updater: Box<dyn FnOnce(Value) -> Value + '_>) {
		let old = tree::read(&self.inner.borrow().root, &path)
			.cloned()
			.unwrap_or(fallback);

		let input = match &self.options.transform {
			Some(transform) => transform(old.clone()),
			None => old.clone(),
		};
		let new = updater(input);

		if old.same(&new) {
			return;
		}

		let mut inner = self.inner.borrow_mut();
		inner.root = tree::write(&inner.root, &path, new);
		self.enqueue(&mut inner, path);
	}

	fn enqueue(&self, inner: &mut StoreInner, path: Path) {
		tracing::trace!(%path, "queued for invalidation");
		let first = inner.pending.is_empty();
		inner.pending.push(path);

		if first {
			let this = self.this.clone();
			self.scheduler.schedule_once(
				self.invalidate_tag,
				Box::new(move || {
					if let Some(this) = this.upgrade() {
						this.process_invalidations();
					}
				}),
			);
		}
	}

	fn remove_dependency(&self, path: &Path, id: ObserverId) {
		let mut inner = self.inner.borrow_mut();
		let first = !inner.dependencies.has_pending_prune();
		if inner.dependencies.remove(path, id) && first {
			let this = self.this.clone();
			self.scheduler.schedule_once(
				self.prune_tag,
				Box::new(move || {
					if let Some(this) = this.upgrade() {
						let removed = this.inner.borrow_mut().dependencies.prune();
						tracing::trace!(removed, "pruned dependency nodes");
					}
				}),
			);
		}
	}

	fn force_invalidate(&self, path: Path, options: ForceOptions) {
		let mut inner = self.inner.borrow_mut();
		let deps = &mut inner.dependencies;

		let mut last = None;
		for len in 0..=path.len() {
			let Some(node) = deps.locate(&path.prefix(len)) else {
				break;
			};
			for (_, entry) in deps.entries_mut(node) {
				entry.reset(options.all_types);
			}
			last = (len == path.len()).then_some(node);
		}

		if let (Some(node), false) = (last, options.no_children) {
			for (_, id) in deps.subtree(node, &path) {
				for (_, entry) in deps.entries_mut(id) {
					entry.reset(options.all_types);
				}
			}
		}

		self.enqueue(&mut inner, path);
	}

	/// Runs at the end of a tick: compacts the written paths and wakes every
	/// observer whose view of the tree changed.
	fn process_invalidations(&self) {
		let woken = {
			let mut inner = self.inner.borrow_mut();
			if inner.pending.is_empty() {
				return;
			}

			let paths = std::mem::take(&mut inner.pending);
			let written = paths.len();
			let changes = PathTree::compact(paths);
			let woken = inner.collect_woken(&changes);
			tracing::debug!(written, woken = woken.len(), "processing invalidations");
			woken
		};

		for observer in woken {
			if let Some(observer) = observer.upgrade() {
				observer.invalidate();
			}
		}
	}
}

impl StoreInner {
	fn collect_woken(&self, changes: &PathTree) -> Vec<Weak<dyn Observer>> {
		let mut seen = FxHashSet::default();
		let mut woken = Vec::new();
		let mut wake = |id: ObserverId, entry: &ObserverEntry| {
			if seen.insert(id) {
				woken.push(entry.observer.clone());
			}
		};

		for (path, changed) in changes.walk() {
			let Some(node) = self.dependencies.locate(&path) else {
				continue;
			};

			let current = tree::read(&self.root, &path);
			for (id, entry) in self.dependencies.entries(node) {
				if entry.should_wake(current) {
					wake(*id, entry);
				}
			}

			// Everything below a rewritten subtree is stale, whatever it holds.
			if changed {
				let below = self.dependencies.collect_observers_under(node, &path);
				for (_, id, entry) in below.into_iter().filter(|(p, _, _)| p.len() > path.len()) {
					wake(id, entry);
				}
			}
		}

		woken
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::reaction::Reaction;

	fn last_values(store: &Store) -> Vec<(Path, Observed)> {
		let inner = store.body.inner.borrow();
		let mut values: Vec<_> = inner
			.dependencies
			.collect_observers_under(Dependencies::ROOT, &Path::root())
			.into_iter()
			.map(|(path, _, entry)| (path, entry.last().clone()))
			.collect();
		values.sort_by(|a, b| a.0.cmp(&b.0));
		values
	}

	fn watch(runtime: &Runtime, store: &Store, path: &'static str) -> Reaction {
		let store = store.clone();
		let reaction = Reaction::new(
			runtime,
			Box::new(move |cx| {
				store.get(cx, path).unwrap();
			}),
		);
		reaction.update();
		reaction
	}

	#[test]
	fn force_invalidate_resets_containers_down_to_path() {
		let runtime = Runtime::new();
		let store = Store::new(
			&runtime,
			Value::map([("a", Value::map([("b", Value::map([("c", 1)]))]))]),
		);
		let _a = watch(&runtime, &store, "a");
		let _b = watch(&runtime, &store, "a.b");
		let _c = watch(&runtime, &store, "a.b.c");

		store
			.force_invalidate(
				"a",
				ForceOptions {
					no_children: true,
					..Default::default()
				},
			)
			.unwrap();

		let values = last_values(&store);
		assert!(matches!(values[0].1, Observed::Unrecorded));
		assert!(matches!(values[1].1, Observed::Present(_)));
		assert!(matches!(values[2].1, Observed::Present(_)));

		store.force_invalidate("a", ForceOptions::default()).unwrap();

		let values = last_values(&store);
		assert!(matches!(values[1].1, Observed::Unrecorded));
		// Terminals survive unless asked for.
		assert!(matches!(values[2].1, Observed::Present(_)));
	}

	#[test]
	fn reads_outside_reactions_do_not_subscribe() {
		let runtime = Runtime::new();
		let store = Store::new(&runtime, Value::map([("a", 1)]));

		store.get_once("a").unwrap();
		store.equals_once("a", 1).unwrap();
		store.set_default("b", 2).unwrap();

		assert_eq!(store.observer_count(), 0);
		assert_eq!(store.dependency_nodes(), 1);
	}

	#[test]
	fn pending_writes_share_one_task() {
		let runtime = Runtime::new();
		let store = Store::new(&runtime, Value::map([("a", 1)]));

		runtime.batch(|| {
			store.set("a", 2).unwrap();
			store.set("b", 3).unwrap();
			assert_eq!(store.body.inner.borrow().pending.len(), 2);
			assert!(!runtime.is_idle());
		});

		assert!(store.body.inner.borrow().pending.is_empty());
		assert!(runtime.is_idle());
	}
}
