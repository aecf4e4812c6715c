use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use fxhash::FxHashSet;
use snowflake::ProcessUniqueId;

use crate::reaction::Reactive;

/// Deferred work keyed by a tag. Scheduling the same tag again before the
/// task ran does nothing, so any number of writes in one tick cost a single
/// task.
pub trait Scheduler: 'static {
	fn schedule_once(&self, tag: Tag, task: Box<dyn FnOnce()>);
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Tag {
	owner: ProcessUniqueId,
	name: &'static str,
}

impl Tag {
	pub fn new(owner: ProcessUniqueId, name: &'static str) -> Self {
		Tag { owner, name }
	}

	/// A tag no other owner can collide with.
	pub fn unique(name: &'static str) -> Self {
		Tag::new(ProcessUniqueId::new(), name)
	}

	pub fn name(&self) -> &'static str {
		self.name
	}
}

/// Owns one tick: invalidated reactions waiting to re-run and tagged tasks
/// waiting for the end of the current batch.
#[derive(Clone, Default)]
pub struct Runtime {
	pub(crate) body: Rc<RuntimeBody>,
}

#[derive(Default)]
pub(crate) struct RuntimeBody {
	depth: Cell<usize>,
	flushing: Cell<bool>,
	microtask: Cell<bool>,
	changed: RefCell<Vec<Weak<dyn Reactive>>>,
	tasks: RefCell<Vec<Box<dyn FnOnce()>>>,
	scheduled: RefCell<FxHashSet<Tag>>,
}

impl Runtime {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn scheduler(&self) -> Rc<dyn Scheduler> {
		self.body.clone()
	}

	pub fn in_batch(&self) -> bool {
		self.body.depth.get() > 0
	}

	/// Runs `func`; once the outermost batch returns, everything it
	/// invalidated is flushed.
	pub fn batch<R>(&self, func: impl FnOnce() -> R) -> R {
		let is_root = self.body.batch_start();
		let result = func();
		if is_root {
			self.body.batch_stop();
			if !self.body.microtask.get() {
				self.body.flush();
			}
		}
		result
	}

	#[cfg(not(target_arch = "wasm32"))]
	pub fn batch_microtask(&self, func: impl FnOnce()) {
		self.batch(func)
	}

	/// Like [`Runtime::batch`], but the flush happens in a JS microtask so
	/// that every batch started in the current task shares it.
	#[cfg(target_arch = "wasm32")]
	pub fn batch_microtask(&self, func: impl FnOnce()) {
		let is_root = self.body.batch_start();
		let is_first_microtask = !self.body.microtask.replace(true);
		func();
		if is_root {
			self.body.batch_stop();
		}

		if is_first_microtask {
			let body = self.body.clone();
			crate::microtask::queue(move || {
				body.flush();
				body.microtask.set(false);
			});
		}
	}

	pub fn flush(&self) {
		self.body.flush();
	}

	/// True when nothing is waiting for a flush.
	pub fn is_idle(&self) -> bool {
		self.body.changed.borrow().is_empty() && self.body.tasks.borrow().is_empty()
	}
}

impl RuntimeBody {
	fn batch_start(&self) -> bool {
		let depth = self.depth.get();
		self.depth.set(depth + 1);
		depth == 0
	}

	fn batch_stop(&self) {
		self.depth.set(self.depth.get().saturating_sub(1));
	}

	pub(crate) fn push_changed(&self, reactive: Weak<dyn Reactive>) {
		self.changed.borrow_mut().push(reactive);
	}

	/// Re-runs invalidated reactions, then runs the tasks queued so far, and
	/// repeats until a pass finds nothing to do.
	fn flush(&self) {
		if self.flushing.replace(true) {
			return;
		}
		let _guard = FlushGuard(&self.flushing);

		let mut passes = 0usize;
		loop {
			let changed = std::mem::take(&mut *self.changed.borrow_mut());
			for reaction in &changed {
				if let Some(reactive) = reaction.upgrade() {
					reactive.update();
				}
			}

			let tasks = {
				self.scheduled.borrow_mut().clear();
				std::mem::take(&mut *self.tasks.borrow_mut())
			};
			let task_count = tasks.len();
			for task in tasks {
				task();
			}

			if changed.is_empty() && task_count == 0 {
				break;
			}

			passes += 1;
			tracing::trace!(passes, reactions = changed.len(), tasks = task_count, "flush pass");
		}
	}
}

impl Scheduler for RuntimeBody {
	fn schedule_once(&self, tag: Tag, task: Box<dyn FnOnce()>) {
		if self.scheduled.borrow_mut().insert(tag) {
			if self.depth.get() == 0 && !self.flushing.get() {
				tracing::debug!(tag = tag.name, "scheduled outside a batch, waiting for an explicit flush");
			}
			self.tasks.borrow_mut().push(task);
		} else {
			tracing::trace!(tag = tag.name, "task already scheduled");
		}
	}
}

impl Scheduler for Runtime {
	fn schedule_once(&self, tag: Tag, task: Box<dyn FnOnce()>) {
		self.body.schedule_once(tag, task)
	}
}

struct FlushGuard<'a>(&'a Cell<bool>);

impl Drop for FlushGuard<'_> {
	fn drop(&mut self) {
		self.0.set(false);
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn same_tag_runs_once_per_tick() {
		let runtime = Runtime::new();
		let count = Rc::new(Cell::new(0));
		let tag = Tag::unique("count");

		runtime.batch(|| {
			for _ in 0..3 {
				let count = count.clone();
				runtime.schedule_once(tag, Box::new(move || count.set(count.get() + 1)));
			}
			assert_eq!(count.get(), 0);
		});
		assert_eq!(count.get(), 1);

		let again = count.clone();
		runtime.schedule_once(tag, Box::new(move || again.set(again.get() + 1)));
		assert!(!runtime.is_idle());
		runtime.flush();
		assert_eq!(count.get(), 2);
		assert!(runtime.is_idle());
	}

	#[test]
	fn nested_batches_flush_at_the_outermost() {
		let runtime = Runtime::new();
		let ran = Rc::new(Cell::new(false));

		runtime.batch(|| {
			runtime.batch(|| {
				let ran = ran.clone();
				runtime.schedule_once(Tag::unique("inner"), Box::new(move || ran.set(true)));
			});
			assert!(!ran.get());
			assert!(runtime.in_batch());
		});

		assert!(ran.get());
		assert!(!runtime.in_batch());
	}

	#[test]
	fn tasks_scheduled_by_tasks_run_in_the_same_flush() {
		let runtime = Runtime::new();
		let log = Rc::new(RefCell::new(Vec::new()));

		let inner_runtime = runtime.clone();
		let inner_log = log.clone();
		runtime.schedule_once(
			Tag::unique("outer"),
			Box::new(move || {
				inner_log.borrow_mut().push("outer");
				let log = inner_log.clone();
				inner_runtime.schedule_once(
					Tag::unique("inner"),
					Box::new(move || log.borrow_mut().push("inner")),
				);
			}),
		);

		runtime.flush();
		assert_eq!(*log.borrow(), vec!["outer", "inner"]);
	}
}
