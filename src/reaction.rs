use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use smallvec::SmallVec;
use snowflake::ProcessUniqueId;

use crate::batch::{Runtime, RuntimeBody};
use crate::evaluation::{Evaluation, Hooks};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ObserverId(ProcessUniqueId);

impl ObserverId {
	pub fn new() -> Self {
		ObserverId(ProcessUniqueId::new())
	}
}

impl Default for ObserverId {
	fn default() -> Self {
		Self::new()
	}
}

/// A computation the store can wake up.
pub trait Observer: 'static {
	fn id(&self) -> ObserverId;

	/// Marks the computation as stale. Must be idempotent until the
	/// computation ran again.
	fn invalidate(self: Rc<Self>);
}

pub trait Reactive {
	fn update(&self);
}

#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum State {
	Valid,
	Invalid,
	Disposed,
}

/// A side effect that re-runs whenever something it read through an
/// [`Evaluation`] changes. Re-runs happen when the runtime flushes.
#[derive(Clone)]
pub struct Reaction {
	pub(crate) body: Rc<ReactionBody>,
}

pub struct ReactionBody {
	id: ObserverId,
	name: &'static str,
	state: Cell<State>,
	func: Box<dyn Fn(&Evaluation)>,
	hooks: RefCell<Hooks>,
	runtime: Weak<RuntimeBody>,
	this: Weak<ReactionBody>,
}

impl Drop for ReactionBody {
	fn drop(&mut self) {
		run_hooks(std::mem::take(self.hooks.get_mut()));
	}
}

fn run_hooks(hooks: Hooks) {
	for hook in hooks {
		hook();
	}
}

impl Reaction {
	#[must_use]
	pub fn new(runtime: &Runtime, func: Box<dyn Fn(&Evaluation)>) -> Self {
		Self::new_with_name(runtime, "<unnamed>", func)
	}

	#[must_use]
	pub fn new_with_name(
		runtime: &Runtime,
		name: &'static str,
		func: Box<dyn Fn(&Evaluation)>,
	) -> Self {
		Reaction {
			body: Rc::new_cyclic(|this| ReactionBody {
				id: ObserverId::new(),
				name,
				state: Cell::new(State::Invalid),
				func,
				hooks: RefCell::new(SmallVec::new()),
				runtime: Rc::downgrade(&runtime.body),
				this: this.clone(),
			}),
		}
	}

	pub fn id(&self) -> ObserverId {
		self.body.id
	}

	pub fn state(&self) -> State {
		self.body.state.get()
	}

	/// Runs the reaction if it is stale.
	pub fn update(&self) {
		self.body.update();
	}

	/// Marks the reaction stale and queues it for the next flush.
	pub fn invalidate(&self) {
		self.body.clone().invalidate();
	}

	/// Stops the reaction for good. Everything it subscribed to is released
	/// before this returns.
	pub fn dispose(&self) {
		self.body.dispose();
	}
}

impl ReactionBody {
	fn run(&self) {
		let this = self.this.clone() as Weak<dyn Observer>;
		let evaluation = Evaluation::new(this, self.id);
		(self.func)(&evaluation);

		let hooks = evaluation.take();
		if self.state.get() == State::Disposed {
			run_hooks(hooks);
			return;
		}

		self.hooks.borrow_mut().extend(hooks);
		self.state.set(State::Valid);
	}

	fn dispose(&self) {
		self.state.set(State::Disposed);
		let hooks = std::mem::take(&mut *self.hooks.borrow_mut());
		run_hooks(hooks);
	}
}

impl Reactive for ReactionBody {
	fn update(&self) {
		if self.state.get() != State::Invalid {
			return;
		}
		tracing::trace!(name = self.name, "running reaction");
		self.run();
	}
}

impl Observer for ReactionBody {
	fn id(&self) -> ObserverId {
		self.id
	}

	fn invalidate(self: Rc<Self>) {
		if self.state.get() != State::Valid {
			return;
		}
		self.state.set(State::Invalid);

		let hooks = std::mem::take(&mut *self.hooks.borrow_mut());
		run_hooks(hooks);

		if let Some(runtime) = self.runtime.upgrade() {
			runtime.push_changed(Rc::downgrade(&self) as Weak<dyn Reactive>);
		}
	}
}

impl std::fmt::Debug for Reaction {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Reaction")
			.field("name", &self.body.name)
			.field("state", &self.body.state.get())
			.finish()
	}
}
