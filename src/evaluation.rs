use std::cell::RefCell;
use std::rc::Weak;

use smallvec::SmallVec;

use crate::reaction::{Observer, ObserverId};

pub type Hook = Box<dyn FnOnce()>;
pub(crate) type Hooks = SmallVec<[Hook; 4]>;

/// Context of one run of an observer. Reads that go through it are
/// remembered, and the cleanup they leave behind runs when the observer is
/// invalidated or disposed.
pub struct Evaluation {
	observer: Weak<dyn Observer>,
	id: ObserverId,
	hooks: RefCell<Hooks>,
}

impl AsRef<Evaluation> for Evaluation {
	fn as_ref(&self) -> &Evaluation {
		self
	}
}

impl Evaluation {
	pub fn new(observer: Weak<dyn Observer>, id: ObserverId) -> Self {
		Evaluation {
			observer,
			id,
			hooks: RefCell::new(SmallVec::new()),
		}
	}

	pub fn id(&self) -> ObserverId {
		self.id
	}

	pub(crate) fn observer(&self) -> Weak<dyn Observer> {
		self.observer.clone()
	}

	pub fn on_invalidate(&self, hook: Hook) {
		self.hooks.borrow_mut().push(hook);
	}

	pub(crate) fn take(self) -> Hooks {
		self.hooks.into_inner()
	}
}
