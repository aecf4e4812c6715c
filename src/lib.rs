//! Reactive store for nested, path-addressable state.
//!
//! Reactions read from a [`Store`] through their [`Evaluation`] and get
//! subscribed to exactly the paths they read. Writes replace the tree
//! copy-on-write and are flushed at the end of the current
//! [`Runtime::batch`]; only observers whose data changed are re-run.
//!
//! ```
//! use observe_tree::{Reaction, Runtime, Store, Value};
//!
//! let runtime = Runtime::new();
//! let store = Store::new(&runtime, Value::map([("count", 1)]));
//!
//! let reaction = Reaction::new(&runtime, Box::new({
//! 	let store = store.clone();
//! 	move |cx| {
//! 		let count = store.get_or(cx, "count", 0).unwrap();
//! 		println!("count is {}", count);
//! 	}
//! }));
//! reaction.update();
//!
//! runtime.batch(|| store.set("count", 2).unwrap());
//! ```

pub mod macros;

mod batch;
mod cursor;
mod dependencies;
mod error;
mod evaluation;
mod invalidation;
mod path;
mod reaction;
mod store;
pub mod tree;
mod value;

#[cfg(target_arch = "wasm32")]
mod microtask;

pub use batch::{Runtime, Scheduler, Tag};
pub use cursor::Cursor;
pub use dependencies::{Dependencies, NodeId, Observed, ObserverEntry};
pub use error::{Error, Result};
pub use evaluation::{Evaluation, Hook};
pub use invalidation::PathTree;
pub use path::{DepStep, IntoPath, Path, Segment};
pub use reaction::{Observer, ObserverId, Reaction, Reactive, State};
pub use store::{ForceOptions, Store, StoreOptions, Transform, Updater};
pub use value::{Map, Value};
